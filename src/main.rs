//! CLI entry point: wires a GFA graph and GAF alignments into the heuristic
//! component generator and reports relative isomer frequencies.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{arg, command, value_parser, ArgMatches};

use isomer_weaver::gaf::GafAlignments;
use isomer_weaver::generator::{GeneratorConfig, HeuristicComponentGenerator};
use isomer_weaver::gfa_graph::GfaGraph;
use isomer_weaver::graph::BidirectedGraph;
use isomer_weaver::read_index::ReadPathIndex;
use isomer_weaver::traverser::TraverserConfig;

fn cli() -> ArgMatches {
    command!()
        .about("Resolves relative frequencies of alternative genome isomers from long-read alignments to an assembly graph.")
        .arg(arg!(--gfa <GFA> "Assembly graph in GFA format").value_parser(value_parser!(PathBuf)))
        .arg(arg!(--gaf <GAF> "Long-read alignments in GAF format").value_parser(value_parser!(PathBuf)))
        .arg(
            arg!(--depth [DEPTH] "Optional TSV of segment_name\\tcoverage, overriding any name-suffix coverage")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(--"num-search" [N] "Target number of distinct components to discover")
                .value_parser(value_parser!(usize))
                .default_value("1000"),
        )
        .arg(
            arg!(--"num-processes" [N] "Worker thread count")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--"max-traversal-attempts" [N] "Hard cap on traversal attempts (default 50 * num-search)")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--seed [SEED] "Base RNG seed")
                .value_parser(value_parser!(u64))
                .default_value("0"),
        )
        .arg(arg!(--linear "Accept non-circular components (default requires circularity)"))
        .arg(arg!(--"no-hetero-chromosome" "Disable GCD-based hetero-unit decomposition"))
        .arg(arg!(--"no-filter-by-graph" "Keep alignment paths even when the graph's edges do not support them"))
        .arg(arg!(--"use-alignment-cov" "Report contig_coverages from read-path occurrence counts instead of the assembly graph's own coverage"))
        .arg(
            arg!(--"min-aligned-path-len" [N] "Minimum aligned path length for a GAF record to be used")
                .value_parser(value_parser!(u64))
                .default_value("0"),
        )
        .arg(
            arg!(--"min-align-len" [N] "Minimum alignment block length for a GAF record to be used")
                .value_parser(value_parser!(u64))
                .default_value("0"),
        )
        .arg(
            arg!(--"min-identity" [F] "Minimum identity for a GAF record to be used")
                .value_parser(value_parser!(f64))
                .default_value("0.0"),
        )
        .arg(
            arg!(--"differ-f" [F] "Exponent sharpening preference for more-supported candidates")
                .value_parser(value_parser!(f64))
                .default_value("1.0"),
        )
        .arg(
            arg!(--"decay-f" [F] "Multiplicative bonus per extra unit of read-evidence overlap length")
                .value_parser(value_parser!(f64))
                .default_value("20.0"),
        )
        .arg(
            arg!(--"decay-t" [F] "Cumulative supporting-read-count cutoff for overlap-window collection")
                .value_parser(value_parser!(f64))
                .default_value("1000.0"),
        )
        .arg(
            arg!(--"cov-inert" [F] "Coverage-inertia exponent for coverage-proximity-weighted extension")
                .value_parser(value_parser!(f64))
                .default_value("1.0"),
        )
        .get_matches()
}

fn load_depth_table(path: &PathBuf) -> Result<HashMap<String, f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read depth table {path:?}"))?;
    let mut table = HashMap::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut cols = line.split('\t');
        let name = cols
            .next()
            .with_context(|| format!("depth table line {} is empty", line_no + 1))?;
        let cov: f64 = cols
            .next()
            .with_context(|| format!("depth table line {} is missing a coverage column", line_no + 1))?
            .parse()
            .with_context(|| format!("depth table line {} has a non-numeric coverage", line_no + 1))?;
        table.insert(name.to_string(), cov);
    }
    Ok(table)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = cli();

    let gfa_path = args.get_one::<PathBuf>("gfa").expect("--gfa is required");
    let gaf_path = args.get_one::<PathBuf>("gaf").expect("--gaf is required");

    let depth_table = args
        .get_one::<PathBuf>("depth")
        .map(load_depth_table)
        .transpose()?;

    let provider =
        GfaGraph::load(gfa_path, depth_table.as_ref()).context("failed to load GFA graph")?;
    let graph = BidirectedGraph::new(std::sync::Arc::new(provider));

    let alignments = GafAlignments::load(
        gaf_path,
        graph.provider().as_ref(),
        *args.get_one::<u64>("min-aligned-path-len").unwrap(),
        *args.get_one::<u64>("min-align-len").unwrap(),
        *args.get_one::<f64>("min-identity").unwrap(),
    )
    .context("failed to load GAF alignments")?;

    let index = ReadPathIndex::build_filtered(
        &graph,
        alignments.records().to_vec(),
        !args.get_flag("no-filter-by-graph"),
    )
    .context("failed to index read paths")?;

    let num_search = *args.get_one::<usize>("num-search").unwrap();
    let mut config = GeneratorConfig::new(num_search);
    if let Some(&n) = args.get_one::<usize>("num-processes") {
        config.num_processes = n;
    }
    if let Some(&n) = args.get_one::<usize>("max-traversal-attempts") {
        config.max_traversal_attempts = n;
    }
    config.seed = *args.get_one::<u64>("seed").unwrap();
    config.force_circular = !args.get_flag("linear");
    config.hetero_chromosome = !args.get_flag("no-hetero-chromosome");
    config.use_alignment_cov = args.get_flag("use-alignment-cov");
    config.traverser = TraverserConfig {
        differ_f: *args.get_one::<f64>("differ-f").unwrap(),
        decay_f: *args.get_one::<f64>("decay-f").unwrap(),
        decay_t: *args.get_one::<f64>("decay-t").unwrap(),
        cov_inert: *args.get_one::<f64>("cov-inert").unwrap(),
        hetero_chromosome: config.hetero_chromosome,
        max_extension_steps: TraverserConfig::default().max_extension_steps,
    };

    // Keep our own handle to the graph for `repr_path` below — the
    // generator takes ownership of its copy (a cheap `Arc` clone).
    let display_graph = graph.clone();
    let generator = HeuristicComponentGenerator::new(graph, index, config);
    let report = generator.generate().context("component generation failed")?;

    let total: u32 = report.components_counts.iter().sum();
    for (component, count) in report.components.iter().zip(&report.components_counts) {
        let freq = if total > 0 {
            *count as f64 / total as f64
        } else {
            0.0
        };
        println!(
            "{count}\t{freq:.6}\t{}",
            display_graph.repr_path(component)
        );
    }

    if report.budget_exhausted {
        log::warn!(
            "stopped after exhausting max-traversal-attempts before reaching num-search={num_search} distinct components"
        );
    }

    Ok(())
}
