//! Turning raw read alignments into the structures the traverser
//! walks against: a deduplicated table of standardized read paths, and two
//! sub-path indices used to pick extension candidates.
//!
//! Both indices map a sub-path to the read paths it occurs in, together with
//! *where* it occurs, so the traverser can read off "what this read says
//! comes next" once our walk's tail matches part of it. The "starting"
//! index only indexes sub-paths anchored at a read's own first segment (the
//! strongest evidence: the whole read agrees with our walk from its start);
//! the "middle" index additionally covers sub-paths that start elsewhere in
//! the read, used as weaker fallback evidence (discounted by the
//! traverser's `decay_f`).

use std::collections::HashMap;

use crate::gaf::AlignmentRecord;
use crate::graph::BidirectedGraph;
use crate::path::{OrientedSegment, Path, ReadPath, SegmentId};

/// One recorded occurrence of a sub-path within an indexed read path.
#[derive(Debug, Clone, Copy)]
pub struct SubpathHit {
    pub read_path_index: usize,
    /// Whether this occurrence was found against the read path's
    /// reverse-complement rather than its stored (canonical) orientation.
    pub reverse: bool,
    /// Index one past the end of the matched sub-path within the (possibly
    /// reversed) read path — i.e. where its continuation begins.
    match_end: usize,
}

/// Deduplicated read paths plus the starting-suffix and middle-substring
/// indices the traverser consults when extending a walk.
pub struct ReadPathIndex {
    pub read_paths: Vec<ReadPath>,
    pub read_ids: Vec<Vec<String>>,
    pub local_max_alignment_len: u64,
    starting: HashMap<Vec<OrientedSegment>, Vec<SubpathHit>>,
    middle: HashMap<Vec<OrientedSegment>, Vec<SubpathHit>>,
}

impl ReadPathIndex {
    /// Convenience wrapper over [`Self::build_filtered`] with `filter_by_graph`
    /// on, the sensible default for real alignment sets (a read path the
    /// graph's own edges don't support is alignment noise, not evidence).
    pub fn build(
        graph: &BidirectedGraph,
        alignments: impl IntoIterator<Item = AlignmentRecord>,
    ) -> crate::error::Result<Self> {
        Self::build_filtered(graph, alignments, true)
    }

    /// Ingests raw alignment paths into a deduplicated, standardised read-path
    /// table plus the starting-suffix/middle-substring indices (§4.2). Every
    /// path's segments must be known to the graph regardless of
    /// `filter_by_graph` (§3's invariant is unconditional); `filter_by_graph`
    /// additionally discards paths whose consecutive transitions are not all
    /// real graph edges.
    pub fn build_filtered(
        graph: &BidirectedGraph,
        alignments: impl IntoIterator<Item = AlignmentRecord>,
        filter_by_graph: bool,
    ) -> crate::error::Result<Self> {
        let mut order: Vec<Path> = Vec::new();
        let mut position: HashMap<Path, usize> = HashMap::new();
        let mut multiplicity: Vec<u32> = Vec::new();
        let mut read_ids: Vec<Vec<String>> = Vec::new();
        let mut local_max_alignment_len: u64 = 0;

        for record in alignments {
            graph.check_path(&record.path)?;
            if filter_by_graph && !graph.contain_path(&record.path)? {
                continue;
            }
            local_max_alignment_len = local_max_alignment_len.max(record.p_align_len);
            let (canon, _was_reversed) = graph.standardize_linear(&record.path);
            let idx = *position.entry(canon.clone()).or_insert_with(|| {
                order.push(canon.clone());
                multiplicity.push(0);
                read_ids.push(Vec::new());
                order.len() - 1
            });
            multiplicity[idx] += 1;
            read_ids[idx].push(record.query_name);
        }

        let read_paths: Vec<ReadPath> = order
            .into_iter()
            .zip(multiplicity)
            .map(|(path, multiplicity)| ReadPath { path, multiplicity })
            .collect();

        let mut starting: HashMap<Vec<OrientedSegment>, Vec<SubpathHit>> = HashMap::new();
        let mut middle: HashMap<Vec<OrientedSegment>, Vec<SubpathHit>> = HashMap::new();

        for (idx, rp) in read_paths.iter().enumerate() {
            for reverse in [false, true] {
                let oriented = if reverse {
                    graph.reverse_path(&rp.path)
                } else {
                    rp.path.clone()
                };
                let n = oriented.len();
                // Starting sub-paths: every proper, nonempty prefix (length
                // in [1, n)); the full read is not its own sub-path entry.
                for end in 1..n {
                    let key = oriented.as_slice()[0..end].to_vec();
                    starting.entry(key).or_default().push(SubpathHit {
                        read_path_index: idx,
                        reverse,
                        match_end: end,
                    });
                }
                // Middle sub-paths: every strictly interior substring — start
                // after position 0 and end before position n, so it is
                // neither a prefix nor a suffix of the read.
                for start in 1..n {
                    for end in (start + 1)..n {
                        let key = oriented.as_slice()[start..end].to_vec();
                        middle.entry(key).or_default().push(SubpathHit {
                            read_path_index: idx,
                            reverse,
                            match_end: end,
                        });
                    }
                }
            }
        }

        Ok(ReadPathIndex {
            read_paths,
            read_ids,
            local_max_alignment_len,
            starting,
            middle,
        })
    }

    /// Reads whose own prefix equals `suffix` (our walk's trailing
    /// `suffix.len()` segments) — the strong, starting-anchored evidence.
    pub fn starting_matches(&self, suffix: &[OrientedSegment]) -> &[SubpathHit] {
        self.starting.get(suffix).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reads containing `subpath` starting at some position other than 0 —
    /// weaker, middle-anchored evidence.
    pub fn middle_matches(&self, subpath: &[OrientedSegment]) -> &[SubpathHit] {
        self.middle.get(subpath).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The segments a read continues with after a matched sub-path ending at
    /// `hit.match_end`.
    pub fn continuation_after(&self, graph: &BidirectedGraph, hit: &SubpathHit) -> Vec<OrientedSegment> {
        let oriented = self.oriented_read_path(graph, hit);
        oriented.as_slice()[hit.match_end..].to_vec()
    }

    /// The full read path a hit was found in, oriented to match the strand
    /// the match was found on (`hit.reverse`).
    pub fn oriented_read_path(&self, graph: &BidirectedGraph, hit: &SubpathHit) -> Path {
        let rp = &self.read_paths[hit.read_path_index];
        if hit.reverse {
            graph.reverse_path(&rp.path)
        } else {
            rp.path.clone()
        }
    }

    pub fn multiplicity_of(&self, hit: &SubpathHit) -> u32 {
        self.read_paths[hit.read_path_index].multiplicity
    }

    pub fn counter_of(&self, path: &Path) -> u32 {
        self.read_paths
            .iter()
            .find(|rp| &rp.path == path)
            .map(|rp| rp.multiplicity)
            .unwrap_or(0)
    }

    /// Per-segment coverage estimated from how often each segment is
    /// traversed by a read path, weighted by that path's multiplicity. Known
    /// to overestimate relative to assembly-graph depth when reads are long
    /// relative to repeat units; used for `GenerationReport::contig_coverages`
    /// only when `GeneratorConfig::use_alignment_cov` is set, otherwise the
    /// assembly graph's own coverage is reported instead.
    pub fn estimate_contig_coverages(&self) -> HashMap<SegmentId, f64> {
        let mut counts: HashMap<SegmentId, f64> = HashMap::new();
        for rp in &self.read_paths {
            for oriented in rp.path.iter() {
                *counts.entry(oriented.segment).or_insert(0.0) += rp.multiplicity as f64;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfa_graph::GfaGraph;
    use crate::path::{OrientedSegment, Strand};
    use std::sync::Arc;

    fn two_segment_graph() -> BidirectedGraph {
        let dir = std::env::temp_dir();
        let path = dir.join("isomer_weaver_test_read_index.gfa");
        std::fs::write(
            &path,
            b"H\tVN:Z:1.0\nS\tA\tAAAA\nS\tB\tGGGG\nL\tA\t+\tB\t+\t0M\nL\tB\t+\tA\t+\t0M\n",
        )
        .unwrap();
        let gfa = GfaGraph::load(&path, None).unwrap();
        std::fs::remove_file(&path).ok();
        BidirectedGraph::new(Arc::new(gfa))
    }

    fn record(name: &str, path: Path) -> AlignmentRecord {
        AlignmentRecord {
            query_name: name.to_string(),
            path,
            p_align_len: 8,
            num_match: 8,
            align_len: 8,
            identity: 1.0,
        }
    }

    #[test]
    fn identical_and_reverse_reads_dedup_to_one_entry() {
        let graph = two_segment_graph();
        let a = graph.segment_ids()[0];
        let b = graph.segment_ids()[1];
        let fwd = Path::new(vec![
            OrientedSegment::new(a, Strand::Forward),
            OrientedSegment::new(b, Strand::Forward),
        ]);
        let rev = graph.reverse_path(&fwd);

        let index =
            ReadPathIndex::build(&graph, vec![record("r1", fwd.clone()), record("r2", rev)])
                .unwrap();

        assert_eq!(index.read_paths.len(), 1);
        assert_eq!(index.read_paths[0].multiplicity, 2);
    }

    #[test]
    fn starting_index_gives_continuation_past_the_match() {
        let graph = two_segment_graph();
        let a = graph.segment_ids()[0];
        let b = graph.segment_ids()[1];
        // Read covers A, B, A — a walk whose tail is just "A" should find
        // this read's own prefix "A" and read off "B, A" as the continuation.
        let path = Path::new(vec![
            OrientedSegment::new(a, Strand::Forward),
            OrientedSegment::new(b, Strand::Forward),
            OrientedSegment::new(a, Strand::Forward),
        ]);
        let index = ReadPathIndex::build(&graph, vec![record("r1", path.clone())]).unwrap();

        let prefix = &path.as_slice()[0..1];
        let hits = index.starting_matches(prefix);
        assert_eq!(hits.len(), 1);
        let continuation = index.continuation_after(&graph, &hits[0]);
        assert_eq!(continuation, path.as_slice()[1..].to_vec());
    }

    #[test]
    fn index_entry_counts_match_the_closed_form() {
        // Invariant: a length-L read contributes exactly 2*(L-1) starting-suffix
        // entries and 2*sum_{k=1..L-2}(L-k-1) middle-substring entries.
        let dir = std::env::temp_dir();
        let path = dir.join("isomer_weaver_test_read_index_counts.gfa");
        std::fs::write(
            &path,
            b"H\tVN:Z:1.0\nS\tA\t\
AAAA\nS\tB\tGGGG\nS\tC\tTTTT\nS\tD\tCCCC\n\
L\tA\t+\tB\t+\t0M\nL\tB\t+\tC\t+\t0M\nL\tC\t+\tD\t+\t0M\nL\tD\t+\tA\t+\t0M\n",
        )
        .unwrap();
        let gfa = GfaGraph::load(&path, None).unwrap();
        std::fs::remove_file(&path).ok();
        let graph = BidirectedGraph::new(Arc::new(gfa));

        let ids: Vec<_> = graph.segment_ids().to_vec();
        let read = Path::new(
            ids.iter()
                .map(|&s| OrientedSegment::new(s, Strand::Forward))
                .collect(),
        );
        let l = read.len();
        let index = ReadPathIndex::build(&graph, vec![record("r1", read)]).unwrap();

        let starting_count: usize = index.starting.values().map(Vec::len).sum();
        let middle_count: usize = index.middle.values().map(Vec::len).sum();

        assert_eq!(starting_count, 2 * (l - 1));
        let expected_middle: usize = (1..=l.saturating_sub(2)).map(|k| l - k - 1).sum();
        assert_eq!(middle_count, 2 * expected_middle);
    }

    #[test]
    fn filter_by_graph_discards_paths_the_graph_does_not_contain() {
        let graph = two_segment_graph();
        let a = graph.segment_ids()[0];
        let b = graph.segment_ids()[1];
        // A, A is not an edge in `two_segment_graph` (only A->B and B->A exist).
        let bogus = Path::new(vec![
            OrientedSegment::new(a, Strand::Forward),
            OrientedSegment::new(a, Strand::Forward),
        ]);
        let real = Path::new(vec![
            OrientedSegment::new(a, Strand::Forward),
            OrientedSegment::new(b, Strand::Forward),
        ]);

        let filtered =
            ReadPathIndex::build_filtered(&graph, vec![record("bad", bogus.clone()), record("good", real.clone())], true)
                .unwrap();
        assert_eq!(filtered.read_paths.len(), 1);
        assert_eq!(filtered.read_paths[0].path, real);

        let unfiltered =
            ReadPathIndex::build_filtered(&graph, vec![record("bad", bogus), record("good", real)], false).unwrap();
        assert_eq!(unfiltered.read_paths.len(), 2);
    }

    #[test]
    fn middle_index_finds_non_prefix_occurrence() {
        let graph = two_segment_graph();
        let a = graph.segment_ids()[0];
        let b = graph.segment_ids()[1];
        let path = Path::new(vec![
            OrientedSegment::new(a, Strand::Forward),
            OrientedSegment::new(b, Strand::Forward),
            OrientedSegment::new(a, Strand::Forward),
        ]);
        let index = ReadPathIndex::build(&graph, vec![record("r1", path.clone())]).unwrap();

        let middle = &path.as_slice()[1..2];
        let hits = index.middle_matches(middle);
        assert_eq!(hits.len(), 1);
        let continuation = index.continuation_after(&graph, &hits[0]);
        assert_eq!(continuation, path.as_slice()[2..].to_vec());
    }
}
