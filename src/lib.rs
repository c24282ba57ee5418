//! Heuristic path generation and sub-path likelihood machinery for
//! estimating relative isomer frequencies from long-read alignments to an
//! assembly graph.
//!
//! This crate stops at a deduplicated table of candidate component paths
//! and their observed sampling counts (`generator::GenerationReport`).
//! Turning those counts into a posterior over relative frequencies is a
//! separate, explicitly out-of-scope concern (a maximum-likelihood or MCMC
//! estimator consuming `components`, `components_counts`, `read_paths`, and
//! `contig_coverages`) that a caller wires up downstream of this crate.

pub mod coverage;
pub mod error;
pub mod gaf;
pub mod generator;
pub mod gfa_graph;
pub mod graph;
pub mod likelihood;
pub mod path;
pub mod read_index;
pub mod traverser;
