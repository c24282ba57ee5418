//! Coverage-per-copy statistics over a walk, length-weighted across
//! the walk's distinct segments. Used by `MultiplicityLikelihood` as the
//! reference distribution a candidate extension is scored against.

use std::collections::HashMap;

use crate::error::{IsomerError, Result};
use crate::graph::BidirectedGraph;
use crate::path::{Path, SegmentId};

/// Per-segment occurrence counts within a walk, i.e. the walk's presumed
/// copy number for each segment it touches.
pub fn multiplicities(path: &Path) -> HashMap<SegmentId, usize> {
    path.segment_counts()
}

/// Length-weighted coverage-per-copy statistics over a walk.
pub struct CoverageModel<'g> {
    graph: &'g BidirectedGraph,
}

impl<'g> CoverageModel<'g> {
    pub fn new(graph: &'g BidirectedGraph) -> Self {
        CoverageModel { graph }
    }

    /// Per-unique-segment `(length, coverage / copy_count)` samples, with any
    /// `exclude` counts subtracted from each segment's occurrence count
    /// before the per-copy value is computed.
    fn samples(
        &self,
        path: &Path,
        exclude: Option<&HashMap<SegmentId, usize>>,
    ) -> Result<Vec<(f64, f64)>> {
        if path.is_empty() {
            return Err(IsomerError::EmptyPath);
        }
        let counts = multiplicities(path);
        let mut out = Vec::with_capacity(counts.len());
        for (&segment, &available) in &counts {
            let excluded = exclude.and_then(|e| e.get(&segment)).copied().unwrap_or(0);
            if excluded > available {
                return Err(IsomerError::CoverageExclusionInvalid {
                    segment,
                    excluded,
                    available,
                });
            }
            let remaining = available - excluded;
            if remaining == 0 {
                continue;
            }
            let length = self.graph.len(segment)? as f64;
            let cov = self.graph.cov(segment)?;
            out.push((length, cov / remaining as f64));
        }
        Ok(out)
    }

    /// Length-weighted mean of coverage-per-copy across `path`'s distinct
    /// segments.
    pub fn mean(&self, path: &Path, exclude: Option<&HashMap<SegmentId, usize>>) -> Result<f64> {
        let samples = self.samples(path, exclude)?;
        Ok(weighted_mean(&samples))
    }

    /// Length-weighted standard deviation of coverage-per-copy, `None` when
    /// fewer than two distinct segments contribute.
    pub fn std(
        &self,
        path: &Path,
        exclude: Option<&HashMap<SegmentId, usize>>,
    ) -> Result<Option<f64>> {
        let samples = self.samples(path, exclude)?;
        Ok(weighted_std(&samples))
    }

    /// Per-segment occurrence counts after `exclude` is subtracted, keeping
    /// only segments that remain present at all. Shared by the single-copy
    /// accessors to find the walk's *minimum* surviving multiplicity — the
    /// model's single-copy baseline is "whatever count is rarest in this
    /// walk", not literally count-one, since a walk can consist entirely of
    /// segments repeated twice or more.
    fn post_exclusion_counts(
        &self,
        path: &Path,
        exclude: Option<&HashMap<SegmentId, usize>>,
    ) -> Result<HashMap<SegmentId, usize>> {
        let counts = multiplicities(path);
        let mut out = HashMap::with_capacity(counts.len());
        for (&segment, &available) in &counts {
            let excluded = exclude.and_then(|e| e.get(&segment)).copied().unwrap_or(0);
            if excluded > available {
                return Err(IsomerError::CoverageExclusionInvalid {
                    segment,
                    excluded,
                    available,
                });
            }
            let remaining = available - excluded;
            if remaining > 0 {
                out.insert(segment, remaining);
            }
        }
        Ok(out)
    }

    fn single_copy_samples(
        &self,
        path: &Path,
        exclude: Option<&HashMap<SegmentId, usize>>,
    ) -> Result<Vec<(f64, f64)>> {
        if path.is_empty() {
            return Err(IsomerError::EmptyPath);
        }
        let counts = self.post_exclusion_counts(path, exclude)?;
        let Some(&min_count) = counts.values().min() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for (&segment, &count) in &counts {
            if count != min_count {
                continue;
            }
            let length = self.graph.len(segment)? as f64;
            let cov = self.graph.cov(segment)?;
            out.push((length, cov));
        }
        Ok(out)
    }

    /// The length-weighted coverage average among segments that achieve
    /// `path`'s *minimum* occurrence count (after exclusion) — the model's
    /// estimate of "what a single copy looks like in this walk".
    pub fn mean_single_copy(
        &self,
        path: &Path,
        exclude: Option<&HashMap<SegmentId, usize>>,
    ) -> Result<f64> {
        Ok(weighted_mean(&self.single_copy_samples(path, exclude)?))
    }

    pub fn std_single_copy(
        &self,
        path: &Path,
        exclude: Option<&HashMap<SegmentId, usize>>,
    ) -> Result<Option<f64>> {
        Ok(weighted_std(&self.single_copy_samples(path, exclude)?))
    }
}

fn weighted_mean(samples: &[(f64, f64)]) -> f64 {
    let total_weight: f64 = samples.iter().map(|(w, _)| w).sum();
    if total_weight == 0.0 {
        return 0.0;
    }
    samples.iter().map(|(w, v)| w * v).sum::<f64>() / total_weight
}

fn weighted_std(samples: &[(f64, f64)]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let mean = weighted_mean(samples);
    let total_weight: f64 = samples.iter().map(|(w, _)| w).sum();
    if total_weight == 0.0 {
        return None;
    }
    let variance = samples
        .iter()
        .map(|(w, v)| w * (v - mean).powi(2))
        .sum::<f64>()
        / total_weight;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfa_graph::GfaGraph;
    use crate::path::{OrientedSegment, Strand};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn graph_with_cov(names_lens_covs: &[(&str, u32, f64)]) -> BidirectedGraph {
        let dir = std::env::temp_dir();
        let path = dir.join("isomer_weaver_test_coverage.gfa");
        let mut gfa_text = String::from("H\tVN:Z:1.0\n");
        let mut depth = HashMap::new();
        for (name, len, cov) in names_lens_covs {
            gfa_text.push_str(&format!(
                "S\t{name}\t{}\tLN:i:{len}\n",
                "A".repeat(*len as usize)
            ));
            depth.insert(name.to_string(), *cov);
        }
        std::fs::write(&path, gfa_text).unwrap();
        let gfa = GfaGraph::load(&path, Some(&depth)).unwrap();
        std::fs::remove_file(&path).ok();
        BidirectedGraph::new(Arc::new(gfa))
    }

    #[test]
    fn mean_divides_by_walk_multiplicity() {
        let graph = graph_with_cov(&[("A", 10, 20.0), ("B", 10, 10.0)]);
        let a = graph.segment_ids()[0];
        let b = graph.segment_ids()[1];
        // A appears twice in the walk: per-copy coverage is 10, not 20.
        let path = Path::new(vec![
            OrientedSegment::new(a, Strand::Forward),
            OrientedSegment::new(b, Strand::Forward),
            OrientedSegment::new(a, Strand::Forward),
        ]);
        let model = CoverageModel::new(&graph);
        let mean = model.mean(&path, None).unwrap();
        assert_relative_eq!(mean, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn single_copy_mean_ignores_repeated_segments() {
        let graph = graph_with_cov(&[("A", 10, 20.0), ("B", 10, 10.0)]);
        let a = graph.segment_ids()[0];
        let b = graph.segment_ids()[1];
        let path = Path::new(vec![
            OrientedSegment::new(a, Strand::Forward),
            OrientedSegment::new(b, Strand::Forward),
            OrientedSegment::new(a, Strand::Forward),
        ]);
        let model = CoverageModel::new(&graph);
        let mean = model.mean_single_copy(&path, None).unwrap();
        assert_relative_eq!(mean, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn single_copy_mean_falls_back_to_minimum_multiplicity() {
        // Every segment in this walk occurs twice: "single copy" is
        // ill-defined literally, so the minimum multiplicity (2) is used.
        let graph = graph_with_cov(&[("A", 10, 20.0), ("B", 10, 40.0)]);
        let a = graph.segment_ids()[0];
        let b = graph.segment_ids()[1];
        let path = Path::new(vec![
            OrientedSegment::new(a, Strand::Forward),
            OrientedSegment::new(b, Strand::Forward),
            OrientedSegment::new(a, Strand::Forward),
            OrientedSegment::new(b, Strand::Forward),
        ]);
        let model = CoverageModel::new(&graph);
        // cov/count for both A and B is 10.0 at multiplicity 2.
        let mean = model.mean_single_copy(&path, None).unwrap();
        assert_relative_eq!(mean, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn exclusion_beyond_available_errors() {
        let graph = graph_with_cov(&[("A", 10, 20.0)]);
        let a = graph.segment_ids()[0];
        let path = Path::new(vec![OrientedSegment::new(a, Strand::Forward)]);
        let mut exclude = HashMap::new();
        exclude.insert(a, 5);
        let model = CoverageModel::new(&graph);
        assert!(matches!(
            model.mean(&path, Some(&exclude)),
            Err(IsomerError::CoverageExclusionInvalid { .. })
        ));
    }

    #[test]
    fn empty_path_errors() {
        let graph = graph_with_cov(&[("A", 10, 20.0)]);
        let model = CoverageModel::new(&graph);
        assert!(matches!(
            model.mean(&Path::empty(), None),
            Err(IsomerError::EmptyPath)
        ));
    }
}
