//! Scoring a candidate extension against the current walk's
//! multiplicity (copy-number) model.
//!
//! Per segment `s` with coverage `C_s`, a presumed in-walk copy count `c`
//! under the walk's current `(mean, std)`, and a single-copy baseline
//! `(mean_sc, std_sc)` restricted to the walk's rarest-multiplicity
//! segments, the model scores how much more (or less) likely `C_s` is under
//! a candidate new count `c+1` than under `c`:
//!
//! ```text
//! old_ll(s, c)   = N_logpdf(C_s; c·mean,     std)    + [c>0] · N_logpdf(C_s/c;     mean_sc, std_sc)
//! new_ll(s, c+1) = N_logpdf(C_s; (c+1)·mean, std')   + [c+1>0] · N_logpdf(C_s/(c+1), mean_sc', std_sc')
//! ```
//!
//! `mean`/`std`/`mean_sc`/`std_sc` are recomputed after each prefix step, so
//! they reflect the walk as extended through that step, not the original
//! walk alone.

use crate::coverage::CoverageModel;
use crate::error::Result;
use crate::graph::BidirectedGraph;
use crate::path::{OrientedSegment, Path};

fn normal_log_pdf(x: f64, mean: f64, std: f64) -> f64 {
    let z = (x - mean) / std;
    -0.5 * z * z - std.ln() - 0.5 * (2.0 * std::f64::consts::PI).ln()
}

/// The non-log cumulative likelihood-ratio value §4.5 step 6 calls `L[i]`:
/// the literal `exp()` of a length-normalised log-ratio, not a sigmoid —
/// unlike a logistic transform this is unbounded above (`exp(x) > 1`
/// whenever `x > 0`), which is what lets a genuinely better-fitting
/// extension dominate a merely plausible one in `Traverser::contract`'s
/// draw formula. `f64` comfortably covers the dynamic range a
/// length-normalised ratio produces in practice; callers needing the
/// extra headroom spec.md's §4.4/§9 note mentions can max-shift a whole
/// prefix vector before exponentiating, the log-sum-exp-style alternative
/// the spec explicitly sanctions.
pub fn exp_from_log_ratio(log_ratio: f64) -> f64 {
    log_ratio.exp()
}

/// Fallback standard deviation when a walk is too small (fewer than two
/// distinct segments) for `CoverageModel::std`/`std_single_copy` to return
/// one. The exact value doesn't matter much — it only widens or narrows the
/// Gaussian until more segments are observed — so a nominal unit std is used.
const FALLBACK_STD: f64 = 1.0;
const MIN_STD: f64 = 1e-6;

/// Gaussian multiplicity model over per-contig coverage, scored against a
/// walk's own coverage statistics.
pub struct MultiplicityLikelihood<'g> {
    graph: &'g BidirectedGraph,
}

impl<'g> MultiplicityLikelihood<'g> {
    pub fn new(graph: &'g BidirectedGraph) -> Self {
        MultiplicityLikelihood { graph }
    }

    fn segment_log_ratio(
        &self,
        cov: f64,
        old_count: usize,
        old_mean: f64,
        old_std: f64,
        old_sc_mean: f64,
        old_sc_std: f64,
        new_count: usize,
        new_mean: f64,
        new_std: f64,
        new_sc_mean: f64,
        new_sc_std: f64,
    ) -> f64 {
        let mut old_ll = normal_log_pdf(cov, old_count as f64 * old_mean, old_std.max(MIN_STD));
        if old_count > 0 {
            old_ll += normal_log_pdf(cov / old_count as f64, old_sc_mean, old_sc_std.max(MIN_STD));
        }
        let mut new_ll = normal_log_pdf(cov, new_count as f64 * new_mean, new_std.max(MIN_STD));
        if new_count > 0 {
            new_ll += normal_log_pdf(cov / new_count as f64, new_sc_mean, new_sc_std.max(MIN_STD));
        }
        new_ll - old_ll
    }

    /// Per-prefix cumulative, length-normalised log-likelihood ratio of
    /// extending `path` by `extension`: `ratios[i]` is the accumulated
    /// log-ratio over `extension[..=i]` divided by the accumulated length
    /// over that same prefix, so ratios are comparable across extensions of
    /// different lengths (§8 invariant 6: magnitude does not grow with
    /// extension length).
    pub fn cumulative_log_ratio(&self, path: &Path, extension: &[OrientedSegment]) -> Result<Vec<f64>> {
        let cov_model = CoverageModel::new(self.graph);
        let mut extended = path.clone();
        let mut ratios = Vec::with_capacity(extension.len());
        let mut acc_ratio = 0.0f64;
        let mut acc_length = 0.0f64;

        for oriented in extension {
            let old_counts = extended.segment_counts();
            let old_count = old_counts.get(&oriented.segment).copied().unwrap_or(0);
            let old_mean = cov_model.mean(&extended, None)?;
            let old_std = cov_model.std(&extended, None)?.unwrap_or(FALLBACK_STD);
            let old_sc_mean = cov_model.mean_single_copy(&extended, None)?;
            let old_sc_std = cov_model.std_single_copy(&extended, None)?.unwrap_or(FALLBACK_STD);

            extended.push(*oriented);
            let new_count = old_count + 1;
            let new_mean = cov_model.mean(&extended, None)?;
            let new_std = cov_model.std(&extended, None)?.unwrap_or(FALLBACK_STD);
            let new_sc_mean = cov_model.mean_single_copy(&extended, None)?;
            let new_sc_std = cov_model.std_single_copy(&extended, None)?.unwrap_or(FALLBACK_STD);

            let length = self.graph.len(oriented.segment)? as f64;
            let cov = self.graph.cov(oriented.segment)?;
            let delta = self.segment_log_ratio(
                cov, old_count, old_mean, old_std, old_sc_mean, old_sc_std, new_count, new_mean,
                new_std, new_sc_mean, new_sc_std,
            );

            acc_ratio += length * delta;
            acc_length += length;
            ratios.push(if acc_length > 0.0 {
                acc_ratio / acc_length
            } else {
                0.0
            });
        }
        Ok(ratios)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfa_graph::GfaGraph;
    use crate::path::{OrientedSegment, Strand};
    use approx::assert_relative_eq;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn graph_with_cov(names_lens_covs: &[(&str, u32, f64)]) -> BidirectedGraph {
        let dir = std::env::temp_dir();
        let path = dir.join("isomer_weaver_test_likelihood.gfa");
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
    fn exp_from_log_ratio_is_unbounded_above_and_monotone() {
        assert!(exp_from_log_ratio(1000.0) > 1.0);
        assert!(exp_from_log_ratio(-1000.0) >= 0.0);
        assert!(exp_from_log_ratio(1.0) > exp_from_log_ratio(-1.0));
        assert_relative_eq!(exp_from_log_ratio(0.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn normal_log_pdf_peaks_at_mean() {
        assert!(normal_log_pdf(10.0, 10.0, 2.0) > normal_log_pdf(15.0, 10.0, 2.0));
        assert!(normal_log_pdf(10.0, 10.0, 2.0) > normal_log_pdf(5.0, 10.0, 2.0));
    }

    #[test]
    fn extension_matching_coverage_scores_higher_than_a_mismatch() {
        // A two-copy walk of A (coverage 20, so ~10/copy) extended by a
        // third A pushes its presumed per-copy coverage to ~6.7 — a worse
        // fit than a same-coverage extension of an already-single-copy B.
        let graph = graph_with_cov(&[("A", 10, 20.0), ("B", 10, 10.0)]);
        let a = graph.segment_ids()[0];
        let b = graph.segment_ids()[1];
        let path = Path::new(vec![
            OrientedSegment::new(a, Strand::Forward),
            OrientedSegment::new(a, Strand::Forward),
            OrientedSegment::new(b, Strand::Forward),
        ]);
        let model = MultiplicityLikelihood::new(&graph);

        let extend_a = [OrientedSegment::new(a, Strand::Forward)];
        let extend_b = [OrientedSegment::new(b, Strand::Forward)];
        let ratio_a = *model.cumulative_log_ratio(&path, &extend_a).unwrap().last().unwrap();
        let ratio_b = *model.cumulative_log_ratio(&path, &extend_b).unwrap().last().unwrap();
        assert!(ratio_b > ratio_a);
    }

    #[test]
    fn ratios_are_finite_for_a_short_walk() {
        let graph = graph_with_cov(&[("A", 10, 20.0)]);
        let a = graph.segment_ids()[0];
        let path = Path::new(vec![OrientedSegment::new(a, Strand::Forward)]);
        let model = MultiplicityLikelihood::new(&graph);
        let extend = [OrientedSegment::new(a, Strand::Forward)];
        let ratios = model.cumulative_log_ratio(&path, &extend).unwrap();
        assert!(ratios.iter().all(|r| r.is_finite()));
    }
}
