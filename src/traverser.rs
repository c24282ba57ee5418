//! The stochastic single-walk traversal engine.
//!
//! One call to `Traverser::traverse` produces one candidate component path.
//! At each step the walk is extended by consulting, in order: a roll-detected
//! repeat (closes the walk), read-alignment sub-path evidence (preferring
//! longer, start-anchored overlaps over shorter, middle-anchored ones), a
//! middle-subpath "jump" that replaces the walk outright when the tail is
//! only observed as an interior read substring, and finally bare graph
//! topology when no read evidence survives at all. Every proposed extension
//! passes through a multiplicity-likelihood contraction draw that may accept
//! only a prefix of it, or none.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::Rng;

use crate::coverage::CoverageModel;
use crate::error::Result;
use crate::graph::BidirectedGraph;
use crate::likelihood::{exp_from_log_ratio, MultiplicityLikelihood};
use crate::path::{OrientedSegment, Path};
use crate::read_index::{ReadPathIndex, SubpathHit};

/// Number of unique candidates sampled into the re-weighting pool in the
/// `!hetero_chromosome` branch of step 5 (§4.5).
const PROPOSAL_POOL_SIZE: usize = 10;

/// Tunable weighting parameters for one generation run. Names and defaults
/// follow §6's configuration table exactly.
#[derive(Debug, Clone, Copy)]
pub struct TraverserConfig {
    /// Exponent sharpening preference for candidates with more supporting
    /// read multiplicity.
    pub differ_f: f64,
    /// Multiplicative bonus applied per extra unit of overlap length —
    /// longer-overlap (i.e. more specific) read evidence dominates shorter.
    pub decay_f: f64,
    /// Cumulative raw-read-count cutoff: candidate collection across
    /// shrinking overlap windows stops once this many supporting reads have
    /// been seen.
    pub decay_t: f64,
    /// Coverage-inertia exponent blending coverage-proximity into candidate
    /// weighting (bare graph-topology fallback, and the hetero-chromosome
    /// branch of the read-evidence weighting).
    pub cov_inert: f64,
    /// Permissive mode: a walk need not cover every graph segment, and
    /// candidate weighting favors coverage proximity and a likelihood-panel
    /// vote instead of a pure multiplicity-likelihood softmax.
    pub hetero_chromosome: bool,
    /// Hard cap on extension steps per walk, guaranteeing termination even
    /// on a graph with no natural stopping point.
    pub max_extension_steps: usize,
}

impl Default for TraverserConfig {
    fn default() -> Self {
        TraverserConfig {
            differ_f: 1.0,
            decay_f: 20.0,
            decay_t: 1000.0,
            cov_inert: 1.0,
            hetero_chromosome: true,
            max_extension_steps: 10_000,
        }
    }
}

/// Draws a weighted choice from `items`, falling back to a uniform draw (and
/// a debug log, never an error) when the weights are non-positive or
/// non-finite — this crate's handling of the `NumericDegenerate` condition
/// (§7), which would otherwise make a weighted draw ill-defined.
fn weighted_choice<T: Clone>(rng: &mut StdRng, items: &[(T, f64)]) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    let total: f64 = items.iter().map(|(_, w)| w).sum();
    if !total.is_finite() || total <= 0.0 {
        log::debug!("numeric degeneracy in weighted choice; falling back to a uniform draw");
        let idx = rng.gen_range(0..items.len());
        return Some(items[idx].0.clone());
    }
    let mut draw = rng.gen::<f64>() * total;
    for (item, w) in items {
        if draw < *w {
            return Some(item.clone());
        }
        draw -= w;
    }
    items.last().map(|(item, _)| item.clone())
}

/// Softmax over raw (unnormalized) log-weights, shifted by the max before
/// exponentiating so large negative log-likelihoods never underflow to a
/// uniformly-zero weight vector.
fn softmax(log_weights: &[f64]) -> Vec<f64> {
    let max = log_weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return vec![1.0; log_weights.len()];
    }
    log_weights.iter().map(|w| (w - max).exp()).collect()
}

enum NextTail {
    /// The walk is replaced outright by a read path found only as an
    /// interior substring (step 3's middle-subpath jump).
    Replace(Path),
    /// A tail to append and contract (steps 2/4/5/6).
    Extend(Vec<OrientedSegment>),
    /// No candidate at all: dead end.
    DeadEnd,
}

pub struct Traverser<'g> {
    graph: &'g BidirectedGraph,
    index: &'g ReadPathIndex,
    config: TraverserConfig,
}

impl<'g> Traverser<'g> {
    pub fn new(graph: &'g BidirectedGraph, index: &'g ReadPathIndex, config: TraverserConfig) -> Self {
        Traverser { graph, index, config }
    }

    /// Picks a seed read path, weighted by the inverse of its multiplicity
    /// so that rare (and so more informative) reads are not crowded out by
    /// highly duplicated ones. Reversed with probability 1/2.
    fn seed(&self, rng: &mut StdRng) -> Option<Path> {
        let items: Vec<(Path, f64)> = self
            .index
            .read_paths
            .iter()
            .filter(|rp| !rp.path.is_empty())
            .map(|rp| (rp.path.clone(), 1.0 / rp.multiplicity.max(1) as f64))
            .collect();
        let chosen = weighted_choice(rng, &items)?;
        Some(if rng.gen_bool(0.5) {
            self.graph.reverse_path(&chosen)
        } else {
            chosen
        })
    }

    fn tail_representative_cov(&self, tail: &[OrientedSegment]) -> Result<f64> {
        match tail.first() {
            Some(first) => self.graph.cov(first.segment),
            None => Ok(0.0),
        }
    }

    /// Collects starting-suffix candidates across growing overlap windows
    /// `k = 1, 2, …` while the open-ended suffix still fits within
    /// `local_max_alignment_len` (step 2), weighting each hit's continuation
    /// by `counter^differ_f · decay_f^k`, and stopping once the cumulative
    /// raw supporting-read count reaches `decay_t`.
    fn starting_suffix_candidates(&self, path: &Path) -> HashMap<Vec<OrientedSegment>, f64> {
        let mut weights: HashMap<Vec<OrientedSegment>, f64> = HashMap::new();
        let mut cumulative_reads = 0.0f64;
        let mut k = 1;
        while k <= path.len() {
            let suffix = path.suffix(k);
            match self
                .graph
                .internal_length_with_open_end(suffix.as_slice())
            {
                Ok(len) if len < self.index.local_max_alignment_len => {}
                _ => break,
            }

            for hit in self.index.starting_matches(suffix.as_slice()) {
                let continuation = self.index.continuation_after(self.graph, hit);
                if continuation.is_empty() {
                    continue;
                }
                let support = self.index.multiplicity_of(hit) as f64;
                let bonus = support.powf(self.config.differ_f) * self.config.decay_f.powi(k as i32);
                *weights.entry(continuation).or_insert(0.0) += bonus;
                cumulative_reads += support;
            }

            if cumulative_reads >= self.config.decay_t {
                break;
            }
            k += 1;
        }
        weights
    }

    /// Step 3: if no starting-suffix candidate exists but the whole current
    /// walk occurs as an interior substring of some read, jump onto that
    /// read in full (oriented so its matched window aligns with `path`).
    fn middle_subpath_jump(&self, path: &Path, rng: &mut StdRng) -> Result<Option<Path>> {
        let hits = self.index.middle_matches(path.as_slice());
        if hits.is_empty() {
            return Ok(None);
        }
        let cov_model = CoverageModel::new(self.graph);
        let walk_mean = cov_model.mean(path, None).ok();

        let mut items: Vec<(&SubpathHit, f64)> = Vec::with_capacity(hits.len());
        for hit in hits {
            let mult = self.index.multiplicity_of(hit) as f64;
            let mut weight = mult.powf(self.config.differ_f);
            if self.config.cov_inert > 0.0 {
                if let Some(mean) = walk_mean {
                    let tail = self.index.continuation_after(self.graph, hit);
                    let tail_cov = self.tail_representative_cov(&tail)?;
                    if mean > 0.0 && tail_cov > 0.0 {
                        let inertia = (-((tail_cov / mean).ln().abs())).exp();
                        weight *= inertia.powf(self.config.cov_inert);
                    }
                }
            }
            items.push((hit, weight));
        }
        let Some(chosen) = weighted_choice(rng, &items) else {
            return Ok(None);
        };
        let full = self.index.oriented_read_path(self.graph, chosen);
        Ok(Some(full))
    }

    /// Step 4: bare graph-topology fallback when no read evidence supports
    /// any extension at all. Returns `None` only when the current end has no
    /// neighbors (a dead end the caller must handle by reversing or
    /// terminating).
    fn graph_extend_candidate(&self, path: &Path, rng: &mut StdRng) -> Result<Option<OrientedSegment>> {
        let Some(&last) = path.as_slice().last() else {
            return Ok(None);
        };
        let neighbors = self.graph.neighbors(last)?;
        if neighbors.is_empty() {
            return Ok(None);
        }
        if neighbors.len() == 1 {
            return Ok(Some(neighbors[0]));
        }

        let cov_model = CoverageModel::new(self.graph);
        let items: Vec<(OrientedSegment, f64)> = if !self.config.hetero_chromosome {
            let likelihood = MultiplicityLikelihood::new(self.graph);
            let log_weights: Vec<f64> = neighbors
                .iter()
                .map(|&candidate| {
                    likelihood
                        .cumulative_log_ratio(path, &[candidate])
                        .ok()
                        .and_then(|r| r.into_iter().last())
                        .unwrap_or(0.0)
                })
                .collect();
            neighbors.into_iter().zip(softmax(&log_weights)).collect()
        } else if self.config.cov_inert > 0.0 {
            let mean = cov_model.mean(path, None).unwrap_or(1.0).max(1e-9);
            neighbors
                .into_iter()
                .map(|candidate| {
                    let cov = self.graph.cov(candidate.segment).unwrap_or(mean);
                    let inertia = (-((cov / mean).ln().abs())).exp();
                    (candidate, inertia)
                })
                .collect()
        } else {
            neighbors.into_iter().map(|c| (c, 1.0)).collect()
        };
        Ok(weighted_choice(rng, &items))
    }

    /// Step 5: turns the flattened starting-suffix weight map into a single
    /// chosen tail. In `!hetero_chromosome` mode, draws a pool of
    /// `PROPOSAL_POOL_SIZE` candidates (with replacement) from the base
    /// weights, then re-weights each *unique* pool member by the maximum
    /// entry of its own multiplicity-likelihood ratio vector before the
    /// final draw; otherwise (hetero mode) applies the `cov_inert` inertia
    /// factor, or leaves weights as-is when `cov_inert == 0`.
    fn choose_subpath_tail(
        &self,
        path: &Path,
        candidates: HashMap<Vec<OrientedSegment>, f64>,
        rng: &mut StdRng,
    ) -> Option<Vec<OrientedSegment>> {
        let base: Vec<(Vec<OrientedSegment>, f64)> = candidates.into_iter().collect();
        if base.is_empty() {
            return None;
        }

        if !self.config.hetero_chromosome {
            let pool: Vec<Vec<OrientedSegment>> = (0..PROPOSAL_POOL_SIZE)
                .filter_map(|_| weighted_choice(rng, &base))
                .collect();
            let mut unique: HashMap<Vec<OrientedSegment>, usize> = HashMap::new();
            for tail in pool {
                *unique.entry(tail).or_insert(0) += 1;
            }
            if unique.is_empty() {
                return weighted_choice(rng, &base);
            }
            let likelihood = MultiplicityLikelihood::new(self.graph);
            let reweighted: Vec<(Vec<OrientedSegment>, f64)> = unique
                .into_keys()
                .map(|tail| {
                    let ratio_max = likelihood
                        .cumulative_log_ratio(path, &tail)
                        .ok()
                        .map(|ratios| ratios.into_iter().fold(f64::NEG_INFINITY, f64::max))
                        .filter(|r| r.is_finite())
                        .unwrap_or(0.0);
                    (tail, ratio_max.exp())
                })
                .collect();
            weighted_choice(rng, &reweighted)
        } else if self.config.cov_inert > 0.0 {
            let cov_model = CoverageModel::new(self.graph);
            let mean = cov_model.mean(path, None).unwrap_or(1.0).max(1e-9);
            let reweighted: Vec<(Vec<OrientedSegment>, f64)> = base
                .into_iter()
                .map(|(tail, w)| {
                    let tail_cov = self.tail_representative_cov(&tail).unwrap_or(mean);
                    let inertia = (-((tail_cov / mean).ln().abs())).exp();
                    (tail, w * inertia.powf(self.config.cov_inert))
                })
                .collect();
            weighted_choice(rng, &reweighted)
        } else {
            weighted_choice(rng, &base)
        }
    }

    /// Step 6 (contraction): given a proposed tail `e` and the current walk
    /// `path`, walks backward from a full acceptance down to nothing,
    /// accepting the longest prefix whose draw passes. Returns the accepted
    /// prefix length, or `None` if every prefix (including the empty one)
    /// was rejected.
    fn contract(&self, path: &Path, tail: &[OrientedSegment], rng: &mut StdRng) -> Result<Option<usize>> {
        if tail.is_empty() {
            return Ok(None);
        }
        // Shortcut: a segment brand new to `path` needs no likelihood check.
        let existing = path.segment_counts();
        if tail.iter().any(|o| !existing.contains_key(&o.segment)) {
            return Ok(Some(tail.len()));
        }

        let likelihood = MultiplicityLikelihood::new(self.graph);
        let ratios = likelihood.cumulative_log_ratio(path, tail)?;
        let m = ratios.len();
        // L[i] is §4.5 step 6's non-log cumulative likelihood-ratio: the raw
        // `exp()` of the length-normalised log-ratio, unbounded above.
        let l: Vec<f64> = ratios.iter().map(|&r| exp_from_log_ratio(r)).collect();

        for i in (1..=m).rev() {
            let l_next = if i == m { 0.0 } else { l[i] };
            let denom = 1.0 - l_next;
            let draw = if denom.abs() < 1e-12 {
                l[i - 1]
            } else {
                (l[i - 1] - l_next) / denom
            };
            if draw.is_finite() && draw > rng.gen::<f64>() {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    fn next_tail(&self, path: &Path, rng: &mut StdRng) -> Result<NextTail> {
        let starting = self.starting_suffix_candidates(path);
        if !starting.is_empty() {
            return match self.choose_subpath_tail(path, starting, rng) {
                Some(tail) => Ok(NextTail::Extend(tail)),
                None => Ok(NextTail::DeadEnd),
            };
        }

        if let Some(replacement) = self.middle_subpath_jump(path, rng)? {
            return Ok(NextTail::Replace(replacement));
        }

        match self.graph_extend_candidate(path, rng)? {
            Some(candidate) => Ok(NextTail::Extend(vec![candidate])),
            None => Ok(NextTail::DeadEnd),
        }
    }

    /// Runs a single stochastic walk to completion. `None` only when there
    /// are no read paths to seed from.
    pub fn traverse(&self, rng: &mut StdRng) -> Result<Option<Path>> {
        let Some(mut path) = self.seed(rng) else {
            return Ok(None);
        };
        let mut reversed = false;

        for _ in 0..self.config.max_extension_steps {
            let rolled = self.graph.roll_path(&path);
            if rolled.len() < path.len()
                && self.graph.get_path_internal_length(&path)? >= self.index.local_max_alignment_len
            {
                return Ok(Some(rolled));
            }

            match self.next_tail(&path, rng)? {
                NextTail::Replace(new_path) => {
                    path = new_path;
                    continue;
                }
                NextTail::DeadEnd => {
                    if !reversed {
                        path = self.graph.reverse_path(&path);
                        reversed = true;
                        continue;
                    }
                    return Ok(Some(path));
                }
                NextTail::Extend(tail) => match self.contract(&path, &tail, rng)? {
                    Some(accepted_len) => {
                        path.extend(tail.into_iter().take(accepted_len));
                    }
                    None => {
                        if !reversed {
                            path = self.graph.reverse_path(&path);
                            reversed = true;
                            continue;
                        }
                        return Ok(Some(path));
                    }
                },
            }
        }

        Ok(Some(path))
    }
}
