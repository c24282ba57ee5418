//! The BidirectedGraph adapter: a read-only capability surface over
//! whatever external graph a `GraphProvider` wraps, plus pure path algebra.
//!
//! `GraphProvider` is the external-collaborator interface; this
//! module never parses a graph itself (see `gfa_graph.rs` for a concrete
//! implementation) — it only adds path-algebra operations on top of one.

use std::sync::Arc;

use crate::error::{IsomerError, Result};
use crate::path::{OrientedSegment, Path, SegmentId};

/// Read-only access to an assembly graph's segments and adjacency. All
/// graph parsing and copy/depth estimation happens upstream of this trait.
pub trait GraphProvider: Send + Sync {
    /// All segment ids known to the graph, in a stable (construction) order.
    fn segment_ids(&self) -> &[SegmentId];

    fn segment_len(&self, seg: SegmentId) -> Result<u32>;

    fn segment_cov(&self, seg: SegmentId) -> Result<f64>;

    /// Oriented adjacencies off the end of `oriented` that a walk continues
    /// through when extending past it.
    fn neighbors(&self, oriented: OrientedSegment) -> Result<Vec<OrientedSegment>>;

    /// Human-readable name, used only for display/CLI output.
    fn segment_name(&self, seg: SegmentId) -> String;
}

/// Path-algebra operations over any `GraphProvider`.
#[derive(Clone)]
pub struct BidirectedGraph {
    provider: Arc<dyn GraphProvider>,
}

impl BidirectedGraph {
    pub fn new(provider: Arc<dyn GraphProvider>) -> Self {
        BidirectedGraph { provider }
    }

    pub fn provider(&self) -> &Arc<dyn GraphProvider> {
        &self.provider
    }

    pub fn segment_ids(&self) -> &[SegmentId] {
        self.provider.segment_ids()
    }

    pub fn num_segments(&self) -> usize {
        self.provider.segment_ids().len()
    }

    pub fn len(&self, seg: SegmentId) -> Result<u32> {
        self.provider.segment_len(seg)
    }

    pub fn cov(&self, seg: SegmentId) -> Result<f64> {
        self.provider.segment_cov(seg)
    }

    pub fn neighbors(&self, oriented: OrientedSegment) -> Result<Vec<OrientedSegment>> {
        self.provider.neighbors(oriented)
    }

    pub fn name(&self, seg: SegmentId) -> String {
        self.provider.segment_name(seg)
    }

    /// `reverse(p)`: reverse order and flip every strand.
    pub fn reverse_path(&self, p: &Path) -> Path {
        Path(p.0.iter().rev().map(|o| o.reverse()).collect())
    }

    /// `roll(p)`: if `p` is an exact repetition of a shorter unit, return that
    /// unit; otherwise return `p` unchanged. Naive O(L^2) scan — walks are
    /// short.
    pub fn roll_path(&self, p: &Path) -> Path {
        let n = p.len();
        if n == 0 {
            return p.clone();
        }
        for d in 1..n {
            if n % d == 0 && (d..n).all(|i| p.0[i] == p.0[i % d]) {
                return Path(p.0[0..d].to_vec());
            }
        }
        p.clone()
    }

    /// Among all rotations of `p` and of `reverse(p)`, the lexicographically
    /// smallest. Idempotent, and invariant under reversal.
    pub fn standardize_circular(&self, p: &Path) -> Path {
        let n = p.len();
        if n == 0 {
            return p.clone();
        }
        let rev = self.reverse_path(p);
        let mut best: Option<Vec<OrientedSegment>> = None;
        for base in [&p.0, &rev.0] {
            for start in 0..n {
                let mut rotated = Vec::with_capacity(n);
                rotated.extend_from_slice(&base[start..]);
                rotated.extend_from_slice(&base[..start]);
                if best.as_ref().map_or(true, |b| rotated < *b) {
                    best = Some(rotated);
                }
            }
        }
        Path(best.unwrap())
    }

    /// `min(p, reverse(p))` — canonical form for a *linear* walk (a read
    /// alignment), which is not subject to rotation the way a closed
    /// component path is (see `standardize_circular`).
    pub fn standardize_linear(&self, p: &Path) -> (Path, bool) {
        let rev = self.reverse_path(p);
        if rev.0 < p.0 {
            (rev, true)
        } else {
            (p.clone(), false)
        }
    }

    /// A path is circular iff its first oriented segment is reachable by
    /// extending past its last one — see DESIGN.md's Open Question log for
    /// why this reading was chosen over a more literal-but-inconsistent one.
    pub fn is_circular_path(&self, p: &Path) -> Result<bool> {
        if p.len() < 1 {
            return Ok(false);
        }
        let first = p.0[0];
        let last = p.0[p.len() - 1];
        Ok(self.neighbors(last)?.contains(&first))
    }

    /// True iff every graph segment appears at least once in `p`.
    pub fn is_fully_covered_by(&self, p: &Path) -> bool {
        let present: std::collections::HashSet<SegmentId> =
            p.0.iter().map(|o| o.segment).collect();
        self.provider
            .segment_ids()
            .iter()
            .all(|seg| present.contains(seg))
    }

    /// Sum of segment lengths along the walk (overlaps are not modeled in
    /// this data model).
    pub fn get_path_length(&self, p: &Path) -> Result<u64> {
        p.0.iter()
            .try_fold(0u64, |acc, o| Ok(acc + self.len(o.segment)? as u64))
    }

    /// Sum of segment lengths excluding the first and last oriented segment.
    pub fn get_path_internal_length(&self, p: &Path) -> Result<u64> {
        if p.len() <= 2 {
            return Ok(0);
        }
        p.0[1..p.len() - 1]
            .iter()
            .try_fold(0u64, |acc, o| Ok(acc + self.len(o.segment)? as u64))
    }

    /// `get_path_internal_length(suffix ++ sentinel)`, used by the traverser
    /// to test open-ended overlap windows without fabricating a segment for
    /// the sentinel: the sentinel is always excluded as the path's "last"
    /// element, so this is just the sum over `suffix[1..]`.
    pub fn internal_length_with_open_end(&self, suffix: &[OrientedSegment]) -> Result<u64> {
        if suffix.len() < 2 {
            return Ok(0);
        }
        suffix[1..]
            .iter()
            .try_fold(0u64, |acc, o| Ok(acc + self.len(o.segment)? as u64))
    }

    /// All consecutive transitions in `p` exist as edges (single-segment and
    /// empty paths are trivially contained).
    pub fn contain_path(&self, p: &Path) -> Result<bool> {
        for pair in p.0.windows(2) {
            if !self.neighbors(pair[0])?.contains(&pair[1]) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn repr_path(&self, p: &Path) -> String {
        p.0.iter()
            .map(|o| {
                let prefix = if o.strand.is_forward() { '>' } else { '<' };
                format!("{}{}", prefix, self.name(o.segment))
            })
            .collect()
    }

    pub fn check_path(&self, p: &Path) -> Result<()> {
        let known: std::collections::HashSet<SegmentId> =
            self.provider.segment_ids().iter().copied().collect();
        for o in &p.0 {
            if !known.contains(&o.segment) {
                return Err(IsomerError::UnknownSegment(o.segment));
            }
        }
        Ok(())
    }
}
