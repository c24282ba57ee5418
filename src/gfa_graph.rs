//! A `GraphProvider` backed by a parsed GFA file.
//!
//! Copy/depth estimation is explicitly out of scope: segment
//! coverage is read verbatim from one of, in order of preference, a `--depth`
//! TSV, a SPAdes-style `_cov_<float>` suffix on the segment name, or a
//! logged default of `1.0`. This crate never re-derives coverage from the
//! assembly graph itself.

use std::collections::HashMap;
use std::path::Path as FsPath;

use gfa::gfa::{Orientation, GFA};
use gfa::parser::GFAParser;

use crate::error::{IsomerError, Result};
use crate::graph::GraphProvider;
use crate::path::{OrientedSegment, SegmentId, Strand};

fn orientation_to_strand(o: Orientation) -> Strand {
    match o {
        Orientation::Forward => Strand::Forward,
        Orientation::Backward => Strand::Reverse,
    }
}

/// Parses a `_cov_<float>` (or `_cov<float>`) suffix out of a SPAdes-style
/// contig name, e.g. `NODE_12_length_5021_cov_34.81`.
fn parse_spades_cov_suffix(name: &str) -> Option<f64> {
    let idx = name.rfind("cov_")?;
    name[idx + 4..]
        .trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.')
        .parse::<f64>()
        .ok()
}

/// A `GraphProvider` over a GFA file's segments and links.
pub struct GfaGraph {
    ids: Vec<SegmentId>,
    names: Vec<Vec<u8>>,
    name_to_id: HashMap<Vec<u8>, SegmentId>,
    lengths: Vec<u32>,
    coverages: Vec<f64>,
    adjacency: HashMap<(SegmentId, Strand), Vec<OrientedSegment>>,
}

impl GfaGraph {
    pub fn load(
        gfa_path: impl AsRef<FsPath>,
        depth_table: Option<&HashMap<String, f64>>,
    ) -> Result<Self> {
        let parser = GFAParser::new();
        let gfa: GFA<Vec<u8>, ()> = parser
            .parse_file(gfa_path.as_ref())
            .map_err(|e| IsomerError::GfaParse(e.to_string()))?;
        Ok(Self::from_gfa(&gfa, depth_table))
    }

    pub fn from_gfa(gfa: &GFA<Vec<u8>, ()>, depth_table: Option<&HashMap<String, f64>>) -> Self {
        let mut names = Vec::with_capacity(gfa.segments.len());
        let mut name_to_id = HashMap::with_capacity(gfa.segments.len());
        let mut lengths = Vec::with_capacity(gfa.segments.len());
        let mut coverages = Vec::with_capacity(gfa.segments.len());
        let mut ids = Vec::with_capacity(gfa.segments.len());

        for segment in &gfa.segments {
            let id = SegmentId::from_index(names.len());
            let name_str = String::from_utf8_lossy(&segment.name).into_owned();

            let cov = depth_table
                .and_then(|table| table.get(&name_str))
                .copied()
                .or_else(|| parse_spades_cov_suffix(&name_str))
                .unwrap_or_else(|| {
                    log::warn!(
                        "no coverage source for segment {name_str:?}; defaulting to 1.0"
                    );
                    1.0
                });

            ids.push(id);
            name_to_id.insert(segment.name.clone(), id);
            names.push(segment.name.clone());
            lengths.push(segment.sequence.len() as u32);
            coverages.push(cov);
        }

        let mut adjacency: HashMap<(SegmentId, Strand), Vec<OrientedSegment>> = HashMap::new();
        for link in &gfa.links {
            let (Some(&from), Some(&to)) = (
                name_to_id.get(&link.from_segment),
                name_to_id.get(&link.to_segment),
            ) else {
                continue;
            };
            let from_strand = orientation_to_strand(link.from_orient);
            let to_strand = orientation_to_strand(link.to_orient);

            adjacency
                .entry((from, from_strand))
                .or_default()
                .push(OrientedSegment::new(to, to_strand));
            adjacency
                .entry((to, to_strand.flip()))
                .or_default()
                .push(OrientedSegment::new(from, from_strand.flip()));
        }

        GfaGraph {
            ids,
            names,
            name_to_id,
            lengths,
            coverages,
            adjacency,
        }
    }

    pub fn segment_id_by_name(&self, name: &[u8]) -> Option<SegmentId> {
        self.name_to_id.get(name).copied()
    }
}

impl GraphProvider for GfaGraph {
    fn segment_ids(&self) -> &[SegmentId] {
        &self.ids
    }

    fn segment_len(&self, seg: SegmentId) -> Result<u32> {
        self.lengths
            .get(seg.index())
            .copied()
            .ok_or(IsomerError::UnknownSegment(seg))
    }

    fn segment_cov(&self, seg: SegmentId) -> Result<f64> {
        self.coverages
            .get(seg.index())
            .copied()
            .ok_or(IsomerError::UnknownSegment(seg))
    }

    fn neighbors(&self, oriented: OrientedSegment) -> Result<Vec<OrientedSegment>> {
        if oriented.segment.index() >= self.ids.len() {
            return Err(IsomerError::UnknownSegment(oriented.segment));
        }
        Ok(self
            .adjacency
            .get(&(oriented.segment, oriented.strand))
            .cloned()
            .unwrap_or_default())
    }

    fn segment_name(&self, seg: SegmentId) -> String {
        self.names
            .get(seg.index())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_else(|| seg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spades_cov_suffix_parses() {
        assert_eq!(
            parse_spades_cov_suffix("NODE_12_length_5021_cov_34.81"),
            Some(34.81)
        );
        assert_eq!(parse_spades_cov_suffix("plain_segment"), None);
    }

    #[test]
    fn links_build_symmetric_mirrored_adjacency() {
        let dir = std::env::temp_dir();
        let path = dir.join("isomer_weaver_test_links.gfa");
        std::fs::write(
            &path,
            b"H\tVN:Z:1.0\nS\tA\tAAAA\nS\tB\tGGGG\nL\tA\t+\tB\t+\t0M\n",
        )
        .unwrap();
        let graph = GfaGraph::load(&path, None).unwrap();
        std::fs::remove_file(&path).ok();
        let a = graph.segment_id_by_name(b"A").unwrap();
        let b = graph.segment_id_by_name(b"B").unwrap();

        let fwd = graph
            .neighbors(OrientedSegment::new(a, Strand::Forward))
            .unwrap();
        assert_eq!(fwd, vec![OrientedSegment::new(b, Strand::Forward)]);

        let mirrored = graph
            .neighbors(OrientedSegment::new(b, Strand::Reverse))
            .unwrap();
        assert_eq!(mirrored, vec![OrientedSegment::new(a, Strand::Reverse)]);
    }
}
