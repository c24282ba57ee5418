//! A GAF-backed `AlignmentProvider`.
//!
//! Hand-rolled, byte-level column parser rather than `gfa::gafpaf`: the only
//! thing this crate needs out of a GAF record is its path string and a
//! handful of scalar columns, and writing the parser directly keeps this
//! adapter's surface to exactly the fields `GraphAlignRecords.GAFRecord`
//! reads, with no guesswork about an external crate's field names.

use std::collections::HashMap;
use std::path::Path as FsPath;

use bstr::ByteSlice;

use crate::error::{IsomerError, Result};
use crate::graph::GraphProvider;
use crate::path::{OrientedSegment, Path, SegmentId, Strand};

/// One alignment of a single long read against the assembly graph.
#[derive(Debug, Clone)]
pub struct AlignmentRecord {
    pub query_name: String,
    pub path: Path,
    pub p_align_len: u64,
    pub num_match: u64,
    pub align_len: u64,
    pub identity: f64,
}

impl AlignmentRecord {
    fn identity(num_match: u64, align_len: u64, tag_identity: Option<f64>) -> f64 {
        tag_identity.unwrap_or_else(|| {
            if align_len == 0 {
                0.0
            } else {
                num_match as f64 / align_len as f64
            }
        })
    }
}

/// Parses a GAF path string (`>seg1<seg2seg3`) into oriented segments.
/// A segment token with no leading `>`/`<` is read as forward-oriented,
/// matching `GAFRecord.parse_gaf_path`'s implicit-forward behavior.
fn parse_path_str(path_str: &str, resolve: &impl Fn(&str) -> Option<SegmentId>) -> Option<Path> {
    let mut out = Vec::new();
    let mut strand = Strand::Forward;
    let mut name = String::new();

    let flush = |name: &mut String, strand: Strand, out: &mut Vec<OrientedSegment>| -> Option<()> {
        if name.is_empty() {
            return Some(());
        }
        let id = resolve(name)?;
        out.push(OrientedSegment::new(id, strand));
        name.clear();
        Some(())
    };

    for ch in path_str.chars() {
        match ch {
            '>' => {
                flush(&mut name, strand, &mut out)?;
                strand = Strand::Forward;
            }
            '<' => {
                flush(&mut name, strand, &mut out)?;
                strand = Strand::Reverse;
            }
            c => name.push(c),
        }
    }
    flush(&mut name, strand, &mut out)?;
    Some(Path::new(out))
}

fn parse_tag_f64(field: &str, tag: &str) -> Option<f64> {
    let rest = field.strip_prefix(tag)?.strip_prefix(":f:")?;
    rest.parse::<f64>().ok()
}

fn parse_record(
    line: &[u8],
    resolve: &impl Fn(&str) -> Option<SegmentId>,
) -> std::result::Result<Option<AlignmentRecord>, String> {
    let line = line.trim_end();
    if line.is_empty() {
        return Ok(None);
    }
    let cols: Vec<&[u8]> = line.split(|&b| b == b'\t').collect();
    if cols.len() < 12 {
        return Err(format!("expected at least 12 columns, got {}", cols.len()));
    }

    let query_name = cols[0].to_str_lossy().into_owned();
    let path_str = cols[5].to_str_lossy().into_owned();
    let num_match: u64 = cols[9]
        .to_str_lossy()
        .parse()
        .map_err(|_| "column 10 (num_match) is not an integer".to_string())?;
    let align_len: u64 = cols[10]
        .to_str_lossy()
        .parse()
        .map_err(|_| "column 11 (align_len) is not an integer".to_string())?;
    let p_start: u64 = cols[7]
        .to_str_lossy()
        .parse()
        .map_err(|_| "column 8 (path_start) is not an integer".to_string())?;
    let p_end: u64 = cols[8]
        .to_str_lossy()
        .parse()
        .map_err(|_| "column 9 (path_end) is not an integer".to_string())?;

    let tag_identity = cols[12..]
        .iter()
        .find_map(|f| parse_tag_f64(&f.to_str_lossy(), "id"));

    let path = match parse_path_str(&path_str, resolve) {
        Some(p) => p,
        None => return Ok(None),
    };

    Ok(Some(AlignmentRecord {
        query_name,
        path,
        p_align_len: p_end.saturating_sub(p_start),
        num_match,
        align_len,
        identity: AlignmentRecord::identity(num_match, align_len, tag_identity),
    }))
}

/// External-collaborator trait over a set of read alignments.
pub trait AlignmentProvider: Send + Sync {
    fn records(&self) -> &[AlignmentRecord];
}

/// A `AlignmentProvider` loaded from a GAF file, filtered by minimum aligned
/// path length and minimum identity (`GraphAlignRecords`'s filters).
pub struct GafAlignments {
    records: Vec<AlignmentRecord>,
}

impl GafAlignments {
    pub fn load(
        gaf_path: impl AsRef<FsPath>,
        graph: &dyn GraphProvider,
        min_aligned_path_len: u64,
        min_align_len: u64,
        min_identity: f64,
    ) -> Result<Self> {
        let name_to_id: HashMap<String, SegmentId> = graph
            .segment_ids()
            .iter()
            .map(|&id| (graph.segment_name(id), id))
            .collect();
        let resolve = |name: &str| name_to_id.get(name).copied();

        let bytes = std::fs::read(gaf_path.as_ref())?;
        let mut records = Vec::new();
        for (line_no, line) in bytes.split(|&b| b == b'\n').enumerate() {
            let parsed = parse_record(line, &resolve).map_err(|reason| IsomerError::GafParse {
                line: line_no + 1,
                reason,
            })?;
            let Some(record) = parsed else {
                continue;
            };
            if record.p_align_len < min_aligned_path_len {
                continue;
            }
            if record.align_len < min_align_len {
                continue;
            }
            if record.identity < min_identity {
                continue;
            }
            records.push(record);
        }
        Ok(GafAlignments { records })
    }

    pub fn from_records(records: Vec<AlignmentRecord>) -> Self {
        GafAlignments { records }
    }
}

impl AlignmentProvider for GafAlignments {
    fn records(&self) -> &[AlignmentRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn resolver(names: &[&str]) -> impl Fn(&str) -> Option<SegmentId> {
        let map: Map<String, SegmentId> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.to_string(), SegmentId::from_index(i)))
            .collect();
        move |name: &str| map.get(name).copied()
    }

    #[test]
    fn parses_mixed_orientation_path() {
        let resolve = resolver(&["s1", "s2", "s3"]);
        let path = parse_path_str(">s1<s2>s3", &resolve).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.as_slice()[0].strand, Strand::Forward);
        assert_eq!(path.as_slice()[1].strand, Strand::Reverse);
        assert_eq!(path.as_slice()[2].strand, Strand::Forward);
    }

    #[test]
    fn prefix_less_token_is_forward() {
        let resolve = resolver(&["s1"]);
        let path = parse_path_str("s1", &resolve).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path.as_slice()[0].strand, Strand::Forward);
    }

    #[test]
    fn unresolvable_segment_yields_none() {
        let resolve = resolver(&["s1"]);
        assert!(parse_path_str(">s1>ghost", &resolve).is_none());
    }

    #[test]
    fn identity_falls_back_to_match_ratio() {
        assert_eq!(AlignmentRecord::identity(90, 100, None), 0.9);
        assert_eq!(AlignmentRecord::identity(90, 100, Some(0.75)), 0.75);
    }

    #[test]
    fn parse_record_rejects_short_lines() {
        let resolve = resolver(&["s1"]);
        let err = parse_record(b"too\tfew\tcolumns", &resolve).unwrap_err();
        assert!(err.contains("12 columns"));
    }
}
