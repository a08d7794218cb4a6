//! Stitches per-segment region-parser results into one reference-coordinate
//! CIGAR, and the adjacent insertion/deletion post-fix.
//!
//! Grounded on `lapels/cigarbuilder.py`'s `CigarBuilder.append` and
//! `annotator5.Annotator.execute`'s `MIDM` handling (lines ~423-541)
//! (`examples/original_source/`). `annotator5.execute` only ever calls
//! `cb.append(reg)` in a simple per-region loop — the module's more
//! complex `build()` method (an out-of-order interleaving pass using
//! `regionutils.isLeftTo`/`isRightTo`) is never exercised by the driver, so
//! only `append`'s logic is reproduced here.

use crate::cigar::{simplify, Cigar, Op, RawElem};
use crate::region::RegionResult;

/// Accumulates per-segment results into a reference CIGAR, closing gaps
/// between segments with reference-level deletions.
#[derive(Debug, Default)]
pub struct CigarBuilder {
    raw: Vec<RawElem>,
    prev_end: Option<i64>,
}

impl CigarBuilder {
    pub fn new() -> Self {
        CigarBuilder::default()
    }

    /// Append one region's result. `region.op == Op::Ins` segments never get
    /// a gap-fill in front of them — they're zero-width by convention and
    /// belong flush against their neighbours.
    pub fn append(&mut self, region: &RegionResult) {
        if region.op != Op::Ins {
            if let Some(prev_end) = self.prev_end {
                let delta = region.ref_start - 1 - prev_end;
                if delta > 0 {
                    self.raw.push(RawElem::new(Op::Del, delta));
                }
            }
        }
        if region.ref_end >= 0 {
            self.prev_end = Some(self.prev_end.map_or(region.ref_end, |p| p.max(region.ref_end)));
        }
        self.raw.extend(region.cigar.iter().map(|&(op, len)| RawElem::new(op, len as i64)));
    }

    pub fn finish(self) -> Cigar {
        simplify(self.raw)
    }
}

/// Build one reference CIGAR from an ordered list of per-segment results.
pub fn build_cigar(regions: &[RegionResult]) -> Cigar {
    let mut builder = CigarBuilder::new();
    for region in regions {
        builder.append(region);
    }
    builder.finish()
}

/// The outcome of matching an alignment-level insertion's read bases against
/// a nearby reference deletion's bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidmFix {
    /// No match found on either side; leave the segment alone.
    None,
    /// The first `len` inserted bases match the deletion's first `len` bases.
    LeftAnchored { len: usize },
    /// The last `len` inserted bases match the deletion's last `len` bases.
    RightAnchored { len: usize },
}

/// `spec.md` §4.5/§9: try the left-anchored match first, then right-anchored,
/// then give up. Never try both and pick the better one — that's explicitly
/// flagged as the wrong "improvement" to make.
pub fn midm_match(ins_bases: &[u8], del_bases: &[u8]) -> MidmFix {
    let bound = ins_bases.len().min(del_bases.len());

    let left = ins_bases
        .iter()
        .zip(del_bases.iter())
        .take_while(|(a, b)| a.eq_ignore_ascii_case(b))
        .count();
    if left > 0 {
        return MidmFix::LeftAnchored { len: left.min(bound) };
    }

    let right = ins_bases
        .iter()
        .rev()
        .zip(del_bases.iter().rev())
        .take_while(|(a, b)| a.eq_ignore_ascii_case(b))
        .count();
    if right > 0 {
        return MidmFix::RightAnchored { len: right.min(bound) };
    }

    MidmFix::None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(op: Op, cigar: Cigar, ref_start: i64, ref_end: i64) -> RegionResult {
        RegionResult {
            op,
            cigar,
            ref_start,
            ref_end,
            ref_first_match_pos: if ref_end >= ref_start { ref_start } else { -1 },
            n_subst: 0,
            n_ins: 0,
            n_del: 0,
        }
    }

    #[test]
    fn fills_gap_between_segments_with_deletion() {
        let regions = vec![
            region(Op::Match, vec![(Op::Match, 5)], 0, 4),
            region(Op::Match, vec![(Op::Match, 3)], 10, 12),
        ];
        assert_eq!(
            build_cigar(&regions),
            vec![(Op::Match, 5), (Op::Del, 5), (Op::Match, 3)]
        );
    }

    #[test]
    fn insertion_segment_gets_no_gap_fill() {
        let regions = vec![
            region(Op::Match, vec![(Op::Match, 5)], 0, 4),
            region(Op::Ins, vec![(Op::Ins, 3)], 5, 4),
            region(Op::Match, vec![(Op::Match, 3)], 5, 7),
        ];
        assert_eq!(
            build_cigar(&regions),
            vec![(Op::Match, 5), (Op::Ins, 3), (Op::Match, 3)]
        );
    }

    #[test]
    fn midm_prefers_left_anchor_over_right() {
        assert_eq!(midm_match(b"ACGT", b"ACGTTT"), MidmFix::LeftAnchored { len: 4 });
        assert_eq!(midm_match(b"GTAA", b"TTGTAA"), MidmFix::RightAnchored { len: 4 });
        assert_eq!(midm_match(b"ACGT", b"TTTT"), MidmFix::None);
    }
}
