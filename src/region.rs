//! The region parser: translates one operation segment of an alignment's
//! CIGAR (expressed in target/pseudo-genome coordinates) into a reference
//! sub-CIGAR plus variant counts.
//!
//! Grounded on `lapels/annotator5.py`'s `getReadOffset` and
//! `Annotator.parseTargetRegion` (`examples/original_source/`), which this
//! follows near-verbatim; only the position-map lookup shape changed (see
//! `posmap.rs`'s module doc).

use crate::cigar::{simplify, Cigar, Op, RawElem};
use crate::error::{RemapError, Result};
use crate::posmap::{PosResult, PositionMap};
use crate::record::{base_at, AlignmentView};
use crate::variant::{Payload, VariantKind, VariantTable};

/// `(op, target_start, target_end)` result of decomposing one alignment's
/// CIGAR, lifted to reference coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionResult {
    pub op: Op,
    pub cigar: Cigar,
    /// Reference footprint, inclusive. For an insertion-only segment,
    /// `ref_end == ref_start - 1` (`spec.md` §3/§9).
    pub ref_start: i64,
    pub ref_end: i64,
    /// Reference position of the leftmost emitted match, or -1.
    pub ref_first_match_pos: i64,
    pub n_subst: u32,
    pub n_ins: u32,
    pub n_del: u32,
}

/// Walk `cigar` (in target coordinates, starting at `aln_target_pos`) to find
/// the 0-based offset into the read's query sequence that corresponds to
/// `target_pos`. Ported from `annotator5.getReadOffset`.
pub fn get_read_offset(
    cigar: &Cigar,
    aln_target_pos: i64,
    query_len: usize,
    target_pos: i64,
) -> Result<usize> {
    let implied = crate::cigar::query_len(cigar) as usize;
    if implied != query_len {
        return Err(RemapError::CigarMismatch { implied, recorded: query_len });
    }
    if target_pos < aln_target_pos {
        return Err(RemapError::BoundsError {
            pos: target_pos,
            reason: "read offset underflows".into(),
        });
    }

    let mut tgt_cur = aln_target_pos;
    let mut qoff: i64 = 0;
    for &(op, len) in cigar {
        let len = len as i64;
        match op {
            Op::Match => {
                if target_pos < tgt_cur + len {
                    return Ok((qoff + (target_pos - tgt_cur)) as usize);
                }
                tgt_cur += len;
                qoff += len;
            }
            Op::Ins => {
                qoff += len;
            }
            Op::Del | Op::Skip => {
                if target_pos < tgt_cur + len {
                    return Err(RemapError::PositionInGap { pos: target_pos });
                }
                tgt_cur += len;
            }
        }
    }
    Err(RemapError::BoundsError { pos: target_pos, reason: "read offset overflows".into() })
}

/// Translate one `(seg_op, target_start, target_end)` segment into reference
/// coordinates. `seg_op` must be `Match`, `Del`, or `Skip` — insertion
/// segments are handled directly by the annotator driver (`spec.md` §4.6
/// step 3).
pub fn parse_segment(
    view: &impl AlignmentView,
    seg_op: Op,
    target_start: i64,
    target_end: i64,
    variants: &VariantTable,
    posmap: &PositionMap,
) -> Result<RegionResult> {
    if target_start > target_end {
        let anchor = posmap.bmap(target_start)?.value();
        return Ok(RegionResult {
            op: seg_op,
            cigar: Vec::new(),
            ref_start: anchor,
            ref_end: anchor - 1,
            ref_first_match_pos: -1,
            n_subst: 0,
            n_ins: 0,
            n_del: 0,
        });
    }

    // A target position that falls inside an insertion resolves to the
    // `PositionMap`'s Anchor convention (`posmap.rs` module doc): the value
    // one past the insertion's owning variant group. Pull the boundary back
    // by one so that group is actually included in the walk below — using
    // the anchor value as-is silently drops the insertion (and anything
    // co-located with it), which is what used to leave `cigar` empty
    // whenever a segment resolved entirely inside one (`spec.md` §8).
    let ref_lo = match posmap.bmap(target_start)? {
        PosResult::Anchor(v) => v - 1,
        PosResult::Exact(v) => v,
    };
    let ref_hi = match posmap.bmap(target_end)? {
        PosResult::Anchor(v) => v - 1,
        PosResult::Exact(v) => v,
    };
    if ref_hi < ref_lo {
        return Err(RemapError::Unsupported {
            reason: format!("reversed reference interval {ref_lo}..{ref_hi} (duplication/inversion)"),
        });
    }

    let mut ref_cur = ref_lo;
    let mut tgt_cur = posmap.fmap(ref_lo)?.value();

    let mut raw: Vec<RawElem> = Vec::new();
    let mut ref_start: Option<i64> = None;
    let mut ref_end: Option<i64> = None;
    let mut ref_first_match_pos: i64 = -1;
    let mut n_subst = 0u32;

    for group in variants.groups_in_range(ref_lo, ref_hi) {
        let pos = group[0].ref_pos;

        while ref_cur < pos {
            if tgt_cur >= target_start && tgt_cur <= target_end {
                raw.push(RawElem::new(Op::Match, 1));
                ref_start.get_or_insert(ref_cur);
                ref_end = Some(ref_cur);
                if ref_first_match_pos < 0 {
                    ref_first_match_pos = ref_cur;
                }
            }
            ref_cur += 1;
            tgt_cur += 1;
        }

        let del = group.iter().find(|v| v.kind() == VariantKind::Del);
        let sub = group.iter().find(|v| v.kind() == VariantKind::Sub);
        let ins = group.iter().find(|v| v.kind() == VariantKind::Ins);

        if let Some(_d) = del {
            if tgt_cur > target_start && tgt_cur <= target_end {
                raw.push(RawElem::new(Op::Del, 1));
                ref_start.get_or_insert(ref_cur);
                ref_end = Some(ref_cur);
            }
            ref_cur += 1;
        } else if let Some(s) = sub {
            if tgt_cur >= target_start && tgt_cur <= target_end {
                raw.push(RawElem::new(Op::Match, 1));
                ref_start.get_or_insert(ref_cur);
                ref_end = Some(ref_cur);
                if ref_first_match_pos < 0 {
                    ref_first_match_pos = ref_cur;
                }
                if seg_op == Op::Match {
                    let offset =
                        get_read_offset(view.cigar(), view.target_pos(), view.query_len(), tgt_cur)?;
                    let base = base_at(view.seq(), offset)?;
                    if let Payload::Sub { alt, .. } = &s.payload {
                        if base.to_ascii_uppercase() == alt.to_ascii_uppercase() {
                            n_subst += 1;
                        }
                    }
                }
            }
            ref_cur += 1;
            tgt_cur += 1;
        } else {
            if tgt_cur >= target_start && tgt_cur <= target_end {
                raw.push(RawElem::new(Op::Match, 1));
                ref_start.get_or_insert(ref_cur);
                ref_end = Some(ref_cur);
                if ref_first_match_pos < 0 {
                    ref_first_match_pos = ref_cur;
                }
            }
            ref_cur += 1;
            tgt_cur += 1;
        }

        if let Some(i) = ins {
            if let Payload::Ins { bases } = &i.payload {
                let k = bases.len() as i64;
                let lo = tgt_cur.max(target_start);
                let hi = (tgt_cur + k).min(target_end + 1);
                if hi > lo {
                    raw.push(RawElem::new(Op::Ins, hi - lo));
                }
                tgt_cur += k;
            }
        }
    }

    if ref_cur <= ref_hi {
        let trailing = ref_hi - ref_cur + 1;
        raw.push(RawElem::new(Op::Match, trailing));
        ref_start.get_or_insert(ref_cur);
        ref_end = Some(ref_hi);
        if ref_first_match_pos < 0 {
            ref_first_match_pos = ref_cur;
        }
    }

    let cigar = simplify(raw);
    let n_ins: u32 = cigar.iter().filter(|(op, _)| *op == Op::Ins).map(|&(_, l)| l).sum();
    let n_del: u32 = cigar.iter().filter(|(op, _)| *op == Op::Del).map(|&(_, l)| l).sum();

    let (ref_start, ref_end, ref_first_match_pos) = match ref_start {
        Some(s) => (s, ref_end.unwrap(), ref_first_match_pos),
        None => (ref_cur, ref_cur - 1, -1),
    };

    Ok(RegionResult {
        op: seg_op,
        cigar,
        ref_start,
        ref_end,
        ref_first_match_pos,
        n_subst,
        n_ins,
        n_del,
    })
}
