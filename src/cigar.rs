//! CIGAR parsing, serialisation, simplification and sub-ranging.
//!
//! Grounded on `lapels/cigarutils.py` (`examples/original_source/`) for the
//! exact `sub`/`replace`/`simplify` semantics, and on `plasmod`'s use of
//! `rust_htslib::bam::record::Cigar` for how a CIGAR maps to reference vs.
//! query consumption.

use std::fmt;

/// One of the four alignment operations this crate deals with. `=` and `X`
/// are folded into `Match` on input, per `spec.md` §4.1 and §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Match,
    Ins,
    Del,
    Skip,
}

impl Op {
    /// `M`, `D`, `N` advance the reference cursor; `I` does not.
    pub fn consumes_ref(self) -> bool {
        matches!(self, Op::Match | Op::Del | Op::Skip)
    }

    /// `M`, `I` advance the query cursor; `D`, `N` do not.
    pub fn consumes_query(self) -> bool {
        matches!(self, Op::Match | Op::Ins)
    }

    pub fn as_char(self) -> char {
        match self {
            Op::Match => 'M',
            Op::Ins => 'I',
            Op::Del => 'D',
            Op::Skip => 'N',
        }
    }

    pub fn from_char(c: char) -> Option<Op> {
        match c {
            'M' | '=' | 'X' => Some(Op::Match),
            'I' => Some(Op::Ins),
            'D' => Some(Op::Del),
            'N' => Some(Op::Skip),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A finished, simplified CIGAR: an ordered run of `(op, length)` pairs with
/// `length > 0`.
pub type Cigar = Vec<(Op, u32)>;

/// A raw element that may still need [`simplify`] applied: lengths may be
/// non-positive, and `op` may be `None` — the "private sentinel used by the
/// region parser for 'ignore'" from `spec.md` §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawElem {
    pub op: Option<Op>,
    pub len: i64,
}

impl RawElem {
    pub fn new(op: Op, len: i64) -> Self {
        RawElem { op: Some(op), len }
    }

    pub fn ignore(len: i64) -> Self {
        RawElem { op: None, len }
    }
}

impl From<(Op, u32)> for RawElem {
    fn from((op, len): (Op, u32)) -> Self {
        RawElem { op: Some(op), len: len as i64 }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CigarError {
    #[error("{0}")]
    OutOfRange(String),
}

/// Drop non-positive-length and sentinel ("ignore") elements, then fuse
/// adjacent entries of equal op.
pub fn simplify(cigar: impl IntoIterator<Item = RawElem>) -> Cigar {
    let mut out: Cigar = Vec::new();
    for elem in cigar {
        if elem.len <= 0 {
            continue;
        }
        let Some(op) = elem.op else { continue };
        let len = elem.len as u32;
        match out.last_mut() {
            Some((last_op, last_len)) if *last_op == op => *last_len += len,
            _ => out.push((op, len)),
        }
    }
    out
}

/// Convenience wrapper for re-simplifying an already-built [`Cigar`] (e.g.
/// after concatenating builder output).
pub fn simplify_cigar(cigar: &Cigar) -> Cigar {
    simplify(cigar.iter().map(|&(op, len)| RawElem::new(op, len as i64)))
}

/// Reference-footprint length of a cigar (`M` + `D` + `N` bases).
pub fn ref_len(cigar: &Cigar) -> i64 {
    cigar
        .iter()
        .filter(|(op, _)| op.consumes_ref())
        .map(|&(_, len)| len as i64)
        .sum()
}

/// Query-footprint length of a cigar (`M` + `I` bases).
pub fn query_len(cigar: &Cigar) -> i64 {
    cigar
        .iter()
        .filter(|(op, _)| op.consumes_query())
        .map(|&(_, len)| len as i64)
        .sum()
}

/// Standard SAM-style CIGAR text: runs of `<len><op>` with no separators.
pub fn to_sam_string(cigar: &Cigar) -> String {
    let mut s = String::new();
    for (op, len) in cigar {
        s.push_str(&len.to_string());
        s.push(op.as_char());
    }
    s
}

/// Comma-separated debug form, handy in logs and tests.
pub fn to_debug_string(cigar: &Cigar) -> String {
    cigar
        .iter()
        .map(|(op, len)| format!("{len}{op}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Return the sub-CIGAR covering reference positions `[lo, hi]`, given that
/// `cigar`'s first operation aligns at `start_pos`. `None` bounds mean "from
/// the start"/"to the end". Ported from `cigarutils.sub`.
///
/// An `I` immediately preceding the first `M`/`D`/`N` at the requested `lo`
/// is included in the result (insertions anchored to the left boundary
/// belong with that boundary).
pub fn sub(
    cigar: &Cigar,
    start_pos: i64,
    lo: Option<i64>,
    hi: Option<i64>,
) -> Result<Cigar, CigarError> {
    if cigar.is_empty() {
        return Ok(Vec::new());
    }

    if (lo.is_none() && hi == Some(start_pos - 1)) || (lo == Some(start_pos) && hi.is_none()) {
        return Ok(Vec::new());
    }

    let mut idx1 = 0usize;
    let mut offset1: i64 = 0;
    let mut idx2 = cigar.len() - 1;
    let mut offset2: i64 = cigar[cigar.len() - 1].1 as i64 - 1;
    let mut pos = start_pos;
    let mut ins_buffer: Vec<(Op, u32)> = Vec::new();

    if let Some(lo) = lo {
        if lo < pos {
            return Err(CigarError::OutOfRange("start position underflows".into()));
        }
        let mut found = false;
        for &(op, len) in cigar.iter() {
            if op.consumes_ref() {
                if lo < pos + len as i64 {
                    offset1 = lo - pos;
                    found = true;
                    break;
                } else {
                    pos += len as i64;
                    idx1 += 1;
                    ins_buffer.clear();
                }
            } else {
                ins_buffer.push((op, len));
                idx1 += 1;
            }
        }
        let _ = found;

        if hi == Some(pos - 1) && lo == Some(pos) {
            return Ok(Vec::new());
        }
        if idx1 >= cigar.len() {
            return Err(CigarError::OutOfRange("start position overflows".into()));
        }
    }

    if let Some(hi) = hi {
        if hi < pos {
            return Err(CigarError::OutOfRange("end position underflows".into()));
        }
        idx2 = idx1;
        for &(op, len) in cigar[idx1..].iter() {
            if op.consumes_ref() {
                if hi < pos + len as i64 {
                    offset2 = hi - pos;
                    break;
                } else {
                    pos += len as i64;
                    idx2 += 1;
                }
            } else {
                idx2 += 1;
            }
        }
        if idx2 >= cigar.len() {
            return Err(CigarError::OutOfRange("end position overflows".into()));
        }
    }

    let mut ret = Vec::new();
    if !ins_buffer.is_empty() && offset1 == 0 {
        ret.extend(ins_buffer);
    }
    if idx1 == idx2 {
        ret.push((cigar[idx1].0, (offset2 - offset1 + 1) as u32));
    } else {
        ret.push((cigar[idx1].0, cigar[idx1].1 - offset1 as u32));
        ret.extend_from_slice(&cigar[idx1 + 1..idx2]);
        ret.push((cigar[idx2].0, (offset2 + 1) as u32));
    }
    Ok(ret)
}

/// One sorted replacement region: `replacement` takes the place of reference
/// positions `[start, end]` in the original cigar.
#[derive(Debug, Clone)]
pub struct ReplaceRegion {
    pub replacement: Cigar,
    pub start: i64,
    pub end: i64,
}

/// Replace a sorted list of sub-ranges of `cigar` with supplied replacement
/// cigars, filling the untouched slices between them via [`sub`]. Ported
/// from `cigarutils.replace`.
pub fn replace(cigar: &Cigar, start_pos: i64, regions: &[ReplaceRegion]) -> Cigar {
    let mut ret = Vec::new();
    let mut last: Option<i64> = None;
    for reg in regions {
        if let Ok(piece) = sub(cigar, start_pos, last, Some(reg.start - 1)) {
            ret.extend(piece);
        }
        ret.extend(reg.replacement.iter().cloned());
        last = Some(reg.end + 1);
    }
    if let Ok(piece) = sub(cigar, start_pos, last, None) {
        ret.extend(piece);
    }
    ret
}
