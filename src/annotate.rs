//! The annotator driver: for one alignment, decomposes its CIGAR into
//! segments, dispatches each to the region parser, rebuilds the reference
//! CIGAR, applies the MIDM post-fix, and writes the updated alignment.
//!
//! Grounded on `lapels/annotator5.py::Annotator.execute`
//! (`examples/original_source/`), which this follows step for step (see
//! `spec.md` §4.6); `plasmod::halve` is the template for how a driver reads,
//! mutates and writes one alignment at a time (`examples/mario-incandenza-plasmod/src/lib.rs`).

use crate::builder::{build_cigar, midm_match, MidmFix};
use crate::cigar::{simplify_cigar, Cigar, Op};
use crate::error::Result;
use crate::posmap::PositionMap;
use crate::record::{apply_tags, AlignmentView, TagPrefixes};
use crate::region::{parse_segment, RegionResult};
use crate::variant::{Payload, VariantKind, VariantTable};

/// One decomposed CIGAR element carried alongside its parsed result and,
/// for insertions, the read bases it covers (needed by the MIDM post-fix).
struct Seg {
    target_start: i64,
    target_end: i64,
    result: RegionResult,
    ins_bases: Option<Vec<u8>>,
}

/// Ties the variant table, position map and tag configuration together for
/// one chromosome's worth of alignments.
pub struct Annotator<'a> {
    pub variants: &'a VariantTable,
    pub posmap: &'a PositionMap,
    pub tag_prefixes: TagPrefixes,
}

impl<'a> Annotator<'a> {
    pub fn new(variants: &'a VariantTable, posmap: &'a PositionMap) -> Self {
        Annotator { variants, posmap, tag_prefixes: TagPrefixes::default() }
    }

    /// Remap one alignment in place. Returns `Err` for any of the typed
    /// failures in `spec.md` §7 — the caller decides skip-vs-abort.
    pub fn process(&self, view: &mut impl AlignmentView) -> Result<()> {
        let original_cigar = simplify_cigar(view.cigar());
        let aln_pos = view.target_pos();

        let mut segs = self.decompose(view, &original_cigar, aln_pos)?;
        self.apply_midm(&mut segs, view);

        let regions: Vec<RegionResult> = segs.iter().map(|s| s.result.clone()).collect();
        let final_cigar = build_cigar(&regions);

        let new_pos = regions
            .iter()
            .find(|r| r.ref_first_match_pos >= 0)
            .map(|r| r.ref_first_match_pos)
            .unwrap_or(-1);

        let n_subst: u32 = regions.iter().map(|r| r.n_subst).sum();
        let n_ins: u32 = regions.iter().map(|r| r.n_ins).sum();
        let n_del: u32 = regions.iter().map(|r| r.n_del).sum();

        apply_tags(view, &self.tag_prefixes, &original_cigar, n_subst, n_ins, n_del);
        view.set_cigar(&final_cigar);
        view.set_pos(new_pos);

        Ok(())
    }

    fn decompose(
        &self,
        view: &impl AlignmentView,
        cigar: &Cigar,
        aln_pos: i64,
    ) -> Result<Vec<Seg>> {
        struct Raw {
            op: Op,
            target_start: i64,
            target_end: i64,
            qoff: usize,
            qlen: usize,
        }

        let mut raws = Vec::with_capacity(cigar.len());
        let mut tgt_cur = aln_pos;
        let mut qoff = 0usize;
        for &(op, len) in cigar {
            let len = len as usize;
            match op {
                Op::Match => {
                    raws.push(Raw {
                        op,
                        target_start: tgt_cur,
                        target_end: tgt_cur + len as i64 - 1,
                        qoff,
                        qlen: len,
                    });
                    tgt_cur += len as i64;
                    qoff += len;
                }
                Op::Ins => {
                    raws.push(Raw { op, target_start: tgt_cur, target_end: tgt_cur - 1, qoff, qlen: len });
                    qoff += len;
                }
                Op::Del | Op::Skip => {
                    raws.push(Raw {
                        op,
                        target_start: tgt_cur,
                        target_end: tgt_cur + len as i64 - 1,
                        qoff,
                        qlen: len,
                    });
                    tgt_cur += len as i64;
                }
            }
        }

        // Match segments first: their result never depends on a neighbour.
        let mut results: Vec<Option<RegionResult>> = vec![None; raws.len()];
        for (i, raw) in raws.iter().enumerate() {
            if raw.op == Op::Match {
                results[i] = Some(parse_segment(
                    view,
                    Op::Match,
                    raw.target_start,
                    raw.target_end,
                    self.variants,
                    self.posmap,
                )?);
            }
        }

        for (i, raw) in raws.iter().enumerate() {
            if raw.op == Op::Ins {
                let anchor = self.posmap.bmap(raw.target_start)?.value();
                results[i] = Some(RegionResult {
                    op: Op::Ins,
                    cigar: vec![(Op::Ins, raw.qlen as u32)],
                    ref_start: anchor,
                    ref_end: anchor - 1,
                    ref_first_match_pos: -1,
                    n_subst: 0,
                    n_ins: raw.qlen as u32,
                    n_del: 0,
                });
            }
        }

        for i in 0..raws.len() {
            if raws[i].op != Op::Del && raws[i].op != Op::Skip {
                continue;
            }
            let bracketed = i > 0
                && i + 1 < raws.len()
                && raws[i - 1].op == Op::Match
                && raws[i + 1].op == Op::Match;
            let shortcut = bracketed.then(|| {
                let prev = results[i - 1].as_ref().unwrap();
                let next = results[i + 1].as_ref().unwrap();
                let gap = next.ref_start - prev.ref_end - 1;
                (gap, prev.ref_end)
            });

            results[i] = Some(match shortcut {
                Some((gap, prev_end)) if gap > 0 => RegionResult {
                    op: raws[i].op,
                    cigar: vec![(raws[i].op, gap as u32)],
                    ref_start: prev_end + 1,
                    ref_end: prev_end + gap,
                    ref_first_match_pos: -1,
                    n_subst: 0,
                    n_ins: 0,
                    n_del: if raws[i].op == Op::Del { gap as u32 } else { 0 },
                },
                _ => parse_segment(
                    view,
                    raws[i].op,
                    raws[i].target_start,
                    raws[i].target_end,
                    self.variants,
                    self.posmap,
                )?,
            });
        }

        Ok(raws
            .into_iter()
            .zip(results)
            .map(|(raw, result)| {
                let ins_bases = (raw.op == Op::Ins)
                    .then(|| view.seq().get(raw.qoff..raw.qoff + raw.qlen).map(<[u8]>::to_vec))
                    .flatten();
                Seg {
                    target_start: raw.target_start,
                    target_end: raw.target_end,
                    result: result.expect("every segment is assigned a result above"),
                    ins_bases,
                }
            })
            .collect())
    }

    /// `spec.md` §4.5: for each alignment-level `I` adjacent to a `D`/`N`,
    /// try to explain the insertion as a partial match against the nearby
    /// reference deletion.
    fn apply_midm(&self, segs: &mut [Seg], _view: &impl AlignmentView) {
        for i in 0..segs.len() {
            if segs[i].result.op != Op::Ins || segs[i].result.n_ins == 0 {
                continue;
            }
            let Some(ins_bases) = segs[i].ins_bases.clone() else { continue };

            let del_idx = if i > 0 && is_deletion_like(&segs[i - 1]) {
                Some(i - 1)
            } else if i + 1 < segs.len() && is_deletion_like(&segs[i + 1]) {
                Some(i + 1)
            } else {
                None
            };
            let Some(j) = del_idx else { continue };

            let del_bases = self.deletion_bases(segs[j].result.ref_start, segs[j].result.ref_end);
            if del_bases.is_empty() {
                continue;
            }

            match midm_match(&ins_bases, &del_bases) {
                MidmFix::None => {}
                MidmFix::LeftAnchored { len } => convert_left(&mut segs[i], &mut segs[j], len),
                MidmFix::RightAnchored { len } => convert_right(&mut segs[i], &mut segs[j], len),
            }
        }
    }

    fn deletion_bases(&self, ref_start: i64, ref_end: i64) -> Vec<u8> {
        if ref_end < ref_start {
            return Vec::new();
        }
        self.variants
            .range_inclusive(ref_start, ref_end)
            .iter()
            .filter(|v| v.kind() == VariantKind::Del)
            .filter_map(|v| match &v.payload {
                Payload::Del { base } => Some(*base),
                _ => None,
            })
            .collect()
    }
}

fn is_deletion_like(seg: &Seg) -> bool {
    matches!(seg.result.op, Op::Del | Op::Skip) && seg.result.cigar.iter().any(|&(op, _)| op == Op::Del)
}

fn convert_left(ins: &mut Seg, del: &mut Seg, len: usize) {
    let len = len.min(ins.result.n_ins as usize);
    if len == 0 {
        return;
    }
    let mut new_cigar = vec![(Op::Match, len as u32)];
    if ins.result.n_ins as usize > len {
        new_cigar.push((Op::Ins, ins.result.n_ins - len as u32));
    }
    ins.result.cigar = new_cigar;
    ins.result.ref_start = del.result.ref_start;
    ins.result.ref_end = del.result.ref_start + len as i64 - 1;
    ins.result.ref_first_match_pos = ins.result.ref_start;
    ins.result.n_ins -= len as u32;

    del.result.cigar = trim_cigar_front(&del.result.cigar, len as u32);
    del.result.ref_start += len as i64;
    del.result.n_del = del.result.n_del.saturating_sub(len as u32);
    if del.result.ref_start > del.result.ref_end {
        del.result.ref_end = del.result.ref_start - 1;
    }
}

fn convert_right(ins: &mut Seg, del: &mut Seg, len: usize) {
    let len = len.min(ins.result.n_ins as usize);
    if len == 0 {
        return;
    }
    let remaining = ins.result.n_ins - len as u32;
    let mut new_cigar = Vec::new();
    if remaining > 0 {
        new_cigar.push((Op::Ins, remaining));
    }
    new_cigar.push((Op::Match, len as u32));
    ins.result.cigar = new_cigar;
    ins.result.ref_end = del.result.ref_end;
    ins.result.ref_start = del.result.ref_end - len as i64 + 1;
    ins.result.ref_first_match_pos = ins.result.ref_start;
    ins.result.n_ins -= len as u32;

    del.result.cigar = trim_cigar_back(&del.result.cigar, len as u32);
    del.result.ref_end -= len as i64;
    del.result.n_del = del.result.n_del.saturating_sub(len as u32);
    if del.result.ref_start > del.result.ref_end {
        del.result.ref_start = del.result.ref_end + 1;
    }
}

fn trim_cigar_front(cigar: &Cigar, mut n: u32) -> Cigar {
    let mut out = Vec::new();
    for &(op, len) in cigar {
        if n == 0 {
            out.push((op, len));
        } else if len <= n {
            n -= len;
        } else {
            out.push((op, len - n));
            n = 0;
        }
    }
    out
}

fn trim_cigar_back(cigar: &Cigar, n: u32) -> Cigar {
    let mut rev: Cigar = cigar.iter().rev().copied().collect();
    rev = trim_cigar_front(&rev, n);
    rev.reverse();
    rev
}
