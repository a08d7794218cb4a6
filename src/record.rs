//! Decouples the core remapping logic from `rust_htslib::bam::Record`.
//!
//! `plasmod::halve` works directly against `rust_htslib::bam::record::Record`
//! (`examples/mario-incandenza-plasmod/src/lib.rs`); here that coupling is
//! pushed behind [`AlignmentView`], in the trait-seam style
//! `rhysnewell-StrainM`'s `reads::cigar_utils::CigarUtils` uses to keep CIGAR
//! logic testable without a BAM file on disk. [`BamAlignmentView`] is the
//! real implementation; tests use a plain in-memory one.

use rust_htslib::bam::record::{Aux, Cigar as HtsCigar, CigarString, Record};

use crate::cigar::{Cigar, Op};
use crate::error::{RemapError, Result};

/// Everything the region parser, builder and annotator need to read from or
/// write to one alignment record.
pub trait AlignmentView {
    fn target_chrom(&self) -> &str;
    /// 0-based leftmost target-coordinate position.
    fn target_pos(&self) -> i64;
    /// The alignment's CIGAR, with `=`/`X` already folded into `Match`.
    fn cigar(&self) -> &Cigar;
    fn seq(&self) -> &[u8];
    fn query_len(&self) -> usize;
    fn int_tag(&self, tag: &str) -> Option<i64>;

    fn set_pos(&mut self, pos: i64);
    fn set_cigar(&mut self, cigar: &Cigar);
    fn set_int_tag(&mut self, tag: &str, value: i64);
    fn set_string_tag(&mut self, tag: &str, value: &str);
    fn remove_tag(&mut self, tag: &str);
}

/// The three one-letter tag prefixes `spec.md` §6/§9 puts under CLI control.
/// Each produces a `<prefix>0` integer tag.
#[derive(Debug, Clone)]
pub struct TagPrefixes {
    pub subst: String,
    pub ins: String,
    pub del: String,
}

impl Default for TagPrefixes {
    fn default() -> Self {
        TagPrefixes { subst: "zs".into(), ins: "zi".into(), del: "zd".into() }
    }
}

/// Update an alignment's tags after remapping: the three variant-count tags,
/// `OC` (original target CIGAR, no separators), `OM` (the old edit-distance
/// value, if any), with the old `NM` removed. Tags are emitted in sorted key
/// order per `spec.md` §6.
pub fn apply_tags(
    view: &mut impl AlignmentView,
    prefixes: &TagPrefixes,
    original_cigar: &Cigar,
    n_subst: u32,
    n_ins: u32,
    n_del: u32,
) {
    let mut int_tags = vec![
        (format!("{}0", prefixes.subst), n_subst as i64),
        (format!("{}0", prefixes.ins), n_ins as i64),
        (format!("{}0", prefixes.del), n_del as i64),
    ];
    if let Some(old_nm) = view.int_tag("NM") {
        int_tags.push(("OM".to_string(), old_nm));
        view.remove_tag("NM");
    }
    int_tags.sort_by(|a, b| a.0.cmp(&b.0));
    for (tag, value) in int_tags {
        view.set_int_tag(&tag, value);
    }
    view.set_string_tag("OC", &crate::cigar::to_sam_string(original_cigar));
}

fn op_from_hts(op: &HtsCigar) -> Option<(Op, u32)> {
    match op {
        HtsCigar::Match(n) | HtsCigar::Equal(n) | HtsCigar::Diff(n) => Some((Op::Match, *n)),
        HtsCigar::Ins(n) => Some((Op::Ins, *n)),
        HtsCigar::Del(n) => Some((Op::Del, *n)),
        HtsCigar::RefSkip(n) => Some((Op::Skip, *n)),
        HtsCigar::SoftClip(_) | HtsCigar::HardClip(_) | HtsCigar::Pad(_) => None,
    }
}

fn op_to_hts(op: Op, len: u32) -> HtsCigar {
    match op {
        Op::Match => HtsCigar::Match(len),
        Op::Ins => HtsCigar::Ins(len),
        Op::Del => HtsCigar::Del(len),
        Op::Skip => HtsCigar::RefSkip(len),
    }
}

/// The real implementation, backed by `rust_htslib::bam::record::Record`.
pub struct BamAlignmentView {
    record: Record,
    chrom: String,
    cigar: Cigar,
}

impl BamAlignmentView {
    pub fn new(record: Record, chrom: String) -> Result<Self> {
        let cigar = record
            .cigar()
            .iter()
            .filter_map(op_from_hts)
            .collect::<Vec<_>>();
        Ok(BamAlignmentView { record, chrom, cigar })
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    pub fn record(&self) -> &Record {
        &self.record
    }
}

impl AlignmentView for BamAlignmentView {
    fn target_chrom(&self) -> &str {
        &self.chrom
    }

    fn target_pos(&self) -> i64 {
        self.record.pos()
    }

    fn cigar(&self) -> &Cigar {
        &self.cigar
    }

    fn seq(&self) -> &[u8] {
        // rust_htslib decodes the 4-bit packed sequence lazily; `encoded_seq`
        // exposes the raw bytes `Record::seq()` would otherwise allocate from.
        self.record.seq().encoded
    }

    fn query_len(&self) -> usize {
        self.record.seq_len()
    }

    fn int_tag(&self, tag: &str) -> Option<i64> {
        match self.record.aux(tag.as_bytes()).ok()? {
            Aux::I8(v) => Some(v as i64),
            Aux::U8(v) => Some(v as i64),
            Aux::I16(v) => Some(v as i64),
            Aux::U16(v) => Some(v as i64),
            Aux::I32(v) => Some(v as i64),
            Aux::U32(v) => Some(v as i64),
            _ => None,
        }
    }

    fn set_pos(&mut self, pos: i64) {
        self.record.set_pos(pos);
    }

    fn set_cigar(&mut self, cigar: &Cigar) {
        let hts: Vec<HtsCigar> = cigar.iter().map(|&(op, len)| op_to_hts(op, len)).collect();
        let view = self.record.seq().as_bytes();
        let qual = self.record.qual().to_vec();
        self.record.set(self.record.qname(), Some(&CigarString(hts.clone())), &view, &qual);
        self.cigar = cigar.clone();
    }

    fn set_int_tag(&mut self, tag: &str, value: i64) {
        let _ = self.record.remove_aux(tag.as_bytes());
        let _ = self.record.push_aux(tag.as_bytes(), Aux::I32(value as i32));
    }

    fn set_string_tag(&mut self, tag: &str, value: &str) {
        let _ = self.record.remove_aux(tag.as_bytes());
        let _ = self.record.push_aux(tag.as_bytes(), Aux::String(value));
    }

    fn remove_tag(&mut self, tag: &str) {
        let _ = self.record.remove_aux(tag.as_bytes());
    }
}

/// Lift a read offset computed against the query into a byte, failing with
/// the same `BoundsError` family the region parser uses elsewhere.
pub fn base_at(seq: &[u8], offset: usize) -> Result<u8> {
    seq.get(offset).copied().ok_or_else(|| RemapError::BoundsError {
        pos: offset as i64,
        reason: "read offset beyond sequence length".into(),
    })
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;

    /// A plain in-memory stand-in for an alignment record, grounded on the
    /// `Read` test double in `lapels/tests/testAnnotator.py`
    /// (`examples/original_source/`).
    #[derive(Debug, Clone)]
    pub struct MockAlignment {
        pub chrom: String,
        pub pos: i64,
        pub cigar: Cigar,
        pub seq: Vec<u8>,
        pub query_len: usize,
        pub int_tags: HashMap<String, i64>,
        pub string_tags: HashMap<String, String>,
    }

    impl MockAlignment {
        pub fn new(chrom: &str, pos: i64, cigar: Cigar, seq: &[u8]) -> Self {
            MockAlignment {
                chrom: chrom.to_string(),
                pos,
                query_len: seq.len(),
                cigar,
                seq: seq.to_vec(),
                int_tags: HashMap::new(),
                string_tags: HashMap::new(),
            }
        }
    }

    impl AlignmentView for MockAlignment {
        fn target_chrom(&self) -> &str {
            &self.chrom
        }

        fn target_pos(&self) -> i64 {
            self.pos
        }

        fn cigar(&self) -> &Cigar {
            &self.cigar
        }

        fn seq(&self) -> &[u8] {
            &self.seq
        }

        fn query_len(&self) -> usize {
            self.query_len
        }

        fn int_tag(&self, tag: &str) -> Option<i64> {
            self.int_tags.get(tag).copied()
        }

        fn set_pos(&mut self, pos: i64) {
            self.pos = pos;
        }

        fn set_cigar(&mut self, cigar: &Cigar) {
            self.cigar = cigar.clone();
        }

        fn set_int_tag(&mut self, tag: &str, value: i64) {
            self.int_tags.insert(tag.to_string(), value);
        }

        fn set_string_tag(&mut self, tag: &str, value: &str) {
            self.string_tags.insert(tag.to_string(), value.to_string());
        }

        fn remove_tag(&mut self, tag: &str) {
            self.int_tags.remove(tag);
            self.string_tags.remove(tag);
        }
    }
}
