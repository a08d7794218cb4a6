//! End-to-end tests driving the real `rust_htslib::bam::record::Record` path
//! (`record::BamAlignmentView`) through `Annotator::process`, rather than the
//! in-memory mock the unit tests use. Grounded on the read/CIGAR/position
//! assertions in `lapels/tests/testAnnotator.py` (`examples/original_source/`),
//! adapted to this crate's public API.

use lapels::annotate::Annotator;
use lapels::cigar::Op;
use lapels::posmap::PositionMap;
use lapels::record::{AlignmentView, BamAlignmentView};
use lapels::variant::{Payload, Variant, VariantTable};
use rust_htslib::bam::record::{Cigar as HtsCigar, CigarString, Record};

const CHROM: &str = "chr1";
const CHROM_LEN: i64 = 55;

fn make_record(pos: i64, cigar: &[(Op, u32)], seq: &[u8]) -> Record {
    let hts: Vec<HtsCigar> = cigar
        .iter()
        .map(|&(op, len)| match op {
            Op::Match => HtsCigar::Match(len),
            Op::Ins => HtsCigar::Ins(len),
            Op::Del => HtsCigar::Del(len),
            Op::Skip => HtsCigar::RefSkip(len),
        })
        .collect();
    let qual = vec![30u8; seq.len()];
    let mut record = Record::new();
    record.set(b"read1", Some(&CigarString(hts)), seq, &qual);
    record.set_tid(0);
    record.set_pos(pos);
    record.unset_unmapped();
    record
}

/// A read entirely upstream of every variant passes through unchanged.
#[test]
fn trivial_passthrough_via_real_record() {
    let table = VariantTable::empty();
    let posmap = PositionMap::build(&table, CHROM_LEN).unwrap();
    let annotator = Annotator::new(&table, &posmap);

    let record = make_record(2, &[(Op::Match, 5)], b"ACGTA");
    let mut view = BamAlignmentView::new(record, CHROM.to_string()).unwrap();
    annotator.process(&mut view).unwrap();

    assert_eq!(view.cigar(), &vec![(Op::Match, 5)]);
    assert_eq!(view.target_pos(), 2);
    assert_eq!(view.int_tag("zs0"), Some(0));
    assert_eq!(view.int_tag("zi0"), Some(0));
    assert_eq!(view.int_tag("zd0"), Some(0));
}

/// A read spanning a 5bp reference-side deletion gets a gap-filled `D` and
/// the tally lands in the deletion tag.
#[test]
fn read_spanning_deletion_gets_gap_fill() {
    let variants: Vec<Variant> =
        (10..15).map(|p| Variant::new(p, Payload::Del { base: b'A' })).collect();
    let table = VariantTable::build(variants).unwrap();
    let posmap = PositionMap::build(&table, CHROM_LEN).unwrap();
    let annotator = Annotator::new(&table, &posmap);

    let record = make_record(5, &[(Op::Match, 10)], b"ACGTACGTAC");
    let mut view = BamAlignmentView::new(record, CHROM.to_string()).unwrap();
    annotator.process(&mut view).unwrap();

    assert_eq!(view.cigar(), &vec![(Op::Match, 5), (Op::Del, 5), (Op::Match, 5)]);
    assert_eq!(view.target_pos(), 5);
    assert_eq!(view.int_tag("zd0"), Some(5));
}

/// A substitution variant is counted when the read carries the alternate
/// base, and the original CIGAR survives under the `OC` tag.
#[test]
fn substitution_is_counted_and_original_cigar_preserved() {
    let table =
        VariantTable::build(vec![Variant::new(10, Payload::Sub { refb: b'A', alt: b'T' })])
            .unwrap();
    let posmap = PositionMap::build(&table, CHROM_LEN).unwrap();
    let annotator = Annotator::new(&table, &posmap);

    let record = make_record(8, &[(Op::Match, 5)], b"AATTA");
    let mut view = BamAlignmentView::new(record, CHROM.to_string()).unwrap();
    annotator.process(&mut view).unwrap();

    assert_eq!(view.cigar(), &vec![(Op::Match, 5)]);
    assert_eq!(view.int_tag("zs0"), Some(1));

    let original = view.record().aux(b"OC").unwrap();
    match original {
        rust_htslib::bam::record::Aux::String(s) => assert_eq!(s, "5M"),
        other => panic!("unexpected OC tag value: {other:?}"),
    }
}

/// The 55bp pseudo-genome fixture from `lapels/tests/testAnnotator.py`'s
/// `TestAnnotator.test1` (`examples/original_source/`): a deletion run
/// 10..14 co-located with a 10bp insertion at 14, a second deletion run
/// 15..24, a 5bp insertion at 34, and a third deletion run 35..44.
fn fixture_55() -> (VariantTable, PositionMap) {
    let mut variants: Vec<Variant> =
        (10..15).map(|p| Variant::new(p, Payload::Del { base: b'A' })).collect();
    variants.push(Variant::new(14, Payload::Ins { bases: b"abcdefghij".to_vec() }));
    variants.extend((15..25).map(|p| Variant::new(p, Payload::Del { base: b'A' })));
    variants.push(Variant::new(34, Payload::Ins { bases: b"abcde".to_vec() }));
    variants.extend((35..45).map(|p| Variant::new(p, Payload::Del { base: b'A' })));
    let table = VariantTable::build(variants).unwrap();
    let posmap = PositionMap::build(&table, 55).unwrap();
    (table, posmap)
}

fn bases(n: usize) -> Vec<u8> {
    b"ACGT".iter().copied().cycle().take(n).collect()
}

/// `spec.md` §8 scenario 1: a read entirely before any variant passes
/// through untouched.
#[test]
fn scenario_1_trivial_match() {
    let (table, posmap) = fixture_55();
    let annotator = Annotator::new(&table, &posmap);
    let record = make_record(2, &[(Op::Match, 5)], &bases(5));
    let mut view = BamAlignmentView::new(record, CHROM.to_string()).unwrap();
    annotator.process(&mut view).unwrap();

    assert_eq!(view.cigar(), &vec![(Op::Match, 5)]);
    assert_eq!(view.target_pos(), 2);
    assert_eq!((view.int_tag("zs0"), view.int_tag("zi0"), view.int_tag("zd0")), (Some(0), Some(0), Some(0)));
}

/// `spec.md` §8 scenario 2: a read landing entirely inside an insertion
/// resolves to a pure `I` with no reportable position — the region parser
/// used to produce an empty CIGAR here.
#[test]
fn scenario_2_read_inside_insertion() {
    let (table, posmap) = fixture_55();
    let annotator = Annotator::new(&table, &posmap);
    let record = make_record(12, &[(Op::Match, 5)], &bases(5));
    let mut view = BamAlignmentView::new(record, CHROM.to_string()).unwrap();
    annotator.process(&mut view).unwrap();

    assert_eq!(view.cigar(), &vec![(Op::Ins, 5)]);
    assert_eq!(view.target_pos(), -1);
    assert_eq!((view.int_tag("zs0"), view.int_tag("zi0"), view.int_tag("zd0")), (Some(0), Some(5), Some(0)));
}

/// `spec.md` §8 scenario 3: a read straddling an insertion and the
/// deletion run that follows it — the other shape the empty-CIGAR bug hit.
#[test]
fn scenario_3_read_straddles_insertion_and_deletion() {
    let (table, posmap) = fixture_55();
    let annotator = Annotator::new(&table, &posmap);
    let record = make_record(13, &[(Op::Match, 10)], &bases(10));
    let mut view = BamAlignmentView::new(record, CHROM.to_string()).unwrap();
    annotator.process(&mut view).unwrap();

    assert_eq!(view.cigar(), &vec![(Op::Ins, 7), (Op::Del, 10), (Op::Match, 3)]);
    assert_eq!(view.target_pos(), 25);
    assert_eq!((view.int_tag("zs0"), view.int_tag("zi0"), view.int_tag("zd0")), (Some(0), Some(7), Some(10)));
}

/// `spec.md` §8 scenario 4: a read spanning the whole chromosome crosses
/// every variant group in one segment.
#[test]
fn scenario_4_read_spans_whole_chromosome() {
    let (table, posmap) = fixture_55();
    let annotator = Annotator::new(&table, &posmap);
    let record = make_record(0, &[(Op::Match, 45)], &bases(45));
    let mut view = BamAlignmentView::new(record, CHROM.to_string()).unwrap();
    annotator.process(&mut view).unwrap();

    assert_eq!(
        view.cigar(),
        &vec![
            (Op::Match, 10),
            (Op::Del, 5),
            (Op::Ins, 10),
            (Op::Del, 10),
            (Op::Match, 10),
            (Op::Ins, 5),
            (Op::Del, 10),
            (Op::Match, 10),
        ]
    );
    assert_eq!(view.target_pos(), 0);
    assert_eq!((view.int_tag("zs0"), view.int_tag("zi0"), view.int_tag("zd0")), (Some(0), Some(15), Some(25)));
}

/// `spec.md` §8 scenario 5: an `M,D,M` sandwich on a second fixture —
/// `lapels/tests/testAnnotator.py`'s `test2`, a single 5bp deletion run with
/// no co-located insertion.
#[test]
fn scenario_5_match_deletion_match_sandwich() {
    let variants: Vec<Variant> = (10..15).map(|p| Variant::new(p, Payload::Del { base: b'A' })).collect();
    let table = VariantTable::build(variants).unwrap();
    let posmap = PositionMap::build(&table, 35).unwrap();
    let annotator = Annotator::new(&table, &posmap);

    let record = make_record(3, &[(Op::Match, 10)], &bases(10));
    let mut view = BamAlignmentView::new(record, CHROM.to_string()).unwrap();
    annotator.process(&mut view).unwrap();

    assert_eq!(view.cigar(), &vec![(Op::Match, 7), (Op::Del, 5), (Op::Match, 3)]);
    assert_eq!(view.target_pos(), 3);
    assert_eq!((view.int_tag("zs0"), view.int_tag("zi0"), view.int_tag("zd0")), (Some(0), Some(0), Some(5)));
}

/// `spec.md` §8 scenario 6: a read whose own CIGAR already carries `N`
/// (splice-junction) segments bracketed by matches on both sides — handled
/// by the bracketed-gap shortcut rather than the region parser directly.
#[test]
fn scenario_6_bracketed_skip_segments() {
    let (table, posmap) = fixture_55();
    let annotator = Annotator::new(&table, &posmap);
    let record = make_record(
        13,
        &[(Op::Match, 4), (Op::Skip, 5), (Op::Match, 6), (Op::Skip, 7), (Op::Match, 3)],
        &bases(13),
    );
    let mut view = BamAlignmentView::new(record, CHROM.to_string()).unwrap();
    annotator.process(&mut view).unwrap();

    assert_eq!(
        view.cigar(),
        &vec![(Op::Ins, 4), (Op::Skip, 12), (Op::Match, 6), (Op::Skip, 12), (Op::Match, 3)]
    );
    assert_eq!(view.target_pos(), 27);
    assert_eq!((view.int_tag("zs0"), view.int_tag("zi0"), view.int_tag("zd0")), (Some(0), Some(4), Some(0)));
}

/// An existing `NM` tag is renamed to `OM` rather than dropped.
#[test]
fn old_nm_tag_is_preserved_as_om() {
    let table = VariantTable::empty();
    let posmap = PositionMap::build(&table, CHROM_LEN).unwrap();
    let annotator = Annotator::new(&table, &posmap);

    let mut record = make_record(0, &[(Op::Match, 4)], b"ACGT");
    record.push_aux(b"NM", rust_htslib::bam::record::Aux::I32(3)).unwrap();
    let mut view = BamAlignmentView::new(record, CHROM.to_string()).unwrap();
    annotator.process(&mut view).unwrap();

    assert!(view.int_tag("NM").is_none());
    assert_eq!(view.int_tag("OM"), Some(3));
}
