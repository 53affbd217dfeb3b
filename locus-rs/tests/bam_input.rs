/// BAM adapter tests: small BAM files are written with noodles, then read back
/// through `open_bam` and checked record by record.
use locus_rs::bam_input::open_bam;
use locus_rs::{AlignmentRecord, Segment};
use noodles::bam;
use noodles::core::Position;
use noodles::sam::alignment::io::Write as _;
use noodles::sam::alignment::record::cigar::op::{Kind, Op};
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::record_buf::{Cigar, Data, RecordBuf};
use noodles::sam::header::record::value::map::ReferenceSequence;
use noodles::sam::header::record::value::Map;
use std::fs::File;
use std::num::NonZeroUsize;

// ── helpers ──────────────────────────────────────────────────────────────────

fn header() -> noodles::sam::Header {
    let chr1 = Map::<ReferenceSequence>::new(NonZeroUsize::new(1_000_000).unwrap());
    let chr2 = Map::<ReferenceSequence>::new(NonZeroUsize::new(1_000_000).unwrap());
    noodles::sam::Header::builder()
        .add_reference_sequence("chr1", chr1)
        .add_reference_sequence("chr2", chr2)
        .build()
}

fn mapped(name: &str, ref_id: usize, start: usize, ops: Vec<Op>, flags: Flags) -> RecordBuf {
    RecordBuf::builder()
        .set_name(name)
        .set_flags(flags)
        .set_reference_sequence_id(ref_id)
        .set_alignment_start(Position::try_from(start).unwrap())
        .set_cigar(Cigar::from(ops))
        .build()
}

fn with_tags(mut record: RecordBuf, tags: Vec<(Tag, Value)>) -> RecordBuf {
    *record.data_mut() = tags.into_iter().collect::<Data>();
    record
}

fn m(len: usize) -> Vec<Op> {
    vec![Op::new(Kind::Match, len)]
}

/// Write `records` to a temporary BAM and read every converted alignment back.
fn round_trip(records: &[RecordBuf]) -> (Vec<AlignmentRecord>, u64) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("in.bam");
    let header = header();
    {
        let mut writer = bam::io::Writer::new(File::create(&path).unwrap());
        writer.write_header(&header).unwrap();
        for record in records {
            writer.write_alignment_record(&header, record).unwrap();
        }
        writer.try_finish().unwrap();
    }

    let mut input = open_bam(&path).unwrap();
    let alignments: Vec<AlignmentRecord> = input.by_ref().map(|r| r.unwrap()).collect();
    (alignments, input.skipped)
}

const XS: Tag = Tag::new(b'X', b'S');
const TS: Tag = Tag::new(b't', b's');

// ── tests ────────────────────────────────────────────────────────────────────

#[test]
fn unmapped_and_unaligned_records_are_skipped() {
    let unmapped = RecordBuf::builder().set_name("u").set_flags(Flags::UNMAPPED).build();
    let clipped_only = mapped(
        "c",
        0,
        500,
        vec![Op::new(Kind::SoftClip, 20), Op::new(Kind::Insertion, 5)],
        Flags::empty(),
    );
    let kept = mapped("k", 0, 1000, m(100), Flags::empty());

    let (alignments, skipped) = round_trip(&[unmapped, clipped_only, kept]);
    assert_eq!(skipped, 2);
    assert_eq!(alignments.len(), 1);
    let aln = &alignments[0];
    assert_eq!(aln.name, "k");
    assert_eq!(aln.chrom, "chr1");
    assert_eq!((aln.start, aln.end), (1000, 1099));
}

#[test]
fn hit_tags_default_when_absent() {
    let tagged = with_tags(
        mapped("multi", 1, 200, m(50), Flags::empty()),
        vec![(Tag::ALIGNMENT_HIT_COUNT, Value::from(3)), (Tag::HIT_INDEX, Value::from(2))],
    );
    let plain = mapped("uniq", 1, 300, m(50), Flags::empty());

    let (alignments, skipped) = round_trip(&[tagged, plain]);
    assert_eq!(skipped, 0);
    assert_eq!(alignments[0].chrom, "chr2");
    assert_eq!((alignments[0].nh, alignments[0].hi), (3, 2));
    assert!(!alignments[0].counts_as_fragment(), "secondary hit must not count");
    assert_eq!((alignments[1].nh, alignments[1].hi), (1, 0));
    assert!(alignments[1].counts_as_fragment());
}

#[test]
fn xs_wins_over_ts() {
    let record = with_tags(
        mapped("r", 0, 100, m(50), Flags::empty()),
        vec![(XS, Value::Character(b'+')), (TS, Value::Character(b'-'))],
    );
    let (alignments, _) = round_trip(&[record]);
    assert_eq!(alignments[0].strand, '+');
}

#[test]
fn ts_flips_on_reverse_alignments() {
    let forward = with_tags(
        mapped("f", 0, 100, m(50), Flags::empty()),
        vec![(TS, Value::Character(b'+'))],
    );
    let reverse = with_tags(
        mapped("r", 0, 200, m(50), Flags::REVERSE_COMPLEMENTED),
        vec![(TS, Value::Character(b'+'))],
    );
    let untagged = mapped("n", 0, 300, m(50), Flags::REVERSE_COMPLEMENTED);

    let (alignments, _) = round_trip(&[forward, reverse, untagged]);
    let strands: Vec<char> = alignments.iter().map(|a| a.strand).collect();
    assert_eq!(strands, ['+', '-', '.']);
}

#[test]
fn mate_flags_decide_fragment_counting() {
    let first = mapped("p", 0, 100, m(50), Flags::SEGMENTED | Flags::FIRST_SEGMENT);
    let second = mapped("p", 0, 300, m(50), Flags::SEGMENTED | Flags::LAST_SEGMENT);
    let orphan = mapped(
        "o",
        0,
        500,
        m(50),
        Flags::SEGMENTED | Flags::LAST_SEGMENT | Flags::MATE_UNMAPPED,
    );

    let (alignments, _) = round_trip(&[first, second, orphan]);
    assert!(alignments.iter().all(|a| a.paired));
    assert!(alignments[0].first_mate);
    assert!(alignments[0].counts_as_fragment());
    assert!(!alignments[1].counts_as_fragment(), "second mate of a mapped pair");
    assert!(alignments[2].mate_unmapped);
    assert!(alignments[2].counts_as_fragment(), "second mate stands in for an unmapped first");
}

#[test]
fn skip_operations_split_exons() {
    let ops = vec![
        Op::new(Kind::SoftClip, 5),
        Op::new(Kind::Match, 50),
        Op::new(Kind::Skip, 100),
        Op::new(Kind::Match, 20),
        Op::new(Kind::Deletion, 2),
        Op::new(Kind::Match, 28),
    ];
    let record = with_tags(
        mapped("s", 0, 1000, ops, Flags::empty()),
        vec![(XS, Value::Character(b'-'))],
    );

    let (alignments, _) = round_trip(&[record]);
    let aln = &alignments[0];
    assert_eq!(
        aln.exons,
        [Segment { start: 1000, end: 1049 }, Segment { start: 1150, end: 1199 }]
    );
    assert_eq!((aln.start, aln.end), (1000, 1199));
    assert_eq!(aln.aligned_len(), 100);
    let introns: Vec<Segment> = aln.introns().collect();
    assert_eq!(introns, [Segment { start: 1050, end: 1149 }]);
    assert_eq!(aln.strand, '-');
}
