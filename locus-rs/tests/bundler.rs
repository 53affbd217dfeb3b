/// Bundler tests: records are pushed straight into a `Bundler` backed by a
/// pool large enough that no worker is needed, then the dispatched slots are
/// drained from the queue and inspected.
use locus_rs::annotation::{Exon, Transcript};
use locus_rs::dispatch;
use locus_rs::{AlignmentRecord, AssemblyConfig, AssemblyError, BufferPool, Bundler, GuideIndex};

const SLOTS_FOR_TESTS: usize = 16;

#[derive(Debug)]
struct Loaded {
    chrom: String,
    start: u32,
    end: u32,
    reads: usize,
    guides: Vec<String>,
    fragments: u64,
    frag_len: u64,
    saturated: bool,
    depth_at_start: u32,
}

fn load(
    config: &AssemblyConfig,
    guides: &GuideIndex,
    records: Vec<AlignmentRecord>,
) -> Result<Vec<Loaded>, AssemblyError> {
    let pool = BufferPool::new(SLOTS_FOR_TESTS);
    let (dispatcher, queue) = dispatch::channel(SLOTS_FOR_TESTS);
    let mut bundler = Bundler::new(config, &pool, dispatcher, guides);
    for record in records {
        bundler.push(record)?;
    }
    bundler.finish()?;

    let mut loaded = Vec::new();
    while let Some(slot) = queue.recv() {
        let b = pool.bundle(slot);
        loaded.push(Loaded {
            chrom: b.chrom().to_string(),
            start: b.start(),
            end: b.end(),
            reads: b.reads().len(),
            guides: b.guides().iter().map(|g| g.name.clone()).collect(),
            fragments: b.num_fragments(),
            frag_len: b.frag_len(),
            saturated: b.cov_saturated(),
            depth_at_start: b.depth_at(b.start()),
        });
    }
    Ok(loaded)
}

fn read(chrom: &str, start: u32, end: u32) -> AlignmentRecord {
    AlignmentRecord::unspliced("r", chrom, start, end)
}

fn guide(id: &str, chrom: &str, exons: &[(u32, u32)]) -> Transcript {
    Transcript {
        id: id.to_string(),
        seqname: chrom.to_string(),
        strand: '+',
        exons: exons.iter().map(|&(start, end)| Exon { start, end }).collect(),
    }
}

#[test]
fn three_records_make_two_bundles() {
    let config = AssemblyConfig::default();
    let records = vec![read("chr1", 100, 199), read("chr1", 120, 219), read("chr1", 5000, 5099)];
    let loaded = load(&config, &GuideIndex::new(), records).unwrap();

    assert_eq!(loaded.len(), 2, "expected two bundles: {loaded:?}");
    assert_eq!((loaded[0].start, loaded[0].end, loaded[0].reads), (100, 219, 2));
    assert_eq!((loaded[1].start, loaded[1].end, loaded[1].reads), (5000, 5099, 1));
    let fragments: u64 = loaded.iter().map(|b| b.fragments).sum();
    let frag_len: u64 = loaded.iter().map(|b| b.frag_len).sum();
    assert_eq!(fragments, 3);
    assert_eq!(frag_len, 300);
}

#[test]
fn record_exactly_at_gap_joins_bundle() {
    let config = AssemblyConfig::default();
    let loaded =
        load(&config, &GuideIndex::new(), vec![read("chr1", 100, 199), read("chr1", 249, 300)])
            .unwrap();
    assert_eq!(loaded.len(), 1, "start == end + gap must stay in the bundle");
    assert_eq!(loaded[0].end, 300);
}

#[test]
fn record_past_gap_opens_bundle() {
    let config = AssemblyConfig::default();
    let loaded =
        load(&config, &GuideIndex::new(), vec![read("chr1", 100, 199), read("chr1", 250, 300)])
            .unwrap();
    assert_eq!(loaded.len(), 2, "start > end + gap must open a new bundle");
}

#[test]
fn custom_gap_is_honoured() {
    let config = AssemblyConfig { bundle_gap: 0, ..AssemblyConfig::default() };
    let loaded =
        load(&config, &GuideIndex::new(), vec![read("chr1", 100, 199), read("chr1", 200, 300)])
            .unwrap();
    assert_eq!(loaded.len(), 2);
}

#[test]
fn chromosome_change_opens_bundle() {
    let config = AssemblyConfig::default();
    let loaded =
        load(&config, &GuideIndex::new(), vec![read("chr1", 100, 199), read("chr2", 120, 219)])
            .unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].chrom, "chr1");
    assert_eq!(loaded[1].chrom, "chr2");
}

#[test]
fn unsorted_records_are_rejected() {
    let config = AssemblyConfig::default();
    let err = load(&config, &GuideIndex::new(), vec![read("chr1", 200, 299), read("chr1", 150, 249)])
        .unwrap_err();
    match err {
        AssemblyError::UnsortedInput { chrom, pos, prev_pos } => {
            assert_eq!(chrom, "chr1");
            assert_eq!(pos, 150);
            assert_eq!(prev_pos, 200);
        }
        other => panic!("expected UnsortedInput, got {other:?}"),
    }
}

#[test]
fn revisited_chromosome_is_rejected() {
    let config = AssemblyConfig::default();
    let records = vec![read("chr1", 100, 199), read("chr2", 100, 199), read("chr1", 5000, 5099)];
    let err = load(&config, &GuideIndex::new(), records).unwrap_err();
    assert!(
        matches!(err, AssemblyError::ChromosomeRevisited { ref chrom, pos: 5000 } if chrom == "chr1"),
        "unexpected error: {err:?}"
    );
}

#[test]
fn every_record_lands_in_exactly_one_bundle() {
    let config = AssemblyConfig::default();
    let mut records = Vec::new();
    for chrom in ["chr1", "chr2"] {
        for start in [1000u32, 1130, 1400, 1700, 1760, 2500] {
            records.push(read(chrom, start, start + 99));
            records.push(read(chrom, start + 10, start + 60));
        }
    }
    let total = records.len();
    let loaded = load(&config, &GuideIndex::new(), records).unwrap();

    assert_eq!(loaded.len(), 8, "unexpected bundles: {loaded:?}");
    let reads: usize = loaded.iter().map(|b| b.reads).sum();
    assert_eq!(reads, total, "reads lost or duplicated across bundles");
    for pair in loaded.windows(2) {
        if pair[0].chrom == pair[1].chrom {
            assert!(
                pair[1].start > pair[0].end + config.bundle_gap,
                "bundles {:?} and {:?} should have been merged",
                pair[0],
                pair[1]
            );
        }
    }
}

#[test]
fn bundle_widens_over_overlapping_guides() {
    let config = AssemblyConfig::default();
    let guides = GuideIndex::from_transcripts(vec![
        guide("g1", "chr1", &[(100, 150), (250, 300)]),
        guide("g2", "chr1", &[(280, 700)]),
        guide("g3", "chr1", &[(900, 1000)]),
    ]);
    let records = vec![read("chr1", 120, 170), read("chr1", 720, 790), read("chr1", 1000, 1050)];
    let loaded = load(&config, &guides, records).unwrap();

    assert_eq!(loaded.len(), 2, "unexpected bundles: {loaded:?}");
    assert_eq!((loaded[0].start, loaded[0].end), (100, 790));
    assert_eq!(loaded[0].guides, vec!["g1", "g2"]);
    assert_eq!(loaded[0].reads, 2);
    assert_eq!((loaded[1].start, loaded[1].end), (900, 1050));
    assert_eq!(loaded[1].guides, vec!["g3"]);
}

#[test]
fn extending_a_bundle_pulls_in_later_guides() {
    let config = AssemblyConfig::default();
    let guides = GuideIndex::from_transcripts(vec![guide("late", "chr1", &[(400, 500)])]);
    let records = vec![read("chr1", 100, 199), read("chr1", 150, 420)];
    let loaded = load(&config, &guides, records).unwrap();

    assert_eq!(loaded.len(), 1);
    assert_eq!((loaded[0].start, loaded[0].end), (100, 500));
    assert_eq!(loaded[0].guides, vec!["late"]);
}

#[test]
fn guides_on_other_chromosomes_are_ignored() {
    let config = AssemblyConfig::default();
    let guides = GuideIndex::from_transcripts(vec![guide("elsewhere", "chr9", &[(100, 5000)])]);
    let loaded = load(&config, &guides, vec![read("chr1", 100, 199)]).unwrap();
    assert!(loaded[0].guides.is_empty());
    assert_eq!(loaded[0].end, 199);
}

#[test]
fn depth_is_capped_at_saturation_threshold() {
    let config = AssemblyConfig::default().with_max_read_cov(2);
    let records = (0..4).map(|_| read("chr1", 100, 199)).collect();
    let loaded = load(&config, &GuideIndex::new(), records).unwrap();

    assert_eq!(loaded.len(), 1);
    assert!(loaded[0].saturated);
    assert_eq!(loaded[0].reads, 4, "saturated reads are still kept");
    assert_eq!(loaded[0].depth_at_start, 2);
}

#[test]
fn below_threshold_is_not_saturated() {
    let config = AssemblyConfig::default();
    let records = (0..4).map(|_| read("chr1", 100, 199)).collect();
    let loaded = load(&config, &GuideIndex::new(), records).unwrap();
    assert!(!loaded[0].saturated);
    assert_eq!(loaded[0].depth_at_start, 4);
}

#[test]
fn only_primary_first_mates_count_as_fragments() {
    let config = AssemblyConfig::default();
    let records = vec![
        read("chr1", 100, 199),                                // single end
        read("chr1", 100, 199).with_hits(2, 2),                // secondary instance
        read("chr1", 110, 209).with_mate(true, false),         // first mate
        read("chr1", 120, 219).with_mate(false, false),        // second mate
        read("chr1", 130, 229).with_mate(false, true),         // mate unmapped
    ];
    let loaded = load(&config, &GuideIndex::new(), records).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].reads, 5);
    assert_eq!(loaded[0].fragments, 3);
    assert_eq!(loaded[0].frag_len, 300);
}

#[test]
fn spliced_reads_record_junctions() {
    use locus_rs::Segment;

    let pool = BufferPool::new(1);
    let (dispatcher, queue) = dispatch::channel(1);
    let guides = GuideIndex::new();
    let config = AssemblyConfig::default();
    let mut bundler = Bundler::new(&config, &pool, dispatcher, &guides);
    let exons = vec![Segment { start: 100, end: 149 }, Segment { start: 400, end: 449 }];
    bundler.push(AlignmentRecord::spliced("s", "chr1", exons.clone()).with_strand('+')).unwrap();
    bundler.push(AlignmentRecord::spliced("t", "chr1", exons).with_strand('+')).unwrap();
    bundler.finish().unwrap();

    let slot = queue.recv().expect("one bundle");
    let bundle = pool.bundle(slot);
    assert_eq!(bundle.junctions().len(), 1);
    let (junction, support) = bundle.junctions().iter().next().unwrap();
    assert_eq!((junction.start, junction.end, junction.strand), (150, 399, '+'));
    assert_eq!(*support, 2);
    assert_eq!(bundle.frag_len(), 200);
    assert_eq!(bundle.depth_at(200), 0, "intron must not be covered");
}
