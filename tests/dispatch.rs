use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use parking_lot::Mutex;

use multimutect::command::call::check_summary;
use multimutect::dispatch::sink::FILENAME_SEGMENT_LIST;
use multimutect::dispatch::sink::FILENAME_STATUS_LIST;
use multimutect::dispatch::Dispatcher;
use multimutect::dispatch::FsOutputSink;
use multimutect::dispatch::OutputSink;
use multimutect::dispatch::SampleDescriptor;
use multimutect::dispatch::SamplePair;
use multimutect::dispatch::SegmentEnumerator;
use multimutect::dispatch::SegmentRunner;
use multimutect::dispatch::SegmentStatus;
use multimutect::dispatch::WorkCatalog;
use multimutect::dispatch::WorkerOutcome;
use multimutect::runtime::Error;
use multimutect::runtime::Result;

/// Segments per primary file name; unknown files cannot be opened
struct Segments(HashMap<String, Vec<String>>);

impl Segments {
    fn new(samples: &[(&str, &[&str])]) -> Arc<Segments> {
        Arc::new(Segments(
            samples
                .iter()
                .map(|(name, segs)| (name.to_string(), segs.iter().map(|s| s.to_string()).collect()))
                .collect(),
        ))
    }
}

impl SegmentEnumerator for Segments {
    fn segments(&self, primary: &Path) -> anyhow::Result<Vec<String>> {
        let name = primary.file_name().unwrap().to_string_lossy().into_owned();
        match self.0.get(&name) {
            Some(segs) => Ok(segs.clone()),
            None => bail!("cannot open {}", name),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    records: Mutex<Vec<(String, Vec<(String, SegmentStatus)>)>>,
}

impl RecordingSink {
    fn records_for(&self, name: &str) -> Vec<Vec<(String, SegmentStatus)>> {
        self.records
            .lock()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

impl OutputSink for RecordingSink {
    fn create_sample_dir(&self, name: &str) -> anyhow::Result<PathBuf> {
        Ok(PathBuf::from(name))
    }

    fn write_finalization_record(&self, dir: &Path, outcomes: &[(String, SegmentStatus)]) -> anyhow::Result<()> {
        self.records
            .lock()
            .push((dir.to_string_lossy().into_owned(), outcomes.to_vec()));
        Ok(())
    }

    fn write_segment_order(&self, _dir: &Path, _segments: &[String]) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Accepts sample directories but cannot write any status record
struct FullDiskSink;

impl OutputSink for FullDiskSink {
    fn create_sample_dir(&self, name: &str) -> anyhow::Result<PathBuf> {
        Ok(PathBuf::from(name))
    }

    fn write_finalization_record(&self, _dir: &Path, _outcomes: &[(String, SegmentStatus)]) -> anyhow::Result<()> {
        bail!("disk full")
    }

    fn write_segment_order(&self, _dir: &Path, _segments: &[String]) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Counts every invocation; fails or panics on the segments it is told to
#[derive(Default)]
struct ScriptedRunner {
    calls: Mutex<HashMap<(String, String), usize>>,
    fail_on: Vec<String>,
    panic_on: Vec<String>,
}

impl SegmentRunner for ScriptedRunner {
    fn run(&self, sample: &SampleDescriptor, segment: &str) -> anyhow::Result<()> {
        *self
            .calls
            .lock()
            .entry((sample.name.clone(), segment.to_string()))
            .or_insert(0) += 1;
        if self.panic_on.iter().any(|s| s == segment) {
            panic!("runner crashed on {}", segment);
        }
        if self.fail_on.iter().any(|s| s == segment) {
            bail!("MuTect exited with status 1 on {}", segment);
        }
        Ok(())
    }
}

fn pair(primary: &str) -> Result<SamplePair> {
    Ok(SamplePair {
        primary: PathBuf::from(primary),
        secondary: None,
    })
}

fn catalog(
    records: Vec<Result<SamplePair>>,
    segments: Arc<Segments>,
    sink: Arc<dyn OutputSink>,
) -> WorkCatalog {
    WorkCatalog::new(Box::new(records.into_iter()), segments, sink)
}

fn done(segs: &[&str]) -> Vec<(String, SegmentStatus)> {
    segs.iter().map(|s| (s.to_string(), SegmentStatus::Done)).collect()
}

#[test]
fn two_samples_two_workers() {
    let segments = Segments::new(&[("A.bam", &["chr1", "chr2", "chr3"][..]), ("B.bam", &["chr1", "chr2"][..])]);
    let sink = Arc::new(RecordingSink::default());
    let runner = Arc::new(ScriptedRunner::default());

    let summary = Dispatcher::new(
        2,
        catalog(vec![pair("A.bam"), pair("B.bam")], segments, sink.clone()),
        runner.clone(),
        sink.clone(),
    )
    .run();

    assert!(summary.is_success());
    assert_eq!(summary.num_finalized(), 2);
    assert_eq!(sink.records.lock().len(), 2);
    assert_eq!(sink.records_for("A"), vec![done(&["chr1", "chr2", "chr3"])]);
    assert_eq!(sink.records_for("B"), vec![done(&["chr1", "chr2"])]);
    assert_eq!(runner.calls.lock().len(), 5);
}

#[test]
fn failing_segment_still_finalizes_sample() {
    let segments = Segments::new(&[("A.bam", &["chr1", "chr2", "chr3"][..])]);
    let sink = Arc::new(RecordingSink::default());
    let runner = Arc::new(ScriptedRunner {
        fail_on: vec!["chr2".to_string()],
        ..Default::default()
    });

    let summary = Dispatcher::new(3, catalog(vec![pair("A.bam")], segments, sink.clone()), runner, sink.clone()).run();

    assert!(summary.is_success());
    assert_eq!(
        sink.records_for("A"),
        vec![vec![
            ("chr1".to_string(), SegmentStatus::Done),
            ("chr2".to_string(), SegmentStatus::Error),
            ("chr3".to_string(), SegmentStatus::Done),
        ]]
    );
    let failed: usize = summary
        .workers
        .iter()
        .map(|w| match w {
            WorkerOutcome::Finished(r) => r.segments_failed,
            WorkerOutcome::Fault { .. } => 0,
        })
        .sum();
    assert_eq!(failed, 1);
}

#[test]
fn malformed_records_and_unreadable_samples_are_skipped() {
    let segments = Segments::new(&[("A.bam", &["chr1"][..]), ("C.bam", &["chr1", "chr2"][..])]);
    let sink = Arc::new(RecordingSink::default());
    let records = vec![
        pair("A.bam"),
        Err(Error::malformed_input("pairs.txt", 2, "no primary file")),
        pair("missing.bam"),
        pair("C.bam"),
    ];

    let summary = Dispatcher::new(
        2,
        catalog(records, segments, sink.clone()),
        Arc::new(ScriptedRunner::default()),
        sink.clone(),
    )
    .run();

    assert!(summary.is_success());
    assert_eq!(summary.catalog.malformed, 1);
    assert_eq!(summary.catalog.skipped, vec!["missing".to_string()]);
    assert_eq!(summary.catalog.materialized, 2);
    assert_eq!(summary.num_finalized(), 2);
    assert_eq!(sink.records_for("C"), vec![done(&["chr1", "chr2"])]);
}

#[test]
fn every_segment_runs_once_and_every_sample_finalizes_once() {
    let chrs: Vec<String> = (1..=23).map(|i| format!("chr{}", i)).collect();
    let chr_refs: Vec<&str> = chrs.iter().map(|s| s.as_str()).collect();
    let segments = Segments::new(&[
        ("s0.bam", &chr_refs[..]),
        ("s1.bam", &chr_refs[..1]),
        ("s2.bam", &chr_refs[..7]),
        ("s3.bam", &chr_refs[..12]),
        ("s4.bam", &chr_refs[..3]),
    ]);
    let sink = Arc::new(RecordingSink::default());
    let runner = Arc::new(ScriptedRunner::default());
    let records = (0..5).map(|i| pair(&format!("s{}.bam", i))).collect();

    let summary = Dispatcher::new(8, catalog(records, segments, sink.clone()), runner.clone(), sink.clone()).run();

    assert!(summary.is_success());
    assert_eq!(summary.workers.len(), 8);
    assert_eq!(summary.num_finalized(), 5);
    for (i, len) in [(0, 23), (1, 1), (2, 7), (3, 12), (4, 3)] {
        let records = sink.records_for(&format!("s{}", i));
        assert_eq!(records.len(), 1, "sample s{} finalized more than once", i);
        assert_eq!(records[0], done(&chr_refs[..len]));
    }

    let calls = runner.calls.lock();
    assert_eq!(calls.len(), 23 + 1 + 7 + 12 + 3);
    assert!(calls.values().all(|n| *n == 1));
}

#[test]
fn crashed_worker_leaves_its_segment_busy() {
    let segments = Segments::new(&[("A.bam", &["chr1", "chr2", "chr3"][..])]);
    let sink = Arc::new(RecordingSink::default());
    let runner = Arc::new(ScriptedRunner {
        panic_on: vec!["chr1".to_string()],
        ..Default::default()
    });

    let summary = Dispatcher::new(2, catalog(vec![pair("A.bam")], segments, sink.clone()), runner, sink.clone()).run();

    assert!(!summary.is_success());
    assert_eq!(summary.faulted_workers(), vec![0]);
    match &summary.workers[0] {
        WorkerOutcome::Fault { msg, .. } => assert!(msg.contains("chr1")),
        other => panic!("expected a fault, got {:?}", other),
    }

    assert_eq!(summary.num_finalized(), 0);
    assert_eq!(
        summary.samples[0].statuses,
        vec![SegmentStatus::Busy, SegmentStatus::Done, SegmentStatus::Done]
    );
    assert!(sink.records.lock().is_empty());
}

#[test]
fn status_files_on_disk() {
    let parent = tempfile::tempdir().unwrap();
    let segments = Segments::new(&[("t1.bam", &["chr1", "chr2"][..])]);
    let sink = Arc::new(FsOutputSink::new(parent.path()));
    let runner = Arc::new(ScriptedRunner {
        fail_on: vec!["chr1".to_string()],
        ..Default::default()
    });
    let records = vec![Ok(SamplePair {
        primary: PathBuf::from("t1.bam"),
        secondary: Some(PathBuf::from("n1.bam")),
    })];

    let summary = Dispatcher::new(1, catalog(records, segments, sink.clone()), runner, sink).run();
    assert!(summary.is_success());

    let dir = parent.path().join("t1_n1");
    assert_eq!(
        fs::read_to_string(dir.join(FILENAME_STATUS_LIST)).unwrap(),
        "segment\tstatus\nchr1\tERROR\nchr2\tDONE\n"
    );
    assert_eq!(fs::read_to_string(dir.join(FILENAME_SEGMENT_LIST)).unwrap(), "chr1\nchr2\n");
}

#[test]
fn unwritable_finalization_record_fails_the_run() {
    let segments = Segments::new(&[("A.bam", &["chr1", "chr2"][..])]);
    let sink = Arc::new(FullDiskSink);
    let runner = Arc::new(ScriptedRunner::default());

    let summary = Dispatcher::new(2, catalog(vec![pair("A.bam")], segments, sink.clone()), runner.clone(), sink).run();

    assert_eq!(runner.calls.lock().len(), 2);
    assert_eq!(summary.num_finalized(), 0);
    assert!(!summary.samples[0].finalized);
    assert_eq!(summary.samples[0].statuses, vec![SegmentStatus::Done, SegmentStatus::Done]);
    assert_eq!(summary.finalize_failures(), vec!["A"]);
    assert!(summary.faulted_workers().is_empty());
    assert!(!summary.is_success());

    let lines: Vec<String> = summary.workers.iter().map(|w| w.to_string()).collect();
    assert_eq!(lines.iter().filter(|l| l.ends_with("1 finalization failures")).count(), 1);

    let err = check_summary(&summary).unwrap_err();
    assert!(err.to_string().contains("\"A\""));
}
