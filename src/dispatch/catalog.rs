use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::debug;
use log::error;
use log::info;
use log::warn;

use crate::dispatch::sink::OutputSink;
use crate::dispatch::status::SegmentStatusTable;
use crate::runtime::Error;
use crate::runtime::Result;

/// One manifest record: a primary (tumor) file and an optional secondary (normal) file
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SamplePair {
    pub primary: PathBuf,
    pub secondary: Option<PathBuf>,
}

impl SamplePair {
    /// Name used for the sample output directory: stems of both files joined by '_'
    pub fn sample_name(&self) -> String {
        match &self.secondary {
            Some(secondary) => format!("{}_{}", file_stem(&self.primary), file_stem(secondary)),
            None => file_stem(&self.primary),
        }
    }
}

/// File name up to the first '.', so "tumor.sorted.bam" gives "tumor"
pub fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => name,
    }
}

/// Records in manifest order. A record missing its primary file comes out as Err(MalformedInput)
pub type ManifestSource = Box<dyn Iterator<Item = Result<SamplePair>> + Send>;

/// Lists the segments of a sample, in order, given its primary file
pub trait SegmentEnumerator: Send + Sync {
    fn segments(&self, primary: &Path) -> anyhow::Result<Vec<String>>;
}

#[derive(Clone, Debug)]
pub struct SampleDescriptor {
    pub index: usize,
    pub name: String,
    pub pair: SamplePair,
    pub segments: Vec<String>,
    pub output_dir: PathBuf,
}

/// A materialized sample: its descriptor plus the status table all workers share
#[derive(Debug)]
pub struct Sample {
    pub descriptor: SampleDescriptor,
    pub table: SegmentStatusTable,
    record_written: AtomicBool,
}

impl Sample {
    pub fn new(descriptor: SampleDescriptor) -> Sample {
        let table = SegmentStatusTable::new(descriptor.index, descriptor.segments.clone());
        Sample {
            descriptor,
            table,
            record_written: AtomicBool::new(false),
        }
    }

    /// The finalization record made it to the sink. The table's finalized flag
    /// only says that some worker took on the write
    pub fn is_record_written(&self) -> bool {
        self.record_written.load(Ordering::Acquire)
    }

    pub(crate) fn mark_record_written(&self) {
        self.record_written.store(true, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct CatalogReport {
    pub materialized: usize,
    pub malformed: usize,
    pub skipped: Vec<String>,
}

///////////////////////////////
/// Lazily turns manifest records into samples, one record per step.
/// Not synchronized itself; the dispatcher keeps it behind its creation lock
pub struct WorkCatalog {
    manifest: ManifestSource,
    enumerator: Arc<dyn SegmentEnumerator>,
    sink: Arc<dyn OutputSink>,
    next_index: usize,
    exhausted: bool,
    report: CatalogReport,
}

impl WorkCatalog {
    pub fn new(
        manifest: ManifestSource,
        enumerator: Arc<dyn SegmentEnumerator>,
        sink: Arc<dyn OutputSink>,
    ) -> WorkCatalog {
        WorkCatalog {
            manifest,
            enumerator,
            sink,
            next_index: 0,
            exhausted: false,
            report: CatalogReport::default(),
        }
    }

    /// Next well-formed sample, or None once the manifest is used up.
    /// Bad records and samples whose resources cannot be created are skipped
    pub fn next_sample(&mut self) -> Option<Sample> {
        loop {
            if self.exhausted {
                return None;
            }

            let pair = match self.manifest.next() {
                None => {
                    info!("No more samples in manifest ({} materialized)", self.next_index);
                    self.exhausted = true;
                    return None;
                }
                Some(Err(e)) => {
                    warn!("Skipping manifest record: {}", e);
                    self.report.malformed += 1;
                    continue;
                }
                Some(Ok(pair)) => pair,
            };

            match self.materialize(pair) {
                Ok(sample) => return Some(sample),
                Err((name, e)) => {
                    error!("Skipping sample '{}': {}", name, e);
                    self.report.skipped.push(name);
                }
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn report(&self) -> &CatalogReport {
        &self.report
    }

    fn materialize(&mut self, pair: SamplePair) -> std::result::Result<Sample, (String, Error)> {
        let name = pair.sample_name();

        let segments = match self.enumerator.segments(&pair.primary) {
            Ok(segments) => segments,
            Err(e) => {
                return Err((name, Error::resource_creation(&pair.primary, Some(format!("{:#}", e)))));
            }
        };
        if segments.is_empty() {
            return Err((
                name,
                Error::resource_creation(&pair.primary, Some("no segments to process")),
            ));
        }

        let output_dir = match self.sink.create_sample_dir(&name) {
            Ok(dir) => dir,
            Err(e) => return Err((name.clone(), Error::resource_creation(&name, Some(format!("{:#}", e))))),
        };

        let descriptor = SampleDescriptor {
            index: self.next_index,
            name,
            pair,
            segments,
            output_dir,
        };
        debug!(
            "Materialized sample {} '{}' with segments {:?}",
            descriptor.index, descriptor.name, descriptor.segments
        );
        self.next_index += 1;
        self.report.materialized += 1;
        Ok(Sample::new(descriptor))
    }
}
