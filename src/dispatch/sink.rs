use std::fs;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use log::info;
use serde::Serialize;

use crate::dispatch::catalog::Sample;
use crate::dispatch::status::SegmentStatus;
use crate::runtime::Error;
use crate::runtime::Result;

pub const FILENAME_STATUS_LIST: &str = "status.list";
pub const FILENAME_SEGMENT_LIST: &str = "chrs.list";

/// Where per-sample output goes
pub trait OutputSink: Send + Sync {
    fn create_sample_dir(&self, name: &str) -> anyhow::Result<PathBuf>;

    fn write_finalization_record(&self, dir: &Path, outcomes: &[(String, SegmentStatus)]) -> anyhow::Result<()>;

    fn write_segment_order(&self, dir: &Path, segments: &[String]) -> anyhow::Result<()>;
}

#[derive(Serialize)]
struct StatusRow<'a> {
    segment: &'a str,
    status: SegmentStatus,
}

///////////////////////////////
/// Sample directories under a parent output directory, holding status.list and chrs.list
pub struct FsOutputSink {
    parent: PathBuf,
}

impl FsOutputSink {
    pub fn new(parent: &Path) -> FsOutputSink {
        FsOutputSink {
            parent: parent.to_path_buf(),
        }
    }
}

impl OutputSink for FsOutputSink {
    fn create_sample_dir(&self, name: &str) -> anyhow::Result<PathBuf> {
        let dir = self.parent.join(name);
        fs::create_dir(&dir).with_context(|| format!("Could not make directory {}", dir.display()))?;
        Ok(dir)
    }

    fn write_finalization_record(&self, dir: &Path, outcomes: &[(String, SegmentStatus)]) -> anyhow::Result<()> {
        let path = dir.join(FILENAME_STATUS_LIST);
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(&path)
            .with_context(|| format!("Could not create {}", path.display()))?;
        for (segment, status) in outcomes {
            writer.serialize(StatusRow {
                segment,
                status: *status,
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_segment_order(&self, dir: &Path, segments: &[String]) -> anyhow::Result<()> {
        let path = dir.join(FILENAME_SEGMENT_LIST);
        let file = File::create(&path).with_context(|| format!("Could not create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for segment in segments {
            writeln!(writer, "{}", segment)?;
        }
        writer.flush()?;
        Ok(())
    }
}

///////////////////////////////
/// Writes the once-per-sample records. The caller guarantees that it won the
/// finalized flag of the sample's table, so this runs at most once per sample
pub struct Finalizer {
    sink: Arc<dyn OutputSink>,
}

impl Finalizer {
    pub fn new(sink: Arc<dyn OutputSink>) -> Finalizer {
        Finalizer { sink }
    }

    pub fn finalize(&self, sample: &Sample) -> Result<()> {
        let descriptor = &sample.descriptor;
        let outcomes: Vec<(String, SegmentStatus)> = descriptor
            .segments
            .iter()
            .cloned()
            .zip(sample.table.snapshot())
            .collect();

        self.sink
            .write_finalization_record(&descriptor.output_dir, &outcomes)
            .map_err(|e| Error::finalization_failed(&descriptor.name, Some(format!("{:#}", e))))?;
        self.sink
            .write_segment_order(&descriptor.output_dir, &descriptor.segments)
            .map_err(|e| Error::finalization_failed(&descriptor.name, Some(format!("{:#}", e))))?;

        sample.mark_record_written();

        let num_failed = outcomes.iter().filter(|(_, s)| *s == SegmentStatus::Error).count();
        info!(
            "Finalized sample '{}': {} segments, {} failed",
            descriptor.name,
            outcomes.len(),
            num_failed
        );
        Ok(())
    }
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemorySink {
    pub records: parking_lot::Mutex<Vec<(PathBuf, Vec<(String, SegmentStatus)>)>>,
}

#[cfg(test)]
impl OutputSink for MemorySink {
    fn create_sample_dir(&self, name: &str) -> anyhow::Result<PathBuf> {
        Ok(PathBuf::from(name))
    }

    fn write_finalization_record(&self, dir: &Path, outcomes: &[(String, SegmentStatus)]) -> anyhow::Result<()> {
        self.records.lock().push((dir.to_path_buf(), outcomes.to_vec()));
        Ok(())
    }

    fn write_segment_order(&self, _dir: &Path, _segments: &[String]) -> anyhow::Result<()> {
        Ok(())
    }
}
