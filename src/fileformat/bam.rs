use std::fs;
use std::path::Path;

use anyhow::Context;
use log::debug;
use rust_htslib::bam;
use rust_htslib::bam::record::Record as BamRecord;
use rust_htslib::bam::Read;

use crate::dispatch::SegmentEnumerator;
use crate::utils::temp_sibling;

////////////////////////
/// Reference sequence names from the header, in header order
pub fn read_reference_names(path: &Path) -> anyhow::Result<Vec<String>> {
    let reader = bam::Reader::from_path(path).with_context(|| format!("Could not open BAM {}", path.display()))?;
    let names = reader
        .header()
        .target_names()
        .iter()
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .collect();
    Ok(names)
}

/// Segments of a sample are the reference sequences of its primary BAM
pub struct BamHeaderSegments;

impl SegmentEnumerator for BamHeaderSegments {
    fn segments(&self, primary: &Path) -> anyhow::Result<Vec<String>> {
        let names = read_reference_names(primary)?;
        debug!("{} has {} reference sequences", primary.display(), names.len());
        Ok(names)
    }
}

////////////////////////
/// Rewrite a BAM so that every unmapped read has MAPQ 0. The header is kept as is.
/// Returns the number of reads that were changed
pub fn zero_unmapped_mapq(path_in: &Path, path_out: &Path) -> anyhow::Result<u64> {
    let mut reader =
        bam::Reader::from_path(path_in).with_context(|| format!("Could not open BAM {}", path_in.display()))?;
    let header = bam::Header::from_template(reader.header());
    let mut writer = bam::Writer::from_path(path_out, &header, bam::Format::Bam)
        .with_context(|| format!("Could not create BAM {}", path_out.display()))?;

    let mut num_changed = 0;
    let mut record = BamRecord::new();
    while let Some(r) = reader.read(&mut record) {
        r?;
        if record.is_unmapped() && record.mapq() != 0 {
            record.set_mapq(0);
            num_changed += 1;
        }
        writer.write(&record)?;
    }
    Ok(num_changed)
}

/// zero_unmapped_mapq in place, via a temporary file next to the input
pub fn zero_unmapped_mapq_in_place(path: &Path) -> anyhow::Result<u64> {
    let tmp_path = temp_sibling(path, "mapq0");

    let num_changed = zero_unmapped_mapq(path, &tmp_path)?;
    fs::rename(&tmp_path, path).with_context(|| format!("Could not replace {}", path.display()))?;
    Ok(num_changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_bam_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BamHeaderSegments.segments(&dir.path().join("nope.bam")).unwrap_err();
        assert!(format!("{:#}", err).contains("nope.bam"));
    }

    #[test]
    fn header_names_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.bam");

        let view = bam::HeaderView::from_bytes(b"@SQ\tSN:chr1\tLN:1000\n@SQ\tSN:chr2\tLN:500\n@SQ\tSN:chrM\tLN:16\n");
        let header = bam::Header::from_template(&view);
        {
            let _writer = bam::Writer::from_path(&path, &header, bam::Format::Bam).unwrap();
        }

        assert_eq!(read_reference_names(&path).unwrap(), vec!["chr1", "chr2", "chrM"]);
    }

    #[test]
    fn unmapped_reads_get_mapq_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.bam");

        let view = bam::HeaderView::from_bytes(b"@SQ\tSN:chr1\tLN:1000\n");
        let header = bam::Header::from_template(&view);
        {
            let mut writer = bam::Writer::from_path(&path, &header, bam::Format::Bam).unwrap();

            let mut unmapped = BamRecord::new();
            unmapped.set(b"r1", None, b"ACGT", &[30, 30, 30, 30]);
            unmapped.set_tid(-1);
            unmapped.set_pos(-1);
            unmapped.set_mtid(-1);
            unmapped.set_mpos(-1);
            unmapped.set_unmapped();
            unmapped.set_mapq(37);
            writer.write(&unmapped).unwrap();
        }

        assert_eq!(zero_unmapped_mapq_in_place(&path).unwrap(), 1);

        let mut reader = bam::Reader::from_path(&path).unwrap();
        let mut record = BamRecord::new();
        reader.read(&mut record).unwrap().unwrap();
        assert!(record.is_unmapped());
        assert_eq!(record.mapq(), 0);
        assert_eq!(reader.header().target_names(), vec![b"chr1".as_slice()]);
    }
}
