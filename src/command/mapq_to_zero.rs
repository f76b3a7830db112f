use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::debug;

use crate::fileformat::bam::zero_unmapped_mapq_in_place;
use crate::utils;

use super::determine_thread_count;
use super::per_file::run_per_file;

#[derive(Args)]
pub struct MapqToZeroCMD {
    /// Directory of BAM files to rewrite
    #[arg(short = 'd', long = "directory", value_parser = clap::value_parser!(PathBuf))]
    pub path_dir: PathBuf,

    //Thread settings
    #[arg(short = '@', long = "threads", value_parser = clap::value_parser!(usize))]
    num_threads: Option<usize>,
}

impl MapqToZeroCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let num_threads = determine_thread_count(self.num_threads)?;
        utils::check_exists(&self.path_dir)?;

        let bams = utils::list_files_with_suffix(&self.path_dir, ".bam", false)?;
        run_per_file(bams, num_threads, "mapq-to-zero", |bam| {
            let num_changed = zero_unmapped_mapq_in_place(bam)?;
            debug!("Set MAPQ 0 on {} unmapped reads in {}", num_changed, bam.display());
            Ok(())
        })?;

        log::info!("MapqToZero has finished succesfully");
        Ok(())
    }
}
