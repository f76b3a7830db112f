use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use anyhow::Result;
use clap::Args;

use crate::utils;

use super::determine_thread_count;
use super::per_file::run_per_file;

#[derive(Args)]
pub struct ReindexCMD {
    /// Directory tree of BAM files to index
    #[arg(short = 'd', long = "directory", value_parser = clap::value_parser!(PathBuf))]
    pub path_dir: PathBuf,

    //Thread settings
    #[arg(short = '@', long = "threads", value_parser = clap::value_parser!(usize))]
    num_threads: Option<usize>,
}

impl ReindexCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let num_threads = determine_thread_count(self.num_threads)?;
        utils::check_samtools()?;
        utils::check_exists(&self.path_dir)?;

        let bams = utils::list_files_with_suffix(&self.path_dir, ".bam", true)?;
        run_per_file(bams, num_threads, "reindex", |bam| {
            utils::run_utility("samtools", &mut build_index_command(bam))?;
            Ok(())
        })?;

        log::info!("Reindex has finished succesfully");
        Ok(())
    }
}

pub fn build_index_command(bam: &Path) -> Command {
    let mut cmd = Command::new("samtools");
    cmd.arg("index").arg(bam);
    cmd
}
