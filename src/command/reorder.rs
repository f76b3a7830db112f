use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use anyhow::Context;
use anyhow::Result;
use clap::Args;

use crate::utils;

use super::add_groups::DEFAULT_PATH_PICARD;
use super::determine_thread_count;
use super::per_file::run_per_file;

#[derive(Args)]
pub struct ReorderCMD {
    /// FASTA reference giving the sequence order
    #[arg(short = 'f', long = "fasta", value_parser = clap::value_parser!(PathBuf))]
    pub path_fasta: PathBuf,

    /// Directory tree of BAM files to reorder
    #[arg(short = 'd', long = "directory", value_parser = clap::value_parser!(PathBuf))]
    pub path_dir: PathBuf,

    /// Picard jar file
    #[arg(short = 'p', long = "picardpath", value_parser = clap::value_parser!(PathBuf), default_value = DEFAULT_PATH_PICARD)]
    pub path_picard: PathBuf,

    //Thread settings
    #[arg(short = '@', long = "threads", value_parser = clap::value_parser!(usize))]
    num_threads: Option<usize>,
}

impl ReorderCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let num_threads = determine_thread_count(self.num_threads)?;
        utils::check_java()?;
        utils::check_exists(&self.path_picard)?;
        utils::check_exists(&self.path_fasta)?;
        utils::check_exists(&self.path_dir)?;

        let bams = utils::list_files_with_suffix(&self.path_dir, ".bam", true)?;
        let path_picard = self.path_picard.clone();
        let path_fasta = self.path_fasta.clone();
        run_per_file(bams, num_threads, "reorder", move |bam| {
            reorder_bam(&path_picard, &path_fasta, bam)
        })?;

        log::info!("Reorder has finished succesfully");
        Ok(())
    }
}

pub fn build_reorder_command(picard: &Path, fasta: &Path, path_in: &Path, path_out: &Path) -> Command {
    let mut cmd = Command::new("java");
    cmd.arg("-jar")
        .arg(picard)
        .arg("ReorderSam")
        .arg(format!("INPUT={}", path_in.display()))
        .arg(format!("REFERENCE={}", fasta.display()))
        .arg(format!("OUTPUT={}", path_out.display()));
    cmd
}

fn reorder_bam(picard: &Path, fasta: &Path, bam: &Path) -> anyhow::Result<()> {
    let path_tmp = utils::temp_sibling(bam, "reorder");
    let mut cmd = build_reorder_command(picard, fasta, bam, &path_tmp);
    if let Err(e) = utils::run_utility("java", &mut cmd) {
        _ = fs::remove_file(&path_tmp);
        return Err(e.into());
    }
    fs::rename(&path_tmp, bam).with_context(|| format!("Could not replace {}", bam.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorder_command() {
        let cmd = build_reorder_command(
            Path::new("picard.jar"),
            Path::new("hg19.fa"),
            Path::new("x/a.bam"),
            Path::new("x/a.bam.reorder.tmp"),
        );
        assert_eq!(
            utils::command_to_string(&cmd),
            "java -jar picard.jar ReorderSam INPUT=x/a.bam REFERENCE=hg19.fa OUTPUT=x/a.bam.reorder.tmp"
        );
    }
}
