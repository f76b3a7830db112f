use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Args;
use log::info;

use crate::dispatch::Dispatcher;
use crate::dispatch::FsOutputSink;
use crate::dispatch::ManifestSource;
use crate::dispatch::RunSummary;
use crate::dispatch::SampleDescriptor;
use crate::dispatch::SegmentRunner;
use crate::dispatch::WorkCatalog;
use crate::fileformat::manifest::pairs_from_args;
use crate::fileformat::manifest::PairListReader;
use crate::fileformat::BamHeaderSegments;
use crate::utils;

use super::determine_worker_count;

pub const DEFAULT_PATH_MUTECT: &str = "mutect.jar";
pub const DEFAULT_PATH_OUTPUT: &str = "output";

#[derive(Args)]
pub struct CallCMD {
    /// MuTect jar file
    #[arg(short = 'm', long = "mupath", value_parser = clap::value_parser!(PathBuf), default_value = DEFAULT_PATH_MUTECT)]
    pub path_mutect: PathBuf,

    /// File listing tumor/normal pairs, one pair per line
    #[arg(short = 'b', long = "bamlistfile", value_parser = clap::value_parser!(PathBuf), conflicts_with = "pairs", required_unless_present = "pairs")]
    pub path_bamlist: Option<PathBuf>,

    /// Pairs given directly, as tumor.bam:normal.bam or tumor.bam
    #[arg(short = 'p', long = "pairs", num_args = 1.., required_unless_present = "path_bamlist")]
    pub pairs: Vec<String>,

    /// Extra options passed on to MuTect
    #[arg(short = 'M', long = "mutectopts", default_value = "", allow_hyphen_values = true)]
    pub mutect_opts: String,

    /// FASTA reference
    #[arg(short = 'f', long = "fasta", value_parser = clap::value_parser!(PathBuf))]
    pub path_fasta: PathBuf,

    /// Directory the input BAM files are in. Default: working directory
    #[arg(short = 'i', long = "inputdir", value_parser = clap::value_parser!(PathBuf))]
    pub path_input: Option<PathBuf>,

    /// Parent directory for the per-sample output directories
    #[arg(short = 'o', long = "outputdir", value_parser = clap::value_parser!(PathBuf), default_value = DEFAULT_PATH_OUTPUT)]
    pub path_out: PathBuf,

    //Thread settings
    #[arg(short = '@', long = "threads", value_parser = clap::value_parser!(usize))]
    num_threads: Option<usize>,
}

impl CallCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let num_workers = determine_worker_count(self.num_threads)?;
        info!("Using {} worker threads", num_workers);

        utils::check_java()?;
        utils::check_exists(&self.path_mutect)?;
        utils::check_exists(&self.path_fasta)?;

        let path_input = match &self.path_input {
            Some(p) => p.clone(),
            None => std::env::current_dir().context("Failed to get current directory")?,
        };

        let summary = Call::run(&Call {
            path_mutect: self.path_mutect.clone(),
            path_fasta: self.path_fasta.clone(),
            mutect_opts: self.mutect_opts.split_whitespace().map(String::from).collect(),
            path_bamlist: self.path_bamlist.clone(),
            pairs: self.pairs.clone(),
            path_input,
            path_out: self.path_out.clone(),
            num_workers,
        })?;

        for worker in &summary.workers {
            println!("{}", worker);
        }
        println!(
            "Finalized {} of {} samples ({} malformed records, {} samples skipped)",
            summary.num_finalized(),
            summary.samples.len(),
            summary.catalog.malformed,
            summary.catalog.skipped.len()
        );

        check_summary(&summary)?;
        log::info!("Call has finished succesfully");
        Ok(())
    }
}

pub struct Call {
    pub path_mutect: PathBuf,
    pub path_fasta: PathBuf,
    pub mutect_opts: Vec<String>,
    pub path_bamlist: Option<PathBuf>,
    pub pairs: Vec<String>,
    pub path_input: PathBuf,
    pub path_out: PathBuf,
    pub num_workers: usize,
}

impl Call {
    /// Run the algorithm
    pub fn run(params: &Call) -> anyhow::Result<RunSummary> {
        fs::create_dir_all(&params.path_out)
            .with_context(|| format!("Could not make output directory {}", params.path_out.display()))?;

        let manifest: ManifestSource = match &params.path_bamlist {
            Some(path) => Box::new(PairListReader::open(path, &params.path_input)?),
            None => Box::new(pairs_from_args(params.pairs.clone(), &params.path_input)),
        };

        let sink = Arc::new(FsOutputSink::new(&params.path_out));
        let catalog = WorkCatalog::new(manifest, Arc::new(BamHeaderSegments), sink.clone());
        let runner = Arc::new(MutectRunner {
            path_mutect: params.path_mutect.clone(),
            path_fasta: params.path_fasta.clone(),
            extra_opts: params.mutect_opts.clone(),
        });

        Ok(Dispatcher::new(params.num_workers, catalog, runner, sink).run())
    }
}

/// Fails if a worker faulted or a sample's finalization record could not be written
pub fn check_summary(summary: &RunSummary) -> anyhow::Result<()> {
    let faulted = summary.faulted_workers();
    if !faulted.is_empty() {
        bail!("Worker threads {:?} terminated abnormally", faulted);
    }
    let unrecorded = summary.finalize_failures();
    if !unrecorded.is_empty() {
        bail!("Could not write the finalization record of samples {:?}", unrecorded);
    }
    Ok(())
}

///////////////////////////////
/// Runs MuTect on one reference sequence of a tumor/normal pair, writing <segment>.vcf
/// into the sample directory
pub struct MutectRunner {
    pub path_mutect: PathBuf,
    pub path_fasta: PathBuf,
    pub extra_opts: Vec<String>,
}

impl MutectRunner {
    pub fn build_command(&self, sample: &SampleDescriptor, segment: &str) -> Command {
        let mut cmd = Command::new("java");
        cmd.arg("-Xmx2g")
            .arg("-jar")
            .arg(&self.path_mutect)
            .arg("--analysis_type")
            .arg("MuTect")
            .arg("--showFullBamList")
            .arg("--reference_sequence")
            .arg(&self.path_fasta);
        if let Some(normal) = &sample.pair.secondary {
            cmd.arg("--input_file:normal").arg(normal);
        }
        cmd.arg("--input_file:tumor")
            .arg(&sample.pair.primary)
            .arg("--intervals")
            .arg(segment)
            .arg("-vcf")
            .arg(sample.output_dir.join(format!("{}.vcf", segment)))
            .args(&self.extra_opts);
        cmd
    }
}

impl SegmentRunner for MutectRunner {
    fn run(&self, sample: &SampleDescriptor, segment: &str) -> anyhow::Result<()> {
        utils::run_utility("java", &mut self.build_command(sample, segment))?;
        Ok(())
    }
}
