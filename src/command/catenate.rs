use std::fs;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Args;
use log::debug;
use log::info;
use walkdir::WalkDir;

use crate::dispatch::sink::FILENAME_SEGMENT_LIST;
use crate::dispatch::sink::FILENAME_STATUS_LIST;
use crate::utils;

use super::determine_thread_count;
use super::per_file::run_per_file;

pub const DEFAULT_PATH_GATK: &str = "gatk.jar";
pub const DIRNAME_STATUSES: &str = "statuses";

#[derive(Args)]
pub struct CatenateCMD {
    /// Parent directory holding the per-sample directories of a call run
    #[arg(short = 'd', long = "directory", value_parser = clap::value_parser!(PathBuf))]
    pub path_parent: PathBuf,

    /// FASTA reference the BAM files were called against
    #[arg(short = 'r', long = "reference", value_parser = clap::value_parser!(PathBuf))]
    pub path_reference: PathBuf,

    /// GATK jar file
    #[arg(short = 'g', long = "gatkpath", value_parser = clap::value_parser!(PathBuf), default_value = DEFAULT_PATH_GATK)]
    pub path_gatk: PathBuf,

    /// Delete the fragments, their indexes and the segment list once catenated
    #[arg(long = "delete-fragments")]
    pub delete_fragments: bool,

    /// List of per-chromosome BAM files. The matching VCFs in the directory are
    /// catenated into <directory>.vcf instead of processing sample directories
    #[arg(short = 'l', long = "listfile", value_parser = clap::value_parser!(PathBuf))]
    pub path_listfile: Option<PathBuf>,

    //Thread settings
    #[arg(short = '@', long = "threads", value_parser = clap::value_parser!(usize))]
    num_threads: Option<usize>,
}

impl CatenateCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let num_threads = determine_thread_count(self.num_threads)?;
        utils::check_java()?;
        utils::check_exists(&self.path_gatk)?;
        utils::check_exists(&self.path_reference)?;
        utils::check_exists(&self.path_parent)?;

        let params = Catenate {
            path_parent: self.path_parent.clone(),
            path_reference: self.path_reference.clone(),
            path_gatk: self.path_gatk.clone(),
            delete_fragments: self.delete_fragments,
            num_threads,
        };
        match &self.path_listfile {
            Some(listfile) => {
                utils::check_exists(listfile)?;
                Catenate::run_listfile(&params, listfile)?;
            }
            None => Catenate::run(params)?,
        }

        log::info!("Catenate has finished succesfully");
        Ok(())
    }
}

pub struct Catenate {
    pub path_parent: PathBuf,
    pub path_reference: PathBuf,
    pub path_gatk: PathBuf,
    pub delete_fragments: bool,
    pub num_threads: usize,
}

impl Catenate {
    /// Run the algorithm
    pub fn run(params: Catenate) -> anyhow::Result<()> {
        let dir_statuses = params.path_parent.join(DIRNAME_STATUSES);
        fs::create_dir_all(&dir_statuses)
            .with_context(|| format!("Could not make directory {}", dir_statuses.display()))?;

        let sample_dirs = find_sample_dirs(&params.path_parent)?;
        info!("Found {} sample directories to catenate", sample_dirs.len());

        let params = Arc::new(params);
        run_per_file(sample_dirs, params.num_threads, "catenate", move |dir| {
            catenate_sample(&params, dir)
        })
    }

    /// Catenate the VCFs of the BAM files named in `listfile` into <directory>.vcf
    pub fn run_listfile(params: &Catenate, listfile: &Path) -> anyhow::Result<()> {
        let vcfs = listfile_vcfs(listfile, &params.path_parent)?;
        if vcfs.is_empty() {
            bail!("No VCF files listed in {}", listfile.display());
        }
        let path_out = directory_vcf(&params.path_parent)?;
        info!("Catenating {} VCF files into {}", vcfs.len(), path_out.display());

        let mut cmd = build_catvariants_command(&params.path_gatk, &params.path_reference, &path_out, &vcfs);
        utils::run_utility("java", &mut cmd)?;

        if params.delete_fragments {
            remove_with_indexes(&vcfs)?;
        }
        Ok(())
    }
}

/// VCFs in `dir` for the BAM files of a listing: one name per line, .bam replaced by .vcf
pub fn listfile_vcfs(listfile: &Path, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let file = fs::File::open(listfile).with_context(|| format!("Could not open {}", listfile.display()))?;
    let mut vcfs = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let bam = line.trim();
        if bam.is_empty() {
            continue;
        }
        let name = Path::new(bam)
            .file_name()
            .with_context(|| format!("No file name in '{}' of {}", bam, listfile.display()))?
            .to_string_lossy()
            .replace(".bam", ".vcf");
        vcfs.push(dir.join(name));
    }
    Ok(vcfs)
}

/// Output of a listfile catenation: the directory's own name with .vcf, next to it
pub fn directory_vcf(dir: &Path) -> anyhow::Result<PathBuf> {
    let name = dir
        .file_name()
        .with_context(|| format!("No directory name in {}", dir.display()))?
        .to_string_lossy()
        .into_owned();
    Ok(dir.with_file_name(format!("{}.vcf", name)))
}

/// Immediate subdirectories of `parent` that hold a segment order list
pub fn find_sample_dirs(parent: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(parent).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_dir() && entry.path().join(FILENAME_SEGMENT_LIST).is_file() {
            dirs.push(entry.into_path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Per-segment VCF fragments of a sample directory, in the order of its segment list
pub fn fragment_paths(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let path_list = dir.join(FILENAME_SEGMENT_LIST);
    let file = fs::File::open(&path_list).with_context(|| format!("Could not open {}", path_list.display()))?;
    let mut fragments = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let segment = line.trim();
        if !segment.is_empty() {
            fragments.push(dir.join(format!("{}.vcf", segment)));
        }
    }
    Ok(fragments)
}

/// Fragments that exist and have content. MuTect leaves nothing usable for a segment it failed on
pub fn existing_fragments(fragments: &[PathBuf]) -> Vec<PathBuf> {
    fragments
        .iter()
        .filter(|p| fs::metadata(p).map(|m| m.len() > 0).unwrap_or(false))
        .cloned()
        .collect()
}

pub fn build_catvariants_command(gatk: &Path, reference: &Path, path_out: &Path, fragments: &[PathBuf]) -> Command {
    let mut cmd = Command::new("java");
    cmd.arg("-cp")
        .arg(gatk)
        .arg("org.broadinstitute.gatk.tools.CatVariants")
        .arg("-assumeSorted")
        .arg("-R")
        .arg(reference)
        .arg("-out")
        .arg(path_out);
    for fragment in fragments {
        cmd.arg("-V").arg(fragment);
    }
    cmd
}

fn catenate_sample(params: &Catenate, dir: &Path) -> anyhow::Result<()> {
    let name = dir
        .file_name()
        .with_context(|| format!("No directory name in {}", dir.display()))?
        .to_string_lossy()
        .into_owned();
    let fragments = fragment_paths(dir)?;
    let kept = existing_fragments(&fragments);
    if kept.is_empty() {
        bail!("No non-empty VCF fragments in {}", dir.display());
    }
    debug!("Catenating {} of {} fragments for {}", kept.len(), fragments.len(), name);

    let path_out = params.path_parent.join(format!("{}.vcf", name));
    let mut cmd = build_catvariants_command(&params.path_gatk, &params.path_reference, &path_out, &kept);
    utils::run_utility("java", &mut cmd)?;

    let dir_statuses = params.path_parent.join(DIRNAME_STATUSES);
    if params.delete_fragments {
        clean_sample_dir(dir, &dir_statuses, &name, &fragments)
    } else {
        copy_status_list(dir, &dir_statuses, &name)
    }
}

/// Removes what catenation consumed, moves the status list aside and removes the directory
pub fn clean_sample_dir(dir: &Path, dir_statuses: &Path, name: &str, fragments: &[PathBuf]) -> anyhow::Result<()> {
    remove_with_indexes(fragments)?;
    remove_if_present(&dir.join(FILENAME_SEGMENT_LIST))?;

    let path_status = dir.join(FILENAME_STATUS_LIST);
    if path_status.exists() {
        let dest = dir_statuses.join(format!("{}.list", name));
        fs::rename(&path_status, &dest).with_context(|| format!("Could not move status list to {}", dest.display()))?;
    }
    fs::remove_dir(dir).with_context(|| format!("Could not remove {}", dir.display()))?;
    Ok(())
}

/// Copies the status list to `statuses/`, leaving the sample directory as it is
pub fn copy_status_list(dir: &Path, dir_statuses: &Path, name: &str) -> anyhow::Result<()> {
    let path_status = dir.join(FILENAME_STATUS_LIST);
    if path_status.exists() {
        let dest = dir_statuses.join(format!("{}.list", name));
        fs::copy(&path_status, &dest).with_context(|| format!("Could not copy status list to {}", dest.display()))?;
    }
    Ok(())
}

/// Removes each file and its .idx. GATK writes no index for an empty VCF, so absent files are fine
fn remove_with_indexes(paths: &[PathBuf]) -> anyhow::Result<()> {
    for path in paths {
        remove_if_present(path)?;
        let mut idx = path.clone().into_os_string();
        idx.push(".idx");
        remove_if_present(Path::new(&idx))?;
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> anyhow::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Could not remove {}", path.display())),
    }
}
