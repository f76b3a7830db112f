use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Args;

use crate::utils;

use super::determine_thread_count;
use super::per_file::run_per_file;

pub const DEFAULT_PATH_PICARD: &str = "picard.jar";

/// Read group fields AddOrReplaceReadGroups requires, in the order they are passed on
pub const READ_GROUP_FIELDS: [&str; 5] = ["rgid", "rglb", "rgpl", "rgpu", "rgsm"];

#[derive(Args)]
pub struct AddGroupsCMD {
    /// Directory containing the BAM files to add read groups to
    #[arg(short = 'd', long = "inputdir", value_parser = clap::value_parser!(PathBuf))]
    pub path_dir: PathBuf,

    /// Read group fields as rg_field=value, in any order
    #[arg(
        long = "info",
        num_args = 5,
        value_names = ["RGID", "RGLB", "RGPL", "RGPU", "RGSM"],
        default_values = ["rgid=group1", "rglb=lib1", "rgpl=illumina", "rgpu=unit1", "rgsm=sample1"]
    )]
    pub info: Vec<String>,

    /// Picard jar file
    #[arg(short = 'p', long = "picardpath", value_parser = clap::value_parser!(PathBuf), default_value = DEFAULT_PATH_PICARD)]
    pub path_picard: PathBuf,

    //Thread settings
    #[arg(short = '@', long = "threads", value_parser = clap::value_parser!(usize))]
    num_threads: Option<usize>,
}

impl AddGroupsCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let num_threads = determine_thread_count(self.num_threads)?;
        let read_group = ReadGroup::parse(&self.info)?;
        utils::check_java()?;
        utils::check_exists(&self.path_picard)?;
        utils::check_exists(&self.path_dir)?;

        let bams = utils::list_files_with_suffix(&self.path_dir, ".bam", false)?;
        let path_picard = self.path_picard.clone();
        let read_group = Arc::new(read_group);
        run_per_file(bams, num_threads, "add-groups", move |bam| {
            add_read_group(&path_picard, &read_group, bam)
        })?;

        log::info!("AddGroups has finished succesfully");
        Ok(())
    }
}

/// Values for the five read group fields
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadGroup {
    values: [String; 5],
}

impl ReadGroup {
    /// Parse rg_field=value pairs. Each field must be given exactly once
    pub fn parse(pairs: &[String]) -> anyhow::Result<ReadGroup> {
        let mut values: [Option<String>; 5] = Default::default();
        for pair in pairs {
            let Some((key, value)) = pair.split_once('=') else {
                bail!("Read group info '{}' is not of the form rg_field=value", pair);
            };
            let key = key.trim().to_lowercase();
            let Some(pos) = READ_GROUP_FIELDS.iter().position(|f| *f == key) else {
                bail!("Unknown read group field '{}', expected one of {:?}", key, READ_GROUP_FIELDS);
            };
            if values[pos].replace(value.trim().to_string()).is_some() {
                bail!("Read group field '{}' given twice", key);
            }
        }

        let mut out: [String; 5] = Default::default();
        for (i, value) in values.into_iter().enumerate() {
            match value {
                Some(v) => out[i] = v,
                None => bail!("Read group field '{}' is missing", READ_GROUP_FIELDS[i]),
            }
        }
        Ok(ReadGroup { values: out })
    }

    /// Picard arguments, RGID=... RGLB=... and so on
    pub fn picard_args(&self) -> Vec<String> {
        READ_GROUP_FIELDS
            .iter()
            .zip(&self.values)
            .map(|(field, value)| format!("{}={}", field.to_uppercase(), value))
            .collect()
    }
}

pub fn build_add_groups_command(picard: &Path, read_group: &ReadGroup, path_in: &Path, path_out: &Path) -> Command {
    let mut cmd = Command::new("java");
    cmd.arg("-jar")
        .arg(picard)
        .arg("AddOrReplaceReadGroups")
        .arg(format!("INPUT={}", path_in.display()))
        .arg(format!("OUTPUT={}", path_out.display()))
        .args(read_group.picard_args());
    cmd
}

fn add_read_group(picard: &Path, read_group: &ReadGroup, bam: &Path) -> anyhow::Result<()> {
    let path_tmp = utils::temp_sibling(bam, "rg");
    let mut cmd = build_add_groups_command(picard, read_group, bam, &path_tmp);
    if let Err(e) = utils::run_utility("java", &mut cmd) {
        _ = fs::remove_file(&path_tmp);
        return Err(e.into());
    }
    fs::rename(&path_tmp, bam).with_context(|| format!("Could not replace {}", bam.display()))?;
    Ok(())
}
