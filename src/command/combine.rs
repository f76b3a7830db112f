use std::fs;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Args;
use log::info;
use log::warn;

use crate::dispatch::catalog::file_stem;
use crate::fileformat::manifest::PairListReader;
use crate::utils;

use super::catenate::DEFAULT_PATH_GATK;

pub const DEFAULT_PATH_OUT: &str = "outfile.vcf";

/// Sample column MuTect emits for tumor-only calls
const NONE_COLUMN: &str = "none";

#[derive(Args)]
pub struct CombineCMD {
    /// Directory containing the VCF files to combine
    #[arg(short = 'd', long = "directory", value_parser = clap::value_parser!(PathBuf), required_unless_present = "path_listing")]
    pub path_dir: Option<PathBuf>,

    /// Pair list used for call. VCFs are combined in the order of the listing
    #[arg(short = 'l', long = "listing", value_parser = clap::value_parser!(PathBuf))]
    pub path_listing: Option<PathBuf>,

    /// FASTA reference
    #[arg(short = 'r', long = "reference", value_parser = clap::value_parser!(PathBuf))]
    pub path_reference: PathBuf,

    /// GATK jar file
    #[arg(short = 'g', long = "gatkpath", value_parser = clap::value_parser!(PathBuf), default_value = DEFAULT_PATH_GATK)]
    pub path_gatk: PathBuf,

    /// Combined output VCF
    #[arg(short = 'o', long = "outfile", value_parser = clap::value_parser!(PathBuf), default_value = DEFAULT_PATH_OUT)]
    pub path_out: PathBuf,

    /// Delete the input VCFs once they are combined
    #[arg(short = 'D', long = "delete-input")]
    pub delete_input: bool,

    /// Drop the "none" sample column left by tumor-only samples
    #[arg(short = 'w', long = "without-nonecol")]
    pub without_nonecol: bool,
}

impl CombineCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        utils::check_java()?;
        utils::check_exists(&self.path_gatk)?;
        utils::check_exists(&self.path_reference)?;

        let path_dir = self.path_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        utils::check_exists(&path_dir)?;

        let path_vcfs = match &self.path_listing {
            Some(listing) => vcfs_from_listing(listing, &path_dir)?,
            None => utils::list_files_with_suffix(&path_dir, ".vcf", false)?,
        };

        Combine::run(&Combine {
            path_vcfs,
            path_reference: self.path_reference.clone(),
            path_gatk: self.path_gatk.clone(),
            path_out: self.path_out.clone(),
            delete_input: self.delete_input,
            without_nonecol: self.without_nonecol,
        })?;

        log::info!("Combine has finished succesfully");
        Ok(())
    }
}

pub struct Combine {
    pub path_vcfs: Vec<PathBuf>,
    pub path_reference: PathBuf,
    pub path_gatk: PathBuf,
    pub path_out: PathBuf,
    pub delete_input: bool,
    pub without_nonecol: bool,
}

impl Combine {
    /// Run the algorithm
    pub fn run(params: &Combine) -> anyhow::Result<()> {
        if params.path_vcfs.is_empty() {
            bail!("No VCF files to combine");
        }
        info!("Combining {} VCF files into {}", params.path_vcfs.len(), params.path_out.display());

        let mut cmd =
            build_combine_command(&params.path_gatk, &params.path_reference, &params.path_vcfs, &params.path_out);
        utils::run_utility("java", &mut cmd)?;

        if params.delete_input {
            for path in &params.path_vcfs {
                if let Err(e) = fs::remove_file(path) {
                    warn!("Could not delete {}: {}", path.display(), e);
                }
            }
        }

        if params.without_nonecol {
            drop_none_column(&params.path_out)?;
        }
        Ok(())
    }
}

/// Track name of a VCF in the combined output, its stem with '-' replaced by '_'
pub fn vcf_tag(path: &Path) -> String {
    file_stem(path).replace('-', "_")
}

/// VCF names a call run produces for each pair of the listing, located in `dir`
pub fn vcfs_from_listing(listing: &Path, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut vcfs = Vec::new();
    for pair in PairListReader::open(listing, dir)? {
        vcfs.push(dir.join(format!("{}.vcf", pair?.sample_name())));
    }
    Ok(vcfs)
}

pub fn build_combine_command(gatk: &Path, reference: &Path, vcfs: &[PathBuf], path_out: &Path) -> Command {
    let mut cmd = Command::new("java");
    cmd.arg("-jar")
        .arg(gatk)
        .arg("-T")
        .arg("CombineVariants")
        .arg("-R")
        .arg(reference)
        .arg("-nt")
        .arg("4");
    for vcf in vcfs {
        cmd.arg(format!("-V:{}", vcf_tag(vcf))).arg(vcf);
    }
    cmd.arg("-o")
        .arg(path_out)
        .arg("-dt")
        .arg("NONE")
        .arg("--genotypemergeoption")
        .arg("UNSORTED");
    cmd
}

////////////////////////
/// Rewrite a VCF without its "none" sample column. Fails if the header line has no such column
pub fn drop_none_column(path: &Path) -> anyhow::Result<()> {
    let path_tmp = utils::temp_sibling(path, "nonecol");

    let reader = BufReader::new(File::open(path).with_context(|| format!("Could not open {}", path.display()))?);
    let mut writer =
        BufWriter::new(File::create(&path_tmp).with_context(|| format!("Could not create {}", path_tmp.display()))?);

    let mut none_pos: Option<usize> = None;
    for line in reader.lines() {
        let line = line?;
        if line.starts_with("##") {
            writeln!(writer, "{}", line)?;
            continue;
        }
        if line.starts_with("#CHROM") {
            none_pos = line.split('\t').position(|col| col == NONE_COLUMN);
            if none_pos.is_none() {
                drop(writer);
                _ = fs::remove_file(&path_tmp);
                bail!("{} has no '{}' column", path.display(), NONE_COLUMN);
            }
        }
        match none_pos {
            Some(pos) => {
                let kept: Vec<&str> = line
                    .split('\t')
                    .enumerate()
                    .filter(|(i, _)| *i != pos)
                    .map(|(_, col)| col)
                    .collect();
                writeln!(writer, "{}", kept.join("\t"))?;
            }
            None => writeln!(writer, "{}", line)?,
        }
    }
    writer.flush()?;
    drop(writer);

    fs::rename(&path_tmp, path).with_context(|| format!("Could not replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_use_stem_without_hyphens() {
        assert_eq!(vcf_tag(Path::new("out/TCGA-01_TCGA-02.vcf")), "TCGA_01_TCGA_02");
        assert_eq!(vcf_tag(Path::new("t1.filtered.vcf")), "t1");
    }

    #[test]
    fn listing_gives_sample_vcfs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let listing = dir.path().join("pairs.txt");
        fs::write(&listing, "tumor normal\nt2.bam n2.bam\nt1.bam\n").unwrap();

        let vcfs = vcfs_from_listing(&listing, Path::new("vcfs")).unwrap();
        assert_eq!(vcfs, vec![PathBuf::from("vcfs/t2_n2.vcf"), PathBuf::from("vcfs/t1.vcf")]);
    }

    #[test]
    fn command_tags_every_input() {
        let cmd = build_combine_command(
            Path::new("gatk.jar"),
            Path::new("ref.fa"),
            &[PathBuf::from("a-1.vcf")],
            Path::new("all.vcf"),
        );
        assert_eq!(
            utils::command_to_string(&cmd),
            "java -jar gatk.jar -T CombineVariants -R ref.fa -nt 4 -V:a_1 a-1.vcf -o all.vcf -dt NONE \
             --genotypemergeoption UNSORTED"
        );
    }

    #[test]
    fn none_column_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.vcf");
        fs::write(
            &path,
            "##fileformat=VCFv4.1\n#CHROM\tPOS\tFORMAT\tnone\tt1\nchr1\t10\tGT\t./.\t0/1\n",
        )
        .unwrap();

        drop_none_column(&path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "##fileformat=VCFv4.1\n#CHROM\tPOS\tFORMAT\tt1\nchr1\t10\tGT\t0/1\n"
        );
    }

    #[test]
    fn missing_none_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.vcf");
        fs::write(&path, "#CHROM\tPOS\tt1\n").unwrap();
        assert!(drop_none_column(&path).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "#CHROM\tPOS\tt1\n");
    }
}
