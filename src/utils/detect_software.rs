use log::debug;
use log::info;
use std::path::Path;
use std::process::Command;

use crate::runtime::Error;
use crate::runtime::Result;

pub fn check_java() -> Result<()> {
    check_utility("java", &["-version"])
}

pub fn check_samtools() -> Result<()> {
    check_utility("samtools", &["--version"])
}

fn check_utility(utility: &str, args: &[&str]) -> Result<()> {
    debug!("Checking for {}", utility);
    if Command::new(utility).args(args).output().is_ok() {
        info!("Found {}", utility);
        Ok(())
    } else {
        Err(Error::utility_not_executable(utility))
    }
}

/// Jar files, references and input directories must exist before any work is dispatched
pub fn check_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(Error::file_not_found(path))
    }
}
