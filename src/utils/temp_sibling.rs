use std::path::Path;
use std::path::PathBuf;

/// Temporary path next to `path`, for tools that cannot write over their own input.
/// "dir/a.bam" with tag "rg" gives "dir/a.bam.rg.tmp"
pub fn temp_sibling(path: &Path, tag: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.tmp", tag));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_in_same_directory() {
        assert_eq!(temp_sibling(Path::new("bams/a.bam"), "rg"), PathBuf::from("bams/a.bam.rg.tmp"));
    }
}
