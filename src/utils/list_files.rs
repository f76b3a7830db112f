use std::path::Path;
use std::path::PathBuf;

use walkdir::WalkDir;

/// Files under `dir` whose name ends with `suffix`, sorted by path.
/// Only the top level is searched unless `recursive` is set
pub fn list_files_with_suffix(dir: &Path, suffix: &str, recursive: bool) -> anyhow::Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(max_depth) {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name().to_string_lossy().ends_with(suffix) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
