mod command_to_string;
mod detect_software;
mod list_files;
mod run_utility;
mod temp_sibling;

pub use command_to_string::command_to_string;

pub use detect_software::check_exists;
pub use detect_software::check_java;
pub use detect_software::check_samtools;

pub use list_files::list_files_with_suffix;

pub use run_utility::run_utility;
pub use temp_sibling::temp_sibling;
