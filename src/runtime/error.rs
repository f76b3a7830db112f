use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "Index {} is out of range for status array no. {} ({} segments){}",
        index,
        sample,
        len,
        Error::format_msg_as_detail(segment)
    )]
    OutOfRange {
        sample: usize,
        index: usize,
        len: usize,
        segment: Option<String>,
    },

    #[error("Malformed record in {} at line {}: {}", source_name, line, msg)]
    MalformedInput {
        source_name: String,
        line: usize,
        msg: String,
    },

    #[error(
        "Utility '{}' failed on execute '{}'{}",
        utility,
        cmd,
        Error::format_msg_as_detail(msg)
    )]
    ExternalFailure {
        utility: String,
        cmd: String,
        msg: Option<String>,
    },

    #[error(
        "Failed trying to execute utility '{utility}'. Make sure it is in your $PATH and you have execution permissions."
    )]
    UtilityNotExecutable { utility: String },

    #[error("Could not create {:?}{}", path, Error::format_msg_as_detail(msg))]
    ResourceCreation {
        path: PathBuf,
        msg: Option<String>,
    },

    #[error("Failed to write finalization record for sample '{}'{}", sample, Error::format_msg_as_detail(msg))]
    FinalizationFailed { sample: String, msg: Option<String> },

    #[error("File at {:?} not found.", path)]
    FileNotFound { path: PathBuf },
}

impl Error {
    #[cold]
    pub fn out_of_range(sample: usize, index: usize, len: usize) -> Self {
        Error::OutOfRange {
            sample,
            index,
            len,
            segment: None,
        }
    }

    #[cold]
    pub fn malformed_input<S: Into<String>, M: Into<String>>(source_name: S, line: usize, msg: M) -> Self {
        Error::MalformedInput {
            source_name: source_name.into(),
            line,
            msg: msg.into(),
        }
    }

    #[cold]
    pub fn external_failure<U: Into<String>, C: Into<String>, M: Into<String>>(
        utility: U,
        cmd: C,
        msg: Option<M>,
    ) -> Self {
        Error::ExternalFailure {
            utility: utility.into(),
            cmd: cmd.into(),
            msg: msg.map(|m| m.into()),
        }
    }

    #[cold]
    pub fn utility_not_executable<U: Into<String>>(utility: U) -> Self {
        Error::UtilityNotExecutable {
            utility: utility.into(),
        }
    }

    #[cold]
    pub fn resource_creation<P: Into<PathBuf>, M: Into<String>>(path: P, msg: Option<M>) -> Self {
        Error::ResourceCreation {
            path: path.into(),
            msg: msg.map(|m| m.into()),
        }
    }

    #[cold]
    pub fn finalization_failed<S: Into<String>, M: Into<String>>(sample: S, msg: Option<M>) -> Self {
        Error::FinalizationFailed {
            sample: sample.into(),
            msg: msg.map(|m| m.into()),
        }
    }

    #[cold]
    pub fn file_not_found<P: AsRef<std::path::Path>>(path: P) -> Self {
        Error::FileNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn format_msg_as_detail(msg: &Option<String>) -> String {
        match msg {
            Some(m) => format!(" ({})", m),
            None => String::new(),
        }
    }
}
