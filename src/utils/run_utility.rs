use std::process::Command;

use log::debug;

use crate::runtime::Error;
use crate::runtime::Result;
use crate::utils::command_to_string;

const STDERR_TAIL_LINES: usize = 5;

/// Run an external utility to completion. A non-zero exit is an ExternalFailure carrying
/// the tail of stderr; failing to start the program at all is UtilityNotExecutable.
/// Returns stdout on success
pub fn run_utility(utility: &str, cmd: &mut Command) -> Result<String> {
    let cmd_string = command_to_string(cmd);
    debug!("Running {}", cmd_string);

    let output = cmd.output().map_err(|_| Error::utility_not_executable(utility))?;
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut tail: Vec<&str> = stderr
        .lines()
        .rev()
        .filter(|l| !l.trim().is_empty())
        .take(STDERR_TAIL_LINES)
        .collect();
    tail.reverse();
    let msg = if tail.is_empty() {
        output.status.to_string()
    } else {
        format!("{}: {}", output.status, tail.join(" | "))
    };
    Err(Error::external_failure(utility, cmd_string, Some(msg)))
}
