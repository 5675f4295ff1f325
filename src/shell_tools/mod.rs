use crate::error::{CloudError, CloudResult};
use std::io;
use std::process::{Command, Stdio};

/// Exit code reported when the process was killed by a signal
const SIGNALED: i32 = -1;

struct RunDetails {
    stdout: String,
    stderr: String,
    exit_code: i32,
}

pub struct RunResult {
    result: Result<RunDetails, io::Error>,
    /// What gets printed, secrets already masked
    command: String,
}

impl RunResult {
    /// Stdout of a successful run, or the classified failure
    pub fn into_stdout(self) -> CloudResult<String> {
        let command = self.command;
        match self.result {
            Err(source) => Err(CloudError::Spawn { command, source }),
            Ok(details) if details.exit_code != 0 => Err(CloudError::from_cli_failure(&command, details.exit_code, &details.stderr)),
            Ok(details) => Ok(details.stdout),
        }
    }
}

pub fn check_command_exist(command: &str) -> bool {
    if command.contains(' ') {
        return false;
    }

    Command::new(command)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Runs `program` with `args`, no shell in between. `shown` is how the
/// command appears in messages.
pub fn run_command(program: &str, args: &[String], shown: &str) -> RunResult {
    let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

    RunResult {
        result: output.map(|o| RunDetails {
            stdout: String::from_utf8_lossy(&o.stdout).to_string(),
            stderr: String::from_utf8_lossy(&o.stderr).to_string(),
            exit_code: o.status.code().unwrap_or(SIGNALED),
        }),
        command: shown.to_string(),
    }
}
