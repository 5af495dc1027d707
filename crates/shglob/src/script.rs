//! Script evaluator capability.
//!
//! The `e`/`+` qualifiers and the `oe`/`Oe` sort keys run a caller-supplied
//! code snippet against each candidate file. The engine only needs two
//! things from the host: an exit status, and (for sort keys) one captured
//! output string. The candidate path is bound to the well-known `REPLY`
//! variable.

use std::process::{Command, Stdio};

use crate::fs::FsError;

/// Evaluate code snippets with a candidate filename bound to `REPLY`.
pub trait ScriptEval {
    /// Run `code`; a zero exit status means the candidate is accepted.
    fn eval(&self, code: &str, candidate: &str) -> Result<i32, FsError>;

    /// Run `code` and capture its first line of output, used as a sort key.
    fn eval_capture(&self, code: &str, candidate: &str) -> Result<String, FsError>;
}

/// Shell-backed evaluator: runs snippets via `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellEval {
    shell: String,
}

impl Default for ShellEval {
    fn default() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
        }
    }
}

impl ShellEval {
    /// Use a specific shell binary instead of `/bin/sh`.
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    fn command(&self, code: &str, candidate: &str) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(code)
            .env("REPLY", candidate)
            .stdin(Stdio::null());
        cmd
    }
}

impl ScriptEval for ShellEval {
    fn eval(&self, code: &str, candidate: &str) -> Result<i32, FsError> {
        let status = self
            .command(code, candidate)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| FsError::Io(format!("{}: {}", self.shell, e)))?;
        Ok(status.code().unwrap_or(-1))
    }

    fn eval_capture(&self, code: &str, candidate: &str) -> Result<String, FsError> {
        let output = self
            .command(code, candidate)
            .stderr(Stdio::null())
            .output()
            .map_err(|e| FsError::Io(format!("{}: {}", self.shell, e)))?;
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.lines().next().unwrap_or("").to_string())
    }
}
