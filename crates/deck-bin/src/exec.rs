//! Boundary to whatever actually runs a script.
//!
//! The launcher hands an [`ExecRequest`] to a [`ScriptExecutor`] with the terminal released
//! and only looks at the exit code that comes back. Script output is never parsed.

use anyhow::{Context, Result};
use core_registry::ScriptDescriptor;
use core_state::KeyedHistoryFile;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub script_path: PathBuf,
    /// Program (plus leading arguments) used to run the script. Empty runs the file itself.
    pub interpreter: Vec<String>,
    pub args: Vec<String>,
    /// Environment overlay on top of the launcher's own environment.
    pub env: Vec<(String, String)>,
    /// False pauses for acknowledgement after the script exits.
    pub close_on_exit: bool,
}

impl ExecRequest {
    /// Full command line: interpreter, script, arguments.
    pub fn command_line(&self) -> Vec<String> {
        let mut out = self.interpreter.clone();
        out.push(self.script_path.to_string_lossy().into_owned());
        out.extend(self.args.iter().cloned());
        out
    }

    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOutcome {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

pub trait ScriptExecutor {
    fn execute(&mut self, request: &ExecRequest) -> Result<ExecOutcome>;
}

/// Per-launch adjustments on top of the script's own config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Launch {
    pub extra_args: Option<Vec<String>>,
    pub env: Vec<(String, String)>,
    pub close_on_exit: Option<bool>,
}

/// Program used for a script file, by extension.
pub fn default_interpreter(path: &Path) -> Vec<String> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    let program: &[&str] = match ext.as_deref() {
        Some("py") => &["python3"],
        Some("sh") => &["sh"],
        Some("js") => &["node"],
        Some("ps1") => &["pwsh", "-NoProfile", "-File"],
        Some("rb") => &["ruby"],
        _ => &[],
    };
    program.iter().map(|s| s.to_string()).collect()
}

/// Resolve interpreter, arguments and environment for one launch of `desc`.
///
/// The overlay carries the latest stored value of every variable the script references;
/// entries from `launch.env` come after and win.
pub fn build_request(
    desc: &ScriptDescriptor,
    variables: &KeyedHistoryFile,
    launch: &Launch,
) -> Result<ExecRequest> {
    let interpreter = match desc.config.interpreter().trim() {
        "" => default_interpreter(&desc.path),
        custom => shell_words::split(custom)
            .with_context(|| format!("parsing interpreter of {}", desc.display_name))?,
    };
    let mut args = shell_words::split(desc.config.args())
        .with_context(|| format!("parsing args of {}", desc.display_name))?;
    if let Some(extra) = &launch.extra_args {
        args.extend(extra.iter().cloned());
    }
    let mut env: Vec<(String, String)> = desc
        .variables
        .iter()
        .filter_map(|name| {
            variables
                .latest(name)
                .map(|value| (name.clone(), value.to_string()))
        })
        .collect();
    env.extend(launch.env.iter().cloned());
    Ok(ExecRequest {
        script_path: desc.path.clone(),
        interpreter,
        args,
        env,
        close_on_exit: launch
            .close_on_exit
            .unwrap_or_else(|| desc.config.close_on_exit()),
    })
}

/// Runs scripts as child processes sharing the launcher's terminal.
#[derive(Debug, Default)]
pub struct ProcessExecutor;

impl ScriptExecutor for ProcessExecutor {
    fn execute(&mut self, request: &ExecRequest) -> Result<ExecOutcome> {
        let line = request.command_line();
        let Some((program, rest)) = line.split_first() else {
            anyhow::bail!("empty command line");
        };
        let mut cmd = Command::new(program);
        cmd.args(rest)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(dir) = request.script_path.parent().filter(|d| d.is_dir()) {
            cmd.current_dir(dir);
        }
        debug!(target: "runtime.exec", program = %program, args = rest.len(), "spawn");
        let status = cmd
            .status()
            .with_context(|| format!("running {}", request.script_path.display()))?;
        let outcome = ExecOutcome {
            exit_code: status.code(),
        };
        if !request.close_on_exit {
            pause_for_ack(&format!("[exit status: {status}]"))?;
        }
        Ok(outcome)
    }
}

/// Print `message` and wait for Enter on the cooked terminal.
pub fn pause_for_ack(message: &str) -> Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "\n{message}")?;
    write!(out, "Press Enter to continue...")?;
    out.flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(())
}
