//! Running external tools with a deadline

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Error, Result};

/// How often a running child is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Lines of stderr/stdout kept in error messages
const TAIL_LINES: usize = 12;

/// Captured result of a finished tool
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Run `command` to completion, killing it if it outlives `timeout`
///
/// Output is captured. A non-zero exit, a spawn failure and an expired
/// deadline are all [`Error::Tool`]. On unix the tool runs in its own process
/// group and a timeout kills the whole group, so helpers it forked (pdfjam
/// runs pdflatex) go down with it. Elsewhere only the direct child is killed.
pub fn run_tool(command: &mut Command, timeout: Duration) -> Result<ToolOutput> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!(program = %program, args = ?command.get_args().collect::<Vec<_>>(), "running tool");

    own_process_group(command);
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Tool {
            program: program.clone(),
            reason: if e.kind() == io::ErrorKind::NotFound {
                "not found on PATH (is it installed?)".to_string()
            } else {
                format!("failed to start: {}", e)
            },
        })?;

    // Drain both pipes concurrently so a chatty tool cannot block on a full pipe
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = wait_with_deadline(&mut child, timeout).map_err(|reason| Error::Tool {
        program: program.clone(),
        reason,
    })?;

    let output = ToolOutput {
        status,
        stdout: join(stdout),
        stderr: join(stderr),
    };

    if !output.status.success() {
        return Err(Error::Tool {
            program,
            reason: format!("exited with {}\n{}", output.status, output.diagnostics()),
        });
    }

    Ok(output)
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::result::Result<ExitStatus, String> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                kill_process_group(child);
                let _ = child.kill();
                let _ = child.wait();
                return Err(format!("timed out after {}s and was killed", timeout.as_secs_f32()));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(format!("failed while waiting: {}", e)),
        }
    }
}

#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

/// SIGKILL every process in the child's group
///
/// The group id equals the child's pid because of [`own_process_group`].
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let status = Command::new("kill")
        .args(["-KILL", "--", &format!("-{}", child.id())])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        debug!(pid = child.id(), error = %e, "could not signal process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn join(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

impl ToolOutput {
    /// Last lines of stderr, or of stdout when stderr is empty (pdflatex logs to stdout)
    pub fn diagnostics(&self) -> String {
        let text = if self.stderr.iter().any(|b| !b.is_ascii_whitespace()) {
            String::from_utf8_lossy(&self.stderr)
        } else {
            String::from_utf8_lossy(&self.stdout)
        };
        let lines: Vec<&str> = text.lines().collect();
        lines[lines.len().saturating_sub(TAIL_LINES)..].join("\n")
    }
}
