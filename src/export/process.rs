//! Bounded execution of external converters.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use log::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const STDERR_EXCERPT_CHARS: usize = 400;

/// Runs `command` to completion, killing it once `timeout` has elapsed.
///
/// Stdout is discarded. Stderr goes to an anonymous temporary file so a chatty child can never
/// block on a full pipe, and its tail becomes the failure reason.
pub fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<(), String> {
    let program = command.get_program().to_string_lossy().into_owned();
    let mut stderr_file =
        tempfile::tempfile().map_err(|err| format!("cannot capture stderr of {program}: {err}"))?;
    let stderr_handle = stderr_file
        .try_clone()
        .map_err(|err| format!("cannot capture stderr of {program}: {err}"))?;

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(stderr_handle));
    debug!("Spawning {command:?}");

    let mut child = command
        .spawn()
        .map_err(|err| format!("failed to start {program}: {err}"))?;

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(format!(
                        "{program} timed out after {}s and was killed",
                        timeout.as_secs()
                    ));
                }
                sleep(POLL_INTERVAL);
            }
            Err(err) => {
                let _ = child.kill();
                return Err(format!("failed to wait for {program}: {err}"));
            }
        }
    };

    if status.success() {
        Ok(())
    } else {
        Err(failure_reason(&program, status, &mut stderr_file))
    }
}

fn failure_reason(program: &str, status: ExitStatus, stderr: &mut File) -> String {
    let mut captured = String::new();
    if stderr.seek(SeekFrom::Start(0)).is_ok() {
        let mut bytes = Vec::new();
        if stderr.read_to_end(&mut bytes).is_ok() {
            captured = String::from_utf8_lossy(&bytes).trim().to_string();
        }
    }

    let status = match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".to_string(),
    };
    if captured.is_empty() {
        format!("{program} failed with {status}")
    } else {
        format!("{program} failed with {status}: {}", tail(&captured, STDERR_EXCERPT_CHARS))
    }
}

fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    match text.char_indices().nth(skip) {
        Some((index, _)) => &text[index..],
        None => text,
    }
}

/// A converter that exits with status 0 must still leave a non-empty file behind.
pub fn verify_output(target: &Path) -> Result<(), String> {
    match std::fs::metadata(target) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(format!("{} was created but is empty", target.display())),
        Err(_) => Err(format!("no output was written to {}", target.display())),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[test]
    fn successful_command() {
        assert!(run_with_timeout(shell("exit 0"), Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn failure_reports_stderr() {
        let err = run_with_timeout(shell("echo broken >&2; exit 3"), Duration::from_secs(5))
            .expect_err("non-zero exit");
        assert!(err.contains("exit code 3"), "{err}");
        assert!(err.contains("broken"), "{err}");
    }

    #[test]
    fn slow_command_is_killed() {
        let start = Instant::now();
        let err = run_with_timeout(shell("sleep 10"), Duration::from_millis(300))
            .expect_err("timeout");
        assert!(err.contains("timed out"), "{err}");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_program_fails_to_start() {
        let err = run_with_timeout(
            Command::new("/nonexistent/converter-binary"),
            Duration::from_secs(1),
        )
        .expect_err("spawn failure");
        assert!(err.starts_with("failed to start"), "{err}");
    }

    #[test]
    fn empty_output_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("out.pdf");
        assert!(verify_output(&target).is_err());
        std::fs::write(&target, b"").expect("write");
        assert!(verify_output(&target).unwrap_err().contains("empty"));
        std::fs::write(&target, b"%PDF").expect("write");
        assert!(verify_output(&target).is_ok());
    }

    #[test]
    fn tail_keeps_the_end() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("abc", 10), "abc");
    }
}
