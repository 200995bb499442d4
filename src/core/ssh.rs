//! ssh/scp subprocess client implementing the [`RemoteHost`] contract.

use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use crate::error::{Error, Result};
use crate::remote::{CommandOutput, RemoteHost};

#[derive(Debug)]
pub struct SshHost {
    pub hostname: String,
    pub identity_file: Option<String>,
    /// When true, all commands run locally instead of over SSH.
    /// Set automatically when the hostname is localhost/127.0.0.1/::1.
    pub is_local: bool,
}

impl SshHost {
    pub fn new(host_id: &str, hostname: &str, identity_file: Option<&str>) -> Result<Self> {
        let identity_file = match identity_file {
            Some(path) if !path.is_empty() => {
                let expanded = shellexpand::tilde(path).to_string();
                if !std::path::Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(host_id, expanded));
                }
                Some(expanded)
            }
            _ => None,
        };

        let is_local = is_local_host(hostname);
        if is_local {
            debug!(host_id, hostname, "host is localhost, using local execution");
        }

        Ok(Self {
            hostname: hostname.to_string(),
            identity_file,
            is_local,
        })
    }

    pub fn localhost() -> Self {
        Self {
            hostname: "localhost".to_string(),
            identity_file: None,
            is_local: true,
        }
    }

    fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        // Batch options prevent hangs on stalled connections or prompts.
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args.push(format!("root@{}", self.hostname));
        args.push(command.to_string());
        args
    }

    fn scp_args(&self, source: &str, dest: &str) -> Vec<String> {
        let mut args = vec!["-r".to_string()];
        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
        ]);
        args.push(source.to_string());
        args.push(dest.to_string());
        args
    }

    fn copy(&self, source: &str, dest: &str) -> Result<()> {
        let output = if self.is_local {
            run_captured(
                Command::new("cp").args(["-a", source, dest]),
                &format!("cp -a {} {}", source, dest),
                None,
            )
        } else {
            let args = self.scp_args(source, dest);
            run_captured(Command::new("scp").args(&args), "scp", None)
        };

        if output.success {
            return Ok(());
        }
        Err(Error::remote_command_failed(
            crate::error::RemoteCommandFailedDetails {
                command: format!("scp {} {}", source, dest),
                host: self.hostname.clone(),
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            },
        ))
    }
}

impl RemoteHost for SshHost {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    fn exec(&self, command: &str, timeout: Option<Duration>) -> CommandOutput {
        if self.is_local {
            return execute_local_command(command, timeout);
        }

        let args = self.ssh_args(command);
        run_captured(Command::new("ssh").args(&args), command, timeout)
    }

    fn send_file(&self, local_path: &str, remote_path: &str) -> Result<()> {
        if self.is_local {
            return self.copy(local_path, remote_path);
        }
        let dest = format!("root@{}:{}", self.hostname, remote_path);
        self.copy(local_path, &dest)
    }

    fn get_file(&self, remote_path: &str, local_path: &str) -> Result<()> {
        if self.is_local {
            return self.copy(remote_path, local_path);
        }
        let source = format!("root@{}:{}", self.hostname, remote_path);
        self.copy(&source, local_path)
    }
}

pub fn execute_local_command(command: &str, timeout: Option<Duration>) -> CommandOutput {
    run_captured(
        Command::new("sh").args(["-c", command]),
        command,
        timeout,
    )
}

/// Spawn a command with both streams captured into temp files so a timed-out
/// child can be killed without deadlocking on pipe buffers, then collect its
/// output. Spawn errors and timeouts surface as failed outputs (exit -1).
fn run_captured(cmd: &mut Command, label: &str, timeout: Option<Duration>) -> CommandOutput {
    let (stdout_file, stderr_file) = match (tempfile::tempfile(), tempfile::tempfile()) {
        (Ok(out), Ok(err)) => (out, err),
        _ => return CommandOutput::failure("failed to create capture files"),
    };
    let (stdout_clone, stderr_clone) = match (stdout_file.try_clone(), stderr_file.try_clone()) {
        (Ok(out), Ok(err)) => (out, err),
        _ => return CommandOutput::failure("failed to clone capture files"),
    };

    let mut child = match cmd
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_clone))
        .stderr(Stdio::from(stderr_clone))
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return CommandOutput::failure(format!("failed to spawn command: {}", e)),
    };

    let status = match timeout {
        Some(limit) => match child.wait_timeout(limit) {
            Ok(Some(status)) => Some(status),
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                None
            }
            Err(e) => {
                return CommandOutput::failure(format!("failed to wait for command: {}", e))
            }
        },
        None => match child.wait() {
            Ok(status) => Some(status),
            Err(e) => {
                return CommandOutput::failure(format!("failed to wait for command: {}", e))
            }
        },
    };

    let stdout = read_capture(stdout_file);
    let stderr = read_capture(stderr_file);

    match status {
        Some(status) => CommandOutput {
            stdout,
            stderr,
            success: status.success(),
            exit_code: status.code().unwrap_or(-1),
        },
        None => {
            let limit = timeout.map(|t| t.as_secs()).unwrap_or(0);
            CommandOutput {
                stdout,
                stderr: format!(
                    "command [{}] timed out after {} seconds: {}",
                    label, limit, stderr
                ),
                success: false,
                exit_code: -1,
            }
        }
    }
}

fn read_capture(mut file: std::fs::File) -> String {
    let mut content = String::new();
    if file.seek(SeekFrom::Start(0)).is_ok() {
        let _ = file.read_to_string(&mut content);
    }
    content
}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_addresses_detected() {
        assert!(is_local_host("localhost"));
        assert!(is_local_host("127.0.0.1"));
        assert!(is_local_host("::1"));
        assert!(!is_local_host("build1.example.com"));
    }

    #[test]
    fn local_command_captures_both_streams() {
        let output = execute_local_command("echo out && echo err >&2", None);
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    fn local_command_reports_exit_code() {
        let output = execute_local_command("exit 3", None);
        assert!(!output.success);
        assert_eq!(output.exit_code, 3);
    }

    #[test]
    fn timed_out_command_fails_like_nonzero_exit() {
        let output = execute_local_command("sleep 5", Some(Duration::from_millis(50)));
        assert!(!output.success);
        assert_eq!(output.exit_code, -1);
        assert!(output.stderr.contains("timed out"));
    }

    #[test]
    fn missing_identity_file_is_rejected() {
        let err = SshHost::new("build1", "build1.example.com", Some("/no/such/key"))
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::SshIdentityFileNotFound);
    }

    #[test]
    fn empty_identity_file_means_none() {
        let host = SshHost::new("build1", "build1.example.com", Some("")).unwrap();
        assert!(host.identity_file.is_none());
        assert!(!host.is_local);
    }

    #[test]
    fn shell_features_available_locally() {
        let output = execute_local_command("cd /tmp && pwd", None);
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "/tmp");
    }
}
