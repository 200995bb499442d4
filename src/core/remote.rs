//! The remote-operation contract every pipeline step is written against.
//!
//! Pipeline code never talks to ssh/scp directly; it composes the provided
//! helpers on [`RemoteHost`], and the test suite substitutes a scripted
//! fake for the real client.

use std::time::Duration;

use tracing::error;

use crate::distro::Distro;
use crate::error::{Error, RemoteCommandFailedDetails, Result};
use crate::utils::shell;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code: -1,
        }
    }
}

pub trait RemoteHost {
    /// Hostname used in logs and error details.
    fn hostname(&self) -> &str;

    /// Run a shell command, capturing both output streams. A timeout is
    /// reported as a failed command (exit code -1), never as a panic.
    fn exec(&self, command: &str, timeout: Option<Duration>) -> CommandOutput;

    /// Copy a local path (recursively) to a remote path.
    fn send_file(&self, local_path: &str, remote_path: &str) -> Result<()>;

    /// Copy a remote path (recursively) to a local path.
    fn get_file(&self, remote_path: &str, local_path: &str) -> Result<()>;

    /// Run a command and turn a non-zero exit status into an error carrying
    /// the command, host, exit status and both output streams. This is the
    /// single place remote failures are logged.
    fn run_with_timeout(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        let output = self.exec(command, timeout);
        if output.success {
            return Ok(output);
        }
        error!(
            command,
            host = self.hostname(),
            exit_code = output.exit_code,
            stdout = %output.stdout,
            stderr = %output.stderr,
            "remote command failed"
        );
        Err(Error::remote_command_failed(RemoteCommandFailedDetails {
            command: command.to_string(),
            host: self.hostname().to_string(),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        }))
    }

    fn run(&self, command: &str) -> Result<CommandOutput> {
        self.run_with_timeout(command, None)
    }

    /// `ls` a directory, returning its entry names.
    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let output = self.run(&format!("ls {}", shell::quote_path(path)))?;
        Ok(output.stdout.split_whitespace().map(String::from).collect())
    }

    fn path_exists(&self, path: &str) -> bool {
        self.exec(&format!("test -e {}", shell::quote_path(path)), None)
            .success
    }

    fn path_is_dir(&self, path: &str) -> bool {
        self.exec(&format!("test -d {}", shell::quote_path(path)), None)
            .success
    }

    fn remove_file(&self, path: &str) -> Result<()> {
        self.run(&format!("rm -f {}", shell::quote_path(path)))?;
        Ok(())
    }

    /// Whether an RPM of this name is installed.
    fn rpm_installed(&self, name: &str) -> bool {
        self.exec(&format!("rpm -q {}", shell::quote_arg(name)), None)
            .success
    }

    /// Full name (name-version-release.arch) of an installed RPM. Multiple
    /// matches mean the package database is in a state we refuse to guess
    /// about.
    fn installed_rpm(&self, name: &str) -> Result<String> {
        let command = format!("rpm -q {}", shell::quote_arg(name));
        let output = self.run(&command)?;
        let fullnames: Vec<&str> = output.stdout.split_whitespace().collect();
        match fullnames.as_slice() {
            [fullname] => Ok((*fullname).to_string()),
            _ => Err(Error::remote_unexpected_output(
                command,
                self.hostname(),
                output.stdout,
            )),
        }
    }

    /// Recorded sha256 of an installed RPM from the package database.
    fn yumdb_sha256(&self, fullname: &str) -> Result<String> {
        let command = format!("yumdb get checksum_data {}", shell::quote_arg(fullname));
        let output = self.run(&command)?;
        for line in output.stdout.lines() {
            if let Some((key, value)) = line.split_once('=') {
                if key.trim() == "checksum_data" {
                    return Ok(value.trim().to_string());
                }
            }
        }
        Err(Error::remote_unexpected_output(
            command,
            self.hostname(),
            output.stdout,
        ))
    }

    /// sha256 of a file's content.
    fn sha256sum(&self, path: &str) -> Result<String> {
        let command = format!("sha256sum {}", shell::quote_path(path));
        let output = self.run(&command)?;
        output
            .stdout
            .split_whitespace()
            .next()
            .map(String::from)
            .ok_or_else(|| {
                Error::remote_unexpected_output(command, self.hostname(), output.stdout)
            })
    }

    /// Distribution of the host, from lsb_release.
    fn distro(&self) -> Result<Distro> {
        let output = self.run("lsb_release -s -r")?;
        Distro::from_release(output.stdout.trim())
    }
}


#[cfg(test)]
mod tests {
    use super::fake::{fail, ok, FakeHost};
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn run_surfaces_command_host_and_streams() {
        let host = FakeHost::new("build1", Distro::Rhel7)
            .on("yumdb sync", fail(1, "db locked"));
        let err = host.run("yumdb sync").unwrap_err();
        assert_eq!(err.code, ErrorCode::RemoteCommandFailed);
        assert_eq!(err.details["host"], "build1");
        assert_eq!(err.details["command"], "yumdb sync");
        assert_eq!(err.details["stderr"], "db locked");
    }

    #[test]
    fn installed_rpm_requires_exactly_one_name() {
        let host = FakeHost::new("build1", Distro::Rhel7)
            .on("rpm -q glibc", ok("glibc-2.17-196.el7.x86_64\nglibc-2.17-196.el7.i686\n"))
            .on("rpm -q rsync", ok("rsync-3.1.2-4.el7.x86_64\n"));
        assert_eq!(
            host.installed_rpm("rsync").unwrap(),
            "rsync-3.1.2-4.el7.x86_64"
        );
        let err = host.installed_rpm("glibc").unwrap_err();
        assert_eq!(err.code, ErrorCode::RemoteUnexpectedOutput);
    }

    #[test]
    fn yumdb_sha256_parses_key_value_output() {
        let host = FakeHost::new("build1", Distro::Rhel7).on(
            "yumdb get checksum_data",
            ok("rsync-3.1.2-4.el7.x86_64\n     checksum_data = abc123\n"),
        );
        assert_eq!(
            host.yumdb_sha256("rsync-3.1.2-4.el7.x86_64").unwrap(),
            "abc123"
        );
    }

    #[test]
    fn sha256sum_takes_first_token() {
        let host = FakeHost::new("build1", Distro::Rhel7)
            .on("sha256sum", ok("deadbeef  /cache/rsync.rpm\n"));
        assert_eq!(host.sha256sum("/cache/rsync.rpm").unwrap(), "deadbeef");
    }

    #[test]
    fn list_dir_splits_entries() {
        let host =
            FakeHost::new("build1", Distro::Rhel7).on("ls ", ok("a.rpm\nb.rpm\n"));
        assert_eq!(host.list_dir("/cache").unwrap(), vec!["a.rpm", "b.rpm"]);
    }
}
