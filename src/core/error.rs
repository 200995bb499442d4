use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidYaml,
    ConfigMissingKey,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    HostNotFound,
    SshIdentityFileNotFound,

    RemoteCommandFailed,
    RemoteUnexpectedOutput,

    DistroUnsupported,
    DistroMismatch,

    PackageChecksumMismatch,
    PackageMissingAfterBuild,
    PackageNotFoundInImage,

    ImageNotFound,
    ImageCleanupFailed,

    InternalIoError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidYaml => "config.invalid_yaml",
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::HostNotFound => "host.not_found",
            ErrorCode::SshIdentityFileNotFound => "ssh.identity_file_not_found",

            ErrorCode::RemoteCommandFailed => "remote.command_failed",
            ErrorCode::RemoteUnexpectedOutput => "remote.unexpected_output",

            ErrorCode::DistroUnsupported => "distro.unsupported",
            ErrorCode::DistroMismatch => "distro.mismatch",

            ErrorCode::PackageChecksumMismatch => "package.checksum_mismatch",
            ErrorCode::PackageMissingAfterBuild => "package.missing_after_build",
            ErrorCode::PackageNotFoundInImage => "package.not_found_in_image",

            ErrorCode::ImageNotFound => "image.not_found",
            ErrorCode::ImageCleanupFailed => "image.cleanup_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommandFailedDetails {
    pub command: String,
    pub host: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksumMismatchDetails {
    pub path: String,
    pub host: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }

    fn empty_details() -> Value {
        Value::Object(serde_json::Map::new())
    }

    pub fn config_invalid_yaml(path: impl Into<String>, err: impl Into<String>) -> Self {
        let path = path.into();
        let details = serde_json::json!({ "path": path, "error": err.into() });
        Self::new(
            ErrorCode::ConfigInvalidYaml,
            format!("Invalid YAML in configuration file [{}]", path),
            details,
        )
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        let key = key.into();
        let details = serde_json::json!({ "key": key, "path": path });
        Self::new(
            ErrorCode::ConfigMissingKey,
            format!("Missing required configuration key [{}]", key),
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let problem = problem.into();
        let details = serde_json::json!({ "key": key, "value": value, "problem": problem });
        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid configuration value for [{}]: {}", key, problem),
            details,
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        let field = field.into();
        let problem = problem.into();
        let details = serde_json::json!({ "field": field, "problem": problem });
        Self::new(ErrorCode::ValidationInvalidArgument, problem, details)
    }

    pub fn host_not_found(host_id: impl Into<String>) -> Self {
        let host_id = host_id.into();
        let details = serde_json::json!({ "hostId": host_id });
        Self::new(
            ErrorCode::HostNotFound,
            format!("Host [{}] is not configured in [ssh_hosts]", host_id),
            details,
        )
    }

    pub fn ssh_identity_file_not_found(
        host_id: impl Into<String>,
        identity_file: impl Into<String>,
    ) -> Self {
        let details = serde_json::json!({
            "hostId": host_id.into(),
            "identityFile": identity_file.into(),
        });
        Self::new(
            ErrorCode::SshIdentityFileNotFound,
            "SSH identity file not found",
            details,
        )
    }

    pub fn remote_command_failed(details: RemoteCommandFailedDetails) -> Self {
        let message = format!(
            "Command [{}] failed on host [{}] with exit status [{}]",
            details.command, details.host, details.exit_code
        );
        let details =
            serde_json::to_value(details).unwrap_or_else(|_| Self::empty_details());
        Self::new(ErrorCode::RemoteCommandFailed, message, details)
    }

    pub fn remote_unexpected_output(
        command: impl Into<String>,
        host: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        let command = command.into();
        let host = host.into();
        let details = serde_json::json!({
            "command": command,
            "host": host,
            "output": output.into(),
        });
        Self::new(
            ErrorCode::RemoteUnexpectedOutput,
            format!(
                "Unexpected output from command [{}] on host [{}]",
                command, host
            ),
            details,
        )
    }

    pub fn distro_unsupported(value: impl Into<String>) -> Self {
        let value = value.into();
        let details = serde_json::json!({ "value": value });
        Self::new(
            ErrorCode::DistroUnsupported,
            format!("Unsupported distribution [{}]", value),
            details,
        )
    }

    pub fn distro_mismatch(
        host: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        let host = host.into();
        let expected = expected.into();
        let actual = actual.into();
        let message = format!(
            "Wrong distribution on host [{}]: expected [{}], got [{}]",
            host, expected, actual
        );
        let details = serde_json::json!({
            "host": host,
            "expected": expected,
            "actual": actual,
        });
        Self::new(ErrorCode::DistroMismatch, message, details)
    }

    pub fn package_checksum_mismatch(details: ChecksumMismatchDetails) -> Self {
        let message = format!(
            "Package file [{}] on host [{}] has checksum [{}], expected [{}]",
            details.path, details.host, details.actual, details.expected
        );
        let details =
            serde_json::to_value(details).unwrap_or_else(|_| Self::empty_details());
        Self::new(ErrorCode::PackageChecksumMismatch, message, details)
    }

    pub fn package_missing_after_build(
        filename: impl Into<String>,
        directory: impl Into<String>,
    ) -> Self {
        let filename = filename.into();
        let directory = directory.into();
        let message = format!(
            "Package [{}] not found in directory [{}] after build",
            filename, directory
        );
        let details = serde_json::json!({ "filename": filename, "directory": directory });
        Self::new(ErrorCode::PackageMissingAfterBuild, message, details)
    }

    pub fn package_not_found_in_image(
        pattern: impl Into<String>,
        directory: impl Into<String>,
    ) -> Self {
        let pattern = pattern.into();
        let directory = directory.into();
        let message = format!(
            "No package matching pattern [{}] in image directory [{}]",
            pattern, directory
        );
        let details = serde_json::json!({ "pattern": pattern, "directory": directory });
        Self::new(ErrorCode::PackageNotFoundInImage, message, details)
    }

    pub fn image_not_found() -> Self {
        Self::new(
            ErrorCode::ImageNotFound,
            "No installation image configured and none found in the current directory",
            Self::empty_details(),
        )
    }

    pub fn image_cleanup_failed(mount_point: impl Into<String>) -> Self {
        let mount_point = mount_point.into();
        let details = serde_json::json!({ "mountPoint": mount_point });
        Self::new(
            ErrorCode::ImageCleanupFailed,
            format!("Failed to clean up image mount point [{}]", mount_point),
            details,
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = serde_json::json!({ "error": error.into(), "context": context });
        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::InternalUnexpected,
            error.clone(),
            serde_json::json!({ "error": error }),
        )
    }
}
