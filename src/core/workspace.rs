//! Per-run workspaces. Every build gets a fresh timestamped directory under
//! `build_monforge/` so runs never step on each other's intermediate files.

use chrono::Local;

use crate::error::Result;
use crate::remote::RemoteHost;

pub const WORKSPACE_PARENT_DIR_NAME: &str = "build_monforge";

/// Remote hosts get the workspace replicated under /var/log, which is
/// writable and survives reboots long enough to debug a failed build.
pub const REMOTE_WORKSPACE_PARENT: &str = "/var/log";

#[derive(Debug, Clone)]
pub struct Workspace {
    /// Timestamp identity of this run.
    pub identity: String,
    /// Absolute workspace path on the local host.
    pub local_path: String,
    /// Path relative to the directory the build was started from.
    pub relative_path: String,
}

impl Workspace {
    pub fn create(local_host: &dyn RemoteHost, current_dir: &str) -> Result<Self> {
        let identity = Local::now().format("%Y-%m-%d-%H_%M_%S").to_string();
        Self::create_with_identity(local_host, current_dir, &identity)
    }

    fn create_with_identity(
        local_host: &dyn RemoteHost,
        current_dir: &str,
        identity: &str,
    ) -> Result<Self> {
        let relative_path = format!("{}/{}", WORKSPACE_PARENT_DIR_NAME, identity);
        let local_path = format!("{}/{}", current_dir, relative_path);
        local_host.run(&format!("mkdir -p {}", local_path))?;
        Ok(Self {
            identity: identity.to_string(),
            local_path,
            relative_path,
        })
    }

    /// The twin workspace path used on a remote build host.
    pub fn remote_path(&self) -> String {
        format!("{}/{}", REMOTE_WORKSPACE_PARENT, self.relative_path)
    }

    /// Keep a copy of the configuration that drove this run next to its
    /// intermediate files.
    pub fn stash_config(&self, local_host: &dyn RemoteHost, config_path: &str) -> Result<()> {
        local_host.send_file(config_path, &self.local_path)
    }
}
