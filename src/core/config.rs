//! Build configuration file.
//!
//! YAML, defaulting to [`DEFAULT_BUILD_CONFIG`]; a missing file means
//! "use built-in defaults". Recognized keys: `ssh_hosts`, `rhel6_host`,
//! `collector_git_url`, `collector_git_branch`.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::ssh::SshHost;

pub const BUILD_CONFIG_FNAME: &str = "monforge_build.conf";
pub const DEFAULT_BUILD_CONFIG: &str = "/etc/monforge_build.conf";
pub const DEFAULT_INSTALL_CONFIG: &str = "/etc/monforge_install.conf";

pub const DEFAULT_COLLECTOR_GIT_URL: &str = "https://github.com/DDNStorage/collectd.git";
pub const DEFAULT_COLLECTOR_GIT_BRANCH: &str = "master-ddn";

/// Config sentinel meaning "no value" (YAML `None` string).
const NONE_SENTINEL: &str = "None";

#[derive(Debug, Clone, Deserialize)]
pub struct SshHostConfig {
    pub host_id: String,
    pub hostname: String,
    #[serde(default)]
    pub ssh_identity_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostRef {
    pub host_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub ssh_hosts: Vec<SshHostConfig>,
    #[serde(default)]
    pub rhel6_host: Option<HostRef>,
    #[serde(default)]
    pub collector_git_url: Option<String>,
    #[serde(default)]
    pub collector_git_branch: Option<String>,
}

impl BuildConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read config file [{}]", path)))
        })?;
        serde_yml::from_str(&content)
            .map_err(|e| Error::config_invalid_yaml(path, e.to_string()))
    }

    /// Load from an explicit path, or from the default location when it
    /// exists, or fall back to built-in defaults.
    pub fn load_or_default(path: Option<&str>) -> Result<(Self, Option<String>)> {
        match path {
            Some(path) => Ok((Self::load(path)?, Some(path.to_string()))),
            None => {
                if Path::new(DEFAULT_BUILD_CONFIG).exists() {
                    Ok((
                        Self::load(DEFAULT_BUILD_CONFIG)?,
                        Some(DEFAULT_BUILD_CONFIG.to_string()),
                    ))
                } else {
                    Ok((Self::default(), None))
                }
            }
        }
    }

    /// Connect handles for every configured host, keyed by host ID.
    /// Duplicate IDs are a config error.
    pub fn hosts(&self) -> Result<HashMap<String, SshHost>> {
        let mut hosts = HashMap::new();
        for host_config in &self.ssh_hosts {
            if host_config.host_id.is_empty() {
                return Err(Error::config_missing_key("host_id", None));
            }
            if host_config.hostname.is_empty() {
                return Err(Error::config_missing_key(
                    "hostname",
                    Some(host_config.host_id.clone()),
                ));
            }
            if hosts.contains_key(&host_config.host_id) {
                return Err(Error::config_invalid_value(
                    "ssh_hosts",
                    Some(host_config.host_id.clone()),
                    "multiple SSH hosts with the same ID",
                ));
            }
            let identity_file = host_config
                .ssh_identity_file
                .as_deref()
                .filter(|v| *v != NONE_SENTINEL);
            let host = SshHost::new(&host_config.host_id, &host_config.hostname, identity_file)?;
            hosts.insert(host_config.host_id.clone(), host);
        }
        Ok(hosts)
    }

    /// The optional secondary (rhel6) build host. `None` disables rhel6
    /// support; naming an unknown host ID is a config error.
    pub fn rhel6_host<'a>(
        &self,
        hosts: &'a HashMap<String, SshHost>,
    ) -> Result<Option<&'a SshHost>> {
        match &self.rhel6_host {
            None => {
                info!("no [rhel6_host] configured, disabling rhel6 support");
                Ok(None)
            }
            Some(host_ref) => hosts
                .get(&host_ref.host_id)
                .map(Some)
                .ok_or_else(|| Error::host_not_found(&host_ref.host_id)),
        }
    }

    pub fn collector_git_url(&self) -> &str {
        match &self.collector_git_url {
            Some(url) => url,
            None => {
                info!(
                    default = DEFAULT_COLLECTOR_GIT_URL,
                    "no [collector_git_url] configured, using default"
                );
                DEFAULT_COLLECTOR_GIT_URL
            }
        }
    }

    pub fn collector_git_branch(&self) -> &str {
        match &self.collector_git_branch {
            Some(branch) => branch,
            None => {
                info!(
                    default = DEFAULT_COLLECTOR_GIT_BRANCH,
                    "no [collector_git_branch] configured, using default"
                );
                DEFAULT_COLLECTOR_GIT_BRANCH
            }
        }
    }
}
