//! Cache directory layout. All path construction for the image cache tree
//! lives here so pipeline steps never assemble paths ad hoc.
//!
//! ```text
//! <root>/                         cache root (plugin checkouts live here too)
//! <root>/RPMS/<distro>/collectd   collector RPMs built for a distribution
//! <root>/RPMS/<distro>/dependent  downloaded dependency RPMs
//! <root>/RPMS/<distro>/copying    staging area while syncing dependents
//! <root>/RPMS/rhel7/server        third-party server RPMs
//! ```

use crate::distro::Distro;

pub const RPMS_DIR_NAME: &str = "RPMS";
pub const COLLECTOR_DIR_NAME: &str = "collectd";
pub const DEPENDENT_DIR_NAME: &str = "dependent";
pub const SERVER_DIR_NAME: &str = "server";
pub const COPYING_DIR_NAME: &str = "copying";
pub const RPM_ARCH_DIR_NAME: &str = "x86_64";

#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: String,
}

impl CacheLayout {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn rpms_dir(&self) -> String {
        format!("{}/{}", self.root, RPMS_DIR_NAME)
    }

    pub fn distro_rpm_dir(&self, distro: Distro) -> String {
        format!("{}/{}", self.rpms_dir(), distro.as_str())
    }

    pub fn collector_rpm_dir(&self, distro: Distro) -> String {
        format!("{}/{}", self.distro_rpm_dir(distro), COLLECTOR_DIR_NAME)
    }

    /// Directory the RPM fetch lands in before being renamed to the
    /// collector directory (rpmbuild writes RPMS/x86_64).
    pub fn collector_fetch_dir(&self, distro: Distro) -> String {
        format!("{}/{}", self.distro_rpm_dir(distro), RPM_ARCH_DIR_NAME)
    }

    pub fn dependent_rpm_dir(&self, distro: Distro) -> String {
        format!("{}/{}", self.distro_rpm_dir(distro), DEPENDENT_DIR_NAME)
    }

    pub fn copying_dir(&self, distro: Distro) -> String {
        format!("{}/{}", self.distro_rpm_dir(distro), COPYING_DIR_NAME)
    }

    pub fn copying_dependent_dir(&self, distro: Distro) -> String {
        format!("{}/{}", self.copying_dir(distro), DEPENDENT_DIR_NAME)
    }

    /// Third-party server RPMs are only carried for the rhel7 image.
    pub fn server_rpm_dir(&self) -> String {
        format!("{}/{}", self.distro_rpm_dir(Distro::Rhel7), SERVER_DIR_NAME)
    }

    pub fn plugin_dir(&self, plugin_name: &str) -> String {
        format!("{}/{}", self.root, plugin_name)
    }
}
