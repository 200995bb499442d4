//! Install bootstrap. Before the real installer can run, its dependency
//! RPMs must be present; they are taken from the distribution ISO, which is
//! loop-mounted just long enough to install what is missing.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DEFAULT_INSTALL_CONFIG;
use crate::distro::Distro;
use crate::error::{Error, Result};
use crate::layout::{DEPENDENT_DIR_NAME, RPMS_DIR_NAME};
use crate::packages;
use crate::remote::RemoteHost;

/// The installer this bootstrap hands over to once dependencies are in.
pub const INSTALLER_COMMAND: &str = "monforge-setup";

/// ISO path named in the install config, if the file exists and names
/// exactly one.
pub fn iso_path_in_config(local_host: &dyn RemoteHost, config_path: &str) -> Option<String> {
    let command = format!(
        r"grep -v ^\# {} | grep ^iso_path: | awk '{{print $2}}'",
        config_path
    );
    let output = local_host.exec(&command, None);
    if !output.success {
        debug!(config_path, "no readable install config");
        return None;
    }
    let lines: Vec<&str> = output.stdout.lines().collect();
    match lines.as_slice() {
        [line] if !line.is_empty() => Some((*line).to_string()),
        _ => {
            debug!(config_path, "no single [iso_path] in install config");
            None
        }
    }
}

/// Fall back to an ISO sitting in the current directory.
pub fn find_iso_in_cwd(local_host: &dyn RemoteHost) -> Option<String> {
    let output = local_host.exec("ls monforge-*.iso", None);
    if !output.success {
        return None;
    }
    let fnames: Vec<&str> = output.stdout.split_whitespace().collect();
    match fnames.as_slice() {
        [fname] => Some((*fname).to_string()),
        _ => None,
    }
}

fn resolve_iso_path(local_host: &dyn RemoteHost) -> Result<String> {
    if let Some(path) = iso_path_in_config(local_host, DEFAULT_INSTALL_CONFIG) {
        return Ok(path);
    }
    match find_iso_in_cwd(local_host) {
        Some(path) => {
            info!(path, "no [iso_path] configured, using ISO from current directory");
            Ok(path)
        }
        None => Err(Error::image_not_found()),
    }
}

/// The mounted image, installing RPMs by package name. The dependent
/// directory is listed once and the listing reused across installs.
pub struct ImageRepository<'a> {
    host: &'a dyn RemoteHost,
    rpm_dependent_dir: String,
    fnames: Option<Vec<String>>,
}

impl<'a> ImageRepository<'a> {
    pub fn new(host: &'a dyn RemoteHost, image_dir: &str) -> Self {
        let rpm_dependent_dir = format!(
            "{}/{}/{}/{}",
            image_dir,
            RPMS_DIR_NAME,
            Distro::Rhel7.as_str(),
            DEPENDENT_DIR_NAME
        );
        Self {
            host,
            rpm_dependent_dir,
            fnames: None,
        }
    }

    fn fnames(&mut self) -> Result<&[String]> {
        if self.fnames.is_none() {
            self.fnames = Some(self.host.list_dir(&self.rpm_dependent_dir)?);
        }
        Ok(self.fnames.as_deref().unwrap_or_default())
    }

    /// Install the image's RPM for a package name.
    pub fn install_package(&mut self, name: &str) -> Result<()> {
        let pattern = packages::installable_rpm_pattern(name);
        let directory = self.rpm_dependent_dir.clone();
        let matched = self
            .fnames()?
            .iter()
            .find(|fname| pattern.is_match(fname))
            .cloned();
        let fname = matched.ok_or_else(|| {
            Error::package_not_found_in_image(pattern.as_str(), &directory)
        })?;
        self.host
            .run(&format!("cd {} && rpm -ivh {}", directory, fname))?;
        Ok(())
    }
}

/// Dependency RPMs not installed on the host yet.
pub fn missing_install_rpms(local_host: &dyn RemoteHost) -> Vec<&'static str> {
    packages::INSTALL_DEPENDENT_RPMS
        .iter()
        .copied()
        .filter(|name| !local_host.rpm_installed(name))
        .collect()
}

fn install_missing(local_host: &dyn RemoteHost, mount_point: &str) -> Result<()> {
    let mut repository = ImageRepository::new(local_host, mount_point);
    for name in packages::INSTALL_DEPENDENT_RPMS {
        if local_host.rpm_installed(name) {
            continue;
        }
        info!(name, "installing dependency RPM from image");
        repository.install_package(name)?;
    }
    Ok(())
}

fn provision_at(local_host: &dyn RemoteHost, iso_path: &str, mount_point: &str) -> Result<()> {
    local_host.run(&format!(
        "mkdir -p {mnt} && mount -o loop {iso} {mnt}",
        mnt = mount_point,
        iso = iso_path
    ))?;

    let install_result = install_missing(local_host, mount_point);

    // The mount must come down no matter how the install went
    let mut cleanup_failed = false;
    if local_host.run(&format!("umount {}", mount_point)).is_err() {
        cleanup_failed = true;
    }
    if local_host.run(&format!("rmdir {}", mount_point)).is_err() {
        cleanup_failed = true;
    }

    install_result?;
    if cleanup_failed {
        return Err(Error::image_cleanup_failed(mount_point));
    }
    Ok(())
}

/// Find the distribution ISO, mount it and install whatever dependency
/// RPMs are missing. Nothing is mounted when no ISO can be found.
pub fn provision_dependencies(local_host: &dyn RemoteHost) -> Result<()> {
    let iso_path = resolve_iso_path(local_host)?;
    let mount_point = format!("/mnt/monforge-{}", Uuid::new_v4());
    provision_at(local_host, &iso_path, &mount_point)
}

/// Make sure the installer's dependencies are present, then hand over to
/// it with our stdio.
pub fn run_install(local_host: &dyn RemoteHost) -> Result<()> {
    let missing = missing_install_rpms(local_host);
    if !missing.is_empty() {
        warn!(?missing, "dependency RPMs missing, provisioning from image");
        provision_dependencies(local_host)?;
    }

    let status = std::process::Command::new(INSTALLER_COMMAND)
        .status()
        .map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("run {}", INSTALLER_COMMAND)))
        })?;
    if !status.success() {
        return Err(Error::internal_unexpected(format!(
            "{} exited with status [{}]",
            INSTALLER_COMMAND,
            status.code().unwrap_or(-1)
        )));
    }
    Ok(())
}
