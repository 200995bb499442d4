//! Dependent-RPM synchronization.
//!
//! Ensures a directory on the build host contains exactly one
//! correctly-checksummed archive per required package: keep matches, replace
//! mismatches, download the rest, evict everything else.

use std::time::Duration;

use tracing::{debug, info};

use crate::distro::Distro;
use crate::error::{ChecksumMismatchDetails, Error, Result};
use crate::packages;
use crate::remote::RemoteHost;
use crate::utils::shell;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

pub fn sync_dependent_rpms(
    host: &dyn RemoteHost,
    dependent_dir: &str,
    distro: Distro,
) -> Result<()> {
    // The package database might be stale, sync before trusting it
    host.run("yumdb sync")?;

    let mut existing_fnames = host.list_dir(dependent_dir)?;

    let required_rpms = packages::required_dependent_rpms(distro);

    // Install the whole set so canonical names and checksums land in the db
    let mut install_command = "yum install -y".to_string();
    for name in &required_rpms {
        install_command.push(' ');
        install_command.push_str(name);
    }
    host.run_with_timeout(&install_command, Some(DOWNLOAD_TIMEOUT))?;

    for name in &required_rpms {
        let fullname = host.installed_rpm(name)?;
        let sha256 = host.yumdb_sha256(&fullname)?;

        let filename = format!("{}.rpm", fullname);
        let fpath = format!("{}/{}", dependent_dir, filename);

        if let Some(position) = existing_fnames.iter().position(|f| *f == filename) {
            let file_sha256 = host.sha256sum(&fpath)?;
            if file_sha256 == sha256 {
                debug!(path = %fpath, "cached RPM has correct sha256sum");
                existing_fnames.remove(position);
                continue;
            }
            debug!(path = %fpath, "cached RPM has wrong sha256sum, deleting it");
            host.remove_file(&fpath)?;
            existing_fnames.remove(position);
        }

        debug!(path = %fpath, host = host.hostname(), "downloading RPM");
        let command = format!(
            r"cd {} && yumdownloader -x \*i686 --archlist=x86_64 {}",
            shell::quote_path(dependent_dir),
            shell::quote_arg(name)
        );
        host.run_with_timeout(&command, Some(DOWNLOAD_TIMEOUT))?;

        // Don't trust the downloader, check again
        let file_sha256 = host.sha256sum(&fpath)?;
        if file_sha256 != sha256 {
            return Err(Error::package_checksum_mismatch(ChecksumMismatchDetails {
                path: fpath,
                host: host.hostname().to_string(),
                expected: sha256,
                actual: file_sha256,
            }));
        }
    }

    for fname in existing_fnames {
        let fpath = format!("{}/{}", dependent_dir, fname);
        info!(path = %fpath, "removing file not belonging to any required RPM");
        host.remove_file(&fpath)?;
    }
    Ok(())
}
