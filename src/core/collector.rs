//! Collector build and packaging.
//!
//! The collector checkout is shipped to a build host, rolled into a
//! canonically named source tarball, fed to rpmbuild, and the resulting
//! x86_64 RPMs are pulled back into the per-distribution cache. A fully
//! cached RPM set skips the build entirely.

use tracing::{debug, info};

use crate::distro::Distro;
use crate::error::{Error, Result};
use crate::layout::{CacheLayout, RPM_ARCH_DIR_NAME, RPMS_DIR_NAME};
use crate::packages;
use crate::remote::RemoteHost;

pub const COLLECTOR_GIT_DIR_NAME: &str = "collectd.git";

/// rpmbuild feature selection: write_tsdb and nfs enabled, everything the
/// image does not ship disabled.
const RPMBUILD_FEATURE_FLAGS: &str = "--with write_tsdb --with nfs --without java \
     --without amqp --without gmond --without nut --without pinba \
     --without ping --without varnish --without dpdkstat \
     --without turbostat --without redis --without write_redis \
     --without gps --without lvm";

/// Build the collector RPMs on a build host and pull them into the local
/// cache. Every failed step is fatal.
#[allow(clippy::too_many_arguments)]
pub fn build_collector(
    workspace: &str,
    build_host: &dyn RemoteHost,
    local_host: &dyn RemoteHost,
    collector_git_path: &str,
    layout: &CacheLayout,
    tarball_name: &str,
    distro: Distro,
) -> Result<()> {
    let local_distro_rpm_dir = layout.distro_rpm_dir(distro);
    let local_fetch_dir = layout.collector_fetch_dir(distro);
    let local_collector_rpm_dir = layout.collector_rpm_dir(distro);
    let host_git_dir = format!("{}/{}", workspace, COLLECTOR_GIT_DIR_NAME);
    let host_rpm_dir = format!("{}/{}/{}", host_git_dir, RPMS_DIR_NAME, RPM_ARCH_DIR_NAME);

    build_host.send_file(collector_git_path, workspace)?;

    let command = format!(
        "cd {} && mkdir -p libltdl/config && sh ./build.sh && ./configure && make dist-bzip2",
        host_git_dir
    );
    build_host.run(&command)?;

    // The dist tarball carries whatever version string the checkout has;
    // find it and re-roll it under the canonical versioned name.
    let command = format!("cd {} && ls collectd-*.tar.bz2", host_git_dir);
    let output = build_host.run(&command)?;
    let tarballs: Vec<&str> = output.stdout.split_whitespace().collect();
    let tarball_fname = match tarballs.as_slice() {
        [fname] => *fname,
        _ => {
            return Err(Error::remote_unexpected_output(
                command,
                build_host.hostname(),
                output.stdout,
            ))
        }
    };
    let current_name = tarball_fname.strip_suffix(".tar.bz2").ok_or_else(|| {
        Error::remote_unexpected_output(command.clone(), build_host.hostname(), tarball_fname)
    })?;
    if current_name.is_empty() {
        return Err(Error::remote_unexpected_output(
            command,
            build_host.hostname(),
            tarball_fname,
        ));
    }

    let command = format!(
        "cd {} && tar jxf {} && mv {} {} && tar cjf {}.tar.bz2 {}",
        host_git_dir, tarball_fname, current_name, tarball_name, tarball_name, tarball_name
    );
    build_host.run(&command)?;

    let command = format!(
        "cd {} && mkdir {{BUILD,RPMS,SOURCES,SRPMS}} && mv {}.tar.bz2 SOURCES",
        host_git_dir, tarball_name
    );
    build_host.run(&command)?;

    let command = format!(
        "cd {git_dir} && rpmbuild -ba {flags} --define \"_topdir {git_dir}\" \
         --define=\"rev $(git rev-parse --short HEAD)\" --define=\"dist .el{number}\" \
         contrib/redhat/collectd.spec",
        git_dir = host_git_dir,
        flags = RPMBUILD_FEATURE_FLAGS,
        number = distro.number()
    );
    build_host.run(&command)?;

    local_host.run(&format!("mkdir -p {}", local_distro_rpm_dir))?;
    local_host.run(&format!("rm {} -fr", local_collector_rpm_dir))?;

    build_host.get_file(&host_rpm_dir, &local_distro_rpm_dir)?;

    // rpmbuild output lands as x86_64/, rename to the collector cache dir
    local_host.run(&format!(
        "mv {} {}",
        local_fetch_dir, local_collector_rpm_dir
    ))?;
    Ok(())
}

/// Check the local cache for the full expected collector RPM set; build only
/// when something is missing, prune stale versions when everything is there.
/// A build that fails to produce the expected set is fatal.
#[allow(clippy::too_many_arguments)]
pub fn ensure_collector_rpms(
    workspace: &str,
    build_host: &dyn RemoteHost,
    local_host: &dyn RemoteHost,
    collector_git_path: &str,
    layout: &CacheLayout,
    version_release: &str,
    tarball_name: &str,
    distro: Distro,
) -> Result<()> {
    let local_collector_rpm_dir = layout.collector_rpm_dir(distro);
    let output = local_host.run(&format!(
        "mkdir -p {dir} && ls {dir}",
        dir = local_collector_rpm_dir
    ))?;
    let mut cached_fnames: Vec<String> =
        output.stdout.split_whitespace().map(String::from).collect();

    let all_cached = expected_set_cached(&mut cached_fnames, version_release, distro);

    if !all_cached {
        build_collector(
            workspace,
            build_host,
            local_host,
            collector_git_path,
            layout,
            tarball_name,
            distro,
        )?;

        // Don't trust the build, check the RPMs again
        let output = local_host.run(&format!("ls {}", local_collector_rpm_dir))?;
        let mut built_fnames: Vec<String> =
            output.stdout.split_whitespace().map(String::from).collect();
        for name in packages::COLLECTOR_RPM_NAMES {
            let filename = packages::collector_rpm_filename(name, version_release, distro);
            match built_fnames.iter().position(|f| *f == filename) {
                Some(position) => {
                    built_fnames.remove(position);
                }
                None => {
                    return Err(Error::package_missing_after_build(
                        filename,
                        local_collector_rpm_dir,
                    ))
                }
            }
        }
        return Ok(());
    }

    info!(
        directory = %local_collector_rpm_dir,
        version_release,
        "collector RPMs already cached, skipping build"
    );

    // Keep the cache from accumulating stale versions
    let pattern = packages::collector_rpm_pattern(version_release, distro);
    for fname in &cached_fnames {
        if pattern.is_match(fname) {
            continue;
        }
        let fpath = format!("{}/{}", local_collector_rpm_dir, fname);
        debug!(path = %fpath, pattern = %pattern, "removing file not matching pattern");
        local_host.remove_file(&fpath)?;
    }
    Ok(())
}

/// Consume every expected filename from `cached_fnames`, reporting whether
/// the whole set was present. Consumed entries are removed so the leftovers
/// are prune candidates.
fn expected_set_cached(
    cached_fnames: &mut Vec<String>,
    version_release: &str,
    distro: Distro,
) -> bool {
    for name in packages::COLLECTOR_RPM_NAMES {
        let filename = packages::collector_rpm_filename(name, version_release, distro);
        match cached_fnames.iter().position(|f| *f == filename) {
            Some(position) => {
                cached_fnames.remove(position);
            }
            None => {
                debug!(filename, "collector RPM not cached, full build needed");
                return false;
            }
        }
    }
    true
}
