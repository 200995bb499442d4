//! Build-host preparation: distro verification, system refresh, build
//! dependencies, then the collector build and dependent-RPM sync for one
//! target distribution.

use std::time::Duration;

use tracing::info;

use crate::collector;
use crate::deps;
use crate::distro::Distro;
use crate::error::{Error, Result};
use crate::layout::{CacheLayout, DEPENDENT_DIR_NAME};
use crate::packages;
use crate::remote::RemoteHost;

const UPDATE_TIMEOUT: Duration = Duration::from_secs(1200);
const UNINSTALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Prepare a build host and produce everything the image needs for one
/// distribution: collector RPMs plus the synced dependent-RPM cache.
#[allow(clippy::too_many_arguments)]
pub fn prepare_and_build(
    workspace: &str,
    build_host: &dyn RemoteHost,
    local_host: &dyn RemoteHost,
    collector_git_path: &str,
    layout: &CacheLayout,
    version_release: &str,
    tarball_name: &str,
    distro: Distro,
) -> Result<()> {
    let actual = build_host.distro()?;
    if actual != distro {
        return Err(Error::distro_mismatch(
            build_host.hostname(),
            distro.as_str(),
            actual.as_str(),
        ));
    }

    let local_dependent_rpm_dir = layout.dependent_rpm_dir(distro);
    let local_copying_rpm_dir = layout.copying_dir(distro);
    let local_copying_dependent_dir = layout.copying_dependent_dir(distro);
    let host_dependent_rpm_dir = format!("{}/{}", workspace, DEPENDENT_DIR_NAME);

    // Update to the latest distro release
    build_host.run_with_timeout("yum update -y", Some(UPDATE_TIMEOUT))?;

    // The update sometimes drags in i686 RPMs which then shadow their
    // x86_64 twins. Uninstall them when present.
    let output = build_host.exec("rpm -qa | grep i686", Some(UNINSTALL_TIMEOUT));
    if output.success {
        build_host.run_with_timeout("rpm -qa | grep i686 | xargs rpm -e", Some(UNINSTALL_TIMEOUT))?;
    }

    // Conflicts with zeromq3-devel; best effort, absence is fine
    build_host.exec("rpm -e zeromq-devel", None);

    let mut command = "yum install -y".to_string();
    for name in packages::COLLECTOR_BUILD_DEPENDENT_RPMS {
        command.push(' ');
        command.push_str(name);
    }
    build_host.run_with_timeout(&command, Some(UPDATE_TIMEOUT))?;

    build_host.run(&format!("mkdir -p {}", workspace))?;

    collector::ensure_collector_rpms(
        workspace,
        build_host,
        local_host,
        collector_git_path,
        layout,
        version_release,
        tarball_name,
        distro,
    )?;

    // A cached dependent directory is shipped to the host instead of
    // being re-downloaded; a non-directory squatting on the path is junk.
    let mut dependent_rpm_cached = false;
    if local_host.path_exists(&local_dependent_rpm_dir) {
        if local_host.path_is_dir(&local_dependent_rpm_dir) {
            dependent_rpm_cached = true;
        } else {
            local_host.remove_file(&local_dependent_rpm_dir)?;
        }
    }

    if dependent_rpm_cached {
        info!(
            directory = %local_dependent_rpm_dir,
            host = build_host.hostname(),
            "reusing cached dependent RPMs"
        );
        build_host.send_file(&local_dependent_rpm_dir, workspace)?;
    } else {
        build_host.run(&format!("mkdir -p {}", host_dependent_rpm_dir))?;
    }

    deps::sync_dependent_rpms(build_host, &host_dependent_rpm_dir, distro)?;

    // Fetch the synced set through a staging directory so a failed copy
    // never leaves a half-replaced cache behind.
    local_host.run(&format!(
        "rm -fr {dir} && mkdir -p {dir}",
        dir = local_copying_rpm_dir
    ))?;
    build_host.get_file(&host_dependent_rpm_dir, &local_copying_rpm_dir)?;
    local_host.run(&format!(
        "rm -fr {} && mv {} {} && rm -rf {}",
        local_dependent_rpm_dir,
        local_copying_dependent_dir,
        local_dependent_rpm_dir,
        local_copying_rpm_dir
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::remote::fake::{fail, ok, FakeHost};

    const VR: &str = "5.7.2.abc1234-1";

    fn cached_collector_listing() -> String {
        packages::COLLECTOR_RPM_NAMES
            .iter()
            .map(|n| packages::collector_rpm_filename(n, VR, Distro::Rhel7))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn dependent_rules(mut host: FakeHost) -> FakeHost {
        for name in packages::required_dependent_rpms(Distro::Rhel7) {
            host = host
                .on(
                    &format!("rpm -q {}", name),
                    ok(&format!("{}-1.0-1.el7.x86_64\n", name)),
                )
                .on(
                    &format!("yumdb get checksum_data {}-1.0-1.el7.x86_64", name),
                    ok("     checksum_data = sha-any\n"),
                )
                .on("sha256sum", ok("sha-any  -\n"));
        }
        host
    }

    #[test]
    fn distro_mismatch_runs_nothing_remote() {
        let build = FakeHost::new("build6", Distro::Rhel6);
        let local = FakeHost::new("localhost", Distro::Rhel7);
        let err = prepare_and_build(
            "/ws", &build, &local, "/src/collectd.git",
            &CacheLayout::new("/cache"), VR, "collectd-5.7.2.abc1234", Distro::Rhel7,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DistroMismatch);
        assert!(build.commands.borrow().is_empty());
    }

    #[test]
    fn refresh_failure_is_fatal() {
        let build = FakeHost::new("build7", Distro::Rhel7)
            .on("yum update -y", fail(1, "mirror unreachable"));
        let local = FakeHost::new("localhost", Distro::Rhel7);
        let err = prepare_and_build(
            "/ws", &build, &local, "/src/collectd.git",
            &CacheLayout::new("/cache"), VR, "collectd-5.7.2.abc1234", Distro::Rhel7,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::RemoteCommandFailed);
    }

    #[test]
    fn conflicting_package_removal_is_best_effort() {
        // rpm -e zeromq-devel fails, pipeline continues; i686 probe fails
        // (none installed), so no uninstall happens.
        let build = FakeHost::new("build7", Distro::Rhel7)
            .on("rpm -e zeromq-devel", fail(1, "not installed"))
            .on("rpm -qa | grep i686 | xargs rpm -e", fail(1, "unexpected"))
            .on("rpm -qa | grep i686", fail(1, ""))
            .on("ls ", ok(""));
        let build = dependent_rules(build);
        let local = FakeHost::new("localhost", Distro::Rhel7)
            .on("ls /cache/RPMS/rhel7/collectd", ok(&cached_collector_listing()))
            .on("test -e", fail(1, ""));

        prepare_and_build(
            "/ws", &build, &local, "/src/collectd.git",
            &CacheLayout::new("/cache"), VR, "collectd-5.7.2.abc1234", Distro::Rhel7,
        )
        .unwrap();

        assert!(build.ran_command_containing("rpm -e zeromq-devel"));
        assert!(!build.ran_command_containing("xargs rpm -e"));
        assert!(build.ran_command_containing("mkdir -p /ws/dependent"));
    }

    #[test]
    fn i686_leftovers_are_uninstalled_when_present() {
        let build = FakeHost::new("build7", Distro::Rhel7)
            .on("rpm -qa | grep i686 | xargs rpm -e", ok(""))
            .on("rpm -qa | grep i686", ok("glibc-2.17-196.el7.i686\n"))
            .on("ls ", ok(""));
        let build = dependent_rules(build);
        let local = FakeHost::new("localhost", Distro::Rhel7)
            .on("ls /cache/RPMS/rhel7/collectd", ok(&cached_collector_listing()))
            .on("test -e", fail(1, ""));

        prepare_and_build(
            "/ws", &build, &local, "/src/collectd.git",
            &CacheLayout::new("/cache"), VR, "collectd-5.7.2.abc1234", Distro::Rhel7,
        )
        .unwrap();
        assert!(build.ran_command_containing("xargs rpm -e"));
    }

    #[test]
    fn cached_dependent_dir_is_shipped_not_recreated() {
        let build = FakeHost::new("build7", Distro::Rhel7).on("ls ", ok(""));
        let build = dependent_rules(build);
        let local = FakeHost::new("localhost", Distro::Rhel7)
            .on("ls /cache/RPMS/rhel7/collectd", ok(&cached_collector_listing()));
        // test -e and test -d both succeed by default rule fallback

        prepare_and_build(
            "/ws", &build, &local, "/src/collectd.git",
            &CacheLayout::new("/cache"), VR, "collectd-5.7.2.abc1234", Distro::Rhel7,
        )
        .unwrap();

        assert_eq!(
            build.sent_files.borrow().as_slice(),
            &[("/cache/RPMS/rhel7/dependent".to_string(), "/ws".to_string())]
        );
        assert!(!build.ran_command_containing("mkdir -p /ws/dependent"));
        // Synced set comes home through the staging dir
        assert_eq!(
            build.fetched_files.borrow().as_slice(),
            &[(
                "/ws/dependent".to_string(),
                "/cache/RPMS/rhel7/copying".to_string()
            )]
        );
        assert!(local.ran_command_containing(
            "mv /cache/RPMS/rhel7/copying/dependent /cache/RPMS/rhel7/dependent"
        ));
    }
}
