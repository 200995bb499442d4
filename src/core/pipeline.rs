//! End-to-end build pipeline: fresh collector checkout, version computation
//! from the RPM spec file, per-distribution host builds, then image assembly.

use tracing::info;

use crate::collector::COLLECTOR_GIT_DIR_NAME;
use crate::config::BuildConfig;
use crate::distro::Distro;
use crate::error::{Error, Result};
use crate::image;
use crate::layout::CacheLayout;
use crate::prepare;
use crate::remote::RemoteHost;
use crate::workspace::Workspace;

pub const CACHE_DIR_NAME: &str = "iso_cached_dir";

/// Collector version and release resolved from the checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorVersion {
    pub version: String,
    pub release: String,
}

impl CollectorVersion {
    pub fn version_release(&self) -> String {
        format!("{}-{}", self.version, self.release)
    }

    pub fn tarball_name(&self) -> String {
        format!("collectd-{}", self.version)
    }
}

/// Resolve the `%{?rev}` macro in the spec file Version tag to the actual
/// git revision of the checkout.
fn resolve_version(version_string: &str, git_revision: &str) -> String {
    version_string.replace("%{?rev}", git_revision)
}

/// The `%{?dist}` macro is per-distribution; the version-release used for
/// cache filenames carries the dist tag separately.
fn resolve_release(release_string: &str) -> String {
    release_string.replace("%{?dist}", "")
}

/// Blow away any previous checkout and clone the requested branch fresh, so
/// the build never picks up leftover local state.
pub fn clone_collector(
    local_host: &dyn RemoteHost,
    collector_git_path: &str,
    git_url: &str,
    git_branch: &str,
) -> Result<()> {
    info!(url = git_url, branch = git_branch, "cloning collector source");
    local_host.run(&format!(
        "rm -fr {path} && git clone {url} -b {branch} {path}",
        path = collector_git_path,
        url = git_url,
        branch = git_branch
    ))?;
    Ok(())
}

/// Read the collector version and release out of the checkout's spec file.
pub fn collector_version(
    local_host: &dyn RemoteHost,
    collector_git_path: &str,
) -> Result<CollectorVersion> {
    let output = local_host.run(&format!(
        "cd {} && git rev-parse --short HEAD",
        collector_git_path
    ))?;
    let git_revision = output.stdout.trim().to_string();

    let output = local_host.run(&format!(
        r"cd {} && grep Version contrib/redhat/collectd.spec | grep -v \# | awk '{{print $2}}'",
        collector_git_path
    ))?;
    let version = resolve_version(output.stdout.trim(), &git_revision);

    let output = local_host.run(&format!(
        r"cd {} && grep Release contrib/redhat/collectd.spec | grep -v \# | awk '{{print $2}}'",
        collector_git_path
    ))?;
    let release = resolve_release(output.stdout.trim());

    Ok(CollectorVersion { version, release })
}

/// Run the whole build against already-resolved hosts. The image can only
/// be assembled on a rhel7 host.
pub fn do_build(
    config: &BuildConfig,
    local_host: &dyn RemoteHost,
    rhel6_host: Option<&dyn RemoteHost>,
    current_dir: &str,
    workspace: &Workspace,
) -> Result<()> {
    let local_distro = local_host.distro()?;
    if local_distro != Distro::Rhel7 {
        return Err(Error::distro_mismatch(
            local_host.hostname(),
            Distro::Rhel7.as_str(),
            local_distro.as_str(),
        ));
    }

    let layout = CacheLayout::new(format!("{}/../{}", current_dir, CACHE_DIR_NAME));
    let collector_git_path = format!("{}/../{}", current_dir, COLLECTOR_GIT_DIR_NAME);

    local_host.run(&format!("mkdir -p {}", layout.rpms_dir()))?;

    clone_collector(
        local_host,
        &collector_git_path,
        config.collector_git_url(),
        config.collector_git_branch(),
    )?;

    let version = collector_version(local_host, &collector_git_path)?;
    let version_release = version.version_release();
    let tarball_name = version.tarball_name();
    info!(version_release, "resolved collector version");

    if let Some(rhel6_host) = rhel6_host {
        prepare::prepare_and_build(
            &workspace.remote_path(),
            rhel6_host,
            local_host,
            &collector_git_path,
            &layout,
            &version_release,
            &tarball_name,
            Distro::Rhel6,
        )?;
    }

    prepare::prepare_and_build(
        &workspace.local_path,
        local_host,
        local_host,
        &collector_git_path,
        &layout,
        &version_release,
        &tarball_name,
        Distro::Rhel7,
    )?;

    image::build_image(local_host, current_dir, &layout)?;

    // The remote workspace is only useful for debugging a failed run
    if let Some(rhel6_host) = rhel6_host {
        rhel6_host.run(&format!("rm -fr {}", workspace.remote_path()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::packages;
    use crate::remote::fake::{fail, ok, FakeHost};

    #[test]
    fn version_macros_are_resolved() {
        assert_eq!(resolve_version("5.7.2.%{?rev}", "abc1234"), "5.7.2.abc1234");
        assert_eq!(resolve_version("5.7.2", "abc1234"), "5.7.2");
        assert_eq!(resolve_release("1%{?dist}"), "1");
        assert_eq!(resolve_release("1"), "1");
    }

    #[test]
    fn version_release_and_tarball_name() {
        let version = CollectorVersion {
            version: "5.7.2.abc1234".to_string(),
            release: "1".to_string(),
        };
        assert_eq!(version.version_release(), "5.7.2.abc1234-1");
        assert_eq!(version.tarball_name(), "collectd-5.7.2.abc1234");
    }

    fn host_with_spec_rules(host: FakeHost) -> FakeHost {
        host.on("git rev-parse --short HEAD", ok("abc1234\n"))
            .on("grep Version contrib/redhat/collectd.spec", ok("5.7.2.%{?rev}\n"))
            .on("grep Release contrib/redhat/collectd.spec", ok("1%{?dist}\n"))
    }

    #[test]
    fn collector_version_is_read_from_checkout() {
        let host = host_with_spec_rules(FakeHost::new("localhost", Distro::Rhel7));
        let version = collector_version(&host, "/work/collectd.git").unwrap();
        assert_eq!(version.version, "5.7.2.abc1234");
        assert_eq!(version.release, "1");
        assert!(host.ran_command_containing("cd /work/collectd.git && git rev-parse"));
    }

    #[test]
    fn checkout_is_always_fresh() {
        let host = FakeHost::new("localhost", Distro::Rhel7);
        clone_collector(
            &host,
            "/work/collectd.git",
            "https://example.com/collectd.git",
            "master-ddn",
        )
        .unwrap();
        assert!(host.ran_command_containing(
            "rm -fr /work/collectd.git && git clone https://example.com/collectd.git \
             -b master-ddn /work/collectd.git"
        ));
    }

    #[test]
    fn build_refuses_to_run_on_rhel6() {
        let local = FakeHost::new("localhost", Distro::Rhel6);
        let workspace = test_workspace(&local);
        let err = do_build(&BuildConfig::default(), &local, None, "/work/monforge", &workspace)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DistroMismatch);
    }

    fn test_workspace(local: &FakeHost) -> Workspace {
        let workspace = Workspace::create(local, "/work/monforge").unwrap();
        local.commands.borrow_mut().clear();
        workspace
    }

    /// Local host scripted so both distro builds find a fully cached
    /// collector set and fully cached dependent RPMs.
    fn fully_cached_local() -> FakeHost {
        const VR: &str = "5.7.2.abc1234-1";
        let mut host = host_with_spec_rules(FakeHost::new("localhost", Distro::Rhel7));
        for distro in [Distro::Rhel6, Distro::Rhel7] {
            let listing = packages::COLLECTOR_RPM_NAMES
                .iter()
                .map(|n| packages::collector_rpm_filename(n, VR, distro))
                .collect::<Vec<_>>()
                .join("\n");
            host = host.on(
                &format!(
                    "ls /work/monforge/../iso_cached_dir/RPMS/{}/collectd",
                    distro.as_str()
                ),
                ok(&listing),
            );
        }
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
        // Plugin and server caches are treated as complete
        host.on("test -e", ok(""))
    }

    fn rhel6_build_host() -> FakeHost {
        let mut host = FakeHost::new("build6", Distro::Rhel6)
            .on("rpm -qa | grep i686", fail(1, ""))
            .on("ls ", ok(""));
        for name in packages::required_dependent_rpms(Distro::Rhel6) {
            host = host
                .on(
                    &format!("rpm -q {}", name),
                    ok(&format!("{}-1.0-1.el6.x86_64\n", name)),
                )
                .on(
                    &format!("yumdb get checksum_data {}-1.0-1.el6.x86_64", name),
                    ok("     checksum_data = sha-any\n"),
                )
                .on("sha256sum", ok("sha-any  -\n"));
        }
        host
    }

    #[test]
    fn full_build_cleans_up_remote_workspace() {
        let local = fully_cached_local();
        let workspace = test_workspace(&local);
        let rhel6 = rhel6_build_host();

        do_build(
            &BuildConfig::default(),
            &local,
            Some(&rhel6),
            "/work/monforge",
            &workspace,
        )
        .unwrap();

        // Remote side built under /var/log and was cleaned up afterwards
        let remote_path = workspace.remote_path();
        assert!(remote_path.starts_with("/var/log/build_monforge/"));
        assert!(rhel6.ran_command_containing(&format!("mkdir -p {}", remote_path)));
        assert!(rhel6.ran_command_containing(&format!("rm -fr {}", remote_path)));

        // Image assembly ran against the shared cache
        assert!(local.ran_command_containing(
            "./configure --with-cached-iso=/work/monforge/../iso_cached_dir && make"
        ));
    }

    #[test]
    fn build_without_rhel6_host_skips_rhel6_entirely() {
        let local = fully_cached_local();
        let workspace = test_workspace(&local);

        do_build(&BuildConfig::default(), &local, None, "/work/monforge", &workspace)
            .unwrap();

        assert!(!local.ran_command_containing("/var/log/build_monforge"));
        assert!(local.ran_command_containing("git clone"));
        assert!(local.ran_command_containing("rpm -q rsync"));
    }
}
