//! Image content assembly: third-party server RPMs, dashboard plugin
//! checkouts, cache hygiene, and the final ISO build.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::layout::{CacheLayout, RPMS_DIR_NAME};
use crate::packages;
use crate::remote::RemoteHost;
use crate::utils::shell;

const WGET_TIMEOUT: Duration = Duration::from_secs(3600);

/// Download server RPMs that are not cached yet and drop anything in the
/// server directory that no current package claims.
pub fn fetch_server_rpms(local_host: &dyn RemoteHost, layout: &CacheLayout) -> Result<()> {
    let server_rpm_dir = layout.server_rpm_dir();
    local_host.run(&format!("mkdir -p {}", server_rpm_dir))?;

    for package in packages::SERVER_PACKAGES {
        let fpath = format!("{}/{}", server_rpm_dir, package.filename);
        if local_host.path_exists(&fpath) {
            continue;
        }
        info!(url = package.url, "downloading server RPM");
        let command = format!(
            "cd {} && wget --no-check-certificate {}",
            shell::quote_path(&server_rpm_dir),
            shell::quote_arg(package.url)
        );
        local_host.run_with_timeout(&command, Some(WGET_TIMEOUT))?;
    }

    for fname in local_host.list_dir(&server_rpm_dir)? {
        if packages::SERVER_PACKAGES.iter().any(|p| p.filename == fname) {
            continue;
        }
        let fpath = format!("{}/{}", server_rpm_dir, fname);
        warn!(path = %fpath, "removing unknown file from server RPM directory");
        local_host.remove_file(&fpath)?;
    }
    Ok(())
}

/// Clone or refresh the dashboard plugin checkouts next to the cache tree.
/// A checkout missing its marker files is unusable and fatal.
pub fn fetch_plugins(local_host: &dyn RemoteHost, layout: &CacheLayout) -> Result<()> {
    for plugin in packages::PLUGIN_REPOS {
        let plugin_dir = layout.plugin_dir(plugin.name);
        if local_host.path_exists(&plugin_dir) {
            local_host.run(&format!(
                "cd {} && git pull",
                shell::quote_path(&plugin_dir)
            ))?;
        } else {
            local_host.run(&format!(
                "cd {} && git clone {} {}",
                shell::quote_path(layout.root()),
                shell::quote_arg(plugin.git_url),
                shell::quote_arg(plugin.name)
            ))?;
        }

        for marker in plugin.marker_files {
            let fpath = format!("{}/{}", plugin_dir, marker);
            if !local_host.path_exists(&fpath) {
                return Err(Error::package_not_found_in_image(*marker, plugin_dir.as_str()));
            }
        }
    }
    Ok(())
}

/// Drop cache-root entries that belong to no plugin and are not the RPM
/// tree. Keeps the generated ISO from carrying leftovers of older layouts.
pub fn evict_unknown_cache_entries(
    local_host: &dyn RemoteHost,
    layout: &CacheLayout,
) -> Result<()> {
    for fname in local_host.list_dir(layout.root())? {
        if fname == RPMS_DIR_NAME {
            continue;
        }
        if packages::PLUGIN_REPOS.iter().any(|p| p.name == fname) {
            continue;
        }
        let fpath = format!("{}/{}", layout.root(), fname);
        warn!(path = %fpath, "removing unknown entry from cache directory");
        local_host.run(&format!("rm -fr {}", shell::quote_path(&fpath)))?;
    }
    Ok(())
}

/// Run the ISO build in the source tree, pointing it at the populated cache.
pub fn assemble_iso(
    local_host: &dyn RemoteHost,
    current_dir: &str,
    layout: &CacheLayout,
) -> Result<()> {
    let command = format!(
        "cd {} && rm monforge-*.tar.bz2 monforge-*.tar.gz -f && \
         sh autogen.sh && ./configure --with-cached-iso={} && make",
        current_dir,
        layout.root()
    );
    local_host.run(&command)?;
    Ok(())
}

/// Populate everything the ISO needs beyond the distro RPM caches, then
/// build it.
pub fn build_image(
    local_host: &dyn RemoteHost,
    current_dir: &str,
    layout: &CacheLayout,
) -> Result<()> {
    fetch_server_rpms(local_host, layout)?;
    fetch_plugins(local_host, layout)?;
    evict_unknown_cache_entries(local_host, layout)?;
    assemble_iso(local_host, current_dir, layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::remote::fake::{fail, ok, FakeHost};

    fn layout() -> CacheLayout {
        CacheLayout::new("/work/iso_cached_dir")
    }

    #[test]
    fn missing_server_rpms_are_downloaded() {
        let host = FakeHost::new("localhost", crate::distro::Distro::Rhel7)
            .on("test -e '/work/iso_cached_dir/RPMS/rhel7/server/grafana", fail(1, ""))
            .on("test -e '/work/iso_cached_dir/RPMS/rhel7/server/influxdb", ok(""))
            .on("ls '/work/iso_cached_dir/RPMS/rhel7/server'", ok(
                "grafana-6.0.2-1.x86_64.rpm\ninfluxdb-1.7.4.x86_64.rpm\n",
            ));

        fetch_server_rpms(&host, &layout()).unwrap();

        assert_eq!(host.count_commands_containing("wget"), 1);
        assert!(host.ran_command_containing(
            "cd '/work/iso_cached_dir/RPMS/rhel7/server' && \
             wget --no-check-certificate https://dl.grafana.com/oss/release/grafana-6.0.2-1.x86_64.rpm"
        ));
        assert!(!host.ran_command_containing("rm -f '"));
    }

    #[test]
    fn unknown_server_dir_files_are_removed() {
        let host = FakeHost::new("localhost", crate::distro::Distro::Rhel7)
            .on("ls '/work/iso_cached_dir/RPMS/rhel7/server'", ok(
                "grafana-6.0.2-1.x86_64.rpm\ninfluxdb-1.7.4.x86_64.rpm\ngrafana-4.4.1-1.x86_64.rpm\n",
            ));

        fetch_server_rpms(&host, &layout()).unwrap();

        assert!(host.ran_command_containing(
            "rm -f '/work/iso_cached_dir/RPMS/rhel7/server/grafana-4.4.1-1.x86_64.rpm'"
        ));
        assert_eq!(host.count_commands_containing("rm -f '"), 1);
    }

    #[test]
    fn absent_plugin_is_cloned_present_plugin_is_pulled() {
        let host = FakeHost::new("localhost", crate::distro::Distro::Rhel7)
            .on("test -e '/work/iso_cached_dir/grafana-piechart-panel'", fail(1, ""))
            .on("test -e '/work/iso_cached_dir/grafana-status-panel'", ok(""));
        // marker file checks fall through to the default success rule

        fetch_plugins(&host, &layout()).unwrap();

        assert!(host.ran_command_containing(
            "cd '/work/iso_cached_dir' && git clone \
             https://github.com/grafana/piechart-panel.git grafana-piechart-panel"
        ));
        assert!(host.ran_command_containing(
            "cd '/work/iso_cached_dir/grafana-status-panel' && git pull"
        ));
        assert_eq!(host.count_commands_containing("git clone"), 1);
        assert_eq!(host.count_commands_containing("git pull"), 1);
    }

    #[test]
    fn plugin_without_marker_files_is_fatal() {
        let host = FakeHost::new("localhost", crate::distro::Distro::Rhel7)
            .on("test -e '/work/iso_cached_dir/grafana-piechart-panel/dist/module.js'", fail(1, ""));

        let err = fetch_plugins(&host, &layout()).unwrap_err();
        assert_eq!(err.code, ErrorCode::PackageNotFoundInImage);
    }

    #[test]
    fn cache_eviction_keeps_rpms_and_plugins() {
        let host = FakeHost::new("localhost", crate::distro::Distro::Rhel7).on(
            "ls '/work/iso_cached_dir'",
            ok("RPMS\ngrafana-piechart-panel\ngrafana-status-panel\nold_stuff\n"),
        );

        evict_unknown_cache_entries(&host, &layout()).unwrap();

        assert!(host.ran_command_containing("rm -fr '/work/iso_cached_dir/old_stuff'"));
        assert_eq!(host.count_commands_containing("rm -fr"), 1);
    }

    #[test]
    fn iso_build_points_configure_at_cache() {
        let host = FakeHost::new("localhost", crate::distro::Distro::Rhel7);
        assemble_iso(&host, "/work/monforge", &layout()).unwrap();
        assert!(host.ran_command_containing(
            "cd /work/monforge && rm monforge-*.tar.bz2 monforge-*.tar.gz -f && \
             sh autogen.sh && ./configure --with-cached-iso=/work/iso_cached_dir && make"
        ));
    }

    #[test]
    fn failed_download_is_fatal() {
        let host = FakeHost::new("localhost", crate::distro::Distro::Rhel7)
            .on("test -e", fail(1, ""))
            .on("wget", fail(4, "network failure"));
        let err = fetch_server_rpms(&host, &layout()).unwrap_err();
        assert_eq!(err.code, ErrorCode::RemoteCommandFailed);
    }
}
