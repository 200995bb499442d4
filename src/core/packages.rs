//! Package manifests: which RPMs the distribution needs, where third-party
//! server packages come from, and how cached filenames are recognized.

use regex::Regex;

use crate::distro::Distro;

/// RPMs required on every monitored client.
pub const CLIENT_DEPENDENT_RPMS: &[&str] =
    &["yajl", "openpgm", "zeromq3", "glibc", "patch", "rsync"];

/// Extra RPMs required on the monitoring server (grafana runtime deps).
pub const SERVER_DEPENDENT_RPMS: &[&str] = &[
    "fontconfig",
    "fontpackages-filesystem",
    "libfontenc",
    "libXfont",
    "libxslt",
    "urw-fonts",
    "xorg-x11-font-utils",
    "xorg-x11-server-utils",
];

/// RPMs the installer itself needs before it can run.
pub const INSTALL_DEPENDENT_RPMS: &[&str] = &[
    "PyYAML",
    "python2-filelock",
    "python-dateutil",
    "python-requests",
    "python-slugify",
];

/// Package names produced by a collector build.
pub const COLLECTOR_RPM_NAMES: &[&str] = &[
    "collectd",
    "collectd-disk",
    "collectd-filedata",
    "collectd-ime",
    "collectd-sensors",
    "collectd-ssh",
    "libcollectdclient",
];

/// Build dependencies installed on a build host before compiling the
/// collector. riemann-c-client-devel is unavailable on rhel6; yum tolerates
/// that.
pub const COLLECTOR_BUILD_DEPENDENT_RPMS: &[&str] = &[
    "libgcrypt-devel",
    "libtool-ltdl-devel",
    "curl-devel",
    "libxml2-devel",
    "yajl-devel",
    "libdbi-devel",
    "libpcap-devel",
    "OpenIPMI-devel",
    "iptables-devel",
    "libvirt-devel",
    "libmemcached-devel",
    "mysql-devel",
    "libnotify-devel",
    "libesmtp-devel",
    "postgresql-devel",
    "rrdtool-devel",
    "rrdtool",
    "lm_sensors-libs",
    "lm_sensors-devel",
    "net-snmp-devel",
    "libcap-devel",
    "lvm2-devel",
    "libmodbus-devel",
    "libmnl-devel",
    "iproute-devel",
    "hiredis-devel",
    "libatasmart-devel",
    "protobuf-c-devel",
    "mosquitto-devel",
    "gtk2-devel",
    "openldap-devel",
    "zeromq3-devel",
    "libssh2-devel",
    "createrepo",
    "mkisofs",
    "yum-utils",
    "redhat-lsb",
    "unzip",
    "epel-release",
    "perl-Regexp-Common",
    "lua-devel",
    "byacc",
    "ganglia-devel",
    "libmicrohttpd-devel",
    "riemann-c-client-devel",
    "xfsprogs-devel",
    "uthash-devel",
    "perl-ExtUtils-Embed",
];

/// Dependent RPMs a distribution must cache. Client set everywhere; the
/// rhel7 image also carries the server and install sets.
pub fn required_dependent_rpms(distro: Distro) -> Vec<&'static str> {
    let mut rpms: Vec<&'static str> = CLIENT_DEPENDENT_RPMS.to_vec();
    if distro == Distro::Rhel7 {
        for name in SERVER_DEPENDENT_RPMS
            .iter()
            .chain(INSTALL_DEPENDENT_RPMS.iter())
        {
            if !rpms.contains(name) {
                rpms.push(name);
            }
        }
    }
    rpms
}

/// Expected cache filename of one collector RPM for a version-release and
/// distribution, e.g. `collectd-5.7.2.abc1234-1.el7.x86_64.rpm`.
pub fn collector_rpm_filename(name: &str, version_release: &str, distro: Distro) -> String {
    format!(
        "{}-{}.el{}.x86_64.rpm",
        name,
        version_release,
        distro.number()
    )
}

/// Pattern accepting any collector RPM of the given version-release. Cached
/// files not matching it are stale and get pruned.
pub fn collector_rpm_pattern(version_release: &str, distro: Distro) -> Regex {
    let pattern = format!(
        r"^collectd-\S+-{}\.el{}\.x86_64\.rpm$",
        regex::escape(version_release),
        distro.number()
    );
    Regex::new(&pattern).expect("static collector RPM pattern")
}

/// Pattern matching an installable rhel7 RPM filename for a package name,
/// e.g. `python-requests-2.6.0-1.el7_1.noarch.rpm`.
pub fn installable_rpm_pattern(name: &str) -> Regex {
    let pattern = format!(
        r"^{}-\d[^-]*-[^-]+\.(x86_64|noarch)\.rpm$",
        regex::escape(name)
    );
    Regex::new(&pattern).expect("static installable RPM pattern")
}

/// A third-party server package fetched by direct URL.
#[derive(Debug, Clone, Copy)]
pub struct ServerPackage {
    pub filename: &'static str,
    pub url: &'static str,
}

pub const SERVER_PACKAGES: &[ServerPackage] = &[
    ServerPackage {
        filename: "grafana-6.0.2-1.x86_64.rpm",
        url: "https://dl.grafana.com/oss/release/grafana-6.0.2-1.x86_64.rpm",
    },
    ServerPackage {
        filename: "influxdb-1.7.4.x86_64.rpm",
        url: "https://dl.influxdata.com/influxdb/releases/influxdb-1.7.4.x86_64.rpm",
    },
];

/// A dashboard plugin checkout kept alongside the cache tree. `marker_files`
/// must exist inside the checkout for it to count as valid.
#[derive(Debug, Clone, Copy)]
pub struct PluginRepo {
    pub name: &'static str,
    pub git_url: &'static str,
    pub marker_files: &'static [&'static str],
}

pub const PLUGIN_REPOS: &[PluginRepo] = &[
    PluginRepo {
        name: "grafana-piechart-panel",
        git_url: "https://github.com/grafana/piechart-panel.git",
        marker_files: &["dist/module.js", "dist/plugin.json"],
    },
    PluginRepo {
        name: "grafana-status-panel",
        git_url: "https://github.com/Vonage/Grafana_Status_panel.git",
        marker_files: &["dist/module.js", "dist/plugin.json"],
    },
];
