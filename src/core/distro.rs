use crate::error::{Error, Result};

/// Target distribution of a build host. Only these two releases have
/// package-build parameters; anything else is rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Distro {
    Rhel6,
    Rhel7,
}

impl Distro {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distro::Rhel6 => "rhel6",
            Distro::Rhel7 => "rhel7",
        }
    }

    /// Major release number used in RPM dist tags (`.el6` / `.el7`).
    pub fn number(&self) -> &'static str {
        match self {
            Distro::Rhel6 => "6",
            Distro::Rhel7 => "7",
        }
    }

    /// Parse a `lsb_release -s -r` style release string ("7.4.1708", "6.9").
    pub fn from_release(release: &str) -> Result<Self> {
        match release.split('.').next() {
            Some("6") => Ok(Distro::Rhel6),
            Some("7") => Ok(Distro::Rhel7),
            _ => Err(Error::distro_unsupported(release)),
        }
    }
}

impl std::str::FromStr for Distro {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rhel6" => Ok(Distro::Rhel6),
            "rhel7" => Ok(Distro::Rhel7),
            other => Err(Error::distro_unsupported(other)),
        }
    }
}

impl std::fmt::Display for Distro {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
