use clap::Args;

use monforge::install;
use monforge::ssh::SshHost;
use monforge::{logging, Result};

#[derive(Args)]
pub struct InstallArgs {}

pub fn run(_args: InstallArgs) -> Result<()> {
    logging::init()?;
    let local_host = SshHost::localhost();
    install::run_install(&local_host)
}
