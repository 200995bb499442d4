use clap::Args;
use tracing::info;

use monforge::config::BuildConfig;
use monforge::pipeline;
use monforge::ssh::SshHost;
use monforge::workspace::Workspace;
use monforge::{logging, Error, RemoteHost, Result};

#[derive(Args)]
pub struct BuildArgs {
    /// Path to the build configuration file
    pub config: Option<String>,
}

pub fn run(args: BuildArgs) -> Result<()> {
    let current_dir = std::env::current_dir()
        .map_err(|e| Error::internal_io(e.to_string(), Some("current directory".to_string())))?;
    let current_dir = current_dir
        .to_str()
        .ok_or_else(|| Error::internal_unexpected("current directory is not valid UTF-8"))?
        .to_string();

    let local_host = SshHost::localhost();
    let workspace = Workspace::create(&local_host, &current_dir)?;
    let _guard = logging::init_with_log_dir(&workspace.local_path)?;
    info!(workspace = %workspace.local_path, "starting build");

    let (config, loaded_from) = BuildConfig::load_or_default(args.config.as_deref())?;
    match &loaded_from {
        Some(config_path) => {
            info!(config = %config_path, "using configuration file");
            workspace.stash_config(&local_host, config_path)?;
        }
        None => info!("no configuration file found, using built-in defaults"),
    }

    let hosts = config.hosts()?;
    let rhel6_host = config.rhel6_host(&hosts)?;

    pipeline::do_build(
        &config,
        &local_host,
        rhel6_host.map(|host| host as &dyn RemoteHost),
        &current_dir,
        &workspace,
    )?;
    info!("build finished");
    Ok(())
}
