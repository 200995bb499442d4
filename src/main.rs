use clap::{Parser, Subcommand};

mod commands;

use commands::{build, install};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "monforge")]
#[command(version = VERSION)]
#[command(about = "Build and install a monitoring distribution image")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the distribution ISO
    Build(build::BuildArgs),
    /// Install the distribution on this host
    Install(install::InstallArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build(args) => build::run(args),
        Commands::Install(args) => install::run(args),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error[{}]: {}", err.code.as_str(), err.message);
            std::process::ExitCode::FAILURE
        }
    }
}
