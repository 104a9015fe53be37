mod cmd;
mod gpio;
mod input;
mod mqtt;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Input event daemon: buttons run action sequences, encoders publish batched adjustments")]
#[command(version)]
struct Cli {
    /// Path to the config file
    #[arg(
        long,
        global = true,
        env = "SWITCHBOARD_CONFIG",
        default_value = "/etc/switchboard/config.yaml"
    )]
    config: PathBuf,

    /// Output JSON instead of human-readable text
    #[arg(long, short = 'j', global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon: listen for input events and dispatch them
    Run,
    /// Validate the config file and report findings
    Check,
    /// List key-capable input devices
    Devices,
    /// Pulse configured output lines to verify the wiring
    TestSwitch {
        /// Pulse only this line instead of all configured lines
        #[arg(long)]
        line: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    // The daemon narrates what it does; one-shot commands stay quiet
    // unless RUST_LOG says otherwise.
    let default_level = match cli.command {
        Commands::Run => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Run => cmd::run::run(&cli.config),
        Commands::Check => cmd::check::run(&cli.config, cli.json),
        Commands::Devices => cmd::devices::run(cli.json),
        Commands::TestSwitch { ref line } => cmd::test_switch::run(&cli.config, line.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
