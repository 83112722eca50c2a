pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use affilink_core::config::{AppConfig, LoadOptions, LogFormat};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "affilink",
    about = "Affiliate link resolution CLI",
    long_about = "Resolve marketplace product links into tracked affiliate links, inspect configuration, and check readiness.",
    after_help = "Examples:\n  affilink resolve https://www.aliexpress.com/item/1005001234567890.html\n  cat links.txt | affilink batch\n  affilink doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Read configuration from this file instead of affilink.toml")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Resolve one marketplace link and print the outcome as JSON")]
    Resolve {
        #[arg(help = "Product or short link to resolve")]
        url: String,
    },
    #[command(about = "Resolve every stdin line with a shared cache, one JSON line per input")]
    Batch,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, credential readiness, and request signing")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Resolve { url } => commands::resolve::run(&options, &url),
        Command::Batch => commands::batch::run(&options),
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => commands::doctor::run(&options, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the global subscriber on stderr so stdout stays machine-readable.
/// `RUST_LOG` takes precedence over the configured level. Later calls are no-ops.
pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
