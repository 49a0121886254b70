//! EC2 instance metadata mock.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                 METADATA MOCK                    │
//!                     │                                                  │
//!   Client Request    │  ┌─────────┐    ┌──────────┐    ┌────────────┐   │
//!   ──────────────────┼─▶│  http   │───▶│ routing  │───▶│  catalog   │   │
//!                     │  │ server  │    │  router  │    │  lookup    │   │
//!                     │  └─────────┘    └────┬─────┘    └─────┬──────┘   │
//!                     │                      │                │          │
//!                     │                      ▼                ▼          │
//!                     │               ┌────────────┐   ┌────────────┐    │
//!                     │               │   token    │   │   value    │    │
//!                     │               │  manager   │   │ providers  │    │
//!                     │               └────────────┘   └────────────┘    │
//!   Client Response   │  ┌─────────┐                                     │
//!   ◀─────────────────┼──│response │◀── overrides, latency, faults       │
//!                     │  └─────────┘                                     │
//!                     │                                                  │
//!                     │  Cross-cutting: config (layers, reload),         │
//!                     │  observability, resilience, lifecycle            │
//!                     └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ec2_metadata_mock::config::{ConfigSources, FlagOverrides, MockConfig};
use ec2_metadata_mock::lifecycle::{self, StartupError};
use ec2_metadata_mock::observability::logging::{self, LogFormat};

#[derive(Parser)]
#[command(name = "ec2-metadata-mock")]
#[command(about = "Mock EC2 instance metadata service", version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// TOML file of per-path overrides
    #[arg(long, global = true)]
    overrides: Option<PathBuf>,

    #[arg(long, global = true)]
    host: Option<String>,

    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Require a session token on every request
    #[arg(long, global = true)]
    imdsv2: bool,

    /// Injected latency, `N` or `MIN..MAX` milliseconds
    #[arg(long = "latency-ms", global = true)]
    latency: Option<String>,

    #[arg(long, global = true)]
    instance_id: Option<String>,

    /// Force a status on a path, `PATH=STATUS` (repeatable)
    #[arg(long = "force-status", global = true)]
    force_status: Vec<String>,

    #[arg(long, global = true)]
    grace_period_secs: Option<u64>,

    /// Reload when the config or override file changes
    #[arg(long, global = true)]
    watch: bool,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// `pretty` or `json`
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve until SIGINT/SIGTERM (default)
    Serve,
    /// Fetch one path in-process, print the body and exit
    Fetch {
        path: String,
        /// Skip the session token request
        #[arg(long)]
        no_token: bool,
    },
}

impl Cli {
    fn sources(&self) -> ConfigSources {
        ConfigSources {
            defaults: MockConfig::default(),
            config_file: self.config.clone(),
            overrides_file: self.overrides.clone(),
            flags: FlagOverrides {
                host: self.host.clone(),
                port: self.port,
                imdsv2: self.imdsv2,
                latency: self.latency.clone(),
                instance_id: self.instance_id.clone(),
                force_status: self.force_status.clone(),
                grace_period_secs: self.grace_period_secs,
                watch: self.watch,
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format);

    tracing::info!("ec2-metadata-mock v{} starting", env!("CARGO_PKG_VERSION"));
    let sources = cli.sources();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => match lifecycle::run_persistent(sources).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "Server failed");
                eprintln!("Error: {e}");
                ExitCode::from(e.exit_code())
            }
        },
        Command::Fetch { path, no_token } => {
            let config = match sources.load() {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return ExitCode::from(StartupError::from(e).exit_code());
                }
            };
            match lifecycle::fetch(config, &path, !no_token).await {
                Ok(outcome) => {
                    if outcome.status.is_success() {
                        println!("{}", outcome.body);
                    } else {
                        eprintln!("Error: {} returned status {}", path, outcome.status);
                    }
                    ExitCode::from(outcome.exit_code())
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    ExitCode::from(1)
                }
            }
        }
    }
}
