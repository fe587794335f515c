//! bankguard CLI.
//!
//! Ask the banking ABAC engine who may do what, against the built-in demo
//! bank or a JSON seed file.
//!
//! # Quick Start
//!
//! ```bash
//! # May USR001 read their own account?
//! bankguard check USR001 ACC001 read_basic_info
//!
//! # A 3,000,000 VND internal transfer with a fraud score override
//! bankguard check USR001 ACC001 transfer_internal_small --amount 3000000 --fraud-score 0.2
//!
//! # Which accounts may the HN001 supervisor see?
//! bankguard list SUP001
//! ```

mod commands;
mod session;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use bankguard_config::{BankguardConfig, ConfigLoader};
use bankguard_types::AccountStatus;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::OperationArgs;

/// bankguard - attribute-based access control for core banking.
#[derive(Parser)]
#[command(name = "bankguard")]
#[command(author, version, long_about = None)]
#[command(about = "Attribute-based access control for core banking")]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding bankguard.toml (default: current directory).
    #[arg(long, global = true, value_name = "DIR")]
    config: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Evaluate one action. Exits with status 2 on DENY.
    Check {
        /// Principal ID (e.g. USR001).
        principal: String,

        /// Account ID (e.g. ACC001).
        resource: String,

        /// Action name (e.g. read_basic_info).
        action: String,

        #[command(flatten)]
        operation: OperationArgs,

        /// Print the decision as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the derived roles a principal holds on an account.
    Roles {
        /// Principal ID.
        principal: String,

        /// Account ID.
        resource: String,

        #[command(flatten)]
        operation: OperationArgs,
    },

    /// List the accounts a principal may act on.
    List {
        /// Principal ID.
        principal: String,

        /// Action to check against each account.
        #[arg(short, long, default_value = "read_basic_info")]
        action: String,

        /// Only accounts at this branch.
        #[arg(short, long)]
        branch: Option<String>,

        /// Only accounts with this status (active, frozen, closed).
        #[arg(short, long)]
        status: Option<AccountStatus>,

        /// Only accounts owned by this principal.
        #[arg(short, long)]
        owner: Option<String>,
    },

    /// Show the policy table.
    Actions,

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show {
        /// Output format (text, json, toml).
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Validate configuration files.
    Validate,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    style::set_no_color(cli.no_color);

    match cli.command {
        Commands::Version => {
            commands::version::run();
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Config(ConfigCommands::Validate) => {
            return commands::config::validate(loader(cli.config.as_ref()));
        }
        _ => {}
    }

    let config = loader(cli.config.as_ref()).load()?;
    init_logging(&config);

    match cli.command {
        Commands::Check {
            principal,
            resource,
            action,
            operation,
            json,
        } => {
            let session = session::Session::open(&config)?;
            commands::check::run(&session, &principal, &resource, &action, &operation, json)
        }
        Commands::Roles {
            principal,
            resource,
            operation,
        } => {
            let session = session::Session::open(&config)?;
            commands::roles::run(&session, &principal, &resource, &operation)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::List {
            principal,
            action,
            branch,
            status,
            owner,
        } => {
            let session = session::Session::open(&config)?;
            let filter = commands::list::AccountFilter {
                branch,
                status,
                owner,
            };
            commands::list::run(&session, &principal, &action, &filter)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Actions => {
            let session = session::Session::open(&config)?;
            commands::actions::run(&session);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config(ConfigCommands::Show { format }) => {
            commands::config::show(&config, &format)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Version | Commands::Config(ConfigCommands::Validate) => Ok(ExitCode::SUCCESS),
    }
}

fn loader(dir: Option<&PathBuf>) -> ConfigLoader {
    match dir {
        Some(dir) => ConfigLoader::new().with_project_dir(dir),
        None => ConfigLoader::new(),
    }
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` overrides
/// the configured level.
fn init_logging(config: &BankguardConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
