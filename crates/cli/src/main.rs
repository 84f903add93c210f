mod commands;
mod config;
mod serve;
mod services;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Income-tax deduction assistant for Indian individual taxpayers.
#[derive(Parser)]
#[command(
    name = "taxwise",
    version,
    about = "Income-tax deduction assistant for Indian individual taxpayers"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a taxwise.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute deductions and tax liability from a facts file (no network)
    Calc {
        /// Path to the user details JSON file
        #[arg(long)]
        facts: PathBuf,
    },

    /// Show the catalog deduction plan and the facts still missing
    Plan {
        /// Path to the user details JSON file
        #[arg(long)]
        facts: PathBuf,
    },

    /// Start a reasoning session from a facts file
    Start {
        /// Path to the user details JSON file
        #[arg(long)]
        facts: PathBuf,
    },

    /// Answer a session's outstanding fact request
    Reply {
        /// Session ID
        session: String,
        /// Request ID being answered
        request: String,
        /// Free-text answer
        message: String,
    },

    /// Show the stored state of a session
    Show {
        /// Session ID
        session: String,
    },

    /// Ask a follow-up question about a finished session
    Chat {
        /// Session ID
        session: String,
        /// Question to ask
        message: String,
    },

    /// Cancel a session that is waiting for input
    Cancel {
        /// Session ID
        session: String,
    },

    /// List stored sessions, most recently updated first
    Sessions {
        /// Maximum number of sessions to list
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Start the HTTP JSON API server
    Serve {
        /// Port to listen on (overrides TAXWISE_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Path to TLS certificate PEM file (requires the tls feature)
        #[arg(long)]
        tls_cert: Option<PathBuf>,
        /// Path to TLS private key PEM file (requires the tls feature)
        #[arg(long)]
        tls_key: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let output = cli.output;
    let quiet = cli.quiet;
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Calc { facts } => commands::calc::cmd_calc(&facts, output, quiet),
        Commands::Plan { facts } => commands::plan::cmd_plan(&facts, output, quiet),
        Commands::Start { facts } => {
            commands::session::cmd_start(config_path, &facts, output, quiet)
        }
        Commands::Reply {
            session,
            request,
            message,
        } => commands::session::cmd_reply(config_path, &session, &request, &message, output, quiet),
        Commands::Show { session } => {
            commands::session::cmd_show(config_path, &session, output, quiet)
        }
        Commands::Chat { session, message } => {
            commands::session::cmd_chat(config_path, &session, &message, output, quiet)
        }
        Commands::Cancel { session } => {
            commands::session::cmd_cancel(config_path, &session, output, quiet)
        }
        Commands::Sessions { limit } => {
            commands::session::cmd_sessions(config_path, limit, output, quiet)
        }
        Commands::Serve {
            port,
            tls_cert,
            tls_key,
        } => {
            // Validate TLS flags: both must be provided or neither
            if tls_cert.is_some() != tls_key.is_some() {
                report_error(
                    "error: --tls-cert and --tls-key must both be provided",
                    output,
                    quiet,
                );
                process::exit(1);
            }
            let config = match config::Config::load(config_path) {
                Ok(c) => c,
                Err(e) => {
                    report_error(&format!("error: {e}"), output, quiet);
                    process::exit(1);
                }
            };
            let rt = commands::runtime(output, quiet);
            if let Err(e) = rt.block_on(serve::start_server(config, port, tls_cert, tls_key)) {
                report_error(&format!("Server error: {e}"), output, quiet);
                process::exit(1);
            }
        }
    }
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the default.
fn init_tracing(quiet: bool) {
    let default = if quiet { "taxwise=error" } else { "taxwise=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
