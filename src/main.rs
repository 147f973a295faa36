use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use ote::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for ote::AppCommand {
    fn from(cmd: Commands) -> ote::AppCommand {
        match cmd {
            Commands::Spot { date, all } => ote::AppCommand::Spot { date, all },
            Commands::Save { date } => ote::AppCommand::Save { date },
            Commands::History { date } => ote::AppCommand::History { date },
            Commands::Dashboard { port } => ote::AppCommand::Dashboard { port },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show spot prices for a day
    Spot {
        /// Delivery day (YYYY-MM-DD), today by default
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Show every interval instead of only the current one
        #[arg(short, long)]
        all: bool,
    },
    /// Fetch spot prices for a day and store them
    Save {
        /// Delivery day (YYYY-MM-DD), today by default
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Show stored prices
    History {
        /// Stored day (YYYY-MM-DD); lists all stored days when omitted
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Start the web dashboard
    Dashboard {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let serving = matches!(cli.command, Some(Commands::Dashboard { .. }));
    init_logging(cli.verbose, serving);

    let result = match cli.command {
        Some(Commands::Setup) => ote::cli::setup::setup(),
        Some(cmd) => ote::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
