//! PortHalt CLI - Find and safely stop processes on network ports
//!
//! A command-line tool for scanning ports, inspecting their owners,
//! and terminating them behind protection checks.

mod commands;
mod prompt;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "porthalt")]
#[command(author, version, about = "Find and safely stop processes on network ports")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List all listening ports
    #[command(alias = "ls")]
    List {
        /// Filter by port number
        #[arg(short, long)]
        port: Option<u16>,

        /// Filter by process name
        #[arg(short = 'n', long)]
        name: Option<String>,
    },

    /// Show the process listening on a port
    Info {
        /// Port number to look up
        port: u16,
    },

    /// Kill the process on a port
    Kill {
        /// Port number whose process to kill
        port: u16,

        /// PID to kill instead of the port's first listener
        #[arg(long)]
        pid: Option<String>,

        /// Override protection for protected processes
        #[arg(short, long)]
        force: bool,

        /// Acknowledge the risk of overriding protection
        #[arg(long)]
        acknowledge_risk: bool,

        /// Answer the confirmation prompts without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Show CPU and memory usage of a process
    Stats {
        /// Process ID
        pid: u32,
    },

    /// Watch ports and report changes
    Watch {
        /// Seconds between scans (defaults to the configured interval)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many scans
        #[arg(short, long)]
        count: Option<u64>,
    },

    /// Manage protected processes
    Protected {
        #[command(subcommand)]
        action: ProtectedAction,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum ProtectedAction {
    /// List protected processes
    #[command(alias = "ls")]
    List,
    /// Protect a process name
    Add {
        name: String,
        /// database, infrastructure, web-server or remote-access
        #[arg(short, long, default_value = "infrastructure")]
        category: String,
    },
    /// Stop protecting a process name
    #[command(alias = "rm")]
    Remove { name: String },
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("PORTHALT_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::List { port, name }) => {
            commands::list::run(port, name, cli.json).await?;
        }
        Some(Commands::Info { port }) => {
            commands::info::run(port, cli.json).await?;
        }
        Some(Commands::Kill {
            port,
            pid,
            force,
            acknowledge_risk,
            yes,
        }) => {
            let options = commands::kill::KillOptions {
                pid,
                force,
                acknowledge_risk,
                yes,
            };
            commands::kill::run(port, options, cli.json).await?;
        }
        Some(Commands::Stats { pid }) => {
            commands::stats::run(pid, cli.json).await?;
        }
        Some(Commands::Watch { interval, count }) => {
            commands::watch::run(interval, count, cli.json).await?;
        }
        Some(Commands::Protected { action }) => match action {
            ProtectedAction::List => commands::protected::list(cli.json).await?,
            ProtectedAction::Add { name, category } => {
                commands::protected::add(&name, &category).await?
            }
            ProtectedAction::Remove { name } => commands::protected::remove(&name).await?,
        },
        Some(Commands::Config) => {
            commands::config::show(cli.json).await?;
        }
        None => {
            commands::list::run(None, None, cli.json).await?;
        }
    }

    Ok(())
}
