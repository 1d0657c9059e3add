use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "rmount")]
#[command(about = "Configure and supervise rclone FUSE mounts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (defaults to <config dir>/rmount/config.json)
    #[arg(long, global = true, env = "RMOUNT_CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured mounts
    List {
        /// Also show connection details and whether each is mounted
        #[arg(short, long)]
        detailed: bool,
    },

    /// List remotes known to rclone
    Remotes,

    /// Configure a new mount
    Add {
        /// rclone remote name (without the trailing colon)
        connection: String,

        /// Empty directory to mount on
        mountpoint: PathBuf,

        /// Display name (defaults to the connection name)
        #[arg(short, long)]
        label: Option<String>,

        /// Path inside the remote to mount
        #[arg(short, long)]
        remote_path: Option<String>,
    },

    /// Remove a configured mount
    Remove {
        mountpoint: PathBuf,
    },

    /// Change or clear the display name of a mount
    Label {
        mountpoint: PathBuf,

        /// New label; omit to fall back to the connection name
        label: Option<String>,
    },

    /// Mount and supervise until interrupted, then unmount
    Mount {
        /// Configured mountpoints to mount
        #[arg(required_unless_present = "all")]
        mountpoints: Vec<PathBuf>,

        /// Mount everything configured
        #[arg(short, long, conflicts_with = "mountpoints")]
        all: bool,
    },

    /// Unmount a mountpoint, whoever mounted it
    Release {
        mountpoint: PathBuf,
    },

    /// Show which configured mounts are live
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    debug!("Starting rmount v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.config;
    match cli.command {
        Commands::List { detailed } => commands::list::execute(config, detailed).await,
        Commands::Remotes => commands::remotes::execute(config).await,
        Commands::Add {
            connection,
            mountpoint,
            label,
            remote_path,
        } => commands::add::execute(config, connection, mountpoint, label, remote_path).await,
        Commands::Remove { mountpoint } => commands::remove::execute(config, mountpoint).await,
        Commands::Label { mountpoint, label } => {
            commands::label::execute(config, mountpoint, label).await
        }
        Commands::Mount { mountpoints, all } => {
            commands::mount::execute(config, mountpoints, all).await
        }
        Commands::Release { mountpoint } => commands::release::execute(config, mountpoint).await,
        Commands::Status { json } => commands::status::execute(config, json).await,
    }
}
