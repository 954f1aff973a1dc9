//! snaptx CLI
//!
//! Command-line tools over a snapshot-fenced file tree.
//!
//! # Commands
//!
//! - `idea` - Add, read, comment on and list idea notes
//! - `stress` - Run concurrent random transactions and report outcomes
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use commands::ManagerOptions;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Transactions over a file tree, fenced by volume snapshots.
#[derive(Parser)]
#[command(name = "snaptx")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root directory of the transactional tree
    #[arg(global = true, short, long)]
    root: Option<PathBuf>,

    /// Snapshot provider backing the tree
    #[arg(global = true, long, value_enum, default_value_t = ProviderKind::Zfs)]
    provider: ProviderKind,

    /// ZFS dataset mounted at the root (zfs provider)
    #[arg(global = true, short, long)]
    dataset: Option<String>,

    /// Run zfs directly instead of through `sudo -n`
    #[arg(global = true, long)]
    no_sudo: bool,

    /// Lock file serializing commit decisions across processes
    #[arg(global = true, long)]
    lock_file: Option<PathBuf>,

    /// Roll back transactions older than this many seconds
    #[arg(global = true, long)]
    timeout_secs: Option<u64>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Snapshot substrate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// ZFS snapshots via the `zfs` command
    Zfs,
    /// In-process tree images (snapshots do not outlive the process)
    Memory,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage idea notes
    Idea {
        #[command(subcommand)]
        action: IdeaAction,
    },

    /// Run concurrent random transactions against the tree
    Stress {
        /// Number of worker threads
        #[arg(short, long, default_value = "10")]
        threads: usize,

        /// Transactions per thread
        #[arg(short = 'n', long, default_value = "50")]
        transactions: usize,

        /// Number of shared files
        #[arg(short, long, default_value = "5")]
        files: usize,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum IdeaAction {
    /// Add a new idea; content is read from stdin until an empty line
    Add {
        /// Idea title
        title: String,
    },
    /// Print an idea
    Read {
        /// Idea title
        title: String,
    },
    /// Append a comment; text is read from stdin until an empty line
    Comment {
        /// Idea title
        title: String,
    },
    /// List all ideas
    List,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let options = ManagerOptions {
        root: cli.root,
        provider: cli.provider,
        dataset: cli.dataset,
        use_sudo: !cli.no_sudo,
        lock_file: cli.lock_file,
        timeout: cli.timeout_secs.map(Duration::from_secs),
    };

    match cli.command {
        Commands::Idea { action } => {
            let tm = commands::open_manager(&options)?;
            match action {
                IdeaAction::Add { title } => commands::ideas::run_add(&tm, &title)?,
                IdeaAction::Read { title } => commands::ideas::run_read(&tm, &title)?,
                IdeaAction::Comment { title } => commands::ideas::run_comment(&tm, &title)?,
                IdeaAction::List => commands::ideas::run_list(&tm)?,
            }
        }
        Commands::Stress {
            threads,
            transactions,
            files,
            format,
        } => {
            let tm = commands::open_manager(&options)?;
            commands::stress::run(&tm, threads, transactions, files, &format)?;
        }
        Commands::Version => {
            println!("snaptx CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("snaptx Core v{}", snaptx_core::VERSION);
        }
    }

    Ok(())
}
