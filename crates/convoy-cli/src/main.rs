mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, unit::UnitSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "convoy",
    about = "GitOps delivery loop — admit commits, propagate image tags, converge units",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .convoy/ or .git/)
    #[arg(long, global = true, env = "CONVOY_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize convoy in the current project
    Init,

    /// Manage deployable units
    Unit {
        #[command(subcommand)]
        subcommand: UnitSubcommand,
    },

    /// Evaluate the trigger filter against a commit event
    Trigger {
        /// Branch the commit landed on
        #[arg(long)]
        branch: String,

        /// Commit sha
        #[arg(long)]
        sha: String,

        /// Changed path (repeatable)
        #[arg(long = "path")]
        paths: Vec<String>,

        /// Commit author
        #[arg(long)]
        author: Option<String>,
    },

    /// Run the build executor for a unit
    Build {
        /// Unit to build
        unit: String,

        /// Source revision to build from
        #[arg(long)]
        sha: String,

        /// File whose bytes stand in for the built artifact
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Show reconciliation status for all units
    Status,

    /// Show desired-state revision history for a unit
    History { unit: String },

    /// Run the reconciliation loop against the in-process platform
    Reconcile {
        /// Reconciliation passes over all units (ignored with --watch)
        #[arg(long, default_value = "1")]
        passes: u32,

        /// Keep reconciling until Ctrl-C
        #[arg(long)]
        watch: bool,
    },

    /// Show the ingress routing table
    Ingress,

    /// Inspect and validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Start the HTTP surface (webhook intake + status API)
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "3300")]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Reconcile { watch: true, .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root_path = cli.root.as_deref();
    let root = root::resolve_root(root_path);

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Unit { subcommand } => cmd::unit::run(&root, subcommand, cli.json),
        Commands::Trigger {
            branch,
            sha,
            paths,
            author,
        } => cmd::trigger::run(&root, &branch, &sha, paths, author.as_deref(), cli.json),
        Commands::Build { unit, sha, source } => {
            cmd::build::run(&root, &unit, &sha, source.as_deref(), cli.json)
        }
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::History { unit } => cmd::history::run(&root, &unit, cli.json),
        Commands::Reconcile { passes, watch } => cmd::reconcile::run(&root, passes, watch, cli.json),
        Commands::Ingress => cmd::ingress::run(&root, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Serve { port } => cmd::serve::run(&root, port),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
