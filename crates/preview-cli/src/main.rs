use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "preview",
    about = "Preview hosting — per-branch deployments behind one distribution",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Mode {
    Incremental,
    Always,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter preview.toml
    Init {
        /// Directory to write into
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
        /// Stack name
        #[arg(long, default_value = "preview")]
        name: String,
        /// Bucket holding every deployment
        #[arg(long)]
        bucket: String,
        /// Overwrite an existing preview.toml
        #[arg(long)]
        force: bool,
    },
    /// Upload a build tree under a deployment prefix.
    ///
    /// Files whose stored fingerprint already matches are skipped unless
    /// --mode always is given. Exits non-zero if any file failed.
    Sync {
        /// Local build output directory
        #[arg(long)]
        root: PathBuf,
        /// Deployment prefix (usually the branch or commit)
        #[arg(long)]
        prefix: String,
        /// Directory backing the object store
        #[arg(long)]
        store_dir: PathBuf,
        /// Config file; [sync] defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override [sync].mode
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// Report what would be uploaded without writing
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },
    /// Synthesize the resource graph and print its apply waves
    Synth {
        #[arg(short, long, default_value = "preview.toml")]
        config: PathBuf,
        /// JSON report from `preview sync`, one per deployment
        #[arg(long = "report")]
        reports: Vec<PathBuf>,
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },
    /// Diff the resource graph against recorded state
    Plan {
        #[arg(short, long, default_value = "preview.toml")]
        config: PathBuf,
        /// Recorded state (JSON); a missing file means nothing is applied yet
        #[arg(short, long, default_value = "preview.state.json")]
        state: PathBuf,
        /// JSON report from `preview sync`, one per deployment
        #[arg(long = "report")]
        reports: Vec<PathBuf>,
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },
    /// Apply the resource graph and write the resulting state.
    ///
    /// Runs against the in-memory control plane; the state file it writes is
    /// what `preview plan` diffs against.
    Apply {
        #[arg(short, long, default_value = "preview.toml")]
        config: PathBuf,
        #[arg(short, long, default_value = "preview.state.json")]
        state: PathBuf,
        /// JSON report from `preview sync`, one per deployment
        #[arg(long = "report")]
        reports: Vec<PathBuf>,
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },
    /// Show how the edge router rewrites a request for a host
    Route {
        #[arg(long)]
        host: String,
        #[arg(long, default_value = "/")]
        uri: String,
        /// Config file supplying the origin domain and aliases
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Origin domain when no config is given
        #[arg(long, default_value = "origin.example.com")]
        origin_domain: String,
    },
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("preview=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json)?;

    match cli.command {
        Commands::Init {
            path,
            name,
            bucket,
            force,
        } => commands::init::init(&path, &name, &bucket, force),
        Commands::Sync {
            root,
            prefix,
            store_dir,
            config,
            mode,
            dry_run,
            format,
        } => {
            let args = commands::sync::SyncArgs {
                root,
                prefix,
                store_dir,
                config,
                mode,
                dry_run,
                format,
            };
            commands::sync::sync(args).await
        }
        Commands::Synth {
            config,
            reports,
            format,
        } => commands::synth::synth(&config, &reports, format),
        Commands::Plan {
            config,
            state,
            reports,
            format,
        } => commands::plan::plan(&config, &state, &reports, format),
        Commands::Apply {
            config,
            state,
            reports,
            format,
        } => commands::apply::apply(&config, &state, &reports, format).await,
        Commands::Route {
            host,
            uri,
            config,
            origin_domain,
        } => commands::route::route(&host, &uri, config.as_deref(), &origin_domain),
    }
}
