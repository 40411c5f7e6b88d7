//! # ragbox CLI
//!
//! ## Usage
//!
//! ```bash
//! ragbox --config ./config/ragbox.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragbox init` | Create the index database and the upload directory |
//! | `ragbox ingest <file>...` | Stage files and index their text |
//! | `ragbox query "<text>"` | Similarity search within a collection |
//! | `ragbox recent` | Chunks of the most recently ingested document |
//! | `ragbox uploads [get <saved_as>]` | List staged uploads or fetch one back |
//! | `ragbox diag` | Extraction engines, embedding provider, collections |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `ragbox=info`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ragbox::commands;
use ragbox::config;
use ragbox::context::RagContext;

/// ragbox: ingest documents and retrieve them by similarity.
#[derive(Parser)]
#[command(
    name = "ragbox",
    about = "Local-first document ingestion and similarity retrieval for RAG",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragbox.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index schema and the upload sandbox. Idempotent.
    Init,

    /// Stage files into the upload sandbox and index them.
    Ingest {
        /// Files to ingest.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Target collection (defaults to `retrieval.default_collection`).
        #[arg(long)]
        collection: Option<String>,

        /// Declared file name; picks the format and the `filename` metadata.
        /// Only valid with a single file.
        #[arg(long)]
        name: Option<String>,
    },

    /// Similarity search.
    Query {
        /// Query text.
        text: String,

        #[arg(long)]
        collection: Option<String>,

        /// Number of results (defaults to `retrieval.default_k`).
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Show the chunks of the most recently ingested document.
    Recent {
        #[arg(long)]
        collection: Option<String>,

        #[arg(short, long)]
        k: Option<usize>,
    },

    /// List files in the upload sandbox, or fetch one back.
    Uploads {
        #[command(subcommand)]
        action: Option<UploadsAction>,
    },

    /// Show extraction capabilities, the embedding provider and collections.
    Diag,
}

#[derive(Subcommand)]
enum UploadsAction {
    /// List staged files (the default).
    List,

    /// Write a staged file to stdout or to `--output`.
    Get {
        /// Sandbox file name, as printed by `ingest` (`saved as:`).
        saved_as: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ragbox=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    // Commands that don't need an embedding provider
    match &cli.command {
        Commands::Init => return commands::run_init(&cfg).await,
        Commands::Uploads { action } => {
            return match action {
                None | Some(UploadsAction::List) => commands::run_uploads(&cfg).await,
                Some(UploadsAction::Get { saved_as, output }) => {
                    commands::run_upload_get(&cfg, saved_as, output.as_deref()).await
                }
            }
        }
        _ => {}
    }

    let ctx = RagContext::build(cfg).await?;

    match cli.command {
        Commands::Ingest {
            files,
            collection,
            name,
        } => commands::run_ingest(&ctx, &files, collection, name).await?,
        Commands::Query {
            text,
            collection,
            k,
        } => commands::run_query(&ctx, &text, collection, k).await?,
        Commands::Recent { collection, k } => commands::run_recent(&ctx, collection, k).await?,
        Commands::Diag => commands::run_diag(&ctx).await?,
        Commands::Init | Commands::Uploads { .. } => {}
    }

    Ok(())
}
