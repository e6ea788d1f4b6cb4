//! # ragbot CLI
//!
//! ## Usage
//!
//! ```bash
//! ragbot --config ./config/ragbot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragbot init` | Create the SQLite database and run schema migrations |
//! | `ragbot index [paths…]` | Extract and index files (defaults to `[ingest].files`) |
//! | `ragbot files` | List queryable scopes |
//! | `ragbot query "<text>"` | Answer one query |
//! | `ragbot demo` | Run the scripted demo queries |
//! | `ragbot serve` | Start the HTTP API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ragbot::app::App;
use ragbot::config;
use ragbot::error::QueryError;
use ragbot::uploads::list_scopes;
use ragbot::{db, logging, migrate, server};
use ragbot_core::models::{SourceFilter, SourceKind, ALL_FILES};

/// Retrieval-augmented chatbot over PDF, DOCX, CSV, image, and video files.
#[derive(Parser)]
#[command(name = "ragbot", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragbot.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Extract and index files.
    ///
    /// With no paths, indexes the corpus listed in `[ingest].files`.
    /// Files that fail to extract are reported and skipped.
    Index {
        paths: Vec<PathBuf>,
    },

    /// List queryable scopes: `all_files`, corpus files, and uploads.
    Files,

    /// Answer a query.
    Query {
        /// The question to answer.
        text: String,

        /// Scope: `all_files`, a kind (`pdf`, `docx`, `csv`, `image`,
        /// `video`), or a file name.
        #[arg(long, default_value = ALL_FILES)]
        file: String,

        /// Merge web search results into the context.
        #[arg(long)]
        web: bool,

        /// Cache partition.
        #[arg(long, default_value = "default")]
        user: String,
    },

    /// Run the scripted demo queries against the indexed corpus.
    Demo,

    /// Start the HTTP API.
    Serve {
        /// Index the configured corpus before listening.
        #[arg(long)]
        reindex: bool,
    },
}

/// `(query, scope, web)` triples exercised by `ragbot demo`.
const DEMO_QUERIES: &[(&str, Option<SourceKind>, bool)] = &[
    ("What’s in the files?", None, false),
    ("Tell me about my resume", Some(SourceKind::Docx), false),
    ("What are the student grades?", Some(SourceKind::Csv), false),
    ("What’s the humanitarian data about?", Some(SourceKind::Pdf), false),
    ("What’s the humanitarian data about?", Some(SourceKind::Pdf), true),
    ("What’s in the image?", Some(SourceKind::Image), false),
    ("What’s in the video?", Some(SourceKind::Video), false),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index { paths } => {
            let app = App::from_config(&cfg).await?;
            let report = app.index_corpus(&paths).await?;
            println!("indexed {} file(s)", report.indexed);
            for (path, reason) in &report.failed {
                println!("  skipped {}: {}", path.display(), reason);
            }
        }
        Commands::Files => {
            let app = App::from_config(&cfg).await?;
            let uploaded = app.uploads.registry().list().await?;
            for scope in list_scopes(cfg.ingest.file_names(), uploaded) {
                println!("{}", scope);
            }
        }
        Commands::Query {
            text,
            file,
            web,
            user,
        } => {
            let app = App::from_config(&cfg).await?;
            let filter = SourceFilter::parse(&file);
            match app.chatbot.answer(&text, &filter, web, &user).await {
                Ok(response) => println!("{}", response),
                Err(QueryError::NotFound(scope)) => {
                    println!("No relevant data found for {}.", scope)
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Demo => {
            let app = App::from_config(&cfg).await?;
            for (query, kind, web) in DEMO_QUERIES {
                let filter = kind.map_or(SourceFilter::All, SourceFilter::Kind);
                let response = match app.chatbot.answer(query, &filter, *web, "demo").await {
                    Ok(response) => response,
                    Err(e) => e.to_string(),
                };
                println!("\n\nQuery: {} (Web: {})\nResponse: {}", query, web, response);
            }
        }
        Commands::Serve { reindex } => {
            let app = App::from_config(&cfg).await?;
            if reindex {
                let report = app.index_corpus(&[]).await?;
                tracing::info!(
                    indexed = report.indexed,
                    failed = report.failed.len(),
                    "corpus reindexed"
                );
            }
            server::run_server(&cfg, &app).await?;
        }
    }

    Ok(())
}
