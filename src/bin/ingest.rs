//! Offline ingestion: `book-rag-ingest --dir docs --book-id physical-ai`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use book_rag_backend::core::config::{AppPaths, ConfigService};
use book_rag_backend::core::logging::{self, Console};
use book_rag_backend::rag::IngestOptions;
use book_rag_backend::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "book-rag-ingest", about = "Ingest markdown book content into the vector store")]
struct Args {
    /// Directory of .md / .mdx files.
    #[arg(long)]
    dir: PathBuf,

    #[arg(long)]
    book_id: String,

    /// Drop and recreate the collection first.
    #[arg(long)]
    recreate: bool,

    /// Path to config.yml.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths, "ingest.log", Console::Stderr);

    let config = match args.config {
        Some(path) => ConfigService::with_config_path(paths, path),
        None => ConfigService::new(paths),
    };
    let state = AppState::initialize_with(config).await?;
    tracing::info!(
        "Ingesting {} as book {} into collection {}",
        args.dir.display(),
        args.book_id,
        state.pipeline.collection()
    );

    let report = state
        .pipeline
        .ingest_directory(
            &args.dir,
            &args.book_id,
            IngestOptions {
                recreate: args.recreate,
            },
        )
        .await
        .with_context(|| format!("Ingestion of {} failed", args.dir.display()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
