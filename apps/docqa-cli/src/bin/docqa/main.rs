//! docqa - ask questions about a folder of documents.
//!
//! ```bash
//! docqa chunk ./documents
//! docqa ask ./documents "How long is the warranty?" --top-k 3
//! docqa ask ./documents "deposit" --method vector --json
//! ```
//!
//! Settings come from `config.toml`, `config.<RUST_ENV>.toml` and `APP_*`
//! environment variables; flags override them.

mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use docqa_core::config::{expand_path, AppConfig, Config};
use docqa_core::loader::load_directory;
use docqa_core::traits::Retriever;
use docqa_core::types::SearchMethod;
use docqa_core::Chunker;
use docqa_embed::get_default_embedder;
use docqa_hybrid::{ContextAnswerer, Pipeline, PipelineConfig};
use docqa_text::KeywordIndex;

#[derive(Parser)]
#[command(name = "docqa", version, about = "Question answering over local documents")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and chunk documents, then print the chunks
    Chunk {
        /// Directory of .txt / .md files (default: data.documents_dir)
        dir: Option<PathBuf>,

        /// Output chunks as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ingest a directory and answer one question
    Ask {
        dir: PathBuf,

        question: String,

        /// Number of chunks to retrieve (default: search.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Retrieval method: vector or hybrid (default: search.method)
        #[arg(short, long)]
        method: Option<SearchMethod>,

        /// Output the response as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { EnvFilter::new("info") } else { EnvFilter::new("warn") };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let settings = Config::load()?.settings()?;
    match cli.command {
        Command::Chunk { dir, json } => {
            let dir = dir.unwrap_or_else(|| expand_path(&settings.data.documents_dir));
            run_chunk(&settings, &dir, json)
        }
        Command::Ask { dir, question, top_k, method, json } => {
            let mut settings = settings;
            if let Some(method) = method {
                settings.search.method = method;
            }
            if let Some(top_k) = top_k {
                settings.search.top_k = top_k;
            }
            settings.validate()?;
            run_ask(&settings, &dir, &question, json)
        }
    }
}

fn run_chunk(settings: &AppConfig, dir: &Path, json: bool) -> Result<()> {
    let documents = load_directory(dir)?;
    let chunks = Chunker::new(settings.chunking.clone())?.chunk_documents(&documents)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
    } else {
        println!("{}", output::format_chunks(&chunks));
    }
    Ok(())
}

fn run_ask(settings: &AppConfig, dir: &Path, question: &str, json: bool) -> Result<()> {
    let documents = load_directory(dir)?;
    let vector = vector_retriever(settings)?;
    let keyword: Option<Arc<dyn Retriever>> = match settings.search.method {
        SearchMethod::Vector => None,
        SearchMethod::Hybrid => Some(Arc::new(match &settings.data.text_index_dir {
            Some(d) => KeywordIndex::in_dir(expand_path(d)),
            None => KeywordIndex::in_ram(),
        })),
    };
    let pipeline = Pipeline::new(PipelineConfig::from(settings), vector, keyword, Arc::new(ContextAnswerer))?;
    let report = pipeline.ingest(&documents)?;
    info!("Ingested {} documents ({} chunks)", report.documents, report.chunks);

    let response = pipeline.query(question, settings.search.top_k)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", output::format_response(&response));
    }
    Ok(())
}

#[cfg(not(feature = "lance"))]
fn vector_retriever(settings: &AppConfig) -> Result<Arc<dyn Retriever>> {
    let embedder = get_default_embedder(&settings.embedding)?;
    Ok(Arc::new(docqa_vector::FlatIndex::new(embedder, settings.embedding.batch_size)))
}

#[cfg(feature = "lance")]
fn vector_retriever(settings: &AppConfig) -> Result<Arc<dyn Retriever>> {
    let embedder = get_default_embedder(&settings.embedding)?;
    let uri = expand_path(&settings.data.lance_dir);
    let store = docqa_vector::LanceStore::open(
        &uri.to_string_lossy(),
        docqa_vector::lance::DEFAULT_TABLE,
        embedder,
        settings.embedding.batch_size,
    )?;
    Ok(Arc::new(store))
}
