use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::PathBuf;
use textbook_rag_core::{
    Answer, CharacterNgramEmbedder, DiskStore, Embedder, IndexStore, OllamaClient,
    OllamaEmbedder, QdrantStore, RagOptions, RagSession, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_OLLAMA_URL, NO_INDEX_MESSAGE,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod menu;

/// Embedding model name that selects the built-in offline trigram embedder.
const NGRAM_EMBED_MODEL: &str = "ngram";

#[derive(Parser)]
#[command(name = "textbook-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory holding the persisted vector index
    #[arg(long, env = "RAG_DB_PATH", default_value = "vector_db")]
    db_path: PathBuf,

    /// Vector store backend
    #[arg(long, env = "RAG_BACKEND", value_enum, default_value_t = Backend::Disk)]
    backend: Backend,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Embedding model, or "ngram" for the offline trigram embedder
    #[arg(long, env = "RAG_EMBED_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embed_model: String,

    /// Chat model used to answer questions
    #[arg(long, env = "RAG_CHAT_MODEL", default_value = "llama3")]
    chat_model: String,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "textbook_chunks")]
    qdrant_collection: String,

    /// Maximum chunk length in characters
    #[arg(long, env = "RAG_CHUNK_SIZE", default_value = "500")]
    chunk_size: usize,

    /// Target overlap between consecutive chunks in characters
    #[arg(long, env = "RAG_CHUNK_OVERLAP", default_value = "100")]
    chunk_overlap: usize,

    /// Number of chunks retrieved per question
    #[arg(long, env = "RAG_TOP_K", default_value = "5")]
    top_k: usize,
}

impl Cli {
    fn rag_options(&self) -> RagOptions {
        RagOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k: self.top_k,
            chat_model: self.chat_model.clone(),
            ..RagOptions::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Flat index persisted under --db-path
    Disk,
    /// Qdrant collection over HTTP
    Qdrant,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive menu (default).
    Menu,
    /// Ingest a PDF, replacing the current index.
    Ingest {
        /// Path to the PDF document.
        #[arg(long)]
        pdf: PathBuf,
    },
    /// Answer a question from the indexed document.
    Ask {
        /// Question text.
        #[arg(long)]
        question: String,
    },
    /// Send a prompt straight to the chat model, without retrieval.
    Prompt {
        /// Prompt text.
        #[arg(long)]
        text: String,
    },
}

fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        backend = ?cli.backend,
        "textbook-rag boot"
    );

    match cli.backend {
        Backend::Disk => run(&cli, DiskStore::new(&cli.db_path)),
        Backend::Qdrant => run(
            &cli,
            QdrantStore::new(&cli.qdrant_url, cli.qdrant_collection.as_str())?,
        ),
    }
}

fn run<S: IndexStore>(cli: &Cli, store: S) -> anyhow::Result<()> {
    let client = OllamaClient::new(&cli.ollama_url)?;
    let embedder: Box<dyn Embedder> = if cli.embed_model == NGRAM_EMBED_MODEL {
        Box::new(CharacterNgramEmbedder::default())
    } else {
        Box::new(OllamaEmbedder::new(client.clone(), cli.embed_model.as_str()))
    };

    let mut session = RagSession::new(cli.rag_options(), embedder, store, client)?;
    if let Err(error) = session.load() {
        warn!(%error, "could not load the persisted index");
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        None | Some(Command::Menu) => {
            let stdin = io::stdin();
            menu::run_menu(&mut session, stdin.lock(), &mut out)?;
        }
        Some(Command::Ingest { pdf }) => {
            let report = session
                .ingest_pdf(pdf)
                .with_context(|| format!("failed to ingest {}", pdf.display()))?;
            writeln!(
                out,
                "{} processed: {} pages, {} sections, {} chunks stored",
                pdf.display(),
                report.pages,
                report.sections,
                report.chunks
            )?;
        }
        Some(Command::Ask { question }) => match session.ask(question)? {
            Answer::NoIndex => anyhow::bail!(NO_INDEX_MESSAGE),
            answer => writeln!(out, "{}", answer.text())?,
        },
        Some(Command::Prompt { text }) => {
            let response = session.direct_query(text)?;
            writeln!(out, "{response}")?;
        }
    }

    Ok(())
}
