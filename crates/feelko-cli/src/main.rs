//! FeelKo CLI
//!
//! Find drama and movie filming locations from the command line.
//!
//! ## Features
//!
//! - `embeddings` - Enable local multilingual embedding models via fastembed (ONNX Runtime)
//!
//! ## Usage
//!
//! ```bash
//! # Build the collection from the location dataset
//! feelko index --csv data/locations.csv
//!
//! # Ask for the filming locations of a drama
//! GOOGLE_API_KEY=... feelko ask "슬기로운 의사생활"
//!
//! # Interactive session
//! GOOGLE_API_KEY=... feelko chat
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use feelko::{
    chunk::{chunk_records, RecursiveChunker},
    config::{AppConfig, EmbeddingProvider},
    format::format_answer,
    index::VectorStore,
    ingest::{CsvLoader, SourceKind, WebLoader},
    pipeline::{assemble_context, format_instructions, PromptTemplate, RetrievalChainBuilder},
    retrieve::{DenseRetriever, RetrievalResult},
    session::{ChatSession, INPUT_PLACEHOLDER},
    Embedder, HashingEmbedder, HostedEmbedder, HostedGenerator, SourceRecord,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(feature = "embeddings")]
use feelko::{EmbeddingModelType, FastEmbedder};

/// Embedder selection
#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmbedderArg {
    /// Hosted embeddings API (needs the API key)
    Hosted,
    /// Offline feature hashing (no network)
    Hashing,
    /// Local model via fastembed (requires `embeddings` feature)
    Local,
}

impl From<EmbedderArg> for EmbeddingProvider {
    fn from(arg: EmbedderArg) -> Self {
        match arg {
            EmbedderArg::Hosted => Self::Hosted,
            EmbedderArg::Hashing => Self::Hashing,
            EmbedderArg::Local => Self::Local,
        }
    }
}

#[derive(Parser)]
#[command(name = "feelko")]
#[command(version)]
#[command(about = "Find drama and movie filming locations", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "FEELKO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that touch the collection
#[derive(clap::Args, Debug, Default)]
struct StoreArgs {
    /// Directory holding vector collections
    #[arg(long)]
    store: Option<PathBuf>,

    /// Collection name
    #[arg(long)]
    collection: Option<String>,

    /// Embedder (must match the one the collection was built with)
    #[arg(short, long, value_enum)]
    embedder: Option<EmbedderArg>,

    /// Embedding dimension
    #[arg(long)]
    dimension: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a CSV file or web pages into the collection
    Index {
        /// Location CSV file
        #[arg(long, conflicts_with = "url", required_unless_present = "url")]
        csv: Option<PathBuf>,

        /// Web page URL (repeatable)
        #[arg(long, num_args = 1..)]
        url: Vec<String>,

        /// Chunk size in characters
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Chunk overlap in characters
        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// Add to an existing collection instead of replacing it
        #[arg(long)]
        append: bool,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Ask for the filming locations of one title
    Ask {
        /// Drama or movie title
        title: String,

        /// Number of chunks retrieved
        #[arg(short, long)]
        top_k: Option<usize>,

        /// Print the retrieved context and the prompt without calling the model
        #[arg(long)]
        dry_run: bool,

        /// Print the model output verbatim
        #[arg(long)]
        raw: bool,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Interactive session
    Chat {
        /// Number of chunks retrieved
        #[arg(short, long)]
        top_k: Option<usize>,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Show version and configured components
    Info,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())
        .with_context(|| match &cli.config {
            Some(path) => format!("Failed to load config: {}", path.display()),
            None => "Invalid default configuration".to_string(),
        })?;

    match cli.command {
        Commands::Index {
            csv,
            url,
            chunk_size,
            chunk_overlap,
            append,
            store,
        } => {
            apply_store_args(&mut config, &store);
            run_index(&config, csv.as_deref(), &url, chunk_size, chunk_overlap, append)?;
        }
        Commands::Ask {
            title,
            top_k,
            dry_run,
            raw,
            store,
        } => {
            apply_store_args(&mut config, &store);
            if let Some(k) = top_k {
                config.retrieval.top_k = k;
            }
            run_ask(&config, &title, dry_run, raw)?;
        }
        Commands::Chat { top_k, store } => {
            apply_store_args(&mut config, &store);
            if let Some(k) = top_k {
                config.retrieval.top_k = k;
            }
            run_chat(&config)?;
        }
        Commands::Info => run_info(&config),
    }

    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn apply_store_args(config: &mut AppConfig, args: &StoreArgs) {
    if let Some(path) = &args.store {
        config.store.path.clone_from(path);
    }
    if let Some(collection) = &args.collection {
        config.store.collection.clone_from(collection);
    }
    if let Some(embedder) = args.embedder {
        config.embedding.provider = embedder.into();
    }
    if let Some(dimension) = args.dimension {
        config.embedding.dimension = dimension;
    }
}

fn build_embedder(config: &AppConfig) -> Result<Box<dyn Embedder>> {
    let embedding = &config.embedding;
    match embedding.provider {
        EmbeddingProvider::Hashing => Ok(Box::new(HashingEmbedder::new(embedding.dimension))),
        EmbeddingProvider::Hosted => {
            let key = config.api_key()?;
            let embedder = HostedEmbedder::new(
                &key,
                &embedding.base_url,
                embedding.model.clone(),
                embedding.dimension,
                embedding.timeout(),
            )?
            .with_batch_size(embedding.batch_size);
            Ok(Box::new(embedder))
        }
        EmbeddingProvider::Local => {
            #[cfg(feature = "embeddings")]
            {
                let model_type = EmbeddingModelType::require(&embedding.model)
                    .context("Set [embedding] model to a local model name")?;
                tracing::info!(
                    model = model_type.model_name(),
                    dimension = model_type.dimension(),
                    "loading local embedding model"
                );
                let embedder = FastEmbedder::new(model_type)
                    .context("Failed to initialize local embedder")?;
                Ok(Box::new(embedder))
            }
            #[cfg(not(feature = "embeddings"))]
            {
                anyhow::bail!(
                    "Local embeddings require the 'embeddings' feature.\n\
                     Build with: cargo build --features embeddings"
                );
            }
        }
    }
}

fn load_store(config: &AppConfig, embedder: &dyn Embedder) -> Result<VectorStore> {
    let store = VectorStore::load(
        &config.store.path,
        &config.store.collection,
        embedder.dimension(),
        embedder.model_id(),
    )
    .with_context(|| {
        format!(
            "Failed to open collection '{}' in {} (run `feelko index` first)",
            config.store.collection,
            config.store.path.display()
        )
    })?;
    Ok(store)
}

fn run_index(
    config: &AppConfig,
    csv: Option<&Path>,
    urls: &[String],
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    append: bool,
) -> Result<()> {
    let (kind, records): (SourceKind, Vec<SourceRecord>) = match csv {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Path not found: {}", path.display());
            }
            let loader = CsvLoader::new().with_title_column(config.chunking.title_column.clone());
            let records = loader
                .load(path)
                .with_context(|| format!("Failed to read CSV: {}", path.display()))?;
            (SourceKind::Csv, records)
        }
        None => {
            let loader = WebLoader::new(Duration::from_secs(30))?;
            (SourceKind::Web, loader.load(urls)?)
        }
    };

    if records.is_empty() {
        anyhow::bail!("No records found");
    }
    println!("Loaded {} records", records.len());

    let (default_size, default_overlap) = config.chunking.for_kind(kind);
    let chunker = RecursiveChunker::new(
        chunk_size.unwrap_or(default_size),
        chunk_overlap.unwrap_or(default_overlap),
    )?;

    let chunks = chunk_records(&chunker, records).collect::<feelko::Result<Vec<_>>>()?;
    println!("Split into {} chunks", chunks.len());

    let embedder = build_embedder(config)?;
    let existing = VectorStore::collection_path(&config.store.path, &config.store.collection);
    let mut store = if append && existing.exists() {
        load_store(config, embedder.as_ref())?
    } else {
        VectorStore::for_model(embedder.dimension(), embedder.model_id())
    };

    let embedded = embedder
        .embed_chunks(chunks)
        .context("Failed to embed chunks")?;
    store.insert_batch(embedded)?;

    let path = store.persist(&config.store.path, &config.store.collection)?;
    println!(
        "Indexed {} chunks with {} (dimension: {})",
        store.len(),
        embedder.model_id(),
        embedder.dimension()
    );
    println!("Collection saved to: {}", path.display());

    Ok(())
}

fn print_context(results: &[RetrievalResult]) {
    println!("--- Retrieved Context (Top {}) ---", results.len());
    for result in results {
        let source = result.chunk.metadata.source.as_deref().unwrap_or("-");
        println!("Source: {source} [Score: {:.3}]", result.score);
        println!("Content: {}\n", result.chunk.content);
    }
}

fn run_ask(config: &AppConfig, title: &str, dry_run: bool, raw: bool) -> Result<()> {
    if dry_run {
        let embedder = build_embedder(config)?;
        let store = load_store(config, embedder.as_ref())?;
        let retriever = DenseRetriever::new(store, embedder).with_top_k(config.retrieval.top_k);

        let context = retriever.retrieve(title)?;
        print_context(&context);

        let prompt = PromptTemplate::default().render(
            &format_instructions(),
            &assemble_context(&context),
            title,
        );
        println!("--- Prompt ---");
        println!("{prompt}");
        return Ok(());
    }

    let chain = build_chain(config)?;
    let response = chain.answer_with_context(title)?;
    tracing::info!(chunks = response.context.len(), "answer received");

    if raw {
        println!("{}", response.answer);
    } else {
        println!("{}", format_answer(&response.answer));
    }
    Ok(())
}

fn build_chain(
    config: &AppConfig,
) -> Result<feelko::RetrievalChain<Box<dyn Embedder>, HostedGenerator>> {
    // Missing credential is fatal before anything else happens
    let key = config.api_key()?;

    let embedder = build_embedder(config)?;
    let store = load_store(config, embedder.as_ref())?;
    let generator = HostedGenerator::new(
        &key,
        &config.llm.base_url,
        config.llm.model.clone(),
        config.llm.timeout(),
    )?;

    let chain = RetrievalChainBuilder::new()
        .embedder(embedder)
        .generator(generator)
        .vector_store(store)
        .top_k(config.retrieval.top_k)
        .empty_context_policy(config.retrieval.empty_context)
        .temperature(config.llm.temperature)
        .max_tokens(config.llm.max_tokens)
        .build()?;
    Ok(chain)
}

fn run_chat(config: &AppConfig) -> Result<()> {
    let chain = build_chain(config)?;
    let mut session = ChatSession::new();
    tracing::info!(session = %session.id(), "chat session started");

    println!("여행하고 싶은 드라마 명장면 장소를 찾아줍니다.! (/quit 으로 종료)");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        for example in session.example_prompts() {
            println!("  - {example}");
        }
        print!("{INPUT_PLACEHOLDER} > ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        if line.trim() == "/quit" {
            break;
        }

        let outcome = session
            .submit(&line, |query| {
                chain.answer(query).map(|raw| format_answer(&raw))
            })
            .map(|turn| turn.is_some());

        match outcome {
            Ok(true) => println!("\n{}\n", session.render()),
            Ok(false) => {}
            // Generation failures keep the session alive
            Err(e) => eprintln!("오류: {e}"),
        }
    }

    println!();
    Ok(())
}

fn run_info(config: &AppConfig) {
    println!("FeelKo");
    println!("======");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Components:");
    println!("  - Loaders: CSV (title column: {}), Web", config.chunking.title_column);
    println!(
        "  - Chunker: Recursive (csv {}/{}, web {}/{})",
        config.chunking.csv_chunk_size,
        config.chunking.csv_overlap,
        config.chunking.web_chunk_size,
        config.chunking.web_overlap
    );
    #[cfg(feature = "embeddings")]
    println!("  - Embedders: Hosted, Hashing, Local (fastembed) ✓");
    #[cfg(not(feature = "embeddings"))]
    println!("  - Embedders: Hosted, Hashing");
    println!();
    println!("Configuration:");
    println!(
        "  - Embedding: {} ({}, dimension {})",
        config.embedding.provider, config.embedding.model, config.embedding.dimension
    );
    println!("  - Model: {} at {}", config.llm.model, config.llm.base_url);
    println!(
        "  - Store: {} (collection: {})",
        config.store.path.display(),
        config.store.collection
    );
    println!(
        "  - Retrieval: top_k {}, empty context {:?}",
        config.retrieval.top_k, config.retrieval.empty_context
    );
    let key_state = if config.api_key().is_ok() { "set" } else { "not set" };
    println!("  - Credential: {} ({key_state})", config.api_key_env);
}
