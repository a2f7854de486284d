//! Fathom entrypoint: HTTP server plus operator commands.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use fathom::cache::{ResultCache, ResultStore};
use fathom::config::Config;
use fathom::constants::INDEX_BATCH_SIZE;
use fathom::document::{ResultSet, normalize_text};
use fathom::embedding::{EncoderConfig, Reranker, RerankerConfig, SentenceEmbedder};
use fathom::gateway::{HandlerState, create_router_with_state};
use fathom::generate::AnswerGenerator;
use fathom::indexer::build_index;
use fathom::pipeline::RetrievalPipeline;
use fathom::vectordb::{IndexWriter, QdrantClient, QdrantIndex};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const SAMPLE_QUERIES: [&str; 3] = [
    "women summer cotton midi dress under 2000 rupees",
    "men running shoes with breathable mesh black color",
    "kids winter hoodie warm fleece for boys",
];

const SNIPPET_CHARS: usize = 300;

type Pipeline = RetrievalPipeline<QdrantIndex, Reranker, ResultCache>;

#[derive(Parser)]
#[command(name = "fathom")]
#[command(version)]
#[command(about = "Product catalogue search: vector recall, cross-encoder re-rank, durable result cache")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API (default)
    Serve,
    /// Build or update the vector index from a JSONL document file
    Index {
        /// Line-delimited `{id, text, meta}` records
        #[arg(long, default_value = "data/processed.jsonl")]
        documents: PathBuf,
        /// Drop the collection and clear the result cache first
        #[arg(long)]
        rebuild: bool,
        #[arg(long, default_value_t = INDEX_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Print ranked hits for one query
    Search {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        top_m: Option<usize>,
    },
    /// Search and answer; runs the sample queries when none is given
    Ask {
        query: Option<String>,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        top_m: Option<usize>,
    },
    /// Remove every cached result
    ClearCache,
    /// Rewrite the cache file keeping only live records
    CompactCache,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config).await,
        Commands::Index {
            documents,
            rebuild,
            batch_size,
        } => index(&config, &documents, rebuild, batch_size).await,
        Commands::Search {
            query,
            top_k,
            top_m,
        } => {
            let pipeline = build_pipeline(&config)?;
            let query = normalize_text(&query);
            let results = run_search(&pipeline, &query, top_k, top_m).await?;
            print_hits(&query, &results);
            Ok(())
        }
        Commands::Ask {
            query,
            top_k,
            top_m,
        } => {
            let pipeline = build_pipeline(&config)?;
            let generator = AnswerGenerator::from_env(&config.generation_model);
            let queries: Vec<String> = match query {
                Some(q) => vec![normalize_text(&q)],
                None => SAMPLE_QUERIES.iter().map(|q| q.to_string()).collect(),
            };

            for (i, query) in queries.iter().enumerate() {
                println!("\n=== Query {}: {} ===", i + 1, query);
                let results = run_search(&pipeline, query, top_k, top_m).await?;
                print_hits(query, &results);

                let answer = generator.generate(query, &results.contexts()).await;
                println!("Query: {query}\n\nFINAL ANSWER\n\n{answer}\n");
            }
            Ok(())
        }
        Commands::ClearCache => {
            let cache = open_cache(&config)?;
            let entries = cache.len();
            cache.clear()?;
            println!("Cleared {entries} cached results from {}", cache.path().display());
            Ok(())
        }
        Commands::CompactCache => {
            let cache = open_cache(&config)?;
            let report = cache.compact()?;
            println!(
                "Compacted {}: {} live records, {} -> {} bytes",
                cache.path().display(),
                report.live_records,
                report.bytes_before,
                report.bytes_after
            );
            Ok(())
        }
    }
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        "Fathom starting"
    );

    let pipeline = build_pipeline(config)?;
    let generator = AnswerGenerator::from_env(&config.generation_model);
    tracing::info!(
        reranker_loaded = pipeline.scorer().is_model_loaded(),
        embedder_stub = pipeline.index().embedder().is_stub(),
        generator = generator.mode(),
        "Components ready"
    );

    let app = create_router_with_state(HandlerState::new(pipeline, generator));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Fathom shutdown complete");
    Ok(())
}

async fn index(
    config: &Config,
    documents: &std::path::Path,
    rebuild: bool,
    batch_size: usize,
) -> anyhow::Result<()> {
    let index = connect_index(config)?;

    if rebuild {
        tracing::info!(collection = index.collection(), "Rebuilding from scratch");
        index.reset().await?;
        open_cache(config)?.clear()?;
    }

    let report = build_index(&index, documents, batch_size).await?;
    println!(
        "Indexed {} documents in {} batches into '{}'",
        report.documents,
        report.batches,
        index.collection()
    );
    Ok(())
}

fn load_embedder(config: &Config) -> anyhow::Result<SentenceEmbedder> {
    if config.embedder_path.is_none() {
        tracing::warn!("No FATHOM_EMBEDDER_PATH configured, running embedder in stub mode");
    }
    SentenceEmbedder::load(EncoderConfig::from_path(config.embedder_path.clone()))
        .context("failed to load sentence embedder")
}

fn connect_index(config: &Config) -> anyhow::Result<QdrantIndex> {
    let embedder = Arc::new(load_embedder(config)?);
    let client = QdrantClient::new(&config.qdrant_url)?;
    Ok(QdrantIndex::new(client, embedder, &config.collection_name))
}

fn open_cache(config: &Config) -> anyhow::Result<ResultCache> {
    let path = config.cache_path();
    ResultCache::open(&path, config.l1_capacity)
        .with_context(|| format!("failed to open result cache at {}", path.display()))
}

fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let index = connect_index(config)?;

    if config.reranker_path.is_none() {
        tracing::warn!("No FATHOM_RERANKER_PATH configured, running reranker in stub mode");
    }
    let reranker = Reranker::load(RerankerConfig::from_path(config.reranker_path.clone()))
        .context("failed to load reranker")?;

    let cache = open_cache(config)?;

    Ok(RetrievalPipeline::new(
        Arc::new(index),
        Arc::new(reranker),
        Arc::new(cache),
        config.search_config(),
    ))
}

async fn run_search(
    pipeline: &Pipeline,
    query: &str,
    top_k: Option<usize>,
    top_m: Option<usize>,
) -> anyhow::Result<ResultSet> {
    let (top_k, top_m) = pipeline.config().resolve(top_k, top_m);
    Ok(pipeline.search(query, top_k, top_m).await?)
}

fn print_hits(query: &str, results: &ResultSet) {
    println!("Query: {query}\n\nTOP-{} SEARCH RESULTS", results.len());
    for (rank, hit) in results.hits().iter().enumerate() {
        println!(
            "\n[{}] score={:.3}\nTitle: {}\nBrand: {}\nSnippet: {}...",
            rank + 1,
            hit.score,
            hit.title(),
            hit.brand(),
            hit.snippet(SNIPPET_CHARS)
        );
    }
    println!();
}

fn run_health_check() -> i32 {
    let port = std::env::var("FATHOM_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/health", port);

    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return 1;
    };

    rt.block_on(async {
        let Ok(client) = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
        else {
            return 1;
        };

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
