use docqa::cache::MemoryResponseCache;
use docqa::chunker::Chunker;
use docqa::cli::{Cli, Commands, ConfigAction};
use docqa::config::Config;
use docqa::engine::{Answer, QueryEngine};
use docqa::error::{DocqaError, Result};
use docqa::generate::OpenAiChatClient;
use docqa::retrieval::{FastEmbedReranker, RerankModel, TermOverlapModel};
use docqa::store::DocumentStore;
use docqa::vector::{
    EmbeddingProvider, FastEmbedProvider, HashedEmbedder, MemoryVectorStore, VectorStore,
};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Ask {
            question,
            docs,
            json,
        } => {
            cmd_ask(cli.config, &question, &docs, json).await?;
        }
        Commands::Chat { docs } => {
            cmd_chat(cli.config, &docs).await?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = if verbose { "docqa=debug" } else { "docqa=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt().with_env_filter(filter).with_target(false).init();
}

/// Everything a running session needs, wired from one config
struct Pipeline {
    store: Arc<DocumentStore>,
    chunker: Chunker,
    engine: QueryEngine,
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let store = Arc::new(DocumentStore::new());

    let embedder: Arc<dyn EmbeddingProvider> = match config.embedding.backend.as_str() {
        "hashed" => Arc::new(HashedEmbedder::new(config.embedding.dimension)),
        "fastembed" => Arc::new(
            FastEmbedProvider::new(&config.embedding.model)
                .map_err(|e| DocqaError::Config(format!("Embedding backend failed: {}", e)))?,
        ),
        other => {
            return Err(DocqaError::Config(format!(
                "Unknown embedding backend '{}' (expected 'fastembed' or 'hashed')",
                other
            )));
        }
    };

    let vector: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new(embedder));
    let chunker = Chunker::new(store.clone(), vector.clone(), config.chunking.clone());

    let rerank_model: Arc<dyn RerankModel> = if config.llm.enable_reranking {
        Arc::new(
            FastEmbedReranker::new()
                .map_err(|e| DocqaError::Config(format!("Reranker failed to initialize: {}", e)))?,
        )
    } else {
        Arc::new(TermOverlapModel)
    };

    let provider = Arc::new(OpenAiChatClient::new(&config.llm));
    let cache = Arc::new(MemoryResponseCache::new());

    let engine = QueryEngine::new(
        store.clone(),
        vector,
        rerank_model,
        provider,
        cache,
        chunker.searchable_level(),
        config,
    );

    Ok(Pipeline {
        store,
        chunker,
        engine,
    })
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(&path),
        None => {
            let default = Config::default_path()?;
            if default.exists() {
                Config::load(&default)
            } else {
                tracing::debug!("No config file at {:?}, using defaults", default);
                let mut config = Config::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }
}

fn ingest_files(pipeline: &Pipeline, docs: &[PathBuf]) -> Result<()> {
    for path in docs {
        let text = std::fs::read_to_string(path).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to read document {:?}", path),
        })?;
        let doc_id = doc_id_from_path(path);
        pipeline.chunker.ingest(&doc_id, &text)?;
    }
    if !docs.is_empty() {
        println!(
            "✓ Ingested {} document(s), {} chunks indexed",
            pipeline.store.document_count(),
            pipeline.store.chunk_count()
        );
    }
    Ok(())
}

fn doc_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

async fn cmd_ask(
    config_path: Option<PathBuf>,
    question: &str,
    docs: &[PathBuf],
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = build_pipeline(&config)?;
    ingest_files(&pipeline, docs)?;

    let answer = pipeline.engine.ask(question).await;
    print_answer(&answer, json)?;
    Ok(())
}

fn print_answer(answer: &Answer, json: bool) -> Result<()> {
    if json {
        let payload = serde_json::json!({
            "response": answer.text,
            "route": answer.route.as_str(),
            "source": answer.source(),
        });
        let rendered =
            serde_json::to_string_pretty(&payload).map_err(|e| DocqaError::Json {
                source: e,
                context: "Failed to serialize answer".to_string(),
            })?;
        println!("{}", rendered);
    } else {
        println!("{}", answer.text);
        println!("  [route: {} | source: {}]", answer.route.as_str(), answer.source());
    }
    Ok(())
}

async fn cmd_chat(config_path: Option<PathBuf>, docs: &[PathBuf]) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = build_pipeline(&config)?;
    ingest_files(&pipeline, docs)?;

    println!("docqa interactive session. Type a question, or :help for commands.");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut line = String::new();

    loop {
        print!("docqa> ");
        stdout.flush().map_err(|e| DocqaError::Io {
            source: e,
            context: "Failed to flush stdout".to_string(),
        })?;

        line.clear();
        let read = stdin.lock().read_line(&mut line).map_err(|e| DocqaError::Io {
            source: e,
            context: "Failed to read from stdin".to_string(),
        })?;
        if read == 0 {
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix(':') {
            if !handle_session_command(&pipeline, command)? {
                break;
            }
            continue;
        }

        let answer = pipeline.engine.ask(input).await;
        print_answer(&answer, false)?;
    }

    println!("Goodbye.");
    Ok(())
}

/// Returns false when the session should end
fn handle_session_command(pipeline: &Pipeline, command: &str) -> Result<bool> {
    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("quit") | Some("exit") => return Ok(false),
        Some("help") => {
            println!(":load <file>   ingest a document");
            println!(":status        show ingested document and chunk counts");
            println!(":cache clear   drop every cached response");
            println!(":cache purge   evict expired cache entries");
            println!(":quit          end the session");
        }
        Some("load") => match parts.next() {
            Some(path) => {
                ingest_files(pipeline, &[PathBuf::from(path)])?;
            }
            None => println!("Usage: :load <file>"),
        },
        Some("status") => {
            println!(
                "{} document(s), {} chunks indexed",
                pipeline.store.document_count(),
                pipeline.store.chunk_count()
            );
            for info in pipeline.store.document_infos() {
                println!(
                    "  {}  {} chunks  ingested {}",
                    info.doc_id,
                    info.chunk_count,
                    info.ingested_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Some("cache") => match parts.next() {
            Some("clear") => {
                pipeline.engine.clear_cache();
                println!("✓ Cache cleared");
            }
            Some("purge") => {
                let purged = pipeline.engine.purge_cache();
                println!("✓ Purged {} expired entries", purged);
            }
            _ => println!("Usage: :cache <clear|purge>"),
        },
        _ => println!("Unknown command. Type :help for a list."),
    }
    Ok(true)
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let rendered = toml::to_string_pretty(&config)?;
            println!("{}", rendered);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };
            if path.exists() && !force {
                return Err(DocqaError::Config(format!(
                    "Config file already exists at {:?} (use --force to overwrite)",
                    path
                )));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| DocqaError::Io {
                    source: e,
                    context: format!("Failed to create config directory {:?}", parent),
                })?;
            }
            Config::default().save(&path)?;
            println!("✓ Wrote default configuration to {:?}", path);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            Config::load(&path)?;
            println!("✓ Configuration at {:?} is valid", path);
        }
    }
    Ok(())
}
