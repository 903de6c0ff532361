use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use athena_core::{Client, Config};
use athena_index::{IndexBuilder, IndexKey, IndexReport, Indexer};
use athena_llm::LlmProvider;
use athena_memory::VectorIndex;
use clap::{Parser, Subcommand};

const CONFIG_ENV: &str = "ATHENA_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Index source trees and answer prompts over them with retrieved context.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file (defaults to $ATHENA_CONFIG, then config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index a single file
    IndexFile {
        path: PathBuf,
        /// Index name
        #[arg(short, long)]
        name: String,
        /// Storage directory; `dist` is local disk, anything else the cloud bucket
        #[arg(short, long)]
        group: Option<String>,
    },
    /// Index a directory tree
    IndexDir {
        path: PathBuf,
        #[arg(short, long)]
        name: String,
        /// Only build these entries of the copied tree (repeatable)
        #[arg(short, long = "include")]
        include: Vec<String>,
        #[arg(short, long)]
        group: Option<String>,
    },
    /// Answer a question using a persisted index
    Prompt {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        group: Option<String>,
        text: String,
    },
    /// Send a system and/or user message without retrieval
    BasePrompt {
        #[arg(long, default_value = "")]
        system: String,
        #[arg(long, default_value = "")]
        user: String,
    },
    /// Show the size of a persisted index
    Inspect {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        group: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    match cli.command {
        Command::IndexFile { path, name, group } => {
            let group = group.unwrap_or_else(|| config.storage.dir.clone());
            let provider = Arc::new(config.openai_provider()?);
            let report = indexer(&config, provider, &group)?
                .index_file(&path, &name)
                .await
                .with_context(|| format!("failed to index {}", path.display()))?;
            println!("{}", describe_report(&report));
        }
        Command::IndexDir {
            path,
            name,
            include,
            group,
        } => {
            let group = group.unwrap_or_else(|| config.storage.dir.clone());
            let provider = Arc::new(config.openai_provider()?);
            let report = indexer(&config, provider, &group)?
                .index_dir(&path, &include, &name)
                .await
                .with_context(|| format!("failed to index {}", path.display()))?;
            println!("{}", describe_report(&report));
        }
        Command::Prompt { name, group, text } => {
            let group = group.unwrap_or_else(|| config.storage.dir.clone());
            let provider = Arc::new(config.openai_provider()?);
            let client = open_client(&config, provider, &group, &name).await?;
            println!("{}", client.prompt(&text).await?);
        }
        Command::BasePrompt { system, user } => {
            let provider = Arc::new(config.openai_provider()?);
            let client = Client::new(provider, config.client.clone());
            println!("{}", client.base_prompt(&system, &user).await?);
        }
        Command::Inspect { name, group } => {
            let group = group.unwrap_or_else(|| config.storage.dir.clone());
            let key = IndexKey::new(&name, config.storage.version.clone());
            let index = config
                .storage_backend(&group)?
                .load(&key)
                .await
                .with_context(|| format!("failed to load index {key}"))?;
            println!("{}", describe_index(&key, &index));
        }
    }

    Ok(())
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

fn indexer<P: LlmProvider>(
    config: &Config,
    provider: Arc<P>,
    group: &str,
) -> anyhow::Result<Indexer<P>> {
    let storage = config.storage_backend(group)?;
    let builder = IndexBuilder::new(provider, config.builder_config());
    Ok(Indexer::new(storage, builder, config.storage.version.clone()))
}

async fn open_client<P: LlmProvider>(
    config: &Config,
    provider: Arc<P>,
    group: &str,
    name: &str,
) -> anyhow::Result<Client<P>> {
    let storage = config.storage_backend(group)?;
    let client = Client::open(
        provider,
        config.client.clone(),
        &storage,
        group,
        name,
        &config.storage.version,
    )
    .await
    .with_context(|| format!("failed to open index {name} in {group}"))?;
    Ok(client.with_top_k(config.retrieval.top_k))
}

fn describe_report(report: &IndexReport) -> String {
    format!(
        "indexed {}: {} files ({} renamed), {} chunks in {} ms",
        report.key, report.files_loaded, report.files_renamed, report.chunks, report.duration_ms
    )
}

fn describe_index(key: &IndexKey, index: &VectorIndex) -> String {
    format!(
        "{key}: {} chunks, dimension {}",
        index.len(),
        index.dimension()
    )
}
