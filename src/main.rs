//! # Knowledge-base harness CLI (`kbh`)
//!
//! Runs the dataset HTTP API and offers offline access to the same
//! pipeline: one-shot extraction of a file or URL, and read-only queries
//! over the dataset snapshot.
//!
//! ## Usage
//!
//! ```bash
//! kbh --config ./config/kb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kbh serve` | Start the HTTP API |
//! | `kbh extract <source>` | Extract a local file or http(s) URL |
//! | `kbh datasets` | List datasets in the snapshot |
//! | `kbh retrieve "<question>" --dataset <id>` | Keyword retrieval over the snapshot |
//!
//! A missing config file is not an error; built-in defaults are used.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use kb_harness::classify::classify;
use kb_harness::config::{self, Config};
use kb_harness::fetch::{self, HttpFetcher};
use kb_harness::models::Extracted;
use kb_harness::store::{DatasetFilter, KnowledgeBaseStore};
use kb_harness::{extract, logging, server};

/// Knowledge-base harness: multi-format document extraction, dataset
/// storage, and keyword retrieval.
#[derive(Parser)]
#[command(name = "kbh", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/kb.toml`. Built-in defaults apply when the file
    /// does not exist.
    #[arg(long, global = true, default_value = "./config/kb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dataset HTTP API on `[server].bind`.
    Serve,

    /// Extract the title and text of a local file or an http(s) URL.
    ///
    /// The format is chosen from `--content-type` when given, otherwise from
    /// the file or URL suffix (URLs also use the server's Content-Type).
    Extract {
        /// File path or http(s) URL.
        source: String,

        /// Media type overriding suffix-based detection for local files.
        #[arg(long)]
        content_type: Option<String>,

        /// Print the result as JSON (`{title, markdown}`).
        #[arg(long)]
        json: bool,
    },

    /// List datasets stored in the snapshot.
    Datasets {
        /// Only datasets with exactly this name.
        #[arg(long)]
        name: Option<String>,

        /// Only the dataset with this id.
        #[arg(long)]
        id: Option<String>,
    },

    /// Print chunks of the given datasets containing the question.
    Retrieve {
        question: String,

        /// Dataset id to search; repeat for several.
        #[arg(long = "dataset", required = true)]
        datasets: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => server::run_server(&cfg).await?,
        Commands::Extract {
            source,
            content_type,
            json,
        } => {
            let doc = extract_source(&cfg, &source, content_type.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                println!("# {}\n\n{}", doc.title, doc.text);
            }
        }
        Commands::Datasets { name, id } => {
            let store = KnowledgeBaseStore::open(&cfg.store.path);
            let filter = DatasetFilter { name, id };
            let datasets = store.list_datasets(&filter, usize::MAX);
            if datasets.is_empty() {
                println!("No datasets.");
            }
            for ds in datasets {
                println!("{}  {}  {}  {}", ds.id, ds.name, ds.created_at, ds.description);
            }
        }
        Commands::Retrieve { question, datasets } => {
            let store = KnowledgeBaseStore::open(&cfg.store.path);
            let result = store.retrieve(&datasets, &question);
            if result.total == 0 {
                println!("No results.");
            }
            for chunk in &result.chunks {
                println!("[{} / {}]", chunk.dataset_id, chunk.document_id);
                println!("{}\n", chunk.content);
            }
        }
    }

    Ok(())
}

async fn extract_source(
    cfg: &Config,
    source: &str,
    content_type: Option<&str>,
) -> anyhow::Result<Extracted> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let fetcher = HttpFetcher::from_config(&cfg.fetch)?;
        return Ok(fetch::scrape(&fetcher, source).await);
    }

    let path = Path::new(source);
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let format = classify(content_type, Some(source));
    Ok(extract::extract(format, &bytes))
}
