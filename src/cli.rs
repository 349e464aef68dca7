use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CacheStore;
use crate::context::{default_abstract_concurrency, HarvestSettings};
use crate::fetch::FetchPolicy;

#[derive(Parser)]
#[command(name = "citation-abstract-harvester")]
#[command(about = "Collect the citing works of source papers and enrich them with titles and abstracts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch each source paper's citation export and write the citation table
    Citations(CitationsArgs),

    /// Look up title and abstract for every citing identifier (harvests citations first if uncached)
    Abstracts(PipelineArgs),

    /// Run the full pipeline: citations -> abstracts
    Run(PipelineArgs),
}

/// Paths, cache, retry and logging options shared by every subcommand
#[derive(Args, Clone, Debug)]
pub struct CommonArgs {
    /// Input CSV listing the source papers
    #[arg(short, long, default_value = "./input_data/apsr_results.csv")]
    pub input: PathBuf,

    /// Column holding the (unique) paper title
    #[arg(long, default_value = "title")]
    pub title_column: String,

    /// Column holding the citation export URL
    #[arg(long, default_value = "all_citing_papers_link")]
    pub url_column: String,

    /// Output CSV with one column of citing identifiers per source paper
    #[arg(long, default_value = "./output_data/combined_apsr_citations.csv")]
    pub citations_output: PathBuf,

    /// Output CSV with one row per citing identifier
    #[arg(long, default_value = "./output_data/apsr_abstract_map.csv")]
    pub abstracts_output: PathBuf,

    /// Directory holding the resumable cache files
    #[arg(long, default_value = "./cache")]
    pub cache_dir: PathBuf,

    /// Ignore existing cache files (they are still rewritten)
    #[arg(long, default_value = "false")]
    pub no_cache: bool,

    /// Where the structured event log is written at exit (JSON lines)
    #[arg(long, default_value = "./output_data/events.jsonl")]
    pub event_log: PathBuf,

    /// Attempts per request before giving up on it
    #[arg(long, default_value = "3")]
    pub max_attempts: u32,

    /// Timeout of the first attempt, in time-units; doubles on every retry
    #[arg(long, default_value = "15")]
    pub base_timeout: u64,

    /// First wait between attempts, in time-units; doubles on every retry
    #[arg(long, default_value = "2")]
    pub initial_backoff: u64,

    /// Cap for timeouts and waits, including Retry-After, in time-units
    #[arg(long, default_value = "180")]
    pub max_wait: u64,

    /// Length of one time-unit in milliseconds
    #[arg(long, default_value = "1000", hide = true)]
    pub time_unit_ms: u64,

    /// Concurrent citation export requests
    #[arg(long, default_value = "5")]
    pub citation_concurrency: usize,

    /// Logging level (DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, default_value = "INFO")]
    pub log_level: String,
}

impl CommonArgs {
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            max_attempts: self.max_attempts,
            base_timeout: self.base_timeout,
            initial_backoff: self.initial_backoff,
            max_wait: self.max_wait,
            unit: Duration::from_millis(self.time_unit_ms),
        }
    }

    pub fn cache_store(&self) -> CacheStore {
        CacheStore::in_dir(&self.cache_dir)
    }

    pub fn harvest_settings(&self) -> HarvestSettings {
        HarvestSettings {
            concurrency: self.citation_concurrency,
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct CitationsArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Clone, Debug)]
pub struct PipelineArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// `key: value` file; `email` is sent to the metadata API as a contact address
    #[arg(long, default_value = "./credentials.txt")]
    pub credentials: PathBuf,

    /// Concurrent metadata requests [default: min(32, cpus + 4)]
    #[arg(long)]
    pub abstract_concurrency: Option<usize>,

    /// Save abstracts to cache and output after this many completed lookups
    #[arg(long, default_value = "100")]
    pub checkpoint_every: usize,

    /// Base URL of the metadata API
    #[arg(long, default_value = "https://api.crossref.org")]
    pub metadata_base_url: String,
}

impl PipelineArgs {
    pub fn abstract_concurrency(&self) -> usize {
        self.abstract_concurrency
            .unwrap_or_else(default_abstract_concurrency)
    }
}
