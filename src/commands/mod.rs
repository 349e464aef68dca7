pub mod abstracts;
pub mod citations;
pub mod run;

pub use abstracts::run_abstracts;
pub use citations::run_citations;
pub use run::run_pipeline;

use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use std::path::Path;
use std::time::Instant;

use crate::cli::{CommonArgs, PipelineArgs};
use crate::common::{
    format_elapsed, load_source_papers, AbstractMap, CitationMap, Credentials, EventLevel,
    EventLog, FailureKind, HarvestStats, Shutdown,
};
use crate::context::{EnrichSettings, PipelineContext};
use crate::fetch::{create_http_client, Fetcher};
use crate::harvest::harvest;

/// Collaborators built once at startup from the command-line arguments
struct RunSetup {
    common: CommonArgs,
    ctx: PipelineContext,
}

impl RunSetup {
    /// Must be called from within the tokio runtime (installs the Ctrl-C listener)
    fn new(common: &CommonArgs, events: &EventLog) -> Result<Self> {
        let client = create_http_client().context("Failed to build HTTP client")?;
        let ctx = PipelineContext {
            fetcher: Fetcher::new(client, common.fetch_policy(), events.clone()),
            store: common.cache_store(),
            events: events.clone(),
            shutdown: Shutdown::on_ctrl_c(),
            citations_output: common.citations_output.clone(),
            abstracts_output: common.abstracts_output.clone(),
        };
        Ok(Self {
            common: common.clone(),
            ctx,
        })
    }

    fn resume_citations(&self) -> Option<CitationMap> {
        if self.common.no_cache {
            return None;
        }
        let cached = self.ctx.store.resume_citations(&self.ctx.events);
        if let Some(map) = &cached {
            info!(
                "Resuming from citation cache: {} papers, {} identifiers",
                map.len(),
                map.total_identifiers()
            );
        }
        cached
    }

    fn resume_abstracts(&self) -> AbstractMap {
        if self.common.no_cache {
            return AbstractMap::new();
        }
        match self.ctx.store.resume_abstracts(&self.ctx.events) {
            Some(map) => {
                info!(
                    "Resuming from abstract cache: {} records ({} complete)",
                    map.len(),
                    map.complete_count()
                );
                map
            }
            None => AbstractMap::new(),
        }
    }

    /// Load the input table and run the citation phase
    async fn harvest_citations(&self, cached: Option<CitationMap>) -> Result<(CitationMap, HarvestStats)> {
        let papers = load_source_papers(
            &self.common.input,
            &self.common.title_column,
            &self.common.url_column,
            &self.ctx.events,
        )?;
        let (map, stats) = harvest(&papers, cached, &self.common.harvest_settings(), &self.ctx).await?;
        if stats.interrupted {
            bail!("Interrupted during citation harvesting; partial results were saved");
        }
        Ok((map, stats))
    }
}

fn enrich_settings(args: &PipelineArgs, events: &EventLog) -> Result<EnrichSettings> {
    let credentials = Credentials::load(&args.credentials, events)?;
    Ok(EnrichSettings {
        concurrency: args.abstract_concurrency(),
        checkpoint_every: args.checkpoint_every,
        metadata_base_url: args.metadata_base_url.clone(),
        mailto: credentials.email().map(str::to_string),
    })
}

/// Flush the event log and report the outcome. Runs whether or not the command succeeded.
fn finish_run<T>(events: &EventLog, event_log: &Path, start: Instant, result: Result<T>) -> Result<T> {
    match events.flush_to(event_log) {
        Ok(count) => info!("Wrote {} log entries to {}", count, event_log.display()),
        Err(e) => warn!("Failed to write event log: {:#}", e),
    }

    info!("==================== SUMMARY ====================");
    info!("Total execution time: {}", format_elapsed(start.elapsed()));
    info!(
        "Log entries: {} ({} warnings, {} errors)",
        events.len(),
        events.count_level(EventLevel::Warn),
        events.count_level(EventLevel::Error)
    );
    info!(
        "Requests given up after all attempts: {}",
        events.count_kind(FailureKind::Exhausted)
    );
    info!("=================================================");

    if let Err(e) = &result {
        error!("Run failed: {:#}", e);
    } else {
        info!("Run completed");
    }
    result
}
