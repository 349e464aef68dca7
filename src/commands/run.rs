use anyhow::{bail, Result};
use log::info;
use std::time::Instant;

use super::{enrich_settings, finish_run, RunSetup};
use crate::cli::PipelineArgs;
use crate::common::{setup_logging, EnrichStats, EventLog, HarvestStats};
use crate::enrich::enrich;

/// Run the full pipeline: citations -> abstracts
pub async fn run_pipeline_async(args: PipelineArgs) -> Result<(HarvestStats, EnrichStats)> {
    let start = Instant::now();
    setup_logging(&args.common.log_level)?;

    info!("Starting citation and abstract pipeline");
    info!("Input: {}", args.common.input.display());
    info!("Citations output: {}", args.common.citations_output.display());
    info!("Abstracts output: {}", args.common.abstracts_output.display());
    info!("Cache: {}", args.common.cache_dir.display());

    let events = EventLog::new();
    let result = async {
        let settings = enrich_settings(&args, &events)?;
        let setup = RunSetup::new(&args.common, &events)?;

        info!("");
        info!("=== STEP 1/2: Harvesting citations ===");
        info!("");

        let (citations, harvest_stats) = setup.harvest_citations(setup.resume_citations()).await?;
        if harvest_stats.skipped_fully_cached {
            info!("All {} papers were already cached", harvest_stats.papers_total);
        }
        info!(
            "Citations: {} papers, {} fetched, {} failed, {} identifiers added",
            harvest_stats.papers_total,
            harvest_stats.papers_fetched,
            harvest_stats.papers_failed,
            harvest_stats.identifiers_added
        );

        info!("");
        info!("=== STEP 2/2: Enriching abstracts ===");
        info!("");

        let existing = setup.resume_abstracts();
        let (_, enrich_stats) = enrich(&citations, existing, &settings, &setup.ctx).await?;
        if enrich_stats.interrupted {
            bail!("Interrupted during abstract enrichment; partial results were saved");
        }

        info!(
            "Abstracts: {} looked up, {} already complete, {} failed (retried on next run)",
            enrich_stats.total, enrich_stats.skipped_complete, enrich_stats.failed
        );
        Ok::<_, anyhow::Error>((harvest_stats, enrich_stats))
    }
    .await;

    finish_run(&events, &args.common.event_log, start, result)
}

pub fn run_pipeline(args: PipelineArgs) -> Result<(HarvestStats, EnrichStats)> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_pipeline_async(args))
}
