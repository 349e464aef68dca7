use anyhow::{bail, Result};
use log::info;
use std::time::Instant;

use super::{enrich_settings, finish_run, RunSetup};
use crate::cli::PipelineArgs;
use crate::common::{setup_logging, AbstractMap, EventLog};
use crate::enrich::enrich;

/// Enrich from the cached citation map, harvesting first only when there is no cache
pub async fn run_abstracts_async(args: PipelineArgs) -> Result<AbstractMap> {
    let start = Instant::now();
    setup_logging(&args.common.log_level)?;

    info!("Starting abstract enrichment");
    info!("Metadata API: {}", args.metadata_base_url);
    info!("Output: {}", args.common.abstracts_output.display());

    let events = EventLog::new();
    let result = async {
        let settings = enrich_settings(&args, &events)?;
        let setup = RunSetup::new(&args.common, &events)?;

        let citations = match setup.resume_citations() {
            Some(map) if !map.is_empty() => map,
            _ => {
                info!("No citation cache, harvesting citations first");
                setup.harvest_citations(None).await?.0
            }
        };

        let existing = setup.resume_abstracts();
        let (abstracts, stats) = enrich(&citations, existing, &settings, &setup.ctx).await?;
        if stats.interrupted {
            bail!("Interrupted during abstract enrichment; partial results were saved");
        }
        Ok::<_, anyhow::Error>(abstracts)
    }
    .await;

    finish_run(&events, &args.common.event_log, start, result)
}

pub fn run_abstracts(args: PipelineArgs) -> Result<AbstractMap> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_abstracts_async(args))
}
