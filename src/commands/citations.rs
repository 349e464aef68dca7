use anyhow::Result;
use log::info;
use std::time::Instant;

use super::{finish_run, RunSetup};
use crate::cli::CitationsArgs;
use crate::common::{setup_logging, CitationMap, EventLog};

pub async fn run_citations_async(args: CitationsArgs) -> Result<CitationMap> {
    let start = Instant::now();
    setup_logging(&args.common.log_level)?;

    info!("Starting citation harvest");
    info!("Input: {}", args.common.input.display());
    info!("Output: {}", args.common.citations_output.display());
    info!("Cache: {}", args.common.cache_dir.display());

    let events = EventLog::new();
    let result = async {
        let setup = RunSetup::new(&args.common, &events)?;
        let cached = setup.resume_citations();
        setup.harvest_citations(cached).await.map(|(map, _)| map)
    }
    .await;

    finish_run(&events, &args.common.event_log, start, result)
}

pub fn run_citations(args: CitationsArgs) -> Result<CitationMap> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_citations_async(args))
}
