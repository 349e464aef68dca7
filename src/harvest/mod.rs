//! Citation harvesting: fetch each source paper's citation export and collect the citing
//! identifiers into a [`CitationMap`].

use anyhow::Result;
use log::info;
use std::collections::HashSet;
use std::time::Instant;

use crate::common::{
    create_count_progress_bar, format_elapsed, write_citation_table, CitationMap, EventLog,
    FailureKind, HarvestStats, SourcePaper,
};
use crate::context::{HarvestSettings, PipelineContext};
use crate::extract::{parse_citation_rows, ParsedRows};
use crate::fetch::{FetchOutcome, Fetcher};
use crate::pool::{Completion, WorkerPool};

const COMPONENT: &str = "harvest";

/// One paper's result: `None` when its export could not be fetched at all
struct PaperCitations {
    title: String,
    parsed: Option<ParsedRows>,
}

async fn fetch_paper_citations(paper: SourcePaper, fetcher: Fetcher, events: EventLog) -> PaperCitations {
    let parsed = match fetcher.fetch(&paper.citation_source_url).await {
        FetchOutcome::Success(body) => Some(parse_citation_rows(&body, &paper.citation_source_url, &events)),
        FetchOutcome::Exhausted { attempts } => {
            events.failure(
                COMPONENT,
                "fetch_paper_citations",
                FailureKind::Exhausted,
                format!(
                    "Skipping '{}': could not fetch {} in {} attempts",
                    paper.title, paper.citation_source_url, attempts
                ),
            );
            None
        }
    };
    PaperCitations {
        title: paper.title,
        parsed,
    }
}

/// Persist the map to cache and the citation table
pub fn checkpoint_citations(map: &CitationMap, ctx: &PipelineContext) -> Result<()> {
    ctx.store.save_citations(map)?;
    write_citation_table(map, &ctx.citations_output)
}

/// Collect citing identifiers for every paper.
///
/// With a non-empty `existing` map (resumed from cache) only titles missing from it are fetched;
/// if there are none, this returns without any network I/O or output.
pub async fn harvest(
    papers: &[SourcePaper],
    existing: Option<CitationMap>,
    settings: &HarvestSettings,
    ctx: &PipelineContext,
) -> Result<(CitationMap, HarvestStats)> {
    let start = Instant::now();
    let mut stats = HarvestStats {
        papers_total: papers.len(),
        ..HarvestStats::default()
    };

    let (mut map, to_fetch): (CitationMap, Vec<SourcePaper>) = match existing {
        Some(mut map) if !map.is_empty() => {
            let added = map.add_missing(papers);
            if added.is_empty() {
                ctx.events.info(COMPONENT, "harvest", "No new citation entries to process");
                stats.skipped_fully_cached = true;
                return Ok((map, stats));
            }
            let to_fetch = papers
                .iter()
                .filter(|p| added.contains(&p.title))
                .cloned()
                .collect();
            (map, to_fetch)
        }
        _ => (CitationMap::for_papers(papers), papers.to_vec()),
    };

    info!(
        "Fetching citations for {} papers ({} concurrent)",
        to_fetch.len(),
        settings.concurrency
    );

    // Titles fetched this run that have not completed yet
    let mut unfinished: HashSet<String> = to_fetch.iter().map(|p| p.title.clone()).collect();

    let progress = create_count_progress_bar(to_fetch.len() as u64, "Processing citations");
    let mut pool = WorkerPool::new(settings.concurrency, ctx.shutdown.clone());
    for paper in to_fetch {
        pool.submit(fetch_paper_citations(paper, ctx.fetcher.clone(), ctx.events.clone()));
    }

    while let Some(completion) = pool.next_completed().await {
        match completion {
            Completion::Finished(PaperCitations { title, parsed: Some(parsed) }) => {
                unfinished.remove(&title);
                stats.papers_fetched += 1;
                stats.placeholders_added += parsed.placeholders;
                stats.identifiers_added += parsed.identifiers.len() - parsed.placeholders;
                stats.rows_skipped += parsed.skipped_rows;
                map.extend(&title, parsed.identifiers);
            }
            Completion::Finished(PaperCitations { title, parsed: None }) => {
                unfinished.remove(&title);
                stats.papers_failed += 1;
            }
            Completion::Crashed(e) => {
                stats.papers_failed += 1;
                ctx.events.error(COMPONENT, "harvest", format!("Citation unit crashed: {}", e));
            }
            Completion::Interrupted => {
                stats.interrupted = true;
                ctx.events.warn(COMPONENT, "harvest", "Interrupted, saving citations collected so far");
            }
        }
        progress.inc(1);
    }
    progress.finish();

    // An empty list in the cache means "harvested"; unfetched papers must stay absent
    if stats.interrupted && !unfinished.is_empty() {
        for title in &unfinished {
            map.remove(title);
        }
        ctx.events.warn(
            COMPONENT,
            "harvest",
            format!("{} papers were not fetched and will be retried next run", unfinished.len()),
        );
    }

    checkpoint_citations(&map, ctx)?;

    info!(
        "Citations: {} papers fetched, {} failed, {} identifiers, {} placeholders, {} rows skipped in {}",
        stats.papers_fetched,
        stats.papers_failed,
        stats.identifiers_added,
        stats.placeholders_added,
        stats.rows_skipped,
        format_elapsed(start.elapsed())
    );

    Ok((map, stats))
}
