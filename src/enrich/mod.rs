//! Abstract enrichment: look up title and abstract for every citing identifier that doesn't
//! have a complete record yet, checkpointing the growing [`AbstractMap`] as results come in.

use anyhow::Result;
use log::{debug, info};
use reqwest::Url;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::common::{
    create_count_progress_bar, format_elapsed, write_abstract_table, AbstractMap, AbstractRecord,
    CitationMap, EnrichStats, EventLog, FailureKind,
};
use crate::context::{EnrichSettings, PipelineContext};
use crate::extract::{normalize_identifier, parse_work_metadata};
use crate::fetch::Fetcher;
use crate::pool::{Completion, WorkerPool};

const COMPONENT: &str = "enrich";

/// One identifier to look up, attributed to the first source paper that cites it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub source_title: String,
    pub identifier: String,
}

/// Pairs from `citations` whose identifier is non-blank and lacks a complete record.
/// Each identifier is queued at most once. Returns the items and the number already complete.
pub fn build_work_set(citations: &CitationMap, existing: &AbstractMap) -> (Vec<WorkItem>, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut items = Vec::new();
    let mut already_complete = 0;

    for (title, identifiers) in citations.iter() {
        for raw in identifiers {
            let identifier = normalize_identifier(raw);
            if identifier.is_empty() || !seen.insert(identifier.clone()) {
                continue;
            }
            if existing.is_complete(&identifier) {
                already_complete += 1;
                continue;
            }
            items.push(WorkItem {
                source_title: title.clone(),
                identifier,
            });
        }
    }

    (items, already_complete)
}

/// Lookup URL for an identifier. The contact address is only added to the request URL,
/// never to the stored record.
pub fn lookup_url(base_url: &str, identifier: &str) -> String {
    format!("{}/works/{}", base_url.trim_end_matches('/'), identifier)
}

fn request_url(lookup: &str, mailto: Option<&str>) -> String {
    let Some(email) = mailto else {
        return lookup.to_string();
    };
    match Url::parse(lookup) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("mailto", email);
            url.into()
        }
        // reqwest rejects it anyway and the failure is logged there
        Err(_) => lookup.to_string(),
    }
}

/// Fetch and parse one identifier. Failures still produce a record (with empty title and
/// abstract) so the identifier shows up as incomplete and is retried on the next run.
async fn enrich_one(
    item: WorkItem,
    fetcher: &Fetcher,
    events: &EventLog,
    base_url: &str,
    mailto: Option<&str>,
) -> (AbstractRecord, bool) {
    let lookup = lookup_url(base_url, &item.identifier);
    let mut record = AbstractRecord {
        source_title: item.source_title,
        citing_identifier: item.identifier,
        citing_title: String::new(),
        citing_abstract: String::new(),
        lookup_url: lookup.clone(),
    };

    let body = match fetcher.fetch(&request_url(&lookup, mailto)).await.into_body() {
        Some(body) => body,
        None => {
            events.failure(
                COMPONENT,
                "enrich_one",
                FailureKind::Exhausted,
                format!("Could not fetch metadata for {}", record.citing_identifier),
            );
            return (record, false);
        }
    };

    match parse_work_metadata(&body) {
        Ok(meta) => {
            record.citing_title = meta.title;
            record.citing_abstract = meta.abstract_text;
            (record, true)
        }
        Err(e) => {
            events.failure(
                COMPONENT,
                "enrich_one",
                FailureKind::ParseError,
                format!("{}: {:#}", record.citing_identifier, e),
            );
            (record, false)
        }
    }
}

/// Persist the map to cache and the abstract table
pub fn checkpoint_abstracts(map: &AbstractMap, ctx: &PipelineContext) -> Result<()> {
    ctx.store.save_abstracts(map)?;
    write_abstract_table(map, &ctx.abstracts_output)
}

/// Fetch metadata for every identifier in `citations` that `existing` doesn't cover yet
pub async fn enrich(
    citations: &CitationMap,
    existing: AbstractMap,
    settings: &EnrichSettings,
    ctx: &PipelineContext,
) -> Result<(AbstractMap, EnrichStats)> {
    let start = Instant::now();
    let (work, already_complete) = build_work_set(citations, &existing);
    let mut stats = EnrichStats {
        total: work.len(),
        skipped_complete: already_complete,
        ..EnrichStats::default()
    };

    info!(
        "Fetching abstracts for {} identifiers ({} already complete, {} concurrent)",
        stats.total, already_complete, settings.concurrency
    );

    // Workers insert their own record; the lock covers each whole read-modify-write
    let abstracts = Arc::new(Mutex::new(existing));
    let checkpoint_every = settings.checkpoint_every.max(1);

    let progress = create_count_progress_bar(stats.total as u64, "Processing abstracts");
    let mut pool = WorkerPool::new(settings.concurrency, ctx.shutdown.clone());
    for item in work {
        let abstracts = abstracts.clone();
        let fetcher = ctx.fetcher.clone();
        let events = ctx.events.clone();
        let base_url = settings.metadata_base_url.clone();
        let mailto = settings.mailto.clone();
        pool.submit(async move {
            let (record, succeeded) =
                enrich_one(item, &fetcher, &events, &base_url, mailto.as_deref()).await;
            abstracts.lock().await.insert(record);
            succeeded
        });
    }

    while let Some(completion) = pool.next_completed().await {
        match completion {
            Completion::Finished(true) => stats.succeeded += 1,
            Completion::Finished(false) => stats.failed += 1,
            Completion::Crashed(e) => {
                stats.failed += 1;
                ctx.events.error(COMPONENT, "enrich", format!("Abstract unit crashed: {}", e));
            }
            Completion::Interrupted => {
                stats.interrupted = true;
                ctx.events.warn(COMPONENT, "enrich", "Interrupted, saving abstracts collected so far");
                break;
            }
        }

        stats.completed += 1;
        progress.set_position(stats.completed as u64);
        debug!("Abstract progress: {}/{}", stats.completed, stats.total);

        if stats.completed % checkpoint_every == 0 && stats.completed < stats.total {
            let snapshot = abstracts.lock().await.clone();
            match checkpoint_abstracts(&snapshot, ctx) {
                Ok(()) => stats.checkpoints += 1,
                Err(e) => ctx.events.error(COMPONENT, "checkpoint", format!("{:#}", e)),
            }
        }
    }
    progress.finish();
    drop(pool);

    let map = abstracts.lock().await.clone();
    checkpoint_abstracts(&map, ctx)?;
    stats.checkpoints += 1;

    info!(
        "Abstracts: {} succeeded, {} failed of {}, {} checkpoints in {}",
        stats.succeeded,
        stats.failed,
        stats.total,
        stats.checkpoints,
        format_elapsed(start.elapsed())
    );

    Ok((map, stats))
}
