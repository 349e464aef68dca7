use std::path::PathBuf;

use crate::cache::CacheStore;
use crate::common::{EventLog, Shutdown};
use crate::fetch::Fetcher;

/// Collaborators shared by both phases of a run
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub fetcher: Fetcher,
    pub store: CacheStore,
    pub events: EventLog,
    pub shutdown: Shutdown,
    pub citations_output: PathBuf,
    pub abstracts_output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub concurrency: usize,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self { concurrency: 5 }
    }
}

#[derive(Debug, Clone)]
pub struct EnrichSettings {
    pub concurrency: usize,
    /// Persist after every this many completed lookups
    pub checkpoint_every: usize,
    pub metadata_base_url: String,
    /// Contact address appended as `mailto` for the metadata API's polite pool
    pub mailto: Option<String>,
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self {
            concurrency: default_abstract_concurrency(),
            checkpoint_every: 100,
            metadata_base_url: "https://api.crossref.org".to_string(),
            mailto: None,
        }
    }
}

/// min(32, cpus + 4), the usual sizing for I/O-bound pools
pub fn default_abstract_concurrency() -> usize {
    (num_cpus::get() + 4).min(32)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;

    use crate::fetch::tests::test_fetcher;

    pub(crate) fn test_context(dir: &Path, events: &EventLog) -> PipelineContext {
        PipelineContext {
            fetcher: test_fetcher(2, events),
            store: CacheStore::in_dir(&dir.join("cache")),
            events: events.clone(),
            shutdown: Shutdown::never(),
            citations_output: dir.join("out/citations.csv"),
            abstracts_output: dir.join("out/abstracts.csv"),
        }
    }

    #[test]
    fn test_default_abstract_concurrency_bounds() {
        let n = default_abstract_concurrency();
        assert!(n >= 5 && n <= 32);
    }
}
