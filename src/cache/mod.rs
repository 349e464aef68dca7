//! On-disk cache of the citation and abstract maps, used to resume an interrupted or repeated run.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::common::{ensure_parent_dir, AbstractMap, CitationMap, EventLog};

pub const CITATIONS_CACHE_FILE: &str = "citation_data.bin";
pub const ABSTRACTS_CACHE_FILE: &str = "abstract_cache.bin";

/// Paths of the two cache blobs. Each one independently decides whether its phase resumes.
#[derive(Debug, Clone)]
pub struct CacheStore {
    citations_path: PathBuf,
    abstracts_path: PathBuf,
}

impl CacheStore {
    pub fn new(citations_path: impl Into<PathBuf>, abstracts_path: impl Into<PathBuf>) -> Self {
        Self {
            citations_path: citations_path.into(),
            abstracts_path: abstracts_path.into(),
        }
    }

    /// Standard file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CITATIONS_CACHE_FILE), dir.join(ABSTRACTS_CACHE_FILE))
    }

    pub fn load_citations(&self) -> Result<Option<CitationMap>> {
        load_blob(&self.citations_path)
    }

    pub fn save_citations(&self, map: &CitationMap) -> Result<()> {
        save_blob(&self.citations_path, map)?;
        info!("Cached {} citation lists to {}", map.len(), self.citations_path.display());
        Ok(())
    }

    pub fn load_abstracts(&self) -> Result<Option<AbstractMap>> {
        load_blob(&self.abstracts_path)
    }

    pub fn save_abstracts(&self, map: &AbstractMap) -> Result<()> {
        save_blob(&self.abstracts_path, map)?;
        info!("Cached {} abstract records to {}", map.len(), self.abstracts_path.display());
        Ok(())
    }

    /// Load the citation cache for resuming. An unreadable cache is logged and ignored.
    pub fn resume_citations(&self, events: &EventLog) -> Option<CitationMap> {
        match self.load_citations() {
            Ok(map) => map,
            Err(e) => {
                events.error("cache", "resume_citations", format!("Ignoring citation cache: {:#}", e));
                None
            }
        }
    }

    /// Load the abstract cache for resuming. An unreadable cache is logged and ignored.
    pub fn resume_abstracts(&self, events: &EventLog) -> Option<AbstractMap> {
        match self.load_abstracts() {
            Ok(map) => map,
            Err(e) => {
                events.error("cache", "resume_abstracts", format!("Ignoring abstract cache: {:#}", e));
                None
            }
        }
    }
}

/// Encode to a temporary sibling file, then rename over the target
fn save_blob<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let bytes = bincode::serialize(value)
        .with_context(|| format!("Failed to encode cache {}", path.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("cache");
    let tmp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, &Uuid::new_v4().to_string()[..8]));

    fs::write(&tmp_path, bytes)
        .with_context(|| format!("Failed to write cache to {}", tmp_path.display()))?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("Failed to replace cache {}", path.display()));
    }
    Ok(())
}

/// Returns `None` if the file doesn't exist
fn load_blob<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        debug!("No cache at {}", path.display());
        return Ok(None);
    }
    let bytes = fs::read(path).with_context(|| format!("Failed to read cache {}", path.display()))?;
    let value = bincode::deserialize(&bytes)
        .with_context(|| format!("Failed to decode cache {}", path.display()))?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::AbstractRecord;
    use tempfile::tempdir;

    #[test]
    fn test_missing_cache_loads_none() {
        let dir = tempdir().unwrap();
        let store = CacheStore::in_dir(dir.path());
        assert!(store.load_citations().unwrap().is_none());
        assert!(store.load_abstracts().unwrap().is_none());
    }

    #[test]
    fn test_citations_save_load() {
        let dir = tempdir().unwrap();
        let store = CacheStore::in_dir(&dir.path().join("cache"));

        let mut map = CitationMap::new();
        map.extend("A", vec!["10.1/a".to_string(), "".to_string()]);
        map.extend("B", Vec::new());
        store.save_citations(&map).unwrap();

        assert_eq!(store.load_citations().unwrap(), Some(map));
        // only the blob remains, no temp files
        let names: Vec<_> = fs::read_dir(dir.path().join("cache")).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_abstracts_overwrite() {
        let dir = tempdir().unwrap();
        let store = CacheStore::in_dir(dir.path());

        let mut map = AbstractMap::new();
        map.insert(AbstractRecord {
            citing_identifier: "10.1/a".to_string(),
            ..AbstractRecord::default()
        });
        store.save_abstracts(&map).unwrap();

        map.insert(AbstractRecord {
            citing_identifier: "10.1/b".to_string(),
            ..AbstractRecord::default()
        });
        store.save_abstracts(&map).unwrap();

        assert_eq!(store.load_abstracts().unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_corrupt_cache_is_ignored_on_resume() {
        let dir = tempdir().unwrap();
        let store = CacheStore::in_dir(dir.path());
        fs::write(dir.path().join(CITATIONS_CACHE_FILE), b"\xff\xff\xff\xff\xff\xff\xff\xff\xff").unwrap();

        assert!(store.load_citations().is_err());

        let events = EventLog::new();
        assert!(store.resume_citations(&events).is_none());
        assert_eq!(events.len(), 1);
    }
}
