use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::path::Path;

use super::{ensure_parent_dir, AbstractMap, CitationMap};

pub const ABSTRACT_TABLE_HEADER: [&str; 5] = [
    "source_title",
    "citing_identifier",
    "citing_title",
    "citing_abstract",
    "lookup_url",
];

/// Rows of the citation table: one column per title, lists padded with "" to the longest one
pub fn padded_citation_rows(map: &CitationMap) -> Vec<Vec<&str>> {
    let height = map.max_list_len();
    (0..height)
        .map(|row| {
            map.iter()
                .map(|(_, ids)| ids.get(row).map(String::as_str).unwrap_or(""))
                .collect()
        })
        .collect()
}

/// Write the citation table. The in-memory map is left untouched.
pub fn write_citation_table(map: &CitationMap, path: &Path) -> Result<()> {
    info!("Writing citation table to: {}", path.display());
    ensure_parent_dir(path)?;

    if map.is_empty() {
        File::create(path).with_context(|| format!("Failed to create output file: {}", path.display()))?;
        return Ok(());
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    writer.write_record(map.titles())?;
    for row in padded_citation_rows(map) {
        writer.write_record(&row)?;
    }
    writer.flush().context("Failed to flush citation table")?;
    Ok(())
}

/// Write the abstract table, one row per record in identifier order
pub fn write_abstract_table(map: &AbstractMap, path: &Path) -> Result<()> {
    info!("Writing {} abstract records to: {}", map.len(), path.display());
    ensure_parent_dir(path)?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    writer.write_record(ABSTRACT_TABLE_HEADER)?;
    for record in map.values() {
        writer.write_record([
            &record.source_title,
            &record.citing_identifier,
            &record.citing_title,
            &record.citing_abstract,
            &record.lookup_url,
        ])?;
    }
    writer.flush().context("Failed to flush abstract table")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{AbstractRecord, SourcePaper};
    use tempfile::tempdir;

    fn sample_citations() -> CitationMap {
        let mut map = CitationMap::new();
        map.extend("A", vec!["10.1/a1".to_string(), "".to_string(), "10.1/a3".to_string()]);
        map.extend("B", vec!["10.1/b1".to_string()]);
        map.extend("C", Vec::new());
        map
    }

    #[test]
    fn test_padded_rows_are_rectangular() {
        let map = sample_citations();
        let rows = padded_citation_rows(&map);

        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 3));
        assert_eq!(rows[0], vec!["10.1/a1", "10.1/b1", ""]);
        assert_eq!(rows[1], vec!["", "", ""]);
        assert_eq!(rows[2], vec!["10.1/a3", "", ""]);
        // canonical map stays ragged
        assert_eq!(map.get("B").unwrap().len(), 1);
    }

    #[test]
    fn test_write_citation_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/citations.csv");
        write_citation_table(&sample_citations(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "A,B,C");
        assert_eq!(lines[1], "10.1/a1,10.1/b1,");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_citation_columns_follow_input_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("citations.csv");
        let papers = vec![SourcePaper::new("Zeta", "u1"), SourcePaper::new("Alpha", "u2")];
        let mut map = CitationMap::for_papers(&papers);
        map.extend("Alpha", vec!["10.1/alpha".to_string()]);
        write_citation_table(&map, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Zeta,Alpha\n,10.1/alpha\n");
    }

    #[test]
    fn test_write_abstract_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abstracts.csv");

        let mut map = AbstractMap::new();
        map.insert(AbstractRecord {
            source_title: "A".to_string(),
            citing_identifier: "10.1/xyz".to_string(),
            citing_title: "T, with comma".to_string(),
            citing_abstract: "Hi".to_string(),
            lookup_url: "https://api.crossref.org/works/10.1/xyz".to_string(),
        });
        write_abstract_table(&map, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.headers().unwrap(), ABSTRACT_TABLE_HEADER.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][2], "T, with comma");
    }
}
