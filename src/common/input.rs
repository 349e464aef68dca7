use anyhow::{bail, Context, Result};
use log::info;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use super::{EventLog, SourcePaper};

/// Load source papers from a CSV file with a header row
pub fn load_source_papers(
    path: &Path,
    title_column: &str,
    url_column: &str,
    events: &EventLog,
) -> Result<Vec<SourcePaper>> {
    info!("Loading input CSV: {}", path.display());

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open input CSV: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header row of {}", path.display()))?
        .clone();
    let column_index = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .with_context(|| format!("Input CSV {} has no '{}' column", path.display(), name))
    };
    let title_idx = column_index(title_column)?;
    let url_idx = column_index(url_column)?;

    let mut papers = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (row_number, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("Failed to read row {} of input CSV", row_number + 2))?;
        let title = row.get(title_idx).unwrap_or("").trim();
        let url = row.get(url_idx).unwrap_or("").trim();

        if title.is_empty() || url.is_empty() {
            events.warn(
                "input",
                "load_source_papers",
                format!("Row {} is missing a title or citation URL, skipping", row_number + 2),
            );
            continue;
        }
        if !seen.insert(title.to_string()) {
            events.warn(
                "input",
                "load_source_papers",
                format!("Duplicate title '{}' on row {}, keeping the first", title, row_number + 2),
            );
            continue;
        }

        papers.push(SourcePaper::new(title, url));
    }

    info!("Loaded {} source papers", papers.len());
    Ok(papers)
}

/// Values from a `key: value` credentials file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    values: HashMap<String, String>,
}

impl Credentials {
    /// Parse `key: value` lines. Blank lines and `#` comments are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut values = HashMap::new();
        for (line_number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                bail!("Malformed credentials line {}: expected 'key: value'", line_number + 1);
            };
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Self { values })
    }

    /// Load from disk. A missing file yields empty credentials.
    pub fn load(path: &Path, events: &EventLog) -> Result<Self> {
        if !path.exists() {
            events.warn(
                "input",
                "load_credentials",
                format!("No credentials file at {}, continuing without a contact email", path.display()),
            );
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Failed to parse credentials: {}", path.display()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Contact email for the metadata API, if configured and non-empty
    pub fn email(&self) -> Option<&str> {
        self.get("email").filter(|e| !e.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_source_papers() {
        let file = write_csv(
            "title,year,all_citing_papers_link\n\
             Paper A,2001,https://example.org/a.csv\n\
             Paper B,2002,https://example.org/b.csv\n",
        );
        let events = EventLog::new();
        let papers =
            load_source_papers(file.path(), "title", "all_citing_papers_link", &events).unwrap();

        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0], SourcePaper::new("Paper A", "https://example.org/a.csv"));
        assert!(events.is_empty());
    }

    #[test]
    fn test_load_source_papers_skips_duplicates_and_blanks() {
        let file = write_csv(
            "title,all_citing_papers_link\n\
             Paper A,https://example.org/a.csv\n\
             Paper A,https://example.org/other.csv\n\
             ,https://example.org/c.csv\n",
        );
        let events = EventLog::new();
        let papers =
            load_source_papers(file.path(), "title", "all_citing_papers_link", &events).unwrap();

        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].citation_source_url, "https://example.org/a.csv");
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_load_source_papers_missing_column() {
        let file = write_csv("title,link\nPaper A,x\n");
        let err = load_source_papers(file.path(), "title", "all_citing_papers_link", &EventLog::new())
            .unwrap_err();
        assert!(err.to_string().contains("all_citing_papers_link"));
    }

    #[test]
    fn test_credentials_parse() {
        let creds = Credentials::parse("# contact\nemail: someone@example.org\n\ntoken: a:b\n").unwrap();
        assert_eq!(creds.email(), Some("someone@example.org"));
        assert_eq!(creds.get("token"), Some("a:b"));
    }

    #[test]
    fn test_credentials_empty_email_is_none() {
        let creds = Credentials::parse("email:\n").unwrap();
        assert_eq!(creds.email(), None);
    }

    #[test]
    fn test_credentials_malformed_line() {
        assert!(Credentials::parse("email someone@example.org").is_err());
    }

    #[test]
    fn test_credentials_missing_file() {
        let events = EventLog::new();
        let creds = Credentials::load(Path::new("/nonexistent/credentials.txt"), &events).unwrap();
        assert_eq!(creds.email(), None);
        assert_eq!(events.len(), 1);
    }
}
