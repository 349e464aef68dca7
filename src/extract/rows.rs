use crate::common::{EventLog, FailureKind};

use super::is_valid_identifier;

/// Value of the identifier column in the export's header row
pub const HEADER_TOKEN: &str = "DOI";

/// Identifiers parsed from one citation export, in row order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRows {
    /// Valid identifiers and "" placeholders for unusable ones
    pub identifiers: Vec<String>,
    pub placeholders: usize,
    pub skipped_rows: usize,
}

/// Parse a two-column export (description, identifier).
///
/// Header rows are skipped wherever they appear. Rows with fewer than two columns are logged and
/// skipped; rows with an unusable identifier keep their slot as "" so per-paper counts stay right.
pub fn parse_citation_rows(body: &str, source_url: &str, events: &EventLog) -> ParsedRows {
    let mut parsed = ParsedRows::default();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    for (index, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                events.failure(
                    "harvest",
                    "parse_citation_rows",
                    FailureKind::ParseError,
                    format!("{} row {}: unreadable: {}", source_url, index + 1, e),
                );
                parsed.skipped_rows += 1;
                continue;
            }
        };

        if row.len() < 2 {
            events.failure(
                "harvest",
                "parse_citation_rows",
                FailureKind::ParseError,
                format!("{} row {}: expected 2 columns, got {:?}", source_url, index + 1, row),
            );
            parsed.skipped_rows += 1;
            continue;
        }

        let identifier = row[1].trim();
        if identifier == HEADER_TOKEN {
            continue;
        }
        if is_valid_identifier(identifier) {
            parsed.identifiers.push(identifier.to_string());
        } else {
            events.failure(
                "harvest",
                "parse_citation_rows",
                FailureKind::ParseError,
                format!("{} row {}: invalid identifier '{}'", source_url, index + 1, identifier),
            );
            parsed.identifiers.push(String::new());
            parsed.placeholders += 1;
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_skipped_and_bad_identifier_kept_as_placeholder() {
        let events = EventLog::new();
        let parsed = parse_citation_rows("desc,DOI\nd1,10.1/xyz\nd2,bad\n", "u", &events);

        assert_eq!(parsed.identifiers, vec!["10.1/xyz".to_string(), String::new()]);
        assert_eq!(parsed.placeholders, 1);
        assert_eq!(events.count_kind(FailureKind::ParseError), 1);
    }

    #[test]
    fn test_header_skipped_anywhere() {
        let events = EventLog::new();
        let body = "a,https://doi.org/10.1017/abc\nDescription,DOI\nb,https://doi.org/10.1017/def\n";
        let parsed = parse_citation_rows(body, "u", &events);

        assert_eq!(
            parsed.identifiers,
            vec!["https://doi.org/10.1017/abc", "https://doi.org/10.1017/def"]
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_short_rows_skipped() {
        let events = EventLog::new();
        let parsed = parse_citation_rows("only one column\nd1,10.1/xyz\n", "u", &events);

        assert_eq!(parsed.identifiers, vec!["10.1/xyz"]);
        assert_eq!(parsed.skipped_rows, 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_quoted_descriptions_with_commas() {
        let events = EventLog::new();
        let body = "\"Smith, J. (2001) Title, p. 4\",https://doi.org/10.1017/xyz.1\n";
        let parsed = parse_citation_rows(body, "u", &events);
        assert_eq!(parsed.identifiers, vec!["https://doi.org/10.1017/xyz.1"]);
    }

    #[test]
    fn test_empty_identifier_is_placeholder() {
        let events = EventLog::new();
        let parsed = parse_citation_rows("d1,\nd2,  \n", "u", &events);
        assert_eq!(parsed.identifiers, vec!["", ""]);
        assert_eq!(parsed.placeholders, 2);
    }

    #[test]
    fn test_empty_body() {
        let parsed = parse_citation_rows("", "u", &EventLog::new());
        assert!(parsed.identifiers.is_empty());
    }
}
