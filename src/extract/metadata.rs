use anyhow::{Context, Result};
use scraper::Html;
use serde_json::Value;

/// Title and abstract pulled from a metadata API response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkMetadata {
    pub title: String,
    pub abstract_text: String,
}

/// Parse a `{"message": {"title": .., "abstract": ..}}` body.
/// Either field may be missing, a string, or a list of strings.
pub fn parse_work_metadata(body: &str) -> Result<WorkMetadata> {
    let value: Value = serde_json::from_str(body).context("Metadata response is not valid JSON")?;
    let message = value.get("message").unwrap_or(&Value::Null);

    Ok(WorkMetadata {
        title: clean_text(&field_text(message.get("title"))),
        abstract_text: clean_text(&field_text(message.get("abstract"))),
    })
}

/// Strings are used as-is, lists of strings are joined with spaces
fn field_text(field: Option<&Value>) -> String {
    match field {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

/// Strip markup (JATS/HTML) down to its text, collapse line breaks to spaces and trim
pub fn clean_text(raw: &str) -> String {
    let text: String = if raw.contains('<') || raw.contains('&') {
        Html::parse_fragment(raw).root_element().text().collect()
    } else {
        raw.to_string()
    };
    text.replace(['\n', '\r'], " ").trim().to_string()
}
