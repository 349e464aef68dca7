use lazy_static::lazy_static;
use regex::Regex;

/// Resolver URL that often precedes identifiers in the citation export
pub const RESOLVER_PREFIX: &str = "https://doi.org/";

lazy_static! {
    /// Bare DOI: registrant prefix, slash, non-empty suffix
    pub static ref BARE_DOI_PATTERN: Regex = Regex::new(r"^10\.\d+/\S+$").unwrap();

    /// Resolver forms stripped before lookup: https://doi.org/, http://dx.doi.org/, doi:
    pub static ref RESOLVER_PATTERN: Regex = Regex::new(
        r"(?i)^(?:https?://(?:dx\.)?doi\.org/|doi:\s*)"
    ).unwrap();
}

/// Whether a value from the citation export's identifier column is usable.
///
/// Anything longer than the resolver prefix is accepted (the export normally emits full resolver
/// URLs), as is a bare DOI.
pub fn is_valid_identifier(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && (value.len() > RESOLVER_PREFIX.len() || BARE_DOI_PATTERN.is_match(value))
}

/// Strip a resolver prefix and stray `;` separators, giving the key used for metadata lookups
pub fn normalize_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = RESOLVER_PATTERN.replace(trimmed, "");
    stripped.replace(';', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_resolver_url() {
        assert!(is_valid_identifier("https://doi.org/10.1017/S0003055400000001"));
    }

    #[test]
    fn test_valid_bare_doi() {
        assert!(is_valid_identifier("10.1/xyz"));
        assert!(is_valid_identifier("10.1017/S0003055400000001"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("   "));
        assert!(!is_valid_identifier("bad"));
        assert!(!is_valid_identifier("https://doi.org/"));
        assert!(!is_valid_identifier("10.1234/"));
    }

    #[test]
    fn test_normalize_strips_resolver() {
        assert_eq!(normalize_identifier("https://doi.org/10.1234/example"), "10.1234/example");
        assert_eq!(normalize_identifier("http://dx.doi.org/10.1234/example"), "10.1234/example");
        assert_eq!(normalize_identifier("HTTPS://DOI.ORG/10.1234/Example"), "10.1234/Example");
        assert_eq!(normalize_identifier("doi: 10.1234/example"), "10.1234/example");
    }

    #[test]
    fn test_normalize_strips_separators() {
        assert_eq!(normalize_identifier(" https://doi.org/10.1234/example; "), "10.1234/example");
        assert_eq!(normalize_identifier("10.1234/ex;ample"), "10.1234/example");
    }

    #[test]
    fn test_normalize_bare_is_unchanged() {
        assert_eq!(normalize_identifier("10.1/xyz"), "10.1/xyz");
        assert_eq!(normalize_identifier(""), "");
    }
}
