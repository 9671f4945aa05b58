//! Host column resolution for tabular data.

use crate::inventory::normalize_all;
use std::collections::HashMap;
use tracing::debug;

/// Finds the column holding host identifiers among a table's headers.
///
/// Candidates are checked in priority order against each header, headers in
/// their natural order. Per-document overrides bypass matching entirely.
#[derive(Clone, Debug, Default)]
pub struct ColumnMatcher {
    candidates: Vec<String>,
    overrides: HashMap<String, String>,
    excluded: Vec<String>,
    excluded_by_document: HashMap<String, Vec<String>>,
}

impl ColumnMatcher {
    /// Creates a matcher from prioritized candidate substrings
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            candidates: normalize_all(candidates),
            ..Self::default()
        }
    }

    /// Registers headers that hold hosts for specific documents
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        self.overrides = overrides.iter().map(|(document, header)| (document.trim().to_owned(), header.to_owned())).collect();
        self
    }

    /// Header substrings that are never host columns
    pub fn with_exclusions<I, S>(mut self, excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded = normalize_all(excluded);
        self
    }

    /// Exact header names ignored for specific documents
    pub fn with_document_exclusions(mut self, excluded: &HashMap<String, Vec<String>>) -> Self {
        self.excluded_by_document = excluded
            .iter()
            .map(|(document, headers)| (document.trim().to_owned(), normalize_all(headers)))
            .collect();
        self
    }

    /// Returns the host column header for a document, `None` when no header
    /// qualifies.
    pub fn find_host_column(&self, document: &str, headers: &[String]) -> Option<String> {
        if let Some(header) = self.overrides.get(document) {
            debug!("Using header override '{}' for {}", header, document);
            return Some(header.to_owned());
        }

        let excluded_by_document = self.excluded_by_document.get(document);
        headers
            .iter()
            .find(|header| {
                let name = header.trim().to_lowercase();
                if name.is_empty() || excluded_by_document.map(|excluded| excluded.contains(&name)).unwrap_or(false) {
                    return false;
                }
                let is_candidate = self.candidates.iter().any(|candidate| name.contains(candidate.as_str()));
                let is_excluded = self.excluded.iter().any(|excluded| name.contains(excluded.as_str()));
                is_candidate && !is_excluded
            })
            .inspect(|header| debug!("Found header '{}' in {}", header, document))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rules;

    fn headers(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn excluded_lookalikes_lose() {
        let matcher = Rules::default().matcher();
        let found = matcher.find_host_column("hw-inventory-1", &headers(&["Prior Hostname", "Hostname", "IP"]));
        assert_eq!(found.as_deref(), Some("Hostname"));
    }

    #[test]
    fn first_matching_header_wins() {
        let matcher = ColumnMatcher::new(["hostname", "node"]);
        let found = matcher.find_host_column("doc", &headers(&["", "Node", "Server Hostname"]));
        assert_eq!(found.as_deref(), Some("Node"));
        assert_eq!(matcher.find_host_column("doc", &headers(&["IP", "Owner"])), None);
    }

    #[test]
    fn overrides_bypass_matching() {
        let matcher = Rules::default().matcher();
        let found = matcher.find_host_column("hw-inventory-527", &headers(&["Hostname", "Name/Type"]));
        assert_eq!(found.as_deref(), Some("Name/Type"));
        // Returned even when the sheet does not carry it
        let found = matcher.find_host_column("hw-inventory-349", &headers(&["Hostname"]));
        assert_eq!(found.as_deref(), Some("IP Address"));
    }

    #[test]
    fn document_exclusions_apply_to_their_document_only() {
        let matcher = Rules::default().matcher();
        let columns = headers(&["DOED VM Name ", "Server Name"]);
        assert_eq!(matcher.find_host_column("hw-inventory-593", &columns).as_deref(), Some("Server Name"));
        assert_eq!(matcher.find_host_column("hw-inventory-594", &columns).as_deref(), Some("DOED VM Name "));
    }
}
