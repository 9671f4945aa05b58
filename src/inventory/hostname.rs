//! Hostname normalization: turns one raw cell value into zero or more
//! canonical short hostnames.

use regex::Regex;
use std::collections::BTreeSet;
use std::collections::HashSet;

/// Unique, canonical, lowercase hostnames of one document or system
pub type HostnameSet = BTreeSet<String>;

/// Context hint that makes spaces separate hostnames
const CNAME_HINT: &str = "cname";

/// Default hint for values that did not come from a table column
pub const DEFAULT_HINT: &str = "hostname";

/// A raw value paired with the header it was found under
#[derive(Clone, Debug, PartialEq)]
pub struct HostnameCandidate {
    pub value: String,
    pub hint: String,
}

impl HostnameCandidate {
    pub fn new(value: impl Into<String>, hint: impl Into<String>) -> Self {
        Self { value: value.into(), hint: hint.into() }
    }
}

pub struct HostnameNormalizer {
    excluded: HashSet<String>,
    annotation: Regex,
    ip_address: Regex,
    allowed: Regex,
}

impl HostnameNormalizer {
    /// Creates a normalizer rejecting the given placeholder values
    pub fn new<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            excluded: excluded.into_iter().map(|value| value.as_ref().trim().to_lowercase()).collect(),
            annotation: Regex::new(r"[(\[].*?[)\]]").expect("Hardcode regex pattern"),
            ip_address: Regex::new(r"^((\d+)\.){3}(\d+)$").expect("Hardcode regex pattern"),
            allowed: Regex::new(r"^[A-Za-z0-9_-]*$").expect("Hardcode regex pattern"),
        }
    }

    pub fn normalize(&self, candidate: &HostnameCandidate) -> HostnameSet {
        self.clean(&candidate.value, &candidate.hint)
    }

    /// Splits a raw value into candidates and keeps the ones that look like
    /// hostnames, truncated to their first label. Never fails; the worst case
    /// is an empty set.
    pub fn clean(&self, raw: &str, hint: &str) -> HostnameSet {
        let value = raw.trim().replace("https://", "").replace("http://", "");
        let value = value.trim_matches('/');
        let split_spaces = hint.trim().eq_ignore_ascii_case(CNAME_HINT);

        value
            .split(is_line_break)
            .flat_map(|line| line.split(','))
            .flat_map(|item| item.split('\t'))
            .flat_map(|item| {
                if split_spaces {
                    item.split(' ').collect::<Vec<_>>()
                } else {
                    vec![item]
                }
            })
            .filter_map(|item| self.clean_one(item))
            .collect()
    }

    fn clean_one(&self, item: &str) -> Option<String> {
        let item = self.annotation.replace_all(item, "");
        let item = item
            .trim()
            .chars()
            .filter(|character| is_printable(*character) && *character != ' ')
            .collect::<String>();
        let item = item.trim().to_lowercase();
        if self.ip_address.is_match(&item) {
            return None;
        }

        let label = item.split('.').next().unwrap_or_default();
        if label.is_empty() || self.excluded.contains(label) || !self.allowed.is_match(label) {
            None
        } else {
            Some(label.to_owned())
        }
    }
}

/// Line boundaries recognized when splitting multi-line cells
fn is_line_break(character: char) -> bool {
    matches!(
        character,
        '\n' | '\r' | '\u{0B}' | '\u{0C}' | '\u{1C}' | '\u{1D}' | '\u{1E}' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Printable ASCII including whitespace
fn is_printable(character: char) -> bool {
    character.is_ascii_graphic() || matches!(character, ' ' | '\t' | '\n' | '\r' | '\u{0B}' | '\u{0C}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rules;

    fn normalizer() -> HostnameNormalizer {
        Rules::default().normalizer()
    }

    fn set(values: &[&str]) -> HostnameSet {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn truncates_domains_and_annotations() {
        assert_eq!(normalizer().clean("HOST1.example.com (old)", DEFAULT_HINT), set(&["host1"]));
        assert_eq!(normalizer().clean("https://Web01.agency.gov/", DEFAULT_HINT), set(&["web01"]));
        assert_eq!(normalizer().clean("db01 [primary]", DEFAULT_HINT), set(&["db01"]));
    }

    #[test]
    fn rejects_ip_addresses() {
        assert!(normalizer().clean("10.0.0.5", DEFAULT_HINT).is_empty());
        assert_eq!(normalizer().clean("10.0.0.5, app01", DEFAULT_HINT), set(&["app01"]));
    }

    #[test]
    fn splits_on_spaces_only_for_cname() {
        assert_eq!(normalizer().clean("web01 web02", "cname"), set(&["web01", "web02"]));
        assert_eq!(normalizer().clean("web01 web02", " CNAME "), set(&["web01", "web02"]));
        assert_eq!(normalizer().clean("web01 web02", DEFAULT_HINT), set(&["web01web02"]));
    }

    #[test]
    fn fans_out_on_separators() {
        let hosts = normalizer().clean("a1\r\nb2,c3\td4\u{0B}e5", DEFAULT_HINT);
        assert_eq!(hosts, set(&["a1", "b2", "c3", "d4", "e5"]));
    }

    #[test]
    fn drops_placeholders_and_invalid_characters() {
        let hosts = normalizer().clean("NA\nWindows Server\nweb#1\nsérveur01\n\n", DEFAULT_HINT);
        assert_eq!(hosts, set(&["srveur01"]));
    }

    #[test]
    fn output_is_clean_and_idempotent() {
        let normalizer = normalizer();
        let inputs = [
            "HOST1.example.com (old)",
            "web01 web02",
            "(db) [x] app-01.corp, 192.168.1.1\nFoo_Bar",
            "  ",
            "http://a.b.c/",
        ];
        for input in inputs {
            for hint in ["cname", DEFAULT_HINT] {
                for host in normalizer.clean(input, hint) {
                    assert!(!host.contains([' ', '(', ')', '[', ']', '.']));
                    assert_eq!(normalizer.clean(&host, hint), set(&[host.as_str()]));
                }
            }
        }
    }

    #[test]
    fn normalizes_candidates() {
        let candidate = HostnameCandidate::new("web01 web02", "CName");
        assert_eq!(normalizer().normalize(&candidate), set(&["web01", "web02"]));
    }
}
