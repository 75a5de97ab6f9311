use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One normalized dictionary entry recovered from the index markup.
/// The headword never appears in its own inflection set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub headword: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub inflections: BTreeSet<String>,
    pub body: String,
}

/// Optional book metadata discovered from an OPF package file. All fields
/// are independently optional; the extraction engine carries this through
/// untouched and the output writers substitute defaults at the boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub creator: Option<String>,
    pub date: Option<String>,
    pub input_language: Option<String>,
    pub output_language: Option<String>,
}

impl Metadata {
    /// Field-wise merge: keeps `self` where present, falls back otherwise.
    pub fn or(self, fallback: Metadata) -> Metadata {
        Metadata {
            title: self.title.or(fallback.title),
            description: self.description.or(fallback.description),
            creator: self.creator.or(fallback.creator),
            date: self.date.or(fallback.date),
            input_language: self.input_language.or(fallback.input_language),
            output_language: self.output_language.or(fallback.output_language),
        }
    }
}

/// Accumulates entries in extraction order across chunks and produces the
/// final ordered sequence. Duplicate headwords are kept: homographs are
/// legitimate separate records.
#[derive(Debug, Default)]
pub struct Collator {
    entries: Vec<Entry>,
}

impl Collator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sort key: lowercased headword bytes, original-case headword as
    /// tiebreak. The glossary compilers downstream expect this ordering.
    pub fn finish(mut self) -> Vec<Entry> {
        self.entries
            .sort_by_cached_key(|e| (e.headword.to_lowercase(), e.headword.clone()));
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(headword: &str, body: &str) -> Entry {
        Entry {
            headword: headword.to_string(),
            inflections: BTreeSet::new(),
            body: body.to_string(),
        }
    }

    fn headwords(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.headword.as_str()).collect()
    }

    #[test]
    fn collator_sorts_case_insensitively_with_case_tiebreak() {
        let mut collator = Collator::new();
        for hw in ["beta", "alpha", "ALPHA", "Alpha"] {
            collator.push(entry(hw, "d"));
        }
        let sorted = collator.finish();
        assert_eq!(headwords(&sorted), vec!["ALPHA", "Alpha", "alpha", "beta"]);
    }

    #[test]
    fn collator_sort_is_idempotent() {
        let mut first = Collator::new();
        for hw in ["Mole", "mole", "aardvark", "Zebra"] {
            first.push(entry(hw, "d"));
        }
        let once = first.finish();

        let mut second = Collator::new();
        for e in once.clone() {
            second.push(e);
        }
        assert_eq!(second.finish(), once);
    }

    #[test]
    fn collator_keeps_homographs_as_separate_entries() {
        let mut collator = Collator::new();
        collator.push(entry("bank", "river margin"));
        collator.push(entry("bank", "financial institution"));
        let sorted = collator.finish();
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0].headword, "bank");
        assert_eq!(sorted[1].headword, "bank");
        assert_ne!(sorted[0].body, sorted[1].body);
    }

    #[test]
    fn metadata_or_prefers_existing_fields() {
        let discovered = Metadata {
            title: Some("Webster 1913".to_string()),
            ..Default::default()
        };
        let merged = discovered.or(Metadata {
            title: Some("part00000".to_string()),
            creator: Some("author".to_string()),
            ..Default::default()
        });
        assert_eq!(merged.title.as_deref(), Some("Webster 1913"));
        assert_eq!(merged.creator.as_deref(), Some("author"));
        assert_eq!(merged.date, None);
    }

    #[test]
    fn entry_serializes_without_empty_inflection_set() {
        let json = serde_json::to_string(&entry("cat", "a small feline")).unwrap();
        assert!(!json.contains("inflections"));

        let mut with_infl = entry("cat", "a small feline");
        with_infl.inflections.insert("cats".to_string());
        let json = serde_json::to_string(&with_infl).unwrap();
        assert!(json.contains(r#""inflections":["cats"]"#));
    }
}
