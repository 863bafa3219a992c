//! Three-letter to two-letter language code table.
//!
//! Containers tag tracks with ISO 639-2 codes (`eng`, `dut`) while the
//! subtitle files this tool leaves behind use ISO 639-1 (`en`, `nl`). The
//! table is loaded once from configuration and is read-only afterwards.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Built-in mappings; configuration entries are merged over these.
///
/// Both the bibliographic and terminological ISO 639-2 forms are listed
/// where they differ.
const DEFAULT_CODES: &[(&str, &str)] = &[
    ("ara", "ar"),
    ("bul", "bg"),
    ("chi", "zh"),
    ("zho", "zh"),
    ("cze", "cs"),
    ("ces", "cs"),
    ("dan", "da"),
    ("dut", "nl"),
    ("nld", "nl"),
    ("eng", "en"),
    ("est", "et"),
    ("fin", "fi"),
    ("fre", "fr"),
    ("fra", "fr"),
    ("ger", "de"),
    ("deu", "de"),
    ("gre", "el"),
    ("ell", "el"),
    ("heb", "he"),
    ("hun", "hu"),
    ("ice", "is"),
    ("isl", "is"),
    ("ind", "id"),
    ("ita", "it"),
    ("jpn", "ja"),
    ("kor", "ko"),
    ("lav", "lv"),
    ("lit", "lt"),
    ("nor", "no"),
    ("nob", "nb"),
    ("pol", "pl"),
    ("por", "pt"),
    ("rum", "ro"),
    ("ron", "ro"),
    ("rus", "ru"),
    ("slo", "sk"),
    ("slk", "sk"),
    ("slv", "sl"),
    ("spa", "es"),
    ("srp", "sr"),
    ("swe", "sv"),
    ("tha", "th"),
    ("tur", "tr"),
    ("ukr", "uk"),
    ("vie", "vi"),
];

/// Mapping from 3-letter to 2-letter language codes. Keys are unique and
/// stored lower-case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageCodeMap {
    codes: BTreeMap<String, String>,
}

impl LanguageCodeMap {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        Self {
            codes: DEFAULT_CODES
                .iter()
                .map(|(three, two)| (three.to_string(), two.to_string()))
                .collect(),
        }
    }

    /// Build a table from `(three, two)` pairs, validating every entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a key is not 3 ASCII letters or a
    /// value is not 2 ASCII letters.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = Self::new();
        for (three, two) in pairs {
            map.insert(three.as_ref(), two.as_ref())?;
        }
        Ok(map)
    }

    /// Insert or replace a single mapping.
    pub fn insert(&mut self, three: &str, two: &str) -> Result<()> {
        let three = three.trim().to_ascii_lowercase();
        let two = two.trim().to_ascii_lowercase();
        if three.len() != 3 || !three.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::Validation(format!(
                "language code key '{three}' must be exactly 3 letters"
            )));
        }
        if two.len() != 2 || !two.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::Validation(format!(
                "language code '{three}' maps to '{two}', which is not 2 letters"
            )));
        }
        self.codes.insert(three, two);
        Ok(())
    }

    /// Merge `other` over `self`; entries in `other` win.
    pub fn merged_with(mut self, other: &LanguageCodeMap) -> Self {
        for (three, two) in &other.codes {
            self.codes.insert(three.clone(), two.clone());
        }
        self
    }

    /// Look up the 2-letter code for a 3-letter code.
    pub fn get(&self, three: &str) -> Option<&str> {
        self.codes.get(three).map(String::as_str)
    }

    /// Whether the table has an entry for `three`.
    pub fn contains(&self, three: &str) -> bool {
        self.codes.contains_key(three)
    }

    /// All 3-letter codes mapping to the given 2-letter code.
    pub fn three_letter_codes_for<'a>(&'a self, two: &'a str) -> impl Iterator<Item = &'a str> {
        self.codes
            .iter()
            .filter(move |(_, v)| v.as_str() == two)
            .map(|(k, _)| k.as_str())
    }

    /// Every code (either form) a container track may carry for one of the
    /// `wanted` 2-letter languages.
    pub fn expand_wanted<'a>(&self, wanted: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        for two in wanted {
            set.insert(two.to_string());
            set.extend(self.three_letter_codes_for(two).map(str::to_string));
        }
        set
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Validate every entry, returning all problems found.
    pub fn validate(&self) -> Vec<String> {
        let mut scratch = Self::new();
        self.codes
            .iter()
            .filter_map(|(k, v)| scratch.insert(k, v).err().map(|e| e.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_contains_common_codes() {
        let map = LanguageCodeMap::builtin();
        assert_eq!(map.get("eng"), Some("en"));
        assert_eq!(map.get("dut"), Some("nl"));
        assert_eq!(map.get("nld"), Some("nl"));
        assert_eq!(map.get("xyz"), None);
        assert!(map.validate().is_empty());
    }

    #[test]
    fn from_pairs_lowercases() {
        let map = LanguageCodeMap::from_pairs([("ENG", "EN"), ("dut", "nl")]).unwrap();
        assert_eq!(map.get("eng"), Some("en"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn from_pairs_rejects_bad_entries() {
        assert!(LanguageCodeMap::from_pairs([("en", "en")]).is_err());
        assert!(LanguageCodeMap::from_pairs([("eng", "eng")]).is_err());
        assert!(LanguageCodeMap::from_pairs([("e1g", "en")]).is_err());
    }

    #[test]
    fn merge_prefers_other() {
        let custom = LanguageCodeMap::from_pairs([("nor", "nb")]).unwrap();
        let map = LanguageCodeMap::builtin().merged_with(&custom);
        assert_eq!(map.get("nor"), Some("nb"));
        assert_eq!(map.get("eng"), Some("en"));
    }

    #[test]
    fn expand_wanted_includes_both_forms() {
        let map = LanguageCodeMap::from_pairs([("eng", "en"), ("dut", "nl"), ("nld", "nl")])
            .unwrap();
        let wanted = map.expand_wanted(["en", "nl"]);
        let expected: BTreeSet<String> = ["en", "eng", "nl", "dut", "nld"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(wanted, expected);
    }

    #[test]
    fn deserializes_from_table() {
        let map: LanguageCodeMap = serde_json::from_str(r#"{"eng":"en","dut":"nl"}"#).unwrap();
        assert_eq!(map.get("dut"), Some("nl"));
    }
}
