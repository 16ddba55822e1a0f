//! Measure key and display label derivation.
//!
//! Measure labels in the PLACES extracts are long CDC descriptions. Each one
//! is mapped to a filesystem-safe `MeasureKey` that names its derived
//! artifacts, and to a short display label built from a health-term
//! vocabulary. Keys are truncated, so distinct labels can collide; the
//! `MeasureKeyRegistry` sees every label in a build and refuses collisions.

use crate::config::ShortLabelConfig;
use crate::constants::SHORT_LABEL_SEPARATOR;
use crate::error::{PlacesError, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, warn};

static DISALLOWED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("disallowed-char pattern is a valid regex"));

static SEPARATOR_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("separator pattern is a valid regex"));

/// Storage key derived from a measure label
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeasureKey(String);

impl MeasureKey {
    /// Derive the key for a label, truncated to `max_length` characters
    pub fn derive(label: &str, max_length: usize) -> Self {
        let stripped = DISALLOWED_CHARS.replace_all(label.trim(), "");
        let joined = SEPARATOR_RUNS.replace_all(&stripped, "_");
        Self(joined.chars().take(max_length).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// File name for this key with the storage suffix appended
    pub fn file_name(&self, suffix: &str) -> String {
        format!("{}{}", self.0, suffix)
    }
}

impl fmt::Display for MeasureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full-label to key registry for one build.
///
/// A key owned by two different labels is poisoned: neither label may write
/// artifacts under it.
#[derive(Debug, Clone)]
pub struct MeasureKeyRegistry {
    max_length: usize,
    owners: BTreeMap<MeasureKey, String>,
    labels: BTreeMap<String, MeasureKey>,
    collided: BTreeSet<MeasureKey>,
}

impl MeasureKeyRegistry {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            owners: BTreeMap::new(),
            labels: BTreeMap::new(),
            collided: BTreeSet::new(),
        }
    }

    /// Register a label and return its key.
    ///
    /// Registering the same label again returns the same key. A label whose
    /// key is already owned by a different label fails with `KeyCollision`.
    pub fn register(&mut self, label: &str) -> Result<MeasureKey> {
        let label = label.trim();
        if let Some(key) = self.labels.get(label) {
            return Ok(key.clone());
        }

        let key = MeasureKey::derive(label, self.max_length);
        if key.is_empty() {
            return Err(PlacesError::BuildFailed {
                label: label.to_string(),
                reason: "label yields an empty measure key".to_string(),
            });
        }

        match self.owners.get(&key) {
            Some(existing) => {
                warn!(
                    "Measure key collision on '{}': '{}' vs '{}'",
                    key, existing, label
                );
                self.collided.insert(key.clone());
                Err(PlacesError::KeyCollision {
                    key: key.to_string(),
                    existing: existing.clone(),
                    incoming: label.to_string(),
                })
            }
            None => {
                debug!("Registered measure key '{}' for '{}'", key, label);
                self.owners.insert(key.clone(), label.to_string());
                self.labels.insert(label.to_string(), key.clone());
                Ok(key)
            }
        }
    }

    /// Whether a key was claimed by more than one label
    pub fn is_collided(&self, key: &MeasureKey) -> bool {
        self.collided.contains(key)
    }

    /// Labels whose keys are unique within this build, in label order
    pub fn assignments(&self) -> impl Iterator<Item = (&str, &MeasureKey)> {
        self.labels
            .iter()
            .filter(|(_, key)| !self.collided.contains(*key))
            .map(|(label, key)| (label.as_str(), key))
    }

    /// Label that first claimed a key
    pub fn owner(&self, key: &MeasureKey) -> Option<&str> {
        self.owners.get(key).map(String::as_str)
    }
}

/// Derive a short display label from a measure label.
///
/// Vocabulary terms found in the label are title-cased and joined; failing
/// that, the leading words are used; failing that, the label is truncated.
pub fn short_label(label: &str, config: &ShortLabelConfig) -> String {
    let lowered = label.to_lowercase();

    let mut terms: Vec<String> = config
        .condition_terms
        .iter()
        .chain(config.action_terms.iter())
        .filter(|term| lowered.contains(&term.to_lowercase()))
        .map(|term| title_case(term))
        .collect();

    if terms.is_empty() {
        terms = label
            .split_whitespace()
            .take(config.fallback_words)
            .filter(|word| word.chars().count() >= config.min_word_length)
            .map(title_case)
            .collect();
    }

    if terms.is_empty() {
        label.chars().take(config.fallback_length).collect()
    } else {
        terms.truncate(config.max_terms);
        terms.join(SHORT_LABEL_SEPARATOR)
    }
}

/// Title-case each run of letters: first letter upper, the rest lower
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for c in text.chars() {
        if previous_is_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        previous_is_letter = c.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASTHMA: &str = "Current asthma among adults aged >=18 years";

    #[test]
    fn test_derive_key_strips_and_joins() {
        let key = MeasureKey::derive(ASTHMA, 50);
        assert_eq!(key.as_str(), "Current_asthma_among_adults_aged_18_years");
        assert_eq!(
            key.file_name(".csv"),
            "Current_asthma_among_adults_aged_18_years.csv"
        );
    }

    #[test]
    fn test_derive_key_collapses_hyphen_and_space_runs() {
        let key = MeasureKey::derive("  Fair - or poor   self-rated health ", 50);
        assert_eq!(key.as_str(), "Fair_or_poor_self_rated_health");
    }

    #[test]
    fn test_derive_key_truncates() {
        let label = "Visits to doctor for routine checkup within the past year among adults aged >=18 years";
        let key = MeasureKey::derive(label, 50);
        assert_eq!(key.as_str().chars().count(), 50);
        assert_eq!(
            key.as_str(),
            "Visits_to_doctor_for_routine_checkup_within_the_pa"
        );
    }

    #[test]
    fn test_derive_key_is_idempotent() {
        for label in [ASTHMA, "Obesity among adults aged >=18 years", "a/b\\c"] {
            assert_eq!(MeasureKey::derive(label, 50), MeasureKey::derive(label, 50));
        }
    }

    #[test]
    fn test_registry_returns_same_key_for_repeat_label() {
        let mut registry = MeasureKeyRegistry::new(50);
        let first = registry.register(ASTHMA).unwrap();
        let second = registry.register(ASTHMA).unwrap();
        assert_eq!(first, second);
        assert!(!registry.is_collided(&first));
        assert_eq!(registry.assignments().count(), 1);
    }

    #[test]
    fn test_registry_detects_truncation_collision() {
        let prefix = "Cancer (excluding skin cancer) among adults aged >=18 years";
        let a = format!("{} in urban areas", prefix);
        let b = format!("{} in rural areas", prefix);

        let mut registry = MeasureKeyRegistry::new(50);
        let key = registry.register(&a).unwrap();
        let err = registry.register(&b).unwrap_err();

        match err {
            PlacesError::KeyCollision {
                key: collided,
                existing,
                incoming,
            } => {
                assert_eq!(collided, key.as_str());
                assert_eq!(existing, a);
                assert_eq!(incoming, b);
            }
            other => panic!("expected KeyCollision, got {:?}", other),
        }

        assert!(registry.is_collided(&key));
        assert_eq!(registry.assignments().count(), 0);
        assert_eq!(registry.owner(&key), Some(a.as_str()));
    }

    #[test]
    fn test_registry_rejects_empty_key() {
        let mut registry = MeasureKeyRegistry::new(50);
        assert!(matches!(
            registry.register("%%%"),
            Err(PlacesError::BuildFailed { .. })
        ));
    }

    #[test]
    fn test_short_label_uses_vocabulary() {
        let config = ShortLabelConfig::default();
        assert_eq!(short_label(ASTHMA, &config), "Asthma");
        assert_eq!(
            short_label(
                "Taking medicine for high blood pressure control among adults aged >=18 years with high blood pressure",
                &config
            ),
            "High Blood Pressure - Control"
        );
        assert_eq!(
            short_label(
                "Visits to doctor for routine checkup within the past year among adults aged >=18 years",
                &config
            ),
            "Checkup - Visit"
        );
    }

    #[test]
    fn test_short_label_caps_term_count() {
        let config = ShortLabelConfig::default();
        let label = "Asthma, diabetes, cancer and obesity screening";
        assert_eq!(short_label(label, &config), "Asthma - Diabetes - Cancer");
    }

    #[test]
    fn test_short_label_falls_back_to_leading_words() {
        let config = ShortLabelConfig::default();
        assert_eq!(
            short_label(
                "Mental health not good for >=14 days among adults aged >=18 years",
                &config
            ),
            "Mental - Health - Not"
        );
        assert_eq!(short_label("All teeth lost", &config), "All - Teeth - Lost");
    }

    #[test]
    fn test_short_label_falls_back_to_truncation() {
        let config = ShortLabelConfig::default();
        assert_eq!(short_label("a b", &config), "a b");
        let long = "ab ".repeat(30);
        let label = short_label(&long, &config);
        assert_eq!(label.chars().count(), 50);
        assert!(long.starts_with(&label));
    }

    #[test]
    fn test_title_case_matches_word_boundaries() {
        assert_eq!(title_case("high blood pressure"), "High Blood Pressure");
        assert_eq!(title_case("COPD"), "Copd");
        assert_eq!(title_case("self-rated"), "Self-Rated");
    }
}
