use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{FieldRegistry, ValuationError};

const THOUSANDS_SEPARATORS: &[char] = &[',', '\u{FF0C}'];

/// Parse a free-text figure such as `" 1,000,000 "`.
///
/// Whitespace and thousands separators are ignored. Anything that does not
/// parse to a finite number is treated as "not supplied" and yields `None`.
pub fn parse_input(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !THOUSANDS_SEPARATORS.contains(c))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Raw text the user typed, per field key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInputs {
    values: HashMap<String, String>,
}

impl RawInputs {
    /// One empty entry per registry key.
    pub fn for_registry(registry: &FieldRegistry) -> Self {
        Self {
            values: registry.keys().map(|k| (k.to_string(), String::new())).collect(),
        }
    }

    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Add an empty entry for `key` unless one exists.
    pub fn seed(&mut self, key: &str) {
        self.values.entry(key.to_string()).or_default();
    }

    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    /// Drop entries whose key left the registry and seed any new keys.
    pub fn sync_with(&mut self, registry: &FieldRegistry) {
        self.values.retain(|key, _| registry.contains(key));
        for key in registry.keys() {
            self.seed(key);
        }
    }

    /// Blank every entry.
    pub fn clear(&mut self) {
        self.values.values_mut().for_each(String::clear);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse every registry field, in registry order.
    pub fn parse(&self, registry: &FieldRegistry) -> ParsedInputs {
        ParsedInputs {
            values: registry
                .keys()
                .map(|key| (key.to_string(), parse_input(self.get(key))))
                .collect(),
        }
    }
}

/// Parsed figures in registry order. `None` marks a value that was not supplied.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedInputs {
    values: Vec<(String, Option<f64>)>,
}

impl ParsedInputs {
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Option<f64>)>) -> Self {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Display names of required fields that have no value, in registry order.
    pub fn missing_required(&self, registry: &FieldRegistry) -> Vec<String> {
        registry
            .iter()
            .filter(|f| f.required && self.get(&f.key).is_none())
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn ensure_required(&self, registry: &FieldRegistry) -> Result<(), ValuationError> {
        let missing = self.missing_required(registry);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValuationError::MissingInputs(missing))
        }
    }
}
