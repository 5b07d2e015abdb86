use serde::{Deserialize, Serialize};

use crate::ValuationError;

/// Symbols bound by the formula evaluator itself. Field keys may not shadow them.
pub const RESERVED_SYMBOLS: &[&str] = &["market_cap", "none"];

/// Built-in input fields: (display name, key, required)
const DEFAULT_FIELDS: &[(&str, &str, bool)] = &[
    ("Price", "price", true),
    ("Shares Outstanding", "shares", true),
    ("Book Value per Share", "bvps", false),
    ("Sales per Share", "sales_per_share", false),
    ("EPS", "eps", false),
    ("Net Income", "net_income", true),
    ("Total Sales", "sales_total", true),
    ("Total Equity", "equity_total", true),
    ("Cash & Equivalents", "cash", false),
    ("Interest-bearing Debt", "debt", false),
    ("EBITDA", "ebitda", false),
    ("FCF", "fcf", false),
    ("Total Assets", "assets", false),
    ("Dividend per Share", "div_per_share", false),
    ("Total Dividends", "div_total", false),
];

pub fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when `s` can be referenced as a variable inside a formula.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if is_identifier_start(first) => chars.all(is_identifier_char),
        _ => false,
    }
}

/// A raw financial input: display label plus the key formulas refer to it by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub required: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, key: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            required,
        }
    }

    fn validate(&self) -> Result<(), ValuationError> {
        if self.name.trim().is_empty() {
            return Err(ValuationError::InvalidField(
                "field name must not be empty".to_string(),
            ));
        }
        if self.key.is_empty() {
            return Err(ValuationError::InvalidField(
                "field key must not be empty".to_string(),
            ));
        }
        if !is_identifier(&self.key) {
            return Err(ValuationError::InvalidField(format!(
                "'{}' is not a valid identifier",
                self.key
            )));
        }
        if RESERVED_SYMBOLS.contains(&self.key.as_str()) {
            return Err(ValuationError::InvalidField(format!(
                "'{}' is a reserved symbol",
                self.key
            )));
        }
        Ok(())
    }
}

/// Ordered list of input fields. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldRegistry {
    fields: Vec<FieldDefinition>,
}

impl FieldRegistry {
    /// Build a registry, rejecting invalid or duplicate keys.
    pub fn new(fields: Vec<FieldDefinition>) -> Result<Self, ValuationError> {
        let mut registry = Self::default();
        for field in fields {
            registry.add(field)?;
        }
        Ok(registry)
    }

    pub fn defaults() -> Self {
        Self {
            fields: DEFAULT_FIELDS
                .iter()
                .map(|(name, key, required)| FieldDefinition::new(*name, *key, *required))
                .collect(),
        }
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Append a field. Fails without changing the registry if the field is
    /// invalid or its key is already taken.
    pub fn add(&mut self, field: FieldDefinition) -> Result<(), ValuationError> {
        field.validate()?;
        if self.contains(&field.key) {
            return Err(ValuationError::DuplicateField(field.key));
        }
        self.fields.push(field);
        Ok(())
    }

    /// Remove a field by key. Absent keys are a no-op.
    pub fn remove(&mut self, key: &str) -> Option<FieldDefinition> {
        let index = self.fields.iter().position(|f| f.key == key)?;
        Some(self.fields.remove(index))
    }
}
