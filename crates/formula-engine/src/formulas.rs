use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use valuation_core::is_identifier_char;

/// Display name of the distinguished market capitalization indicator.
pub const MARKET_CAP: &str = "Market Cap";
/// Symbol the market cap result is bound under for every later formula.
pub const MARKET_CAP_SYMBOL: &str = "market_cap";

const DEFAULT_FORMULAS: &[(&str, &str)] = &[
    (MARKET_CAP, "price * shares"),
    ("PE", "net_income != 0 ? market_cap / net_income : none"),
    ("PB", "equity_total != 0 ? market_cap / equity_total : none"),
    ("PS", "sales_total != 0 ? market_cap / sales_total : none"),
    ("EV", "market_cap + debt - cash"),
    ("EV/EBITDA", "ebitda != 0 ? ev / ebitda : none"),
    ("EV/FCF", "fcf != 0 ? ev / fcf : none"),
    ("EV/Sales", "sales_total != 0 ? ev / sales_total : none"),
    ("ROE", "equity_total != 0 ? net_income / equity_total : none"),
    ("ROA", "assets != 0 ? net_income / assets : none"),
    ("Dividend Yield", "price != 0 ? div_per_share / price : none"),
];

/// Symbol an indicator's result is bound under: lowercased, `/` and spaces
/// become `_`, parentheses and other non-identifier characters are dropped.
///
/// `"EV/EBITDA"` → `ev_ebitda`, `"Dividend Yield"` → `dividend_yield`.
pub fn indicator_symbol(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            '/' | ' ' => Some('_'),
            c if is_identifier_char(c) => Some(c),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaDefinition {
    pub name: String,
    pub expression: String,
}

/// Indicator name → expression text, kept in insertion order.
///
/// Serializes as a flat JSON object; deserializing anything else is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormulaSet {
    entries: Vec<FormulaDefinition>,
}

impl FormulaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defaults() -> Self {
        Self::from_pairs(DEFAULT_FORMULAS.iter().copied())
    }

    /// Later duplicates replace earlier ones in place.
    pub fn from_pairs<N, E>(pairs: impl IntoIterator<Item = (N, E)>) -> Self
    where
        N: Into<String>,
        E: Into<String>,
    {
        let mut set = Self::new();
        for (name, expression) in pairs {
            set.set(name, expression);
        }
        set
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.expression.as_str())
    }

    /// Replace the expression for `name`, or append a new indicator.
    /// The text is stored verbatim; it is only checked when evaluated.
    pub fn set(&mut self, name: impl Into<String>, expression: impl Into<String>) {
        let name = name.into();
        let expression = expression.into();
        match self.entries.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.expression = expression,
            None => self.entries.push(FormulaDefinition { name, expression }),
        }
    }

    pub fn market_cap(&self) -> Option<&FormulaDefinition> {
        self.entries.iter().find(|f| f.name == MARKET_CAP)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormulaDefinition> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FormulaSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for f in &self.entries {
            map.serialize_entry(&f.name, &f.expression)?;
        }
        map.end()
    }
}

struct FormulaSetVisitor;

impl<'de> Visitor<'de> for FormulaSetVisitor {
    type Value = FormulaSet;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a mapping of indicator name to formula text")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FormulaSet, A::Error> {
        let mut set = FormulaSet::new();
        while let Some((name, expression)) = access.next_entry::<String, String>()? {
            set.set(name, expression);
        }
        Ok(set)
    }
}

impl<'de> Deserialize<'de> for FormulaSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FormulaSetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_symbols() {
        assert_eq!(indicator_symbol(MARKET_CAP), MARKET_CAP_SYMBOL);
        assert_eq!(indicator_symbol("EV/EBITDA"), "ev_ebitda");
        assert_eq!(indicator_symbol("EV"), "ev");
        assert_eq!(indicator_symbol("Dividend Yield"), "dividend_yield");
        assert_eq!(indicator_symbol("Yield (Trailing)"), "yield_trailing");
        assert_eq!(indicator_symbol("P/E-adj%"), "p_eadj");
    }

    #[test]
    fn test_defaults_order() {
        let set = FormulaSet::defaults();
        let names: Vec<&str> = set.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names[0], MARKET_CAP);
        assert_eq!(names.len(), 11);
        assert_eq!(names[4], "EV");
        assert_eq!(set.market_cap().unwrap().expression, "price * shares");
    }

    #[test]
    fn test_set_replaces_in_place_and_appends() {
        let mut set = FormulaSet::defaults();
        set.set("PE", "market_cap / net_income");
        set.set("Payout", "div_total / net_income");
        assert_eq!(set.get("PE"), Some("market_cap / net_income"));
        assert_eq!(set.iter().nth(1).unwrap().name, "PE");
        assert_eq!(set.iter().last().unwrap().name, "Payout");
        assert_eq!(set.len(), 12);
    }

    #[test]
    fn test_json_keeps_order() {
        let json = r#"{"Market Cap": "price * shares", "Zeta": "1", "Alpha": "2"}"#;
        let set: FormulaSet = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = set.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Market Cap", "Zeta", "Alpha"]);

        let back = serde_json::to_string(&set).unwrap();
        assert_eq!(back, r#"{"Market Cap":"price * shares","Zeta":"1","Alpha":"2"}"#);
    }

    #[test]
    fn test_json_rejects_other_shapes() {
        assert!(serde_json::from_str::<FormulaSet>(r#"["price * shares"]"#).is_err());
        assert!(serde_json::from_str::<FormulaSet>(r#"{"PE": 20}"#).is_err());
        assert!(serde_json::from_str::<FormulaSet>(r#"{"PE": {"expr": "x"}}"#).is_err());
        assert!(serde_json::from_str::<FormulaSet>("\"text\"").is_err());
    }
}
