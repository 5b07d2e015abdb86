//! JSON backup files for the field list and the formula set.
//!
//! Restores are all-or-nothing: the uploaded bytes are fully parsed and
//! validated before the caller replaces anything.

use formula_engine::FormulaSet;
use serde::Deserialize;
use valuation_core::{FieldDefinition, FieldRegistry};

use crate::AdminError;

/// One entry of an uploaded field list. `required` may be omitted.
#[derive(Deserialize)]
struct FieldRecord {
    name: String,
    key: String,
    #[serde(default)]
    required: bool,
}

pub fn export_fields(registry: &FieldRegistry) -> Result<Vec<u8>, AdminError> {
    serde_json::to_vec_pretty(registry).map_err(|e| AdminError::Export(e.to_string()))
}

pub fn export_formulas(formulas: &FormulaSet) -> Result<Vec<u8>, AdminError> {
    serde_json::to_vec_pretty(formulas).map_err(|e| AdminError::Export(e.to_string()))
}

pub fn parse_fields(bytes: &[u8]) -> Result<FieldRegistry, AdminError> {
    let records: Vec<FieldRecord> = serde_json::from_slice(bytes).map_err(|e| {
        AdminError::InvalidFormat(format!(
            "expected a list of objects with \"name\" and \"key\" ({})",
            e
        ))
    })?;

    let fields = records
        .into_iter()
        .map(|r| FieldDefinition::new(r.name, r.key, r.required))
        .collect();

    FieldRegistry::new(fields).map_err(|e| AdminError::InvalidFormat(e.to_string()))
}

pub fn parse_formulas(bytes: &[u8]) -> Result<FormulaSet, AdminError> {
    serde_json::from_slice(bytes).map_err(|e| {
        AdminError::InvalidFormat(format!(
            "expected a mapping of indicator name to formula text ({})",
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_survive_export_and_restore() {
        let mut registry = FieldRegistry::defaults();
        registry
            .add(FieldDefinition::new("Capex", "capex", true))
            .unwrap();

        let bytes = export_fields(&registry).unwrap();
        assert_eq!(parse_fields(&bytes).unwrap(), registry);
    }

    #[test]
    fn test_formulas_survive_export_and_restore() {
        let mut formulas = FormulaSet::defaults();
        formulas.set("Payout", "div_total / net_income");

        let bytes = export_formulas(&formulas).unwrap();
        assert_eq!(parse_formulas(&bytes).unwrap(), formulas);
    }

    #[test]
    fn test_field_file_shape() {
        let ok = br#"[{"name": "Price", "key": "price", "required": true}, {"name": "Cash", "key": "cash"}]"#;
        let registry = parse_fields(ok).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("price").unwrap().required);
        assert!(!registry.get("cash").unwrap().required);

        let bad_files: [&[u8]; 8] = [
            br#"["price", "shares"]"#,
            br#"{"price": "Price"}"#,
            br#"[{"name": "Price"}]"#,
            br#"[{"key": "price"}]"#,
            br#"[{"name": "Price", "key": "price", "required": "yes"}]"#,
            br#"[{"name": "A", "key": "x"}, {"name": "B", "key": "x"}]"#,
            br#"[{"name": "A", "key": "bad key"}]"#,
            b"not json",
        ];
        for bad in bad_files {
            assert!(
                matches!(parse_fields(bad), Err(AdminError::InvalidFormat(_))),
                "accepted {}",
                String::from_utf8_lossy(bad)
            );
        }
    }

    #[test]
    fn test_formula_file_shape() {
        assert!(matches!(
            parse_formulas(br#"[["PE", "x"]]"#),
            Err(AdminError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_formulas(br#"{"PE": 1}"#),
            Err(AdminError::InvalidFormat(_))
        ));
        let set = parse_formulas(br#"{"Market Cap": "price * shares"}"#).unwrap();
        assert_eq!(set.len(), 1);
    }
}
