use formula_engine::{indicator_symbol, CalculationReport, FormulaEngine, FormulaSet, MARKET_CAP};
use valuation_core::{
    FieldDefinition, FieldRegistry, ParsedInputs, RawInputs, ValuationError, RESERVED_SYMBOLS,
};

use crate::{backup, AdminError, AdminSecret, AdminSession};

/// Everything one user's calculator session owns: the field and formula
/// definitions, the raw inputs, and the admin state gating edits.
pub struct CalculatorSession {
    fields: FieldRegistry,
    formulas: FormulaSet,
    inputs: RawInputs,
    admin: AdminSession,
    engine: FormulaEngine,
}

impl CalculatorSession {
    pub fn new() -> Self {
        Self::with_definitions(FieldRegistry::defaults(), FormulaSet::defaults())
    }

    pub fn with_definitions(fields: FieldRegistry, formulas: FormulaSet) -> Self {
        let inputs = RawInputs::for_registry(&fields);
        Self {
            fields,
            formulas,
            inputs,
            admin: AdminSession::new(),
            engine: FormulaEngine::new(),
        }
    }

    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    pub fn formulas(&self) -> &FormulaSet {
        &self.formulas
    }

    pub fn inputs(&self) -> &RawInputs {
        &self.inputs
    }

    pub fn admin(&self) -> &AdminSession {
        &self.admin
    }

    // Calculator

    /// Store raw text for a field. Returns `false` for keys not in the registry.
    pub fn set_input(&mut self, key: &str, raw: impl Into<String>) -> bool {
        if !self.fields.contains(key) {
            return false;
        }
        self.inputs.set(key, raw);
        true
    }

    pub fn clear_inputs(&mut self) {
        self.inputs.clear();
    }

    pub fn parsed_inputs(&self) -> ParsedInputs {
        self.inputs.parse(&self.fields)
    }

    pub fn calculate(&self) -> Result<CalculationReport, ValuationError> {
        self.engine
            .calculate(&self.fields, &self.parsed_inputs(), &self.formulas)
    }

    // Administration

    pub fn login(&mut self, attempt: &str, secret: Option<&AdminSecret>) -> Result<(), AdminError> {
        self.admin.login(attempt, secret)
    }

    pub fn logout(&mut self) {
        self.admin.logout();
    }

    pub fn view_fields(&self) -> Result<&FieldRegistry, AdminError> {
        self.admin.require_authenticated()?;
        Ok(&self.fields)
    }

    pub fn view_formulas(&self) -> Result<&FormulaSet, AdminError> {
        self.admin.require_authenticated()?;
        Ok(&self.formulas)
    }

    /// Serialize the field list. Counts as the backup that unlocks editing.
    pub fn export_fields(&mut self) -> Result<Vec<u8>, AdminError> {
        self.admin.require_authenticated()?;
        let bytes = backup::export_fields(&self.fields)?;
        self.admin.confirm_backup()?;
        Ok(bytes)
    }

    /// Serialize the formula set. Counts as the backup that unlocks editing.
    pub fn export_formulas(&mut self) -> Result<Vec<u8>, AdminError> {
        self.admin.require_authenticated()?;
        let bytes = backup::export_formulas(&self.formulas)?;
        self.admin.confirm_backup()?;
        Ok(bytes)
    }

    pub fn add_field(&mut self, field: FieldDefinition) -> Result<(), AdminError> {
        self.admin.require_ready()?;
        let key = field.key.clone();
        self.fields.add(field)?;
        self.inputs.seed(&key);
        tracing::info!("Field '{}' added", key);
        Ok(())
    }

    /// Remove a field and its input. Returns whether the key existed.
    pub fn delete_field(&mut self, key: &str) -> Result<bool, AdminError> {
        self.admin.require_ready()?;
        let removed = self.fields.remove(key).is_some();
        self.inputs.remove(key);
        if removed {
            tracing::info!("Field '{}' deleted", key);
        }
        Ok(removed)
    }

    /// Replace the field list from an uploaded backup. Allowed as soon as the
    /// admin is logged in; the current registry is untouched on error.
    pub fn restore_fields(&mut self, bytes: &[u8]) -> Result<(), AdminError> {
        self.admin.require_authenticated()?;
        let fields = backup::parse_fields(bytes)?;
        self.inputs.sync_with(&fields);
        self.fields = fields;
        tracing::info!("Field list restored ({} fields)", self.fields.len());
        Ok(())
    }

    /// Replace the formula set from an uploaded backup. Ends the edit episode.
    pub fn restore_formulas(&mut self, bytes: &[u8]) -> Result<(), AdminError> {
        self.admin.require_ready()?;
        let formulas = backup::parse_formulas(bytes)?;
        for formula in formulas.iter() {
            self.check_indicator(&formula.name)?;
        }
        self.formulas = formulas;
        tracing::info!("Formula set restored ({} formulas)", self.formulas.len());
        self.warn_without_market_cap();
        self.admin.finish_episode();
        Ok(())
    }

    /// Apply formula edits together and end the edit episode. Expressions
    /// are stored verbatim; a new indicator name is appended.
    pub fn save_formulas<N, E>(&mut self, edits: impl IntoIterator<Item = (N, E)>) -> Result<(), AdminError>
    where
        N: Into<String>,
        E: Into<String>,
    {
        self.admin.require_ready()?;
        let edits: Vec<(String, String)> = edits
            .into_iter()
            .map(|(n, e)| (n.into(), e.into()))
            .collect();
        if edits.iter().any(|(name, _)| name.trim().is_empty()) {
            return Err(AdminError::InvalidIndicator(
                "indicator name must not be empty".to_string(),
            ));
        }
        for (name, _) in &edits {
            self.check_indicator(name)?;
        }

        for (name, expression) in edits {
            tracing::info!("Formula '{}' set to '{}'", name, expression);
            self.formulas.set(name, expression);
        }
        self.admin.finish_episode();
        Ok(())
    }

    /// Reject indicator names whose symbol would rebind `market_cap`, `none`
    /// or a field key.
    fn check_indicator(&self, name: &str) -> Result<(), AdminError> {
        if name == MARKET_CAP {
            return Ok(());
        }
        let symbol = indicator_symbol(name);
        if RESERVED_SYMBOLS.contains(&symbol.as_str()) || self.fields.contains(&symbol) {
            return Err(AdminError::InvalidIndicator(format!(
                "'{}' would shadow the symbol '{}'",
                name, symbol
            )));
        }
        Ok(())
    }

    fn warn_without_market_cap(&self) {
        if self.formulas.market_cap().is_none() {
            tracing::warn!(
                "Formula set has no '{}' entry; formulas using market_cap will fail",
                MARKET_CAP
            );
        }
    }
}

impl Default for CalculatorSession {
    fn default() -> Self {
        Self::new()
    }
}
