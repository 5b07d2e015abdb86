use serde::Serialize;
use valuation_core::{FieldRegistry, ParsedInputs, ValuationError, RESERVED_SYMBOLS};

use crate::eval::{evaluate, Namespace};
use crate::formulas::{indicator_symbol, FormulaDefinition, FormulaSet, MARKET_CAP, MARKET_CAP_SYMBOL};
use crate::parser::parse;
use crate::FormulaError;

/// One computed indicator. `value` is `None` when the formula withheld a
/// result or failed; `error` explains a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorResult {
    pub name: String,
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Indicator results in formula order, market cap first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalculationReport {
    pub indicators: Vec<IndicatorResult>,
}

impl CalculationReport {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.indicators
            .iter()
            .find(|r| r.name == name)
            .and_then(|r| r.value)
    }

    pub fn result(&self, name: &str) -> Option<&IndicatorResult> {
        self.indicators.iter().find(|r| r.name == name)
    }

    pub fn errors(&self) -> impl Iterator<Item = &IndicatorResult> {
        self.indicators.iter().filter(|r| r.error.is_some())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

/// Evaluates a [`FormulaSet`] against parsed inputs.
pub struct FormulaEngine;

impl FormulaEngine {
    pub fn new() -> Self {
        Self
    }

    /// Check required fields, then evaluate every formula.
    pub fn calculate(
        &self,
        registry: &FieldRegistry,
        inputs: &ParsedInputs,
        formulas: &FormulaSet,
    ) -> Result<CalculationReport, ValuationError> {
        inputs.ensure_required(registry)?;
        Ok(self.evaluate(inputs, formulas))
    }

    /// Evaluate market cap against the raw inputs, then every other formula
    /// in order. A failing formula only withholds its own result: its symbol
    /// is bound as missing and evaluation continues.
    pub fn evaluate(&self, inputs: &ParsedInputs, formulas: &FormulaSet) -> CalculationReport {
        let mut ns = Namespace::from_inputs(inputs);
        let mut indicators = Vec::with_capacity(formulas.len());

        if let Some(market_cap) = formulas.market_cap() {
            let result = self.run(market_cap, &ns);
            ns.bind(MARKET_CAP_SYMBOL, result.value);
            indicators.push(result);
        } else {
            tracing::debug!("Formula set has no market cap entry");
        }

        for formula in formulas.iter() {
            if formula.name == MARKET_CAP {
                continue;
            }
            let symbol = indicator_symbol(&formula.name);
            if shadows_input(&symbol, inputs) {
                let err = FormulaError::ShadowedSymbol(symbol);
                tracing::debug!("Formula '{}' skipped: {}", formula.name, err);
                indicators.push(IndicatorResult {
                    name: formula.name.clone(),
                    value: None,
                    error: Some(describe(&formula.name, &err)),
                });
                continue;
            }
            let result = self.run(formula, &ns);
            if !symbol.is_empty() {
                ns.bind(symbol, result.value);
            }
            indicators.push(result);
        }

        CalculationReport { indicators }
    }

    fn run(&self, formula: &FormulaDefinition, ns: &Namespace) -> IndicatorResult {
        let outcome = parse(&formula.expression).and_then(|expr| evaluate(&expr, ns));
        match outcome {
            Ok(value) => IndicatorResult {
                name: formula.name.clone(),
                // Overflow to infinity is not a usable ratio.
                value: value.filter(|v| v.is_finite()),
                error: None,
            },
            Err(e) => {
                tracing::debug!("Formula '{}' failed: {}", formula.name, e);
                IndicatorResult {
                    name: formula.name.clone(),
                    value: None,
                    error: Some(describe(&formula.name, &e)),
                }
            }
        }
    }
}

/// An indicator may not rebind `market_cap`, `none` or a raw input.
fn shadows_input(symbol: &str, inputs: &ParsedInputs) -> bool {
    RESERVED_SYMBOLS.contains(&symbol) || inputs.iter().any(|(key, _)| key == symbol)
}

fn describe(name: &str, e: &FormulaError) -> String {
    format!("{}: {}", name, e)
}

impl Default for FormulaEngine {
    fn default() -> Self {
        Self::new()
    }
}
