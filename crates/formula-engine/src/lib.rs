//! Restricted arithmetic formulas over named financial inputs.
//!
//! Formulas are parsed into an [`Expr`] tree and evaluated against an explicit
//! [`Namespace`]. There is no other name resolution: an identifier is either a
//! bound variable or an error.

pub mod ast;
pub mod engine;
pub mod error;
pub mod eval;
pub mod formulas;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Expr};
pub use engine::{CalculationReport, FormulaEngine, IndicatorResult};
pub use error::FormulaError;
pub use eval::{evaluate, Namespace};
pub use formulas::{indicator_symbol, FormulaDefinition, FormulaSet, MARKET_CAP, MARKET_CAP_SYMBOL};
pub use parser::parse;
