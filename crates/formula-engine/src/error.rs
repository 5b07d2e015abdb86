use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected {found} at position {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("expression nested too deeply")]
    TooDeep,

    #[error("expression has too many operators")]
    TooComplex,

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("indicator symbol '{0}' is already bound")]
    ShadowedSymbol(String),
}
