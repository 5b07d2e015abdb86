use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use valuation_core::{is_identifier_char, is_identifier_start};

use crate::FormulaError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Question,
    Colon,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    Bang,
    AndAnd,
    OrOr,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {}", n),
            Token::Ident(id) => write!(f, "identifier '{}'", id),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Question => write!(f, "'?'"),
            Token::Colon => write!(f, "':'"),
            Token::Lt => write!(f, "'<'"),
            Token::Le => write!(f, "'<='"),
            Token::Gt => write!(f, "'>'"),
            Token::Ge => write!(f, "'>='"),
            Token::EqEq => write!(f, "'=='"),
            Token::NotEq => write!(f, "'!='"),
            Token::Bang => write!(f, "'!'"),
            Token::AndAnd => write!(f, "'&&'"),
            Token::OrOr => write!(f, "'||'"),
        }
    }
}

/// A token and the byte offset it starts at.
pub type Spanned = (usize, Token);

pub fn tokenize(src: &str) -> Result<Vec<Spanned>, FormulaError> {
    let mut it = src.char_indices().peekable();
    let mut out = Vec::new();

    while let Some(&(pos, c)) = it.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                it.next();
                continue;
            }
            '+' => single(&mut it, Token::Plus),
            '-' => single(&mut it, Token::Minus),
            '*' => single(&mut it, Token::Star),
            '/' => single(&mut it, Token::Slash),
            '(' => single(&mut it, Token::LParen),
            ')' => single(&mut it, Token::RParen),
            '?' => single(&mut it, Token::Question),
            ':' => single(&mut it, Token::Colon),
            '<' => with_eq(&mut it, Token::Lt, Token::Le),
            '>' => with_eq(&mut it, Token::Gt, Token::Ge),
            '!' => with_eq(&mut it, Token::Bang, Token::NotEq),
            '=' => pair(&mut it, '=', Token::EqEq).ok_or(FormulaError::UnexpectedChar { ch: c, pos })?,
            '&' => pair(&mut it, '&', Token::AndAnd).ok_or(FormulaError::UnexpectedChar { ch: c, pos })?,
            '|' => pair(&mut it, '|', Token::OrOr).ok_or(FormulaError::UnexpectedChar { ch: c, pos })?,
            c if c.is_ascii_digit() || c == '.' => number(&mut it)?,
            c if is_identifier_start(c) => {
                let mut id = String::new();
                while let Some(&(_, d)) = it.peek() {
                    if !is_identifier_char(d) {
                        break;
                    }
                    id.push(d);
                    it.next();
                }
                Token::Ident(id)
            }
            other => return Err(FormulaError::UnexpectedChar { ch: other, pos }),
        };
        out.push((pos, token));
    }

    Ok(out)
}

fn single(it: &mut Peekable<CharIndices<'_>>, token: Token) -> Token {
    it.next();
    token
}

fn with_eq(it: &mut Peekable<CharIndices<'_>>, bare: Token, eq: Token) -> Token {
    it.next();
    if matches!(it.peek(), Some((_, '='))) {
        it.next();
        eq
    } else {
        bare
    }
}

/// Two-character operator whose characters must both be present.
fn pair(it: &mut Peekable<CharIndices<'_>>, second: char, token: Token) -> Option<Token> {
    it.next();
    match it.peek() {
        Some(&(_, c)) if c == second => {
            it.next();
            Some(token)
        }
        _ => None,
    }
}

fn number(it: &mut Peekable<CharIndices<'_>>) -> Result<Token, FormulaError> {
    let mut text = String::new();
    while let Some(&(_, d)) = it.peek() {
        if d.is_ascii_digit() || d == '.' {
            text.push(d);
            it.next();
        } else {
            break;
        }
    }

    // Exponent: only consumed when digits actually follow.
    if let Some(&(_, e)) = it.peek() {
        if e == 'e' || e == 'E' {
            let mut ahead = it.clone();
            ahead.next();
            let mut suffix = String::from(e);
            if let Some(&(_, sign)) = ahead.peek() {
                if sign == '+' || sign == '-' {
                    suffix.push(sign);
                    ahead.next();
                }
            }
            if matches!(ahead.peek(), Some((_, d)) if d.is_ascii_digit()) {
                while let Some(&(_, d)) = ahead.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    suffix.push(d);
                    ahead.next();
                }
                text.push_str(&suffix);
                *it = ahead;
            }
        }
    }

    text.parse::<f64>()
        .map(Token::Number)
        .map_err(|_| FormulaError::InvalidNumber(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|(_, t)| t).collect()
    }

    #[test]
    fn test_guard_expression_tokens() {
        assert_eq!(
            kinds("net_income != 0 ? market_cap / net_income : none"),
            vec![
                Token::Ident("net_income".into()),
                Token::NotEq,
                Token::Number(0.0),
                Token::Question,
                Token::Ident("market_cap".into()),
                Token::Slash,
                Token::Ident("net_income".into()),
                Token::Colon,
                Token::Ident("none".into()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("1.5e3"), vec![Token::Number(1500.0)]);
        assert_eq!(kinds(".25"), vec![Token::Number(0.25)]);
        assert_eq!(kinds("2E-2"), vec![Token::Number(0.02)]);
        assert!(matches!(tokenize("1.2.3"), Err(FormulaError::InvalidNumber(_))));
    }

    #[test]
    fn test_exponent_without_digits_is_identifier() {
        assert_eq!(
            kinds("2e"),
            vec![Token::Number(2.0), Token::Ident("e".into())]
        );
    }

    #[test]
    fn test_rejects_foreign_syntax() {
        assert_eq!(
            tokenize("price = 1"),
            Err(FormulaError::UnexpectedChar { ch: '=', pos: 6 })
        );
        assert!(matches!(
            tokenize("__import__('os')"),
            Err(FormulaError::UnexpectedChar { ch: '\'', .. })
        ));
        assert!(matches!(tokenize("a[0]"), Err(FormulaError::UnexpectedChar { ch: '[', .. })));
        assert!(matches!(tokenize("a & b"), Err(FormulaError::UnexpectedChar { ch: '&', .. })));
    }
}
