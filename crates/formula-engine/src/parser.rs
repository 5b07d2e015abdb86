use crate::ast::{BinaryOp, Expr};
use crate::lexer::{tokenize, Spanned, Token};
use crate::FormulaError;

/// Nesting limit for parentheses, unary operators and guards.
const MAX_DEPTH: usize = 64;
/// Operator budget per expression. A flat chain like `1+1+...` builds a
/// left-deep tree one level per operator, so this also bounds tree depth.
const MAX_OPERATORS: usize = 256;

/// Parse formula text into an expression tree.
///
/// Grammar, loosest binding first:
///
/// ```text
/// guard   := or ( '?' guard ':' guard )?
/// or      := and ( '||' and )*
/// and     := cmp ( '&&' cmp )*
/// cmp     := add ( ('==' | '!=' | '<' | '<=' | '>' | '>=') add )*
/// add     := mul ( ('+' | '-') mul )*
/// mul     := unary ( ('*' | '/') unary )*
/// unary   := ('-' | '+' | '!') unary | primary
/// primary := number | 'none' | identifier | '(' guard ')'
/// ```
pub fn parse(src: &str) -> Result<Expr, FormulaError> {
    let toks = tokenize(src)?;
    if toks.is_empty() {
        return Err(FormulaError::Empty);
    }
    let mut parser = Parser::new(toks);
    let expr = parser.parse_guard()?;
    match parser.bump() {
        None => Ok(expr),
        Some((pos, tok)) => Err(unexpected(pos, &tok)),
    }
}

fn unexpected(pos: usize, tok: &Token) -> FormulaError {
    FormulaError::UnexpectedToken {
        found: tok.to_string(),
        pos,
    }
}

struct Parser {
    toks: Vec<Spanned>,
    i: usize,
    depth: usize,
    operators: usize,
}

impl Parser {
    fn new(toks: Vec<Spanned>) -> Self {
        Self {
            toks,
            i: 0,
            depth: 0,
            operators: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.i).map(|(_, t)| t)
    }

    fn bump(&mut self) -> Option<Spanned> {
        let tok = self.toks.get(self.i).cloned();
        if tok.is_some() {
            self.i += 1;
        }
        tok
    }

    fn expect(&mut self, want: Token) -> Result<(), FormulaError> {
        match self.bump() {
            Some((_, tok)) if tok == want => Ok(()),
            Some((pos, tok)) => Err(unexpected(pos, &tok)),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn enter(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep);
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Count one operator node against the budget.
    fn operator(&mut self) -> Result<(), FormulaError> {
        self.operators += 1;
        if self.operators > MAX_OPERATORS {
            return Err(FormulaError::TooComplex);
        }
        Ok(())
    }

    fn parse_guard(&mut self) -> Result<Expr, FormulaError> {
        self.enter()?;
        let cond = self.parse_or()?;
        let expr = if matches!(self.peek(), Some(Token::Question)) {
            self.bump();
            self.operator()?;
            let then = self.parse_guard()?;
            self.expect(Token::Colon)?;
            let otherwise = self.parse_guard()?;
            Expr::Guard {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            }
        } else {
            cond
        };
        self.leave();
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, FormulaError> {
        let mut v = self.parse_and()?;
        while matches!(self.peek(), Some(Token::OrOr)) {
            self.bump();
            self.operator()?;
            let r = self.parse_and()?;
            v = Expr::binary(BinaryOp::Or, v, r);
        }
        Ok(v)
    }

    fn parse_and(&mut self) -> Result<Expr, FormulaError> {
        let mut v = self.parse_cmp()?;
        while matches!(self.peek(), Some(Token::AndAnd)) {
            self.bump();
            self.operator()?;
            let r = self.parse_cmp()?;
            v = Expr::binary(BinaryOp::And, v, r);
        }
        Ok(v)
    }

    fn parse_cmp(&mut self) -> Result<Expr, FormulaError> {
        let mut v = self.parse_add()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.bump();
            self.operator()?;
            let r = self.parse_add()?;
            v = Expr::binary(op, v, r);
        }
        Ok(v)
    }

    fn parse_add(&mut self) -> Result<Expr, FormulaError> {
        let mut v = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            self.operator()?;
            let r = self.parse_mul()?;
            v = Expr::binary(op, v, r);
        }
        Ok(v)
    }

    fn parse_mul(&mut self) -> Result<Expr, FormulaError> {
        let mut v = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.bump();
            self.operator()?;
            let r = self.parse_unary()?;
            v = Expr::binary(op, v, r);
        }
        Ok(v)
    }

    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        let wrap: fn(Expr) -> Expr = match self.peek() {
            Some(Token::Minus) => |e| Expr::Neg(Box::new(e)),
            Some(Token::Bang) => |e| Expr::Not(Box::new(e)),
            Some(Token::Plus) => |e| e,
            _ => return self.parse_primary(),
        };
        self.bump();
        self.operator()?;
        self.enter()?;
        let inner = self.parse_unary()?;
        self.leave();
        Ok(wrap(inner))
    }

    fn parse_primary(&mut self) -> Result<Expr, FormulaError> {
        match self.bump() {
            Some((_, Token::Number(n))) => Ok(Expr::Number(n)),
            Some((_, Token::Ident(id))) if id == "none" => Ok(Expr::Missing),
            Some((_, Token::Ident(id))) => Ok(Expr::Variable(id)),
            Some((_, Token::LParen)) => {
                let inner = self.parse_guard()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some((pos, tok)) => Err(unexpected(pos, &tok)),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::Variable(name.to_string())
    }

    #[test]
    fn test_precedence() {
        let expr = parse("market_cap + debt - cash * 2").unwrap();
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Sub,
                Expr::binary(BinaryOp::Add, var("market_cap"), var("debt")),
                Expr::binary(BinaryOp::Mul, var("cash"), Expr::Number(2.0)),
            )
        );
    }

    #[test]
    fn test_guard_form() {
        let expr = parse("equity_total != 0 ? market_cap / equity_total : none").unwrap();
        assert_eq!(
            expr,
            Expr::Guard {
                cond: Box::new(Expr::binary(BinaryOp::Ne, var("equity_total"), Expr::Number(0.0))),
                then: Box::new(Expr::binary(BinaryOp::Div, var("market_cap"), var("equity_total"))),
                otherwise: Box::new(Expr::Missing),
            }
        );
    }

    #[test]
    fn test_nested_guard_is_right_associative() {
        let expr = parse("a ? 1 : b ? 2 : 3").unwrap();
        match expr {
            Expr::Guard { otherwise, .. } => assert!(matches!(*otherwise, Expr::Guard { .. })),
            other => panic!("expected guard, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_and_parens() {
        assert_eq!(
            parse("-(a + 1)").unwrap(),
            Expr::Neg(Box::new(Expr::binary(BinaryOp::Add, var("a"), Expr::Number(1.0))))
        );
        assert_eq!(parse("+a").unwrap(), var("a"));
        assert_eq!(parse("!a").unwrap(), Expr::Not(Box::new(var("a"))));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse(""), Err(FormulaError::Empty));
        assert_eq!(parse("   "), Err(FormulaError::Empty));
        assert_eq!(parse("a +"), Err(FormulaError::UnexpectedEnd));
        assert_eq!(parse("(a + b"), Err(FormulaError::UnexpectedEnd));
        assert!(matches!(parse("a b"), Err(FormulaError::UnexpectedToken { pos: 2, .. })));
        assert!(matches!(parse("a ? b"), Err(FormulaError::UnexpectedEnd)));
        assert!(matches!(parse("price(1)"), Err(FormulaError::UnexpectedToken { .. })));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(parse(&deep), Err(FormulaError::TooDeep));
        let negs = format!("{}1", "-".repeat(200));
        assert_eq!(parse(&negs), Err(FormulaError::TooDeep));
        assert!(parse("((((1))))").is_ok());
    }

    #[test]
    fn test_operator_budget() {
        let chain = format!("1{}", "+1".repeat(200_000));
        assert_eq!(parse(&chain), Err(FormulaError::TooComplex));
        let products = format!("price{}", " * 2".repeat(MAX_OPERATORS + 1));
        assert_eq!(parse(&products), Err(FormulaError::TooComplex));

        let fits = format!("1{}", "+1".repeat(MAX_OPERATORS));
        assert!(parse(&fits).is_ok());
    }
}
