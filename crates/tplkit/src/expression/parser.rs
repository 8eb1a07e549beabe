//! Precedence-climbing parser for expressions.
//!
//! ```text
//! or       := and ('||' and)*
//! and      := equality ('&&' equality)*
//! equality := compare (('==' | '!=') compare)*
//! compare  := additive (('<' | '<=' | '>' | '>=') additive)*
//! additive := mult (('+' | '-') mult)*
//! mult     := unary (('*' | '/' | '%') unary)*
//! unary    := ('!' | '-') unary | primary
//! primary  := literal | path | '[' list? ']' | '(' or ')'
//! ```

use super::lexer::{Token, TokenKind};
use super::{BinaryOp, Expr, SyntaxError, UnaryOp};
use crate::value::Value;

/// Depth bound of the expression tree: parentheses, array literals, unary
/// chains and binary operator chains all count.
const MAX_NESTING: usize = 128;

pub(crate) fn parse(tokens: Vec<Token>) -> Result<Expr, SyntaxError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        nesting: 0,
    };
    if parser.current() == &TokenKind::Eof {
        return Err(SyntaxError::new(0, "empty expression"));
    }
    let expr = parser.parse_or()?;
    match parser.current() {
        TokenKind::Eof => Ok(expr),
        other => Err(SyntaxError::new(
            parser.position(),
            format!("unexpected {} after end of expression", describe(other)),
        )),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
}

impl Parser {
    fn current(&self) -> &TokenKind {
        // tokenize always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn position(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].position
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn expect(&mut self, expected: TokenKind) -> Result<(), SyntaxError> {
        if self.current() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(SyntaxError::new(
                self.position(),
                format!(
                    "expected {}, found {}",
                    describe(&expected),
                    describe(self.current())
                ),
            ))
        }
    }

    fn enter(&mut self) -> Result<(), SyntaxError> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(SyntaxError::new(self.position(), "expression is nested too deeply"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting -= 1;
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, SyntaxError>,
        operator: fn(&TokenKind) -> Option<BinaryOp>,
    ) -> Result<Expr, SyntaxError> {
        let mut left = next(self)?;
        let nesting = self.nesting;
        while let Some(op) = operator(self.current()) {
            // each operator deepens the left-leaning tree by one level
            self.enter()?;
            self.advance();
            let right = next(self)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.nesting = nesting;
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(Self::parse_and, |t| {
            matches!(t, TokenKind::OrOr).then_some(BinaryOp::Or)
        })
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(Self::parse_equality, |t| {
            matches!(t, TokenKind::AndAnd).then_some(BinaryOp::And)
        })
    }

    fn parse_equality(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(Self::parse_compare, |t| match t {
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::NotEq => Some(BinaryOp::Ne),
            _ => None,
        })
    }

    fn parse_compare(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(Self::parse_additive, |t| match t {
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Le => Some(BinaryOp::Le),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Ge => Some(BinaryOp::Ge),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(Self::parse_multiplicative, |t| match t {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(Self::parse_unary, |t| match t {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.current() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_primary(),
        };
        self.advance();
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let position = self.position();
        match self.advance() {
            TokenKind::Integer(n) => Ok(Expr::Literal(Value::Integer(n))),
            TokenKind::Float(x) => Ok(Expr::Literal(Value::Float(x))),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::String(s))),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::Null => Ok(Expr::Literal(Value::Null)),
            TokenKind::Ident(name) => self.parse_path(name),
            TokenKind::LParen => {
                self.enter()?;
                let inner = self.parse_or();
                self.leave();
                let inner = inner?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.enter()?;
                let items = self.parse_list();
                self.leave();
                Ok(Expr::Array(items?))
            }
            other => Err(SyntaxError::new(
                position,
                format!("expected an operand, found {}", describe(&other)),
            )),
        }
    }

    fn parse_path(&mut self, first: String) -> Result<Expr, SyntaxError> {
        let mut segments = vec![first];
        while self.current() == &TokenKind::Dot {
            self.advance();
            let position = self.position();
            match self.advance() {
                TokenKind::Ident(name) => segments.push(name),
                other => {
                    return Err(SyntaxError::new(
                        position,
                        format!("expected a property name after '.', found {}", describe(&other)),
                    ))
                }
            }
        }
        Ok(Expr::Variable(segments))
    }

    fn parse_list(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut items = Vec::new();
        if self.current() == &TokenKind::RBracket {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.parse_or()?);
            match self.current() {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RBracket => {
                    self.advance();
                    return Ok(items);
                }
                other => {
                    return Err(SyntaxError::new(
                        self.position(),
                        format!("expected ',' or ']', found {}", describe(other)),
                    ))
                }
            }
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Integer(n) => format!("number {n}"),
        TokenKind::Float(x) => format!("number {x}"),
        TokenKind::Str(s) => format!("string '{s}'"),
        TokenKind::Ident(name) => format!("identifier '{name}'"),
        TokenKind::True => "'true'".to_string(),
        TokenKind::False => "'false'".to_string(),
        TokenKind::Null => "'null'".to_string(),
        TokenKind::Eof => "end of expression".to_string(),
        other => format!("'{}'", symbol(other)),
    }
}

fn symbol(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::Dot => ".",
        TokenKind::Comma => ",",
        TokenKind::LParen => "(",
        TokenKind::RParen => ")",
        TokenKind::LBracket => "[",
        TokenKind::RBracket => "]",
        TokenKind::Plus => "+",
        TokenKind::Minus => "-",
        TokenKind::Star => "*",
        TokenKind::Slash => "/",
        TokenKind::Percent => "%",
        TokenKind::Bang => "!",
        TokenKind::EqEq => "==",
        TokenKind::NotEq => "!=",
        TokenKind::Lt => "<",
        TokenKind::Le => "<=",
        TokenKind::Gt => ">",
        TokenKind::Ge => ">=",
        TokenKind::AndAnd => "&&",
        TokenKind::OrOr => "||",
        _ => "?",
    }
}
