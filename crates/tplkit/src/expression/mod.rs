//! Expression evaluator for `${}` spans and `for`/`if` attributes.
//!
//! An expression is a literal, a variable path, an array literal, or an
//! operator applied to sub-expressions. Evaluation yields an [`Operand`];
//! variables resolve through the [`RenderContext`] scope chain.

mod lexer;
mod operand;
mod operator;
mod parser;

pub use operand::{Operand, OperandType, OperationResult};

use crate::context::RenderContext;
use crate::error::{Result, TemplateError};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Syntax tree of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Dotted variable path, e.g. `user.name`.
    Variable(Vec<String>),
    Array(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// Lexing or parsing failure at a byte offset of the expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxError {
    pub position: usize,
    pub message: String,
}

impl SyntaxError {
    pub(crate) fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// A parsed expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        let root = lexer::tokenize(source)
            .and_then(parser::parse)
            .map_err(|e| TemplateError::InvalidExpression {
                expression: source.to_string(),
                position: e.position,
                message: e.message,
            })?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    pub fn evaluate(&self, context: &RenderContext) -> Result<Operand> {
        Evaluator {
            context,
            source: &self.source,
        }
        .eval(&self.root)
    }
}

/// Parse and evaluate `expression` against `context`.
pub fn evaluate(expression: &str, context: &RenderContext) -> Result<Operand> {
    Expression::parse(expression)?.evaluate(context)
}

/// Parsed expressions keyed by their source text, shared across renders.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    parsed: RwLock<HashMap<String, Arc<Expression>>>,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `source`, reusing an earlier parse of the same text.
    pub fn get_or_parse(&self, source: &str) -> Result<Arc<Expression>> {
        if let Some(expression) = self
            .parsed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
        {
            return Ok(Arc::clone(expression));
        }

        trace!(expression = source, "parsing expression");
        let expression = Arc::new(Expression::parse(source)?);
        let mut parsed = self.parsed.write().unwrap_or_else(PoisonError::into_inner);
        let cached = parsed.entry(source.to_string()).or_insert(expression);
        Ok(Arc::clone(cached))
    }

    /// Parse and evaluate `source` against `context`.
    pub fn evaluate(&self, source: &str, context: &RenderContext) -> Result<Operand> {
        self.get_or_parse(source)?.evaluate(context)
    }

    pub fn len(&self) -> usize {
        self.parsed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Evaluator<'a> {
    context: &'a RenderContext,
    source: &'a str,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr) -> Result<Operand> {
        match expr {
            Expr::Literal(value) => Ok(Operand::literal(value.clone())),
            Expr::Variable(path) => {
                let value = self.context.resolve(path.as_slice(), self.source)?;
                Ok(Operand::variable(path.join("."), value.clone()))
            }
            Expr::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item).map(Operand::into_value))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Operand::literal(Value::Array(values)))
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                operator::apply_unary(*op, &operand, self.source)
            }
            Expr::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
            } => {
                let left = self.eval(left)?;
                let decided = operator::require_bool(*op, &left, self.source)?;
                if decided == (*op == BinaryOp::Or) {
                    return Ok(Operand::operation_result(decided));
                }
                let right = self.eval(right)?;
                let value = operator::require_bool(*op, &right, self.source)?;
                Ok(Operand::operation_result(value))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                operator::apply_binary(*op, &left, &right, self.source)
            }
        }
    }
}
