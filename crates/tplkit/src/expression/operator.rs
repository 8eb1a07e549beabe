//! Operator semantics.

use super::operand::Operand;
use super::{BinaryOp, UnaryOp};
use crate::error::{Result, TemplateError};
use crate::value::Value;
use std::cmp::Ordering;

pub(crate) fn apply_unary(op: UnaryOp, operand: &Operand, expression: &str) -> Result<Operand> {
    let value = match (op, operand.value()) {
        (UnaryOp::Not, Value::Bool(b)) => Value::Bool(!b),
        (UnaryOp::Neg, Value::Integer(n)) => {
            Value::Integer(n.checked_neg().ok_or_else(|| overflow(expression))?)
        }
        (UnaryOp::Neg, Value::Float(x)) => Value::Float(-x),
        _ => {
            return Err(TemplateError::TypeMismatch {
                operator: op.symbol().to_string(),
                operands: operand.operand_type().to_string(),
                expression: expression.to_string(),
            })
        }
    };
    Ok(Operand::operation_result(value))
}

/// Apply a non-short-circuiting binary operator.
pub(crate) fn apply_binary(
    op: BinaryOp,
    left: &Operand,
    right: &Operand,
    expression: &str,
) -> Result<Operand> {
    let (l, r) = (left.value(), right.value());
    let value = match op {
        BinaryOp::Add if is_string(l) || is_string(r) => Value::String(format!("{l}{r}")),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, l, r, expression)
                .unwrap_or_else(|| Err(mismatch(op, left, right, expression)))?
        }
        BinaryOp::Eq => Value::Bool(equals(l, r)),
        BinaryOp::Ne => Value::Bool(!equals(l, r)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(l, r).ok_or_else(|| mismatch(op, left, right, expression))?;
            Value::Bool(match op {
                BinaryOp::Lt => ordering == Some(Ordering::Less),
                BinaryOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                BinaryOp::Gt => ordering == Some(Ordering::Greater),
                _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            })
        }
        BinaryOp::And | BinaryOp::Or => {
            let (Some(a), Some(b)) = (l.as_bool(), r.as_bool()) else {
                return Err(mismatch(op, left, right, expression));
            };
            Value::Bool(if op == BinaryOp::And { a && b } else { a || b })
        }
    };
    Ok(Operand::operation_result(value))
}

/// Check that one side of `&&`/`||` is boolean.
pub(crate) fn require_bool(op: BinaryOp, operand: &Operand, expression: &str) -> Result<bool> {
    operand
        .value()
        .as_bool()
        .ok_or_else(|| TemplateError::TypeMismatch {
            operator: op.symbol().to_string(),
            operands: operand.operand_type().to_string(),
            expression: expression.to_string(),
        })
}

fn is_string(value: &Value) -> bool {
    matches!(value, Value::String(_))
}

/// `None` when the operand types are not numeric.
fn arithmetic(op: BinaryOp, l: &Value, r: &Value, expression: &str) -> Option<Result<Value>> {
    if let (Value::Integer(a), Value::Integer(b)) = (l, r) {
        return Some(integer_arithmetic(op, *a, *b, expression));
    }

    let (a, b) = (l.as_f64()?, r.as_f64()?);
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    };
    Some(Ok(Value::Float(value)))
}

fn integer_arithmetic(op: BinaryOp, a: i64, b: i64, expression: &str) -> Result<Value> {
    if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0 {
        return Err(TemplateError::ArithmeticError {
            expression: expression.to_string(),
            message: "division by zero".to_string(),
        });
    }
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        _ => a.checked_rem(b),
    };
    result.map(Value::Integer).ok_or_else(|| overflow(expression))
}

/// Equality across operand types; integers and floats compare numerically.
fn equals(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
            *a as f64 == *b
        }
        _ => l == r,
    }
}

/// Outer `None`: types are not comparable. Inner `None`: a NaN was involved.
fn compare(l: &Value, r: &Value) -> Option<Option<Ordering>> {
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => Some(Some(a.cmp(b))),
        (Value::String(a), Value::String(b)) => Some(Some(a.cmp(b))),
        _ => {
            let (a, b) = (l.as_f64()?, r.as_f64()?);
            Some(a.partial_cmp(&b))
        }
    }
}

fn mismatch(op: BinaryOp, left: &Operand, right: &Operand, expression: &str) -> TemplateError {
    TemplateError::TypeMismatch {
        operator: op.symbol().to_string(),
        operands: format!("{} and {}", left.operand_type(), right.operand_type()),
        expression: expression.to_string(),
    }
}

fn overflow(expression: &str) -> TemplateError {
    TemplateError::ArithmeticError {
        expression: expression.to_string(),
        message: "integer overflow".to_string(),
    }
}
