//! Typed operands produced and consumed by the evaluator.

use crate::value::Value;
use std::fmt;

/// Semantic type tag of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandType {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Array,
    Object,
}

impl OperandType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => OperandType::Null,
            Value::Bool(_) => OperandType::Boolean,
            Value::Integer(_) => OperandType::Integer,
            Value::Float(_) => OperandType::Float,
            Value::String(_) => OperandType::String,
            Value::Array(_) => OperandType::Array,
            Value::Object(_) => OperandType::Object,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, OperandType::Integer | OperandType::Float)
    }

    pub fn name(self) -> &'static str {
        match self {
            OperandType::Null => "Null",
            OperandType::Boolean => "Boolean",
            OperandType::Integer => "Integer",
            OperandType::Float => "Float",
            OperandType::String => "String",
            OperandType::Array => "Array",
            OperandType::Object => "Object",
        }
    }
}

impl fmt::Display for OperandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An evaluated operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A value written in the expression itself.
    Literal { value: Value },
    /// A value looked up through the scope chain.
    Variable { name: String, value: Value },
    /// The result of applying an operator.
    OperationResult(OperationResult),
}

/// Output of an operator. Only the evaluator creates these.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    value: Value,
}

impl OperationResult {
    pub(crate) fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Operand {
    pub fn literal(value: Value) -> Self {
        Operand::Literal { value }
    }

    pub fn variable(name: impl Into<String>, value: Value) -> Self {
        Operand::Variable {
            name: name.into(),
            value,
        }
    }

    pub(crate) fn operation_result(value: impl Into<Value>) -> Self {
        Operand::OperationResult(OperationResult::new(value.into()))
    }

    pub fn value(&self) -> &Value {
        match self {
            Operand::Literal { value } | Operand::Variable { value, .. } => value,
            Operand::OperationResult(result) => result.value(),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Operand::Literal { value } | Operand::Variable { value, .. } => value,
            Operand::OperationResult(result) => result.value,
        }
    }

    pub fn operand_type(&self) -> OperandType {
        OperandType::of(self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tags() {
        assert_eq!(Operand::literal(Value::Integer(1)).operand_type(), OperandType::Integer);
        assert_eq!(
            Operand::variable("x", Value::from("s")).operand_type(),
            OperandType::String
        );
        assert_eq!(
            Operand::operation_result(true).operand_type(),
            OperandType::Boolean
        );
    }

    #[test]
    fn into_value() {
        let operand = Operand::variable("items", Value::from(vec![1i64, 2]));
        assert_eq!(operand.into_value(), Value::from(vec![1i64, 2]));
    }

    #[test]
    fn numeric_types() {
        assert!(OperandType::Integer.is_numeric());
        assert!(OperandType::Float.is_numeric());
        assert!(!OperandType::String.is_numeric());
        assert_eq!(OperandType::Null.to_string(), "Null");
    }
}
