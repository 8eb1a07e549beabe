//! Error types for the tplkit template engine.

use thiserror::Error;

pub use tplkit_ast::{Location, ParseError};

/// All errors that can occur in tplkit
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Unresolved variable '{name}' in expression '{expression}'")]
    UnresolvedVariable { name: String, expression: String },

    #[error("Type mismatch: operator '{operator}' cannot be applied to {operands} in expression '{expression}'")]
    TypeMismatch {
        operator: String,
        operands: String,
        expression: String,
    },

    #[error("Invalid expression '{expression}' at position {position}: {message}")]
    InvalidExpression {
        expression: String,
        position: usize,
        message: String,
    },

    #[error("Arithmetic error in expression '{expression}': {message}")]
    ArithmeticError { expression: String, message: String },

    #[error("Template resource not found: {name}")]
    ResourceNotFound { name: String },

    #[error("Failed to read template resource '{name}': {source}")]
    ResourceLoad {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cyclic include of '{name}' (include chain: {})", chain.join(" -> "))]
    CyclicInclude { name: String, chain: Vec<String> },

    #[error("Include depth exceeds limit of {limit}")]
    DepthExceeded { limit: usize },

    #[error("Invalid render context: {message}")]
    InvalidContext { message: String },

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type alias for tplkit operations
pub type Result<T> = std::result::Result<T, TemplateError>;
