//! Block scanner and recursive parser for tplkit templates.
//!
//! A template is plain text interleaved with two kinds of markup:
//! - inline expressions: `${ expr }`
//! - control tags: `<for var:'x', in:'items'>...</for>`, `<if cond:'x > 1'>...</if>`,
//!   `<static>...</static>` and `<include resource:'name'/>`
//!
//! Parsing produces a [`TemplateBlockBinder`], an ordered sequence of
//! [`TemplateBlock`]s where container blocks own the binder of their body.
//! Expressions are kept as text; evaluating them is the job of the runtime crate.

pub mod attributes;
pub mod block;
pub mod parser;
pub mod scanner;

pub use attributes::{parse_attributes, AttributeMap};
pub use block::{
    ForBlock, IfBlock, IncludeBlock, PlainTextBlock, StaticBlock, TemplateBlock,
    TemplateBlockBinder, VariableTextBlock,
};
pub use scanner::{next_block, next_dynamic_text, BlockKind, NextBlock, ParseSpan};

use thiserror::Error;

// ============================================================================
// Location
// ============================================================================

/// Location in source code (1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
}

impl Location {
    pub fn new(line: usize, column: usize, byte_offset: usize) -> Self {
        Self {
            line,
            column,
            byte_offset,
        }
    }

    /// Compute the line and column of a byte offset into `source`.
    pub fn from_offset(source: &str, byte_offset: usize) -> Self {
        let byte_offset = byte_offset.min(source.len());
        let before = &source[..byte_offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self {
            line,
            column,
            byte_offset,
        }
    }
}

// ============================================================================
// Options
// ============================================================================

/// Default bound on `for`/`if`/`static` nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Knobs for the recursive parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum nesting of container blocks.
    pub max_depth: usize,
    /// Drop a leading `spaces + newline` and trailing spaces from container bodies.
    pub trim_block_content: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            trim_block_content: false,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed <{tag}> tag at line {}, column {}: {message}", location.line, location.column)]
    MalformedTag {
        tag: String,
        message: String,
        location: Location,
    },

    #[error("<{block}> block at line {}, column {} is missing required attribute '{attribute}'", location.line, location.column)]
    MissingAttribute {
        attribute: String,
        block: String,
        location: Location,
    },

    #[error("nesting depth exceeds limit of {limit} at line {}, column {}", location.line, location.column)]
    DepthExceeded { limit: usize, location: Location },
}

impl ParseError {
    pub fn location(&self) -> Location {
        match self {
            ParseError::MalformedTag { location, .. }
            | ParseError::MissingAttribute { location, .. }
            | ParseError::DepthExceeded { location, .. } => *location,
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a template source string into its top-level binder.
pub fn parse(source: &str) -> Result<TemplateBlockBinder, ParseError> {
    parse_with_options(source, &ParseOptions::default())
}

/// Parse with explicit [`ParseOptions`].
pub fn parse_with_options(
    source: &str,
    options: &ParseOptions,
) -> Result<TemplateBlockBinder, ParseError> {
    parser::Parser::new(source, options).parse()
}
