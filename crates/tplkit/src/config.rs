//! Engine configuration.

use crate::error::Result;
use serde::Deserialize;
use tplkit_ast::{ParseOptions, DEFAULT_MAX_DEPTH};

/// Default bound on nested includes.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;

/// Limits and parsing switches of an [`Engine`](crate::Engine).
///
/// Every field has a default, so a partial JSON document such as
/// `{"max_depth": 16}` is a valid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum nesting of `for`/`if`/`static` blocks in one template.
    pub max_depth: usize,
    /// Maximum length of an include chain during one render.
    pub max_include_depth: usize,
    /// Trim a leading blank line and trailing spaces from block bodies.
    pub trim_block_content: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            trim_block_content: false,
        }
    }
}

impl EngineConfig {
    /// Read a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_depth: self.max_depth,
            trim_block_content: self.trim_block_content,
        }
    }
}
