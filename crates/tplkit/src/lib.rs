//! tplkit - a small text template engine
//!
//! Templates are plain text with inline `${ expression }` spans and four
//! control tags:
//! - `<for var:'item' in:'items'>...</for>` repeats its body per element
//! - `<if cond:'count > 1'>...</if>` renders its body when the condition holds
//! - `<static>...</static>` is rendered once and reused by every render
//! - `<include resource:'name' key:'expression'/>` renders another template
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//!
//! let result = tplkit::render(
//!     "Hello, ${name}!<for var:'n' in:'[1, 2, 3]'> ${n * 10}</for>",
//!     json!({"name": "World"}),
//! ).unwrap();
//!
//! assert_eq!(result, "Hello, World! 10 20 30");
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod expression;
pub mod renderer;
pub mod template_loader;
pub mod value;

pub use config::EngineConfig;
pub use context::RenderContext;
pub use error::{Result, TemplateError};
pub use expression::{evaluate, ExpressionCache, Operand, OperandType};
pub use renderer::Renderer;
pub use template_loader::{FileSystemLoader, MemoryLoader, ResourceLoader, TemplateLoader};
pub use tplkit_ast::{Location, ParseError, ParseOptions, TemplateBlock, TemplateBlockBinder};
pub use value::Value;

use std::path::Path;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Template
// ============================================================================

/// A parsed template. Cheap to clone and safe to share between threads.
#[derive(Debug, Clone)]
pub struct Template {
    binder: Arc<TemplateBlockBinder>,
}

impl Template {
    /// The top-level blocks of the template.
    pub fn binder(&self) -> &TemplateBlockBinder {
        &self.binder
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Parses and renders templates with one configuration and resource loader.
#[derive(Debug, Default)]
pub struct Engine {
    config: EngineConfig,
    loader: Option<TemplateLoader>,
    expressions: ExpressionCache,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            loader: None,
            expressions: ExpressionCache::new(),
        }
    }

    /// Resolve `<include>` resources through `resources`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use serde_json::json;
    /// use tplkit::{Engine, MemoryLoader};
    ///
    /// let engine = Engine::new()
    ///     .with_loader(MemoryLoader::new().with("greeting", "Hi, ${who}!"));
    /// let result = engine
    ///     .render_str("<include resource:'greeting' who:'name'/>", json!({"name": "Ada"}))
    ///     .unwrap();
    /// assert_eq!(result, "Hi, Ada!");
    /// ```
    pub fn with_loader(mut self, resources: impl ResourceLoader + 'static) -> Self {
        self.loader = Some(TemplateLoader::new(resources, self.config.parse_options()));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse a template source string.
    ///
    /// Static blocks outside of includes are rendered here, so errors in them
    /// surface at parse time.
    ///
    /// # Example
    ///
    /// ```rust
    /// use serde_json::json;
    ///
    /// let engine = tplkit::Engine::new();
    /// let template = engine.parse("Hello, ${name}!").unwrap();
    /// let result = engine.render(&template, json!({"name": "Alice"})).unwrap();
    /// assert_eq!(result, "Hello, Alice!");
    /// ```
    pub fn parse(&self, source: &str) -> Result<Template> {
        let binder = tplkit_ast::parse_with_options(source, &self.config.parse_options())?;
        debug!(blocks = binder.len(), "parsed template");
        self.renderer().bind_statics(&binder)?;
        Ok(Template {
            binder: Arc::new(binder),
        })
    }

    /// Render a template with the given JSON data. The data must be an
    /// object or null.
    pub fn render(&self, template: &Template, data: serde_json::Value) -> Result<String> {
        let mut context = RenderContext::from_json(data)?;
        self.render_in(template, &mut context)
    }

    /// Render a template against an existing context.
    pub fn render_in(&self, template: &Template, context: &mut RenderContext) -> Result<String> {
        self.renderer().render(&template.binder, context)
    }

    /// Parse and render in one call.
    pub fn render_str(&self, source: &str, data: serde_json::Value) -> Result<String> {
        let template = self.parse(source)?;
        self.render(&template, data)
    }

    fn renderer(&self) -> Renderer<'_> {
        Renderer::new(&self.config, self.loader.as_ref(), &self.expressions)
    }
}

// ============================================================================
// Convenience functions
// ============================================================================

/// Parse and render in one call, without include support.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
///
/// let result = tplkit::render(
///     "<if cond:'count > 1'>${count} items</if>",
///     json!({"count": 3}),
/// ).unwrap();
///
/// assert_eq!(result, "3 items");
/// ```
pub fn render(source: &str, data: serde_json::Value) -> Result<String> {
    Engine::new().render_str(source, data)
}

/// Parse and render with includes resolved from files under `include_root`.
///
/// # Example
///
/// ```rust,ignore
/// use serde_json::json;
///
/// let result = tplkit::render_with_includes(
///     "<include resource:'components/header'/>",
///     json!({}),
///     "templates/shared",
/// ).unwrap();
/// ```
pub fn render_with_includes(
    source: &str,
    data: serde_json::Value,
    include_root: impl AsRef<Path>,
) -> Result<String> {
    Engine::new()
        .with_loader(FileSystemLoader::new(include_root)?)
        .render_str(source, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_reuse() {
        let engine = Engine::new();
        let template = engine.parse("Hello, ${name}!").unwrap();

        let result1 = engine.render(&template, json!({"name": "Alice"})).unwrap();
        assert_eq!(result1, "Hello, Alice!");

        let result2 = engine.render(&template, json!({"name": "Bob"})).unwrap();
        assert_eq!(result2, "Hello, Bob!");
    }

    #[test]
    fn test_render_in_existing_context() {
        let engine = Engine::new();
        let template = engine.parse("${a + b}").unwrap();
        let mut context = RenderContext::new();
        context.insert("a", 1i64);
        context.insert("b", 2.5);
        assert_eq!(engine.render_in(&template, &mut context).unwrap(), "3.5");
    }

    #[test]
    fn test_static_error_surfaces_at_parse() {
        assert!(matches!(
            Engine::new().parse("<static>${missing}</static>"),
            Err(TemplateError::UnresolvedVariable { .. })
        ));
    }

    #[test]
    fn test_config_limits_nesting() {
        let engine = Engine::with_config(EngineConfig {
            max_depth: 1,
            ..EngineConfig::default()
        });
        assert!(engine.parse("<if cond:'true'>x</if>").is_ok());
        assert!(matches!(
            engine.parse("<if cond:'true'><if cond:'true'>x</if></if>"),
            Err(TemplateError::Parse(ParseError::DepthExceeded { .. }))
        ));
    }

    #[test]
    fn test_static_include_cycle_is_an_error() {
        let engine = Engine::new()
            .with_loader(MemoryLoader::new().with("a", "<static><include resource:'a'/></static>"));
        assert!(matches!(
            engine.render_str("<include resource:'a'/>", json!({})),
            Err(TemplateError::CyclicInclude { .. })
        ));
    }

    #[test]
    fn test_long_operator_chain_is_an_error() {
        let source = format!("${{{}}}", vec!["1"; 200_000].join("+"));
        assert!(matches!(
            render(&source, json!({})),
            Err(TemplateError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn test_engine_and_template_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
        assert_send_sync::<Template>();
    }

    #[test]
    fn test_root_data_must_be_object() {
        assert!(matches!(
            render("x", json!("text")),
            Err(TemplateError::InvalidContext { .. })
        ));
    }
}
