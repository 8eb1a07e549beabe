//! Parsed template blocks.

use crate::attributes::AttributeMap;
use crate::Location;
use std::slice;
use std::sync::OnceLock;

/// Ordered sibling blocks of one nesting level. Order is render order.
#[derive(Debug, Clone, Default)]
pub struct TemplateBlockBinder {
    blocks: Vec<TemplateBlock>,
}

impl TemplateBlockBinder {
    pub fn new(blocks: Vec<TemplateBlock>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[TemplateBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, TemplateBlock> {
        self.blocks.iter()
    }

    pub(crate) fn push(&mut self, block: TemplateBlock) {
        self.blocks.push(block);
    }
}

impl<'a> IntoIterator for &'a TemplateBlockBinder {
    type Item = &'a TemplateBlock;
    type IntoIter = slice::Iter<'a, TemplateBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

#[derive(Debug, Clone)]
pub enum TemplateBlock {
    PlainText(PlainTextBlock),
    VariableText(VariableTextBlock),
    For(ForBlock),
    If(IfBlock),
    Static(StaticBlock),
    Include(IncludeBlock),
}

impl TemplateBlock {
    pub fn location(&self) -> Location {
        match self {
            TemplateBlock::PlainText(b) => b.location,
            TemplateBlock::VariableText(b) => b.location,
            TemplateBlock::For(b) => b.location,
            TemplateBlock::If(b) => b.location,
            TemplateBlock::Static(b) => b.location,
            TemplateBlock::Include(b) => b.location,
        }
    }

    /// Child binder of container blocks.
    pub fn binder(&self) -> Option<&TemplateBlockBinder> {
        match self {
            TemplateBlock::For(b) => Some(&b.binder),
            TemplateBlock::If(b) => Some(&b.binder),
            TemplateBlock::Static(b) => Some(&b.binder),
            TemplateBlock::PlainText(_)
            | TemplateBlock::VariableText(_)
            | TemplateBlock::Include(_) => None,
        }
    }
}

/// Literal text, rendered verbatim.
#[derive(Debug, Clone)]
pub struct PlainTextBlock {
    pub text: String,
    pub location: Location,
}

/// Inline expression: `${ expression }`
#[derive(Debug, Clone)]
pub struct VariableTextBlock {
    pub expression: String,
    pub location: Location,
}

/// Loop block: `<for var:'item', in:'collection'>...</for>`
#[derive(Debug, Clone)]
pub struct ForBlock {
    /// Name bound to each element.
    pub variable: String,
    /// Expression producing the collection.
    pub collection: String,
    pub attributes: AttributeMap,
    pub raw_body: String,
    pub binder: TemplateBlockBinder,
    pub location: Location,
}

/// Conditional block: `<if cond:'expression'>...</if>`
#[derive(Debug, Clone)]
pub struct IfBlock {
    pub condition: String,
    pub attributes: AttributeMap,
    pub raw_body: String,
    pub binder: TemplateBlockBinder,
    pub location: Location,
}

/// Context-independent block: `<static>...</static>`
///
/// The body is rendered once against an empty context and the result is
/// cached for every later render.
#[derive(Debug, Clone)]
pub struct StaticBlock {
    pub raw_body: String,
    pub binder: TemplateBlockBinder,
    resolved: OnceLock<String>,
    pub location: Location,
}

impl StaticBlock {
    pub fn new(raw_body: String, binder: TemplateBlockBinder, location: Location) -> Self {
        Self {
            raw_body,
            binder,
            resolved: OnceLock::new(),
            location,
        }
    }

    /// The cached content, if the block has been resolved.
    pub fn resolved(&self) -> Option<&str> {
        self.resolved.get().map(String::as_str)
    }

    /// Return the cached content, computing it with `resolve` on first use.
    ///
    /// Racing first uses may both run `resolve`, but only one result is ever
    /// stored and every caller observes that one.
    pub fn resolve_with<E>(
        &self,
        resolve: impl FnOnce(&TemplateBlockBinder) -> Result<String, E>,
    ) -> Result<&str, E> {
        if let Some(content) = self.resolved.get() {
            return Ok(content);
        }
        let content = resolve(&self.binder)?;
        Ok(self.resolved.get_or_init(|| content))
    }
}

/// Include directive: `<include resource:'name' key:'expression'/>`
#[derive(Debug, Clone)]
pub struct IncludeBlock {
    pub resource: String,
    pub attributes: AttributeMap,
    pub location: Location,
}

impl IncludeBlock {
    /// The attribute that names the included resource.
    pub const RESOURCE: &'static str = "resource";

    /// Attributes other than `resource`, sorted by name. Each one binds its
    /// name to the value of its expression inside the included template.
    pub fn bindings(&self) -> Vec<(&str, &str)> {
        let mut bindings: Vec<(&str, &str)> = self
            .attributes
            .iter()
            .filter(|(name, _)| name.as_str() != Self::RESOURCE)
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        bindings.sort_unstable();
        bindings
    }
}
