//! Renderer for parsed template blocks.
//!
//! Walks a [`TemplateBlockBinder`] in order and concatenates the output of
//! each block. Expressions are evaluated against a [`RenderContext`]; loops
//! and includes push local scopes onto it and pop them again afterwards.

use crate::config::EngineConfig;
use crate::context::RenderContext;
use crate::error::{Result, TemplateError};
use crate::expression::{ExpressionCache, OperandType};
use crate::template_loader::{strip_root, TemplateLoader};
use crate::value::Value;
use std::collections::HashMap;
use tplkit_ast::{
    ForBlock, IfBlock, IncludeBlock, StaticBlock, TemplateBlock, TemplateBlockBinder,
};
use tracing::{debug, trace};

/// Renders block trees for one render invocation.
pub struct Renderer<'a> {
    config: &'a EngineConfig,
    loader: Option<&'a TemplateLoader>,
    expressions: &'a ExpressionCache,
    /// Canonical names of the includes being rendered, outermost first.
    include_stack: Vec<String>,
}

impl<'a> Renderer<'a> {
    pub fn new(
        config: &'a EngineConfig,
        loader: Option<&'a TemplateLoader>,
        expressions: &'a ExpressionCache,
    ) -> Self {
        Self {
            config,
            loader,
            expressions,
            include_stack: Vec::new(),
        }
    }

    /// Render `binder` against `context`.
    pub fn render(
        &mut self,
        binder: &TemplateBlockBinder,
        context: &mut RenderContext,
    ) -> Result<String> {
        let mut output = String::new();
        self.render_blocks(binder, context, &mut output)?;
        Ok(output)
    }

    /// Resolve every static block reachable from `binder` without going
    /// through an include.
    pub fn bind_statics(&self, binder: &TemplateBlockBinder) -> Result<()> {
        for block in binder {
            match block {
                TemplateBlock::Static(block) => {
                    self.resolve_static(block)?;
                }
                TemplateBlock::For(ForBlock { binder, .. })
                | TemplateBlock::If(IfBlock { binder, .. }) => {
                    self.bind_statics(binder)?;
                }
                TemplateBlock::PlainText(_)
                | TemplateBlock::VariableText(_)
                | TemplateBlock::Include(_) => {}
            }
        }
        Ok(())
    }

    fn render_blocks(
        &mut self,
        binder: &TemplateBlockBinder,
        context: &mut RenderContext,
        output: &mut String,
    ) -> Result<()> {
        for block in binder {
            match block {
                TemplateBlock::PlainText(b) => output.push_str(&b.text),
                TemplateBlock::VariableText(b) => {
                    let operand = self.expressions.evaluate(&b.expression, context)?;
                    output.push_str(&operand.value().to_string());
                }
                TemplateBlock::For(b) => self.render_for(b, context, output)?,
                TemplateBlock::If(b) => self.render_if(b, context, output)?,
                TemplateBlock::Static(b) => output.push_str(self.resolve_static(b)?),
                TemplateBlock::Include(b) => self.render_include(b, context, output)?,
            }
        }
        Ok(())
    }

    fn render_for(
        &mut self,
        block: &ForBlock,
        context: &mut RenderContext,
        output: &mut String,
    ) -> Result<()> {
        let collection = self.expressions.evaluate(&block.collection, context)?;
        let items = match collection.into_value() {
            Value::Array(items) => items,
            other => {
                return Err(TemplateError::TypeMismatch {
                    operator: "for".to_string(),
                    operands: OperandType::of(&other).to_string(),
                    expression: block.collection.clone(),
                })
            }
        };

        for item in items {
            let bindings = HashMap::from([(block.variable.clone(), item)]);
            context.with_scope(bindings, |scoped| {
                self.render_blocks(&block.binder, scoped, output)
            })?;
        }
        Ok(())
    }

    fn render_if(
        &mut self,
        block: &IfBlock,
        context: &mut RenderContext,
        output: &mut String,
    ) -> Result<()> {
        let operand = self.expressions.evaluate(&block.condition, context)?;
        let Some(condition) = operand.value().as_bool() else {
            return Err(TemplateError::TypeMismatch {
                operator: "if".to_string(),
                operands: operand.operand_type().to_string(),
                expression: block.condition.clone(),
            });
        };

        if condition {
            self.render_blocks(&block.binder, context, output)?;
        }
        Ok(())
    }

    /// Static content renders against an empty context in its own pass. That
    /// pass continues the current include chain.
    fn resolve_static<'b>(&self, block: &'b StaticBlock) -> Result<&'b str> {
        block.resolve_with(|binder| {
            trace!(line = block.location.line, "resolving static block");
            let mut renderer = Renderer {
                config: self.config,
                loader: self.loader,
                expressions: self.expressions,
                include_stack: self.include_stack.clone(),
            };
            renderer.render(binder, &mut RenderContext::new())
        })
    }

    fn render_include(
        &mut self,
        block: &IncludeBlock,
        context: &mut RenderContext,
        output: &mut String,
    ) -> Result<()> {
        let name = match self.loader {
            Some(loader) => loader.canonical_name(&block.resource),
            None => strip_root(&block.resource).to_string(),
        };
        let name = name.as_str();

        if self.include_stack.iter().any(|entry| entry == name) {
            let mut chain = self.include_stack.clone();
            chain.push(name.to_string());
            return Err(TemplateError::CyclicInclude {
                name: name.to_string(),
                chain,
            });
        }
        if self.include_stack.len() >= self.config.max_include_depth {
            return Err(TemplateError::DepthExceeded {
                limit: self.config.max_include_depth,
            });
        }

        let loader = self.loader.ok_or_else(|| TemplateError::ResourceNotFound {
            name: name.to_string(),
        })?;
        debug!(resource = name, depth = self.include_stack.len() + 1, "rendering include");
        let included = loader.load(name)?;

        let mut bindings = HashMap::new();
        for (key, source) in block.bindings() {
            let value = self.expressions.evaluate(source, context)?.into_value();
            bindings.insert(key.to_string(), value);
        }

        self.include_stack.push(name.to_string());
        let result = context.with_scope(bindings, |scoped| {
            self.render_blocks(&included, scoped, output)
        });
        self.include_stack.pop();
        result
    }
}
