//! Recursive parser.
//!
//! Drives [`next_block`] over a range of the source, emitting plain text
//! between blocks and recursing into the bodies of container tags. Bodies are
//! strict sub-ranges of the enclosing range, so recursion always terminates;
//! the depth bound turns adversarial nesting into an error instead of a stack
//! overflow.

use crate::block::{
    ForBlock, IfBlock, IncludeBlock, PlainTextBlock, StaticBlock, TemplateBlock,
    TemplateBlockBinder, VariableTextBlock,
};
use crate::scanner::{next_block, BlockKind, NextBlock};
use crate::{AttributeMap, Location, ParseError, ParseOptions};
use std::ops::Range;
use tracing::{debug, trace};

pub(crate) struct Parser<'a> {
    source: &'a str,
    options: &'a ParseOptions,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(source: &'a str, options: &'a ParseOptions) -> Self {
        Self { source, options }
    }

    pub(crate) fn parse(&self) -> Result<TemplateBlockBinder, ParseError> {
        let binder = self.parse_range(0..self.source.len(), 0)?;
        debug!(
            blocks = binder.len(),
            bytes = self.source.len(),
            "parsed template"
        );
        Ok(binder)
    }

    fn parse_range(
        &self,
        range: Range<usize>,
        depth: usize,
    ) -> Result<TemplateBlockBinder, ParseError> {
        let mut binder = TemplateBlockBinder::default();
        let mut cursor = range.start;

        while let Some(next) = next_block(self.source, cursor..range.end)? {
            trace!(kind = ?next.kind, offset = next.span.begin, depth, "block found");

            if next.span.begin > cursor {
                binder.push(self.plain_text(cursor..next.span.begin));
            }

            let block = match next.kind {
                BlockKind::DynamicText => TemplateBlock::VariableText(VariableTextBlock {
                    expression: next.span.content.clone(),
                    location: self.location(next.span.begin),
                }),
                BlockKind::For => TemplateBlock::For(self.for_block(&next, depth)?),
                BlockKind::If => TemplateBlock::If(self.if_block(&next, depth)?),
                BlockKind::Static => TemplateBlock::Static(self.static_block(&next, depth)?),
                BlockKind::Include => TemplateBlock::Include(self.include_block(&next)?),
            };
            binder.push(block);
            cursor = next.remaining();
        }

        if cursor < range.end {
            binder.push(self.plain_text(cursor..range.end));
        }

        Ok(binder)
    }

    fn for_block(&self, next: &NextBlock, depth: usize) -> Result<ForBlock, ParseError> {
        let location = self.location(next.span.begin);
        let variable = required(&next.attributes, "var", BlockKind::For, location)?;
        let collection = required(&next.attributes, "in", BlockKind::For, location)?;

        let variable = variable.trim();
        if !is_identifier(variable) {
            return Err(ParseError::MalformedTag {
                tag: BlockKind::For.tag_name().to_string(),
                message: format!("loop variable '{variable}' is not an identifier"),
                location,
            });
        }

        let (raw_body, binder) = self.parse_body(next, depth, location)?;
        Ok(ForBlock {
            variable: variable.to_string(),
            collection: collection.to_string(),
            attributes: next.attributes.clone(),
            raw_body,
            binder,
            location,
        })
    }

    fn if_block(&self, next: &NextBlock, depth: usize) -> Result<IfBlock, ParseError> {
        let location = self.location(next.span.begin);
        let condition = required(&next.attributes, "cond", BlockKind::If, location)?;
        let (raw_body, binder) = self.parse_body(next, depth, location)?;
        Ok(IfBlock {
            condition: condition.to_string(),
            attributes: next.attributes.clone(),
            raw_body,
            binder,
            location,
        })
    }

    fn static_block(&self, next: &NextBlock, depth: usize) -> Result<StaticBlock, ParseError> {
        let location = self.location(next.span.begin);
        let (raw_body, binder) = self.parse_body(next, depth, location)?;
        Ok(StaticBlock::new(raw_body, binder, location))
    }

    fn include_block(&self, next: &NextBlock) -> Result<IncludeBlock, ParseError> {
        let location = self.location(next.span.begin);
        let resource = required(
            &next.attributes,
            IncludeBlock::RESOURCE,
            BlockKind::Include,
            location,
        )?;
        Ok(IncludeBlock {
            resource: resource.trim().to_string(),
            attributes: next.attributes.clone(),
            location,
        })
    }

    fn parse_body(
        &self,
        next: &NextBlock,
        depth: usize,
        location: Location,
    ) -> Result<(String, TemplateBlockBinder), ParseError> {
        let depth = depth + 1;
        if depth > self.options.max_depth {
            return Err(ParseError::DepthExceeded {
                limit: self.options.max_depth,
                location,
            });
        }

        let (body, terminator) = if self.options.trim_block_content {
            trim_block_content(self.source, next.body.clone())
        } else {
            (next.body.clone(), None)
        };
        let mut binder = self.parse_range(body.clone(), depth)?;
        let mut raw_body = self.source[body].to_string();

        // Spaces before a final line terminator were cut, the terminator stays.
        if let Some(terminator) = terminator {
            raw_body.push_str(&self.source[terminator.clone()]);
            binder.push(self.plain_text(terminator));
        }
        Ok((raw_body, binder))
    }

    fn plain_text(&self, range: Range<usize>) -> TemplateBlock {
        TemplateBlock::PlainText(PlainTextBlock {
            text: self.source[range.clone()].to_string(),
            location: self.location(range.start),
        })
    }

    fn location(&self, offset: usize) -> Location {
        Location::from_offset(self.source, offset)
    }
}

fn required<'m>(
    attributes: &'m AttributeMap,
    name: &str,
    kind: BlockKind,
    location: Location,
) -> Result<&'m str, ParseError> {
    attributes
        .get(name)
        .ok_or_else(|| ParseError::MissingAttribute {
            attribute: name.to_string(),
            block: kind.tag_name().to_string(),
            location,
        })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Drop a leading run of spaces ending in a newline, and trailing spaces.
///
/// Trailing spaces also count when they precede a final line terminator; in
/// that case the terminator's range is returned separately so it can be kept.
fn trim_block_content(
    source: &str,
    range: Range<usize>,
) -> (Range<usize>, Option<Range<usize>>) {
    let text = &source[range.clone()];
    let leading = text.len() - text.trim_start_matches(' ').len();
    let start = if text[leading..].starts_with('\n') {
        range.start + leading + 1
    } else {
        range.start
    };

    let rest = &source[start..range.end];
    let terminator_len = if rest.ends_with("\r\n") {
        2
    } else if rest.ends_with('\n') || rest.ends_with('\r') {
        1
    } else {
        0
    };
    let before = &rest[..rest.len() - terminator_len];
    let content_end = start + before.trim_end_matches(' ').len();

    match terminator_len {
        0 => (start..content_end, None),
        _ if content_end < start + before.len() => {
            (start..content_end, Some(start + before.len()..range.end))
        }
        _ => (start..range.end, None),
    }
}
