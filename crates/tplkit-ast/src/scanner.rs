//! Scanners that locate the next block in a range of template text.
//!
//! All functions are pure: they take the full template source and the range
//! still to be processed, and report byte offsets into the full source so
//! errors can name a line and column.

use crate::attributes::{parse_attributes, AttributeMap};
use crate::{Location, ParseError};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// A half-open byte range of the source plus the text it captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSpan {
    pub begin: usize,
    pub end: usize,
    pub content: String,
}

impl ParseSpan {
    pub fn new(begin: usize, end: usize, content: impl Into<String>) -> Self {
        debug_assert!(begin <= end);
        Self {
            begin,
            end,
            content: content.into(),
        }
    }
}

/// Kinds of block the scanner recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    For,
    If,
    Static,
    Include,
    DynamicText,
}

impl BlockKind {
    const TAGS: [BlockKind; 4] = [
        BlockKind::For,
        BlockKind::If,
        BlockKind::Static,
        BlockKind::Include,
    ];

    /// Tag name as written in templates; `${}` for dynamic text.
    pub fn tag_name(self) -> &'static str {
        match self {
            BlockKind::For => "for",
            BlockKind::If => "if",
            BlockKind::Static => "static",
            BlockKind::Include => "include",
            BlockKind::DynamicText => "${}",
        }
    }

    /// Whether the tag owns a body closed by `</name>`.
    pub fn is_container(self) -> bool {
        matches!(self, BlockKind::For | BlockKind::If | BlockKind::Static)
    }
}

/// The next block found by [`next_block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextBlock {
    pub kind: BlockKind,
    /// The whole construct, from `<` (or `$`) up to the end of the closing tag.
    /// `content` holds the expression for dynamic text and the raw body for
    /// container tags.
    pub span: ParseSpan,
    /// Range of the body (or of the expression for dynamic text).
    pub body: Range<usize>,
    pub attributes: AttributeMap,
}

impl NextBlock {
    /// Offset of the first byte that still has to be processed.
    pub fn remaining(&self) -> usize {
        self.span.end
    }
}

fn dynamic_text_regex() -> &'static Regex {
    static DYNAMIC_TEXT: OnceLock<Regex> = OnceLock::new();
    DYNAMIC_TEXT.get_or_init(|| {
        Regex::new(r"[$][{]\s*((?:\w|.)*?)\s*[}]").expect("dynamic text pattern is valid")
    })
}

/// Find the first `${ expr }` span in `range`. The span's content is the
/// expression with surrounding whitespace trimmed.
pub fn next_dynamic_text(source: &str, range: Range<usize>) -> Option<ParseSpan> {
    dynamic_text_match(source, range).map(|(span, _)| span)
}

/// Like [`next_dynamic_text`], also returning the range of the expression.
fn dynamic_text_match(source: &str, range: Range<usize>) -> Option<(ParseSpan, Range<usize>)> {
    let captures = dynamic_text_regex().captures(&source[range.clone()])?;
    let whole = captures.get(0)?;
    let expression = captures.get(1)?;
    let span = ParseSpan::new(
        range.start + whole.start(),
        range.start + whole.end(),
        expression.as_str(),
    );
    Some((span, range.start + expression.start()..range.start + expression.end()))
}

/// Find the earliest control tag or dynamic-text span in `range`.
///
/// For container tags the matching closing tag is located by counting nested
/// tags of the same name. `Ok(None)` means the rest of the range is plain text.
pub fn next_block(source: &str, range: Range<usize>) -> Result<Option<NextBlock>, ParseError> {
    let dynamic = dynamic_text_match(source, range.clone());
    let tag = find_tag_start(source, range.clone(), None);

    match (tag, dynamic) {
        (None, None) => Ok(None),
        (Some((start, kind)), Some((span, _))) if start < span.begin => {
            scan_tag(source, start, kind, range.end).map(Some)
        }
        (Some((start, kind)), None) => scan_tag(source, start, kind, range.end).map(Some),
        (_, Some((span, body))) => Ok(Some(NextBlock {
            kind: BlockKind::DynamicText,
            span,
            body,
            attributes: AttributeMap::new(),
        })),
    }
}

/// An opening tag `<name attrs>` or `<name attrs/>`.
struct OpenTag {
    start: usize,
    end: usize,
    attributes: Range<usize>,
    self_closing: bool,
}

/// Locate the next `<name` that starts a tag, optionally restricted to one kind.
fn find_tag_start(
    source: &str,
    range: Range<usize>,
    only: Option<BlockKind>,
) -> Option<(usize, BlockKind)> {
    let text = &source[range.clone()];
    for (offset, _) in text.match_indices('<') {
        let rest = &text[offset + 1..];
        for kind in BlockKind::TAGS {
            if only.is_some_and(|k| k != kind) {
                continue;
            }
            let name = kind.tag_name();
            if !rest.starts_with(name) {
                continue;
            }
            match rest[name.len()..].chars().next() {
                Some(c) if c.is_whitespace() || c == '>' || c == '/' => {
                    return Some((range.start + offset, kind));
                }
                _ => {}
            }
        }
    }
    None
}

/// Read an opening tag that starts at `start`. The terminating `>` is the
/// first one outside a single-quoted attribute value.
fn read_open_tag(
    source: &str,
    start: usize,
    kind: BlockKind,
    limit: usize,
) -> Result<OpenTag, ParseError> {
    let attributes_start = start + 1 + kind.tag_name().len();
    let bytes = source.as_bytes();
    let mut in_quote = false;
    let mut pos = attributes_start;

    while pos < limit {
        match bytes[pos] {
            b'\\' if in_quote => pos += 1,
            b'\'' => in_quote = !in_quote,
            b'>' if !in_quote => {
                let raw = &source[attributes_start..pos];
                let trimmed = raw.trim_end();
                let self_closing = trimmed.ends_with('/');
                let attributes_end = if self_closing {
                    attributes_start + trimmed.len() - 1
                } else {
                    pos
                };
                return Ok(OpenTag {
                    start,
                    end: pos + 1,
                    attributes: attributes_start..attributes_end,
                    self_closing,
                });
            }
            _ => {}
        }
        pos += 1;
    }

    Err(ParseError::MalformedTag {
        tag: kind.tag_name().to_string(),
        message: "opening tag is not terminated by '>'".to_string(),
        location: Location::from_offset(source, start),
    })
}

fn scan_tag(
    source: &str,
    start: usize,
    kind: BlockKind,
    limit: usize,
) -> Result<NextBlock, ParseError> {
    let open = read_open_tag(source, start, kind, limit)?;
    let attributes = parse_attributes(&source[open.attributes.clone()]);

    if !kind.is_container() || open.self_closing {
        return Ok(NextBlock {
            kind,
            span: ParseSpan::new(open.start, open.end, ""),
            body: open.end..open.end,
            attributes,
        });
    }

    let (close_start, close_end) = find_closing_tag(source, &open, kind, limit)?;
    let body = open.end..close_start;
    Ok(NextBlock {
        kind,
        span: ParseSpan::new(open.start, close_end, &source[body.clone()]),
        body,
        attributes,
    })
}

/// Find `</name>` matching `open`, skipping over nested tags of the same name.
fn find_closing_tag(
    source: &str,
    open: &OpenTag,
    kind: BlockKind,
    limit: usize,
) -> Result<(usize, usize), ParseError> {
    let close = format!("</{}>", kind.tag_name());
    let mut depth = 1usize;
    let mut pos = open.end;

    loop {
        let Some(close_start) = source[pos..limit].find(&close).map(|i| pos + i) else {
            return Err(ParseError::MalformedTag {
                tag: kind.tag_name().to_string(),
                message: format!("no matching '{close}' found"),
                location: Location::from_offset(source, open.start),
            });
        };

        match find_tag_start(source, pos..close_start, Some(kind)) {
            Some((nested_start, _)) => {
                let nested = read_open_tag(source, nested_start, kind, limit)?;
                if !nested.self_closing {
                    depth += 1;
                }
                pos = nested.end;
            }
            None => {
                depth -= 1;
                pos = close_start + close.len();
                if depth == 0 {
                    return Ok((close_start, pos));
                }
            }
        }
    }
}
