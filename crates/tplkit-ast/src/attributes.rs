//! Attribute lists of control tags: `name:'value', other:'value'`.

use regex::Regex;
use std::collections::hash_map;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Attribute names mapped to their (unescaped) values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    entries: HashMap<String, String>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an attribute, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, String> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a AttributeMap {
    type Item = (&'a String, &'a String);
    type IntoIter = hash_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn attribute_regex() -> &'static Regex {
    static ATTRIBUTE: OnceLock<Regex> = OnceLock::new();
    ATTRIBUTE.get_or_init(|| {
        Regex::new(r"(?s)(\w+)\s*:\s*'((?:[^'\\]|\\.)*)'").expect("attribute pattern is valid")
    })
}

/// Parse an attribute list.
///
/// Attributes are separated by a comma and/or whitespace. Inside a value `\'`
/// stands for a quote and `\\` for a backslash. Input that does not follow
/// the grammar as a whole (unmatched quote, missing colon, stray text) yields
/// an empty map; callers check for required attributes themselves.
pub fn parse_attributes(text: &str) -> AttributeMap {
    let mut attributes = AttributeMap::new();
    let mut cursor = 0;

    for captures in attribute_regex().captures_iter(text) {
        let (Some(whole), Some(name), Some(value)) =
            (captures.get(0), captures.get(1), captures.get(2))
        else {
            return AttributeMap::new();
        };

        if !is_separator(&text[cursor..whole.start()], cursor == 0) {
            return AttributeMap::new();
        }

        attributes.insert(name.as_str(), unescape(value.as_str()));
        cursor = whole.end();
    }

    if !text[cursor..].trim().is_empty() {
        return AttributeMap::new();
    }

    attributes
}

fn is_separator(gap: &str, leading: bool) -> bool {
    let gap = gap.trim();
    if leading {
        return gap.is_empty();
    }
    gap.is_empty() || gap == ","
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(map: &AttributeMap) -> Vec<(String, String)> {
        let mut pairs: Vec<_> = map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    #[test]
    fn comma_separated() {
        let map = parse_attributes("a:'1', b:'two'");
        assert_eq!(
            pairs(&map),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "two".to_string())
            ]
        );
    }

    #[test]
    fn whitespace_separated() {
        let map = parse_attributes(" var:'x'  in:'[1,2,3]' ");
        assert_eq!(map.get("var"), Some("x"));
        assert_eq!(map.get("in"), Some("[1,2,3]"));
    }

    #[test]
    fn spaces_around_colon() {
        let map = parse_attributes("cond : 'x > 1'");
        assert_eq!(map.get("cond"), Some("x > 1"));
    }

    #[test]
    fn empty_input() {
        assert!(parse_attributes("").is_empty());
        assert!(parse_attributes("   ").is_empty());
    }

    #[test]
    fn last_write_wins() {
        let map = parse_attributes("a:'1', a:'2'");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a"), Some("2"));
    }

    #[test]
    fn value_may_contain_commas_and_colons() {
        let map = parse_attributes("in:'[1, 2]', text:'a:b'");
        assert_eq!(map.get("in"), Some("[1, 2]"));
        assert_eq!(map.get("text"), Some("a:b"));
    }

    #[test]
    fn escaped_quote() {
        let map = parse_attributes(r"cond:'name == \'bob\''");
        assert_eq!(map.get("cond"), Some("name == 'bob'"));
    }

    #[test]
    fn unmatched_quote_yields_empty_map() {
        assert!(parse_attributes("a:'1', b:'two").is_empty());
        assert!(parse_attributes("a:'1").is_empty());
    }

    #[test]
    fn missing_colon_yields_empty_map() {
        assert!(parse_attributes("a'1'").is_empty());
        assert!(parse_attributes("a:'1', b").is_empty());
    }

    #[test]
    fn stray_text_yields_empty_map() {
        assert!(parse_attributes("x- a:'1'").is_empty());
        assert!(parse_attributes("a:'1',, b:'2'").is_empty());
    }
}
