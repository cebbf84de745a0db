//! Selector expressions over the Document Index.
//!
//! A selector is a small JSONPath subset that picks the nodes a rule applies
//! to:
//!
//! | Syntax | Meaning |
//! |---|---|
//! | `$` | the document root |
//! | `.key`, `['key']`, `["key"]` | value under a mapping key |
//! | `[n]`, `[-n]` | sequence element (negative counts from the end) |
//! | `.*`, `[*]` | every child value |
//! | `..key`, `..['key']` | `key` values at any depth |
//! | `..[n]` | sequence element `n` at any depth |
//! | `..*` | every descendant |
//!
//! Results are always in document order and free of duplicates.

use thiserror::Error;
use tracing::debug;

use crate::index::DocumentIndex;
use crate::tree::NodeId;

/// Errors raised while parsing a selector.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// The expression does not start with `$`.
    #[error("selector must start with '$'")]
    MissingRoot,

    /// A character that cannot appear at this position.
    #[error("unexpected '{found}' at position {position}")]
    UnexpectedChar {
        /// Character offset.
        position: usize,
        /// The offending character.
        found: char,
    },

    /// The expression ended in the middle of a step.
    #[error("unexpected end of selector, expected {expected}")]
    UnexpectedEnd {
        /// What the parser was looking for.
        expected: &'static str,
    },

    /// A quoted key without its closing quote.
    #[error("unterminated string starting at position {position}")]
    UnterminatedString {
        /// Character offset of the opening quote.
        position: usize,
    },

    /// A bracket index that is not an integer.
    #[error("invalid index '{text}'")]
    InvalidIndex {
        /// The bracket contents.
        text: String,
    },
}

/// One step of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Value under a mapping key.
    Child(String),
    /// Sequence element; negative values count from the end.
    Index(isize),
    /// All child values.
    Wildcard,
    /// Values under the key at any depth, or every descendant for `None`.
    Descendant(Option<String>),
    /// Sequence element at any depth.
    DescendantIndex(isize),
}

/// A compiled selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    segments: Vec<Segment>,
}

impl Selector {
    /// Parses a selector expression.
    ///
    /// # Errors
    ///
    /// Returns a [`SelectorError`] describing the first syntax problem.
    pub fn parse(expr: &str) -> Result<Self, SelectorError> {
        let segments = Parser::new(expr).parse()?;
        Ok(Self {
            source: expr.to_string(),
            segments,
        })
    }

    /// Returns the expression text the selector was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the parsed steps.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Evaluates the selector, returning matches in document order.
    #[must_use]
    pub fn select(&self, index: &DocumentIndex) -> Vec<NodeId> {
        let tree = index.tree();
        let mut current = vec![index.root()];

        for segment in &self.segments {
            let mut next = Vec::new();
            for &node in &current {
                match segment {
                    Segment::Child(key) => next.extend(tree.mapping_get(node, key)),
                    Segment::Index(i) => next.extend(element_at(index, node, *i)),
                    Segment::Wildcard => next.extend(tree.children(node)),
                    Segment::Descendant(None) => next.extend(subtree(index, node).skip(1)),
                    Segment::Descendant(Some(key)) => next.extend(
                        subtree(index, node).filter_map(|n| tree.mapping_get(n, key)),
                    ),
                    Segment::DescendantIndex(i) => {
                        next.extend(subtree(index, node).filter_map(|n| element_at(index, n, *i)));
                    }
                }
            }
            current = next;
            if current.is_empty() {
                break;
            }
        }

        order(index, current)
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parses and evaluates `expr` in one step. An unparsable expression selects
/// nothing.
#[must_use]
pub fn select(expr: &str, index: &DocumentIndex) -> Vec<NodeId> {
    match Selector::parse(expr) {
        Ok(selector) => selector.select(index),
        Err(e) => {
            debug!("Ignoring selector '{}': {}", expr, e);
            Vec::new()
        }
    }
}

fn element_at(index: &DocumentIndex, node: NodeId, i: isize) -> Option<NodeId> {
    let items = index.tree().items(node);
    let len = isize::try_from(items.len()).unwrap_or(isize::MAX);
    let at = if i < 0 { len + i } else { i };
    if !(0..len).contains(&at) {
        return None;
    }
    usize::try_from(at).ok().and_then(|a| items.get(a)).copied()
}

/// `node` followed by all of its descendants, pre-order.
fn subtree(index: &DocumentIndex, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    let tree = index.tree();
    let mut stack = vec![node];
    std::iter::from_fn(move || {
        let current = stack.pop()?;
        stack.extend(tree.children(current).into_iter().rev());
        Some(current)
    })
}

fn order(index: &DocumentIndex, nodes: Vec<NodeId>) -> Vec<NodeId> {
    let mut ranked: Vec<(usize, NodeId)> = nodes
        .into_iter()
        .filter_map(|n| index.rank_of(n).map(|r| (r, n)))
        .collect();
    ranked.sort_unstable_by_key(|(rank, _)| *rank);
    ranked.dedup_by_key(|(rank, _)| *rank);
    ranked.into_iter().map(|(_, n)| n).collect()
}

struct Parser {
    chars: Vec<char>,
    position: usize,
}

impl Parser {
    fn new(expr: &str) -> Self {
        Self {
            chars: expr.trim().chars().collect(),
            position: 0,
        }
    }

    fn parse(mut self) -> Result<Vec<Segment>, SelectorError> {
        if self.next() != Some('$') {
            return Err(SelectorError::MissingRoot);
        }

        let mut segments = Vec::new();
        while let Some(ch) = self.peek() {
            match ch {
                '.' => {
                    self.next();
                    match self.peek() {
                        Some('.') => {
                            self.next();
                            segments.push(self.parse_descendant()?);
                        }
                        Some('*') => {
                            self.next();
                            segments.push(Segment::Wildcard);
                        }
                        _ => segments.push(Segment::Child(self.parse_identifier()?)),
                    }
                }
                '[' => segments.push(self.parse_bracket()?),
                found => {
                    return Err(SelectorError::UnexpectedChar {
                        position: self.position,
                        found,
                    })
                }
            }
        }
        Ok(segments)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn next(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;
        Some(ch)
    }

    fn expect(&mut self, expected: char, what: &'static str) -> Result<(), SelectorError> {
        match self.next() {
            Some(ch) if ch == expected => Ok(()),
            Some(found) => Err(SelectorError::UnexpectedChar {
                position: self.position - 1,
                found,
            }),
            None => Err(SelectorError::UnexpectedEnd { expected: what }),
        }
    }

    fn parse_identifier(&mut self) -> Result<String, SelectorError> {
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || matches!(ch, '_' | '-' | '$' | '@') {
                name.push(ch);
                self.next();
            } else {
                break;
            }
        }
        if !name.is_empty() {
            return Ok(name);
        }
        match self.peek() {
            Some(found) => Err(SelectorError::UnexpectedChar {
                position: self.position,
                found,
            }),
            None => Err(SelectorError::UnexpectedEnd {
                expected: "a key name",
            }),
        }
    }

    fn parse_descendant(&mut self) -> Result<Segment, SelectorError> {
        match self.peek() {
            Some('*') => {
                self.next();
                Ok(Segment::Descendant(None))
            }
            Some('[') => Ok(match self.parse_bracket()? {
                Segment::Child(key) => Segment::Descendant(Some(key)),
                Segment::Index(i) => Segment::DescendantIndex(i),
                _ => Segment::Descendant(None),
            }),
            _ => Ok(Segment::Descendant(Some(self.parse_identifier()?))),
        }
    }

    fn parse_bracket(&mut self) -> Result<Segment, SelectorError> {
        self.expect('[', "'['")?;
        let segment = match self.peek() {
            Some('*') => {
                self.next();
                Segment::Wildcard
            }
            Some(quote @ ('\'' | '"')) => Segment::Child(self.parse_quoted(quote)?),
            Some(_) => {
                let mut text = String::new();
                while let Some(ch) = self.peek().filter(|c| *c != ']') {
                    text.push(ch);
                    self.next();
                }
                let index = text
                    .trim()
                    .parse::<isize>()
                    .map_err(|_| SelectorError::InvalidIndex { text })?;
                Segment::Index(index)
            }
            None => {
                return Err(SelectorError::UnexpectedEnd {
                    expected: "a bracket expression",
                })
            }
        };
        self.expect(']', "']'")?;
        Ok(segment)
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        let start = self.position;
        self.next();
        let mut value = String::new();
        loop {
            match self.next() {
                Some('\\') => match self.next() {
                    Some(ch) => value.push(ch),
                    None => return Err(SelectorError::UnterminatedString { position: start }),
                },
                Some(ch) if ch == quote => return Ok(value),
                Some(ch) => value.push(ch),
                None => return Err(SelectorError::UnterminatedString { position: start }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::document::parse;

    fn index(yaml: &str) -> DocumentIndex {
        let parsed = parse(yaml.as_bytes()).unwrap();
        DocumentIndex::build(Arc::new(parsed.tree)).unwrap()
    }

    fn paths(index: &DocumentIndex, expr: &str) -> Vec<String> {
        select(expr, index)
            .into_iter()
            .map(|n| index.path_of(n).unwrap().to_string())
            .collect()
    }

    const DOC: &str = "openapi: 3.0.0
tags:
  - name: pets
  - name: store
paths:
  /pets:
    get:
      operationId: listPets
      tags: [pets]
    post:
      operationId: createPet
  /store:
    get:
      operationId: getInventory
";

    #[test]
    fn parses_all_step_kinds() {
        let selector = Selector::parse("$.paths['/pets'][*]..operationId[0][-1]..*").unwrap();
        assert_eq!(
            selector.segments(),
            &[
                Segment::Child("paths".to_string()),
                Segment::Child("/pets".to_string()),
                Segment::Wildcard,
                Segment::Descendant(Some("operationId".to_string())),
                Segment::Index(0),
                Segment::Index(-1),
                Segment::Descendant(None),
            ]
        );
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert_eq!(Selector::parse("paths"), Err(SelectorError::MissingRoot));
        assert!(matches!(
            Selector::parse("$.paths['/pets"),
            Err(SelectorError::UnterminatedString { .. })
        ));
        assert!(matches!(
            Selector::parse("$.tags[x]"),
            Err(SelectorError::InvalidIndex { .. })
        ));
        assert!(matches!(
            Selector::parse("$.tags["),
            Err(SelectorError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            Selector::parse("$.paths/x"),
            Err(SelectorError::UnexpectedChar { found: '/', .. })
        ));
    }

    #[test]
    fn root_selects_document() {
        let idx = index(DOC);
        assert_eq!(select("$", &idx), vec![idx.root()]);
    }

    #[test]
    fn child_and_quoted_keys() {
        let idx = index(DOC);
        assert_eq!(paths(&idx, "$.paths['/pets'].get"), vec!["#/paths/~1pets/get"]);
        assert_eq!(
            paths(&idx, "$[\"paths\"][\"/store\"]"),
            vec!["#/paths/~1store"]
        );
    }

    #[test]
    fn indexes_count_from_either_end() {
        let idx = index(DOC);
        assert_eq!(paths(&idx, "$.tags[0].name"), vec!["#/tags/0/name"]);
        assert_eq!(paths(&idx, "$.tags[-1].name"), vec!["#/tags/1/name"]);
        assert!(paths(&idx, "$.tags[5]").is_empty());
        assert!(paths(&idx, "$.tags[-3]").is_empty());
    }

    #[test]
    fn wildcard_keeps_document_order() {
        let idx = index(DOC);
        assert_eq!(
            paths(&idx, "$.paths[*][*]"),
            vec![
                "#/paths/~1pets/get",
                "#/paths/~1pets/post",
                "#/paths/~1store/get"
            ]
        );
    }

    #[test]
    fn recursive_descent_finds_keys_at_any_depth() {
        let idx = index(DOC);
        assert_eq!(
            paths(&idx, "$..operationId"),
            vec![
                "#/paths/~1pets/get/operationId",
                "#/paths/~1pets/post/operationId",
                "#/paths/~1store/get/operationId"
            ]
        );
        assert_eq!(paths(&idx, "$.tags..*").len(), 4);
    }

    #[test]
    fn descendant_brackets() {
        assert_eq!(
            Selector::parse("$..[0]").unwrap().segments(),
            &[Segment::DescendantIndex(0)]
        );
        assert_eq!(
            Selector::parse("$..['tags']").unwrap().segments(),
            &[Segment::Descendant(Some("tags".to_string()))]
        );
        assert_eq!(
            Selector::parse("$..[*]").unwrap().segments(),
            &[Segment::Descendant(None)]
        );
    }

    #[test]
    fn descendant_index_picks_elements_at_any_depth() {
        let idx = index(DOC);
        assert_eq!(
            paths(&idx, "$..[0]"),
            vec!["#/tags/0", "#/paths/~1pets/get/tags/0"]
        );
        assert_eq!(paths(&idx, "$..[-1].name"), vec!["#/tags/1/name"]);
    }

    #[test]
    fn overlapping_matches_are_deduplicated() {
        let idx = index(DOC);
        let matches = select("$..get..operationId", &idx);
        assert_eq!(matches.len(), 2);
        let wide = select("$..*..operationId", &idx);
        assert_eq!(wide.len(), 3);
    }

    #[test]
    fn no_match_and_bad_expression_are_empty() {
        let idx = index(DOC);
        assert!(select("$.components.schemas", &idx).is_empty());
        assert!(select("not a selector", &idx).is_empty());
    }
}
