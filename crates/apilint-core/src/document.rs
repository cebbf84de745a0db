//! Document parsing and spec-type classification.
//!
//! Raw bytes are turned into a [`NodeTree`] through `marked-yaml`, which
//! keeps source positions for every node. JSON-shaped input (trimmed text
//! starting with `{` and ending with `}`) is first checked with `serde_json`
//! so JSON syntax errors are reported as JSON errors.
//!
//! Classification looks at the top-level `openapi`, `swagger` and
//! `asyncapi` keys and happens once, before indexing.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::tree::{NodeId, NodeKind, NodeTree, Position, ScalarKind, Span};

/// Errors raised before a document can be indexed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The input contained no bytes (or only whitespace).
    #[error("specification is empty")]
    Empty,

    /// The input is not valid JSON or YAML.
    #[error("unable to parse specification: {0}")]
    Parse(String),

    /// No recognized top-level spec-type key.
    #[error("spec type not supported, expected one of 'openapi', 'swagger' or 'asyncapi'")]
    UnknownSpecType,

    /// `openapi` key with a major version below 3.
    #[error("spec is defined as an openapi spec, but is using a swagger (2.0), or unknown version '{version}'")]
    OpenApiVersion {
        /// Declared version.
        version: String,
    },

    /// `swagger` key with a major version above 2.
    #[error("spec is defined as a swagger (openapi 2.0) spec, but is an openapi 3 or unknown version '{version}'")]
    SwaggerVersion {
        /// Declared version.
        version: String,
    },

    /// `asyncapi` key with a major version above 2.
    #[error("spec is defined as asyncapi, but has a major version that is invalid '{version}'")]
    AsyncApiVersion {
        /// Declared version.
        version: String,
    },
}

/// The family of API description a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecType {
    /// OpenAPI 3.x.
    OpenApi,
    /// Swagger / OpenAPI 2.0.
    Swagger,
    /// AsyncAPI.
    AsyncApi,
}

impl SpecType {
    /// Returns the top-level document key that declares this spec type.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::OpenApi => "openapi",
            Self::Swagger => "swagger",
            Self::AsyncApi => "asyncapi",
        }
    }

    /// Parses a rule-set format name (`oas3`, `oas2`, `asyncapi`, or a spec key).
    #[must_use]
    pub fn from_format(name: &str) -> Option<Self> {
        match name {
            "oas3" | "openapi" => Some(Self::OpenApi),
            "oas2" | "swagger" => Some(Self::Swagger),
            "asyncapi" | "asyncapi2" => Some(Self::AsyncApi),
            _ => None,
        }
    }
}

impl fmt::Display for SpecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The syntax a document was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// JSON text.
    Json,
    /// YAML text.
    Yaml,
}

/// Result of classifying a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecInfo {
    /// Detected spec family.
    pub spec_type: SpecType,
    /// Declared version text (e.g. `3.1.0`).
    pub version: String,
    /// Major version derived from the declared version.
    pub major: u32,
    /// Source syntax.
    pub format: DocumentFormat,
}

/// A parsed, not yet classified document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// The node tree.
    pub tree: NodeTree,
    /// The syntax the input was detected as.
    pub format: DocumentFormat,
}

/// A parsed and classified document, ready for indexing.
#[derive(Debug, Clone)]
pub struct Document {
    tree: Arc<NodeTree>,
    info: SpecInfo,
}

impl Document {
    /// Parses and classifies raw document bytes.
    ///
    /// # Errors
    ///
    /// Returns an input error for empty or malformed input, or a
    /// classification error when the spec type cannot be determined.
    pub fn load(bytes: &[u8]) -> Result<Self, DocumentError> {
        let parsed = parse(bytes)?;
        let info = classify_tree(&parsed.tree, parsed.format)?;
        debug!(
            "Classified document as {} {} ({:?})",
            info.spec_type, info.version, info.format
        );
        Ok(Self {
            tree: Arc::new(parsed.tree),
            info,
        })
    }

    /// Returns the shared node tree.
    #[must_use]
    pub fn tree(&self) -> &Arc<NodeTree> {
        &self.tree
    }

    /// Returns the classification result.
    #[must_use]
    pub fn info(&self) -> &SpecInfo {
        &self.info
    }
}

/// Parses raw bytes into a node tree.
///
/// # Errors
///
/// Returns [`DocumentError::Empty`] for empty input and
/// [`DocumentError::Parse`] with the underlying message for syntax errors.
pub fn parse(bytes: &[u8]) -> Result<ParsedDocument, DocumentError> {
    if bytes.is_empty() {
        return Err(DocumentError::Empty);
    }
    let text = std::str::from_utf8(bytes).map_err(|e| DocumentError::Parse(e.to_string()))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DocumentError::Empty);
    }

    let format = if trimmed.starts_with('{') && trimmed.ends_with('}') {
        serde_json::from_str::<serde_json::Value>(trimmed)
            .map_err(|e| DocumentError::Parse(e.to_string()))?;
        DocumentFormat::Json
    } else {
        DocumentFormat::Yaml
    };

    let root =
        marked_yaml::parse_yaml(0, text).map_err(|e| DocumentError::Parse(e.to_string()))?;
    let mut tree = NodeTree::new();
    let root_id = lower(&mut tree, &root);
    tree.set_root(root_id);

    Ok(ParsedDocument { tree, format })
}

/// Parses and classifies raw bytes.
///
/// # Errors
///
/// See [`Document::load`].
pub fn classify(bytes: &[u8]) -> Result<SpecInfo, DocumentError> {
    let parsed = parse(bytes)?;
    classify_tree(&parsed.tree, parsed.format)
}

/// Classifies an already parsed tree.
///
/// Keys are checked in the order `openapi`, `swagger`, `asyncapi`; a later
/// match replaces an earlier one. A null value counts as absent.
///
/// # Errors
///
/// Returns the matching classification error.
pub fn classify_tree(tree: &NodeTree, format: DocumentFormat) -> Result<SpecInfo, DocumentError> {
    let root = tree.root().ok_or(DocumentError::Empty)?;
    let mut info: Option<SpecInfo> = None;

    for spec_type in [SpecType::OpenApi, SpecType::Swagger, SpecType::AsyncApi] {
        let Some(node) = tree.mapping_get(root, spec_type.key()) else {
            continue;
        };
        let Some((version, major)) = version_data(tree, node) else {
            continue;
        };

        match spec_type {
            SpecType::OpenApi if major < 3 => return Err(DocumentError::OpenApiVersion { version }),
            SpecType::Swagger if major > 2 => return Err(DocumentError::SwaggerVersion { version }),
            SpecType::AsyncApi if major > 2 => {
                return Err(DocumentError::AsyncApiVersion { version })
            }
            _ => {}
        }

        info = Some(SpecInfo {
            spec_type,
            version,
            major,
            format,
        });
    }

    info.ok_or(DocumentError::UnknownSpecType)
}

/// Extracts the declared version text and its major version.
///
/// Returns `None` for a null value. Boolean versions and values without a
/// leading digit map to major version 0.
fn version_data(tree: &NodeTree, node: NodeId) -> Option<(String, u32)> {
    match &tree.get(node)?.kind {
        NodeKind::Scalar(scalar) => match scalar.kind {
            ScalarKind::Null => None,
            ScalarKind::Bool => Some((scalar.value.clone(), 0)),
            _ => {
                let version = scalar.value.trim().to_string();
                let major = leading_number(&version);
                Some((version, major))
            }
        },
        NodeKind::Sequence(_) => Some(("multiple versions detected".to_string(), 0)),
        NodeKind::Mapping(_) => Some(("unknown".to_string(), 0)),
    }
}

fn leading_number(text: &str) -> u32 {
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Quoted scalars stay strings; plain ones are typed by their text.
fn lower_scalar(tree: &mut NodeTree, scalar: &marked_yaml::types::MarkedScalarNode) -> NodeId {
    let span = span_of(scalar.span());
    if scalar.may_coerce() {
        tree.add_scalar(scalar.as_str(), span)
    } else {
        tree.add_string(scalar.as_str(), span)
    }
}

fn lower(tree: &mut NodeTree, node: &marked_yaml::Node) -> NodeId {
    match node {
        marked_yaml::Node::Scalar(scalar) => lower_scalar(tree, scalar),
        marked_yaml::Node::Mapping(mapping) => {
            let id = tree.add_mapping(span_of(mapping.span()));
            for (key, value) in mapping.iter() {
                let key_id = lower_scalar(tree, key);
                let value_id = lower(tree, value);
                tree.push_entry(id, key_id, value_id);
            }
            id
        }
        marked_yaml::Node::Sequence(sequence) => {
            let id = tree.add_sequence(span_of(sequence.span()));
            for item in sequence.iter() {
                let item_id = lower(tree, item);
                tree.push_item(id, item_id);
            }
            id
        }
    }
}

fn span_of(span: &marked_yaml::Span) -> Span {
    let start = span
        .start()
        .map(|m| Position::new(m.line(), m.column()))
        .unwrap_or_default();
    let end = span
        .end()
        .map_or(start, |m| Position::new(m.line(), m.column()));
    Span::new(start, end)
}

/// Converts a 1-indexed line/column into a byte offset within `content`.
///
/// Out-of-range lines clamp to the end of the content.
#[must_use]
pub fn offset_for(content: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }

    let mut offset = 0;
    for (i, line_content) in content.split('\n').enumerate() {
        if i + 1 == line {
            let col_bytes: usize = line_content
                .chars()
                .take(column.saturating_sub(1))
                .map(char::len_utf8)
                .sum();
            return offset + col_bytes;
        }
        offset += line_content.len() + 1;
    }

    content.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;

    const OPENAPI_WAT: &str = "openapi: 3.2
info:
  title: Test API, valid, but not quite valid
servers:
  - url: http://quobix.com/api";

    #[test]
    fn empty_input_is_rejected() {
        let err = classify(b"").unwrap_err();
        assert_eq!(err, DocumentError::Empty);
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn whitespace_input_is_rejected() {
        assert_eq!(classify(b"  \n\t ").unwrap_err(), DocumentError::Empty);
    }

    #[test]
    fn openapi_three_two_classifies() {
        let info = classify(OPENAPI_WAT.as_bytes()).unwrap();
        assert_eq!(info.spec_type, SpecType::OpenApi);
        assert_eq!(info.version, "3.2");
        assert_eq!(info.major, 3);
        assert_eq!(info.format, DocumentFormat::Yaml);
    }

    #[test]
    fn swagger_version_under_openapi_key_is_rejected() {
        let err = classify(b"openapi: \"2.0\"\ninfo:\n  title: nope").unwrap_err();
        assert!(matches!(err, DocumentError::OpenApiVersion { .. }));
    }

    #[test]
    fn openapi_three_under_swagger_key_is_rejected() {
        let err = classify(b"swagger: 3.0.1\n").unwrap_err();
        assert!(matches!(err, DocumentError::SwaggerVersion { .. }));
    }

    #[test]
    fn asyncapi_three_is_rejected() {
        let err = classify(b"asyncapi: 3.0.0\n").unwrap_err();
        assert!(matches!(err, DocumentError::AsyncApiVersion { .. }));
    }

    #[test]
    fn asyncapi_two_classifies() {
        let info = classify(b"asyncapi: 2.4.0\nchannels: {}\n").unwrap();
        assert_eq!(info.spec_type, SpecType::AsyncApi);
        assert_eq!(info.version, "2.4.0");
    }

    #[test]
    fn swagger_two_classifies() {
        let info = classify(b"swagger: \"2.0\"\npaths: {}\n").unwrap();
        assert_eq!(info.spec_type, SpecType::Swagger);
        assert_eq!(info.major, 2);
    }

    #[test]
    fn json_input_is_detected() {
        let info = classify(br#"{"openapi": "3.1.0", "paths": {}}"#).unwrap();
        assert_eq!(info.spec_type, SpecType::OpenApi);
        assert_eq!(info.format, DocumentFormat::Json);
        assert_eq!(info.version, "3.1.0");
    }

    #[test]
    fn malformed_json_surfaces_parse_error() {
        let err = classify(br#"{"openapi": "3.1.0",}"#).unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
        assert!(err.to_string().starts_with("unable to parse specification"));
    }

    #[test]
    fn unknown_spec_type() {
        let err = classify(b"info:\n  title: what am i\n").unwrap_err();
        assert_eq!(err, DocumentError::UnknownSpecType);
    }

    #[test]
    fn boolean_version_maps_to_major_zero() {
        // swagger accepts any major <= 2, so a boolean version still classifies
        let info = classify(b"swagger: true\n").unwrap();
        assert_eq!(info.major, 0);
        assert_eq!(info.version, "true");

        let err = classify(b"openapi: false\n").unwrap_err();
        assert!(matches!(err, DocumentError::OpenApiVersion { .. }));
    }

    #[test]
    fn quoted_scalars_stay_strings() {
        let parsed = parse(b"plain: true\nquoted: \"true\"\nnumber: '3'\n").unwrap();
        let tree = &parsed.tree;
        let root = tree.root().unwrap();
        let kind = |key: &str| {
            let node = tree.mapping_get(root, key).unwrap();
            match tree.get(node) {
                Some(Node {
                    kind: NodeKind::Scalar(scalar),
                    ..
                }) => scalar.kind,
                other => panic!("expected a scalar, got {other:?}"),
            }
        };
        assert_eq!(kind("plain"), ScalarKind::Bool);
        assert_eq!(kind("quoted"), ScalarKind::String);
        assert_eq!(kind("number"), ScalarKind::String);

        // a quoted null is a version string, not a missing version
        let info = classify(b"swagger: \"~\"\n").unwrap();
        assert_eq!(info.version, "~");
        assert_eq!(info.major, 0);
    }

    #[test]
    fn null_version_counts_as_absent() {
        let err = classify(b"openapi: ~\ninfo: {}\n").unwrap_err();
        assert_eq!(err, DocumentError::UnknownSpecType);
    }

    #[test]
    fn parse_keeps_document_order() {
        let parsed = parse(b"b: 1\na: 2\n").unwrap();
        let tree = &parsed.tree;
        let root = tree.root().unwrap();
        let keys: Vec<&str> = tree
            .entries(root)
            .iter()
            .filter_map(|(k, _)| tree.scalar_str(*k))
            .collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn parse_records_lines() {
        let parsed = parse(b"a: 1\nb:\n  c: 2\n").unwrap();
        let tree = &parsed.tree;
        let root = tree.root().unwrap();
        let b = tree.mapping_get(root, "b").unwrap();
        let c = tree.mapping_get(b, "c").unwrap();
        assert_eq!(tree.get(c).unwrap().span.start.line, 3);
    }

    #[test]
    fn offset_calculation() {
        let content = "line1\nline2\nline3";
        assert_eq!(offset_for(content, 1, 1), 0);
        assert_eq!(offset_for(content, 2, 1), 6);
        assert_eq!(offset_for(content, 2, 3), 8);
        assert_eq!(offset_for(content, 9, 1), content.len());
    }
}
