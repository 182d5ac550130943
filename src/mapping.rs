//! Declarative field-mapping tables.
//!
//! A mapping table is a nested structure `tag → indicator → subfield id →
//! rule`, authored externally as JSON. Each level may stop early:
//!
//! - `null` drops whatever it matched (field, indicator group or subfield)
//! - a string is a [`RewriteTarget`] applied to everything below it
//! - an object descends one level
//!
//! The empty key `""` stands for the whole value of a control field (or of
//! a data field without subfields).
//!
//! ```json
//! {
//!   "mab2marc": {
//!     "100": null,
//!     "331": { " ": { "a": ">245$10$a", "b": "245$$b" } },
//!     "002": { "": "008" }
//!   }
//! }
//! ```
//!
//! Rules are parsed once when the tables are loaded; the mapper only walks
//! the resulting [`RewriteRule`] tree.

use crate::error::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Placeholder in a rewrite target that is replaced by the repeat counter.
pub const REPEAT_PLACEHOLDER: &str = "{r}";

/// Key that matches the whole value of a field without subfields.
pub const WHOLE_FIELD_KEY: &str = "";

/// How a mapped field is combined with its neighbours on emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Emit the field unchanged
    Keep,
    /// Emit nothing
    Skip,
    /// Add to the currently open target field, or emit standalone
    Append,
    /// Start a new target field
    Open,
    /// Add to the currently open target field and finish it
    Close,
}

impl Operation {
    /// Whether the operation produces a rewritten field.
    #[must_use]
    pub fn is_rewrite(self) -> bool {
        matches!(self, Operation::Append | Operation::Open | Operation::Close)
    }
}

/// Parsed form of `"op" + newtag + "$" + newindicator + "$" + newsubfield`.
///
/// Empty parts keep the corresponding value of the input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteTarget {
    /// Open, Close or Append
    pub operation: Operation,
    /// New tag
    pub tag: String,
    /// New indicator, possibly containing [`REPEAT_PLACEHOLDER`]
    pub indicator: String,
    /// New subfield id
    pub subfield: String,
}

impl RewriteTarget {
    /// Parse a rewrite string.
    ///
    /// A leading `'>'` selects [`Operation::Open`], `'<'` selects
    /// [`Operation::Close`]; any other first character belongs to the tag and
    /// selects [`Operation::Append`]. Missing `$` separators leave indicator
    /// and subfield empty, which degrades to a tag-only rewrite.
    #[must_use]
    pub fn parse(rule: &str) -> Self {
        let (operation, rest) = match rule.chars().next() {
            Some('>') => (Operation::Open, &rule[1..]),
            Some('<') => (Operation::Close, &rule[1..]),
            _ => (Operation::Append, rule),
        };
        let mut parts = rest.splitn(3, '$');
        let tag = parts.next().unwrap_or_default().to_string();
        let indicator = parts.next().unwrap_or_default().to_string();
        let subfield = parts.next().unwrap_or_default().to_string();
        RewriteTarget {
            operation,
            tag,
            indicator,
            subfield,
        }
    }

    /// Resolve the tag against the input tag.
    #[must_use]
    pub fn resolve_tag(&self, original: &str) -> String {
        if self.tag.is_empty() {
            original.to_string()
        } else {
            self.tag.clone()
        }
    }

    /// Resolve the indicator, interpolating the repeat counter.
    #[must_use]
    pub fn resolve_indicator(&self, original: &str, repeat: usize) -> String {
        if self.indicator.is_empty() {
            original.to_string()
        } else {
            self.indicator
                .replace(REPEAT_PLACEHOLDER, &repeat.to_string())
        }
    }

    /// Resolve the subfield id.
    #[must_use]
    pub fn resolve_subfield(&self, original: Option<char>) -> Option<char> {
        self.subfield.chars().next().or(original)
    }
}

impl fmt::Display for RewriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation {
            Operation::Open => f.write_str(">")?,
            Operation::Close => f.write_str("<")?,
            _ => {},
        }
        write!(f, "{}${}${}", self.tag, self.indicator, self.subfield)
    }
}

/// One node of a mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteRule {
    /// Drop what this node matched
    Drop,
    /// Rewrite what this node matched
    Rewrite(RewriteTarget),
    /// Descend by the next key (indicator, then subfield id)
    Nested(IndexMap<String, RewriteRule>),
}

impl RewriteRule {
    /// Look up a child by key; `None` for leaves and missing keys.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RewriteRule> {
        match self {
            RewriteRule::Nested(children) => children.get(key),
            _ => None,
        }
    }
}

/// Wire form of a rule before target strings are parsed.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRule {
    Drop(()),
    Rewrite(String),
    Nested(IndexMap<String, RawRule>),
}

impl From<RawRule> for RewriteRule {
    fn from(raw: RawRule) -> Self {
        match raw {
            RawRule::Drop(()) => RewriteRule::Drop,
            RawRule::Rewrite(rule) => RewriteRule::Rewrite(RewriteTarget::parse(&rule)),
            RawRule::Nested(children) => RewriteRule::Nested(
                children
                    .into_iter()
                    .map(|(key, child)| (key, child.into()))
                    .collect(),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for RewriteRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        RawRule::deserialize(deserializer).map(Into::into)
    }
}

/// One mapping table: tag → rule.
pub type MappingTable = IndexMap<String, RewriteRule>;

/// Named mapping tables in priority order.
///
/// The first table containing a field's tag decides the outcome for that
/// field; later tables are not consulted. Tables are read-only once built
/// and can be shared between mapper instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct MappingTables {
    tables: IndexMap<String, MappingTable>,
}

impl MappingTables {
    /// Create an empty set of tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load tables from JSON, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::ConfigError`](crate::MarcError::ConfigError) if the
    /// JSON is malformed or a node is neither `null`, a string nor an object.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load tables from a JSON source.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::ConfigError`](crate::MarcError::ConfigError) if the
    /// JSON is malformed or cannot be read.
    pub fn from_json_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Append a table at the lowest priority.
    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>, table: MappingTable) -> Self {
        self.tables.insert(name.into(), table);
        self
    }

    /// Whether no table is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Find the first table that has a rule for `tag`.
    #[must_use]
    pub fn lookup(&self, tag: &str) -> Option<(&str, &RewriteRule)> {
        self.tables
            .iter()
            .find_map(|(name, table)| table.get(tag).map(|rule| (name.as_str(), rule)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_open() {
        let target = RewriteTarget::parse(">200$$a");
        assert_eq!(target.operation, Operation::Open);
        assert_eq!(target.tag, "200");
        assert_eq!(target.indicator, "");
        assert_eq!(target.subfield, "a");
    }

    #[test]
    fn test_parse_close_and_append() {
        let close = RewriteTarget::parse("<700$1 $e");
        assert_eq!(close.operation, Operation::Close);
        assert_eq!(close.indicator, "1 ");

        let append = RewriteTarget::parse("245$10$b");
        assert_eq!(append.operation, Operation::Append);
        assert_eq!(append.tag, "245");
    }

    #[test]
    fn test_parse_tag_only_fallback() {
        let target = RewriteTarget::parse("008");
        assert_eq!(target.operation, Operation::Append);
        assert_eq!(target.tag, "008");
        assert_eq!(target.resolve_indicator("ab", 0), "ab");
        assert_eq!(target.resolve_subfield(Some('x')), Some('x'));
    }

    #[test]
    fn test_repeat_placeholder() {
        let target = RewriteTarget::parse(">960${r}$a");
        assert_eq!(target.indicator, "{r}");
        assert_eq!(target.resolve_indicator(" ", 3), "3");
        assert_eq!(target.resolve_subfield(Some('b')), Some('a'));
    }

    #[test]
    fn test_display() {
        assert_eq!(RewriteTarget::parse(">960${r}$a").to_string(), ">960${r}$a");
        assert_eq!(RewriteTarget::parse("008").to_string(), "008$$");
    }

    #[test]
    fn test_load_tables_preserves_order() {
        let json = r#"{
            "first": { "100": null },
            "second": {
                "100": ">200$$a",
                "331": { " ": { "a": "245$10$a", "b": null } },
                "002": { "": "008" }
            }
        }"#;
        let tables = MappingTables::from_json_str(json).unwrap();
        assert_eq!(tables.len(), 2);

        let (name, rule) = tables.lookup("100").unwrap();
        assert_eq!(name, "first");
        assert_eq!(rule, &RewriteRule::Drop);

        let (name, rule) = tables.lookup("331").unwrap();
        assert_eq!(name, "second");
        let sub_b = rule.get(" ").and_then(|r| r.get("b"));
        assert_eq!(sub_b, Some(&RewriteRule::Drop));

        let whole = tables.lookup("002").unwrap().1.get(WHOLE_FIELD_KEY);
        assert!(matches!(whole, Some(RewriteRule::Rewrite(t)) if t.tag == "008"));

        assert!(tables.lookup("999").is_none());
    }

    #[test]
    fn test_invalid_node_is_config_error() {
        let result = MappingTables::from_json_str(r#"{ "t": { "100": 5 } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_with_table() {
        let mut table = MappingTable::new();
        table.insert("100".to_string(), RewriteRule::Drop);
        let tables = MappingTables::new().with_table("t", table);
        assert_eq!(tables.lookup("100").map(|(n, _)| n), Some("t"));
    }
}
