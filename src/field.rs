//! Field value objects shared by the readers, the mapper and listeners.
//!
//! - [`Field`] — one tag/indicator/subfield-id/data tuple
//! - [`FieldList`] — the ordered subfields of one field occurrence
//! - [`MarcField`] — a complete field occurrence (head plus subfields)
//!
//! A control field is a [`MarcField`] whose head carries the data and whose
//! subfield list is empty. A data field keeps its tag and indicator on the
//! head and one [`Field`] per subfield in the list.

use crate::error::Result;
use crate::listener::MarcListener;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Tag of the record-number control field.
pub const RECORD_NUMBER_TAG: &str = "001";

/// Sentinel tag that malformed tags are coerced to when tag cleaning is on.
pub const INVALID_TAG: &str = "999";

/// Check whether a tag is three ASCII alphanumeric characters.
#[must_use]
pub fn is_valid_tag(tag: &str) -> bool {
    tag.len() == 3 && tag.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Normalize a tag, coercing anything malformed to [`INVALID_TAG`].
#[must_use]
pub fn clean_tag(tag: &str) -> &str {
    if is_valid_tag(tag) {
        tag
    } else {
        INVALID_TAG
    }
}

/// Check whether a tag lies in the reserved control-field range `000`-`009`.
#[must_use]
pub fn is_control_tag(tag: &str) -> bool {
    tag.len() == 3 && tag.starts_with("00") && tag.as_bytes()[2].is_ascii_digit()
}

/// A single tag + indicator + subfield id + data value.
///
/// Fields are immutable by convention: the `with_*` methods return a new
/// value instead of modifying the receiver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Field tag (3 characters once normalized)
    pub tag: String,
    /// Indicator, 0-2 characters depending on the dialect
    pub indicator: String,
    /// Subfield identifier, absent on field heads and control fields
    pub subfield_id: Option<char>,
    /// Decoded payload
    pub data: String,
}

impl Field {
    /// Create a control field.
    #[must_use]
    pub fn control(tag: impl Into<String>, data: impl Into<String>) -> Self {
        Field {
            tag: tag.into(),
            indicator: String::new(),
            subfield_id: None,
            data: data.into(),
        }
    }

    /// Create the head of a data field.
    #[must_use]
    pub fn data_field(tag: impl Into<String>, indicator: impl Into<String>) -> Self {
        Field {
            tag: tag.into(),
            indicator: indicator.into(),
            subfield_id: None,
            data: String::new(),
        }
    }

    /// Create a subfield belonging to the given head.
    #[must_use]
    pub fn subfield(head: &Field, code: char, data: impl Into<String>) -> Self {
        Field {
            tag: head.tag.clone(),
            indicator: head.indicator.clone(),
            subfield_id: Some(code),
            data: data.into(),
        }
    }

    /// Copy with a different tag.
    #[must_use]
    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        Field {
            tag: tag.into(),
            ..self.clone()
        }
    }

    /// Copy with a different indicator.
    #[must_use]
    pub fn with_indicator(&self, indicator: impl Into<String>) -> Self {
        Field {
            indicator: indicator.into(),
            ..self.clone()
        }
    }

    /// Copy with a different subfield id.
    #[must_use]
    pub fn with_subfield_id(&self, subfield_id: Option<char>) -> Self {
        Field {
            subfield_id,
            ..self.clone()
        }
    }

    /// Copy with different data.
    #[must_use]
    pub fn with_data(&self, data: impl Into<String>) -> Self {
        Field {
            data: data.into(),
            ..self.clone()
        }
    }

    /// Whether this field's tag is in the control-field range.
    #[must_use]
    pub fn is_control(&self) -> bool {
        is_control_tag(&self.tag)
    }

    /// Whether this field is the record-number control field.
    #[must_use]
    pub fn is_record_number(&self) -> bool {
        self.tag == RECORD_NUMBER_TAG
    }

    /// Subfield id as a lookup key; the empty string when absent.
    #[must_use]
    pub fn subfield_key(&self) -> String {
        self.subfield_id.map(String::from).unwrap_or_default()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)?;
        if !self.indicator.is_empty() {
            write!(f, "${}", self.indicator)?;
        }
        if let Some(code) = self.subfield_id {
            write!(f, "${code}")?;
        }
        write!(f, ":{}", self.data)
    }
}

/// The ordered subfields of one field occurrence.
///
/// Subfield order is meaningful (citation display depends on it), so the
/// list only ever appends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldList {
    fields: SmallVec<[Field; 4]>,
}

impl FieldList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subfield.
    pub fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Number of subfields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the list has no subfields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    /// First subfield with the given code.
    #[must_use]
    pub fn get(&self, code: char) -> Option<&Field> {
        self.fields.iter().find(|f| f.subfield_id == Some(code))
    }
}

impl FromIterator<Field> for FieldList {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        FieldList {
            fields: iter.into_iter().collect(),
        }
    }
}

impl Extend<Field> for FieldList {
    fn extend<I: IntoIterator<Item = Field>>(&mut self, iter: I) {
        self.fields.extend(iter);
    }
}

impl<'a> IntoIterator for &'a FieldList {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl IntoIterator for FieldList {
    type Item = Field;
    type IntoIter = smallvec::IntoIter<[Field; 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// One complete field occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarcField {
    /// Tag, indicator and (for control or unsubfielded fields) the data
    pub head: Field,
    /// Subfields in arrival order
    pub subfields: FieldList,
}

impl MarcField {
    /// Wrap a head with no subfields.
    #[must_use]
    pub fn new(head: Field) -> Self {
        MarcField {
            head,
            subfields: FieldList::new(),
        }
    }

    /// Convenience constructor for a control field.
    #[must_use]
    pub fn control(tag: &str, data: &str) -> Self {
        Self::new(Field::control(tag, data))
    }

    /// Convenience constructor for a data field from `(code, value)` pairs.
    #[must_use]
    pub fn data(tag: &str, indicator: &str, subfields: &[(char, &str)]) -> Self {
        let head = Field::data_field(tag, indicator);
        let subfields = subfields
            .iter()
            .map(|(code, value)| Field::subfield(&head, *code, *value))
            .collect();
        MarcField { head, subfields }
    }

    /// Append a subfield, stamping it with this field's tag and indicator.
    pub fn add_subfield(&mut self, code: char, data: impl Into<String>) {
        let subfield = Field::subfield(&self.head, code, data);
        self.subfields.push(subfield);
    }

    /// Field tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.head.tag
    }

    /// Field indicator.
    #[must_use]
    pub fn indicator(&self) -> &str {
        &self.head.indicator
    }

    /// Whether this occurrence is a control field.
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.head.is_control() && self.subfields.is_empty()
    }

    /// Data of the first subfield with the given code.
    #[must_use]
    pub fn subfield_data(&self, code: char) -> Option<&str> {
        self.subfields.get(code).map(|f| f.data.as_str())
    }

    /// Push this field to a listener as begin/end events.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by the listener.
    pub fn emit_to<L: MarcListener + ?Sized>(&self, listener: &mut L) -> Result<()> {
        if self.is_control() {
            listener.begin_control_field(&self.head)?;
            listener.end_control_field(&self.head)?;
            return Ok(());
        }
        listener.begin_data_field(&self.head)?;
        for subfield in &self.subfields {
            listener.begin_subfield(subfield)?;
            listener.end_subfield(subfield)?;
        }
        listener.end_data_field(&self.head)
    }
}

impl fmt::Display for MarcField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subfields.is_empty() {
            return write!(f, "{}", self.head);
        }
        write!(f, "{}", self.head.tag)?;
        if !self.head.indicator.is_empty() {
            write!(f, "${}", self.head.indicator)?;
        }
        for subfield in &self.subfields {
            if let Some(code) = subfield.subfield_id {
                write!(f, "${code}")?;
            }
            write!(f, ":{}", subfield.data)?;
        }
        Ok(())
    }
}
