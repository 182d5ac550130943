//! Transient record structure.
//!
//! A [`Record`] lives for exactly one parse pass: the mapper fills it while
//! events arrive and drains it in `emit_record`. [`RecordCollector`] keeps
//! finished ones around for callers that want whole records.
//!
//! [`RecordCollector`]: crate::listener::RecordCollector

use crate::error::Result;
use crate::field::MarcField;
use crate::listener::MarcListener;
use serde::{Deserialize, Serialize};

/// One bibliographic record: label, control fields and data fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Output format announced with `begin_record`
    pub format: String,
    /// Record type announced with `begin_record`
    pub record_type: String,
    /// Record label
    pub label: String,
    /// Control fields in arrival order
    pub control_fields: Vec<MarcField>,
    /// Data fields in arrival order
    pub data_fields: Vec<MarcField>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new(format: &str, record_type: &str) -> Self {
        Record {
            format: format.to_string(),
            record_type: record_type.to_string(),
            ..Self::default()
        }
    }

    /// First control field with the given tag.
    #[must_use]
    pub fn get_control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields
            .iter()
            .find(|f| f.tag() == tag)
            .map(|f| f.head.data.as_str())
    }

    /// Iterate over data fields matching a tag.
    pub fn fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a MarcField> {
        self.data_fields.iter().filter(move |f| f.tag() == tag)
    }

    /// Whether the record holds no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.control_fields.is_empty() && self.data_fields.is_empty()
    }

    /// Replay this record as listener events.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by the listener.
    pub fn emit_to<L: MarcListener + ?Sized>(&self, listener: &mut L) -> Result<()> {
        listener.begin_record(&self.format, &self.record_type)?;
        listener.leader(&self.label)?;
        for field in &self.control_fields {
            field.emit_to(listener)?;
        }
        for field in &self.data_fields {
            field.emit_to(listener)?;
        }
        listener.end_record()
    }
}
