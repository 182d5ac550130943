//! The downstream consumer contract shared by readers and the mapper.
//!
//! Readers push events into a [`MarcListener`]; the
//! [`FieldMapper`](crate::mapper::FieldMapper) is itself a listener that
//! forwards to another one, so pipelines compose by nesting.
//!
//! For every record the event order is strictly:
//!
//! ```text
//! begin_record → leader → (begin_control_field → end_control_field)*
//!   → (begin_data_field → (begin_subfield → end_subfield)* → end_data_field)*
//!   → end_record
//! ```
//!
//! bracketed once per stream by `begin_collection` / `end_collection`.

use crate::error::{MarcError, Result};
use crate::field::{Field, MarcField};
use crate::record::Record;

/// Receiver of structural parse events.
///
/// Every method returns a [`Result`]; returning an error aborts the parse
/// and the error is propagated out of the reader's `parse` call.
pub trait MarcListener {
    /// Start of a multi-record stream.
    fn begin_collection(&mut self) -> Result<()> {
        Ok(())
    }

    /// End of a multi-record stream.
    fn end_collection(&mut self) -> Result<()> {
        Ok(())
    }

    /// Start of a record in the given output format and record type.
    fn begin_record(&mut self, format: &str, record_type: &str) -> Result<()>;

    /// The record label.
    fn leader(&mut self, label: &str) -> Result<()>;

    /// Start of a control field.
    fn begin_control_field(&mut self, field: &Field) -> Result<()>;

    /// End of a control field.
    fn end_control_field(&mut self, field: &Field) -> Result<()>;

    /// Start of a data field (head carries tag and indicator).
    fn begin_data_field(&mut self, field: &Field) -> Result<()>;

    /// End of a data field.
    fn end_data_field(&mut self, field: &Field) -> Result<()>;

    /// Start of a subfield.
    fn begin_subfield(&mut self, field: &Field) -> Result<()>;

    /// End of a subfield.
    fn end_subfield(&mut self, field: &Field) -> Result<()>;

    /// End of the current record.
    fn end_record(&mut self) -> Result<()>;
}

impl<L: MarcListener + ?Sized> MarcListener for &mut L {
    fn begin_collection(&mut self) -> Result<()> {
        (**self).begin_collection()
    }

    fn end_collection(&mut self) -> Result<()> {
        (**self).end_collection()
    }

    fn begin_record(&mut self, format: &str, record_type: &str) -> Result<()> {
        (**self).begin_record(format, record_type)
    }

    fn leader(&mut self, label: &str) -> Result<()> {
        (**self).leader(label)
    }

    fn begin_control_field(&mut self, field: &Field) -> Result<()> {
        (**self).begin_control_field(field)
    }

    fn end_control_field(&mut self, field: &Field) -> Result<()> {
        (**self).end_control_field(field)
    }

    fn begin_data_field(&mut self, field: &Field) -> Result<()> {
        (**self).begin_data_field(field)
    }

    fn end_data_field(&mut self, field: &Field) -> Result<()> {
        (**self).end_data_field(field)
    }

    fn begin_subfield(&mut self, field: &Field) -> Result<()> {
        (**self).begin_subfield(field)
    }

    fn end_subfield(&mut self, field: &Field) -> Result<()> {
        (**self).end_subfield(field)
    }

    fn end_record(&mut self) -> Result<()> {
        (**self).end_record()
    }
}

/// A listener event captured by [`EventRecorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarcEvent {
    /// `begin_collection`
    BeginCollection,
    /// `end_collection`
    EndCollection,
    /// `begin_record(format, type)`
    BeginRecord {
        /// Output format
        format: String,
        /// Record type
        record_type: String,
    },
    /// `leader(label)`
    Leader(String),
    /// `begin_control_field`
    BeginControlField(Field),
    /// `end_control_field`
    EndControlField(Field),
    /// `begin_data_field`
    BeginDataField(Field),
    /// `end_data_field`
    EndDataField(Field),
    /// `begin_subfield`
    BeginSubfield(Field),
    /// `end_subfield`
    EndSubfield(Field),
    /// `end_record`
    EndRecord,
}

/// Listener that stores every event in order.
#[derive(Debug, Default)]
pub struct EventRecorder {
    /// Captured events
    pub events: Vec<MarcEvent>,
}

impl EventRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `begin_record` events seen.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, MarcEvent::BeginRecord { .. }))
            .count()
    }

    /// Tags of all control fields, in emission order.
    #[must_use]
    pub fn control_tags(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                MarcEvent::BeginControlField(f) => Some(f.tag.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tags of all data fields, in emission order.
    #[must_use]
    pub fn data_tags(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                MarcEvent::BeginDataField(f) => Some(f.tag.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl MarcListener for EventRecorder {
    fn begin_collection(&mut self) -> Result<()> {
        self.events.push(MarcEvent::BeginCollection);
        Ok(())
    }

    fn end_collection(&mut self) -> Result<()> {
        self.events.push(MarcEvent::EndCollection);
        Ok(())
    }

    fn begin_record(&mut self, format: &str, record_type: &str) -> Result<()> {
        self.events.push(MarcEvent::BeginRecord {
            format: format.to_string(),
            record_type: record_type.to_string(),
        });
        Ok(())
    }

    fn leader(&mut self, label: &str) -> Result<()> {
        self.events.push(MarcEvent::Leader(label.to_string()));
        Ok(())
    }

    fn begin_control_field(&mut self, field: &Field) -> Result<()> {
        self.events.push(MarcEvent::BeginControlField(field.clone()));
        Ok(())
    }

    fn end_control_field(&mut self, field: &Field) -> Result<()> {
        self.events.push(MarcEvent::EndControlField(field.clone()));
        Ok(())
    }

    fn begin_data_field(&mut self, field: &Field) -> Result<()> {
        self.events.push(MarcEvent::BeginDataField(field.clone()));
        Ok(())
    }

    fn end_data_field(&mut self, field: &Field) -> Result<()> {
        self.events.push(MarcEvent::EndDataField(field.clone()));
        Ok(())
    }

    fn begin_subfield(&mut self, field: &Field) -> Result<()> {
        self.events.push(MarcEvent::BeginSubfield(field.clone()));
        Ok(())
    }

    fn end_subfield(&mut self, field: &Field) -> Result<()> {
        self.events.push(MarcEvent::EndSubfield(field.clone()));
        Ok(())
    }

    fn end_record(&mut self) -> Result<()> {
        self.events.push(MarcEvent::EndRecord);
        Ok(())
    }
}

/// Listener that assembles complete [`Record`]s.
#[derive(Debug, Default)]
pub struct RecordCollector {
    /// Finished records
    pub records: Vec<Record>,
    current: Option<Record>,
    open_field: Option<MarcField>,
}

impl RecordCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&mut self) -> Result<&mut Record> {
        self.current
            .as_mut()
            .ok_or_else(|| MarcError::ListenerError("field event outside of a record".to_string()))
    }
}

impl MarcListener for RecordCollector {
    fn begin_record(&mut self, format: &str, record_type: &str) -> Result<()> {
        self.current = Some(Record::new(format, record_type));
        Ok(())
    }

    fn leader(&mut self, label: &str) -> Result<()> {
        self.current()?.label = label.to_string();
        Ok(())
    }

    fn begin_control_field(&mut self, _field: &Field) -> Result<()> {
        Ok(())
    }

    fn end_control_field(&mut self, field: &Field) -> Result<()> {
        self.current()?
            .control_fields
            .push(MarcField::new(field.clone()));
        Ok(())
    }

    fn begin_data_field(&mut self, field: &Field) -> Result<()> {
        self.open_field = Some(MarcField::new(field.clone()));
        Ok(())
    }

    fn end_data_field(&mut self, field: &Field) -> Result<()> {
        let finished = self
            .open_field
            .take()
            .unwrap_or_else(|| MarcField::new(field.clone()));
        self.current()?.data_fields.push(finished);
        Ok(())
    }

    fn begin_subfield(&mut self, _field: &Field) -> Result<()> {
        Ok(())
    }

    fn end_subfield(&mut self, field: &Field) -> Result<()> {
        match self.open_field.as_mut() {
            Some(open) => {
                open.subfields.push(field.clone());
                Ok(())
            },
            None => Err(MarcError::ListenerError(
                "subfield outside of a data field".to_string(),
            )),
        }
    }

    fn end_record(&mut self) -> Result<()> {
        if let Some(record) = self.current.take() {
            self.records.push(record);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_captures_field_events() {
        let mut recorder = EventRecorder::new();
        recorder.begin_record("MARC21", "Bibliographic").unwrap();
        recorder.leader("00000nam a2200000 i 4500").unwrap();
        MarcField::control("001", "42").emit_to(&mut recorder).unwrap();
        MarcField::data("245", "10", &[('a', "Title")])
            .emit_to(&mut recorder)
            .unwrap();
        recorder.end_record().unwrap();

        assert_eq!(recorder.record_count(), 1);
        assert_eq!(recorder.control_tags(), vec!["001"]);
        assert_eq!(recorder.data_tags(), vec!["245"]);
        assert_eq!(recorder.events.len(), 9);
        assert_eq!(recorder.events.last(), Some(&MarcEvent::EndRecord));
    }

    #[test]
    fn test_collector_builds_records() {
        let mut collector = RecordCollector::new();
        {
            let listener: &mut dyn MarcListener = &mut collector;
            listener.begin_record("MAB", "h").unwrap();
            listener.leader("00000nM2.01200000      h").unwrap();
            MarcField::control("001", "1").emit_to(listener).unwrap();
            MarcField::data("331", " ", &[('a', "Title")])
                .emit_to(listener)
                .unwrap();
            listener.end_record().unwrap();
        }

        assert_eq!(collector.records.len(), 1);
        let record = &collector.records[0];
        assert_eq!(record.format, "MAB");
        assert_eq!(record.control_fields.len(), 1);
        assert_eq!(record.data_fields[0].subfield_data('a'), Some("Title"));
    }

    #[test]
    fn test_collector_rejects_orphan_field() {
        let mut collector = RecordCollector::new();
        let result = collector.end_control_field(&Field::control("001", "1"));
        assert!(matches!(result, Err(MarcError::ListenerError(_))));
    }
}
