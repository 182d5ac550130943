//! Record-level field mapping.
//!
//! [`FieldMapper`] sits between a dialect reader and a downstream
//! [`MarcListener`]. It accumulates one record's fields, then on
//! `end_record` rewrites them through the configured [`MappingTables`] and
//! replays the result downstream with proper begin/end bracketing.
//!
//! # Per-record lifecycle
//!
//! ```text
//! IDLE → ACCUMULATING (set_record_label / add_control_field / add_data_field)
//!      → EMITTING (emit_record) → IDLE
//! ```
//!
//! `emit_record` takes `&mut self` and drains the accumulators before it
//! returns, so no field can be added to a record that is being emitted.
//!
//! # Example
//!
//! ```
//! use marcx::{EventRecorder, FieldMapper, MappingTables, MapperConfig, MarcField};
//!
//! # fn main() -> marcx::Result<()> {
//! let tables = MappingTables::from_json_str(r#"{ "t": { "100": null } }"#)?;
//! let config = MapperConfig::default().with_tables(tables);
//! let mut mapper = FieldMapper::new(config, EventRecorder::new(), Vec::new());
//!
//! mapper.set_record_label("00000nam a2200000 i 4500");
//! mapper.add_data_field(MarcField::data("100", "1 ", &[('a', "Someone")]));
//! mapper.add_data_field(MarcField::data("245", "10", &[('a', "Title")]));
//! mapper.emit_record("MARC21", "Bibliographic")?;
//!
//! let (recorder, _diagnostics) = mapper.into_inner();
//! assert_eq!(recorder.data_tags(), vec!["245"]);
//! # Ok(())
//! # }
//! ```

use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::error::Result;
use crate::field::{Field, FieldList, MarcField};
use crate::leader::RecordLabel;
use crate::listener::MarcListener;
use crate::mapping::{MappingTables, Operation, RewriteRule, RewriteTarget, WHOLE_FIELD_KEY};
use crate::record::Record;
use std::sync::Arc;

/// Mapper options.
#[derive(Debug, Clone, Default)]
pub struct MapperConfig {
    /// Format announced downstream; the reader's value if unset
    pub format: Option<String>,
    /// Record type announced downstream; the reader's value if unset
    pub record_type: Option<String>,
    /// Mapping tables in priority order, shared read-only
    pub tables: Arc<MappingTables>,
}

impl MapperConfig {
    /// Override the output format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Override the record type.
    #[must_use]
    pub fn with_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = Some(record_type.into());
        self
    }

    /// Use the given tables.
    #[must_use]
    pub fn with_tables(mut self, tables: MappingTables) -> Self {
        self.tables = Arc::new(tables);
        self
    }

    /// Use tables already shared with other mappers.
    #[must_use]
    pub fn with_shared_tables(mut self, tables: Arc<MappingTables>) -> Self {
        self.tables = tables;
        self
    }
}

/// Mapping table driven field rewriter and record re-emitter.
#[derive(Debug)]
pub struct FieldMapper<L, D> {
    config: MapperConfig,
    listener: L,
    diagnostics: D,
    record: Record,
    repeat_counter: usize,
    // Data field being assembled by the reader between begin/end_data_field.
    incoming: Option<MarcField>,
}

impl<L: MarcListener, D: DiagnosticsSink> FieldMapper<L, D> {
    /// Create a mapper forwarding to `listener` and reporting to `diagnostics`.
    pub fn new(config: MapperConfig, listener: L, diagnostics: D) -> Self {
        FieldMapper {
            config,
            listener,
            diagnostics,
            record: Record::default(),
            repeat_counter: 0,
            incoming: None,
        }
    }

    /// Borrow the downstream listener.
    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// Borrow the diagnostics sink.
    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    /// Give back the downstream listener and the diagnostics sink.
    pub fn into_inner(self) -> (L, D) {
        (self.listener, self.diagnostics)
    }

    /// Current value of the per-record repeat counter.
    pub fn repeat_counter(&self) -> usize {
        self.repeat_counter
    }

    /// Canonicalize and store the record label.
    pub fn set_record_label(&mut self, label: &str) {
        let parsed = RecordLabel::parse(label);
        let canonical = parsed.record_label();
        if parsed.is_changed() {
            self.diagnostics.report(Diagnostic::RecordLabelChanged {
                original: label.to_string(),
                canonical: canonical.clone(),
            });
        }
        self.record.label = canonical;
    }

    /// Accumulate a control field, keeping only the first record number.
    pub fn add_control_field(&mut self, field: MarcField) {
        if field.head.is_record_number() {
            let duplicate = self
                .record
                .control_fields
                .iter()
                .any(|f| f.head.is_record_number());
            if duplicate {
                tracing::debug!(field = %field.head, "dropping duplicate record number");
                self.diagnostics
                    .report(Diagnostic::RecordNumberMultiple { field: field.head });
                return;
            }
            self.diagnostics.report(Diagnostic::RecordNumber {
                field: field.head.clone(),
            });
        }
        self.record.control_fields.push(field);
    }

    /// Accumulate a data field, unmapped.
    pub fn add_data_field(&mut self, field: MarcField) {
        self.record.data_fields.push(field);
    }

    /// Map and forward the accumulated record, then reset for the next one.
    ///
    /// Configured format and type win over the values passed in.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by the downstream listener. The
    /// accumulators are reset even when the listener fails.
    pub fn emit_record(&mut self, received_format: &str, received_type: &str) -> Result<()> {
        let record = std::mem::take(&mut self.record);
        let result = self.emit(&record, received_format, received_type);
        self.repeat_counter = 0;
        self.incoming = None;
        result
    }

    fn emit(&mut self, record: &Record, received_format: &str, received_type: &str) -> Result<()> {
        let format = self
            .config
            .format
            .clone()
            .unwrap_or_else(|| received_format.to_string());
        let record_type = self
            .config
            .record_type
            .clone()
            .unwrap_or_else(|| received_type.to_string());

        self.listener.begin_record(&format, &record_type)?;
        let label = if record.label.is_empty() {
            RecordLabel::blank().record_label()
        } else {
            record.label.clone()
        };
        self.listener.leader(&label)?;

        for field in &record.control_fields {
            let (mapped, operation) = self.map(field);
            if operation != Operation::Skip {
                mapped.emit_to(&mut self.listener)?;
            }
        }

        let mut open: Option<MarcField> = None;
        for field in &record.data_fields {
            let (mapped, operation) = self.map(field);
            match operation {
                Operation::Skip => {},
                Operation::Keep => {
                    self.flush(&mut open)?;
                    mapped.emit_to(&mut self.listener)?;
                },
                Operation::Open => {
                    self.flush(&mut open)?;
                    open = Some(mapped);
                },
                Operation::Append | Operation::Close => {
                    let mergeable = open.as_ref().is_some_and(|target| {
                        target.tag() == mapped.tag() && target.indicator() == mapped.indicator()
                    });
                    if !mergeable {
                        self.flush(&mut open)?;
                        mapped.emit_to(&mut self.listener)?;
                    } else if let Some(target) = open.as_mut() {
                        target.subfields.extend(mapped.subfields);
                        if operation == Operation::Close {
                            self.flush(&mut open)?;
                        }
                    }
                },
            }
        }
        self.flush(&mut open)?;

        self.listener.end_record()
    }

    fn flush(&mut self, open: &mut Option<MarcField>) -> Result<()> {
        match open.take() {
            Some(field) => field.emit_to(&mut self.listener),
            None => Ok(()),
        }
    }

    /// Rewrite one field through the mapping tables.
    ///
    /// Never modifies `field`; the result is always a new value. The first
    /// table that has a rule for the field's tag decides the outcome.
    pub fn map(&mut self, field: &MarcField) -> (MarcField, Operation) {
        let tables = Arc::clone(&self.config.tables);
        let Some((table, rule)) = tables.lookup(field.tag()) else {
            return (field.clone(), Operation::Keep);
        };

        if *rule == RewriteRule::Drop {
            self.dropped(table, field);
            return (field.clone(), Operation::Skip);
        }

        let result = if field.subfields.is_empty() {
            self.map_whole(table, rule, field)
        } else {
            self.map_subfields(table, rule, field)
        };
        if result.1.is_rewrite() {
            self.repeat_counter += 1;
        }
        tracing::trace!(table, field = %field, operation = ?result.1, "mapped field");
        result
    }

    /// Control fields and unsubfielded data fields.
    ///
    /// A control field is only recoded through the whole-field key; a
    /// tag-level target leaves it alone. Unsubfielded data fields also
    /// accept a tag-level or indicator-level target.
    fn map_whole(
        &mut self,
        table: &str,
        rule: &RewriteRule,
        field: &MarcField,
    ) -> (MarcField, Operation) {
        let resolved = match rule {
            _ if field.is_control() => rule.get(WHOLE_FIELD_KEY),
            RewriteRule::Nested(_) => match rule.get(field.indicator()) {
                Some(node @ RewriteRule::Nested(_)) => node.get(WHOLE_FIELD_KEY),
                Some(node) => Some(node),
                None => rule.get(WHOLE_FIELD_KEY),
            },
            leaf => Some(leaf),
        };

        match resolved {
            Some(RewriteRule::Drop) => {
                self.dropped(table, field);
                (field.clone(), Operation::Skip)
            },
            Some(RewriteRule::Rewrite(target)) => {
                let head = self.rewrite_head(&field.head, target);
                let mapped = MarcField::new(head.with_subfield_id(None));
                self.mapped(table, field, &mapped);
                (mapped, target.operation)
            },
            _ => (field.clone(), Operation::Keep),
        }
    }

    /// Data fields: resolve by indicator, then independently per subfield.
    fn map_subfields(
        &mut self,
        table: &str,
        rule: &RewriteRule,
        field: &MarcField,
    ) -> (MarcField, Operation) {
        let by_indicator = match rule {
            RewriteRule::Nested(_) => match rule.get(field.indicator()) {
                Some(node) => node,
                None => return (field.clone(), Operation::Keep),
            },
            other => other,
        };
        if *by_indicator == RewriteRule::Drop {
            self.dropped(table, field);
            return (field.clone(), Operation::Skip);
        }

        let mut target: Option<&RewriteTarget> = None;
        let mut kept = Vec::with_capacity(field.subfields.len());
        let mut dropped_any = false;
        for subfield in &field.subfields {
            let node = match by_indicator {
                RewriteRule::Nested(_) => by_indicator.get(&subfield.subfield_key()),
                other => Some(other),
            };
            match node {
                Some(RewriteRule::Drop) => dropped_any = true,
                Some(RewriteRule::Rewrite(t)) => {
                    target.get_or_insert(t);
                    let code = t.resolve_subfield(subfield.subfield_id);
                    kept.push((subfield, code));
                },
                _ => kept.push((subfield, subfield.subfield_id)),
            }
        }

        if kept.is_empty() {
            self.dropped(table, field);
            return (field.clone(), Operation::Skip);
        }

        let Some(target) = target else {
            // Only drops, or nothing matched at subfield level.
            let mut remaining = MarcField::new(field.head.clone());
            remaining
                .subfields
                .extend(kept.into_iter().map(|(subfield, _)| subfield.clone()));
            if dropped_any {
                self.dropped(table, field);
            }
            return (remaining, Operation::Keep);
        };

        let head = self.rewrite_head(&field.head, target);
        let subfields: FieldList = kept
            .into_iter()
            .map(|(subfield, code)| Field {
                tag: head.tag.clone(),
                indicator: head.indicator.clone(),
                subfield_id: code,
                data: subfield.data.clone(),
            })
            .collect();
        let mapped = MarcField { head, subfields };
        self.mapped(table, field, &mapped);
        (mapped, target.operation)
    }

    fn rewrite_head(&self, head: &Field, target: &RewriteTarget) -> Field {
        Field {
            tag: target.resolve_tag(&head.tag),
            indicator: target.resolve_indicator(&head.indicator, self.repeat_counter),
            subfield_id: head.subfield_id,
            data: head.data.clone(),
        }
    }

    fn mapped(&mut self, table: &str, from: &MarcField, to: &MarcField) {
        self.diagnostics.report(Diagnostic::FieldMapped {
            table: table.to_string(),
            from: from.head.clone(),
            to: to.head.clone(),
        });
    }

    fn dropped(&mut self, table: &str, field: &MarcField) {
        self.diagnostics.report(Diagnostic::FieldDropped {
            table: table.to_string(),
            field: field.head.clone(),
        });
    }
}

impl<L: MarcListener, D: DiagnosticsSink> MarcListener for FieldMapper<L, D> {
    fn begin_collection(&mut self) -> Result<()> {
        self.listener.begin_collection()
    }

    fn end_collection(&mut self) -> Result<()> {
        self.listener.end_collection()
    }

    fn begin_record(&mut self, format: &str, record_type: &str) -> Result<()> {
        self.record = Record::new(format, record_type);
        self.repeat_counter = 0;
        Ok(())
    }

    fn leader(&mut self, label: &str) -> Result<()> {
        self.set_record_label(label);
        Ok(())
    }

    fn begin_control_field(&mut self, _field: &Field) -> Result<()> {
        Ok(())
    }

    fn end_control_field(&mut self, field: &Field) -> Result<()> {
        self.add_control_field(MarcField::new(field.clone()));
        Ok(())
    }

    fn begin_data_field(&mut self, field: &Field) -> Result<()> {
        self.incoming = Some(MarcField::new(field.clone()));
        Ok(())
    }

    fn end_data_field(&mut self, field: &Field) -> Result<()> {
        let finished = self
            .incoming
            .take()
            .unwrap_or_else(|| MarcField::new(field.clone()));
        self.add_data_field(finished);
        Ok(())
    }

    fn begin_subfield(&mut self, _field: &Field) -> Result<()> {
        Ok(())
    }

    fn end_subfield(&mut self, field: &Field) -> Result<()> {
        match self.incoming.as_mut() {
            Some(open) => open.subfields.push(field.clone()),
            None => {
                let mut orphan = MarcField::new(field.with_subfield_id(None).with_data(""));
                orphan.subfields.push(field.clone());
                self.add_data_field(orphan);
            },
        }
        Ok(())
    }

    fn end_record(&mut self) -> Result<()> {
        let format = self.record.format.clone();
        let record_type = self.record.record_type.clone();
        self.emit_record(&format, &record_type)
    }
}
