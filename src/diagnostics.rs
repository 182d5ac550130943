//! Typed diagnostics for data-quality anomalies.
//!
//! Readers and the mapper report non-fatal findings (duplicate record
//! numbers, rewritten labels, dropped or remapped fields, skipped records)
//! through a [`DiagnosticsSink`] handed to them at construction. Nothing is
//! global: a caller that wants one ordered log for a whole pipeline shares a
//! [`SharedDiagnostics`] handle between its stages.

use crate::field::Field;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Discriminant of a [`Diagnostic`], convenient for filtering and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A record-number control field was accepted
    RecordNumber,
    /// A second record-number control field was dropped
    RecordNumberMultiple,
    /// The record label needed canonicalization
    RecordLabelChanged,
    /// A field was rewritten by a mapping table
    FieldMapped,
    /// A field was dropped by a mapping table
    FieldDropped,
    /// A record label had the wrong width or layout
    MalformedLabel,
    /// A field could not be decoded
    MalformedField,
    /// An invalid tag was coerced to the sentinel tag
    TagCleaned,
    /// A whole record was skipped
    RecordSkipped,
    /// Illegal characters were removed from field data
    DataScrubbed,
}

impl DiagnosticKind {
    /// Whether this kind flags a problem with the input.
    ///
    /// `RecordNumber`, `FieldMapped` and `FieldDropped` record what the
    /// pipeline did on purpose; everything else means the input was not
    /// clean.
    #[must_use]
    pub fn is_anomaly(self) -> bool {
        !matches!(
            self,
            DiagnosticKind::RecordNumber | DiagnosticKind::FieldMapped | DiagnosticKind::FieldDropped
        )
    }
}

/// A single diagnostic event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A record-number control field was accepted.
    RecordNumber {
        /// The accepted field
        field: Field,
    },
    /// A duplicate record-number control field was dropped.
    RecordNumberMultiple {
        /// The dropped duplicate
        field: Field,
    },
    /// The record label was canonicalized.
    RecordLabelChanged {
        /// Label as received
        original: String,
        /// Label as emitted
        canonical: String,
    },
    /// A field was rewritten.
    FieldMapped {
        /// Name of the mapping table that matched
        table: String,
        /// Head of the input field
        from: Field,
        /// Head of the produced field
        to: Field,
    },
    /// A field (or all of its subfields) was dropped.
    FieldDropped {
        /// Name of the mapping table that matched
        table: String,
        /// Head of the dropped field
        field: Field,
    },
    /// A record label could not be used to decode the record.
    MalformedLabel {
        /// Ordinal of the record in the stream, starting at 1
        record: usize,
        /// The offending label
        label: String,
        /// What was wrong with it
        reason: String,
    },
    /// A field could not be decoded and was left out.
    MalformedField {
        /// Ordinal of the record in the stream, starting at 1
        record: usize,
        /// Tag of the field, as far as it could be read
        tag: String,
        /// What was wrong with it
        reason: String,
    },
    /// An invalid tag was replaced by the sentinel tag.
    TagCleaned {
        /// Ordinal of the record in the stream, starting at 1
        record: usize,
        /// Tag as found in the input
        original: String,
    },
    /// A record was skipped because of a structural error.
    RecordSkipped {
        /// Ordinal of the record in the stream, starting at 1
        record: usize,
        /// The error that caused the skip
        reason: String,
    },
    /// Characters illegal in the target serialization were removed.
    DataScrubbed {
        /// Tag of the affected field
        tag: String,
        /// Number of characters removed
        removed: usize,
    },
}

impl Diagnostic {
    /// The kind of this diagnostic.
    #[must_use]
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Diagnostic::RecordNumber { .. } => DiagnosticKind::RecordNumber,
            Diagnostic::RecordNumberMultiple { .. } => DiagnosticKind::RecordNumberMultiple,
            Diagnostic::RecordLabelChanged { .. } => DiagnosticKind::RecordLabelChanged,
            Diagnostic::FieldMapped { .. } => DiagnosticKind::FieldMapped,
            Diagnostic::FieldDropped { .. } => DiagnosticKind::FieldDropped,
            Diagnostic::MalformedLabel { .. } => DiagnosticKind::MalformedLabel,
            Diagnostic::MalformedField { .. } => DiagnosticKind::MalformedField,
            Diagnostic::TagCleaned { .. } => DiagnosticKind::TagCleaned,
            Diagnostic::RecordSkipped { .. } => DiagnosticKind::RecordSkipped,
            Diagnostic::DataScrubbed { .. } => DiagnosticKind::DataScrubbed,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::RecordNumber { field } => write!(f, "record number {}", field.data),
            Diagnostic::RecordNumberMultiple { field } => {
                write!(f, "duplicate record number dropped: {field}")
            },
            Diagnostic::RecordLabelChanged {
                original,
                canonical,
            } => write!(f, "record label changed from '{original}' to '{canonical}'"),
            Diagnostic::FieldMapped { table, from, to } => {
                write!(f, "[{table}] mapped {} to {}", from.tag, to.tag)
            },
            Diagnostic::FieldDropped { table, field } => {
                write!(f, "[{table}] dropped {}", field.tag)
            },
            Diagnostic::MalformedLabel {
                record,
                label,
                reason,
            } => write!(f, "record {record}: malformed label '{label}': {reason}"),
            Diagnostic::MalformedField {
                record,
                tag,
                reason,
            } => write!(f, "record {record}: malformed field {tag}: {reason}"),
            Diagnostic::TagCleaned { record, original } => {
                write!(f, "record {record}: invalid tag '{original}' cleaned")
            },
            Diagnostic::RecordSkipped { record, reason } => {
                write!(f, "record {record} skipped: {reason}")
            },
            Diagnostic::DataScrubbed { tag, removed } => {
                write!(f, "removed {removed} illegal characters from {tag}")
            },
        }
    }
}

/// Destination for diagnostics.
pub trait DiagnosticsSink {
    /// Accept one diagnostic.
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticsSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

impl<S: DiagnosticsSink + ?Sized> DiagnosticsSink for &mut S {
    fn report(&mut self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticsSink for NoopSink {
    fn report(&mut self, _diagnostic: Diagnostic) {}
}

/// Sink that writes each diagnostic to the `tracing` facade.
///
/// Record-level problems are logged at `warn`, per-field bookkeeping at
/// `debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.kind() {
            DiagnosticKind::MalformedLabel
            | DiagnosticKind::MalformedField
            | DiagnosticKind::RecordSkipped
            | DiagnosticKind::RecordNumberMultiple => {
                tracing::warn!(kind = ?diagnostic.kind(), "{diagnostic}");
            },
            _ => tracing::debug!(kind = ?diagnostic.kind(), "{diagnostic}"),
        }
    }
}

/// Cloneable handle to one ordered diagnostics log.
///
/// Single-threaded by construction, like the pipelines that write to it.
#[derive(Debug, Default, Clone)]
pub struct SharedDiagnostics {
    inner: Rc<RefCell<Vec<Diagnostic>>>,
}

impl SharedDiagnostics {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything reported so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.inner.borrow().clone()
    }

    /// Remove and return everything reported so far.
    #[must_use]
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.inner.borrow_mut())
    }

    /// Number of diagnostics of the given kind.
    #[must_use]
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.inner
            .borrow()
            .iter()
            .filter(|d| d.kind() == kind)
            .count()
    }

    /// Whether nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

impl DiagnosticsSink for SharedDiagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.inner.borrow_mut().push(diagnostic);
    }
}
