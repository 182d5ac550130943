//! Reading MAB-Diskette and other ISO 2709 style binary streams.
//!
//! This module provides [`MabDisketteReader`], which decodes records laid out
//! as a 24-byte label, a directory of fixed-width entries and a data area,
//! and pushes them to a [`MarcListener`] one event at a time.
//!
//! The separator bytes are not hard-coded: [`Delimiters`] carries the field
//! terminator, subfield delimiter and record terminator, plus the padding
//! bytes that diskette exports scatter between records.
//!
//! # Examples
//!
//! ```
//! use marcx::{EventRecorder, MabDisketteReader, ReaderConfig};
//! use std::io::Cursor;
//!
//! let mut reader = MabDisketteReader::new(ReaderConfig::default(), Vec::new())?;
//! let mut recorder = EventRecorder::new();
//! let count = reader.parse(Cursor::new(b"\r\n\x1a".to_vec()), &mut recorder)?;
//! assert_eq!(count, 0);
//! # Ok::<(), marcx::MarcError>(())
//! ```

use crate::config::ReaderConfig;
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::encoding::FieldDecoder;
use crate::error::{MarcError, Result};
use crate::field::{is_control_tag, Field, MarcField};
use crate::leader::{RecordLabel, LABEL_LENGTH};
use crate::listener::MarcListener;
use crate::record::Record;
use crate::recovery::RecoveryContext;
use crate::transform::{process_value, resolve_tag, Transformers};
use std::io::{BufRead, BufReader, Read};

/// Format announced when the configuration names none.
pub const DEFAULT_FORMAT: &str = "MAB";

/// Record type announced when the configuration names none.
pub const DEFAULT_TYPE: &str = "Bibliographic";

/// Length of the tag part of a directory entry.
const TAG_LENGTH: usize = 3;

/// Separator and padding bytes of one binary dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    /// Ends every field and the directory
    pub field_terminator: u8,
    /// Introduces a subfield code
    pub subfield_delimiter: u8,
    /// Ends a record
    pub record_terminator: u8,
    /// Bytes skipped between records
    pub padding: Vec<u8>,
}

impl Delimiters {
    /// Standard ISO 2709 separators without padding.
    #[must_use]
    pub fn iso2709() -> Self {
        Delimiters {
            field_terminator: 0x1E,
            subfield_delimiter: 0x1F,
            record_terminator: 0x1D,
            padding: Vec::new(),
        }
    }

    /// MAB-Diskette: ISO 2709 separators, records padded with line breaks,
    /// DOS end-of-file markers, NUL and blanks.
    #[must_use]
    pub fn mab_diskette() -> Self {
        Delimiters {
            padding: vec![b'\r', b'\n', 0x1A, 0x00, b' '],
            ..Self::iso2709()
        }
    }

    /// Strip leading padding and the trailing record terminator.
    fn frame<'a>(&self, chunk: &'a [u8]) -> &'a [u8] {
        let start = chunk
            .iter()
            .position(|b| !self.padding.contains(b))
            .unwrap_or(chunk.len());
        let chunk = &chunk[start..];
        chunk
            .strip_suffix(&[self.record_terminator])
            .unwrap_or(chunk)
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::mab_diskette()
    }
}

/// Streaming reader for MAB-Diskette (and plain ISO 2709) input.
///
/// Each record is decoded completely before any of its events reach the
/// listener, so a record skipped in lenient mode leaves no partial output.
#[derive(Debug)]
pub struct MabDisketteReader<D> {
    config: ReaderConfig,
    delimiters: Delimiters,
    decoder: FieldDecoder,
    transformers: Transformers,
    recovery: RecoveryContext,
    diagnostics: D,
}

impl<D: DiagnosticsSink> MabDisketteReader<D> {
    /// Create a reader with MAB-Diskette delimiters.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::EncodingError`] if the configured encoding label
    /// is unknown.
    pub fn new(config: ReaderConfig, diagnostics: D) -> Result<Self> {
        let decoder = FieldDecoder::from_config(config.encoding.as_deref())?;
        let recovery = RecoveryContext::new(config.recovery_mode());
        Ok(MabDisketteReader {
            config,
            delimiters: Delimiters::mab_diskette(),
            decoder,
            transformers: Transformers::new(),
            recovery,
            diagnostics,
        })
    }

    /// Use a different set of separator bytes.
    #[must_use]
    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Run `transformers` over field data when `transform_data` is on.
    #[must_use]
    pub fn with_transformers(mut self, transformers: Transformers) -> Self {
        self.transformers = transformers;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Borrow the diagnostics sink.
    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    /// Give back the diagnostics sink.
    pub fn into_diagnostics(self) -> D {
        self.diagnostics
    }

    /// Number of problems absorbed in lenient mode so far.
    pub fn recovered(&self) -> usize {
        self.recovery.recovered
    }

    /// Read `source` to the end, pushing every record to `listener`.
    ///
    /// The whole stream is bracketed by one `begin_collection` /
    /// `end_collection` pair. Returns the number of records emitted.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the source fails (always, whatever the recovery mode)
    /// - the listener aborts
    /// - a record is malformed and `fatal_errors` is set
    pub fn parse<R, L>(&mut self, source: R, listener: &mut L) -> Result<usize>
    where
        R: Read,
        L: MarcListener + ?Sized,
    {
        let mut input = BufReader::with_capacity(self.config.buffer_size.max(1), source);
        let mut chunk = Vec::new();
        let mut ordinal = 0;
        let mut emitted = 0;

        listener.begin_collection()?;
        loop {
            chunk.clear();
            if input.read_until(self.delimiters.record_terminator, &mut chunk)? == 0 {
                break;
            }
            let bytes = self.delimiters.frame(&chunk);
            if bytes.is_empty() {
                continue;
            }
            ordinal += 1;

            match self.decode_record(ordinal, bytes) {
                Ok(record) => {
                    tracing::debug!(
                        record = ordinal,
                        control_fields = record.control_fields.len(),
                        data_fields = record.data_fields.len(),
                        "decoded record"
                    );
                    record.emit_to(listener)?;
                    emitted += 1;
                },
                Err(err) => {
                    let diagnostic = Diagnostic::RecordSkipped {
                        record: ordinal,
                        reason: err.to_string(),
                    };
                    self.recovery
                        .recover(err, diagnostic, &mut self.diagnostics)?;
                },
            }
        }
        listener.end_collection()?;

        tracing::debug!(records = emitted, skipped = ordinal - emitted, "stream finished");
        Ok(emitted)
    }

    fn decode_record(&mut self, ordinal: usize, bytes: &[u8]) -> Result<Record> {
        if bytes.len() < LABEL_LENGTH {
            return Err(MarcError::InvalidRecord(format!(
                "record of {} bytes is shorter than its label",
                bytes.len()
            )));
        }

        let label_chars: Vec<char> = bytes[..LABEL_LENGTH].iter().map(|&b| char::from(b)).collect();
        let label = RecordLabel::new(&label_chars);
        let base = self.base_address(ordinal, &label, bytes)?;

        let length_width = label.length_of_field_length();
        let start_width = label.length_of_starting_position();
        if length_width == 0 || start_width == 0 {
            return Err(MarcError::InvalidLabel(format!(
                "directory entry widths {length_width}/{start_width} are unusable"
            )));
        }
        let entry_width = TAG_LENGTH + length_width + start_width;

        let directory = &bytes[LABEL_LENGTH..base - 1];
        if directory.len() % entry_width != 0 {
            return Err(MarcError::InvalidRecord(format!(
                "directory of {} bytes is not a multiple of the entry width {entry_width}",
                directory.len()
            )));
        }
        let data = &bytes[base..];

        let mut record = Record::new(
            self.config.format.as_deref().unwrap_or(DEFAULT_FORMAT),
            self.config.record_type.as_deref().unwrap_or(DEFAULT_TYPE),
        );
        record.label = label_chars.into_iter().collect();

        for entry in directory.chunks_exact(entry_width) {
            let raw_tag: String = entry[..TAG_LENGTH].iter().map(|&b| char::from(b)).collect();
            let length = parse_number(&entry[TAG_LENGTH..TAG_LENGTH + length_width])
                .ok_or_else(|| bad_entry(&raw_tag, "field length"))?;
            let start = parse_number(&entry[TAG_LENGTH + length_width..])
                .ok_or_else(|| bad_entry(&raw_tag, "starting position"))?;

            let Some(tag) = resolve_tag(
                &self.config,
                &mut self.recovery,
                ordinal,
                raw_tag,
                &mut self.diagnostics,
            )?
            else {
                continue;
            };

            let Some(field_bytes) = data.get(start..start + length) else {
                let reason = format!(
                    "field at {start}+{length} exceeds data area of {} bytes",
                    data.len()
                );
                self.recovery.recover(
                    MarcError::InvalidField(format!("Tag {tag}: {reason}")),
                    Diagnostic::MalformedField {
                        record: ordinal,
                        tag,
                        reason,
                    },
                    &mut self.diagnostics,
                )?;
                continue;
            };
            let field_bytes = field_bytes
                .strip_suffix(&[self.delimiters.field_terminator])
                .unwrap_or(field_bytes);

            if is_control_tag(&tag) {
                let value = self.value(&tag, field_bytes);
                record.control_fields.push(MarcField::control(&tag, &value));
            } else if let Some(field) = self.decode_data_field(ordinal, &label, tag, field_bytes)? {
                record.data_fields.push(field);
            }
        }

        Ok(record)
    }

    /// Find where the data area starts.
    ///
    /// A base address that does not point just past the directory terminator
    /// is reported; the directory terminator itself is then trusted.
    fn base_address(&mut self, ordinal: usize, label: &RecordLabel, bytes: &[u8]) -> Result<usize> {
        let declared = parse_number(&bytes[12..17]);
        if let Some(base) = declared {
            if base > LABEL_LENGTH
                && base <= bytes.len()
                && bytes[base - 1] == self.delimiters.field_terminator
            {
                return Ok(base);
            }
        }

        let Some(end) = memchr::memchr(self.delimiters.field_terminator, &bytes[LABEL_LENGTH..])
        else {
            return Err(MarcError::InvalidRecord(
                "directory is not terminated".to_string(),
            ));
        };
        let base = LABEL_LENGTH + end + 1;
        let reason = match declared {
            Some(value) => format!("base address {value} does not match directory end {base}"),
            None => "base address is not numeric".to_string(),
        };
        self.recovery.recover(
            MarcError::InvalidLabel(reason.clone()),
            Diagnostic::MalformedLabel {
                record: ordinal,
                label: label.original().to_string(),
                reason,
            },
            &mut self.diagnostics,
        )?;
        Ok(base)
    }

    fn decode_data_field(
        &mut self,
        ordinal: usize,
        label: &RecordLabel,
        tag: String,
        bytes: &[u8],
    ) -> Result<Option<MarcField>> {
        let indicator_length = label.indicator_length();
        if bytes.len() < indicator_length {
            self.recovery.recover(
                MarcError::InvalidField(format!("Tag {tag}: data field too short for indicator")),
                Diagnostic::MalformedField {
                    record: ordinal,
                    tag,
                    reason: "too short for indicator".to_string(),
                },
                &mut self.diagnostics,
            )?;
            return Ok(None);
        }

        let (indicator, body) = bytes.split_at(indicator_length);
        let indicator = self.decoder.decode(indicator).into_owned();
        // Subfield code length counts the delimiter.
        let code_length = label.subfield_code_length().saturating_sub(1).max(1);
        let delimiter = self.delimiters.subfield_delimiter;

        let head_end = memchr::memchr(delimiter, body).unwrap_or(body.len());
        let head_data = if head_end == 0 {
            String::new()
        } else {
            self.value(&tag, &body[..head_end])
        };
        let mut field = MarcField::new(Field::data_field(tag, indicator).with_data(head_data));

        let mut starts = memchr::memchr_iter(delimiter, body).peekable();
        while let Some(at) = starts.next() {
            let end = starts.peek().copied().unwrap_or(body.len());
            let subfield = &body[at + 1..end];
            if subfield.is_empty() {
                continue;
            }
            let code = char::from(subfield[0]);
            let value_bytes = subfield.get(code_length..).unwrap_or_default();
            let value = self.value(&field.head.tag, value_bytes);
            field.add_subfield(code, value);
        }

        Ok(Some(field))
    }

    fn value(&mut self, tag: &str, bytes: &[u8]) -> String {
        let decoded = self.decoder.decode(bytes).into_owned();
        process_value(
            &self.config,
            &self.transformers,
            tag,
            decoded,
            &mut self.diagnostics,
        )
    }
}

fn bad_entry(tag: &str, part: &str) -> MarcError {
    MarcError::InvalidRecord(format!("directory entry for {tag}: {part} is not numeric"))
}

/// Parse ASCII digits without allocating; `None` on any non-digit.
fn parse_number(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }
    bytes.iter().try_fold(0usize, |acc, &b| {
        b.is_ascii_digit()
            .then(|| acc * 10 + usize::from(b - b'0'))
    })
}
