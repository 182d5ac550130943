//! PICA XML reading.
//!
//! PICA+ records travel in a small XML envelope:
//!
//! ```xml
//! <collection xmlns="info:srw/schema/5/picaXML-v1.0">
//!   <record>
//!     <datafield tag="003@"><subfield code="0">123456789</subfield></datafield>
//!     <datafield tag="021A" occurrence="01"><subfield code="a">Title</subfield></datafield>
//!   </record>
//! </collection>
//! ```
//!
//! [`PicaTokenizer`] pulls events from `quick_xml` and turns them into a flat
//! stream of [`PicaToken`]s, checking that elements nest the way the format
//! allows. [`PicaXmlReader`] assembles the tokens into records and replays
//! them to a [`MarcListener`] in the same order as the binary reader does.
//!
//! A PICA tag carries its qualifier in the fourth character: `003@` becomes
//! tag `003` with indicator `@`, followed by the `occurrence` attribute when
//! present (`021A` + `01` → `021`, `A01`).

use crate::config::ReaderConfig;
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::error::{MarcError, Result};
use crate::field::{Field, MarcField};
use crate::leader::RecordLabel;
use crate::listener::MarcListener;
use crate::record::Record;
use crate::recovery::RecoveryContext;
use crate::transform::{process_value, resolve_tag, Transformers};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt;
use std::io::{BufRead, BufReader, Read};

/// Format announced when the configuration names none.
pub const DEFAULT_FORMAT: &str = "PICA";

/// Record type announced when the configuration names none.
pub const DEFAULT_TYPE: &str = "Bibliographic";

/// One structural unit of a PICA XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PicaToken {
    /// `<collection>`
    CollectionStart,
    /// `</collection>`
    CollectionEnd,
    /// `<record>`
    RecordStart,
    /// `</record>`
    RecordEnd,
    /// A complete `<leader>` element
    Leader(String),
    /// A complete `<controlfield>` element
    ControlField {
        /// Raw `tag` attribute
        tag: String,
        /// Element text
        data: String,
    },
    /// `<datafield>`
    FieldStart {
        /// Raw `tag` attribute, qualifier included
        tag: String,
        /// `occurrence` attribute
        occurrence: Option<String>,
    },
    /// A complete `<subfield>` element
    Subfield {
        /// Subfield code
        code: char,
        /// Element text
        data: String,
    },
    /// `</datafield>`
    FieldEnd,
}

/// Elements currently open, innermost last.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Element {
    Collection,
    Record,
    Leader,
    ControlField { tag: String },
    DataField { tag: String, occurrence: Option<String> },
    Subfield { code: char },
}

impl Element {
    fn name(&self) -> &'static str {
        match self {
            Element::Collection => "collection",
            Element::Record => "record",
            Element::Leader => "leader",
            Element::ControlField { .. } => "controlfield",
            Element::DataField { .. } => "datafield",
            Element::Subfield { .. } => "subfield",
        }
    }

    fn holds_text(&self) -> bool {
        matches!(
            self,
            Element::Leader | Element::ControlField { .. } | Element::Subfield { .. }
        )
    }
}

/// Pull tokenizer over a PICA XML document.
///
/// Namespace prefixes are ignored. Any element outside the PICA vocabulary
/// yields [`MarcError::UnknownElement`]; after the first error the iterator
/// is exhausted.
pub struct PicaTokenizer<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    open: Vec<Element>,
    text: String,
    pending: Option<PicaToken>,
    finished: bool,
}

impl<R> fmt::Debug for PicaTokenizer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PicaTokenizer")
            .field("open", &self.open)
            .field("pending", &self.pending)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<R: BufRead> PicaTokenizer<R> {
    /// Tokenize `source`.
    pub fn new(source: R) -> Self {
        PicaTokenizer {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            open: Vec::with_capacity(4),
            text: String::new(),
            pending: None,
            finished: false,
        }
    }

    fn advance(&mut self) -> Result<Option<PicaToken>> {
        enum Step {
            Start(Element),
            Empty(Element),
            Text(String),
            End,
            Eof,
        }

        loop {
            let position = self.reader.buffer_position() as u64;
            self.buf.clear();
            let step = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(start) => Step::Start(classify(&start, position)?),
                Event::Empty(start) => Step::Empty(classify(&start, position)?),
                Event::Text(text) => Step::Text(text.unescape()?.into_owned()),
                Event::CData(data) => Step::Text(String::from_utf8_lossy(&data).into_owned()),
                Event::End(_) => Step::End,
                Event::Eof => Step::Eof,
                // declarations, comments, processing instructions, doctype
                _ => continue,
            };

            match step {
                Step::Start(element) => {
                    if let Some(token) = self.open_element(element)? {
                        return Ok(Some(token));
                    }
                },
                Step::Empty(element) => {
                    let start = self.open_element(element)?;
                    let end = self.close_element()?;
                    return Ok(Some(match start {
                        Some(start) => {
                            self.pending = Some(end);
                            start
                        },
                        None => end,
                    }));
                },
                Step::Text(text) => {
                    if self.open.last().is_some_and(Element::holds_text) {
                        self.text.push_str(&text);
                    }
                },
                Step::End => return self.close_element().map(Some),
                Step::Eof => {
                    return match self.open.last() {
                        Some(element) => Err(MarcError::InvalidRecord(format!(
                            "input ends inside <{}>",
                            element.name()
                        ))),
                        None => Ok(None),
                    };
                },
            }
        }
    }

    fn open_element(&mut self, element: Element) -> Result<Option<PicaToken>> {
        let parent = self.open.last();
        let allowed = matches!(
            (&element, parent),
            (Element::Collection, None)
                | (Element::Record, None | Some(Element::Collection))
                | (
                    Element::Leader | Element::ControlField { .. } | Element::DataField { .. },
                    Some(Element::Record)
                )
                | (Element::Subfield { .. }, Some(Element::DataField { .. }))
        );
        if !allowed {
            let context = match parent {
                Some(parent) => format!("inside <{}>", parent.name()),
                None => "at top level".to_string(),
            };
            return Err(MarcError::InvalidRecord(format!(
                "<{}> is not allowed {context}",
                element.name()
            )));
        }

        self.text.clear();
        let token = match &element {
            Element::Collection => Some(PicaToken::CollectionStart),
            Element::Record => Some(PicaToken::RecordStart),
            Element::DataField { tag, occurrence } => Some(PicaToken::FieldStart {
                tag: tag.clone(),
                occurrence: occurrence.clone(),
            }),
            _ => None,
        };
        self.open.push(element);
        Ok(token)
    }

    fn close_element(&mut self) -> Result<PicaToken> {
        let element = self
            .open
            .pop()
            .ok_or_else(|| MarcError::InvalidRecord("unbalanced end tag".to_string()))?;
        let text = std::mem::take(&mut self.text);
        Ok(match element {
            Element::Collection => PicaToken::CollectionEnd,
            Element::Record => PicaToken::RecordEnd,
            Element::Leader => PicaToken::Leader(text),
            Element::ControlField { tag } => PicaToken::ControlField { tag, data: text },
            Element::DataField { .. } => PicaToken::FieldEnd,
            Element::Subfield { code } => PicaToken::Subfield { code, data: text },
        })
    }
}

impl<R: BufRead> Iterator for PicaTokenizer<R> {
    type Item = Result<PicaToken>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(token) = self.pending.take() {
            return Some(Ok(token));
        }
        if self.finished {
            return None;
        }
        match self.advance() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => {
                self.finished = true;
                None
            },
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            },
        }
    }
}

/// Map a start tag to an element, reading the attributes it needs.
fn classify(start: &BytesStart<'_>, position: u64) -> Result<Element> {
    match start.local_name().as_ref() {
        b"collection" => Ok(Element::Collection),
        b"record" => Ok(Element::Record),
        b"leader" => Ok(Element::Leader),
        b"controlfield" => Ok(Element::ControlField {
            tag: attribute(start, b"tag")?.unwrap_or_default(),
        }),
        b"datafield" => Ok(Element::DataField {
            tag: attribute(start, b"tag")?.unwrap_or_default(),
            occurrence: attribute(start, b"occurrence")?,
        }),
        b"subfield" => {
            let code = attribute(start, b"code")?
                .and_then(|code| code.chars().next())
                .ok_or_else(|| {
                    MarcError::InvalidField(format!("<subfield> without code at byte {position}"))
                })?;
            Ok(Element::Subfield { code })
        },
        other => Err(MarcError::UnknownElement {
            element: String::from_utf8_lossy(other).into_owned(),
            position,
        }),
    }
}

fn attribute(start: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Split a PICA tag into the three-character tag and the indicator formed
/// by its qualifier and the occurrence.
#[must_use]
pub fn split_tag(tag: &str, occurrence: Option<&str>) -> (String, String) {
    let mut chars = tag.chars();
    let base: String = chars.by_ref().take(3).collect();
    let mut indicator: String = chars.collect();
    if let Some(occurrence) = occurrence {
        indicator.push_str(occurrence);
    }
    (base, indicator)
}

/// Streaming reader for PICA XML.
///
/// Unlike the binary reader, structural problems in the XML itself (unknown
/// elements, bad nesting, malformed markup) always abort the parse: there is
/// no record boundary to resynchronize on. Field-level problems follow
/// `fatal_errors`. The `encoding` option does not apply; the XML parser
/// reads UTF-8.
#[derive(Debug)]
pub struct PicaXmlReader<D> {
    config: ReaderConfig,
    transformers: Transformers,
    recovery: RecoveryContext,
    diagnostics: D,
}

impl<D: DiagnosticsSink> PicaXmlReader<D> {
    /// Create a reader.
    pub fn new(config: ReaderConfig, diagnostics: D) -> Self {
        let recovery = RecoveryContext::new(config.recovery_mode());
        PicaXmlReader {
            config,
            transformers: Transformers::new(),
            recovery,
            diagnostics,
        }
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
    /// Returns the number of records emitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the XML is malformed, contains an unknown
    /// element, the source fails, the listener aborts, or a field is
    /// malformed and `fatal_errors` is set.
    pub fn parse<R, L>(&mut self, source: R, listener: &mut L) -> Result<usize>
    where
        R: Read,
        L: MarcListener + ?Sized,
    {
        let input = BufReader::with_capacity(self.config.buffer_size.max(1), source);
        let format = self.config.format.as_deref().unwrap_or(DEFAULT_FORMAT).to_string();
        let record_type = self
            .config
            .record_type
            .as_deref()
            .unwrap_or(DEFAULT_TYPE)
            .to_string();

        let mut record: Option<Record> = None;
        let mut open_field: Option<MarcField> = None;
        let mut ordinal = 0;
        let mut emitted = 0;

        listener.begin_collection()?;
        for token in PicaTokenizer::new(input) {
            match token? {
                PicaToken::CollectionStart | PicaToken::CollectionEnd => {},
                PicaToken::RecordStart => {
                    ordinal += 1;
                    record = Some(Record::new(&format, &record_type));
                },
                PicaToken::Leader(label) => {
                    if let Err(err) = RecordLabel::parse(&label).validate() {
                        let reason = err.to_string();
                        self.recovery.recover(
                            err,
                            Diagnostic::MalformedLabel {
                                record: ordinal,
                                label: label.clone(),
                                reason,
                            },
                            &mut self.diagnostics,
                        )?;
                    }
                    current(&mut record)?.label = label;
                },
                PicaToken::ControlField { tag, data } => {
                    let Some(tag) = resolve_tag(
                        &self.config,
                        &mut self.recovery,
                        ordinal,
                        tag,
                        &mut self.diagnostics,
                    )?
                    else {
                        continue;
                    };
                    let data = self.value(&tag, data);
                    current(&mut record)?
                        .control_fields
                        .push(MarcField::control(&tag, &data));
                },
                PicaToken::FieldStart { tag, occurrence } => {
                    let (tag, indicator) = split_tag(&tag, occurrence.as_deref());
                    open_field = resolve_tag(
                        &self.config,
                        &mut self.recovery,
                        ordinal,
                        tag,
                        &mut self.diagnostics,
                    )?
                    .map(|tag| MarcField::new(Field::data_field(tag, indicator)));
                },
                PicaToken::Subfield { code, data } => {
                    if let Some(field) = open_field.as_mut() {
                        let data = process_value(
                            &self.config,
                            &self.transformers,
                            &field.head.tag,
                            data,
                            &mut self.diagnostics,
                        );
                        field.add_subfield(code, data);
                    }
                },
                PicaToken::FieldEnd => {
                    if let Some(field) = open_field.take() {
                        current(&mut record)?.data_fields.push(field);
                    }
                },
                PicaToken::RecordEnd => {
                    let Some(mut finished) = record.take() else {
                        continue;
                    };
                    if finished.label.is_empty() {
                        finished.label = RecordLabel::blank().record_label();
                    }
                    tracing::debug!(
                        record = ordinal,
                        control_fields = finished.control_fields.len(),
                        data_fields = finished.data_fields.len(),
                        "decoded record"
                    );
                    finished.emit_to(listener)?;
                    emitted += 1;
                },
            }
        }
        listener.end_collection()?;

        tracing::debug!(records = emitted, "stream finished");
        Ok(emitted)
    }

    fn value(&mut self, tag: &str, data: String) -> String {
        process_value(
            &self.config,
            &self.transformers,
            tag,
            data,
            &mut self.diagnostics,
        )
    }
}

fn current(record: &mut Option<Record>) -> Result<&mut Record> {
    record
        .as_mut()
        .ok_or_else(|| MarcError::InvalidRecord("field outside of a record".to_string()))
}
