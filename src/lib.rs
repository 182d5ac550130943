#![warn(missing_docs)]

//! # marcx: MARC dialect readers and field mapping
//!
//! A streaming library for legacy bibliographic record dialects. Dialect
//! readers decode MAB-Diskette (ISO 2709 with diskette padding) and PICA XML
//! into a flat sequence of listener events; a declarative [`FieldMapper`]
//! rewrites, merges and drops fields on their way to whatever consumes them.
//!
//! ```text
//! bytes → MabDisketteReader / PicaXmlReader → FieldMapper → your MarcListener
//! ```
//!
//! ## Quick Start
//!
//! ### Reading records
//!
//! ```no_run
//! use marcx::{MabDisketteReader, ReaderConfig, RecordCollector};
//! use std::fs::File;
//!
//! # fn main() -> marcx::Result<()> {
//! let mut reader = MabDisketteReader::new(ReaderConfig::default(), Vec::new())?;
//! let mut records = RecordCollector::new();
//! reader.parse(File::open("export.mab")?, &mut records)?;
//!
//! for record in &records.records {
//!     println!("{:?}", record.get_control_field("001"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Mapping fields on the way through
//!
//! ```
//! use marcx::{
//!     FieldMapper, MapperConfig, MappingTables, PicaXmlReader, ReaderConfig,
//!     RecordCollector, SharedDiagnostics,
//! };
//!
//! # fn main() -> marcx::Result<()> {
//! let tables = MappingTables::from_json_str(r#"{ "pica2marc": { "021": ">245$10$a" } }"#)?;
//! let diagnostics = SharedDiagnostics::new();
//! let mut mapper = FieldMapper::new(
//!     MapperConfig::default().with_format("MARC21").with_tables(tables),
//!     RecordCollector::new(),
//!     diagnostics.clone(),
//! );
//!
//! let xml = r#"<record><datafield tag="021A"><subfield code="a">Title</subfield></datafield></record>"#;
//! let mut reader = PicaXmlReader::new(ReaderConfig::default(), diagnostics.clone());
//! reader.parse(xml.as_bytes(), &mut mapper)?;
//!
//! let (records, _) = mapper.into_inner();
//! assert_eq!(records.records[0].data_fields[0].tag(), "245");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`field`] — Field value objects (`Field`, `FieldList`, `MarcField`)
//! - [`record`] — Transient record accumulator
//! - [`leader`] — Record label canonicalization
//! - [`listener`] — The event contract between pipeline stages
//! - [`reader`] — MAB-Diskette / ISO 2709 binary reader
//! - [`pica`] — PICA XML tokenizer and reader
//! - [`mapping`] — Mapping tables and rewrite rules
//! - [`mapper`] — The field mapper stage
//! - [`diagnostics`] — Data-quality events and sinks
//! - [`config`] — Reader configuration
//! - [`recovery`] — Strict and lenient handling of malformed input
//! - [`encoding`] — Character decoding
//! - [`transform`] — Scrubbing, normalization and string transformers
//! - [`error`] — Error types

pub mod config;
pub mod diagnostics;
pub mod encoding;
pub mod error;
pub mod field;
pub mod leader;
pub mod listener;
pub mod mapper;
pub mod mapping;
pub mod pica;
pub mod reader;
pub mod record;
pub mod recovery;
pub mod transform;

pub use config::ReaderConfig;
pub use diagnostics::{
    Diagnostic, DiagnosticKind, DiagnosticsSink, NoopSink, SharedDiagnostics, TracingSink,
};
pub use encoding::FieldDecoder;
pub use error::{MarcError, Result};
pub use field::{Field, FieldList, MarcField};
pub use leader::RecordLabel;
pub use listener::{EventRecorder, MarcEvent, MarcListener, RecordCollector};
pub use mapper::{FieldMapper, MapperConfig};
pub use mapping::{MappingTables, Operation, RewriteRule, RewriteTarget};
pub use pica::{PicaToken, PicaTokenizer, PicaXmlReader};
pub use reader::{Delimiters, MabDisketteReader};
pub use record::Record;
pub use recovery::{RecoveryContext, RecoveryMode};
pub use transform::Transformers;
