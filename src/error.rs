//! Error types for MARC dialect parsing and field mapping.
//!
//! This module provides the [`MarcError`] type for all library operations
//! and the [`Result`] convenience type.

use thiserror::Error;

/// Error type for all library operations.
///
/// Data-quality anomalies (duplicate record numbers, labels that need
/// canonicalization, unmapped tags) are never errors; they travel through the
/// [`DiagnosticsSink`](crate::diagnostics::DiagnosticsSink) instead. The
/// variants below are structural failures, configuration problems, and I/O.
#[derive(Error, Debug)]
pub enum MarcError {
    /// Error indicating an invalid or malformed record structure.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Error indicating a record label (leader) of the wrong width or layout.
    #[error("Invalid record label: {0}")]
    InvalidLabel(String),

    /// Error indicating an invalid field structure.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// An element the PICA XML reader does not know how to interpret.
    #[error("Unknown element <{element}> at byte {position}")]
    UnknownElement {
        /// Local name of the offending element
        element: String,
        /// Byte offset in the input where the element starts
        position: u64,
    },

    /// Error related to character encoding conversion.
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Malformed XML input.
    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),

    /// Malformed configuration or mapping table.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] serde_json::Error),

    /// A downstream listener refused an event and aborted the parse.
    #[error("Listener error: {0}")]
    ListenerError(String),

    /// IO error from the underlying source.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<quick_xml::events::attributes::AttrError> for MarcError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        MarcError::XmlError(quick_xml::Error::InvalidAttr(err))
    }
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;
