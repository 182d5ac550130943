//! Character decoding for binary dialect input.
//!
//! Field data arrives as raw bytes. A configured encoding label is resolved
//! once through `encoding_rs`; without one, each value is decoded as UTF-8
//! and falls back to windows-1252 (a superset of ISO 8859-1, the usual
//! encoding of old diskette exports) when it is not valid UTF-8.

use crate::error::{MarcError, Result};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::borrow::Cow;

/// Decoder for field values.
#[derive(Debug, Clone, Copy)]
pub struct FieldDecoder {
    encoding: Option<&'static Encoding>,
}

impl FieldDecoder {
    /// Decoder with UTF-8 detection and windows-1252 fallback.
    #[must_use]
    pub fn detecting() -> Self {
        FieldDecoder { encoding: None }
    }

    /// Decoder for an explicit WHATWG encoding label.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::EncodingError`] if the label is unknown.
    pub fn for_label(label: &str) -> Result<Self> {
        Encoding::for_label(label.trim().as_bytes())
            .map(|encoding| FieldDecoder {
                encoding: Some(encoding),
            })
            .ok_or_else(|| MarcError::EncodingError(format!("Unknown encoding label: {label}")))
    }

    /// Decoder for an optional label, detecting when absent.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::EncodingError`] if the label is unknown.
    pub fn from_config(label: Option<&str>) -> Result<Self> {
        match label {
            Some(label) => Self::for_label(label),
            None => Ok(Self::detecting()),
        }
    }

    /// Name of the configured encoding, `None` when detecting.
    #[must_use]
    pub fn name(&self) -> Option<&'static str> {
        self.encoding.map(Encoding::name)
    }

    /// Decode one value. Malformed sequences become U+FFFD.
    #[must_use]
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        let encoding = match self.encoding {
            Some(encoding) => encoding,
            None if std::str::from_utf8(bytes).is_ok() => UTF_8,
            None => WINDOWS_1252,
        };
        let (text, _had_errors) = encoding.decode_without_bom_handling(bytes);
        text
    }
}

impl Default for FieldDecoder {
    fn default() -> Self {
        Self::detecting()
    }
}
