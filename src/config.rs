//! Reader configuration.
//!
//! The option names match the keys an external settings loader hands over,
//! so a JSON object such as
//!
//! ```json
//! { "format": "MARC21", "type": "Bibliographic", "fatal_errors": true }
//! ```
//!
//! deserializes directly into a [`ReaderConfig`]. Missing keys take their
//! defaults.

use crate::error::Result;
use crate::recovery::RecoveryMode;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Default input buffer capacity in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 65_536;

/// Options recognized by the dialect readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Output format announced with `begin_record`; the dialect default if unset
    pub format: Option<String>,
    /// Record type announced with `begin_record`; the dialect default if unset
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    /// Abort on the first malformed record instead of skipping it
    pub fatal_errors: bool,
    /// Coerce invalid tags to the sentinel tag instead of rejecting the field
    pub clean_tags: bool,
    /// Strip control characters other than TAB, CR and LF from field data
    pub scrub_data: bool,
    /// Run registered string transformers on field data
    pub transform_data: bool,
    /// Capacity of the input buffer
    pub buffer_size: usize,
    /// Character encoding label (WHATWG names such as `"windows-1252"`)
    pub encoding: Option<String>,
    /// Apply Unicode NFC normalization to field data
    pub normalize_unicode: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            format: None,
            record_type: None,
            fatal_errors: false,
            clean_tags: true,
            scrub_data: true,
            transform_data: true,
            buffer_size: DEFAULT_BUFFER_SIZE,
            encoding: None,
            normalize_unicode: false,
        }
    }
}

impl ReaderConfig {
    /// Load a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::ConfigError`](crate::MarcError::ConfigError) if
    /// the JSON is malformed or has values of the wrong type.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON source.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::ConfigError`](crate::MarcError::ConfigError) if
    /// the JSON is malformed or cannot be read.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Set the record type.
    #[must_use]
    pub fn with_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = Some(record_type.into());
        self
    }

    /// Set `fatal_errors`.
    #[must_use]
    pub fn with_fatal_errors(mut self, fatal_errors: bool) -> Self {
        self.fatal_errors = fatal_errors;
        self
    }

    /// Set `clean_tags`.
    #[must_use]
    pub fn with_clean_tags(mut self, clean_tags: bool) -> Self {
        self.clean_tags = clean_tags;
        self
    }

    /// Set `scrub_data`.
    #[must_use]
    pub fn with_scrub_data(mut self, scrub_data: bool) -> Self {
        self.scrub_data = scrub_data;
        self
    }

    /// Set `transform_data`.
    #[must_use]
    pub fn with_transform_data(mut self, transform_data: bool) -> Self {
        self.transform_data = transform_data;
        self
    }

    /// Set the input buffer capacity; zero is raised to one byte.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Set the character encoding label.
    #[must_use]
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Set `normalize_unicode`.
    #[must_use]
    pub fn with_normalize_unicode(mut self, normalize_unicode: bool) -> Self {
        self.normalize_unicode = normalize_unicode;
        self
    }

    /// Recovery mode implied by `fatal_errors`.
    #[must_use]
    pub fn recovery_mode(&self) -> RecoveryMode {
        RecoveryMode::from_fatal_errors(self.fatal_errors)
    }
}
