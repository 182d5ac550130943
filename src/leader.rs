//! Record label (leader) parsing and canonicalization.
//!
//! Every ISO 2709 family record starts with a 24-character label describing
//! its structure. MARC21, MAB and PICA exports are frequently sloppy about
//! this header, so [`RecordLabel`] keeps both the original input and a
//! canonical form in which malformed positions are replaced by filler values.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Position 6: Record type
//! - Position 7: Bibliographic level
//! - Position 8: Type of control / user-defined
//! - Position 9: Character coding scheme
//! - Position 10: Indicator length
//! - Position 11: Subfield code length
//! - Positions 12-16: Base address of data (5 digits)
//! - Positions 17-19: Implementation-defined
//! - Position 20: Length of the field-length part of a directory entry
//! - Position 21: Length of the starting-position part of a directory entry
//! - Position 22: Length of the implementation-defined part
//! - Position 23: Undefined

use crate::error::{MarcError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed width of a record label.
pub const LABEL_LENGTH: usize = 24;

/// A record label together with its canonical form.
///
/// Canonicalization is idempotent: feeding [`RecordLabel::record_label`] back
/// into [`RecordLabel::parse`] yields an unchanged label.
///
/// # Examples
///
/// ```
/// use marcx::RecordLabel;
///
/// let label = RecordLabel::parse("00123nam a22000 1  4500");
/// assert!(label.is_changed());
/// assert_eq!(label.record_label().len(), 24);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLabel {
    original: String,
    canonical: [char; LABEL_LENGTH],
}

impl RecordLabel {
    /// Build a label from raw characters, canonicalizing them.
    #[must_use]
    pub fn new(chars: &[char]) -> Self {
        let original: String = chars.iter().collect();
        let mut canonical = [' '; LABEL_LENGTH];
        for (slot, c) in canonical.iter_mut().zip(chars.iter()) {
            *slot = if c.is_control() { ' ' } else { *c };
        }

        for pos in (0..5).chain(12..17) {
            if !canonical[pos].is_ascii_digit() {
                canonical[pos] = '0';
            }
        }
        for pos in [10, 11] {
            if !canonical[pos].is_ascii_digit() {
                canonical[pos] = '2';
            }
        }
        for (pos, filler) in [(20, '4'), (21, '5'), (22, '0')] {
            if !canonical[pos].is_ascii_digit() {
                canonical[pos] = filler;
            }
        }

        RecordLabel {
            original,
            canonical,
        }
    }

    /// Build a label from a string slice.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        let chars: Vec<char> = label.chars().collect();
        Self::new(&chars)
    }

    /// A label consisting only of filler values.
    #[must_use]
    pub fn blank() -> Self {
        Self::new(&[' '; LABEL_LENGTH])
    }

    /// The canonical label string.
    #[must_use]
    pub fn record_label(&self) -> String {
        self.canonical.iter().collect()
    }

    /// The label exactly as it was supplied.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Whether canonicalization altered the input.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.original != self.record_label()
    }

    /// Check that the input had the fixed label width.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLabel`] if the original label is not
    /// exactly 24 characters long.
    pub fn validate(&self) -> Result<()> {
        let width = self.original.chars().count();
        if width == LABEL_LENGTH {
            Ok(())
        } else {
            Err(MarcError::InvalidLabel(format!(
                "Label must be {LABEL_LENGTH} characters, got {width}"
            )))
        }
    }

    /// Record length (positions 0-4).
    #[must_use]
    pub fn record_length(&self) -> usize {
        self.number(0..5)
    }

    /// Record status (position 5).
    #[must_use]
    pub fn record_status(&self) -> char {
        self.canonical[5]
    }

    /// Type of record (position 6).
    #[must_use]
    pub fn record_type(&self) -> char {
        self.canonical[6]
    }

    /// Bibliographic level (position 7).
    #[must_use]
    pub fn bibliographic_level(&self) -> char {
        self.canonical[7]
    }

    /// Character coding scheme (position 9). `'a'` means UCS/Unicode.
    #[must_use]
    pub fn character_coding(&self) -> char {
        self.canonical[9]
    }

    /// Indicator length (position 10).
    #[must_use]
    pub fn indicator_length(&self) -> usize {
        self.number(10..11)
    }

    /// Subfield code length, delimiter included (position 11).
    #[must_use]
    pub fn subfield_code_length(&self) -> usize {
        self.number(11..12)
    }

    /// Base address of data (positions 12-16).
    #[must_use]
    pub fn base_address(&self) -> usize {
        self.number(12..17)
    }

    /// Width of the field-length part of a directory entry (position 20).
    #[must_use]
    pub fn length_of_field_length(&self) -> usize {
        self.number(20..21)
    }

    /// Width of the starting-position part of a directory entry (position 21).
    #[must_use]
    pub fn length_of_starting_position(&self) -> usize {
        self.number(21..22)
    }

    // Positions fed in here are digits after canonicalization.
    fn number(&self, range: std::ops::Range<usize>) -> usize {
        self.canonical[range]
            .iter()
            .fold(0, |acc, c| acc * 10 + c.to_digit(10).unwrap_or(0) as usize)
    }
}

impl Default for RecordLabel {
    fn default() -> Self {
        Self::blank()
    }
}

impl FromStr for RecordLabel {
    type Err = MarcError;

    /// Strict parse: the input must have the fixed width.
    fn from_str(s: &str) -> Result<Self> {
        let label = Self::parse(s);
        label.validate()?;
        Ok(label)
    }
}

impl fmt::Display for RecordLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.record_label())
    }
}
