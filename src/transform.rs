//! Per-field data cleanup: scrubbing, Unicode normalization and
//! caller-registered string transformers.

use crate::config::ReaderConfig;
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::error::{MarcError, Result};
use crate::field::{is_valid_tag, INVALID_TAG};
use crate::recovery::RecoveryContext;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// A string transformer applied to field data.
pub type StringTransformer = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Remove characters below U+0020 other than TAB, CR and LF.
///
/// Returns the cleaned string and the number of characters removed.
#[must_use]
pub fn scrub(data: &str) -> (String, usize) {
    let mut removed = 0;
    let cleaned = data
        .chars()
        .filter(|c| {
            let keep = *c >= ' ' || matches!(c, '\t' | '\r' | '\n');
            if !keep {
                removed += 1;
            }
            keep
        })
        .collect();
    (cleaned, removed)
}

/// Unicode NFC normalization.
#[must_use]
pub fn normalize_nfc(data: &str) -> String {
    data.nfc().collect()
}

/// Registry of string transformers, keyed by tag or applied to every field.
///
/// Global transformers run first, then those registered for the field's
/// tag, each in registration order.
#[derive(Default)]
pub struct Transformers {
    global: Vec<StringTransformer>,
    by_tag: Vec<(String, StringTransformer)>,
}

impl Transformers {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transformer for one tag.
    pub fn register<F>(&mut self, tag: &str, transformer: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.by_tag.push((tag.to_string(), Box::new(transformer)));
    }

    /// Register a transformer for every field.
    pub fn register_global<F>(&mut self, transformer: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.global.push(Box::new(transformer));
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.by_tag.is_empty()
    }

    /// Run the applicable transformers over `data`.
    #[must_use]
    pub fn apply(&self, tag: &str, data: String) -> String {
        let global = self.global.iter();
        let tagged = self
            .by_tag
            .iter()
            .filter(|(t, _)| t == tag)
            .map(|(_, f)| f);
        global.chain(tagged).fold(data, |acc, f| f(&acc))
    }
}

impl fmt::Debug for Transformers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformers")
            .field("global", &self.global.len())
            .field(
                "by_tag",
                &self.by_tag.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Run the configured cleanup steps over one decoded value.
///
/// Order: scrubbing, NFC normalization, then transformers.
pub(crate) fn process_value<S: DiagnosticsSink + ?Sized>(
    config: &ReaderConfig,
    transformers: &Transformers,
    tag: &str,
    data: String,
    sink: &mut S,
) -> String {
    let mut data = data;
    if config.scrub_data {
        let (cleaned, removed) = scrub(&data);
        if removed > 0 {
            sink.report(Diagnostic::DataScrubbed {
                tag: tag.to_string(),
                removed,
            });
            data = cleaned;
        }
    }
    if config.normalize_unicode {
        data = normalize_nfc(&data);
    }
    if config.transform_data && !transformers.is_empty() {
        data = transformers.apply(tag, data);
    }
    data
}

/// Validate a tag read from the input.
///
/// Invalid tags become [`INVALID_TAG`] when `clean_tags` is on; otherwise
/// the field is rejected through `recovery` and `None` tells the caller to
/// leave it out.
pub(crate) fn resolve_tag<S: DiagnosticsSink + ?Sized>(
    config: &ReaderConfig,
    recovery: &mut RecoveryContext,
    record: usize,
    raw_tag: String,
    sink: &mut S,
) -> Result<Option<String>> {
    if is_valid_tag(&raw_tag) {
        return Ok(Some(raw_tag));
    }
    if config.clean_tags {
        sink.report(Diagnostic::TagCleaned {
            record,
            original: raw_tag,
        });
        return Ok(Some(INVALID_TAG.to_string()));
    }
    recovery.recover(
        MarcError::InvalidField(format!("Invalid tag '{raw_tag}'")),
        Diagnostic::MalformedField {
            record,
            tag: raw_tag,
            reason: "invalid tag".to_string(),
        },
        sink,
    )?;
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrub_keeps_whitespace_controls() {
        let (cleaned, removed) = scrub("a\u{1}b\tc\u{1b}d\r\n");
        assert_eq!(cleaned, "ab\tcd\r\n");
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_scrub_clean_input() {
        assert_eq!(scrub("Title"), ("Title".to_string(), 0));
    }

    #[test]
    fn test_nfc() {
        // 'e' followed by a combining acute accent
        assert_eq!(normalize_nfc("Caf\u{65}\u{301}"), "Caf\u{e9}");
    }

    #[test]
    fn test_process_value_respects_flags() {
        let mut transformers = Transformers::new();
        transformers.register("245", str::to_uppercase);
        let mut sink = Vec::new();

        let config = ReaderConfig::default();
        let out = process_value(&config, &transformers, "245", "ti\u{7}tle".to_string(), &mut sink);
        assert_eq!(out, "TITLE");
        assert_eq!(sink.len(), 1);

        let config = ReaderConfig::default()
            .with_scrub_data(false)
            .with_transform_data(false);
        let out = process_value(&config, &transformers, "245", "ti\u{7}tle".to_string(), &mut sink);
        assert_eq!(out, "ti\u{7}tle");
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_resolve_tag() {
        let mut recovery = RecoveryContext::default();
        let mut sink = Vec::new();
        let config = ReaderConfig::default();
        let tag = resolve_tag(&config, &mut recovery, 1, "245".to_string(), &mut sink).unwrap();
        assert_eq!(tag.as_deref(), Some("245"));

        let tag = resolve_tag(&config, &mut recovery, 1, "2 5".to_string(), &mut sink).unwrap();
        assert_eq!(tag.as_deref(), Some(INVALID_TAG));

        let config = config.with_clean_tags(false);
        let tag = resolve_tag(&config, &mut recovery, 1, "2 5".to_string(), &mut sink).unwrap();
        assert_eq!(tag, None);
        assert_eq!(recovery.recovered, 1);
        assert_eq!(sink.len(), 2);

        let mut strict = RecoveryContext::new(crate::recovery::RecoveryMode::Strict);
        let result = resolve_tag(&config, &mut strict, 1, "2 5".to_string(), &mut sink);
        assert!(matches!(result, Err(MarcError::InvalidField(_))));
    }

    #[test]
    fn test_transformer_order() {
        let mut transformers = Transformers::new();
        transformers.register("245", |s| format!("{s}!"));
        transformers.register_global(|s| s.trim_end_matches('.').to_string());
        transformers.register("100", str::to_uppercase);

        assert_eq!(transformers.apply("245", "Title.".to_string()), "Title!");
        assert_eq!(transformers.apply("100", "smith.".to_string()), "SMITH");
        assert_eq!(transformers.apply("300", "x.".to_string()), "x");
    }
}
