//! Recovery strategy for malformed records.
//!
//! Legacy bibliographic dumps routinely contain broken records. In
//! [`RecoveryMode::Strict`] the first structural problem aborts the parse; in
//! [`RecoveryMode::Lenient`] the problem becomes a diagnostic and the reader
//! skips the offending field or record.

use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::error::{MarcError, Result};

/// Strategy for handling malformed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryMode {
    /// Return errors for any malformation
    Strict,
    /// Report malformations as diagnostics and continue (default)
    #[default]
    Lenient,
}

impl RecoveryMode {
    /// Map the `fatal_errors` configuration flag to a mode.
    #[must_use]
    pub fn from_fatal_errors(fatal_errors: bool) -> Self {
        if fatal_errors {
            RecoveryMode::Strict
        } else {
            RecoveryMode::Lenient
        }
    }
}

/// Recovery context tracking how many problems were absorbed.
#[derive(Debug, Default)]
pub struct RecoveryContext {
    /// Current recovery mode
    pub mode: RecoveryMode,
    /// Number of problems reported instead of raised
    pub recovered: usize,
}

impl RecoveryContext {
    /// Create a new recovery context with the given mode.
    #[must_use]
    pub fn new(mode: RecoveryMode) -> Self {
        RecoveryContext { mode, recovered: 0 }
    }

    /// Raise `error` in strict mode, otherwise report `diagnostic`.
    ///
    /// # Errors
    ///
    /// Returns `error` unchanged in strict mode.
    pub fn recover<S: DiagnosticsSink + ?Sized>(
        &mut self,
        error: MarcError,
        diagnostic: Diagnostic,
        sink: &mut S,
    ) -> Result<()> {
        match self.mode {
            RecoveryMode::Strict => Err(error),
            RecoveryMode::Lenient => {
                tracing::warn!("{diagnostic}");
                self.recovered += 1;
                sink.report(diagnostic);
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;

    fn skipped() -> Diagnostic {
        Diagnostic::RecordSkipped {
            record: 1,
            reason: "test".to_string(),
        }
    }

    #[test]
    fn test_recovery_context_default() {
        let ctx = RecoveryContext::default();
        assert_eq!(ctx.mode, RecoveryMode::Lenient);
        assert_eq!(ctx.recovered, 0);
    }

    #[test]
    fn test_recovery_mode_lenient() {
        let mut ctx = RecoveryContext::new(RecoveryMode::Lenient);
        let mut sink = Vec::new();
        let error = MarcError::InvalidField("test".to_string());
        assert!(ctx.recover(error, skipped(), &mut sink).is_ok());
        assert_eq!(ctx.recovered, 1);
        assert_eq!(sink[0].kind(), DiagnosticKind::RecordSkipped);
    }

    #[test]
    fn test_recovery_mode_strict() {
        let mut ctx = RecoveryContext::new(RecoveryMode::Strict);
        let mut sink = Vec::new();
        let error = MarcError::InvalidField("test".to_string());
        let result = ctx.recover(error, skipped(), &mut sink);
        assert!(matches!(result, Err(MarcError::InvalidField(_))));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_from_fatal_errors() {
        assert_eq!(RecoveryMode::from_fatal_errors(true), RecoveryMode::Strict);
        assert_eq!(RecoveryMode::from_fatal_errors(false), RecoveryMode::Lenient);
    }
}
