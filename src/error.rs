//! Rich diagnostic error types for semtrace.
//!
//! Contract violations that indicate bugs in *calling* code (recording a
//! value of the wrong type under a slice, conflicting rewrites in strict
//! mode) are fatal and panic with a descriptive message — they are not
//! representable as recoverable errors. Everything that can legitimately
//! fail at setup time is an error type here, with miette `#[diagnostic]`
//! derives providing error codes and help text.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for semtrace.
#[derive(Debug, Error, Diagnostic)]
pub enum SemTraceError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Slice(#[from] SliceError),
}

// ---------------------------------------------------------------------------
// Slice registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SliceError {
    #[error("duplicate slice tag: {tag:?} is already declared as slice {existing_id}")]
    #[diagnostic(
        code(semtrace::slice::duplicate_tag),
        help(
            "Slice tags must be unique within a registry. Slices are meant to be \
             declared once at setup and shared — declare the slice in one place \
             and pass the handle around instead of re-declaring it."
        )
    )]
    DuplicateTag { tag: String, existing_id: u32 },

    #[error("slice registry exhausted: cannot declare more than u32::MAX slices")]
    #[diagnostic(
        code(semtrace::slice::exhausted),
        help(
            "The slice ID space is exhausted. Slices are process-wide constants; \
             if you see this error, something is declaring slices in a loop."
        )
    )]
    RegistryExhausted,
}

/// Convenience alias for functions returning semtrace results.
pub type SemTraceResult<T> = std::result::Result<T, SemTraceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_error_converts_to_semtrace_error() {
        let err = SliceError::DuplicateTag {
            tag: "RESOLVED_CALL".into(),
            existing_id: 3,
        };
        let top: SemTraceError = err.into();
        assert!(matches!(
            top,
            SemTraceError::Slice(SliceError::DuplicateTag { .. })
        ));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = SliceError::DuplicateTag {
            tag: "EXPRESSION_TYPE".into(),
            existing_id: 7,
        };
        let msg = format!("{err}");
        assert!(msg.contains("EXPRESSION_TYPE"));
        assert!(msg.contains('7'));
    }
}
