//! Diagnostics: report records, suppression policies, and the merged view.
//!
//! Diagnostics are append-only within a trace and never edited after being
//! reported. Suppression never deletes anything — a diagnostic is always
//! stored, and the policy only decides whether it appears in the merged
//! view computed by [`DiagnosticsMerger`]. That view is recomputed on every
//! call rather than cached, so facts recorded later by ancestors are always
//! taken into account.

use std::any::Any;
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::context::FactContext;
use crate::key::{FactKey, KeyHandle};

/// How serious a diagnostic is, as understood by suppression policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// An immutable report record produced during analysis.
///
/// Carries the identity of the source element it is attached to (used by
/// commit filters and suppression policies), a stable code, a severity and
/// a human-readable message. Message *formatting* is the host's concern;
/// the message here is stored verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    element: KeyHandle,
    severity: Severity,
    code: String,
    message: String,
}

impl Diagnostic {
    /// Create a diagnostic attached to a source element identity.
    pub fn new<E>(element: E, severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self
    where
        E: Any + Eq + Hash + Clone + fmt::Debug + Send + Sync,
    {
        Self {
            element: KeyHandle::new(element),
            severity,
            code: code.into(),
            message: message.into(),
        }
    }

    /// The erased identity of the associated source element.
    pub fn element(&self) -> &dyn FactKey {
        self.element.as_key()
    }

    /// The concrete element identity, if it has type `E`.
    pub fn element_as<E: Any>(&self) -> Option<&E> {
        self.element.downcast_ref::<E>()
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Stable code identifying the diagnostic kind, e.g. `"resolve::unresolved_reference"`.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {:?}: {}", self.severity, self.code, self.element, self.message)
    }
}

// ---------------------------------------------------------------------------
// Suppression
// ---------------------------------------------------------------------------

/// Decides whether contextual annotations on the associated source element
/// suppress a diagnostic.
///
/// Evaluated lazily on every read of the merged view against the full
/// accumulated set; the decision is never cached on the diagnostic itself.
pub trait SuppressionPolicy: Send + Sync {
    fn is_suppressed(&self, diagnostic: &Diagnostic, accumulated: &[Diagnostic]) -> bool;
}

/// Policy that suppresses nothing. The default for every trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSuppression;

impl SuppressionPolicy for NoSuppression {
    fn is_suppressed(&self, _diagnostic: &Diagnostic, _accumulated: &[Diagnostic]) -> bool {
        false
    }
}

impl<F> SuppressionPolicy for F
where
    F: Fn(&Diagnostic, &[Diagnostic]) -> bool + Send + Sync,
{
    fn is_suppressed(&self, diagnostic: &Diagnostic, accumulated: &[Diagnostic]) -> bool {
        self(diagnostic, accumulated)
    }
}

// ---------------------------------------------------------------------------
// Merged view
// ---------------------------------------------------------------------------

/// Combines a trace's locally reported diagnostics with the parent's
/// already-unsuppressed diagnostics and applies a suppression policy.
///
/// Holds only the two references it needs; [`merged`](Self::merged) is a
/// pure function of them. The parent side is taken through
/// [`FactContext::diagnostics`], which has suppression applied, so a
/// suppression resolved at an enclosing layer is never re-evaluated here.
pub struct DiagnosticsMerger<'a> {
    local: &'a [Diagnostic],
    parent: &'a dyn FactContext,
    policy: &'a dyn SuppressionPolicy,
}

impl<'a> DiagnosticsMerger<'a> {
    pub fn new(
        local: &'a [Diagnostic],
        parent: &'a dyn FactContext,
        policy: &'a dyn SuppressionPolicy,
    ) -> Self {
        Self { local, parent, policy }
    }

    /// Local diagnostics, then the parent's unsuppressed ones, filtered
    /// through the policy evaluated over the whole accumulated set.
    pub fn merged(&self) -> Vec<Diagnostic> {
        let mut accumulated = self.local.to_vec();
        accumulated.extend(self.parent.diagnostics());
        accumulated
            .iter()
            .filter(|diagnostic| !self.policy.is_suppressed(diagnostic, &accumulated))
            .cloned()
            .collect()
    }
}
