//! # semtrace
//!
//! Layered fact storage and speculative-analysis traces for a compiler's
//! semantic-analysis phase.
//!
//! During name and type resolution a compiler repeatedly records typed
//! facts about program elements, tries competing resolutions without
//! polluting the authoritative result set, and later commits the winning
//! attempt or discards it. semtrace is that layered-state engine:
//!
//! - **Slices** (`slice`): typed fact channels declared once at setup
//! - **Sliced stores** (`store`): single-level multi-channel containers,
//!   plain or rewrite-auditing
//! - **Fact contexts** (`context`): the read-only query capability that
//!   chains layers together
//! - **Delegating traces** (`trace`): the mutable recording surface with
//!   read-through fallback and bulk commit
//! - **Diagnostics** (`diagnostics`): append-only reports with lazy
//!   suppression on the merged view
//!
//! ## Library usage
//!
//! ```
//! use semtrace::context::EmptyContext;
//! use semtrace::slice::{Slice, SliceRegistry};
//! use semtrace::trace::DelegatingTrace;
//!
//! let registry = SliceRegistry::new();
//! let resolved_call: Slice<u64, String> = registry.declare("RESOLVED_CALL").unwrap();
//!
//! let root = DelegatingTrace::new(&EmptyContext, "module body");
//! let attempt = DelegatingTrace::new(root.context(), "overload candidate #1");
//! attempt.record(&resolved_call, 42, "f(Int) -> Int".to_string());
//!
//! // The attempt won: push its facts into the enclosing trace.
//! attempt.move_all_my_data_to(&root);
//! assert_eq!(root.get(&resolved_call, &42).as_deref(), Some("f(Int) -> Int"));
//! ```

pub mod context;
pub mod diagnostics;
pub mod error;
pub mod key;
pub mod slice;
pub mod store;
pub mod trace;
