//! Diagnostic system for the Loom compiler.
//!
//! - Error codes for searchability
//! - Clear messages (what went wrong)
//! - Primary span (where it went wrong)
//!
//! The type checker converts its internal findings into [`Diagnostic`]
//! values; build tooling maps a non-empty error list to a failing exit and
//! editor integrations render the spans inline.

mod diagnostic;
mod error_code;

pub use diagnostic::{Diagnostic, Severity};
pub use error_code::ErrorCode;
