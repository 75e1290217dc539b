//! Diagnostics for the contract analysis pipeline.
//!
//! Every phase reports failures as an [`AnalysisError`] attached to the
//! entity it concerns ([`EntityKey`]). Nothing aborts the run: a contract
//! that fails to linearize or a function that fails to lower is recorded
//! here and the rest of the program is analyzed as far as possible.
//!
//! [`AnalysisError::to_diagnostic`] renders an error with its code,
//! severity and labels for printers.

mod collection;
mod diagnostic;
mod error;
mod error_code;

pub use collection::{Diagnostics, EntityKey};
pub use diagnostic::{Diagnostic, Label, Severity};
pub use error::{AnalysisError, LinearizationFailure, TypeErrorKind};
pub use error_code::ErrorCode;
