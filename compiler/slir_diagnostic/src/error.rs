//! Error taxonomy shared by every phase.

use slir_ir::Span;
use thiserror::Error;

use crate::{Diagnostic, ErrorCode, Severity};

/// Why a contract could not be linearized.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LinearizationFailure {
    #[error("base contracts cannot be ordered consistently (stuck merging {})", .remaining.join(", "))]
    Inconsistent { remaining: Vec<String> },
    #[error("inheritance cycle through `{through}`")]
    Cycle { through: String },
    #[error("base contract `{base}` is not declared")]
    UnknownBase { base: String },
    #[error("base contract `{base}` could not be linearized")]
    BaseFailed { base: String },
}

/// Every failure the pipeline reports.
///
/// Names are rendered to strings when the error is created, so a
/// diagnostic is self-contained and outlives the interner.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum AnalysisError {
    /// Fatal to the contract and every contract deriving from it.
    #[error("cannot linearize `{contract}`: {failure}")]
    Linearization {
        contract: String,
        failure: LinearizationFailure,
        span: Span,
    },
    /// Fatal to the contract.
    #[error("`{contract}` inherits conflicting definitions of `{member}` from {}", .candidates.join(" and "))]
    InheritanceConflict {
        contract: String,
        member: String,
        candidates: Vec<String>,
        span: Span,
    },
    /// Fatal to the function or variable whose type failed.
    #[error("cannot resolve type `{spelling}`: {reason}")]
    UnresolvedType {
        spelling: String,
        reason: String,
        code: TypeErrorKind,
        span: Span,
    },
    /// The function's IR is partial.
    #[error("unsupported construct: {construct}")]
    UnsupportedConstruct { construct: String, span: Span },
    /// Non-fatal; SSA is complete and the read is bound to the undefined version.
    #[error("`{variable}` may be read before it is assigned")]
    MaybeUninitialized { variable: String, span: Span },
    #[error("analysis of `{entity}` was skipped after cancellation")]
    Skipped { entity: String },
}

/// Refinement of [`AnalysisError::UnresolvedType`] that selects its code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TypeErrorKind {
    UnknownName,
    Malformed,
    Undeterminable,
}

impl AnalysisError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AnalysisError::Linearization { failure, .. } => match failure {
                LinearizationFailure::Inconsistent { .. } => ErrorCode::E1001,
                LinearizationFailure::Cycle { .. } => ErrorCode::E1002,
                LinearizationFailure::UnknownBase { .. } => ErrorCode::E1003,
                LinearizationFailure::BaseFailed { .. } => ErrorCode::E1004,
            },
            AnalysisError::InheritanceConflict { .. } => ErrorCode::E1005,
            AnalysisError::UnresolvedType { code, .. } => match code {
                TypeErrorKind::UnknownName => ErrorCode::E2001,
                TypeErrorKind::Malformed => ErrorCode::E2002,
                TypeErrorKind::Undeterminable => ErrorCode::E2003,
            },
            AnalysisError::UnsupportedConstruct { .. } => ErrorCode::E3001,
            AnalysisError::MaybeUninitialized { .. } => ErrorCode::E4001,
            AnalysisError::Skipped { .. } => ErrorCode::E9001,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AnalysisError::Linearization { .. }
            | AnalysisError::InheritanceConflict { .. }
            | AnalysisError::UnresolvedType { .. } => Severity::Error,
            AnalysisError::UnsupportedConstruct { .. }
            | AnalysisError::MaybeUninitialized { .. } => Severity::Warning,
            AnalysisError::Skipped { .. } => Severity::Note,
        }
    }

    /// Fatal errors stop analysis of the entity they are attached to.
    pub fn is_fatal(&self) -> bool {
        matches!(self.severity(), Severity::Error)
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            AnalysisError::Linearization { span, .. }
            | AnalysisError::InheritanceConflict { span, .. }
            | AnalysisError::UnresolvedType { span, .. }
            | AnalysisError::UnsupportedConstruct { span, .. }
            | AnalysisError::MaybeUninitialized { span, .. } => Some(*span),
            AnalysisError::Skipped { .. } => None,
        }
    }

    /// Render as a [`Diagnostic`] for printers.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::new(self.code(), self.severity(), self.to_string());
        if let Some(span) = self.span() {
            diag = diag.at(span, self.label());
        }
        match self {
            AnalysisError::InheritanceConflict { member, .. } => diag.note(format!(
                "override `{member}` in the deriving contract to pick one definition"
            )),
            AnalysisError::UnsupportedConstruct { .. } => {
                diag.note("the function's IR is partial past this point")
            }
            _ => diag,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AnalysisError::Linearization { .. } => "inheritance declared here",
            AnalysisError::InheritanceConflict { .. } => "ambiguous member",
            AnalysisError::UnresolvedType { .. } => "type annotation",
            AnalysisError::UnsupportedConstruct { .. } => "not lowered",
            AnalysisError::MaybeUninitialized { .. } => "read here",
            AnalysisError::Skipped { .. } => "",
        }
    }
}
