use std::fmt;

/// Error codes for all analysis diagnostics.
///
/// Format: E#### where the first digit indicates the phase:
/// - E1xxx: Entity model and inheritance
/// - E2xxx: Type resolution
/// - E3xxx: IR lowering
/// - E4xxx: SSA construction
/// - E9xxx: Scheduling
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ErrorCode {
    // Model Errors (E1xxx)
    /// No order satisfies the C3 constraints
    E1001,
    /// Contract inherits from itself
    E1002,
    /// Base contract name does not resolve
    E1003,
    /// A base contract failed to linearize
    E1004,
    /// Unrelated bases provide the same member
    E1005,

    // Type Errors (E2xxx)
    /// Unknown user-defined type
    E2001,
    /// Malformed elementary spelling or type string
    E2002,
    /// Type cannot be determined from the declaration
    E2003,

    // Lowering Errors (E3xxx)
    /// Construct has no lowering rule
    E3001,

    // SSA Warnings (E4xxx)
    /// Variable may be read before it is assigned
    E4001,

    // Scheduling (E9xxx)
    /// Analysis skipped after cancellation
    E9001,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
            ErrorCode::E1003 => "E1003",
            ErrorCode::E1004 => "E1004",
            ErrorCode::E1005 => "E1005",
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E3001 => "E3001",
            ErrorCode::E4001 => "E4001",
            ErrorCode::E9001 => "E9001",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
