//! Entity model for contract analysis.
//!
//! [`ProgramBuilder`] collects source units, then freezes them into a
//! [`Program`]: every contract, function and variable gets a stable id,
//! every annotation a canonical type, and every contract a C3
//! linearization plus a [`MemberTable`] for virtual dispatch.
//!
//! Per-entity failures never abort the build. They come back as
//! [`Diagnostics`](slir_diagnostic::Diagnostics) keyed by entity, and the
//! affected entity carries a flag (`LINEARIZATION_FAILED`, `TYPE_ERROR`).

mod builder;
mod entity;
pub mod linearize;
mod members;
mod program;
mod scope;

pub use builder::{ProgramBuilder, INITIALIZER_NAME};
pub use entity::{
    Contract, ContractFlags, Event, Function, FunctionFlags, Signature, UserType, UsingFor,
    Variable, VariableFlags, VariableOwner, VariableScope,
};
pub use linearize::InheritanceOrder;
pub use members::{MemberConflict, MemberKey, MemberTable};
pub use program::Program;
pub use scope::{ScopeView, TypeIndex};
