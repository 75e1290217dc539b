//! Shared vocabulary for the contract analysis pipeline.
//!
//! - [`Name`] and [`StringInterner`]: interned identifiers and literal text
//! - [`Span`]: byte ranges into a source unit
//! - Entity ids ([`ContractId`], [`FunctionId`], [`VariableId`], ...)
//! - [`ast`]: the normalized AST that front-ends hand to the core
//! - [`ensure_sufficient_stack`]: stack growth for recursive walks

pub mod ast;
mod ids;
mod interner;
mod name;
mod span;
mod stack;

pub use ids::{ContractId, ExprId, FunctionId, StmtId, UnitId, VariableId};
pub use interner::{InternError, SharedInterner, StringInterner};
pub use name::Name;
pub use span::Span;
pub use stack::ensure_sufficient_stack;

/// Compile-time size check for hot data structures.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

static_assert_size!(Name, 4);
static_assert_size!(Span, 8);
static_assert_size!(ExprId, 4);
