//! Canonical types for contract analysis.
//!
//! - [`Idx`]: a 32-bit handle; equal types have equal indices
//! - [`Pool`]: append-only structural interner behind a `parking_lot` lock
//! - [`TypeResolver`]: turns source annotations into indices through a
//!   [`TypeScope`] supplied by the entity model
//! - [`normalize`]: spelling normalization across compiler versions
//!
//! A type that fails to resolve becomes [`Idx::ERROR`]. Aggregates that
//! contain it carry [`TypeFlags::HAS_ERROR`], so later phases can tell a
//! poisoned entity apart without consulting the diagnostics.

mod data;
mod idx;
pub mod normalize;
mod pool;
mod resolve;

pub use data::{Elementary, TypeData, TypeFlags};
pub use idx::Idx;
pub use normalize::{normalize_elementary, parse_descriptor, NormalizeError};
pub use pool::Pool;
pub use resolve::{spell, ScopedType, TypeError, TypeResolver, TypeScope};

slir_ir::static_assert_size!(Idx, 4);
