//! Arena index newtypes shared across the pipeline.
//!
//! Every entity the model owns is addressed by a dense 32-bit index into
//! its arena. Ids are allocated in declaration order, which keeps every
//! traversal over them deterministic.

/// Define a `u32` index newtype with `new`/`raw`/`index` accessors.
///
/// Exported so later phases can mint their own function-local ids.
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an id from a raw index.
            #[inline]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw `u32` value.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Id for the next element of an arena currently holding `len` items.
            ///
            /// # Panics
            /// Panics if the arena outgrows `u32`.
            #[inline]
            pub fn from_len(len: usize) -> Self {
                Self(u32::try_from(len).unwrap_or_else(|_| {
                    panic!("{} arena exceeded u32::MAX entries", stringify!($name))
                }))
            }
        }
    };
}

define_id!(
    /// Index of a compilation unit handed to the model.
    UnitId
);
define_id!(
    /// Index of a contract, interface or library in the program.
    ContractId
);
define_id!(
    /// Index of a function, modifier, constructor or synthetic initializer.
    FunctionId
);
define_id!(
    /// Index of a state variable, parameter, return variable or local.
    VariableId
);
define_id!(
    /// Index of an expression in a unit's [`AstArena`](crate::ast::AstArena).
    ExprId
);
define_id!(
    /// Index of a statement in a unit's [`AstArena`](crate::ast::AstArena).
    StmtId
);
