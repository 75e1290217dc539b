//! Canonical type handle.
//!
//! `Idx` is the only type representation downstream phases see. The pool
//! interns structurally, so two types are equal exactly when their indices
//! are equal.

use std::fmt;

/// A 32-bit index into the type [`Pool`](crate::Pool).
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(transparent)]
pub struct Idx(u32);

impl Idx {
    // === Pre-interned types (indices 0-11) ===
    // Interned first by `Pool::new`, in this order.

    /// `bool`.
    pub const BOOL: Self = Self(0);
    /// `address`.
    pub const ADDRESS: Self = Self(1);
    /// `address payable`.
    pub const ADDRESS_PAYABLE: Self = Self(2);
    /// Dynamic `string`.
    pub const STRING: Self = Self(3);
    /// Dynamic `bytes`.
    pub const BYTES: Self = Self(4);
    /// `uint256`, also the type of unsuffixed number literals.
    pub const UINT256: Self = Self(5);
    /// `int256`.
    pub const INT256: Self = Self(6);
    /// `uint8`.
    pub const UINT8: Self = Self(7);
    /// `bytes32`.
    pub const BYTES32: Self = Self(8);
    /// `bytes4`, the type of `msg.sig`.
    pub const BYTES4: Self = Self(9);
    /// Placeholder carried by entities whose type failed to resolve.
    pub const ERROR: Self = Self(10);
    /// The empty tuple: result type of calls returning nothing.
    pub const UNIT: Self = Self(11);

    /// Number of fixed pre-interned types.
    pub const FIXED_COUNT: u32 = 12;

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_error(self) -> bool {
        self.0 == Self::ERROR.0
    }

    /// Name of a fixed pre-interned type, without consulting a pool.
    pub const fn fixed_name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("bool"),
            1 => Some("address"),
            2 => Some("address payable"),
            3 => Some("string"),
            4 => Some("bytes"),
            5 => Some("uint256"),
            6 => Some("int256"),
            7 => Some("uint8"),
            8 => Some("bytes32"),
            9 => Some("bytes4"),
            10 => Some("<error>"),
            11 => Some("()"),
            _ => None,
        }
    }
}

impl fmt::Debug for Idx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fixed_name() {
            Some(name) => write!(f, "Idx({name})"),
            None => write!(f, "Idx({})", self.0),
        }
    }
}
