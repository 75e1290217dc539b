//! Type variants stored in the pool.

use bitflags::bitflags;
use slir_ir::ast::ContractKind;
use slir_ir::{ContractId, Name};

use crate::Idx;

/// Elementary (built-in) types after spelling normalization.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Elementary {
    Bool,
    Address,
    AddressPayable,
    String,
    Bytes,
    /// `uintN`/`intN`, `bits` in 8..=256 step 8.
    Int { signed: bool, bits: u16 },
    /// `bytesN`, N in 1..=32.
    FixedBytes(u8),
    /// `fixedMxN`/`ufixedMxN`.
    Fixed { signed: bool, bits: u16, decimals: u8 },
}

impl Elementary {
    pub const fn uint(bits: u16) -> Self {
        Elementary::Int {
            signed: false,
            bits,
        }
    }

    pub const fn int(bits: u16) -> Self {
        Elementary::Int { signed: true, bits }
    }

    /// `string` and `bytes` are dynamically sized.
    pub fn is_dynamic(self) -> bool {
        matches!(self, Elementary::String | Elementary::Bytes)
    }

    /// Canonical spelling.
    pub fn spelling(self) -> String {
        match self {
            Elementary::Bool => "bool".to_string(),
            Elementary::Address => "address".to_string(),
            Elementary::AddressPayable => "address payable".to_string(),
            Elementary::String => "string".to_string(),
            Elementary::Bytes => "bytes".to_string(),
            Elementary::Int { signed, bits } => {
                format!("{}int{bits}", if signed { "" } else { "u" })
            }
            Elementary::FixedBytes(n) => format!("bytes{n}"),
            Elementary::Fixed {
                signed,
                bits,
                decimals,
            } => format!("{}fixed{bits}x{decimals}", if signed { "" } else { "u" }),
        }
    }
}

/// One canonical type.
///
/// Children are pool indices, so hashing and equality are shallow and
/// structural identity reduces to index identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TypeData {
    Elementary(Elementary),
    /// `len == None` for dynamic arrays.
    Array { elem: Idx, len: Option<u64> },
    Mapping { key: Idx, value: Idx },
    /// `name` is qualified (`Vault.Position` for a contract-level struct).
    Struct { name: Name, fields: Vec<(Name, Idx)> },
    /// Back-reference to a struct from inside its own definition.
    StructRef(Name),
    Enum { name: Name, variants: Vec<Name> },
    Contract {
        id: ContractId,
        name: Name,
        kind: ContractKind,
    },
    Function {
        params: Vec<Idx>,
        returns: Vec<Idx>,
        external: bool,
    },
    /// Multi-value call results. The empty tuple is [`Idx::UNIT`].
    Tuple(Vec<Idx>),
    Error,
}

bitflags! {
    /// Type properties computed once at interning time.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct TypeFlags: u16 {
        /// Built-in elementary type.
        const ELEMENTARY = 1 << 0;
        /// Copied on assignment (elementary value types, enums, contracts, functions).
        const VALUE = 1 << 1;
        /// Aggregate with a data location (arrays, structs, mappings, string, bytes).
        const REFERENCE = 1 << 2;
        /// Size not known statically.
        const DYNAMIC = 1 << 3;
        /// Contains a mapping somewhere inside.
        const HAS_MAPPING = 1 << 4;
        /// Struct, enum or contract.
        const USER_DEFINED = 1 << 5;
        /// Contains the error placeholder.
        const HAS_ERROR = 1 << 6;
    }
}
