//! Type annotations as written in source.
//!
//! These are unresolved: the spelling is whatever the front-end saw. The
//! type resolver normalizes spellings and turns them into canonical pool
//! indices.

use crate::Name;

/// Unresolved type annotation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TypeName {
    /// Elementary type keyword exactly as spelled: `uint`, `uint256`,
    /// `byte`, `address payable`, `ufixed`.
    Elementary(Name),
    /// Path to a user-defined type: `Token`, `Vault.Position`.
    UserDefined(Vec<Name>),
    /// `T[]` (`len == None`) or `T[N]`.
    Array {
        elem: Box<TypeName>,
        len: Option<u64>,
    },
    /// `mapping(K => V)`.
    Mapping {
        key: Box<TypeName>,
        value: Box<TypeName>,
    },
    /// `function (params) returns (returns)`.
    Function {
        params: Vec<TypeName>,
        returns: Vec<TypeName>,
        external: bool,
    },
    /// Type string from legacy compiler output, e.g.
    /// `mapping(address => uint256)` or `struct Vault.Position storage ref`.
    Descriptor(Name),
    /// Legacy `var` declaration: type taken from the initializer.
    Inferred,
}

impl TypeName {
    pub fn array(elem: TypeName, len: Option<u64>) -> Self {
        TypeName::Array {
            elem: Box::new(elem),
            len,
        }
    }

    pub fn mapping(key: TypeName, value: TypeName) -> Self {
        TypeName::Mapping {
            key: Box::new(key),
            value: Box::new(value),
        }
    }
}
