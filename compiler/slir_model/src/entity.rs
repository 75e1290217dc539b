//! Frozen program entities.

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use slir_ir::ast::{
    ContractKind, FunctionKind, Location, ModifierInvocation, Mutability, Visibility,
};
use slir_ir::{ContractId, ExprId, FunctionId, Name, Span, StmtId, StringInterner, UnitId, VariableId};
use slir_types::{Idx, Pool};

use crate::MemberTable;

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize))]
    pub struct ContractFlags: u8 {
        const INTERFACE = 1 << 0;
        const ABSTRACT = 1 << 1;
        const LIBRARY = 1 << 2;
        /// The contract or one of its bases could not be linearized.
        const LINEARIZATION_FAILED = 1 << 3;
        /// Two bases contribute incompatible definitions of one member.
        const CONFLICT = 1 << 4;
    }
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize))]
    pub struct FunctionFlags: u8 {
        const VIRTUAL = 1 << 0;
        const OVERRIDE = 1 << 1;
        /// Has a body.
        const IMPLEMENTED = 1 << 2;
        /// A parameter, return or local failed to resolve.
        const TYPE_ERROR = 1 << 3;
        /// Created by the model rather than declared in source.
        const SYNTHETIC = 1 << 4;
    }
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize))]
    pub struct VariableFlags: u8 {
        const CONSTANT = 1 << 0;
        const IMMUTABLE = 1 << 1;
        const TYPE_ERROR = 1 << 2;
    }
}

/// Name plus canonical parameter types.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Signature {
    pub name: Name,
    pub params: Vec<Idx>,
}

impl Signature {
    pub fn new(name: Name, params: Vec<Idx>) -> Self {
        Self { name, params }
    }

    /// `transfer(address,uint256)`.
    pub fn display(&self, pool: &Pool, interner: &StringInterner) -> String {
        format!(
            "{}({})",
            interner.lookup(self.name),
            pool.display_list(&self.params, interner)
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum VariableScope {
    State,
    Local,
    Parameter,
    Return,
}

/// Who owns a variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum VariableOwner {
    Contract(ContractId),
    Function(FunctionId),
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Variable {
    pub id: VariableId,
    /// `Name::EMPTY` for unnamed parameters and returns.
    pub name: Name,
    pub ty: Idx,
    pub location: Location,
    pub scope: VariableScope,
    pub owner: VariableOwner,
    pub flags: VariableFlags,
    pub initializer: Option<ExprId>,
    pub unit: UnitId,
    pub span: Span,
}

impl Variable {
    pub fn is_state(&self) -> bool {
        self.scope == VariableScope::State
    }

    pub fn is_constant(&self) -> bool {
        self.flags.contains(VariableFlags::CONSTANT)
    }

    /// Local declared `storage`: an alias of some state location.
    pub fn is_storage_pointer(&self) -> bool {
        !self.is_state() && self.location == Location::Storage
    }
}

/// An event declared by a contract.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Event {
    pub name: Name,
    pub signature: Signature,
    pub anonymous: bool,
    pub span: Span,
}

/// A struct or enum declared inside a contract, or at file level.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UserType {
    pub name: Name,
    /// `Contract.Name` for contract-level declarations.
    pub qualified: Name,
    pub ty: Idx,
}

/// `using Library for Type;` after resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UsingFor {
    pub library: ContractId,
    /// `None` for `*`.
    pub target: Option<Idx>,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Contract {
    pub id: ContractId,
    pub name: Name,
    pub kind: ContractKind,
    pub flags: ContractFlags,
    pub unit: UnitId,
    pub span: Span,
    /// Passed through untouched.
    pub documentation: Option<String>,
    /// Direct bases that name a known contract, as written.
    pub bases: Vec<ContractId>,
    /// Base-constructor arguments given in the inheritance list.
    pub base_args: Vec<(ContractId, Vec<ExprId>)>,
    /// `None` when linearization failed.
    pub linearization: Option<Vec<ContractId>>,
    /// Declaration order, which is storage order for this contract's slots.
    pub state_variables: Vec<VariableId>,
    /// Functions, constructors, fallback and receive, in declaration order.
    pub functions: Vec<FunctionId>,
    pub modifiers: Vec<FunctionId>,
    pub events: Vec<Event>,
    pub types: Vec<UserType>,
    pub using_for: Vec<UsingFor>,
    /// Resolved members; `None` when linearization failed.
    pub members: Option<MemberTable>,
    /// Synthetic function running the state-variable initializers.
    pub initializer: Option<FunctionId>,
}

impl Contract {
    pub fn is_interface(&self) -> bool {
        self.flags.contains(ContractFlags::INTERFACE)
    }

    pub fn is_library(&self) -> bool {
        self.flags.contains(ContractFlags::LIBRARY)
    }

    /// Linearization, or just the contract itself when it failed.
    pub fn lin_or_self(&self) -> &[ContractId] {
        match &self.linearization {
            Some(lin) => lin,
            None => std::slice::from_ref(&self.id),
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Function {
    pub id: FunctionId,
    pub name: Name,
    /// `None` for free functions.
    pub contract: Option<ContractId>,
    pub kind: FunctionKind,
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub flags: FunctionFlags,
    pub params: Vec<VariableId>,
    pub returns: Vec<VariableId>,
    /// Every local declared in the body, in source order.
    pub locals: Vec<VariableId>,
    /// Declaration site of each local: the declaring statement and the
    /// position inside a tuple declaration.
    pub local_decls: FxHashMap<(StmtId, u32), VariableId>,
    /// Modifiers and base-constructor calls, as written.
    pub modifiers: Vec<ModifierInvocation>,
    pub body: Option<StmtId>,
    pub unit: UnitId,
    pub signature: Signature,
    pub span: Span,
    pub documentation: Option<String>,
}

impl Function {
    pub fn is_implemented(&self) -> bool {
        self.flags.contains(FunctionFlags::IMPLEMENTED)
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == FunctionKind::Constructor
    }

    /// Inherited through the member table (not constructors or initializers).
    pub fn is_member(&self) -> bool {
        matches!(
            self.kind,
            FunctionKind::Function | FunctionKind::Fallback | FunctionKind::Receive
        )
    }

    pub fn local_at(&self, stmt: StmtId, index: u32) -> Option<VariableId> {
        self.local_decls.get(&(stmt, index)).copied()
    }
}
