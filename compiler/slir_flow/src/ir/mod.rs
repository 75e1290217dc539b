//! Three-operand IR for contract functions.
//!
//! One instruction type serves two phases. Lowering emits
//! `Instr<VarId>` into a flat, label-delimited sequence; SSA conversion
//! rewrites every variable reference and produces `Instr<SsaVar>`. The
//! variant set is closed, so every consumer matches it exhaustively.
//!
//! - **[`LoweredFunction`]**: variables plus the flat instruction sequence
//! - **[`InstrKind`]**: one atomic operation with at most two source
//!   operands (call argument lists excepted) and zero or one result
//! - **[`Operand`]**: a variable, a constant, an environment value or a
//!   function reference

use std::fmt;

use slir_ir::ast::{BinaryOp, UnaryOp};
use slir_ir::{define_id, ContractId, FunctionId, Name, Span, VariableId};
use slir_model::Signature;
use slir_types::{Elementary, Idx, Pool};
use smallvec::{smallvec, SmallVec};

// ── ID newtypes ─────────────────────────────────────────────────────

define_id!(
    /// Variable slot within one lowered function.
    VarId
);
define_id!(
    /// Basic block within one function's CFG.
    BlockId
);
define_id!(
    /// Instruction within one function. Unique across IR and SSA form.
    InstrId
);
define_id!(
    /// Jump target in the flat instruction sequence.
    LabelId
);

// ── Variables ───────────────────────────────────────────────────────

/// What an IR variable stands for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum VarKind {
    State(VariableId),
    Param(VariableId),
    Return(VariableId),
    Local(VariableId),
    /// Compiler temporary holding a value.
    Temp,
    /// Compiler temporary holding an access path (`a[i]`, `s.f`) into
    /// the variable named by [`IrVar::root`].
    Reference,
}

impl VarKind {
    /// The model variable behind this slot, if any.
    pub fn variable(self) -> Option<VariableId> {
        match self {
            VarKind::State(v) | VarKind::Param(v) | VarKind::Return(v) | VarKind::Local(v) => {
                Some(v)
            }
            VarKind::Temp | VarKind::Reference => None,
        }
    }

    pub fn is_state(self) -> bool {
        matches!(self, VarKind::State(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IrVar {
    pub kind: VarKind,
    /// Source name; `Name::EMPTY` for temporaries.
    pub name: Name,
    pub ty: Idx,
    /// Variable whose storage a write through this slot lands in.
    ///
    /// Set for references and for storage pointers initialized from a
    /// state-rooted location.
    pub root: Option<VarId>,
}

// ── Operands ────────────────────────────────────────────────────────

/// Literal and synthesized constant values. No arithmetic is performed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Constant {
    Bool(bool),
    Number { value: Name, unit: Option<Name> },
    String(Name),
    Hex(Name),
    Address(Name),
    /// Default value of a type: zero, `false`, empty.
    Zero(Idx),
    EnumVariant { ty: Idx, index: u32 },
    /// A type used as a value, as in `abi.decode(data, (uint256, bool))`.
    Type(Idx),
}

/// Transaction and block context readable by any function.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EnvVar {
    MsgSender,
    MsgValue,
    MsgData,
    MsgSig,
    MsgGas,
    TxOrigin,
    TxGasPrice,
    BlockTimestamp,
    BlockNumber,
    BlockCoinbase,
    BlockDifficulty,
    BlockPrevrandao,
    BlockGasLimit,
    BlockChainId,
    BlockBaseFee,
    /// Legacy alias of `block.timestamp`.
    Now,
    This,
}

impl EnvVar {
    /// `base.member` for the `msg`, `tx` and `block` namespaces.
    pub fn lookup(base: &str, member: &str) -> Option<Self> {
        let var = match (base, member) {
            ("msg", "sender") => EnvVar::MsgSender,
            ("msg", "value") => EnvVar::MsgValue,
            ("msg", "data") => EnvVar::MsgData,
            ("msg", "sig") => EnvVar::MsgSig,
            ("msg", "gas") => EnvVar::MsgGas,
            ("tx", "origin") => EnvVar::TxOrigin,
            ("tx", "gasprice") => EnvVar::TxGasPrice,
            ("block", "timestamp") => EnvVar::BlockTimestamp,
            ("block", "number") => EnvVar::BlockNumber,
            ("block", "coinbase") => EnvVar::BlockCoinbase,
            ("block", "difficulty") => EnvVar::BlockDifficulty,
            ("block", "prevrandao") => EnvVar::BlockPrevrandao,
            ("block", "gaslimit") => EnvVar::BlockGasLimit,
            ("block", "chainid") => EnvVar::BlockChainId,
            ("block", "basefee") => EnvVar::BlockBaseFee,
            _ => return None,
        };
        Some(var)
    }

    pub fn is_namespace(name: &str) -> bool {
        matches!(name, "msg" | "tx" | "block")
    }

    /// Static type. `this` is reported as `address`; lowering substitutes
    /// the enclosing contract's type.
    pub fn ty(self) -> Idx {
        match self {
            EnvVar::MsgSender | EnvVar::TxOrigin | EnvVar::This => Idx::ADDRESS,
            EnvVar::BlockCoinbase => Idx::ADDRESS_PAYABLE,
            EnvVar::MsgData => Idx::BYTES,
            EnvVar::MsgSig => Idx::BYTES4,
            EnvVar::MsgValue
            | EnvVar::MsgGas
            | EnvVar::TxGasPrice
            | EnvVar::BlockTimestamp
            | EnvVar::BlockNumber
            | EnvVar::BlockDifficulty
            | EnvVar::BlockPrevrandao
            | EnvVar::BlockGasLimit
            | EnvVar::BlockChainId
            | EnvVar::BlockBaseFee
            | EnvVar::Now => Idx::UINT256,
        }
    }
}

/// Source operand of an instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Operand<V> {
    Var(V),
    Const(Constant),
    Env(EnvVar),
    /// A function used as a value (internal function pointer).
    Func(FunctionId),
}

impl<V: Copy> Operand<V> {
    pub fn as_var(&self) -> Option<V> {
        match self {
            Operand::Var(v) => Some(*v),
            Operand::Const(_) | Operand::Env(_) | Operand::Func(_) => None,
        }
    }
}

impl<V> Operand<V> {
    pub fn map<W>(self, f: impl FnOnce(V) -> W) -> Operand<W> {
        match self {
            Operand::Var(v) => Operand::Var(f(v)),
            Operand::Const(c) => Operand::Const(c),
            Operand::Env(e) => Operand::Env(e),
            Operand::Func(id) => Operand::Func(id),
        }
    }
}

// ── Call shapes ─────────────────────────────────────────────────────

/// How an internal call picks its callee.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CallTarget {
    /// Statically bound: free functions, `Base.f()`, base constructors.
    Direct(FunctionId),
    /// Dispatched through the most-derived contract's member table.
    /// `declared` is the binding seen from the calling contract alone.
    Virtual {
        signature: Signature,
        declared: Option<FunctionId>,
    },
    /// `super.f()`: the next implementation after `from` in the
    /// most-derived contract's linearization.
    Super {
        from: ContractId,
        signature: Signature,
    },
    /// Modifier applied at function entry; overridable like a function.
    Modifier {
        name: Name,
        declared: Option<FunctionId>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LowLevelKind {
    Call,
    DelegateCall,
    StaticCall,
    CallCode,
    Send,
    Transfer,
}

impl LowLevelKind {
    /// Address member naming a low-level call.
    pub fn from_member(member: &str) -> Option<Self> {
        let kind = match member {
            "call" => LowLevelKind::Call,
            "delegatecall" => LowLevelKind::DelegateCall,
            "staticcall" => LowLevelKind::StaticCall,
            "callcode" => LowLevelKind::CallCode,
            "send" => LowLevelKind::Send,
            "transfer" => LowLevelKind::Transfer,
            _ => return None,
        };
        Some(kind)
    }

    /// `send` returns a success flag, `transfer` reverts and returns
    /// nothing, the rest return `(bool, bytes)`.
    pub fn result_ty(self, pool: &Pool) -> Idx {
        match self {
            LowLevelKind::Send => Idx::BOOL,
            LowLevelKind::Transfer => Idx::UNIT,
            LowLevelKind::Call
            | LowLevelKind::DelegateCall
            | LowLevelKind::StaticCall
            | LowLevelKind::CallCode => pool.tuple(vec![Idx::BOOL, Idx::BYTES]),
        }
    }
}

/// Language-level functions with known semantics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Builtin {
    Keccak256,
    Sha256,
    Ripemd160,
    EcRecover,
    AddMod,
    MulMod,
    GasLeft,
    BlockHash,
    SelfDestruct,
    AbiEncode,
    AbiEncodePacked,
    AbiEncodeWithSelector,
    AbiEncodeWithSignature,
    AbiEncodeCall,
    AbiDecode,
}

impl Builtin {
    /// Free function form: `keccak256(x)`.
    pub fn from_free(name: &str) -> Option<Self> {
        let builtin = match name {
            "keccak256" | "sha3" => Builtin::Keccak256,
            "sha256" => Builtin::Sha256,
            "ripemd160" => Builtin::Ripemd160,
            "ecrecover" => Builtin::EcRecover,
            "addmod" => Builtin::AddMod,
            "mulmod" => Builtin::MulMod,
            "gasleft" => Builtin::GasLeft,
            "blockhash" => Builtin::BlockHash,
            "selfdestruct" | "suicide" => Builtin::SelfDestruct,
            _ => return None,
        };
        Some(builtin)
    }

    /// `abi.<member>` form.
    pub fn from_abi(member: &str) -> Option<Self> {
        let builtin = match member {
            "encode" => Builtin::AbiEncode,
            "encodePacked" => Builtin::AbiEncodePacked,
            "encodeWithSelector" => Builtin::AbiEncodeWithSelector,
            "encodeWithSignature" => Builtin::AbiEncodeWithSignature,
            "encodeCall" => Builtin::AbiEncodeCall,
            "decode" => Builtin::AbiDecode,
            _ => return None,
        };
        Some(builtin)
    }

    /// Result type. `abi.decode` is typed by its arguments; lowering
    /// computes that one itself.
    pub fn result_ty(self, pool: &Pool) -> Idx {
        match self {
            Builtin::Keccak256 | Builtin::Sha256 | Builtin::BlockHash => Idx::BYTES32,
            Builtin::Ripemd160 => pool.elementary(Elementary::FixedBytes(20)),
            Builtin::EcRecover => Idx::ADDRESS,
            Builtin::AddMod | Builtin::MulMod | Builtin::GasLeft => Idx::UINT256,
            Builtin::SelfDestruct | Builtin::AbiDecode => Idx::UNIT,
            Builtin::AbiEncode
            | Builtin::AbiEncodePacked
            | Builtin::AbiEncodeWithSelector
            | Builtin::AbiEncodeWithSignature
            | Builtin::AbiEncodeCall => Idx::BYTES,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RequireKind {
    Require,
    Assert,
}

/// What a [`InstrKind::Store`] does to the location.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum StoreMode {
    Assign,
    Push,
    Pop,
    Delete,
}

// ── Instructions ────────────────────────────────────────────────────

/// Whether a variable reference reads or writes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Use,
    Def,
}

/// One atomic operation.
///
/// `V` is [`VarId`] after lowering and
/// [`SsaVar`](crate::ssa::SsaVar) after SSA conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum InstrKind<V> {
    // Data
    Assign {
        dst: V,
        value: Operand<V>,
    },
    Binary {
        dst: V,
        op: BinaryOp,
        lhs: Operand<V>,
        rhs: Operand<V>,
    },
    Unary {
        dst: V,
        op: UnaryOp,
        operand: Operand<V>,
    },
    Convert {
        dst: V,
        value: Operand<V>,
        to: Idx,
    },
    /// `dst = &base[index]`; `dst` is a reference.
    Index {
        dst: V,
        base: Operand<V>,
        index: Option<Operand<V>>,
    },
    /// `dst = &base.member`; `dst` is a reference.
    Member {
        dst: V,
        base: Operand<V>,
        member: Name,
    },
    /// Read the value behind a state variable or a reference.
    Load {
        dst: V,
        src: V,
    },
    /// Write into `root`, directly or through the reference `target`.
    ///
    /// Defines a new version of `root`; `prior` is the version written
    /// into. Both name the same base variable.
    Store {
        root: V,
        prior: V,
        target: Option<V>,
        value: Option<Operand<V>>,
        mode: StoreMode,
    },
    /// Element `index` of a tuple temporary.
    Extract {
        dst: V,
        tuple: V,
        index: u32,
    },
    /// Struct constructor, inline array or `new T[](n)`.
    Construct {
        dst: V,
        ty: Idx,
        args: Vec<Operand<V>>,
    },

    // Calls
    InternalCall {
        dst: Option<V>,
        target: CallTarget,
        args: Vec<Operand<V>>,
    },
    LibraryCall {
        dst: Option<V>,
        library: ContractId,
        name: Name,
        function: Option<FunctionId>,
        args: Vec<Operand<V>>,
    },
    ExternalCall {
        dst: Option<V>,
        receiver: Operand<V>,
        name: Name,
        /// Declaration on the receiver's static type, when known.
        function: Option<FunctionId>,
        args: Vec<Operand<V>>,
        value: Option<Operand<V>>,
        gas: Option<Operand<V>>,
    },
    LowLevelCall {
        dst: Option<V>,
        kind: LowLevelKind,
        receiver: Operand<V>,
        args: Vec<Operand<V>>,
        value: Option<Operand<V>>,
        gas: Option<Operand<V>>,
    },
    IndirectCall {
        dst: Option<V>,
        callee: Operand<V>,
        args: Vec<Operand<V>>,
    },
    NewContract {
        dst: V,
        contract: ContractId,
        args: Vec<Operand<V>>,
        value: Option<Operand<V>>,
        salt: Option<Operand<V>>,
    },
    BuiltinCall {
        dst: Option<V>,
        builtin: Builtin,
        args: Vec<Operand<V>>,
    },
    Emit {
        event: Name,
        args: Vec<Operand<V>>,
    },

    // SSA only
    Phi {
        dst: V,
        incoming: Vec<(BlockId, V)>,
    },
    /// Entry value of a parameter, return or state variable.
    Input {
        dst: V,
    },

    /// Modifier `_`: the modified function's body runs here.
    Placeholder,
    /// Stand-in for a construct lowering does not support.
    Opaque {
        dst: Option<V>,
    },

    // Control
    Label(LabelId),
    Jump {
        target: LabelId,
    },
    Branch {
        cond: Operand<V>,
        then_label: LabelId,
        else_label: LabelId,
    },
    Require {
        cond: Operand<V>,
        message: Option<Operand<V>>,
        kind: RequireKind,
    },
    Return {
        values: Vec<Operand<V>>,
    },
    Revert {
        error: Option<Name>,
        args: Vec<Operand<V>>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Instr<V> {
    pub id: InstrId,
    pub kind: InstrKind<V>,
    pub span: Span,
}

impl<V> Instr<V> {
    pub fn map_vars<W, F: FnMut(V, Access) -> W>(self, f: &mut F) -> Instr<W> {
        Instr {
            id: self.id,
            kind: self.kind.map_vars(f),
            span: self.span,
        }
    }
}

impl<V: Copy> InstrKind<V> {
    /// The variable this instruction defines, if any.
    pub fn result(&self) -> Option<V> {
        match self {
            InstrKind::Assign { dst, .. }
            | InstrKind::Binary { dst, .. }
            | InstrKind::Unary { dst, .. }
            | InstrKind::Convert { dst, .. }
            | InstrKind::Index { dst, .. }
            | InstrKind::Member { dst, .. }
            | InstrKind::Load { dst, .. }
            | InstrKind::Extract { dst, .. }
            | InstrKind::Construct { dst, .. }
            | InstrKind::NewContract { dst, .. }
            | InstrKind::Phi { dst, .. }
            | InstrKind::Input { dst } => Some(*dst),
            InstrKind::Store { root, .. } => Some(*root),
            InstrKind::InternalCall { dst, .. }
            | InstrKind::LibraryCall { dst, .. }
            | InstrKind::ExternalCall { dst, .. }
            | InstrKind::LowLevelCall { dst, .. }
            | InstrKind::IndirectCall { dst, .. }
            | InstrKind::BuiltinCall { dst, .. }
            | InstrKind::Opaque { dst } => *dst,
            InstrKind::Emit { .. }
            | InstrKind::Placeholder
            | InstrKind::Label(_)
            | InstrKind::Jump { .. }
            | InstrKind::Branch { .. }
            | InstrKind::Require { .. }
            | InstrKind::Return { .. }
            | InstrKind::Revert { .. } => None,
        }
    }

    /// Every operand read, in evaluation order.
    pub fn operands(&self) -> SmallVec<[Operand<V>; 4]> {
        fn with_tail<V: Copy>(
            head: &[Operand<V>],
            args: &[Operand<V>],
            tail: &[Option<Operand<V>>],
        ) -> SmallVec<[Operand<V>; 4]> {
            let mut ops: SmallVec<[Operand<V>; 4]> = head.iter().copied().collect();
            ops.extend(args.iter().copied());
            ops.extend(tail.iter().flatten().copied());
            ops
        }

        match self {
            InstrKind::Assign { value, .. }
            | InstrKind::Unary { operand: value, .. }
            | InstrKind::Convert { value, .. }
            | InstrKind::Member { base: value, .. } => smallvec![*value],
            InstrKind::Binary { lhs, rhs, .. } => smallvec![*lhs, *rhs],
            InstrKind::Index { base, index, .. } => with_tail(&[*base], &[], &[*index]),
            InstrKind::Load { src, .. } => smallvec![Operand::Var(*src)],
            InstrKind::Store {
                prior,
                target,
                value,
                ..
            } => {
                let mut ops: SmallVec<[Operand<V>; 4]> = SmallVec::new();
                ops.extend(target.map(Operand::Var));
                ops.extend(*value);
                ops.push(Operand::Var(*prior));
                ops
            }
            InstrKind::Extract { tuple, .. } => smallvec![Operand::Var(*tuple)],
            InstrKind::Construct { args, .. }
            | InstrKind::InternalCall { args, .. }
            | InstrKind::LibraryCall { args, .. }
            | InstrKind::BuiltinCall { args, .. }
            | InstrKind::Emit { args, .. }
            | InstrKind::Return { values: args }
            | InstrKind::Revert { args, .. } => args.iter().copied().collect(),
            InstrKind::ExternalCall {
                receiver,
                args,
                value,
                gas,
                ..
            }
            | InstrKind::LowLevelCall {
                receiver,
                args,
                value,
                gas,
                ..
            } => with_tail(&[*receiver], args, &[*value, *gas]),
            InstrKind::IndirectCall { callee, args, .. } => with_tail(&[*callee], args, &[]),
            InstrKind::NewContract {
                args, value, salt, ..
            } => with_tail(&[], args, &[*value, *salt]),
            InstrKind::Phi { incoming, .. } => {
                incoming.iter().map(|(_, v)| Operand::Var(*v)).collect()
            }
            InstrKind::Branch { cond, .. } => smallvec![*cond],
            InstrKind::Require { cond, message, .. } => with_tail(&[*cond], &[], &[*message]),
            InstrKind::Input { .. }
            | InstrKind::Placeholder
            | InstrKind::Opaque { .. }
            | InstrKind::Label(_)
            | InstrKind::Jump { .. } => SmallVec::new(),
        }
    }

    /// Variables read, in evaluation order.
    pub fn uses(&self) -> SmallVec<[V; 4]> {
        self.operands().iter().filter_map(Operand::as_var).collect()
    }
}

impl<V> InstrKind<V> {
    /// Rewrite every variable reference. `f` sees all uses before the
    /// definition, so a renamer can resolve reads against the state
    /// before the write.
    pub fn map_vars<W, F: FnMut(V, Access) -> W>(self, f: &mut F) -> InstrKind<W> {
        fn op<V, W, F: FnMut(V, Access) -> W>(o: Operand<V>, f: &mut F) -> Operand<W> {
            o.map(|v| f(v, Access::Use))
        }
        fn ops<V, W, F: FnMut(V, Access) -> W>(os: Vec<Operand<V>>, f: &mut F) -> Vec<Operand<W>> {
            os.into_iter().map(|o| op(o, &mut *f)).collect()
        }
        fn opt<V, W, F: FnMut(V, Access) -> W>(
            o: Option<Operand<V>>,
            f: &mut F,
        ) -> Option<Operand<W>> {
            o.map(|o| op(o, f))
        }

        match self {
            InstrKind::Assign { dst, value } => {
                let value = op(value, f);
                InstrKind::Assign {
                    dst: f(dst, Access::Def),
                    value,
                }
            }
            InstrKind::Binary { dst, op: o, lhs, rhs } => {
                let lhs = op(lhs, f);
                let rhs = op(rhs, f);
                InstrKind::Binary {
                    dst: f(dst, Access::Def),
                    op: o,
                    lhs,
                    rhs,
                }
            }
            InstrKind::Unary {
                dst,
                op: o,
                operand,
            } => {
                let operand = op(operand, f);
                InstrKind::Unary {
                    dst: f(dst, Access::Def),
                    op: o,
                    operand,
                }
            }
            InstrKind::Convert { dst, value, to } => {
                let value = op(value, f);
                InstrKind::Convert {
                    dst: f(dst, Access::Def),
                    value,
                    to,
                }
            }
            InstrKind::Index { dst, base, index } => {
                let base = op(base, f);
                let index = opt(index, f);
                InstrKind::Index {
                    dst: f(dst, Access::Def),
                    base,
                    index,
                }
            }
            InstrKind::Member { dst, base, member } => {
                let base = op(base, f);
                InstrKind::Member {
                    dst: f(dst, Access::Def),
                    base,
                    member,
                }
            }
            InstrKind::Load { dst, src } => {
                let src = f(src, Access::Use);
                InstrKind::Load {
                    dst: f(dst, Access::Def),
                    src,
                }
            }
            InstrKind::Store {
                root,
                prior,
                target,
                value,
                mode,
            } => {
                let target = target.map(|t| f(t, Access::Use));
                let value = opt(value, f);
                let prior = f(prior, Access::Use);
                InstrKind::Store {
                    root: f(root, Access::Def),
                    prior,
                    target,
                    value,
                    mode,
                }
            }
            InstrKind::Extract { dst, tuple, index } => {
                let tuple = f(tuple, Access::Use);
                InstrKind::Extract {
                    dst: f(dst, Access::Def),
                    tuple,
                    index,
                }
            }
            InstrKind::Construct { dst, ty, args } => {
                let args = ops(args, f);
                InstrKind::Construct {
                    dst: f(dst, Access::Def),
                    ty,
                    args,
                }
            }
            InstrKind::InternalCall { dst, target, args } => {
                let args = ops(args, f);
                InstrKind::InternalCall {
                    dst: dst.map(|d| f(d, Access::Def)),
                    target,
                    args,
                }
            }
            InstrKind::LibraryCall {
                dst,
                library,
                name,
                function,
                args,
            } => {
                let args = ops(args, f);
                InstrKind::LibraryCall {
                    dst: dst.map(|d| f(d, Access::Def)),
                    library,
                    name,
                    function,
                    args,
                }
            }
            InstrKind::ExternalCall {
                dst,
                receiver,
                name,
                function,
                args,
                value,
                gas,
            } => {
                let receiver = op(receiver, f);
                let args = ops(args, f);
                let value = opt(value, f);
                let gas = opt(gas, f);
                InstrKind::ExternalCall {
                    dst: dst.map(|d| f(d, Access::Def)),
                    receiver,
                    name,
                    function,
                    args,
                    value,
                    gas,
                }
            }
            InstrKind::LowLevelCall {
                dst,
                kind,
                receiver,
                args,
                value,
                gas,
            } => {
                let receiver = op(receiver, f);
                let args = ops(args, f);
                let value = opt(value, f);
                let gas = opt(gas, f);
                InstrKind::LowLevelCall {
                    dst: dst.map(|d| f(d, Access::Def)),
                    kind,
                    receiver,
                    args,
                    value,
                    gas,
                }
            }
            InstrKind::IndirectCall { dst, callee, args } => {
                let callee = op(callee, f);
                let args = ops(args, f);
                InstrKind::IndirectCall {
                    dst: dst.map(|d| f(d, Access::Def)),
                    callee,
                    args,
                }
            }
            InstrKind::NewContract {
                dst,
                contract,
                args,
                value,
                salt,
            } => {
                let args = ops(args, f);
                let value = opt(value, f);
                let salt = opt(salt, f);
                InstrKind::NewContract {
                    dst: f(dst, Access::Def),
                    contract,
                    args,
                    value,
                    salt,
                }
            }
            InstrKind::BuiltinCall { dst, builtin, args } => {
                let args = ops(args, f);
                InstrKind::BuiltinCall {
                    dst: dst.map(|d| f(d, Access::Def)),
                    builtin,
                    args,
                }
            }
            InstrKind::Emit { event, args } => InstrKind::Emit {
                event,
                args: ops(args, f),
            },
            InstrKind::Phi { dst, incoming } => {
                let incoming = incoming
                    .into_iter()
                    .map(|(block, v)| (block, f(v, Access::Use)))
                    .collect();
                InstrKind::Phi {
                    dst: f(dst, Access::Def),
                    incoming,
                }
            }
            InstrKind::Input { dst } => InstrKind::Input {
                dst: f(dst, Access::Def),
            },
            InstrKind::Placeholder => InstrKind::Placeholder,
            InstrKind::Opaque { dst } => InstrKind::Opaque {
                dst: dst.map(|d| f(d, Access::Def)),
            },
            InstrKind::Label(label) => InstrKind::Label(label),
            InstrKind::Jump { target } => InstrKind::Jump { target },
            InstrKind::Branch {
                cond,
                then_label,
                else_label,
            } => InstrKind::Branch {
                cond: op(cond, f),
                then_label,
                else_label,
            },
            InstrKind::Require {
                cond,
                message,
                kind,
            } => {
                let cond = op(cond, f);
                InstrKind::Require {
                    cond,
                    message: opt(message, f),
                    kind,
                }
            }
            InstrKind::Return { values } => InstrKind::Return {
                values: ops(values, f),
            },
            InstrKind::Revert { error, args } => InstrKind::Revert {
                error,
                args: ops(args, f),
            },
        }
    }

    /// Control-transfer instructions end a basic block.
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            InstrKind::Jump { .. }
                | InstrKind::Branch { .. }
                | InstrKind::Return { .. }
                | InstrKind::Revert { .. }
                | InstrKind::Require { .. }
                | InstrKind::ExternalCall { .. }
                | InstrKind::NewContract { .. }
        )
    }

    /// Control may leave through the exceptional edge.
    pub fn may_raise(&self) -> bool {
        matches!(
            self,
            InstrKind::Require { .. } | InstrKind::ExternalCall { .. } | InstrKind::NewContract { .. }
        )
    }

    /// Execution never continues with the next instruction.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstrKind::Jump { .. }
                | InstrKind::Branch { .. }
                | InstrKind::Return { .. }
                | InstrKind::Revert { .. }
        )
    }

    /// Leaves the function normally or by reverting.
    pub fn is_exit(&self) -> bool {
        matches!(self, InstrKind::Return { .. } | InstrKind::Revert { .. })
    }

    pub fn is_call(&self) -> bool {
        matches!(
            self,
            InstrKind::InternalCall { .. }
                | InstrKind::LibraryCall { .. }
                | InstrKind::ExternalCall { .. }
                | InstrKind::LowLevelCall { .. }
                | InstrKind::IndirectCall { .. }
                | InstrKind::NewContract { .. }
                | InstrKind::BuiltinCall { .. }
        )
    }

    /// Short lowercase name, used by dumps and tests.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            InstrKind::Assign { .. } => "assign",
            InstrKind::Binary { .. } => "binary",
            InstrKind::Unary { .. } => "unary",
            InstrKind::Convert { .. } => "convert",
            InstrKind::Index { .. } => "index",
            InstrKind::Member { .. } => "member",
            InstrKind::Load { .. } => "load",
            InstrKind::Store { .. } => "store",
            InstrKind::Extract { .. } => "extract",
            InstrKind::Construct { .. } => "construct",
            InstrKind::InternalCall { .. } => "internal_call",
            InstrKind::LibraryCall { .. } => "library_call",
            InstrKind::ExternalCall { .. } => "external_call",
            InstrKind::LowLevelCall { .. } => "low_level_call",
            InstrKind::IndirectCall { .. } => "indirect_call",
            InstrKind::NewContract { .. } => "new_contract",
            InstrKind::BuiltinCall { .. } => "builtin_call",
            InstrKind::Emit { .. } => "emit",
            InstrKind::Phi { .. } => "phi",
            InstrKind::Input { .. } => "input",
            InstrKind::Placeholder => "placeholder",
            InstrKind::Opaque { .. } => "opaque",
            InstrKind::Label(_) => "label",
            InstrKind::Jump { .. } => "jump",
            InstrKind::Branch { .. } => "branch",
            InstrKind::Require { .. } => "require",
            InstrKind::Return { .. } => "return",
            InstrKind::Revert { .. } => "revert",
        }
    }
}

impl<V> fmt::Display for InstrKind<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

// ── Lowered function ────────────────────────────────────────────────

/// Output of lowering: the flat, label-delimited instruction sequence.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LoweredFunction {
    pub function: FunctionId,
    pub vars: Vec<IrVar>,
    pub instrs: Vec<Instr<VarId>>,
    pub params: Vec<VarId>,
    pub returns: Vec<VarId>,
    /// Some construct was replaced by `Opaque`.
    pub partial: bool,
}

impl LoweredFunction {
    pub fn var(&self, id: VarId) -> &IrVar {
        &self.vars[id.index()]
    }

    /// The IR slot of a model variable.
    pub fn var_of(&self, variable: VariableId) -> Option<VarId> {
        self.vars
            .iter()
            .position(|v| v.kind.variable() == Some(variable))
            .map(VarId::from_len)
    }

    /// State variables the function touches, in first-reference order.
    pub fn state_vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.vars
            .iter()
            .enumerate()
            .filter(|(_, v)| v.kind.is_state())
            .map(|(i, _)| VarId::from_len(i))
    }

    pub fn mnemonics(&self) -> Vec<&'static str> {
        self.instrs.iter().map(|i| i.kind.mnemonic()).collect()
    }
}
