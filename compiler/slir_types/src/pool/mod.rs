//! Structural type interning.
//!
//! The pool is append-only. Interning the same structure twice returns the
//! same [`Idx`], and an index never changes meaning once handed out. That
//! is what lets lowering tasks intern tuple and array types concurrently
//! while every other task keeps reading.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use slir_ir::ast::ContractKind;
use slir_ir::{ContractId, Name, StringInterner};

use crate::{Elementary, Idx, TypeData, TypeFlags};

struct PoolInner {
    items: Vec<TypeData>,
    flags: Vec<TypeFlags>,
    map: FxHashMap<TypeData, Idx>,
    /// Full definition of each struct, for following `StructRef`s.
    struct_defs: FxHashMap<Name, Idx>,
}

impl PoolInner {
    fn intern(&mut self, data: TypeData) -> Idx {
        if let Some(&idx) = self.map.get(&data) {
            return idx;
        }
        let flags = self.compute_flags(&data);
        let idx = Idx::from_raw(u32::try_from(self.items.len()).unwrap_or(u32::MAX));
        if let TypeData::Struct { name, .. } = &data {
            self.struct_defs.entry(*name).or_insert(idx);
        }
        self.items.push(data.clone());
        self.flags.push(flags);
        self.map.insert(data, idx);
        idx
    }

    fn flags_of(&self, idx: Idx) -> TypeFlags {
        self.flags.get(idx.index()).copied().unwrap_or(TypeFlags::HAS_ERROR)
    }

    fn compute_flags(&self, data: &TypeData) -> TypeFlags {
        let inherited =
            |idx: Idx| self.flags_of(idx) & (TypeFlags::HAS_MAPPING | TypeFlags::HAS_ERROR);
        match data {
            TypeData::Elementary(e) if e.is_dynamic() => {
                TypeFlags::ELEMENTARY | TypeFlags::REFERENCE | TypeFlags::DYNAMIC
            }
            TypeData::Elementary(_) => TypeFlags::ELEMENTARY | TypeFlags::VALUE,
            TypeData::Array { elem, len } => {
                let mut flags = TypeFlags::REFERENCE | inherited(*elem);
                if len.is_none() || self.flags_of(*elem).contains(TypeFlags::DYNAMIC) {
                    flags |= TypeFlags::DYNAMIC;
                }
                flags
            }
            TypeData::Mapping { key, value } => {
                TypeFlags::REFERENCE
                    | TypeFlags::DYNAMIC
                    | TypeFlags::HAS_MAPPING
                    | inherited(*key)
                    | inherited(*value)
            }
            TypeData::Struct { fields, .. } => fields.iter().fold(
                TypeFlags::REFERENCE | TypeFlags::USER_DEFINED,
                |acc, (_, ty)| {
                    acc | inherited(*ty) | (self.flags_of(*ty) & TypeFlags::DYNAMIC)
                },
            ),
            TypeData::StructRef(_) => TypeFlags::REFERENCE | TypeFlags::USER_DEFINED,
            TypeData::Enum { .. } | TypeData::Contract { .. } => {
                TypeFlags::VALUE | TypeFlags::USER_DEFINED
            }
            TypeData::Function { .. } => TypeFlags::VALUE,
            TypeData::Tuple(elems) => elems
                .iter()
                .fold(TypeFlags::empty(), |acc, ty| acc | inherited(*ty)),
            TypeData::Error => TypeFlags::HAS_ERROR,
        }
    }
}

/// Interned storage for every canonical type in a program.
pub struct Pool {
    inner: RwLock<PoolInner>,
}

impl Pool {
    /// Create a pool with the fixed types at their [`Idx`] constants, followed
    /// by every other integer and fixed-bytes width.
    pub fn new() -> Self {
        let mut inner = PoolInner {
            items: Vec::with_capacity(128),
            flags: Vec::with_capacity(128),
            map: FxHashMap::default(),
            struct_defs: FxHashMap::default(),
        };

        let fixed = [
            TypeData::Elementary(Elementary::Bool),
            TypeData::Elementary(Elementary::Address),
            TypeData::Elementary(Elementary::AddressPayable),
            TypeData::Elementary(Elementary::String),
            TypeData::Elementary(Elementary::Bytes),
            TypeData::Elementary(Elementary::uint(256)),
            TypeData::Elementary(Elementary::int(256)),
            TypeData::Elementary(Elementary::uint(8)),
            TypeData::Elementary(Elementary::FixedBytes(32)),
            TypeData::Elementary(Elementary::FixedBytes(4)),
            TypeData::Error,
            TypeData::Tuple(Vec::new()),
        ];
        for data in fixed {
            inner.intern(data);
        }
        debug_assert_eq!(inner.items.len(), Idx::FIXED_COUNT as usize);

        for bits in (8..=256).step_by(8) {
            inner.intern(TypeData::Elementary(Elementary::uint(bits)));
            inner.intern(TypeData::Elementary(Elementary::int(bits)));
        }
        for n in 1..=32 {
            inner.intern(TypeData::Elementary(Elementary::FixedBytes(n)));
        }

        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Intern a type, returning the existing index for an identical structure.
    pub fn intern(&self, data: TypeData) -> Idx {
        {
            let guard = self.inner.read();
            if let Some(&idx) = guard.map.get(&data) {
                return idx;
            }
        }
        self.inner.write().intern(data)
    }

    /// The structure behind an index. Unknown indices read as `Error`.
    pub fn get(&self, idx: Idx) -> TypeData {
        self.inner
            .read()
            .items
            .get(idx.index())
            .cloned()
            .unwrap_or(TypeData::Error)
    }

    pub fn flags(&self, idx: Idx) -> TypeFlags {
        self.inner.read().flags_of(idx)
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Constructors

    pub fn elementary(&self, e: Elementary) -> Idx {
        self.intern(TypeData::Elementary(e))
    }

    pub fn array(&self, elem: Idx, len: Option<u64>) -> Idx {
        self.intern(TypeData::Array { elem, len })
    }

    pub fn mapping(&self, key: Idx, value: Idx) -> Idx {
        self.intern(TypeData::Mapping { key, value })
    }

    pub fn struct_type(&self, name: Name, fields: Vec<(Name, Idx)>) -> Idx {
        self.intern(TypeData::Struct { name, fields })
    }

    pub fn struct_ref(&self, name: Name) -> Idx {
        self.intern(TypeData::StructRef(name))
    }

    pub fn enum_type(&self, name: Name, variants: Vec<Name>) -> Idx {
        self.intern(TypeData::Enum { name, variants })
    }

    pub fn contract(&self, id: ContractId, name: Name, kind: ContractKind) -> Idx {
        self.intern(TypeData::Contract { id, name, kind })
    }

    pub fn function(&self, params: Vec<Idx>, returns: Vec<Idx>, external: bool) -> Idx {
        self.intern(TypeData::Function {
            params,
            returns,
            external,
        })
    }

    /// Tuple of `elems`; a single element is returned as itself.
    pub fn tuple(&self, elems: Vec<Idx>) -> Idx {
        if elems.len() == 1 {
            return elems[0];
        }
        self.intern(TypeData::Tuple(elems))
    }

    // Queries

    /// Follow a `StructRef` to its definition once the definition is interned.
    pub fn canonical(&self, idx: Idx) -> Idx {
        let guard = self.inner.read();
        match guard.items.get(idx.index()) {
            Some(TypeData::StructRef(name)) => guard.struct_defs.get(name).copied().unwrap_or(idx),
            _ => idx,
        }
    }

    pub fn is_reference(&self, idx: Idx) -> bool {
        self.flags(idx).contains(TypeFlags::REFERENCE)
    }

    /// Element type of an array, value type of a mapping, or `bytes1` for
    /// `bytes`/`bytesN` indexing.
    pub fn index_result(&self, idx: Idx) -> Option<Idx> {
        match self.get(idx) {
            TypeData::Array { elem, .. } => Some(self.canonical(elem)),
            TypeData::Mapping { value, .. } => Some(self.canonical(value)),
            TypeData::Elementary(Elementary::Bytes | Elementary::FixedBytes(_)) => {
                Some(self.elementary(Elementary::FixedBytes(1)))
            }
            _ => None,
        }
    }

    pub fn struct_field(&self, idx: Idx, field: Name) -> Option<Idx> {
        match self.get(self.canonical(idx)) {
            TypeData::Struct { fields, .. } => fields
                .iter()
                .find(|(name, _)| *name == field)
                .map(|(_, ty)| self.canonical(*ty)),
            _ => None,
        }
    }

    pub fn struct_name(&self, idx: Idx) -> Option<Name> {
        match self.get(idx) {
            TypeData::Struct { name, .. } | TypeData::StructRef(name) => Some(name),
            _ => None,
        }
    }

    pub fn tuple_elems(&self, idx: Idx) -> Vec<Idx> {
        match self.get(idx) {
            TypeData::Tuple(elems) => elems,
            _ => vec![idx],
        }
    }

    pub fn contract_of(&self, idx: Idx) -> Option<(ContractId, ContractKind)> {
        match self.get(idx) {
            TypeData::Contract { id, kind, .. } => Some((id, kind)),
            _ => None,
        }
    }

    pub fn is_address(&self, idx: Idx) -> bool {
        idx == Idx::ADDRESS || idx == Idx::ADDRESS_PAYABLE
    }

    // Rendering

    /// Canonical spelling: `uint256[]`, `mapping(address => uint256)`,
    /// `struct Vault.Position`, `contract Token`, `(uint256,bool)`.
    pub fn display(&self, idx: Idx, interner: &StringInterner) -> String {
        match self.get(idx) {
            TypeData::Elementary(e) => e.spelling(),
            TypeData::Array { elem, len } => match len {
                Some(n) => format!("{}[{n}]", self.display(elem, interner)),
                None => format!("{}[]", self.display(elem, interner)),
            },
            TypeData::Mapping { key, value } => format!(
                "mapping({} => {})",
                self.display(key, interner),
                self.display(value, interner)
            ),
            TypeData::Struct { name, .. } | TypeData::StructRef(name) => {
                format!("struct {}", interner.lookup(name))
            }
            TypeData::Enum { name, .. } => format!("enum {}", interner.lookup(name)),
            TypeData::Contract { name, kind, .. } => {
                let keyword = match kind {
                    ContractKind::Contract => "contract",
                    ContractKind::Interface => "interface",
                    ContractKind::Library => "library",
                };
                format!("{keyword} {}", interner.lookup(name))
            }
            TypeData::Function {
                params, returns, ..
            } => {
                let params = self.display_list(&params, interner);
                if returns.is_empty() {
                    format!("function ({params})")
                } else {
                    format!(
                        "function ({params}) returns ({})",
                        self.display_list(&returns, interner)
                    )
                }
            }
            TypeData::Tuple(elems) => format!("({})", self.display_list(&elems, interner)),
            TypeData::Error => "<error>".to_string(),
        }
    }

    pub fn display_list(&self, list: &[Idx], interner: &StringInterner) -> String {
        list.iter()
            .map(|ty| self.display(*ty, interner))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests;
