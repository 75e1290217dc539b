//! User-defined type lookup.
//!
//! [`TypeIndex`] records where each struct and enum is declared without
//! borrowing the AST. [`ScopeView`] pairs it with the units and the
//! linearizations to answer [`TypeScope`] queries: a contract sees its own
//! declarations, then those of its bases in linearization order, then
//! contract names, then file-level declarations.

use rustc_hash::FxHashMap;
use slir_ir::ast::{ContractKind, SourceUnit};
use slir_ir::{ContractId, Name, StringInterner, UnitId};
use slir_types::{ScopedType, TypeScope};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SiteKind {
    Struct(usize),
    Enum(usize),
}

/// Where a struct or enum is declared.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct TypeSite {
    qualified: Name,
    unit: UnitId,
    /// Index of the declaring contract within its unit.
    contract_index: Option<usize>,
    owner: Option<ContractId>,
    kind: SiteKind,
}

#[derive(Clone, Debug)]
struct ContractTypes {
    name: Name,
    kind: ContractKind,
    types: FxHashMap<Name, TypeSite>,
}

#[derive(Clone, Debug, Default)]
pub struct TypeIndex {
    contracts: Vec<ContractTypes>,
    by_name: FxHashMap<Name, ContractId>,
    file: FxHashMap<Name, TypeSite>,
}

impl TypeIndex {
    /// Index every declaration of `unit`. Contracts must be registered in
    /// id order, starting at `first_contract`.
    pub fn add_unit(
        &mut self,
        unit_id: UnitId,
        unit: &SourceUnit,
        first_contract: ContractId,
        interner: &StringInterner,
    ) {
        for (ci, contract) in unit.contracts.iter().enumerate() {
            let id = ContractId::from_len(first_contract.index() + ci);
            debug_assert_eq!(id.index(), self.contracts.len());
            self.by_name.entry(contract.name).or_insert(id);

            let prefix = interner.lookup(contract.name);
            let mut types = FxHashMap::default();
            let qualify = |name: Name| interner.intern(&format!("{prefix}.{}", interner.lookup(name)));
            for (si, decl) in contract.structs.iter().enumerate() {
                types.entry(decl.name).or_insert(TypeSite {
                    qualified: qualify(decl.name),
                    unit: unit_id,
                    contract_index: Some(ci),
                    owner: Some(id),
                    kind: SiteKind::Struct(si),
                });
            }
            for (ei, decl) in contract.enums.iter().enumerate() {
                types.entry(decl.name).or_insert(TypeSite {
                    qualified: qualify(decl.name),
                    unit: unit_id,
                    contract_index: Some(ci),
                    owner: Some(id),
                    kind: SiteKind::Enum(ei),
                });
            }
            self.contracts.push(ContractTypes {
                name: contract.name,
                kind: contract.kind,
                types,
            });
        }

        for (si, decl) in unit.structs.iter().enumerate() {
            self.file.entry(decl.name).or_insert(TypeSite {
                qualified: decl.name,
                unit: unit_id,
                contract_index: None,
                owner: None,
                kind: SiteKind::Struct(si),
            });
        }
        for (ei, decl) in unit.enums.iter().enumerate() {
            self.file.entry(decl.name).or_insert(TypeSite {
                qualified: decl.name,
                unit: unit_id,
                contract_index: None,
                owner: None,
                kind: SiteKind::Enum(ei),
            });
        }
    }

    pub fn contract_named(&self, name: Name) -> Option<ContractId> {
        self.by_name.get(&name).copied()
    }

    /// Qualified name of a type declared directly in `contract`.
    pub fn qualified(&self, contract: Option<ContractId>, name: Name) -> Option<Name> {
        let site = match contract {
            Some(c) => self.contracts.get(c.index())?.types.get(&name)?,
            None => self.file.get(&name)?,
        };
        Some(site.qualified)
    }
}

/// [`TypeScope`] over a type index and the units it was built from.
pub struct ScopeView<'p> {
    index: &'p TypeIndex,
    units: &'p [SourceUnit],
    linearizations: &'p [Option<Vec<ContractId>>],
}

impl<'p> ScopeView<'p> {
    pub fn new(
        index: &'p TypeIndex,
        units: &'p [SourceUnit],
        linearizations: &'p [Option<Vec<ContractId>>],
    ) -> Self {
        Self {
            index,
            units,
            linearizations,
        }
    }

    fn expand(&self, site: TypeSite) -> Option<ScopedType<'p>> {
        let unit = self.units.get(site.unit.index())?;
        Some(match (site.kind, site.contract_index) {
            (SiteKind::Struct(i), Some(ci)) => ScopedType::Struct {
                qualified: site.qualified,
                fields: &unit.contracts.get(ci)?.structs.get(i)?.fields,
                owner: site.owner,
            },
            (SiteKind::Struct(i), None) => ScopedType::Struct {
                qualified: site.qualified,
                fields: &unit.structs.get(i)?.fields,
                owner: None,
            },
            (SiteKind::Enum(i), Some(ci)) => ScopedType::Enum {
                qualified: site.qualified,
                variants: &unit.contracts.get(ci)?.enums.get(i)?.variants,
            },
            (SiteKind::Enum(i), None) => ScopedType::Enum {
                qualified: site.qualified,
                variants: &unit.enums.get(i)?.variants,
            },
        })
    }

    /// `contract`'s own declaration of `name`, or an inherited one.
    fn inherited(&self, contract: ContractId, name: Name) -> Option<TypeSite> {
        let chain = match self.linearizations.get(contract.index()) {
            Some(Some(lin)) => lin.as_slice(),
            _ => std::slice::from_ref(&contract),
        };
        chain.iter().find_map(|c| {
            self.index
                .contracts
                .get(c.index())
                .and_then(|types| types.types.get(&name))
                .copied()
        })
    }

    fn contract_type(&self, id: ContractId) -> Option<ScopedType<'p>> {
        let types = self.index.contracts.get(id.index())?;
        Some(ScopedType::Contract {
            id,
            name: types.name,
            kind: types.kind,
        })
    }
}

impl TypeScope for ScopeView<'_> {
    fn lookup(&self, contract: Option<ContractId>, path: &[Name]) -> Option<ScopedType<'_>> {
        match path {
            [name] => {
                if let Some(site) = contract.and_then(|c| self.inherited(c, *name)) {
                    return self.expand(site);
                }
                if let Some(id) = self.index.contract_named(*name) {
                    return self.contract_type(id);
                }
                let site = self.index.file.get(name).copied()?;
                self.expand(site)
            }
            [outer, name] => {
                let owner = self.index.contract_named(*outer)?;
                let site = self.inherited(owner, *name)?;
                self.expand(site)
            }
            _ => None,
        }
    }
}
