//! Resolved member tables.
//!
//! For every contract, each member key declared anywhere along its
//! linearization maps to exactly one winning declaration. Virtual dispatch
//! is then a single hash lookup.
//!
//! A candidate is shadowed when it is an ancestor of another candidate.
//! More than one unshadowed candidate is a conflict, unless exactly one of
//! them has an implementation and the others are bare declarations.

use rustc_hash::FxHashMap;
use slir_ir::{ContractId, FunctionId, Name, VariableId};
use smallvec::SmallVec;

use crate::Signature;

/// What a contract declares itself, before inheritance.
#[derive(Clone, Debug, Default)]
pub struct Declared {
    pub functions: Vec<(Signature, FunctionId, bool)>,
    pub events: Vec<Signature>,
    pub modifiers: Vec<(Name, FunctionId, bool)>,
    pub state_variables: Vec<(Name, VariableId)>,
    pub types: Vec<Name>,
}

impl Declared {
    pub fn function(&self, signature: &Signature) -> Option<(FunctionId, bool)> {
        self.functions
            .iter()
            .find(|(sig, _, _)| sig == signature)
            .map(|(_, id, implemented)| (*id, *implemented))
    }
}

/// Key of a member that failed to resolve.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemberKey {
    Function(Signature),
    Event(Signature),
    Modifier(Name),
    StateVariable(Name),
    Type(Name),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberConflict {
    pub key: MemberKey,
    /// Unshadowed declaring contracts, in linearization order.
    pub candidates: Vec<ContractId>,
}

/// Winning declaration for every member visible in one contract.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MemberTable {
    functions: FxHashMap<Signature, FunctionId>,
    by_name: FxHashMap<Name, SmallVec<[FunctionId; 2]>>,
    /// Declaring contract of each event.
    events: FxHashMap<Signature, ContractId>,
    modifiers: FxHashMap<Name, FunctionId>,
    state_variables: FxHashMap<Name, VariableId>,
    /// Declaring contract of each struct or enum.
    types: FxHashMap<Name, ContractId>,
}

impl MemberTable {
    pub fn function(&self, signature: &Signature) -> Option<FunctionId> {
        self.functions.get(signature).copied()
    }

    /// Every resolved overload called `name`, by id.
    pub fn functions_named(&self, name: Name) -> &[FunctionId] {
        self.by_name.get(&name).map_or(&[], |ids| ids.as_slice())
    }

    /// Every resolved function, by id.
    pub fn functions(&self) -> Vec<FunctionId> {
        let mut ids: Vec<FunctionId> = self.functions.values().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn event(&self, signature: &Signature) -> Option<ContractId> {
        self.events.get(signature).copied()
    }

    pub fn events_named(&self, name: Name) -> Vec<&Signature> {
        let mut sigs: Vec<&Signature> = self.events.keys().filter(|s| s.name == name).collect();
        sigs.sort();
        sigs
    }

    pub fn modifier(&self, name: Name) -> Option<FunctionId> {
        self.modifiers.get(&name).copied()
    }

    pub fn state_variable(&self, name: Name) -> Option<VariableId> {
        self.state_variables.get(&name).copied()
    }

    pub fn type_owner(&self, name: Name) -> Option<ContractId> {
        self.types.get(&name).copied()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
            + self.events.len()
            + self.modifiers.len()
            + self.state_variables.len()
            + self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Candidates for one key, in linearization order: declaring contract,
/// target, implemented.
type Candidates<T> = Vec<(ContractId, T, bool)>;

/// Group declarations by key, keeping first-seen key order.
fn group<K, T, I>(lin: &[ContractId], mut declared_in: impl FnMut(ContractId) -> I) -> Vec<(K, Candidates<T>)>
where
    K: Eq + std::hash::Hash + Clone,
    I: IntoIterator<Item = (K, T, bool)>,
{
    let mut order: Vec<(K, Candidates<T>)> = Vec::new();
    let mut index: FxHashMap<K, usize> = FxHashMap::default();
    for &contract in lin {
        for (key, target, implemented) in declared_in(contract) {
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                order.push((key, Vec::new()));
                order.len() - 1
            });
            let candidates = &mut order[slot].1;
            if !candidates.iter().any(|(c, _, _)| *c == contract) {
                candidates.push((contract, target, implemented));
            }
        }
    }
    order
}

fn choose<T: Copy>(
    candidates: &[(ContractId, T, bool)],
    linearizations: &[Option<Vec<ContractId>>],
) -> Result<T, Vec<ContractId>> {
    let is_ancestor = |ancestor: ContractId, of: ContractId| {
        ancestor != of
            && linearizations
                .get(of.index())
                .and_then(Option::as_ref)
                .is_some_and(|lin| lin.contains(&ancestor))
    };
    let unshadowed: Vec<&(ContractId, T, bool)> = candidates
        .iter()
        .filter(|(c, _, _)| !candidates.iter().any(|(d, _, _)| is_ancestor(*c, *d)))
        .collect();

    if let [(_, target, _)] = unshadowed.as_slice() {
        return Ok(*target);
    }
    let implemented: Vec<&&(ContractId, T, bool)> =
        unshadowed.iter().filter(|(_, _, imp)| *imp).collect();
    if let [(_, target, _)] = implemented.as_slice() {
        return Ok(*target);
    }
    Err(unshadowed.iter().map(|(c, _, _)| *c).collect())
}

/// Build the member table of a contract whose linearization is `lin`.
pub fn build_member_table(
    lin: &[ContractId],
    linearizations: &[Option<Vec<ContractId>>],
    declared: &[Declared],
) -> (MemberTable, Vec<MemberConflict>) {
    let mut table = MemberTable::default();
    let mut conflicts = Vec::new();
    let decl = |c: ContractId| &declared[c.index()];

    for (sig, candidates) in group(lin, |c| decl(c).functions.iter().cloned()) {
        match choose(&candidates, linearizations) {
            Ok(id) => {
                table.by_name.entry(sig.name).or_default().push(id);
                table.functions.insert(sig, id);
            }
            Err(candidates) => conflicts.push(MemberConflict {
                key: MemberKey::Function(sig),
                candidates,
            }),
        }
    }
    for ids in table.by_name.values_mut() {
        ids.sort_unstable();
    }

    let events = group(lin, |c| {
        decl(c).events.iter().map(move |sig| (sig.clone(), c, true))
    });
    for (sig, candidates) in events {
        match choose(&candidates, linearizations) {
            Ok(owner) => {
                table.events.insert(sig, owner);
            }
            Err(candidates) => conflicts.push(MemberConflict {
                key: MemberKey::Event(sig),
                candidates,
            }),
        }
    }

    for (name, candidates) in group(lin, |c| decl(c).modifiers.iter().copied()) {
        match choose(&candidates, linearizations) {
            Ok(id) => {
                table.modifiers.insert(name, id);
            }
            Err(candidates) => conflicts.push(MemberConflict {
                key: MemberKey::Modifier(name),
                candidates,
            }),
        }
    }

    let state = group(lin, |c| {
        decl(c).state_variables.iter().map(|(n, v)| (*n, *v, true))
    });
    for (name, candidates) in state {
        match choose(&candidates, linearizations) {
            Ok(id) => {
                table.state_variables.insert(name, id);
            }
            Err(candidates) => conflicts.push(MemberConflict {
                key: MemberKey::StateVariable(name),
                candidates,
            }),
        }
    }

    let types = group(lin, |c| decl(c).types.iter().map(move |n| (*n, c, true)));
    for (name, candidates) in types {
        match choose(&candidates, linearizations) {
            Ok(owner) => {
                table.types.insert(name, owner);
            }
            Err(candidates) => conflicts.push(MemberConflict {
                key: MemberKey::Type(name),
                candidates,
            }),
        }
    }

    (table, conflicts)
}
