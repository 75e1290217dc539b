//! Diagnostics keyed by the entity they belong to.

use slir_ir::{ContractId, FunctionId, VariableId};

use crate::AnalysisError;

/// The entity a diagnostic is attached to.
///
/// Ordering is contracts, then functions, then variables, then
/// program-wide entries, each by id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EntityKey {
    Contract(ContractId),
    Function(FunctionId),
    Variable(VariableId),
    Program,
}

/// Structured diagnostics collection returned to callers.
///
/// Entries keep insertion order until [`sort`](Diagnostics::sort) is called;
/// the driver sorts after merging parallel results so output is stable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostics {
    entries: Vec<(EntityKey, AnalysisError)>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entity: EntityKey, error: AnalysisError) {
        self.entries.push((entity, error));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    /// Every diagnostic attached to `entity`, in insertion order.
    pub fn for_entity(&self, entity: EntityKey) -> impl Iterator<Item = &AnalysisError> {
        self.entries
            .iter()
            .filter(move |(key, _)| *key == entity)
            .map(|(_, err)| err)
    }

    /// True if `entity` has a fatal diagnostic.
    pub fn has_errors_for(&self, entity: EntityKey) -> bool {
        self.for_entity(entity).any(AnalysisError::is_fatal)
    }

    /// True if any entry anywhere is fatal to its entity.
    pub fn is_fatal(&self) -> bool {
        self.entries.iter().any(|(_, err)| err.is_fatal())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(EntityKey, AnalysisError)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stable sort by entity; entries for one entity keep their order.
    pub fn sort(&mut self) {
        self.entries.sort_by_key(|(key, _)| *key);
    }
}

impl IntoIterator for Diagnostics {
    type Item = (EntityKey, AnalysisError);
    type IntoIter = std::vec::IntoIter<(EntityKey, AnalysisError)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use slir_ir::Span;

    use super::*;

    fn unsupported(what: &str) -> AnalysisError {
        AnalysisError::UnsupportedConstruct {
            construct: what.to_string(),
            span: Span::DUMMY,
        }
    }

    #[test]
    fn entries_are_scoped_to_their_entity() {
        let f = EntityKey::Function(FunctionId::new(0));
        let g = EntityKey::Function(FunctionId::new(1));
        let mut diags = Diagnostics::new();
        diags.push(f, unsupported("inline assembly"));

        assert_eq!(diags.for_entity(f).count(), 1);
        assert_eq!(diags.for_entity(g).count(), 0);
        assert!(!diags.has_errors_for(f));
        assert!(!diags.is_fatal());
    }

    #[test]
    fn sort_groups_by_entity_stably() {
        let c = EntityKey::Contract(ContractId::new(0));
        let f = EntityKey::Function(FunctionId::new(2));
        let mut diags = Diagnostics::new();
        diags.push(f, unsupported("a"));
        diags.push(c, unsupported("b"));
        diags.push(f, unsupported("c"));
        diags.sort();

        let order: Vec<String> = diags
            .iter()
            .map(|(_, e)| match e {
                AnalysisError::UnsupportedConstruct { construct, .. } => construct.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }
}
