//! C3 linearization of the inheritance graph.
//!
//! `lin(C) = C + merge(lin(B1), ..., lin(Bn), [B1..Bn])`, where `merge`
//! repeatedly takes the first list head that appears in no other list's
//! tail. Results are memoized per contract, so every contract is merged
//! exactly once however many descendants it has.
//!
//! Cycles are found during the depth-first walk: re-entering a contract
//! that is still being linearized marks every contract on the walk stack
//! from that point up as a cycle member.

use slir_ir::{ensure_sufficient_stack, ContractId, Name};
use tracing::debug;

/// How the written base list maps onto merge order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum InheritanceOrder {
    /// Bases are merged in the order they are written.
    #[default]
    AsWritten,
    /// Bases are written most-base-like first and merged right to left.
    Solidity,
}

/// A direct base as written, after name lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BaseRef {
    Known(ContractId),
    Unknown(Name),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinearizeError {
    /// No head could be taken; the remaining list heads, deduplicated.
    Inconsistent { remaining: Vec<ContractId> },
    /// The contract is part of an inheritance cycle through `through`.
    Cycle { through: ContractId },
    UnknownBase(Name),
    /// A direct base failed to linearize.
    BaseFailed(ContractId),
}

pub type Linearization = Result<Vec<ContractId>, LinearizeError>;

enum State {
    Pending,
    InProgress,
    Done(Linearization),
}

pub struct Linearizer<'a> {
    bases: &'a [Vec<BaseRef>],
    order: InheritanceOrder,
    states: Vec<State>,
    stack: Vec<ContractId>,
    cycle_through: Vec<Option<ContractId>>,
}

impl<'a> Linearizer<'a> {
    /// `bases[c]` lists the direct bases of contract `c`, as written.
    pub fn new(bases: &'a [Vec<BaseRef>], order: InheritanceOrder) -> Self {
        Self {
            bases,
            order,
            states: bases.iter().map(|_| State::Pending).collect(),
            stack: Vec::new(),
            cycle_through: vec![None; bases.len()],
        }
    }

    /// Linearize every contract, in id order.
    #[tracing::instrument(level = "debug", skip_all, fields(contracts = self.bases.len()))]
    pub fn run(mut self) -> Vec<Linearization> {
        for raw in 0..self.bases.len() {
            self.linearize(ContractId::from_len(raw));
        }
        let results: Vec<Linearization> = self
            .states
            .into_iter()
            .map(|state| match state {
                State::Done(result) => result,
                // unreachable once every contract has been visited
                State::Pending | State::InProgress => Ok(Vec::new()),
            })
            .collect();
        debug!(
            failed = results.iter().filter(|r| r.is_err()).count(),
            "linearization complete"
        );
        results
    }

    fn linearize(&mut self, contract: ContractId) {
        if !matches!(self.states[contract.index()], State::Pending) {
            return;
        }
        ensure_sufficient_stack(|| self.linearize_inner(contract));
    }

    fn linearize_inner(&mut self, contract: ContractId) {
        self.states[contract.index()] = State::InProgress;
        self.stack.push(contract);

        let mut direct: Vec<ContractId> = Vec::new();
        let mut failure: Option<LinearizeError> = None;
        for base in self.ordered_bases(contract) {
            let id = match base {
                BaseRef::Known(id) => id,
                BaseRef::Unknown(name) => {
                    failure.get_or_insert(LinearizeError::UnknownBase(name));
                    continue;
                }
            };
            match &self.states[id.index()] {
                State::InProgress => {
                    self.mark_cycle(id);
                    continue;
                }
                State::Pending => self.linearize(id),
                State::Done(_) => {}
            }
            if let State::Done(Err(_)) = &self.states[id.index()] {
                failure.get_or_insert(LinearizeError::BaseFailed(id));
            }
            if !direct.contains(&id) {
                direct.push(id);
            }
        }

        self.stack.pop();
        let result = if let Some(through) = self.cycle_through[contract.index()] {
            Err(LinearizeError::Cycle { through })
        } else if let Some(failure) = failure {
            Err(failure)
        } else {
            self.merge(contract, &direct)
        };
        self.states[contract.index()] = State::Done(result);
    }

    fn ordered_bases(&self, contract: ContractId) -> Vec<BaseRef> {
        let written = &self.bases[contract.index()];
        match self.order {
            InheritanceOrder::AsWritten => written.clone(),
            InheritanceOrder::Solidity => written.iter().rev().copied().collect(),
        }
    }

    /// `target` was re-entered; everything on the stack from it up is a cycle.
    fn mark_cycle(&mut self, target: ContractId) {
        let Some(start) = self.stack.iter().position(|c| *c == target) else {
            return;
        };
        for member in &self.stack[start..] {
            self.cycle_through[member.index()].get_or_insert(target);
        }
    }

    fn merge(&self, contract: ContractId, direct: &[ContractId]) -> Linearization {
        let mut lists: Vec<Vec<ContractId>> = Vec::with_capacity(direct.len() + 1);
        for base in direct {
            if let State::Done(Ok(lin)) = &self.states[base.index()] {
                lists.push(lin.clone());
            }
        }
        lists.push(direct.to_vec());
        c3_merge(contract, lists)
    }
}

/// `contract + merge(lists)`.
pub fn c3_merge(contract: ContractId, mut lists: Vec<Vec<ContractId>>) -> Linearization {
    let mut result = vec![contract];
    // Lists are consumed from the front; reverse so `pop` takes the head.
    for list in &mut lists {
        list.reverse();
    }
    loop {
        lists.retain(|list| !list.is_empty());
        if lists.is_empty() {
            return Ok(result);
        }
        let head = lists.iter().find_map(|list| {
            let candidate = *list.last()?;
            let in_tail = lists.iter().any(|other| {
                other.len() > 1 && other[..other.len() - 1].contains(&candidate)
            });
            (!in_tail).then_some(candidate)
        });
        let Some(head) = head else {
            let mut remaining: Vec<ContractId> = Vec::new();
            for list in &lists {
                if let Some(h) = list.last() {
                    if !remaining.contains(h) {
                        remaining.push(*h);
                    }
                }
            }
            return Err(LinearizeError::Inconsistent { remaining });
        };
        result.push(head);
        for list in &mut lists {
            if list.last() == Some(&head) {
                list.pop();
            }
        }
    }
}
