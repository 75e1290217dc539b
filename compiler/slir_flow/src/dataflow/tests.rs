use pretty_assertions::assert_eq;
use rustc_hash::FxHashMap;
use slir_ir::ast::{AstBuilder, BinaryOp};
use slir_ir::{StringInterner, VariableId};
use slir_model::Program;

use super::{DefUseIndex, Site};
use crate::ir::{BlockId, Instr, InstrId, VarId};
use crate::ssa::{SsaFunction, SsaVar};
use crate::test_helpers::{bb, build, contract, function, ssa_of};

fn state(program: &Program, contract: &str, index: usize) -> VariableId {
    let id = program
        .contract_named(program.interner().intern(contract))
        .unwrap();
    program.contract(id).state_variables[index]
}

/// `total = total + x; if (x > 1) { total = 0; } return;` plus a counter
/// `count` that is only ever written.
fn bookkeeping() -> (Program, SsaFunction) {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut c = contract(&b, "Ledger", &[]);
    let total = b.var("total", b.elementary("uint256"));
    let count = b.var("count", b.elementary("uint256"));
    c.state_vars.extend([total, count]);

    let (lhs, read, x) = (b.ident("total"), b.ident("total"), b.ident("x"));
    let sum = b.binary(BinaryOp::Add, read, x);
    let add = b.assign(lhs, sum);
    let add = b.expr_stmt(add);
    let (x, one) = (b.ident("x"), b.number("1"));
    let big = b.binary(BinaryOp::Gt, x, one);
    let (lhs, zero) = (b.ident("total"), b.number("0"));
    let reset = b.assign(lhs, zero);
    let reset = b.expr_stmt(reset);
    let reset = b.block(vec![reset]);
    let branch = b.if_(big, reset, None);
    let (lhs, seven) = (b.ident("count"), b.number("7"));
    let mark = b.assign(lhs, seven);
    let mark = b.expr_stmt(mark);
    let body = b.block(vec![add, branch, mark]);
    let param = b.var("x", b.elementary("uint256"));
    c.functions.push(b.function("book", vec![param], vec![], body));

    let program = build(&interner, b, None, vec![c]);
    let (ssa, _) = ssa_of(&program, function(&program, "Ledger", "book"));
    (program, ssa)
}

fn by_id(ssa: &SsaFunction) -> FxHashMap<InstrId, (BlockId, &Instr<SsaVar>)> {
    ssa.instrs().map(|(block, i)| (i.id, (block, i))).collect()
}

#[test]
fn every_operand_use_is_recorded_and_every_record_is_a_real_use() {
    let (_, ssa) = bookkeeping();
    let index = DefUseIndex::build(&ssa);
    let instrs = by_id(&ssa);

    for (block, instr) in ssa.instrs() {
        let site = Site {
            block,
            instr: instr.id,
        };
        for used in instr.kind.uses() {
            assert!(
                index.uses(used).contains(&site),
                "use of {used} at {site:?} not recorded"
            );
        }
        if let Some(dst) = instr.kind.result() {
            assert_eq!(index.definition(dst), Some(site));
        }
    }

    for var in index.defined() {
        for site in index.uses(var) {
            let (block, instr) = instrs[&site.instr];
            assert_eq!(block, site.block);
            assert!(instr.kind.uses().contains(&var), "{var} not used at {site:?}");
        }
    }
}

#[test]
fn state_read_and_written_sets() {
    let (program, ssa) = bookkeeping();
    let index = DefUseIndex::build(&ssa);
    let total = state(&program, "Ledger", 0);
    let count = state(&program, "Ledger", 1);

    assert_eq!(index.state_read(), &[total]);
    let mut written = vec![total, count];
    written.sort_unstable();
    assert_eq!(index.state_written(), written.as_slice());
}

#[test]
fn inputs_and_phis_are_not_writes() {
    let (program, ssa) = bookkeeping();
    let index = DefUseIndex::build(&ssa);
    let total = ssa
        .vars
        .iter()
        .position(|v| v.name == program.interner().intern("total"))
        .map(VarId::from_len)
        .unwrap();

    // Two stores; the entry value and the join phi are bookkeeping.
    assert_eq!(index.writes_of(total).len(), 2);
    assert!(ssa.phis().any(|(_, phi)| phi.kind.result().map(|v| v.base) == Some(total)));
    let input = ssa.input_of(total).unwrap();
    assert_eq!(index.definition(input).map(|s| s.block), Some(bb(0)));
    // One load feeds the addition.
    assert_eq!(index.reads_of(total).len(), 1);
}

#[test]
fn parameter_has_reads_but_no_writes() {
    let (program, ssa) = bookkeeping();
    let index = DefUseIndex::build(&ssa);
    let x = ssa
        .vars
        .iter()
        .position(|v| v.name == program.interner().intern("x"))
        .map(VarId::from_len)
        .unwrap();
    assert!(index.writes_of(x).is_empty());
    assert_eq!(index.reads_of(x).len(), 2);
    let input = ssa.input_of(x).unwrap();
    assert_eq!(index.uses(input).len(), 2);
}
