//! SSA and def-use properties over whole-pipeline output.

use std::collections::HashSet;

use pretty_assertions::assert_eq;
use slir_driver::Analysis;
use slir_flow::{InstrKind, SsaFunction};
use slir_ir::ast::{AstBuilder, BinaryOp, ContractDecl};

use crate::common::{analyze_source, contract, function_id};

/// ```text
/// contract C {
///     uint total;
///     function pick(bool c) returns (uint) {
///         uint x; if (c) { x = 1; } else { x = 2; } return x;
///     }
///     function count(uint n) {
///         uint i = 0; while (i < n) { i = i + 1; total = total + i; }
///     }
///     function dead() returns (uint) { return 1; total = 2; }
/// }
/// ```
fn flows(b: &mut AstBuilder<'_>) -> Vec<ContractDecl> {
    let mut c = contract(b, "C", &[]);
    c.state_vars.push(b.var("total", b.elementary("uint256")));

    let decl = b.local("x", b.elementary("uint256"), None);
    let (x1, one) = (b.ident("x"), b.number("1"));
    let set1 = b.assign(x1, one);
    let then_stmt = b.expr_stmt(set1);
    let then_block = b.block(vec![then_stmt]);
    let (x2, two) = (b.ident("x"), b.number("2"));
    let set2 = b.assign(x2, two);
    let else_stmt = b.expr_stmt(set2);
    let else_block = b.block(vec![else_stmt]);
    let cond = b.ident("c");
    let branch = b.if_(cond, then_block, Some(else_block));
    let x = b.ident("x");
    let ret = b.ret(Some(x));
    let body = b.block(vec![decl, branch, ret]);
    let param = b.var("c", b.elementary("bool"));
    let returns = vec![b.var("", b.elementary("uint256"))];
    c.functions.push(b.function("pick", vec![param], returns, body));

    let zero = b.number("0");
    let init = b.local("i", b.elementary("uint256"), Some(zero));
    let (i, n) = (b.ident("i"), b.ident("n"));
    let cond = b.binary(BinaryOp::Lt, i, n);
    let (i_lhs, i_rhs, one) = (b.ident("i"), b.ident("i"), b.number("1"));
    let next = b.binary(BinaryOp::Add, i_rhs, one);
    let step = b.assign(i_lhs, next);
    let step = b.expr_stmt(step);
    let (t_lhs, t_rhs, i) = (b.ident("total"), b.ident("total"), b.ident("i"));
    let sum = b.binary(BinaryOp::Add, t_rhs, i);
    let acc = b.assign(t_lhs, sum);
    let acc = b.expr_stmt(acc);
    let loop_body = b.block(vec![step, acc]);
    let looped = b.while_(cond, loop_body);
    let body = b.block(vec![init, looped]);
    let param = b.var("n", b.elementary("uint256"));
    c.functions.push(b.function("count", vec![param], vec![], body));

    let one = b.number("1");
    let ret = b.ret(Some(one));
    let (t, two) = (b.ident("total"), b.number("2"));
    let store = b.assign(t, two);
    let store = b.expr_stmt(store);
    let body = b.block(vec![ret, store]);
    let returns = vec![b.var("", b.elementary("uint256"))];
    c.functions.push(b.function("dead", vec![], returns, body));

    vec![c]
}

fn ssa_of<'a>(analysis: &'a Analysis, name: &str) -> &'a SsaFunction {
    let id = function_id(&analysis.program, "C", name);
    analysis.function(id).unwrap().ssa.as_ref().unwrap()
}

#[test]
fn every_ssa_variable_has_one_definition() {
    let analysis = analyze_source(flows);
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);

    for ssa in analysis.ssa_functions() {
        let mut defined = HashSet::new();
        for (_, instr) in ssa.instrs() {
            if let Some(dst) = instr.kind.result() {
                assert!(defined.insert(dst), "{dst} defined twice in {:?}", ssa.function);
            }
        }
    }
}

#[test]
fn diamond_join_has_one_phi_for_the_branch_variable() {
    let analysis = analyze_source(flows);
    let ssa = ssa_of(&analysis, "pick");

    let joins: Vec<_> = ssa
        .blocks
        .iter()
        .filter(|b| b.preds.len() == 2)
        .collect();
    assert_eq!(joins.len(), 1);
    let join = joins[0];
    assert_eq!(join.phis.len(), 1);
    match &join.phis[0].kind {
        InstrKind::Phi { incoming, .. } => {
            let preds: Vec<_> = incoming.iter().map(|(pred, _)| *pred).collect();
            assert_eq!(preds, join.preds.to_vec());
        }
        other => panic!("expected a phi, got {other:?}"),
    }
}

#[test]
fn def_use_index_round_trips() {
    let analysis = analyze_source(flows);

    for function in &analysis.functions {
        let ssa = function.ssa.as_ref().unwrap();
        let index = function.def_use.as_ref().unwrap();

        for (block, instr) in ssa.instrs() {
            if let Some(dst) = instr.kind.result() {
                let site = index.definition(dst).unwrap();
                assert_eq!((site.block, site.instr), (block, instr.id));
            }
            for used in instr.kind.uses() {
                assert!(
                    index.uses(used).iter().any(|s| s.instr == instr.id),
                    "use of {used} at {:?} not indexed",
                    instr.id
                );
            }
        }

        for var in index.defined() {
            for site in index.uses(var) {
                let user = ssa
                    .block(site.block)
                    .all_instrs()
                    .find(|i| i.id == site.instr)
                    .unwrap();
                assert!(user.kind.uses().contains(&var));
            }
        }
    }
}

#[test]
fn loop_keeps_state_writes_visible() {
    let analysis = analyze_source(flows);
    let count = function_id(&analysis.program, "C", "count");
    let result = analysis.function(count).unwrap();

    assert_eq!(result.cfg.loop_headers().len(), 1);
    let index = result.def_use.as_ref().unwrap();
    assert_eq!(index.state_read(), index.state_written());
    assert_eq!(index.state_written().len(), 1);
}

#[test]
fn code_after_return_is_kept_and_unreachable() {
    let analysis = analyze_source(flows);
    let dead = function_id(&analysis.program, "C", "dead");
    let result = analysis.function(dead).unwrap();

    let dead_store = result
        .cfg
        .unreachable_blocks()
        .find(|id| {
            result
                .cfg
                .block(*id)
                .instrs
                .iter()
                .any(|i| matches!(i.kind, InstrKind::Store { .. }))
        })
        .expect("the store after `return` stays in the CFG");

    let ssa = result.ssa.as_ref().unwrap();
    assert!(!ssa.block(dead_store).reachable);
    assert!(!ssa.block(dead_store).instrs.is_empty());
    assert!(result.diagnostics.is_empty());
}
