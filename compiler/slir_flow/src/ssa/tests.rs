use pretty_assertions::assert_eq;
use rustc_hash::FxHashSet;
use slir_diagnostic::AnalysisError;
use slir_ir::ast::{AstBuilder, BinaryOp, CompilerVersion, Location, StructDecl, TypeName};
use slir_ir::{Span, StringInterner};
use slir_model::Program;

use super::{SsaFunction, SsaVar};
use crate::ir::{InstrKind, Operand, VarId};
use crate::test_helpers::{bb, build, contract, function, ssa_of};

fn base(ssa: &SsaFunction, program: &Program, name: &str) -> VarId {
    let name = program.interner().intern(name);
    let index = ssa
        .vars
        .iter()
        .position(|v| v.name == name)
        .unwrap_or_else(|| panic!("no variable named {name:?}"));
    VarId::from_len(index)
}

fn phis_of(ssa: &SsaFunction, block: u32) -> Vec<(SsaVar, Vec<(crate::ir::BlockId, SsaVar)>)> {
    ssa.block(bb(block))
        .phis
        .iter()
        .map(|phi| match &phi.kind {
            InstrKind::Phi { dst, incoming } => (*dst, incoming.clone()),
            other => panic!("expected a phi, got {other:?}"),
        })
        .collect()
}

fn assert_single_assignment(ssa: &SsaFunction) {
    let mut defined = FxHashSet::default();
    let mut ids = FxHashSet::default();
    for (_, instr) in ssa.instrs() {
        assert!(ids.insert(instr.id), "instruction id {:?} reused", instr.id);
        if let Some(dst) = instr.kind.result() {
            assert!(!dst.is_undefined());
            assert!(defined.insert(dst), "{dst} defined twice");
        }
    }
}

/// `uint x; if (c) { x = 1; } else { x = 2; } return x;`
fn diamond() -> (Program, SsaFunction, slir_diagnostic::Diagnostics) {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut c = contract(&b, "C", &[]);
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

    let program = build(&interner, b, None, vec![c]);
    let (ssa, diagnostics) = ssa_of(&program, function(&program, "C", "pick"));
    (program, ssa, diagnostics)
}

#[test]
fn diamond_join_has_one_phi_with_an_operand_per_predecessor() {
    let (program, ssa, diagnostics) = diamond();
    let x = base(&ssa, &program, "x");

    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    let join = phis_of(&ssa, 3);
    assert_eq!(join.len(), 1);
    let (dst, incoming) = &join[0];
    assert_eq!(dst.base, x);
    assert_eq!(
        incoming.iter().map(|(pred, _)| *pred).collect::<Vec<_>>(),
        vec![bb(1), bb(2)]
    );
    assert!(incoming.iter().all(|(_, v)| v.base == x && !v.is_undefined()));
    assert_ne!(incoming[0].1, incoming[1].1);
    // No other block merges anything.
    assert_eq!(ssa.phis().count(), 1);
}

#[test]
fn diamond_return_reads_the_phi() {
    let (program, ssa, _) = diamond();
    let x = base(&ssa, &program, "x");
    let (phi, _) = phis_of(&ssa, 3)[0].clone();
    let reads: Vec<SsaVar> = ssa
        .block(bb(3))
        .instrs
        .iter()
        .flat_map(|i| i.kind.uses())
        .filter(|v| v.base == x)
        .collect();
    assert_eq!(reads, vec![phi]);
}

#[test]
fn every_ssa_variable_is_defined_once() {
    let (_, ssa, _) = diamond();
    assert_single_assignment(&ssa);
    let (_, ssa, _) = counting_loop();
    assert_single_assignment(&ssa);
}

/// `uint i = 0; while (i < n) { i = i + 1; } return i;`
fn counting_loop() -> (Program, SsaFunction, slir_diagnostic::Diagnostics) {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut c = contract(&b, "C", &[]);
    let zero = b.number("0");
    let decl = b.local("i", b.elementary("uint256"), Some(zero));
    let (i, n) = (b.ident("i"), b.ident("n"));
    let cond = b.binary(BinaryOp::Lt, i, n);
    let (i_read, one) = (b.ident("i"), b.number("1"));
    let next = b.binary(BinaryOp::Add, i_read, one);
    let i_write = b.ident("i");
    let step = b.assign(i_write, next);
    let step = b.expr_stmt(step);
    let loop_body = b.block(vec![step]);
    let lp = b.while_(cond, loop_body);
    let i_ret = b.ident("i");
    let ret = b.ret(Some(i_ret));
    let body = b.block(vec![decl, lp, ret]);
    let param = b.var("n", b.elementary("uint256"));
    let returns = vec![b.var("", b.elementary("uint256"))];
    c.functions.push(b.function("count", vec![param], returns, body));

    let program = build(&interner, b, None, vec![c]);
    let (ssa, diagnostics) = ssa_of(&program, function(&program, "C", "count"));
    (program, ssa, diagnostics)
}

#[test]
fn loop_header_merges_entry_and_back_edge_versions() {
    let (program, ssa, diagnostics) = counting_loop();
    let i = base(&ssa, &program, "i");

    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    let header = phis_of(&ssa, 1);
    assert_eq!(header.len(), 1);
    assert_eq!(
        header[0],
        (
            SsaVar::new(i, 1),
            vec![(bb(0), SsaVar::new(i, 0)), (bb(2), SsaVar::new(i, 2))]
        )
    );
    assert!(ssa.dominates(bb(1), bb(2)));
    assert_eq!(ssa.idom(bb(3)), Some(bb(1)));
}

#[test]
fn inputs_come_first_in_parameter_return_state_order() {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut c = contract(&b, "C", &[]);
    let total = b.var("total", b.elementary("uint256"));
    c.state_vars.push(total);
    let (t, a) = (b.ident("total"), b.ident("a"));
    let sum = b.binary(BinaryOp::Add, t, a);
    let r = b.ident("r");
    let assign = b.assign(r, sum);
    let stmt = b.expr_stmt(assign);
    let body = b.block(vec![stmt]);
    let param = b.var("a", b.elementary("uint256"));
    let returns = vec![b.var("r", b.elementary("uint256"))];
    c.functions.push(b.function("peek", vec![param], returns, body));

    let program = build(&interner, b, None, vec![c]);
    let (ssa, _) = ssa_of(&program, function(&program, "C", "peek"));

    let inputs: Vec<VarId> = ssa.inputs().map(|v| v.base).collect();
    assert_eq!(
        inputs,
        vec![
            base(&ssa, &program, "a"),
            base(&ssa, &program, "r"),
            base(&ssa, &program, "total"),
        ]
    );
    let leading = ssa.block(bb(0)).instrs[..3]
        .iter()
        .all(|i| matches!(i.kind, InstrKind::Input { .. }));
    assert!(leading);
    let total = base(&ssa, &program, "total");
    assert_eq!(ssa.input_of(total), Some(SsaVar::new(total, 0)));
}

/// Function-scoped `x` assigned on one branch only, read after the join.
#[test]
fn read_on_path_that_skips_declaration_is_maybe_uninitialized() {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut c = contract(&b, "C", &[]);
    let one = b.number("1");
    let decl = b.local("x", b.elementary("uint256"), Some(one));
    let then_block = b.block(vec![decl]);
    let cond = b.ident("c");
    let branch = b.if_(cond, then_block, None);
    let x = b.ident("x");
    let ret = b.ret(Some(x));
    let body = b.block(vec![branch, ret]);
    let param = b.var("c", b.elementary("bool"));
    let returns = vec![b.var("", b.elementary("uint256"))];
    c.functions.push(b.function("f", vec![param], returns, body));

    let program = build(&interner, b, Some(CompilerVersion::new(0, 4, 24)), vec![c]);
    let (ssa, diagnostics) = ssa_of(&program, function(&program, "C", "f"));

    let reported: Vec<&AnalysisError> = diagnostics.iter().map(|(_, e)| e).collect();
    assert_eq!(reported.len(), 1);
    assert!(matches!(
        reported[0],
        AnalysisError::MaybeUninitialized { variable, .. } if variable == "x"
    ));
    // Conversion still completes, binding the read to the undefined version.
    let x = base(&ssa, &program, "x");
    assert!(ssa
        .instrs()
        .flat_map(|(_, i)| i.kind.uses())
        .any(|v| v == SsaVar::undefined(x)));
}

#[test]
fn unobserved_phi_over_undefined_is_silent() {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut c = contract(&b, "C", &[]);
    let one = b.number("1");
    let decl = b.local("x", b.elementary("uint256"), Some(one));
    let (x, two) = (b.ident("x"), b.number("2"));
    let reset = b.assign(x, two);
    let reset = b.expr_stmt(reset);
    let then_block = b.block(vec![decl, reset]);
    let cond = b.ident("c");
    let branch = b.if_(cond, then_block, None);
    let body = b.block(vec![branch]);
    let param = b.var("c", b.elementary("bool"));
    c.functions.push(b.function("f", vec![param], vec![], body));

    let program = build(&interner, b, Some(CompilerVersion::new(0, 4, 24)), vec![c]);
    let (ssa, diagnostics) = ssa_of(&program, function(&program, "C", "f"));

    let x = base(&ssa, &program, "x");
    let join = phis_of(&ssa, 2);
    assert_eq!(join.len(), 1);
    assert!(join[0].1.contains(&(bb(0), SsaVar::undefined(x))));
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
}

#[test]
fn unreachable_block_is_renamed_without_diagnostics() {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut c = contract(&b, "C", &[]);
    let early = b.ret(None);
    let (a, one) = (b.ident("a"), b.number("1"));
    let sum = b.binary(BinaryOp::Add, a, one);
    let lhs = b.ident("a");
    let assign = b.assign(lhs, sum);
    let dead = b.expr_stmt(assign);
    let body = b.block(vec![early, dead]);
    let param = b.var("a", b.elementary("uint256"));
    c.functions.push(b.function("f", vec![param], vec![], body));

    let program = build(&interner, b, None, vec![c]);
    let (ssa, diagnostics) = ssa_of(&program, function(&program, "C", "f"));

    let a = base(&ssa, &program, "a");
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    let dead = ssa.block(bb(1));
    assert!(!dead.reachable);
    let InstrKind::Binary { lhs, .. } = &dead.instrs[0].kind else {
        panic!("expected the dead addition");
    };
    assert_eq!(*lhs, Operand::Var(SsaVar::undefined(a)));
    let InstrKind::Assign { dst, .. } = &dead.instrs[1].kind else {
        panic!("expected the dead assignment");
    };
    assert_eq!(*dst, SsaVar::new(a, 1));
}

#[test]
fn store_through_storage_pointer_versions_the_state_variable() {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut c = contract(&b, "C", &[]);
    c.structs.push(StructDecl {
        name: b.name("Position"),
        fields: vec![b.var("amount", b.elementary("uint256"))],
        span: Span::DUMMY,
    });
    let positions = b.var(
        "positions",
        TypeName::mapping(b.elementary("uint256"), b.user_type("Position")),
    );
    c.state_vars.push(positions);
    let (map, k) = (b.ident("positions"), b.ident("k"));
    let entry = b.index(map, k);
    let pointer = b
        .var("p", b.user_type("Position"))
        .with_location(Location::Storage);
    let decl = b.local_tuple(vec![Some(pointer)], entry);
    let p = b.ident("p");
    let field = b.member(p, "amount");
    let five = b.number("5");
    let write = b.assign(field, five);
    let write = b.expr_stmt(write);
    let body = b.block(vec![decl, write]);
    let param = b.var("k", b.elementary("uint256"));
    c.functions.push(b.function("f", vec![param], vec![], body));

    let program = build(&interner, b, None, vec![c]);
    let (ssa, _) = ssa_of(&program, function(&program, "C", "f"));

    let positions = base(&ssa, &program, "positions");
    let store = ssa
        .instrs()
        .find_map(|(_, i)| match &i.kind {
            InstrKind::Store { root, prior, .. } => Some((*root, *prior)),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        store,
        (SsaVar::new(positions, 1), SsaVar::new(positions, 0))
    );
    assert_eq!(ssa.input_of(positions), Some(SsaVar::new(positions, 0)));
}
