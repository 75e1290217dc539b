use pretty_assertions::assert_eq;
use slir_ir::ast::{AstBuilder, FunctionDecl, FunctionKind, ModifierInvocation, UsingFor, Visibility};
use slir_ir::{Span, StringInterner};
use slir_model::Program;

use super::{CallGraph, CallKind};
use crate::ir::{InstrId, InstrKind};
use crate::ssa::SsaFunction;
use crate::test_helpers::{build, contract, contract_id, function, library, ssa_all};

/// The only call instruction in `f`.
fn call_site(functions: &[SsaFunction], f: slir_ir::FunctionId) -> InstrId {
    let ssa = functions.iter().find(|s| s.function == f).unwrap();
    let sites: Vec<InstrId> = ssa
        .instrs()
        .filter(|(_, i)| i.kind.is_call())
        .map(|(_, i)| i.id)
        .collect();
    assert_eq!(sites.len(), 1, "expected one call in {f:?}");
    sites[0]
}

/// `A { f(); g() { f(); } }` and `B is A { f(); }`.
fn dispatch() -> Program {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut a = contract(&b, "A", &[]);
    let body = b.block(vec![]);
    a.functions.push(b.function("f", vec![], vec![], body));
    let call = b.call_named("f", vec![]);
    let stmt = b.expr_stmt(call);
    let body = b.block(vec![stmt]);
    a.functions.push(b.function("g", vec![], vec![], body));

    let mut derived = contract(&b, "B", &["A"]);
    let body = b.block(vec![]);
    derived.functions.push(b.function("f", vec![], vec![], body));

    build(&interner, b, None, vec![a, derived])
}

#[test]
fn virtual_call_resolves_per_most_derived_contract() {
    let program = dispatch();
    let functions = ssa_all(&program);
    let graph = CallGraph::build(&program, &functions);

    let g = function(&program, "A", "g");
    let (a_f, b_f) = (function(&program, "A", "f"), function(&program, "B", "f"));
    let site = call_site(&functions, g);

    let mut resolved: Vec<_> = graph
        .edges_at(g, site)
        .map(|e| (e.context, e.callee, e.kind))
        .collect();
    resolved.sort_by_key(|(context, _, _)| *context);
    assert_eq!(
        resolved,
        vec![
            (Some(contract_id(&program, "A")), Some(a_f), CallKind::VirtualResolved),
            (Some(contract_id(&program, "B")), Some(b_f), CallKind::VirtualResolved),
        ]
    );

    let mut both = vec![a_f, b_f];
    both.sort_unstable();
    assert_eq!(graph.targets_at(g, site), both);
    assert_eq!(graph.callers_of(b_f), vec![g]);
}

#[test]
fn nodes_are_keyed_by_contract_and_signature() {
    let program = dispatch();
    let graph = CallGraph::build(&program, &ssa_all(&program));
    let a_f = function(&program, "A", "f");
    let b_f = function(&program, "B", "f");
    let signature = &program.function(a_f).signature;

    assert_eq!(graph.node(Some(contract_id(&program, "A")), signature), Some(a_f));
    assert_eq!(graph.node(Some(contract_id(&program, "B")), signature), Some(b_f));
    assert_eq!(graph.node(None, signature), None);
}

#[test]
fn private_and_library_calls_are_internal() {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut lib = library(&b, "Math");
    let self_param = b.var("self", b.elementary("uint256"));
    let body = b.block(vec![]);
    let mut double = b.function("double", vec![self_param], vec![], body);
    double.visibility = Visibility::Internal;
    lib.functions.push(double);

    let mut c = contract(&b, "C", &[]);
    c.using_for.push(UsingFor {
        library: b.name("Math"),
        target: Some(b.elementary("uint256")),
        span: Span::DUMMY,
    });
    let body = b.block(vec![]);
    let mut hidden = b.function("hidden", vec![], vec![], body);
    hidden.visibility = Visibility::Private;
    c.functions.push(hidden);
    let x = b.ident("x");
    let lib_call = b.method_call(x, "double", vec![]);
    let s1 = b.expr_stmt(lib_call);
    let private_call = b.call_named("hidden", vec![]);
    let s2 = b.expr_stmt(private_call);
    let body = b.block(vec![s1, s2]);
    let param = b.var("x", b.elementary("uint256"));
    c.functions.push(b.function("f", vec![param], vec![], body));

    let program = build(&interner, b, None, vec![lib, c]);
    let graph = CallGraph::build(&program, &ssa_all(&program));
    let f = function(&program, "C", "f");

    let calls: Vec<_> = graph
        .calls_from(f)
        .map(|e| (e.context, e.callee, e.kind))
        .collect();
    assert_eq!(
        calls,
        vec![
            (None, Some(function(&program, "Math", "double")), CallKind::Internal),
            (None, Some(function(&program, "C", "hidden")), CallKind::Internal),
        ]
    );
    assert_eq!(graph.callers_of(function(&program, "Math", "double")), vec![f]);
}

#[test]
fn external_creation_and_low_level_calls() {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut token = contract(&b, "Token", &[]);
    let body = b.block(vec![]);
    token.functions.push(b.function("deposit", vec![], vec![], body));
    let mut ctor = FunctionDecl::new(b.name("constructor"), FunctionKind::Constructor);
    ctor.body = Some(b.block(vec![]));
    token.functions.push(ctor);

    let mut c = contract(&b, "C", &[]);
    let t = b.ident("t");
    let deposit = b.member(t, "deposit");
    let external = b.call(deposit, vec![]);
    let s1 = b.expr_stmt(external);
    let (to, data) = (b.ident("to"), b.string(""));
    let raw = b.method_call(to, "call", vec![data]);
    let s2 = b.expr_stmt(raw);
    let new_token = b.new_expr(b.user_type("Token"));
    let create = b.call(new_token, vec![]);
    let s3 = b.expr_stmt(create);
    let body = b.block(vec![s1, s2, s3]);
    let params = vec![
        b.var("t", b.user_type("Token")),
        b.var("to", b.elementary("address")),
    ];
    c.functions.push(b.function("f", params, vec![], body));

    let program = build(&interner, b, None, vec![token, c]);
    let functions = ssa_all(&program);
    let graph = CallGraph::build(&program, &functions);
    let f = function(&program, "C", "f");
    let token_id = contract_id(&program, "Token");

    let calls: Vec<_> = graph.calls_from(f).map(|e| (e.callee, e.kind)).collect();
    assert_eq!(
        calls,
        vec![
            (Some(function(&program, "Token", "deposit")), CallKind::External),
            (None, CallKind::Unresolved),
            (program.constructor(token_id), CallKind::External),
        ]
    );
    assert!(program.constructor(token_id).is_some());

    let ssa = functions.iter().find(|s| s.function == f).unwrap();
    let raw_site = ssa
        .instrs()
        .find(|(_, i)| matches!(i.kind, InstrKind::LowLevelCall { .. }))
        .map(|(_, i)| i.id)
        .unwrap();
    assert!(graph.targets_at(f, raw_site).is_empty());
}

#[test]
fn modifier_invocation_dispatches_like_a_function() {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut c = contract(&b, "C", &[]);
    let mut only = FunctionDecl::new(b.name("only"), FunctionKind::Modifier);
    let placeholder = b.placeholder();
    only.body = Some(b.block(vec![placeholder]));
    c.modifiers.push(only);
    let body = b.block(vec![]);
    let mut guarded = b.function("guarded", vec![], vec![], body);
    guarded.modifiers = vec![ModifierInvocation {
        name: b.name("only"),
        args: vec![],
        span: Span::DUMMY,
    }];
    c.functions.push(guarded);

    let program = build(&interner, b, None, vec![c]);
    let functions = ssa_all(&program);
    let graph = CallGraph::build(&program, &functions);
    let guarded = function(&program, "C", "guarded");
    let c_id = contract_id(&program, "C");
    let only = program.lookup_modifier(c_id, program.interner().intern("only"));

    let site = call_site(&functions, guarded);
    let edges: Vec<_> = graph
        .edges_at(guarded, site)
        .map(|e| (e.context, e.callee, e.kind))
        .collect();
    assert_eq!(edges, vec![(Some(c_id), only, CallKind::VirtualResolved)]);
    assert!(only.is_some());
}

#[test]
fn private_caller_dispatches_in_its_own_contract() {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut a = contract(&b, "A", &[]);
    let body = b.block(vec![]);
    a.functions.push(b.function("f", vec![], vec![], body));
    let call = b.call_named("f", vec![]);
    let stmt = b.expr_stmt(call);
    let body = b.block(vec![stmt]);
    let mut helper = b.function("h", vec![], vec![], body);
    helper.visibility = Visibility::Private;
    a.functions.push(helper);

    let mut derived = contract(&b, "B", &["A"]);
    let body = b.block(vec![]);
    derived.functions.push(b.function("f", vec![], vec![], body));

    let program = build(&interner, b, None, vec![a, derived]);
    let functions = ssa_all(&program);
    let graph = CallGraph::build(&program, &functions);
    let h = function(&program, "A", "h");
    let site = call_site(&functions, h);

    let resolved: Vec<_> = graph
        .edges_at(h, site)
        .map(|e| (e.context, e.callee, e.kind))
        .collect();
    assert_eq!(
        resolved,
        vec![(
            Some(contract_id(&program, "A")),
            Some(function(&program, "A", "f")),
            CallKind::VirtualResolved
        )]
    );
}
