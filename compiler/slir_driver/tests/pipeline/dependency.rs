//! Call-graph and dependency-graph properties.

use pretty_assertions::assert_eq;
use slir_flow::{CallKind, DepNode};
use slir_ir::ast::{AstBuilder, ContractDecl, Visibility};

use crate::common::{analyze_source, contract, contract_id, function_id};

/// ```text
/// contract Base { address owner; }
/// contract Wallet is Base {
///     uint balance;
///     function pay(address to) { to.call(""); }
///     function deposit(uint amount) { credit(amount); }
///     function credit(uint amount) private { balance = amount; }
/// }
/// ```
fn wallet(b: &mut AstBuilder<'_>) -> Vec<ContractDecl> {
    let mut base = contract(b, "Base", &[]);
    base.state_vars.push(b.var("owner", b.elementary("address")));

    let mut wallet = contract(b, "Wallet", &["Base"]);
    wallet.state_vars.push(b.var("balance", b.elementary("uint256")));

    let (to, data) = (b.ident("to"), b.string(""));
    let raw = b.method_call(to, "call", vec![data]);
    let stmt = b.expr_stmt(raw);
    let body = b.block(vec![stmt]);
    let param = b.var("to", b.elementary("address"));
    wallet.functions.push(b.function("pay", vec![param], vec![], body));

    let amount = b.ident("amount");
    let call = b.call_named("credit", vec![amount]);
    let stmt = b.expr_stmt(call);
    let body = b.block(vec![stmt]);
    let param = b.var("amount", b.elementary("uint256"));
    wallet.functions.push(b.function("deposit", vec![param], vec![], body));

    let (lhs, amount) = (b.ident("balance"), b.ident("amount"));
    let assign = b.assign(lhs, amount);
    let stmt = b.expr_stmt(assign);
    let body = b.block(vec![stmt]);
    let param = b.var("amount", b.elementary("uint256"));
    let mut credit = b.function("credit", vec![param], vec![], body);
    credit.visibility = Visibility::Private;
    wallet.functions.push(credit);

    vec![base, wallet]
}

#[test]
fn low_level_call_influences_state_it_never_writes() {
    let analysis = analyze_source(wallet);
    let program = &analysis.program;
    let pay = function_id(program, "Wallet", "pay");
    let owner = program.contract(contract_id(program, "Base")).state_variables[0];
    let balance = program.contract(contract_id(program, "Wallet")).state_variables[0];

    let def_use = analysis.function(pay).unwrap().def_use.as_ref().unwrap();
    assert!(def_use.state_written().is_empty());

    let deps = analysis.dependencies.as_ref().unwrap();
    let mut expected = vec![owner, balance];
    expected.sort();
    assert_eq!(deps.function_state_influence(pay), expected);
}

#[test]
fn internal_call_links_argument_to_callee_state() {
    let analysis = analyze_source(wallet);
    let program = &analysis.program;
    let deposit = function_id(program, "Wallet", "deposit");
    let credit = function_id(program, "Wallet", "credit");
    let balance = program.contract(contract_id(program, "Wallet")).state_variables[0];

    let calls = analysis.call_graph.as_ref().unwrap();
    let edges: Vec<_> = calls.calls_from(deposit).map(|e| (e.callee, e.kind)).collect();
    assert_eq!(edges, vec![(Some(credit), CallKind::Internal)]);
    assert_eq!(calls.callers_of(credit), vec![deposit]);

    let deps = analysis.dependencies.as_ref().unwrap();
    assert_eq!(deps.function_state_influence(deposit), vec![balance]);
    assert!(deps
        .backward(DepNode::State(balance))
        .iter()
        .any(|node| node.function() == Some(deposit)));
}
