use pretty_assertions::assert_eq;
use slir_ir::ast::{AstBuilder, BinaryOp, Visibility};
use slir_ir::{FunctionId, StringInterner, VariableId};
use slir_model::Program;

use super::{DepNode, DependencyGraph};
use crate::callgraph::CallGraph;
use crate::ir::VarId;
use crate::ssa::{SsaFunction, SsaVar};
use crate::test_helpers::{build, contract, contract_id, function, ssa_all};

fn ssa_for(functions: &[SsaFunction], f: FunctionId) -> &SsaFunction {
    functions.iter().find(|s| s.function == f).unwrap()
}

/// Entry value of the variable called `name` in `ssa`.
fn input(program: &Program, ssa: &SsaFunction, name: &str) -> SsaVar {
    let name = program.interner().intern(name);
    let base = ssa
        .vars
        .iter()
        .position(|v| v.name == name)
        .map(VarId::from_len)
        .unwrap();
    ssa.input_of(base).unwrap()
}

fn state(program: &Program, contract: &str, index: usize) -> VariableId {
    program.contract(contract_id(program, contract)).state_variables[index]
}

fn graph_of(program: &Program) -> (Vec<SsaFunction>, DependencyGraph) {
    let functions = ssa_all(program);
    let calls = CallGraph::build(program, &functions);
    let graph = DependencyGraph::build(program, &functions, &calls);
    (functions, graph)
}

/// ```text
/// contract Vault {
///     uint total; uint fee;
///     function id(uint x) private returns (uint) { return x; }
///     function set(uint y) { total = id(y); }
///     function get() returns (uint) { return total; }
///     function pure_add(uint a) returns (uint) { return a + 1; }
/// }
/// ```
fn vault() -> Program {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut c = contract(&b, "Vault", &[]);
    let total = b.var("total", b.elementary("uint256"));
    let fee = b.var("fee", b.elementary("uint256"));
    c.state_vars.extend([total, fee]);

    let x = b.ident("x");
    let ret = b.ret(Some(x));
    let body = b.block(vec![ret]);
    let param = b.var("x", b.elementary("uint256"));
    let returns = vec![b.var("", b.elementary("uint256"))];
    let mut id = b.function("id", vec![param], returns, body);
    id.visibility = Visibility::Private;
    c.functions.push(id);

    let (lhs, y) = (b.ident("total"), b.ident("y"));
    let call = b.call_named("id", vec![y]);
    let assign = b.assign(lhs, call);
    let stmt = b.expr_stmt(assign);
    let body = b.block(vec![stmt]);
    let param = b.var("y", b.elementary("uint256"));
    c.functions.push(b.function("set", vec![param], vec![], body));

    let t = b.ident("total");
    let ret = b.ret(Some(t));
    let body = b.block(vec![ret]);
    let returns = vec![b.var("", b.elementary("uint256"))];
    c.functions.push(b.function("get", vec![], returns, body));

    let (a, one) = (b.ident("a"), b.number("1"));
    let sum = b.binary(BinaryOp::Add, a, one);
    let ret = b.ret(Some(sum));
    let body = b.block(vec![ret]);
    let param = b.var("a", b.elementary("uint256"));
    let returns = vec![b.var("", b.elementary("uint256"))];
    c.functions.push(b.function("pure_add", vec![param], returns, body));

    build(&interner, b, None, vec![c])
}

#[test]
fn argument_flows_through_callee_into_state() {
    let program = vault();
    let (functions, graph) = graph_of(&program);
    let set = function(&program, "Vault", "set");
    let id = function(&program, "Vault", "id");
    let y = input(&program, ssa_for(&functions, set), "y");
    let x = input(&program, ssa_for(&functions, id), "x");
    let total = state(&program, "Vault", 0);

    let reached = graph.forward(DepNode::Value(set, y));
    assert!(reached.contains(&DepNode::Value(id, x)));
    assert!(reached.contains(&DepNode::State(total)));
    assert!(graph
        .backward(DepNode::State(total))
        .contains(&DepNode::Value(set, y)));
    assert_eq!(graph.function_state_influence(set), vec![total]);
}

#[test]
fn state_node_feeds_every_entry_value() {
    let program = vault();
    let (functions, graph) = graph_of(&program);
    let get = function(&program, "Vault", "get");
    let total = state(&program, "Vault", 0);
    let entry = input(&program, ssa_for(&functions, get), "total");

    assert_eq!(
        graph.predecessors(DepNode::Value(get, entry)),
        vec![DepNode::State(total)]
    );
    assert!(graph.forward(DepNode::State(total)).contains(&DepNode::Value(get, entry)));
    // Reading is not writing.
    assert!(graph.function_state_influence(get).is_empty());
}

#[test]
fn function_without_state_or_calls_influences_nothing() {
    let program = vault();
    let (_, graph) = graph_of(&program);
    let pure_add = function(&program, "Vault", "pure_add");
    assert!(graph.function_state_influence(pure_add).is_empty());
    let fee = state(&program, "Vault", 1);
    assert!(graph.backward(DepNode::State(fee)).is_empty());
}

#[test]
fn external_call_conservatively_influences_all_visible_state() {
    let interner = StringInterner::shared();
    let mut b = AstBuilder::new(&interner);
    let mut token = contract(&b, "Token", &[]);
    let body = b.block(vec![]);
    token.functions.push(b.function("deposit", vec![], vec![], body));

    let mut base = contract(&b, "Base", &[]);
    let owner = b.var("owner", b.elementary("address"));
    base.state_vars.push(owner);
    let mut c = contract(&b, "C", &["Base"]);
    let balance = b.var("balance", b.elementary("uint256"));
    c.state_vars.push(balance);
    let t = b.ident("t");
    let deposit = b.member(t, "deposit");
    let call = b.call(deposit, vec![]);
    let stmt = b.expr_stmt(call);
    let body = b.block(vec![stmt]);
    let param = b.var("t", b.user_type("Token"));
    c.functions.push(b.function("f", vec![param], vec![], body));

    let program = build(&interner, b, None, vec![token, base, c]);
    let (functions, graph) = graph_of(&program);
    let f = function(&program, "C", "f");
    let owner = state(&program, "Base", 0);
    let balance = state(&program, "C", 0);

    let mut expected = vec![owner, balance];
    expected.sort_unstable();
    assert_eq!(graph.function_state_influence(f), expected);

    let site = ssa_for(&functions, f)
        .instrs()
        .find(|(_, i)| i.kind.is_call())
        .map(|(_, i)| i.id)
        .unwrap();
    let call = DepNode::Call(f, site);
    let t = input(&program, ssa_for(&functions, f), "t");
    assert_eq!(graph.predecessors(call), {
        let mut preds = vec![
            DepNode::Value(f, t),
            DepNode::State(owner),
            DepNode::State(balance),
        ];
        preds.sort_unstable();
        preds
    });
}
