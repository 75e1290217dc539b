//! Diagnostics scoping and parallel scheduling.

use pretty_assertions::assert_eq;
use slir_diagnostic::{AnalysisError, EntityKey};
use slir_driver::{Analysis, AnalysisConfig};
use slir_ir::ast::{AstBuilder, ContractDecl};
use slir_ir::StmtId;

use crate::common::{analyze_source, analyze_with, contract, function_id};

fn store(b: &mut AstBuilder<'_>, digits: &str) -> StmtId {
    let (lhs, value) = (b.ident("v"), b.number(digits));
    let assign = b.assign(lhs, value);
    b.expr_stmt(assign)
}

/// `C { uint v; F() { v = 1; assembly {} v = 2; } G() { v = 3; } }` plus
/// `workers` copies of G named `g0`, `g1`, ...
fn mixed(b: &mut AstBuilder<'_>, workers: usize) -> Vec<ContractDecl> {
    let mut c = contract(b, "C", &[]);
    c.state_vars.push(b.var("v", b.elementary("uint256")));

    let (before, after) = (store(b, "1"), store(b, "2"));
    let asm = b.inline_assembly();
    let body = b.block(vec![before, asm, after]);
    c.functions.push(b.function("F", vec![], vec![], body));

    let set = store(b, "3");
    let body = b.block(vec![set]);
    c.functions.push(b.function("G", vec![], vec![], body));

    for i in 0..workers {
        let set = store(b, "4");
        let body = b.block(vec![set]);
        c.functions.push(b.function(&format!("g{i}"), vec![], vec![], body));
    }
    vec![c]
}

#[test]
fn unsupported_construct_stays_with_its_function() {
    let analysis = analyze_source(|b| mixed(b, 0));
    let f = function_id(&analysis.program, "C", "F");
    let g = function_id(&analysis.program, "C", "G");

    let f_result = analysis.function(f).unwrap();
    assert!(f_result.cfg.partial);
    assert!(f_result.ssa.as_ref().unwrap().partial);
    assert!(matches!(
        analysis.diagnostics.for_entity(EntityKey::Function(f)).next(),
        Some(AnalysisError::UnsupportedConstruct { .. })
    ));
    // non-fatal: F is analyzable but incomplete
    assert!(!analysis.diagnostics.has_errors_for(EntityKey::Function(f)));

    let g_result = analysis.function(g).unwrap();
    assert!(!g_result.cfg.partial);
    assert!(!g_result.ssa.as_ref().unwrap().partial);
    assert!(g_result.diagnostics.is_empty());
    assert_eq!(analysis.diagnostics.for_entity(EntityKey::Function(g)).count(), 0);
}

/// Everything thread scheduling could perturb, flattened for comparison.
fn fingerprint(analysis: &Analysis) -> Vec<String> {
    let mut out: Vec<String> = analysis
        .functions
        .iter()
        .map(|f| {
            let ssa = f.ssa.as_ref().unwrap();
            format!(
                "{:?}: {} blocks, {} instrs, {} diagnostics",
                f.function,
                f.cfg.len(),
                ssa.instrs().count(),
                f.diagnostics.len()
            )
        })
        .collect();
    out.extend(
        analysis
            .call_graph
            .as_ref()
            .unwrap()
            .edges()
            .iter()
            .map(|e| format!("{e:?}")),
    );
    out.push(format!("{} dependency nodes", analysis.dependencies.as_ref().unwrap().len()));
    out.extend(analysis.diagnostics.iter().map(|d| format!("{d:?}")));
    out
}

#[test]
fn thread_count_does_not_change_results() {
    let single = analyze_with(&AnalysisConfig::single_threaded(), |b| mixed(b, 16));
    let pooled = analyze_with(&AnalysisConfig::with_threads(4), |b| mixed(b, 16));

    assert_eq!(single.functions.len(), 18);
    assert_eq!(fingerprint(&single), fingerprint(&pooled));
}
