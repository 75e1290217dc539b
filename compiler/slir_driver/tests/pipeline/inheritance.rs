//! Linearization and member-conflict tests.

use pretty_assertions::assert_eq;
use slir_diagnostic::{AnalysisError, EntityKey};
use slir_driver::{AnalysisConfig, InheritanceOrder};
use slir_ir::ast::{AstBuilder, ContractDecl};

use crate::common::{
    analyze_source, analyze_with, contract, contract_id, empty_fn, function_id, linearization,
};

/// `A { m() }`, `B is A { m() }`, `C is A { m() }`, `D is B, C`, with `m`
/// optionally redeclared in D.
fn diamond(b: &mut AstBuilder<'_>, d_resolves: bool) -> Vec<ContractDecl> {
    let mut a = contract(b, "A", &[]);
    a.functions.push(empty_fn(b, "m"));
    let mut left = contract(b, "B", &["A"]);
    left.functions.push(empty_fn(b, "m"));
    let mut right = contract(b, "C", &["A"]);
    right.functions.push(empty_fn(b, "m"));
    let mut d = contract(b, "D", &["B", "C"]);
    if d_resolves {
        d.functions.push(empty_fn(b, "m"));
    }
    vec![a, left, right, d]
}

#[test]
fn unresolved_diamond_is_an_inheritance_conflict() {
    let analysis = analyze_source(|b| diamond(b, false));
    let d = contract_id(&analysis.program, "D");

    let errors: Vec<&AnalysisError> = analysis
        .diagnostics
        .for_entity(EntityKey::Contract(d))
        .collect();
    assert_eq!(errors.len(), 1);
    match errors[0] {
        AnalysisError::InheritanceConflict { member, candidates, .. } => {
            assert_eq!(member, "m()");
            assert_eq!(candidates, &vec!["B".to_string(), "C".to_string()]);
        }
        other => panic!("expected an inheritance conflict, got {other:?}"),
    }
    assert!(analysis.diagnostics.is_fatal());

    // the three declarations of `m` are still analyzed
    assert_eq!(analysis.functions.len(), 3);
    let in_b = function_id(&analysis.program, "B", "m");
    assert!(analysis.function(in_b).unwrap().diagnostics.is_empty());
}

#[test]
fn resolved_diamond_is_clean_and_linearized() {
    let analysis = analyze_source(|b| diamond(b, true));
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    assert_eq!(linearization(&analysis.program, "D"), vec!["D", "B", "C", "A"]);
    assert_eq!(analysis.functions.len(), 4);
}

#[test]
fn solidity_order_reverses_the_written_bases() {
    let config = AnalysisConfig::default().with_inheritance_order(InheritanceOrder::Solidity);
    let analysis = analyze_with(&config, |b| diamond(b, true));
    assert_eq!(linearization(&analysis.program, "D"), vec!["D", "C", "B", "A"]);
}

#[test]
fn linearization_is_identical_across_runs() {
    let first = analyze_source(|b| diamond(b, true));
    let second = analyze_source(|b| diamond(b, true));
    for name in ["A", "B", "C", "D"] {
        assert_eq!(
            linearization(&first.program, name),
            linearization(&second.program, name)
        );
    }
}

#[test]
fn unknown_base_fails_only_its_subtree() {
    let analysis = analyze_source(|b| {
        let mut orphan = contract(b, "Orphan", &["Missing"]);
        orphan.functions.push(empty_fn(b, "f"));
        let child = contract(b, "Child", &["Orphan"]);
        let mut healthy = contract(b, "Healthy", &[]);
        healthy.functions.push(empty_fn(b, "g"));
        vec![orphan, child, healthy]
    });
    let program = &analysis.program;

    for name in ["Orphan", "Child"] {
        let id = contract_id(program, name);
        assert!(program.contract(id).linearization.is_none());
        assert!(matches!(
            analysis.diagnostics.for_entity(EntityKey::Contract(id)).next(),
            Some(AnalysisError::Linearization { .. })
        ));
    }
    let healthy = contract_id(program, "Healthy");
    assert!(!analysis.diagnostics.has_errors_for(EntityKey::Contract(healthy)));
    assert_eq!(linearization(program, "Healthy"), vec!["Healthy"]);

    let g = function_id(program, "Healthy", "g");
    assert!(analysis.function(g).is_some());
}
