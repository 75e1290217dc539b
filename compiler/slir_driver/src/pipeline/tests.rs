use pretty_assertions::assert_eq;
use slir_diagnostic::{AnalysisError, EntityKey};
use slir_ir::ast::{AstBuilder, ContractDecl, ContractKind, SourceUnit};
use slir_ir::{FunctionId, SharedInterner, StringInterner};
use slir_model::Program;

use super::{analyze, Analysis};
use crate::{AnalysisConfig, CancellationToken, Scoping};

/// `Broken { use(Phantom x) {} fine() { uint y = 1; } }`
fn broken_unit(interner: &SharedInterner) -> SourceUnit {
    let mut b = AstBuilder::new(interner);
    let mut c = ContractDecl::new(b.name("Broken"), ContractKind::Contract);
    let param = b.var("x", b.user_type("Phantom"));
    let body = b.block(vec![]);
    c.functions.push(b.function("use", vec![param], vec![], body));

    let one = b.number("1");
    let local = b.local("y", b.elementary("uint256"), Some(one));
    let body = b.block(vec![local]);
    c.functions.push(b.function("fine", vec![], vec![], body));

    let mut unit = SourceUnit::new(b.name("broken.sol"));
    unit.contracts = vec![c];
    unit.arena = b.finish();
    unit
}

fn run(config: &AnalysisConfig, cancel: &CancellationToken) -> Analysis {
    let interner = StringInterner::shared();
    let unit = broken_unit(&interner);
    analyze(vec![unit], interner, config, cancel)
}

fn named(program: &Program, name: &str) -> FunctionId {
    program
        .functions()
        .iter()
        .find(|f| program.name(f.name) == name)
        .map(|f| f.id)
        .unwrap()
}

#[test]
fn function_with_type_error_is_not_lowered() {
    let analysis = run(&AnalysisConfig::single_threaded(), &CancellationToken::new());
    let used = named(&analysis.program, "use");
    let fine = named(&analysis.program, "fine");

    assert!(analysis.function(used).is_none());
    assert!(analysis.diagnostics.has_errors_for(EntityKey::Function(used)));

    let fine = analysis.function(fine).unwrap();
    assert!(fine.ssa.is_some() && fine.def_use.is_some());
    assert!(fine.diagnostics.is_empty());
    assert!(!fine.cfg.partial);
}

#[test]
fn ssa_off_skips_every_graph() {
    let config = AnalysisConfig::single_threaded().with_ssa(false);
    let analysis = run(&config, &CancellationToken::new());

    assert_eq!(analysis.functions.len(), 1);
    assert!(analysis.functions[0].ssa.is_none());
    assert!(analysis.call_graph.is_none() && analysis.dependencies.is_none());
    assert_eq!(analysis.ssa_functions().count(), 0);
}

#[test]
fn cancelled_run_reports_every_function_as_skipped() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let analysis = run(&AnalysisConfig::default(), &cancel);
    let fine = named(&analysis.program, "fine");

    assert!(analysis.functions.is_empty());
    let skipped: Vec<&AnalysisError> = analysis
        .diagnostics
        .for_entity(EntityKey::Function(fine))
        .collect();
    assert_eq!(
        skipped,
        vec![&AnalysisError::Skipped {
            entity: "Broken.fine".to_string()
        }]
    );
    // a skipped function is not an analysis failure
    assert!(!analysis.diagnostics.has_errors_for(EntityKey::Function(fine)));
}

#[test]
fn flat_body_lowers_the_same_under_either_scoping() {
    let cancel = CancellationToken::new();
    let block = run(&AnalysisConfig::single_threaded().with_scoping(Scoping::Block), &cancel);
    let function = run(&AnalysisConfig::single_threaded().with_scoping(Scoping::Function), &cancel);

    assert_eq!(
        block.functions[0].lowered.mnemonics(),
        function.functions[0].lowered.mnemonics()
    );
    assert_eq!(block.diagnostics, function.diagnostics);
}
