//! Shared fixtures for pipeline tests.

use slir_driver::{analyze, Analysis, AnalysisConfig, CancellationToken};
use slir_ir::ast::{AstBuilder, BaseSpec, ContractDecl, ContractKind, FunctionDecl, SourceUnit};
use slir_ir::{ContractId, FunctionId, Span, StringInterner};
use slir_model::Program;

pub fn contract(b: &AstBuilder<'_>, name: &str, bases: &[&str]) -> ContractDecl {
    let mut decl = ContractDecl::new(b.name(name), ContractKind::Contract);
    decl.bases = bases
        .iter()
        .map(|base| BaseSpec {
            name: b.name(base),
            args: Vec::new(),
            span: Span::DUMMY,
        })
        .collect();
    decl
}

pub fn empty_fn(b: &mut AstBuilder<'_>, name: &str) -> FunctionDecl {
    let body = b.block(vec![]);
    b.function(name, vec![], vec![], body)
}

/// Declare one unit's contracts with `declare` and analyze it.
pub fn analyze_with(
    config: &AnalysisConfig,
    declare: impl FnOnce(&mut AstBuilder<'_>) -> Vec<ContractDecl>,
) -> Analysis {
    let interner = StringInterner::shared();
    let unit = {
        let mut b = AstBuilder::new(&interner);
        let contracts = declare(&mut b);
        let mut unit = SourceUnit::new(b.name("test.sol"));
        unit.contracts = contracts;
        unit.arena = b.finish();
        unit
    };
    analyze(vec![unit], interner, config, &CancellationToken::new())
}

pub fn analyze_source(declare: impl FnOnce(&mut AstBuilder<'_>) -> Vec<ContractDecl>) -> Analysis {
    analyze_with(&AnalysisConfig::default(), declare)
}

pub fn contract_id(program: &Program, name: &str) -> ContractId {
    program
        .contract_named(program.interner().intern(name))
        .unwrap_or_else(|| panic!("no contract `{name}`"))
}

pub fn function_id(program: &Program, contract: &str, name: &str) -> FunctionId {
    let id = contract_id(program, contract);
    program
        .contract(id)
        .functions
        .iter()
        .copied()
        .find(|f| program.name(program.function(*f).name) == name)
        .unwrap_or_else(|| panic!("no function `{contract}.{name}`"))
}

/// Contract names of `name`'s linearization.
pub fn linearization(program: &Program, name: &str) -> Vec<&'static str> {
    program
        .contract(contract_id(program, name))
        .linearization
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|c| program.name(program.contract(*c).name))
        .collect()
}
