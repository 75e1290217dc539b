//! Shared fixtures for flow tests.
//!
//! Builds a one-unit program from [`AstBuilder`] output and runs the
//! pipeline up to the phase under test.

use slir_diagnostic::Diagnostics;
use slir_ir::ast::{AstBuilder, BaseSpec, CompilerVersion, ContractDecl, ContractKind, SourceUnit};
use slir_ir::{ContractId, FunctionId, SharedInterner, Span};
use slir_model::{Program, ProgramBuilder};

use crate::cfg::{build_cfg, Cfg};
use crate::ir::{BlockId, LoweredFunction, VarId};
use crate::lower::{has_code, lower_function, LowerOptions};
use crate::ssa::{convert, SsaFunction};

pub(crate) fn contract(b: &AstBuilder<'_>, name: &str, bases: &[&str]) -> ContractDecl {
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

pub(crate) fn library(b: &AstBuilder<'_>, name: &str) -> ContractDecl {
    ContractDecl::new(b.name(name), ContractKind::Library)
}

/// Build the program, failing the test on any fatal model diagnostic.
pub(crate) fn build(
    interner: &SharedInterner,
    b: AstBuilder<'_>,
    version: Option<CompilerVersion>,
    contracts: Vec<ContractDecl>,
) -> Program {
    let mut unit = SourceUnit::new(b.name("test.sol"));
    unit.compiler_version = version;
    unit.contracts = contracts;
    unit.arena = b.finish();
    let mut builder = ProgramBuilder::new(SharedInterner::clone(interner));
    builder.add_unit(unit);
    let (program, diagnostics) = builder.finish();
    assert!(
        !diagnostics.is_fatal(),
        "unexpected model diagnostics: {diagnostics:?}"
    );
    program
}

/// The function `name` declared in contract `contract`.
pub(crate) fn function(program: &Program, contract: &str, name: &str) -> FunctionId {
    let id = program
        .contract_named(program.interner().intern(contract))
        .unwrap_or_else(|| panic!("no contract `{contract}`"));
    program
        .contract(id)
        .functions
        .iter()
        .copied()
        .find(|f| program.name(program.function(*f).name) == name)
        .unwrap_or_else(|| panic!("no function `{contract}.{name}`"))
}

pub(crate) fn lower(program: &Program, function: FunctionId) -> (LoweredFunction, Diagnostics) {
    lower_function(program, function, &LowerOptions::default())
}

pub(crate) fn cfg_of(program: &Program, function: FunctionId) -> Cfg {
    build_cfg(lower(program, function).0)
}

pub(crate) fn ssa_of(program: &Program, function: FunctionId) -> (SsaFunction, Diagnostics) {
    convert(&cfg_of(program, function), program.interner())
}

/// SSA form of every function with code, in declaration order.
pub(crate) fn ssa_all(program: &Program) -> Vec<SsaFunction> {
    program
        .functions()
        .iter()
        .filter(|f| has_code(f))
        .map(|f| ssa_of(program, f.id).0)
        .collect()
}

/// The contract called `name`.
pub(crate) fn contract_id(program: &Program, name: &str) -> ContractId {
    program
        .contract_named(program.interner().intern(name))
        .unwrap_or_else(|| panic!("no contract `{name}`"))
}

/// Shorthand for `VarId::new(n)`.
pub(crate) fn v(n: u32) -> VarId {
    VarId::new(n)
}

/// Shorthand for `BlockId::new(n)`.
pub(crate) fn bb(n: u32) -> BlockId {
    BlockId::new(n)
}
