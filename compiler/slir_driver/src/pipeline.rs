//! The analysis pipeline.
//!
//! ```text
//! SourceUnits ──▶ ProgramBuilder ──▶ Program (linearized, member tables)
//!                                      │
//!                  ┌───────────────────┼───────────────────┐
//!                  ▼                   ▼                   ▼
//!            lower → CFG → SSA   lower → CFG → SSA   ...  (rayon pool)
//!                  └───────────────────┼───────────────────┘
//!                                      ▼
//!                        CallGraph ──▶ DependencyGraph
//! ```
//!
//! Linearization finishes before any function task starts. Function tasks
//! share the frozen program read-only and own everything they produce.

use rayon::prelude::*;
use slir_diagnostic::{AnalysisError, Diagnostics, EntityKey};
use slir_ir::ast::SourceUnit;
use slir_ir::{FunctionId, SharedInterner};
use slir_flow::{
    build_cfg, convert, has_code, lower_function, CallGraph, Cfg, DefUseIndex, DependencyGraph,
    LowerOptions, LoweredFunction, SsaFunction,
};
use slir_model::{Program, ProgramBuilder};
use tracing::{debug, info_span, warn};

use crate::{AnalysisConfig, CancellationToken};

/// Worker stack size; lowering and linearization recurse on the AST.
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Everything produced for one function.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FunctionAnalysis {
    pub function: FunctionId,
    /// The ordered instruction sequence, before block partitioning.
    pub lowered: LoweredFunction,
    pub cfg: Cfg,
    pub ssa: Option<SsaFunction>,
    pub def_use: Option<DefUseIndex>,
    /// Diagnostics keyed to this function only.
    pub diagnostics: Diagnostics,
}

/// Result of a whole analysis run.
pub struct Analysis {
    pub program: Program,
    /// One entry per analyzed function, ordered by id.
    pub functions: Vec<FunctionAnalysis>,
    pub call_graph: Option<CallGraph>,
    pub dependencies: Option<DependencyGraph>,
    /// Model diagnostics plus every function's, sorted by entity.
    pub diagnostics: Diagnostics,
}

impl Analysis {
    pub fn function(&self, id: FunctionId) -> Option<&FunctionAnalysis> {
        self.functions
            .binary_search_by_key(&id, |f| f.function)
            .ok()
            .map(|i| &self.functions[i])
    }

    /// SSA forms of every analyzed function.
    pub fn ssa_functions(&self) -> impl Iterator<Item = &SsaFunction> + '_ {
        self.functions.iter().filter_map(|f| f.ssa.as_ref())
    }
}

/// Build the program from `units` and analyze every function with code.
pub fn analyze(
    units: Vec<SourceUnit>,
    interner: SharedInterner,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Analysis {
    let (program, diagnostics) = {
        let _span = info_span!("model", units = units.len()).entered();
        let mut builder = ProgramBuilder::new(interner).with_inheritance_order(config.inheritance_order);
        for unit in units {
            builder.add_unit(unit);
        }
        builder.finish()
    };
    analyze_program(program, diagnostics, config, cancel)
}

/// Analyze an already built program. `diagnostics` are the model's.
pub fn analyze_program(
    program: Program,
    mut diagnostics: Diagnostics,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Analysis {
    // Only function-level errors exclude a function. Functions of contracts
    // that failed linearization or have a member conflict are still lowered
    // (see "Linearization failures" in DESIGN.md).
    let candidates: Vec<FunctionId> = program
        .functions()
        .iter()
        .filter(|f| has_code(f) && !diagnostics.has_errors_for(EntityKey::Function(f.id)))
        .map(|f| f.id)
        .collect();

    let outcomes = {
        let _span = info_span!("functions", count = candidates.len()).entered();
        run_functions(&program, &candidates, config, cancel)
    };

    let mut functions = Vec::with_capacity(outcomes.len());
    let mut skipped = 0usize;
    for (id, outcome) in candidates.iter().zip(outcomes) {
        match outcome {
            Some(analysis) => {
                diagnostics.extend(analysis.diagnostics.clone());
                functions.push(analysis);
            }
            None => {
                skipped += 1;
                diagnostics.push(
                    EntityKey::Function(*id),
                    AnalysisError::Skipped {
                        entity: qualified_name(&program, *id),
                    },
                );
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, "analysis cancelled before every function ran");
    }

    let (call_graph, dependencies) = if config.build_ssa && config.build_dependencies {
        let _span = info_span!("dependencies").entered();
        let ssa: Vec<&SsaFunction> = functions.iter().filter_map(|f| f.ssa.as_ref()).collect();
        let calls = CallGraph::build(&program, ssa.iter().copied());
        let deps = DependencyGraph::build(&program, ssa.iter().copied(), &calls);
        (Some(calls), Some(deps))
    } else {
        (None, None)
    };

    diagnostics.sort();
    debug!(
        functions = functions.len(),
        diagnostics = diagnostics.len(),
        "analysis complete"
    );
    Analysis {
        program,
        functions,
        call_graph,
        dependencies,
        diagnostics,
    }
}

/// Run one task per function on a scoped pool. `None` marks a task that
/// was never started because of cancellation.
fn run_functions(
    program: &Program,
    candidates: &[FunctionId],
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Vec<Option<FunctionAnalysis>> {
    let task = |id: &FunctionId| {
        if cancel.is_cancelled() {
            return None;
        }
        Some(analyze_function(program, *id, config))
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .stack_size(WORKER_STACK_SIZE)
        .build_scoped(rayon::ThreadBuilder::run, |pool| {
            pool.install(|| candidates.par_iter().map(task).collect::<Vec<_>>())
        })
        .unwrap_or_else(|e| {
            warn!("failed to create thread pool ({e}), running sequentially");
            candidates.iter().map(task).collect()
        })
}

/// Lower, partition and convert one function.
#[tracing::instrument(level = "debug", skip_all, fields(function = function.raw()))]
pub fn analyze_function(program: &Program, function: FunctionId, config: &AnalysisConfig) -> FunctionAnalysis {
    let options = LowerOptions {
        scoping: config.scoping,
    };
    let (lowered, mut diagnostics) = lower_function(program, function, &options);
    let cfg = build_cfg(lowered.clone());

    let (ssa, def_use) = if config.build_ssa {
        let (ssa, ssa_diagnostics) = convert(&cfg, program.interner());
        diagnostics.extend(ssa_diagnostics);
        let def_use = DefUseIndex::build(&ssa);
        (Some(ssa), Some(def_use))
    } else {
        (None, None)
    };

    FunctionAnalysis {
        function,
        lowered,
        cfg,
        ssa,
        def_use,
        diagnostics,
    }
}

/// `Contract.name`, or just `name` for free functions.
fn qualified_name(program: &Program, id: FunctionId) -> String {
    let f = program.function(id);
    match f.contract {
        Some(c) => format!(
            "{}.{}",
            program.name(program.contract(c).name),
            program.name(f.name)
        ),
        None => program.name(f.name).to_string(),
    }
}

#[cfg(test)]
mod tests;
