//! Analysis configuration.

use slir_flow::Scoping;
use slir_model::InheritanceOrder;

/// Configuration for one analysis run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Number of worker threads (0 = auto-detect).
    pub num_threads: usize,
    /// How written base lists map onto linearization merge order.
    pub inheritance_order: InheritanceOrder,
    /// Local-variable scoping; `Auto` follows each unit's compiler version.
    pub scoping: Scoping,
    /// Convert every function to SSA and build its def-use index.
    pub build_ssa: bool,
    /// Build the call graph and dependency graph. Needs `build_ssa`.
    pub build_dependencies: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            num_threads: 0,
            inheritance_order: InheritanceOrder::AsWritten,
            scoping: Scoping::Auto,
            build_ssa: true,
            build_dependencies: true,
        }
    }
}

impl AnalysisConfig {
    /// Run every function task on one thread.
    pub fn single_threaded() -> Self {
        AnalysisConfig {
            num_threads: 1,
            ..Default::default()
        }
    }

    pub fn with_threads(num_threads: usize) -> Self {
        AnalysisConfig {
            num_threads,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_inheritance_order(mut self, order: InheritanceOrder) -> Self {
        self.inheritance_order = order;
        self
    }

    #[must_use]
    pub fn with_scoping(mut self, scoping: Scoping) -> Self {
        self.scoping = scoping;
        self
    }

    /// Disabling SSA also disables the dependency graphs.
    #[must_use]
    pub fn with_ssa(mut self, build_ssa: bool) -> Self {
        self.build_ssa = build_ssa;
        if !build_ssa {
            self.build_dependencies = false;
        }
        self
    }

    #[must_use]
    pub fn with_dependencies(mut self, build_dependencies: bool) -> Self {
        self.build_dependencies = build_dependencies && self.build_ssa;
        self
    }

    /// Get the effective number of threads.
    pub fn effective_threads(&self) -> usize {
        if self.num_threads == 0 {
            rayon::current_num_threads()
        } else {
            self.num_threads
        }
    }
}
