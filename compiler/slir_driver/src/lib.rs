//! Analysis driver.
//!
//! Builds the program model, then lowers every function with code to IR,
//! partitions it into a CFG and converts it to SSA on a rayon pool. The
//! call graph and dependency graph are built last, over every function's
//! SSA form.
//!
//! ```ignore
//! let config = AnalysisConfig::default();
//! let analysis = analyze(units, interner, &config, &CancellationToken::new());
//! for (entity, error) in analysis.diagnostics.iter() { /* ... */ }
//! ```

mod cancel;
mod config;
mod pipeline;
mod tracing_setup;

pub use cancel::CancellationToken;
pub use config::AnalysisConfig;
pub use pipeline::{analyze, analyze_function, analyze_program, Analysis, FunctionAnalysis};
pub use tracing_setup::init_tracing;

pub use slir_flow::Scoping;
pub use slir_model::InheritanceOrder;
