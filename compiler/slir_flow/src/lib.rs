//! Per-function IR pipeline and whole-program dependency analysis.
//!
//! ```text
//! Function ──lower──▶ LoweredFunction ──build_cfg──▶ Cfg ──convert──▶ SsaFunction
//!                                                                       │
//!                         DefUseIndex ◀──────────────────────────────────┤
//!                         CallGraph, DependencyGraph ◀── all functions ──┘
//! ```
//!
//! Every per-function phase takes its input by reference or by value and
//! returns a fresh result plus [`Diagnostics`](slir_diagnostic::Diagnostics)
//! scoped to that function, so functions are processed independently.
//! The call graph and dependency graph need every function's SSA form
//! and are built once at the end.

pub mod callgraph;
pub mod cfg;
pub mod dataflow;
pub mod dependency;
pub mod graph;
pub mod ir;
pub mod lower;
pub mod ssa;

#[cfg(test)]
mod test_helpers;

pub use callgraph::{CallEdge, CallGraph, CallKind};
pub use cfg::{build_cfg, BasicBlock, BlockKind, Cfg, Edge, EdgeKind};
pub use dataflow::{DefUseIndex, Site};
pub use dependency::{DepNode, DependencyGraph};
pub use graph::DominatorTree;
pub use ir::{BlockId, Instr, InstrId, InstrKind, LoweredFunction, Operand, VarId};
pub use lower::{has_code, lower_function, LowerOptions, Scoping};
pub use ssa::{convert, SsaBlock, SsaFunction, SsaVar};
