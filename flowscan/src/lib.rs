//! flowscan: control-flow graph construction and fixed-point dataflow
//! analysis for flow-sensitive lint rules.
//!
//! Rule catalogs are mostly single-pass syntactic pattern matches; the
//! questions a syntax walk cannot answer soundly all route through this
//! crate:
//!
//! - "is this variable read on some path before any assignment reaches
//!   it?" ([`flow::DefiniteInit`])
//! - "is this assignment dead because no path reaches a read before the
//!   next overwrite?" ([`flow::Liveness`])
//! - "can this loop's body run more than once?"
//!   ([`cfg::ControlFlowGraph::can_return_to_header`])
//!
//! The parser and symbol resolver stay external: an adapter lowers one
//! function body at a time into the [`tree`] model, [`cfg`] builds the
//! graph, and [`flow`] runs the analyses over it. Data flows strictly
//! downward; every invocation is a pure function of one body's tree, so
//! independent bodies can be analyzed concurrently without any
//! synchronization ([`analyze_all`]).
//!
//! Failures are values, never faults: [`cfg::Unbuildable`] and
//! [`flow::DidNotConverge`] both mean "skip this function", and no
//! partial graph or result map is ever exposed.

pub mod cfg;
pub mod flow;
pub mod tree;

mod analyze;

pub use analyze::{analyze, analyze_all, AnalysisError, Finding, FunctionAnalysis};
