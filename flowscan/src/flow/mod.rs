//! Fixed-point dataflow analysis over a [`ControlFlowGraph`](crate::cfg::ControlFlowGraph).
//!
//! The engine is a generic worklist solver parameterized by direction, a
//! join operator and a per-block transfer function; it knows nothing
//! about variables. The two canonical instantiations live next to it:
//!
//! - [`DefiniteInit`]: forward, intersection join, answering "is this
//!   variable assigned on every path reaching this point?"
//! - [`Liveness`]: backward, union join, answering "may this value still
//!   be read before it is overwritten?"
//!
//! Each run is a pure function of one graph plus one tree: no shared
//! mutable state survives between invocations, so independent function
//! bodies can be solved concurrently with zero synchronization.

mod engine;
mod init;
mod liveness;

pub use engine::{solve, solve_with_limit, AnalysisResult, DidNotConverge, Direction, Solution};
pub use init::{DefiniteInit, SymbolSet, UseBeforeInit};
pub use liveness::{DeadStore, Liveness};

#[cfg(test)]
mod tests;
