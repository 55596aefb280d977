//! CFG (Control Flow Graph) construction for one function body.
//!
//! This module lowers the tree model to a graph of ordered basic blocks
//! connected by labeled edges, the substrate every flow-sensitive query
//! in this crate runs on:
//!
//! - Reachability facts (unreachable code after unconditional jumps)
//! - The loop one-iteration query ([`ControlFlowGraph::can_return_to_header`])
//! - The fixed-point dataflow analyses in [`crate::flow`]
//!
//! # Design Principles
//!
//! - **One CFG per function**: never cross function boundaries
//! - **Arena + index**: blocks and edges live in id-indexed vectors,
//!   adjacency is edge-id lists, so loops carry no ownership cycles
//! - **Built fresh, then immutable**: ownership moves to the caller; one
//!   graph may back any number of analysis runs
//! - **Coarse exception flow**: every statement in a try body edges to
//!   every active catch entry; an approximation, not a precision claim

mod builder;
mod graph;
mod types;

pub use builder::Unbuildable;
pub use types::{BasicBlock, BlockId, ControlFlowGraph, Edge, EdgeId, EdgeKind};
