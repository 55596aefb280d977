use std::fmt::Write as _;

use super::builder::CfgBuilder;
use super::types::{BlockId, ControlFlowGraph, EdgeKind, END_BLOCK, START_BLOCK};
use super::Unbuildable;
use crate::tree::{FunctionBody, NodeId};

impl ControlFlowGraph {
    /// Lowers one function body to its control-flow graph.
    ///
    /// All-or-nothing: an [`Unbuildable`] body yields no partial graph.
    /// Callers treat the error as "skip this function".
    pub fn build(body: &FunctionBody) -> Result<Self, Unbuildable> {
        CfgBuilder::new(body).build()
    }

    /// Identifies all basic blocks that are not reachable from the start
    /// block. A legal but flagged condition: code after an unconditional
    /// jump lands here.
    #[must_use]
    pub fn unreachable_blocks(&self) -> Vec<BlockId> {
        let mut reachable = vec![false; self.blocks.len()];
        let mut stack = vec![START_BLOCK];

        while let Some(block) = stack.pop() {
            if reachable[block.index()] {
                continue;
            }
            reachable[block.index()] = true;
            for edge in self.successors(block) {
                stack.push(edge.to);
            }
        }

        self.iter_blocks()
            .filter(|(id, _)| !reachable[id.index()])
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether control can come back to `header` from `entry` while
    /// staying inside `loop_node`'s subtree.
    ///
    /// Bounded traversal from `entry`, following only edges whose target
    /// block's first element is a descendant of the loop node; true as
    /// soon as an edge back into `header` shows up. Blocks without
    /// elements are synthesized join points, not source code, and pass
    /// through. Used to decide whether a loop is structurally capable of
    /// a second iteration, independent of what its values do at runtime.
    ///
    /// Ids from a different graph or a `loop_node` from a different body
    /// are precondition violations.
    #[must_use]
    pub fn can_return_to_header(
        &self,
        body: &FunctionBody,
        loop_node: NodeId,
        header: BlockId,
        entry: BlockId,
    ) -> bool {
        let mut visited = vec![false; self.blocks.len()];
        let mut stack = vec![entry];
        while let Some(block) = stack.pop() {
            if visited[block.index()] {
                continue;
            }
            visited[block.index()] = true;
            for edge in self.successors(block) {
                if edge.to == header {
                    return true;
                }
                let inside = self
                    .block(edge.to)
                    .elements()
                    .first()
                    .is_none_or(|&n| body.is_descendant(n, loop_node));
                if inside {
                    stack.push(edge.to);
                }
            }
        }
        false
    }

    /// Deterministic text rendering, for tests and debugging.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (id, block) in self.iter_blocks() {
            let _ = write!(out, "b{}", id.0);
            if id == START_BLOCK {
                out.push_str(" start");
            } else if id == END_BLOCK {
                out.push_str(" end");
            }
            if !block.elements.is_empty() {
                out.push_str(" [");
                for (i, node) in block.elements.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    let _ = write!(out, "n{}", node.0);
                }
                out.push(']');
            }
            if let Some(branch) = block.branch {
                let _ = write!(out, " branch=n{}", branch.0);
            }
            out.push('\n');
            for &edge_id in &block.out_edges {
                let edge = self.edge(edge_id);
                let kind = match edge.kind {
                    EdgeKind::Unconditional => "uncond",
                    EdgeKind::True => "true",
                    EdgeKind::False => "false",
                    EdgeKind::Exception => "exc",
                };
                let _ = writeln!(out, "  -> b{} {kind}", edge.to.0);
            }
        }
        out
    }
}
