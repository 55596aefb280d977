use rustc_hash::FxHashSet;
use serde::Serialize;

use super::engine::{solve, DidNotConverge, Direction, Solution};
use super::init::SymbolSet;
use crate::cfg::{BlockId, ControlFlowGraph};
use crate::tree::{FunctionBody, NodeId, SymbolId};

/// A write whose value no path reads before the next overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeadStore {
    /// The tree node of the pointless write.
    pub node: NodeId,
    /// The symbol written.
    pub symbol: SymbolId,
}

/// Live-variable analysis: at each program point, the set of symbols that
/// may be read later without an intervening write.
///
/// Backward instantiation of the worklist engine with union as the join:
/// a variable is live before a block if any successor may read it first.
#[derive(Debug)]
pub struct Liveness {
    solution: Solution<SymbolSet>,
    dead_stores: Vec<DeadStore>,
}

impl Liveness {
    /// Runs the analysis over one graph.
    ///
    /// `escape` is the caller's "still observable after the function
    /// exits" set (closure captures and the like); it seeds the end
    /// block. Dead stores are collected in a replay pass after the fixed
    /// point; writes excluded from reporting are `static`/`global`
    /// symbols, occurrences the adapter flagged as trivial literals, and
    /// anything inside an unreachable block (the unreachable-code query
    /// already covers those).
    pub fn run(
        cfg: &ControlFlowGraph,
        body: &FunctionBody,
        escape: &SymbolSet,
    ) -> Result<Self, DidNotConverge> {
        let transfer = |block: &crate::cfg::BasicBlock, state: &SymbolSet| {
            let mut live = state.clone();
            for &node in block.elements().iter().rev() {
                for occ in body.node(node).usages.iter().rev() {
                    if occ.reads() {
                        live.insert(occ.symbol);
                    } else {
                        live.remove(&occ.symbol);
                    }
                }
            }
            live
        };
        let join = |acc: &mut SymbolSet, other: &SymbolSet| {
            acc.extend(other.iter().copied());
        };
        let solution = solve(
            cfg,
            Direction::Backward,
            escape.clone(),
            SymbolSet::default(),
            transfer,
            join,
        )?;

        let unreachable: FxHashSet<BlockId> = cfg.unreachable_blocks().into_iter().collect();
        let mut dead_stores = Vec::new();
        for (id, block) in cfg.iter_blocks() {
            if unreachable.contains(&id) {
                continue;
            }
            let mut live = solution.on_exit(id).clone();
            for &node in block.elements().iter().rev() {
                for occ in body.node(node).usages.iter().rev() {
                    if occ.reads() {
                        // A read-write occurrence consumes the old value,
                        // so its write half is never a dead store.
                        live.insert(occ.symbol);
                    } else {
                        if !live.contains(&occ.symbol)
                            && !occ.trivial
                            && !body.symbol(occ.symbol).outlives_function()
                        {
                            dead_stores.push(DeadStore {
                                node,
                                symbol: occ.symbol,
                            });
                        }
                        live.remove(&occ.symbol);
                    }
                }
            }
        }
        dead_stores.sort_by_key(|d| (d.node.0, d.symbol.0));

        Ok(Self {
            solution,
            dead_stores,
        })
    }

    /// The solved per-block states.
    #[must_use]
    pub fn solution(&self) -> &Solution<SymbolSet> {
        &self.solution
    }

    /// Dead-store findings, in source order.
    #[must_use]
    pub fn dead_stores(&self) -> &[DeadStore] {
        &self.dead_stores
    }

    /// The live set just before `node` executes, replayed backward from
    /// its block's exit state. `None` when the node is not a block
    /// element.
    #[must_use]
    pub fn live_before(
        &self,
        cfg: &ControlFlowGraph,
        body: &FunctionBody,
        node: NodeId,
    ) -> Option<SymbolSet> {
        self.replay(cfg, body, node, true)
    }

    /// The live set just after `node` executes.
    #[must_use]
    pub fn live_after(
        &self,
        cfg: &ControlFlowGraph,
        body: &FunctionBody,
        node: NodeId,
    ) -> Option<SymbolSet> {
        self.replay(cfg, body, node, false)
    }

    fn replay(
        &self,
        cfg: &ControlFlowGraph,
        body: &FunctionBody,
        node: NodeId,
        inclusive: bool,
    ) -> Option<SymbolSet> {
        let (block, pos) = cfg.node_block(node)?;
        let from = if inclusive { pos } else { pos + 1 };
        let mut live = self.solution.on_exit(block).clone();
        for &el in cfg.block(block).elements()[from..].iter().rev() {
            for occ in body.node(el).usages.iter().rev() {
                if occ.reads() {
                    live.insert(occ.symbol);
                } else {
                    live.remove(&occ.symbol);
                }
            }
        }
        Some(live)
    }
}
