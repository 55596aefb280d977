use rustc_hash::FxHashSet;
use serde::Serialize;

use super::engine::{solve, DidNotConverge, Direction, Solution};
use crate::cfg::ControlFlowGraph;
use crate::tree::{FunctionBody, NodeId, NodeKind, SymbolId, SymbolKind};

/// The lattice state of both set-based analyses: a set of symbols,
/// ordered by inclusion.
pub type SymbolSet = FxHashSet<SymbolId>;

/// A read of a symbol on some path where no assignment reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UseBeforeInit {
    /// The tree node of the offending read.
    pub node: NodeId,
    /// The symbol read before initialization.
    pub symbol: SymbolId,
}

/// Definite-initialization analysis: at each program point, the set of
/// symbols guaranteed assigned on every path reaching that point.
///
/// Forward instantiation of the worklist engine with intersection as the
/// join: a variable is definitely initialized at a merge only if every
/// predecessor guarantees it.
#[derive(Debug)]
pub struct DefiniteInit {
    solution: Solution<SymbolSet>,
    findings: Vec<UseBeforeInit>,
}

impl DefiniteInit {
    /// The documented start seed for callers without their own resolution
    /// layer: parameters, foreach and catch bindings, imported globals.
    /// Initialized `static $x = …;` declarations arrive through their
    /// `Write` occurrences; bare `static $x;` contributes nothing, which
    /// routes it into the late-initialization special case below.
    #[must_use]
    pub fn default_seed(body: &FunctionBody) -> SymbolSet {
        let mut seed: SymbolSet = body.params().iter().copied().collect();
        for id in body.symbol_ids() {
            if matches!(body.symbol(id).kind, SymbolKind::Global) {
                seed.insert(id);
            }
        }
        for (_, node) in body.iter_nodes() {
            match &node.kind {
                NodeKind::Foreach { .. } => {
                    seed.extend(node.usages.iter().filter(|o| o.writes()).map(|o| o.symbol));
                }
                NodeKind::Try { catches, .. } => {
                    for clause in catches {
                        if let Some(param) = clause.param {
                            seed.extend(
                                body.node(param)
                                    .usages
                                    .iter()
                                    .filter(|o| o.writes())
                                    .map(|o| o.symbol),
                            );
                        }
                    }
                }
                _ => {}
            }
        }
        seed
    }

    /// Runs the analysis over one graph.
    ///
    /// The transfer is pure; use-before-init findings come from a replay
    /// pass after the fixed point, so running twice on the same graph is
    /// bit-identical. Reads inside unreachable blocks never report (their
    /// optimistic entry state is the universe).
    pub fn run(
        cfg: &ControlFlowGraph,
        body: &FunctionBody,
        seed: &SymbolSet,
    ) -> Result<Self, DidNotConverge> {
        let universe: SymbolSet = body.symbol_ids().collect();
        let transfer = |block: &crate::cfg::BasicBlock, state: &SymbolSet| {
            let mut out = state.clone();
            for &node in block.elements() {
                for occ in &body.node(node).usages {
                    if occ.writes() {
                        out.insert(occ.symbol);
                    }
                }
            }
            out
        };
        let join = |acc: &mut SymbolSet, other: &SymbolSet| {
            acc.retain(|s| other.contains(s));
        };
        let solution = solve(
            cfg,
            Direction::Forward,
            seed.clone(),
            universe,
            transfer,
            join,
        )?;

        let mut findings = Vec::new();
        for (id, block) in cfg.iter_blocks() {
            let mut state = solution.on_entry(id).clone();
            // First offending occurrence per symbol per block is enough;
            // consumers de-duplicate across blocks.
            let mut reported: SymbolSet = SymbolSet::default();
            for &node in block.elements() {
                for occ in &body.node(node).usages {
                    if occ.reads() && !state.contains(&occ.symbol) && reported.insert(occ.symbol) {
                        findings.push(UseBeforeInit {
                            node,
                            symbol: occ.symbol,
                        });
                    }
                    if occ.writes() {
                        state.insert(occ.symbol);
                    }
                }
            }
        }

        // Statically-scoped variables keep their value across calls, so a
        // first-pass read is fine as long as some path through the whole
        // function initializes them: re-query the state at the end block.
        let end_state = solution.on_entry(cfg.end());
        findings.retain(|f| {
            !matches!(body.symbol(f.symbol).kind, SymbolKind::Static)
                || !end_state.contains(&f.symbol)
        });
        findings.sort_by_key(|f| (f.node.0, f.symbol.0));

        Ok(Self { solution, findings })
    }

    /// The solved per-block states.
    #[must_use]
    pub fn solution(&self) -> &Solution<SymbolSet> {
        &self.solution
    }

    /// Potential use-before-initialization findings, in source order.
    #[must_use]
    pub fn findings(&self) -> &[UseBeforeInit] {
        &self.findings
    }

    /// The definitely-initialized set just before `node` executes,
    /// replayed from its block's entry state. `None` when the node is not
    /// a block element.
    #[must_use]
    pub fn state_before(
        &self,
        cfg: &ControlFlowGraph,
        body: &FunctionBody,
        node: NodeId,
    ) -> Option<SymbolSet> {
        self.replay(cfg, body, node, false)
    }

    /// The definitely-initialized set just after `node` executes.
    #[must_use]
    pub fn state_after(
        &self,
        cfg: &ControlFlowGraph,
        body: &FunctionBody,
        node: NodeId,
    ) -> Option<SymbolSet> {
        self.replay(cfg, body, node, true)
    }

    fn replay(
        &self,
        cfg: &ControlFlowGraph,
        body: &FunctionBody,
        node: NodeId,
        inclusive: bool,
    ) -> Option<SymbolSet> {
        let (block, pos) = cfg.node_block(node)?;
        let upto = if inclusive { pos + 1 } else { pos };
        let mut state = self.solution.on_entry(block).clone();
        for &el in &cfg.block(block).elements()[..upto] {
            for occ in &body.node(el).usages {
                if occ.writes() {
                    state.insert(occ.symbol);
                }
            }
        }
        Some(state)
    }
}
