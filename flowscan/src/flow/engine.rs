use std::collections::VecDeque;

use crate::cfg::{BasicBlock, BlockId, ControlFlowGraph};

/// Direction of a dataflow analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Facts propagate from the start block toward the end block; merge
    /// points join over predecessor exit states. Definite initialization
    /// runs this way.
    Forward,
    /// Facts propagate from the end block toward the start block; split
    /// points join over successor entry states. Liveness runs this way.
    Backward,
}

/// The fixed point was not reached within the iteration cap.
///
/// The cap exists purely as a correctness safety net: hitting it means a
/// caller-supplied transfer function broke the monotonicity contract, a
/// bug in the consumer, not in the analyzed program. Recover by skipping
/// the function.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dataflow analysis did not converge within {iterations} iterations")]
pub struct DidNotConverge {
    /// Worklist pops performed before giving up.
    pub iterations: usize,
}

/// Immutable per-block state pair. Produced once per run; the engine
/// exposes no mutation path afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult<S> {
    /// State at the block's entry boundary.
    pub on_entry: S,
    /// State at the block's exit boundary.
    pub on_exit: S,
}

/// The solved states of one analysis run, indexed by block id.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution<S> {
    states: Vec<AnalysisResult<S>>,
    iterations: usize,
}

impl<S> Solution<S> {
    /// The state pair of a block.
    ///
    /// Ids from a different graph are a precondition violation.
    #[must_use]
    pub fn result(&self, block: BlockId) -> &AnalysisResult<S> {
        &self.states[block.index()]
    }

    /// State on entry to a block.
    #[must_use]
    pub fn on_entry(&self, block: BlockId) -> &S {
        &self.result(block).on_entry
    }

    /// State on exit from a block.
    #[must_use]
    pub fn on_exit(&self, block: BlockId) -> &S {
        &self.result(block).on_exit
    }

    /// Number of worklist pops the run needed to converge.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Number of blocks covered.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.states.len()
    }
}

/// Default iteration cap factor: the lattice height of the set-based
/// analyses is bounded by the symbol count, far below this per block.
const DEFAULT_ITERATION_FACTOR: usize = 64;

/// Runs a worklist fixed point over the graph with the default cap.
///
/// - `boundary` seeds the start block's entry (forward) or the end
///   block's exit (backward).
/// - `interior` seeds every other boundary state: the top of the lattice,
///   i.e. the universe set for intersection joins, empty for unions.
/// - `transfer` maps a block's input-side state to its output side and
///   **must be monotone**; the engine documents rather than enforces
///   that obligation and converts a violation into [`DidNotConverge`]
///   through the iteration cap instead of looping forever.
/// - `join` folds one neighbor state into the accumulator.
///
/// The engine knows nothing about variables; the analyses in this module
/// instantiate it with symbol sets.
pub fn solve<S, T, J>(
    graph: &ControlFlowGraph,
    direction: Direction,
    boundary: S,
    interior: S,
    transfer: T,
    join: J,
) -> Result<Solution<S>, DidNotConverge>
where
    S: Clone + PartialEq,
    T: FnMut(&BasicBlock, &S) -> S,
    J: Fn(&mut S, &S),
{
    let cap = graph
        .block_count()
        .saturating_mul(DEFAULT_ITERATION_FACTOR)
        .max(DEFAULT_ITERATION_FACTOR);
    solve_with_limit(graph, direction, boundary, interior, transfer, join, cap)
}

/// [`solve`] with an explicit iteration cap.
#[allow(clippy::too_many_arguments)]
pub fn solve_with_limit<S, T, J>(
    graph: &ControlFlowGraph,
    direction: Direction,
    boundary: S,
    interior: S,
    mut transfer: T,
    join: J,
    max_iterations: usize,
) -> Result<Solution<S>, DidNotConverge>
where
    S: Clone + PartialEq,
    T: FnMut(&BasicBlock, &S) -> S,
    J: Fn(&mut S, &S),
{
    let n = graph.block_count();
    let seed_block = match direction {
        Direction::Forward => graph.start(),
        Direction::Backward => graph.end(),
    };

    // `input` is the joined side (entry for forward, exit for backward),
    // `output` the transferred side.
    let mut input: Vec<S> = vec![interior.clone(); n];
    let mut output: Vec<S> = vec![interior; n];
    input[seed_block.index()] = boundary;

    // Seed every block in an order that reaches the fixed point quickly:
    // reverse post-order over the dependency direction.
    let order = iteration_order(graph, direction);
    let mut worklist: VecDeque<BlockId> = order.into();
    let mut queued = vec![true; n];

    let mut iterations = 0usize;
    while let Some(block) = worklist.pop_front() {
        queued[block.index()] = false;
        iterations += 1;
        if iterations > max_iterations {
            log::warn!(
                "dataflow did not converge after {iterations} iterations; \
                 a transfer function is likely non-monotone"
            );
            return Err(DidNotConverge { iterations });
        }

        // Join over the dependency neighbors; blocks without any keep
        // their seeded state (the boundary block never has dependencies
        // by graph invariant).
        {
            let mut deps = dependency_states(graph, direction, block, &output);
            if let Some(first) = deps.next() {
                let mut acc = first.clone();
                for state in deps {
                    join(&mut acc, state);
                }
                input[block.index()] = acc;
            }
        }

        let new_output = transfer(graph.block(block), &input[block.index()]);
        if new_output != output[block.index()] {
            output[block.index()] = new_output;
            for dependent in dependents(graph, direction, block) {
                if !queued[dependent.index()] {
                    queued[dependent.index()] = true;
                    worklist.push_back(dependent);
                }
            }
        }
    }

    log::debug!("dataflow converged after {iterations} iterations over {n} blocks");

    let states = input
        .into_iter()
        .zip(output)
        .map(|(joined, transferred)| match direction {
            Direction::Forward => AnalysisResult {
                on_entry: joined,
                on_exit: transferred,
            },
            Direction::Backward => AnalysisResult {
                on_entry: transferred,
                on_exit: joined,
            },
        })
        .collect();
    Ok(Solution { states, iterations })
}

fn dependency_states<'a, S>(
    graph: &'a ControlFlowGraph,
    direction: Direction,
    block: BlockId,
    output: &'a [S],
) -> Box<dyn Iterator<Item = &'a S> + 'a> {
    match direction {
        Direction::Forward => Box::new(
            graph
                .predecessors(block)
                .map(move |e| &output[e.from.index()]),
        ),
        Direction::Backward => {
            Box::new(graph.successors(block).map(move |e| &output[e.to.index()]))
        }
    }
}

fn dependents(
    graph: &ControlFlowGraph,
    direction: Direction,
    block: BlockId,
) -> Vec<BlockId> {
    match direction {
        Direction::Forward => graph.successors(block).map(|e| e.to).collect(),
        Direction::Backward => graph.predecessors(block).map(|e| e.from).collect(),
    }
}

/// Reverse post-order over the dependency direction, with blocks the
/// traversal never reaches (unreachable code) appended in id order so
/// every block is processed at least once.
fn iteration_order(graph: &ControlFlowGraph, direction: Direction) -> Vec<BlockId> {
    let n = graph.block_count();
    let root = match direction {
        Direction::Forward => graph.start(),
        Direction::Backward => graph.end(),
    };

    let mut visited = vec![false; n];
    let mut postorder: Vec<BlockId> = Vec::with_capacity(n);
    // Iterative DFS with an explicit phase marker: first visit pushes the
    // children, second visit emits the block.
    let mut stack: Vec<(BlockId, bool)> = vec![(root, false)];
    while let Some((block, emitted)) = stack.pop() {
        if emitted {
            postorder.push(block);
            continue;
        }
        if visited[block.index()] {
            continue;
        }
        visited[block.index()] = true;
        stack.push((block, true));
        for next in dependents(graph, direction, block) {
            if !visited[next.index()] {
                stack.push((next, false));
            }
        }
    }

    postorder.reverse();
    for (id, _) in graph.iter_blocks() {
        if !visited[id.index()] {
            postorder.push(id);
        }
    }
    postorder
}
