use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::tree::NodeId;

/// Index of one basic block in a [`ControlFlowGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of one edge in a [`ControlFlowGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(pub u32);

impl EdgeId {
    #[inline]
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// How control moves along an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Plain fall-through or jump.
    Unconditional,
    /// Branch taken when the decision node evaluates truthy. Switch
    /// case-entry edges use this kind with the case test as the branch
    /// back-reference.
    True,
    /// Branch taken otherwise; for a switch, the default/fallout edge.
    False,
    /// Coarse edge from a block inside a try body to a catch entry.
    Exception,
}

/// A directed, labeled edge between two basic blocks.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Source block.
    pub from: BlockId,
    /// Target block.
    pub to: BlockId,
    /// Edge label.
    pub kind: EdgeKind,
    /// For branch edges, the decision node (the `if`/`while` condition,
    /// the case test, the foreach header) so consumers can report on the
    /// decision point rather than the block.
    pub branch: Option<NodeId>,
}

/// A maximal straight-line sequence of tree elements.
///
/// A block with a branching node (`branch: Some(_)`) is the graph's
/// decision-point refinement: it exposes true/false (or multi-way)
/// successors. A plain block has one successor, or none for the end block.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub(crate) elements: Vec<NodeId>,
    pub(crate) out_edges: SmallVec<[EdgeId; 2]>,
    pub(crate) in_edges: SmallVec<[EdgeId; 2]>,
    pub(crate) branch: Option<NodeId>,
}

impl BasicBlock {
    pub(crate) fn new() -> Self {
        Self {
            elements: Vec::new(),
            out_edges: SmallVec::new(),
            in_edges: SmallVec::new(),
            branch: None,
        }
    }

    /// Ordered tree-node references executed by this block.
    #[must_use]
    pub fn elements(&self) -> &[NodeId] {
        &self.elements
    }

    /// The branching tree node, when this block ends in a decision.
    #[must_use]
    pub fn branching_node(&self) -> Option<NodeId> {
        self.branch
    }

    /// True when the block fans out on a decision node.
    #[must_use]
    pub fn is_branching(&self) -> bool {
        self.branch.is_some()
    }
}

/// The control-flow graph of one function body.
///
/// Blocks and edges live in id-indexed arenas; adjacency is stored as edge
/// id lists, so loops never create ownership cycles. Built fresh per
/// function body by [`ControlFlowGraph::build`](ControlFlowGraph::build)
/// and immutable afterwards; one graph may back any number of analyses.
#[derive(Debug)]
pub struct ControlFlowGraph {
    pub(crate) blocks: Vec<BasicBlock>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) node_block: FxHashMap<NodeId, (BlockId, usize)>,
}

/// Id of the synthetic entry block: no predecessors, no elements.
pub const START_BLOCK: BlockId = BlockId(0);
/// Id of the synthetic exit block: no successors.
pub const END_BLOCK: BlockId = BlockId(1);

impl ControlFlowGraph {
    /// The synthetic start block id.
    #[must_use]
    pub fn start(&self) -> BlockId {
        START_BLOCK
    }

    /// The synthetic end block id.
    #[must_use]
    pub fn end(&self) -> BlockId {
        END_BLOCK
    }

    /// The block behind an id.
    ///
    /// Ids from a different graph are a precondition violation and panic
    /// like any out-of-bounds index.
    #[inline]
    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    /// The edge behind an id.
    #[inline]
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    /// Number of blocks, synthetic ones included.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks with their ids, in id order.
    pub fn iter_blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BlockId(u32::try_from(i).unwrap_or(u32::MAX)), b))
    }

    /// Outgoing edges of a block.
    pub fn successors(&self, id: BlockId) -> impl Iterator<Item = &Edge> {
        self.block(id).out_edges.iter().map(|&e| self.edge(e))
    }

    /// Incoming edges of a block.
    pub fn predecessors(&self, id: BlockId) -> impl Iterator<Item = &Edge> {
        self.block(id).in_edges.iter().map(|&e| self.edge(e))
    }

    /// Where a tree node landed: its containing block and position in the
    /// element list. `None` for structural nodes that are not block
    /// elements (an `if` node itself, labels).
    #[must_use]
    pub fn node_block(&self, node: NodeId) -> Option<(BlockId, usize)> {
        self.node_block.get(&node).copied()
    }
}
