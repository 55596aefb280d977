mod visits;

use compact_str::CompactString;
use rustc_hash::{FxHashMap, FxHashSet};

use super::types::{
    BasicBlock, BlockId, ControlFlowGraph, Edge, EdgeId, EdgeKind, END_BLOCK, START_BLOCK,
};
use crate::tree::{FunctionBody, NodeId};

/// Why a function body cannot be lowered to a graph.
///
/// Always recoverable: the documented contract for every consumer is
/// "treat as no result for this function and skip", never abort the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unbuildable {
    /// A `goto` names a label that never appears in the body.
    #[error("goto targets undeclared label `{0}`")]
    UnresolvedLabel(CompactString),
    /// `break`/`continue` with no enclosing loop or switch.
    #[error("break or continue outside of any enclosing loop or switch")]
    JumpOutsideLoop,
    /// `break n`/`continue n` names more levels than are open.
    #[error("break or continue level {depth} exceeds the enclosing nesting depth {nesting}")]
    JumpDepthOutOfRange {
        /// Requested level.
        depth: u32,
        /// Loops/switches actually open at the jump.
        nesting: usize,
    },
}

/// One entry of the break/continue target stack.
pub(super) struct LoopFrame {
    /// Where `continue` lands: loop header, or the update block of a `for`.
    pub(super) continue_to: BlockId,
    /// Where `break` lands: the construct's successor block.
    pub(super) break_to: BlockId,
}

/// Builder for constructing a [`ControlFlowGraph`] from a function body.
///
/// A single recursive descent threads the current block (`cursor`) plus a
/// liveness flag: after `return`/`throw`/`break`/`continue`/`goto` the
/// cursor goes dead, no fall-through or reconvergence edge is emitted for
/// it, and the next statement opens a fresh block with no predecessors
/// (flagged later by `unreachable_blocks`).
pub(super) struct CfgBuilder<'a> {
    body: &'a FunctionBody,
    blocks: Vec<BasicBlock>,
    edges: Vec<Edge>,
    node_block: FxHashMap<NodeId, (BlockId, usize)>,
    cursor: BlockId,
    live: bool,
    loop_stack: Vec<LoopFrame>,
    /// Catch entry blocks of every try body the cursor is inside,
    /// outermost first.
    handler_stack: Vec<Vec<BlockId>>,
    labels: FxHashMap<CompactString, BlockId>,
    defined_labels: FxHashSet<CompactString>,
    used_labels: Vec<CompactString>,
}

impl<'a> CfgBuilder<'a> {
    pub(super) fn new(body: &'a FunctionBody) -> Self {
        // Block 0 is the synthetic start, block 1 the synthetic end.
        Self {
            body,
            blocks: vec![BasicBlock::new(), BasicBlock::new()],
            edges: Vec::new(),
            node_block: FxHashMap::default(),
            cursor: START_BLOCK,
            live: true,
            loop_stack: Vec::new(),
            handler_stack: Vec::new(),
            labels: FxHashMap::default(),
            defined_labels: FxHashSet::default(),
            used_labels: Vec::new(),
        }
    }

    pub(super) fn body(&self) -> &'a FunctionBody {
        self.body
    }

    pub(super) fn new_block(&mut self) -> BlockId {
        let id = BlockId(u32::try_from(self.blocks.len()).unwrap_or(u32::MAX));
        self.blocks.push(BasicBlock::new());
        id
    }

    pub(super) fn add_edge(
        &mut self,
        from: BlockId,
        to: BlockId,
        kind: EdgeKind,
        branch: Option<NodeId>,
    ) {
        let id = EdgeId(u32::try_from(self.edges.len()).unwrap_or(u32::MAX));
        self.edges.push(Edge {
            from,
            to,
            kind,
            branch,
        });
        self.blocks[from.index()].out_edges.push(id);
        self.blocks[to.index()].in_edges.push(id);
    }

    /// Adds a coarse exception edge unless the pair already has one.
    fn add_exception_edge(&mut self, from: BlockId, to: BlockId) {
        let exists = self.blocks[from.index()]
            .out_edges
            .iter()
            .any(|&e| self.edges[e.index()].kind == EdgeKind::Exception && self.edges[e.index()].to == to);
        if !exists {
            self.add_edge(from, to, EdgeKind::Exception, None);
        }
    }

    /// Makes the cursor a block statements can land in: a fresh block
    /// after a terminator (unreachable until something edges into it),
    /// and never the synthetic start block, which stays empty.
    pub(super) fn ensure_live(&mut self) {
        if self.live && self.cursor != START_BLOCK {
            return;
        }
        let block = self.new_block();
        if self.live {
            self.add_edge(self.cursor, block, EdgeKind::Unconditional, None);
        }
        self.cursor = block;
        self.live = true;
    }

    /// Appends a tree node to the current block. Inside a try body the
    /// containing block picks up exception edges to every active handler.
    pub(super) fn append(&mut self, node: NodeId) {
        self.ensure_live();
        let block = self.cursor;
        let pos = self.blocks[block.index()].elements.len();
        self.blocks[block.index()].elements.push(node);
        self.node_block.insert(node, (block, pos));

        if !self.handler_stack.is_empty() {
            let handlers: Vec<BlockId> = self.handler_stack.iter().flatten().copied().collect();
            for handler in handlers {
                self.add_exception_edge(block, handler);
            }
        }
    }

    pub(super) fn cursor(&self) -> BlockId {
        self.cursor
    }

    pub(super) fn is_live(&self) -> bool {
        self.live
    }

    pub(super) fn set_cursor(&mut self, block: BlockId) {
        self.cursor = block;
        self.live = true;
    }

    pub(super) fn kill_cursor(&mut self) {
        self.live = false;
    }

    pub(super) fn set_branch(&mut self, block: BlockId, node: NodeId) {
        self.blocks[block.index()].branch = Some(node);
    }

    pub(super) fn push_loop(&mut self, frame: LoopFrame) {
        self.loop_stack.push(frame);
    }

    pub(super) fn pop_loop(&mut self) {
        self.loop_stack.pop();
    }

    pub(super) fn push_handlers(&mut self, entries: Vec<BlockId>) {
        self.handler_stack.push(entries);
    }

    pub(super) fn pop_handlers(&mut self) {
        self.handler_stack.pop();
    }

    /// Resolves `break n`/`continue n` against the open frames.
    pub(super) fn jump_target(&self, depth: u32, is_continue: bool) -> Result<BlockId, Unbuildable> {
        if self.loop_stack.is_empty() {
            return Err(Unbuildable::JumpOutsideLoop);
        }
        let levels = depth.max(1) as usize;
        let Some(index) = self.loop_stack.len().checked_sub(levels) else {
            return Err(Unbuildable::JumpDepthOutOfRange {
                depth,
                nesting: self.loop_stack.len(),
            });
        };
        let frame = &self.loop_stack[index];
        Ok(if is_continue {
            frame.continue_to
        } else {
            frame.break_to
        })
    }

    /// The block a label names, created on first sight so forward and
    /// backward gotos resolve the same way.
    pub(super) fn label_block(&mut self, name: &CompactString) -> BlockId {
        if let Some(&block) = self.labels.get(name) {
            return block;
        }
        let block = self.new_block();
        self.labels.insert(name.clone(), block);
        block
    }

    pub(super) fn mark_label_defined(&mut self, name: &CompactString) {
        self.defined_labels.insert(name.clone());
    }

    pub(super) fn mark_label_used(&mut self, name: &CompactString) {
        if !self.used_labels.contains(name) {
            self.used_labels.push(name.clone());
        }
    }

    /// Runs the descent and seals the graph. All-or-nothing: any
    /// [`Unbuildable`] discards the partial graph.
    pub(super) fn build(mut self) -> Result<ControlFlowGraph, Unbuildable> {
        for &stmt in self.body.root() {
            self.visit_stmt(stmt)?;
        }
        if self.live {
            self.add_edge(self.cursor, END_BLOCK, EdgeKind::Unconditional, None);
        }
        for label in &self.used_labels {
            if !self.defined_labels.contains(label) {
                return Err(Unbuildable::UnresolvedLabel(label.clone()));
            }
        }

        debug_assert!(self.blocks[START_BLOCK.index()].in_edges.is_empty());
        debug_assert!(self.blocks[START_BLOCK.index()].elements.is_empty());
        debug_assert!(self.blocks[END_BLOCK.index()].out_edges.is_empty());

        log::debug!(
            "built cfg: {} blocks, {} edges",
            self.blocks.len(),
            self.edges.len()
        );
        Ok(ControlFlowGraph {
            blocks: self.blocks,
            edges: self.edges,
            node_block: self.node_block,
        })
    }
}
