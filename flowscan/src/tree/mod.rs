//! The function-body tree the engine consumes.
//!
//! The parser and symbol resolver are external collaborators: they adapt
//! their AST into this closed node model once per function body, and the
//! engine never parses text or resolves names itself. The model is an
//! arena of nodes indexed by [`NodeId`], so control-flow cycles in the
//! graph built on top of it never create ownership cycles.
//!
//! # Design Principles
//!
//! - **One tree per function**: never cross function boundaries
//! - **Closed node kinds**: an enum, matched exhaustively by the CFG builder
//! - **Occurrences on nodes**: each node carries its resolved symbol
//!   occurrences in evaluation order; the analyses never re-derive them
//! - **Read-only after `finish()`**: analyses share the tree immutably

mod build;
mod symbols;

pub use build::BodyBuilder;
pub use symbols::{Symbol, SymbolId, SymbolKind, VarOccurrence, VariableUsage};

use compact_str::CompactString;

/// Index of one node in a [`FunctionBody`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One `case`/`default` arm of a switch statement.
#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// Case test expression; `None` for the `default` arm.
    pub test: Option<NodeId>,
    /// Statements of the arm. Without a jump they fall through to the
    /// next arm, mirroring source semantics.
    pub body: Vec<NodeId>,
}

/// One catch clause of a try statement.
#[derive(Debug, Clone)]
pub struct CatchClause {
    /// Synthetic node writing the caught-exception binding, if the clause
    /// binds one. Placed at handler entry by the CFG builder.
    pub param: Option<NodeId>,
    /// Handler body.
    pub body: Vec<NodeId>,
}

/// Discriminated statement/expression kinds, the closed set the CFG
/// builder lowers. Conditions and subjects are ordinary [`NodeKind::Expr`]
/// nodes carrying their own occurrences.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Straight-line statement or expression: assignments, calls, `echo`,
    /// declarations, and the condition/subject expressions of the
    /// structured constructs.
    Expr,
    /// Two-way branch. `else_body: None` means the false edge goes
    /// straight to the join block.
    If {
        /// Condition expression node.
        cond: NodeId,
        /// Then-branch statements.
        then_body: Vec<NodeId>,
        /// Else-branch statements, if present.
        else_body: Option<Vec<NodeId>>,
    },
    /// Top-tested loop.
    While {
        /// Condition expression node.
        cond: NodeId,
        /// Loop body.
        body: Vec<NodeId>,
    },
    /// Bottom-tested loop; the body runs before the first test.
    DoWhile {
        /// Loop body.
        body: Vec<NodeId>,
        /// Condition expression node, evaluated after the body.
        cond: NodeId,
    },
    /// Counted loop. All three header slots may be empty.
    For {
        /// Initializer expressions, run once before the header.
        init: Vec<NodeId>,
        /// Condition expression; `None` loops unconditionally.
        cond: Option<NodeId>,
        /// Update expressions, run between iterations.
        update: Vec<NodeId>,
        /// Loop body.
        body: Vec<NodeId>,
    },
    /// Iteration over a subject expression. The foreach node itself is the
    /// loop header element: its occurrences are the subject reads followed
    /// by the key/value binding writes.
    Foreach {
        /// Loop body.
        body: Vec<NodeId>,
    },
    /// Multi-way branch with fallthrough between arms.
    Switch {
        /// Subject expression node.
        subject: NodeId,
        /// Arms in source order.
        cases: Vec<SwitchCase>,
    },
    /// Try statement with coarse exception edges into its handlers.
    Try {
        /// Protected statements.
        body: Vec<NodeId>,
        /// Handlers in source order.
        catches: Vec<CatchClause>,
        /// Finally statements; empty when absent.
        finally: Vec<NodeId>,
    },
    /// Function exit. Occurrences on the node are the returned reads.
    Return,
    /// Raises an exception. Occurrences on the node are the operand reads.
    Throw,
    /// Leaves `depth` enclosing loops (source `break n;`, `depth >= 1`).
    Break {
        /// Number of loop levels to leave.
        depth: u32,
    },
    /// Restarts the `depth`-th enclosing loop.
    Continue {
        /// Number of loop levels to skip out of.
        depth: u32,
    },
    /// Unstructured jump to a named label in the same body.
    Goto {
        /// Target label name.
        label: CompactString,
    },
    /// Jump target.
    Label {
        /// Label name, unique per body.
        name: CompactString,
    },
}

/// One node of the function-body tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// Structural kind and children.
    pub kind: NodeKind,
    /// Resolved symbol occurrences in evaluation order.
    pub usages: Vec<VarOccurrence>,
    /// Enclosing node; `None` for top-level statements. Filled by
    /// [`BodyBuilder::finish`].
    pub parent: Option<NodeId>,
}

/// One function or method body: node arena, symbol table, parameters.
///
/// Built once by the adapter through [`BodyBuilder`], then shared
/// immutably by the CFG builder and every analysis run over it.
#[derive(Debug)]
pub struct FunctionBody {
    nodes: Vec<Node>,
    symbols: Vec<Symbol>,
    params: Vec<SymbolId>,
    root: Vec<NodeId>,
}

impl FunctionBody {
    /// The node behind an id.
    #[inline]
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// The symbol behind an id.
    #[inline]
    #[must_use]
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    /// Number of symbols in the table. Bounds the lattice height of the
    /// set-based analyses.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// All symbol ids in table order.
    pub fn symbol_ids(&self) -> impl Iterator<Item = SymbolId> {
        // The builder allocates ids from a u32 counter, so len always fits.
        (0..u32::try_from(self.symbols.len()).unwrap_or(u32::MAX)).map(SymbolId)
    }

    /// Declared parameters, in order.
    #[must_use]
    pub fn params(&self) -> &[SymbolId] {
        &self.params
    }

    /// Top-level statements of the body.
    #[must_use]
    pub fn root(&self) -> &[NodeId] {
        &self.root
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes with their ids, in arena order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(u32::try_from(i).unwrap_or(u32::MAX)), n))
    }

    /// True when `node` is `ancestor` or sits anywhere below it. Walks
    /// parent links, so it is O(depth) and allocation-free.
    #[must_use]
    pub fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.node(id).parent;
        }
        false
    }
}
