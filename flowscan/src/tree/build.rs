//! Adapter-side construction of [`FunctionBody`] trees.
//!
//! External tree adapters (and every test in this crate) assemble bodies
//! through [`BodyBuilder`]: allocate symbols, emit nodes bottom-up, then
//! hand the top-level statement list to [`BodyBuilder::finish`], which
//! wires parent links and validates the tree shape.

use compact_str::CompactString;

use super::symbols::{Symbol, SymbolId, SymbolKind, VarOccurrence, VariableUsage};
use super::{CatchClause, FunctionBody, Node, NodeId, NodeKind, SwitchCase};

/// Incremental builder for one [`FunctionBody`].
#[derive(Debug, Default)]
pub struct BodyBuilder {
    nodes: Vec<Node>,
    symbols: Vec<Symbol>,
    params: Vec<SymbolId>,
}

impl BodyBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a symbol of the given storage class.
    pub fn symbol(&mut self, name: &str, kind: SymbolKind) -> SymbolId {
        let id = SymbolId(u32::try_from(self.symbols.len()).unwrap_or(u32::MAX));
        self.symbols.push(Symbol {
            name: CompactString::from(name),
            kind,
        });
        id
    }

    /// Declares an ordinary local.
    pub fn local(&mut self, name: &str) -> SymbolId {
        self.symbol(name, SymbolKind::Local)
    }

    /// Declares a parameter and records it in the parameter list.
    pub fn param(&mut self, name: &str) -> SymbolId {
        let id = self.symbol(name, SymbolKind::Parameter);
        self.params.push(id);
        id
    }

    fn push(&mut self, kind: NodeKind, usages: Vec<VarOccurrence>) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(Node {
            kind,
            usages,
            parent: None,
        });
        id
    }

    /// A straight-line statement or expression with explicit occurrences.
    pub fn expr(&mut self, usages: Vec<VarOccurrence>) -> NodeId {
        self.push(NodeKind::Expr, usages)
    }

    /// An expression that only reads the given symbols, e.g. a condition.
    pub fn reads(&mut self, symbols: &[SymbolId]) -> NodeId {
        let usages = symbols
            .iter()
            .map(|&s| VarOccurrence::new(s, VariableUsage::Read))
            .collect();
        self.push(NodeKind::Expr, usages)
    }

    /// An assignment `target = f(sources…)`: source reads, then the write.
    pub fn assign(&mut self, target: SymbolId, sources: &[SymbolId]) -> NodeId {
        let mut usages: Vec<VarOccurrence> = sources
            .iter()
            .map(|&s| VarOccurrence::new(s, VariableUsage::Read))
            .collect();
        usages.push(VarOccurrence::new(target, VariableUsage::Write));
        self.push(NodeKind::Expr, usages)
    }

    /// An assignment of a trivial literal (`$x = null;`); the write is
    /// flagged so liveness skips it when reporting dead stores.
    pub fn assign_trivial(&mut self, target: SymbolId) -> NodeId {
        let occ = VarOccurrence {
            symbol: target,
            usage: VariableUsage::Write,
            trivial: true,
        };
        self.push(NodeKind::Expr, vec![occ])
    }

    /// A compound assignment or increment (`$x += …`, `$x++`).
    pub fn compound(&mut self, target: SymbolId, sources: &[SymbolId]) -> NodeId {
        let mut usages: Vec<VarOccurrence> = sources
            .iter()
            .map(|&s| VarOccurrence::new(s, VariableUsage::Read))
            .collect();
        usages.push(VarOccurrence::new(target, VariableUsage::ReadWrite));
        self.push(NodeKind::Expr, usages)
    }

    /// An `if` statement.
    pub fn if_stmt(
        &mut self,
        cond: NodeId,
        then_body: Vec<NodeId>,
        else_body: Option<Vec<NodeId>>,
    ) -> NodeId {
        self.push(
            NodeKind::If {
                cond,
                then_body,
                else_body,
            },
            Vec::new(),
        )
    }

    /// A `while` loop.
    pub fn while_stmt(&mut self, cond: NodeId, body: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::While { cond, body }, Vec::new())
    }

    /// A `do … while` loop.
    pub fn do_while(&mut self, body: Vec<NodeId>, cond: NodeId) -> NodeId {
        self.push(NodeKind::DoWhile { body, cond }, Vec::new())
    }

    /// A `for` loop; any header slot may be empty.
    pub fn for_stmt(
        &mut self,
        init: Vec<NodeId>,
        cond: Option<NodeId>,
        update: Vec<NodeId>,
        body: Vec<NodeId>,
    ) -> NodeId {
        self.push(
            NodeKind::For {
                init,
                cond,
                update,
                body,
            },
            Vec::new(),
        )
    }

    /// A `foreach` loop. The node carries the subject reads followed by
    /// the key/value binding writes, in that order.
    pub fn foreach(
        &mut self,
        subject: &[SymbolId],
        bindings: &[SymbolId],
        body: Vec<NodeId>,
    ) -> NodeId {
        let mut usages: Vec<VarOccurrence> = subject
            .iter()
            .map(|&s| VarOccurrence::new(s, VariableUsage::Read))
            .collect();
        usages.extend(
            bindings
                .iter()
                .map(|&s| VarOccurrence::new(s, VariableUsage::Write)),
        );
        self.push(NodeKind::Foreach { body }, usages)
    }

    /// A `switch` statement over already-built [`SwitchCase`] arms.
    pub fn switch(&mut self, subject: NodeId, cases: Vec<SwitchCase>) -> NodeId {
        self.push(NodeKind::Switch { subject, cases }, Vec::new())
    }

    /// A `case` arm testing an expression.
    pub fn case(&mut self, test: &[SymbolId], body: Vec<NodeId>) -> SwitchCase {
        let test = self.reads(test);
        SwitchCase {
            test: Some(test),
            body,
        }
    }

    /// The `default` arm.
    #[must_use]
    pub fn default_case(body: Vec<NodeId>) -> SwitchCase {
        SwitchCase { test: None, body }
    }

    /// A catch clause, with the caught-exception binding written at
    /// handler entry when one is bound.
    pub fn catch(&mut self, binding: Option<SymbolId>, body: Vec<NodeId>) -> CatchClause {
        let param = binding.map(|sym| {
            self.push(
                NodeKind::Expr,
                vec![VarOccurrence::new(sym, VariableUsage::Write)],
            )
        });
        CatchClause { param, body }
    }

    /// A `try` statement.
    pub fn try_stmt(
        &mut self,
        body: Vec<NodeId>,
        catches: Vec<CatchClause>,
        finally: Vec<NodeId>,
    ) -> NodeId {
        self.push(
            NodeKind::Try {
                body,
                catches,
                finally,
            },
            Vec::new(),
        )
    }

    /// A `return` statement reading the given symbols.
    pub fn ret(&mut self, reads: &[SymbolId]) -> NodeId {
        let usages = reads
            .iter()
            .map(|&s| VarOccurrence::new(s, VariableUsage::Read))
            .collect();
        self.push(NodeKind::Return, usages)
    }

    /// A `throw` statement reading the given symbols.
    pub fn throw(&mut self, reads: &[SymbolId]) -> NodeId {
        let usages = reads
            .iter()
            .map(|&s| VarOccurrence::new(s, VariableUsage::Read))
            .collect();
        self.push(NodeKind::Throw, usages)
    }

    /// `break;` / `break n;`
    pub fn brk(&mut self, depth: u32) -> NodeId {
        self.push(NodeKind::Break { depth }, Vec::new())
    }

    /// `continue;` / `continue n;`
    pub fn cont(&mut self, depth: u32) -> NodeId {
        self.push(NodeKind::Continue { depth }, Vec::new())
    }

    /// `goto label;`
    pub fn goto(&mut self, label: &str) -> NodeId {
        self.push(
            NodeKind::Goto {
                label: CompactString::from(label),
            },
            Vec::new(),
        )
    }

    /// A jump target label.
    pub fn label(&mut self, name: &str) -> NodeId {
        self.push(
            NodeKind::Label {
                name: CompactString::from(name),
            },
            Vec::new(),
        )
    }

    /// Seals the tree: wires parent links from the top-level statement
    /// list and validates (debug builds) that no node is used twice and
    /// label names are unique.
    #[must_use]
    pub fn finish(mut self, root: Vec<NodeId>) -> FunctionBody {
        let mut placed = vec![false; self.nodes.len()];
        let mut stack: Vec<(NodeId, Option<NodeId>)> =
            root.iter().rev().map(|&id| (id, None)).collect();

        while let Some((id, parent)) = stack.pop() {
            debug_assert!(
                !placed[id.index()],
                "tree node used in more than one position"
            );
            placed[id.index()] = true;
            self.nodes[id.index()].parent = parent;

            // Children are pushed with this node as parent; the clone of
            // the kind keeps the borrow checker out of the arena while we
            // mutate parent links.
            let kind = self.nodes[id.index()].kind.clone();
            let child = |stack: &mut Vec<(NodeId, Option<NodeId>)>, c: NodeId| {
                stack.push((c, Some(id)));
            };
            match &kind {
                NodeKind::Expr
                | NodeKind::Return
                | NodeKind::Throw
                | NodeKind::Break { .. }
                | NodeKind::Continue { .. }
                | NodeKind::Goto { .. }
                | NodeKind::Label { .. } => {}
                NodeKind::If {
                    cond,
                    then_body,
                    else_body,
                } => {
                    child(&mut stack, *cond);
                    for &c in then_body.iter().chain(else_body.iter().flatten()) {
                        child(&mut stack, c);
                    }
                }
                NodeKind::While { cond, body } | NodeKind::DoWhile { body, cond } => {
                    child(&mut stack, *cond);
                    for &c in body {
                        child(&mut stack, c);
                    }
                }
                NodeKind::For {
                    init,
                    cond,
                    update,
                    body,
                } => {
                    for &c in init.iter().chain(cond.iter()).chain(update).chain(body) {
                        child(&mut stack, c);
                    }
                }
                NodeKind::Foreach { body } => {
                    for &c in body {
                        child(&mut stack, c);
                    }
                }
                NodeKind::Switch { subject, cases } => {
                    child(&mut stack, *subject);
                    for case in cases {
                        for &c in case.test.iter().chain(&case.body) {
                            child(&mut stack, c);
                        }
                    }
                }
                NodeKind::Try {
                    body,
                    catches,
                    finally,
                } => {
                    for &c in body {
                        child(&mut stack, c);
                    }
                    for clause in catches {
                        for &c in clause.param.iter().chain(&clause.body) {
                            child(&mut stack, c);
                        }
                    }
                    for &c in finally {
                        child(&mut stack, c);
                    }
                }
            }
        }

        #[cfg(debug_assertions)]
        {
            let mut labels = rustc_hash::FxHashSet::default();
            for node in &self.nodes {
                if let NodeKind::Label { name } = &node.kind {
                    debug_assert!(labels.insert(name.clone()), "duplicate label `{name}`");
                }
            }
        }

        FunctionBody {
            nodes: self.nodes,
            symbols: self.symbols,
            params: self.params,
            root,
        }
    }
}
