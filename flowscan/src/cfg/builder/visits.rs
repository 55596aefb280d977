use super::{CfgBuilder, LoopFrame, Unbuildable};
use crate::cfg::types::{BlockId, EdgeKind, END_BLOCK};
use crate::tree::{CatchClause, NodeId, NodeKind, SwitchCase};

impl CfgBuilder<'_> {
    pub(super) fn visit_stmt(&mut self, id: NodeId) -> Result<(), Unbuildable> {
        let body = self.body();
        match &body.node(id).kind {
            NodeKind::Expr => {
                self.append(id);
                Ok(())
            }
            NodeKind::If {
                cond,
                then_body,
                else_body,
            } => self.visit_if(*cond, then_body, else_body.as_deref()),
            NodeKind::While { cond, body } => self.visit_while(*cond, body),
            NodeKind::DoWhile { body, cond } => self.visit_do_while(body, *cond),
            NodeKind::For {
                init,
                cond,
                update,
                body,
            } => self.visit_for(init, *cond, update, body),
            NodeKind::Foreach { body } => self.visit_foreach(id, body),
            NodeKind::Switch { subject, cases } => self.visit_switch(*subject, cases),
            NodeKind::Try {
                body,
                catches,
                finally,
            } => self.visit_try(body, catches, finally),
            NodeKind::Return | NodeKind::Throw => {
                self.append(id);
                self.add_edge(self.cursor(), END_BLOCK, EdgeKind::Unconditional, None);
                self.kill_cursor();
                Ok(())
            }
            NodeKind::Break { depth } => {
                self.append(id);
                let target = self.jump_target(*depth, false)?;
                self.add_edge(self.cursor(), target, EdgeKind::Unconditional, None);
                self.kill_cursor();
                Ok(())
            }
            NodeKind::Continue { depth } => {
                self.append(id);
                let target = self.jump_target(*depth, true)?;
                self.add_edge(self.cursor(), target, EdgeKind::Unconditional, None);
                self.kill_cursor();
                Ok(())
            }
            NodeKind::Goto { label } => {
                self.append(id);
                let target = self.label_block(label);
                self.mark_label_used(label);
                self.add_edge(self.cursor(), target, EdgeKind::Unconditional, None);
                self.kill_cursor();
                Ok(())
            }
            NodeKind::Label { name } => {
                let target = self.label_block(name);
                self.mark_label_defined(name);
                if self.is_live() {
                    self.add_edge(self.cursor(), target, EdgeKind::Unconditional, None);
                }
                self.set_cursor(target);
                Ok(())
            }
        }
    }

    fn visit_body(&mut self, stmts: &[NodeId]) -> Result<(), Unbuildable> {
        for &stmt in stmts {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    /// The condition ends the current block; branch exits that went dead
    /// contribute no reconvergence edge.
    fn visit_if(
        &mut self,
        cond: NodeId,
        then_body: &[NodeId],
        else_body: Option<&[NodeId]>,
    ) -> Result<(), Unbuildable> {
        self.append(cond);
        let cond_block = self.cursor();
        self.set_branch(cond_block, cond);

        let then_entry = self.new_block();
        self.add_edge(cond_block, then_entry, EdgeKind::True, Some(cond));
        self.set_cursor(then_entry);
        self.visit_body(then_body)?;
        let then_exit = (self.cursor(), self.is_live());

        if let Some(else_stmts) = else_body {
            let else_entry = self.new_block();
            self.add_edge(cond_block, else_entry, EdgeKind::False, Some(cond));
            self.set_cursor(else_entry);
            self.visit_body(else_stmts)?;
            let else_exit = (self.cursor(), self.is_live());

            if then_exit.1 || else_exit.1 {
                let join = self.new_block();
                if then_exit.1 {
                    self.add_edge(then_exit.0, join, EdgeKind::Unconditional, None);
                }
                if else_exit.1 {
                    self.add_edge(else_exit.0, join, EdgeKind::Unconditional, None);
                }
                self.set_cursor(join);
            } else {
                self.kill_cursor();
            }
        } else {
            let join = self.new_block();
            self.add_edge(cond_block, join, EdgeKind::False, Some(cond));
            if then_exit.1 {
                self.add_edge(then_exit.0, join, EdgeKind::Unconditional, None);
            }
            self.set_cursor(join);
        }
        Ok(())
    }

    /// The header gets its own block so the back edge re-enters at the
    /// condition, not at whatever straight-line code precedes the loop.
    fn loop_header(&mut self) -> BlockId {
        let header = self.new_block();
        if self.is_live() {
            self.add_edge(self.cursor(), header, EdgeKind::Unconditional, None);
        }
        self.set_cursor(header);
        header
    }

    fn visit_while(&mut self, cond: NodeId, body: &[NodeId]) -> Result<(), Unbuildable> {
        let header = self.loop_header();
        self.append(cond);
        self.set_branch(header, cond);

        let exit = self.new_block();
        let body_entry = self.new_block();
        self.add_edge(header, body_entry, EdgeKind::True, Some(cond));
        self.add_edge(header, exit, EdgeKind::False, Some(cond));

        self.push_loop(LoopFrame {
            continue_to: header,
            break_to: exit,
        });
        self.set_cursor(body_entry);
        self.visit_body(body)?;
        if self.is_live() {
            self.add_edge(self.cursor(), header, EdgeKind::Unconditional, None);
        }
        self.pop_loop();

        self.set_cursor(exit);
        Ok(())
    }

    fn visit_do_while(&mut self, body: &[NodeId], cond: NodeId) -> Result<(), Unbuildable> {
        let body_entry = self.new_block();
        if self.is_live() {
            self.add_edge(self.cursor(), body_entry, EdgeKind::Unconditional, None);
        }
        // The condition block is the continue target and exists before the
        // body is lowered.
        let cond_block = self.new_block();
        let exit = self.new_block();

        self.push_loop(LoopFrame {
            continue_to: cond_block,
            break_to: exit,
        });
        self.set_cursor(body_entry);
        self.visit_body(body)?;
        if self.is_live() {
            self.add_edge(self.cursor(), cond_block, EdgeKind::Unconditional, None);
        }
        self.pop_loop();

        self.set_cursor(cond_block);
        self.append(cond);
        self.set_branch(cond_block, cond);
        self.add_edge(cond_block, body_entry, EdgeKind::True, Some(cond));
        self.add_edge(cond_block, exit, EdgeKind::False, Some(cond));

        self.set_cursor(exit);
        Ok(())
    }

    fn visit_for(
        &mut self,
        init: &[NodeId],
        cond: Option<NodeId>,
        update: &[NodeId],
        body: &[NodeId],
    ) -> Result<(), Unbuildable> {
        self.visit_body(init)?;

        let header = self.loop_header();
        let exit = self.new_block();
        let body_entry = self.new_block();
        if let Some(cond) = cond {
            self.append(cond);
            self.set_branch(header, cond);
            self.add_edge(header, body_entry, EdgeKind::True, Some(cond));
            self.add_edge(header, exit, EdgeKind::False, Some(cond));
        } else {
            // No condition: the only way past the loop is a jump.
            self.add_edge(header, body_entry, EdgeKind::Unconditional, None);
        }

        let continue_to = if update.is_empty() {
            header
        } else {
            self.new_block()
        };
        self.push_loop(LoopFrame {
            continue_to,
            break_to: exit,
        });
        self.set_cursor(body_entry);
        self.visit_body(body)?;
        if self.is_live() {
            self.add_edge(self.cursor(), continue_to, EdgeKind::Unconditional, None);
        }
        self.pop_loop();

        if !update.is_empty() {
            self.set_cursor(continue_to);
            self.visit_body(update)?;
            self.add_edge(self.cursor(), header, EdgeKind::Unconditional, None);
        }

        self.set_cursor(exit);
        Ok(())
    }

    /// The foreach node itself is the header element: subject reads, then
    /// the binding writes.
    fn visit_foreach(&mut self, node: NodeId, body: &[NodeId]) -> Result<(), Unbuildable> {
        let header = self.loop_header();
        self.append(node);
        self.set_branch(header, node);

        let exit = self.new_block();
        let body_entry = self.new_block();
        self.add_edge(header, body_entry, EdgeKind::True, Some(node));
        self.add_edge(header, exit, EdgeKind::False, Some(node));

        self.push_loop(LoopFrame {
            continue_to: header,
            break_to: exit,
        });
        self.set_cursor(body_entry);
        self.visit_body(body)?;
        if self.is_live() {
            self.add_edge(self.cursor(), header, EdgeKind::Unconditional, None);
        }
        self.pop_loop();

        self.set_cursor(exit);
        Ok(())
    }

    /// Subject and case tests share the header block; one labeled edge per
    /// case entry; arms without a jump fall through to the next arm.
    fn visit_switch(&mut self, subject: NodeId, cases: &[SwitchCase]) -> Result<(), Unbuildable> {
        self.append(subject);
        for case in cases {
            if let Some(test) = case.test {
                self.append(test);
            }
        }
        let header = self.cursor();
        self.set_branch(header, subject);

        let exit = self.new_block();
        let entries: Vec<BlockId> = cases.iter().map(|_| self.new_block()).collect();

        let mut has_default = false;
        for (case, &entry) in cases.iter().zip(&entries) {
            match case.test {
                Some(test) => self.add_edge(header, entry, EdgeKind::True, Some(test)),
                None => {
                    has_default = true;
                    self.add_edge(header, entry, EdgeKind::False, Some(subject));
                }
            }
        }
        if !has_default {
            self.add_edge(header, exit, EdgeKind::False, Some(subject));
        }

        // `break` leaves the switch; a `continue` targeting the switch
        // level behaves the same way in the source language.
        self.push_loop(LoopFrame {
            continue_to: exit,
            break_to: exit,
        });
        for (i, (case, &entry)) in cases.iter().zip(&entries).enumerate() {
            self.set_cursor(entry);
            self.visit_body(&case.body)?;
            if self.is_live() {
                let next = entries.get(i + 1).copied().unwrap_or(exit);
                self.add_edge(self.cursor(), next, EdgeKind::Unconditional, None);
            }
        }
        self.pop_loop();

        self.set_cursor(exit);
        Ok(())
    }

    /// Coarse exception flow: every block that receives an element while
    /// the try body is open picks up an `Exception` edge to every active
    /// catch entry, nested handlers included.
    fn visit_try(
        &mut self,
        body: &[NodeId],
        catches: &[CatchClause],
        finally: &[NodeId],
    ) -> Result<(), Unbuildable> {
        let try_entry = self.new_block();
        if self.is_live() {
            self.add_edge(self.cursor(), try_entry, EdgeKind::Unconditional, None);
        }
        self.set_cursor(try_entry);

        let catch_entries: Vec<BlockId> = catches.iter().map(|_| self.new_block()).collect();
        self.push_handlers(catch_entries.clone());
        self.visit_body(body)?;
        let try_exit = (self.cursor(), self.is_live());
        self.pop_handlers();

        let mut exits: Vec<BlockId> = Vec::new();
        if try_exit.1 {
            exits.push(try_exit.0);
        }
        for (clause, &entry) in catches.iter().zip(&catch_entries) {
            self.set_cursor(entry);
            if let Some(param) = clause.param {
                self.append(param);
            }
            self.visit_body(&clause.body)?;
            if self.is_live() {
                exits.push(self.cursor());
            }
        }

        if exits.is_empty() {
            self.kill_cursor();
        } else {
            let merge = self.new_block();
            for block in exits {
                self.add_edge(block, merge, EdgeKind::Unconditional, None);
            }
            self.set_cursor(merge);
        }
        // Coarse placement: finally runs on the merged continuation.
        self.visit_body(finally)
    }
}
