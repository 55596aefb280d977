//! The loop one-iteration query as a rule would drive it: locate the
//! loop header, take its body-entry successor, ask whether control can
//! come back around.

use flowscan::cfg::{BlockId, ControlFlowGraph, EdgeKind};
use flowscan::tree::{BodyBuilder, FunctionBody, NodeId};

/// Header and body-entry blocks of the loop branching on `cond`.
fn loop_blocks(cfg: &ControlFlowGraph, cond: NodeId) -> (BlockId, BlockId) {
    let header = cfg.node_block(cond).expect("condition is an element").0;
    let entry = cfg
        .successors(header)
        .find(|e| e.kind == EdgeKind::True)
        .expect("loop has a body edge")
        .to;
    (header, entry)
}

fn build(b: BodyBuilder, root: Vec<NodeId>) -> (FunctionBody, ControlFlowGraph) {
    let body = b.finish(root);
    let cfg = ControlFlowGraph::build(&body).expect("buildable");
    (body, cfg)
}

#[test]
fn test_plain_while_can_iterate_again() {
    let mut b = BodyBuilder::new();
    let c = b.param("c");
    let x = b.local("x");
    let cond = b.reads(&[c]);
    let work = b.assign(x, &[]);
    let w = b.while_stmt(cond, vec![work]);
    let (body, cfg) = build(b, vec![w]);

    let (header, entry) = loop_blocks(&cfg, cond);
    assert!(cfg.can_return_to_header(&body, w, header, entry));
}

#[test]
fn test_conditional_break_still_allows_iteration() {
    // while ($c) { if ($d) { break; } }
    let mut b = BodyBuilder::new();
    let c = b.param("c");
    let d = b.param("d");
    let cond = b.reads(&[c]);
    let inner_cond = b.reads(&[d]);
    let brk = b.brk(1);
    let if_node = b.if_stmt(inner_cond, vec![brk], None);
    let w = b.while_stmt(cond, vec![if_node]);
    let (body, cfg) = build(b, vec![w]);

    let (header, entry) = loop_blocks(&cfg, cond);
    assert!(
        cfg.can_return_to_header(&body, w, header, entry),
        "the no-break path loops back"
    );
}

#[test]
fn test_every_path_jumping_out_means_one_iteration() {
    // while ($c) { if ($d) { break; } else { return; } }
    let mut b = BodyBuilder::new();
    let c = b.param("c");
    let d = b.param("d");
    let cond = b.reads(&[c]);
    let inner_cond = b.reads(&[d]);
    let brk = b.brk(1);
    let ret = b.ret(&[]);
    let if_node = b.if_stmt(inner_cond, vec![brk], Some(vec![ret]));
    let w = b.while_stmt(cond, vec![if_node]);
    let (body, cfg) = build(b, vec![w]);

    let (header, entry) = loop_blocks(&cfg, cond);
    assert!(!cfg.can_return_to_header(&body, w, header, entry));
}

#[test]
fn test_unconditional_for_loop_iterates() {
    // for (;; $i++) { $x = 1; }
    let mut b = BodyBuilder::new();
    let i = b.local("i");
    let x = b.local("x");
    let update = b.compound(i, &[]);
    let work = b.assign(x, &[]);
    let f = b.for_stmt(vec![], None, vec![update], vec![work]);
    let (body, cfg) = build(b, vec![f]);

    // No condition, so the header is the body block's eventual target.
    let work_block = cfg.node_block(work).expect("body placed").0;
    let update_block = cfg.node_block(update).expect("update placed").0;
    let header = cfg
        .successors(update_block)
        .next()
        .expect("update re-enters the loop")
        .to;
    assert!(cfg.can_return_to_header(&body, f, header, work_block));
}

#[test]
fn test_counted_for_loop_iterates_through_update() {
    // for ($i = 0; $i < $n; $i++) { $x = $i; }
    let mut b = BodyBuilder::new();
    let i = b.local("i");
    let n = b.param("n");
    let x = b.local("x");
    let init = b.assign(i, &[]);
    let cond = b.reads(&[i, n]);
    let update = b.compound(i, &[]);
    let work = b.assign(x, &[i]);
    let f = b.for_stmt(vec![init], Some(cond), vec![update], vec![work]);
    let (body, cfg) = build(b, vec![f]);

    let (header, entry) = loop_blocks(&cfg, cond);
    assert!(cfg.can_return_to_header(&body, f, header, entry));
}
