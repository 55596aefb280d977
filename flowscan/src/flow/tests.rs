use super::*;
use crate::cfg::{BasicBlock, ControlFlowGraph};
use crate::tree::{BodyBuilder, FunctionBody, SymbolId, SymbolKind};

fn build(b: BodyBuilder, root: Vec<crate::tree::NodeId>) -> (FunctionBody, ControlFlowGraph) {
    let body = b.finish(root);
    let cfg = ControlFlowGraph::build(&body).expect("buildable");
    (body, cfg)
}

fn run_init(cfg: &ControlFlowGraph, body: &FunctionBody) -> DefiniteInit {
    let seed = DefiniteInit::default_seed(body);
    DefiniteInit::run(cfg, body, &seed).expect("converges")
}

fn run_liveness(cfg: &ControlFlowGraph, body: &FunctionBody) -> Liveness {
    Liveness::run(cfg, body, &SymbolSet::default()).expect("converges")
}

fn set(ids: &[SymbolId]) -> SymbolSet {
    ids.iter().copied().collect()
}

// --- definite initialization -------------------------------------------

#[test]
fn test_half_initializing_if_reports_use_before_init() {
    // if ($x) { $y = 1; } echo $y;
    let mut b = BodyBuilder::new();
    let x = b.param("x");
    let y = b.local("y");
    let cond = b.reads(&[x]);
    let assign = b.assign(y, &[]);
    let if_node = b.if_stmt(cond, vec![assign], None);
    let echo = b.reads(&[y]);
    let (body, cfg) = build(b, vec![if_node, echo]);

    let init = run_init(&cfg, &body);
    assert_eq!(init.findings(), &[UseBeforeInit { node: echo, symbol: y }][..]);
}

#[test]
fn test_both_branches_assigning_is_initialized() {
    let mut b = BodyBuilder::new();
    let x = b.param("x");
    let y = b.local("y");
    let cond = b.reads(&[x]);
    let a1 = b.assign(y, &[]);
    let a2 = b.assign(y, &[]);
    let if_node = b.if_stmt(cond, vec![a1], Some(vec![a2]));
    let echo = b.reads(&[y]);
    let (body, cfg) = build(b, vec![if_node, echo]);

    let init = run_init(&cfg, &body);
    assert!(init.findings().is_empty());
}

#[test]
fn test_while_body_may_not_run() {
    // while ($c) { $s = 1; } echo $s;
    let mut b = BodyBuilder::new();
    let c = b.param("c");
    let s = b.local("s");
    let cond = b.reads(&[c]);
    let assign = b.assign(s, &[]);
    let w = b.while_stmt(cond, vec![assign]);
    let echo = b.reads(&[s]);
    let (body, cfg) = build(b, vec![w, echo]);

    let init = run_init(&cfg, &body);
    assert_eq!(init.findings(), &[UseBeforeInit { node: echo, symbol: s }][..]);
}

#[test]
fn test_do_while_body_always_runs() {
    // do { $s = 1; } while ($c); echo $s;
    let mut b = BodyBuilder::new();
    let c = b.param("c");
    let s = b.local("s");
    let assign = b.assign(s, &[]);
    let cond = b.reads(&[c]);
    let dw = b.do_while(vec![assign], cond);
    let echo = b.reads(&[s]);
    let (body, cfg) = build(b, vec![dw, echo]);

    let init = run_init(&cfg, &body);
    assert!(init.findings().is_empty());
}

#[test]
fn test_static_read_is_fine_when_later_initialized() {
    // static $n; echo $n; $n = $n + 1;
    let mut b = BodyBuilder::new();
    let n = b.symbol("n", SymbolKind::Static);
    let echo = b.reads(&[n]);
    let bump = b.compound(n, &[]);
    let (body, cfg) = build(b, vec![echo, bump]);

    let init = run_init(&cfg, &body);
    assert!(init.findings().is_empty(), "initialized on every path through the function");
}

#[test]
fn test_static_never_initialized_is_reported() {
    let mut b = BodyBuilder::new();
    let n = b.symbol("n", SymbolKind::Static);
    let echo = b.reads(&[n]);
    let (body, cfg) = build(b, vec![echo]);

    let init = run_init(&cfg, &body);
    assert_eq!(init.findings(), &[UseBeforeInit { node: echo, symbol: n }][..]);
}

#[test]
fn test_symbols_compare_by_identity_not_name() {
    let mut b = BodyBuilder::new();
    let x1 = b.local("x");
    let x2 = b.local("x");
    let assign = b.assign(x1, &[]);
    let echo = b.reads(&[x2]);
    let (body, cfg) = build(b, vec![assign, echo]);

    let init = run_init(&cfg, &body);
    assert_eq!(init.findings(), &[UseBeforeInit { node: echo, symbol: x2 }][..]);
}

#[test]
fn test_default_seed_covers_bindings() {
    let mut b = BodyBuilder::new();
    let p = b.param("p");
    let arr = b.param("arr");
    let k = b.local("k");
    let v = b.local("v");
    let e = b.local("e");
    let g = b.symbol("g", SymbolKind::Global);
    let st = b.symbol("st", SymbolKind::Static);
    let plain = b.local("plain");

    let use_v = b.reads(&[v]);
    let fe = b.foreach(&[arr], &[k, v], vec![use_v]);
    let catch_body = b.reads(&[e]);
    let clause = b.catch(Some(e), vec![catch_body]);
    let tr = b.try_stmt(vec![], vec![clause], vec![]);
    let (body, _cfg) = build(b, vec![fe, tr]);

    let seed = DefiniteInit::default_seed(&body);
    for sym in [p, arr, k, v, e, g] {
        assert!(seed.contains(&sym), "seed misses {sym:?}");
    }
    assert!(!seed.contains(&st));
    assert!(!seed.contains(&plain));
}

#[test]
fn test_catch_handler_sees_partial_try_state() {
    // try { $x = f(); } catch ($e) { $x = 2; } return $x;
    let mut b = BodyBuilder::new();
    let x = b.local("x");
    let e = b.local("e");
    let assign = b.assign(x, &[]);
    let recover = b.assign(x, &[]);
    let clause = b.catch(Some(e), vec![recover]);
    let tr = b.try_stmt(vec![assign], vec![clause], vec![]);
    let ret = b.ret(&[x]);
    let (body, cfg) = build(b, vec![tr, ret]);

    let init = run_init(&cfg, &body);
    assert!(init.findings().is_empty());
}

#[test]
fn test_state_accessors_replay_inside_block() {
    // $a = 1; $b = $a; return $b;
    let mut b = BodyBuilder::new();
    let a = b.local("a");
    let v = b.local("v");
    let n0 = b.assign(a, &[]);
    let n1 = b.assign(v, &[a]);
    let n2 = b.ret(&[v]);
    let (body, cfg) = build(b, vec![n0, n1, n2]);

    let init = run_init(&cfg, &body);
    assert_eq!(init.state_before(&cfg, &body, n1), Some(set(&[a])));
    assert_eq!(init.state_after(&cfg, &body, n1), Some(set(&[a, v])));

    let live = run_liveness(&cfg, &body);
    assert_eq!(live.live_before(&cfg, &body, n1), Some(set(&[a])));
    assert_eq!(live.live_after(&cfg, &body, n1), Some(set(&[v])));
}

#[test]
fn test_state_accessors_reject_structural_nodes() {
    let mut b = BodyBuilder::new();
    let x = b.param("x");
    let y = b.local("y");
    let cond = b.reads(&[x]);
    let assign = b.assign(y, &[]);
    let if_node = b.if_stmt(cond, vec![assign], None);
    let (body, cfg) = build(b, vec![if_node]);

    let init = run_init(&cfg, &body);
    // The `if` node itself is structural, never a block element.
    assert!(init.state_before(&cfg, &body, if_node).is_none());
    assert!(init.state_after(&cfg, &body, cond).is_some());
}

// --- liveness -----------------------------------------------------------

#[test]
fn test_conditionally_overwritten_store_is_not_dead() {
    // $a = 1; if ($cond) { $a = 2; } return $a;
    // The false path reads the first value at return.
    let mut b = BodyBuilder::new();
    let a = b.local("a");
    let c = b.param("cond");
    let first = b.assign(a, &[]);
    let cond = b.reads(&[c]);
    let second = b.assign(a, &[]);
    let if_node = b.if_stmt(cond, vec![second], None);
    let ret = b.ret(&[a]);
    let (body, cfg) = build(b, vec![first, if_node, ret]);

    let live = run_liveness(&cfg, &body);
    assert!(live.dead_stores().is_empty());
}

#[test]
fn test_unconditional_overwrite_is_a_dead_store() {
    // $a = 1; $a = 2; return $a;
    let mut b = BodyBuilder::new();
    let a = b.local("a");
    let first = b.assign(a, &[]);
    let second = b.assign(a, &[]);
    let ret = b.ret(&[a]);
    let (body, cfg) = build(b, vec![first, second, ret]);

    let live = run_liveness(&cfg, &body);
    assert_eq!(live.dead_stores(), &[DeadStore { node: first, symbol: a }][..]);
}

#[test]
fn test_store_never_read_is_dead_unless_escaping() {
    let mut b = BodyBuilder::new();
    let x = b.local("x");
    let n0 = b.assign(x, &[]);
    let (body, cfg) = build(b, vec![n0]);

    let live = run_liveness(&cfg, &body);
    assert_eq!(live.dead_stores(), &[DeadStore { node: n0, symbol: x }][..]);

    // A closure capture (escape set) keeps the value observable.
    let escaping = Liveness::run(&cfg, &body, &set(&[x])).expect("converges");
    assert!(escaping.dead_stores().is_empty());
}

#[test]
fn test_trivial_and_outliving_writes_are_not_reported() {
    let mut b = BodyBuilder::new();
    let x = b.local("x");
    let g = b.symbol("g", SymbolKind::Global);
    let st = b.symbol("st", SymbolKind::Static);
    let trivial = b.assign_trivial(x);
    let to_global = b.assign(g, &[]);
    let to_static = b.assign(st, &[]);
    let (body, cfg) = build(b, vec![trivial, to_global, to_static]);

    let live = run_liveness(&cfg, &body);
    assert!(live.dead_stores().is_empty());
}

#[test]
fn test_compound_assignment_reads_its_own_store() {
    // $x = 5; $x += 1;  The increment consumes the first store, and a
    // read-write occurrence never reports as a dead store itself.
    let mut b = BodyBuilder::new();
    let x = b.local("x");
    let first = b.assign(x, &[]);
    let bump = b.compound(x, &[]);
    let (body, cfg) = build(b, vec![first, bump]);

    let live = run_liveness(&cfg, &body);
    assert!(live.dead_stores().is_empty());
}

#[test]
fn test_switch_fallthrough_keeps_arm_store_alive() {
    // switch ($k) { case 1: $a = 1; case 2: $v = $a; break; default: $v = 2; }
    // return $v;
    let mut b = BodyBuilder::new();
    let k = b.param("k");
    let a = b.local("a");
    let v = b.local("v");
    let subj = b.reads(&[k]);
    let na = b.assign(a, &[]);
    let c1 = b.case(&[], vec![na]);
    let nv = b.assign(v, &[a]);
    let brk = b.brk(1);
    let c2 = b.case(&[], vec![nv, brk]);
    let nd = b.assign(v, &[]);
    let def = BodyBuilder::default_case(vec![nd]);
    let sw = b.switch(subj, vec![c1, c2, def]);
    let ret = b.ret(&[v]);
    let (body, cfg) = build(b, vec![sw, ret]);

    let live = run_liveness(&cfg, &body);
    assert!(live.dead_stores().is_empty(), "the fallthrough arm reads $a");

    let init = run_init(&cfg, &body);
    // $a reaches the read through the fallthrough edge; reading it after
    // the switch would not be definite, but inside arm 2 it is only
    // guaranteed when entered by fallthrough, so the case-entry join
    // drops it and flags the read.
    assert_eq!(init.findings(), &[UseBeforeInit { node: nv, symbol: a }][..]);
}

#[test]
fn test_dead_code_writes_are_not_reported() {
    let mut b = BodyBuilder::new();
    let x = b.local("x");
    let ret = b.ret(&[]);
    let after = b.assign(x, &[]);
    let (body, cfg) = build(b, vec![ret, after]);

    let live = run_liveness(&cfg, &body);
    assert!(live.dead_stores().is_empty(), "unreachable code is another rule's business");
}

// --- the generic engine -------------------------------------------------

fn diamond_with_loop() -> (FunctionBody, ControlFlowGraph) {
    let mut b = BodyBuilder::new();
    let c = b.param("c");
    let d = b.param("d");
    let x = b.local("x");
    let y = b.local("y");
    let cond = b.reads(&[c]);
    let a1 = b.assign(x, &[]);
    let a2 = b.assign(x, &[y]);
    let if_node = b.if_stmt(cond, vec![a1], Some(vec![a2]));
    let lcond = b.reads(&[d]);
    let bump = b.compound(x, &[]);
    let w = b.while_stmt(lcond, vec![bump]);
    let ret = b.ret(&[x]);
    build(b, vec![if_node, w, ret])
}

#[test]
fn test_solution_satisfies_join_equations() {
    let (body, cfg) = diamond_with_loop();
    let init = run_init(&cfg, &body);
    let live = run_liveness(&cfg, &body);

    for (id, _) in cfg.iter_blocks() {
        let preds: Vec<_> = cfg.predecessors(id).map(|e| e.from).collect();
        if !preds.is_empty() {
            let mut expect = init.solution().on_exit(preds[0]).clone();
            for &p in &preds[1..] {
                expect.retain(|s| init.solution().on_exit(p).contains(s));
            }
            assert_eq!(
                init.solution().on_entry(id),
                &expect,
                "definite-init entry of b{} is the intersection over predecessors",
                id.0
            );
        }

        let succs: Vec<_> = cfg.successors(id).map(|e| e.to).collect();
        if !succs.is_empty() {
            let mut expect = SymbolSet::default();
            for &s in &succs {
                expect.extend(live.solution().on_entry(s).iter().copied());
            }
            assert_eq!(
                live.solution().on_exit(id),
                &expect,
                "liveness exit of b{} is the union over successors",
                id.0
            );
        }
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let (body, cfg) = diamond_with_loop();
    let seed = DefiniteInit::default_seed(&body);

    let first = DefiniteInit::run(&cfg, &body, &seed).expect("converges");
    let second = DefiniteInit::run(&cfg, &body, &seed).expect("converges");
    assert_eq!(first.solution(), second.solution());
    assert_eq!(first.findings(), second.findings());

    let live1 = run_liveness(&cfg, &body);
    let live2 = run_liveness(&cfg, &body);
    assert_eq!(live1.solution(), live2.solution());
    assert_eq!(live1.dead_stores(), live2.dead_stores());
}

#[test]
fn test_non_monotone_transfer_does_not_hang() {
    // l: $x = 1; goto l;  The self loop plus a complementing (and thus
    // non-monotone) transfer oscillates forever; the cap must cut it off.
    let mut b = BodyBuilder::new();
    let x = b.local("x");
    let l = b.label("l");
    let n = b.assign(x, &[]);
    let g = b.goto("l");
    let (_body, cfg) = build(b, vec![l, n, g]);

    let transfer = |_: &BasicBlock, state: &SymbolSet| {
        let mut out = SymbolSet::default();
        if !state.contains(&x) {
            out.insert(x);
        }
        out
    };
    let join = |acc: &mut SymbolSet, other: &SymbolSet| {
        acc.retain(|s| other.contains(s));
    };
    let result = solve(
        &cfg,
        Direction::Forward,
        SymbolSet::default(),
        SymbolSet::default(),
        transfer,
        join,
    );
    assert!(matches!(result, Err(DidNotConverge { .. })));
}
