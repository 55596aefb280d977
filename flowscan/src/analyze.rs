//! Convenience entry point: build the graph once, run both analyses over
//! it, collect reportable findings.
//!
//! Each call is a pure function of one function body, so batches fan out
//! over rayon with zero synchronization.

use rayon::prelude::*;
use serde::Serialize;

use crate::cfg::{ControlFlowGraph, Unbuildable};
use crate::flow::{DefiniteInit, DidNotConverge, Liveness, SymbolSet};
use crate::tree::{FunctionBody, NodeId};

/// Why one function body yielded no result.
///
/// Both variants are recoverable: a skipped function simply
/// produces no findings and never aborts the analysis of anything else.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    /// The body contains a construct the CFG builder does not model.
    #[error(transparent)]
    Unbuildable(#[from] Unbuildable),
    /// A fixed point was not reached within the iteration cap.
    #[error(transparent)]
    DidNotConverge(#[from] DidNotConverge),
}

/// A single reportable issue found by the flow analyses.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    /// ID of the rule that triggered the finding.
    pub rule_id: String,
    /// Severity level (e.g., "warning").
    pub severity: String,
    /// Description of the issue.
    pub message: String,
    /// Tree node the finding anchors to.
    pub node: NodeId,
    /// Resolved name of the variable involved.
    pub symbol: String,
}

/// Everything one engine run produces for one function body.
#[derive(Debug)]
pub struct FunctionAnalysis {
    /// The constructed graph, for rules that want raw reachability facts.
    pub cfg: ControlFlowGraph,
    /// Definite-initialization states and findings.
    pub definite_init: DefiniteInit,
    /// Live-variable states and findings.
    pub liveness: Liveness,
    /// Reportable findings from both analyses, in source order.
    pub findings: Vec<Finding>,
}

/// Analyzes one function body: graph construction, both dataflow
/// analyses over the shared graph, findings collection.
pub fn analyze(body: &FunctionBody) -> Result<FunctionAnalysis, AnalysisError> {
    let cfg = ControlFlowGraph::build(body)?;
    let seed = DefiniteInit::default_seed(body);
    let definite_init = DefiniteInit::run(&cfg, body, &seed)?;
    let liveness = Liveness::run(&cfg, body, &SymbolSet::default())?;

    let mut findings = Vec::new();
    for f in definite_init.findings() {
        let name = &body.symbol(f.symbol).name;
        findings.push(Finding {
            rule_id: "use-before-init".to_owned(),
            severity: "warning".to_owned(),
            message: format!("`{name}` may be read before it is assigned on some path"),
            node: f.node,
            symbol: name.clone().into_string(),
        });
    }
    for d in liveness.dead_stores() {
        let name = &body.symbol(d.symbol).name;
        findings.push(Finding {
            rule_id: "dead-store".to_owned(),
            severity: "warning".to_owned(),
            message: format!("value assigned to `{name}` is never read"),
            node: d.node,
            symbol: name.clone().into_string(),
        });
    }
    findings.sort_by_key(|f| f.node.0);

    Ok(FunctionAnalysis {
        cfg,
        definite_init,
        liveness,
        findings,
    })
}

/// Analyzes many independent function bodies in parallel, one result per
/// body. The engine is synchronous per invocation; the only shared data
/// is the read-only input.
pub fn analyze_all(bodies: &[FunctionBody]) -> Vec<Result<FunctionAnalysis, AnalysisError>> {
    bodies.par_iter().map(analyze).collect()
}
