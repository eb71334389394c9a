use crate::callgraph::context::{MarkerMap, PatternMarkers};
use crate::callgraph::edge::{CallEdge, EdgeKind, EdgeOrigin, MethodKey};

const CONSTRUCTOR_NAME: &str = "<init>";
const START_NAME: &str = "start";

/// Edges produced for a call site by the execution-pattern rules.
#[derive(Debug, Default)]
pub(crate) struct Rewrite {
    pub(crate) edges: Vec<CallEdge>,
    /// Whether the literal call edge should still be emitted.
    pub(crate) keep_raw: bool,
}

/// Applies the Runnable / Callable / Thread rules to one extracted call.
///
/// Constructing a Runnable or Callable implementor replaces the literal edge
/// with a construct edge; the first construction per class additionally links
/// the constructor to `run()` / `call()`. The first `start()` on a Thread
/// subclass links `start()` to `run()` and keeps the literal edge.
pub(crate) fn rewrite_call(
    markers: &mut PatternMarkers,
    caller: &MethodKey,
    callee: &MethodKey,
    name: &str,
    arguments: &[String],
    origin: Option<EdgeOrigin>,
) -> Rewrite {
    let mut rewrite = Rewrite {
        edges: Vec::new(),
        keep_raw: true,
    };

    if name == CONSTRUCTOR_NAME {
        for (marker, kind, executed) in [
            (&mut markers.runnable, EdgeKind::RunnableConstruct, "run()"),
            (&mut markers.callable, EdgeKind::CallableConstruct, "call()"),
        ] {
            if construct_edges(marker, kind, executed, caller, callee, origin, &mut rewrite.edges) {
                rewrite.keep_raw = false;
            }
        }
    } else if name == START_NAME && arguments.is_empty() && markers.thread.claim(&callee.class_name)
    {
        rewrite.edges.push(CallEdge::synthetic(
            callee.clone(),
            EdgeKind::ThreadStart,
            MethodKey::from_signature(&callee.class_name, "run()"),
        ));
    }

    rewrite
}

fn construct_edges(
    marker: &mut MarkerMap,
    kind: EdgeKind,
    executed: &str,
    caller: &MethodKey,
    callee: &MethodKey,
    origin: Option<EdgeOrigin>,
    edges: &mut Vec<CallEdge>,
) -> bool {
    if !marker.is_recognized(&callee.class_name) {
        return false;
    }
    edges.push(CallEdge {
        caller: caller.clone(),
        kind,
        callee: callee.clone(),
        origin,
    });
    if marker.claim(&callee.class_name) {
        edges.push(CallEdge::synthetic(
            callee.clone(),
            kind,
            MethodKey::from_signature(&callee.class_name, executed),
        ));
    }
    true
}
