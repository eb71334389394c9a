use clap::ValueEnum;

use crate::callgraph::context::ResolutionContext;
use crate::callgraph::edge::{CallEdge, EdgeKind, MethodKey};

/// Which usage facts gate an interface-to-implementation edge.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum DispatchPolicy {
    /// Both the interface method and the implementing method must have been called.
    #[default]
    BothCalled,
    /// Only the interface method must have been called.
    InterfaceCalled,
}

/// Links called interface methods to the implementations of concrete classes.
pub(crate) fn resolve_interface_calls(
    context: &ResolutionContext,
    policy: DispatchPolicy,
) -> Vec<CallEdge> {
    let mut edges = Vec::new();
    if context.interface_impls.is_empty() || context.interface_methods.is_empty() {
        return edges;
    }

    for (class_name, implemented) in &context.interface_impls {
        for interface in &implemented.interfaces {
            let Some(called) = context.usage.signatures(interface) else {
                continue;
            };
            let Some(contract) = context.interface_methods.get(interface) else {
                continue;
            };
            if contract.is_empty() {
                continue;
            }
            for signature in &implemented.methods {
                if !contract.contains(signature) || !called.contains(signature) {
                    continue;
                }
                if policy == DispatchPolicy::BothCalled
                    && !context.usage.contains(class_name, signature)
                {
                    continue;
                }
                edges.push(CallEdge::synthetic(
                    MethodKey::from_signature(interface, signature),
                    EdgeKind::InterfaceDispatch,
                    MethodKey::from_signature(class_name, signature),
                ));
            }
        }
    }
    edges
}
