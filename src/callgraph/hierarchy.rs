use anyhow::{Context, Result};
use tracing::debug;

use crate::callgraph::context::{
    ClassHierarchyInfo, MethodAttribute, ResolutionContext, is_platform_class,
};
use crate::callgraph::edge::{CallEdge, EdgeKind, MethodKey};
use crate::callgraph::index::signature_of;
use crate::ir::Class;

const OBJECT_CLASS_NAME: &str = "java.lang.Object";

/// Records hierarchy state for a class taking part in a non-platform inheritance chain.
///
/// Called in archive-entry order while classes are visited, so the children
/// index lists subclasses in discovery order.
pub(crate) fn register_class(context: &mut ResolutionContext, class: &Class) {
    if class.access.is_interface
        || !context.inheritance_participants.contains(&class.name)
        || context.hierarchy.contains_key(&class.name)
    {
        return;
    }

    let super_name = class
        .super_name
        .clone()
        .unwrap_or_else(|| OBJECT_CLASS_NAME.to_string());
    if !is_platform_class(&super_name) {
        context
            .children
            .entry(super_name.clone())
            .or_default()
            .push(class.name.clone());
    }

    let methods = class
        .methods
        .iter()
        .filter(|method| {
            !method.is_initializer()
                && !method.access.is_static
                && (method.access.is_abstract
                    || method.access.is_public
                    || method.access.is_protected)
        })
        .map(|method| {
            (
                signature_of(method),
                MethodAttribute {
                    is_abstract: method.access.is_abstract,
                    is_public: method.access.is_public,
                    is_protected: method.access.is_protected,
                },
            )
        })
        .collect();
    context.hierarchy.insert(
        class.name.clone(),
        ClassHierarchyInfo {
            is_abstract: class.access.is_abstract,
            super_name,
            methods,
        },
    );
}

/// Copies interface abstract methods onto abstract superclasses that lack them.
///
/// An abstract class may satisfy an interface only through its subclasses;
/// afterwards it still carries the interface contract for the hierarchy walk.
pub(crate) fn propagate_interface_methods(context: &mut ResolutionContext) {
    let ResolutionContext {
        children,
        hierarchy,
        interface_impls,
        interface_methods,
        ..
    } = context;
    for super_name in children.keys() {
        let Some(info) = hierarchy.get_mut(super_name) else {
            continue;
        };
        if !info.is_abstract {
            continue;
        }
        let Some(implemented) = interface_impls.get(super_name) else {
            continue;
        };
        for interface in &implemented.interfaces {
            let Some(signatures) = interface_methods.get(interface) else {
                continue;
            };
            for signature in signatures {
                info.methods
                    .entry(signature.clone())
                    .or_insert(MethodAttribute::INTERFACE_CONTRACT);
            }
        }
    }
}

/// Walks every inheritance tree top-down and synthesizes super/child edges.
///
/// Fails when a class reached by the walk has no recorded hierarchy state.
pub(crate) fn resolve_hierarchy(context: &mut ResolutionContext) -> Result<Vec<CallEdge>> {
    let tops: Vec<String> = context
        .hierarchy
        .iter()
        .filter(|(_, info)| is_platform_class(&info.super_name))
        .map(|(name, _)| name.clone())
        .collect();

    let mut edges = Vec::new();
    for top in tops {
        walk_from_top(context, &top, &mut edges)?;
    }
    Ok(edges)
}

/// Cursor into one level of the explicit traversal stack.
struct Frame {
    super_name: String,
    next_child: usize,
}

fn walk_from_top(
    context: &mut ResolutionContext,
    top: &str,
    edges: &mut Vec<CallEdge>,
) -> Result<()> {
    debug!("walking hierarchy from top superclass {}", top);
    if !context.children.contains_key(top) {
        anyhow::bail!("can't find subclasses of top superclass {top}");
    }

    let mut stack = vec![Frame {
        super_name: top.to_string(),
        next_child: 0,
    }];
    while let Some(frame) = stack.last_mut() {
        let next = context
            .children
            .get(&frame.super_name)
            .and_then(|children| children.get(frame.next_child))
            .cloned();
        let Some(child) = next else {
            stack.pop();
            continue;
        };
        frame.next_child += 1;
        let super_name = frame.super_name.clone();

        link_super_and_child(context, &super_name, &child, edges)?;

        if context.children.contains_key(&child) {
            stack.push(Frame {
                super_name: child,
                next_child: 0,
            });
        }
    }
    Ok(())
}

fn link_super_and_child(
    context: &mut ResolutionContext,
    super_name: &str,
    child_name: &str,
    edges: &mut Vec<CallEdge>,
) -> Result<()> {
    let super_methods: Vec<(String, MethodAttribute)> = context
        .hierarchy
        .get(super_name)
        .with_context(|| format!("can't find hierarchy information for superclass {super_name}"))?
        .methods
        .iter()
        .map(|(signature, attribute)| (signature.clone(), *attribute))
        .collect();
    let child = context
        .hierarchy
        .get_mut(child_name)
        .with_context(|| format!("can't find hierarchy information for subclass {child_name}"))?;

    for (signature, attribute) in super_methods {
        if attribute.is_abstract {
            child.methods.entry(signature.clone()).or_insert(attribute);
            edges.push(CallEdge::synthetic(
                MethodKey::from_signature(super_name, &signature),
                EdgeKind::SuperCallsChild,
                MethodKey::from_signature(child_name, &signature),
            ));
            continue;
        }
        if !attribute.is_public && !attribute.is_protected {
            continue;
        }
        if child.methods.contains_key(&signature) {
            continue;
        }
        // Inherited methods of concrete children only count when actually called.
        if !child.is_abstract && !context.usage.contains(child_name, &signature) {
            continue;
        }
        child.methods.insert(signature.clone(), attribute);
        edges.push(CallEdge::synthetic(
            MethodKey::from_signature(child_name, &signature),
            EdgeKind::ChildCallsSuper,
            MethodKey::from_signature(super_name, &signature),
        ));
    }
    Ok(())
}
