use std::collections::BTreeSet;

use crate::callgraph::context::{InterfaceImplInfo, ResolutionContext, is_platform_class};
use crate::callgraph::edge::method_signature;
use crate::ir::{Class, Method};

pub(crate) const RUNNABLE_CLASS_NAME: &str = "java.lang.Runnable";
pub(crate) const CALLABLE_CLASS_NAME: &str = "java.util.concurrent.Callable";
pub(crate) const THREAD_CLASS_NAME: &str = "java.lang.Thread";

/// Pre-pass over every class of an archive, before any method is visited.
pub(crate) fn build_relationship_index(context: &mut ResolutionContext, classes: &[Class]) {
    for class in classes {
        index_class(context, class);
    }
}

fn index_class(context: &mut ResolutionContext, class: &Class) {
    if class.access.is_interface {
        if !class.methods.is_empty() && !context.interface_methods.contains_key(&class.name) {
            context
                .interface_methods
                .insert(class.name.clone(), interface_abstract_signatures(class));
        }
    } else {
        index_concrete_class(context, class);
    }

    let Some(super_name) = class.super_name.as_deref() else {
        return;
    };
    if super_name == THREAD_CLASS_NAME {
        context.markers.thread.seed(&class.name);
    }
    if !is_platform_class(super_name) {
        context
            .inheritance_participants
            .insert(class.name.clone());
        context
            .inheritance_participants
            .insert(super_name.to_string());
    }
}

fn index_concrete_class(context: &mut ResolutionContext, class: &Class) {
    if class.interfaces.is_empty()
        || class.methods.is_empty()
        || context.interface_impls.contains_key(&class.name)
    {
        return;
    }
    context.interface_impls.insert(
        class.name.clone(),
        InterfaceImplInfo {
            interfaces: class.interfaces.clone(),
            methods: dispatchable_signatures(class),
        },
    );

    if class.access.is_abstract {
        return;
    }
    if class.interfaces.iter().any(|name| name == RUNNABLE_CLASS_NAME) {
        context.markers.runnable.seed(&class.name);
    }
    if class.interfaces.iter().any(|name| name == CALLABLE_CLASS_NAME) {
        context.markers.callable.seed(&class.name);
    }
}

/// Public, non-abstract, non-static methods other than initializers.
fn dispatchable_signatures(class: &Class) -> Vec<String> {
    distinct_signatures(class.methods.iter().filter(|method| {
        !method.is_initializer()
            && method.access.is_public
            && !method.access.is_abstract
            && !method.access.is_static
    }))
}

fn interface_abstract_signatures(class: &Class) -> Vec<String> {
    distinct_signatures(
        class
            .methods
            .iter()
            .filter(|method| method.access.is_abstract),
    )
}

/// Signatures in declaration order. Bridge methods differ from their target
/// only in return type, so they collapse onto the same signature.
fn distinct_signatures<'a>(methods: impl Iterator<Item = &'a Method>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    methods
        .map(signature_of)
        .filter(|signature| seen.insert(signature.clone()))
        .collect()
}

pub(crate) fn signature_of(method: &Method) -> String {
    method_signature(&method.name, &method.arguments)
}
