use tracing::debug;

use crate::ir::{
    BootstrapArgument, CallKind, CallSite, Class, Instruction, InstructionKind, MethodHandleRef,
};

/// Position of the implementation method handle in lambda-metafactory arguments.
pub(crate) const IMPLEMENTATION_HANDLE_ARGUMENT: usize = 1;

/// Functional combinators whose argument is commonly a method reference.
const FUNCTIONAL_COMBINATORS: &[(&str, &str)] = &[
    ("java.util.Optional", "map"),
    ("java.util.Optional", "flatMap"),
    ("java.util.Optional", "filter"),
    ("java.util.Optional", "ifPresent"),
    ("java.util.Optional", "orElseGet"),
];

/// Method targeted by a method reference passed to a combinator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ResolvedReference {
    pub(crate) owner: String,
    pub(crate) name: String,
    pub(crate) arguments: Vec<String>,
}

/// Resolves the method reference fed into the combinator call at `index`.
///
/// Returns `None` whenever the pattern does not match or the bootstrap table
/// cannot be followed; the caller then records only the literal call.
pub(crate) fn resolve_method_reference(
    class: &Class,
    instructions: &[Instruction],
    index: usize,
) -> Option<ResolvedReference> {
    let InstructionKind::Invoke(call) = &instructions.get(index)?.kind else {
        return None;
    };
    if !is_functional_combinator(call) {
        return None;
    }
    let previous = index.checked_sub(1).and_then(|prev| instructions.get(prev));
    let Some(Instruction {
        kind: InstructionKind::Invoke(dynamic),
        ..
    }) = previous
    else {
        return None;
    };
    if dynamic.kind != CallKind::Dynamic {
        return None;
    }

    let handle = dynamic
        .bootstrap_index
        .and_then(|bootstrap_index| implementation_handle(class, bootstrap_index));
    let Some(handle) = handle else {
        debug!(
            "unresolved method reference: class={} call={}.{} offset={}",
            class.name, call.owner, call.name, call.offset
        );
        return None;
    };
    Some(ResolvedReference {
        owner: handle.owner.clone(),
        name: handle.name.clone(),
        arguments: handle.arguments.clone().unwrap_or_default(),
    })
}

/// Implementation method handle of a bootstrap entry, if it decoded cleanly.
pub(crate) fn implementation_handle(class: &Class, bootstrap_index: u16) -> Option<&MethodHandleRef> {
    let bootstrap = class.bootstrap_methods.get(bootstrap_index as usize)?;
    match bootstrap.arguments.get(IMPLEMENTATION_HANDLE_ARGUMENT)? {
        BootstrapArgument::MethodHandle(handle) => Some(handle),
        BootstrapArgument::Other | BootstrapArgument::Unresolved => None,
    }
}

fn is_functional_combinator(call: &CallSite) -> bool {
    call.kind == CallKind::Virtual
        && FUNCTIONAL_COMBINATORS
            .iter()
            .any(|(owner, name)| call.owner == *owner && call.name == *name)
}
