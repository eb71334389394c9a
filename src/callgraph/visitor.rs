use std::collections::{BTreeMap, BTreeSet};

use crate::callgraph::context::ResolutionContext;
use crate::callgraph::edge::{CallEdge, EdgeKind, EdgeOrigin, MethodKey};
use crate::callgraph::method_ref::{implementation_handle, resolve_method_reference};
use crate::callgraph::patterns::rewrite_call;
use crate::ir::{CallKind, CallSite, Class, InstructionKind, Method};

const LAMBDA_PREFIX: &str = "lambda$";

/// Extracts the call edges of every method of `class`, in declaration order.
///
/// Updates the usage index, the pattern markers and the annotation map of
/// `context` as a side effect.
pub(crate) fn visit_class(
    context: &mut ResolutionContext,
    class: &Class,
    archive_index: usize,
) -> Vec<CallEdge> {
    let mut edges = Vec::new();
    for method in &class.methods {
        let mut visitor = MethodVisitor::new(context, class, method, archive_index);
        visitor.visit();
        edges.extend(visitor.edges);
    }
    edges
}

/// Per-method visitation state; lambda names never leak between methods.
struct MethodVisitor<'a> {
    context: &'a mut ResolutionContext,
    class: &'a Class,
    method: &'a Method,
    caller: MethodKey,
    archive_index: usize,
    edges: Vec<CallEdge>,
    lambda_names: BTreeSet<String>,
}

impl<'a> MethodVisitor<'a> {
    fn new(
        context: &'a mut ResolutionContext,
        class: &'a Class,
        method: &'a Method,
        archive_index: usize,
    ) -> Self {
        Self {
            context,
            class,
            method,
            caller: MethodKey::new(&class.name, &method.name, &method.arguments),
            archive_index,
            edges: Vec::new(),
            lambda_names: BTreeSet::new(),
        }
    }

    fn visit(&mut self) {
        record_annotations(&mut self.context.annotations, &self.caller, self.method);
        if !self.method.has_body() {
            return;
        }

        let class = self.class;
        let method = self.method;
        let instructions = &method.instructions;
        for (index, instruction) in instructions.iter().enumerate() {
            let InstructionKind::Invoke(call) = &instruction.kind else {
                continue;
            };
            match call.kind {
                CallKind::Virtual => {
                    let reference = resolve_method_reference(class, instructions, index);
                    self.add_call(EdgeKind::Virtual, call);
                    if let Some(reference) = reference {
                        self.add_edge(
                            EdgeKind::Virtual,
                            &reference.owner,
                            &reference.name,
                            &reference.arguments,
                            call.offset,
                        );
                    }
                }
                CallKind::Interface => self.add_call(EdgeKind::Interface, call),
                CallKind::Special => self.add_call(EdgeKind::Special, call),
                CallKind::Static => self.add_call(EdgeKind::Static, call),
                CallKind::Dynamic => {
                    self.note_lambda(call);
                    self.add_call(EdgeKind::Dynamic, call);
                }
            }
        }

        self.link_lambdas();
    }

    fn add_call(&mut self, kind: EdgeKind, call: &CallSite) {
        self.add_edge(kind, &call.owner, &call.name, &call.arguments, call.offset);
    }

    fn add_edge(
        &mut self,
        kind: EdgeKind,
        owner: &str,
        name: &str,
        arguments: &[String],
        offset: u32,
    ) {
        let callee = MethodKey::new(owner, name, arguments);
        self.context.usage.record(owner, &callee.signature);

        let origin = self
            .method
            .line_for_offset(offset)
            .map(|line| EdgeOrigin {
                line,
                archive: self.archive_index,
            });
        let rewrite = rewrite_call(
            &mut self.context.markers,
            &self.caller,
            &callee,
            name,
            arguments,
            origin,
        );
        self.edges.extend(rewrite.edges);
        if rewrite.keep_raw {
            self.edges.push(CallEdge {
                caller: self.caller.clone(),
                kind,
                callee,
                origin,
            });
        }
    }

    fn note_lambda(&mut self, call: &CallSite) {
        let Some(bootstrap_index) = call.bootstrap_index else {
            return;
        };
        let Some(handle) = implementation_handle(self.class, bootstrap_index) else {
            return;
        };
        if handle.owner == self.class.name && handle.name.starts_with(LAMBDA_PREFIX) {
            self.lambda_names.insert(handle.name.clone());
        }
    }

    fn link_lambdas(&mut self) {
        let class = self.class;
        for name in std::mem::take(&mut self.lambda_names) {
            let lambda = class
                .methods
                .iter()
                .find(|method| method.name == name && method.access.is_synthetic);
            let Some(lambda) = lambda else {
                continue;
            };
            self.edges.push(CallEdge::synthetic(
                self.caller.clone(),
                EdgeKind::Lambda,
                MethodKey::new(&class.name, &lambda.name, &lambda.arguments),
            ));
        }
    }
}

/// First declaration of a method key wins; later duplicates are ignored.
fn record_annotations(
    annotations: &mut BTreeMap<String, BTreeSet<String>>,
    caller: &MethodKey,
    method: &Method,
) {
    if method.annotations.is_empty() {
        return;
    }
    annotations
        .entry(caller.to_string())
        .or_insert_with(|| method.annotations.iter().cloned().collect());
}
