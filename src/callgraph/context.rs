use std::collections::{BTreeMap, BTreeSet};

/// Signatures observed as callees anywhere in the processed input, by owner class.
///
/// Only ever grows. Used as a reachability filter for synthesized edges.
#[derive(Clone, Debug, Default)]
pub(crate) struct CalleeUsageIndex {
    by_class: BTreeMap<String, BTreeSet<String>>,
}

impl CalleeUsageIndex {
    pub(crate) fn record(&mut self, class_name: &str, signature: &str) {
        self.by_class
            .entry(class_name.to_string())
            .or_default()
            .insert(signature.to_string());
    }

    pub(crate) fn contains(&self, class_name: &str, signature: &str) -> bool {
        self.by_class
            .get(class_name)
            .is_some_and(|signatures| signatures.contains(signature))
    }

    pub(crate) fn signatures(&self, class_name: &str) -> Option<&BTreeSet<String>> {
        self.by_class.get(class_name)
    }

    pub(crate) fn class_count(&self) -> usize {
        self.by_class.len()
    }
}

/// Tri-state per-class marker for one-time synthetic edge emission.
///
/// Absent: not a recognized implementor. `false`: recognized, edge pending.
/// `true`: edge already emitted.
#[derive(Clone, Debug, Default)]
pub(crate) struct MarkerMap {
    markers: BTreeMap<String, bool>,
}

impl MarkerMap {
    pub(crate) fn seed(&mut self, class_name: &str) {
        self.markers.entry(class_name.to_string()).or_insert(false);
    }

    pub(crate) fn is_recognized(&self, class_name: &str) -> bool {
        self.markers.contains_key(class_name)
    }

    /// Flips a pending marker to emitted. Returns `true` only on that transition.
    pub(crate) fn claim(&mut self, class_name: &str) -> bool {
        match self.markers.get_mut(class_name) {
            Some(emitted) if !*emitted => {
                *emitted = true;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self, class_name: &str) -> Option<bool> {
        self.markers.get(class_name).copied()
    }
}

/// Markers for the Runnable / Callable / Thread execution patterns.
#[derive(Clone, Debug, Default)]
pub(crate) struct PatternMarkers {
    pub(crate) runnable: MarkerMap,
    pub(crate) callable: MarkerMap,
    pub(crate) thread: MarkerMap,
}

/// Snapshot of a method's modifiers within one class of a hierarchy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct MethodAttribute {
    pub(crate) is_abstract: bool,
    pub(crate) is_public: bool,
    pub(crate) is_protected: bool,
}

impl MethodAttribute {
    /// Attribute given to interface methods copied onto an abstract class.
    pub(crate) const INTERFACE_CONTRACT: MethodAttribute = MethodAttribute {
        is_abstract: true,
        is_public: true,
        is_protected: false,
    };
}

/// Per-class hierarchy state, keyed by method signature.
#[derive(Clone, Debug)]
pub(crate) struct ClassHierarchyInfo {
    pub(crate) is_abstract: bool,
    pub(crate) super_name: String,
    pub(crate) methods: BTreeMap<String, MethodAttribute>,
}

/// Interfaces a concrete class implements and its own dispatchable methods.
#[derive(Clone, Debug, Default)]
pub(crate) struct InterfaceImplInfo {
    pub(crate) interfaces: Vec<String>,
    pub(crate) methods: Vec<String>,
}

/// All shared state of one archive's call graph construction.
///
/// Built fresh for each archive; only the usage index may be carried over.
#[derive(Debug, Default)]
pub(crate) struct ResolutionContext {
    pub(crate) usage: CalleeUsageIndex,
    pub(crate) markers: PatternMarkers,
    pub(crate) interface_impls: BTreeMap<String, InterfaceImplInfo>,
    pub(crate) interface_methods: BTreeMap<String, Vec<String>>,
    /// Classes taking part in a non-platform inheritance chain.
    pub(crate) inheritance_participants: BTreeSet<String>,
    pub(crate) hierarchy: BTreeMap<String, ClassHierarchyInfo>,
    /// Superclass name to direct subclasses, in discovery order.
    pub(crate) children: BTreeMap<String, Vec<String>>,
    pub(crate) annotations: BTreeMap<String, BTreeSet<String>>,
}

impl ResolutionContext {
    pub(crate) fn with_usage(usage: CalleeUsageIndex) -> Self {
        Self {
            usage,
            ..Self::default()
        }
    }

    /// Consumes the context, keeping only what may outlive the archive.
    pub(crate) fn into_usage(self) -> CalleeUsageIndex {
        self.usage
    }
}

/// Classes in the platform root namespace end every hierarchy walk.
pub(crate) fn is_platform_class(name: &str) -> bool {
    name.starts_with("java.")
}
