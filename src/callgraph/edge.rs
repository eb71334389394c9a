use std::fmt;

use serde::Serialize;

/// Fully qualified method key, rendered as `class:name(arg,arg)`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct MethodKey {
    pub(crate) class_name: String,
    /// Method name plus parenthesized argument list, e.g. `run()`.
    pub(crate) signature: String,
}

impl MethodKey {
    pub(crate) fn new(class_name: &str, name: &str, arguments: &[String]) -> Self {
        Self {
            class_name: class_name.to_string(),
            signature: method_signature(name, arguments),
        }
    }

    pub(crate) fn from_signature(class_name: &str, signature: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            signature: signature.to_string(),
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.class_name, self.signature)
    }
}

impl Serialize for MethodKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Builds the `name(arg,arg)` signature used as key in every signature map.
pub(crate) fn method_signature(name: &str, arguments: &[String]) -> String {
    format!("{}({})", name, arguments.join(","))
}

/// How an edge was derived.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) enum EdgeKind {
    Virtual,
    Interface,
    Special,
    Static,
    Dynamic,
    InterfaceDispatch,
    Lambda,
    RunnableConstruct,
    CallableConstruct,
    ThreadStart,
    SuperCallsChild,
    ChildCallsSuper,
}

impl EdgeKind {
    /// Short tag written between parentheses in the text output.
    pub(crate) fn tag(self) -> &'static str {
        match self {
            EdgeKind::Virtual => "M",
            EdgeKind::Interface => "I",
            EdgeKind::Special => "O",
            EdgeKind::Static => "S",
            EdgeKind::Dynamic => "D",
            EdgeKind::InterfaceDispatch => "ITF",
            EdgeKind::Lambda => "LM",
            EdgeKind::RunnableConstruct => "RIR",
            EdgeKind::CallableConstruct => "CIC",
            EdgeKind::ThreadStart => "TSR",
            EdgeKind::SuperCallsChild => "SCC",
            EdgeKind::ChildCallsSuper => "CCS",
        }
    }
}

impl Serialize for EdgeKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

/// Where an extracted edge came from in the input.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct EdgeOrigin {
    pub(crate) line: u32,
    pub(crate) archive: usize,
}

/// Directed "may invoke" relation between two methods.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct CallEdge {
    pub(crate) caller: MethodKey,
    pub(crate) kind: EdgeKind,
    pub(crate) callee: MethodKey,
    /// `None` for synthesized edges and for call sites without line information.
    #[serde(flatten)]
    pub(crate) origin: Option<EdgeOrigin>,
}

impl CallEdge {
    pub(crate) fn synthetic(caller: MethodKey, kind: EdgeKind, callee: MethodKey) -> Self {
        Self {
            caller,
            kind,
            callee,
            origin: None,
        }
    }
}

impl fmt::Display for CallEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M:{} ({}){}", self.caller, self.kind.tag(), self.callee)?;
        if let Some(origin) = self.origin {
            write!(f, " {} {}", origin.line, origin.archive)?;
        }
        Ok(())
    }
}
