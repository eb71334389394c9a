/// Structural view of a parsed JVM class, as consumed by the call graph engine.
///
/// Class and type names are in Java binary form (`com.example.Foo`,
/// `java.lang.String[]`), matching the keys written to the edge output.
#[derive(Clone, Debug)]
pub(crate) struct Class {
    pub(crate) name: String,
    pub(crate) super_name: Option<String>,
    pub(crate) interfaces: Vec<String>,
    pub(crate) access: ClassAccess,
    pub(crate) referenced_classes: Vec<String>,
    pub(crate) methods: Vec<Method>,
    pub(crate) bootstrap_methods: Vec<BootstrapMethod>,
}

/// Class-level access flags relevant to hierarchy resolution.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct ClassAccess {
    pub(crate) is_interface: bool,
    pub(crate) is_abstract: bool,
}

/// Method declaration and, for concrete methods, its instruction stream.
#[derive(Clone, Debug)]
pub(crate) struct Method {
    pub(crate) name: String,
    pub(crate) arguments: Vec<String>,
    pub(crate) access: MethodAccess,
    pub(crate) annotations: Vec<String>,
    pub(crate) line_numbers: Vec<LineNumber>,
    pub(crate) instructions: Vec<Instruction>,
}

/// Method access flags relevant to call graph construction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct MethodAccess {
    pub(crate) is_public: bool,
    pub(crate) is_protected: bool,
    pub(crate) is_static: bool,
    pub(crate) is_abstract: bool,
    pub(crate) is_native: bool,
    pub(crate) is_synthetic: bool,
}

/// Line number entry mapping a bytecode offset to a source line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct LineNumber {
    pub(crate) start_pc: u32,
    pub(crate) line: u32,
}

/// Bytecode instruction captured for analysis.
#[derive(Clone, Debug)]
pub(crate) struct Instruction {
    pub(crate) offset: u32,
    pub(crate) kind: InstructionKind,
}

/// Instruction kinds needed for call graph construction.
#[derive(Clone, Debug)]
pub(crate) enum InstructionKind {
    Invoke(CallSite),
    Other(u8),
}

/// Call site extracted from bytecode.
///
/// For dynamic call sites `owner` is the functional interface produced by the
/// call site and `bootstrap_index` points into the class's bootstrap table.
#[derive(Clone, Debug)]
pub(crate) struct CallSite {
    pub(crate) owner: String,
    pub(crate) name: String,
    pub(crate) arguments: Vec<String>,
    pub(crate) kind: CallKind,
    pub(crate) offset: u32,
    pub(crate) bootstrap_index: Option<u16>,
}

/// Call opcode classification.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub(crate) enum CallKind {
    Virtual,
    Interface,
    Special,
    Static,
    Dynamic,
}

/// Entry of the class-level bootstrap method table.
#[derive(Clone, Debug, Default)]
pub(crate) struct BootstrapMethod {
    pub(crate) arguments: Vec<BootstrapArgument>,
}

/// Static argument of a bootstrap method.
#[derive(Clone, Debug)]
pub(crate) enum BootstrapArgument {
    MethodHandle(MethodHandleRef),
    Other,
    /// The constant could not be decoded; consumers must degrade.
    Unresolved,
}

/// Target of a method handle constant.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct MethodHandleRef {
    pub(crate) owner: String,
    pub(crate) name: String,
    /// `None` when the handle's descriptor could not be turned into Java types.
    pub(crate) arguments: Option<Vec<String>>,
}

impl Method {
    /// Returns the source line for a bytecode offset, if the line table covers it.
    pub(crate) fn line_for_offset(&self, offset: u32) -> Option<u32> {
        self.line_numbers
            .iter()
            .take_while(|entry| entry.start_pc <= offset)
            .last()
            .map(|entry| entry.line)
    }

    pub(crate) fn has_body(&self) -> bool {
        !self.access.is_abstract && !self.access.is_native
    }

    pub(crate) fn is_initializer(&self) -> bool {
        self.name.starts_with('<')
    }
}
