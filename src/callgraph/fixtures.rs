//! Hand-built class views for engine tests.

use crate::ir::{
    BootstrapArgument, BootstrapMethod, CallKind, CallSite, Class, ClassAccess, Instruction,
    InstructionKind, LineNumber, Method, MethodAccess, MethodHandleRef,
};

pub(crate) struct ClassFixture {
    class: Class,
}

pub(crate) fn class(name: &str) -> ClassFixture {
    ClassFixture {
        class: Class {
            name: name.to_string(),
            super_name: Some("java.lang.Object".to_string()),
            interfaces: Vec::new(),
            access: ClassAccess::default(),
            referenced_classes: Vec::new(),
            methods: Vec::new(),
            bootstrap_methods: Vec::new(),
        },
    }
}

pub(crate) fn interface(name: &str) -> ClassFixture {
    let mut fixture = class(name);
    fixture.class.access = ClassAccess {
        is_interface: true,
        is_abstract: true,
    };
    fixture
}

impl ClassFixture {
    pub(crate) fn extends(mut self, super_name: &str) -> Self {
        self.class.super_name = Some(super_name.to_string());
        self
    }

    pub(crate) fn implements(mut self, interface: &str) -> Self {
        self.class.interfaces.push(interface.to_string());
        self
    }

    pub(crate) fn abstract_class(mut self) -> Self {
        self.class.access.is_abstract = true;
        self
    }

    pub(crate) fn references(mut self, class_name: &str) -> Self {
        self.class.referenced_classes.push(class_name.to_string());
        self
    }

    pub(crate) fn method(mut self, method: MethodFixture) -> Self {
        self.class.methods.push(method.method);
        self
    }

    /// Adds a lambda-metafactory style bootstrap entry whose handle targets the given method.
    pub(crate) fn bootstrap_handle(mut self, owner: &str, name: &str, arguments: &[&str]) -> Self {
        self.class.bootstrap_methods.push(BootstrapMethod {
            arguments: vec![
                BootstrapArgument::Other,
                BootstrapArgument::MethodHandle(MethodHandleRef {
                    owner: owner.to_string(),
                    name: name.to_string(),
                    arguments: Some(arguments.iter().map(|arg| arg.to_string()).collect()),
                }),
                BootstrapArgument::Other,
            ],
        });
        self
    }

    pub(crate) fn bootstrap(mut self, bootstrap: BootstrapMethod) -> Self {
        self.class.bootstrap_methods.push(bootstrap);
        self
    }

    pub(crate) fn build(self) -> Class {
        self.class
    }
}

pub(crate) struct MethodFixture {
    method: Method,
    next_offset: u32,
}

/// Public concrete method with the given Java argument types.
pub(crate) fn method(name: &str, arguments: &[&str]) -> MethodFixture {
    MethodFixture {
        method: Method {
            name: name.to_string(),
            arguments: arguments.iter().map(|arg| arg.to_string()).collect(),
            access: MethodAccess {
                is_public: true,
                ..MethodAccess::default()
            },
            annotations: Vec::new(),
            line_numbers: Vec::new(),
            instructions: Vec::new(),
        },
        next_offset: 0,
    }
}

impl MethodFixture {
    pub(crate) fn private(mut self) -> Self {
        self.method.access.is_public = false;
        self
    }

    pub(crate) fn protected(mut self) -> Self {
        self.method.access.is_public = false;
        self.method.access.is_protected = true;
        self
    }

    pub(crate) fn abstract_method(mut self) -> Self {
        self.method.access.is_abstract = true;
        self
    }

    pub(crate) fn static_method(mut self) -> Self {
        self.method.access.is_static = true;
        self
    }

    pub(crate) fn native(mut self) -> Self {
        self.method.access.is_native = true;
        self
    }

    pub(crate) fn synthetic(mut self) -> Self {
        self.method.access.is_synthetic = true;
        self
    }

    pub(crate) fn annotated(mut self, annotation: &str) -> Self {
        self.method.annotations.push(annotation.to_string());
        self
    }

    /// Starts a new source line at the next instruction.
    pub(crate) fn line(mut self, line: u32) -> Self {
        self.method.line_numbers.push(LineNumber {
            start_pc: self.next_offset,
            line,
        });
        self
    }

    pub(crate) fn calls(self, kind: CallKind, owner: &str, name: &str, arguments: &[&str]) -> Self {
        self.push_call(kind, owner, name, arguments, None)
    }

    pub(crate) fn dynamic(self, owner: &str, name: &str, bootstrap_index: u16) -> Self {
        self.push_call(CallKind::Dynamic, owner, name, &[], Some(bootstrap_index))
    }

    pub(crate) fn other(mut self, opcode: u8) -> Self {
        self.method.instructions.push(Instruction {
            offset: self.next_offset,
            kind: InstructionKind::Other(opcode),
        });
        self.next_offset += 1;
        self
    }

    fn push_call(
        mut self,
        kind: CallKind,
        owner: &str,
        name: &str,
        arguments: &[&str],
        bootstrap_index: Option<u16>,
    ) -> Self {
        let call = CallSite {
            owner: owner.to_string(),
            name: name.to_string(),
            arguments: arguments.iter().map(|arg| arg.to_string()).collect(),
            kind,
            offset: self.next_offset,
            bootstrap_index,
        };
        self.method.instructions.push(Instruction {
            offset: self.next_offset,
            kind: InstructionKind::Invoke(call),
        });
        self.next_offset += if kind == CallKind::Dynamic { 5 } else { 3 };
        self
    }
}
