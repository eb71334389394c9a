use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;

pub(crate) const ACC_PUBLIC: u16 = 0x0001;
pub(crate) const ACC_PROTECTED: u16 = 0x0004;
pub(crate) const ACC_STATIC: u16 = 0x0008;
pub(crate) const ACC_SUPER: u16 = 0x0020;
pub(crate) const ACC_NATIVE: u16 = 0x0100;
pub(crate) const ACC_INTERFACE: u16 = 0x0200;
pub(crate) const ACC_ABSTRACT: u16 = 0x0400;
pub(crate) const ACC_SYNTHETIC: u16 = 0x1000;

/// `REF_invokeStatic` method handle kind.
pub(crate) const REF_INVOKE_STATIC: u8 = 6;

/// Minimal class file writer for decoding tests.
///
/// Names are taken in internal form (`com/example/Foo`). Only the constant
/// pool entries and attributes needed by call graph extraction are supported.
pub(crate) struct ClassFileBuilder {
    cp: Vec<CpEntry>,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    methods: Vec<MethodSpec>,
    bootstrap_methods: Vec<(u16, Vec<u16>)>,
}

impl ClassFileBuilder {
    pub(crate) fn new(class_name: &str, super_name: Option<&str>) -> Self {
        let mut builder = Self {
            cp: Vec::new(),
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            methods: Vec::new(),
            bootstrap_methods: Vec::new(),
        };
        builder.this_class = builder.add_class(class_name);
        if let Some(super_name) = super_name {
            builder.super_class = builder.add_class(super_name);
        }
        builder
    }

    pub(crate) fn access(mut self, access_flags: u16) -> Self {
        self.access_flags = access_flags;
        self
    }

    pub(crate) fn add_interface(&mut self, name: &str) {
        let index = self.add_class(name);
        self.interfaces.push(index);
    }

    pub(crate) fn add_utf8(&mut self, value: &str) -> u16 {
        self.push(CpEntry::Utf8(value.to_string()))
    }

    pub(crate) fn add_class(&mut self, name: &str) -> u16 {
        let name_index = self.add_utf8(name);
        self.push(CpEntry::Class(name_index))
    }

    fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.add_utf8(name);
        let descriptor_index = self.add_utf8(descriptor);
        self.push(CpEntry::NameAndType(name_index, descriptor_index))
    }

    pub(crate) fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.add_class(class);
        let name_and_type = self.add_name_and_type(name, descriptor);
        self.push(CpEntry::MethodRef(class_index, name_and_type))
    }

    pub(crate) fn add_interface_method_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> u16 {
        let class_index = self.add_class(class);
        let name_and_type = self.add_name_and_type(name, descriptor);
        self.push(CpEntry::InterfaceMethodRef(class_index, name_and_type))
    }

    pub(crate) fn add_method_handle(&mut self, kind: u8, method_ref: u16) -> u16 {
        self.push(CpEntry::MethodHandle(kind, method_ref))
    }

    pub(crate) fn add_method_type(&mut self, descriptor: &str) -> u16 {
        let descriptor_index = self.add_utf8(descriptor);
        self.push(CpEntry::MethodType(descriptor_index))
    }

    /// Adds a `BootstrapMethods` entry and returns its index in the table.
    pub(crate) fn add_bootstrap_method(&mut self, method_handle: u16, arguments: Vec<u16>) -> u16 {
        self.bootstrap_methods.push((method_handle, arguments));
        (self.bootstrap_methods.len() - 1) as u16
    }

    pub(crate) fn add_invoke_dynamic(
        &mut self,
        bootstrap_index: u16,
        name: &str,
        descriptor: &str,
    ) -> u16 {
        let name_and_type = self.add_name_and_type(name, descriptor);
        self.push(CpEntry::InvokeDynamic(bootstrap_index, name_and_type))
    }

    /// Adds a lambda-metafactory style call site whose implementation is a static method.
    pub(crate) fn add_lambda_call_site(
        &mut self,
        name: &str,
        descriptor: &str,
        implementation: (&str, &str, &str),
    ) -> u16 {
        let metafactory = self.add_method_ref(
            "java/lang/invoke/LambdaMetafactory",
            "metafactory",
            "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;",
        );
        let metafactory_handle = self.add_method_handle(REF_INVOKE_STATIC, metafactory);
        let (owner, target_name, target_descriptor) = implementation;
        let erased = self.add_method_type("(Ljava/lang/Object;)Ljava/lang/Object;");
        let target = self.add_method_ref(owner, target_name, target_descriptor);
        let target_handle = self.add_method_handle(REF_INVOKE_STATIC, target);
        let instantiated = self.add_method_type(target_descriptor);
        let bootstrap_index = self.add_bootstrap_method(
            metafactory_handle,
            vec![erased, target_handle, instantiated],
        );
        self.add_invoke_dynamic(bootstrap_index, name, descriptor)
    }

    pub(crate) fn add_method(&mut self, spec: MethodSpec) {
        self.methods.push(spec);
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        let methods = std::mem::take(&mut self.methods);
        let encoded_methods: Vec<Vec<u8>> = methods
            .iter()
            .map(|method| self.encode_method(method))
            .collect();
        let class_attributes = self.encode_bootstrap_methods();

        let mut bytes = Vec::new();
        write_u32(&mut bytes, 0xCAFEBABE);
        write_u16(&mut bytes, 0);
        write_u16(&mut bytes, 52);
        write_u16(&mut bytes, (self.cp.len() + 1) as u16);
        for entry in &self.cp {
            entry.write(&mut bytes);
        }
        write_u16(&mut bytes, self.access_flags);
        write_u16(&mut bytes, self.this_class);
        write_u16(&mut bytes, self.super_class);
        write_u16(&mut bytes, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            write_u16(&mut bytes, *interface);
        }
        write_u16(&mut bytes, 0);
        write_u16(&mut bytes, encoded_methods.len() as u16);
        for method in encoded_methods {
            bytes.extend_from_slice(&method);
        }
        write_u16(&mut bytes, class_attributes.len() as u16);
        for attribute in class_attributes {
            bytes.extend_from_slice(&attribute);
        }
        bytes
    }

    fn push(&mut self, entry: CpEntry) -> u16 {
        self.cp.push(entry);
        self.cp.len() as u16
    }

    fn encode_method(&mut self, method: &MethodSpec) -> Vec<u8> {
        let name_index = self.add_utf8(&method.name);
        let descriptor_index = self.add_utf8(&method.descriptor);
        let mut attributes = Vec::new();
        if let Some(code) = &method.code {
            attributes.push(self.encode_code(code, &method.line_numbers));
        }
        if !method.visible_annotations.is_empty() {
            attributes.push(
                self.encode_annotations("RuntimeVisibleAnnotations", &method.visible_annotations),
            );
        }
        if !method.invisible_annotations.is_empty() {
            attributes.push(self.encode_annotations(
                "RuntimeInvisibleAnnotations",
                &method.invisible_annotations,
            ));
        }

        let mut bytes = Vec::new();
        write_u16(&mut bytes, method.access_flags);
        write_u16(&mut bytes, name_index);
        write_u16(&mut bytes, descriptor_index);
        write_u16(&mut bytes, attributes.len() as u16);
        for attribute in attributes {
            bytes.extend_from_slice(&attribute);
        }
        bytes
    }

    fn encode_code(&mut self, code: &[u8], line_numbers: &[(u16, u16)]) -> Vec<u8> {
        let mut nested = Vec::new();
        if !line_numbers.is_empty() {
            let name_index = self.add_utf8("LineNumberTable");
            let mut body = Vec::new();
            write_u16(&mut body, line_numbers.len() as u16);
            for (start_pc, line) in line_numbers {
                write_u16(&mut body, *start_pc);
                write_u16(&mut body, *line);
            }
            nested.push(attribute(name_index, &body));
        }

        let name_index = self.add_utf8("Code");
        let mut body = Vec::new();
        write_u16(&mut body, 8);
        write_u16(&mut body, 8);
        write_u32(&mut body, code.len() as u32);
        body.extend_from_slice(code);
        write_u16(&mut body, 0);
        write_u16(&mut body, nested.len() as u16);
        for attribute in nested {
            body.extend_from_slice(&attribute);
        }
        attribute(name_index, &body)
    }

    fn encode_annotations(&mut self, attribute_name: &str, descriptors: &[String]) -> Vec<u8> {
        let name_index = self.add_utf8(attribute_name);
        let mut body = Vec::new();
        write_u16(&mut body, descriptors.len() as u16);
        for descriptor in descriptors {
            let type_index = self.add_utf8(descriptor);
            write_u16(&mut body, type_index);
            write_u16(&mut body, 0);
        }
        attribute(name_index, &body)
    }

    fn encode_bootstrap_methods(&mut self) -> Vec<Vec<u8>> {
        if self.bootstrap_methods.is_empty() {
            return Vec::new();
        }
        let name_index = self.add_utf8("BootstrapMethods");
        let mut body = Vec::new();
        write_u16(&mut body, self.bootstrap_methods.len() as u16);
        for (method_handle, arguments) in &self.bootstrap_methods {
            write_u16(&mut body, *method_handle);
            write_u16(&mut body, arguments.len() as u16);
            for argument in arguments {
                write_u16(&mut body, *argument);
            }
        }
        vec![attribute(name_index, &body)]
    }
}

/// Method definition for generated class files.
pub(crate) struct MethodSpec {
    pub(crate) access_flags: u16,
    pub(crate) name: String,
    pub(crate) descriptor: String,
    /// `None` for abstract and native methods.
    pub(crate) code: Option<Vec<u8>>,
    /// `(start_pc, line)` pairs.
    pub(crate) line_numbers: Vec<(u16, u16)>,
    pub(crate) visible_annotations: Vec<String>,
    pub(crate) invisible_annotations: Vec<String>,
}

impl MethodSpec {
    pub(crate) fn new(access_flags: u16, name: &str, descriptor: &str) -> Self {
        Self {
            access_flags,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code: None,
            line_numbers: Vec::new(),
            visible_annotations: Vec::new(),
            invisible_annotations: Vec::new(),
        }
    }

    pub(crate) fn code(mut self, code: Vec<u8>) -> Self {
        self.code = Some(code);
        self
    }

    pub(crate) fn line(mut self, start_pc: u16, line: u16) -> Self {
        self.line_numbers.push((start_pc, line));
        self
    }

    pub(crate) fn visible_annotation(mut self, descriptor: &str) -> Self {
        self.visible_annotations.push(descriptor.to_string());
        self
    }

    pub(crate) fn invisible_annotation(mut self, descriptor: &str) -> Self {
        self.invisible_annotations.push(descriptor.to_string());
        self
    }
}

/// Constant pool entries needed by generated class files.
enum CpEntry {
    Utf8(String),
    Class(u16),
    NameAndType(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    InvokeDynamic(u16, u16),
}

impl CpEntry {
    fn write(&self, bytes: &mut Vec<u8>) {
        match self {
            CpEntry::Utf8(value) => {
                bytes.push(1);
                write_u16(bytes, value.len() as u16);
                bytes.extend_from_slice(value.as_bytes());
            }
            CpEntry::Class(name_index) => {
                bytes.push(7);
                write_u16(bytes, *name_index);
            }
            CpEntry::NameAndType(name_index, descriptor_index) => {
                bytes.push(12);
                write_u16(bytes, *name_index);
                write_u16(bytes, *descriptor_index);
            }
            CpEntry::MethodRef(class_index, name_and_type) => {
                bytes.push(10);
                write_u16(bytes, *class_index);
                write_u16(bytes, *name_and_type);
            }
            CpEntry::InterfaceMethodRef(class_index, name_and_type) => {
                bytes.push(11);
                write_u16(bytes, *class_index);
                write_u16(bytes, *name_and_type);
            }
            CpEntry::MethodHandle(kind, reference_index) => {
                bytes.push(15);
                bytes.push(*kind);
                write_u16(bytes, *reference_index);
            }
            CpEntry::MethodType(descriptor_index) => {
                bytes.push(16);
                write_u16(bytes, *descriptor_index);
            }
            CpEntry::InvokeDynamic(bootstrap_index, name_and_type) => {
                bytes.push(18);
                write_u16(bytes, *bootstrap_index);
                write_u16(bytes, *name_and_type);
            }
        }
    }
}

fn attribute(name_index: u16, body: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    write_u16(&mut bytes, name_index);
    write_u32(&mut bytes, body.len() as u32);
    bytes.extend_from_slice(body);
    bytes
}

fn write_u16(bytes: &mut Vec<u8>, value: u16) {
    bytes.extend_from_slice(&value.to_be_bytes());
}

fn write_u32(bytes: &mut Vec<u8>, value: u32) {
    bytes.extend_from_slice(&value.to_be_bytes());
}

/// Three-byte `invoke*` instruction (virtual, special, static).
pub(crate) fn invoke(opcode: u8, index: u16) -> Vec<u8> {
    let [high, low] = index.to_be_bytes();
    vec![opcode, high, low]
}

pub(crate) fn invoke_interface(index: u16, count: u8) -> Vec<u8> {
    let [high, low] = index.to_be_bytes();
    vec![crate::opcodes::INVOKEINTERFACE, high, low, count, 0]
}

pub(crate) fn invoke_dynamic(index: u16) -> Vec<u8> {
    let [high, low] = index.to_be_bytes();
    vec![crate::opcodes::INVOKEDYNAMIC, high, low, 0, 0]
}

/// Writes a JAR holding the given entries in the given order.
pub(crate) fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = zip::ZipWriter::new(file);
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .with_context(|| format!("start entry {name}"))?;
        writer
            .write_all(data)
            .with_context(|| format!("write entry {name}"))?;
    }
    writer.finish().context("finish jar")?;
    Ok(())
}

/// Public class whose only method is a default constructor chaining to `super_name`.
pub(crate) fn simple_class(name: &str, super_name: &str) -> ClassFileBuilder {
    let mut builder = ClassFileBuilder::new(name, Some(super_name));
    let super_init = builder.add_method_ref(super_name, "<init>", "()V");
    let mut code = vec![0x2a];
    code.extend(invoke(crate::opcodes::INVOKESPECIAL, super_init));
    code.push(0xb1);
    builder.add_method(MethodSpec::new(ACC_PUBLIC, "<init>", "()V").code(code));
    builder
}
