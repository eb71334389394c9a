use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jclassfile::attributes::Attribute;
use jclassfile::class_file::{self, ClassFlags};
use jclassfile::constant_pool::ConstantPool;
use jclassfile::methods::MethodFlags;
use rayon::prelude::*;
use tracing::debug;
use zip::ZipArchive;

use crate::descriptor::{
    java_arguments, java_class_name, java_name_from_type_descriptor, java_return_type,
};
use crate::ir::{
    BootstrapArgument, BootstrapMethod, CallKind, CallSite, Class, ClassAccess, Instruction,
    InstructionKind, LineNumber, Method, MethodAccess, MethodHandleRef,
};
use crate::opcodes;

/// Raw class file bytes read from an archive, labelled by entry name.
struct ClassEntry {
    name: String,
    data: Vec<u8>,
}

/// Decodes every class of one input, in archive-entry order.
///
/// Inputs are JAR files, directories of class files, or single class files.
pub(crate) fn scan_archive(path: &Path) -> Result<Vec<Class>> {
    let entries = if path.is_dir() {
        let mut entries = Vec::new();
        read_dir_entries(path, path, &mut entries)?;
        entries
    } else {
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        match extension {
            "class" => vec![ClassEntry {
                name: path.display().to_string(),
                data: fs::read(path).with_context(|| format!("failed to read {}", path.display()))?,
            }],
            _ if is_jar_path(path) => read_jar_entries(path)?,
            _ => anyhow::bail!("unsupported input file: {}", path.display()),
        }
    };

    // Decoding is independent per class; the indexed collect keeps entry order.
    let classes = entries
        .par_iter()
        .map(|entry| {
            parse_class_bytes(&entry.data)
                .with_context(|| format!("failed to parse {}:{}", path.display(), entry.name))
        })
        .collect::<Result<Vec<_>>>()?;
    debug!("decoded {} classes from {}", classes.len(), path.display());
    Ok(classes)
}

fn read_dir_entries(root: &Path, path: &Path, entries: &mut Vec<ClassEntry>) -> Result<()> {
    let mut children = Vec::new();
    for entry in fs::read_dir(path)
        .with_context(|| format!("failed to read directory {}", path.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed to read entry under {}", path.display()))?;
        children.push(entry.path());
    }

    children.sort_by(|a, b| path_key(a).cmp(&path_key(b)));

    for child in children {
        if child.is_dir() {
            read_dir_entries(root, &child, entries)?;
            continue;
        }
        if !is_class_entry(&path_key(&child)) {
            continue;
        }
        let data =
            fs::read(&child).with_context(|| format!("failed to read {}", child.display()))?;
        let name = child
            .strip_prefix(root)
            .map(path_key)
            .unwrap_or_else(|_| path_key(&child));
        entries.push(ClassEntry { name, data });
    }
    Ok(())
}

fn read_jar_entries(path: &Path) -> Result<Vec<ClassEntry>> {
    let file =
        fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("failed to read {}", path.display()))?;

    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if !is_class_entry(&name) {
            continue;
        }
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;
        entries.push(ClassEntry { name, data });
    }
    Ok(entries)
}

fn is_class_entry(name: &str) -> bool {
    name.ends_with(".class")
        && !name.ends_with("module-info.class")
        && !name.starts_with("META-INF/versions/")
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn is_jar_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jar"))
        .unwrap_or(false)
}

fn parse_class_bytes(data: &[u8]) -> Result<Class> {
    let class_file = class_file::parse(data).context("failed to parse class file bytes")?;
    let constant_pool = class_file.constant_pool();
    let name = resolve_class_name(constant_pool, class_file.this_class())
        .context("resolve class name")?;
    let super_name = if class_file.super_class() == 0 {
        None
    } else {
        Some(
            resolve_class_name(constant_pool, class_file.super_class())
                .context("resolve super class name")?,
        )
    };
    let mut interfaces = Vec::new();
    for interface in class_file.interfaces() {
        interfaces
            .push(resolve_class_name(constant_pool, *interface).context("resolve interface name")?);
    }

    let access_flags = class_file.access_flags();
    let access = ClassAccess {
        is_interface: access_flags.contains(ClassFlags::ACC_INTERFACE),
        is_abstract: access_flags.contains(ClassFlags::ACC_ABSTRACT),
    };

    let mut referenced = BTreeSet::new();
    for entry in constant_pool {
        if let ConstantPool::Class { name_index } = entry {
            let raw = resolve_utf8(constant_pool, *name_index)
                .context("resolve referenced class name")?;
            if let Some(normalized) = normalize_class_name(&raw) {
                referenced.insert(java_class_name(&normalized)?);
            }
        }
    }
    referenced.remove(&name);

    let bootstrap_methods = parse_bootstrap_methods(constant_pool, class_file.attributes());
    let methods =
        parse_methods(constant_pool, class_file.methods()).context("parse method bytecode")?;

    Ok(Class {
        name,
        super_name,
        interfaces,
        access,
        referenced_classes: referenced.into_iter().collect(),
        methods,
        bootstrap_methods,
    })
}

/// Resolves a class constant to its Java name (`a/b/C` → `a.b.C`, `[I` → `int[]`).
fn resolve_class_name(constant_pool: &[ConstantPool], class_index: u16) -> Result<String> {
    let entry = constant_pool
        .get(class_index as usize)
        .context("missing class entry")?;
    match entry {
        ConstantPool::Class { name_index } => {
            java_class_name(&resolve_utf8(constant_pool, *name_index)?)
        }
        _ => anyhow::bail!("unexpected class entry"),
    }
}

fn resolve_utf8(constant_pool: &[ConstantPool], index: u16) -> Result<String> {
    let entry = constant_pool
        .get(index as usize)
        .context("missing utf8 entry")?;
    match entry {
        ConstantPool::Utf8 { value } => Ok(value.clone()),
        _ => anyhow::bail!("unexpected utf8 entry"),
    }
}

/// Element class of an array class constant; `None` for primitive arrays.
fn normalize_class_name(raw: &str) -> Option<String> {
    if !raw.starts_with('[') {
        return Some(raw.to_string());
    }
    let mut slice = raw;
    while let Some(rest) = slice.strip_prefix('[') {
        slice = rest;
    }
    if let Some(class_name) = slice.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
        return Some(class_name.to_string());
    }
    None
}

fn parse_bootstrap_methods(
    constant_pool: &[ConstantPool],
    attributes: &[Attribute],
) -> Vec<BootstrapMethod> {
    let Some(records) = attributes.iter().find_map(|attribute| match attribute {
        Attribute::BootstrapMethods {
            bootstrap_methods, ..
        } => Some(bootstrap_methods),
        _ => None,
    }) else {
        return Vec::new();
    };
    records
        .iter()
        .map(|record| BootstrapMethod {
            arguments: record
                .bootstrap_arguments()
                .iter()
                .map(|index| bootstrap_argument(constant_pool, *index))
                .collect(),
        })
        .collect()
}

fn bootstrap_argument(constant_pool: &[ConstantPool], index: u16) -> BootstrapArgument {
    match constant_pool.get(index as usize) {
        Some(ConstantPool::MethodHandle {
            reference_index, ..
        }) => match resolve_method_ref(constant_pool, *reference_index) {
            Ok(method_ref) => BootstrapArgument::MethodHandle(MethodHandleRef {
                owner: method_ref.owner,
                name: method_ref.name,
                arguments: java_arguments(&method_ref.descriptor).ok(),
            }),
            Err(err) => {
                debug!("unresolved method handle at constant {}: {:#}", index, err);
                BootstrapArgument::Unresolved
            }
        },
        Some(_) => BootstrapArgument::Other,
        None => BootstrapArgument::Unresolved,
    }
}

fn parse_methods(
    constant_pool: &[ConstantPool],
    methods: &[jclassfile::methods::MethodInfo],
) -> Result<Vec<Method>> {
    let mut parsed = Vec::new();
    for method in methods {
        let name =
            resolve_utf8(constant_pool, method.name_index()).context("resolve method name")?;
        let descriptor = resolve_utf8(constant_pool, method.descriptor_index())
            .context("resolve method descriptor")?;
        let arguments = java_arguments(&descriptor)
            .with_context(|| format!("parse arguments of {name}{descriptor}"))?;
        let access_flags = method.access_flags();
        let access = MethodAccess {
            is_public: access_flags.contains(MethodFlags::ACC_PUBLIC),
            is_protected: access_flags.contains(MethodFlags::ACC_PROTECTED),
            is_static: access_flags.contains(MethodFlags::ACC_STATIC),
            is_abstract: access_flags.contains(MethodFlags::ACC_ABSTRACT),
            is_native: access_flags.contains(MethodFlags::ACC_NATIVE),
            is_synthetic: access_flags.contains(MethodFlags::ACC_SYNTHETIC),
        };
        let annotations = parse_annotations(constant_pool, method.attributes())
            .with_context(|| format!("parse annotations of {name}"))?;

        let code = method
            .attributes()
            .iter()
            .find_map(|attribute| match attribute {
                Attribute::Code {
                    code, attributes, ..
                } => Some((code, attributes)),
                _ => None,
            });
        let (line_numbers, instructions) = match code {
            Some((code, code_attributes)) => (
                parse_line_numbers(code_attributes),
                parse_bytecode(code, constant_pool)
                    .with_context(|| format!("parse bytecode of {name}{descriptor}"))?,
            ),
            None => (Vec::new(), Vec::new()),
        };

        parsed.push(Method {
            name,
            arguments,
            access,
            annotations,
            line_numbers,
            instructions,
        });
    }
    Ok(parsed)
}

/// Runtime visible and invisible annotation types, dotted, in declaration order.
fn parse_annotations(
    constant_pool: &[ConstantPool],
    attributes: &[Attribute],
) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for attribute in attributes {
        let annotations = match attribute {
            Attribute::RuntimeVisibleAnnotations { annotations, .. }
            | Attribute::RuntimeInvisibleAnnotations { annotations, .. } => annotations,
            _ => continue,
        };
        for annotation in annotations {
            let descriptor = resolve_utf8(constant_pool, annotation.type_index())
                .context("resolve annotation type")?;
            names.push(java_name_from_type_descriptor(&descriptor));
        }
    }
    Ok(names)
}

fn parse_line_numbers(attributes: &[Attribute]) -> Vec<LineNumber> {
    let mut entries = Vec::new();
    for attribute in attributes {
        let Attribute::LineNumberTable { line_number_table } = attribute else {
            continue;
        };
        for record in line_number_table {
            entries.push(LineNumber {
                start_pc: record.start_pc() as u32,
                line: record.line_number() as u32,
            });
        }
    }
    entries.sort_by_key(|entry| entry.start_pc);
    entries
}

fn parse_bytecode(code: &[u8], constant_pool: &[ConstantPool]) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut offset = 0usize;
    while offset < code.len() {
        let opcode = code[offset];
        let start_offset = offset as u32;
        let length = opcode_length(code, offset)?;
        if length == 0 || offset + length > code.len() {
            anyhow::bail!("invalid bytecode length at offset {}", offset);
        }
        let kind = match opcode {
            opcodes::INVOKEVIRTUAL
            | opcodes::INVOKESPECIAL
            | opcodes::INVOKESTATIC
            | opcodes::INVOKEINTERFACE => {
                let method_index = read_u16(code, offset + 1)?;
                let method_ref = resolve_method_ref(constant_pool, method_index)
                    .context("resolve method ref")?;
                let call_kind = match opcode {
                    opcodes::INVOKEVIRTUAL => CallKind::Virtual,
                    opcodes::INVOKESPECIAL => CallKind::Special,
                    opcodes::INVOKESTATIC => CallKind::Static,
                    _ => CallKind::Interface,
                };
                InstructionKind::Invoke(CallSite {
                    arguments: java_arguments(&method_ref.descriptor)?,
                    owner: method_ref.owner,
                    name: method_ref.name,
                    kind: call_kind,
                    offset: start_offset,
                    bootstrap_index: None,
                })
            }
            opcodes::INVOKEDYNAMIC => {
                let index = read_u16(code, offset + 1)?;
                InstructionKind::Invoke(
                    resolve_dynamic_call(constant_pool, index, start_offset)
                        .context("resolve invokedynamic")?,
                )
            }
            _ => InstructionKind::Other(opcode),
        };

        instructions.push(Instruction {
            offset: start_offset,
            kind,
        });
        offset += length;
    }
    Ok(instructions)
}

/// Resolved constant pool method reference, owner in Java form.
struct MethodRef {
    owner: String,
    name: String,
    descriptor: String,
}

fn resolve_method_ref(constant_pool: &[ConstantPool], index: u16) -> Result<MethodRef> {
    let entry = constant_pool
        .get(index as usize)
        .context("missing method ref entry")?;
    let (class_index, name_and_type_index) = match entry {
        ConstantPool::Methodref {
            class_index,
            name_and_type_index,
        } => (*class_index, *name_and_type_index),
        ConstantPool::InterfaceMethodref {
            class_index,
            name_and_type_index,
        } => (*class_index, *name_and_type_index),
        _ => anyhow::bail!("unexpected method ref entry"),
    };
    let owner = resolve_class_name(constant_pool, class_index).context("resolve owner")?;
    let (name, descriptor) = resolve_name_and_type(constant_pool, name_and_type_index)?;
    Ok(MethodRef {
        owner,
        name,
        descriptor,
    })
}

/// Call site of an `invokedynamic`: the produced functional interface and its method name.
fn resolve_dynamic_call(
    constant_pool: &[ConstantPool],
    index: u16,
    offset: u32,
) -> Result<CallSite> {
    let entry = constant_pool
        .get(index as usize)
        .context("missing invokedynamic entry")?;
    let ConstantPool::InvokeDynamic {
        bootstrap_method_attr_index,
        name_and_type_index,
    } = entry
    else {
        anyhow::bail!("unexpected invokedynamic entry");
    };
    let (name, descriptor) = resolve_name_and_type(constant_pool, *name_and_type_index)?;
    Ok(CallSite {
        owner: java_return_type(&descriptor)?,
        arguments: java_arguments(&descriptor)?,
        name,
        kind: CallKind::Dynamic,
        offset,
        bootstrap_index: Some(*bootstrap_method_attr_index),
    })
}

fn resolve_name_and_type(constant_pool: &[ConstantPool], index: u16) -> Result<(String, String)> {
    let entry = constant_pool
        .get(index as usize)
        .context("missing name and type entry")?;
    match entry {
        ConstantPool::NameAndType {
            name_index,
            descriptor_index,
        } => Ok((
            resolve_utf8(constant_pool, *name_index).context("resolve method name")?,
            resolve_utf8(constant_pool, *descriptor_index).context("resolve method descriptor")?,
        )),
        _ => anyhow::bail!("unexpected name and type entry"),
    }
}

fn opcode_length(code: &[u8], offset: usize) -> Result<usize> {
    let opcode = code[offset];
    let length = match opcode {
        0x00..=0x0f => 1,
        0x10 => 2,
        0x11 => 3,
        opcodes::LDC => 2,
        opcodes::LDC_W | opcodes::LDC2_W => 3,
        0x15..=0x19 => 2,
        0x1a..=0x35 => 1,
        0x36..=0x3a => 2,
        0x3b..=0x83 => 1,
        0x84 => 3,
        0x85..=0x98 => 1,
        0x99..=0xa6 => 3,
        opcodes::GOTO | opcodes::JSR => 3,
        0xa9 => 2,
        opcodes::TABLESWITCH => tableswitch_length(code, offset)?,
        opcodes::LOOKUPSWITCH => lookupswitch_length(code, offset)?,
        0xac..=0xb1 => 1,
        0xb2..=0xb5 => 3,
        opcodes::INVOKEVIRTUAL | opcodes::INVOKESPECIAL | opcodes::INVOKESTATIC => 3,
        opcodes::INVOKEINTERFACE | opcodes::INVOKEDYNAMIC => 5,
        0xbb => 3,
        0xbc => 2,
        0xbd => 3,
        0xbe | 0xbf => 1,
        0xc0 | 0xc1 => 3,
        0xc2 | 0xc3 => 1,
        opcodes::WIDE => wide_length(code, offset)?,
        0xc5 => 4,
        0xc6 | 0xc7 => 3,
        opcodes::GOTO_W | opcodes::JSR_W => 5,
        0xca => 1,
        0xfe | 0xff => 1,
        _ => anyhow::bail!("unsupported opcode 0x{:02x}", opcode),
    };
    Ok(length)
}

fn tableswitch_length(code: &[u8], offset: usize) -> Result<usize> {
    let padding = padding(offset);
    let base = offset + 1 + padding;
    let low = read_i32(code, base + 4)?;
    let high = read_i32(code, base + 8)?;
    let count = high
        .checked_sub(low)
        .and_then(|v| v.checked_add(1))
        .context("invalid tableswitch range")?;
    if count < 0 {
        anyhow::bail!("invalid tableswitch range");
    }
    Ok(1 + padding + 12 + (count as usize) * 4)
}

fn lookupswitch_length(code: &[u8], offset: usize) -> Result<usize> {
    let padding = padding(offset);
    let base = offset + 1 + padding;
    let npairs = read_i32(code, base + 4)?;
    if npairs < 0 {
        anyhow::bail!("invalid lookupswitch pairs");
    }
    Ok(1 + padding + 8 + (npairs as usize) * 8)
}

fn wide_length(code: &[u8], offset: usize) -> Result<usize> {
    let opcode = code
        .get(offset + 1)
        .copied()
        .context("missing wide opcode")?;
    if opcode == 0x84 { Ok(6) } else { Ok(4) }
}

fn padding(offset: usize) -> usize {
    (4 - ((offset + 1) % 4)) % 4
}

fn read_u16(code: &[u8], offset: usize) -> Result<u16> {
    let slice = code
        .get(offset..offset + 2)
        .context("bytecode u16 out of bounds")?;
    Ok(u16::from_be_bytes([slice[0], slice[1]]))
}

fn read_i32(code: &[u8], offset: usize) -> Result<i32> {
    let slice = code
        .get(offset..offset + 4)
        .context("bytecode i32 out of bounds")?;
    Ok(i32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// Canonical form of an input path; equal paths denote the same archive.
pub(crate) fn canonical_archive_path(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).with_context(|| format!("input not found: {}", path.display()))
}
