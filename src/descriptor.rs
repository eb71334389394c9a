use std::str::FromStr;

use anyhow::{Context, Result};
use jdescriptor::{MethodDescriptor, TypeDescriptor};

/// Java source names of the parameter types in a JVM method descriptor.
pub(crate) fn java_arguments(descriptor: &str) -> Result<Vec<String>> {
    let descriptor =
        MethodDescriptor::from_str(descriptor).context("parse method descriptor")?;
    Ok(descriptor
        .parameter_types()
        .iter()
        .map(java_type_name)
        .collect())
}

/// Java source name of the return type in a JVM method descriptor.
pub(crate) fn java_return_type(descriptor: &str) -> Result<String> {
    let descriptor =
        MethodDescriptor::from_str(descriptor).context("parse method descriptor")?;
    Ok(java_type_name(descriptor.return_type()))
}

/// Converts an internal class name (`java/lang/String`, `[I`) to its Java form.
pub(crate) fn java_class_name(internal: &str) -> Result<String> {
    if !internal.starts_with('[') {
        return Ok(internal.replace('/', "."));
    }
    // Array owners are field descriptors; reuse the method descriptor parser.
    let wrapped = format!("({internal})V");
    let mut arguments =
        java_arguments(&wrapped).with_context(|| format!("parse array type {internal}"))?;
    arguments
        .pop()
        .with_context(|| format!("empty array type {internal}"))
}

/// Converts a `Lpkg/Name;` descriptor (as used by annotations) to `pkg.Name`.
pub(crate) fn java_name_from_type_descriptor(descriptor: &str) -> String {
    let trimmed = descriptor
        .strip_prefix('L')
        .and_then(|value| value.strip_suffix(';'))
        .unwrap_or(descriptor);
    trimmed.replace('/', ".")
}

fn java_type_name(ty: &TypeDescriptor) -> String {
    match ty {
        TypeDescriptor::Byte => "byte".to_string(),
        TypeDescriptor::Char => "char".to_string(),
        TypeDescriptor::Double => "double".to_string(),
        TypeDescriptor::Float => "float".to_string(),
        TypeDescriptor::Integer => "int".to_string(),
        TypeDescriptor::Long => "long".to_string(),
        TypeDescriptor::Short => "short".to_string(),
        TypeDescriptor::Boolean => "boolean".to_string(),
        TypeDescriptor::Void => "void".to_string(),
        TypeDescriptor::Object(name) => name.replace('/', "."),
        TypeDescriptor::Array(element, dimensions) => {
            format!("{}{}", java_type_name(element), "[]".repeat(*dimensions as usize))
        }
    }
}
