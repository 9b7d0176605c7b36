//! USDA text output.

use std::fmt::Write as _;

use super::attribute::{Attribute, Relationship};
use super::layer::{Layer, PrimSpec};
use super::path::ScenePath;
use super::value::{push_quoted, Value};

const INDENT: &str = "    ";

/// Serialize a layer to USDA text. Prims are written in child order.
pub fn write_usda(layer: &Layer) -> String {
    let mut out = String::from("#usda 1.0\n");
    write_layer_metadata(&mut out, layer);

    let root = ScenePath::root();
    for name in layer.children_of(&root) {
        if let Ok(path) = root.child(name) {
            out.push('\n');
            write_prim(&mut out, layer, &path, 0);
        }
    }
    out
}

fn write_layer_metadata(out: &mut String, layer: &Layer) {
    let meta = &layer.metadata;
    let mut entries = Vec::new();
    if let Some(doc) = &meta.doc {
        entries.push(format!("doc = {}", Value::String(doc.clone()).to_usda()));
    }
    if let Some(prim) = &meta.default_prim {
        entries.push(format!("defaultPrim = {}", Value::String(prim.clone()).to_usda()));
    }
    if let Some(v) = meta.start_time_code {
        entries.push(format!("startTimeCode = {}", v));
    }
    if let Some(v) = meta.end_time_code {
        entries.push(format!("endTimeCode = {}", v));
    }
    if let Some(v) = meta.time_codes_per_second {
        entries.push(format!("timeCodesPerSecond = {}", v));
    }
    if let Some(v) = meta.meters_per_unit {
        entries.push(format!("metersPerUnit = {}", v));
    }
    if let Some(axis) = &meta.up_axis {
        entries.push(format!("upAxis = {}", Value::String(axis.clone()).to_usda()));
    }
    if entries.is_empty() {
        return;
    }
    out.push_str("(\n");
    for entry in entries {
        let _ = writeln!(out, "{}{}", INDENT, entry);
    }
    out.push_str(")\n");
}

fn write_prim(out: &mut String, layer: &Layer, path: &ScenePath, depth: usize) {
    let Some(spec) = layer.prim(path) else {
        return;
    };
    let pad = INDENT.repeat(depth);

    let _ = write!(out, "{}{} ", pad, spec.specifier.keyword());
    if let Some(type_name) = &spec.type_name {
        let _ = write!(out, "{} ", type_name);
    }
    push_quoted(out, path.name());
    out.push('\n');

    write_prim_metadata(out, spec, &pad);

    let _ = writeln!(out, "{}{{", pad);
    let inner = INDENT.repeat(depth + 1);
    for (name, attr) in &spec.attributes {
        write_attribute(out, &inner, name, attr);
    }
    for (name, rel) in &spec.relationships {
        write_relationship(out, &inner, name, rel);
    }
    for (i, child) in spec.children.iter().enumerate() {
        if i > 0 || !spec.attributes.is_empty() || !spec.relationships.is_empty() {
            out.push('\n');
        }
        if let Ok(child_path) = path.child(child) {
            write_prim(out, layer, &child_path, depth + 1);
        }
    }
    let _ = writeln!(out, "{}}}", pad);
}

fn write_prim_metadata(out: &mut String, spec: &PrimSpec, pad: &str) {
    let mut entries = Vec::new();
    if let Some(active) = spec.active {
        entries.push(format!("active = {}", active));
    }
    if let Some(kind) = &spec.kind {
        entries.push(format!("kind = {}", Value::String(kind.clone()).to_usda()));
    }
    for (key, value) in &spec.metadata {
        let text = match value {
            Value::Bool(b) => b.to_string(),
            other => other.to_usda(),
        };
        entries.push(format!("{} = {}", key, text));
    }
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}(", pad);
    for entry in entries {
        let _ = writeln!(out, "{}{}{}", pad, INDENT, entry);
    }
    let _ = writeln!(out, "{})", pad);
}

fn declaration(attr: &Attribute, name: &str) -> String {
    let mut decl = String::new();
    if attr.custom {
        decl.push_str("custom ");
    }
    if attr.uniform {
        decl.push_str("uniform ");
    }
    let _ = write!(decl, "{} {}", attr.type_name, name);
    decl
}

fn write_attribute(out: &mut String, pad: &str, name: &str, attr: &Attribute) {
    let decl = declaration(attr, name);
    let metadata = attribute_metadata(attr);

    // A bare declaration still has to be written when it carries nothing else.
    let bare = !attr.has_value() && attr.connections.is_empty();
    if attr.default.is_some() || bare {
        let _ = write!(out, "{}{}", pad, decl);
        if let Some(value) = &attr.default {
            let _ = write!(out, " = {}", value.to_usda());
        }
        out.push_str(&metadata);
        out.push('\n');
    }
    if !attr.time_samples.is_empty() {
        let _ = writeln!(out, "{}{}.timeSamples = {{", pad, decl);
        for (time, value) in &attr.time_samples {
            let _ = writeln!(out, "{}{}{}: {},", pad, INDENT, time, value.to_usda());
        }
        let _ = write!(out, "{}}}", pad);
        if attr.default.is_none() {
            out.push_str(&metadata);
        }
        out.push('\n');
    }
    if !attr.connections.is_empty() {
        let targets: Vec<String> = attr.connections.iter().map(|t| format!("<{}>", t)).collect();
        let value = if targets.len() == 1 {
            targets[0].clone()
        } else {
            format!("[{}]", targets.join(", "))
        };
        let _ = writeln!(out, "{}{}.connect = {}", pad, decl, value);
    }
}

fn attribute_metadata(attr: &Attribute) -> String {
    let mut entries = Vec::new();
    if let Some(interp) = &attr.interpolation {
        entries.push(format!("interpolation = {}", Value::String(interp.clone()).to_usda()));
    }
    if let Some(size) = attr.element_size {
        entries.push(format!("elementSize = {}", size));
    }
    if entries.is_empty() {
        String::new()
    } else {
        format!(" ({})", entries.join("; "))
    }
}

fn write_relationship(out: &mut String, pad: &str, name: &str, rel: &Relationship) {
    let custom = if rel.custom { "custom " } else { "" };
    let targets: Vec<String> = rel.targets.iter().map(|t| format!("<{}>", t)).collect();
    let value = match targets.len() {
        0 => "None".to_string(),
        1 => targets[0].clone(),
        _ => format!("[{}]", targets.join(", ")),
    };
    let _ = writeln!(out, "{}{}rel {} = {}", pad, custom, name, value);
}
