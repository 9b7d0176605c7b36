//! Shaders: `info:id = arnold:<type>` maps to the native type directly; a few
//! `UsdPreviewSurface` network nodes are converted to their native equivalents.

use sb_core::native::{
    node_entry, ElemType, Node, NodeEntry, NodeId, NodeMask, ParamType, ParamValue,
};
use sb_core::usd::{types, Attribute, Prim, Value};
use sb_math::Vec3;

use crate::context::{Connection, ConnectionKind, ReadContext, WriteContext};
use crate::convert;
use crate::translator::{TranslateResult, Translator};

/// Preview-surface inputs and the standard_surface parameters they drive.
const PREVIEW_SURFACE: &[(&str, &str)] = &[
    ("diffuseColor", "base_color"),
    ("metallic", "metalness"),
    ("roughness", "specular_roughness"),
    ("opacity", "opacity"),
    ("emissiveColor", "emission_color"),
    ("ior", "specular_IOR"),
    ("clearcoat", "coat"),
    ("clearcoatRoughness", "coat_roughness"),
    ("normal", "normal"),
];

/// Native type for a shader id.
pub fn shader_type(id: &str) -> Option<&'static str> {
    if let Some(native) = id.strip_prefix("arnold:") {
        return node_entry(native)
            .filter(|e| e.category == NodeMask::SHADER)
            .map(|e| e.name);
    }
    match id {
        "UsdPreviewSurface" => Some("standard_surface"),
        "UsdUVTexture" => Some("image"),
        "UsdPrimvarReader_float" => Some("user_data_float"),
        "UsdPrimvarReader_float3"
        | "UsdPrimvarReader_normal"
        | "UsdPrimvarReader_point"
        | "UsdPrimvarReader_vector" => Some("user_data_rgb"),
        "UsdPrimvarReader_float4" => Some("user_data_rgba"),
        "UsdPrimvarReader_int" => Some("user_data_int"),
        "UsdPrimvarReader_string" => Some("user_data_string"),
        _ => None,
    }
}

fn wrap_mode(token: &str) -> &'static str {
    match token {
        "black" => "black",
        "clamp" => "clamp",
        "mirror" => "mirror",
        "useMetadata" => "file",
        _ => "periodic",
    }
}

/// `Shader` ↔ every shader-category node type.
pub struct ShaderTranslator;

impl Translator for ShaderTranslator {
    fn schema(&self) -> &str {
        "Shader"
    }

    fn native_categories(&self) -> NodeMask {
        NodeMask::SHADER
    }

    fn node_type(&self, prim: &Prim) -> Option<&'static str> {
        let id = prim.value_at("info:id", 0.0)?;
        shader_type(id.as_str()?)
    }

    fn read(&self, prim: &Prim, ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        let shader_id = ctx.token(prim, "info:id").unwrap_or_default();
        let Some(node_type) = shader_type(&shader_id) else {
            ctx.warn(prim.path(), format!("unsupported shader '{}'", shader_id));
            return Ok(());
        };
        let Some(id) = ctx.create_node(prim.path(), "", node_type)? else {
            return Ok(());
        };

        match shader_id.as_str() {
            "UsdPreviewSurface" => {
                ctx.set(id, "base", ParamValue::Float(1.0));
                for (input, param) in PREVIEW_SURFACE {
                    read_input(ctx, prim, id, input, param);
                }
                if prim.has_attribute("inputs:emissiveColor") {
                    ctx.set(id, "emission", ParamValue::Float(1.0));
                }
            }
            "UsdUVTexture" => {
                read_input(ctx, prim, id, "file", "filename");
                for (input, param) in [("wrapS", "swrap"), ("wrapT", "twrap")] {
                    if let Some(token) = ctx.token(prim, &format!("inputs:{}", input)) {
                        ctx.set(id, param, ParamValue::Enum(wrap_mode(&token).to_string()));
                    }
                }
            }
            other if other.starts_with("UsdPrimvarReader_") => {
                read_input(ctx, prim, id, "varname", "attribute");
                read_input(ctx, prim, id, "fallback", "default");
            }
            _ => {
                let inputs: Vec<(&str, &Attribute)> = prim
                    .attributes()
                    .filter_map(|(name, attr)| Some((name.strip_prefix("inputs:")?, attr)))
                    .collect();
                for (param, _) in inputs {
                    read_input(ctx, prim, id, param, param);
                }
            }
        }

        ctx.read_custom(prim, id, &[]);
        Ok(())
    }

    fn write(&self, node: &Node, ctx: &mut WriteContext<'_>) -> TranslateResult<()> {
        ctx.set_uniform_attr(
            "info:id",
            types::TOKEN,
            Value::token(format!("arnold:{}", node.node_type())),
        );
        for def in &node.entry().params {
            let name = format!("inputs:{}", def.name);
            match def.ty {
                ParamType::Node | ParamType::Array(ElemType::Node) => {
                    ctx.write_node_param(node, def.name, &name);
                }
                _ if ctx.should_write(node, def.name) => ctx.set_param_attr(node, def.name, &name),
                _ => {}
            }
        }
        ctx.write_links(node, "inputs:", &[]);
        ctx.write_user_params(node);
        Ok(())
    }
}

/// Read `inputs:<input>` into `param`: a connection becomes a deferred link, a value is
/// converted to the parameter's type.
fn read_input(ctx: &mut ReadContext<'_>, prim: &Prim, id: NodeId, input: &str, param: &str) {
    let Some(attr) = prim.attribute(&format!("inputs:{}", input)) else {
        return;
    };
    let Some(def) = node_entry_of(ctx, id).and_then(|e| e.param(param)) else {
        ctx.warn(prim.path(), format!("shader has no parameter '{}'", param));
        return;
    };
    if let Some(target) = attr.connections.first() {
        ctx.connect(Connection {
            node: id,
            param: def.name.to_string(),
            kind: ConnectionKind::Link,
            targets: vec![target.clone()],
            source: prim.path().clone(),
        });
        return;
    }
    let Some(value) = attr.value_at(ctx.frame()) else {
        return;
    };
    // Preview opacity is a scalar; native opacity is a color.
    let value = match (def.ty, value.as_f32()) {
        (ParamType::Rgb, Some(scalar)) if value.as_vec3().is_none() => {
            Some(ParamValue::Rgb(Vec3::splat(scalar)))
        }
        _ => convert::to_param(&value, def.ty),
    };
    match value {
        Some(value) => ctx.set(id, def.name, value),
        None => ctx.warn(
            prim.path(),
            format!("cannot convert input '{}' to {}", input, def.ty),
        ),
    }
}

fn node_entry_of(ctx: &ReadContext<'_>, id: NodeId) -> Option<&'static NodeEntry> {
    ctx.universe().with_node(id, |n| n.entry()).ok()
}
