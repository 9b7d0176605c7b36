//! Built-in translators, one per scene-description schema.

mod camera;
mod curves;
mod generic;
mod implicit;
mod instancer;
mod light;
mod material;
mod mesh;
mod points;
mod shader;
mod structure;

pub use camera::CameraTranslator;
pub use curves::CurvesTranslator;
pub use generic::{camel_case, snake_case, GenericTranslator};
pub use implicit::{ConeTranslator, CubeTranslator, CylinderTranslator, SphereTranslator};
pub use instancer::PointInstancerTranslator;
pub use light::{LightKind, LightTranslator};
pub use material::{material_outputs, MaterialTranslator};
pub use mesh::MeshTranslator;
pub use points::PointsTranslator;
pub use shader::ShaderTranslator;
pub use structure::StructureTranslator;

use sb_core::native::{ElemType, Node, NodeId, ParamValue};
use sb_core::usd::{types, Prim, Value};

use crate::context::{ReadContext, WriteContext};
use crate::convert;
use crate::translator::TranslatorRegistry;

/// Parameters every shape writer handles itself.
pub(crate) const SHAPE_COMMON: &[&str] = &["matrix", "visibility", "sidedness", "shader"];

pub fn register_all(registry: &mut TranslatorRegistry) {
    registry.register(StructureTranslator::new("Xform"));
    registry.register(StructureTranslator::new("Scope"));
    registry.register(MeshTranslator);
    registry.register(CurvesTranslator);
    registry.register(PointsTranslator);
    registry.register(SphereTranslator);
    registry.register(CubeTranslator);
    registry.register(CylinderTranslator);
    registry.register(ConeTranslator);
    registry.register(CameraTranslator);
    for kind in LightKind::ALL {
        registry.register(LightTranslator::new(kind));
    }
    registry.register(ShaderTranslator);
    registry.register(MaterialTranslator);
    registry.register(PointInstancerTranslator);
    registry.register_generic(GenericTranslator);
}

/// Read a motion-capable array attribute into `param`.
pub(crate) fn read_motion_array(
    ctx: &mut ReadContext<'_>,
    prim: &Prim,
    id: NodeId,
    attr: &str,
    param: &str,
    elem: ElemType,
) {
    let Some(keys) = ctx.samples(prim, attr) else {
        return;
    };
    match convert::to_motion_array(&keys, elem) {
        Some(array) => ctx.set(id, param, ParamValue::Array(array)),
        None => ctx.warn(prim.path(), format!("cannot convert '{}'", attr)),
    }
}

/// Read `widths` into a `radius` motion array.
pub(crate) fn read_radius(ctx: &mut ReadContext<'_>, prim: &Prim, id: NodeId) {
    let Some(keys) = ctx.samples(prim, "widths") else {
        return;
    };
    let halved: Vec<Value> = keys
        .iter()
        .filter_map(|v| v.to_floats())
        .map(|w| Value::FloatArray(w.into_iter().map(|x| x * 0.5).collect()))
        .collect();
    if let Some(array) = convert::to_motion_array(&halved, ElemType::Float) {
        ctx.set(id, "radius", ParamValue::Array(array));
    }
}

/// Write a `radius` motion array as `widths`.
pub(crate) fn write_widths(node: &Node, ctx: &mut WriteContext<'_>) {
    let Some(radius) = node.get_array("radius") else {
        return;
    };
    if radius.data.is_empty() {
        return;
    }
    let keys: Vec<Value> = (0..radius.keys)
        .filter_map(|k| radius.floats_at_key(k))
        .map(|r| Value::FloatArray(r.iter().map(|x| x * 2.0).collect()))
        .collect();
    ctx.set_motion_attr(node, "widths", types::FLOAT_ARRAY, keys);
}
