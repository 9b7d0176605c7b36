//! Implicit surfaces. Their schema fallbacks differ from the native defaults, so values are
//! always set on read and always authored on write.

use sb_core::native::{Node, ParamValue};
use sb_core::usd::{types, Prim, Value};
use sb_math::Vec3;

use crate::context::{ReadContext, WriteContext};
use crate::translator::{TranslateResult, Translator};
use crate::translators::SHAPE_COMMON;

fn axis_of(token: Option<String>) -> Vec3 {
    match token.as_deref() {
        Some("X") => Vec3::X,
        Some("Y") => Vec3::Y,
        _ => Vec3::Z,
    }
}

/// `Sphere` ↔ `sphere`. Offset spheres are written generically.
pub struct SphereTranslator;

impl Translator for SphereTranslator {
    fn schema(&self) -> &str {
        "Sphere"
    }

    fn native_types(&self) -> &[&'static str] {
        &["sphere"]
    }

    fn node_type(&self, _prim: &Prim) -> Option<&'static str> {
        Some("sphere")
    }

    fn read(&self, prim: &Prim, ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        let Some(id) = ctx.create_node(prim.path(), "", "sphere")? else {
            return Ok(());
        };
        ctx.read_shape_common(prim, id);
        let radius = ctx.float(prim, "radius").unwrap_or(1.0);
        ctx.set(id, "radius", ParamValue::Float(radius));
        ctx.read_custom(prim, id, &[]);
        Ok(())
    }

    fn write_type(&self, node: &Node) -> Option<String> {
        (node.get_vec3("center") == Vec3::ZERO).then(|| "Sphere".to_string())
    }

    fn write(&self, node: &Node, ctx: &mut WriteContext<'_>) -> TranslateResult<()> {
        ctx.write_shape_common(node);
        ctx.set_attr(
            "radius",
            types::DOUBLE,
            Value::Double(node.get_float("radius") as f64),
        );
        let skip: Vec<&str> = SHAPE_COMMON.iter().chain(&["center", "radius"]).copied().collect();
        ctx.write_arnold_params(node, &skip);
        Ok(())
    }
}

/// `Cube` ↔ `box`. Only centred cubes have a schema counterpart.
pub struct CubeTranslator;

impl Translator for CubeTranslator {
    fn schema(&self) -> &str {
        "Cube"
    }

    fn native_types(&self) -> &[&'static str] {
        &["box"]
    }

    fn node_type(&self, _prim: &Prim) -> Option<&'static str> {
        Some("box")
    }

    fn read(&self, prim: &Prim, ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        let Some(id) = ctx.create_node(prim.path(), "", "box")? else {
            return Ok(());
        };
        ctx.read_shape_common(prim, id);
        let half = ctx.float(prim, "size").unwrap_or(2.0) * 0.5;
        ctx.set(id, "min", ParamValue::Vector(Vec3::splat(-half)));
        ctx.set(id, "max", ParamValue::Vector(Vec3::splat(half)));
        ctx.read_custom(prim, id, &[]);
        Ok(())
    }

    fn write_type(&self, node: &Node) -> Option<String> {
        let min = node.get_vec3("min");
        let max = node.get_vec3("max");
        let cubic = max == Vec3::splat(max.x) && min == -max;
        cubic.then(|| "Cube".to_string())
    }

    fn write(&self, node: &Node, ctx: &mut WriteContext<'_>) -> TranslateResult<()> {
        ctx.write_shape_common(node);
        let size = node.get_vec3("max").x as f64 * 2.0;
        ctx.set_attr("size", types::DOUBLE, Value::Double(size));
        let skip: Vec<&str> = SHAPE_COMMON.iter().chain(&["min", "max"]).copied().collect();
        ctx.write_arnold_params(node, &skip);
        Ok(())
    }
}

/// `Cylinder` → `cylinder`. Cylinders are written back as `ArnoldCylinder`.
pub struct CylinderTranslator;

impl Translator for CylinderTranslator {
    fn schema(&self) -> &str {
        "Cylinder"
    }

    fn node_type(&self, _prim: &Prim) -> Option<&'static str> {
        Some("cylinder")
    }

    fn read(&self, prim: &Prim, ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        let Some(id) = ctx.create_node(prim.path(), "", "cylinder")? else {
            return Ok(());
        };
        ctx.read_shape_common(prim, id);
        let radius = ctx.float(prim, "radius").unwrap_or(1.0);
        let height = ctx.float(prim, "height").unwrap_or(2.0);
        let axis = axis_of(ctx.token(prim, "axis"));
        ctx.set(id, "bottom", ParamValue::Vector(axis * -0.5 * height));
        ctx.set(id, "top", ParamValue::Vector(axis * 0.5 * height));
        ctx.set(id, "radius", ParamValue::Float(radius));
        ctx.read_custom(prim, id, &[]);
        Ok(())
    }
}

/// `Cone` → `cone`, apex at the top. Written back as `ArnoldCone`.
pub struct ConeTranslator;

impl Translator for ConeTranslator {
    fn schema(&self) -> &str {
        "Cone"
    }

    fn node_type(&self, _prim: &Prim) -> Option<&'static str> {
        Some("cone")
    }

    fn read(&self, prim: &Prim, ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        let Some(id) = ctx.create_node(prim.path(), "", "cone")? else {
            return Ok(());
        };
        ctx.read_shape_common(prim, id);
        let radius = ctx.float(prim, "radius").unwrap_or(1.0);
        let height = ctx.float(prim, "height").unwrap_or(2.0);
        let axis = axis_of(ctx.token(prim, "axis"));
        ctx.set(id, "bottom", ParamValue::Vector(axis * -0.5 * height));
        ctx.set(id, "top", ParamValue::Vector(axis * 0.5 * height));
        ctx.set(id, "bottom_radius", ParamValue::Float(radius));
        ctx.set(id, "top_radius", ParamValue::Float(0.0));
        ctx.read_custom(prim, id, &[]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::native::Universe;

    #[test]
    fn test_axis() {
        assert_eq!(axis_of(None), Vec3::Z);
        assert_eq!(axis_of(Some("X".to_string())), Vec3::X);
    }

    #[test]
    fn test_cube_requires_centred_cube() {
        let universe = Universe::new();
        let id = universe.create_node("box", "b", None).unwrap();
        let cube = universe.node(id).unwrap();
        assert_eq!(CubeTranslator.write_type(&cube).as_deref(), Some("Cube"));

        universe
            .with_node_mut(id, |n| n.set("max", ParamValue::Vector(Vec3::new(1.0, 2.0, 1.0))))
            .unwrap()
            .unwrap();
        let slab = universe.node(id).unwrap();
        assert!(CubeTranslator.write_type(&slab).is_none());
    }
}
