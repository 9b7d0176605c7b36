use sb_core::native::{ArrayData, ElemType, Node, ParamValue};
use sb_core::usd::{types, Prim, Value};

use crate::context::{ReadContext, WriteContext};
use crate::translator::{TranslateResult, Translator};
use crate::translators::mesh::vec3_keys;
use crate::translators::{read_motion_array, read_radius, write_widths, SHAPE_COMMON};

/// `BasisCurves` ↔ `curves`.
pub struct CurvesTranslator;

const WRITTEN: &[&str] = &["points", "num_points", "radius", "basis"];

/// Native basis for a curve `type` and `basis` token pair.
fn basis_of(curve_type: &str, basis: &str) -> Option<&'static str> {
    if curve_type == "linear" {
        return Some("linear");
    }
    match basis {
        "bezier" => Some("bezier"),
        "bspline" => Some("b-spline"),
        "catmullRom" => Some("catmull-rom"),
        _ => None,
    }
}

impl Translator for CurvesTranslator {
    fn schema(&self) -> &str {
        "BasisCurves"
    }

    fn native_types(&self) -> &[&'static str] {
        &["curves"]
    }

    fn node_type(&self, _prim: &Prim) -> Option<&'static str> {
        Some("curves")
    }

    fn read(&self, prim: &Prim, ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        let Some(id) = ctx.create_node(prim.path(), "", "curves")? else {
            return Ok(());
        };
        ctx.read_shape_common(prim, id);
        read_motion_array(ctx, prim, id, "points", "points", ElemType::Vector);
        read_radius(ctx, prim, id);

        let counts: Vec<u32> = ctx
            .value(prim, "curveVertexCounts")
            .and_then(|v| v.to_ints())
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.max(0) as u32)
            .collect();
        ctx.set(id, "num_points", ParamValue::array(ArrayData::UInt(counts)));

        let curve_type = ctx.token(prim, "type").unwrap_or_else(|| "cubic".to_string());
        let basis = ctx.token(prim, "basis").unwrap_or_else(|| "bezier".to_string());
        match basis_of(&curve_type, &basis) {
            Some(native) => ctx.set(id, "basis", ParamValue::Enum(native.to_string())),
            None => ctx.warn(prim.path(), format!("unsupported curve basis '{}'", basis)),
        }

        ctx.read_custom(prim, id, &[]);
        Ok(())
    }

    fn write(&self, node: &Node, ctx: &mut WriteContext<'_>) -> TranslateResult<()> {
        ctx.write_shape_common(node);
        if let Some(points) = node.get_array("points") {
            ctx.set_motion_attr(node, "points", types::POINT3F_ARRAY, vec3_keys(points));
        }
        let counts = node
            .get_array("num_points")
            .and_then(|a| a.uints())
            .unwrap_or(&[]);
        ctx.set_attr(
            "curveVertexCounts",
            types::INT_ARRAY,
            Value::IntArray(counts.iter().map(|&c| c as i32).collect()),
        );
        write_widths(node, ctx);

        let (curve_type, basis) = match node.get_str("basis") {
            "linear" => ("linear", None),
            "b-spline" => ("cubic", Some("bspline")),
            "catmull-rom" => ("cubic", Some("catmullRom")),
            _ => ("cubic", Some("bezier")),
        };
        ctx.set_uniform_attr("type", types::TOKEN, Value::token(curve_type));
        if let Some(basis) = basis {
            ctx.set_uniform_attr("basis", types::TOKEN, Value::token(basis));
        }

        let skip: Vec<&str> = SHAPE_COMMON.iter().chain(WRITTEN).copied().collect();
        ctx.write_arnold_params(node, &skip);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basis_mapping() {
        assert_eq!(basis_of("linear", "bspline"), Some("linear"));
        assert_eq!(basis_of("cubic", "bspline"), Some("b-spline"));
        assert_eq!(basis_of("cubic", "catmullRom"), Some("catmull-rom"));
        assert_eq!(basis_of("cubic", "hermite"), None);
    }
}
