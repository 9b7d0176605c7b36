use sb_core::native::{ElemType, Node};
use sb_core::usd::{types, Prim};

use crate::context::{ReadContext, WriteContext};
use crate::translator::{TranslateResult, Translator};
use crate::translators::mesh::vec3_keys;
use crate::translators::{read_motion_array, read_radius, write_widths, SHAPE_COMMON};

/// `Points` ↔ `points`.
pub struct PointsTranslator;

impl Translator for PointsTranslator {
    fn schema(&self) -> &str {
        "Points"
    }

    fn native_types(&self) -> &[&'static str] {
        &["points"]
    }

    fn node_type(&self, _prim: &Prim) -> Option<&'static str> {
        Some("points")
    }

    fn read(&self, prim: &Prim, ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        let Some(id) = ctx.create_node(prim.path(), "", "points")? else {
            return Ok(());
        };
        ctx.read_shape_common(prim, id);
        read_motion_array(ctx, prim, id, "points", "points", ElemType::Vector);
        read_radius(ctx, prim, id);
        ctx.read_custom(prim, id, &[]);
        Ok(())
    }

    fn write(&self, node: &Node, ctx: &mut WriteContext<'_>) -> TranslateResult<()> {
        ctx.write_shape_common(node);
        if let Some(points) = node.get_array("points") {
            ctx.set_motion_attr(node, "points", types::POINT3F_ARRAY, vec3_keys(points));
        }
        write_widths(node, ctx);
        let skip: Vec<&str> = SHAPE_COMMON
            .iter()
            .chain(&["points", "radius"])
            .copied()
            .collect();
        ctx.write_arnold_params(node, &skip);
        Ok(())
    }
}
