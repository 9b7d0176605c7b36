use sb_core::native::{ArrayData, Node, ParamArray, ParamValue};
use sb_core::usd::{types, Prim, Value};
use sb_math::Vec2;

use crate::context::{ReadContext, WriteContext};
use crate::translator::{TranslateResult, Translator};

/// Schema fallback for `horizontalAperture`, in tenths of a scene unit.
const DEFAULT_APERTURE: f32 = 20.955;
const DEFAULT_FOCAL_LENGTH: f32 = 50.0;

const WRITTEN: &[&str] = &["fov", "near_clip", "far_clip", "shutter_start", "shutter_end"];

/// Horizontal field of view in degrees.
pub fn fov_of(aperture: f32, focal_length: f32) -> f32 {
    2.0 * (aperture / (2.0 * focal_length)).atan().to_degrees()
}

/// Focal length giving `fov` degrees over `aperture`.
pub fn focal_length_of(aperture: f32, fov: f32) -> f32 {
    aperture / (2.0 * (fov.to_radians() * 0.5).tan())
}

/// `Camera` ↔ `persp_camera` / `ortho_camera`.
pub struct CameraTranslator;

impl Translator for CameraTranslator {
    fn schema(&self) -> &str {
        "Camera"
    }

    fn native_types(&self) -> &[&'static str] {
        &["persp_camera", "ortho_camera"]
    }

    fn node_type(&self, prim: &Prim) -> Option<&'static str> {
        let projection = prim.value_at("projection", 0.0);
        match projection.as_ref().and_then(|v| v.as_str()) {
            Some("orthographic") => Some("ortho_camera"),
            _ => Some("persp_camera"),
        }
    }

    fn read(&self, prim: &Prim, ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        let Some(node_type) = self.node_type(prim) else {
            return Ok(());
        };
        let Some(id) = ctx.create_node(prim.path(), "", node_type)? else {
            return Ok(());
        };
        ctx.set_matrix(prim, id);

        if node_type == "persp_camera" {
            let attrs: Vec<_> = ["horizontalAperture", "focalLength"]
                .iter()
                .filter_map(|name| prim.attribute(name))
                .collect();
            let fov: Vec<f32> = ctx
                .sample_times(&attrs)
                .into_iter()
                .map(|t| {
                    let value = |name: &str, fallback: f32| {
                        prim.value_at(name, t)
                            .and_then(|v| v.as_f32())
                            .unwrap_or(fallback)
                    };
                    fov_of(
                        value("horizontalAperture", DEFAULT_APERTURE),
                        value("focalLength", DEFAULT_FOCAL_LENGTH),
                    )
                })
                .collect();
            let keys = fov.len();
            ctx.set(
                id,
                "fov",
                ParamValue::Array(ParamArray::with_keys(ArrayData::Float(fov), keys)),
            );
        } else {
            let aperture = ctx.float(prim, "horizontalAperture").unwrap_or(DEFAULT_APERTURE);
            let vertical = ctx.float(prim, "verticalAperture").unwrap_or(aperture);
            // Apertures are in tenths of a unit; the screen window spans half of each.
            let half = Vec2::new(aperture, vertical) * 0.05;
            ctx.set(id, "screen_window_min", ParamValue::Vector2(-half));
            ctx.set(id, "screen_window_max", ParamValue::Vector2(half));
        }

        if let Some(range) = ctx.value(prim, "clippingRange").and_then(|v| v.as_vec2()) {
            ctx.set(id, "near_clip", ParamValue::Float(range.x));
            ctx.set(id, "far_clip", ParamValue::Float(range.y));
        }
        if let Some(open) = ctx.float(prim, "shutter:open") {
            ctx.set(id, "shutter_start", ParamValue::Float(open));
        }
        if let Some(close) = ctx.float(prim, "shutter:close") {
            ctx.set(id, "shutter_end", ParamValue::Float(close));
        }

        ctx.read_custom(prim, id, &[]);
        Ok(())
    }

    fn write(&self, node: &Node, ctx: &mut WriteContext<'_>) -> TranslateResult<()> {
        ctx.write_matrix(node);
        let mut skip = WRITTEN.to_vec();

        if node.node_type() == "ortho_camera" {
            ctx.set_attr("projection", types::TOKEN, Value::token("orthographic"));
            if ctx.should_write(node, "screen_window_max") {
                let half = node
                    .get("screen_window_max")
                    .and_then(ParamValue::as_vec2)
                    .unwrap_or(Vec2::ONE);
                ctx.set_attr("horizontalAperture", types::FLOAT, Value::Float(half.x * 20.0));
                ctx.set_attr("verticalAperture", types::FLOAT, Value::Float(half.y * 20.0));
                skip.extend(["screen_window_min", "screen_window_max"]);
            }
        } else {
            ctx.set_attr("projection", types::TOKEN, Value::token("perspective"));
            let fov = node
                .get_array("fov")
                .and_then(|a| a.floats())
                .unwrap_or(&[])
                .to_vec();
            let focal: Vec<Value> = fov
                .iter()
                .map(|&f| Value::Float(focal_length_of(DEFAULT_APERTURE, f)))
                .collect();
            ctx.set_attr(
                "horizontalAperture",
                types::FLOAT,
                Value::Float(DEFAULT_APERTURE),
            );
            ctx.set_motion_attr(node, "focalLength", types::FLOAT, focal);
        }

        if ctx.should_write(node, "near_clip") || ctx.should_write(node, "far_clip") {
            let range = Vec2::new(node.get_float("near_clip"), node.get_float("far_clip"));
            ctx.set_attr("clippingRange", types::FLOAT2, Value::Float2(range));
        }
        if ctx.should_write(node, "shutter_start") || ctx.should_write(node, "shutter_end") {
            ctx.set_uniform_attr(
                "shutter:open",
                types::DOUBLE,
                Value::Double(node.get_float("shutter_start") as f64),
            );
            ctx.set_uniform_attr(
                "shutter:close",
                types::DOUBLE,
                Value::Double(node.get_float("shutter_end") as f64),
            );
        }

        ctx.write_arnold_params(node, &skip);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fov_focal_length_inverse() {
        let fov = fov_of(DEFAULT_APERTURE, 35.0);
        assert!(fov > 30.0 && fov < 35.0);
        assert!((focal_length_of(DEFAULT_APERTURE, fov) - 35.0).abs() < 1e-3);
        // Equal aperture and focal length is about 53 degrees.
        assert!((fov_of(10.0, 10.0) - 53.130_1).abs() < 1e-3);
    }
}
