use sb_core::native::{ArrayData, ParamArray, ParamValue};
use sb_core::usd::{Prim, Target};
use sb_math::{Mat4, Quat, Vec3};

use crate::context::{Connection, ConnectionKind, ReadContext};
use crate::translator::{TranslateError, TranslateResult, Translator};
use crate::xform;

/// Per-instance arrays sampled alongside the instancer transform.
const INSTANCE_ATTRS: &[&str] = &["positions", "orientations", "scales"];

/// `PointInstancer` → one `ginstance` per visible instance.
///
/// Each instance is registered under the key `i<n>` and carries the full world matrix
/// (instancer world × instance transform), so it does not inherit the prototype's own
/// transform. Prototypes themselves are read hidden.
pub struct PointInstancerTranslator;

impl Translator for PointInstancerTranslator {
    fn schema(&self) -> &str {
        "PointInstancer"
    }

    fn node_type(&self, _prim: &Prim) -> Option<&'static str> {
        Some("ginstance")
    }

    fn read(&self, prim: &Prim, ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        let positions: Vec<Vec3> = ctx
            .value(prim, "positions")
            .and_then(|v| v.as_vec3_array().map(|p| p.to_vec()))
            .unwrap_or_default();
        let indices: Vec<i32> = ctx
            .value(prim, "protoIndices")
            .and_then(|v| v.to_ints())
            .unwrap_or_default();
        if indices.len() != positions.len() {
            return Err(TranslateError::InvalidValue {
                name: "protoIndices".to_string(),
                message: format!("{} indices for {} positions", indices.len(), positions.len()),
            });
        }
        let ids: Option<Vec<i32>> = ctx
            .value(prim, "ids")
            .and_then(|v| v.to_ints())
            .filter(|ids| ids.len() == positions.len());
        let invisible: Vec<i32> = ctx
            .value(prim, "invisibleIds")
            .and_then(|v| v.to_ints())
            .unwrap_or_default();
        let prototypes: Vec<Target> = prim
            .relationship("prototypes")
            .map(|r| r.targets.clone())
            .unwrap_or_default();

        let count = positions.len();
        let keys = instance_keys(prim, ctx, count);
        for i in 0..count {
            let id_of_instance = ids.as_ref().map_or(i as i32, |ids| ids[i]);
            if invisible.contains(&id_of_instance) {
                continue;
            }
            let Some(prototype) = usize::try_from(indices[i])
                .ok()
                .and_then(|p| prototypes.get(p))
            else {
                ctx.warn(
                    prim.path(),
                    format!("instance {} has no prototype {}", i, indices[i]),
                );
                continue;
            };
            let Some(id) = ctx.create_node(prim.path(), &format!("i{}", i), "ginstance")? else {
                return Ok(());
            };

            let matrices: Vec<Mat4> = keys.iter().map(|key| key.matrix(i, positions[i])).collect();
            let n_keys = matrices.len();
            ctx.set(
                id,
                "matrix",
                ParamValue::Array(ParamArray::with_keys(ArrayData::Matrix(matrices), n_keys)),
            );
            ctx.set(id, "inherit_xform", ParamValue::Bool(false));
            ctx.connect(Connection {
                node: id,
                param: "node".to_string(),
                kind: ConnectionKind::Node,
                targets: vec![Target::prim(prototype.prim.clone())],
                source: prim.path().clone(),
            });
        }
        Ok(())
    }
}

/// Instancer state at one motion key.
struct InstanceKey {
    world: Mat4,
    positions: Option<Vec<Vec3>>,
    orientations: Option<Vec<Quat>>,
    scales: Option<Vec<Vec3>>,
}

impl InstanceKey {
    /// World matrix of instance `i`. Per-instance arrays whose length changed at this key
    /// fall back to the value at the frame.
    fn matrix(&self, i: usize, frame_position: Vec3) -> Mat4 {
        let position = self
            .positions
            .as_ref()
            .map_or(frame_position, |p| p[i]);
        let local = xform::instance_transform(
            position,
            self.orientations.as_ref().map(|o| o[i]),
            self.scales.as_ref().map(|s| s[i]),
        );
        self.world * local
    }
}

/// Sample the instancer transform and the per-instance arrays at the same times, so a
/// moving instance gets as many keys as the motion window requires.
fn instance_keys(prim: &Prim, ctx: &ReadContext<'_>, count: usize) -> Vec<InstanceKey> {
    let stage = ctx.stage();
    let mut attrs = xform::transform_attributes(stage, prim);
    attrs.extend(INSTANCE_ATTRS.iter().filter_map(|name| prim.attribute(name)));

    let vec3s = |name: &str, t: f64| {
        prim.value_at(name, t)
            .and_then(|v| v.as_vec3_array().map(|a| a.to_vec()))
            .filter(|a| a.len() == count)
    };
    ctx.sample_times(&attrs)
        .into_iter()
        .map(|t| InstanceKey {
            world: xform::world_transform(stage, prim, t),
            positions: vec3s("positions", t),
            orientations: prim
                .value_at("orientations", t)
                .and_then(|v| v.as_quat_array().map(|q| q.to_vec()))
                .filter(|q| q.len() == count),
            scales: vec3s("scales", t),
        })
        .collect()
}
