//! Transform stacks: `xformOp:*` attributes ordered by `xformOpOrder`.

use sb_core::usd::{Attribute, Prim, Stage, Value};
use sb_math::{Mat4, Quat, Vec3};

const RESET_XFORM_STACK: &str = "!resetXformStack!";
const INVERT_PREFIX: &str = "!invert!";

fn op_order(prim: &Prim, time: f64) -> Vec<String> {
    prim.value_at("xformOpOrder", time)
        .and_then(|v| v.as_str_array().map(|ops| ops.to_vec()))
        .unwrap_or_default()
}

/// Local transform of `prim` at `time`, and whether it resets the parent's transform.
pub fn local_transform(prim: &Prim, time: f64) -> (Mat4, bool) {
    let mut matrix = Mat4::IDENTITY;
    let mut resets = false;
    for op in op_order(prim, time) {
        if op == RESET_XFORM_STACK {
            matrix = Mat4::IDENTITY;
            resets = true;
            continue;
        }
        let (name, invert) = match op.strip_prefix(INVERT_PREFIX) {
            Some(name) => (name, true),
            None => (op.as_str(), false),
        };
        let Some(value) = prim.value_at(name, time) else {
            log::debug!("{}: missing transform op {}", prim.path(), name);
            continue;
        };
        let Some(op_matrix) = op_matrix(name, &value) else {
            log::warn!("{}: unsupported transform op {}", prim.path(), name);
            continue;
        };
        matrix *= if invert { op_matrix.inverse() } else { op_matrix };
    }
    (matrix, resets)
}

/// Matrix of one transform op. Rotations are in degrees.
fn op_matrix(name: &str, value: &Value) -> Option<Mat4> {
    let kind = name.strip_prefix("xformOp:")?;
    let kind = kind.split(':').next().unwrap_or(kind);
    match kind {
        "translate" => Some(Mat4::from_translation(value.as_vec3()?)),
        "scale" => match value.as_vec3() {
            Some(s) => Some(Mat4::from_scale(s)),
            None => Some(Mat4::from_scale(Vec3::splat(value.as_f32()?))),
        },
        "rotateX" => Some(Mat4::from_rotation_x(value.as_f32()?.to_radians())),
        "rotateY" => Some(Mat4::from_rotation_y(value.as_f32()?.to_radians())),
        "rotateZ" => Some(Mat4::from_rotation_z(value.as_f32()?.to_radians())),
        "orient" => Some(Mat4::from_quat(value.as_quat()?.normalize())),
        "transform" => value.as_mat4(),
        _ => {
            let axes = kind.strip_prefix("rotate")?;
            if axes.len() != 3 {
                return None;
            }
            let angles = value.as_vec3()?;
            // The first axis named is applied first.
            let mut matrix = Mat4::IDENTITY;
            for axis in axes.chars() {
                let rotation = match axis {
                    'X' => Mat4::from_rotation_x(angles.x.to_radians()),
                    'Y' => Mat4::from_rotation_y(angles.y.to_radians()),
                    'Z' => Mat4::from_rotation_z(angles.z.to_radians()),
                    _ => return None,
                };
                matrix = rotation * matrix;
            }
            Some(matrix)
        }
    }
}

/// World transform of `prim` at `time`.
pub fn world_transform(stage: &Stage, prim: &Prim, time: f64) -> Mat4 {
    let mut chain: Vec<&Prim> = prim
        .path()
        .ancestors()
        .iter()
        .filter_map(|p| stage.prim(p))
        .collect();
    chain.push(prim);

    let mut world = Mat4::IDENTITY;
    for p in chain {
        let (local, resets) = local_transform(p, time);
        world = if resets { local } else { world * local };
    }
    world
}

/// Every transform attribute that contributes to the world transform of `prim`.
pub fn transform_attributes<'s>(stage: &'s Stage, prim: &'s Prim) -> Vec<&'s Attribute> {
    let mut chain: Vec<&Prim> = prim
        .path()
        .ancestors()
        .iter()
        .filter_map(|p| stage.prim(p))
        .collect();
    chain.push(prim);
    chain
        .into_iter()
        .flat_map(|p| {
            p.attributes()
                .filter(|(name, _)| name.starts_with("xformOp:") || *name == "xformOpOrder")
                .map(|(_, attr)| attr)
        })
        .collect()
}

/// Instance transform as composed by point instancers: scale, then orientation, then
/// translation.
pub fn instance_transform(position: Vec3, orientation: Option<Quat>, scale: Option<Vec3>) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        scale.unwrap_or(Vec3::ONE),
        orientation.map(|q| q.normalize()).unwrap_or(Quat::IDENTITY),
        position,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::usd::ScenePath;

    fn stage(text: &str) -> Stage {
        Stage::open_text(text).unwrap()
    }

    #[test]
    fn test_translate_rotate_scale_order() {
        let stage = stage(
            r#"#usda 1.0
def Xform "A"
{
    double3 xformOp:translate = (10, 0, 0)
    float xformOp:rotateZ = 90
    float3 xformOp:scale = (2, 2, 2)
    uniform token[] xformOpOrder = ["xformOp:translate", "xformOp:rotateZ", "xformOp:scale"]
}
"#,
        );
        let prim = stage.prim(&ScenePath::new("/A").unwrap()).unwrap();
        let m = world_transform(&stage, prim, 0.0);
        let p = m.transform_point3(Vec3::X);
        // scale to (2,0,0), rotate to (0,2,0), translate to (10,2,0)
        assert!((p - Vec3::new(10.0, 2.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_parent_and_reset() {
        let stage = stage(
            r#"#usda 1.0
def Xform "A"
{
    double3 xformOp:translate = (1, 0, 0)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Xform "B"
    {
        double3 xformOp:translate = (0, 1, 0)
        uniform token[] xformOpOrder = ["xformOp:translate"]
    }

    def Xform "C"
    {
        double3 xformOp:translate = (0, 0, 1)
        uniform token[] xformOpOrder = ["!resetXformStack!", "xformOp:translate"]
    }
}
"#,
        );
        let b = stage.prim(&ScenePath::new("/A/B").unwrap()).unwrap();
        let c = stage.prim(&ScenePath::new("/A/C").unwrap()).unwrap();
        let pb = world_transform(&stage, b, 0.0).transform_point3(Vec3::ZERO);
        let pc = world_transform(&stage, c, 0.0).transform_point3(Vec3::ZERO);
        assert!((pb - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-4);
        assert!((pc - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-4);
        assert_eq!(transform_attributes(&stage, b).len(), 4);
    }

    #[test]
    fn test_rotate_xyz_applies_x_first() {
        let m = op_matrix("xformOp:rotateXYZ", &Value::Float3(Vec3::new(90.0, 0.0, 90.0))).unwrap();
        // X by 90: Y -> Z; then Z by 90: Z stays Z.
        let p = m.transform_point3(Vec3::Y);
        assert!((p - Vec3::Z).length() < 1e-4);
    }

    #[test]
    fn test_animated_translate() {
        let stage = stage(
            r#"#usda 1.0
def Xform "A"
{
    double3 xformOp:translate.timeSamples = {
        1: (0, 0, 0),
        2: (4, 0, 0),
    }
    uniform token[] xformOpOrder = ["xformOp:translate"]
}
"#,
        );
        let prim = stage.prim(&ScenePath::new("/A").unwrap()).unwrap();
        let p = world_transform(&stage, prim, 1.5).transform_point3(Vec3::ZERO);
        assert!((p.x - 2.0).abs() < 1e-4);
    }
}
