//! Lights. Inputs are read from `inputs:<name>`, falling back to the pre-connectable
//! `<name>` spelling.

use sb_core::native::{ArrayData, Node, NodeId, ParamValue};
use sb_core::usd::{types, Prim, Value};
use sb_math::Vec3;

use crate::context::{Connection, ConnectionKind, ReadContext, WriteContext};
use crate::translator::{TranslateResult, Translator};

/// The light schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Distant,
    Sphere,
    Rect,
    Disk,
    Cylinder,
    Dome,
}

impl LightKind {
    pub const ALL: [LightKind; 6] = [
        LightKind::Distant,
        LightKind::Sphere,
        LightKind::Rect,
        LightKind::Disk,
        LightKind::Cylinder,
        LightKind::Dome,
    ];

    pub fn schema(self) -> &'static str {
        match self {
            LightKind::Distant => "DistantLight",
            LightKind::Sphere => "SphereLight",
            LightKind::Rect => "RectLight",
            LightKind::Disk => "DiskLight",
            LightKind::Cylinder => "CylinderLight",
            LightKind::Dome => "DomeLight",
        }
    }

    fn native_types(self) -> &'static [&'static str] {
        match self {
            LightKind::Distant => &["distant_light"],
            LightKind::Sphere => &["point_light", "spot_light"],
            LightKind::Rect => &["quad_light"],
            LightKind::Disk => &["disk_light"],
            LightKind::Cylinder => &["cylinder_light"],
            LightKind::Dome => &["skydome_light"],
        }
    }
}

/// Parameters every light writer handles itself.
const LIGHT_COMMON: &[&str] = &["color", "intensity", "exposure", "normalize", "cast_shadows"];

/// One light schema ↔ its native light types.
pub struct LightTranslator {
    kind: LightKind,
}

impl LightTranslator {
    pub fn new(kind: LightKind) -> Self {
        Self { kind }
    }
}

fn input(ctx: &ReadContext<'_>, prim: &Prim, name: &str) -> Option<Value> {
    ctx.value(prim, &format!("inputs:{}", name))
        .or_else(|| ctx.value(prim, name))
}

fn input_float(ctx: &ReadContext<'_>, prim: &Prim, name: &str) -> Option<f32> {
    input(ctx, prim, name).and_then(|v| v.as_f32())
}

fn has_shaping(prim: &Prim) -> bool {
    prim.has_attribute("inputs:shaping:cone:angle") || prim.has_attribute("shaping:cone:angle")
}

/// Queue the membership of a light's `collection:<collection>` for `param`.
///
/// A light with nothing authored for the collection lights every shape and needs no
/// group. `includeRoot` falls back to true only when no includes are authored.
fn read_link_collection(
    prim: &Prim,
    id: NodeId,
    collection: &str,
    param: &str,
    ctx: &mut ReadContext<'_>,
) {
    let includes = prim.relationship(&format!("collection:{}:includes", collection));
    let excludes = prim.relationship(&format!("collection:{}:excludes", collection));
    let include_root = ctx
        .value(prim, &format!("collection:{}:includeRoot", collection))
        .and_then(|v| v.as_bool());
    if includes.is_none() && excludes.is_none() && include_root != Some(false) {
        return;
    }

    ctx.connect(Connection {
        node: id,
        param: param.to_string(),
        kind: ConnectionKind::CollectionIncludes {
            include_root: include_root.unwrap_or(includes.is_none()),
        },
        targets: includes.map(|r| r.targets.clone()).unwrap_or_default(),
        source: prim.path().clone(),
    });
    if let Some(excludes) = excludes {
        ctx.connect(Connection {
            node: id,
            param: param.to_string(),
            kind: ConnectionKind::CollectionExcludes,
            targets: excludes.targets.clone(),
            source: prim.path().clone(),
        });
    }
}

impl Translator for LightTranslator {
    fn schema(&self) -> &str {
        self.kind.schema()
    }

    fn native_types(&self) -> &[&'static str] {
        self.kind.native_types()
    }

    fn node_type(&self, prim: &Prim) -> Option<&'static str> {
        match self.kind {
            LightKind::Sphere if has_shaping(prim) => Some("spot_light"),
            kind => kind.native_types().first().copied(),
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
        self.read_common(prim, id, ctx);

        match node_type {
            "distant_light" => {
                if let Some(angle) = input_float(ctx, prim, "angle") {
                    ctx.set(id, "angle", ParamValue::Float(angle));
                }
            }
            "point_light" | "spot_light" => {
                let point = input(ctx, prim, "treatAsPoint")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let radius = if point {
                    0.0
                } else {
                    input_float(ctx, prim, "radius").unwrap_or(0.5)
                };
                ctx.set(id, "radius", ParamValue::Float(radius));
                if node_type == "spot_light" {
                    // The schema angle is measured from the axis.
                    let half = input_float(ctx, prim, "shaping:cone:angle").unwrap_or(90.0);
                    let softness = input_float(ctx, prim, "shaping:cone:softness").unwrap_or(0.0);
                    let cone = half * 2.0;
                    ctx.set(id, "cone_angle", ParamValue::Float(cone));
                    ctx.set(id, "penumbra_angle", ParamValue::Float(softness * cone));
                }
            }
            "quad_light" => {
                let w = input_float(ctx, prim, "width").unwrap_or(1.0) * 0.5;
                let h = input_float(ctx, prim, "height").unwrap_or(1.0) * 0.5;
                let vertices = vec![
                    Vec3::new(-w, -h, 0.0),
                    Vec3::new(-w, h, 0.0),
                    Vec3::new(w, h, 0.0),
                    Vec3::new(w, -h, 0.0),
                ];
                ctx.set(id, "vertices", ParamValue::array(ArrayData::Vector(vertices)));
            }
            "disk_light" => {
                let radius = input_float(ctx, prim, "radius").unwrap_or(0.5);
                ctx.set(id, "radius", ParamValue::Float(radius));
            }
            "cylinder_light" => {
                let half = input_float(ctx, prim, "length").unwrap_or(1.0) * 0.5;
                let radius = input_float(ctx, prim, "radius").unwrap_or(0.5);
                ctx.set(id, "bottom", ParamValue::Vector(Vec3::new(-half, 0.0, 0.0)));
                ctx.set(id, "top", ParamValue::Vector(Vec3::new(half, 0.0, 0.0)));
                ctx.set(id, "radius", ParamValue::Float(radius));
            }
            "skydome_light" => self.read_dome(prim, id, ctx)?,
            _ => {}
        }

        ctx.read_custom(prim, id, &[]);
        Ok(())
    }

    fn write(&self, node: &Node, ctx: &mut WriteContext<'_>) -> TranslateResult<()> {
        ctx.write_matrix(node);
        if ctx.should_write(node, "color") {
            ctx.set_param_attr(node, "color", "inputs:color");
        }
        for (param, attr) in [
            ("intensity", "inputs:intensity"),
            ("exposure", "inputs:exposure"),
            ("normalize", "inputs:normalize"),
            ("cast_shadows", "inputs:shadow:enable"),
        ] {
            if ctx.should_write(node, param) {
                ctx.set_param_attr(node, param, attr);
            }
        }

        let mut skip: Vec<&str> = LIGHT_COMMON.to_vec();
        match node.node_type() {
            "distant_light" => {
                if ctx.should_write(node, "angle") {
                    ctx.set_param_attr(node, "angle", "inputs:angle");
                }
                skip.push("angle");
            }
            "point_light" | "spot_light" => {
                ctx.set_attr(
                    "inputs:radius",
                    types::FLOAT,
                    Value::Float(node.get_float("radius")),
                );
                skip.push("radius");
                if node.node_type() == "spot_light" {
                    let cone = node.get_float("cone_angle");
                    let softness = if cone > 0.0 {
                        node.get_float("penumbra_angle") / cone
                    } else {
                        0.0
                    };
                    ctx.set_attr("inputs:shaping:cone:angle", types::FLOAT, Value::Float(cone * 0.5));
                    ctx.set_attr("inputs:shaping:cone:softness", types::FLOAT, Value::Float(softness));
                    skip.extend(["cone_angle", "penumbra_angle"]);
                }
            }
            "quad_light" => {
                let vertices = node
                    .get_array("vertices")
                    .and_then(|a| a.vec3s())
                    .unwrap_or(&[]);
                let (min, max) = vertices.iter().fold(
                    (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
                    |(lo, hi), v| (lo.min(*v), hi.max(*v)),
                );
                let planar = vertices.len() == 4 && vertices.iter().all(|v| v.z == 0.0);
                if planar && min == -max {
                    let size = max - min;
                    ctx.set_attr("inputs:width", types::FLOAT, Value::Float(size.x));
                    ctx.set_attr("inputs:height", types::FLOAT, Value::Float(size.y));
                    skip.push("vertices");
                }
            }
            "disk_light" => {
                ctx.set_attr("inputs:radius", types::FLOAT, Value::Float(node.get_float("radius")));
                skip.push("radius");
            }
            "cylinder_light" => {
                let length = (node.get_vec3("top") - node.get_vec3("bottom")).length();
                ctx.set_attr("inputs:length", types::FLOAT, Value::Float(length));
                ctx.set_attr("inputs:radius", types::FLOAT, Value::Float(node.get_float("radius")));
                skip.extend(["bottom", "top", "radius"]);
            }
            "skydome_light" => {
                let format = match node.get_str("format") {
                    "mirrored_ball" => "mirroredBall",
                    "angular" => "angular",
                    _ => "latlong",
                };
                ctx.set_attr("inputs:texture:format", types::TOKEN, Value::token(format));
                skip.push("format");
                // The color link is kept as well so the image node round-trips.
                if let Some(texture) = self.linked_texture(node, ctx) {
                    ctx.set_attr("inputs:texture:file", types::ASSET, Value::Asset(texture));
                }
            }
            _ => {}
        }

        if node.link_of("color").is_some() {
            skip.retain(|p| *p != "color");
        }
        ctx.write_arnold_params(node, &skip);
        Ok(())
    }
}

impl LightTranslator {
    fn read_common(&self, prim: &Prim, id: NodeId, ctx: &mut ReadContext<'_>) {
        if let Some(color) = input(ctx, prim, "color").and_then(|v| v.as_vec3()) {
            ctx.set(id, "color", ParamValue::Rgb(color));
        }
        for (name, param) in [("intensity", "intensity"), ("exposure", "exposure")] {
            if let Some(value) = input_float(ctx, prim, name) {
                ctx.set(id, param, ParamValue::Float(value));
            }
        }
        if let Some(normalize) = input(ctx, prim, "normalize").and_then(|v| v.as_bool()) {
            ctx.set(id, "normalize", ParamValue::Bool(normalize));
        }
        if let Some(shadows) = input(ctx, prim, "shadow:enable").and_then(|v| v.as_bool()) {
            ctx.set(id, "cast_shadows", ParamValue::Bool(shadows));
        }

        if let Some(filters) = prim.relationship("filters") {
            ctx.connect(Connection {
                node: id,
                param: "filters".to_string(),
                kind: ConnectionKind::NodeArray,
                targets: filters.targets.clone(),
                source: prim.path().clone(),
            });
        }
        for (collection, param) in [("lightLink", "light_group"), ("shadowLink", "shadow_group")] {
            read_link_collection(prim, id, collection, param, ctx);
        }
    }

    /// Expand `inputs:texture:file` into an `image` node driving the dome color.
    fn read_dome(&self, prim: &Prim, id: NodeId, ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        let format = match ctx.token(prim, "inputs:texture:format").as_deref() {
            Some("mirroredBall") => "mirrored_ball",
            Some("angular") => "angular",
            _ => "latlong",
        };
        ctx.set(id, "format", ParamValue::Enum(format.to_string()));
        if prim
            .attribute("arnold:color")
            .is_some_and(|a| !a.connections.is_empty())
        {
            return Ok(());
        }

        let Some(file) = input(ctx, prim, "texture:file")
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|f| !f.is_empty())
        else {
            return Ok(());
        };
        let Some(image) = ctx.create_node(prim.path(), "texture", "image")? else {
            return Ok(());
        };
        ctx.set(image, "filename", ParamValue::String(file));
        ctx.link(id, "color", image, None);
        Ok(())
    }

    fn linked_texture(&self, node: &Node, ctx: &WriteContext<'_>) -> Option<String> {
        let link = node.link_of("color")?;
        ctx.universe()
            .with_node(link.source, |image| {
                (image.node_type() == "image").then(|| image.get_str("filename").to_string())
            })
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_light_type() {
        let stage = sb_core::usd::Stage::open_text(
            r#"#usda 1.0
def SphereLight "Point"
{
}
def SphereLight "Spot"
{
    float inputs:shaping:cone:angle = 30
}
"#,
        )
        .unwrap();
        let translator = LightTranslator::new(LightKind::Sphere);
        let point = stage.prim(&"/Point".parse().unwrap()).unwrap();
        let spot = stage.prim(&"/Spot".parse().unwrap()).unwrap();
        assert_eq!(translator.node_type(point), Some("point_light"));
        assert_eq!(translator.node_type(spot), Some("spot_light"));
    }
}
