//! Lightweight viewport proxies: shapes read as boxes, point clouds or polygons.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use sb_core::native::{ArrayData, NodeId, ParamArray, ParamValue};
use sb_core::usd::Prim;
use sb_math::{Aabb, Mat4Ext, Vec3};

use crate::context::ReadContext;
use crate::procedural::ParamMap;
use crate::reader::{ReadResult, Reader};
use crate::translator::{TranslateResult, Translator, TranslatorRegistry};
use crate::xform;

/// How shapes are displayed in a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportMode {
    /// One `box` per shape.
    Boxes,
    /// One `points` cloud per shape.
    Points,
    /// One `polymesh` per shape; shapes without polygons become their bounding box.
    Polygons,
}

impl ViewportMode {
    fn node_type(self) -> &'static str {
        match self {
            ViewportMode::Boxes => "box",
            ViewportMode::Points => "points",
            ViewportMode::Polygons => "polymesh",
        }
    }
}

impl FromStr for ViewportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "boxes" | "box" => Ok(ViewportMode::Boxes),
            "points" => Ok(ViewportMode::Points),
            "polygons" | "polygon" => Ok(ViewportMode::Polygons),
            other => Err(format!("unknown viewport mode '{}'", other)),
        }
    }
}

impl fmt::Display for ViewportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewportMode::Boxes => "boxes",
            ViewportMode::Points => "points",
            ViewportMode::Polygons => "polygons",
        };
        f.write_str(name)
    }
}

/// Shape schemas with a viewport proxy.
const SHAPE_SCHEMAS: &[&str] = &[
    "Mesh",
    "BasisCurves",
    "Points",
    "Sphere",
    "Cube",
    "Cylinder",
    "Cone",
];

/// Box faces over [`Aabb::corners`], wound outwards.
const BOX_FACES: [[u32; 4]; 6] = [
    [0, 4, 6, 2],
    [1, 3, 7, 5],
    [0, 1, 5, 4],
    [2, 6, 7, 3],
    [0, 2, 3, 1],
    [4, 5, 7, 6],
];

impl TranslatorRegistry {
    /// Registry reading shapes as viewport proxies. Everything else is skipped silently.
    pub fn viewport(mode: ViewportMode) -> Self {
        let mut registry = Self::new();
        registry.set_report_gaps(false);
        for &schema in SHAPE_SCHEMAS {
            registry.register(ViewportTranslator { schema, mode });
        }
        registry
    }
}

/// Reads one shape schema as a world-space proxy.
struct ViewportTranslator {
    schema: &'static str,
    mode: ViewportMode,
}

/// Local-space bounds of an implicit surface, from the schema fallbacks.
fn implicit_bounds(prim: &Prim, frame: f64) -> Option<Aabb> {
    let float = |name: &str, fallback: f32| {
        prim.value_at(name, frame)
            .and_then(|v| v.as_f32())
            .unwrap_or(fallback)
    };
    let half = match prim.type_name() {
        "Sphere" => Vec3::splat(float("radius", 1.0)),
        "Cube" => Vec3::splat(float("size", 2.0) * 0.5),
        "Cylinder" | "Cone" => {
            let radius = float("radius", 1.0);
            let half_height = float("height", 2.0) * 0.5;
            let axis = prim.value_at("axis", frame);
            match axis.as_ref().and_then(|v| v.as_str()) {
                Some("X") => Vec3::new(half_height, radius, radius),
                Some("Y") => Vec3::new(radius, half_height, radius),
                _ => Vec3::new(radius, radius, half_height),
            }
        }
        _ => return None,
    };
    Some(Aabb::from_points(-half, half))
}

fn local_points(prim: &Prim, frame: f64) -> Option<Vec<Vec3>> {
    prim.value_at("points", frame)
        .and_then(|v| v.as_vec3_array().map(|p| p.to_vec()))
}

fn vectors(points: Vec<Vec3>) -> ParamValue {
    ParamValue::Array(ParamArray::new(ArrayData::Vector(points)))
}

fn uints(values: Vec<u32>) -> ParamValue {
    ParamValue::Array(ParamArray::new(ArrayData::UInt(values)))
}

impl ViewportTranslator {
    fn create(&self, prim: &Prim, ctx: &mut ReadContext<'_>) -> TranslateResult<Option<NodeId>> {
        ctx.create_node(prim.path(), "", self.mode.node_type())
    }

    fn read_polygons(
        &self,
        prim: &Prim,
        ctx: &mut ReadContext<'_>,
        world_points: Vec<Vec3>,
        bounds: Aabb,
    ) -> TranslateResult<()> {
        let frame = ctx.frame();
        let ints = |name: &str| {
            prim.value_at(name, frame)
                .and_then(|v| v.to_ints())
                .map(|v| v.into_iter().map(|i| i.max(0) as u32).collect::<Vec<u32>>())
        };
        let topology = (ints("faceVertexCounts"), ints("faceVertexIndices"));
        let (vlist, nsides, vidxlist) = match topology {
            (Some(counts), Some(indices)) if self.schema == "Mesh" => (world_points, counts, indices),
            _ => {
                let faces: Vec<u32> = BOX_FACES.iter().flatten().copied().collect();
                (bounds.corners().to_vec(), vec![4; BOX_FACES.len()], faces)
            }
        };
        let Some(id) = self.create(prim, ctx)? else {
            return Ok(());
        };
        ctx.set(id, "vlist", vectors(vlist));
        ctx.set(id, "nsides", uints(nsides));
        ctx.set(id, "vidxlist", uints(vidxlist));
        Ok(())
    }
}

impl Translator for ViewportTranslator {
    fn schema(&self) -> &str {
        self.schema
    }

    fn node_type(&self, _prim: &Prim) -> Option<&'static str> {
        Some(self.mode.node_type())
    }

    fn read(&self, prim: &Prim, ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        if !ctx.is_visible(prim) {
            return Ok(());
        }
        let frame = ctx.frame();
        let world = xform::world_transform(ctx.stage(), prim, frame);

        let world_points: Vec<Vec3> = local_points(prim, frame)
            .unwrap_or_default()
            .into_iter()
            .map(|p| world.transform_point3(p))
            .collect();
        let bounds = if world_points.is_empty() {
            match implicit_bounds(prim, frame) {
                Some(local) => world.transform_aabb(&local),
                None => Aabb::empty(),
            }
        } else {
            Aabb::from_positions(&world_points)
        };
        if bounds.is_empty() {
            ctx.warn(prim.path(), "shape has no extent to display");
            return Ok(());
        }

        match self.mode {
            ViewportMode::Boxes => {
                let Some(id) = self.create(prim, ctx)? else {
                    return Ok(());
                };
                ctx.set(id, "min", ParamValue::Vector(bounds.min()));
                ctx.set(id, "max", ParamValue::Vector(bounds.max()));
            }
            ViewportMode::Points => {
                let points = if world_points.is_empty() {
                    bounds.corners().to_vec()
                } else {
                    world_points
                };
                let Some(id) = self.create(prim, ctx)? else {
                    return Ok(());
                };
                ctx.set(id, "points", vectors(points));
            }
            ViewportMode::Polygons => self.read_polygons(prim, ctx, world_points, bounds)?,
        }
        Ok(())
    }
}

/// Where a viewport read takes its stage from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneSource<'a> {
    /// A scene file; empty reads the overrides alone.
    File(&'a str),
    /// A stage-cache id.
    Cache(i64),
}

/// Read a scene for display into a new universe.
///
/// The `proxy` purpose is traversed and no procedural parent is set. With `list = true`
/// in `params` every prim's primary node is created without parameters, using the full
/// translator set; otherwise shapes become proxies for `mode`.
pub fn read_viewport(
    source: SceneSource<'_>,
    overrides: &[String],
    object_path: Option<&str>,
    mode: ViewportMode,
    params: &ParamMap,
) -> ReadResult<Reader> {
    let mut reader = Reader::new();
    reader.set_purpose("proxy");
    if let Some(frame) = params.get_float("frame") {
        reader.set_frame(frame as f64);
    }
    if let Some(threads) = params.get_int("threads") {
        reader.set_threads(threads.max(0) as usize);
    }
    if params.get_bool("list").unwrap_or(false) {
        reader.set_convert_primitives(false);
    } else {
        reader.set_translators(Arc::new(TranslatorRegistry::viewport(mode)));
    }

    match source {
        SceneSource::File(filename) => reader.read_file(filename, overrides, object_path)?,
        SceneSource::Cache(id) => reader.read_cache(id, overrides, object_path)?,
    }
    log::debug!(
        "Viewport read ({}) created {} nodes",
        mode,
        reader.nodes().len()
    );
    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::native::Node;

    const SCENE: &str = r#"#usda 1.0
def Xform "World"
{
    double3 xformOp:translate = (10, 0, 0)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Mesh "Tri"
    {
        int[] faceVertexCounts = [3]
        int[] faceVertexIndices = [0, 1, 2]
        point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 2, 0)]
    }

    def Sphere "Ball"
    {
        double radius = 0.5
    }

    def Sphere "Hidden"
    {
        token visibility = "invisible"
    }

    def Camera "Cam"
    {
    }
}
"#;

    fn read(mode: ViewportMode, params: &ParamMap) -> Reader {
        let overrides = vec![SCENE.to_string()];
        read_viewport(SceneSource::File(""), &overrides, None, mode, params).unwrap()
    }

    fn node(reader: &Reader, name: &str) -> Node {
        let id = reader.universe().lookup(name).unwrap();
        reader.universe().node(id).unwrap()
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("boxes".parse::<ViewportMode>(), Ok(ViewportMode::Boxes));
        assert_eq!("Polygons".parse::<ViewportMode>(), Ok(ViewportMode::Polygons));
        assert!("wire".parse::<ViewportMode>().is_err());
    }

    #[test]
    fn test_boxes() {
        let reader = read(ViewportMode::Boxes, &ParamMap::new());
        assert_eq!(reader.nodes().len(), 2);
        let tri = node(&reader, "/World/Tri");
        assert_eq!(tri.node_type(), "box");
        assert!((tri.get_vec3("min") - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-4);
        assert!((tri.get_vec3("max") - Vec3::new(11.0, 2.0, 0.0)).length() < 1e-4);

        let ball = node(&reader, "/World/Ball");
        assert!((ball.get_vec3("min") - Vec3::new(9.5, -0.5, -0.5)).length() < 1e-4);
        assert!(reader.universe().lookup("/World/Cam").is_none());
    }

    #[test]
    fn test_points() {
        let reader = read(ViewportMode::Points, &ParamMap::new());
        let tri = node(&reader, "/World/Tri");
        let points = tri.get_array("points").unwrap().vec3s().unwrap().to_vec();
        assert_eq!(points.len(), 3);
        assert!((points[2] - Vec3::new(10.0, 2.0, 0.0)).length() < 1e-4);
        let ball = node(&reader, "/World/Ball");
        assert_eq!(ball.get_array("points").unwrap().vec3s().unwrap().len(), 8);
    }

    #[test]
    fn test_polygons() {
        let reader = read(ViewportMode::Polygons, &ParamMap::new());
        let tri = node(&reader, "/World/Tri");
        assert_eq!(tri.node_type(), "polymesh");
        assert_eq!(tri.get_array("nsides").unwrap().uints().unwrap(), &[3]);

        let ball = node(&reader, "/World/Ball");
        assert_eq!(ball.get_array("nsides").unwrap().uints().unwrap(), &[4; 6]);
        assert_eq!(ball.get_array("vidxlist").unwrap().uints().unwrap().len(), 24);
        assert_eq!(ball.get_array("vlist").unwrap().vec3s().unwrap().len(), 8);
    }

    #[test]
    fn test_box_faces_wind_outwards() {
        let corners = Aabb::from_points(-Vec3::ONE, Vec3::ONE).corners();
        for face in BOX_FACES {
            let [a, b, c, _] = face.map(|i| corners[i as usize]);
            let normal = (b - a).cross(c - b);
            let center = (corners[face[0] as usize] + corners[face[2] as usize]) * 0.5;
            assert!(normal.dot(center) > 0.0, "{:?}", face);
        }
    }

    #[test]
    fn test_list_mode() {
        let mut params = ParamMap::new();
        params.insert("list", ParamValue::Bool(true));
        let reader = read(ViewportMode::Boxes, &params);
        // Every prim with a native counterpart, parameters left unset.
        assert_eq!(reader.nodes().len(), 4);
        let tri = node(&reader, "/World/Tri");
        assert_eq!(tri.node_type(), "polymesh");
        assert!(!tri.is_set("vlist"));
        assert!(reader.universe().lookup("/World/Cam").is_some());
    }
}
