//! Built-in native node types.
//!
//! Every node type has a fixed parameter schema with typed defaults. Reading a parameter
//! that was never set yields the default from this table.

use std::sync::OnceLock;

use sb_math::{Mat4, Vec2, Vec3, Vec4};

use super::mask::NodeMask;
use super::param::{ArrayData, ElemType, ParamType, ParamValue};

/// One parameter of a node type.
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: &'static str,
    pub ty: ParamType,
    pub default: ParamValue,
    /// Accepts multiple motion keys.
    pub motion: bool,
    /// Allowed values of an `Enum` parameter.
    pub enum_values: &'static [&'static str],
}

/// A node type.
#[derive(Debug, Clone)]
pub struct NodeEntry {
    pub name: &'static str,
    pub category: NodeMask,
    pub params: Vec<ParamDef>,
    pub supports_user_params: bool,
}

impl NodeEntry {
    pub fn param(&self, name: &str) -> Option<&ParamDef> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Look up a built-in node type.
pub fn node_entry(name: &str) -> Option<&'static NodeEntry> {
    node_entries().iter().find(|e| e.name == name)
}

/// All built-in node types.
pub fn node_entries() -> &'static [NodeEntry] {
    static ENTRIES: OnceLock<Vec<NodeEntry>> = OnceLock::new();
    ENTRIES.get_or_init(build_entries)
}

// --- table helpers ---------------------------------------------------------

fn p(name: &'static str, default: ParamValue) -> ParamDef {
    ParamDef {
        name,
        ty: default.param_type(),
        default,
        motion: false,
        enum_values: &[],
    }
}

fn motion(name: &'static str, default: ArrayData) -> ParamDef {
    ParamDef {
        motion: true,
        ..p(name, ParamValue::array(default))
    }
}

fn array(name: &'static str, elem: ElemType) -> ParamDef {
    let data = match elem {
        ElemType::Bool => ArrayData::Bool(Vec::new()),
        ElemType::Byte => ArrayData::Byte(Vec::new()),
        ElemType::Int => ArrayData::Int(Vec::new()),
        ElemType::UInt => ArrayData::UInt(Vec::new()),
        ElemType::Float => ArrayData::Float(Vec::new()),
        ElemType::Rgb => ArrayData::Rgb(Vec::new()),
        ElemType::Rgba => ArrayData::Rgba(Vec::new()),
        ElemType::Vector => ArrayData::Vector(Vec::new()),
        ElemType::Vector2 => ArrayData::Vector2(Vec::new()),
        ElemType::String => ArrayData::String(Vec::new()),
        ElemType::Matrix => ArrayData::Matrix(Vec::new()),
        ElemType::Node => ArrayData::Node(Vec::new()),
    };
    p(name, ParamValue::array(data))
}

fn enumeration(name: &'static str, values: &'static [&'static str]) -> ParamDef {
    ParamDef {
        enum_values: values,
        ..p(name, ParamValue::Enum(values[0].to_string()))
    }
}

fn float(name: &'static str, v: f32) -> ParamDef {
    p(name, ParamValue::Float(v))
}

fn rgb(name: &'static str, v: f32) -> ParamDef {
    p(name, ParamValue::Rgb(Vec3::splat(v)))
}

fn vector(name: &'static str, v: Vec3) -> ParamDef {
    p(name, ParamValue::Vector(v))
}

fn string(name: &'static str) -> ParamDef {
    p(name, ParamValue::String(String::new()))
}

fn node(name: &'static str) -> ParamDef {
    p(name, ParamValue::Node(None))
}

fn boolean(name: &'static str, v: bool) -> ParamDef {
    p(name, ParamValue::Bool(v))
}

fn matrix_param() -> ParamDef {
    motion("matrix", ArrayData::Matrix(vec![Mat4::IDENTITY]))
}

fn motion_range() -> Vec<ParamDef> {
    vec![float("motion_start", 0.0), float("motion_end", 1.0)]
}

fn entry(
    name: &'static str,
    category: NodeMask,
    supports_user_params: bool,
    params: Vec<ParamDef>,
) -> NodeEntry {
    NodeEntry {
        name,
        category,
        params,
        supports_user_params,
    }
}

/// Parameters every shape carries.
fn shape(mut specific: Vec<ParamDef>) -> Vec<ParamDef> {
    let mut params = vec![
        matrix_param(),
        p("visibility", ParamValue::Byte(255)),
        p("sidedness", ParamValue::Byte(255)),
        boolean("matte", false),
        boolean("opaque", true),
        boolean("receive_shadows", true),
        boolean("self_shadows", true),
        node("shader"),
        node("disp_map"),
        boolean("use_light_group", false),
        array("light_group", ElemType::Node),
        boolean("use_shadow_group", false),
        array("shadow_group", ElemType::Node),
    ];
    params.extend(motion_range());
    params.append(&mut specific);
    params
}

/// Parameters every light carries.
fn light(mut specific: Vec<ParamDef>) -> Vec<ParamDef> {
    let mut params = vec![
        matrix_param(),
        rgb("color", 1.0),
        float("intensity", 1.0),
        float("exposure", 0.0),
        boolean("normalize", true),
        boolean("cast_shadows", true),
        p("samples", ParamValue::Int(1)),
        array("filters", ElemType::Node),
    ];
    params.extend(motion_range());
    params.append(&mut specific);
    params
}

/// Parameters every camera carries.
fn camera(mut specific: Vec<ParamDef>) -> Vec<ParamDef> {
    let mut params = vec![
        matrix_param(),
        float("near_clip", 0.0001),
        float("far_clip", 1.0e30),
        float("shutter_start", 0.0),
        float("shutter_end", 0.0),
        float("exposure", 0.0),
        p("screen_window_min", ParamValue::Vector2(Vec2::splat(-1.0))),
        p("screen_window_max", ParamValue::Vector2(Vec2::splat(1.0))),
    ];
    params.extend(motion_range());
    params.append(&mut specific);
    params
}

const WRAP_MODES: &[&str] = &["periodic", "black", "clamp", "mirror", "file"];

fn build_entries() -> Vec<NodeEntry> {
    use NodeMask as M;

    vec![
        entry(
            "options",
            M::OPTIONS,
            true,
            vec![
                p("AA_samples", ParamValue::Int(3)),
                p("GI_diffuse_depth", ParamValue::Int(1)),
                p("xres", ParamValue::Int(320)),
                p("yres", ParamValue::Int(240)),
                node("camera"),
                node("color_manager"),
                float("frame", 0.0),
                float("fps", 24.0),
                p("threads", ParamValue::Int(0)),
                string("procedural_searchpath"),
                string("texture_searchpath"),
                array("outputs", ElemType::String),
            ],
        ),
        // cameras
        entry(
            "persp_camera",
            M::CAMERA,
            true,
            camera(vec![
                motion("fov", ArrayData::Float(vec![54.43])),
                float("focus_distance", 1.0),
                float("aperture_size", 0.0),
            ]),
        ),
        entry("ortho_camera", M::CAMERA, true, camera(vec![])),
        // shapes
        entry(
            "polymesh",
            M::SHAPE,
            true,
            shape(vec![
                motion("vlist", ArrayData::Vector(Vec::new())),
                array("nsides", ElemType::UInt),
                array("vidxlist", ElemType::UInt),
                motion("nlist", ArrayData::Vector(Vec::new())),
                array("nidxlist", ElemType::UInt),
                array("uvlist", ElemType::Vector2),
                array("uvidxlist", ElemType::UInt),
                enumeration("subdiv_type", &["none", "catclark", "linear"]),
                p("subdiv_iterations", ParamValue::Byte(1)),
                boolean("smoothing", false),
            ]),
        ),
        entry(
            "curves",
            M::SHAPE,
            true,
            shape(vec![
                motion("points", ArrayData::Vector(Vec::new())),
                array("num_points", ElemType::UInt),
                motion("radius", ArrayData::Float(Vec::new())),
                enumeration("basis", &["bezier", "b-spline", "catmull-rom", "linear"]),
                enumeration("mode", &["ribbon", "thick", "oriented"]),
            ]),
        ),
        entry(
            "points",
            M::SHAPE,
            true,
            shape(vec![
                motion("points", ArrayData::Vector(Vec::new())),
                motion("radius", ArrayData::Float(Vec::new())),
                enumeration("mode", &["disk", "sphere", "quad"]),
            ]),
        ),
        entry(
            "sphere",
            M::SHAPE,
            true,
            shape(vec![vector("center", Vec3::ZERO), float("radius", 0.5)]),
        ),
        entry(
            "box",
            M::SHAPE,
            true,
            shape(vec![
                vector("min", Vec3::splat(-0.5)),
                vector("max", Vec3::splat(0.5)),
            ]),
        ),
        entry(
            "cylinder",
            M::SHAPE,
            true,
            shape(vec![
                vector("bottom", Vec3::ZERO),
                vector("top", Vec3::Y),
                float("radius", 0.5),
            ]),
        ),
        entry(
            "cone",
            M::SHAPE,
            true,
            shape(vec![
                vector("bottom", Vec3::ZERO),
                vector("top", Vec3::Y),
                float("bottom_radius", 0.5),
                float("top_radius", 0.0),
            ]),
        ),
        entry(
            "ginstance",
            M::SHAPE,
            true,
            shape(vec![node("node"), boolean("inherit_xform", true)]),
        ),
        entry(
            "usd",
            M::SHAPE,
            true,
            shape(vec![
                string("filename"),
                string("object_path"),
                float("frame", 0.0),
                boolean("debug", false),
                p("threads", ParamValue::Int(0)),
                array("overrides", ElemType::String),
                p("cache_id", ParamValue::Int(0)),
            ]),
        ),
        // lights
        entry("distant_light", M::LIGHT, true, light(vec![float("angle", 0.0)])),
        entry("point_light", M::LIGHT, true, light(vec![float("radius", 0.0)])),
        entry(
            "spot_light",
            M::LIGHT,
            true,
            light(vec![
                float("radius", 0.0),
                float("cone_angle", 65.0),
                float("penumbra_angle", 0.0),
            ]),
        ),
        entry(
            "quad_light",
            M::LIGHT,
            true,
            light(vec![p(
                "vertices",
                ParamValue::array(ArrayData::Vector(vec![
                    Vec3::new(-0.5, -0.5, 0.0),
                    Vec3::new(-0.5, 0.5, 0.0),
                    Vec3::new(0.5, 0.5, 0.0),
                    Vec3::new(0.5, -0.5, 0.0),
                ])),
            )]),
        ),
        entry("disk_light", M::LIGHT, true, light(vec![float("radius", 0.5)])),
        entry(
            "cylinder_light",
            M::LIGHT,
            true,
            light(vec![
                vector("bottom", Vec3::new(-0.5, 0.0, 0.0)),
                vector("top", Vec3::new(0.5, 0.0, 0.0)),
                float("radius", 0.5),
            ]),
        ),
        entry(
            "skydome_light",
            M::LIGHT,
            true,
            light(vec![
                p("resolution", ParamValue::Int(1000)),
                enumeration("format", &["latlong", "mirrored_ball", "angular"]),
            ]),
        ),
        // shaders
        entry(
            "light_blocker",
            M::SHADER,
            true,
            vec![
                p("matrix", ParamValue::Matrix(Mat4::IDENTITY)),
                enumeration("geometry_type", &["box", "sphere", "plane", "cylinder"]),
                float("density", 0.0),
                float("roundness", 0.0),
            ],
        ),
        entry(
            "standard_surface",
            M::SHADER,
            true,
            vec![
                float("base", 0.8),
                rgb("base_color", 1.0),
                float("metalness", 0.0),
                float("specular", 1.0),
                rgb("specular_color", 1.0),
                float("specular_roughness", 0.2),
                float("specular_IOR", 1.5),
                float("transmission", 0.0),
                float("coat", 0.0),
                float("coat_roughness", 0.1),
                float("emission", 0.0),
                rgb("emission_color", 1.0),
                rgb("opacity", 1.0),
                vector("normal", Vec3::ZERO),
            ],
        ),
        entry(
            "image",
            M::SHADER,
            true,
            vec![
                string("filename"),
                enumeration("swrap", WRAP_MODES),
                enumeration("twrap", WRAP_MODES),
                p("color_space", ParamValue::String("auto".to_string())),
                string("uvset"),
                rgb("multiply", 1.0),
                rgb("offset", 0.0),
            ],
        ),
        entry(
            "user_data_float",
            M::SHADER,
            true,
            vec![string("attribute"), float("default", 0.0)],
        ),
        entry(
            "user_data_rgb",
            M::SHADER,
            true,
            vec![string("attribute"), rgb("default", 0.0)],
        ),
        entry(
            "user_data_rgba",
            M::SHADER,
            true,
            vec![string("attribute"), p("default", ParamValue::Rgba(Vec4::ZERO))],
        ),
        entry(
            "user_data_int",
            M::SHADER,
            true,
            vec![string("attribute"), p("default", ParamValue::Int(0))],
        ),
        entry(
            "user_data_string",
            M::SHADER,
            true,
            vec![string("attribute"), string("default")],
        ),
        entry("flat", M::SHADER, true, vec![rgb("color", 1.0)]),
        // outputs, color and operators
        entry(
            "driver_exr",
            M::DRIVER,
            false,
            vec![
                p("filename", ParamValue::String("output.exr".to_string())),
                boolean("half_precision", false),
            ],
        ),
        entry("gaussian_filter", M::FILTER, false, vec![float("width", 2.0)]),
        entry(
            "color_manager_ocio",
            M::COLOR_MANAGER,
            false,
            vec![string("config"), string("color_space_linear")],
        ),
        entry(
            "set_parameter",
            M::OPERATOR,
            false,
            vec![
                boolean("enable", true),
                string("selection"),
                array("assignment", ElemType::String),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let mesh = node_entry("polymesh").unwrap();
        assert_eq!(mesh.category, NodeMask::SHAPE);
        assert!(mesh.param("vlist").unwrap().motion);
        assert!(mesh.param("matrix").unwrap().motion);
        assert!(!mesh.param("nsides").unwrap().motion);
        assert!(node_entry("no_such_type").is_none());
    }

    #[test]
    fn test_names_unique() {
        let entries = node_entries();
        for (i, e) in entries.iter().enumerate() {
            assert!(entries[i + 1..].iter().all(|o| o.name != e.name), "{}", e.name);
            for (j, param) in e.params.iter().enumerate() {
                assert!(
                    e.params[j + 1..].iter().all(|o| o.name != param.name),
                    "{}.{}",
                    e.name,
                    param.name
                );
            }
        }
    }

    #[test]
    fn test_enum_default_is_first_value() {
        let curves = node_entry("curves").unwrap();
        let basis = curves.param("basis").unwrap();
        assert_eq!(basis.default, ParamValue::Enum("bezier".to_string()));
        assert_eq!(basis.ty, ParamType::Enum);
    }

    #[test]
    fn test_procedural_uses_every_core_by_default() {
        let usd = node_entry("usd").unwrap();
        assert_eq!(usd.param("threads").unwrap().default, ParamValue::Int(0));
    }
}
