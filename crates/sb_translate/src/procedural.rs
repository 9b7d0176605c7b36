//! Entry points a host renderer calls: the `usd` procedural node and the scene-format
//! load/write hooks.

use std::sync::Arc;

use indexmap::IndexMap;

use sb_core::native::{Node, NodeId, NodeMask, ParamValue, Universe};
use sb_core::usd::{is_supported_file, normalize_extension, resolve_search_path, StageError};
use sb_math::Interval;

use crate::diagnostics::Diagnostic;
use crate::reader::{ReadResult, Reader};
use crate::viewport::{read_viewport, SceneSource, ViewportMode};
use crate::writer::{WriteError, WriteResult, Writer};

/// Named host parameters, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap(IndexMap<String, ParamValue>);

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ParamValue::as_bool)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_i64)
    }

    pub fn get_float(&self, name: &str) -> Option<f32> {
        self.get(name).and_then(ParamValue::as_f32)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    /// A node mask given as category bits or as names (`"shape|light"`).
    pub fn get_mask(&self, name: &str) -> Option<NodeMask> {
        match self.get(name)? {
            ParamValue::String(text) => NodeMask::parse(text),
            value => value.as_i64().map(|bits| NodeMask::from_bits(bits as u32)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, ParamValue)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (K, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// The parameters of a `usd` procedural node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProceduralParams {
    pub filename: String,
    pub object_path: String,
    pub frame: f32,
    pub debug: bool,
    pub threads: usize,
    pub overrides: Vec<String>,
    /// Stage-cache id; 0 reads `filename` instead.
    pub cache_id: i64,
}

impl ProceduralParams {
    pub fn from_node(node: &Node) -> Self {
        Self {
            filename: node.get_str("filename").to_string(),
            object_path: node.get_str("object_path").to_string(),
            frame: node.get_float("frame"),
            debug: node.get_bool("debug"),
            threads: node.get_int("threads").max(0) as usize,
            overrides: node
                .get_array("overrides")
                .and_then(|a| a.strings())
                .map(|s| s.to_vec())
                .unwrap_or_default(),
            cache_id: node.get_int("cache_id"),
        }
    }

    fn object_path(&self) -> Option<&str> {
        Some(self.object_path.as_str()).filter(|p| !p.is_empty())
    }

    /// `filename` resolved through the options' procedural search path.
    fn resolved_filename(&self, universe: &Universe) -> String {
        if self.filename.is_empty() {
            return String::new();
        }
        let search_path = universe
            .with_node(universe.options(), |o| o.get_str("procedural_searchpath").to_string())
            .unwrap_or_default();
        resolve_search_path(&self.filename, &search_path)
    }
}

/// Shutter of the render camera, if it is open for a non-zero time.
fn camera_shutter(universe: &Universe) -> Option<Interval> {
    let camera = universe.camera()?;
    let (start, end) = universe
        .with_node(camera, |c| (c.get_float("shutter_start"), c.get_float("shutter_end")))
        .ok()?;
    Some(Interval::new(start, end)).filter(Interval::is_open)
}

/// A `usd` procedural node expanded into the nodes of its scene.
pub struct UsdProcedural {
    node: NodeId,
    reader: Reader,
}

impl UsdProcedural {
    /// Read the scene named by `node`'s parameters into `universe`, parented to `node`.
    pub fn init(universe: Arc<Universe>, node: NodeId) -> ReadResult<Self> {
        let params = universe.with_node(node, ProceduralParams::from_node)?;
        let filename = params.resolved_filename(&universe);

        let mut reader = Reader::new();
        reader.set_frame(params.frame as f64);
        reader.set_debug(params.debug);
        reader.set_threads(params.threads);
        reader.set_motion_blur(camera_shutter(&universe));
        reader.set_procedural_parent(Some(node));
        reader.set_universe(universe);

        if params.cache_id != 0 {
            reader.read_cache(params.cache_id, &params.overrides, params.object_path())?;
        } else {
            reader.read_file(&filename, &params.overrides, params.object_path())?;
        }
        Ok(Self { node, reader })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn num_nodes(&self) -> usize {
        self.reader.nodes().len()
    }

    pub fn get_node(&self, index: usize) -> Option<NodeId> {
        self.reader.nodes().get(index).copied()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.reader.diagnostics()
    }

    /// Read `node`'s scene as viewport proxies into a new universe. `None` when the file
    /// has an unsupported extension.
    pub fn viewport(
        universe: &Universe,
        node: NodeId,
        mode: ViewportMode,
        params: &ParamMap,
    ) -> ReadResult<Option<Reader>> {
        let procedural = universe.with_node(node, ProceduralParams::from_node)?;
        let filename = procedural.resolved_filename(universe);
        if !filename.is_empty() && !is_supported_file(&filename) {
            log::warn!("Cannot display '{}': unsupported scene file", filename);
            return Ok(None);
        }

        let mut params = params.clone();
        if params.get("frame").is_none() {
            params.insert("frame", ParamValue::Float(procedural.frame));
        }
        let source = if procedural.cache_id != 0 {
            SceneSource::Cache(procedural.cache_id)
        } else {
            SceneSource::File(&filename)
        };
        read_viewport(
            source,
            &procedural.overrides,
            procedural.object_path(),
            mode,
            &params,
        )
        .map(Some)
    }
}

fn options_frame(universe: &Universe) -> f32 {
    universe
        .with_node(universe.options(), |o| o.get_float("frame"))
        .unwrap_or(0.0)
}

/// Load a scene file into `universe` without a procedural parent.
///
/// Recognised parameters: `frame` (defaults to the options frame), `threads` (defaults
/// to 0, every core), `mask`.
pub fn load_scene(universe: Arc<Universe>, filename: &str, params: &ParamMap) -> ReadResult<Reader> {
    if !is_supported_file(filename) {
        return Err(StageError::UnsupportedFormat(filename.to_string()).into());
    }
    let frame = params
        .get_float("frame")
        .unwrap_or_else(|| options_frame(&universe));

    let mut reader = Reader::new();
    reader.set_frame(frame as f64);
    reader.set_threads(params.get_int("threads").map_or(0, |t| t.max(0) as usize));
    if let Some(mask) = params.get_mask("mask") {
        reader.set_mask(mask);
    }
    reader.set_universe(universe);
    reader.read_file(filename, &[], None)?;
    Ok(reader)
}

/// Write `universe` to a new scene file. Returns false when some node was skipped.
///
/// Recognised parameters: `mask`, `scope`, `all_attributes`, `frame`.
pub fn write_scene(universe: &Universe, filename: &str, params: &ParamMap) -> WriteResult<bool> {
    let filename = normalize_extension(filename)
        .ok_or_else(|| WriteError::UnsupportedFormat(filename.to_string()))?;

    let mut writer = Writer::with_new_stage();
    if let Some(mask) = params.get_mask("mask") {
        writer.set_mask(mask);
    }
    if let Some(scope) = params.get_str("scope") {
        writer.set_scope(scope);
    }
    if let Some(all) = params.get_bool("all_attributes") {
        writer.set_write_all_attributes(all);
    }
    let frame = params
        .get_float("frame")
        .unwrap_or_else(|| options_frame(universe));
    writer.set_frame(frame as f64);

    let complete = writer.write(universe)?;
    writer.stage().save(&filename)?;
    Ok(complete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::native::{ArrayData, ParamArray};
    use sb_core::usd::{ScenePath, Stage, StageCache};

    const SCENE: &str = r#"#usda 1.0
def Xform "World"
{
    def Sphere "Ball"
    {
        double radius = 2
        double3 xformOp:translate.timeSamples = {
            0: (0, 0, 0),
            1: (4, 0, 0),
        }
        uniform token[] xformOpOrder = ["xformOp:translate"]
    }

    def DistantLight "Sun"
    {
    }
}
"#;

    fn set(universe: &Universe, id: NodeId, name: &str, value: ParamValue) {
        universe
            .with_node_mut(id, |n| n.set(name, value))
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_param_map() {
        let params: ParamMap = [
            ("frame", ParamValue::Float(3.0)),
            ("mask", ParamValue::String("shape|light".into())),
            ("bits", ParamValue::Int(8)),
        ]
        .into_iter()
        .collect();
        assert_eq!(params.get_float("frame"), Some(3.0));
        assert_eq!(params.get_mask("mask"), Some(NodeMask::SHAPE | NodeMask::LIGHT));
        assert_eq!(params.get_mask("bits"), Some(NodeMask::SHAPE));
        assert_eq!(params.get_bool("list"), None);
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_procedural_from_search_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scene.usda"), SCENE).unwrap();

        let universe = Arc::new(Universe::new());
        set(
            &universe,
            universe.options(),
            "procedural_searchpath",
            ParamValue::String(dir.path().display().to_string()),
        );
        let camera = universe.create_node("persp_camera", "cam", None).unwrap();
        set(&universe, camera, "shutter_start", ParamValue::Float(0.0));
        set(&universe, camera, "shutter_end", ParamValue::Float(0.5));
        let node = universe.create_node("usd", "proc", None).unwrap();
        set(&universe, node, "filename", ParamValue::String("scene.usda".into()));

        let procedural = UsdProcedural::init(Arc::clone(&universe), node).unwrap();
        assert_eq!(procedural.num_nodes(), 2);
        assert!(procedural.get_node(2).is_none());

        let ball_id = procedural.get_node(0).unwrap();
        let ball = universe.node(ball_id).unwrap();
        assert_eq!(ball.name(), "/World/Ball");
        assert_eq!(ball.parent(), Some(node));
        assert!((ball.get_float("motion_end") - 0.5).abs() < 1e-4);
        assert_eq!(ball.get_array("matrix").unwrap().keys, 2);
        assert_eq!(universe.lookup_in(Some(node), "/World/Sun"), procedural.get_node(1));
        // Scoped to the procedural, so the top level is untouched.
        assert_eq!(universe.lookup("/World/Ball"), None);
    }

    #[test]
    fn test_procedural_from_cache_with_overrides() {
        let stage = Arc::new(Stage::open_text(SCENE).unwrap());
        let id = StageCache::global().insert(stage);

        let universe = Arc::new(Universe::new());
        let node = universe.create_node("usd", "proc", None).unwrap();
        set(&universe, node, "cache_id", ParamValue::Int(id as i32));
        set(&universe, node, "object_path", ParamValue::String("/World/Ball".into()));
        let overrides = vec!["over \"World\"\n{\n    over \"Ball\"\n    {\n        double radius = 5\n    }\n}\n".to_string()];
        set(
            &universe,
            node,
            "overrides",
            ParamValue::Array(ParamArray::new(ArrayData::String(overrides))),
        );

        let procedural = UsdProcedural::init(Arc::clone(&universe), node).unwrap();
        assert_eq!(procedural.num_nodes(), 1);
        let ball = universe.node(procedural.get_node(0).unwrap()).unwrap();
        assert!((ball.get_float("radius") - 5.0).abs() < 1e-4);
        // No camera, no motion.
        assert_eq!(ball.get_array("matrix").unwrap().keys, 1);
        StageCache::global().erase(id);
    }

    #[test]
    fn test_procedural_viewport() {
        let universe = Universe::new();
        let node = universe.create_node("usd", "proc", None).unwrap();
        set(&universe, node, "filename", ParamValue::String("scene.abc".into()));
        let result = UsdProcedural::viewport(&universe, node, ViewportMode::Boxes, &ParamMap::new());
        assert!(result.unwrap().is_none());

        let node = universe.create_node("usd", "inline", None).unwrap();
        set(
            &universe,
            node,
            "overrides",
            ParamValue::Array(ParamArray::new(ArrayData::String(vec![SCENE.to_string()]))),
        );
        let reader = UsdProcedural::viewport(&universe, node, ViewportMode::Boxes, &ParamMap::new())
            .unwrap()
            .unwrap();
        assert_eq!(reader.nodes().len(), 1);
        let ball = reader.universe().node(reader.nodes()[0]).unwrap();
        assert_eq!(ball.node_type(), "box");
        assert_eq!(ball.parent(), None);
    }

    #[test]
    fn test_load_and_write_scene() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.usda");
        std::fs::write(&source, SCENE).unwrap();

        let universe = Arc::new(Universe::new());
        let mut params = ParamMap::new();
        params.insert("mask", ParamValue::String("shape".into()));
        let reader = load_scene(Arc::clone(&universe), source.to_str().unwrap(), &params).unwrap();
        assert_eq!(reader.nodes().len(), 1);
        assert_eq!(reader.config().threads, 0);

        let target = dir.path().join("out.USDA");
        let mut params = ParamMap::new();
        params.insert("scope", ParamValue::String("/Loaded".into()));
        assert!(write_scene(&universe, target.to_str().unwrap(), &params).unwrap());

        let written = Stage::open(dir.path().join("out.usda")).unwrap();
        let ball = written
            .prim(&ScenePath::new("/Loaded/World/Ball").unwrap())
            .unwrap();
        assert_eq!(ball.type_name(), "Sphere");

        let result = load_scene(Arc::clone(&universe), "scene.abc", &ParamMap::new());
        assert!(result.is_err());
        let result = write_scene(&universe, dir.path().join("out.abc").to_str().unwrap(), &ParamMap::new());
        assert!(matches!(result, Err(WriteError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_load_scene_threads() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.usda");
        std::fs::write(&source, SCENE).unwrap();

        let mut params = ParamMap::new();
        params.insert("threads", ParamValue::Int(3));
        let universe = Arc::new(Universe::new());
        let reader = load_scene(universe, source.to_str().unwrap(), &params).unwrap();
        assert_eq!(reader.config().threads, 3);
        assert_eq!(reader.nodes().len(), 2);
    }
}
