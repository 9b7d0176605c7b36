//! The Writer: authors a native universe as prims on a stage.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sb_core::native::{Node, NodeId, NodeMask, Universe};
use sb_core::usd::{make_valid_identifier, PathError, PathResult, ScenePath, Stage, StageError};

use crate::context::WriteContext;
use crate::diagnostics::Diagnostic;
use crate::translator::{Translator, TranslatorRegistry};

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("invalid scope '{scope}': {source}")]
    Scope {
        scope: String,
        #[source]
        source: PathError,
    },

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("unsupported scene file '{0}'")]
    UnsupportedFormat(String),
}

/// Result type for writes.
pub type WriteResult<T> = Result<T, WriteError>;

/// Writer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Node categories to write.
    pub mask: NodeMask,
    /// Prefix path every prim is written under. Empty writes at the root.
    pub scope: String,
    /// Author every parameter, not only the ones differing from their defaults.
    pub write_all_attributes: bool,
    /// Time of the first motion key.
    pub frame: f64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            mask: NodeMask::ALL,
            scope: String::new(),
            write_all_attributes: false,
            frame: 0.0,
        }
    }
}

/// A node selected for writing, with the translator and prim it goes to.
struct Planned<'t> {
    node: Node,
    translator: &'t dyn Translator,
    type_name: String,
    path: ScenePath,
}

pub struct Writer {
    stage: Stage,
    /// The stage was created by this writer; colliding paths are renamed instead of skipped.
    fresh: bool,
    config: WriterConfig,
    translators: Arc<TranslatorRegistry>,
    diagnostics: Vec<Diagnostic>,
}

impl Writer {
    /// Write into an existing stage.
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            fresh: false,
            config: WriterConfig::default(),
            translators: Arc::new(TranslatorRegistry::full()),
            diagnostics: Vec::new(),
        }
    }

    /// Write into a new in-memory stage.
    pub fn with_new_stage() -> Self {
        Self {
            fresh: true,
            ..Self::new(Stage::new_in_memory())
        }
    }

    pub fn set_config(&mut self, config: WriterConfig) {
        self.config = config;
    }

    pub fn set_mask(&mut self, mask: NodeMask) {
        self.config.mask = mask;
    }

    pub fn set_scope(&mut self, scope: impl Into<String>) {
        self.config.scope = scope.into();
    }

    pub fn set_write_all_attributes(&mut self, write_all: bool) {
        self.config.write_all_attributes = write_all;
    }

    pub fn set_frame(&mut self, frame: f64) {
        self.config.frame = frame;
    }

    pub fn set_translators(&mut self, translators: Arc<TranslatorRegistry>) {
        self.translators = translators;
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn into_stage(self) -> Stage {
        self.stage
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Write every masked-in node of `universe`. Returns false when some node could not be
    /// written; the diagnostics say which.
    ///
    /// Nodes owned by a procedural are skipped: the procedural recreates them on load.
    pub fn write(&mut self, universe: &Universe) -> WriteResult<bool> {
        let scope = if self.config.scope.is_empty() {
            ScenePath::root()
        } else {
            ScenePath::new(&self.config.scope).map_err(|source| WriteError::Scope {
                scope: self.config.scope.clone(),
                source,
            })?
        };
        let translators = Arc::clone(&self.translators);
        let config = self.config.clone();
        let mut diagnostics = Vec::new();
        let mut failed = 0usize;

        // Pass 1: choose a translator and a prim path for every node.
        let mut planned: Vec<Planned<'_>> = Vec::new();
        let mut paths: HashMap<NodeId, ScenePath> = HashMap::new();
        let mut xform_paths: HashSet<ScenePath> = HashSet::new();
        let mut taken: HashSet<ScenePath> = HashSet::new();
        for id in universe.nodes(config.mask) {
            let Some(node) = universe.node(id) else {
                continue;
            };
            if node.parent().is_some() {
                continue;
            }
            let Some((translator, type_name)) = translators.writer_for(&node) else {
                diagnostics.push(Diagnostic::warning(
                    node.name(),
                    format!("no translator writes '{}' nodes", node.node_type()),
                ));
                continue;
            };
            let path = match node_path(&scope, &node) {
                Ok(path) => path,
                Err(e) => {
                    diagnostics.push(Diagnostic::error(node.name(), e.to_string()));
                    failed += 1;
                    continue;
                }
            };
            let path = if self.fresh {
                match unique_path(path, &taken) {
                    Ok(path) => path,
                    Err(e) => {
                        diagnostics.push(Diagnostic::error(node.name(), e.to_string()));
                        failed += 1;
                        continue;
                    }
                }
            } else if taken.contains(&path) || self.stage.prim(&path).is_some() {
                diagnostics.push(Diagnostic::error(
                    &path,
                    format!("a prim already exists for node '{}'", node.name()),
                ));
                failed += 1;
                continue;
            } else {
                path
            };

            taken.insert(path.clone());
            paths.insert(id, path.clone());
            if node.entry().param("matrix").is_some() {
                xform_paths.insert(path.clone());
            }
            planned.push(Planned {
                node,
                translator,
                type_name,
                path,
            });
        }

        // Pass 2: author attributes once every path is known.
        self.stage.edit(|layer| {
            for plan in &planned {
                layer.define_prim(&plan.path, Some(&plan.type_name));
            }
            for plan in &planned {
                let mut ctx = WriteContext::new(
                    layer,
                    universe,
                    &paths,
                    &xform_paths,
                    &config,
                    plan.path.clone(),
                    &mut diagnostics,
                );
                if let Err(e) = plan.translator.write(&plan.node, &mut ctx) {
                    diagnostics.push(Diagnostic::error(&plan.path, e.to_string()));
                    failed += 1;
                }
            }
        });

        log::info!(
            "Wrote {} prims to {} ({} failed)",
            planned.len(),
            self.stage.identifier(),
            failed
        );
        self.diagnostics.extend(diagnostics);
        Ok(failed == 0)
    }
}

/// Prim path of a node below `scope`. Names containing `/` keep their hierarchy; unnamed
/// nodes are written as `<type>_<id>`.
fn node_path(scope: &ScenePath, node: &Node) -> PathResult<ScenePath> {
    let mut path = scope.clone();
    for segment in node.name().split('/').filter(|s| !s.is_empty()) {
        path = path.child(&make_valid_identifier(segment))?;
    }
    if path == *scope {
        path = scope.child(&format!("{}_{}", node.node_type(), node.id().0))?;
    }
    Ok(path)
}

fn unique_path(path: ScenePath, taken: &HashSet<ScenePath>) -> PathResult<ScenePath> {
    if !taken.contains(&path) {
        return Ok(path);
    }
    let parent = path.parent().unwrap_or_else(ScenePath::root);
    let mut n = 1;
    loop {
        let candidate = parent.child(&format!("{}_{}", path.name(), n))?;
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::native::{ArrayData, ParamArray, ParamValue};
    use sb_core::usd::types;
    use sb_math::Vec3;

    use crate::reader::{Reader, ReaderConfig};

    fn path(s: &str) -> ScenePath {
        ScenePath::new(s).unwrap()
    }

    fn set(universe: &Universe, id: NodeId, name: &str, value: ParamValue) {
        universe
            .with_node_mut(id, |n| n.set(name, value))
            .unwrap()
            .unwrap();
    }

    fn shaded_mesh() -> Universe {
        let universe = Universe::new();
        let mesh = universe.create_node("polymesh", "/World/mesh", None).unwrap();
        set(
            &universe,
            mesh,
            "vlist",
            ParamValue::Array(ParamArray::new(ArrayData::Vector(vec![
                Vec3::ZERO,
                Vec3::X,
                Vec3::Y,
            ]))),
        );
        set(&universe, mesh, "nsides", ParamValue::Array(ParamArray::new(ArrayData::UInt(vec![3]))));
        set(
            &universe,
            mesh,
            "vidxlist",
            ParamValue::Array(ParamArray::new(ArrayData::UInt(vec![0, 1, 2]))),
        );
        let shader = universe.create_node("standard_surface", "red", None).unwrap();
        set(&universe, shader, "base_color", ParamValue::Rgb(Vec3::X));
        set(&universe, mesh, "shader", ParamValue::Node(Some(shader)));
        universe
    }

    #[test]
    fn test_binding_targets_shader_prim() {
        let universe = shaded_mesh();
        let mut writer = Writer::with_new_stage();
        assert!(writer.write(&universe).unwrap());

        let stage = writer.stage();
        let mesh = stage.prim(&path("/World/mesh")).unwrap();
        assert_eq!(mesh.type_name(), "Mesh");
        let binding = mesh.relationship("material:binding").unwrap();
        assert_eq!(binding.targets[0].prim, path("/red"));

        let shader = stage.prim(&path("/red")).unwrap();
        assert_eq!(shader.type_name(), "Shader");
        let id = shader.value_at("info:id", 0.0).unwrap();
        assert_eq!(id.as_str(), Some("arnold:standard_surface"));
        // Intermediate prims are typeless.
        assert_eq!(stage.prim(&path("/World")).unwrap().type_name(), "");
        assert_eq!(stage.prim(&path("/options")).unwrap().type_name(), "ArnoldOptions");
    }

    #[test]
    fn test_write_mask() {
        let universe = shaded_mesh();
        let mut writer = Writer::with_new_stage();
        writer.set_mask(NodeMask::SHAPE);
        assert!(writer.write(&universe).unwrap());
        let stage = writer.stage();
        assert!(stage.prim(&path("/World/mesh")).is_some());
        assert!(stage.prim(&path("/red")).is_none());
        assert!(stage.prim(&path("/options")).is_none());
        assert!(stage
            .prim(&path("/World/mesh"))
            .unwrap()
            .relationship("material:binding")
            .is_none());
    }

    #[test]
    fn test_scope_and_unnamed_nodes() {
        let universe = Universe::new();
        let id = universe.create_node("gaussian_filter", "", None).unwrap();
        let mut writer = Writer::with_new_stage();
        writer.set_scope("/Render");
        writer.set_mask(NodeMask::FILTER);
        assert!(writer.write(&universe).unwrap());
        let filter = path(&format!("/Render/gaussian_filter_{}", id.0));
        assert_eq!(
            writer.stage().prim(&filter).unwrap().type_name(),
            "ArnoldGaussianFilter"
        );

        let mut writer = Writer::with_new_stage();
        writer.set_scope("not a path");
        assert!(matches!(writer.write(&universe), Err(WriteError::Scope { .. })));
    }

    #[test]
    fn test_path_collisions() {
        let universe = Universe::new();
        universe.create_node("sphere", "my ball", None).unwrap();
        universe.create_node("sphere", "my_ball", None).unwrap();

        let mut writer = Writer::with_new_stage();
        writer.set_mask(NodeMask::SHAPE);
        assert!(writer.write(&universe).unwrap());
        assert!(writer.stage().prim(&path("/my_ball")).is_some());
        assert!(writer.stage().prim(&path("/my_ball_1")).is_some());

        let existing = Stage::open_text("#usda 1.0\ndef Xform \"my_ball\"\n{\n}\n").unwrap();
        let mut writer = Writer::new(existing);
        writer.set_mask(NodeMask::SHAPE);
        assert!(!writer.write(&universe).unwrap());
        assert_eq!(writer.diagnostics().len(), 2);
        assert_eq!(
            writer.stage().prim(&path("/my_ball")).unwrap().type_name(),
            "Xform"
        );
    }

    #[test]
    fn test_procedural_children_skipped() {
        let universe = Universe::new();
        let procedural = universe.create_node("usd", "proc", None).unwrap();
        universe
            .create_node("sphere", "/child", Some(procedural))
            .unwrap();
        let mut writer = Writer::with_new_stage();
        assert!(writer.write(&universe).unwrap());
        assert!(writer.stage().prim(&path("/proc")).is_some());
        assert!(writer.stage().prim(&path("/child")).is_none());
    }

    #[test]
    fn test_motion_keys_become_samples() {
        let universe = Universe::new();
        let id = universe.create_node("points", "dots", None).unwrap();
        set(
            &universe,
            id,
            "points",
            ParamValue::Array(ParamArray::with_keys(
                ArrayData::Vector(vec![Vec3::ZERO, Vec3::ONE]),
                2,
            )),
        );
        set(&universe, id, "motion_start", ParamValue::Float(-0.5));
        set(&universe, id, "motion_end", ParamValue::Float(0.5));

        let mut writer = Writer::with_new_stage();
        writer.set_frame(10.0);
        writer.write(&universe).unwrap();
        let prim = writer.stage().prim(&path("/dots")).unwrap().clone();
        let points = prim.attribute("points").unwrap();
        assert_eq!(points.type_name, types::POINT3F_ARRAY);
        let times: Vec<f64> = points.time_samples.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![9.5, 10.5]);
    }

    #[test]
    fn test_round_trip() {
        let text = r#"#usda 1.0
def Xform "World"
{
    double3 xformOp:translate = (0, 1, 0)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Mesh "Mesh"
    {
        int[] faceVertexCounts = [3]
        int[] faceVertexIndices = [0, 1, 2]
        point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 1, 0)]
        rel material:binding = </World/Surface>
    }

    def DistantLight "Sun"
    {
        float inputs:intensity = 4
        float inputs:angle = 2
    }

    def Camera "Cam"
    {
        float focalLength = 35
    }

    def Shader "Surface"
    {
        uniform token info:id = "arnold:standard_surface"
        color3f inputs:base_color = (0, 0, 1)
    }
}
"#;
        let source = Stage::open_text(text).unwrap();
        let mut first = Reader::new();
        first.read_stage(&source, None).unwrap();

        let mut writer = Writer::with_new_stage();
        assert!(writer.write(first.universe()).unwrap());
        let written = writer.into_stage();

        let mut second = Reader::with_config(ReaderConfig::default());
        second.read_stage(&written, None).unwrap();

        assert_eq!(first.nodes().len(), second.nodes().len());
        for id in first.nodes() {
            let a = first.universe().node(*id).unwrap();
            let b_id = second.universe().lookup(a.name()).unwrap();
            let b = second.universe().node(b_id).unwrap();
            assert_eq!(a.node_type(), b.node_type(), "{}", a.name());
            assert!(
                a.get_matrix().abs_diff_eq(b.get_matrix(), 1e-4),
                "{}",
                a.name()
            );
        }

        let light = |r: &Reader| {
            let id = r.universe().lookup("/World/Sun").unwrap();
            r.universe().node(id).unwrap()
        };
        assert!((light(&second).get_float("intensity") - 4.0).abs() < 1e-4);
        assert!((light(&second).get_float("angle") - 2.0).abs() < 1e-4);

        let cam = |r: &Reader| {
            let id = r.universe().lookup("/World/Cam").unwrap();
            r.universe().node(id).unwrap()
        };
        let fov = |n: &Node| n.get_array("fov").unwrap().floats().unwrap()[0];
        assert!((fov(&cam(&first)) - fov(&cam(&second))).abs() < 1e-3);

        let mesh_id = second.universe().lookup("/World/Mesh").unwrap();
        let mesh = second.universe().node(mesh_id).unwrap();
        assert_eq!(mesh.get_array("vlist").unwrap().vec3s().unwrap().len(), 3);
        assert_eq!(mesh.get_node("shader"), second.universe().lookup("/World/Surface"));
    }
}
