//! The Reader: walks a stage and fills a native universe.
//!
//! A read runs in three phases:
//!
//! 1. Resolve the source stage (file, cache id or stage) and compose the override layers on
//!    a private copy of it.
//! 2. Partition the traversal into independent subtrees and translate them on a rayon pool.
//!    Workers share the [`NodeRegistry`] and the universe; everything else they produce
//!    (created nodes, deferred connections, diagnostics) is kept per prim.
//! 3. After the join, merge the per-prim results in traversal order and resolve the
//!    deferred connections on the calling thread.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sb_core::native::{
    node_entry, ArrayData, NativeError, NodeId, NodeMask, ParamArray, ParamValue, Universe,
};
use sb_core::usd::{Layer, ParseError, Prim, ScenePath, Stage, StageCache, StageError, Target};
use sb_math::Interval;

use crate::context::{Connection, ConnectionKind, ReadContext, ReadSession};
use crate::diagnostics::Diagnostic;
use crate::registry::NodeRegistry;
use crate::translator::TranslatorRegistry;
use crate::translators::material_outputs;

/// Fatal read failures. Nothing is created when one of these is returned.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Native(#[from] NativeError),

    #[error("override layer {index} is malformed: {source}")]
    Override {
        index: usize,
        #[source]
        source: ParseError,
    },

    #[error("no filename, cache id or override layers to read from")]
    NoSource,

    #[error("this reader has already been used")]
    AlreadyRead,

    #[error("{0}")]
    ThreadPool(String),
}

/// Result type for reads.
pub type ReadResult<T> = Result<T, ReadError>;

/// Reader settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Time at which attributes are evaluated.
    pub frame: f64,
    /// Log every created node at info level.
    pub debug: bool,
    /// Worker count; 0 uses every available core.
    pub threads: usize,
    /// Shutter window relative to `frame`. `None` disables motion blur.
    pub motion_blur: Option<Interval>,
    /// Purpose traversed besides "default".
    pub purpose: String,
    /// Node categories to create.
    pub mask: NodeMask,
    /// False creates primary nodes only, without reading their parameters.
    pub convert_primitives: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            frame: 0.0,
            debug: false,
            threads: 1,
            motion_blur: None,
            purpose: "render".to_string(),
            mask: NodeMask::ALL,
            convert_primitives: true,
        }
    }
}

impl ReaderConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Number of workers a read will use.
    pub fn effective_threads(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Parse override fragments (strongest first) into session layers. A fragment without a
/// `#usda` header gets one.
pub fn override_layers(overrides: &[String]) -> ReadResult<Vec<Layer>> {
    overrides
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let parsed = if text.trim_start().starts_with("#usda") {
                Layer::parse(text)
            } else {
                Layer::parse(&format!("#usda 1.0\n{}", text))
            };
            parsed.map_err(|source| ReadError::Override { index, source })
        })
        .collect()
}

/// Converts one stage (or one subtree of it) into native nodes. Single use: create a new
/// reader for every read.
pub struct Reader {
    config: ReaderConfig,
    universe: Arc<Universe>,
    parent: Option<NodeId>,
    translators: Arc<TranslatorRegistry>,
    registry: NodeRegistry,
    nodes: Vec<NodeId>,
    diagnostics: Vec<Diagnostic>,
    used: bool,
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader {
    /// A reader with default settings, filling a new universe.
    pub fn new() -> Self {
        Self::with_config(ReaderConfig::default())
    }

    pub fn with_config(config: ReaderConfig) -> Self {
        Self {
            config,
            universe: Arc::new(Universe::new()),
            parent: None,
            translators: Arc::new(TranslatorRegistry::full()),
            registry: NodeRegistry::new(),
            nodes: Vec::new(),
            diagnostics: Vec::new(),
            used: false,
        }
    }

    pub fn set_frame(&mut self, frame: f64) {
        self.config.frame = frame;
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.config.debug = debug;
    }

    pub fn set_threads(&mut self, threads: usize) {
        self.config.threads = threads;
    }

    pub fn set_motion_blur(&mut self, window: Option<Interval>) {
        self.config.motion_blur = window;
    }

    pub fn set_purpose(&mut self, purpose: impl Into<String>) {
        self.config.purpose = purpose.into();
    }

    pub fn set_mask(&mut self, mask: NodeMask) {
        self.config.mask = mask;
    }

    /// Procedural node that owns every created node.
    pub fn set_procedural_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    pub fn set_universe(&mut self, universe: Arc<Universe>) {
        self.universe = universe;
    }

    pub fn set_convert_primitives(&mut self, convert: bool) {
        self.config.convert_primitives = convert;
    }

    /// Replace the translators, e.g. with a viewport registry.
    pub fn set_translators(&mut self, translators: Arc<TranslatorRegistry>) {
        self.translators = translators;
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    /// Nodes created by the read, in traversal order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Read a file, with override layers composed on top. An empty filename reads the
    /// overrides alone.
    pub fn read_file(
        &mut self,
        filename: &str,
        overrides: &[String],
        object_path: Option<&str>,
    ) -> ReadResult<()> {
        self.begin()?;
        let stage = if filename.is_empty() {
            if overrides.is_empty() {
                return Err(ReadError::NoSource);
            }
            Stage::new_in_memory()
        } else {
            Stage::open(filename)?
        };
        self.read_with_overrides(&stage, overrides, object_path)
    }

    /// Read a stage from the process-wide cache. The cached stage is never modified.
    pub fn read_cache(
        &mut self,
        id: i64,
        overrides: &[String],
        object_path: Option<&str>,
    ) -> ReadResult<()> {
        self.begin()?;
        let stage = StageCache::global()
            .find(id)
            .ok_or(StageError::CacheMiss(id))?;
        self.read_with_overrides(&stage, overrides, object_path)
    }

    pub fn read_stage(&mut self, stage: &Stage, object_path: Option<&str>) -> ReadResult<()> {
        self.begin()?;
        self.traverse(stage, object_path)
    }

    fn begin(&mut self) -> ReadResult<()> {
        if self.used {
            return Err(ReadError::AlreadyRead);
        }
        self.used = true;
        Ok(())
    }

    fn read_with_overrides(
        &mut self,
        stage: &Stage,
        overrides: &[String],
        object_path: Option<&str>,
    ) -> ReadResult<()> {
        let layers = override_layers(overrides)?;
        if layers.is_empty() {
            return self.traverse(stage, object_path);
        }
        let composed = stage.with_session_layers(layers);
        self.traverse(&composed, object_path)
    }

    fn traverse(&mut self, stage: &Stage, object_path: Option<&str>) -> ReadResult<()> {
        let threads = self.config.effective_threads();
        let pool = build_thread_pool(threads)?;

        let session = ReadSession {
            stage,
            universe: &self.universe,
            registry: &self.registry,
            translators: &self.translators,
            config: &self.config,
            parent: self.parent,
        };

        let mut diagnostics = Vec::new();
        let roots = match select_roots(&session, object_path) {
            Ok(roots) => roots,
            Err(diagnostic) => {
                diagnostics.push(diagnostic);
                Vec::new()
            }
        };
        let (upper, units) = partition(&session, roots, threads);
        log::debug!(
            "Reading {} with {} thread(s): {} prims above {} units",
            stage.identifier(),
            threads,
            upper.len(),
            units.len()
        );

        let mut segments: Vec<Segment> = upper.iter().map(|v| process_prim(&session, v)).collect();
        let walked: Vec<Vec<Segment>> = match &pool {
            Some(pool) => pool.install(|| {
                units
                    .par_iter()
                    .map(|unit| walk_unit(&session, unit))
                    .collect()
            }),
            None => units.iter().map(|unit| walk_unit(&session, unit)).collect(),
        };
        segments.extend(walked.into_iter().flatten());
        segments.sort_by(|a, b| a.ordinal.cmp(&b.ordinal));

        let mut nodes = Vec::new();
        let mut connections = Vec::new();
        for segment in segments {
            nodes.extend(segment.created);
            connections.extend(segment.connections);
            diagnostics.extend(segment.diagnostics);
        }
        resolve_connections(&session, &connections, &nodes, &mut diagnostics);

        log::info!(
            "Read {} nodes from {} ({} diagnostics)",
            nodes.len(),
            stage.identifier(),
            diagnostics.len()
        );
        self.nodes = nodes;
        self.diagnostics = diagnostics;
        Ok(())
    }
}

/// `None` when one thread is requested: the read then runs on the calling thread.
fn build_thread_pool(threads: usize) -> ReadResult<Option<rayon::ThreadPool>> {
    if threads <= 1 {
        return Ok(None);
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map(Some)
        .map_err(|e| ReadError::ThreadPool(format!("failed to build rayon thread pool: {e}")))
}

/// A prim to translate, with the state inherited from its ancestors.
#[derive(Clone)]
struct Visit<'s> {
    prim: &'s Prim,
    purpose: String,
    /// Below a point instancer.
    hidden: bool,
    /// Child indices from the traversal root; sorts in pre-order.
    ordinal: Vec<u32>,
}

/// What translating one prim produced.
struct Segment {
    ordinal: Vec<u32>,
    created: Vec<NodeId>,
    connections: Vec<Connection>,
    diagnostics: Vec<Diagnostic>,
}

/// Purpose of `prim` under a parent of purpose `inherited`, or `None` if the subtree is
/// filtered out. A non-default purpose is inherited by the whole subtree.
fn resolve_purpose(prim: &Prim, inherited: &str, wanted: &str, frame: f64) -> Option<String> {
    let purpose = if inherited != "default" {
        inherited.to_string()
    } else {
        prim.value_at("purpose", frame)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "default".to_string())
    };
    (purpose == "default" || purpose == wanted).then_some(purpose)
}

fn visit<'s>(
    session: &ReadSession<'s>,
    prim: &'s Prim,
    purpose: &str,
    hidden: bool,
    ordinal: Vec<u32>,
) -> Option<Visit<'s>> {
    if !prim.is_active() {
        return None;
    }
    let purpose = resolve_purpose(prim, purpose, &session.config.purpose, session.config.frame)?;
    Some(Visit {
        prim,
        purpose,
        hidden,
        ordinal,
    })
}

fn child_visits<'s>(session: &ReadSession<'s>, parent: &Visit<'s>) -> Vec<Visit<'s>> {
    let hidden = parent.hidden || parent.prim.type_name() == "PointInstancer";
    session
        .stage
        .children(parent.prim.path())
        .into_iter()
        .enumerate()
        .filter_map(|(i, child)| {
            let mut ordinal = parent.ordinal.clone();
            ordinal.push(i as u32);
            visit(session, child, &parent.purpose, hidden, ordinal)
        })
        .collect()
}

/// Prims the traversal starts from. A missing or invalid object path yields a diagnostic.
fn select_roots<'s>(
    session: &ReadSession<'s>,
    object_path: Option<&str>,
) -> Result<Vec<Visit<'s>>, Diagnostic> {
    let stage = session.stage;
    let path = match object_path.filter(|p| !p.is_empty()) {
        Some(text) => ScenePath::new(text)
            .map_err(|e| Diagnostic::warning(text, format!("invalid object path: {}", e)))?,
        None => ScenePath::root(),
    };
    if path.is_root() {
        return Ok(stage
            .children(&path)
            .into_iter()
            .enumerate()
            .filter_map(|(i, prim)| visit(session, prim, "default", false, vec![i as u32]))
            .collect());
    }

    let prim = stage
        .prim(&path)
        .ok_or_else(|| Diagnostic::warning(&path, "object path not found in stage"))?;

    // Ancestors are walked for their inherited state only; they are never translated.
    let mut purpose = "default".to_string();
    let mut hidden = false;
    for ancestor in path.ancestors().iter().filter_map(|p| stage.prim(p)) {
        match visit(session, ancestor, &purpose, hidden, Vec::new()) {
            Some(state) => purpose = state.purpose,
            None => return Ok(Vec::new()),
        }
        hidden |= ancestor.type_name() == "PointInstancer";
    }
    Ok(visit(session, prim, &purpose, hidden, vec![0]).into_iter().collect())
}

/// Split the traversal into units of work: the shallowest level holding at least
/// `threads` prims, or the deepest level there is. Prims above that level come back in the
/// first list and are translated on their own, without their subtrees.
fn partition<'s>(
    session: &ReadSession<'s>,
    roots: Vec<Visit<'s>>,
    threads: usize,
) -> (Vec<Visit<'s>>, Vec<Visit<'s>>) {
    let mut upper = Vec::new();
    let mut level = roots;
    while level.len() < threads {
        let next: Vec<Visit<'s>> = level
            .iter()
            .flat_map(|v| child_visits(session, v))
            .collect();
        if next.is_empty() {
            break;
        }
        upper.append(&mut level);
        level = next;
    }
    (upper, level)
}

/// Translate a unit subtree in pre-order.
fn walk_unit(session: &ReadSession<'_>, unit: &Visit<'_>) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut stack = vec![unit.clone()];
    while let Some(visit) = stack.pop() {
        segments.push(process_prim(session, &visit));
        let mut children = child_visits(session, &visit);
        children.reverse();
        stack.extend(children);
    }
    segments
}

fn process_prim(session: &ReadSession<'_>, visit: &Visit<'_>) -> Segment {
    let mut ctx = ReadContext::new(session);
    ctx.set_hidden(visit.hidden);
    translate_prim(session, visit.prim, &mut ctx);
    Segment {
        ordinal: visit.ordinal.clone(),
        created: ctx.created,
        connections: ctx.connections,
        diagnostics: ctx.diagnostics,
    }
}

fn translate_prim(session: &ReadSession<'_>, prim: &Prim, ctx: &mut ReadContext<'_>) {
    let type_name = prim.type_name();
    if type_name.is_empty() {
        return;
    }
    let Some(translator) = session.translators.reader_for(type_name) else {
        if session.translators.report_gaps() {
            ctx.warn(prim.path(), format!("no translator for prim type '{}'", type_name));
        }
        return;
    };

    let node_type = translator.node_type(prim);
    if let Some(entry) = node_type.and_then(node_entry) {
        if !session.config.mask.contains(entry.category) {
            log::debug!("{}: {} masked out", prim.path(), entry.name);
            return;
        }
    }

    if !session.config.convert_primitives {
        if let Some(node_type) = node_type.filter(|t| *t != "options") {
            if let Err(e) = ctx.create_node(prim.path(), "", node_type) {
                ctx.diagnostics.push(Diagnostic::error(prim.path(), e.to_string()));
            }
        }
        return;
    }

    if let Err(e) = translator.read(prim, ctx) {
        ctx.diagnostics.push(Diagnostic::error(prim.path(), e.to_string()));
    }
}

/// Node a target prim resolves to: its primary node, else the first node below it.
fn target_node(registry: &NodeRegistry, path: &ScenePath) -> Option<NodeId> {
    registry.primary(path).or_else(|| registry.first_under(path))
}

/// Output component named by `outputs:r`, `outputs:x` and so on.
fn output_component(target: &Target) -> Option<char> {
    let output = target.property.as_deref()?.strip_prefix("outputs:")?;
    let mut chars = output.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if "rgbaxyz".contains(c) => Some(c),
        _ => None,
    }
}

fn category_of(universe: &Universe, id: NodeId) -> NodeMask {
    universe
        .with_node(id, |n| n.category())
        .unwrap_or(NodeMask::NONE)
}

fn resolve_connections(
    session: &ReadSession<'_>,
    connections: &[Connection],
    created: &[NodeId],
    diagnostics: &mut Vec<Diagnostic>,
) {
    let universe = session.universe;
    let registry = session.registry;
    let mut light_links: Vec<&Connection> = Vec::new();

    let set = |diagnostics: &mut Vec<Diagnostic>, conn: &Connection, name: &str, value: ParamValue| {
        let result = universe.with_node_mut(conn.node, |n| n.set(name, value));
        if let Ok(Err(e)) | Err(e) = result {
            diagnostics.push(Diagnostic::error(&conn.source, format!("cannot set '{}': {}", name, e)));
        }
    };
    let missing = |conn: &Connection, target: &dyn std::fmt::Display| {
        Diagnostic::warning(
            &conn.source,
            format!("no connection for '{}': nothing translated at {}", conn.param, target),
        )
    };

    for conn in connections {
        match conn.kind {
            ConnectionKind::Link => {
                let Some(target) = conn.targets.first() else {
                    continue;
                };
                let Some(source) = target_node(registry, &target.prim) else {
                    diagnostics.push(missing(conn, target));
                    continue;
                };
                let component = output_component(target);
                let result = universe.with_node_mut(conn.node, |n| n.link(&conn.param, source, component));
                if let Ok(Err(e)) | Err(e) = result {
                    diagnostics.push(Diagnostic::error(
                        &conn.source,
                        format!("cannot link '{}': {}", conn.param, e),
                    ));
                }
            }
            ConnectionKind::Node => {
                let Some(target) = conn.targets.first() else {
                    continue;
                };
                match target_node(registry, &target.prim) {
                    Some(id) => set(diagnostics, conn, &conn.param, ParamValue::Node(Some(id))),
                    None => diagnostics.push(missing(conn, target)),
                }
            }
            ConnectionKind::NodeArray => {
                let mut ids = Vec::with_capacity(conn.targets.len());
                for target in &conn.targets {
                    match target_node(registry, &target.prim) {
                        Some(id) => ids.push(Some(id)),
                        None => diagnostics.push(missing(conn, target)),
                    }
                }
                let array = ParamValue::Array(ParamArray::new(ArrayData::Node(ids)));
                set(diagnostics, conn, &conn.param, array);
            }
            ConnectionKind::Material => {
                let Some(target) = conn.targets.first() else {
                    continue;
                };
                let (surface, displacement) = material_outputs(session.stage, &target.prim);
                if surface.is_none() && displacement.is_none() {
                    diagnostics.push(missing(conn, target));
                }
                for (param, path) in [("shader", surface), ("disp_map", displacement)] {
                    let Some(path) = path else {
                        continue;
                    };
                    match target_node(registry, &path) {
                        Some(id) => set(diagnostics, conn, param, ParamValue::Node(Some(id))),
                        None => diagnostics.push(missing(conn, &path)),
                    }
                }
            }
            ConnectionKind::CollectionIncludes { .. } | ConnectionKind::CollectionExcludes => {
                light_links.push(conn)
            }
        }
    }

    if light_links.is_empty() {
        return;
    }

    // Membership of every authored collection, keyed by light and group parameter.
    let shapes_under = |target: &Target| -> Vec<NodeId> {
        registry
            .under(&target.prim)
            .into_iter()
            .filter(|id| category_of(universe, *id) == NodeMask::SHAPE)
            .collect()
    };
    let mut collections: HashMap<(NodeId, &str), Membership> = HashMap::new();
    for conn in light_links {
        let membership = collections
            .entry((conn.node, conn.param.as_str()))
            .or_default();
        match conn.kind {
            ConnectionKind::CollectionIncludes { include_root } => {
                membership.include_root |= include_root;
                membership.includes.extend(conn.targets.iter().flat_map(&shapes_under));
            }
            _ => membership.excludes.extend(conn.targets.iter().flat_map(&shapes_under)),
        }
    }

    let lights: Vec<NodeId> = created
        .iter()
        .copied()
        .filter(|id| category_of(universe, *id) == NodeMask::LIGHT)
        .collect();
    let shapes: Vec<NodeId> = created
        .iter()
        .copied()
        .filter(|id| category_of(universe, *id) == NodeMask::SHAPE)
        .collect();
    for (param, toggle) in [("light_group", "use_light_group"), ("shadow_group", "use_shadow_group")] {
        for &shape in &shapes {
            let group: Vec<Option<NodeId>> = lights
                .iter()
                .filter(|light| {
                    collections
                        .get(&(**light, param))
                        .map_or(true, |m| m.contains(shape))
                })
                .map(|light| Some(*light))
                .collect();
            if group.len() == lights.len() {
                continue;
            }
            let result = universe.with_node_mut(shape, |n| {
                n.set(toggle, ParamValue::Bool(true))?;
                n.set(param, ParamValue::Array(ParamArray::new(ArrayData::Node(group))))
            });
            if let Ok(Err(e)) | Err(e) = result {
                diagnostics.push(Diagnostic::error(shape, format!("cannot set {}: {}", param, e)));
            }
        }
    }
}

/// Shapes a light's link collection selects.
#[derive(Debug, Default)]
struct Membership {
    include_root: bool,
    includes: HashSet<NodeId>,
    excludes: HashSet<NodeId>,
}

impl Membership {
    fn contains(&self, shape: NodeId) -> bool {
        (self.include_root || self.includes.contains(&shape)) && !self.excludes.contains(&shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::native::Node;

    const SCENE: &str = r#"#usda 1.0
def Xform "World"
{
    def Mesh "Mesh"
    {
        int[] faceVertexCounts = [4]
        int[] faceVertexIndices = [0, 1, 2, 3]
        point3f[] points = [(-1, -1, 0), (1, -1, 0), (1, 1, 0), (-1, 1, 0)]
        rel material:binding = </World/Looks/Mat>
    }

    def Xform "Proxy"
    {
        uniform token purpose = "proxy"

        def Sphere "Ball"
        {
            double radius = 2
        }
    }

    def Xform "Lights"
    {
        def DistantLight "Sun"
        {
            float inputs:intensity = 3
        }
    }

    def Scope "Looks"
    {
        def Material "Mat"
        {
            token outputs:surface.connect = </World/Looks/Mat/Surface.outputs:surface>

            def Shader "Surface"
            {
                uniform token info:id = "UsdPreviewSurface"
                color3f inputs:diffuseColor = (1, 0, 0)
                token outputs:surface
            }
        }
    }
}
"#;

    fn stage() -> Stage {
        Stage::open_text(SCENE).unwrap()
    }

    fn read(config: ReaderConfig, stage: &Stage, object_path: Option<&str>) -> Reader {
        let mut reader = Reader::with_config(config);
        reader.read_stage(stage, object_path).unwrap();
        reader
    }

    fn names(reader: &Reader) -> Vec<String> {
        reader
            .nodes()
            .iter()
            .map(|id| reader.universe().node(*id).unwrap().name().to_string())
            .collect()
    }

    fn node(reader: &Reader, name: &str) -> Node {
        let id = reader.universe().lookup(name).unwrap();
        reader.universe().node(id).unwrap()
    }

    #[test]
    fn test_read_scene() {
        let reader = read(ReaderConfig::default(), &stage(), None);
        assert_eq!(
            names(&reader),
            vec!["/World/Mesh", "/World/Lights/Sun", "/World/Looks/Mat/Surface"]
        );
        let sun = node(&reader, "/World/Lights/Sun");
        assert_eq!(sun.node_type(), "distant_light");
        assert!((sun.get_float("intensity") - 3.0).abs() < 1e-4);

        let mesh = node(&reader, "/World/Mesh");
        let surface = reader.universe().lookup("/World/Looks/Mat/Surface");
        assert_eq!(mesh.get_node("shader"), surface);
    }

    #[test]
    fn test_reader_single_use() {
        let stage = stage();
        let mut reader = Reader::new();
        reader.read_stage(&stage, None).unwrap();
        assert!(matches!(reader.read_stage(&stage, None), Err(ReadError::AlreadyRead)));
    }

    #[test]
    fn test_fresh_readers_are_idempotent() {
        let stage = stage();
        let first = read(ReaderConfig::default(), &stage, None);
        let second = read(ReaderConfig::default(), &stage, None);
        assert_eq!(names(&first), names(&second));
        assert_eq!(first.universe().len(), second.universe().len());
    }

    #[test]
    fn test_purpose_and_object_path() {
        let stage = stage();
        let proxy = ReaderConfig {
            purpose: "proxy".to_string(),
            ..ReaderConfig::default()
        };

        let reader = read(proxy.clone(), &stage, Some("/World/Proxy"));
        assert_eq!(names(&reader), vec!["/World/Proxy/Ball"]);
        let ball = node(&reader, "/World/Proxy/Ball");
        assert!((ball.get_float("radius") - 2.0).abs() < 1e-4);

        // Render purpose prunes the proxy subtree even when it is the object path.
        let reader = read(ReaderConfig::default(), &stage, Some("/World/Proxy/Ball"));
        assert!(reader.nodes().is_empty());

        let reader = read(proxy, &stage, Some("/World/Lights"));
        assert_eq!(names(&reader), vec!["/World/Lights/Sun"]);
    }

    #[test]
    fn test_missing_object_path_is_a_diagnostic() {
        let reader = read(ReaderConfig::default(), &stage(), Some("/Nope"));
        assert!(reader.nodes().is_empty());
        assert_eq!(reader.diagnostics().len(), 1);
    }

    #[test]
    fn test_shape_mask() {
        let config = ReaderConfig {
            mask: NodeMask::SHAPE,
            ..ReaderConfig::default()
        };
        let reader = read(config, &stage(), None);
        assert_eq!(names(&reader), vec!["/World/Mesh"]);
        assert_eq!(node(&reader, "/World/Mesh").node_type(), "polymesh");
        // The bound shader was masked out.
        assert_eq!(node(&reader, "/World/Mesh").get_node("shader"), None);
    }

    const LINKED_SCENE: &str = r#"#usda 1.0
def Xform "World"
{
    def Xform "Geo"
    {
        def Mesh "Mesh"
        {
            int[] faceVertexCounts = [3]
            int[] faceVertexIndices = [0, 1, 2]
            point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 1, 0)]
            rel material:binding = </World/Looks/Mat>
        }

        def Sphere "A"
        {
            double radius = 0.5
        }
    }

    def Xform "Lights"
    {
        def SphereLight "Key"
        {
            float inputs:intensity = 4
            rel collection:lightLink:includes = </World/Geo>
            rel collection:lightLink:excludes = </World/Geo/A>
        }

        def DistantLight "Fill"
        {
            rel collection:shadowLink:includes = </World/Geo/Mesh>
        }
    }

    def PointInstancer "Scatter"
    {
        point3f[] positions = [(1, 0, 0), (2, 0, 0), (3, 0, 0)]
        int[] protoIndices = [0, 1, 0]
        rel prototypes = [</World/Protos/Pebble>, </World/Geo/A>]
    }

    def Scope "Protos"
    {
        def Sphere "Pebble"
        {
        }
    }

    def Scope "Looks"
    {
        def Material "Mat"
        {
            token outputs:surface.connect = </World/Looks/Mat/Surface.outputs:surface>

            def Shader "Surface"
            {
                uniform token info:id = "UsdPreviewSurface"
                color3f inputs:diffuseColor.connect = </World/Looks/Mat/Tex.outputs:rgb>
            }

            def Shader "Tex"
            {
                uniform token info:id = "UsdUVTexture"
                asset inputs:file = @rock.png@
            }
        }
    }
}
"#;

    /// Every node's type, set parameters and links, with node references written as names
    /// so universes filled in different orders compare equal.
    fn describe(reader: &Reader) -> Vec<String> {
        let universe = reader.universe();
        let name_of = |id: NodeId| {
            universe
                .node(id)
                .map(|n| n.name().to_string())
                .unwrap_or_default()
        };
        reader
            .nodes()
            .iter()
            .map(|id| {
                let n = universe.node(*id).unwrap();
                let mut out = format!("{} {}", n.name(), n.node_type());
                for def in &n.entry().params {
                    if !n.is_set(def.name) {
                        continue;
                    }
                    let value = match n.get(def.name).unwrap() {
                        ParamValue::Node(target) => format!("{:?}", target.map(name_of)),
                        ParamValue::Array(array) => match array.nodes() {
                            Some(targets) => format!(
                                "{:?}",
                                targets.iter().map(|t| t.map(name_of)).collect::<Vec<_>>()
                            ),
                            None => format!("{:?}", array),
                        },
                        other => format!("{:?}", other),
                    };
                    out.push_str(&format!(" {}={}", def.name, value));
                }
                for (param, link) in n.links() {
                    out.push_str(&format!(" {}<-{}{:?}", param, name_of(link.source), link.component));
                }
                out
            })
            .collect()
    }

    #[test]
    fn test_thread_counts_agree() {
        let stage = Stage::open_text(LINKED_SCENE).unwrap();
        let expected = describe(&read(ReaderConfig::default(), &stage, None));
        assert!(expected.iter().any(|d| d.contains("shader=Some(\"/World/Looks/Mat/Surface\")")));
        assert!(expected.iter().any(|d| d.contains("base_color<-/World/Looks/Mat/Tex")));
        assert!(expected.iter().any(|d| d.contains("light_group=")));
        assert!(expected.iter().any(|d| d.contains("shadow_group=")));
        assert!(expected.iter().any(|d| d.contains("node=Some(\"/World/Geo/A\")")));
        for threads in [2, 3, 8, 0] {
            let config = ReaderConfig {
                threads,
                ..ReaderConfig::default()
            };
            assert_eq!(describe(&read(config, &stage, None)), expected, "{} threads", threads);
        }
    }

    #[test]
    fn test_partition_levels() {
        let stage = stage();
        let universe = Universe::new();
        let registry = NodeRegistry::new();
        let translators = TranslatorRegistry::full();
        let config = ReaderConfig::default();
        let session = ReadSession {
            stage: &stage,
            universe: &universe,
            registry: &registry,
            translators: &translators,
            config: &config,
            parent: None,
        };
        let roots = select_roots(&session, None).unwrap();

        let (upper, units) = partition(&session, roots.clone(), 1);
        assert!(upper.is_empty());
        assert_eq!(units.len(), 1);

        // The proxy subtree is pruned, leaving Mesh, Lights and Looks below World.
        let (upper, units) = partition(&session, roots.clone(), 3);
        assert_eq!(upper.len(), 1);
        assert_eq!(units.len(), 3);

        let (_, units) = partition(&session, roots, 64);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].prim.path().as_str(), "/World/Looks/Mat/Surface");
    }

    #[test]
    fn test_motion_sample_counts() {
        let text = r#"#usda 1.0
def Xform "Root"
{
    double3 xformOp:translate.timeSamples = {
        0: (0, 0, 0),
        0.5: (1, 0, 0),
        1: (2, 0, 0),
    }
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Points "Dots"
    {
        point3f[] points = [(0, 0, 0), (1, 1, 1)]
        float[] widths = [0.2, 0.2]
    }
}
"#;
        let stage = Stage::open_text(text).unwrap();

        let still = read(ReaderConfig::default(), &stage, None);
        let dots = node(&still, "/Root/Dots");
        assert_eq!(dots.get_array("matrix").unwrap().keys, 1);

        let config = ReaderConfig {
            motion_blur: Some(Interval::new(0.0, 1.0)),
            ..ReaderConfig::default()
        };
        let moving = read(config.clone(), &stage, None);
        let dots = node(&moving, "/Root/Dots");
        assert_eq!(dots.get_array("matrix").unwrap().keys, 3);
        // Constant points keep a single key.
        assert_eq!(dots.get_array("points").unwrap().keys, 1);
        assert!((dots.get_float("motion_end") - 1.0).abs() < 1e-4);

        let narrow = ReaderConfig {
            motion_blur: Some(Interval::new(0.0, 0.25)),
            ..config
        };
        let reader = read(narrow, &stage, None);
        let dots = node(&reader, "/Root/Dots");
        assert_eq!(dots.get_array("matrix").unwrap().keys, 2);
        let matrices = dots.get_array("matrix").unwrap().matrices().unwrap();
        assert!((matrices[1].w_axis.x - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_overrides_are_private() {
        let base = Arc::new(stage());
        let id = StageCache::global().insert(Arc::clone(&base));
        let overrides = vec![r#"over "World"
{
    over "Lights"
    {
        over "Sun"
        {
            float inputs:intensity = 7
        }
    }
}
"#
        .to_string()];

        let mut reader = Reader::new();
        reader.read_cache(id, &overrides, None).unwrap();
        let sun = node(&reader, "/World/Lights/Sun");
        assert!((sun.get_float("intensity") - 7.0).abs() < 1e-4);
        // The sibling mesh is unaffected.
        assert_eq!(node(&reader, "/World/Mesh").node_type(), "polymesh");

        // The cached stage still holds the original value.
        let cached = StageCache::global().find(id).unwrap();
        let sun_prim = cached.prim(&ScenePath::new("/World/Lights/Sun").unwrap()).unwrap();
        let intensity = sun_prim.value_at("inputs:intensity", 0.0).and_then(|v| v.as_f32());
        assert_eq!(intensity, Some(3.0));
        assert!(cached.session_layers().is_empty());

        let mut reader = Reader::new();
        reader.read_cache(id, &[], None).unwrap();
        assert!((node(&reader, "/World/Lights/Sun").get_float("intensity") - 3.0).abs() < 1e-4);
        StageCache::global().erase(id);
    }

    #[test]
    fn test_source_errors_create_nothing() {
        let mut reader = Reader::new();
        let result = reader.read_file("", &[], None);
        assert!(matches!(result, Err(ReadError::NoSource)));

        let mut reader = Reader::new();
        let result = reader.read_cache(-12345, &[], None);
        assert!(matches!(result, Err(ReadError::Stage(StageError::CacheMiss(-12345)))));

        let mut reader = Reader::new();
        let result = reader.read_file("", &["def Xform \"A\" {".to_string()], None);
        assert!(matches!(result, Err(ReadError::Override { index: 0, .. })));
        assert_eq!(reader.universe().len(), 1);
    }

    #[test]
    fn test_overrides_alone() {
        let mut reader = Reader::new();
        let overrides = vec![r#"def Sphere "Ball"
{
    double radius = 3
}
"#
        .to_string()];
        reader.read_file("", &overrides, None).unwrap();
        assert_eq!(names(&reader), vec!["/Ball"]);
        assert!((node(&reader, "/Ball").get_float("radius") - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_list_only() {
        let config = ReaderConfig {
            convert_primitives: false,
            ..ReaderConfig::default()
        };
        let reader = read(config, &stage(), None);
        assert_eq!(reader.nodes().len(), 3);
        let mesh = node(&reader, "/World/Mesh");
        assert!(!mesh.is_set("vlist"));
        assert_eq!(mesh.get_node("shader"), None);
    }

    #[test]
    fn test_light_links() {
        let text = r#"#usda 1.0
def Xform "World"
{
    def Sphere "A"
    {
    }

    def Sphere "B"
    {
    }

    def SphereLight "Key"
    {
        rel collection:lightLink:includes = </World/A>
    }

    def DistantLight "Fill"
    {
    }
}
"#;
        let stage = Stage::open_text(text).unwrap();
        let reader = read(ReaderConfig::default(), &stage, None);
        let key = reader.universe().lookup("/World/Key");
        let fill = reader.universe().lookup("/World/Fill");

        let a = node(&reader, "/World/A");
        assert!(!a.get_bool("use_light_group"));

        let b = node(&reader, "/World/B");
        assert!(b.get_bool("use_light_group"));
        let group = b.get_array("light_group").unwrap().nodes().unwrap().to_vec();
        assert_eq!(group, vec![fill]);
        assert!(!group.contains(&key));
    }

    #[test]
    fn test_point_instancer() {
        let text = r#"#usda 1.0
def PointInstancer "Scatter"
{
    point3f[] positions = [(0, 0, 0), (5, 0, 0), (9, 0, 0)]
    int[] protoIndices = [0, 0, 0]
    int64[] invisibleIds = [2]
    rel prototypes = </Scatter/Protos/Ball>

    def Scope "Protos"
    {
        def Sphere "Ball"
        {
        }
    }
}
"#;
        let stage = Stage::open_text(text).unwrap();
        let reader = read(ReaderConfig::default(), &stage, None);
        assert_eq!(
            names(&reader),
            vec!["/Scatter:i0", "/Scatter:i1", "/Scatter/Protos/Ball"]
        );
        let ball = reader.universe().lookup("/Scatter/Protos/Ball");
        assert_eq!(node(&reader, "/Scatter/Protos/Ball").get_int("visibility"), 0);

        let second = node(&reader, "/Scatter:i1");
        assert_eq!(second.get_node("node"), ball);
        assert!(!second.get_bool("inherit_xform"));
        let matrix = second.get_array("matrix").unwrap().matrices().unwrap()[0];
        assert!((matrix.w_axis.x - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_window_keeps_one_key() {
        let text = r#"#usda 1.0
def Sphere "Ball"
{
    double3 xformOp:translate.timeSamples = {
        0: (0, 0, 0),
        1: (2, 0, 0),
    }
    uniform token[] xformOpOrder = ["xformOp:translate"]
}
"#;
        let stage = Stage::open_text(text).unwrap();
        let config = ReaderConfig {
            motion_blur: Some(Interval::new(0.5, 0.5)),
            ..ReaderConfig::default()
        };
        let reader = read(config, &stage, None);
        let ball = node(&reader, "/Ball");
        assert_eq!(ball.get_array("matrix").unwrap().keys, 1);
        assert!(!ball.is_set("motion_start"));
        assert!(!ball.is_set("motion_end"));
    }

    #[test]
    fn test_point_instancer_motion() {
        let text = r#"#usda 1.0
def PointInstancer "Scatter"
{
    point3f[] positions.timeSamples = {
        0: [(0, 0, 0)],
        1: [(2, 0, 0)],
    }
    int[] protoIndices = [0]
    rel prototypes = </Scatter/Protos/Ball>

    def Scope "Protos"
    {
        def Sphere "Ball"
        {
        }
    }
}
"#;
        let stage = Stage::open_text(text).unwrap();

        let still = read(ReaderConfig::default(), &stage, None);
        assert_eq!(node(&still, "/Scatter:i0").get_array("matrix").unwrap().keys, 1);

        let config = ReaderConfig {
            motion_blur: Some(Interval::new(0.0, 1.0)),
            ..ReaderConfig::default()
        };
        let reader = read(config, &stage, None);
        let instance = node(&reader, "/Scatter:i0");
        let matrix = instance.get_array("matrix").unwrap();
        assert_eq!(matrix.keys, 2);
        let keys = matrix.matrices().unwrap();
        assert!(keys[0].w_axis.x.abs() < 1e-4);
        assert!((keys[1].w_axis.x - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_point_instancer_invisible_ids() {
        let text = r#"#usda 1.0
def PointInstancer "Scatter"
{
    point3f[] positions = [(0, 0, 0), (5, 0, 0), (9, 0, 0)]
    int[] protoIndices = [0, 0, 0]
    int64[] ids = [10, 11, 12]
    int64[] invisibleIds = [11, 2]
    rel prototypes = </Scatter/Protos/Ball>

    def Scope "Protos"
    {
        def Sphere "Ball"
        {
        }
    }
}
"#;
        let stage = Stage::open_text(text).unwrap();
        let reader = read(ReaderConfig::default(), &stage, None);
        assert_eq!(
            names(&reader),
            vec!["/Scatter:i0", "/Scatter:i2", "/Scatter/Protos/Ball"]
        );
    }

    #[test]
    fn test_light_link_excludes() {
        let text = r#"#usda 1.0
def Xform "World"
{
    def Sphere "A"
    {
    }

    def Sphere "B"
    {
    }

    def SphereLight "Key"
    {
        uniform bool collection:lightLink:includeRoot = 1
        rel collection:lightLink:excludes = </World/B>
    }

    def DistantLight "Fill"
    {
    }

    def DistantLight "Off"
    {
        uniform bool collection:lightLink:includeRoot = 0
    }
}
"#;
        let stage = Stage::open_text(text).unwrap();
        let reader = read(ReaderConfig::default(), &stage, None);
        let key = reader.universe().lookup("/World/Key");
        let fill = reader.universe().lookup("/World/Fill");

        // "Off" includes nothing, so every shape gets a group without it.
        let a = node(&reader, "/World/A");
        assert!(a.get_bool("use_light_group"));
        let group = a.get_array("light_group").unwrap().nodes().unwrap().to_vec();
        assert_eq!(group, vec![key, fill]);

        let b = node(&reader, "/World/B");
        let group = b.get_array("light_group").unwrap().nodes().unwrap().to_vec();
        assert_eq!(group, vec![fill]);
        assert!(!b.get_bool("use_shadow_group"));
    }

    #[test]
    fn test_shadow_links() {
        let text = r#"#usda 1.0
def Xform "World"
{
    def Sphere "A"
    {
    }

    def Sphere "B"
    {
    }

    def SphereLight "Key"
    {
        rel collection:shadowLink:includes = </World/A>
    }

    def DistantLight "Fill"
    {
    }
}
"#;
        let stage = Stage::open_text(text).unwrap();
        let reader = read(ReaderConfig::default(), &stage, None);
        let fill = reader.universe().lookup("/World/Fill");

        let a = node(&reader, "/World/A");
        assert!(!a.get_bool("use_shadow_group"));

        let b = node(&reader, "/World/B");
        assert!(!b.get_bool("use_light_group"));
        assert!(b.get_bool("use_shadow_group"));
        let group = b.get_array("shadow_group").unwrap().nodes().unwrap().to_vec();
        assert_eq!(group, vec![fill]);
    }

    #[test]
    fn test_output_component() {
        let target = |s: &str| Target::parse(s).unwrap();
        assert_eq!(output_component(&target("/T.outputs:r")), Some('r'));
        assert_eq!(output_component(&target("/T.outputs:rgb")), None);
        assert_eq!(output_component(&target("/T")), None);
    }

    #[test]
    fn test_config_from_json() {
        let config = ReaderConfig::from_json(r#"{"frame": 12, "threads": 4}"#).unwrap();
        assert!((config.frame - 12.0).abs() < 1e-9);
        assert_eq!(config.threads, 4);
        assert_eq!(config.purpose, "render");
        assert_eq!(config.mask, NodeMask::ALL);
    }
}
