//! Context objects passed to every translator call.
//!
//! A [`ReadContext`] belongs to one worker: it collects the nodes created, the
//! connections to resolve once every worker has finished, and diagnostics. The state shared
//! by all workers lives in a [`ReadSession`]. A [`WriteContext`] wraps the destination layer
//! and the node-to-path table of a write.

use std::collections::{HashMap, HashSet};

use sb_core::native::{
    node_entry, ArrayData, ElemType, NativeError, Node, NodeEntry, NodeId, NodeMask, ParamArray,
    ParamType, ParamValue, Universe, UserParam, UserParamScope,
};
use sb_core::usd::{
    types, Attribute, Layer, Prim, PrimSpec, Relationship, ScenePath, Stage, Target, TypeName,
    Value,
};
use sb_math::{Interval, Mat4};

use crate::convert;
use crate::diagnostics::Diagnostic;
use crate::reader::ReaderConfig;
use crate::registry::NodeRegistry;
use crate::translator::{TranslateResult, TranslatorRegistry};
use crate::writer::WriterConfig;
use crate::xform;

/// What a deferred connection sets once every node exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Link the parameter to the output of the target's node.
    Link,
    /// Point a node parameter at the target's node.
    Node,
    /// Fill a node-array parameter with the targets' nodes.
    NodeArray,
    /// Resolve a material binding into the `shader` and `disp_map` parameters.
    Material,
    /// The targets are included in the light's `param` collection (`light_group` or
    /// `shadow_group`). With `include_root` every shape is a member.
    CollectionIncludes { include_root: bool },
    /// The targets are excluded from the light's `param` collection.
    CollectionExcludes,
}

/// A reference from a node to other prims, resolved after all workers have joined.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub node: NodeId,
    pub param: String,
    pub kind: ConnectionKind,
    pub targets: Vec<Target>,
    /// Prim the connection was authored on.
    pub source: ScenePath,
}

/// State shared by every worker of one read.
pub struct ReadSession<'a> {
    pub stage: &'a Stage,
    pub universe: &'a Universe,
    pub registry: &'a NodeRegistry,
    pub translators: &'a TranslatorRegistry,
    pub config: &'a ReaderConfig,
    pub parent: Option<NodeId>,
}

/// Per-worker read state.
pub struct ReadContext<'a> {
    session: &'a ReadSession<'a>,
    hidden: bool,
    pub(crate) created: Vec<NodeId>,
    pub(crate) connections: Vec<Connection>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<'a> ReadContext<'a> {
    pub fn new(session: &'a ReadSession<'a>) -> Self {
        Self {
            session,
            hidden: false,
            created: Vec::new(),
            connections: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn stage(&self) -> &'a Stage {
        self.session.stage
    }

    pub fn universe(&self) -> &'a Universe {
        self.session.universe
    }

    pub fn registry(&self) -> &'a NodeRegistry {
        self.session.registry
    }

    pub fn frame(&self) -> f64 {
        self.session.config.frame
    }

    /// Shutter window relative to the frame, when motion blur is on and not degenerate.
    pub fn motion_window(&self) -> Option<Interval> {
        self.session
            .config
            .motion_blur
            .filter(Interval::is_open)
    }

    /// True while reading prims below a point instancer; shapes created then are hidden.
    pub fn hidden(&self) -> bool {
        self.hidden
    }

    /// Nodes created by this worker so far.
    pub fn created(&self) -> &[NodeId] {
        &self.created
    }

    pub fn warn(&mut self, path: impl std::fmt::Display, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::warning(path, message));
    }

    /// Create the node for `(path, key)`, or return the one already registered.
    ///
    /// Returns `Ok(None)` when the node type's category is masked out. New nodes get the
    /// procedural parent, the motion window and, below an instancer, zero visibility.
    pub fn create_node(
        &mut self,
        path: &ScenePath,
        key: &str,
        node_type: &str,
    ) -> TranslateResult<Option<NodeId>> {
        let entry = node_entry(node_type)
            .ok_or_else(|| NativeError::UnknownNodeType(node_type.to_string()))?;
        if !self.session.config.mask.contains(entry.category) {
            log::debug!("{}: {} masked out", path, node_type);
            return Ok(None);
        }

        let name = if key.is_empty() {
            path.to_string()
        } else {
            format!("{}:{}", path, key)
        };
        let universe = self.session.universe;
        let parent = self.session.parent;
        let (id, created) = self
            .session
            .registry
            .get_or_create(path, key, || universe.create_node(node_type, &name, parent))?;
        if !created {
            return Ok(Some(id));
        }

        if self.session.config.debug {
            log::info!("Created {} {}", node_type, name);
        } else {
            log::debug!("Created {} {}", node_type, name);
        }
        self.created.push(id);

        if let Some(window) = self.motion_window() {
            if entry.param("motion_start").is_some() {
                self.set(id, "motion_start", ParamValue::Float(window.min));
                self.set(id, "motion_end", ParamValue::Float(window.max));
            }
        }
        if self.hidden && entry.category == NodeMask::SHAPE {
            self.set(id, "visibility", ParamValue::Byte(0));
        }
        Ok(Some(id))
    }

    /// Register an existing node (the options singleton) for `path` without creating one.
    pub fn adopt_node(&mut self, path: &ScenePath, id: NodeId) -> NodeId {
        self.session
            .registry
            .get_or_create(path, "", || Ok(id))
            .map(|(id, _)| id)
            .unwrap_or(id)
    }

    /// Set a parameter, recording a diagnostic instead of failing the prim.
    pub fn set(&mut self, id: NodeId, name: &str, value: ParamValue) {
        let result = self
            .session
            .universe
            .with_node_mut(id, |node| node.set(name, value));
        if let Ok(Err(e)) | Err(e) = result {
            self.warn(id, format!("cannot set '{}': {}", name, e));
        }
    }

    pub fn link(&mut self, id: NodeId, name: &str, source: NodeId, component: Option<char>) {
        let result = self
            .session
            .universe
            .with_node_mut(id, |node| node.link(name, source, component));
        if let Ok(Err(e)) | Err(e) = result {
            self.warn(id, format!("cannot link '{}': {}", name, e));
        }
    }

    pub fn declare_user(&mut self, id: NodeId, name: &str, param: UserParam) {
        let result = self
            .session
            .universe
            .with_node_mut(id, |node| node.declare_user(name, param));
        if let Ok(Err(e)) | Err(e) = result {
            self.warn(id, format!("dropped user parameter '{}': {}", name, e));
        }
    }

    /// Queue a connection for the resolution pass.
    pub fn connect(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    /// Value of an attribute at the current frame.
    pub fn value(&self, prim: &Prim, name: &str) -> Option<Value> {
        prim.value_at(name, self.frame())
    }

    pub fn float(&self, prim: &Prim, name: &str) -> Option<f32> {
        self.value(prim, name).and_then(|v| v.as_f32())
    }

    pub fn token(&self, prim: &Prim, name: &str) -> Option<String> {
        self.value(prim, name)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Times at which attributes varying over the shutter are sampled.
    ///
    /// With motion blur on and any attribute time-varying, the window is covered by
    /// `max(2, authored samples inside it)` evenly spaced keys; otherwise one key at the
    /// frame.
    pub fn sample_times(&self, attrs: &[&Attribute]) -> Vec<f64> {
        let frame = self.frame();
        let Some(window) = self.motion_window() else {
            return vec![frame];
        };
        if !attrs.iter().any(|a| a.is_time_varying()) {
            return vec![frame];
        }
        let start = frame + window.min as f64;
        let end = frame + window.max as f64;
        let authored = attrs
            .iter()
            .map(|a| a.sample_times_in(start, end).len())
            .max()
            .unwrap_or(0);
        let n = authored.max(2);
        (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect()
    }

    /// An attribute's values at its sample times.
    pub fn samples(&self, prim: &Prim, name: &str) -> Option<Vec<Value>> {
        let attr = prim.attribute(name)?;
        let values: Vec<Value> = self
            .sample_times(&[attr])
            .into_iter()
            .filter_map(|t| attr.value_at(t))
            .collect();
        (!values.is_empty()).then_some(values)
    }

    /// World transform keys of a prim.
    pub fn world_matrices(&self, prim: &Prim) -> Vec<Mat4> {
        let stage = self.stage();
        let attrs = xform::transform_attributes(stage, prim);
        self.sample_times(&attrs)
            .into_iter()
            .map(|t| xform::world_transform(stage, prim, t))
            .collect()
    }

    /// Set the `matrix` parameter from the prim's world transform.
    pub fn set_matrix(&mut self, prim: &Prim, id: NodeId) {
        let matrices = self.world_matrices(prim);
        let keys = matrices.len();
        let motion = self
            .universe()
            .with_node(id, |n| n.entry().param("matrix").map(|p| p.motion))
            .ok()
            .flatten();
        let value = match motion {
            Some(true) => ParamValue::Array(ParamArray::with_keys(ArrayData::Matrix(matrices), keys)),
            Some(false) => ParamValue::Matrix(matrices.first().copied().unwrap_or(Mat4::IDENTITY)),
            None => return,
        };
        self.set(id, "matrix", value);
    }

    /// Inherited visibility at the current frame.
    pub fn is_visible(&self, prim: &Prim) -> bool {
        let stage = self.stage();
        let frame = self.frame();
        let invisible = |p: &Prim| {
            p.value_at("visibility", frame)
                .map(|v| v.as_str() == Some("invisible"))
                .unwrap_or(false)
        };
        !invisible(prim)
            && prim
                .path()
                .ancestors()
                .iter()
                .filter_map(|p| stage.prim(p))
                .all(|p| !invisible(p))
    }

    /// Attributes every shape shares: transform, visibility, sidedness and material.
    pub fn read_shape_common(&mut self, prim: &Prim, id: NodeId) {
        self.set_matrix(prim, id);
        if !self.is_visible(prim) {
            self.set(id, "visibility", ParamValue::Byte(0));
        }
        if let Some(double_sided) = self.value(prim, "doubleSided").and_then(|v| v.as_bool()) {
            let sidedness = if double_sided { 255 } else { 0 };
            self.set(id, "sidedness", ParamValue::Byte(sidedness));
        }
        if let Some(binding) = prim.relationship("material:binding") {
            if !binding.targets.is_empty() {
                self.connect(Connection {
                    node: id,
                    param: "shader".to_string(),
                    kind: ConnectionKind::Material,
                    targets: binding.targets.clone(),
                    source: prim.path().clone(),
                });
            }
        }
    }

    /// Map the attributes no translator consumed: `arnold:<param>` onto parameters,
    /// `primvars:<name>` and custom attributes onto user parameters, and
    /// `arnold:<param>` relationships onto node parameters.
    pub fn read_custom(&mut self, prim: &Prim, id: NodeId, consumed: &[&str]) {
        let Ok(entry) = self.universe().with_node(id, |n| n.entry()) else {
            return;
        };
        for (name, attr) in prim.attributes() {
            if consumed.contains(&name) {
                continue;
            }
            if let Some(param) = name
                .strip_prefix("arnold:")
                .or_else(|| name.strip_prefix("primvars:arnold:"))
            {
                self.read_param(prim, id, entry, param, attr);
            } else if let Some(primvar) = name.strip_prefix("primvars:") {
                if primvar.ends_with(":indices") {
                    continue;
                }
                self.read_primvar(prim, id, primvar, attr);
            } else if attr.custom {
                let Some(value) = attr.value_at(self.frame()) else {
                    continue;
                };
                match convert::user_param_of(&value, attr.type_name) {
                    Some(value) if entry.supports_user_params => self.declare_user(
                        id,
                        name,
                        UserParam {
                            scope: UserParamScope::Constant,
                            value,
                            indices: None,
                        },
                    ),
                    _ => self.warn(prim.path(), format!("dropped custom attribute '{}'", name)),
                }
            }
        }

        for (name, rel) in prim.relationships() {
            if consumed.contains(&name) {
                continue;
            }
            if let Some(param) = name.strip_prefix("arnold:") {
                self.read_node_param(prim, id, entry, param, rel);
            }
        }
    }

    fn read_param(
        &mut self,
        prim: &Prim,
        id: NodeId,
        entry: &NodeEntry,
        param: &str,
        attr: &Attribute,
    ) {
        let Some(def) = entry.param(param) else {
            self.warn(
                prim.path(),
                format!("{} has no parameter '{}'", entry.name, param),
            );
            return;
        };
        if let Some(target) = attr.connections.first() {
            self.connect(Connection {
                node: id,
                param: def.name.to_string(),
                kind: ConnectionKind::Link,
                targets: vec![target.clone()],
                source: prim.path().clone(),
            });
        }
        if !attr.has_value() {
            return;
        }

        let value = match def.ty {
            ParamType::Array(elem) if def.motion => self
                .samples_of(attr)
                .and_then(|keys| convert::to_motion_array(&keys, elem))
                .map(ParamValue::Array),
            ty => attr
                .value_at(self.frame())
                .and_then(|v| convert::to_param(&v, ty)),
        };
        match value {
            Some(value) => self.set(id, def.name, value),
            None => self.warn(
                prim.path(),
                format!("cannot convert '{}' to {}", param, def.ty),
            ),
        }
    }

    fn samples_of(&self, attr: &Attribute) -> Option<Vec<Value>> {
        let values: Vec<Value> = self
            .sample_times(&[attr])
            .into_iter()
            .filter_map(|t| attr.value_at(t))
            .collect();
        (!values.is_empty()).then_some(values)
    }

    fn read_node_param(
        &mut self,
        prim: &Prim,
        id: NodeId,
        entry: &NodeEntry,
        param: &str,
        rel: &Relationship,
    ) {
        let kind = match entry.param(param).map(|d| d.ty) {
            Some(ParamType::Node) => ConnectionKind::Node,
            Some(ParamType::Array(ElemType::Node)) => ConnectionKind::NodeArray,
            _ => {
                self.warn(
                    prim.path(),
                    format!("{} has no node parameter '{}'", entry.name, param),
                );
                return;
            }
        };
        self.connect(Connection {
            node: id,
            param: param.to_string(),
            kind,
            targets: rel.targets.clone(),
            source: prim.path().clone(),
        });
    }

    fn read_primvar(&mut self, prim: &Prim, id: NodeId, name: &str, attr: &Attribute) {
        let Some(value) = attr
            .value_at(self.frame())
            .and_then(|v| convert::user_param_of(&v, attr.type_name))
        else {
            self.warn(prim.path(), format!("unsupported primvar '{}'", name));
            return;
        };
        let indices = self
            .value(prim, &format!("primvars:{}:indices", name))
            .and_then(|v| v.to_ints());
        let (scope, indices) = match attr.interpolation.as_deref() {
            None | Some("constant") => (UserParamScope::Constant, None),
            Some("uniform") => (UserParamScope::Uniform, None),
            Some("varying") | Some("vertex") => (UserParamScope::Varying, None),
            Some(_) => {
                let count = value
                    .as_array()
                    .map(|a| a.data.len())
                    .unwrap_or(1) as u32;
                let indices = match indices {
                    Some(indices) => indices.into_iter().map(|i| i.max(0) as u32).collect(),
                    None => (0..count).collect(),
                };
                (UserParamScope::Indexed, Some(indices))
            }
        };
        self.declare_user(
            id,
            name,
            UserParam {
                scope,
                value,
                indices,
            },
        );
    }
}

/// Write state for one node.
pub struct WriteContext<'a> {
    layer: &'a mut Layer,
    universe: &'a Universe,
    paths: &'a HashMap<NodeId, ScenePath>,
    /// Written prims that carry their own transform.
    xform_paths: &'a HashSet<ScenePath>,
    config: &'a WriterConfig,
    path: ScenePath,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> WriteContext<'a> {
    pub(crate) fn new(
        layer: &'a mut Layer,
        universe: &'a Universe,
        paths: &'a HashMap<NodeId, ScenePath>,
        xform_paths: &'a HashSet<ScenePath>,
        config: &'a WriterConfig,
        path: ScenePath,
        diagnostics: &'a mut Vec<Diagnostic>,
    ) -> Self {
        Self {
            layer,
            universe,
            paths,
            xform_paths,
            config,
            path,
            diagnostics,
        }
    }

    /// Path of the prim being written.
    pub fn path(&self) -> &ScenePath {
        &self.path
    }

    /// Path written for another node, if it is part of this write.
    pub fn path_of(&self, id: NodeId) -> Option<&ScenePath> {
        self.paths.get(&id)
    }

    pub fn universe(&self) -> &'a Universe {
        self.universe
    }

    pub fn frame(&self) -> f64 {
        self.config.frame
    }

    pub fn write_all(&self) -> bool {
        self.config.write_all_attributes
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::warning(&self.path, message));
    }

    /// The spec of the prim being written.
    pub fn spec(&mut self) -> &mut PrimSpec {
        self.layer.define_prim(&self.path, None)
    }

    /// True if `param` should be authored: explicitly set to a non-default value, or
    /// always when writing every attribute.
    pub fn should_write(&self, node: &Node, param: &str) -> bool {
        self.config.write_all_attributes || node.is_non_default(param)
    }

    /// Author a default value.
    pub fn set_attr(&mut self, name: &str, type_name: TypeName, value: Value) {
        let spec = self.spec();
        let attr = spec
            .attributes
            .entry(name.to_string())
            .or_insert_with(|| Attribute::new(type_name));
        attr.type_name = type_name;
        attr.default = Some(value);
    }

    pub fn set_uniform_attr(&mut self, name: &str, type_name: TypeName, value: Value) {
        self.set_attr(name, type_name, value);
        if let Some(attr) = self.spec().attributes.get_mut(name) {
            attr.uniform = true;
        }
    }

    /// Author `keys` values: one key as a default, several as time samples spread over the
    /// node's motion range around the frame.
    pub fn set_motion_attr(&mut self, node: &Node, name: &str, type_name: TypeName, keys: Vec<Value>) {
        if keys.len() <= 1 {
            if let Some(value) = keys.into_iter().next() {
                self.set_attr(name, type_name, value);
            }
            return;
        }
        let start = node.get_float("motion_start") as f64;
        let end = node.get_float("motion_end") as f64;
        let frame = self.frame();
        let count = keys.len();
        let mut attr = Attribute::new(type_name);
        for (i, value) in keys.into_iter().enumerate() {
            let time = frame + start + (end - start) * i as f64 / (count - 1) as f64;
            attr.set_sample(time, value);
        }
        self.spec().attributes.insert(name.to_string(), attr);
    }

    /// Author a parameter value (all its keys) under `name`.
    pub fn set_param_attr(&mut self, node: &Node, param: &str, name: &str) {
        let Some(value) = node.get(param) else {
            return;
        };
        match convert::to_values(value) {
            Some((type_name, keys)) => self.set_motion_attr(node, name, type_name, keys),
            None => log::debug!("{}: '{}' has no attribute form", self.path, param),
        }
    }

    /// Set the primvar interpolation of an authored attribute.
    pub fn set_interpolation(&mut self, name: &str, interpolation: &str) {
        if let Some(attr) = self.spec().attributes.get_mut(name) {
            attr.interpolation = Some(interpolation.to_string());
        }
    }

    /// Add a connection on an attribute, declaring it if needed.
    pub fn connect_attr(&mut self, name: &str, type_name: TypeName, target: Target) {
        let spec = self.spec();
        let attr = spec
            .attributes
            .entry(name.to_string())
            .or_insert_with(|| Attribute::new(type_name));
        if !attr.connections.contains(&target) {
            attr.connections.push(target);
        }
    }

    pub fn set_rel(&mut self, name: &str, targets: Vec<ScenePath>) {
        let targets = targets.into_iter().map(Target::prim).collect();
        self.spec()
            .relationships
            .insert(name.to_string(), Relationship::new(targets));
    }

    /// Author the node's `matrix` as a transform op, sampled when it has motion keys.
    pub fn write_matrix(&mut self, node: &Node) {
        let matrices: Vec<Mat4> = match node.get("matrix") {
            Some(ParamValue::Matrix(m)) => vec![*m],
            Some(ParamValue::Array(a)) => a.matrices().map(|m| m.to_vec()).unwrap_or_default(),
            _ => return,
        };
        if !self.write_all() && matrices.iter().all(|m| *m == Mat4::IDENTITY) {
            return;
        }
        let keys = matrices.into_iter().map(Value::Matrix4).collect();
        self.set_motion_attr(node, "xformOp:transform", types::MATRIX4D, keys);

        // Node matrices are world transforms.
        let below_xform = self
            .path
            .ancestors()
            .iter()
            .any(|p| self.xform_paths.contains(p));
        let mut order = Vec::new();
        if below_xform {
            order.push("!resetXformStack!".to_string());
        }
        order.push("xformOp:transform".to_string());
        self.set_uniform_attr(
            "xformOpOrder",
            types::TOKEN_ARRAY,
            Value::TokenArray(order),
        );
    }

    /// Author a node parameter as a relationship to the written prims of its targets.
    pub fn write_node_param(&mut self, node: &Node, param: &str, rel_name: &str) {
        let targets: Vec<ScenePath> = match node.get(param) {
            Some(ParamValue::Node(Some(id))) => self.path_of(*id).cloned().into_iter().collect(),
            Some(ParamValue::Array(array)) => array
                .nodes()
                .unwrap_or(&[])
                .iter()
                .flatten()
                .filter_map(|id| self.path_of(*id).cloned())
                .collect(),
            _ => Vec::new(),
        };
        if !targets.is_empty() {
            self.set_rel(rel_name, targets);
        }
    }

    /// Author the node's links as `<prefix><param>.connect` to the source prims' outputs.
    pub fn write_links(&mut self, node: &Node, prefix: &str, skip: &[&str]) {
        for (param, link) in node.links() {
            if skip.contains(&param) {
                continue;
            }
            let Some(source) = self.path_of(link.source).cloned() else {
                self.warn(format!("link source of '{}' was not written", param));
                continue;
            };
            let output = match link.component {
                Some(c) => format!("outputs:{}", c),
                None => "outputs:out".to_string(),
            };
            let type_name = node
                .get(param)
                .and_then(convert::to_values)
                .map(|(t, _)| t)
                .unwrap_or(types::FLOAT);
            self.connect_attr(
                &format!("{}{}", prefix, param),
                type_name,
                Target::property(source, output),
            );
        }
    }

    /// Author every parameter not in `skip` as `arnold:<param>`.
    pub fn write_arnold_params(&mut self, node: &Node, skip: &[&str]) {
        let entry = node.entry();
        for def in &entry.params {
            if skip.contains(&def.name) || def.name == "matrix" {
                continue;
            }
            if matches!(def.name, "motion_start" | "motion_end") && !self.write_all() {
                continue;
            }
            let name = format!("arnold:{}", def.name);
            match def.ty {
                ParamType::Node | ParamType::Array(ElemType::Node) => {
                    self.write_node_param(node, def.name, &name);
                }
                _ if self.should_write(node, def.name) => {
                    self.set_param_attr(node, def.name, &name);
                }
                _ => {}
            }
        }
        let mut link_skip: Vec<&str> = skip.to_vec();
        link_skip.push("matrix");
        self.write_links(node, "arnold:", &link_skip);
    }

    /// Author user parameters as primvars.
    pub fn write_user_params(&mut self, node: &Node) {
        for (name, param) in node.user_params() {
            let Some((type_name, keys)) = convert::to_values(&param.value) else {
                continue;
            };
            let Some(value) = keys.into_iter().next() else {
                continue;
            };
            let attr_name = format!("primvars:{}", name);
            self.set_attr(&attr_name, type_name, value);
            let interpolation = match param.scope {
                UserParamScope::Constant => "constant",
                UserParamScope::Uniform => "uniform",
                UserParamScope::Varying => "vertex",
                UserParamScope::Indexed => "faceVarying",
            };
            self.set_interpolation(&attr_name, interpolation);
            if let Some(indices) = &param.indices {
                self.set_attr(
                    &format!("{}:indices", attr_name),
                    types::INT_ARRAY,
                    Value::IntArray(indices.iter().map(|&i| i as i32).collect()),
                );
            }
        }
    }

    /// Shape attributes shared by every shape schema.
    pub fn write_shape_common(&mut self, node: &Node) {
        self.write_matrix(node);
        match node.get_int("visibility") {
            0 => self.set_attr("visibility", types::TOKEN, Value::token("invisible")),
            255 => {}
            // Partial ray visibility has no schema counterpart.
            _ => self.set_param_attr(node, "visibility", "arnold:visibility"),
        }
        if self.should_write(node, "sidedness") {
            self.set_uniform_attr(
                "doubleSided",
                types::BOOL,
                Value::Bool(node.get_int("sidedness") != 0),
            );
        }
        if let Some(shader) = node.get_node("shader") {
            match self.path_of(shader).cloned() {
                Some(path) => self.set_rel("material:binding", vec![path]),
                None => self.warn("bound shader was not written"),
            }
        }
        self.write_user_params(node);
    }
}
