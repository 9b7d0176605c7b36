//! Native nodes.

use std::fmt;

use indexmap::IndexMap;
use sb_math::{Mat4, Vec3};
use thiserror::Error;

use super::mask::NodeMask;
use super::param::{ParamArray, ParamType, ParamValue};
use super::schema::NodeEntry;

/// Errors raised by the native universe.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NativeError {
    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    #[error("node type '{node_type}' has no parameter '{param}'")]
    UnknownParameter { node_type: String, param: String },

    #[error("parameter '{param}' expects {expected}, got {found}")]
    TypeMismatch {
        param: String,
        expected: ParamType,
        found: ParamType,
    },

    #[error("'{value}' is not a valid value for enum parameter '{param}'")]
    InvalidEnum { param: String, value: String },

    #[error("parameter '{0}' does not accept motion keys")]
    NotMotionCapable(String),

    #[error("a node named '{0}' already exists")]
    DuplicateName(String),

    #[error("node type '{0}' does not support user parameters")]
    UserParamsUnsupported(String),

    #[error("user parameter '{0}' collides with a built-in parameter")]
    UserParamCollision(String),

    #[error("no node with id {0}")]
    NoSuchNode(NodeId),
}

/// Result type for native operations.
pub type NativeResult<T> = Result<T, NativeError>;

/// Handle to a node inside a [`super::Universe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A parameter link to another node's output.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub source: NodeId,
    /// Output component (`r`, `g`, `b`, `a`, `x`, `y`, `z`); `None` links the whole output.
    pub component: Option<char>,
}

/// How a user parameter varies over a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserParamScope {
    Constant,
    Uniform,
    Varying,
    Indexed,
}

impl UserParamScope {
    pub fn keyword(&self) -> &'static str {
        match self {
            UserParamScope::Constant => "constant",
            UserParamScope::Uniform => "uniform",
            UserParamScope::Varying => "varying",
            UserParamScope::Indexed => "indexed",
        }
    }
}

/// An arbitrary parameter declared on a node (primvars, custom attributes).
#[derive(Debug, Clone, PartialEq)]
pub struct UserParam {
    pub scope: UserParamScope,
    pub value: ParamValue,
    /// Per face-vertex indices of an `Indexed` parameter.
    pub indices: Option<Vec<u32>>,
}

/// A native node: a typed parameter set plus links and user parameters.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    name: String,
    entry: &'static NodeEntry,
    parent: Option<NodeId>,
    params: IndexMap<&'static str, ParamValue>,
    links: IndexMap<&'static str, Link>,
    user_params: IndexMap<String, UserParam>,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        name: String,
        entry: &'static NodeEntry,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            id,
            name,
            entry,
            parent,
            params: IndexMap::new(),
            links: IndexMap::new(),
            user_params: IndexMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_type(&self) -> &'static str {
        self.entry.name
    }

    pub fn entry(&self) -> &'static NodeEntry {
        self.entry
    }

    pub fn category(&self) -> NodeMask {
        self.entry.category
    }

    /// The procedural that owns this node, if any.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Current value of a built-in parameter, falling back to the schema default.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        let def = self.entry.param(name)?;
        Some(self.params.get(def.name).unwrap_or(&def.default))
    }

    /// True if the parameter was explicitly set.
    pub fn is_set(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// True if the parameter was set to something other than its default.
    pub fn is_non_default(&self, name: &str) -> bool {
        match (self.params.get(name), self.entry.param(name)) {
            (Some(value), Some(def)) => *value != def.default,
            _ => false,
        }
    }

    /// Set a built-in parameter, checking it against the schema.
    pub fn set(&mut self, name: &str, value: ParamValue) -> NativeResult<()> {
        let def = self
            .entry
            .param(name)
            .ok_or_else(|| NativeError::UnknownParameter {
                node_type: self.entry.name.to_string(),
                param: name.to_string(),
            })?;
        let found = value.param_type();
        if found != def.ty {
            return Err(NativeError::TypeMismatch {
                param: name.to_string(),
                expected: def.ty,
                found,
            });
        }
        if let ParamValue::Enum(text) = &value {
            if !def.enum_values.contains(&text.as_str()) {
                return Err(NativeError::InvalidEnum {
                    param: name.to_string(),
                    value: text.clone(),
                });
            }
        }
        if let ParamValue::Array(array) = &value {
            if array.keys > 1 && !def.motion {
                return Err(NativeError::NotMotionCapable(name.to_string()));
            }
        }
        self.params.insert(def.name, value);
        Ok(())
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).and_then(ParamValue::as_bool).unwrap_or(false)
    }

    pub fn get_int(&self, name: &str) -> i64 {
        self.get(name).and_then(ParamValue::as_i64).unwrap_or(0)
    }

    pub fn get_float(&self, name: &str) -> f32 {
        self.get(name).and_then(ParamValue::as_f32).unwrap_or(0.0)
    }

    pub fn get_str(&self, name: &str) -> &str {
        self.get(name).and_then(ParamValue::as_str).unwrap_or("")
    }

    pub fn get_vec3(&self, name: &str) -> Vec3 {
        self.get(name).and_then(ParamValue::as_vec3).unwrap_or(Vec3::ZERO)
    }

    /// First key of the `matrix` parameter.
    pub fn get_matrix(&self) -> Mat4 {
        self.get("matrix")
            .and_then(ParamValue::as_matrix)
            .unwrap_or(Mat4::IDENTITY)
    }

    pub fn get_node(&self, name: &str) -> Option<NodeId> {
        self.get(name).and_then(ParamValue::as_node)
    }

    pub fn get_array(&self, name: &str) -> Option<&ParamArray> {
        self.get(name).and_then(ParamValue::as_array)
    }

    /// Link a parameter to another node's output.
    pub fn link(&mut self, name: &str, source: NodeId, component: Option<char>) -> NativeResult<()> {
        let def = self
            .entry
            .param(name)
            .ok_or_else(|| NativeError::UnknownParameter {
                node_type: self.entry.name.to_string(),
                param: name.to_string(),
            })?;
        self.links.insert(def.name, Link { source, component });
        Ok(())
    }

    pub fn link_of(&self, name: &str) -> Option<&Link> {
        self.links.get(name)
    }

    pub fn links(&self) -> impl Iterator<Item = (&'static str, &Link)> {
        self.links.iter().map(|(k, v)| (*k, v))
    }

    /// Declare (or replace) a user parameter.
    pub fn declare_user(&mut self, name: &str, param: UserParam) -> NativeResult<()> {
        if !self.entry.supports_user_params {
            return Err(NativeError::UserParamsUnsupported(self.entry.name.to_string()));
        }
        if self.entry.param(name).is_some() {
            return Err(NativeError::UserParamCollision(name.to_string()));
        }
        self.user_params.insert(name.to_string(), param);
        Ok(())
    }

    pub fn user_param(&self, name: &str) -> Option<&UserParam> {
        self.user_params.get(name)
    }

    pub fn user_params(&self) -> impl Iterator<Item = (&str, &UserParam)> {
        self.user_params.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::param::ArrayData;
    use crate::native::schema::node_entry;

    fn node(node_type: &str) -> Node {
        Node::new(NodeId(1), "test".into(), node_entry(node_type).unwrap(), None)
    }

    #[test]
    fn test_defaults_until_set() {
        let mut sphere = node("sphere");
        assert_eq!(sphere.get_float("radius"), 0.5);
        assert!(!sphere.is_set("radius"));

        sphere.set("radius", ParamValue::Float(2.0)).unwrap();
        assert_eq!(sphere.get_float("radius"), 2.0);
        assert!(sphere.is_non_default("radius"));

        sphere.set("radius", ParamValue::Float(0.5)).unwrap();
        assert!(sphere.is_set("radius"));
        assert!(!sphere.is_non_default("radius"));
    }

    #[test]
    fn test_set_type_checks() {
        let mut sphere = node("sphere");
        assert!(matches!(
            sphere.set("radius", ParamValue::Int(2)),
            Err(NativeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            sphere.set("nope", ParamValue::Int(2)),
            Err(NativeError::UnknownParameter { .. })
        ));

        let mut mesh = node("polymesh");
        assert!(mesh
            .set("subdiv_type", ParamValue::Enum("catclark".into()))
            .is_ok());
        assert!(matches!(
            mesh.set("subdiv_type", ParamValue::Enum("loop".into())),
            Err(NativeError::InvalidEnum { .. })
        ));
    }

    #[test]
    fn test_motion_keys_only_on_motion_params() {
        let mut mesh = node("polymesh");
        let two_keys = ParamArray::with_keys(ArrayData::Vector(vec![Vec3::ZERO, Vec3::ONE]), 2);
        assert!(mesh.set("vlist", ParamValue::Array(two_keys)).is_ok());

        let two_keys = ParamArray::with_keys(ArrayData::UInt(vec![0, 1]), 2);
        assert!(matches!(
            mesh.set("vidxlist", ParamValue::Array(two_keys)),
            Err(NativeError::NotMotionCapable(_))
        ));
    }

    #[test]
    fn test_user_params() {
        let mut mesh = node("polymesh");
        let param = UserParam {
            scope: UserParamScope::Constant,
            value: ParamValue::Float(1.0),
            indices: None,
        };
        mesh.declare_user("weight", param.clone()).unwrap();
        assert_eq!(mesh.user_param("weight"), Some(&param));
        assert!(matches!(
            mesh.declare_user("vlist", param.clone()),
            Err(NativeError::UserParamCollision(_))
        ));

        let mut driver = node("driver_exr");
        assert!(matches!(
            driver.declare_user("weight", param),
            Err(NativeError::UserParamsUnsupported(_))
        ));
    }

    #[test]
    fn test_links() {
        let mut surface = node("standard_surface");
        surface.link("base_color", NodeId(7), None).unwrap();
        assert_eq!(surface.link_of("base_color").unwrap().source, NodeId(7));
        assert!(surface.link("nope", NodeId(7), None).is_err());
    }
}
