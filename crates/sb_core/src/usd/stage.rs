//! Composed stages.
//!
//! A [`Stage`] is a root layer plus an ordered stack of session layers (strongest first),
//! composed into a pre-ordered table of [`Prim`]s. Only the strongest-wins layering needed
//! for session overrides is modelled; references, payloads and variants are not.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use super::attribute::{Attribute, Relationship};
use super::file;
use super::layer::{Layer, LayerMetadata, PrimSpec, Specifier};
use super::parser::ParseError;
use super::path::{PathError, ScenePath};
use super::value::Value;

/// Errors that can occur opening, composing or saving stages.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("unsupported scene file '{0}'")]
    UnsupportedFormat(String),

    #[error("binary crate file '{0}' is not supported")]
    BinaryFormat(String),

    #[error("no stage with cache id {0}")]
    CacheMiss(i64),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Result type for stage operations.
pub type StageResult<T> = Result<T, StageError>;

/// A composed prim.
#[derive(Debug, Clone, PartialEq)]
pub struct Prim {
    path: ScenePath,
    type_name: String,
    active: bool,
    kind: Option<String>,
    attributes: IndexMap<String, Attribute>,
    relationships: IndexMap<String, Relationship>,
    children: Vec<ScenePath>,
    metadata: IndexMap<String, Value>,
}

impl Prim {
    pub fn path(&self) -> &ScenePath {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// Schema type, empty for typeless prims.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn children(&self) -> &[ScenePath] {
        &self.children
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    pub fn relationships(&self) -> impl Iterator<Item = (&str, &Relationship)> {
        self.relationships.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Resolved value of an attribute at `time`.
    pub fn value_at(&self, name: &str, time: f64) -> Option<Value> {
        self.attributes.get(name).and_then(|a| a.value_at(time))
    }
}

/// A root layer with session layers composed on top.
#[derive(Debug, Clone)]
pub struct Stage {
    identifier: String,
    root: Arc<Layer>,
    /// Strongest first.
    session: Vec<Arc<Layer>>,
    prims: IndexMap<ScenePath, Prim>,
    root_children: Vec<ScenePath>,
}

impl Stage {
    /// An empty anonymous stage.
    pub fn new_in_memory() -> Self {
        Self::from_layer(Layer::new(), "anon:memory")
    }

    pub fn from_layer(layer: Layer, identifier: impl Into<String>) -> Self {
        let mut stage = Self {
            identifier: identifier.into(),
            root: Arc::new(layer),
            session: Vec::new(),
            prims: IndexMap::new(),
            root_children: Vec::new(),
        };
        stage.recompose();
        stage
    }

    /// Open a `.usd`/`.usda` file.
    pub fn open(path: impl AsRef<Path>) -> StageResult<Self> {
        let path = path.as_ref();
        let layer = file::read_layer(path)?;
        log::info!("Opened stage {}", path.display());
        Ok(Self::from_layer(layer, path.display().to_string()))
    }

    /// Build a stage from USDA text.
    pub fn open_text(text: &str) -> StageResult<Self> {
        let layer = Layer::parse(text).map_err(|source| StageError::Parse {
            path: "anon:text".to_string(),
            source,
        })?;
        Ok(Self::from_layer(layer, "anon:text"))
    }

    /// A new private stage sharing this stage's root layer, with `layers` (strongest first)
    /// composed above any session layers it already has. `self` is left untouched.
    pub fn with_session_layers(&self, layers: Vec<Layer>) -> Stage {
        let mut session: Vec<Arc<Layer>> = layers.into_iter().map(Arc::new).collect();
        session.extend(self.session.iter().cloned());
        let mut stage = Self {
            identifier: self.identifier.clone(),
            root: Arc::clone(&self.root),
            session,
            prims: IndexMap::new(),
            root_children: Vec::new(),
        };
        stage.recompose();
        stage
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// True if both stages share the same root layer allocation.
    pub fn shares_root_layer(&self, other: &Stage) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    pub fn session_layers(&self) -> &[Arc<Layer>] {
        &self.session
    }

    pub fn metadata(&self) -> &LayerMetadata {
        &self.root.metadata
    }

    /// Edit the root layer and recompose. The layer is copied first if it is shared.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Layer) -> R) -> R {
        let result = f(Arc::make_mut(&mut self.root));
        self.recompose();
        result
    }

    /// Save the root layer as USDA.
    pub fn save(&self, path: impl AsRef<Path>) -> StageResult<()> {
        file::write_layer(&self.root, path.as_ref())
    }

    pub fn prim(&self, path: &ScenePath) -> Option<&Prim> {
        self.prims.get(path)
    }

    /// Every composed prim in pre-order, inactive ones included.
    pub fn prims(&self) -> impl Iterator<Item = &Prim> {
        self.prims.values()
    }

    pub fn len(&self) -> usize {
        self.prims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    /// Children of `path`; the pseudo-root's children for `/`.
    pub fn children(&self, path: &ScenePath) -> Vec<&Prim> {
        let paths = if path.is_root() {
            &self.root_children[..]
        } else {
            match self.prims.get(path) {
                Some(prim) => &prim.children[..],
                None => &[],
            }
        };
        paths.iter().filter_map(|p| self.prims.get(p)).collect()
    }

    /// Active prims in pre-order; inactive prims prune their subtree.
    pub fn traverse(&self) -> Vec<&Prim> {
        let mut out = Vec::new();
        let mut stack: Vec<&Prim> = self.children(&ScenePath::root());
        stack.reverse();
        while let Some(prim) = stack.pop() {
            if !prim.active {
                continue;
            }
            out.push(prim);
            let mut children = self.children(&prim.path);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    fn recompose(&mut self) {
        let mut layers: Vec<&Layer> = self.session.iter().map(|l| l.as_ref()).collect();
        layers.push(&self.root);

        let mut prims = IndexMap::new();
        let root_children = compose_children(&layers, &ScenePath::root(), &mut prims);
        self.prims = prims;
        self.root_children = root_children;
    }
}

/// Compose the children of `parent`, appending them (and their subtrees) to `prims` in
/// pre-order. Returns the composed child paths.
fn compose_children(
    layers: &[&Layer],
    parent: &ScenePath,
    prims: &mut IndexMap<ScenePath, Prim>,
) -> Vec<ScenePath> {
    let mut names: Vec<&str> = Vec::new();
    for layer in layers.iter().rev() {
        for name in layer.children_of(parent) {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
    }

    let mut children = Vec::new();
    for name in names {
        let Ok(path) = parent.child(name) else {
            continue;
        };
        let specs: Vec<&PrimSpec> = layers.iter().filter_map(|l| l.prim(&path)).collect();
        let specifier = specs
            .iter()
            .map(|s| s.specifier)
            .find(|s| *s != Specifier::Over);
        if specifier != Some(Specifier::Def) {
            continue;
        }

        let (index, _) = prims.insert_full(path.clone(), merge_specs(&path, &specs));
        let grandchildren = compose_children(layers, &path, prims);
        if let Some((_, prim)) = prims.get_index_mut(index) {
            prim.children = grandchildren;
        }
        children.push(path);
    }
    children
}

/// Merge specs (strongest first) into one prim.
fn merge_specs(path: &ScenePath, specs: &[&PrimSpec]) -> Prim {
    let mut prim = Prim {
        path: path.clone(),
        type_name: String::new(),
        active: true,
        kind: None,
        attributes: IndexMap::new(),
        relationships: IndexMap::new(),
        children: Vec::new(),
        metadata: IndexMap::new(),
    };

    for spec in specs.iter().rev() {
        if let Some(type_name) = &spec.type_name {
            prim.type_name = type_name.clone();
        }
        if let Some(active) = spec.active {
            prim.active = active;
        }
        if let Some(kind) = &spec.kind {
            prim.kind = Some(kind.clone());
        }
        for (name, attr) in &spec.attributes {
            match prim.attributes.get_mut(name) {
                Some(weaker) => *weaker = merge_attribute(weaker, attr),
                None => {
                    prim.attributes.insert(name.clone(), attr.clone());
                }
            }
        }
        for (name, rel) in &spec.relationships {
            prim.relationships.insert(name.clone(), rel.clone());
        }
        for (key, value) in &spec.metadata {
            prim.metadata.insert(key.clone(), value.clone());
        }
    }
    prim
}

/// The stronger spec's value opinion (default or samples) wins as a unit; connections and
/// metadata fall back to the weaker spec when the stronger one has none.
fn merge_attribute(weaker: &Attribute, stronger: &Attribute) -> Attribute {
    let mut merged = stronger.clone();
    merged.custom |= weaker.custom;
    if !stronger.has_value() {
        merged.default = weaker.default.clone();
        merged.time_samples = weaker.time_samples.clone();
    }
    if stronger.connections.is_empty() {
        merged.connections = weaker.connections.clone();
    }
    if stronger.interpolation.is_none() {
        merged.interpolation = weaker.interpolation.clone();
    }
    if stronger.element_size.is_none() {
        merged.element_size = weaker.element_size;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ScenePath {
        ScenePath::new(s).unwrap()
    }

    const BASE: &str = r#"#usda 1.0
def Xform "World"
{
    def Sphere "Ball"
    {
        double radius = 1
        double radius.timeSamples = {
            1: 1,
            2: 3,
        }
    }
    def Sphere "Hidden" (
        active = false
    )
    {
        def Sphere "Inner"
        {
        }
    }
    over "Ghost"
    {
    }
}
class "Template"
{
}
"#;

    #[test]
    fn test_composition_basics() {
        let stage = Stage::open_text(BASE).unwrap();
        assert!(stage.prim(&path("/World/Ball")).is_some());
        // over-only and class prims are not composed
        assert!(stage.prim(&path("/World/Ghost")).is_none());
        assert!(stage.prim(&path("/Template")).is_none());

        let traversed: Vec<_> = stage.traverse().iter().map(|p| p.path().to_string()).collect();
        assert_eq!(traversed, vec!["/World", "/World/Ball"]);
        assert_eq!(stage.len(), 4);
    }

    #[test]
    fn test_session_layer_overrides_value() {
        let stage = Stage::open_text(BASE).unwrap();
        let session = Layer::parse(
            r#"#usda 1.0
over "World"
{
    over "Ball"
    {
        double radius = 5
    }
    over "Hidden" (
        active = true
    )
    {
    }
    def Cube "Added"
    {
    }
}
"#,
        )
        .unwrap();
        let overridden = stage.with_session_layers(vec![session]);

        let ball = overridden.prim(&path("/World/Ball")).unwrap();
        assert_eq!(ball.value_at("radius", 1.5), Some(Value::Double(5.0)));
        assert!(overridden.prim(&path("/World/Hidden")).unwrap().is_active());
        assert_eq!(
            overridden.prim(&path("/World/Added")).unwrap().type_name(),
            "Cube"
        );

        // The source stage is untouched and still shares its root layer.
        let original = stage.prim(&path("/World/Ball")).unwrap();
        assert_eq!(original.value_at("radius", 1.5), Some(Value::Double(2.0)));
        assert!(stage.prim(&path("/World/Added")).is_none());
        assert!(overridden.shares_root_layer(&stage));
    }

    #[test]
    fn test_children_order_weakest_first() {
        let stage = Stage::open_text(BASE).unwrap();
        let session = Layer::parse("#usda 1.0\ndef \"Zeta\" {}\nover \"World\" {}").unwrap();
        let stage = stage.with_session_layers(vec![session]);
        let names: Vec<_> = stage
            .children(&ScenePath::root())
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["World", "Zeta"]);
    }

    #[test]
    fn test_edit_copies_shared_root() {
        let stage = Stage::open_text(BASE).unwrap();
        let mut copy = stage.clone();
        copy.edit(|layer| {
            layer.define_prim(&path("/World/New"), Some("Cone"));
        });
        assert!(copy.prim(&path("/World/New")).is_some());
        assert!(stage.prim(&path("/World/New")).is_none());
        assert!(!copy.shares_root_layer(&stage));
    }

    #[test]
    fn test_open_text_error() {
        assert!(matches!(
            Stage::open_text("not usda"),
            Err(StageError::Parse { .. })
        ));
    }
}
