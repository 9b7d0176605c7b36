//! Layers and prim specs: the authored (uncomposed) scene description.

use indexmap::IndexMap;

use super::attribute::{Attribute, Relationship};
use super::parser::{parse_usda, ParseResult};
use super::path::ScenePath;
use super::serialize::write_usda;
use super::value::Value;

/// How a prim spec contributes to composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specifier {
    Def,
    Over,
    Class,
}

impl Specifier {
    pub fn keyword(&self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }
}

/// One layer's opinions about a prim.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimSpec {
    pub specifier: Specifier,
    pub type_name: Option<String>,
    pub active: Option<bool>,
    pub kind: Option<String>,
    pub attributes: IndexMap<String, Attribute>,
    pub relationships: IndexMap<String, Relationship>,
    /// Child prim names in authored order.
    pub children: Vec<String>,
    /// Other simple prim metadata (`instanceable`, `doc`, ...).
    pub metadata: IndexMap<String, Value>,
}

impl PrimSpec {
    pub fn new(specifier: Specifier) -> Self {
        Self {
            specifier,
            type_name: None,
            active: None,
            kind: None,
            attributes: IndexMap::new(),
            relationships: IndexMap::new(),
            children: Vec::new(),
            metadata: IndexMap::new(),
        }
    }
}

/// Layer-level metadata from the `( ... )` block after the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerMetadata {
    pub default_prim: Option<String>,
    pub start_time_code: Option<f64>,
    pub end_time_code: Option<f64>,
    pub time_codes_per_second: Option<f64>,
    pub up_axis: Option<String>,
    pub meters_per_unit: Option<f64>,
    pub doc: Option<String>,
}

/// A single layer of scene description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layer {
    pub metadata: LayerMetadata,
    prims: IndexMap<ScenePath, PrimSpec>,
    root_children: Vec<String>,
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse USDA text.
    pub fn parse(text: &str) -> ParseResult<Layer> {
        parse_usda(text)
    }

    /// Serialize to USDA text.
    pub fn to_usda(&self) -> String {
        write_usda(self)
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    pub fn prim(&self, path: &ScenePath) -> Option<&PrimSpec> {
        self.prims.get(path)
    }

    pub fn prim_mut(&mut self, path: &ScenePath) -> Option<&mut PrimSpec> {
        self.prims.get_mut(path)
    }

    /// All specs in insertion order.
    pub fn prims(&self) -> impl Iterator<Item = (&ScenePath, &PrimSpec)> {
        self.prims.iter()
    }

    /// Child names of `path` (the pseudo-root included).
    pub fn children_of(&self, path: &ScenePath) -> &[String] {
        if path.is_root() {
            return &self.root_children;
        }
        self.prims
            .get(path)
            .map(|spec| spec.children.as_slice())
            .unwrap_or(&[])
    }

    /// Define a prim, creating typeless `def` ancestors as needed.
    ///
    /// An existing spec is promoted to `def`; `type_name` replaces the authored type
    /// when given.
    pub fn define_prim(&mut self, path: &ScenePath, type_name: Option<&str>) -> &mut PrimSpec {
        let spec = self.ensure_spec(path, Specifier::Def);
        spec.specifier = Specifier::Def;
        if let Some(type_name) = type_name {
            spec.type_name = Some(type_name.to_string());
        }
        spec
    }

    /// Get or create an `over` for `path`; missing ancestors become `over`s too.
    pub fn override_prim(&mut self, path: &ScenePath) -> &mut PrimSpec {
        self.ensure_spec(path, Specifier::Over)
    }

    /// Remove a spec and everything below it.
    pub fn remove_prim(&mut self, path: &ScenePath) -> bool {
        if path.is_root() || !self.prims.contains_key(path) {
            return false;
        }
        self.prims.retain(|p, _| !p.has_prefix(path));
        let name = path.name().to_string();
        match path.parent() {
            Some(parent) if parent.is_root() => self.root_children.retain(|n| *n != name),
            Some(parent) => {
                if let Some(spec) = self.prims.get_mut(&parent) {
                    spec.children.retain(|n| *n != name);
                }
            }
            None => {}
        }
        true
    }

    /// Insert a freshly parsed spec under an already present parent.
    /// Returns false if the layer already holds a spec at `path`.
    pub(crate) fn insert_spec(&mut self, path: &ScenePath, spec: PrimSpec) -> bool {
        if self.prims.contains_key(path) {
            return false;
        }
        let name = path.name().to_string();
        match path.parent() {
            Some(parent) if parent.is_root() => self.root_children.push(name),
            Some(parent) => {
                if let Some(parent_spec) = self.prims.get_mut(&parent) {
                    parent_spec.children.push(name);
                }
            }
            None => return false,
        }
        self.prims.insert(path.clone(), spec);
        true
    }

    fn ensure_spec(&mut self, path: &ScenePath, specifier: Specifier) -> &mut PrimSpec {
        if !self.prims.contains_key(path) {
            if let Some(parent) = path.parent() {
                let name = path.name().to_string();
                if parent.is_root() {
                    if !self.root_children.contains(&name) {
                        self.root_children.push(name);
                    }
                } else {
                    let parent_spec = self.ensure_spec(&parent, specifier);
                    if !parent_spec.children.contains(&name) {
                        parent_spec.children.push(name);
                    }
                }
            }
            self.prims.insert(path.clone(), PrimSpec::new(specifier));
        }
        self.prims
            .entry(path.clone())
            .or_insert_with(|| PrimSpec::new(specifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ScenePath {
        ScenePath::new(s).unwrap()
    }

    #[test]
    fn test_define_prim_creates_ancestors() {
        let mut layer = Layer::new();
        layer.define_prim(&path("/World/Geo/Mesh"), Some("Mesh"));

        assert_eq!(layer.children_of(&ScenePath::root()), &["World".to_string()]);
        assert_eq!(layer.children_of(&path("/World")), &["Geo".to_string()]);

        let world = layer.prim(&path("/World")).unwrap();
        assert_eq!(world.specifier, Specifier::Def);
        assert!(world.type_name.is_none());
        assert_eq!(
            layer.prim(&path("/World/Geo/Mesh")).unwrap().type_name.as_deref(),
            Some("Mesh")
        );
    }

    #[test]
    fn test_override_prim_and_promote() {
        let mut layer = Layer::new();
        layer.override_prim(&path("/World/Light"));
        assert_eq!(layer.prim(&path("/World")).unwrap().specifier, Specifier::Over);

        layer.define_prim(&path("/World/Light"), Some("DistantLight"));
        let spec = layer.prim(&path("/World/Light")).unwrap();
        assert_eq!(spec.specifier, Specifier::Def);
        // Ancestors of an existing spec are left alone.
        assert_eq!(layer.prim(&path("/World")).unwrap().specifier, Specifier::Over);
    }

    #[test]
    fn test_remove_prim_subtree() {
        let mut layer = Layer::new();
        layer.define_prim(&path("/A/B/C"), None);
        layer.define_prim(&path("/A/D"), None);

        assert!(layer.remove_prim(&path("/A/B")));
        assert!(layer.prim(&path("/A/B/C")).is_none());
        assert_eq!(layer.children_of(&path("/A")), &["D".to_string()]);
        assert!(!layer.remove_prim(&path("/A/B")));
    }
}
