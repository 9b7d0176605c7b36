//! The translator trait and the registry that dispatches prims and nodes to translators.

use std::collections::HashMap;
use std::sync::Arc;

use sb_core::native::{NativeError, Node, NodeMask};
use sb_core::usd::{PathError, Prim};
use thiserror::Error;

use crate::context::{ReadContext, WriteContext};
use crate::translators;

/// Errors raised while translating a single prim or node. They never abort a run; the
/// caller records them as diagnostics and moves on.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error(transparent)]
    Native(#[from] NativeError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("missing required attribute '{0}'")]
    MissingAttribute(String),

    #[error("invalid value for '{name}': {message}")]
    InvalidValue { name: String, message: String },

    #[error("unsupported {0}")]
    Unsupported(String),
}

/// Result type for a single translation.
pub type TranslateResult<T> = Result<T, TranslateError>;

/// Converts one scene-description schema to native nodes and back.
pub trait Translator: Send + Sync {
    /// The prim type this translator reads.
    fn schema(&self) -> &str;

    /// Native node types this translator writes.
    fn native_types(&self) -> &[&'static str] {
        &[]
    }

    /// Node categories written when no translator claims the exact node type.
    fn native_categories(&self) -> NodeMask {
        NodeMask::NONE
    }

    /// Type of the primary node created for `prim`, if any. Used for mask checks and for
    /// list-only reads.
    fn node_type(&self, prim: &Prim) -> Option<&'static str>;

    fn read(&self, prim: &Prim, ctx: &mut ReadContext<'_>) -> TranslateResult<()>;

    /// Prim type written for `node`. `None` declines the node, leaving it to the generic
    /// translator.
    fn write_type(&self, _node: &Node) -> Option<String> {
        Some(self.schema().to_string())
    }

    fn write(&self, _node: &Node, _ctx: &mut WriteContext<'_>) -> TranslateResult<()> {
        Ok(())
    }
}

/// Translators keyed by prim type (read) and native node type (write).
#[derive(Clone, Default)]
pub struct TranslatorRegistry {
    readers: HashMap<String, Arc<dyn Translator>>,
    writers: HashMap<&'static str, Vec<Arc<dyn Translator>>>,
    by_category: Vec<Arc<dyn Translator>>,
    generic: Option<Arc<dyn Translator>>,
    report_gaps: bool,
}

impl TranslatorRegistry {
    /// An empty registry that reports schema gaps.
    pub fn new() -> Self {
        Self {
            report_gaps: true,
            ..Self::default()
        }
    }

    /// Every built-in translator.
    pub fn full() -> Self {
        let mut registry = Self::new();
        translators::register_all(&mut registry);
        registry
    }

    /// Register a translator for its schema and native types. A later registration for
    /// the same schema replaces the earlier one.
    pub fn register(&mut self, translator: impl Translator + 'static) {
        let translator: Arc<dyn Translator> = Arc::new(translator);
        for native_type in translator.native_types() {
            self.writers
                .entry(*native_type)
                .or_default()
                .push(Arc::clone(&translator));
        }
        if !translator.native_categories().is_empty() {
            self.by_category.push(Arc::clone(&translator));
        }
        self.readers
            .insert(translator.schema().to_string(), translator);
    }

    /// Register the fallback used for `Arnold*` prim types and for nodes no other
    /// translator writes.
    pub fn register_generic(&mut self, translator: impl Translator + 'static) {
        self.generic = Some(Arc::new(translator));
    }

    /// Whether prims without a translator are reported as diagnostics.
    pub fn report_gaps(&self) -> bool {
        self.report_gaps
    }

    pub fn set_report_gaps(&mut self, report: bool) {
        self.report_gaps = report;
    }

    /// Translator reading prims of `type_name`.
    pub fn reader_for(&self, type_name: &str) -> Option<&dyn Translator> {
        if let Some(translator) = self.readers.get(type_name) {
            return Some(translator.as_ref());
        }
        match &self.generic {
            Some(generic) if type_name.starts_with("Arnold") => Some(generic.as_ref()),
            _ => None,
        }
    }

    /// Translator writing `node` and the prim type it writes.
    pub fn writer_for(&self, node: &Node) -> Option<(&dyn Translator, String)> {
        let exact = self
            .writers
            .get(node.node_type())
            .into_iter()
            .flatten();
        let by_category = self
            .by_category
            .iter()
            .filter(|t| t.native_categories().contains(node.category()));
        for translator in exact.chain(by_category).chain(self.generic.iter()) {
            if let Some(type_name) = translator.write_type(node) {
                return Some((translator.as_ref(), type_name));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::native::{NodeId, ParamValue, Universe};
    use sb_math::Vec3;

    fn node(universe: &Universe, node_type: &str) -> Node {
        let id = universe.create_node(node_type, "", None).unwrap();
        universe.node(id).unwrap()
    }

    #[test]
    fn test_full_registry_readers() {
        let registry = TranslatorRegistry::full();
        for schema in [
            "Xform", "Scope", "Mesh", "BasisCurves", "Points", "Sphere", "Cube", "Cylinder",
            "Cone", "Camera", "DistantLight", "SphereLight", "RectLight", "DiskLight",
            "CylinderLight", "DomeLight", "Shader", "Material", "PointInstancer",
        ] {
            assert!(registry.reader_for(schema).is_some(), "{}", schema);
        }
        assert!(registry.reader_for("ArnoldPolymesh").is_some());
        assert!(registry.reader_for("Teapot").is_none());
    }

    #[test]
    fn test_writer_dispatch() {
        let registry = TranslatorRegistry::full();
        let universe = Universe::new();

        let mesh = node(&universe, "polymesh");
        assert_eq!(registry.writer_for(&mesh).unwrap().1, "Mesh");

        let surface = node(&universe, "standard_surface");
        assert_eq!(registry.writer_for(&surface).unwrap().1, "Shader");

        let filter = node(&universe, "gaussian_filter");
        assert_eq!(registry.writer_for(&filter).unwrap().1, "ArnoldGaussianFilter");

        // An offset sphere has no exact schema counterpart.
        let id = universe.create_node("sphere", "s", None).unwrap();
        universe
            .with_node_mut(id, |n| n.set("center", ParamValue::Vector(Vec3::X)))
            .unwrap()
            .unwrap();
        let sphere = universe.node(id).unwrap();
        assert_eq!(registry.writer_for(&sphere).unwrap().1, "ArnoldSphere");
        assert_ne!(sphere.id(), NodeId(0));
    }
}
