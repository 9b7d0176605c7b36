use sb_core::usd::Prim;

use crate::context::ReadContext;
use crate::translator::{TranslateResult, Translator};

/// Grouping prims (`Xform`, `Scope`). They create no node; their transforms reach the
/// shapes below them through world-matrix composition.
pub struct StructureTranslator {
    schema: &'static str,
}

impl StructureTranslator {
    pub fn new(schema: &'static str) -> Self {
        Self { schema }
    }
}

impl Translator for StructureTranslator {
    fn schema(&self) -> &str {
        self.schema
    }

    fn node_type(&self, _prim: &Prim) -> Option<&'static str> {
        None
    }

    fn read(&self, _prim: &Prim, _ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        Ok(())
    }
}
