use sb_core::usd::{Prim, ScenePath, Stage};

use crate::context::ReadContext;
use crate::translator::{TranslateResult, Translator};

/// `Material` prims create no node. Shapes bound to one are resolved to the shaders
/// connected to its outputs once every node exists.
pub struct MaterialTranslator;

impl Translator for MaterialTranslator {
    fn schema(&self) -> &str {
        "Material"
    }

    fn node_type(&self, _prim: &Prim) -> Option<&'static str> {
        None
    }

    fn read(&self, _prim: &Prim, _ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        Ok(())
    }
}

/// Shader prims a material binding resolves to: `(surface, displacement)`.
///
/// A binding to a material follows `outputs:arnold:surface` (preferred over
/// `outputs:surface`) and `outputs:arnold:displacement` / `outputs:displacement`. A binding
/// to any other prim names the surface shader directly.
pub fn material_outputs(stage: &Stage, target: &ScenePath) -> (Option<ScenePath>, Option<ScenePath>) {
    let Some(prim) = stage.prim(target) else {
        return (None, None);
    };
    if prim.type_name() != "Material" {
        return (Some(target.clone()), None);
    }
    let source = |names: &[&str]| {
        names.iter().find_map(|name| {
            prim.attribute(name)
                .and_then(|attr| attr.connections.first())
                .map(|t| t.prim.clone())
        })
    };
    (
        source(&["outputs:arnold:surface", "outputs:surface"]),
        source(&["outputs:arnold:displacement", "outputs:displacement"]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_outputs() {
        let stage = Stage::open_text(
            r#"#usda 1.0
def Material "Mat"
{
    token outputs:surface.connect = </Mat/Preview.outputs:surface>
    token outputs:arnold:surface.connect = </Mat/Surface.outputs:out>
    token outputs:displacement.connect = </Mat/Disp.outputs:out>

    def Shader "Preview"
    {
    }
    def Shader "Surface"
    {
    }
    def Shader "Disp"
    {
    }
}
"#,
        )
        .unwrap();
        let (surface, disp) = material_outputs(&stage, &ScenePath::new("/Mat").unwrap());
        assert_eq!(surface.unwrap().as_str(), "/Mat/Surface");
        assert_eq!(disp.unwrap().as_str(), "/Mat/Disp");

        let (direct, none) = material_outputs(&stage, &ScenePath::new("/Mat/Preview").unwrap());
        assert_eq!(direct.unwrap().as_str(), "/Mat/Preview");
        assert!(none.is_none());
    }
}
