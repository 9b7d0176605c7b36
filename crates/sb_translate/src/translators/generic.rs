//! `Arnold<CamelType>` prims ↔ any native node type, parameter for parameter.

use sb_core::native::{node_entry, Node, NodeMask};
use sb_core::usd::Prim;

use crate::context::{ReadContext, WriteContext};
use crate::translator::{TranslateResult, Translator};
use crate::translators::SHAPE_COMMON;

const PREFIX: &str = "Arnold";

/// `gaussian_filter` → `GaussianFilter`.
pub fn camel_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// `GaussianFilter` → `gaussian_filter`.
pub fn snake_case(camel: &str) -> String {
    let mut out = String::with_capacity(camel.len() + 4);
    for (i, c) in camel.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Fallback translator: every parameter as `arnold:<param>`.
pub struct GenericTranslator;

impl Translator for GenericTranslator {
    fn schema(&self) -> &str {
        ""
    }

    fn node_type(&self, prim: &Prim) -> Option<&'static str> {
        let camel = prim.type_name().strip_prefix(PREFIX)?;
        node_entry(&snake_case(camel)).map(|e| e.name)
    }

    fn read(&self, prim: &Prim, ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        let Some(node_type) = self.node_type(prim) else {
            ctx.warn(
                prim.path(),
                format!("no native node type for '{}'", prim.type_name()),
            );
            return Ok(());
        };

        let id = if node_type == "options" {
            let options = ctx.universe().options();
            ctx.adopt_node(prim.path(), options)
        } else {
            match ctx.create_node(prim.path(), "", node_type)? {
                Some(id) => id,
                None => return Ok(()),
            }
        };

        let Ok(entry) = ctx.universe().with_node(id, |n| n.entry()) else {
            return Ok(());
        };
        if entry.category == NodeMask::SHAPE {
            ctx.read_shape_common(prim, id);
        } else if entry.param("matrix").is_some() {
            ctx.set_matrix(prim, id);
        }
        ctx.read_custom(prim, id, &[]);
        Ok(())
    }

    fn write_type(&self, node: &Node) -> Option<String> {
        Some(format!("{}{}", PREFIX, camel_case(node.node_type())))
    }

    fn write(&self, node: &Node, ctx: &mut WriteContext<'_>) -> TranslateResult<()> {
        if node.category() == NodeMask::SHAPE {
            ctx.write_shape_common(node);
            ctx.write_arnold_params(node, SHAPE_COMMON);
        } else {
            ctx.write_matrix(node);
            ctx.write_arnold_params(node, &[]);
            ctx.write_user_params(node);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::native::node_entries;

    #[test]
    fn test_case_conversion() {
        assert_eq!(camel_case("gaussian_filter"), "GaussianFilter");
        assert_eq!(camel_case("options"), "Options");
        assert_eq!(snake_case("SkydomeLight"), "skydome_light");
        assert_eq!(snake_case("Polymesh"), "polymesh");
    }

    #[test]
    fn test_every_type_round_trips_its_name() {
        for entry in node_entries() {
            assert_eq!(snake_case(&camel_case(entry.name)), entry.name);
        }
    }
}
