//! Node categories and type masks.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};

/// Bitset over native node categories. Each node type belongs to exactly one category;
/// masks select a union of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeMask(u32);

impl NodeMask {
    pub const NONE: NodeMask = NodeMask(0);
    pub const OPTIONS: NodeMask = NodeMask(1 << 0);
    pub const CAMERA: NodeMask = NodeMask(1 << 1);
    pub const LIGHT: NodeMask = NodeMask(1 << 2);
    pub const SHAPE: NodeMask = NodeMask(1 << 3);
    pub const SHADER: NodeMask = NodeMask(1 << 4);
    pub const OVERRIDE: NodeMask = NodeMask(1 << 5);
    pub const DRIVER: NodeMask = NodeMask(1 << 6);
    pub const FILTER: NodeMask = NodeMask(1 << 7);
    pub const COLOR_MANAGER: NodeMask = NodeMask(1 << 8);
    pub const OPERATOR: NodeMask = NodeMask(1 << 9);
    pub const ALL: NodeMask = NodeMask((1 << 10) - 1);

    const NAMES: &'static [(&'static str, NodeMask)] = &[
        ("options", NodeMask::OPTIONS),
        ("camera", NodeMask::CAMERA),
        ("light", NodeMask::LIGHT),
        ("shape", NodeMask::SHAPE),
        ("shader", NodeMask::SHADER),
        ("override", NodeMask::OVERRIDE),
        ("driver", NodeMask::DRIVER),
        ("filter", NodeMask::FILTER),
        ("color_manager", NodeMask::COLOR_MANAGER),
        ("operator", NodeMask::OPERATOR),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        NodeMask(bits & Self::ALL.0)
    }

    /// True if every category in `other` is in `self`.
    pub const fn contains(self, other: NodeMask) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: NodeMask) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parse an integer (`12`, `0x0c`) or category names joined by `|`, `,` or `+`
    /// (`"shape|light"`, `"all"`).
    pub fn parse(text: &str) -> Option<NodeMask> {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix("0x") {
            return u32::from_str_radix(hex, 16).ok().map(NodeMask::from_bits);
        }
        if let Ok(bits) = text.parse::<u32>() {
            return Some(NodeMask::from_bits(bits));
        }
        let mut mask = NodeMask::NONE;
        for word in text.split(['|', ',', '+']).map(str::trim).filter(|w| !w.is_empty()) {
            let word = word.to_ascii_lowercase();
            if word == "all" {
                mask |= NodeMask::ALL;
                continue;
            }
            let (_, category) = Self::NAMES
                .iter()
                .find(|(name, _)| *name == word || name.trim_end_matches('s') == word.trim_end_matches('s'))?;
            mask |= *category;
        }
        Some(mask)
    }

    /// Category names set in this mask.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(_, m)| self.contains(*m))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl Default for NodeMask {
    fn default() -> Self {
        NodeMask::ALL
    }
}

impl BitOr for NodeMask {
    type Output = NodeMask;
    fn bitor(self, rhs: NodeMask) -> NodeMask {
        NodeMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for NodeMask {
    fn bitor_assign(&mut self, rhs: NodeMask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for NodeMask {
    type Output = NodeMask;
    fn bitand(self, rhs: NodeMask) -> NodeMask {
        NodeMask(self.0 & rhs.0)
    }
}

impl Not for NodeMask {
    type Output = NodeMask;
    fn not(self) -> NodeMask {
        NodeMask(!self.0 & NodeMask::ALL.0)
    }
}

impl fmt::Display for NodeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == NodeMask::ALL {
            return f.write_str("all");
        }
        if self.is_empty() {
            return f.write_str("none");
        }
        f.write_str(&self.names().join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let mask = NodeMask::SHAPE | NodeMask::LIGHT;
        assert!(mask.contains(NodeMask::SHAPE));
        assert!(!mask.contains(NodeMask::SHADER));
        assert!(!mask.contains(NodeMask::NONE));
        assert!(NodeMask::ALL.contains(NodeMask::OPERATOR));
        assert_eq!(!NodeMask::SHAPE & NodeMask::SHAPE, NodeMask::NONE);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            NodeMask::parse("shape|light"),
            Some(NodeMask::SHAPE | NodeMask::LIGHT)
        );
        assert_eq!(NodeMask::parse("shapes, shaders"), Some(NodeMask::SHAPE | NodeMask::SHADER));
        assert_eq!(NodeMask::parse("8"), Some(NodeMask::SHAPE));
        assert_eq!(NodeMask::parse("0x4"), Some(NodeMask::LIGHT));
        assert_eq!(NodeMask::parse("all"), Some(NodeMask::ALL));
        assert!(NodeMask::parse("bogus").is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!((NodeMask::CAMERA | NodeMask::SHAPE).to_string(), "camera|shape");
        assert_eq!(NodeMask::ALL.to_string(), "all");
        assert_eq!(NodeMask::default(), NodeMask::ALL);
    }
}
