//! Scene-description stage model.
//!
//! This module provides an in-process model of a USD stage, enough to translate scenes to
//! and from the native renderer universe:
//!
//! - USDA (ASCII) parsing and serialization
//! - Layers of prim specs (`def` / `over` / `class`), typed attributes with time samples,
//!   connections and relationships
//! - Strongest-wins composition of session layers over a root layer
//! - A process-wide [`StageCache`]
//!
//! ## Not Supported
//!
//! - Binary `.usdc` crate files (recognised and rejected)
//! - References, payloads, inherits, specializes and variants
//!
//! # Example
//!
//! ```ignore
//! use sb_core::usd::{ScenePath, Stage};
//!
//! let stage = Stage::open("path/to/scene.usda")?;
//! let mesh = stage.prim(&ScenePath::new("/World/Mesh")?).unwrap();
//! println!("{} points", mesh.value_at("points", 1.0).and_then(|v| v.len()).unwrap_or(0));
//! ```

mod attribute;
mod cache;
pub mod file;
mod layer;
mod parser;
mod path;
mod serialize;
mod stage;
mod value;

pub use attribute::{Attribute, Relationship};
pub use cache::StageCache;
pub use file::{is_supported_file, normalize_extension, resolve_search_path};
pub use layer::{Layer, LayerMetadata, PrimSpec, Specifier};
pub use parser::{parse_usda, ParseError, ParseResult};
pub use path::{is_valid_identifier, make_valid_identifier, PathError, PathResult, ScenePath, Target};
pub use serialize::write_usda;
pub use stage::{Prim, Stage, StageError, StageResult};
pub use value::{types, TypeName, Value, ValueType};
