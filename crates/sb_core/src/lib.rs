//! scenebridge core - the two scene models the translators move data between.
//!
//! This crate provides:
//!
//! - **Stage model** ([`usd`]): USDA parsing and serialization, layers, session-layer
//!   composition, time-sampled value resolution and a process-wide stage cache
//! - **Native model** ([`native`]): the renderer's node-type schema table, typed
//!   parameters, nodes and the thread-safe universe that owns them
//!
//! # Example
//!
//! ```ignore
//! use sb_core::usd::Stage;
//!
//! let stage = Stage::open("scene.usda")?;
//! for prim in stage.traverse() {
//!     println!("{} ({})", prim.path(), prim.type_name());
//! }
//! ```

pub mod native;
pub mod usd;

// Re-export commonly used types
pub use native::{Node, NodeId, NodeMask, ParamType, ParamValue, Universe};
pub use usd::{Layer, Prim, ScenePath, Stage, StageCache, Value};
