//! scenebridge translate - moves scenes between the stage model and the native model.
//!
//! This crate provides:
//!
//! - **Reader** ([`reader`]): traverses a composed stage, optionally in parallel, and
//!   creates native nodes through per-schema translators
//! - **Writer** ([`writer`]): authors native nodes back onto a stage as typed prims
//! - **Viewport** ([`viewport`]): reduced box, point and polygon representations
//! - **Procedural** ([`procedural`]): the procedural node lifecycle plus scene
//!   load and write entry points
//!
//! # Example
//!
//! ```ignore
//! use sb_translate::Reader;
//!
//! let mut reader = Reader::new();
//! reader.set_threads(4);
//! reader.read_file("scene.usda", &[], None)?;
//! for diagnostic in reader.diagnostics() {
//!     log::warn!("{}", diagnostic);
//! }
//! ```

pub mod context;
pub mod convert;
pub mod diagnostics;
pub mod procedural;
pub mod reader;
pub mod registry;
pub mod translator;
pub mod translators;
pub mod viewport;
pub mod writer;
pub mod xform;

// Re-export commonly used types
pub use context::{Connection, ConnectionKind, ReadContext, ReadSession, WriteContext};
pub use diagnostics::{Diagnostic, Severity};
pub use procedural::{load_scene, write_scene, ParamMap, ProceduralParams, UsdProcedural};
pub use reader::{override_layers, ReadError, ReadResult, Reader, ReaderConfig};
pub use registry::NodeRegistry;
pub use translator::{TranslateError, TranslateResult, Translator, TranslatorRegistry};
pub use viewport::{read_viewport, SceneSource, ViewportMode};
pub use writer::{WriteError, WriteResult, Writer, WriterConfig};
