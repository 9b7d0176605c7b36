//! Native renderer node model.
//!
//! A closed, strongly typed node system: every node has a type from the built-in schema
//! table ([`node_entry`]), every parameter a fixed [`ParamType`] and default. Nodes live in a
//! [`Universe`] that can be filled from many threads at once.

mod mask;
mod node;
mod param;
mod schema;
mod universe;

pub use mask::NodeMask;
pub use node::{Link, NativeError, NativeResult, Node, NodeId, UserParam, UserParamScope};
pub use param::{ArrayData, ElemType, ParamArray, ParamType, ParamValue};
pub use schema::{node_entries, node_entry, NodeEntry, ParamDef};
pub use universe::Universe;
