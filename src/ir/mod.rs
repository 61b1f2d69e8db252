//! Graph IR consumed by the virtualization engine.
//!
//! This module provides the minimal IR infrastructure the rewrite rules operate on:
//!
//! - [`Kind`] and [`ConstValue`] - value kinds and typed constants
//! - [`NodeKind`] and [`NodeId`] - the node tagged union and its identifiers
//! - [`FrameLayout`], [`FrameAccess`], [`AccessFlags`] - frames and frame slot references
//! - [`Graph`] - the per-unit node arena with use lists and a control sequence
//! - [`GraphBuilder`] - fluent construction of graphs
//!
//! # Architecture
//!
//! ```text
//! Graph
//! ├── nodes: Vec<Option<NodeKind>>   arena, tombstones for removed nodes
//! ├── usages: Vec<Vec<NodeId>>       derived use lists
//! └── control: Vec<NodeId>           fixed nodes in program order
//! ```

mod builder;
mod frame;
mod graph;
mod kind;
mod node;
mod value;

pub use builder::{FrameShape, GraphBuilder};
pub use frame::{AccessFlags, AccessType, FrameAccess, FrameLayout, FrameTag, STATIC_TAG_MODIFIER};
pub use graph::Graph;
pub use kind::Kind;
pub use node::{DeoptReason, FrameClear, FrameGet, FrameSet, NodeId, NodeKind};
pub use value::ConstValue;
