//! # framevirt Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the framevirt library. Import this module to get quick access to the essential
//! types for building graphs and running the virtualization pipeline.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all framevirt operations
pub use crate::Error;

/// The result type used throughout framevirt
pub use crate::Result;

/// Configuration for the virtualization pipeline
pub use crate::VirtualizationConfig;

// ================================================================================================
// Graph IR
// ================================================================================================

/// Graph construction and inspection
pub use crate::ir::{FrameShape, Graph, GraphBuilder, NodeId, NodeKind};

/// Value kinds and constants
pub use crate::ir::{ConstValue, Kind};

/// Frames and frame slot accesses
pub use crate::ir::{
    AccessFlags, AccessType, DeoptReason, FrameAccess, FrameClear, FrameGet, FrameLayout,
    FrameSet, FrameTag,
};

// ================================================================================================
// Virtualization
// ================================================================================================

/// Rewrite rule outcome and the services the rules consume
pub use crate::virt::{GraphVirtualizer, Rewrite, VirtualizerTool};

/// Virtual object model
pub use crate::virt::{Alias, VirtualId, VirtualState};

/// Value anchor simplification
pub use crate::virt::{AnchorSimplification, AnchorState};

// ================================================================================================
// Pipeline
// ================================================================================================

/// Shared state and scheduling
pub use crate::compiler::{CompilerContext, PassScheduler, UnitId};

/// Pass interface and built-in passes
pub use crate::compiler::{
    CanonicalizerPass, DeadCodeEliminationPass, GlobalValueNumberingPass, GraphPass,
    PartialEscapePass,
};

/// Change tracking
pub use crate::compiler::{DerivedStats, EventKind, EventLog};
