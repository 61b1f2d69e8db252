//! Pipeline infrastructure for running virtualization over many compilation units.
//!
//! This module sits on top of the rewrite rules:
//!
//! - [`crate::ir`] - graph IR, frames and frame accesses
//! - [`crate::virt`] - virtual state and the per-node rewrite rules
//! - [`compiler`](self) - passes, scheduling, shared context and event tracking
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Compiler Pipeline                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CompilerContext              Shared state across units          │
//! │    ├─ graphs                  (one Graph per UnitId)             │
//! │    ├─ failed_units            (abandoned units and their error)  │
//! │    └─ EventLog                                                   │
//! │                                                                  │
//! │  PassScheduler               2-phase fixpoint execution          │
//! │    ├─ Phase 1: Virtualize     (partial escape analysis)          │
//! │    └─ Phase 2: Normalize      (canonicalize, GVN, DCE)           │
//! │    Each phase: run → normalize → repeat until stable             │
//! │                                                                  │
//! │  GraphPass trait             Interface for all passes            │
//! │    ├─ run_on_graph()          Per-unit transformation            │
//! │    ├─ initialize()            One-time setup before each round   │
//! │    └─ finalize()              Cleanup after each round           │
//! │                                                                  │
//! │  EventLog                    Change tracking and diagnostics     │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use framevirt::compiler::{CompilerContext, EventKind, PassScheduler};
//! use framevirt::ir::{AccessFlags, AccessType, FrameTag, GraphBuilder, Kind};
//! use framevirt::VirtualizationConfig;
//!
//! let mut b = GraphBuilder::new("example");
//! let frame = b.new_frame(2);
//! let seven = b.const_i32(7);
//! b.frame_set(frame, 0, FrameTag::Int, seven, AccessType::Local, AccessFlags::SET_TAG);
//! let read = b.frame_get(frame, 0, Kind::Int, AccessType::Local, AccessFlags::empty());
//! b.ret(Some(read));
//!
//! let config = VirtualizationConfig::default();
//! let ctx = CompilerContext::new(config);
//! let unit = ctx.add_graph(b.finish());
//!
//! PassScheduler::from_config(&config).run_pipeline(&ctx)?;
//! assert!(ctx.events.has(EventKind::SlotWriteSubsumed));
//! assert!(!ctx.is_failed(unit));
//! # Ok::<(), framevirt::Error>(())
//! ```

mod context;
mod events;
mod pass;
mod passes;
mod scheduler;

pub use context::{CompilerContext, UnitId};
pub use events::{DerivedStats, Event, EventBuilder, EventKind, EventLog};
pub use pass::GraphPass;
pub use passes::{
    CanonicalizerPass, DeadCodeEliminationPass, GlobalValueNumberingPass, PartialEscapePass,
};
pub use scheduler::PassScheduler;
