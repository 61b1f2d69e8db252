// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # framevirt
//!
//! Escape-analysis virtualization of interpreter frames over a graph IR.
//!
//! Interpreters written on top of a partial-evaluation compiler keep their locals in a heap
//! frame: a tag array recording what each slot currently holds, an object array, a primitive
//! array, and optionally an auxiliary object array. After inlining, every local access is a
//! frame slot read or write. `framevirt` provides the rewrite rules that let escape analysis
//! replace those arrays by compiler-tracked entries, so that locals end up in registers.
//!
//! ## Features
//!
//! - **Frame slot virtualization** - Slot writes, reads and clears fold into virtual entries
//! - **Tag discipline** - Tagged and static accesses, with the static tag variant tracked
//! - **OSR normalization** - 64-bit widening of static primitive writes on OSR transfer targets
//! - **Deoptimization fallback** - Anything that cannot be proven falls back to a deopt
//! - **Value anchors** - Simplification that never merges distinct anchors
//! - **Parallel pipeline** - Many units processed concurrently with per-unit failure isolation
//!
//! ## Quick Start
//!
//! ```rust
//! use framevirt::prelude::*;
//!
//! let mut b = GraphBuilder::new("quickstart");
//! let frame = b.new_frame(4);
//! let value = b.const_i64(42);
//! b.frame_set(frame, 1, FrameTag::Long, value, AccessType::Local, AccessFlags::SET_TAG);
//! let read = b.frame_get(frame, 1, Kind::Long, AccessType::Local, AccessFlags::NON_STATIC);
//! let ret = b.ret(Some(read));
//!
//! let config = VirtualizationConfig::default();
//! let ctx = CompilerContext::new(config);
//! let unit = ctx.add_graph(b.finish());
//! PassScheduler::from_config(&config).run_pipeline(&ctx)?;
//!
//! // The read was replaced by the value that was written
//! let returned = ctx.with_graph(unit, |graph| graph.node(ret).cloned());
//! assert_eq!(returned, Some(Some(NodeKind::Return { value: Some(value) })));
//! # Ok::<(), framevirt::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - The graph IR: nodes, frames, frame accesses and the builder
//! - [`virt`] - Virtual state, the virtualizer tool and the rewrite rules
//! - [`compiler`] - Passes, the scheduler, the shared context and the event log
//!
//! ## Error Handling
//!
//! Failing to virtualize an access is not an error; the rule inserts a deoptimization and
//! reports [`virt::Rewrite::Bailout`]. An [`Error`] means the input graph itself is malformed.
//! The scheduler abandons the affected unit and keeps processing the others.
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```

#[macro_use]
pub(crate) mod error;
mod config;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use framevirt::prelude::*;
///
/// let ctx = CompilerContext::new(VirtualizationConfig::conservative());
/// let unit = ctx.add_graph(Graph::new("empty"));
/// assert!(!ctx.is_failed(unit));
/// ```
pub mod prelude;

/// Graph IR consumed by the virtualization engine.
///
/// # Key Types
///
/// - [`ir::Graph`] - Node arena with use lists and a control order
/// - [`ir::GraphBuilder`] - Fluent graph construction
/// - [`ir::NodeKind`] - The node tagged union
/// - [`ir::FrameLayout`] / [`ir::FrameAccess`] - Frames and slot references
pub mod ir;

/// Virtual objects and the frame rewrite rules.
///
/// See [`virt::VirtualizerTool`] for the services the rules consume, and
/// [`ir::FrameSet::virtualize`] for the slot write rule.
pub mod virt;

/// Passes, scheduling, and change tracking.
pub mod compiler;

/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `framevirt` Error type
///
/// # Examples
///
/// ```rust
/// use framevirt::{ir::Graph, ir::NodeId, Error};
///
/// let mut graph = Graph::new("t");
/// match graph.remove(NodeId::new(3)) {
///     Err(Error::GraphError(message)) => println!("{message}"),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub use error::Error;

/// Knobs of the virtualization pipeline.
pub use config::VirtualizationConfig;
