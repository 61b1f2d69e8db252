//! Built-in graph passes.
//!
//! | Pass | Phase | Purpose |
//! |------|-------|---------|
//! | [`PartialEscapePass`] | virtualize | Frame virtualization |
//! | [`CanonicalizerPass`] | normalize | Constant folding of conversions, anchor removal |
//! | [`GlobalValueNumberingPass`] | normalize | Merging of equal floating nodes |
//! | [`DeadCodeEliminationPass`] | normalize | Removal of unused values and allocations |

mod canonicalize;
mod deadcode;
mod gvn;
mod virtualize;

pub use canonicalize::CanonicalizerPass;
pub use deadcode::DeadCodeEliminationPass;
pub use gvn::GlobalValueNumberingPass;
pub use virtualize::PartialEscapePass;
