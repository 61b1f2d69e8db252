//! Virtualization configuration
//!
//! This module provides the knobs of the virtualization pipeline: which allocations are eligible
//! for virtualization, how long the scheduler iterates, and whether anchors may be removed.

/// Configuration for the virtualization pipeline
///
/// The presets cover the common setups:
/// - [`VirtualizationConfig::default`] - full pipeline
/// - [`VirtualizationConfig::conservative`] - never virtualizes, only cleans up
/// - [`VirtualizationConfig::partial`] - for partial analyses where more dependents may still be
///   attached to anchors later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualizationConfig {
    /// Largest allocation (in entries) that is considered a virtualization candidate.
    /// `0` disables virtualization entirely.
    pub max_entry_count: usize,

    /// Maximum iterations of the whole pipeline (default: 5)
    pub max_iterations: usize,

    /// Stop early after this many iterations without changes (default: 2)
    pub stable_iterations: usize,

    /// Maximum iterations of a single phase before moving on (default: 15)
    pub max_phase_iterations: usize,

    /// All consumers of the graph report full visibility of usages.
    /// Anchors are only removed by the canonicalizer when this is set.
    pub all_usages_available: bool,

    /// Run global value numbering as part of normalization
    pub enable_value_numbering: bool,
}

impl Default for VirtualizationConfig {
    fn default() -> Self {
        Self {
            max_entry_count: 128,
            max_iterations: 5,
            stable_iterations: 2,
            max_phase_iterations: 15,
            all_usages_available: true,
            enable_value_numbering: true,
        }
    }
}

impl VirtualizationConfig {
    /// Creates a configuration that never virtualizes an allocation
    ///
    /// Normalization (canonicalization, value numbering, dead code elimination) still runs.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            max_entry_count: 0,
            ..Self::default()
        }
    }

    /// Creates a configuration for graphs whose usages are not fully known yet
    ///
    /// The canonicalizer leaves anchors in place.
    #[must_use]
    pub fn partial() -> Self {
        Self {
            all_usages_available: false,
            ..Self::default()
        }
    }
}
