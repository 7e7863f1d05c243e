//! Cross-call operator state.
//!
//! All caches the bound kernels rely on live here, owned by one operator
//! instance: the weight-derived tables (norms, top-E), the previous call's
//! padded input and pre-activation output, and the per-call spatial
//! propagation buffers. Everything is lazily populated on the first forward
//! call that needs it and torn down by [`CoreState::reset`] when the
//! weights change.

use crate::norms::WeightNorms;
use crate::tensor::Tensor3;
use crate::tope::TopECache;

/// Mutable state carried across forward calls.
#[derive(Clone, Debug, Default)]
pub struct CoreState {
    /// Per-filter l2 norms, built once from the loaded weights.
    pub(crate) norms: Option<WeightNorms>,
    /// Top-E index/value/select-norm tables, built when the mode needs them.
    pub(crate) top_e: Option<TopECache>,
    /// Deep copy of the previous call's padded input.
    pub(crate) last_x: Option<Tensor3>,
    /// Previous pre-activation output, stored excluding bias.
    pub(crate) last_y_bar: Option<Tensor3>,
    /// Most recent pre-activation per (j, k) within a call, outw * K.
    pub(crate) last_y_row: Vec<f32>,
    /// Most recent pre-activation per k at the previous column, K.
    pub(crate) last_y_col: Vec<f32>,
    /// Whether the temporal caches hold a usable previous frame.
    pub(crate) initialized: bool,
}

impl CoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything; the next forward call rebuilds from scratch.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Drop only the frame-dependent caches, keeping the weight tables.
    ///
    /// Used when the input shape changes between calls: the norms are still
    /// valid but the cached frame no longer matches.
    pub(crate) fn reset_frames(&mut self) {
        self.last_x = None;
        self.last_y_bar = None;
        self.last_y_row.clear();
        self.last_y_col.clear();
        self.initialized = false;
    }

    /// Size the spatial propagation buffers for one call.
    pub(crate) fn ensure_row_col(&mut self, outw: usize, num_output: usize) {
        self.last_y_row.resize(outw * num_output, 0.0);
        self.last_y_col.resize(num_output, 0.0);
    }
}
