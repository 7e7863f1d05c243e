//! Per-filter weight norm cache.
//!
//! For every output channel k the bound tests need the l2 norm of the
//! filter, and the refined row bound additionally needs the norm with the
//! filter's first element left out. Both are computed once, on the first
//! bound-mode call, from the flat (K, C_in, maxk) weight buffer.

/// Precomputed l2 norms per output channel.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightNorms {
    /// ||W_k||2 over all C_in * maxk entries.
    pub norm: Vec<f32>,
    /// sqrt(||W_k||2^2 - W_k[0]^2), the leave-first-out norm.
    pub norm_lower: Vec<f32>,
}

impl WeightNorms {
    /// Accumulates in f32, in buffer order, matching the exact kernel's
    /// arithmetic. A tiny negative from roundoff is clamped to zero before
    /// the square root.
    pub fn compute(weights: &[f32], num_output: usize, filter_len: usize) -> Self {
        let mut norm = Vec::with_capacity(num_output);
        let mut norm_lower = Vec::with_capacity(num_output);

        for k in 0..num_output {
            let filter = &weights[k * filter_len..(k + 1) * filter_len];
            let mut sq_sum = 0.0f32;
            for &wv in filter {
                sq_sum += wv * wv;
            }
            let first = filter[0];
            norm.push(sq_sum.sqrt());
            norm_lower.push((sq_sum - first * first).max(0.0).sqrt());
        }

        Self { norm, norm_lower }
    }
}
