//! Top-E weight index cache and select-norm table.
//!
//! The temporal bound can be tightened when the signs of the input delta at
//! the E largest-magnitude weight positions are known: a component whose
//! delta-weight product is negative can only pull the dot product down, so
//! it can be dropped from the bound and its weight removed from the norm.
//! This module selects the top-E entries per filter and precomputes the
//! 2^E residual norms, one per sign-pattern bitmask.

use crate::error::{Result, SkipConvError};

/// Number of largest-magnitude weight entries tracked per output channel.
pub const TOP_E: usize = 6;
/// Number of sign-pattern select norms per output channel.
pub const SELECT_PATTERNS: usize = 1 << TOP_E;

/// Per-channel top-E indices, signed values, and select-norm table.
#[derive(Clone, Debug, PartialEq)]
pub struct TopECache {
    /// Flat filter indices of the top-E entries, K * TOP_E, entry 0 is the
    /// largest magnitude.
    indices: Vec<usize>,
    /// Signed weight values at those indices, K * TOP_E.
    values: Vec<f32>,
    /// Residual norms indexed by sign-pattern bitmask, K * SELECT_PATTERNS.
    select_norms: Vec<f32>,
}

impl TopECache {
    /// Build the cache from the flat (K, C_in * maxk) weight buffer.
    ///
    /// Selection orders by |w| descending with ties broken toward the lower
    /// index. Filters shorter than E leave the tail entries at index 0 with
    /// value 0, which contribute neither sign bits nor norm reduction.
    pub fn compute(weights: &[f32], num_output: usize, filter_len: usize) -> Result<Self> {
        if weights.len() != num_output * filter_len {
            return Err(SkipConvError::ShapeMismatch(format!(
                "weight buffer has {} entries, expected {}",
                weights.len(),
                num_output * filter_len
            )));
        }

        let mut indices = vec![0usize; num_output * TOP_E];
        let mut values = vec![0.0f32; num_output * TOP_E];
        let mut select_norms = vec![0.0f32; num_output * SELECT_PATTERNS];

        let mut order: Vec<usize> = Vec::with_capacity(filter_len);
        for k in 0..num_output {
            let filter = &weights[k * filter_len..(k + 1) * filter_len];

            order.clear();
            order.extend(0..filter_len);
            order.sort_by(|&a, &b| {
                filter[b]
                    .abs()
                    .total_cmp(&filter[a].abs())
                    .then(a.cmp(&b))
            });

            let taken = TOP_E.min(filter_len);
            for p in 0..taken {
                indices[k * TOP_E + p] = order[p];
                values[k * TOP_E + p] = filter[order[p]];
            }

            // Same accumulation order as the norm cache so the m=0 entry
            // equals ||W_k||2 bit for bit.
            let mut sq_sum = 0.0f32;
            for &wv in filter {
                sq_sum += wv * wv;
            }

            let vals = &values[k * TOP_E..(k + 1) * TOP_E];
            for m in 0..SELECT_PATTERNS {
                let mut removed = 0.0f32;
                for (p, &v) in vals.iter().enumerate() {
                    if (m >> (TOP_E - 1 - p)) & 1 == 1 {
                        removed += v * v;
                    }
                }
                select_norms[k * SELECT_PATTERNS + m] = (sq_sum - removed).max(0.0).sqrt();
            }
        }

        Ok(Self {
            indices,
            values,
            select_norms,
        })
    }

    /// Residual norm for channel k under sign pattern m.
    #[inline]
    pub fn select_norm(&self, k: usize, m: usize) -> f32 {
        self.select_norms[k * SELECT_PATTERNS + m]
    }

    /// Top-E flat indices for channel k.
    #[inline]
    pub fn indices(&self, k: usize) -> &[usize] {
        &self.indices[k * TOP_E..(k + 1) * TOP_E]
    }

    /// Signed top-E weight values for channel k.
    #[inline]
    pub fn values(&self, k: usize) -> &[f32] {
        &self.values[k * TOP_E..(k + 1) * TOP_E]
    }

    /// Classify an input-delta vector into a sign-pattern bitmask.
    ///
    /// Bit (E-1-p) is set iff delta[idx_p] * w_p is strictly negative: that
    /// component's contribution to the dot product is non-positive, so the
    /// bound may drop it and use the residual norm. A zero product
    /// contributes no bit.
    #[inline]
    pub fn sign_pattern(&self, k: usize, diff: &[f32]) -> usize {
        let idx = self.indices(k);
        let vals = self.values(k);
        let mut m = 0usize;
        for p in 0..TOP_E {
            m <<= 1;
            if diff[idx[p]] * vals[p] < 0.0 {
                m |= 1;
            }
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_orders_by_magnitude() {
        let w = [0.1f32, -0.9, 0.5, 0.3, -0.4, 0.2, 0.05, 0.6, -0.7];
        let cache = TopECache::compute(&w, 1, 9).unwrap();
        assert_eq!(cache.indices(0), &[1, 8, 7, 2, 4, 3]);
        assert_eq!(cache.values(0), &[-0.9, -0.7, 0.6, 0.5, -0.4, 0.3]);
    }

    #[test]
    fn test_tie_break_prefers_lower_index() {
        let w = [0.5f32, -0.5, 0.5, 0.5, -0.5, 0.5, 0.5];
        let cache = TopECache::compute(&w, 1, 7).unwrap();
        assert_eq!(cache.indices(0), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_select_norm_identities() {
        let w: Vec<f32> = (0..18).map(|i| ((i * 7 % 11) as f32 - 5.0) * 0.21).collect();
        let cache = TopECache::compute(&w, 2, 9).unwrap();
        for k in 0..2 {
            let filter = &w[k * 9..(k + 1) * 9];
            let full: f32 = filter.iter().map(|v| v * v).sum::<f32>().sqrt();
            // m = 0 removes nothing.
            assert!((cache.select_norm(k, 0) - full).abs() < 1e-6);
            // every pattern is bounded by the full norm.
            for m in 0..SELECT_PATTERNS {
                assert!(cache.select_norm(k, m) <= full + 1e-6);
            }
            // the all-ones pattern removes all top-E mass.
            let removed: f32 = cache.values(k).iter().map(|v| v * v).sum();
            let expect = (full * full - removed).max(0.0).sqrt();
            assert!((cache.select_norm(k, SELECT_PATTERNS - 1) - expect).abs() < 1e-4);
        }
    }

    #[test]
    fn test_sign_pattern_bit_order() {
        let w = [4.0f32, -3.0, 2.0, 1.5, -1.0, 0.5, 0.1];
        let cache = TopECache::compute(&w, 1, 7).unwrap();
        // indices: [0, 1, 2, 3, 4, 5]
        let mut diff = vec![0.0f32; 7];
        diff[0] = -1.0; // product < 0 -> entry 0 -> bit 5
        assert_eq!(cache.sign_pattern(0, &diff), 0b100000);
        diff[0] = 0.0;
        diff[5] = -1.0; // entry 5 -> bit 0
        assert_eq!(cache.sign_pattern(0, &diff), 0b000001);
        diff[1] = -1.0; // w is negative, product > 0 -> no bit
        assert_eq!(cache.sign_pattern(0, &diff), 0b000001);
        diff[1] = 1.0; // product < 0 -> entry 1 -> bit 4
        assert_eq!(cache.sign_pattern(0, &diff), 0b010001);
    }

    #[test]
    fn test_short_filter_pads_with_zeros() {
        let w = [2.0f32, -1.0];
        let cache = TopECache::compute(&w, 1, 2).unwrap();
        assert_eq!(cache.values(0), &[2.0, -1.0, 0.0, 0.0, 0.0, 0.0]);
        // all-ones pattern removes the whole filter.
        assert!(cache.select_norm(0, SELECT_PATTERNS - 1) < 1e-6);
        // zero-padded entries never set bits.
        let diff = [-1.0f32, 1.0];
        assert_eq!(cache.sign_pattern(0, &diff), 0b110000);
    }
}
