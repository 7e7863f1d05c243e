//! Channel-major 3D float tensor.
//!
//! [`Tensor3`] wraps an `ndarray::Array3<f32>` with logical shape
//! (channels, height, width) in standard row-major layout, so each channel
//! is one contiguous height*width slice. The kernels address pixels by flat
//! within-channel offsets (row base + precomputed tap offsets), which is
//! why the flat [`Tensor3::channel_slice`] view is the primary access path.

use ndarray::{Array3, ArrayView2, ArrayViewMut2, Axis};

use crate::error::{Result, SkipConvError};

/// Dense f32 tensor of shape (channels, height, width).
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor3 {
    data: Array3<f32>,
}

impl Tensor3 {
    /// Zero-filled tensor. Rejects shapes whose element count overflows.
    pub fn new(c: usize, h: usize, w: usize) -> Result<Self> {
        let total = c
            .checked_mul(h)
            .and_then(|n| n.checked_mul(w))
            .ok_or_else(|| {
                SkipConvError::Allocation(format!("tensor shape ({c}, {h}, {w}) overflows"))
            })?;
        let _ = total;
        Ok(Self {
            data: Array3::zeros((c, h, w)),
        })
    }

    /// Build from a flat row-major buffer of length c*h*w.
    pub fn from_shape_vec(c: usize, h: usize, w: usize, values: Vec<f32>) -> Result<Self> {
        let data = Array3::from_shape_vec((c, h, w), values).map_err(|e| {
            SkipConvError::ShapeMismatch(format!("tensor shape ({c}, {h}, {w}): {e}"))
        })?;
        Ok(Self { data })
    }

    /// Build from a generator over (channel, y, x).
    pub fn from_shape_fn<F: FnMut((usize, usize, usize)) -> f32>(
        c: usize,
        h: usize,
        w: usize,
        f: F,
    ) -> Self {
        Self {
            data: Array3::from_shape_fn((c, h, w), f),
        }
    }

    pub fn channels(&self) -> usize {
        self.data.dim().0
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Total element count.
    pub fn total(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 2D view of one channel.
    pub fn channel(&self, q: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), q)
    }

    /// Mutable 2D view of one channel.
    pub fn channel_mut(&mut self, q: usize) -> ArrayViewMut2<'_, f32> {
        self.data.index_axis_mut(Axis(0), q)
    }

    /// Flat height*width slice of one channel.
    ///
    /// Owned arrays are always in standard layout, so the slice view
    /// cannot fail.
    pub fn channel_slice(&self, q: usize) -> &[f32] {
        let (_, h, w) = self.data.dim();
        let plane = h * w;
        let flat = self.data.as_slice().expect("owned tensor is contiguous");
        &flat[q * plane..(q + 1) * plane]
    }

    /// Flat mutable slice of one channel.
    pub fn channel_slice_mut(&mut self, q: usize) -> &mut [f32] {
        let (_, h, w) = self.data.dim();
        let plane = h * w;
        let flat = self
            .data
            .as_slice_mut()
            .expect("owned tensor is contiguous");
        &mut flat[q * plane..(q + 1) * plane]
    }

    /// Flat view over the whole tensor.
    pub fn as_slice(&self) -> &[f32] {
        self.data.as_slice().expect("owned tensor is contiguous")
    }

    /// Flat mutable view over the whole tensor.
    pub fn as_slice_mut(&mut self) -> &mut [f32] {
        self.data
            .as_slice_mut()
            .expect("owned tensor is contiguous")
    }

    #[inline]
    pub fn get(&self, q: usize, y: usize, x: usize) -> f32 {
        self.data[[q, y, x]]
    }

    #[inline]
    pub fn set(&mut self, q: usize, y: usize, x: usize, v: f32) {
        self.data[[q, y, x]] = v;
    }

    pub fn fill(&mut self, v: f32) {
        self.data.fill(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_slice_layout() {
        let t = Tensor3::from_shape_fn(2, 2, 3, |(q, y, x)| (q * 100 + y * 10 + x) as f32);
        assert_eq!(t.channel_slice(0), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(
            t.channel_slice(1),
            &[100.0, 101.0, 102.0, 110.0, 111.0, 112.0]
        );
    }

    #[test]
    fn test_from_shape_vec_validates_length() {
        assert!(Tensor3::from_shape_vec(1, 2, 2, vec![1.0; 3]).is_err());
        let t = Tensor3::from_shape_vec(1, 2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(t.get(0, 1, 1), 4.0);
    }

    #[test]
    fn test_channel_view_matches_slice() {
        let t = Tensor3::from_shape_fn(3, 4, 5, |(q, y, x)| (q + y + x) as f32);
        for q in 0..3 {
            let view = t.channel(q);
            let flat = t.channel_slice(q);
            for y in 0..4 {
                for x in 0..5 {
                    assert_eq!(view[[y, x]], flat[y * 5 + x]);
                }
            }
        }
    }

    #[test]
    fn test_empty_tensor() {
        let t = Tensor3::new(4, 0, 0).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.total(), 0);
    }
}
