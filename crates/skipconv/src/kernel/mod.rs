//! Convolution kernels.
//!
//! This module provides the shared traversal plumbing plus the two kernel
//! families:
//! - [`exact`]: the reference dense dot-product kernel
//! - [`bounds`] + [`sparse`]: the bound-evaluating kernel that proves
//!   outputs zero from cached state and skips their dot products
//!
//! Every kernel addresses input pixels through a per-call table of flat
//! within-channel offsets ([`Geometry::space_ofs`]), one per kernel tap,
//! which folds stride gaps and dilation into plain slice indexing.

pub mod bounds;
pub mod exact;
pub mod sparse;

use crate::config::ConvConfig;
use crate::tensor::Tensor3;

/// Resolved per-call traversal geometry.
pub(crate) struct Geometry {
    pub inch: usize,
    pub in_w: usize,
    pub outw: usize,
    pub outh: usize,
    pub outch: usize,
    pub maxk: usize,
    pub stride_w: usize,
    pub stride_h: usize,
    /// Flat within-channel offset of each kernel tap.
    pub space_ofs: Vec<usize>,
}

impl Geometry {
    pub(crate) fn new(cfg: &ConvConfig, padded: &Tensor3, outw: usize, outh: usize) -> Self {
        Self {
            inch: padded.channels(),
            in_w: padded.width(),
            outw,
            outh,
            outch: cfg.num_output,
            maxk: cfg.maxk(),
            stride_w: cfg.stride_w,
            stride_h: cfg.stride_h,
            space_ofs: space_offsets(
                padded.width(),
                cfg.kernel_w,
                cfg.kernel_h,
                cfg.dilation_w,
                cfg.dilation_h,
            ),
        }
    }

    /// Flat base offset of the patch anchored at output position (i, j).
    #[inline]
    pub(crate) fn patch_base(&self, i: usize, j: usize) -> usize {
        i * self.stride_h * self.in_w + j * self.stride_w
    }
}

/// Flat within-channel offsets for each kernel tap.
///
/// The row gap is computed in signed arithmetic: with dilation the gap can
/// be negative even though every accumulated offset stays non-negative.
pub(crate) fn space_offsets(
    input_w: usize,
    kernel_w: usize,
    kernel_h: usize,
    dilation_w: usize,
    dilation_h: usize,
) -> Vec<usize> {
    let gap = input_w as isize * dilation_h as isize - kernel_w as isize * dilation_w as isize;
    let mut ofs = Vec::with_capacity(kernel_w * kernel_h);
    let mut p: isize = 0;
    for _ in 0..kernel_h {
        for _ in 0..kernel_w {
            ofs.push(p as usize);
            p += dilation_w as isize;
        }
        p += gap;
    }
    ofs
}

/// One exact dot product at output position (k, i, j), bias included.
///
/// Accumulates in f32, q outer and tap inner, in buffer order. Both the
/// exact kernel and the bound kernel's fallback branch call this, so a
/// fallback result is bit-identical to the dense result.
#[inline]
pub(crate) fn dot_at(
    x: &Tensor3,
    weights: &[f32],
    geom: &Geometry,
    k: usize,
    i: usize,
    j: usize,
    bias: f32,
) -> f32 {
    let mut y = bias;
    let kbase = k * geom.inch * geom.maxk;
    let base = geom.patch_base(i, j);
    for q in 0..geom.inch {
        let ch = x.channel_slice(q);
        let kptr = &weights[kbase + q * geom.maxk..kbase + (q + 1) * geom.maxk];
        for (t, &wt) in kptr.iter().enumerate() {
            y += ch[base + geom.space_ofs[t]] * wt;
        }
    }
    y
}
