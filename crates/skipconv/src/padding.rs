//! Padded input builder.
//!
//! Applies the operator's padding policy to an input tensor before the
//! kernels run: explicit per-side constant padding, or the SAME_UPPER /
//! SAME_LOWER sentinels that derive the pad split from stride and input
//! size. When no padding applies the input is borrowed, not copied.

use std::borrow::Cow;

use crate::config::{ConvConfig, PAD_SAME_LOWER, PAD_SAME_UPPER};
use crate::error::Result;
use crate::tensor::Tensor3;

/// Copy `input` into a larger tensor with a constant-value border.
pub fn copy_make_border(
    input: &Tensor3,
    top: usize,
    bottom: usize,
    left: usize,
    right: usize,
    value: f32,
) -> Result<Tensor3> {
    let (c, h, w) = input.shape();
    let mut out = Tensor3::new(c, h + top + bottom, w + left + right)?;
    if value != 0.0 {
        out.fill(value);
    }
    let out_w = w + left + right;
    for q in 0..c {
        let src = input.channel_slice(q);
        let dst = out.channel_slice_mut(q);
        for y in 0..h {
            let dst_base = (y + top) * out_w + left;
            dst[dst_base..dst_base + w].copy_from_slice(&src[y * w..(y + 1) * w]);
        }
    }
    Ok(out)
}

/// Apply the configured padding policy, borrowing when nothing pads.
pub fn make_padding<'a>(input: &'a Tensor3, cfg: &ConvConfig) -> Result<Cow<'a, Tensor3>> {
    let w = input.width() as i64;
    let h = input.height() as i64;

    let kernel_extent_w = cfg.kernel_extent_w() as i64;
    let kernel_extent_h = cfg.kernel_extent_h() as i64;
    let stride_w = cfg.stride_w as i64;
    let stride_h = cfg.stride_h as i64;

    if cfg.pad_left > 0 || cfg.pad_right > 0 || cfg.pad_top > 0 || cfg.pad_bottom > 0 {
        let bordered = copy_make_border(
            input,
            cfg.pad_top.max(0) as usize,
            cfg.pad_bottom.max(0) as usize,
            cfg.pad_left.max(0) as usize,
            cfg.pad_right.max(0) as usize,
            cfg.pad_value,
        )?;
        return Ok(Cow::Owned(bordered));
    }

    let all_pads_are = |v: i32| {
        cfg.pad_left == v && cfg.pad_right == v && cfg.pad_top == v && cfg.pad_bottom == v
    };

    if all_pads_are(PAD_SAME_UPPER) || all_pads_are(PAD_SAME_LOWER) {
        let wpad = kernel_extent_w + (w - 1) / stride_w * stride_w - w;
        let hpad = kernel_extent_h + (h - 1) / stride_h * stride_h - h;
        if wpad > 0 || hpad > 0 {
            let wpad = wpad.max(0) as usize;
            let hpad = hpad.max(0) as usize;
            // SAME_UPPER puts the larger half at the end, SAME_LOWER at the start.
            let (top, bottom, left, right) = if all_pads_are(PAD_SAME_UPPER) {
                (hpad / 2, hpad - hpad / 2, wpad / 2, wpad - wpad / 2)
            } else {
                (hpad - hpad / 2, hpad / 2, wpad - wpad / 2, wpad / 2)
            };
            let bordered = copy_make_border(input, top, bottom, left, right, cfg.pad_value)?;
            return Ok(Cow::Owned(bordered));
        }
    }

    Ok(Cow::Borrowed(input))
}
