//! Exact dense convolution kernel.
//!
//! The reference triple loop: every output position gets a full dot
//! product. Runs on the first call of a temporal bound mode (populating the
//! pre-activation cache), whenever the bound mode is disabled or unsafe for
//! the activation, and for dynamic weights.

use crate::activation::Activation;
use crate::tensor::Tensor3;

use super::{dot_at, Geometry};

/// Run the dense kernel over the whole output.
///
/// When `last_y_bar` is given, the pre-activation minus bias is recorded
/// per position, seeding the temporal cache for subsequent bound calls.
pub(crate) fn exact_forward(
    x: &Tensor3,
    out: &mut Tensor3,
    weights: &[f32],
    bias: Option<&[f32]>,
    geom: &Geometry,
    activation: Activation,
    mut last_y_bar: Option<&mut Tensor3>,
) {
    for i in 0..geom.outh {
        for j in 0..geom.outw {
            for k in 0..geom.outch {
                let y_bias = bias.map_or(0.0, |b| b[k]);
                let y = dot_at(x, weights, geom, k, i, j, y_bias);
                if let Some(bar) = last_y_bar.as_deref_mut() {
                    bar.set(k, i, j, y - y_bias);
                }
                out.set(k, i, j, activation.apply(y));
            }
        }
    }
}
