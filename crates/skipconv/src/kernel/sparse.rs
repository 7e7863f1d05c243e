//! Bound-evaluating convolution kernel.
//!
//! One traversal serves every bound mode: the mode decides which candidate
//! bounds participate and the minimum over the enabled candidates is tested
//! against `-bias`. A passing test proves the pre-activation non-positive,
//! so the output is written as zero and the cached upper bound tightened in
//! place; a failing test falls back to the exact dot product.
//!
//! Traversal order is i outer, j middle, k inner and is load-bearing: the
//! row buffer entry read at (i, j, k) is the value written at (i-1, j, k)
//! earlier in the same call, and the column buffer entry is the value from
//! (i, j-1, k). Do not reorder or parallelize these loops.

use tracing::trace;

use crate::activation::Activation;
use crate::config::BoundMode;
use crate::state::CoreState;
use crate::tensor::Tensor3;

use super::bounds::{compute_patch_deltas, DeltaRequest};
use super::{dot_at, Geometry};

/// Skip accounting for one bound-mode call.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SparseOutcome {
    pub skipped: u64,
    pub total: u64,
}

/// Run the bound kernel over the whole output.
///
/// Preconditions, upheld by the operator: `state.norms` is populated; the
/// top-E cache is populated when the mode refines the temporal bound; the
/// temporal caches hold the previous frame when the mode uses them; the
/// row/col buffers are sized when the mode uses spatial bounds.
pub(crate) fn bound_forward(
    x: &Tensor3,
    out: &mut Tensor3,
    weights: &[f32],
    bias: Option<&[f32]>,
    geom: &Geometry,
    activation: Activation,
    mode: BoundMode,
    state: &mut CoreState,
) -> SparseOutcome {
    let temporal = mode.uses_temporal();
    let spatial = mode.uses_spatial();
    let top_e = mode.uses_top_e();
    let lower = mode.uses_first_lower();

    let CoreState {
        norms,
        top_e: top_e_cache,
        last_x,
        last_y_bar,
        last_y_row,
        last_y_col,
        ..
    } = state;
    let norms = norms.as_ref().expect("weight norms precomputed");
    let tope = top_e_cache.as_ref();
    let last_x = last_x.as_ref();
    let mut bar = last_y_bar.as_mut();

    let mut temporal_diff = if top_e {
        vec![0.0f32; geom.inch * geom.maxk]
    } else {
        Vec::new()
    };

    let req = DeltaRequest {
        temporal,
        spatial,
        first_row_delta: lower,
    };

    let filter_len = geom.inch * geom.maxk;
    let mut skipped = 0u64;
    let total = (geom.outh * geom.outw * geom.outch) as u64;

    for i in 0..geom.outh {
        for j in 0..geom.outw {
            let deltas = compute_patch_deltas(
                x,
                last_x,
                geom,
                i,
                j,
                req,
                if top_e {
                    Some(temporal_diff.as_mut_slice())
                } else {
                    None
                },
            );
            let row_slot = j * geom.outch;

            for k in 0..geom.outch {
                let y_bias = bias.map_or(0.0, |b| b[k]);

                let mut min_bound = f32::INFINITY;
                let mut have_bound = false;

                if temporal {
                    let prev_bar = bar.as_deref().map_or(0.0, |b| b.get(k, i, j));
                    let coeff = match tope {
                        Some(tc) if top_e => {
                            tc.select_norm(k, tc.sign_pattern(k, &temporal_diff))
                        }
                        _ => norms.norm[k],
                    };
                    min_bound = prev_bar + coeff * deltas.dx_t;
                    have_bound = true;
                }

                if spatial && i > 0 {
                    let prev_row = last_y_row[row_slot + k];
                    let b_r = if lower {
                        let corner = deltas.delta0_row * weights[k * filter_len];
                        if corner <= 0.0 {
                            prev_row + norms.norm_lower[k] * deltas.dx_r + corner
                        } else {
                            prev_row + norms.norm[k] * deltas.dx_r
                        }
                    } else {
                        prev_row + norms.norm[k] * deltas.dx_r
                    };
                    min_bound = min_bound.min(b_r);
                    have_bound = true;
                }

                if spatial && j > 0 {
                    let b_c = last_y_col[k] + norms.norm[k] * deltas.dx_c;
                    min_bound = min_bound.min(b_c);
                    have_bound = true;
                }

                if have_bound && min_bound + y_bias <= 0.0 {
                    out.set(k, i, j, 0.0);
                    if let Some(b) = bar.as_deref_mut() {
                        b.set(k, i, j, min_bound);
                    }
                    if spatial {
                        last_y_row[row_slot + k] = min_bound;
                        last_y_col[k] = min_bound;
                    }
                    skipped += 1;
                } else {
                    let y = dot_at(x, weights, geom, k, i, j, y_bias);
                    let pre = y - y_bias;
                    if let Some(b) = bar.as_deref_mut() {
                        b.set(k, i, j, pre);
                    }
                    if spatial {
                        last_y_row[row_slot + k] = pre;
                        last_y_col[k] = pre;
                    }
                    out.set(k, i, j, activation.apply(y));
                }
            }
        }
    }

    trace!(skipped, total, "bound kernel pass complete");

    SparseOutcome { skipped, total }
}
