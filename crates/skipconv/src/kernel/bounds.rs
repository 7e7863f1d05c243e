//! Patch delta computation for the bound evaluator.
//!
//! For one output position (i, j) the bound tests need up to three l2
//! norms of input-patch differences: against the previous frame (temporal),
//! against the patch one output row up (row-spatial), and against the patch
//! one output column left (col-spatial). All enabled deltas are accumulated
//! in a single fused pass over (channel, tap) so each input value is
//! touched once.

use crate::tensor::Tensor3;

use super::Geometry;

/// Square-rooted patch deltas at one output position.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct PatchDeltas {
    /// ||x_ij - last_x_ij||, valid when temporal was requested.
    pub dx_t: f32,
    /// ||x_ij - x_(i-1)j||, valid when spatial was requested and i > 0.
    pub dx_r: f32,
    /// ||x_ij - x_i(j-1)||, valid when spatial was requested and j > 0.
    pub dx_c: f32,
    /// First element of the row difference, (x_ij - x_(i-1)j)[0].
    pub delta0_row: f32,
}

/// Which deltas the caller's bound mode needs.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DeltaRequest {
    pub temporal: bool,
    pub spatial: bool,
    /// Capture the first row-difference element for the refined row bound.
    pub first_row_delta: bool,
}

/// Accumulate the requested deltas at (i, j) in one fused pass.
///
/// When `temporal_diff` is given, the per-element temporal difference
/// (current minus previous frame) is stored there in (q, tap) order for the
/// top-E sign classification.
pub(crate) fn compute_patch_deltas(
    x: &Tensor3,
    last_x: Option<&Tensor3>,
    geom: &Geometry,
    i: usize,
    j: usize,
    req: DeltaRequest,
    mut temporal_diff: Option<&mut [f32]>,
) -> PatchDeltas {
    let mut dx2_t = 0.0f32;
    let mut dx2_r = 0.0f32;
    let mut dx2_c = 0.0f32;
    let mut delta0_row = 0.0f32;

    let base = geom.patch_base(i, j);
    let row_up_base = if i > 0 {
        geom.patch_base(i - 1, j)
    } else {
        0
    };

    for q in 0..geom.inch {
        let ch = x.channel_slice(q);
        let last_ch = last_x.map(|t| t.channel_slice(q));

        for (t, &ofs) in geom.space_ofs.iter().enumerate() {
            let cur = ch[base + ofs];

            if req.temporal {
                // last_x is always present when temporal is requested
                let prev = last_ch.map_or(0.0, |s| s[base + ofs]);
                let d = cur - prev;
                dx2_t += d * d;
                if let Some(diff) = temporal_diff.as_deref_mut() {
                    diff[q * geom.maxk + t] = d;
                }
            }

            if req.spatial {
                if i > 0 {
                    let d = cur - ch[row_up_base + ofs];
                    dx2_r += d * d;
                    if req.first_row_delta && q == 0 && t == 0 {
                        delta0_row = d;
                    }
                }
                if j > 0 {
                    let d = cur - ch[base - geom.stride_w + ofs];
                    dx2_c += d * d;
                }
            }
        }
    }

    PatchDeltas {
        dx_t: dx2_t.sqrt(),
        dx_r: dx2_r.sqrt(),
        dx_c: dx2_c.sqrt(),
        delta0_row,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvConfig;

    fn geom_3x3(x: &Tensor3) -> Geometry {
        let cfg = ConvConfig {
            num_output: 1,
            kernel_w: 3,
            kernel_h: 3,
            weight_data_size: 9,
            ..ConvConfig::default()
        };
        Geometry::new(&cfg, x, x.width() - 2, x.height() - 2)
    }

    #[test]
    fn test_temporal_delta_zero_for_identical_frames() {
        let x = Tensor3::from_shape_fn(2, 5, 5, |(q, y, xx)| (q + y * xx) as f32);
        let last = x.clone();
        let geom = geom_3x3(&x);
        let d = compute_patch_deltas(
            &x,
            Some(&last),
            &geom,
            1,
            1,
            DeltaRequest {
                temporal: true,
                spatial: false,
                first_row_delta: false,
            },
            None,
        );
        assert_eq!(d.dx_t, 0.0);
    }

    #[test]
    fn test_temporal_delta_single_pixel_change() {
        let last = Tensor3::new(1, 5, 5).unwrap();
        let mut x = last.clone();
        x.set(0, 2, 2, 3.0);
        let geom = geom_3x3(&x);
        // Patch at (1,1) covers rows 1..4, cols 1..4, so pixel (2,2) is in it.
        let d = compute_patch_deltas(
            &x,
            Some(&last),
            &geom,
            1,
            1,
            DeltaRequest {
                temporal: true,
                spatial: false,
                first_row_delta: false,
            },
            None,
        );
        assert!((d.dx_t - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_temporal_diff_vector_order() {
        let last = Tensor3::new(1, 4, 4).unwrap();
        let x = Tensor3::from_shape_fn(1, 4, 4, |(_, y, xx)| (y * 4 + xx) as f32);
        let geom = geom_3x3(&x);
        let mut diff = vec![0.0f32; 9];
        compute_patch_deltas(
            &x,
            Some(&last),
            &geom,
            0,
            0,
            DeltaRequest {
                temporal: true,
                spatial: false,
                first_row_delta: false,
            },
            Some(&mut diff),
        );
        assert_eq!(diff, vec![0.0, 1.0, 2.0, 4.0, 5.0, 6.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn test_spatial_deltas_and_first_element() {
        // Rows have constant values equal to the row index.
        let x = Tensor3::from_shape_fn(1, 5, 5, |(_, y, _)| y as f32);
        let geom = geom_3x3(&x);
        let d = compute_patch_deltas(
            &x,
            None,
            &geom,
            1,
            1,
            DeltaRequest {
                temporal: false,
                spatial: true,
                first_row_delta: true,
            },
            None,
        );
        // Patch rows (1,2,3) vs (0,1,2): each of 9 elements differs by 1.
        assert!((d.dx_r - 3.0).abs() < 1e-6);
        // Column neighbor is identical in this pattern.
        assert_eq!(d.dx_c, 0.0);
        assert_eq!(d.delta0_row, 1.0);
    }

    #[test]
    fn test_boundary_skips_missing_neighbors() {
        let x = Tensor3::from_shape_fn(1, 5, 5, |(_, y, xx)| (y * xx) as f32);
        let geom = geom_3x3(&x);
        let d = compute_patch_deltas(
            &x,
            None,
            &geom,
            0,
            0,
            DeltaRequest {
                temporal: false,
                spatial: true,
                first_row_delta: true,
            },
            None,
        );
        assert_eq!(d.dx_r, 0.0);
        assert_eq!(d.dx_c, 0.0);
        assert_eq!(d.delta0_row, 0.0);
    }
}
