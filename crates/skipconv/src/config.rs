//! Operator configuration.
//!
//! [`ConvConfig`] is the immutable parameter block of a convolution operator
//! (the `load_param` surface), and [`BoundMode`] selects which family of
//! activation bounds the forward pass may use to prove outputs zero.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkipConvError};

/// Sentinel pad value requesting tensorflow/onnx SAME_UPPER padding.
pub const PAD_SAME_UPPER: i32 = -233;
/// Sentinel pad value requesting onnx SAME_LOWER padding.
pub const PAD_SAME_LOWER: i32 = -234;

/// Bound strategy used by the forward pass.
///
/// A bound mode is a configuration of the operator, chosen once per
/// instance; it is not a runtime policy. Each mode names the set of
/// candidate upper bounds evaluated per output position, per the table:
///
/// | Mode | Bounds | Needs top-E | Needs leave-one-out norm |
/// |---|---|---|---|
/// | `Exact` | none | no | no |
/// | `Temporal` | B_t | no | no |
/// | `TemporalTopE` | refined B_t | yes | no |
/// | `Spatial` | B_r, B_c | no | no |
/// | `SpatialFirstOne` | refined B_r, B_c | no | yes |
/// | `TemporalSpatial` | B_t, B_r, B_c | no | no |
/// | `TemporalSpatialLower` | B_t, refined B_r, B_c | no | yes |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundMode {
    /// Always run the exact dot product.
    Exact,
    /// Temporal bound against the previous call's input.
    #[default]
    Temporal,
    /// Temporal bound tightened by the top-E sign pattern.
    TemporalTopE,
    /// Row and column bounds against neighbors within the current call.
    Spatial,
    /// Spatial bounds with the first-element refinement on the row bound.
    SpatialFirstOne,
    /// Temporal plus both spatial bounds.
    TemporalSpatial,
    /// Temporal plus spatial bounds, row bound refined.
    TemporalSpatialLower,
}

impl BoundMode {
    /// Whether the mode compares against the previous call's input.
    pub fn uses_temporal(&self) -> bool {
        matches!(
            self,
            BoundMode::Temporal
                | BoundMode::TemporalTopE
                | BoundMode::TemporalSpatial
                | BoundMode::TemporalSpatialLower
        )
    }

    /// Whether the mode compares against spatial neighbors.
    pub fn uses_spatial(&self) -> bool {
        matches!(
            self,
            BoundMode::Spatial
                | BoundMode::SpatialFirstOne
                | BoundMode::TemporalSpatial
                | BoundMode::TemporalSpatialLower
        )
    }

    /// Whether the temporal bound is tightened by the top-E select norms.
    pub fn uses_top_e(&self) -> bool {
        matches!(self, BoundMode::TemporalTopE)
    }

    /// Whether the row bound uses the first-element refinement, which in
    /// turn needs the leave-one-out weight norm.
    pub fn uses_first_lower(&self) -> bool {
        matches!(
            self,
            BoundMode::SpatialFirstOne | BoundMode::TemporalSpatialLower
        )
    }
}

/// Immutable convolution parameters, fixed after `load_param`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConvConfig {
    /// Output channel count K.
    pub num_output: usize,
    pub kernel_w: usize,
    pub kernel_h: usize,
    pub dilation_w: usize,
    pub dilation_h: usize,
    pub stride_w: usize,
    pub stride_h: usize,
    /// Explicit pad or a SAME_* sentinel.
    pub pad_left: i32,
    pub pad_right: i32,
    pub pad_top: i32,
    pub pad_bottom: i32,
    /// Border fill value for constant padding.
    pub pad_value: f32,
    pub bias_term: bool,
    /// Expected flat weight length K * C_in * kernel_w * kernel_h.
    pub weight_data_size: usize,
    /// Weights arrive per call instead of via `load_model`.
    pub dynamic_weight: bool,
    /// Bound strategy for this operator instance.
    pub bound_mode: BoundMode,
}

impl Default for ConvConfig {
    fn default() -> Self {
        Self {
            num_output: 0,
            kernel_w: 0,
            kernel_h: 0,
            dilation_w: 1,
            dilation_h: 1,
            stride_w: 1,
            stride_h: 1,
            pad_left: 0,
            pad_right: 0,
            pad_top: 0,
            pad_bottom: 0,
            pad_value: 0.0,
            bias_term: false,
            weight_data_size: 0,
            dynamic_weight: false,
            bound_mode: BoundMode::default(),
        }
    }
}

impl ConvConfig {
    /// Kernel tap count kernel_w * kernel_h.
    pub fn maxk(&self) -> usize {
        self.kernel_w * self.kernel_h
    }

    /// Dilated kernel extent along width.
    pub fn kernel_extent_w(&self) -> usize {
        self.dilation_w * (self.kernel_w - 1) + 1
    }

    /// Dilated kernel extent along height.
    pub fn kernel_extent_h(&self) -> usize {
        self.dilation_h * (self.kernel_h - 1) + 1
    }

    /// Reject parameter combinations the kernels cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.num_output == 0 {
            return Err(SkipConvError::Config("num_output must be positive".into()));
        }
        if self.kernel_w == 0 || self.kernel_h == 0 {
            return Err(SkipConvError::Config("kernel size must be positive".into()));
        }
        if self.stride_w == 0 || self.stride_h == 0 {
            return Err(SkipConvError::Config("stride must be positive".into()));
        }
        if self.dilation_w == 0 || self.dilation_h == 0 {
            return Err(SkipConvError::Config("dilation must be positive".into()));
        }
        if !self.dynamic_weight {
            if self.weight_data_size == 0 {
                return Err(SkipConvError::Config(
                    "weight_data_size must be positive".into(),
                ));
            }
            if self.weight_data_size % (self.num_output * self.maxk()) != 0 {
                return Err(SkipConvError::Config(format!(
                    "weight_data_size {} is not a multiple of num_output*maxk {}",
                    self.weight_data_size,
                    self.num_output * self.maxk()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ConvConfig {
        ConvConfig {
            num_output: 4,
            kernel_w: 3,
            kernel_h: 3,
            weight_data_size: 4 * 2 * 9,
            ..ConvConfig::default()
        }
    }

    #[test]
    fn test_mode_capability_table() {
        assert!(!BoundMode::Exact.uses_temporal());
        assert!(BoundMode::Temporal.uses_temporal());
        assert!(!BoundMode::Temporal.uses_spatial());
        assert!(BoundMode::TemporalTopE.uses_top_e());
        assert!(BoundMode::Spatial.uses_spatial());
        assert!(!BoundMode::Spatial.uses_temporal());
        assert!(BoundMode::SpatialFirstOne.uses_first_lower());
        assert!(BoundMode::TemporalSpatial.uses_temporal());
        assert!(BoundMode::TemporalSpatial.uses_spatial());
        assert!(BoundMode::TemporalSpatialLower.uses_first_lower());
    }

    #[test]
    fn test_validate_accepts_consistent_config() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_stride() {
        let cfg = ConvConfig {
            stride_w: 0,
            ..base_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_misaligned_weight_size() {
        let cfg = ConvConfig {
            weight_data_size: 100,
            ..base_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_kernel_extent_with_dilation() {
        let cfg = ConvConfig {
            dilation_w: 2,
            dilation_h: 3,
            ..base_config()
        };
        assert_eq!(cfg.kernel_extent_w(), 5);
        assert_eq!(cfg.kernel_extent_h(), 7);
    }
}
