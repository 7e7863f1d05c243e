//! The convolution operator.
//!
//! [`Convolution`] ties the pieces together: parameter loading, weight
//! loading, padding, output sizing, kernel dispatch, and the cross-call
//! cache lifecycle. The forward pass picks between the exact kernel and the
//! configured bound mode, degrading to exact whenever the bound mode would
//! be unsound for the activation.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::activation::Activation;
use crate::config::{BoundMode, ConvConfig};
use crate::error::{Result, SkipConvError};
use crate::kernel::exact::exact_forward;
use crate::kernel::sparse::bound_forward;
use crate::kernel::Geometry;
use crate::norms::WeightNorms;
use crate::padding::make_padding;
use crate::param::{ModelBin, ParamDict};
use crate::state::CoreState;
use crate::tensor::Tensor3;
use crate::tope::TopECache;

/// Per-call forward options supplied by the caller.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForwardOptions {
    /// Opt into the configured bound mode; false forces the exact kernel.
    pub use_bound_mode: bool,
}

impl ForwardOptions {
    /// Options with the bound mode enabled.
    pub fn bound() -> Self {
        Self {
            use_bound_mode: true,
        }
    }
}

/// Skip statistics from the most recent bound-mode call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SparsityStats {
    /// Output positions proven zero without a dot product.
    pub skipped: u64,
    /// Total output positions visited.
    pub total: u64,
}

impl SparsityStats {
    /// Fraction of positions skipped, 0.0 when nothing was visited.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.skipped as f64 / self.total as f64
        }
    }
}

/// Output-sparsity-aware 2D convolution operator.
///
/// One instance owns its configuration, weights, and all cross-call caches.
/// Instances are independent; concurrent calls on the same instance are not
/// supported (the bound kernel's spatial propagation state is inherently
/// sequential).
#[derive(Debug)]
pub struct Convolution {
    config: ConvConfig,
    activation: Activation,
    weight_data: Vec<f32>,
    bias_data: Vec<f32>,
    state: CoreState,
    last_sparsity: Option<SparsityStats>,
}

impl Convolution {
    /// Operator with an explicit configuration and activation.
    pub fn new(config: ConvConfig, activation: Activation) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            activation,
            weight_data: Vec::new(),
            bias_data: Vec::new(),
            state: CoreState::new(),
            last_sparsity: None,
        })
    }

    /// Operator configured from a framework parameter dictionary.
    ///
    /// Recognized keys follow the layer convention:
    /// 0 num_output, 1/11 kernel, 2/12 dilation, 3/13 stride,
    /// 4/15/14/16 pad l/r/t/b, 18 pad_value, 5 bias_term,
    /// 6 weight_data_size, 8 int8_scale_term, 9/10 activation,
    /// 19 dynamic_weight.
    pub fn load_param(pd: &ParamDict) -> Result<Self> {
        let kernel_w = pd.get_int(1, 0);
        let dilation_w = pd.get_int(2, 1);
        let stride_w = pd.get_int(3, 1);
        let pad_left = pd.get_int(4, 0);
        let pad_top = pd.get_int(14, pad_left);

        let int8_scale_term = pd.get_int(8, 0);
        if int8_scale_term != 0 {
            return Err(SkipConvError::Config(
                "int8 inference is not built into this crate".into(),
            ));
        }

        let to_dim = |v: i32, name: &str| -> Result<usize> {
            usize::try_from(v)
                .map_err(|_| SkipConvError::Config(format!("{name} must be non-negative, got {v}")))
        };

        let config = ConvConfig {
            num_output: to_dim(pd.get_int(0, 0), "num_output")?,
            kernel_w: to_dim(kernel_w, "kernel_w")?,
            kernel_h: to_dim(pd.get_int(11, kernel_w), "kernel_h")?,
            dilation_w: to_dim(dilation_w, "dilation_w")?,
            dilation_h: to_dim(pd.get_int(12, dilation_w), "dilation_h")?,
            stride_w: to_dim(stride_w, "stride_w")?,
            stride_h: to_dim(pd.get_int(13, stride_w), "stride_h")?,
            pad_left,
            pad_right: pd.get_int(15, pad_left),
            pad_top,
            pad_bottom: pd.get_int(16, pad_top),
            pad_value: pd.get_float(18, 0.0),
            bias_term: pd.get_int(5, 0) != 0,
            weight_data_size: to_dim(pd.get_int(6, 0), "weight_data_size")?,
            dynamic_weight: pd.get_int(19, 0) != 0,
            bound_mode: BoundMode::default(),
        };

        let activation =
            Activation::from_type_params(pd.get_int(9, 0), &pd.get_floats(10))?;

        Self::new(config, activation)
    }

    /// Select the bound strategy for this instance. Resets the caches.
    pub fn set_bound_mode(&mut self, mode: BoundMode) {
        self.config.bound_mode = mode;
        self.state.reset();
        self.last_sparsity = None;
    }

    /// Builder-style bound mode selection.
    pub fn with_bound_mode(mut self, mode: BoundMode) -> Self {
        self.set_bound_mode(mode);
        self
    }

    pub fn config(&self) -> &ConvConfig {
        &self.config
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Skip statistics of the most recent bound-mode call, if any.
    pub fn last_sparsity(&self) -> Option<SparsityStats> {
        self.last_sparsity
    }

    /// Load weights (and bias when configured) from a model source.
    ///
    /// Clears all caches: stale norms or frames from previous weights must
    /// never leak into bound decisions.
    pub fn load_model(&mut self, mb: &mut dyn ModelBin) -> Result<()> {
        if self.config.dynamic_weight {
            return Ok(());
        }
        self.weight_data = mb.load(self.config.weight_data_size)?;
        self.bias_data = if self.config.bias_term {
            mb.load(self.config.num_output)?
        } else {
            Vec::new()
        };
        self.state.reset();
        self.last_sparsity = None;
        Ok(())
    }

    /// Drop all cross-call caches; the next forward call starts fresh.
    pub fn reset_state(&mut self) {
        self.state.reset();
        self.last_sparsity = None;
    }

    /// Forward pass.
    ///
    /// Runs the configured bound mode when `opt.use_bound_mode` is set and
    /// the activation admits the zero-skip branch; otherwise runs the exact
    /// kernel. Either path yields output identical to the dense convolution
    /// for zero-preserving activations.
    pub fn forward(&mut self, input: &Tensor3, opt: &ForwardOptions) -> Result<Tensor3> {
        if self.config.dynamic_weight {
            return Err(SkipConvError::Config(
                "operator has dynamic weights, call forward_dynamic".into(),
            ));
        }
        let inch = input.channels();
        let filter_len = inch * self.config.maxk();
        if self.config.weight_data_size != self.config.num_output * filter_len {
            return Err(SkipConvError::Config(format!(
                "weight_data_size {} does not match num_output {} x C_in {} x maxk {}",
                self.config.weight_data_size,
                self.config.num_output,
                inch,
                self.config.maxk()
            )));
        }
        if self.weight_data.len() != self.config.weight_data_size {
            return Err(SkipConvError::Config(
                "weights not loaded; call load_model first".into(),
            ));
        }

        let padded = make_padding(input, &self.config)?;
        let (out, stats) = self.forward_padded(&padded, opt)?;

        if let Some(stats) = stats {
            debug!(
                skipped = stats.skipped,
                total = stats.total,
                ratio = stats.ratio(),
                "bound-mode convolution pass"
            );
        }
        self.last_sparsity = stats;
        Ok(out)
    }

    /// Forward pass with per-call weights (dynamic-weight operators).
    ///
    /// The weight tensor is shaped (num_output, C_in, kernel_h * kernel_w).
    /// No caches are consulted or mutated: bound state is meaningless when
    /// the filter changes every call, so this is always the exact kernel.
    pub fn forward_dynamic(
        &self,
        input: &Tensor3,
        weight: &Tensor3,
        bias: Option<&[f32]>,
    ) -> Result<Tensor3> {
        let (wk, wc, wt) = weight.shape();
        if wk != self.config.num_output || wc != input.channels() || wt != self.config.maxk() {
            return Err(SkipConvError::ShapeMismatch(format!(
                "dynamic weight shape ({wk}, {wc}, {wt}) does not match \
                 (num_output {}, C_in {}, maxk {})",
                self.config.num_output,
                input.channels(),
                self.config.maxk()
            )));
        }
        if let Some(b) = bias {
            if b.len() != self.config.num_output {
                return Err(SkipConvError::ShapeMismatch(format!(
                    "dynamic bias length {} != num_output {}",
                    b.len(),
                    self.config.num_output
                )));
            }
        }

        let padded = make_padding(input, &self.config)?;
        let Some((outw, outh)) = self.output_extent(&padded) else {
            return Tensor3::new(self.config.num_output, 0, 0);
        };
        let geom = Geometry::new(&self.config, &padded, outw, outh);
        let mut out = Tensor3::new(self.config.num_output, outh, outw)?;
        exact_forward(
            &padded,
            &mut out,
            weight.as_slice(),
            bias,
            &geom,
            self.activation,
            None,
        );
        Ok(out)
    }

    /// Output extent for a padded input, or None when it is empty.
    fn output_extent(&self, padded: &Tensor3) -> Option<(usize, usize)> {
        let outw =
            (padded.width() as i64 - self.config.kernel_extent_w() as i64) / self.config.stride_w as i64 + 1;
        let outh =
            (padded.height() as i64 - self.config.kernel_extent_h() as i64) / self.config.stride_h as i64 + 1;
        if outw <= 0 || outh <= 0 {
            None
        } else {
            Some((outw as usize, outh as usize))
        }
    }

    fn forward_padded(
        &mut self,
        padded: &Cow<'_, Tensor3>,
        opt: &ForwardOptions,
    ) -> Result<(Tensor3, Option<SparsityStats>)> {
        let Some((outw, outh)) = self.output_extent(padded) else {
            // Empty output: succeed without touching any cache.
            return Ok((Tensor3::new(self.config.num_output, 0, 0)?, None));
        };

        let mode = self.config.bound_mode;
        let bound_requested = opt.use_bound_mode && mode != BoundMode::Exact;
        // The skip branch writes literal zeros; without a zero-preserving
        // activation that would corrupt outputs, so fall back to exact.
        let bound_usable = bound_requested && self.activation.preserves_zero();

        let geom = Geometry::new(&self.config, padded, outw, outh);
        let bias = if self.config.bias_term {
            Some(self.bias_data.as_slice())
        } else {
            None
        };
        let mut out = Tensor3::new(self.config.num_output, outh, outw)?;

        if !bound_usable {
            exact_forward(
                padded,
                &mut out,
                &self.weight_data,
                bias,
                &geom,
                self.activation,
                None,
            );
            return Ok((out, None));
        }

        let filter_len = geom.inch * geom.maxk;

        if self.state.norms.is_none() {
            self.state.norms = Some(WeightNorms::compute(
                &self.weight_data,
                self.config.num_output,
                filter_len,
            ));
        }
        if mode.uses_top_e() && self.state.top_e.is_none() {
            self.state.top_e = Some(TopECache::compute(
                &self.weight_data,
                self.config.num_output,
                filter_len,
            )?);
        }

        // A shape change invalidates the cached frame but not the norms.
        if self.state.initialized {
            let frame_ok = self
                .state
                .last_x
                .as_ref()
                .map_or(false, |t| t.shape() == padded.shape())
                && self
                    .state
                    .last_y_bar
                    .as_ref()
                    .map_or(false, |t| t.shape() == out.shape());
            if !frame_ok {
                self.state.reset_frames();
            }
        }

        if mode.uses_temporal() && !self.state.initialized {
            // First call: exact compute, seeding the temporal caches.
            let mut bar = Tensor3::new(self.config.num_output, outh, outw)?;
            exact_forward(
                padded,
                &mut out,
                &self.weight_data,
                bias,
                &geom,
                self.activation,
                Some(&mut bar),
            );
            self.state.last_y_bar = Some(bar);
            self.state.last_x = Some(padded.clone().into_owned());
            self.state.initialized = true;
            return Ok((out, None));
        }

        if mode.uses_spatial() {
            self.state.ensure_row_col(outw, self.config.num_output);
        }

        let outcome = bound_forward(
            padded,
            &mut out,
            &self.weight_data,
            bias,
            &geom,
            self.activation,
            mode,
            &mut self.state,
        );

        if mode.uses_temporal() {
            self.state.last_x = Some(padded.clone().into_owned());
        }

        Ok((
            out,
            Some(SparsityStats {
                skipped: outcome.skipped,
                total: outcome.total,
            }),
        ))
    }
}
