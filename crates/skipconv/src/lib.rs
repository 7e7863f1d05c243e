//! # skipconv: output-sparsity-aware 2D convolution
//!
//! An inference-time convolution operator that proves many output
//! activations are zero without computing them. When the layer feeds a
//! non-negative activation (ReLU and friends), any output position whose
//! pre-activation can be bounded at or below zero may be written as a
//! literal zero and its dot product skipped entirely.
//!
//! The bounds come from Cauchy-Schwarz over input differences: for a filter
//! W_k and two input patches x and x',
//!
//! ```text
//! W_k . x  <=  W_k . x' + ||W_k|| * ||x - x'||
//! ```
//!
//! so a cached pre-activation for x' plus the filter norm times a patch
//! delta is an upper bound for the new pre-activation. Three reference
//! patches are cheap to come by:
//!
//! - **temporal**: the same output position in the previous call's input
//!   (video frames, streaming audio — successive inputs are similar),
//! - **row-spatial**: the patch one output row up in the current input,
//! - **col-spatial**: the patch one output column left.
//!
//! Two refinements tighten the bound further: the per-filter **top-E
//! select norms**, which shrink ||W_k|| using the known signs of the input
//! delta at the E largest-magnitude weight positions, and the
//! **first-element refinement** on the row bound. When no bound proves the
//! output zero, the operator falls back to the exact dot product, so
//! results are identical to dense convolution, position for position.
//!
//! # Core Types
//!
//! | Module | Primary Type | Purpose |
//! |--------|-------------|---------|
//! | [`conv`] | [`Convolution`] | The operator: load, forward, caches |
//! | [`config`] | [`ConvConfig`], [`BoundMode`] | Parameters and bound strategy |
//! | [`tensor`] | [`Tensor3`] | Channel-major (C, H, W) f32 tensor |
//! | [`param`] | [`ParamDict`], [`ModelBin`] | Framework loading surfaces |
//! | [`activation`] | [`Activation`] | Fused activations + zero-preserving predicate |
//! | [`norms`] | [`WeightNorms`] | Per-filter l2 norm cache |
//! | [`tope`] | [`TopECache`] | Top-E indices and 2^E select norms |
//! | [`state`] | [`CoreState`] | Cross-call caches |
//!
//! # Quick Start
//!
//! ```rust
//! use skipconv::{BoundMode, Convolution, ForwardOptions, ParamDict, SliceModelBin, Tensor3};
//!
//! // A 1x1 identity filter with ReLU.
//! let mut pd = ParamDict::new();
//! pd.set_int(0, 1)  // num_output
//!     .set_int(1, 1) // kernel_w
//!     .set_int(6, 1) // weight_data_size
//!     .set_int(9, 1); // relu
//! let mut conv = Convolution::load_param(&pd).unwrap();
//! conv.load_model(&mut SliceModelBin::new(&[1.0])).unwrap();
//! conv.set_bound_mode(BoundMode::Temporal);
//!
//! let frame = Tensor3::from_shape_vec(1, 1, 3, vec![1.0, -2.0, 3.0]).unwrap();
//! let opt = ForwardOptions::bound();
//!
//! // First call computes exactly and seeds the caches.
//! let out = conv.forward(&frame, &opt).unwrap();
//! assert_eq!(out.channel_slice(0), &[1.0, 0.0, 3.0]);
//!
//! // On an identical second frame the delta is zero, so the negative
//! // position is proven zero without its dot product.
//! let out = conv.forward(&frame, &opt).unwrap();
//! assert_eq!(out.channel_slice(0), &[1.0, 0.0, 3.0]);
//! assert_eq!(conv.last_sparsity().unwrap().skipped, 1);
//! ```
//!
//! # Soundness
//!
//! The skip branch writes exact zeros, which is only correct when the
//! activation maps every non-positive input to zero. The operator checks
//! [`Activation::preserves_zero`] and silently degrades to the exact kernel
//! otherwise (sigmoid, leaky relu with a real slope), so enabling a bound
//! mode never changes results.
//!
//! # Threading
//!
//! A forward call is single-threaded by design: the spatial bounds read
//! state written earlier in the same traversal. Run distinct operator
//! instances concurrently instead; they share nothing.

pub mod activation;
pub mod config;
pub mod conv;
pub mod error;
pub mod kernel;
pub mod norms;
pub mod padding;
pub mod param;
pub mod state;
pub mod tensor;
pub mod tope;

pub use activation::Activation;
pub use config::{BoundMode, ConvConfig, PAD_SAME_LOWER, PAD_SAME_UPPER};
pub use conv::{Convolution, ForwardOptions, SparsityStats};
pub use error::{Result, SkipConvError};
pub use param::{ModelBin, ParamDict, ParamValue, ReaderModelBin, SliceModelBin};
pub use state::CoreState;
pub use tensor::Tensor3;
pub use tope::{TopECache, SELECT_PATTERNS, TOP_E};
pub use norms::WeightNorms;
pub use padding::{copy_make_border, make_padding};
