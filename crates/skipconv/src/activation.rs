//! Fused activation functions.
//!
//! The activation is applied to each pre-activation scalar as the last step
//! of the exact kernel. [`Activation::preserves_zero`] is the property that
//! gates bound-mode soundness: the skip branch writes a literal zero, which
//! is only correct when the activation maps every non-positive input to
//! exactly zero.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkipConvError};

/// Scalar activation applied to each convolution output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    #[default]
    None,
    Relu,
    LeakyRelu {
        slope: f32,
    },
    Clip {
        min: f32,
        max: f32,
    },
    Sigmoid,
}

impl Activation {
    /// Decode the framework's (type id, params) encoding.
    ///
    /// 0=none 1=relu 2=leakyrelu 3=clip 4=sigmoid
    pub fn from_type_params(activation_type: i32, params: &[f32]) -> Result<Self> {
        match activation_type {
            0 => Ok(Activation::None),
            1 => Ok(Activation::Relu),
            2 => Ok(Activation::LeakyRelu {
                slope: params.first().copied().unwrap_or(0.0),
            }),
            3 => {
                if params.len() < 2 {
                    return Err(SkipConvError::Config(
                        "clip activation needs [min, max] params".into(),
                    ));
                }
                Ok(Activation::Clip {
                    min: params[0],
                    max: params[1],
                })
            }
            4 => Ok(Activation::Sigmoid),
            other => Err(SkipConvError::Config(format!(
                "unknown activation type {other}"
            ))),
        }
    }

    /// Apply the activation to one pre-activation value.
    #[inline]
    pub fn apply(&self, v: f32) -> f32 {
        match *self {
            Activation::None => v,
            Activation::Relu => v.max(0.0),
            Activation::LeakyRelu { slope } => {
                if v < 0.0 {
                    v * slope
                } else {
                    v
                }
            }
            Activation::Clip { min, max } => v.clamp(min, max),
            Activation::Sigmoid => 1.0 / (1.0 + (-v).exp()),
        }
    }

    /// True when every input <= 0 maps to exactly 0.
    ///
    /// Only activations with this property admit the zero-skip branch;
    /// clip qualifies only with a lower bound of exactly zero, and leaky
    /// relu only with a zero slope.
    pub fn preserves_zero(&self) -> bool {
        match *self {
            Activation::Relu => true,
            Activation::LeakyRelu { slope } => slope == 0.0,
            Activation::Clip { min, .. } => min == 0.0,
            Activation::None | Activation::Sigmoid => false,
        }
    }
}
