//! Error taxonomy of a fuzz run.
//!
//! [`InputError`] is fatal and raised before the first case is generated. [`ExecutionError`]
//! describes a single candidate invocation that did not produce a product; it is recorded
//! against that case and the run carries on.

use crate::backend::MatmulShape;
use crate::fuzz::config::FuzzConfigBuilderError;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("num_tests must be positive")]
    ZeroTests,

    #[error("max_size must be positive")]
    ZeroMaxSize,

    #[error("invalid value distribution: {0}")]
    InvalidDistribution(String),

    #[error("zero_probability must be within [0, 1], got {0}")]
    InvalidZeroProbability(f64),

    #[error("invalid tolerance: abs={abs}, rel={rel} (both must be finite and non-negative)")]
    InvalidTolerance { abs: f64, rel: f64 },

    #[error(
        "products of {max_size} terms of magnitude {magnitude} can reach {bound:e}, which {dtype} cannot represent"
    )]
    Unrepresentable {
        dtype: &'static str,
        magnitude: f64,
        max_size: usize,
        bound: f64,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<FuzzConfigBuilderError> for InputError {
    fn from(value: FuzzConfigBuilderError) -> Self {
        InputError::Config(value.to_string())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ExecutionError {
    #[error("candidate rejected shape {shape}: {msg}")]
    Rejected { shape: MatmulShape, msg: String },

    #[error("failed to allocate {len} output elements: {msg}")]
    Allocation { len: usize, msg: String },

    #[error("device error: {0}")]
    Device(String),

    #[error("candidate panicked: {0}")]
    Panicked(String),

    #[error("candidate wrote {count} element(s) past the end of the output buffer, first at offset {first_offset}")]
    OutOfBoundsWrite { count: usize, first_offset: usize },
}

impl ExecutionError {
    pub fn rejected<M>(shape: MatmulShape, msg: M) -> Self
    where
        M: Into<String>,
    {
        ExecutionError::Rejected { shape, msg: msg.into() }
    }
}
