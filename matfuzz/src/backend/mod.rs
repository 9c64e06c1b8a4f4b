use crate::dtype::DTypeFloat;
use crate::error::ExecutionError;
use crate::tensor::Dim2;
use std::fmt::{Debug, Display, Formatter};

mod cpu;

pub use cpu::*;

/// Dimensions of a product `C = A * B` where A is `m x n`, B is `n x p` and C is `m x p`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MatmulShape {
    pub m: usize,
    pub n: usize,
    pub p: usize,
}

impl MatmulShape {
    #[inline]
    pub const fn new(m: usize, n: usize, p: usize) -> Self {
        MatmulShape { m, n, p }
    }
    #[inline]
    pub const fn cube(size: usize) -> Self {
        MatmulShape { m: size, n: size, p: size }
    }
    #[inline]
    pub fn a_dims(&self) -> Dim2 {
        Dim2(self.m, self.n)
    }
    #[inline]
    pub fn b_dims(&self) -> Dim2 {
        Dim2(self.n, self.p)
    }
    #[inline]
    pub fn c_dims(&self) -> Dim2 {
        Dim2(self.m, self.p)
    }

    /// Checks that the buffers handed to a candidate match this shape.
    pub fn check_buffers<T>(&self, a: &[T], b: &[T], c: &[T]) -> Result<(), ExecutionError> {
        if a.len() != self.m * self.n || b.len() != self.n * self.p || c.len() != self.m * self.p {
            return Err(ExecutionError::rejected(
                *self,
                format!("buffer lengths a={} b={} c={} do not match", a.len(), b.len(), c.len()),
            ));
        }
        Ok(())
    }
}

impl Display for MatmulShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "M={} N={} P={}", self.m, self.n, self.p)
    }
}

/// Where a candidate executes
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExecutionTarget {
    Host,
    Device(String),
}

impl Display for ExecutionTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionTarget::Host => f.write_str("host"),
            ExecutionTarget::Device(name) => write!(f, "device({name})"),
        }
    }
}

/// A matrix multiplication implementation under test.
///
/// `a`, `b` and `c` are dense row-major buffers of `m*n`, `n*p` and `m*p` elements. The
/// call must not return before every element of `c` has been written, which means device
/// implementations own the transfers and must synchronize before returning.
pub trait MatrixMultiplication: Debug {
    type DType: DTypeFloat;

    fn target(&self) -> ExecutionTarget;

    fn matmul(
        &self,
        a: &[Self::DType],
        b: &[Self::DType],
        c: &mut [Self::DType],
        shape: MatmulShape,
    ) -> Result<(), ExecutionError>;
}

impl<M: MatrixMultiplication + ?Sized> MatrixMultiplication for &M {
    type DType = M::DType;

    #[inline]
    fn target(&self) -> ExecutionTarget {
        (**self).target()
    }

    #[inline]
    fn matmul(
        &self,
        a: &[Self::DType],
        b: &[Self::DType],
        c: &mut [Self::DType],
        shape: MatmulShape,
    ) -> Result<(), ExecutionError> {
        (**self).matmul(a, b, c, shape)
    }
}
