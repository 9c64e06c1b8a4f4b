use super::math::DTypeOps;
use crate::backend::{ExecutionTarget, MatmulShape, MatrixMultiplication};
use crate::dtype::DTypeFloat;
use crate::error::ExecutionError;
use std::fmt::{Debug, Formatter, Write};
use std::marker::PhantomData;

/// Known-good host candidate backed by `matrixmultiply`'s blocked gemm
pub struct CpuBackend<DT: DTypeOps> {
    _marker: PhantomData<DT>,
}

impl<DT: DTypeOps> CpuBackend<DT> {
    pub fn new() -> Self {
        CpuBackend { _marker: PhantomData }
    }
}

impl<DT: DTypeOps> Default for CpuBackend<DT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<DT: DTypeOps> MatrixMultiplication for CpuBackend<DT> {
    type DType = DT;

    #[inline]
    fn target(&self) -> ExecutionTarget {
        ExecutionTarget::Host
    }

    fn matmul(&self, a: &[DT], b: &[DT], c: &mut [DT], shape: MatmulShape) -> Result<(), ExecutionError> {
        shape.check_buffers(a, b, c)?;
        DT::matrix_multiply(shape, a, b, c);
        Ok(())
    }
}

impl<DT: DTypeOps> Debug for CpuBackend<DT> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("CpuBackend<")?;
        f.write_str(std::any::type_name::<DT>())?;
        f.write_char('>')
    }
}

/// Adapts a plain host function `f(a, b, c, m, n, p)` into a candidate.
pub struct HostFn<T, F> {
    name: String,
    f: F,
    _marker: PhantomData<fn(T)>,
}

impl<T, F> HostFn<T, F>
where
    T: DTypeFloat,
    F: Fn(&[T], &[T], &mut [T], usize, usize, usize),
{
    pub fn new<N: Into<String>>(name: N, f: F) -> Self {
        HostFn {
            name: name.into(),
            f,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T, F> MatrixMultiplication for HostFn<T, F>
where
    T: DTypeFloat,
    F: Fn(&[T], &[T], &mut [T], usize, usize, usize),
{
    type DType = T;

    #[inline]
    fn target(&self) -> ExecutionTarget {
        ExecutionTarget::Host
    }

    fn matmul(&self, a: &[T], b: &[T], c: &mut [T], shape: MatmulShape) -> Result<(), ExecutionError> {
        shape.check_buffers(a, b, c)?;
        (self.f)(a, b, c, shape.m, shape.n, shape.p);
        Ok(())
    }
}

impl<T, F> Debug for HostFn<T, F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "HostFn({}, {})", self.name, std::any::type_name::<T>())
    }
}
