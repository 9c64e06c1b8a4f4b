use crate::backend::MatmulShape;
use crate::dtype::{DType, DTypeFloat};
use crate::tensor::{Dim2, ITensor, Tensor2};

/// Trusted product `C = A * B` of two dense row-major buffers.
///
/// Every dot product is accumulated in `T::Accum`, term by term in increasing `k`, with a
/// separate multiply and add. Nothing is blocked, reordered or fused, so the result is
/// bitwise reproducible and shares no rounding behaviour with an optimized candidate.
/// Zero-sized dimensions yield an empty or all-zero product.
pub fn reference<T: DTypeFloat>(a: &[T], b: &[T], shape: MatmulShape) -> Tensor2<T> {
    let MatmulShape { m, n, p } = shape;
    assert_eq!(a.len(), m * n, "lhs length does not match {shape}");
    assert_eq!(b.len(), n * p, "rhs length does not match {shape}");
    let mut c = Tensor2::filled(T::ZERO, shape.c_dims());
    if m == 0 || p == 0 {
        return c;
    }
    for (i, out_row) in c.as_mut().chunks_exact_mut(p).enumerate() {
        let a_row = &a[i * n..(i + 1) * n];
        for (j, out) in out_row.iter_mut().enumerate() {
            let mut acc = <T::Accum as DType>::ZERO;
            for (k, &a_ik) in a_row.iter().enumerate() {
                let term = a_ik.widen() * b[k * p + j].widen();
                acc += term;
            }
            *out = T::narrow(acc);
        }
    }
    c
}

/// Tensor form of [`reference`].
pub fn reference_matmul<T: DTypeFloat>(a: &Tensor2<T>, b: &Tensor2<T>) -> Tensor2<T> {
    let &Dim2(m, n) = a.dims();
    let &Dim2(n2, p) = b.dims();
    assert_eq!(n, n2, "inner dimensions differ: {} vs {}", a.dims(), b.dims());
    reference(a.as_ref(), b.as_ref(), MatmulShape::new(m, n, p))
}
