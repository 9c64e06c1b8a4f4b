use crate::backend::MatmulShape;
use crate::dtype::{DType, DTypeFloat};

pub trait DTypeOps: DTypeFloat {
    /// Blocked gemm `c = a * b` on row-major buffers. The lengths must already match `shape`.
    fn matrix_multiply(shape: MatmulShape, a: &[Self], b: &[Self], c: &mut [Self]);
}

macro_rules! implement_dtype_ops {
    ($t: ident, $g: ident) => {
        impl DTypeOps for $t {
            fn matrix_multiply(shape: MatmulShape, a: &[Self], b: &[Self], c: &mut [Self]) {
                let MatmulShape { m, n, p } = shape;
                assert_eq!(a.len(), m * n);
                assert_eq!(b.len(), n * p);
                assert_eq!(c.len(), m * p);
                unsafe {
                    matrixmultiply::$g(
                        m,
                        n,
                        p,
                        1.0,
                        a.as_ptr(),
                        n as isize,
                        1,
                        b.as_ptr(),
                        p as isize,
                        1,
                        0.0,
                        c.as_mut_ptr(),
                        p as isize,
                        1,
                    );
                }
            }
        }
    };
}

implement_dtype_ops!(f32, sgemm);
implement_dtype_ops!(f64, dgemm);

/// Plain i-j-k loop accumulating in the element type itself.
///
/// This is what a typical hand-written CPU candidate looks like, and what the harness is
/// meant to check. It is deliberately not the reference: it accumulates in `T` rather
/// than in the wider `T::Accum`.
pub fn naive_matmul<T: DType>(a: &[T], b: &[T], c: &mut [T], m: usize, n: usize, p: usize) {
    for i in 0..m {
        for j in 0..p {
            let mut sum = T::ZERO;
            for k in 0..n {
                sum += a[i * n + k] * b[k * p + j];
            }
            c[i * p + j] = sum;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    const A: [f32; 6] = [1., 2., 3., 4., 5., 6.];
    const B: [f32; 6] = [7., 8., 9., 10., 11., 12.];

    #[test]
    fn test_mat_mul() {
        let mut c = [100.0f32; 4]; // existing values should be ignored
        f32::matrix_multiply(MatmulShape::new(2, 3, 2), &A, &B, &mut c);
        assert_abs_diff_eq!(&c[..], &[58., 64., 139., 154.][..], epsilon = f32::EPSILON);

        let mut c = [100.0f32; 9];
        f32::matrix_multiply(MatmulShape::new(3, 2, 3), &B, &A, &mut c);
        assert_abs_diff_eq!(
            &c[..],
            &[39., 54., 69., 49., 68., 87., 59., 82., 105.][..],
            epsilon = f32::EPSILON
        );
    }

    #[test]
    fn test_mat_mul_f64_vector_shapes() {
        let a = [1.0f64, -2.0, 0.5];
        let b = [4.0f64, 2.0, 8.0];
        let mut dot = [0.0f64; 1];
        f64::matrix_multiply(MatmulShape::new(1, 3, 1), &a, &b, &mut dot);
        assert_eq!(dot, [4.0]);

        let mut outer = [0.0f64; 9];
        f64::matrix_multiply(MatmulShape::new(3, 1, 3), &a, &b, &mut outer);
        assert_eq!(outer, [4.0, 2.0, 8.0, -8.0, -4.0, -16.0, 2.0, 1.0, 4.0]);
    }

    #[test]
    fn test_naive_matmul() {
        let mut c = [0.0f32; 4];
        naive_matmul(&A, &B, &mut c, 2, 3, 2);
        assert_eq!(c, [58., 64., 139., 154.]);
    }
}
