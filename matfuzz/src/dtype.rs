use num_traits::{Float, Num, NumAssignOps};
use std::fmt::Debug;

pub trait DType: 'static + Sized + Copy + Debug + PartialOrd + Num + NumAssignOps {
    const ZERO: Self;
    fn from_f64(val: f64) -> Self;
}

/// Floating point element type that can be fuzzed.
///
/// `Accum` is the type the reference multiplier accumulates dot products in. It is never
/// narrower than `Self`, so rounding in the oracle does not hide candidate error.
pub trait DTypeFloat: DType + Float {
    type Accum: DTypeFloat;
    fn widen(self) -> Self::Accum;
    fn narrow(acc: Self::Accum) -> Self;
    fn as_f64(self) -> f64;
}

macro_rules! impl_dtype_float {
    ($ty:ty, $accum:ty) => {
        impl DType for $ty {
            const ZERO: Self = 0.0;
            #[inline]
            fn from_f64(val: f64) -> Self {
                val as $ty
            }
        }
        impl DTypeFloat for $ty {
            type Accum = $accum;
            #[inline]
            fn widen(self) -> $accum {
                self as $accum
            }
            #[inline]
            fn narrow(acc: $accum) -> Self {
                acc as $ty
            }
            #[inline]
            fn as_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_dtype_float!(f32, f64);
impl_dtype_float!(f64, f64);

#[cfg(feature = "half")]
mod f16_impl {
    use super::{DType, DTypeFloat};
    use half::f16;

    impl DType for f16 {
        const ZERO: Self = f16::ZERO;
        #[inline]
        fn from_f64(val: f64) -> Self {
            f16::from_f64(val)
        }
    }

    impl DTypeFloat for f16 {
        type Accum = f32;
        #[inline]
        fn widen(self) -> f32 {
            self.to_f32()
        }
        #[inline]
        fn narrow(acc: f32) -> Self {
            f16::from_f32(acc)
        }
        #[inline]
        fn as_f64(self) -> f64 {
            self.to_f64()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_accumulator_is_wider() {
        let x: f32 = 16_777_216.0; // 2^24, where f32 stops representing odd integers
        let mut acc = x.widen();
        acc += 1.0;
        assert_eq!(acc, 16_777_217.0);
        assert_eq!(f32::narrow(acc), 16_777_216.0);
    }

    #[test]
    fn test_constants() {
        assert_eq!(<f32 as DType>::ZERO, 0.0);
        assert_eq!(<f64 as DType>::from_f64(7.0), 7.0);
        assert_eq!(<f32 as DTypeFloat>::as_f64(0.5), 0.5);
    }

    #[cfg(feature = "half")]
    #[test]
    fn test_half_widens_to_f32() {
        use half::f16;
        let x = f16::from_f32(2048.0);
        assert_eq!(x + f16::from_f32(1.0), x);
        let mut acc: f32 = x.widen();
        acc += 1.0;
        assert_eq!(acc, 2049.0);
        assert_eq!(f16::narrow(acc), x);

        let big = f16::from_f32(60000.0).widen();
        assert_eq!(big + big, 120000.0);
        assert!(f16::narrow(big + big).is_infinite());
        assert_eq!(f16::from_f64(0.5).as_f64(), 0.5);
        assert_eq!(<f16 as DType>::ZERO, f16::ZERO);
    }
}
