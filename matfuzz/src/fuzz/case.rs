use crate::backend::MatmulShape;
use crate::dtype::DTypeFloat;
use crate::tensor::{format_matrix, Tensor2};
use std::fmt::{Display, Formatter};

/// How a case's shape and values were chosen
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CaseKind {
    /// `M = N = P = 1`
    Unit,
    /// `M = N = P = max_size`
    MaxCube,
    /// Random shape with an all-zero left operand
    ZeroLhs,
    Random,
}

impl CaseKind {
    /// Kind of the case at `index` within a run. The boundary cases come first.
    pub fn for_index(index: usize) -> Self {
        match index {
            0 => CaseKind::Unit,
            1 => CaseKind::MaxCube,
            2 => CaseKind::ZeroLhs,
            _ => CaseKind::Random,
        }
    }
}

impl Display for CaseKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CaseKind::Unit => "unit",
            CaseKind::MaxCube => "max-cube",
            CaseKind::ZeroLhs => "zero-lhs",
            CaseKind::Random => "random",
        })
    }
}

/// One generated multiplication problem. Immutable once produced.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TestCase<T> {
    pub index: usize,
    /// Seed of the case's own RNG; regenerates the case independently of the run
    pub seed: u64,
    pub kind: CaseKind,
    pub shape: MatmulShape,
    pub a: Tensor2<T>,
    pub b: Tensor2<T>,
}

impl<T: DTypeFloat> TestCase<T> {
    #[inline]
    pub fn a(&self) -> &[T] {
        self.a.as_ref()
    }

    #[inline]
    pub fn b(&self) -> &[T] {
        self.b.as_ref()
    }

    pub fn format_inputs(&self) -> String {
        let MatmulShape { m, n, p } = self.shape;
        format!(
            "A = {}\nB = {}",
            format_matrix(self.a(), m, n),
            format_matrix(self.b(), n, p)
        )
    }
}

impl<T> Display for TestCase<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "case #{} ({}, {}, seed={:#x})",
            self.index, self.kind, self.shape, self.seed
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tensor;

    #[test]
    fn test_kind_for_index() {
        assert_eq!(CaseKind::for_index(0), CaseKind::Unit);
        assert_eq!(CaseKind::for_index(1), CaseKind::MaxCube);
        assert_eq!(CaseKind::for_index(2), CaseKind::ZeroLhs);
        assert_eq!(CaseKind::for_index(3), CaseKind::Random);
        assert_eq!(CaseKind::for_index(1000), CaseKind::Random);
    }

    #[test]
    fn test_display() {
        let case = TestCase {
            index: 4,
            seed: 255,
            kind: CaseKind::Random,
            shape: MatmulShape::new(1, 2, 1),
            a: tensor![[1.0f32, 2.0]],
            b: tensor![[3.0f32], [4.0]],
        };
        assert_eq!(case.to_string(), "case #4 (random, M=1 N=2 P=1, seed=0xff)");
        assert_eq!(
            case.format_inputs(),
            "A = [\n   [1.0, 2.0]\n]\nB = [\n   [3.0],\n   [4.0]\n]"
        );
    }
}
