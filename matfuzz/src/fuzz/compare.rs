//! Element-wise comparison of a candidate product against the reference.
//!
//! An element is accepted when `|expected - actual| <= abs + rel * |expected|`, evaluated
//! in `f64`. A non-finite candidate element is always rejected, whatever the tolerance.
//! Elements whose reference value is not finite say nothing about the candidate; they are
//! counted apart and never judged.

use crate::dtype::DTypeFloat;
use crate::error::InputError;
use crate::tensor::{Dim2, ITensor, Tensor2};
use std::fmt::{Display, Formatter};

/// How the absolute tolerance grows with the inner dimension `n`
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ToleranceScaling {
    Constant,
    /// Rounding errors of a length-`n` sum grow like a random walk
    Sqrt,
    /// Worst-case bound
    Linear,
}

impl ToleranceScaling {
    pub fn factor(&self, n: usize) -> f64 {
        let n = n.max(1) as f64;
        match self {
            ToleranceScaling::Constant => 1.0,
            ToleranceScaling::Sqrt => n.sqrt(),
            ToleranceScaling::Linear => n,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Tolerance {
    pub abs: f64,
    pub rel: f64,
    pub scaling: ToleranceScaling,
}

impl Tolerance {
    pub const fn new(abs: f64, rel: f64) -> Self {
        Tolerance {
            abs,
            rel,
            scaling: ToleranceScaling::Sqrt,
        }
    }

    pub const fn with_scaling(self, scaling: ToleranceScaling) -> Self {
        Tolerance { scaling, ..self }
    }

    /// Default tolerance for element type `T` when inputs are bounded by `magnitude`.
    ///
    /// A single product term is at most `magnitude^2`, so `abs` allows a few dozen ulps of
    /// one term; `rel` allows a few hundred ulps of the expected value.
    pub fn for_dtype<T: DTypeFloat>(magnitude: f64) -> Self {
        let eps = T::epsilon().as_f64();
        Tolerance::new(64.0 * eps * magnitude * magnitude, 256.0 * eps)
    }

    /// Tolerance for a product with inner dimension `n`. The result does not scale further.
    pub fn scaled_for(&self, n: usize) -> Self {
        Tolerance {
            abs: self.abs * self.scaling.factor(n),
            rel: self.rel,
            scaling: ToleranceScaling::Constant,
        }
    }

    #[inline]
    pub fn allowed(&self, expected: f64) -> f64 {
        self.abs + self.rel * expected.abs()
    }

    #[inline]
    pub fn accepts(&self, expected: f64, actual: f64) -> bool {
        actual.is_finite() && (expected - actual).abs() <= self.allowed(expected)
    }

    pub fn validate(&self) -> Result<(), InputError> {
        let valid = |x: f64| x.is_finite() && x >= 0.0;
        if valid(self.abs) && valid(self.rel) {
            Ok(())
        } else {
            Err(InputError::InvalidTolerance {
                abs: self.abs,
                rel: self.rel,
            })
        }
    }
}

impl Display for Tolerance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "abs={:e} rel={:e}", self.abs, self.rel)?;
        if self.scaling != ToleranceScaling::Constant {
            write!(f, " scaling={:?}", self.scaling)?;
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Verdict {
    Match,
    Mismatch,
}

/// One rejected element of the candidate product
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ElementMismatch<T> {
    pub row: usize,
    pub col: usize,
    pub expected: T,
    pub actual: T,
    pub abs_diff: f64,
    pub rel_diff: f64,
    pub allowed: f64,
    pub non_finite: bool,
}

impl<T: DTypeFloat> Display for ElementMismatch<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}): expected {:?}, got {:?}",
            self.row, self.col, self.expected, self.actual
        )?;
        if !self.non_finite {
            write!(
                f,
                " (abs diff {:e}, rel diff {:e}, allowed {:e})",
                self.abs_diff, self.rel_diff, self.allowed
            )?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ComparisonResult<T> {
    pub rows: usize,
    pub cols: usize,
    /// Effective tolerance, already scaled for the case
    pub tolerance: Tolerance,
    /// Offending elements in row-major order, at most `max_reported` of them
    pub mismatches: Vec<ElementMismatch<T>>,
    /// Exact number of rejected elements, non-finite ones included
    pub mismatch_count: usize,
    pub non_finite_count: usize,
    /// Largest absolute deviation over the finite candidate elements
    pub max_abs_diff: f64,
    pub first_non_finite: Option<ElementMismatch<T>>,
    /// Elements where the reference itself overflowed. The candidate is not judged there.
    pub reference_non_finite_count: usize,
}

impl<T> ComparisonResult<T> {
    pub fn verdict(&self) -> Verdict {
        if self.mismatch_count == 0 {
            Verdict::Match
        } else {
            Verdict::Mismatch
        }
    }

    #[inline]
    pub fn is_match(&self) -> bool {
        self.verdict() == Verdict::Match
    }

    #[inline]
    pub fn has_non_finite(&self) -> bool {
        self.non_finite_count > 0
    }

    /// Whether the reference product could be represented in the element type
    #[inline]
    pub fn reference_is_finite(&self) -> bool {
        self.reference_non_finite_count == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }
}

impl<T: DTypeFloat> Display for ComparisonResult<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} element(s) out of tolerance ({}), {} non-finite, max abs diff {:e}",
            self.mismatch_count,
            self.len(),
            self.tolerance,
            self.non_finite_count,
            self.max_abs_diff
        )?;
        for mismatch in &self.mismatches {
            write!(f, "\n    {mismatch}")?;
        }
        let hidden = self.mismatch_count - self.mismatches.len();
        if hidden > 0 {
            write!(f, "\n    ...({hidden} more)")?;
        }
        if self.reference_non_finite_count > 0 {
            write!(
                f,
                "\n    {} reference element(s) overflowed and were not compared",
                self.reference_non_finite_count
            )?;
        }
        if let Some(first) = &self.first_non_finite {
            if !self.mismatches.iter().any(|m| (m.row, m.col) == (first.row, first.col)) {
                write!(f, "\n    first non-finite {first}")?;
            }
        }
        Ok(())
    }
}

/// Compares `candidate` against `reference`, recording at most `max_reported` offending
/// elements. The counts are always exact.
pub fn compare<T: DTypeFloat>(
    reference: &Tensor2<T>,
    candidate: &Tensor2<T>,
    tolerance: &Tolerance,
    max_reported: usize,
) -> ComparisonResult<T> {
    assert_eq!(
        reference.dims(),
        candidate.dims(),
        "candidate dims {} do not match reference dims {}",
        candidate.dims(),
        reference.dims()
    );
    let &Dim2(rows, cols) = reference.dims();
    let mut result = ComparisonResult {
        rows,
        cols,
        tolerance: *tolerance,
        mismatches: Vec::new(),
        mismatch_count: 0,
        non_finite_count: 0,
        max_abs_diff: 0.0,
        first_non_finite: None,
        reference_non_finite_count: 0,
    };
    for (idx, (&expected, &actual)) in reference.into_iter().zip(candidate).enumerate() {
        let exp = expected.as_f64();
        let act = actual.as_f64();
        if !exp.is_finite() {
            result.reference_non_finite_count += 1;
            continue;
        }
        let non_finite = !act.is_finite();
        let abs_diff = (exp - act).abs();
        if !non_finite && abs_diff > result.max_abs_diff {
            result.max_abs_diff = abs_diff;
        }
        if !non_finite && tolerance.accepts(exp, act) {
            continue;
        }
        let rel_diff = if exp == 0.0 { f64::INFINITY } else { abs_diff / exp.abs() };
        let mismatch = ElementMismatch {
            row: idx / cols,
            col: idx % cols,
            expected,
            actual,
            abs_diff,
            rel_diff,
            allowed: tolerance.allowed(exp),
            non_finite,
        };
        result.mismatch_count += 1;
        if non_finite {
            result.non_finite_count += 1;
            if result.first_non_finite.is_none() {
                result.first_non_finite = Some(mismatch);
            }
        }
        if result.mismatches.len() < max_reported {
            result.mismatches.push(mismatch);
        }
    }
    result
}
