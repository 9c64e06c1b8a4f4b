use crate::dtype::DTypeFloat;
use crate::error::ExecutionError;
use crate::fuzz::case::TestCase;
use crate::fuzz::compare::ComparisonResult;
use std::fmt::{Display, Formatter};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Outcome {
    AllPassed,
    Failed,
}

/// Why a case failed. Execution errors and numeric problems are never merged.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Failure<T> {
    /// The candidate did not produce a product
    Execution(ExecutionError),
    /// Finite candidate values outside the tolerance
    NumericMismatch(ComparisonResult<T>),
    /// The candidate produced NaN or infinite values
    InvalidNumericResult(ComparisonResult<T>),
    /// The reference product did not fit the element type, so the case proves nothing
    /// about the candidate
    ReferenceOverflow(ComparisonResult<T>),
}

impl<T> Failure<T> {
    pub fn comparison(&self) -> Option<&ComparisonResult<T>> {
        match self {
            Failure::Execution(_) => None,
            Failure::NumericMismatch(result)
            | Failure::InvalidNumericResult(result)
            | Failure::ReferenceOverflow(result) => Some(result),
        }
    }
}

impl<T: DTypeFloat> Display for Failure<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Execution(err) => write!(f, "execution error: {err}"),
            Failure::NumericMismatch(result) => write!(f, "numeric mismatch: {result}"),
            Failure::InvalidNumericResult(result) => write!(f, "invalid numeric result: {result}"),
            Failure::ReferenceOverflow(result) => write!(
                f,
                "reference overflow (harness input range too wide for the dtype): {result}"
            ),
        }
    }
}

/// A failing case, retained with its inputs so it can be inspected or replayed
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CaseFailure<T> {
    pub case: TestCase<T>,
    pub failure: Failure<T>,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FuzzRunSummary<T> {
    pub candidate: String,
    pub dtype: &'static str,
    pub seed: u64,
    pub planned: usize,
    pub executed: usize,
    pub passed: usize,
    pub failed: usize,
    pub execution_errors: usize,
    pub numeric_mismatches: usize,
    pub invalid_numeric: usize,
    /// Cases whose reference overflowed; these do not implicate the candidate
    pub reference_overflows: usize,
    /// Largest finite deviation seen in any compared case, passing ones included
    pub max_abs_diff: f64,
    /// First failures of the run, bounded by the configured limit
    pub failures: Vec<CaseFailure<T>>,
    /// Failures counted but not retained because the list was full
    pub truncated_failures: usize,
    pub halted_early: bool,
}

impl<T: DTypeFloat> FuzzRunSummary<T> {
    pub fn new(candidate: String, seed: u64, planned: usize) -> Self {
        FuzzRunSummary {
            candidate,
            dtype: std::any::type_name::<T>(),
            seed,
            planned,
            executed: 0,
            passed: 0,
            failed: 0,
            execution_errors: 0,
            numeric_mismatches: 0,
            invalid_numeric: 0,
            reference_overflows: 0,
            max_abs_diff: 0.0,
            failures: Vec::new(),
            truncated_failures: 0,
            halted_early: false,
        }
    }

    pub fn outcome(&self) -> Outcome {
        if self.failed == 0 {
            Outcome::AllPassed
        } else {
            Outcome::Failed
        }
    }

    #[inline]
    pub fn all_passed(&self) -> bool {
        self.outcome() == Outcome::AllPassed
    }

    pub(crate) fn record_pass(&mut self, comparison: &ComparisonResult<T>) {
        self.executed += 1;
        self.passed += 1;
        self.track_diff(comparison);
    }

    pub(crate) fn record_failure(&mut self, case: TestCase<T>, failure: Failure<T>, max_recorded: usize) {
        self.executed += 1;
        self.failed += 1;
        match &failure {
            Failure::Execution(_) => self.execution_errors += 1,
            Failure::NumericMismatch(result) => {
                self.numeric_mismatches += 1;
                self.track_diff(result);
            }
            Failure::InvalidNumericResult(result) => {
                self.invalid_numeric += 1;
                self.track_diff(result);
            }
            Failure::ReferenceOverflow(_) => self.reference_overflows += 1,
        }
        if self.failures.len() < max_recorded {
            self.failures.push(CaseFailure { case, failure });
        } else {
            self.truncated_failures += 1;
        }
    }

    fn track_diff(&mut self, comparison: &ComparisonResult<T>) {
        if comparison.max_abs_diff > self.max_abs_diff {
            self.max_abs_diff = comparison.max_abs_diff;
        }
    }
}

#[cfg(feature = "serde")]
impl<T: DTypeFloat + serde::Serialize> FuzzRunSummary<T> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl<T: DTypeFloat> Display for FuzzRunSummary<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let verdict = match self.outcome() {
            Outcome::AllPassed => "PASSED",
            Outcome::Failed => "FAILED",
        };
        writeln!(
            f,
            "{verdict}: {} of {} executed case(s) passed ({} planned, candidate {}, dtype {}, seed {:#x})",
            self.passed, self.executed, self.planned, self.candidate, self.dtype, self.seed
        )?;
        write!(
            f,
            "  execution errors: {}, numeric mismatches: {}, invalid numeric results: {}, max abs diff: {:e}",
            self.execution_errors, self.numeric_mismatches, self.invalid_numeric, self.max_abs_diff
        )?;
        if self.reference_overflows > 0 {
            write!(
                f,
                "\n  reference overflows: {} (inputs too large for {})",
                self.reference_overflows, self.dtype
            )?;
        }
        if self.halted_early {
            write!(f, "\n  halted after the first failure")?;
        }
        for CaseFailure { case, failure } in &self.failures {
            write!(f, "\n  {case}: {failure}")?;
        }
        if self.truncated_failures > 0 {
            write!(f, "\n  ...({} more failure(s) not recorded)", self.truncated_failures)?;
        }
        Ok(())
    }
}
