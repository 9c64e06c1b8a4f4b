use crate::backend::MatrixMultiplication;
use crate::dtype::DTypeFloat;
use crate::error::InputError;
use crate::fuzz::case::TestCase;
use crate::fuzz::compare::{compare, ComparisonResult, Tolerance};
use crate::fuzz::config::{FailurePolicy, FuzzConfig};
use crate::fuzz::generator::{CaseGenerator, ValueSampler};
use crate::fuzz::invoker::CandidateInvoker;
use crate::fuzz::reference::reference_matmul;
use crate::fuzz::summary::{Failure, FuzzRunSummary};
use crate::tensor::{format_matrix, Tensor2};
use tracing::{debug, debug_span, info, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunState {
    Idle,
    Running { completed: usize },
    AllPassed,
    Failed,
}

struct Evaluation<T> {
    expected: Tensor2<T>,
    actual: Option<Tensor2<T>>,
    result: Result<ComparisonResult<T>, Failure<T>>,
}

/// Runs a candidate against the reference over the cases of one configuration.
#[derive(Debug)]
pub struct FuzzDriver<M: MatrixMultiplication> {
    config: FuzzConfig,
    sampler: ValueSampler,
    tolerance: Tolerance,
    invoker: CandidateInvoker<M>,
    state: RunState,
}

impl<M: MatrixMultiplication> FuzzDriver<M> {
    /// Validates `config`; nothing runs if it is rejected.
    pub fn new(config: FuzzConfig, candidate: M) -> Result<Self, InputError> {
        config.validate_for::<M::DType>()?;
        let sampler = ValueSampler::from_config(&config)?;
        let tolerance = config
            .tolerance
            .unwrap_or_else(|| Tolerance::for_dtype::<M::DType>(config.values.magnitude()));
        Ok(FuzzDriver {
            invoker: CandidateInvoker::new(candidate, config.output_init),
            config,
            sampler,
            tolerance,
            state: RunState::Idle,
        })
    }

    #[inline]
    pub fn config(&self) -> &FuzzConfig {
        &self.config
    }

    /// Base tolerance, before scaling by the inner dimension of a case
    #[inline]
    pub fn tolerance(&self) -> &Tolerance {
        &self.tolerance
    }

    #[inline]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[inline]
    pub fn candidate(&self) -> &M {
        self.invoker.candidate()
    }

    /// Runs the reference and the candidate on one case and compares the outputs.
    pub fn check_case(&self, case: &TestCase<M::DType>) -> Result<ComparisonResult<M::DType>, Failure<M::DType>> {
        self.evaluate(case).result
    }

    fn evaluate(&self, case: &TestCase<M::DType>) -> Evaluation<M::DType> {
        let expected = reference_matmul(&case.a, &case.b);
        let actual = match self.invoker.invoke(case) {
            Ok(actual) => actual,
            Err(err) => {
                return Evaluation {
                    expected,
                    actual: None,
                    result: Err(Failure::Execution(err)),
                };
            }
        };
        let tolerance = self.tolerance.scaled_for(case.shape.n);
        let comparison = compare(&expected, &actual, &tolerance, self.config.max_reported_mismatches);
        let result = if !comparison.reference_is_finite() {
            Err(Failure::ReferenceOverflow(comparison))
        } else if comparison.has_non_finite() {
            Err(Failure::InvalidNumericResult(comparison))
        } else if !comparison.is_match() {
            Err(Failure::NumericMismatch(comparison))
        } else {
            Ok(comparison)
        };
        Evaluation {
            expected,
            actual: Some(actual),
            result,
        }
    }

    pub fn run(&mut self) -> FuzzRunSummary<M::DType> {
        let config = &self.config;
        let candidate = format!("{:?}", self.invoker.candidate());
        let mut summary = FuzzRunSummary::new(candidate, config.seed, config.num_tests);
        info!(
            seed = config.seed,
            num_tests = config.num_tests,
            max_size = config.max_size,
            execution_target = %self.invoker.candidate().target(),
            tolerance = %self.tolerance,
            "starting fuzz run against {}",
            summary.candidate
        );
        self.state = RunState::Running { completed: 0 };

        let cases = CaseGenerator::<M::DType>::with_sampler(&self.config, self.sampler.clone());
        for case in cases {
            let span = debug_span!("case", index = case.index, kind = %case.kind, shape = %case.shape);
            let _enter = span.enter();
            let evaluation = self.evaluate(&case);
            match evaluation.result {
                Ok(comparison) => {
                    debug!(max_abs_diff = comparison.max_abs_diff, "passed");
                    summary.record_pass(&comparison);
                }
                Err(failure) => {
                    warn!("{case} failed: {failure}");
                    if self.config.dump_failing_matrices {
                        dump_matrices(&case, &evaluation.expected, evaluation.actual.as_ref());
                    }
                    summary.record_failure(case, failure, self.config.max_recorded_failures);
                }
            }
            self.state = RunState::Running {
                completed: summary.executed,
            };
            if summary.failed > 0 && self.config.failure_policy == FailurePolicy::FailFast {
                summary.halted_early = summary.executed < summary.planned;
                break;
            }
        }

        self.state = if summary.all_passed() {
            RunState::AllPassed
        } else {
            RunState::Failed
        };
        info!(
            executed = summary.executed,
            passed = summary.passed,
            failed = summary.failed,
            halted_early = summary.halted_early,
            "fuzz run finished"
        );
        summary
    }
}

fn dump_matrices<T: DTypeFloat>(case: &TestCase<T>, expected: &Tensor2<T>, actual: Option<&Tensor2<T>>) {
    debug!("{}", format_failure_dump(case, expected, actual));
}

fn format_failure_dump<T: DTypeFloat>(
    case: &TestCase<T>,
    expected: &Tensor2<T>,
    actual: Option<&Tensor2<T>>,
) -> String {
    let (m, p) = (case.shape.m, case.shape.p);
    let actual = match actual {
        Some(actual) => format_matrix(actual.as_ref(), m, p),
        None => "<no output>".to_owned(),
    };
    format!(
        "inputs of {case}:\n{}\nexpected = {}\nactual = {actual}",
        case.format_inputs(),
        format_matrix(expected.as_ref(), m, p)
    )
}

/// Fuzzes `candidate` with the given configuration.
pub fn run_fuzz<M: MatrixMultiplication>(
    candidate: M,
    config: FuzzConfig,
) -> Result<FuzzRunSummary<M::DType>, InputError> {
    let mut driver = FuzzDriver::new(config, candidate)?;
    Ok(driver.run())
}

/// Fuzzes `candidate` over `num_tests` cases with dimensions up to `max_size`, using the
/// default configuration for everything else.
///
/// Returns an [`InputError`] before running anything if either argument is zero. Failing
/// cases never abort the run; they are reported in the returned summary.
pub fn fuzz_test_matrix_multiplication<M: MatrixMultiplication>(
    candidate: M,
    num_tests: usize,
    max_size: usize,
) -> Result<FuzzRunSummary<M::DType>, InputError> {
    run_fuzz(candidate, FuzzConfig::with_limits(num_tests, max_size))
}
