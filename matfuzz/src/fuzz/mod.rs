//! Randomized differential testing of matrix multiplication.
//!
//! A run draws cases from a seeded [`CaseGenerator`], computes the expected product with the
//! [`reference`](reference::reference) multiplier, invokes the candidate in isolation and
//! compares the two outputs element by element. Failing cases are kept, with their inputs,
//! in the [`FuzzRunSummary`].

pub mod case;
pub mod compare;
pub mod config;
pub mod driver;
pub mod generator;
pub mod invoker;
pub mod reference;
pub mod summary;

pub use case::{CaseKind, TestCase};
pub use compare::{compare, ComparisonResult, ElementMismatch, Tolerance, ToleranceScaling, Verdict};
pub use config::{FailurePolicy, FuzzConfig, FuzzConfigBuilder, OutputInit, ValueDistribution, DEFAULT_SEED};
pub use driver::{fuzz_test_matrix_multiplication, run_fuzz, FuzzDriver, RunState};
pub use generator::{generate, replay_case, CaseGenerator, ValueSampler};
pub use invoker::CandidateInvoker;
pub use reference::{reference, reference_matmul};
pub use summary::{CaseFailure, Failure, FuzzRunSummary, Outcome};
