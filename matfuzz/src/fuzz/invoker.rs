use crate::backend::MatrixMultiplication;
use crate::dtype::DType;
use crate::error::ExecutionError;
use crate::fuzz::case::TestCase;
use crate::fuzz::config::OutputInit;
use crate::tensor::Tensor2;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Runs the candidate on a case, isolating it from the harness.
///
/// Every invocation gets a freshly allocated output buffer. A panic inside the candidate
/// is caught and reported as [`ExecutionError::Panicked`] instead of unwinding through the
/// run.
#[derive(Debug)]
pub struct CandidateInvoker<M> {
    candidate: M,
    output_init: OutputInit,
}

impl<M: MatrixMultiplication> CandidateInvoker<M> {
    pub fn new(candidate: M, output_init: OutputInit) -> Self {
        CandidateInvoker { candidate, output_init }
    }

    #[inline]
    pub fn candidate(&self) -> &M {
        &self.candidate
    }

    #[inline]
    pub fn output_init(&self) -> OutputInit {
        self.output_init
    }

    fn fill_value(&self) -> M::DType {
        match self.output_init {
            OutputInit::Zero => <M::DType as DType>::ZERO,
            OutputInit::Poison => <M::DType as num_traits::Float>::nan(),
        }
    }

    pub fn invoke(&self, case: &TestCase<M::DType>) -> Result<Tensor2<M::DType>, ExecutionError> {
        let dims = case.shape.c_dims();
        let mut c = Tensor2::try_filled(self.fill_value(), dims).map_err(|err| ExecutionError::Allocation {
            len: case.shape.m.saturating_mul(case.shape.p),
            msg: err.to_string(),
        })?;
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.candidate.matmul(case.a(), case.b(), c.as_mut(), case.shape)
        }));
        match result {
            Ok(Ok(())) => Ok(c),
            Ok(Err(err)) => Err(err),
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                tracing::warn!(case = case.index, "candidate panicked: {msg}");
                Err(ExecutionError::Panicked(msg))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "<non-string panic payload>".to_owned()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::{naive_matmul, CpuBackend, HostFn, MatmulShape};
    use crate::fuzz::case::CaseKind;
    use crate::fuzz::reference::reference_matmul;
    use crate::tensor;

    fn case() -> TestCase<f64> {
        TestCase {
            index: 0,
            seed: 0,
            kind: CaseKind::Random,
            shape: MatmulShape::new(2, 2, 1),
            a: tensor![[1.0, 2.0], [3.0, 4.0]],
            b: tensor![[5.0], [6.0]],
        }
    }

    fn does_nothing(_a: &[f64], _b: &[f64], _c: &mut [f64], _m: usize, _n: usize, _p: usize) {}

    #[test]
    fn test_invoke_cpu() {
        let invoker = CandidateInvoker::new(CpuBackend::<f64>::new(), OutputInit::Zero);
        let case = case();
        let c = invoker.invoke(&case).unwrap();
        assert_eq!(c, reference_matmul(&case.a, &case.b));
        let c = invoker.invoke(&case).unwrap();
        assert_eq!(c.as_ref(), &[17.0, 39.0]);
    }

    #[test]
    fn test_output_init() {
        let invoker = CandidateInvoker::new(HostFn::new("noop", does_nothing), OutputInit::Zero);
        assert_eq!(invoker.invoke(&case()).unwrap().as_ref(), &[0.0, 0.0]);
        let invoker = CandidateInvoker::new(HostFn::new("noop", does_nothing), OutputInit::Poison);
        assert!(invoker.invoke(&case()).unwrap().as_ref().iter().all(|x| x.is_nan()));
    }

    #[test]
    fn test_panic_is_isolated() {
        let overrun = HostFn::new("overrun", |a: &[f64], b: &[f64], c: &mut [f64], m, n, p| {
            naive_matmul(a, b, c, m, n, p);
            c[m * p] = 1.0;
        });
        let invoker = CandidateInvoker::new(overrun, OutputInit::Zero);
        match invoker.invoke(&case()) {
            Err(ExecutionError::Panicked(msg)) => assert!(msg.contains("index out of bounds"), "{msg}"),
            other => panic!("expected a panic report, got {other:?}"),
        }
    }

    #[test]
    fn test_panic_message() {
        let invoker = CandidateInvoker::new(
            HostFn::new("boom", |_: &[f64], _: &[f64], _: &mut [f64], m: usize, _, _| {
                panic!("bad row count {m}")
            }),
            OutputInit::Zero,
        );
        assert_eq!(
            invoker.invoke(&case()).unwrap_err(),
            ExecutionError::Panicked("bad row count 2".to_owned())
        );
    }
}
