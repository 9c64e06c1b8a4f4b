use crate::error::Error;
use crate::kernels::matmul::constants::DEFAULT_TILE_SIZE;
use crate::kernels::MatmulKernel;
use crate::tensor::{OclFloat, OclTensor};
use crate::util;
use crate::util::Result;
use matfuzz::backend::{ExecutionTarget, MatmulShape, MatrixMultiplication};
use matfuzz::dtype::DType;
use matfuzz::ExecutionError;
use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::device::Device;

/// Elements of sentinel values placed after the output matrix by default
pub const DEFAULT_GUARD_LEN: usize = 64;
const GUARD_SENTINEL: f64 = -1.234_567e30;

/// Which kernel an [`OpenCLBackend`] runs
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KernelSource {
    Naive,
    Tiled(usize),
    /// User-supplied OpenCL C source and the name of its entry point
    Custom { source: String, name: String },
}

impl Default for KernelSource {
    fn default() -> Self {
        KernelSource::Tiled(DEFAULT_TILE_SIZE)
    }
}

/// Device candidate: uploads the operands, runs one matmul kernel and reads the product back.
///
/// Every call blocks until the product is on the host. The output buffer is followed by a
/// guard region of sentinel values; a kernel that overwrites any of them fails the call with
/// [`ExecutionError::OutOfBoundsWrite`].
#[derive(Debug)]
pub struct OpenCLBackend<T: OclFloat> {
    #[allow(unused)]
    device: Device,
    device_name: String,
    context: Context,
    queue: CommandQueue,
    kernel: MatmulKernel<T>,
    guard_len: usize,
}

impl<T: OclFloat> OpenCLBackend<T> {
    pub fn from_default_device(kernel: KernelSource) -> Result<Self> {
        Self::from_device(util::get_default_device()?, kernel)
    }

    /// Candidate running a user-supplied kernel on the default device
    pub fn from_source(source: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        Self::from_default_device(KernelSource::Custom {
            source: source.into(),
            name: name.into(),
        })
    }

    pub fn from_device(device: Device, kernel: KernelSource) -> Result<Self> {
        let device_name = util::get_device_name(&device)?;
        let context = util::get_context(&device)?;
        let queue = util::create_queue(&context)?;
        let kernel = match kernel {
            KernelSource::Naive => MatmulKernel::naive(&context)?,
            KernelSource::Tiled(tile_size) => MatmulKernel::tiled(&context, tile_size)?,
            KernelSource::Custom { source, name } => MatmulKernel::from_source(&context, &source, &name)?,
        };
        tracing::info!(device = %device_name, kernel = kernel.name(), "created OpenCL backend");
        Ok(OpenCLBackend {
            device,
            device_name,
            context,
            queue,
            kernel,
            guard_len: DEFAULT_GUARD_LEN,
        })
    }

    /// Sets the number of sentinel elements placed after the output
    pub fn with_guard_len(mut self, guard_len: usize) -> Self {
        self.guard_len = guard_len;
        self
    }

    fn run(&self, a: &[T], b: &[T], c: &mut [T], shape: MatmulShape) -> std::result::Result<(), ExecutionError> {
        let sentinel = T::from_f64(GUARD_SENTINEL);
        let a_ocl = OclTensor::from_slice(&self.context, &self.queue, a, shape.a_dims())?;
        let b_ocl = OclTensor::from_slice(&self.context, &self.queue, b, shape.b_dims())?;
        // the output starts from the host contents, so the caller's initial fill reaches the device
        let mut c_ocl =
            OclTensor::with_guard(&self.context, &self.queue, c, shape.c_dims(), self.guard_len, sentinel)?;
        self.kernel.enqueue(&self.queue, &a_ocl, &b_ocl, &mut c_ocl, shape)?;
        c_ocl.read_sync(&self.queue, c)?;
        let guard = c_ocl.read_guard(&self.queue)?;
        check_guard(&guard, sentinel)
    }
}

fn check_guard<T: DType>(guard: &[T], sentinel: T) -> std::result::Result<(), ExecutionError> {
    let mut changed = guard.iter().enumerate().filter(|&(_, &x)| x != sentinel).map(|(i, _)| i);
    match changed.next() {
        None => Ok(()),
        Some(first) => Err(ExecutionError::OutOfBoundsWrite {
            count: 1 + changed.count(),
            first_offset: first,
        }),
    }
}

impl<T: OclFloat> MatrixMultiplication for OpenCLBackend<T> {
    type DType = T;

    fn target(&self) -> ExecutionTarget {
        ExecutionTarget::Device(self.device_name.clone())
    }

    fn matmul(&self, a: &[T], b: &[T], c: &mut [T], shape: MatmulShape) -> std::result::Result<(), ExecutionError> {
        shape.check_buffers(a, b, c)?;
        if shape.m == 0 || shape.p == 0 {
            return Ok(());
        }
        if shape.n == 0 {
            c.fill(T::ZERO);
            return Ok(());
        }
        self.run(a, b, c, shape).inspect_err(|err| {
            tracing::debug!(device = %self.device_name, kernel = self.kernel.name(), %shape, "kernel failed: {err}");
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use matfuzz::fuzz::{fuzz_test_matrix_multiplication, run_fuzz, Failure, FuzzConfig, Outcome};

    fn backend_or_skip(kernel: KernelSource) -> Result<Option<OpenCLBackend<f32>>> {
        match OpenCLBackend::from_default_device(kernel) {
            Ok(backend) => Ok(Some(backend)),
            Err(Error::NoDevicesFound) => {
                eprintln!("no OpenCL device available, skipping");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    #[test]
    fn test_check_guard() {
        assert_eq!(check_guard(&[1.0f32; 4], 1.0), Ok(()));
        assert_eq!(
            check_guard(&[1.0f32, 2.0, 1.0, 3.0], 1.0),
            Err(ExecutionError::OutOfBoundsWrite { count: 2, first_offset: 1 })
        );
    }

    #[test]
    fn test_bundled_kernels_pass() -> Result<()> {
        for kernel in [KernelSource::Naive, KernelSource::Tiled(16), KernelSource::Tiled(8)] {
            let Some(backend) = backend_or_skip(kernel)? else { return Ok(()) };
            assert!(matches!(backend.target(), ExecutionTarget::Device(_)));
            let summary = fuzz_test_matrix_multiplication(&backend, 30, 48).unwrap();
            assert_eq!(summary.outcome(), Outcome::AllPassed, "{summary}");
        }
        Ok(())
    }

    #[test]
    fn test_out_of_bounds_write_detected() -> Result<()> {
        // the last row is written a second time, one row past the end of C
        let source = r#"
            __kernel void unchecked(__global const real* A, __global const real* B, __global real* C,
                                    const int M, const int N, const int P) {
                const int col = get_global_id(0);
                const int row = get_global_id(1);
                real acc = 0;
                for (int k = 0; k < N; k++) {
                    acc += A[row * N + k] * B[k * P + col];
                }
                C[row * P + col] = acc;
                if (row == M - 1) {
                    C[M * P + col] = acc;
                }
            }
        "#;
        let backend = match OpenCLBackend::<f32>::from_source(source, "unchecked") {
            Ok(backend) => backend,
            Err(Error::NoDevicesFound) => return Ok(()),
            Err(err) => return Err(err),
        };
        let summary = run_fuzz(&backend, FuzzConfig::with_limits(5, 8)).unwrap();
        assert_eq!(summary.failed, 5);
        assert_eq!(summary.execution_errors, 5);
        for failure in &summary.failures {
            match &failure.failure {
                Failure::Execution(ExecutionError::OutOfBoundsWrite { count, first_offset }) => {
                    assert_eq!(*count, failure.case.shape.p);
                    assert_eq!(*first_offset, 0);
                }
                other => panic!("expected an out of bounds write, got {other}"),
            }
        }
        Ok(())
    }

    #[test]
    fn test_single_element_overrun_with_short_guard() -> Result<()> {
        // writes exactly one element past the end of C
        let source = r#"
            __kernel void overrun(__global const real* A, __global const real* B, __global real* C,
                                  const int M, const int N, const int P) {
                const int col = get_global_id(0);
                const int row = get_global_id(1);
                real acc = 0;
                for (int k = 0; k < N; k++) {
                    acc += A[row * N + k] * B[k * P + col];
                }
                C[row * P + col] = acc;
                if (row == M - 1 && col == P - 1) {
                    C[M * P] = acc;
                }
            }
        "#;
        let backend = match OpenCLBackend::<f32>::from_source(source, "overrun") {
            Ok(backend) => backend.with_guard_len(1),
            Err(Error::NoDevicesFound) => return Ok(()),
            Err(err) => return Err(err),
        };
        let mut c = [0.0f32; 4];
        let err = backend
            .matmul(&[1.0; 4], &[1.0; 4], &mut c, MatmulShape::cube(2))
            .unwrap_err();
        assert_eq!(err, ExecutionError::OutOfBoundsWrite { count: 1, first_offset: 0 });
        assert_eq!(c, [2.0; 4]);
        Ok(())
    }
}
