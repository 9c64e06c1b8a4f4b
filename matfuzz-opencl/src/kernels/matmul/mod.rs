
use crate::tensor::{OclFloat, OclTensor};
use crate::util::*;
use matfuzz::backend::MatmulShape;
use matfuzz::tensor::ITensor;
use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::program::Program;
use opencl3::types::cl_int;
use std::marker::PhantomData;

pub mod constants {
    pub const DEFAULT_TILE_SIZE: usize = 16;
    pub const MAX_TILE_SIZE: usize = 32;
}

/// A matrix multiplication kernel with the signature
/// `(__global const real* A, __global const real* B, __global real* C, int M, int N, int P)`.
///
/// Work item `(get_global_id(0), get_global_id(1))` is expected to compute element
/// `C[row][col]` at `(col, row)`. The `real` typedef from `types.cl` is available to every
/// program, including user-supplied ones.
#[derive(Debug)]
pub struct MatmulKernel<T: OclFloat> {
    #[allow(unused)]
    program: Program,
    kernel: Kernel,
    name: String,
    tile_size: Option<usize>,
    _marker: PhantomData<T>,
}

/// The kernels index every matrix with `int` arithmetic, so each element count must fit.
fn check_int_range(shape: MatmulShape) -> Result<()> {
    let MatmulShape { m, n, p } = shape;
    let max = cl_int::MAX as usize;
    let fits = |x: usize, y: usize| x.checked_mul(y).is_some_and(|len| len <= max);
    validate!(
        fits(m, n) && fits(n, p) && fits(m, p),
        "{shape} has more elements than the kernel's int indices can address"
    );
    Ok(())
}

fn check_work_group(tile_size: usize, max_group: usize) -> Result<()> {
    validate!(
        tile_size * tile_size <= max_group,
        "Tile size {tile_size} needs {} work items per group, the device allows {max_group}",
        tile_size * tile_size
    );
    Ok(())
}

fn program_source<T: OclFloat>(mut defines: String, body: &str) -> String {
    defines.push_str(include_str!("../types.cl"));
    defines.push('\n');
    defines.push_str(body);
    defines
}

impl<T: OclFloat> MatmulKernel<T> {
    pub fn naive(context: &Context) -> Result<Self> {
        let code = program_source::<T>(format_c_defines!("FLOAT_BITS" => T::BITS), include_str!("matmul.cl"));
        Self::build(context, &code, "matmul_naive", None)
    }

    pub fn tiled(context: &Context, tile_size: usize) -> Result<Self> {
        validate!(
            is_power_of_two(tile_size) && tile_size <= constants::MAX_TILE_SIZE,
            "Tile size must be a power of two no larger than {}, got {tile_size}",
            constants::MAX_TILE_SIZE
        );
        let code = program_source::<T>(
            format_c_defines!("FLOAT_BITS" => T::BITS, "TILE_SIZE" => tile_size),
            include_str!("matmul.cl"),
        );
        let kernel = Self::build(context, &code, "matmul_tiled", Some(tile_size))?;
        let max_group = wrap_cl_error!(
            kernel.kernel.get_work_group_size(context.default_device()),
            "Failed to query the work group size of {}",
            kernel.name
        )?;
        check_work_group(tile_size, max_group)?;
        Ok(kernel)
    }

    /// Builds the kernel `name` from user-supplied OpenCL C source.
    pub fn from_source(context: &Context, source: &str, name: &str) -> Result<Self> {
        let code = program_source::<T>(format_c_defines!("FLOAT_BITS" => T::BITS), source);
        Self::build(context, &code, name, None)
    }

    fn build(context: &Context, code: &str, name: &str, tile_size: Option<usize>) -> Result<Self> {
        let program = create_program(context, code, "")?;
        let kernel = create_kernel(&program, name)?;
        tracing::debug!(name, ?tile_size, bits = T::BITS, "built matmul kernel");
        Ok(MatmulKernel {
            program,
            kernel,
            name: name.to_owned(),
            tile_size,
            _marker: PhantomData,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn tile_size(&self) -> Option<usize> {
        self.tile_size
    }

    /// Enqueues `c = a * b`. The kernel event becomes the dependency of `c`.
    pub fn enqueue(
        &self,
        queue: &CommandQueue,
        a: &OclTensor<T>,
        b: &OclTensor<T>,
        c: &mut OclTensor<T>,
        shape: MatmulShape,
    ) -> Result<()> {
        let MatmulShape { m, n, p } = shape;
        validate!(a.dims() == &shape.a_dims(), "A has dims {}, expected {}", a.dims(), shape.a_dims());
        validate!(b.dims() == &shape.b_dims(), "B has dims {}, expected {}", b.dims(), shape.b_dims());
        validate!(c.dims() == &shape.c_dims(), "C has dims {}, expected {}", c.dims(), shape.c_dims());
        check_int_range(shape)?;

        let global = match self.tile_size {
            Some(tile) => [next_multiple(p, tile), next_multiple(m, tile)],
            None => [p, m],
        };
        let mut exec = ExecuteKernel::new(&self.kernel);
        unsafe {
            exec.set_arg(a.buffer()) // A
                .set_arg(b.buffer()) // B
                .set_arg(c.buffer()) // C
                .set_arg(&(m as cl_int)) // M
                .set_arg(&(n as cl_int)) // N
                .set_arg(&(p as cl_int)); // P
        }
        exec.set_global_work_sizes(&global);
        if let Some(tile) = self.tile_size {
            exec.set_local_work_sizes(&[tile, tile]);
        }
        let kernel_evt = wrap_cl_error!(
            unsafe { exec.enqueue_nd_range(queue) },
            "Failed to enqueue {} kernel",
            self.name
        )?;
        c.set_dependency(kernel_evt);
        Ok(())
    }
}
