use crate::error::Error;
use crate::util::{wrap_cl_error, Result};
use matfuzz::dtype::DTypeFloat;
use matfuzz::tensor::{Dim2, Dims, ITensor};
use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::event::Event;
use opencl3::memory::{Buffer, CL_MEM_READ_WRITE};
use opencl3::types::{cl_double, cl_float, CL_BLOCKING};
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::mem;
use std::ptr;

/// Element types with a matching OpenCL `real` typedef
///
/// # Safety
/// The type must have the same layout as the OpenCL scalar with `BITS` bits.
pub unsafe trait OclFloat: DTypeFloat {
    const BITS: usize;
}
unsafe impl OclFloat for cl_float {
    const BITS: usize = 32;
}
unsafe impl OclFloat for cl_double {
    const BITS: usize = 64;
}

/// Dense row-major matrix in device memory.
///
/// The buffer may extend `guard` elements past the matrix. That region holds sentinel values
/// so that writes past the end of the matrix can be detected after a kernel ran.
pub struct OclTensor<T: OclFloat> {
    buffer: Buffer<T>,
    dims: Dim2,
    guard: usize,
    dependency: RefCell<Option<Event>>,
}

impl<T: OclFloat> ITensor<Dim2> for OclTensor<T> {
    #[inline]
    fn len(&self) -> usize {
        self.dims.tensor_len()
    }
    #[inline]
    fn dims(&self) -> &Dim2 {
        &self.dims
    }
}

impl<T: OclFloat> OclTensor<T> {
    /// # Safety
    /// The buffer contents are undefined until written.
    pub unsafe fn uninit(context: &Context, dims: Dim2, guard: usize) -> Result<Self> {
        let capacity = dims.tensor_len() + guard;
        if capacity == 0 {
            return Err(Error::ValidationError(format!("cannot allocate an empty device buffer for {dims}")));
        }
        let buffer = wrap_cl_error!(
            unsafe { Buffer::<T>::create(context, CL_MEM_READ_WRITE, capacity, ptr::null_mut()) },
            "Failed to create buffer of {capacity} elements"
        )?;
        Ok(OclTensor {
            buffer,
            dims,
            guard,
            dependency: RefCell::new(None),
        })
    }

    pub fn from_slice(context: &Context, queue: &CommandQueue, slice: &[T], dims: Dim2) -> Result<Self> {
        assert_eq!(slice.len(), dims.tensor_len());
        let mut tensor = unsafe { Self::uninit(context, dims, 0)? };
        tensor.write_sync(queue, slice)?;
        Ok(tensor)
    }

    /// Uploads `slice` followed by `guard` copies of `sentinel`.
    pub fn with_guard(
        context: &Context,
        queue: &CommandQueue,
        slice: &[T],
        dims: Dim2,
        guard: usize,
        sentinel: T,
    ) -> Result<Self> {
        assert_eq!(slice.len(), dims.tensor_len());
        let mut tensor = unsafe { Self::uninit(context, dims, guard)? };
        let mut host = Vec::with_capacity(slice.len() + guard);
        host.extend_from_slice(slice);
        host.resize(slice.len() + guard, sentinel);
        tensor.write_raw(queue, 0, &host)?;
        Ok(tensor)
    }

    #[inline]
    pub fn guard_len(&self) -> usize {
        self.guard
    }

    /// Waits for the last command that writes this tensor.
    pub fn sync(&self) -> Result<()> {
        if let Some(evt) = self.dependency.borrow_mut().take() {
            wrap_cl_error!(evt.wait(), "Failed to wait for buffer dependency event")?;
        }
        Ok(())
    }

    pub fn set_dependency(&self, evt: Event) {
        self.dependency.replace(Some(evt));
    }

    fn write_raw(&mut self, queue: &CommandQueue, offset: usize, src: &[T]) -> Result<()> {
        self.sync()?;
        let byte_offset = offset * mem::size_of::<T>();
        wrap_cl_error!(
            unsafe { queue.enqueue_write_buffer(&mut self.buffer, CL_BLOCKING, byte_offset, src, &[]) },
            "Failed to enqueue buffer write"
        )?;
        Ok(())
    }

    fn read_raw(&self, queue: &CommandQueue, offset: usize, dst: &mut [T]) -> Result<()> {
        self.sync()?;
        let byte_offset = offset * mem::size_of::<T>();
        wrap_cl_error!(
            unsafe { queue.enqueue_read_buffer(&self.buffer, CL_BLOCKING, byte_offset, dst, &[]) },
            "Failed to enqueue buffer read"
        )?;
        Ok(())
    }

    pub fn write_sync(&mut self, queue: &CommandQueue, src: &[T]) -> Result<()> {
        assert_eq!(self.len(), src.len());
        self.write_raw(queue, 0, src)
    }

    pub fn read_sync(&self, queue: &CommandQueue, dst: &mut [T]) -> Result<()> {
        assert_eq!(self.len(), dst.len());
        self.read_raw(queue, 0, dst)
    }

    /// Reads back the guard region past the matrix
    pub fn read_guard(&self, queue: &CommandQueue) -> Result<Vec<T>> {
        let mut guard = vec![T::ZERO; self.guard];
        if self.guard > 0 {
            self.read_raw(queue, self.len(), &mut guard)?;
        }
        Ok(guard)
    }

    #[inline]
    pub fn buffer(&self) -> &Buffer<T> {
        &self.buffer
    }
}

impl<T: OclFloat> Debug for OclTensor<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OclTensor dtype={} dims={} guard={}",
            std::any::type_name::<T>(),
            self.dims,
            self.guard
        )
    }
}
