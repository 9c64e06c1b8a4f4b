mod dims;
mod native;

pub use dims::*;
pub use native::debug::format_matrix;
pub use native::owned::*;

/// Common interface of host and device tensors
pub trait ITensor<D> {
    fn len(&self) -> usize;
    fn dims(&self) -> &D;
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
