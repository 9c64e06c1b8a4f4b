pub mod backend;
pub mod error;
pub mod kernels;
pub mod tensor;
pub mod util;
