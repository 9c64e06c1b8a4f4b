pub mod matmul;

pub use matmul::MatmulKernel;
