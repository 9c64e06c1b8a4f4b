pub mod backend;
pub mod dtype;
pub mod error;
pub mod fuzz;
pub mod tensor;
pub mod util;

pub use error::{ExecutionError, InputError};
pub use fuzz::{fuzz_test_matrix_multiplication, run_fuzz};
