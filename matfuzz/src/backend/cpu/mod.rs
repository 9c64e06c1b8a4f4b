mod backend;
mod math;

pub use backend::*;
pub use math::{naive_matmul, DTypeOps};
