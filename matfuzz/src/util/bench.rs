//! Fixtures shared by the benches of the workspace crates.

use crate::fuzz::FuzzConfig;
use crate::tensor::{Dim2, Tensor2};
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::StandardNormal;

pub const SIZE_LG: usize = 256;
pub const SIZE_MD: usize = 64;
pub const SIZE_SM: usize = 16;
const SEED: u64 = 0x8371943;

/// Two square operands with standard normal entries
pub fn get_square_matrices<T>(size: usize) -> [Tensor2<T>; 2]
where
    StandardNormal: Distribution<T>,
{
    let mut rng = StdRng::seed_from_u64(SEED);
    [
        Tensor2::from_distribution(&mut rng, StandardNormal, Dim2(size, size)),
        Tensor2::from_distribution(&mut rng, StandardNormal, Dim2(size, size)),
    ]
}

/// Short fixed-seed run, so successive bench iterations fuzz the same cases
pub fn bench_config(max_size: usize) -> FuzzConfig {
    FuzzConfig {
        seed: SEED,
        ..FuzzConfig::with_limits(16, max_size)
    }
}
