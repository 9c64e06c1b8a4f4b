use crate::backend::MatmulShape;
use crate::dtype::DTypeFloat;
use crate::error::InputError;
use crate::fuzz::case::{CaseKind, TestCase};
use crate::fuzz::config::{FuzzConfig, ValueDistribution};
use crate::tensor::Tensor2;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Bernoulli, Normal};
use std::marker::PhantomData;

#[derive(Clone, Debug)]
enum ValueDist {
    Uniform(Uniform<f64>),
    Normal(Normal<f64>),
}

/// Samples matrix elements: a symmetric value distribution with a Bernoulli mask that
/// forces exact zeros.
#[derive(Clone, Debug)]
pub struct ValueSampler {
    values: ValueDist,
    zero: Bernoulli,
}

impl ValueSampler {
    pub fn new(values: ValueDistribution, zero_probability: f64) -> Result<Self, InputError> {
        let values = match values {
            ValueDistribution::Uniform { bound } => {
                if !(bound.is_finite() && bound > 0.0) {
                    return Err(InputError::InvalidDistribution(format!(
                        "uniform bound must be finite and positive, got {bound}"
                    )));
                }
                ValueDist::Uniform(Uniform::new_inclusive(-bound, bound))
            }
            ValueDistribution::Normal { std_dev } => {
                if !(std_dev.is_finite() && std_dev > 0.0) {
                    return Err(InputError::InvalidDistribution(format!(
                        "normal std_dev must be finite and positive, got {std_dev}"
                    )));
                }
                let normal = Normal::new(0.0, std_dev)
                    .map_err(|err| InputError::InvalidDistribution(err.to_string()))?;
                ValueDist::Normal(normal)
            }
        };
        let zero =
            Bernoulli::new(zero_probability).map_err(|_| InputError::InvalidZeroProbability(zero_probability))?;
        Ok(ValueSampler { values, zero })
    }

    pub fn from_config(config: &FuzzConfig) -> Result<Self, InputError> {
        Self::new(config.values, config.zero_probability)
    }
}

impl<T: DTypeFloat> Distribution<T> for ValueSampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        if self.zero.sample(rng) {
            return T::ZERO;
        }
        let value = match &self.values {
            ValueDist::Uniform(dist) => dist.sample(rng),
            ValueDist::Normal(dist) => dist.sample(rng),
        };
        T::from_f64(value)
    }
}

/// Builds the case at `index` from its own seed. The shape draws always come first so
/// that a case's dimensions do not depend on the element type.
fn build_case<T: DTypeFloat>(
    sampler: &ValueSampler,
    max_size: usize,
    index: usize,
    kind: CaseKind,
    seed: u64,
) -> TestCase<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    let shape = match kind {
        CaseKind::Unit => MatmulShape::cube(1),
        CaseKind::MaxCube => MatmulShape::cube(max_size),
        CaseKind::ZeroLhs | CaseKind::Random => MatmulShape::new(
            rng.gen_range(1..=max_size),
            rng.gen_range(1..=max_size),
            rng.gen_range(1..=max_size),
        ),
    };
    let a = match kind {
        CaseKind::ZeroLhs => Tensor2::zeroed(shape.a_dims()),
        _ => Tensor2::from_distribution(&mut rng, sampler, shape.a_dims()),
    };
    let b = Tensor2::from_distribution(&mut rng, sampler, shape.b_dims());
    tracing::trace!(index, seed, %kind, %shape, "generated case");
    TestCase {
        index,
        seed,
        kind,
        shape,
        a,
        b,
    }
}

/// Yields the cases of a run in order.
///
/// A master RNG seeded with the run seed draws one seed per case, and each case is built
/// from its own RNG. The same run seed always yields the same sequence.
pub struct CaseGenerator<T> {
    master: StdRng,
    sampler: ValueSampler,
    max_size: usize,
    num_tests: usize,
    next_index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DTypeFloat> CaseGenerator<T> {
    pub fn new(config: &FuzzConfig) -> Result<Self, InputError> {
        config.validate_for::<T>()?;
        let sampler = ValueSampler::from_config(config)?;
        Ok(Self::with_sampler(config, sampler))
    }

    /// Generator for an already validated config
    pub(crate) fn with_sampler(config: &FuzzConfig, sampler: ValueSampler) -> Self {
        CaseGenerator {
            master: StdRng::seed_from_u64(config.seed),
            sampler,
            max_size: config.max_size,
            num_tests: config.num_tests,
            next_index: 0,
            _marker: PhantomData,
        }
    }
}

impl<T: DTypeFloat> Iterator for CaseGenerator<T> {
    type Item = TestCase<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.num_tests {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        let seed = self.master.next_u64();
        Some(build_case(&self.sampler, self.max_size, index, CaseKind::for_index(index), seed))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.num_tests - self.next_index;
        (remaining, Some(remaining))
    }
}

impl<T: DTypeFloat> ExactSizeIterator for CaseGenerator<T> {}

/// Generates a single random case with the default value distribution.
pub fn generate<T: DTypeFloat>(max_size: usize, seed: u64) -> Result<TestCase<T>, InputError> {
    if max_size == 0 {
        return Err(InputError::ZeroMaxSize);
    }
    let config = FuzzConfig::default();
    let sampler = ValueSampler::from_config(&config)?;
    Ok(build_case(&sampler, max_size, 0, CaseKind::Random, seed))
}

/// Regenerates case `index` of the run described by `config`, without generating the
/// cases before it.
pub fn replay_case<T: DTypeFloat>(config: &FuzzConfig, index: usize) -> Result<TestCase<T>, InputError> {
    config.validate_for::<T>()?;
    let sampler = ValueSampler::from_config(config)?;
    let mut master = StdRng::seed_from_u64(config.seed);
    for _ in 0..index {
        master.next_u64();
    }
    let seed = master.next_u64();
    Ok(build_case(&sampler, config.max_size, index, CaseKind::for_index(index), seed))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tensor::ITensor;

    fn config(num_tests: usize, max_size: usize, seed: u64) -> FuzzConfig {
        FuzzConfig {
            seed,
            ..FuzzConfig::with_limits(num_tests, max_size)
        }
    }

    #[test]
    fn test_boundary_cases_first() {
        let cases: Vec<TestCase<f32>> = CaseGenerator::new(&config(5, 7, 1)).unwrap().collect();
        assert_eq!(cases.len(), 5);
        assert_eq!(cases[0].kind, CaseKind::Unit);
        assert_eq!(cases[0].shape, MatmulShape::cube(1));
        assert_eq!(cases[1].kind, CaseKind::MaxCube);
        assert_eq!(cases[1].shape, MatmulShape::cube(7));
        assert_eq!(cases[2].kind, CaseKind::ZeroLhs);
        assert!(cases[2].a().iter().all(|&x| x == 0.0));
        assert!(cases[3..].iter().all(|c| c.kind == CaseKind::Random));
    }

    #[test]
    fn test_shapes_and_values_in_range() {
        for case in CaseGenerator::<f64>::new(&config(200, 9, 2)).unwrap() {
            let MatmulShape { m, n, p } = case.shape;
            for dim in [m, n, p] {
                assert!((1..=9).contains(&dim), "{case}");
            }
            assert_eq!(case.a.len(), m * n);
            assert_eq!(case.b.len(), n * p);
            assert_eq!(case.a.dims(), &case.shape.a_dims());
            assert!(case.a().iter().chain(case.b()).all(|x| x.abs() <= 100.0));
        }
    }

    #[test]
    fn test_non_square_shapes_appear() {
        let non_square = CaseGenerator::<f32>::new(&config(50, 16, 3))
            .unwrap()
            .filter(|c| c.shape.m != c.shape.n || c.shape.n != c.shape.p)
            .count();
        assert!(non_square > 0);
    }

    #[test]
    fn test_same_seed_same_cases() {
        let lhs: Vec<TestCase<f32>> = CaseGenerator::new(&config(20, 12, 42)).unwrap().collect();
        let rhs: Vec<TestCase<f32>> = CaseGenerator::new(&config(20, 12, 42)).unwrap().collect();
        for (l, r) in lhs.iter().zip(&rhs) {
            assert_eq!(l.seed, r.seed);
            assert_eq!(l.shape, r.shape);
            assert_eq!(l.a, r.a);
            assert_eq!(l.b, r.b);
        }
        let other: Vec<TestCase<f32>> = CaseGenerator::new(&config(20, 12, 43)).unwrap().collect();
        assert!(lhs.iter().zip(&other).any(|(l, o)| l.seed != o.seed));
    }

    #[test]
    fn test_replay() {
        let config = config(30, 10, 99);
        let cases: Vec<TestCase<f64>> = CaseGenerator::new(&config).unwrap().collect();
        for index in [0, 2, 17, 29] {
            let replayed: TestCase<f64> = replay_case(&config, index).unwrap();
            assert_eq!(replayed.seed, cases[index].seed);
            assert_eq!(replayed.kind, cases[index].kind);
            assert_eq!(replayed.shape, cases[index].shape);
            assert_eq!(replayed.a, cases[index].a);
            assert_eq!(replayed.b, cases[index].b);
        }
    }

    #[test]
    fn test_zero_probability() {
        let mut config = config(10, 8, 5);
        config.zero_probability = 1.0;
        for case in CaseGenerator::<f32>::new(&config).unwrap() {
            assert!(case.a().iter().chain(case.b()).all(|&x| x == 0.0));
        }
        config.zero_probability = 0.0;
        let case = CaseGenerator::<f32>::new(&config).unwrap().nth(1).unwrap();
        assert!(case.b().iter().all(|&x| x != 0.0));
    }

    #[test]
    fn test_normal_values() {
        let mut config = config(10, 8, 6);
        config.values = ValueDistribution::Normal { std_dev: 1.0 };
        let case = CaseGenerator::<f64>::new(&config).unwrap().nth(1).unwrap();
        let mean = case.b().iter().sum::<f64>() / case.b().len() as f64;
        assert!(mean.abs() < 1.0);
    }

    #[test]
    fn test_generate() {
        let case: TestCase<f32> = generate(4, 11).unwrap();
        assert_eq!(case.kind, CaseKind::Random);
        assert!(case.shape.m <= 4 && case.shape.n <= 4 && case.shape.p <= 4);
        let again: TestCase<f32> = generate(4, 11).unwrap();
        assert_eq!(case.a, again.a);
        assert_eq!(generate::<f32>(0, 11).unwrap_err(), InputError::ZeroMaxSize);
    }

    #[test]
    fn test_invalid_sampler() {
        assert!(matches!(
            ValueSampler::new(ValueDistribution::Uniform { bound: 0.0 }, 0.1),
            Err(InputError::InvalidDistribution(_))
        ));
        assert_eq!(
            ValueSampler::new(ValueDistribution::Uniform { bound: 1.0 }, -0.1).unwrap_err(),
            InputError::InvalidZeroProbability(-0.1)
        );
    }
}
