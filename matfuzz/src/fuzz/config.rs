use crate::fuzz::compare::Tolerance;
use crate::dtype::DTypeFloat;
use crate::error::InputError;
use derive_builder::Builder;

/// Seed used when a run does not ask for a specific one
pub const DEFAULT_SEED: u64 = 0x8371943;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FailurePolicy {
    /// Keep going and collect a full failure census
    Continue,
    /// Stop at the first failing case
    FailFast,
}

/// Initial contents of the output buffer handed to a candidate
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum OutputInit {
    Zero,
    /// NaN everywhere, so elements the candidate never writes show up as non-finite
    Poison,
}

/// Distribution of matrix element values, always centered on zero
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ValueDistribution {
    Uniform { bound: f64 },
    Normal { std_dev: f64 },
}

impl ValueDistribution {
    /// Typical largest element magnitude, used to derive default tolerances
    pub fn magnitude(&self) -> f64 {
        match *self {
            ValueDistribution::Uniform { bound } => bound,
            ValueDistribution::Normal { std_dev } => 4.0 * std_dev,
        }
    }
}

#[derive(Builder, Clone, Debug, PartialEq)]
#[builder(default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FuzzConfig {
    pub num_tests: usize,
    pub max_size: usize,
    pub seed: u64,
    pub failure_policy: FailurePolicy,
    /// Upper bound on failing cases kept in the summary; counts are never truncated
    pub max_recorded_failures: usize,
    /// Upper bound on offending elements recorded per failing case
    pub max_reported_mismatches: usize,
    pub values: ValueDistribution,
    pub zero_probability: f64,
    /// Base tolerance before size scaling. `None` derives one from the element type.
    #[builder(setter(strip_option))]
    pub tolerance: Option<Tolerance>,
    pub output_init: OutputInit,
    /// Log the matrices of failing cases at debug level
    pub dump_failing_matrices: bool,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        FuzzConfig {
            num_tests: 100,
            max_size: 64,
            seed: DEFAULT_SEED,
            failure_policy: FailurePolicy::Continue,
            max_recorded_failures: 16,
            max_reported_mismatches: 10,
            values: ValueDistribution::Uniform { bound: 100.0 },
            zero_probability: 0.02,
            tolerance: None,
            output_init: OutputInit::Zero,
            dump_failing_matrices: false,
        }
    }
}

impl FuzzConfig {
    pub fn builder() -> FuzzConfigBuilder {
        FuzzConfigBuilder::default()
    }

    /// Default configuration with the two arguments of the classic harness entry point
    pub fn with_limits(num_tests: usize, max_size: usize) -> Self {
        FuzzConfig {
            num_tests,
            max_size,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if self.num_tests == 0 {
            return Err(InputError::ZeroTests);
        }
        if self.max_size == 0 {
            return Err(InputError::ZeroMaxSize);
        }
        let param = match self.values {
            ValueDistribution::Uniform { bound } => bound,
            ValueDistribution::Normal { std_dev } => std_dev,
        };
        if !(param.is_finite() && param > 0.0) {
            return Err(InputError::InvalidDistribution(format!(
                "{:?} needs a finite positive parameter",
                self.values
            )));
        }
        if !(0.0..=1.0).contains(&self.zero_probability) {
            return Err(InputError::InvalidZeroProbability(self.zero_probability));
        }
        if let Some(tolerance) = &self.tolerance {
            tolerance.validate()?;
        }
        Ok(())
    }

    /// [`FuzzConfig::validate`], plus a check that every product the run can generate is
    /// finite in `T`. A dot product of `max_size` terms is bounded by `max_size * magnitude^2`.
    pub fn validate_for<T: DTypeFloat>(&self) -> Result<(), InputError> {
        self.validate()?;
        let magnitude = self.values.magnitude();
        let bound = self.max_size as f64 * magnitude * magnitude;
        if bound > T::max_value().as_f64() {
            return Err(InputError::Unrepresentable {
                dtype: std::any::type_name::<T>(),
                magnitude,
                max_size: self.max_size,
                bound,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = FuzzConfig::builder().num_tests(5).max_size(3).build().unwrap();
        assert_eq!(config.num_tests, 5);
        assert_eq!(config.max_size, 3);
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.tolerance, None);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_builder_tolerance() {
        let config = FuzzConfig::builder()
            .tolerance(Tolerance::new(1e-3, 1e-5))
            .build()
            .unwrap();
        assert_eq!(config.tolerance, Some(Tolerance::new(1e-3, 1e-5)));
    }

    #[test]
    fn test_validate() {
        assert_eq!(FuzzConfig::with_limits(0, 4).validate(), Err(InputError::ZeroTests));
        assert_eq!(FuzzConfig::with_limits(4, 0).validate(), Err(InputError::ZeroMaxSize));

        let mut config = FuzzConfig::with_limits(1, 1);
        config.zero_probability = 1.5;
        assert_eq!(config.validate(), Err(InputError::InvalidZeroProbability(1.5)));

        let mut config = FuzzConfig::with_limits(1, 1);
        config.values = ValueDistribution::Normal { std_dev: f64::NAN };
        assert!(matches!(config.validate(), Err(InputError::InvalidDistribution(_))));

        let mut config = FuzzConfig::with_limits(1, 1);
        config.tolerance = Some(Tolerance::new(-1.0, 0.0));
        assert!(matches!(config.validate(), Err(InputError::InvalidTolerance { .. })));
    }

    #[test]
    fn test_validate_for_rejects_overflowing_products() {
        let config = FuzzConfig {
            values: ValueDistribution::Uniform { bound: 1e20 },
            ..FuzzConfig::with_limits(5, 64)
        };
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.validate_for::<f64>(), Ok(()));
        match config.validate_for::<f32>() {
            Err(InputError::Unrepresentable { dtype, max_size, bound, .. }) => {
                assert_eq!(dtype, "f32");
                assert_eq!(max_size, 64);
                assert_eq!(bound, 64.0 * 1e20 * 1e20);
            }
            other => panic!("expected an unrepresentable config, got {other:?}"),
        }
        assert_eq!(FuzzConfig::default().validate_for::<f32>(), Ok(()));
    }

    #[cfg(feature = "half")]
    #[test]
    fn test_validate_for_half() {
        use half::f16;
        // 64 * 100^2 is far past f16::MAX = 65504
        assert!(matches!(
            FuzzConfig::default().validate_for::<f16>(),
            Err(InputError::Unrepresentable { .. })
        ));
        let config = FuzzConfig {
            values: ValueDistribution::Uniform { bound: 4.0 },
            ..FuzzConfig::with_limits(10, 16)
        };
        assert_eq!(config.validate_for::<f16>(), Ok(()));
    }
}
