//! Command line front end for the matmul fuzzer.
//!
//! ```bash
//! # 500 cases of the blocked host gemm with dimensions up to 128
//! matfuzz --candidate blocked --num-tests 500 --max-size 128
//!
//! # a kernel of your own, on the default OpenCL device
//! matfuzz --kernel-source my_gemm.cl --kernel-name my_gemm --poison-output
//! ```
//!
//! Exits with 0 when every case passes, 1 when any case fails and 2 when the run could not
//! be set up.

use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use matfuzz::backend::{naive_matmul, CpuBackend, DTypeOps, HostFn, MatrixMultiplication};
use matfuzz::dtype::DTypeFloat;
use matfuzz::fuzz::{
    run_fuzz, FailurePolicy, FuzzConfig, OutputInit, Tolerance, ToleranceScaling, ValueDistribution, DEFAULT_SEED,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "opencl")]
use matfuzz_opencl::{
    backend::{KernelSource, OpenCLBackend},
    tensor::OclFloat,
};

#[derive(Parser, Debug)]
#[command(name = "matfuzz")]
#[command(about = "Randomized differential testing of matrix multiplication implementations")]
#[command(version)]
struct Args {
    /// Number of cases to run
    #[arg(short = 'n', long, default_value_t = 100)]
    num_tests: usize,

    /// Largest value of any matrix dimension
    #[arg(short = 's', long, default_value_t = 64)]
    max_size: usize,

    /// Run seed, decimal or 0x-prefixed hex
    #[arg(long, value_parser = parse_seed, conflicts_with = "random_seed")]
    seed: Option<u64>,

    /// Draw a fresh run seed; it is printed with the report so failures can be replayed
    #[arg(long)]
    random_seed: bool,

    #[arg(long, value_enum, default_value_t = Candidate::Blocked)]
    candidate: Candidate,

    /// OpenCL C file holding a kernel with the signature (A, B, C, M, N, P)
    #[arg(long, conflicts_with = "candidate")]
    kernel_source: Option<PathBuf>,

    /// Entry point of --kernel-source
    #[arg(long, default_value = "matmul", requires = "kernel_source")]
    kernel_name: String,

    /// Tile size of the opencl-tiled candidate
    #[arg(long, default_value_t = 16)]
    tile_size: usize,

    #[arg(long, value_enum, default_value_t = Precision::F32)]
    dtype: Precision,

    /// Stop at the first failing case
    #[arg(long)]
    fail_fast: bool,

    /// Failing cases kept in the report; every failure is still counted
    #[arg(long, default_value_t = 16)]
    max_failures: usize,

    /// Fill the output with NaN before each call instead of zero
    #[arg(long)]
    poison_output: bool,

    #[arg(long, value_enum, default_value_t = Distribution::Uniform)]
    distribution: Distribution,

    /// Bound of the uniform distribution, or standard deviation of the normal one
    #[arg(long, default_value_t = 100.0)]
    scale: f64,

    /// Probability that an element is exactly zero
    #[arg(long, default_value_t = 0.02)]
    zero_probability: f64,

    /// Absolute tolerance, replacing the one derived from the dtype
    #[arg(long)]
    abs_tol: Option<f64>,

    /// Relative tolerance, replacing the one derived from the dtype
    #[arg(long)]
    rel_tol: Option<f64>,

    /// Growth of the absolute tolerance with the inner dimension
    #[arg(long, value_enum)]
    scaling: Option<Scaling>,

    /// Log the matrices of failing cases
    #[arg(long)]
    dump_failures: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// More logging, repeat for trace output
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Candidate {
    /// Textbook triple loop accumulating in the element type
    Naive,
    /// matrixmultiply's blocked gemm
    Blocked,
    OpenclNaive,
    OpenclTiled,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Precision {
    F32,
    F64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Distribution {
    Uniform,
    Normal,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Scaling {
    Constant,
    Sqrt,
    Linear,
}

impl From<Scaling> for ToleranceScaling {
    fn from(value: Scaling) -> Self {
        match value {
            Scaling::Constant => ToleranceScaling::Constant,
            Scaling::Sqrt => ToleranceScaling::Sqrt,
            Scaling::Linear => ToleranceScaling::Linear,
        }
    }
}

fn parse_seed(s: &str) -> std::result::Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|err| format!("invalid seed {s:?}: {err}"))
}

/// Element types the CLI can fuzz with every candidate it knows about
#[cfg(feature = "opencl")]
trait CliFloat: DTypeOps + OclFloat + Serialize {}
#[cfg(feature = "opencl")]
impl<T: DTypeOps + OclFloat + Serialize> CliFloat for T {}

#[cfg(not(feature = "opencl"))]
trait CliFloat: DTypeOps + Serialize {}
#[cfg(not(feature = "opencl"))]
impl<T: DTypeOps + Serialize> CliFloat for T {}

impl Args {
    fn seed(&self) -> u64 {
        if self.random_seed {
            rand::random()
        } else {
            self.seed.unwrap_or(DEFAULT_SEED)
        }
    }

    fn values(&self) -> ValueDistribution {
        match self.distribution {
            Distribution::Uniform => ValueDistribution::Uniform { bound: self.scale },
            Distribution::Normal => ValueDistribution::Normal { std_dev: self.scale },
        }
    }

    fn tolerance<T: DTypeFloat>(&self) -> Option<Tolerance> {
        let base = match (self.abs_tol, self.rel_tol, self.scaling) {
            (None, None, None) => return None,
            (None, None, Some(_)) => Tolerance::for_dtype::<T>(self.values().magnitude()),
            (abs, rel, _) => Tolerance::new(abs.unwrap_or(0.0), rel.unwrap_or(0.0)),
        };
        Some(match self.scaling {
            Some(scaling) => base.with_scaling(scaling.into()),
            None => base,
        })
    }

    fn config<T: DTypeFloat>(&self) -> Result<FuzzConfig> {
        let mut builder = FuzzConfig::builder();
        builder
            .num_tests(self.num_tests)
            .max_size(self.max_size)
            .seed(self.seed())
            .failure_policy(if self.fail_fast {
                FailurePolicy::FailFast
            } else {
                FailurePolicy::Continue
            })
            .max_recorded_failures(self.max_failures)
            .values(self.values())
            .zero_probability(self.zero_probability)
            .output_init(if self.poison_output {
                OutputInit::Poison
            } else {
                OutputInit::Zero
            })
            .dump_failing_matrices(self.dump_failures);
        if let Some(tolerance) = self.tolerance::<T>() {
            builder.tolerance(tolerance);
        }
        let config = builder.build().map_err(matfuzz::InputError::from)?;
        config.validate_for::<T>()?;
        Ok(config)
    }

    fn log_filter(&self) -> EnvFilter {
        let level = match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        if self.dump_failures {
            if let Ok(directive) = "matfuzz::fuzz::driver=debug".parse() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    }
}

/// Runs the fuzzer and prints the summary. Returns whether every case passed.
fn fuzz<M>(candidate: M, config: FuzzConfig, json: bool) -> Result<bool>
where
    M: MatrixMultiplication,
    M::DType: Serialize,
{
    let summary = run_fuzz(candidate, config)?;
    if json {
        println!("{}", summary.to_json()?);
    } else {
        println!("{summary}");
    }
    Ok(summary.all_passed())
}

#[cfg(feature = "opencl")]
fn fuzz_opencl<T: CliFloat>(args: &Args, config: FuzzConfig) -> Result<bool> {
    use anyhow::Context;
    let kernel = match (&args.kernel_source, args.candidate) {
        (Some(path), _) => KernelSource::Custom {
            source: std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
            name: args.kernel_name.clone(),
        },
        (None, Candidate::OpenclTiled) => KernelSource::Tiled(args.tile_size),
        (None, _) => KernelSource::Naive,
    };
    let backend = OpenCLBackend::<T>::from_default_device(kernel).context("setting up the OpenCL candidate")?;
    fuzz(backend, config, args.json)
}

#[cfg(not(feature = "opencl"))]
fn fuzz_opencl<T: CliFloat>(args: &Args, _config: FuzzConfig) -> Result<bool> {
    if let Some(path) = &args.kernel_source {
        anyhow::bail!("cannot run {}: matfuzz was built without the `opencl` feature", path.display());
    }
    anyhow::bail!("the {:?} candidate needs matfuzz built with the `opencl` feature", args.candidate)
}

fn run<T: CliFloat>(args: &Args) -> Result<bool> {
    let config = args.config::<T>()?;
    if args.kernel_source.is_some() {
        return fuzz_opencl::<T>(args, config);
    }
    match args.candidate {
        Candidate::Naive => fuzz(HostFn::new("naive", naive_matmul::<T>), config, args.json),
        Candidate::Blocked => fuzz(CpuBackend::<T>::new(), config, args.json),
        Candidate::OpenclNaive | Candidate::OpenclTiled => fuzz_opencl::<T>(args, config),
    }
}

fn execute(args: &Args) -> Result<bool> {
    match args.dtype {
        Precision::F32 => run::<f32>(args),
        Precision::F64 => run::<f64>(args),
    }
}

fn exit_status(result: &Result<bool>) -> u8 {
    match result {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(_) => 2,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(args.log_filter())
        .with_writer(std::io::stderr)
        .init();

    let result = execute(&args);
    if let Err(err) = &result {
        tracing::error!("{err:#}");
    }
    ExitCode::from(exit_status(&result))
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("matfuzz").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_match_library() {
        let args = parse(&[]);
        let config = args.config::<f32>().unwrap();
        assert_eq!(config, FuzzConfig::default());
        assert_eq!(args.candidate, Candidate::Blocked);
    }

    #[test]
    fn test_seed_formats() {
        assert_eq!(parse(&["--seed", "0xff"]).seed(), 255);
        assert_eq!(parse(&["--seed", "42"]).seed(), 42);
        assert!(Args::try_parse_from(["matfuzz", "--seed", "0xzz"]).is_err());
        assert!(Args::try_parse_from(["matfuzz", "--seed", "1", "--random-seed"]).is_err());
    }

    #[test]
    fn test_flags_reach_config() {
        let args = parse(&[
            "-n", "7", "-s", "3", "--fail-fast", "--poison-output", "--distribution", "normal", "--scale", "2.5",
            "--max-failures", "1", "--dump-failures",
        ]);
        let config = args.config::<f64>().unwrap();
        assert_eq!(config.num_tests, 7);
        assert_eq!(config.max_size, 3);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.output_init, OutputInit::Poison);
        assert_eq!(config.values, ValueDistribution::Normal { std_dev: 2.5 });
        assert_eq!(config.max_recorded_failures, 1);
        assert!(config.dump_failing_matrices);
    }

    #[test]
    fn test_tolerance_flags() {
        assert_eq!(parse(&[]).tolerance::<f32>(), None);
        assert_eq!(
            parse(&["--abs-tol", "0.5"]).tolerance::<f32>(),
            Some(Tolerance::new(0.5, 0.0))
        );
        assert_eq!(
            parse(&["--rel-tol", "1e-3", "--scaling", "linear"]).tolerance::<f32>(),
            Some(Tolerance::new(0.0, 1e-3).with_scaling(ToleranceScaling::Linear))
        );
        assert_eq!(
            parse(&["--scaling", "constant"]).tolerance::<f64>(),
            Some(Tolerance::for_dtype::<f64>(100.0).with_scaling(ToleranceScaling::Constant))
        );
    }

    #[test]
    fn test_invalid_config_is_error() {
        assert!(parse(&["--num-tests", "0"]).config::<f32>().is_err());
        assert!(parse(&["--zero-probability", "2"]).config::<f32>().is_err());
        assert!(parse(&["--abs-tol", "-1"]).config::<f32>().is_err());
    }

    #[test]
    fn test_kernel_name_requires_source() {
        assert!(Args::try_parse_from(["matfuzz", "--kernel-name", "gemm"]).is_err());
        assert!(Args::try_parse_from(["matfuzz", "--kernel-source", "a.cl", "--candidate", "naive"]).is_err());
    }

    #[test]
    fn test_exit_status() {
        let status = |args: &[&str]| exit_status(&execute(&parse(args)));
        assert_eq!(status(&["-n", "5", "-s", "8"]), 0);
        // naive f32 accumulation cannot match the wide reference exactly on a 64-cube
        assert_eq!(
            status(&["-n", "3", "-s", "64", "--candidate", "naive", "--abs-tol", "0", "--rel-tol", "0"]),
            1
        );
        assert_eq!(status(&["-n", "0"]), 2);
        // f32 cannot hold products of 64 terms of magnitude 1e20
        assert_eq!(status(&["-s", "64", "--scale", "1e20"]), 2);
        assert_eq!(status(&["-n", "2", "-s", "64", "--scale", "1e20", "--dtype", "f64"]), 0);
    }

    #[cfg(not(feature = "opencl"))]
    #[test]
    fn test_opencl_without_feature_is_setup_error() {
        let status = |args: &[&str]| exit_status(&execute(&parse(args)));
        assert_eq!(status(&["-n", "1", "--candidate", "opencl-naive"]), 2);
        assert_eq!(status(&["-n", "1", "--kernel-source", "gemm.cl"]), 2);
    }

    #[test]
    fn test_host_candidates_run() {
        assert!(run::<f32>(&parse(&["-n", "5", "-s", "8", "--candidate", "naive"])).unwrap());
        assert!(run::<f64>(&parse(&["-n", "5", "-s", "8", "--json"])).unwrap());
    }
}
