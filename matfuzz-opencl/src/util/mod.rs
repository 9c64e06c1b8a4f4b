use crate::error::Error;
use opencl3::command_queue::{CommandQueue, CL_QUEUE_PROFILING_ENABLE};
use opencl3::context::Context;
use opencl3::device::{get_all_devices, Device, CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_GPU};
use opencl3::kernel::Kernel;
use opencl3::program::Program;
use opencl3::types::cl_device_type;

pub type Result<T> = std::result::Result<T, Error>;

#[inline]
pub(crate) const fn next_multiple(n: usize, of: usize) -> usize {
    let rem = n % of;
    if rem == 0 {
        n
    } else {
        n + (of - rem)
    }
}

#[inline]
pub(crate) const fn is_power_of_two(value: usize) -> bool {
    value != 0 && (value & (value - 1)) == 0
}

macro_rules! format_c_defines {
    ($($key:expr => $val:expr),* $(,)?) => {
        format!(concat!($("#define ", $key, " {}\n" ,)*), $( $val ,)*)
    };
}
pub(crate) use format_c_defines;

macro_rules! wrap_cl_error {
    ($res: expr, $($arg:tt)*) => {
        ($res).map_err(|err| $crate::error::Error::from_cl_err(err, format!($($arg)*)))
    }
}
pub(crate) use wrap_cl_error;

macro_rules! validate {
    ($cond: expr, $($arg:tt)*) => {
        if !($cond) {
            return Err($crate::error::Error::ValidationError(format!($($arg)*)));
        }
    };
}
pub(crate) use validate;

fn first_device(device_type: cl_device_type) -> Option<Device> {
    match get_all_devices(device_type) {
        Ok(ids) => ids.first().map(|&id| Device::new(id)),
        Err(err) => {
            tracing::debug!("failed to enumerate OpenCL devices of type {device_type:#x}: {err}");
            None
        }
    }
}

/// First GPU, or the first device of any type when there is no GPU
pub fn get_default_device() -> Result<Device> {
    first_device(CL_DEVICE_TYPE_GPU)
        .or_else(|| first_device(CL_DEVICE_TYPE_ALL))
        .ok_or(Error::NoDevicesFound)
}

pub fn get_device_name(device: &Device) -> Result<String> {
    wrap_cl_error!(device.name(), "Failed to query device name")
}

pub fn get_context(device: &Device) -> Result<Context> {
    wrap_cl_error!(Context::from_device(device), "Failed to get context")
}

pub fn create_program(context: &Context, source: &str, options: &str) -> Result<Program> {
    Program::create_and_build_from_source(context, source, options).map_err(Error::CreateProgramError)
}

pub fn create_kernel(program: &Program, name: &str) -> Result<Kernel> {
    wrap_cl_error!(Kernel::create(program, name), "Failed to create kernel: {name}")
}

/// In-order queue, so a blocking read also waits for every kernel enqueued before it
pub fn create_queue(context: &Context) -> Result<CommandQueue> {
    #[allow(deprecated)]
    let queue = CommandQueue::create_default(context, CL_QUEUE_PROFILING_ENABLE);
    wrap_cl_error!(queue, "Failed to create command queue")
}

#[cfg(test)]
#[allow(unused)]
pub struct TestContext {
    pub device: Device,
    pub context: Context,
    pub queue: CommandQueue,
}

#[cfg(test)]
pub fn create_test_context() -> Result<TestContext> {
    let device = get_default_device()?;
    let context = get_context(&device)?;
    let queue = create_queue(&context)?;
    Ok(TestContext { device, context, queue })
}

/// Unwraps a [`TestContext`], or returns `Ok(())` from the enclosing test when the host has
/// no OpenCL device.
#[cfg(test)]
macro_rules! test_context_or_skip {
    () => {
        match $crate::util::create_test_context() {
            Ok(ctx) => ctx,
            Err($crate::error::Error::NoDevicesFound) => {
                eprintln!("no OpenCL device available, skipping");
                return Ok(());
            }
            Err(err) => return Err(err),
        }
    };
}
#[cfg(test)]
pub(crate) use test_context_or_skip;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_format_defines() {
        assert_eq!("#define FOO 1\n", format_c_defines!("FOO"=>1));
        assert_eq!("#define FOO 1\n#define BAR 2\n", format_c_defines!("FOO"=>1, "BAR"=>2));
        assert_eq!(
            "#define FOO 4\n#define BAR bar\n",
            format_c_defines!("FOO"=>1+3, "BAR"=>"bar")
        );
    }

    #[test]
    fn test_next_multiple() {
        assert_eq!(next_multiple(0, 16), 0);
        assert_eq!(next_multiple(1, 16), 16);
        assert_eq!(next_multiple(16, 16), 16);
        assert_eq!(next_multiple(17, 8), 24);
    }

    #[test]
    fn test_is_power_of_two() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(16));
        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(12));
    }

    fn check_validate(value: usize) -> Result<usize> {
        validate!(value < 4, "value {value} too large");
        Ok(value)
    }

    #[test]
    fn test_validate() {
        assert_eq!(check_validate(3).unwrap(), 3);
        assert_eq!(check_validate(7).unwrap_err().to_string(), "value 7 too large");
    }
}
