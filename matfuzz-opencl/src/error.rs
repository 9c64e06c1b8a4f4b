use matfuzz::ExecutionError;
use opencl3::error_codes::ClError;
use opencl3::types::cl_int;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("OpenCL error {code} ({code_str}){}", .msg.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    ClError {
        code: cl_int,
        code_str: String,
        msg: Option<String>,
    },

    #[error("failed to build program: {0}")]
    CreateProgramError(String),

    #[error("no OpenCL device found")]
    NoDevicesFound,

    #[error("{0}")]
    ValidationError(String),
}

impl Error {
    pub fn from_cl_err<M>(err: ClError, msg: M) -> Self
    where
        M: Into<String>,
    {
        Error::ClError {
            code: err.0,
            code_str: err.to_string(),
            msg: Some(msg.into()),
        }
    }
}

impl From<ClError> for Error {
    fn from(value: ClError) -> Self {
        Error::ClError {
            code: value.0,
            code_str: value.to_string(),
            msg: None,
        }
    }
}

impl From<Error> for ExecutionError {
    fn from(value: Error) -> Self {
        ExecutionError::Device(value.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::from_cl_err(ClError(-5), "Failed to enqueue kernel");
        assert_eq!(err.to_string(), "OpenCL error -5 (CL_OUT_OF_RESOURCES): Failed to enqueue kernel");
        let err: Error = ClError(-5).into();
        assert_eq!(err.to_string(), "OpenCL error -5 (CL_OUT_OF_RESOURCES)");
    }

    #[test]
    fn test_into_execution_error() {
        let err: ExecutionError = Error::NoDevicesFound.into();
        assert_eq!(err, ExecutionError::Device("no OpenCL device found".to_owned()));
    }
}
