pub mod debug;
pub mod owned;
#[cfg(feature = "approx")]
mod approx;
