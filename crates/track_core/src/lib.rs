pub mod backend;
pub mod clock;
pub mod context;
pub mod error;
pub mod geo;
pub mod params;
pub mod routing;
pub mod session;
pub mod simulator;
pub mod speed;
pub mod status;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
