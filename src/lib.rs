pub mod dispatch;
pub mod error;
pub mod i2c;
pub mod sensors;

pub use error::SensorError;
