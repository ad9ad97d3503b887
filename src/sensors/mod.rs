pub mod i2c_sensor;
#[cfg(feature = "s1133")]
pub mod s1133;
#[cfg(feature = "sht25")]
pub mod sht25;
