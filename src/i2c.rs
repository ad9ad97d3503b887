use std::{fmt::Debug, io, path::PathBuf};

use embedded_hal::blocking::{
    delay::DelayMs,
    i2c::{Read, Write},
};
use linux_embedded_hal::{
    i2cdev::{
        core::I2CDevice,
        linux::{LinuxI2CDevice, LinuxI2CError},
    },
    Delay,
};
use log::*;

use crate::error::SensorError;

/// Settling time the devices need between dependent transactions.
pub const BUS_WAIT_MS: u32 = 200;

#[toml_cfg::toml_config]
pub struct Config {
    #[default("/dev/i2c-1")]
    bus_path: &'static str,
}

/// Access to an I2C bus, one device handle at a time.
///
/// A handle is bound to a single 7-bit address when it is opened and is
/// released when it is dropped, so every early return gives the bus back.
pub trait Bus {
    type Error: Debug;
    type Handle: Read<Error = Self::Error> + Write<Error = Self::Error>;

    /// Opens the bus and binds the returned handle to `address`.
    fn open(&mut self, address: u8) -> Result<Self::Handle, SensorError>;

    /// Blocks for the bus settling time.
    fn wait(&mut self);

    /// Releases a handle once the transaction is done.
    fn close(&mut self, handle: Self::Handle) {
        drop(handle);
    }
}

/// The I2C character device of a Linux host.
pub struct LinuxBus {
    path: PathBuf,
    delay: Delay,
}

impl LinuxBus {
    /// Uses the bus path configured at build time.
    pub fn new() -> Self {
        Self::with_path(CONFIG.bus_path)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delay: Delay,
        }
    }
}

impl Default for LinuxBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for LinuxBus {
    type Error = LinuxI2CError;
    type Handle = I2cHandle;

    fn open(&mut self, address: u8) -> Result<I2cHandle, SensorError> {
        debug!(
            "i2c: opening {} for {:#04x}...",
            self.path.display(),
            address
        );
        match LinuxI2CDevice::new(&self.path, u16::from(address)) {
            Ok(device) => Ok(I2cHandle { device, address }),
            Err(LinuxI2CError::Io(err)) => {
                warn!("i2c: failed to open {}: {}", self.path.display(), err);
                Err(SensorError::Open)
            }
            Err(err) => {
                warn!("i2c: unable to bind slave {:#04x}: {:?}", address, err);
                Err(SensorError::Ioctl)
            }
        }
    }

    fn wait(&mut self) {
        self.delay.delay_ms(BUS_WAIT_MS);
    }
}

/// An open device file bound to one slave address.
pub struct I2cHandle {
    device: LinuxI2CDevice,
    address: u8,
}

impl I2cHandle {
    fn check_address(&self, address: u8) -> Result<(), LinuxI2CError> {
        if address == self.address {
            Ok(())
        } else {
            Err(LinuxI2CError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "handle is bound to {:#04x}, not {:#04x}",
                    self.address, address
                ),
            )))
        }
    }
}

// i2c-dev completes a plain read or write in full or fails with an errno, and
// i2cdev drops the byte count, so any error here is the short transfer.
impl Read for I2cHandle {
    type Error = LinuxI2CError;

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.check_address(address)?;
        I2CDevice::read(&mut self.device, buffer)
    }
}

impl Write for I2cHandle {
    type Error = LinuxI2CError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.check_address(address)?;
        I2CDevice::write(&mut self.device, bytes)
    }
}

impl Drop for I2cHandle {
    fn drop(&mut self) {
        debug!("i2c: closing handle for {:#04x}", self.address);
    }
}
