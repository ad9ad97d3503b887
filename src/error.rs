use std::{
    error::Error,
    fmt::{Display, Formatter},
};

/// Describes the ways a measurement can fail.
///
/// Every variant maps onto a fixed negative code, which the command line tool
/// hands back to the shell as its exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SensorError {
    /// No sensor/mode combination was selected, so nothing was measured.
    NoMeasurement = -1,
    /// The I2C character device could not be opened.
    Open = -2,
    /// The slave address could not be bound to the opened device.
    Ioctl = -3,
    /// The device returned fewer bytes than requested.
    Read = -4,
    /// The device accepted fewer bytes than were sent.
    Write = -5,
    /// The checksum transmitted by the device did not match the data.
    Crc = -6,
    /// The instance id is out of range for the sensor type.
    UnknownId = -11,
    /// The register selector is not one the sensor understands.
    UnknownRegister = -12,
    /// No output slot was provided for the result.
    BufferAddress = -13,
}

impl SensorError {
    /// Returns the integer code of this error.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Looks up the error belonging to an integer code.
    pub fn from_code(code: i32) -> Option<Self> {
        use SensorError::*;
        match code {
            -1 => Some(NoMeasurement),
            -2 => Some(Open),
            -3 => Some(Ioctl),
            -4 => Some(Read),
            -5 => Some(Write),
            -6 => Some(Crc),
            -11 => Some(UnknownId),
            -12 => Some(UnknownRegister),
            -13 => Some(BufferAddress),
            _ => None,
        }
    }
}

impl Display for SensorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use SensorError::*;
        match self {
            NoMeasurement => f.write_str("No sensor selected"),
            Open => f.write_str("Failed to open i2c port"),
            Ioctl => f.write_str("Unable to get bus access to talk to slave"),
            Read => f.write_str("Short read from i2c device"),
            Write => f.write_str("Short write to i2c device"),
            Crc => f.write_str("Data read was corrupt"),
            UnknownId => f.write_str("Unknown sensor id"),
            UnknownRegister => f.write_str("Unknown sensor register"),
            BufferAddress => f.write_str("No destination for the measurement"),
        }?;
        write!(f, " ({})", self.code())
    }
}

impl Error for SensorError {}
