use std::fmt::Debug;

use embedded_hal::blocking::i2c::*;
use log::*;

use super::i2c_sensor::I2CSensor;
use crate::{error::SensorError, i2c::Bus};

pub const ADDRESS: u8 = 0x40;

const READ_LEN: usize = 2;

/// Conversion commands understood by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    /// Trigger temperature measurement, no hold master.
    Temperature = 0xF3,
    /// Trigger humidity measurement, no hold master.
    Humidity = 0xF5,
}

impl Register {
    /// Converts a raw reading into °C or %RH.
    pub fn convert(self, raw: u16) -> f64 {
        let raw = f64::from(raw);
        match self {
            Register::Temperature => -46.85 + (raw * 175.72) / 65536.0,
            Register::Humidity => -6.0 + (raw * 125.0) / 65536.0,
        }
    }
}

impl TryFrom<u8> for Register {
    type Error = SensorError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0xF3 => Ok(Self::Temperature),
            0xF5 => Ok(Self::Humidity),
            _ => Err(SensorError::UnknownRegister),
        }
    }
}

pub struct Sht25<T>
where
    T: Read + Write,
{
    i2c: T,
    address: u8,
}

impl<T, E> I2CSensor<T, E> for Sht25<T>
where
    T: Read<Error = E> + Write<Error = E>,
{
    fn new(i2c: T, address: u8) -> Self {
        Self { i2c, address }
    }

    fn release(self) -> T {
        self.i2c
    }
}

impl<I2C, E> Sht25<I2C>
where
    I2C: Read<Error = E> + Write<Error = E>,
    E: Debug,
{
    /// Starts a conversion by writing its command byte.
    pub fn select(&mut self, register: Register) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[register as u8])
            .map_err(|e| {
                warn!("sht25: write to {:#04x} failed: {:?}", self.address, e);
                SensorError::Write
            })
    }

    /// Reads the big-endian result of the last conversion.
    pub fn read_raw(&mut self) -> Result<u16, SensorError> {
        let mut buf = [0u8; READ_LEN];
        self.i2c.read(self.address, &mut buf).map_err(|e| {
            warn!("sht25: read from {:#04x} failed: {:?}", self.address, e);
            SensorError::Read
        })?;
        trace!("sht25: raw {:02x?}", buf);
        Ok(as_u16(buf[0], buf[1]))
    }
}

/// Converts two bytes into a u16
fn as_u16(hi: u8, lo: u8) -> u16 {
    ((hi as u16) << 8) | (lo as u16)
}

/// Measures temperature or humidity, depending on `register`.
///
/// Only instance 0 exists. The id, register and output slot are all checked
/// before the bus is opened, and `buffer` is only written on success.
pub fn measure<B: Bus>(
    bus: &mut B,
    id: u32,
    buffer: Option<&mut f64>,
    register: u8,
) -> Result<(), SensorError> {
    if id != 0 {
        return Err(SensorError::UnknownId);
    }
    let register = Register::try_from(register)?;
    let buffer = buffer.ok_or(SensorError::BufferAddress)?;

    let mut sensor = Sht25::new(bus.open(ADDRESS)?, ADDRESS);
    bus.wait();

    debug!("sht25: selecting {:?}...", register);
    sensor.select(register)?;
    bus.wait();

    let raw = sensor.read_raw()?;
    let value = register.convert(raw);
    bus.close(sensor.release());

    *buffer = value;
    Ok(())
}

/// Measures the temperature in °C.
pub fn measure_temperature<B: Bus>(
    bus: &mut B,
    id: u32,
    buffer: Option<&mut f64>,
) -> Result<(), SensorError> {
    measure(bus, id, buffer, Register::Temperature as u8)
}

/// Measures the relative humidity in %RH.
pub fn measure_humidity<B: Bus>(
    bus: &mut B,
    id: u32,
    buffer: Option<&mut f64>,
) -> Result<(), SensorError> {
    measure(bus, id, buffer, Register::Humidity as u8)
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use embedded_hal_mock::{i2c::Transaction, MockError};

    use super::*;
    use crate::i2c::mock::MockBus;

    fn conversion(register: Register, response: Vec<u8>) -> Vec<Transaction> {
        vec![
            Transaction::write(ADDRESS, vec![register as u8]),
            Transaction::read(ADDRESS, response),
        ]
    }

    #[test]
    fn register_codes() {
        assert_eq!(Register::try_from(0xF3), Ok(Register::Temperature));
        assert_eq!(Register::try_from(0xF5), Ok(Register::Humidity));
        for code in (0..=u8::MAX).filter(|c| *c != 0xF3 && *c != 0xF5) {
            assert_eq!(Register::try_from(code), Err(SensorError::UnknownRegister));
        }
    }

    #[test]
    fn convert_bounds() {
        assert_eq!(Register::Temperature.convert(0), -46.85);
        assert_eq!(Register::Humidity.convert(0), -6.0);
        assert_eq!(
            Register::Temperature.convert(0xFFFF),
            -46.85 + 65535.0 * 175.72 / 65536.0
        );
        assert!((Register::Temperature.convert(0xFFFF) - 128.867).abs() < 1e-3);
        assert_eq!(
            Register::Humidity.convert(0xFFFF),
            -6.0 + 65535.0 * 125.0 / 65536.0
        );
    }

    #[test]
    fn temperature_transaction() {
        let mut bus = MockBus::new(&conversion(Register::Temperature, vec![0x66, 0x4c]));
        let mut value = 0.0;

        measure_temperature(&mut bus, 0, Some(&mut value)).unwrap();

        assert_eq!(value, Register::Temperature.convert(0x664c));
        assert_eq!(bus.opened, vec![ADDRESS]);
        assert_eq!(bus.waits, 2);
        assert_eq!(bus.closes, 1);
        bus.done();
    }

    #[test]
    fn humidity_transaction() {
        let mut bus = MockBus::new(&conversion(Register::Humidity, vec![0x00, 0x00]));
        let mut value = 0.0;

        measure_humidity(&mut bus, 0, Some(&mut value)).unwrap();

        assert_eq!(value, -6.0);
        bus.done();
    }

    #[test]
    fn unknown_id_touches_nothing() {
        for id in [1, 2, u32::MAX] {
            let mut bus = MockBus::new(&[]);
            let mut value = 3.0;
            assert_eq!(
                measure_temperature(&mut bus, id, Some(&mut value)),
                Err(SensorError::UnknownId)
            );
            assert_eq!(bus.operations(), 0);
            assert_eq!(value, 3.0);
            bus.done();
        }
    }

    #[test]
    fn unknown_register_touches_nothing() {
        for code in [0x00, 0xE3, 0xE5, 0xF4, 0xFF] {
            let mut bus = MockBus::new(&[]);
            let mut value = 3.0;
            assert_eq!(
                measure(&mut bus, 0, Some(&mut value), code),
                Err(SensorError::UnknownRegister)
            );
            assert_eq!(bus.operations(), 0);
            bus.done();
        }
    }

    #[test]
    fn missing_buffer_touches_nothing() {
        let mut bus = MockBus::new(&[]);
        assert_eq!(
            measure_humidity(&mut bus, 0, None),
            Err(SensorError::BufferAddress)
        );
        assert_eq!(bus.operations(), 0);
        bus.done();
    }

    #[test]
    fn write_error_stops_before_read() {
        let write = Transaction::write(ADDRESS, vec![Register::Temperature as u8])
            .with_error(MockError::Io(ErrorKind::Other));
        let mut bus = MockBus::new(&[write]);
        let mut value = 3.0;

        assert_eq!(
            measure_temperature(&mut bus, 0, Some(&mut value)),
            Err(SensorError::Write)
        );
        assert_eq!(value, 3.0);
        assert_eq!(bus.waits, 1);
        assert_eq!(bus.closes, 0);
        bus.done();
    }

    #[test]
    fn read_error_is_a_read_failure() {
        let read = Transaction::read(ADDRESS, vec![0, 0])
            .with_error(MockError::Io(ErrorKind::Other));
        let mut bus = MockBus::new(&[
            Transaction::write(ADDRESS, vec![Register::Humidity as u8]),
            read,
        ]);
        let mut value = 3.0;

        assert_eq!(
            measure_humidity(&mut bus, 0, Some(&mut value)),
            Err(SensorError::Read)
        );
        assert_eq!(value, 3.0);
        bus.done();
    }

    #[test]
    fn repeated_measurements_agree() {
        let mut expectations = conversion(Register::Temperature, vec![0x80, 0x00]);
        expectations.extend(conversion(Register::Temperature, vec![0x80, 0x00]));
        let mut bus = MockBus::new(&expectations);
        let (mut first, mut second) = (0.0, 0.0);

        measure_temperature(&mut bus, 0, Some(&mut first)).unwrap();
        measure_temperature(&mut bus, 0, Some(&mut second)).unwrap();

        assert_eq!(first, second);
        bus.done();
    }
}
