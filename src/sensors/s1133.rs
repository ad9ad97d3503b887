use std::fmt::Debug;

use bitfield::bitfield;
use crc_any::CRCu8;
use embedded_hal::blocking::i2c::*;
use log::*;

use super::i2c_sensor::I2CSensor;
use crate::{error::SensorError, i2c::Bus};

/// Address of the first (internal) light sensor.
pub const ADDRESS_0: u8 = 0x30;
/// Address of the second (external) light sensor.
pub const ADDRESS_1: u8 = 0x31;

/// P(x) = x^8 + x^5 + x^4 + 1
pub const CRC_POLYNOMIAL: u16 = 0x131;

const READ_LEN: usize = 3;
const CRC_POS: usize = 2;

// Index 0 is reserved by the device and yields an infinite value.
const RANGE: [f64; 4] = [0.0, 1.0, 4.0, 16.0];

bitfield! {
    /// Second data byte: the low mantissa nibble followed by the range index.
    pub struct LowByte(u8);
    impl Debug;
    pub u8, mantissa_low, _: 7, 4;
    pub u8, range_index, _: 3, 2;
}

pub struct S1133<T>
where
    T: Read + Write,
{
    i2c: T,
    address: u8,
}

impl<T, E> I2CSensor<T, E> for S1133<T>
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

impl<I2C, E> S1133<I2C>
where
    I2C: Read<Error = E> + Write<Error = E>,
    E: Debug,
{
    /// Reads the two data bytes and the checksum.
    pub fn read_raw(&mut self) -> Result<[u8; READ_LEN], SensorError> {
        let mut buf = [0u8; READ_LEN];
        self.i2c.read(self.address, &mut buf).map_err(|e| {
            warn!("s1133: read from {:#04x} failed: {:?}", self.address, e);
            SensorError::Read
        })?;
        trace!("s1133: raw {:02x?}", buf);
        Ok(buf)
    }
}

/// Maps an instance id onto its bus address.
pub fn address(id: u32) -> Result<u8, SensorError> {
    match id {
        0 => Ok(ADDRESS_0),
        1 => Ok(ADDRESS_1),
        _ => Err(SensorError::UnknownId),
    }
}

/// CRC-8 over `data`, MSB first, starting from zero.
pub fn calc_crc8(data: &[u8]) -> u8 {
    let mut crc = CRCu8::create_crc((CRC_POLYNOMIAL & 0xFF) as u8, 8, 0x00, 0x00, false);
    crc.digest(data);
    crc.get_crc()
}

/// Validates a raw reading and converts it to lux.
pub fn decode(raw: &[u8; READ_LEN]) -> Result<f64, SensorError> {
    let crc = calc_crc8(&raw[..CRC_POS]);
    if crc != raw[CRC_POS] {
        warn!(
            "s1133: crc mismatch: computed {:#04x}, received {:#04x}",
            crc, raw[CRC_POS]
        );
        return Err(SensorError::Crc);
    }

    let low = LowByte(raw[1]);
    let mantissa = (u16::from(raw[0]) << 4) | u16::from(low.mantissa_low());
    let range = RANGE[usize::from(low.range_index())];
    Ok(f64::from(mantissa) / 4096.0 * 250000.0 / range)
}

/// Measures the illuminance in lux seen by light sensor `id`.
///
/// The id and the output slot are validated before the bus is touched. On
/// failure `buffer` is left as it was.
pub fn measure_illuminance<B: Bus>(
    bus: &mut B,
    id: u32,
    buffer: Option<&mut f64>,
) -> Result<(), SensorError> {
    let address = address(id)?;
    let buffer = buffer.ok_or(SensorError::BufferAddress)?;

    let mut sensor = S1133::new(bus.open(address)?, address);
    debug!("s1133: reading sensor {} at {:#04x}...", id, address);
    let raw = sensor.read_raw()?;
    bus.wait();

    let value = decode(&raw)?;
    bus.close(sensor.release());

    *buffer = value;
    Ok(())
}
