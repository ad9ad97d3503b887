//! Maps a (sensor type, instance id, mode) selection onto one driver call.

use std::fmt::{Display, Formatter};

use log::*;

#[cfg(feature = "s1133")]
use crate::sensors::s1133;
#[cfg(feature = "sht25")]
use crate::sensors::sht25;
use crate::{error::SensorError, i2c::Bus};

/// Sensor chips this build can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorType {
    #[cfg(feature = "s1133")]
    S1133,
    #[cfg(feature = "sht25")]
    Sht25,
}

impl SensorType {
    pub const ALL: &'static [SensorType] = &[
        #[cfg(feature = "s1133")]
        SensorType::S1133,
        #[cfg(feature = "sht25")]
        SensorType::Sht25,
    ];

    pub fn token(self) -> &'static str {
        match self {
            #[cfg(feature = "s1133")]
            SensorType::S1133 => "s1133",
            #[cfg(feature = "sht25")]
            SensorType::Sht25 => "sht25",
        }
    }

    /// Case-insensitive lookup of a command line token.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.token().eq_ignore_ascii_case(token))
    }

    /// Mode implied by selecting this sensor.
    pub fn default_mode(self) -> Option<Mode> {
        match self {
            #[cfg(feature = "s1133")]
            SensorType::S1133 => Some(Mode::Lux),
            #[cfg(feature = "sht25")]
            SensorType::Sht25 => None,
        }
    }
}

/// What to measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[cfg(feature = "s1133")]
    Lux,
    #[cfg(feature = "sht25")]
    Temperature,
    #[cfg(feature = "sht25")]
    Humidity,
}

impl Mode {
    pub const ALL: &'static [Mode] = &[
        #[cfg(feature = "s1133")]
        Mode::Lux,
        #[cfg(feature = "sht25")]
        Mode::Temperature,
        #[cfg(feature = "sht25")]
        Mode::Humidity,
    ];

    pub fn token(self) -> &'static str {
        match self {
            #[cfg(feature = "s1133")]
            Mode::Lux => "lux",
            #[cfg(feature = "sht25")]
            Mode::Temperature => "temp",
            #[cfg(feature = "sht25")]
            Mode::Humidity => "humi",
        }
    }

    /// Case-insensitive lookup of a command line token.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.token().eq_ignore_ascii_case(token))
    }
}

/// Parses an instance id made of ASCII digits only.
pub fn parse_id(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// One command line option. Options are applied in the order they were given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<'a> {
    Sensor(&'a str),
    Id(&'a str),
    Mode(&'a str),
}

/// A measurement selection. Unset or unrecognised fields are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Request {
    pub sensor: Option<SensorType>,
    pub id: Option<u32>,
    pub mode: Option<Mode>,
}

impl Request {
    /// Builds a request by applying `selections` one after the other.
    pub fn from_selections<'a, I>(selections: I) -> Self
    where
        I: IntoIterator<Item = Selection<'a>>,
    {
        let mut request = Self::default();
        for selection in selections {
            request.apply(selection);
        }
        request
    }

    /// Builds a request from the tokens given as type, id, then mode.
    pub fn from_tokens(sensor: Option<&str>, id: Option<&str>, mode: Option<&str>) -> Self {
        let sensor = sensor.map(Selection::Sensor);
        let id = id.map(Selection::Id);
        let mode = mode.map(Selection::Mode);
        Self::from_selections(sensor.into_iter().chain(id).chain(mode))
    }

    /// Applies one option.
    ///
    /// Selecting a sensor with a default mode resets the mode to it, even if
    /// a mode was chosen earlier. An unrecognised token clears its field.
    pub fn apply(&mut self, selection: Selection<'_>) {
        match selection {
            Selection::Sensor(token) => {
                self.sensor = SensorType::from_token(token);
                if let Some(mode) = self.sensor.and_then(SensorType::default_mode) {
                    self.mode = Some(mode);
                }
            }
            Selection::Id(token) => self.id = parse_id(token),
            Selection::Mode(token) => self.mode = Mode::from_token(token),
        }
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sensor = self.sensor.map_or("?", SensorType::token);
        let mode = self.mode.map_or("?", Mode::token);
        match self.id {
            Some(id) => write!(f, "{} #{} ({})", sensor, id, mode),
            None => write!(f, "{} #? ({})", sensor, mode),
        }
    }
}

/// Runs the single driver call selected by `request`.
///
/// A selection that matches no driver returns [`SensorError::NoMeasurement`]
/// without touching the bus. A missing id is reported by the selected driver
/// as [`SensorError::UnknownId`], also without touching the bus.
#[cfg_attr(
    not(any(feature = "s1133", feature = "sht25")),
    allow(unused_variables)
)]
pub fn measure<B: Bus>(bus: &mut B, request: &Request) -> Result<f64, SensorError> {
    let result = match (request.sensor, request.mode) {
        #[cfg(feature = "s1133")]
        (Some(SensorType::S1133), Some(Mode::Lux)) => {
            read_with(bus, request.id, s1133::measure_illuminance)
        }
        #[cfg(feature = "sht25")]
        (Some(SensorType::Sht25), Some(Mode::Temperature)) => {
            read_with(bus, request.id, sht25::measure_temperature)
        }
        #[cfg(feature = "sht25")]
        (Some(SensorType::Sht25), Some(Mode::Humidity)) => {
            read_with(bus, request.id, sht25::measure_humidity)
        }
        _ => Err(SensorError::NoMeasurement),
    };

    match result {
        Ok(value) => debug!("dispatch: {} = {}", request, value),
        Err(SensorError::NoMeasurement) => info!("dispatch: no driver for {}", request),
        Err(_) => {}
    }
    result
}

#[cfg(any(feature = "s1133", feature = "sht25"))]
fn read_with<B, F>(bus: &mut B, id: Option<u32>, driver: F) -> Result<f64, SensorError>
where
    B: Bus,
    F: FnOnce(&mut B, u32, Option<&mut f64>) -> Result<(), SensorError>,
{
    let id = id.ok_or(SensorError::UnknownId)?;
    let mut value = 0.0;
    driver(bus, id, Some(&mut value))?;
    Ok(value)
}

/// Formats a measurement the way it is printed: three decimals, at least
/// eight characters wide.
pub fn format_reading(value: f64) -> String {
    format!("{:8.3}", value)
}
