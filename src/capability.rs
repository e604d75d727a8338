//! Generic description of a programmable power supply.
//!
//! [`PowerSupply`] is what lab code written against "any PSU" talks to. The KA3005P session
//! implements it, see [`Ka3005p`](crate::psu::Ka3005p).

use crate::status::LimitMode;

/// Range of values a channel accepts, with the smallest step it resolves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
    pub resolution: f32,
}

impl ValueRange {
    pub const fn new(min: f32, max: f32, resolution: f32) -> Self {
        Self {
            min,
            max,
            resolution,
        }
    }

    /// Whether `value` lies inside the range. NaN never does.
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// What a power supply can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub voltage_limit: bool,
    pub current_limit: bool,
    pub measure_voltage: bool,
    pub measure_current: bool,
    pub output_switch: bool,
}

/// A programmable power supply with one or more numbered channels, starting at 1.
pub trait PowerSupply {
    type Error;

    fn channel_count(&self) -> u8;
    fn voltage_range(&self) -> ValueRange;
    fn current_range(&self) -> ValueRange;
    fn power_range(&self) -> ValueRange;
    fn capabilities(&self) -> Capabilities;

    /// Whether the supply is currently reachable.
    fn connected(&self) -> bool;

    fn set_channel_enabled(&mut self, channel: u8, enabled: bool) -> Result<(), Self::Error>;
    fn set_channel_voltage(&mut self, channel: u8, volts: f32) -> Result<(), Self::Error>;
    fn set_channel_current(&mut self, channel: u8, amps: f32) -> Result<(), Self::Error>;
    fn measure_voltage(&mut self, channel: u8) -> Result<f32, Self::Error>;
    fn measure_current(&mut self, channel: u8) -> Result<f32, Self::Error>;
    fn limit_mode(&mut self, channel: u8) -> Result<LimitMode, Self::Error>;

    /// Switch every channel off.
    fn off(&mut self) -> Result<(), Self::Error> {
        for channel in 1..=self.channel_count() {
            self.set_channel_enabled(channel, false)?;
        }
        Ok(())
    }
}
