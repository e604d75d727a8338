//! Decoding of the `STATUS?` reply.

use modular_bitfield::prelude::*;
use strum_macros::EnumIter;

use crate::reply::Reply;

/// Layout of the status byte, least significant bit first.
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub struct StatusByte {
    /// `0x01` - Set when regulating voltage, clear when regulating current.
    /// Only meaningful while the output is on.
    pub voltage_regulation: bool,
    #[skip]
    __: B5,
    /// `0x40` - Output enabled.
    pub output_enabled: bool,
    #[skip]
    __: B1,
}

/// What is currently limiting the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum LimitMode {
    /// Output is off, nothing is being regulated.
    None,
    /// Constant current.
    Current,
    /// Constant voltage.
    Voltage,
}

/// Decoded status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub output_enabled: bool,
    pub limit_mode: LimitMode,
}

impl Status {
    /// Decode the first byte of a status reply. `None` if the reply is empty.
    pub fn from_reply(reply: &Reply) -> Option<Self> {
        reply.as_bytes().first().copied().map(decode_status)
    }
}

impl From<StatusByte> for Status {
    fn from(bits: StatusByte) -> Self {
        let limit_mode = match (bits.output_enabled(), bits.voltage_regulation()) {
            (false, _) => LimitMode::None,
            (true, false) => LimitMode::Current,
            (true, true) => LimitMode::Voltage,
        };
        Self {
            output_enabled: bits.output_enabled(),
            limit_mode,
        }
    }
}

/// Decode a raw status byte.
pub fn decode_status(byte: u8) -> Status {
    Status::from(StatusByte::from_bytes([byte]))
}
