//! This module defines the ASCII commands understood by the KA3005P and how they are framed.
//!
//! The PSU has no checksums or delimiters, a frame is just the command text. Numeric payloads
//! use the fixed widths the firmware expects, e.g. `VSET1:05.00` and `ISET1:1.500`.

use core::fmt::Write;

use strum_macros::{EnumDiscriminants, EnumIter};

use crate::reply::Termination;

/// Large enough for the longest frame (`VSET1:30.00`) with room to spare.
pub const FRAME_CAPACITY: usize = 16;

/// An encoded command, ready to be written to the transport.
pub type Frame = heapless::String<FRAME_CAPACITY>;

/// A request to the PSU.
///
/// [`Opcode`] is the payload-free discriminant of each variant.
#[derive(Debug, Clone, Copy, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(Opcode), derive(EnumIter))]
pub enum Command {
    /// `OUT1` / `OUT0` - Switch the output on or off.
    OutputSet(bool),
    /// `OCP1` / `OCP0` - Over current protection.
    OverCurrentProtectionSet(bool),
    /// `OVP1` / `OVP0` - Over voltage protection.
    OverVoltageProtectionSet(bool),
    /// `VSET{ch}:{v}` - Voltage setting, two decimal places.
    VoltageSet { channel: u8, volts: f32 },
    /// `ISET{ch}:{i}` - Current setting, three decimal places.
    CurrentSet { channel: u8, amps: f32 },
    /// `VSET{ch}?` - Read back the voltage setting.
    VoltageQuery { channel: u8 },
    /// `ISET{ch}?` - Read back the current setting.
    CurrentQuery { channel: u8 },
    /// `VOUT{ch}?` - Measured output voltage.
    VoltageOutQuery { channel: u8 },
    /// `IOUT{ch}?` - Measured output current.
    CurrentOutQuery { channel: u8 },
    /// `STATUS?` - Single status byte, see [`crate::status`].
    StatusQuery,
    /// `*IDN?` - Identity string, see [`crate::identity`].
    IdentityQuery,
}

impl Command {
    /// Return the payload-free opcode of this command.
    pub fn opcode(&self) -> Opcode {
        Opcode::from(self)
    }

    /// Format this command into its ASCII frame.
    ///
    /// Only fails if the formatted value does not fit in [`FRAME_CAPACITY`], which can't happen
    /// for values inside the PSU's ranges.
    pub fn encode(&self) -> Result<Frame, core::fmt::Error> {
        let mut frame = Frame::new();
        match *self {
            Command::OutputSet(on) => write!(frame, "OUT{}", u8::from(on)),
            Command::OverCurrentProtectionSet(on) => write!(frame, "OCP{}", u8::from(on)),
            Command::OverVoltageProtectionSet(on) => write!(frame, "OVP{}", u8::from(on)),
            Command::VoltageSet { channel, volts } => write!(frame, "VSET{channel}:{volts:05.2}"),
            Command::CurrentSet { channel, amps } => write!(frame, "ISET{channel}:{amps:05.3}"),
            Command::VoltageQuery { channel } => write!(frame, "VSET{channel}?"),
            Command::CurrentQuery { channel } => write!(frame, "ISET{channel}?"),
            Command::VoltageOutQuery { channel } => write!(frame, "VOUT{channel}?"),
            Command::CurrentOutQuery { channel } => write!(frame, "IOUT{channel}?"),
            Command::StatusQuery => write!(frame, "STATUS?"),
            Command::IdentityQuery => write!(frame, "*IDN?"),
        }?;
        Ok(frame)
    }

    /// How the reply to this command is delimited. `None` for commands the PSU doesn't answer.
    pub fn reply_termination(&self) -> Option<Termination> {
        self.opcode().reply_termination()
    }
}

impl Opcode {
    /// Numeric replies are always five characters, e.g. `12.00` or `1.500`.
    pub const NUMERIC_REPLY_LEN: usize = 5;

    /// How the reply to this opcode is delimited. `None` for opcodes the PSU doesn't answer.
    pub fn reply_termination(&self) -> Option<Termination> {
        match self {
            Opcode::OutputSet
            | Opcode::OverCurrentProtectionSet
            | Opcode::OverVoltageProtectionSet
            | Opcode::VoltageSet
            | Opcode::CurrentSet => None,
            Opcode::VoltageQuery
            | Opcode::CurrentQuery
            | Opcode::VoltageOutQuery
            | Opcode::CurrentOutQuery => Some(Termination::Fixed(Self::NUMERIC_REPLY_LEN)),
            // The status byte is a bitfield, a zero byte is a valid value there.
            Opcode::StatusQuery => Some(Termination::Raw(1)),
            // Length isn't known up front, the PSU just stops sending.
            Opcode::IdentityQuery => Some(Termination::UntilTimeout),
        }
    }

    /// Whether the PSU answers this opcode.
    pub fn is_query(&self) -> bool {
        self.reply_termination().is_some()
    }
}
