//! Our error types for the KA3005P PSU.

use thiserror::Error;

use crate::{command::Opcode, identity::IdentityMismatch, reply::ReplyText, verify::Setpoint};

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for KA3005P PSU communications.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    SerialError(I),
    /// No byte arrived within the configured number of byte-level timeouts.
    #[error("Serial port timeout")]
    TransportTimeout,
    /// The session holds no transport (never opened, or already closed).
    #[error("Transport is not open")]
    TransportClosed,
    #[error("Session is already open")]
    AlreadyOpen,
    /// A transport lent with `attach` is still held and must be detached first.
    #[error("Session still holds a lent transport")]
    TransportNotReleased,
    /// The command can't be used for this operation, e.g. querying a set command.
    #[error("Command {0:?} is not supported here")]
    UnsupportedCommand(Opcode),
    /// The device never reported the set-point we wrote within the readback budget.
    #[error("Failed to read back set-point (set {intended}, read {observed:?})")]
    ReadbackMismatch {
        intended: Setpoint,
        observed: Option<Setpoint>,
    },
    #[error("Empty status reply")]
    MalformedStatus,
    #[error("Unknown numeric response {0:?}")]
    MalformedNumericReply(ReplyText),
    #[error("Device is not a KA3005P: {0}")]
    UnexpectedIdentity(IdentityMismatch),
    #[error("Invalid range")]
    InvalidRange,
    #[error("Invalid channel {0}")]
    InvalidChannel(u8),
    #[error("Frame does not fit the buffer")]
    BufferOverflow,
}

impl<I: embedded_io::Error> From<IdentityMismatch> for Error<I> {
    fn from(err: IdentityMismatch) -> Self {
        Error::UnexpectedIdentity(err)
    }
}
