//! Parsing of the `*IDN?` reply.
//!
//! The reply is a fixed 30 character string, e.g. `KORAD KA3005P V5.5 SN:00123456`:
//!
//! | Range      | Content          |
//! |------------|------------------|
//! | `[0, 13)`  | Model            |
//! | `[13, 15)` | Padding (` V`)   |
//! | `[15, 18)` | Firmware version |
//! | `[18, 22)` | Padding (` SN:`) |
//! | `[22, 30)` | Serial number    |

use core::ops::Range;

use thiserror::Error;

/// The only model prefix we talk to.
pub const EXPECTED_MODEL: &str = "KORAD KA3005P";

/// Exact length of an identity reply.
pub const IDENTITY_LEN: usize = 30;

const MODEL: Range<usize> = 0..13;
const VERSION: Range<usize> = 15..18;
const SERIAL: Range<usize> = 22..30;

/// Who we are talking to. Read once when the session is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    model: heapless::String<13>,
    version: heapless::String<3>,
    serial: heapless::String<8>,
}

impl DeviceIdentity {
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Firmware version, e.g. `5.5`.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }
}

impl core::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} V{} SN:{}", self.model, self.version, self.serial)
    }
}

/// Why an identity reply was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMismatch {
    #[error("identity is not ASCII")]
    NotAscii,
    #[error("identity is {0} characters long, expected 30")]
    WrongLength(usize),
    #[error("unknown model")]
    WrongModel,
}

/// Validate an identity reply and pull out its fields.
pub fn parse_identity(reply: &[u8]) -> Result<DeviceIdentity, IdentityMismatch> {
    if !reply.is_ascii() {
        return Err(IdentityMismatch::NotAscii);
    }
    if reply.len() != IDENTITY_LEN {
        return Err(IdentityMismatch::WrongLength(reply.len()));
    }
    // Checked above, every byte is a char boundary.
    let text = core::str::from_utf8(reply).map_err(|_| IdentityMismatch::NotAscii)?;
    if &text[MODEL] != EXPECTED_MODEL {
        return Err(IdentityMismatch::WrongModel);
    }

    Ok(DeviceIdentity {
        model: field(text, MODEL)?,
        version: field(text, VERSION)?,
        serial: field(text, SERIAL)?,
    })
}

fn field<const N: usize>(
    text: &str,
    range: Range<usize>,
) -> Result<heapless::String<N>, IdentityMismatch> {
    // Field lengths match the capacities, so this can't fail.
    heapless::String::try_from(&text[range]).map_err(|_| IdentityMismatch::WrongLength(text.len()))
}
