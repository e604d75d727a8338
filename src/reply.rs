//! Replies read back from the PSU.

/// Longest reply we accept. The identity string is the longest at 30 characters.
pub const REPLY_CAPACITY: usize = 32;

/// Reply text kept around for diagnostics.
pub type ReplyText = heapless::String<REPLY_CAPACITY>;

/// Decides when a reply is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Text reply ending with a NUL byte.
    Nul,
    /// Text reply of a known length. A NUL byte still ends it early.
    Fixed(usize),
    /// Binary reply of a known length. Zero bytes are data.
    Raw(usize),
    /// Text reply of unknown length. Once something has arrived, a byte timeout ends it.
    UntilTimeout,
}

impl Termination {
    pub(crate) fn stops_at_nul(&self) -> bool {
        !matches!(self, Termination::Raw(_))
    }

    pub(crate) fn expected_len(&self) -> Option<usize> {
        match *self {
            Termination::Fixed(len) | Termination::Raw(len) => Some(len),
            Termination::Nul | Termination::UntilTimeout => None,
        }
    }

    pub(crate) fn timeout_is_end(&self) -> bool {
        matches!(self, Termination::UntilTimeout)
    }
}

/// Why a reply stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    NulTerminated,
    LengthReached,
    TimedOut,
}

/// Bytes of one reply, without any NUL terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    bytes: heapless::Vec<u8, REPLY_CAPACITY>,
    completion: Completion,
}

impl Reply {
    pub(crate) fn new(bytes: heapless::Vec<u8, REPLY_CAPACITY>, completion: Completion) -> Self {
        Self { bytes, completion }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The reply as text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.bytes).ok()
    }

    pub fn completion(&self) -> Completion {
        self.completion
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Parse a numeric reply such as `05.00` or `1.500`.
    pub fn parse_f32(&self) -> Option<f32> {
        self.as_str()?.trim().parse::<f32>().ok()
    }

    /// Printable copy of the reply, with non-ASCII bytes replaced by `?`.
    pub fn text(&self) -> ReplyText {
        let mut text = ReplyText::new();
        for &byte in self.bytes.iter() {
            let c = if byte.is_ascii() && !byte.is_ascii_control() {
                byte as char
            } else {
                '?'
            };
            // Same capacity as the byte buffer, this can't overflow.
            let _ = text.push(c);
        }
        text
    }
}

impl core::fmt::Display for Reply {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.text())
    }
}
