//! Session configuration.

use fugit::MillisDurationU32;

/// Settings which stay fixed for the lifetime of a [`Ka3005p`](crate::psu::Ka3005p) session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Log every frame sent and reply received at debug level.
    pub debug_trace: bool,
    /// How many byte-level read timeouts are tolerated while waiting for a reply.
    pub timeout_retry: u8,
    /// How many set + read back attempts are made before giving up on a set-point.
    pub readback_retry: u8,
    /// Pause before every command. The PSU drops bytes which arrive too quickly.
    pub inter_command_delay: MillisDurationU32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debug_trace: false,
            timeout_retry: 3,
            readback_retry: 3,
            inter_command_delay: MillisDurationU32::millis(100),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug_trace(mut self, debug_trace: bool) -> Self {
        self.debug_trace = debug_trace;
        self
    }

    pub fn with_timeout_retry(mut self, retries: u8) -> Self {
        self.timeout_retry = retries;
        self
    }

    pub fn with_readback_retry(mut self, retries: u8) -> Self {
        self.readback_retry = retries;
        self
    }

    pub fn with_inter_command_delay(mut self, delay: MillisDurationU32) -> Self {
        self.inter_command_delay = delay;
        self
    }
}
