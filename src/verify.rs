//! Readback verification of set-points.
//!
//! The PSU doesn't acknowledge commands and regularly drops them, so after every set command we
//! query the setting again and compare. The whole set + query cycle is repeated a bounded number
//! of times.

use log::{debug, warn};

use crate::{
    command::Command,
    error::{Error, Result},
    link::Link,
    pacing::Pacer,
    reply::Reply,
    status::Status,
};

/// Allowed difference between a set-point and its read back value, for volts and amps alike.
pub const READBACK_TOLERANCE: f32 = 0.01;

/// A value written to the PSU, used to report readback failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setpoint {
    Voltage(f32),
    Current(f32),
    Output(bool),
}

impl core::fmt::Display for Setpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Setpoint::Voltage(volts) => write!(f, "{volts:.2} V"),
            Setpoint::Current(amps) => write!(f, "{amps:.3} A"),
            Setpoint::Output(true) => f.write_str("output on"),
            Setpoint::Output(false) => f.write_str("output off"),
        }
    }
}

impl<S: embedded_io::Read + embedded_io::Write, P: Pacer> Link<'_, S, P> {
    /// Write a numeric set-point and read it back until it matches within `tolerance`.
    ///
    /// Makes at most `max_retries` attempts (at least one) and returns the confirmed value.
    /// `set` must be a voltage or current set command.
    pub fn set_and_verify(
        &mut self,
        set: &Command,
        query: &Command,
        intended: f32,
        tolerance: f32,
        max_retries: u8,
    ) -> Result<f32, S::Error> {
        let as_setpoint: fn(f32) -> Setpoint = match set {
            Command::VoltageSet { .. } => Setpoint::Voltage,
            Command::CurrentSet { .. } => Setpoint::Current,
            other => return Err(Error::UnsupportedCommand(other.opcode())),
        };
        let debug_trace = self.config.debug_trace;

        self.set_and_confirm(set, query, as_setpoint(intended), max_retries, |reply| {
            match reply.parse_f32() {
                Some(value) if (value - intended).abs() < tolerance => Ok(value),
                Some(value) => Err(Some(as_setpoint(value))),
                None => {
                    if debug_trace {
                        debug!("PSU failed to parse response {:?} after setting", reply.text());
                    }
                    Err(None)
                }
            }
        })
    }

    /// Switch the output and check the status byte until it agrees.
    pub fn set_output_and_verify(
        &mut self,
        enabled: bool,
        max_retries: u8,
    ) -> Result<Status, S::Error> {
        self.set_and_confirm(
            &Command::OutputSet(enabled),
            &Command::StatusQuery,
            Setpoint::Output(enabled),
            max_retries,
            |reply| match Status::from_reply(reply) {
                Some(status) if status.output_enabled == enabled => Ok(status),
                Some(status) => Err(Some(Setpoint::Output(status.output_enabled))),
                None => Err(None),
            },
        )
    }

    /// Shared set + query loop. `confirm` either accepts the reply or returns what was observed.
    fn set_and_confirm<T>(
        &mut self,
        set: &Command,
        query: &Command,
        intended: Setpoint,
        max_retries: u8,
        mut confirm: impl FnMut(&Reply) -> core::result::Result<T, Option<Setpoint>>,
    ) -> Result<T, S::Error> {
        let mut attempts_left = max_retries.max(1);
        loop {
            self.send(set)?;
            let reply = self.query(query)?;
            let observed = match confirm(&reply) {
                Ok(confirmed) => return Ok(confirmed),
                Err(observed) => observed,
            };

            warn!(
                "PSU readback mismatch (set {}, read {:?}), {} attempts left",
                intended,
                observed,
                attempts_left - 1
            );
            attempts_left -= 1;
            if attempts_left == 0 {
                return Err(Error::ReadbackMismatch { intended, observed });
            }
        }
    }
}
