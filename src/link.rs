//! Sending commands and reading replies over the serial transport.

use embedded_io::Error as _;
use log::debug;

use crate::{
    command::Command,
    config::SessionConfig,
    error::{Error, Result},
    pacing::Pacer,
    reply::{Completion, REPLY_CAPACITY, Reply, Termination},
};

/// Borrowed view of everything needed to talk to the PSU for one operation.
pub struct Link<'a, S: embedded_io::Read + embedded_io::Write, P: Pacer> {
    pub(crate) transport: &'a mut S,
    pub(crate) pacer: &'a mut P,
    pub(crate) config: &'a SessionConfig,
}

impl<'a, S: embedded_io::Read + embedded_io::Write, P: Pacer> Link<'a, S, P> {
    pub fn new(transport: &'a mut S, pacer: &'a mut P, config: &'a SessionConfig) -> Self {
        Self {
            transport,
            pacer,
            config,
        }
    }

    /// Write a command which the PSU doesn't answer.
    pub fn send(&mut self, command: &Command) -> Result<(), S::Error> {
        let frame = command.encode().map_err(|_| Error::BufferOverflow)?;
        if self.config.debug_trace {
            debug!("PSU> {}", frame);
        }

        self.pacer.pause(self.config.inter_command_delay);
        self.transport
            .write_all(frame.as_bytes())
            .map_err(Error::SerialError)?;
        self.transport.flush().map_err(Error::SerialError)
    }

    /// Write a command and collect its reply according to `termination`.
    ///
    /// The whole reply shares one budget of `timeout_retry` extra waits, so a silent PSU costs
    /// `timeout_retry + 1` reads. The command itself is never written twice, so a slow reply
    /// doesn't repeat a command with side effects.
    pub fn send_and_read(
        &mut self,
        command: &Command,
        termination: Termination,
    ) -> Result<Reply, S::Error> {
        self.send(command)?;

        let mut retries = self.config.timeout_retry;
        let mut bytes: heapless::Vec<u8, REPLY_CAPACITY> = heapless::Vec::new();
        let completion = loop {
            match self.read_byte()? {
                Some(0) if termination.stops_at_nul() => break Completion::NulTerminated,
                Some(byte) => {
                    bytes.push(byte).map_err(|_| Error::BufferOverflow)?;
                    if termination.expected_len() == Some(bytes.len()) {
                        break Completion::LengthReached;
                    }
                }
                // Nothing more to come for variable length replies.
                None if termination.timeout_is_end() && !bytes.is_empty() => {
                    break Completion::TimedOut;
                }
                None => {
                    if self.config.debug_trace {
                        debug!("PSU timeout ({} retries left)", retries);
                    }
                    if retries == 0 {
                        return Err(Error::TransportTimeout);
                    }
                    retries -= 1;
                }
            }
        };

        let reply = Reply::new(bytes, completion);
        if self.config.debug_trace {
            debug!("PSU< {}", reply);
        }
        Ok(reply)
    }

    /// Send a query and use the reply shape its opcode defines.
    ///
    /// Set commands get no reply, they are refused without writing anything.
    pub fn query(&mut self, command: &Command) -> Result<Reply, S::Error> {
        let termination = command
            .reply_termination()
            .ok_or(Error::UnsupportedCommand(command.opcode()))?;
        self.send_and_read(command, termination)
    }

    /// Read a single byte. `None` when the port's read timeout expired without data.
    fn read_byte(&mut self) -> Result<Option<u8>, S::Error> {
        let mut buf = [0u8; 1];
        match self.transport.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if matches!(e.kind(), embedded_io::ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(Error::SerialError(e)),
        }
    }
}
