use log::{info, warn};

use crate::{
    capability::{Capabilities, PowerSupply, ValueRange},
    command::Command,
    config::SessionConfig,
    error::{Error, Result},
    identity::{DeviceIdentity, parse_identity},
    link::Link,
    pacing::Pacer,
    status::{LimitMode, Status},
    verify::READBACK_TOLERANCE,
};

/// The KA3005P has a single output channel.
pub const CHANNEL: u8 = 1;

pub const VOLTAGE_RANGE: ValueRange = ValueRange::new(0.0, 30.0, 0.01);
pub const CURRENT_RANGE: ValueRange = ValueRange::new(0.0, 5.0, 0.001);
pub const POWER_RANGE: ValueRange = ValueRange::new(0.0, 150.0, 0.001);

/// Lifecycle of a session's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unopened,
    Open,
    Closed,
}

/// Who is responsible for the transport once the session is done with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Handed over with [`Ka3005p::open`], released by the session on close.
    Owned,
    /// Lent with [`Ka3005p::attach`], given back with [`Ka3005p::release`].
    Borrowed,
}

/// You can drive a KA3005P using any interface which implements [embedded_io::Read] &
/// [embedded_io::Write]. The interface must be configured with a read timeout, a read that times
/// out is how we notice the PSU has finished (or failed) to answer.
///
/// For its methods, we generally use the nomenclature that "set" means to write a set-point,
/// and "get" means to read one back or to read a measured value.
///
/// Opening the session puts the PSU into a known safe state: output off, protections off,
/// 0 V and 0 A. Closing it, explicitly or by dropping it, switches the output off again.
pub struct Ka3005p<S: embedded_io::Read + embedded_io::Write, P: Pacer> {
    transport: Option<S>,
    pacer: P,
    config: SessionConfig,
    state: ConnectionState,
    ownership: Ownership,
    identity: Option<DeviceIdentity>,
}

impl<S: embedded_io::Read + embedded_io::Write, P: Pacer> Ka3005p<S, P> {
    /// Create an unopened session.
    pub fn new(config: SessionConfig, pacer: P) -> Self {
        Self {
            transport: None,
            pacer,
            config,
            state: ConnectionState::Unopened,
            ownership: Ownership::Owned,
            identity: None,
        }
    }

    /// Take ownership of an open transport, identify the PSU and put it into a safe state.
    ///
    /// The transport is flushed and dropped when the session closes.
    pub fn open(&mut self, transport: S) -> Result<DeviceIdentity, S::Error> {
        self.establish(transport, Ownership::Owned)
    }

    /// Like [`Self::open`], but the transport is only lent. Get it back with [`Self::detach`] or
    /// [`Self::release`].
    ///
    /// While a lent transport is held, even after [`Self::close`] or a failed identity check,
    /// further `open`/`attach` calls fail with [`Error::TransportNotReleased`] and the transport
    /// passed to them is dropped.
    pub fn attach(&mut self, transport: S) -> Result<DeviceIdentity, S::Error> {
        self.establish(transport, Ownership::Borrowed)
    }

    fn establish(&mut self, transport: S, ownership: Ownership) -> Result<DeviceIdentity, S::Error> {
        if self.state == ConnectionState::Open {
            return Err(Error::AlreadyOpen);
        }
        // A lent transport is only ever handed back, never replaced.
        if self.transport.is_some() {
            return Err(Error::TransportNotReleased);
        }
        self.transport = Some(transport);
        self.ownership = ownership;
        self.state = ConnectionState::Open;

        // Nothing else is sent to a device we don't recognise.
        let identity = match self.identify() {
            Ok(identity) => identity,
            Err(err) => {
                self.abandon();
                return Err(err);
            }
        };
        info!("Connected to {}", identity);
        self.identity = Some(identity.clone());

        self.initial_requests()?;
        Ok(identity)
    }

    fn identify(&mut self) -> Result<DeviceIdentity, S::Error> {
        let reply = self.link()?.query(&Command::IdentityQuery)?;
        Ok(parse_identity(reply.as_bytes())?)
    }

    /// Output off, over current and over voltage protection off, 0 V and 0 A.
    fn initial_requests(&mut self) -> Result<(), S::Error> {
        let mut link = self.link()?;
        let retries = link.config.readback_retry;

        link.send(&Command::OutputSet(false))?;
        link.send(&Command::OverCurrentProtectionSet(false))?;
        link.send(&Command::OverVoltageProtectionSet(false))?;
        link.set_and_verify(
            &Command::VoltageSet { channel: CHANNEL, volts: 0.0 },
            &Command::VoltageQuery { channel: CHANNEL },
            0.0,
            READBACK_TOLERANCE,
            retries,
        )?;
        link.set_and_verify(
            &Command::CurrentSet { channel: CHANNEL, amps: 0.0 },
            &Command::CurrentQuery { channel: CHANNEL },
            0.0,
            READBACK_TOLERANCE,
            retries,
        )?;
        Ok(())
    }

    /// Give up on a transport without sending anything more.
    fn abandon(&mut self) {
        if self.ownership == Ownership::Owned {
            self.transport = None;
        }
        self.state = ConnectionState::Closed;
    }

    fn link(&mut self) -> Result<Link<'_, S, P>, S::Error> {
        match (self.state, self.transport.as_mut()) {
            (ConnectionState::Open, Some(transport)) => {
                Ok(Link::new(transport, &mut self.pacer, &self.config))
            }
            _ => Err(Error::TransportClosed),
        }
    }

    /// Switch the output off and end the session.
    ///
    /// An owned transport is flushed and dropped even if switching the output off failed, that
    /// failure is still returned. Closing a session which isn't open does nothing.
    pub fn close(&mut self) -> Result<(), S::Error> {
        if self.state != ConnectionState::Open {
            return Ok(());
        }

        let mut result = self.set_output_enabled(false);
        if self.ownership == Ownership::Owned {
            if let Some(mut transport) = self.transport.take() {
                let flushed = transport.flush().map_err(Error::SerialError);
                result = result.and(flushed);
            }
        }
        self.state = ConnectionState::Closed;
        result
    }

    /// Close the session and hand back a transport lent with [`Self::attach`], leaving the
    /// session ready for another `open` or `attach`.
    ///
    /// Owned transports have already been dropped, so this returns `None` for them. Failures
    /// while switching the output off are only logged, call [`Self::close`] first to see them.
    pub fn detach(&mut self) -> Option<S> {
        if let Err(err) = self.close() {
            warn!("PSU failed to switch output off while releasing: {}", err);
        }
        self.transport.take()
    }

    /// Like [`Self::detach`], consuming the session.
    pub fn release(mut self) -> Option<S> {
        self.detach()
    }

    /// Set the output voltage, returning the value the PSU reports back.
    pub fn set_voltage(&mut self, volts: f32) -> Result<f32, S::Error> {
        if !VOLTAGE_RANGE.contains(volts) {
            return Err(Error::InvalidRange);
        }
        let mut link = self.link()?;
        let retries = link.config.readback_retry;
        link.set_and_verify(
            &Command::VoltageSet { channel: CHANNEL, volts },
            &Command::VoltageQuery { channel: CHANNEL },
            volts,
            READBACK_TOLERANCE,
            retries,
        )
    }

    /// Set the current limit, returning the value the PSU reports back.
    pub fn set_current(&mut self, amps: f32) -> Result<f32, S::Error> {
        if !CURRENT_RANGE.contains(amps) {
            return Err(Error::InvalidRange);
        }
        let mut link = self.link()?;
        let retries = link.config.readback_retry;
        link.set_and_verify(
            &Command::CurrentSet { channel: CHANNEL, amps },
            &Command::CurrentQuery { channel: CHANNEL },
            amps,
            READBACK_TOLERANCE,
            retries,
        )
    }

    /// Return the measured output voltage in volts.
    pub fn get_voltage(&mut self) -> Result<f32, S::Error> {
        self.read_numeric(&Command::VoltageOutQuery { channel: CHANNEL })
    }

    /// Return the measured output current in amps.
    pub fn get_current(&mut self) -> Result<f32, S::Error> {
        self.read_numeric(&Command::CurrentOutQuery { channel: CHANNEL })
    }

    /// Return the voltage set-point in volts.
    pub fn get_voltage_setpoint(&mut self) -> Result<f32, S::Error> {
        self.read_numeric(&Command::VoltageQuery { channel: CHANNEL })
    }

    /// Return the current limit set-point in amps.
    pub fn get_current_setpoint(&mut self) -> Result<f32, S::Error> {
        self.read_numeric(&Command::CurrentQuery { channel: CHANNEL })
    }

    fn read_numeric(&mut self, command: &Command) -> Result<f32, S::Error> {
        let reply = self.link()?.query(command)?;
        reply
            .parse_f32()
            .ok_or_else(|| Error::MalformedNumericReply(reply.text()))
    }

    /// Enable/disable the output, confirmed through the status byte.
    pub fn set_output_enabled(&mut self, enabled: bool) -> Result<(), S::Error> {
        let mut link = self.link()?;
        let retries = link.config.readback_retry;
        link.set_output_and_verify(enabled, retries)?;
        Ok(())
    }

    /// Switch the output off.
    pub fn off(&mut self) -> Result<(), S::Error> {
        self.set_output_enabled(false)
    }

    /// Read and decode the status byte.
    pub fn get_status(&mut self) -> Result<Status, S::Error> {
        let reply = self.link()?.query(&Command::StatusQuery)?;
        Status::from_reply(&reply).ok_or(Error::MalformedStatus)
    }

    /// Read whether the output is enabled or disabled.
    pub fn is_output_enabled(&mut self) -> Result<bool, S::Error> {
        Ok(self.get_status()?.output_enabled)
    }

    /// Get the currently active regulation. [`LimitMode::None`] while the output is off.
    pub fn get_limit_mode(&mut self) -> Result<LimitMode, S::Error> {
        Ok(self.get_status()?.limit_mode)
    }

    /// Identity read when the session was opened.
    pub fn get_identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open && self.transport.is_some()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl<S: embedded_io::Read + embedded_io::Write, P: Pacer> Drop for Ka3005p<S, P> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("PSU failed to switch output off on drop: {}", err);
        }
    }
}

fn check_channel<I: embedded_io::Error>(channel: u8) -> Result<(), I> {
    if channel == CHANNEL {
        Ok(())
    } else {
        Err(Error::InvalidChannel(channel))
    }
}

impl<S: embedded_io::Read + embedded_io::Write, P: Pacer> PowerSupply for Ka3005p<S, P> {
    type Error = Error<S::Error>;

    fn channel_count(&self) -> u8 {
        1
    }

    fn voltage_range(&self) -> ValueRange {
        VOLTAGE_RANGE
    }

    fn current_range(&self) -> ValueRange {
        CURRENT_RANGE
    }

    fn power_range(&self) -> ValueRange {
        POWER_RANGE
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            voltage_limit: true,
            current_limit: true,
            measure_voltage: true,
            measure_current: true,
            output_switch: true,
        }
    }

    fn connected(&self) -> bool {
        self.is_connected()
    }

    fn set_channel_enabled(&mut self, channel: u8, enabled: bool) -> Result<(), S::Error> {
        check_channel::<S::Error>(channel)?;
        self.set_output_enabled(enabled)
    }

    fn set_channel_voltage(&mut self, channel: u8, volts: f32) -> Result<(), S::Error> {
        check_channel::<S::Error>(channel)?;
        self.set_voltage(volts)?;
        Ok(())
    }

    fn set_channel_current(&mut self, channel: u8, amps: f32) -> Result<(), S::Error> {
        check_channel::<S::Error>(channel)?;
        self.set_current(amps)?;
        Ok(())
    }

    fn measure_voltage(&mut self, channel: u8) -> Result<f32, S::Error> {
        check_channel::<S::Error>(channel)?;
        self.get_voltage()
    }

    fn measure_current(&mut self, channel: u8) -> Result<f32, S::Error> {
        check_channel::<S::Error>(channel)?;
        self.get_current()
    }

    fn limit_mode(&mut self, channel: u8) -> Result<LimitMode, S::Error> {
        check_channel::<S::Error>(channel)?;
        self.get_limit_mode()
    }

    fn off(&mut self) -> Result<(), S::Error> {
        self.set_output_enabled(false)
    }
}
