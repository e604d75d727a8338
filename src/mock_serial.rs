//! We use this mocking module in unit tests to emulate a serial port.
//!
//! It either replays scripted bytes, or emulates a KA3005P which answers the frames written to
//! it. Reading with nothing queued behaves like a serial port read timeout.

use core::fmt::Write as _;

use thiserror::Error;

/// Capacity of the written frame log.
const FRAME_LOG: usize = 128;

/// Our mock type used to emulate a serial port.
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: heapless::Vec<u8, 1024>,
    /// Every write call, one frame each
    frames: heapless::Vec<heapless::String<16>, FRAME_LOG>,
    /// Bytes still to be read. `None` is a read timeout.
    read_queue: heapless::Deque<Option<u8>, 512>,
    /// Number of read calls made
    read_attempts: usize,
    /// Emulated PSU answering written frames, if any
    device: Option<EmulatedPsu>,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
}

#[derive(Error, Debug)]
pub enum MockSerialError {
    /// Simulated timeout error
    #[error("timed out")]
    Timeout,
    /// Simulated buffer overflow
    #[error("buffer overflow")]
    BufferOverflow,
    /// Generic simulated error for testing
    #[error("simulated error")]
    SimulatedError,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

/// State of the emulated KA3005P, plus knobs to make it misbehave.
#[derive(Debug, Clone)]
pub struct EmulatedPsu {
    pub identity: &'static [u8],
    pub voltage_setting: f32,
    pub current_setting: f32,
    pub output: bool,
    pub over_current_protection: bool,
    pub over_voltage_protection: bool,
    /// Report constant voltage regulation (status bit 0x01) while the output is on.
    pub constant_voltage: bool,
    /// Current drawn by the load while the output is on.
    pub load_current: f32,
    /// Added to the voltage setting when it is read back.
    pub voltage_skew: f32,
    /// Added to the current setting when it is read back.
    pub current_skew: f32,
    /// Answer set-point queries with something unparsable.
    pub garbage_readback: bool,
    /// `OUT` commands are swallowed.
    pub ignore_output: bool,
    /// Never answer anything.
    pub silent: bool,
}

impl Default for EmulatedPsu {
    fn default() -> Self {
        Self {
            identity: b"KORAD KA3005P V5.5 SN:00123456",
            voltage_setting: 12.0,
            current_setting: 1.0,
            output: true,
            over_current_protection: true,
            over_voltage_protection: true,
            constant_voltage: true,
            load_current: 0.25,
            voltage_skew: 0.0,
            current_skew: 0.0,
            garbage_readback: false,
            ignore_output: false,
            silent: false,
        }
    }
}

impl EmulatedPsu {
    fn status_byte(&self) -> u8 {
        // Bits we don't decode are set to make sure they are ignored.
        let mut status = 0x10;
        if self.output {
            status |= 0x40;
            if self.constant_voltage {
                status |= 0x01;
            }
        }
        status
    }

    /// Handle one frame, returning the reply to queue, if any.
    fn respond(&mut self, frame: &str) -> heapless::Vec<u8, 32> {
        let mut reply: heapless::String<32> = heapless::String::new();
        if self.silent {
            return heapless::Vec::new();
        }

        match frame {
            "*IDN?" => {
                return heapless::Vec::from_slice(self.identity).unwrap_or_default();
            }
            "STATUS?" => {
                return heapless::Vec::from_slice(&[self.status_byte()]).unwrap_or_default();
            }
            "OUT1" | "OUT0" => {
                if !self.ignore_output {
                    self.output = frame == "OUT1";
                }
            }
            "OCP1" | "OCP0" => self.over_current_protection = frame == "OCP1",
            "OVP1" | "OVP0" => self.over_voltage_protection = frame == "OVP1",
            "VSET1?" => {
                if self.garbage_readback {
                    let _ = reply.push_str("?\u{1}?\u{1}?");
                } else {
                    let _ = write!(reply, "{:05.2}", self.voltage_setting + self.voltage_skew);
                }
            }
            "ISET1?" => {
                if self.garbage_readback {
                    let _ = reply.push_str("-x-x-");
                } else {
                    let _ = write!(reply, "{:05.3}", self.current_setting + self.current_skew);
                }
            }
            "VOUT1?" => {
                let volts = if self.output { self.voltage_setting } else { 0.0 };
                let _ = write!(reply, "{:05.2}", volts);
            }
            "IOUT1?" => {
                let amps = if self.output { self.load_current } else { 0.0 };
                let _ = write!(reply, "{:05.3}", amps);
            }
            _ => {
                if let Some(value) = frame.strip_prefix("VSET1:") {
                    if let Ok(volts) = value.parse::<f32>() {
                        self.voltage_setting = volts;
                    }
                } else if let Some(value) = frame.strip_prefix("ISET1:") {
                    if let Ok(amps) = value.parse::<f32>() {
                        self.current_setting = amps;
                    }
                }
            }
        }

        heapless::Vec::from_slice(reply.as_bytes()).unwrap_or_default()
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }

        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;

        let frame = core::str::from_utf8(buf).map_err(|_| MockSerialError::SimulatedError)?;
        let frame: heapless::String<16> =
            heapless::String::try_from(frame).map_err(|_| MockSerialError::BufferOverflow)?;
        self.frames
            .push(frame.clone())
            .map_err(|_| MockSerialError::BufferOverflow)?;

        if let Some(device) = self.device.as_mut() {
            let reply = device.respond(&frame);
            for &byte in reply.iter() {
                self.read_queue
                    .push_back(Some(byte))
                    .map_err(|_| MockSerialError::BufferOverflow)?;
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read_attempts += 1;
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        let mut count = 0;
        while count < buf.len() {
            match self.read_queue.front() {
                Some(Some(byte)) => {
                    buf[count] = *byte;
                    self.read_queue.pop_front();
                    count += 1;
                }
                Some(None) if count == 0 => {
                    self.read_queue.pop_front();
                    return Err(MockSerialError::Timeout);
                }
                // Report what we have, the timeout comes with the next read.
                Some(None) => break,
                None if count == 0 => return Err(MockSerialError::Timeout),
                None => break,
            }
        }
        Ok(count)
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            frames: heapless::Vec::new(),
            read_queue: heapless::Deque::new(),
            read_attempts: 0,
            device: None,
            should_error_on_write: false,
            should_error_on_read: false,
        }
    }

    /// Create a MockSerial which answers like the given PSU.
    pub fn emulating(device: EmulatedPsu) -> Self {
        let mut mock = Self::new();
        mock.device = Some(device);
        mock
    }

    /// Create a MockSerial which answers like a healthy KA3005P.
    pub fn ka3005p() -> Self {
        Self::emulating(EmulatedPsu::default())
    }

    /// The emulated PSU. Panics if this mock only replays scripted data.
    pub fn device(&mut self) -> &mut EmulatedPsu {
        self.device.as_mut().expect("mock is not emulating a PSU")
    }

    /// Set the data that will be returned when read() is called
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.read_queue.clear();
        self.extend_read_data(data)
    }

    /// Queue more data behind what is already waiting to be read
    pub fn extend_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        for &byte in data {
            self.read_queue
                .push_back(Some(byte))
                .map_err(|_| MockSerialError::BufferOverflow)?;
        }
        Ok(())
    }

    /// Queue `count` read timeouts behind what is already waiting to be read
    pub fn queue_timeouts(&mut self, count: usize) {
        for _ in 0..count {
            let _ = self.read_queue.push_back(None);
        }
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Every frame written, in order
    pub fn frames(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().map(|frame| frame.as_str())
    }

    /// Clear the write buffer and frame log
    pub fn clear_written_data(&mut self) {
        self.write_buffer.clear();
        self.frames.clear();
    }

    /// Number of read() calls so far
    pub fn read_attempts(&self) -> usize {
        self.read_attempts
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, Write};

    #[test]
    fn test_write_data() {
        let mut mock = MockSerial::new();
        let result = mock.write(b"OUT1");
        assert_eq!(result.unwrap(), 4);
        assert_eq!(mock.written_data(), b"OUT1");
        let mut frames = mock.frames();
        assert_eq!(frames.next(), Some("OUT1"));
        assert_eq!(frames.next(), None);
    }

    #[test]
    fn test_read_timeout_when_no_data() {
        let mut mock = MockSerial::new();
        let mut buffer = [0u8; 10];

        let result = mock.read(&mut buffer);
        assert!(matches!(result, Err(MockSerialError::Timeout)));
        assert_eq!(mock.read_attempts(), 1);
    }

    #[test]
    fn test_queued_timeouts_split_reads() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"ab").unwrap();
        mock.queue_timeouts(1);
        mock.extend_read_data(b"c").unwrap();

        let mut buffer = [0u8; 10];
        assert_eq!(mock.read(&mut buffer).unwrap(), 2);
        assert_eq!(&buffer[..2], b"ab");
        assert!(mock.read(&mut buffer).is_err());
        assert_eq!(mock.read(&mut buffer).unwrap(), 1);
        assert_eq!(buffer[0], b'c');
        assert!(mock.read(&mut buffer).is_err());
    }

    #[test]
    fn test_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert!(matches!(mock.write(b"test"), Err(MockSerialError::SimulatedError)));
        assert!(mock.flush().is_err());
        assert!(mock.written_data().is_empty());

        mock.set_read_data(b"data").unwrap();
        mock.set_read_error(true);
        let mut buffer = [0u8; 4];
        assert!(matches!(mock.read(&mut buffer), Err(MockSerialError::SimulatedError)));
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(MockSerialError::Timeout.kind(), embedded_io::ErrorKind::TimedOut));
        assert!(matches!(
            MockSerialError::BufferOverflow.kind(),
            embedded_io::ErrorKind::OutOfMemory
        ));
        assert!(matches!(MockSerialError::SimulatedError.kind(), embedded_io::ErrorKind::Other));
    }

    #[test]
    fn test_emulated_setpoints() {
        let mut mock = MockSerial::ka3005p();
        mock.write(b"VSET1:05.50").unwrap();
        mock.write(b"VSET1?").unwrap();

        let mut buffer = [0u8; 5];
        assert_eq!(mock.read(&mut buffer).unwrap(), 5);
        assert_eq!(&buffer, b"05.50");
        assert_eq!(mock.device().voltage_setting, 5.5);
    }

    #[test]
    fn test_emulated_status() {
        let mut mock = MockSerial::ka3005p();
        mock.write(b"OUT0").unwrap();
        mock.write(b"STATUS?").unwrap();

        let mut buffer = [0u8; 1];
        mock.read(&mut buffer).unwrap();
        assert_eq!(buffer[0] & 0x40, 0);

        mock.device().ignore_output = true;
        mock.write(b"OUT1").unwrap();
        assert!(!mock.device().output);
    }

    #[test]
    fn test_silent_device() {
        let mut mock = MockSerial::ka3005p();
        mock.device().silent = true;
        mock.write(b"*IDN?").unwrap();
        let mut buffer = [0u8; 1];
        assert!(mock.read(&mut buffer).is_err());
    }
}
