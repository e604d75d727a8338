use std::env;

use inquire::Text;
use ka3005p_psu::{
    config::SessionConfig,
    pacing::ThreadPacer,
    psu::Ka3005p,
};
use serialport::SerialPort;

// Configuration constants - adjust these for your setup
const BAUD_RATE: u32 = 19200;
// A read that times out marks the end of a reply, so this bounds how long every query takes.
const SERIAL_TIMEOUT_MS: u64 = 1000;
const OUTPUT_VOLTAGE_V: f32 = 5.0;
const CURRENT_LIMIT_A: f32 = 0.1;
const STABILIZATION_DELAY_MS: u64 = 1000;

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            // The read timeout is how the session notices the end of a reply.
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

fn main() {
    env_logger::init();

    // Get serial port from command line arg or prompt for it
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        Text::new("Serial port of the PSU:")
            .with_placeholder("/dev/ttyACM0")
            .prompt()
            .expect("Failed to read port name")
    });

    println!("Using port: {}", port_name);

    // Open serial port
    let port = serialport::new(&port_name, BAUD_RATE)
        .timeout(std::time::Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .expect("Failed to open serial port");

    let config = SessionConfig::default().with_debug_trace(true);
    let mut psu = Ka3005p::new(config, ThreadPacer);

    // Identify the PSU, this also switches the output off and zeroes the set-points
    let identity = psu.open(PortWrapper(port)).unwrap();
    println!("Connected to: {}", identity);

    let confirmed = psu.set_voltage(OUTPUT_VOLTAGE_V).unwrap();
    println!("Set output voltage to {:.2}V", confirmed);

    let confirmed = psu.set_current(CURRENT_LIMIT_A).unwrap();
    println!("Set current limit to {:.3}A", confirmed);

    psu.set_output_enabled(true).unwrap();
    println!("Output enabled");

    // Wait for output to stabilize
    std::thread::sleep(std::time::Duration::from_millis(STABILIZATION_DELAY_MS));

    println!("Measured output voltage: {:.2}V", psu.get_voltage().unwrap());
    println!("Measured output current: {:.3}A", psu.get_current().unwrap());
    println!("Limit mode: {:?}", psu.get_limit_mode().unwrap());

    // Dropping the session would switch the output off too, closing reports failures
    psu.close().unwrap();
    println!("Output disabled, session closed");
}
