//! This crate provides an interface for communicating with and controlling the Korad KA3005P
//! programmable power supply.
//!
//! It supports `no-std` environments by use of the `no_std` feature flag.
//!
//! | Quantity       | Range     | Resolution |
//! |----------------|-----------|------------|
//! | Output voltage | 0 - 30 V  | 10 mV      |
//! | Current limit  | 0 - 5 A   | 1 mA       |
//! | Output power   | 0 - 150 W |            |
//!
//! The PSU speaks a terse ASCII protocol with no line endings and no acknowledgements. Set
//! commands are therefore read back and checked, see [`verify`]. Replies end with a NUL byte,
//! after a fixed number of characters, or when the port goes quiet, see [`reply::Termination`].
//!
//! The serial port used for PSU comms should be configured like so:
//! * Baud rate: 19200
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//! * A read timeout, e.g. 1 s. A read that times out is how a reply is known to be complete.

#![cfg_attr(feature = "no_std", no_std)]

pub mod capability;
pub mod command;
pub mod config;
pub mod error;
pub mod identity;
pub mod link;
pub mod pacing;
pub mod psu;
pub mod reply;
pub mod status;
pub mod verify;

#[cfg(test)]
mod mock_serial;
