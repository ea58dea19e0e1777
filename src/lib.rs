//! Serial control of an RF signal generator: port discovery, the WHOAMI
//! handshake, option strings turned into generator commands, and readback
//! of the measured frequency and power.

pub mod config;
pub mod devices;
pub mod monitor;
pub mod options;
