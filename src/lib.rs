//! Host-side HCI client for Bluetooth LE controllers attached over a
//! byte-oriented transport (typically a UART running H4 framing).
//!
//! The crate marshals typed host commands into HCI command packets, enforces
//! the single-outstanding-command rule of [Vol 4] Part E, demultiplexes
//! controller events back to typed subscriptions, and surfaces controller
//! status codes as errors. Everything above HCI (GAP, GATT, SMP) and below it
//! (serial port discovery, Link Layer) lives outside this crate.

pub mod hci;
pub mod transport;
mod utils;
