//! # Network layer client for Ai-Thinker Combo-AT WiFi modems
//!
//! Turns the serial line of a Combo-AT modem (e.g. Ai-WB2 series) into a socket interface with up
//! to eight simultaneous TCP, UDP or TLS connections.
//!
//! * [device::Device] issues commands and offers the socket calls of [netdev::Netdev]
//! * [runner::Runner] reads everything the modem sends and needs to be polled by a background task
//! * [wifi::WifiAdapter] joins a WIFI network
//! * [connection] adapts the driver to `embedded-nal-async`
#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

extern crate alloc;

#[macro_use]
mod fmt;

pub mod commands;
pub mod config;
pub mod connection;
pub mod correlator;
pub mod device;
pub mod error_codes;
pub mod netdev;
pub mod parser;
pub mod responses;
pub mod runner;
pub mod stack;
pub mod urc;
pub mod wifi;

#[cfg(test)]
mod tests;
