//! A multi-client chat server speaking the DNC line protocol over TCP.

pub mod bot;
pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod files;
pub mod logging;
pub mod messages;
pub mod protocol;
pub mod server;

/// Description of the DNC protocol, printed by `--rfc`.
pub const RFC: &str = include_str!("../rfc.txt");
