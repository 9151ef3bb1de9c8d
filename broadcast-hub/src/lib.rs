//! Line-oriented TCP broadcast hubs.
//!
//! A hub listens on one port, accepts any number of clients, and relays each
//! newline-terminated line it receives from one client to every other
//! connected client. The owning process can also hand the hub a subscriber
//! callback that sees every line, and inject lines of its own.
//!
//! - [`hub`] owns the listener, the accept loop and the public handle.
//! - [`connection`] runs one read loop per accepted client.
//! - [`registry`] tracks the write side of every live client and performs
//!   the broadcast itself.
//! - [`subscriber`] holds the single replaceable event callback.
//! - [`message`] trims lines and implements the newline framing.
//! - [`config`] and [`error`] carry hub settings and startup failures.
//! - [`cli`] parses flags for the bundled binary that wires the command,
//!   sensor and doorlock channels.

pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod hub;
pub mod message;
pub mod registry;
pub mod subscriber;

pub use config::HubConfig;
pub use error::HubError;
pub use hub::BroadcastHub;
pub use registry::{BroadcastReport, ConnectionId};
