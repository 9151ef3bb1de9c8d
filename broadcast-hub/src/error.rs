use std::{io, net::SocketAddr};

use thiserror::Error;

/// Failures surfaced to whoever starts a hub. Everything that happens after
/// start stays inside the hub and is only logged.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub '{name}' failed to bind {addr}")]
    Bind {
        name: String,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("hub '{name}' could not read its bound address")]
    LocalAddr {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("hub '{name}' is already started")]
    AlreadyStarted { name: String },
}
