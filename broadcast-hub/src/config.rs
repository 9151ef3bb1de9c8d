use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Where a hub listens and what it calls itself in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub name: String,
    pub bind: IpAddr,
    /// `0` asks the OS for an ephemeral port.
    pub port: u16,
}

impl HubConfig {
    /// Listens on every interface, like a plain server socket would.
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port,
        }
    }

    pub fn with_bind(mut self, bind: IpAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}
