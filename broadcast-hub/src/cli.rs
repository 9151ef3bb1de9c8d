use std::{
    fmt,
    net::{IpAddr, Ipv4Addr},
};

use clap::Parser;

use crate::config::HubConfig;

/// Runs the command, sensor and doorlock hubs side by side.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address every hub binds to.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Port of the command channel. Use 0 for an ephemeral port.
    #[arg(long, default_value_t = Channel::Command.default_port())]
    pub command_port: u16,

    /// Port of the sensor channel. Use 0 for an ephemeral port.
    #[arg(long, default_value_t = Channel::Sensor.default_port())]
    pub sensor_port: u16,

    /// Port of the doorlock channel. Use 0 for an ephemeral port.
    #[arg(long, default_value_t = Channel::Doorlock.default_port())]
    pub doorlock_port: u16,
}

impl Cli {
    pub fn port(&self, channel: Channel) -> u16 {
        match channel {
            Channel::Command => self.command_port,
            Channel::Sensor => self.sensor_port,
            Channel::Doorlock => self.doorlock_port,
        }
    }

    /// One hub configuration per channel, in start order.
    pub fn hub_configs(&self) -> Vec<(Channel, HubConfig)> {
        Channel::ALL
            .into_iter()
            .map(|channel| {
                let config = HubConfig::new(channel.name(), self.port(channel)).with_bind(self.bind);
                (channel, config)
            })
            .collect()
    }
}

/// The independent relays of the smart-home system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Command,
    Sensor,
    Doorlock,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Command, Channel::Sensor, Channel::Doorlock];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Command => "command",
            Channel::Sensor => "sensor",
            Channel::Doorlock => "doorlock",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Channel::Command => 39186,
            Channel::Sensor => 39187,
            Channel::Doorlock => 39189,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
