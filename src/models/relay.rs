// VPN Kill Switch - Relay Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! VPN relay endpoint and pre-connection probe targets.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::wfp::Protocol;

/// The VPN server the tunnel is established with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relay {
    pub endpoint: SocketAddr,
    pub protocol: Protocol,
}

impl Relay {
    pub fn new(ip: IpAddr, port: u16, protocol: Protocol) -> Self {
        Self {
            endpoint: SocketAddr::new(ip, port),
            protocol,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.protocol, Protocol::Tcp | Protocol::Udp) {
            return Err(Error::InvalidArgument(format!(
                "relay protocol must be tcp or udp, got {}",
                self.protocol
            )));
        }
        if self.endpoint.port() == 0 {
            return Err(Error::InvalidArgument("relay port 0 is not allowed".to_string()));
        }
        let ip = self.endpoint.ip();
        if ip.is_unspecified() || ip.is_multicast() {
            return Err(Error::InvalidArgument(format!(
                "{} is not a valid relay address",
                ip
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.endpoint, self.protocol)
    }
}

/// Hosts that may be pinged before the tunnel is up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingableHosts {
    /// Restrict the echo requests to this interface, if set.
    #[serde(default)]
    pub tunnel_interface_alias: Option<String>,
    pub hosts: Vec<IpAddr>,
}

impl PingableHosts {
    pub fn new(hosts: Vec<IpAddr>) -> Self {
        Self {
            tunnel_interface_alias: None,
            hosts,
        }
    }

    pub fn via(mut self, alias: &str) -> Self {
        self.tunnel_interface_alias = Some(alias.to_string());
        self
    }

    /// A present host list must not be empty.
    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(Error::InvalidArgument(
                "invalid pingable hosts: host list is empty".to_string(),
            ));
        }
        if let Some(alias) = &self.tunnel_interface_alias {
            if alias.trim().is_empty() {
                return Err(Error::InvalidArgument(
                    "invalid pingable hosts: empty interface alias".to_string(),
                ));
            }
        }
        Ok(())
    }
}
