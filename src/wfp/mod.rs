// VPN Kill Switch - Filtering Objects
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Object model of the packet filtering engine and the adapter used to
//! manipulate it.
//!
//! The engine stores three kinds of objects. A provider owns sublayers and
//! filters. A sublayer is a priority band. A filter is a single rule placed
//! in a sublayer at a layer (direction + address family).

mod classify;
mod engine;
mod memory;
mod snapshot;
mod transaction;

use std::fmt;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

pub use classify::Packet;
pub use engine::{FilterEngine, SessionFactory};
pub use memory::{Fault, Session, Store};
pub use transaction::Transaction;

/// Traffic direction of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outbound,
    Inbound,
}

/// Address family of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl Family {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Family::Ipv4,
            IpAddr::V6(_) => Family::Ipv6,
        }
    }
}

/// Interception point: connection authorization in one direction for one
/// address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layer {
    pub direction: Direction,
    pub family: Family,
}

impl Layer {
    pub const OUTBOUND_IPV4: Layer = Layer::new(Direction::Outbound, Family::Ipv4);
    pub const OUTBOUND_IPV6: Layer = Layer::new(Direction::Outbound, Family::Ipv6);
    pub const INBOUND_IPV4: Layer = Layer::new(Direction::Inbound, Family::Ipv4);
    pub const INBOUND_IPV6: Layer = Layer::new(Direction::Inbound, Family::Ipv6);

    pub const fn new(direction: Direction, family: Family) -> Self {
        Self { direction, family }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::Outbound => "auth-connect",
            Direction::Inbound => "auth-recv-accept",
        };
        let family = match self.family {
            Family::Ipv4 => "v4",
            Family::Ipv6 => "v6",
        };
        write!(f, "{}-{}", direction, family)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Permit,
    Block,
}

/// How long a filter outlives the session that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Persistence {
    /// Removed when the creating session closes.
    Volatile,
    /// Survives session end and engine restart; removed only by delete.
    Persistent,
    /// Enforced at boot, before the engine service is running.
    BootTime,
}

impl Persistence {
    pub fn outlives_session(self) -> bool {
        !matches!(self, Persistence::Volatile)
    }
}

/// Priority of a filter inside its sublayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weight {
    Min,
    Max,
    Exact(u64),
}

impl Weight {
    pub fn value(self) -> u64 {
        match self {
            Weight::Min => 0,
            Weight::Max => u64::MAX,
            Weight::Exact(w) => w,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    IcmpV6,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::IcmpV6 => "icmpv6",
        })
    }
}

/// One match condition of a filter.
///
/// Conditions on the same field are alternatives; conditions on different
/// fields must all hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "field", content = "value")]
pub enum Condition {
    RemoteAddress(IpNetwork),
    RemotePort(u16),
    LocalPort(u16),
    Protocol(Protocol),
    InterfaceAlias(String),
    IcmpType(u8),
}

impl Condition {
    /// Discriminant used to group alternatives.
    pub(crate) fn field(&self) -> u8 {
        match self {
            Condition::RemoteAddress(_) => 0,
            Condition::RemotePort(_) => 1,
            Condition::LocalPort(_) => 2,
            Condition::Protocol(_) => 3,
            Condition::InterfaceAlias(_) => 4,
            Condition::IcmpType(_) => 5,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::RemoteAddress(net) => write!(f, "remote={}", net),
            Condition::RemotePort(port) => write!(f, "rport={}", port),
            Condition::LocalPort(port) => write!(f, "lport={}", port),
            Condition::Protocol(proto) => write!(f, "proto={}", proto),
            Condition::InterfaceAlias(alias) => write!(f, "iface={}", alias),
            Condition::IcmpType(ty) => write!(f, "icmp-type={}", ty),
        }
    }
}

/// Top-level namespace object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub persistent: bool,
}

/// Priority band grouping filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SublayerDescriptor {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub provider: Uuid,
    pub weight: u16,
    pub persistent: bool,
}

/// A single filtering rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub provider: Uuid,
    pub sublayer: Uuid,
    pub layer: Layer,
    pub weight: Weight,
    pub action: Action,
    pub conditions: Vec<Condition>,
    pub persistence: Persistence,
}

impl FilterDescriptor {
    /// Check the descriptor is well formed for its layer.
    pub fn validate(&self) -> Result<()> {
        if self.persistence == Persistence::BootTime && self.action != Action::Block {
            return Err(Error::rejected(
                "add",
                self.id,
                "boot-time filters must block",
            ));
        }

        for condition in &self.conditions {
            match condition {
                Condition::RemoteAddress(net) if Family::of(&net.ip()) != self.layer.family => {
                    return Err(Error::rejected(
                        "add",
                        self.id,
                        format!("address {} does not match layer {}", net, self.layer),
                    ));
                }
                Condition::InterfaceAlias(alias) if alias.trim().is_empty() => {
                    return Err(Error::rejected("add", self.id, "empty interface alias"));
                }
                Condition::Protocol(Protocol::Icmp) if self.layer.family == Family::Ipv6 => {
                    return Err(Error::rejected("add", self.id, "ICMPv4 on an IPv6 layer"));
                }
                Condition::Protocol(Protocol::IcmpV6) if self.layer.family == Family::Ipv4 => {
                    return Err(Error::rejected("add", self.id, "ICMPv6 on an IPv4 layer"));
                }
                _ => {}
            }
        }

        Ok(())
    }

    pub fn is_permit(&self) -> bool {
        self.action == Action::Permit
    }
}
