// VPN Kill Switch - Packet Classification
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Evaluates a committed rule set against a connection attempt.
//!
//! Sublayers are consulted from highest to lowest weight. The first sublayer
//! holding a filter that matches decides, using its highest-weight matching
//! filter (block wins a tie). A packet no filter matches is permitted.

use std::cmp::Reverse;
use std::net::{IpAddr, SocketAddr};

use super::memory::ObjectSet;
use super::{Action, Condition, Direction, Family, FilterDescriptor, Layer, Protocol};

const ICMP_ECHO_REQUEST: u8 = 8;
const ICMPV6_ECHO_REQUEST: u8 = 128;

/// A connection attempt seen at one of the authorization layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub direction: Direction,
    pub remote: IpAddr,
    pub remote_port: Option<u16>,
    pub local_port: Option<u16>,
    pub protocol: Protocol,
    pub interface: Option<String>,
    pub icmp_type: Option<u8>,
}

impl Packet {
    pub fn outbound(remote: SocketAddr, protocol: Protocol) -> Self {
        Self {
            direction: Direction::Outbound,
            remote: remote.ip(),
            remote_port: Some(remote.port()),
            local_port: None,
            protocol,
            interface: None,
            icmp_type: None,
        }
    }

    pub fn inbound(remote: SocketAddr, protocol: Protocol) -> Self {
        Self {
            direction: Direction::Inbound,
            ..Self::outbound(remote, protocol)
        }
    }

    /// An outbound ICMP echo request.
    pub fn ping(remote: IpAddr) -> Self {
        let (protocol, icmp_type) = match remote {
            IpAddr::V4(_) => (Protocol::Icmp, ICMP_ECHO_REQUEST),
            IpAddr::V6(_) => (Protocol::IcmpV6, ICMPV6_ECHO_REQUEST),
        };
        Self {
            direction: Direction::Outbound,
            remote,
            remote_port: None,
            local_port: None,
            protocol,
            interface: None,
            icmp_type: Some(icmp_type),
        }
    }

    pub fn via(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_string());
        self
    }

    pub fn with_local_port(mut self, port: u16) -> Self {
        self.local_port = Some(port);
        self
    }

    pub fn layer(&self) -> Layer {
        Layer::new(self.direction, Family::of(&self.remote))
    }

    fn matches_condition(&self, condition: &Condition) -> bool {
        match condition {
            Condition::RemoteAddress(net) => net.contains(self.remote),
            Condition::RemotePort(port) => self.remote_port == Some(*port),
            Condition::LocalPort(port) => self.local_port == Some(*port),
            Condition::Protocol(protocol) => self.protocol == *protocol,
            Condition::InterfaceAlias(alias) => self
                .interface
                .as_deref()
                .is_some_and(|iface| iface.eq_ignore_ascii_case(alias)),
            Condition::IcmpType(ty) => self.icmp_type == Some(*ty),
        }
    }

    /// Alternatives on one field are OR-ed, fields are AND-ed.
    fn matches(&self, filter: &FilterDescriptor) -> bool {
        if filter.layer != self.layer() {
            return false;
        }
        filter.conditions.iter().all(|condition| {
            filter
                .conditions
                .iter()
                .filter(|other| other.field() == condition.field())
                .any(|other| self.matches_condition(other))
        })
    }
}

pub(super) fn classify(objects: &ObjectSet, packet: &Packet) -> Action {
    let mut sublayers: Vec<_> = objects.sublayers().collect();
    sublayers.sort_by_key(|s| Reverse(s.weight));

    for sublayer in sublayers {
        let decision = objects
            .filters()
            .filter(|f| f.sublayer == sublayer.id && packet.matches(f))
            .max_by_key(|f| (f.weight.value(), f.action == Action::Block));

        if let Some(filter) = decision {
            return filter.action;
        }
    }

    Action::Permit
}
