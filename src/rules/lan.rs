// VPN Kill Switch - Local Network Rules
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Administrative exceptions for the local network.

use std::net::{Ipv4Addr, Ipv6Addr};

use super::{network, permit, weights};
use crate::error::Result;
use crate::guids::Role;
use crate::wfp::{Condition, FilterDescriptor, Layer, Protocol};

const DHCPV4_CLIENT_PORT: u16 = 68;
const DHCPV4_SERVER_PORT: u16 = 67;
const DHCPV6_CLIENT_PORT: u16 = 546;
const DHCPV6_SERVER_PORT: u16 = 547;

fn private_ipv4() -> Result<Vec<Condition>> {
    Ok(vec![
        network(Ipv4Addr::new(10, 0, 0, 0), 8)?,
        network(Ipv4Addr::new(172, 16, 0, 0), 12)?,
        network(Ipv4Addr::new(192, 168, 0, 0), 16)?,
        network(Ipv4Addr::new(169, 254, 0, 0), 16)?,
    ])
}

fn private_ipv6() -> Result<Vec<Condition>> {
    Ok(vec![
        network(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10)?,
        network(Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7)?,
    ])
}

/// Private networks, link-local, multicast, and loopback.
pub fn permit_lan() -> Result<Vec<FilterDescriptor>> {
    let mut outbound_v4 = private_ipv4()?;
    outbound_v4.push(network(Ipv4Addr::new(224, 0, 0, 0), 4)?);
    let mut outbound_v6 = private_ipv6()?;
    outbound_v6.push(network(Ipv6Addr::new(0xff00, 0, 0, 0, 0, 0, 0, 0), 8)?);

    let loopback_v4 = network(Ipv4Addr::new(127, 0, 0, 0), 8)?;
    let loopback_v6 = network(Ipv6Addr::LOCALHOST, 128)?;

    Ok(vec![
        permit(Role::PermitLanOutboundIpv4, Layer::OUTBOUND_IPV4, weights::PERMIT, outbound_v4),
        permit(Role::PermitLanOutboundIpv6, Layer::OUTBOUND_IPV6, weights::PERMIT, outbound_v6),
        permit(Role::PermitLanInboundIpv4, Layer::INBOUND_IPV4, weights::PERMIT, private_ipv4()?),
        permit(Role::PermitLanInboundIpv6, Layer::INBOUND_IPV6, weights::PERMIT, private_ipv6()?),
        permit(
            Role::PermitLoopbackOutboundIpv4,
            Layer::OUTBOUND_IPV4,
            weights::PERMIT_PRIORITY,
            vec![loopback_v4.clone()],
        ),
        permit(
            Role::PermitLoopbackOutboundIpv6,
            Layer::OUTBOUND_IPV6,
            weights::PERMIT_PRIORITY,
            vec![loopback_v6.clone()],
        ),
        permit(
            Role::PermitLoopbackInboundIpv4,
            Layer::INBOUND_IPV4,
            weights::PERMIT_PRIORITY,
            vec![loopback_v4],
        ),
        permit(
            Role::PermitLoopbackInboundIpv6,
            Layer::INBOUND_IPV6,
            weights::PERMIT_PRIORITY,
            vec![loopback_v6],
        ),
    ])
}

fn dhcp(client: u16, server: u16) -> Vec<Condition> {
    vec![
        Condition::Protocol(Protocol::Udp),
        Condition::LocalPort(client),
        Condition::RemotePort(server),
    ]
}

/// Address negotiation with a DHCP server.
pub fn permit_dhcp() -> Vec<FilterDescriptor> {
    let v4 = dhcp(DHCPV4_CLIENT_PORT, DHCPV4_SERVER_PORT);
    let v6 = dhcp(DHCPV6_CLIENT_PORT, DHCPV6_SERVER_PORT);
    vec![
        permit(Role::PermitDhcpOutboundIpv4, Layer::OUTBOUND_IPV4, weights::PERMIT, v4.clone()),
        permit(Role::PermitDhcpInboundIpv4, Layer::INBOUND_IPV4, weights::PERMIT, v4),
        permit(Role::PermitDhcpOutboundIpv6, Layer::OUTBOUND_IPV6, weights::PERMIT, v6.clone()),
        permit(Role::PermitDhcpInboundIpv6, Layer::INBOUND_IPV6, weights::PERMIT, v6),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wfp::Family;

    #[test]
    fn test_lan_filters_match_their_family() {
        let filters = permit_lan().unwrap();
        assert_eq!(filters.len(), 8);
        for filter in &filters {
            assert!(filter.is_permit());
            assert!(filter.validate().is_ok());
        }
        let v6 = filters
            .iter()
            .filter(|f| f.layer.family == Family::Ipv6)
            .count();
        assert_eq!(v6, 4);
    }

    #[test]
    fn test_dhcp_ports() {
        let filters = permit_dhcp();
        assert!(filters[0].conditions.contains(&Condition::LocalPort(68)));
        assert!(filters[0].conditions.contains(&Condition::RemotePort(67)));
        assert!(filters[3].conditions.contains(&Condition::LocalPort(546)));
    }
}
