// VPN Kill Switch - Tunnel Rules
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Rules that open the path to the relay and through the tunnel.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::{deny, host, permit, weights};
use crate::guids::Role;
use crate::models::{PingableHosts, Relay};
use crate::wfp::{Condition, Direction, Family, FilterDescriptor, Layer, Protocol};

const DNS_PORT: u16 = 53;
const ICMP_ECHO_REQUEST: u8 = 8;
const ICMPV6_ECHO_REQUEST: u8 = 128;

/// Outbound connections to the relay endpoint only.
pub fn permit_relay(relay: &Relay) -> FilterDescriptor {
    let ip = relay.endpoint.ip();
    permit(
        Role::PermitRelay,
        Layer::new(Direction::Outbound, Family::of(&ip)),
        weights::PERMIT_PRIORITY,
        vec![
            host(ip),
            Condition::RemotePort(relay.endpoint.port()),
            Condition::Protocol(relay.protocol),
        ],
    )
}

/// ICMP echo requests to the probe hosts, one filter per address family
/// that has any.
pub fn permit_ping(hosts: &PingableHosts) -> Vec<FilterDescriptor> {
    let families = [
        (Role::PermitPingOutboundIpv4, Family::Ipv4, Protocol::Icmp, ICMP_ECHO_REQUEST),
        (Role::PermitPingOutboundIpv6, Family::Ipv6, Protocol::IcmpV6, ICMPV6_ECHO_REQUEST),
    ];

    families
        .into_iter()
        .filter_map(|(role, family, protocol, echo)| {
            let mut conditions: Vec<Condition> = hosts
                .hosts
                .iter()
                .filter(|addr| Family::of(addr) == family)
                .map(|addr| host(*addr))
                .collect();
            if conditions.is_empty() {
                return None;
            }
            conditions.push(Condition::Protocol(protocol));
            conditions.push(Condition::IcmpType(echo));
            if let Some(alias) = &hosts.tunnel_interface_alias {
                conditions.push(Condition::InterfaceAlias(alias.clone()));
            }
            Some(permit(
                role,
                Layer::new(Direction::Outbound, family),
                weights::PERMIT,
                conditions,
            ))
        })
        .collect()
}

/// Everything through the tunnel interface.
pub fn permit_tunnel(alias: &str) -> Vec<FilterDescriptor> {
    let via = || vec![Condition::InterfaceAlias(alias.to_string())];
    vec![
        permit(Role::PermitTunnelOutboundIpv4, Layer::OUTBOUND_IPV4, weights::PERMIT, via()),
        permit(Role::PermitTunnelOutboundIpv6, Layer::OUTBOUND_IPV6, weights::PERMIT, via()),
        permit(Role::PermitTunnelInboundIpv4, Layer::INBOUND_IPV4, weights::PERMIT, via()),
        permit(Role::PermitTunnelInboundIpv6, Layer::INBOUND_IPV6, weights::PERMIT, via()),
    ]
}

fn dns_to(addr: IpAddr) -> Vec<Condition> {
    vec![host(addr), Condition::RemotePort(DNS_PORT)]
}

/// DNS to the tunnel resolvers.
pub fn permit_dns(v4: Ipv4Addr, v6: Option<Ipv6Addr>) -> Vec<FilterDescriptor> {
    let mut filters = vec![permit(
        Role::PermitDnsOutboundIpv4,
        Layer::OUTBOUND_IPV4,
        weights::PERMIT_DNS,
        dns_to(IpAddr::V4(v4)),
    )];
    if let Some(v6) = v6 {
        filters.push(permit(
            Role::PermitDnsOutboundIpv6,
            Layer::OUTBOUND_IPV6,
            weights::PERMIT_DNS,
            dns_to(IpAddr::V6(v6)),
        ));
    }
    filters
}

/// Block DNS to any other resolver, including over the tunnel.
pub fn restrict_dns() -> Vec<FilterDescriptor> {
    let port = || vec![Condition::RemotePort(DNS_PORT)];
    vec![
        deny(Role::RestrictDnsOutboundIpv4, Layer::OUTBOUND_IPV4, weights::RESTRICT_DNS, port()),
        deny(Role::RestrictDnsOutboundIpv6, Layer::OUTBOUND_IPV6, weights::RESTRICT_DNS, port()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_filter_pins_endpoint() {
        let relay = Relay::new("1.2.3.4".parse().unwrap(), 51820, Protocol::Udp);
        let filter = permit_relay(&relay);
        assert_eq!(filter.layer, Layer::OUTBOUND_IPV4);
        assert!(filter.conditions.contains(&host("1.2.3.4".parse().unwrap())));
        assert!(filter.conditions.contains(&Condition::RemotePort(51820)));

        let v6 = Relay::new("2001:db8::1".parse().unwrap(), 443, Protocol::Tcp);
        assert_eq!(permit_relay(&v6).layer, Layer::OUTBOUND_IPV6);
    }

    #[test]
    fn test_ping_splits_by_family() {
        let v4_only = PingableHosts::new(vec![
            "10.64.0.1".parse().unwrap(),
            "10.64.0.2".parse().unwrap(),
        ]);
        let filters = permit_ping(&v4_only);
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].layer, Layer::OUTBOUND_IPV4);

        let both =
            PingableHosts::new(vec!["10.64.0.1".parse().unwrap(), "fc00::1".parse().unwrap()])
                .via("wg0");
        let filters = permit_ping(&both);
        assert_eq!(filters.len(), 2);
        assert!(filters
            .iter()
            .all(|f| f.conditions.contains(&Condition::InterfaceAlias("wg0".to_string()))));
    }

    #[test]
    fn test_dns_weights_bracket_restriction() {
        let allow = permit_dns(Ipv4Addr::new(10, 64, 0, 1), None);
        assert_eq!(allow.len(), 1);
        let restrict = restrict_dns();
        let tunnel = permit_tunnel("wg0");
        assert!(allow[0].weight.value() > restrict[0].weight.value());
        assert!(restrict[0].weight.value() > tunnel[0].weight.value());
    }
}
