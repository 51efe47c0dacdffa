// VPN Kill Switch - Rule Catalogue
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Fixed catalogue of named rule groups.
//!
//! Each group turns caller input into filter descriptors with registry
//! identities. The policy builders at the bottom combine the groups into the
//! complete filter set of one policy state.

mod block;
mod lan;
mod tunnel;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::IpNetwork;

use crate::error::{Error, Result};
use crate::guids::Role;
use crate::models::{FirewallSettings, PingableHosts, Relay};
use crate::wfp::{Action, Condition, FilterDescriptor, Layer, Persistence, Weight};

pub use block::block_all;
pub use lan::{permit_dhcp, permit_lan};
pub use tunnel::{permit_dns, permit_ping, permit_relay, permit_tunnel, restrict_dns};

/// Filter weights inside the permit sublayer.
pub mod weights {
    use crate::wfp::Weight;

    /// Block-all filters in the block sublayer.
    pub const BLOCK_ALL: Weight = Weight::Min;
    /// Ordinary exceptions: LAN, DHCP, ping, tunnel.
    pub const PERMIT: Weight = Weight::Exact(1_000);
    /// Port 53 block, overrides ordinary exceptions.
    pub const RESTRICT_DNS: Weight = Weight::Exact(2_000);
    /// Exceptions the DNS restriction must not catch.
    pub const PERMIT_PRIORITY: Weight = Weight::Exact(3_000);
    pub const PERMIT_DNS: Weight = Weight::Max;
}

/// Every policy filter identity, whichever state installed it.
pub const POLICY_ROLES: [Role; 27] = [
    Role::BlockAllOutboundIpv4,
    Role::BlockAllOutboundIpv6,
    Role::BlockAllInboundIpv4,
    Role::BlockAllInboundIpv6,
    Role::PermitLanOutboundIpv4,
    Role::PermitLanOutboundIpv6,
    Role::PermitLanInboundIpv4,
    Role::PermitLanInboundIpv6,
    Role::PermitLoopbackOutboundIpv4,
    Role::PermitLoopbackOutboundIpv6,
    Role::PermitLoopbackInboundIpv4,
    Role::PermitLoopbackInboundIpv6,
    Role::PermitDhcpOutboundIpv4,
    Role::PermitDhcpInboundIpv4,
    Role::PermitDhcpOutboundIpv6,
    Role::PermitDhcpInboundIpv6,
    Role::PermitRelay,
    Role::PermitPingOutboundIpv4,
    Role::PermitPingOutboundIpv6,
    Role::PermitTunnelOutboundIpv4,
    Role::PermitTunnelOutboundIpv6,
    Role::PermitTunnelInboundIpv4,
    Role::PermitTunnelInboundIpv6,
    Role::PermitDnsOutboundIpv4,
    Role::PermitDnsOutboundIpv6,
    Role::RestrictDnsOutboundIpv4,
    Role::RestrictDnsOutboundIpv6,
];

fn policy_filter(
    role: Role,
    sublayer: Role,
    layer: Layer,
    weight: Weight,
    action: Action,
    conditions: Vec<Condition>,
) -> FilterDescriptor {
    FilterDescriptor {
        id: role.id(),
        name: role.name().to_string(),
        description: format!("{} at {}", role.name(), layer),
        provider: Role::Provider.id(),
        sublayer: sublayer.id(),
        layer,
        weight,
        action,
        conditions,
        persistence: Persistence::Volatile,
    }
}

/// A permit filter in the permit sublayer.
pub(crate) fn permit(
    role: Role,
    layer: Layer,
    weight: Weight,
    conditions: Vec<Condition>,
) -> FilterDescriptor {
    policy_filter(role, Role::SublayerPermit, layer, weight, Action::Permit, conditions)
}

/// A block filter overriding lower-weight permits in the permit sublayer.
pub(crate) fn deny(
    role: Role,
    layer: Layer,
    weight: Weight,
    conditions: Vec<Condition>,
) -> FilterDescriptor {
    policy_filter(role, Role::SublayerPermit, layer, weight, Action::Block, conditions)
}

/// Match a remote address range.
pub(crate) fn network(addr: impl Into<IpAddr>, prefix: u8) -> Result<Condition> {
    let addr = addr.into();
    IpNetwork::new(addr, prefix)
        .map(Condition::RemoteAddress)
        .map_err(|e| Error::InvalidArgument(format!("{}/{}: {}", addr, prefix, e)))
}

/// Match exactly one remote host.
pub(crate) fn host(addr: IpAddr) -> Condition {
    Condition::RemoteAddress(IpNetwork::from(addr))
}

/// Validate a tunnel interface alias.
pub(crate) fn check_alias(alias: &str) -> Result<()> {
    if alias.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "tunnel interface alias must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Exceptions every policy carries.
fn exceptions(settings: &FirewallSettings) -> Result<Vec<FilterDescriptor>> {
    let mut filters = Vec::new();
    if settings.allow_lan {
        filters.extend(permit_lan()?);
    }
    if settings.allow_dhcp {
        filters.extend(permit_dhcp());
    }
    Ok(filters)
}

/// Filters of the blocked state.
pub fn blocked(settings: &FirewallSettings) -> Result<Vec<FilterDescriptor>> {
    let mut filters = block_all();
    filters.extend(exceptions(settings)?);
    Ok(filters)
}

/// Filters of the connecting state.
pub fn connecting(
    settings: &FirewallSettings,
    relay: &Relay,
    pingable_hosts: Option<&PingableHosts>,
) -> Result<Vec<FilterDescriptor>> {
    relay.validate()?;
    if let Some(hosts) = pingable_hosts {
        hosts.validate()?;
    }

    let mut filters = blocked(settings)?;
    filters.push(permit_relay(relay));
    if let Some(hosts) = pingable_hosts {
        filters.extend(permit_ping(hosts));
    }
    Ok(filters)
}

/// Filters of the connected state.
pub fn connected(
    settings: &FirewallSettings,
    relay: &Relay,
    tunnel_alias: &str,
    v4_dns: Ipv4Addr,
    v6_dns: Option<Ipv6Addr>,
) -> Result<Vec<FilterDescriptor>> {
    relay.validate()?;
    check_alias(tunnel_alias)?;

    let mut filters = blocked(settings)?;
    filters.push(permit_relay(relay));
    filters.extend(permit_tunnel(tunnel_alias));
    filters.extend(permit_dns(v4_dns, v6_dns));
    filters.extend(restrict_dns());
    Ok(filters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wfp::Protocol;
    use std::collections::HashSet;

    fn relay() -> Relay {
        Relay::new("1.2.3.4".parse().unwrap(), 51820, Protocol::Udp)
    }

    #[test]
    fn test_policy_roles_are_filters_outside_persistent_block() {
        for role in POLICY_ROLES {
            assert_eq!(role.kind(), crate::guids::ObjectKind::Filter);
        }
        let block: HashSet<_> = crate::persistent_block::filters()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert!(POLICY_ROLES.iter().all(|r| !block.contains(&r.id())));
        assert_eq!(
            POLICY_ROLES.len() + block.len(),
            crate::guids::all_identities(crate::guids::ObjectKind::Filter).len()
        );
    }

    #[test]
    fn test_blocked_without_exceptions() {
        let filters = blocked(&FirewallSettings::default()).unwrap();
        assert_eq!(filters.len(), 4);
        assert!(filters.iter().all(|f| !f.is_permit()));
        assert!(filters.iter().all(|f| f.conditions.is_empty()));
        assert!(filters.iter().all(|f| f.weight == Weight::Min));
    }

    #[test]
    fn test_blocked_with_exceptions() {
        let filters = blocked(&FirewallSettings::new(true, true)).unwrap();
        let permits = filters.iter().filter(|f| f.is_permit()).count();
        // 4 LAN + 4 loopback + 4 DHCP
        assert_eq!(permits, 12);
    }

    #[test]
    fn test_every_policy_filter_is_catalogued() {
        let hosts = PingableHosts::new(vec![
            "10.64.0.1".parse().unwrap(),
            "fc00:bbbb::1".parse().unwrap(),
        ]);
        let sets = [
            blocked(&FirewallSettings::new(true, true)).unwrap(),
            connecting(&FirewallSettings::new(true, true), &relay(), Some(&hosts)).unwrap(),
            connected(
                &FirewallSettings::new(true, true),
                &relay(),
                "wg0",
                Ipv4Addr::new(10, 64, 0, 1),
                Some("fc00:bbbb::1".parse().unwrap()),
            )
            .unwrap(),
        ];

        let catalogued: HashSet<_> = POLICY_ROLES.iter().map(|r| r.id()).collect();
        for set in &sets {
            let ids: HashSet<_> = set.iter().map(|f| f.id).collect();
            assert_eq!(ids.len(), set.len(), "duplicate identity in policy");
            assert!(ids.is_subset(&catalogued));
            for filter in set {
                assert!(filter.validate().is_ok(), "{} invalid", filter.name);
            }
        }
    }

    fn role_set(roles: &[Role]) -> HashSet<uuid::Uuid> {
        roles.iter().map(|r| r.id()).collect()
    }

    fn id_set(filters: &[FilterDescriptor]) -> HashSet<uuid::Uuid> {
        filters.iter().map(|f| f.id).collect()
    }

    const BLOCK_ALL: [Role; 4] = [
        Role::BlockAllOutboundIpv4,
        Role::BlockAllOutboundIpv6,
        Role::BlockAllInboundIpv4,
        Role::BlockAllInboundIpv6,
    ];

    #[test]
    fn test_each_state_installs_exactly_its_roles() {
        let settings = FirewallSettings::default();
        let hosts = PingableHosts::new(vec!["10.64.0.1".parse().unwrap()]);

        assert_eq!(id_set(&blocked(&settings).unwrap()), role_set(&BLOCK_ALL));

        let mut expected = BLOCK_ALL.to_vec();
        expected.extend([Role::PermitRelay, Role::PermitPingOutboundIpv4]);
        assert_eq!(
            id_set(&connecting(&settings, &relay(), Some(&hosts)).unwrap()),
            role_set(&expected)
        );

        let mut expected = BLOCK_ALL.to_vec();
        expected.extend([
            Role::PermitRelay,
            Role::PermitTunnelOutboundIpv4,
            Role::PermitTunnelOutboundIpv6,
            Role::PermitTunnelInboundIpv4,
            Role::PermitTunnelInboundIpv6,
            Role::PermitDnsOutboundIpv4,
            Role::RestrictDnsOutboundIpv4,
            Role::RestrictDnsOutboundIpv6,
        ]);
        let filters = connected(&settings, &relay(), "wg0", Ipv4Addr::new(10, 64, 0, 1), None)
            .unwrap();
        assert_eq!(id_set(&filters), role_set(&expected));
    }

    #[test]
    fn test_connecting_rejects_empty_hosts() {
        let empty = PingableHosts::new(Vec::new());
        let err = connecting(&FirewallSettings::default(), &relay(), Some(&empty)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_connected_requires_alias() {
        let err = connected(
            &FirewallSettings::default(),
            &relay(),
            "",
            Ipv4Addr::new(10, 64, 0, 1),
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_network_rejects_bad_prefix() {
        assert!(network(Ipv4Addr::new(10, 0, 0, 0), 33).is_err());
        assert!(network(Ipv6Addr::LOCALHOST, 128).is_ok());
    }
}
