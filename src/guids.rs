// VPN Kill Switch - Identity Registry
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Statically assigned identities for every object this engine manages.
//!
//! Identities never change between builds or process instances. A process
//! recovering from a crash finds and removes what an earlier instance
//! installed by looking up the same constants.

use std::collections::BTreeMap;

use uuid::Uuid;

/// Kind of filtering object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Provider,
    Sublayer,
    Filter,
}

/// Every named object role owned by this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Provider,

    SublayerPermit,
    SublayerBlock,

    PersistentBlockAllOutboundIpv4,
    PersistentBlockAllInboundIpv4,
    BootTimeBlockAllOutboundIpv4,
    BootTimeBlockAllInboundIpv4,

    BlockAllOutboundIpv4,
    BlockAllOutboundIpv6,
    BlockAllInboundIpv4,
    BlockAllInboundIpv6,

    PermitLanOutboundIpv4,
    PermitLanOutboundIpv6,
    PermitLanInboundIpv4,
    PermitLanInboundIpv6,

    PermitLoopbackOutboundIpv4,
    PermitLoopbackOutboundIpv6,
    PermitLoopbackInboundIpv4,
    PermitLoopbackInboundIpv6,

    PermitDhcpOutboundIpv4,
    PermitDhcpInboundIpv4,
    PermitDhcpOutboundIpv6,
    PermitDhcpInboundIpv6,

    PermitRelay,

    PermitPingOutboundIpv4,
    PermitPingOutboundIpv6,

    PermitTunnelOutboundIpv4,
    PermitTunnelOutboundIpv6,
    PermitTunnelInboundIpv4,
    PermitTunnelInboundIpv6,

    PermitDnsOutboundIpv4,
    PermitDnsOutboundIpv6,
    RestrictDnsOutboundIpv4,
    RestrictDnsOutboundIpv6,
}

impl Role {
    /// All roles, in registry order.
    pub const ALL: [Role; 34] = [
        Role::Provider,
        Role::SublayerPermit,
        Role::SublayerBlock,
        Role::PersistentBlockAllOutboundIpv4,
        Role::PersistentBlockAllInboundIpv4,
        Role::BootTimeBlockAllOutboundIpv4,
        Role::BootTimeBlockAllInboundIpv4,
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

    /// The stable identifier for this role.
    pub const fn id(self) -> Uuid {
        Uuid::from_u128(match self {
            Role::Provider => 0x238c2315_faa6_41d8_ae3f_aec75544e87d,
            Role::SublayerPermit => 0x5b9b41a1_0d97_4431_8af5_8f1d90032f01,
            Role::SublayerBlock => 0xc3b4c247_b15c_4cae_b476_8e41a2171305,
            Role::PersistentBlockAllOutboundIpv4 => 0xaabb8cab_d1ee_4892_a0db_ee0afdc64b40,
            Role::PersistentBlockAllInboundIpv4 => 0xde8e8bd3_8b52_4d3f_82b7_f1b6c12a048c,
            Role::BootTimeBlockAllOutboundIpv4 => 0xb78fc9f6_feb8_4ec4_a9c2_65b0589da0e0,
            Role::BootTimeBlockAllInboundIpv4 => 0x0e38f975_4661_4764_a2d3_0063b10b9a5b,
            Role::BlockAllOutboundIpv4 => 0x211af662_d5fc_4295_bc9b_d02744276e0e,
            Role::BlockAllInboundIpv4 => 0xca7bb204_28ee_4f76_8b42_5661896e32c7,
            Role::BlockAllOutboundIpv6 => 0x4a1e2f5c_9d3b_4e78_b6a1_7c0d52e9f314,
            Role::BlockAllInboundIpv6 => 0x8e6f07b2_31ac_4d95_a4c8_e29b1f60d7a3,
            Role::PermitLanOutboundIpv4 => 0x1c9c0200_a3f1_45d6_af24_28037dd9d2a7,
            Role::PermitLanOutboundIpv6 => 0x1d6ecb0a_157d_4b38_92fd_a90d8d11d740,
            Role::PermitLanInboundIpv4 => 0x19ff526d_5d59_4b57_a271_18c84931bbba,
            Role::PermitLanInboundIpv6 => 0x3766035c_25d0_42ad_9b0b_599a3da44112,
            Role::PermitLoopbackOutboundIpv4 => 0xb0e67672_39fa_4055_94e8_255a1a6330d1,
            Role::PermitLoopbackOutboundIpv6 => 0xd02bf01c_6e91_44bd_b8f4_d98c5f1a8aa9,
            Role::PermitLoopbackInboundIpv4 => 0xeeef445a_ee26_404c_94af_cd07ea253252,
            Role::PermitLoopbackInboundIpv6 => 0xc18edc88_f011_4a44_ab44_2ae01639ea5b,
            Role::PermitDhcpOutboundIpv4 => 0xc6a65f00_6ba6_4724_b871_5d90c5b8dd15,
            Role::PermitDhcpInboundIpv4 => 0x26769e43_c8b1_4334_b53f_6cc3320f16ba,
            Role::PermitDhcpOutboundIpv6 => 0x576e5cfc_7798_4bfb_86c0_81276b4bd365,
            Role::PermitDhcpInboundIpv6 => 0xedfc5e6a_a520_46d0_87ed_01f35fbabfe2,
            Role::PermitRelay => 0x74255996_057c_475d_b123_9692df525174,
            Role::PermitPingOutboundIpv4 => 0x95894643_6e80_46aa_b3bd_3b295a49a412,
            Role::PermitPingOutboundIpv6 => 0xd51b9729_9f93_47eb_8a1b_bb4c9711cedd,
            Role::PermitTunnelOutboundIpv4 => 0xf294d7d0_ffef_46e6_bb92_9736911c5148,
            Role::PermitTunnelOutboundIpv6 => 0x63c1804b_e56e_4d35_9585_ffa3ab11997a,
            Role::PermitTunnelInboundIpv4 => 0x237fe38e_bec6_4dec_b667_fb4c4e23980f,
            Role::PermitTunnelInboundIpv6 => 0x6a53593a_813b_4412_b4b1_0593b761bfbb,
            Role::PermitDnsOutboundIpv4 => 0xafc5f847_ae35_4186_8445_0818c9e8e23b,
            Role::PermitDnsOutboundIpv6 => 0x84b3d4ff_0ad9_4270_aaec_b76c64cc09a5,
            Role::RestrictDnsOutboundIpv4 => 0x131c21ca_63e3_47f1_bfea_4a0cc269b534,
            Role::RestrictDnsOutboundIpv6 => 0x91b04080_db12_4388_8987_151cdd34dcc4,
        })
    }

    pub const fn kind(self) -> ObjectKind {
        match self {
            Role::Provider => ObjectKind::Provider,
            Role::SublayerPermit | Role::SublayerBlock => ObjectKind::Sublayer,
            _ => ObjectKind::Filter,
        }
    }

    /// Human-readable object name.
    pub fn name(self) -> &'static str {
        match self {
            Role::Provider => "VPN Kill Switch",
            Role::SublayerPermit => "VPN Kill Switch permit band",
            Role::SublayerBlock => "VPN Kill Switch block band",
            Role::PersistentBlockAllOutboundIpv4 | Role::BootTimeBlockAllOutboundIpv4 => {
                "Block all outbound connections (IPv4)"
            }
            Role::PersistentBlockAllInboundIpv4 | Role::BootTimeBlockAllInboundIpv4 => {
                "Block all inbound connections (IPv4)"
            }
            Role::BlockAllOutboundIpv4 => "Block all outbound connections (IPv4)",
            Role::BlockAllInboundIpv4 => "Block all inbound connections (IPv4)",
            Role::BlockAllOutboundIpv6 => "Block all outbound connections (IPv6)",
            Role::BlockAllInboundIpv6 => "Block all inbound connections (IPv6)",
            Role::PermitLanOutboundIpv4 => "Permit outbound LAN traffic (IPv4)",
            Role::PermitLanOutboundIpv6 => "Permit outbound LAN traffic (IPv6)",
            Role::PermitLanInboundIpv4 => "Permit inbound LAN traffic (IPv4)",
            Role::PermitLanInboundIpv6 => "Permit inbound LAN traffic (IPv6)",
            Role::PermitLoopbackOutboundIpv4 => "Permit outbound loopback traffic (IPv4)",
            Role::PermitLoopbackOutboundIpv6 => "Permit outbound loopback traffic (IPv6)",
            Role::PermitLoopbackInboundIpv4 => "Permit inbound loopback traffic (IPv4)",
            Role::PermitLoopbackInboundIpv6 => "Permit inbound loopback traffic (IPv6)",
            Role::PermitDhcpOutboundIpv4 => "Permit outbound DHCP requests (IPv4)",
            Role::PermitDhcpInboundIpv4 => "Permit inbound DHCP responses (IPv4)",
            Role::PermitDhcpOutboundIpv6 => "Permit outbound DHCP requests (IPv6)",
            Role::PermitDhcpInboundIpv6 => "Permit inbound DHCP responses (IPv6)",
            Role::PermitRelay => "Permit outbound connections to the relay",
            Role::PermitPingOutboundIpv4 => "Permit outbound ICMP echo requests (IPv4)",
            Role::PermitPingOutboundIpv6 => "Permit outbound ICMP echo requests (IPv6)",
            Role::PermitTunnelOutboundIpv4 => "Permit outbound tunnel traffic (IPv4)",
            Role::PermitTunnelOutboundIpv6 => "Permit outbound tunnel traffic (IPv6)",
            Role::PermitTunnelInboundIpv4 => "Permit inbound tunnel traffic (IPv4)",
            Role::PermitTunnelInboundIpv6 => "Permit inbound tunnel traffic (IPv6)",
            Role::PermitDnsOutboundIpv4 => "Permit DNS to the tunnel resolver (IPv4)",
            Role::PermitDnsOutboundIpv6 => "Permit DNS to the tunnel resolver (IPv6)",
            Role::RestrictDnsOutboundIpv4 => "Block DNS to other resolvers (IPv4)",
            Role::RestrictDnsOutboundIpv6 => "Block DNS to other resolvers (IPv6)",
        }
    }

    /// Reverse lookup of a role from its identifier.
    pub fn from_id(id: &Uuid) -> Option<Role> {
        Role::ALL.iter().copied().find(|role| role.id() == *id)
    }
}

/// The stable identifier for `role`.
pub const fn identifier_for(role: Role) -> Uuid {
    role.id()
}

/// Every identity this engine owns for one object kind.
pub fn all_identities(kind: ObjectKind) -> Vec<Uuid> {
    Role::ALL
        .iter()
        .filter(|role| role.kind() == kind)
        .map(|role| role.id())
        .collect()
}

/// Every identity this engine owns, grouped by kind.
pub fn detailed_registry() -> BTreeMap<ObjectKind, Vec<Uuid>> {
    let mut registry: BTreeMap<ObjectKind, Vec<Uuid>> = BTreeMap::new();
    for role in Role::ALL {
        registry.entry(role.kind()).or_default().push(role.id());
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identities_are_unique() {
        let ids: HashSet<Uuid> = Role::ALL.iter().map(|r| r.id()).collect();
        assert_eq!(ids.len(), Role::ALL.len());
        assert!(!ids.contains(&Uuid::nil()));
    }

    #[test]
    fn test_identities_are_constant() {
        assert_eq!(
            identifier_for(Role::Provider).to_string(),
            "238c2315-faa6-41d8-ae3f-aec75544e87d"
        );
        assert_eq!(Role::SublayerPermit.id(), identifier_for(Role::SublayerPermit));
    }

    #[test]
    fn test_registry_by_kind() {
        assert_eq!(all_identities(ObjectKind::Provider), vec![Role::Provider.id()]);
        assert_eq!(all_identities(ObjectKind::Sublayer).len(), 2);
        assert_eq!(all_identities(ObjectKind::Filter).len(), Role::ALL.len() - 3);

        let detailed = detailed_registry();
        let total: usize = detailed.values().map(Vec::len).sum();
        assert_eq!(total, Role::ALL.len());
    }

    #[test]
    fn test_reverse_lookup() {
        for role in Role::ALL {
            assert_eq!(Role::from_id(&role.id()), Some(role));
        }
        assert_eq!(Role::from_id(&Uuid::nil()), None);
    }
}
