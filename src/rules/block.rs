// VPN Kill Switch - Block Rules
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

use super::weights;
use crate::guids::Role;
use crate::wfp::{Action, FilterDescriptor, Layer, Persistence};

/// Block all traffic of either address family in both directions.
///
/// Lives in the block sublayer, so any permit in the permit sublayer that
/// matches a connection takes precedence.
pub fn block_all() -> Vec<FilterDescriptor> {
    [
        (Role::BlockAllOutboundIpv4, Layer::OUTBOUND_IPV4),
        (Role::BlockAllOutboundIpv6, Layer::OUTBOUND_IPV6),
        (Role::BlockAllInboundIpv4, Layer::INBOUND_IPV4),
        (Role::BlockAllInboundIpv6, Layer::INBOUND_IPV6),
    ]
    .into_iter()
    .map(|(role, layer)| FilterDescriptor {
        id: role.id(),
        name: role.name().to_string(),
        description: format!("Block all traffic at {}", layer),
        provider: Role::Provider.id(),
        sublayer: Role::SublayerBlock.id(),
        layer,
        weight: weights::BLOCK_ALL,
        action: Action::Block,
        conditions: Vec::new(),
        persistence: Persistence::Volatile,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_block_all_covers_every_layer() {
        let filters = block_all();
        let layers: HashSet<_> = filters.iter().map(|f| f.layer).collect();
        assert_eq!(
            layers,
            HashSet::from([
                Layer::OUTBOUND_IPV4,
                Layer::OUTBOUND_IPV6,
                Layer::INBOUND_IPV4,
                Layer::INBOUND_IPV6,
            ])
        );
        assert_eq!(filters.len(), 4);
        assert!(filters
            .iter()
            .all(|f| f.sublayer == Role::SublayerBlock.id()));
        assert!(filters.iter().all(|f| f.weight == weights::BLOCK_ALL));
    }
}
