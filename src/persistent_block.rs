// VPN Kill Switch - Persistent Block
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Block-all filters that outlive the process and survive a reboot.
//!
//! Armed when the engine shuts down in a blocking state, so the host stays
//! offline until a later start takes over. Both operations run inside the
//! caller's transaction.

use tracing::{debug, info};

use crate::error::Result;
use crate::filtering_base::{self, sublayer_permit};
use crate::guids::Role;
use crate::wfp::{Action, FilterDescriptor, FilterEngine, Layer, Persistence, Weight};

/// The four filters making up the block, in insertion order.
const FILTERS: [(Role, Layer, Persistence); 4] = [
    (
        Role::PersistentBlockAllOutboundIpv4,
        Layer::OUTBOUND_IPV4,
        Persistence::Persistent,
    ),
    (
        Role::PersistentBlockAllInboundIpv4,
        Layer::INBOUND_IPV4,
        Persistence::Persistent,
    ),
    (
        Role::BootTimeBlockAllOutboundIpv4,
        Layer::OUTBOUND_IPV4,
        Persistence::BootTime,
    ),
    (
        Role::BootTimeBlockAllInboundIpv4,
        Layer::INBOUND_IPV4,
        Persistence::BootTime,
    ),
];

fn descriptor(role: Role, layer: Layer, persistence: Persistence) -> FilterDescriptor {
    let kind = match persistence {
        Persistence::BootTime => "Boot-time",
        _ => "Persistent",
    };
    FilterDescriptor {
        id: role.id(),
        name: role.name().to_string(),
        description: format!("{} block of all traffic at {}", kind, layer),
        provider: Role::Provider.id(),
        sublayer: Role::SublayerPermit.id(),
        layer,
        weight: Weight::Min,
        action: Action::Block,
        conditions: Vec::new(),
        persistence,
    }
}

/// Descriptors of every persistent block filter.
pub fn filters() -> Vec<FilterDescriptor> {
    FILTERS
        .iter()
        .map(|&(role, layer, persistence)| descriptor(role, layer, persistence))
        .collect()
}

/// Install the block. Existing block filters are replaced.
pub fn enable<E: FilterEngine + ?Sized>(engine: &mut E) -> Result<()> {
    filtering_base::ensure_provider(engine)?;
    filtering_base::ensure_sublayer(engine, &sublayer_permit())?;

    for filter in filters() {
        engine.delete_filter(&filter.id)?;
        engine.add_filter(&filter)?;
    }

    info!("Persistent block armed");
    Ok(())
}

/// Remove the block. The permit sublayer is removed along with it once it
/// holds nothing else.
pub fn disable<E: FilterEngine + ?Sized>(engine: &mut E) -> Result<()> {
    for &(role, _, _) in &FILTERS {
        engine.delete_filter(&role.id())?;
    }

    let permit = Role::SublayerPermit.id();
    let remaining = engine
        .enumerate_filters(&Role::Provider.id())?
        .iter()
        .filter(|f| f.sublayer == permit)
        .count();
    if remaining == 0 {
        engine.delete_sublayer(&permit)?;
    } else {
        debug!(remaining, "Permit sublayer still in use");
    }

    debug!("Persistent block disarmed");
    Ok(())
}

/// Whether all block filters are present.
pub fn is_enabled<E: FilterEngine + ?Sized>(engine: &E) -> Result<bool> {
    for &(role, _, _) in &FILTERS {
        if engine.get_filter(&role.id())?.is_none() {
            return Ok(false);
        }
    }
    Ok(true)
}
