// VPN Kill Switch - Filtering Base
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! The provider and the two sublayers every policy is built on.
//!
//! Both exist independently of any policy state. They are created on demand
//! at every start and only removed by a purge.

use tracing::{debug, info};

use crate::error::Result;
use crate::guids::Role;
use crate::wfp::{FilterEngine, ProviderDescriptor, SublayerDescriptor, Transaction};

/// Weight of the band holding permit filters.
pub const PERMIT_SUBLAYER_WEIGHT: u16 = u16::MAX;
/// Weight of the band holding block filters.
pub const BLOCK_SUBLAYER_WEIGHT: u16 = u16::MAX - 1;

pub fn provider() -> ProviderDescriptor {
    ProviderDescriptor {
        id: Role::Provider.id(),
        name: Role::Provider.name().to_string(),
        description: "VPN kill switch firewall integration".to_string(),
        persistent: true,
    }
}

pub fn sublayer_permit() -> SublayerDescriptor {
    SublayerDescriptor {
        id: Role::SublayerPermit.id(),
        name: Role::SublayerPermit.name().to_string(),
        description: "Filters that permit traffic".to_string(),
        provider: Role::Provider.id(),
        weight: PERMIT_SUBLAYER_WEIGHT,
        persistent: true,
    }
}

pub fn sublayer_block() -> SublayerDescriptor {
    SublayerDescriptor {
        id: Role::SublayerBlock.id(),
        name: Role::SublayerBlock.name().to_string(),
        description: "Filters that block traffic".to_string(),
        provider: Role::Provider.id(),
        weight: BLOCK_SUBLAYER_WEIGHT,
        persistent: true,
    }
}

/// Add the provider unless it already exists.
pub(crate) fn ensure_provider<E: FilterEngine + ?Sized>(engine: &mut E) -> Result<()> {
    let provider = provider();
    if engine.find_provider(&provider.id, &|_| true)? {
        debug!("Provider already present");
        return Ok(());
    }
    engine.add_provider(&provider)
}

/// Add `sublayer` unless it already exists.
pub(crate) fn ensure_sublayer<E: FilterEngine + ?Sized>(
    engine: &mut E,
    sublayer: &SublayerDescriptor,
) -> Result<()> {
    if engine.find_sublayer(&sublayer.id, &|_| true)? {
        debug!(name = %sublayer.name, "Sublayer already present");
        return Ok(());
    }
    engine.add_sublayer(sublayer)
}

/// Create whatever part of the baseline is missing, inside the caller's
/// transaction. Filters are never touched.
pub fn add_baseline<E: FilterEngine + ?Sized>(engine: &mut E) -> Result<()> {
    ensure_provider(engine)?;
    ensure_sublayer(engine, &sublayer_permit())?;
    ensure_sublayer(engine, &sublayer_block())
}

/// Create the baseline in a transaction of its own. Safe to call any
/// number of times.
pub fn ensure_baseline<E: FilterEngine + ?Sized>(engine: &mut E) -> Result<()> {
    Transaction::execute(engine, |engine| add_baseline(engine))
}

/// Delete every object owned by the provider, children first, inside the
/// caller's transaction.
pub fn remove_owned<E: FilterEngine + ?Sized>(engine: &mut E) -> Result<()> {
    let provider = Role::Provider.id();

    let filters = engine.enumerate_filters(&provider)?;
    for filter in &filters {
        engine.delete_filter(&filter.id)?;
    }

    let sublayers = engine.enumerate_sublayers(&provider)?;
    for sublayer in &sublayers {
        engine.delete_sublayer(&sublayer.id)?;
    }

    engine.delete_provider(&provider)?;

    info!(
        filters = filters.len(),
        sublayers = sublayers.len(),
        "Removed all provider objects"
    );
    Ok(())
}

/// Delete every provider-owned object in a transaction of its own.
pub fn purge_all<E: FilterEngine + ?Sized>(engine: &mut E) -> Result<()> {
    Transaction::execute(engine, |engine| remove_owned(engine))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wfp::{Fault, Store};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[test]
    fn test_ensure_baseline_is_idempotent() {
        let store = Store::new();
        let mut session = store.session(TIMEOUT);

        for _ in 0..5 {
            ensure_baseline(&mut session).unwrap();
        }

        assert_eq!(store.providers().len(), 1);
        assert_eq!(store.sublayers().len(), 2);
        assert!(store.filters().is_empty());
    }

    #[test]
    fn test_ensure_baseline_fills_gaps() {
        let store = Store::new();
        let mut session = store.session(TIMEOUT);
        Transaction::execute(&mut session, |engine| {
            ensure_provider(engine)?;
            engine.add_sublayer(&sublayer_block())
        })
        .unwrap();

        ensure_baseline(&mut session).unwrap();
        let ids: Vec<_> = store.sublayers().iter().map(|s| s.id).collect();
        assert!(ids.contains(&Role::SublayerPermit.id()));
        assert!(ids.contains(&Role::SublayerBlock.id()));
    }

    #[test]
    fn test_permit_band_outranks_block_band() {
        assert!(sublayer_permit().weight > sublayer_block().weight);
    }

    #[test]
    fn test_purge_all_removes_children_before_parent() {
        let store = Store::new();
        let mut session = store.session(TIMEOUT);
        ensure_baseline(&mut session).unwrap();
        Transaction::execute(&mut session, |engine| crate::persistent_block::enable(engine))
            .unwrap();

        purge_all(&mut session).unwrap();
        assert!(store.object_ids().is_empty());

        // Nothing left to purge is still success.
        purge_all(&mut session).unwrap();
    }

    #[test]
    fn test_purge_all_is_atomic() {
        let store = Store::new();
        let mut session = store.session(TIMEOUT);
        ensure_baseline(&mut session).unwrap();
        let before = store.object_ids();

        store.inject(Fault::RejectDelete(Role::Provider.id()));
        assert!(purge_all(&mut session).is_err());
        assert_eq!(store.object_ids(), before);
    }
}
