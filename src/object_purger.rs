// VPN Kill Switch - Object Purger
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Registry-driven removal of everything this engine may have installed.
//!
//! The purger does not depend on any live context: it resolves every
//! identity the registry knows and deletes whatever the store still holds,
//! filters first, then sublayers, then the provider.

use std::time::Duration;

use tracing::info;

use crate::error::Result;
use crate::guids::{detailed_registry, ObjectKind};
use crate::wfp::{FilterEngine, SessionFactory, Transaction};

/// A removal pass run inside one transaction.
pub type RemovalFn<E> = fn(&mut E) -> Result<()>;

fn purge<E: FilterEngine + ?Sized>(engine: &mut E, keep_surviving: bool) -> Result<usize> {
    let registry = detailed_registry();
    let ids = |kind| registry.get(&kind).cloned().unwrap_or_default();
    let mut removed = 0;

    for id in ids(ObjectKind::Filter) {
        let doomed = if keep_surviving {
            engine.find_filter(&id, &|f| !f.persistence.outlives_session())?
        } else {
            engine.get_filter(&id)?.is_some()
        };
        if doomed {
            engine.delete_filter(&id)?;
            removed += 1;
        }
    }

    for id in ids(ObjectKind::Sublayer) {
        let doomed = if keep_surviving {
            engine.find_sublayer(&id, &|s| !s.persistent)?
        } else {
            engine.get_sublayer(&id)?.is_some()
        };
        if doomed {
            engine.delete_sublayer(&id)?;
            removed += 1;
        }
    }

    for id in ids(ObjectKind::Provider) {
        let doomed = if keep_surviving {
            engine.find_provider(&id, &|p| !p.persistent)?
        } else {
            engine.get_provider(&id)?.is_some()
        };
        if doomed {
            engine.delete_provider(&id)?;
            removed += 1;
        }
    }

    Ok(removed)
}

/// Remove every owned object regardless of persistence class.
pub fn remove_all<E: FilterEngine + ?Sized>(engine: &mut E) -> Result<()> {
    let removed = purge(engine, false)?;
    info!(removed, "Purged all firewall objects");
    Ok(())
}

/// Remove only session-scoped objects. An armed persistent or boot-time
/// block is left in place.
pub fn remove_all_non_persistent<E: FilterEngine + ?Sized>(engine: &mut E) -> Result<()> {
    let removed = purge(engine, true)?;
    info!(removed, "Purged non-persistent firewall objects");
    Ok(())
}

/// Run `remove` in one transaction on a fresh session.
pub fn execute<S: SessionFactory>(
    sessions: &S,
    timeout: Duration,
    remove: RemovalFn<S::Engine>,
) -> Result<()> {
    let mut engine = sessions.open_session(timeout)?;
    Transaction::execute(&mut engine, remove)
}
