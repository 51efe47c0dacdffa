// VPN Kill Switch - Store Snapshots
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! On-disk form of the objects that survive a process or engine restart.

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::memory::ObjectSet;
use super::{FilterDescriptor, ProviderDescriptor, SublayerDescriptor};
use crate::error::Result;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    saved_at: DateTime<Utc>,
    #[serde(default)]
    providers: Vec<ProviderDescriptor>,
    #[serde(default)]
    sublayers: Vec<SublayerDescriptor>,
    #[serde(default)]
    filters: Vec<FilterDescriptor>,
}

/// Write every non-volatile object in `objects` to `path`.
pub(super) fn write(path: &Path, objects: &ObjectSet) -> Result<()> {
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    let snapshot = Snapshot {
        saved_at: Utc::now(),
        providers: objects.providers().filter(|p| p.persistent).cloned().collect(),
        sublayers: objects.sublayers().filter(|s| s.persistent).cloned().collect(),
        filters: objects
            .filters()
            .filter(|f| f.persistence.outlives_session())
            .cloned()
            .collect(),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(&snapshot)?;
    let staging = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&staging)?;
        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&staging, path)?;
    Ok(())
}

/// Load the objects stored at `path`.
pub(super) fn read(path: &Path) -> Result<ObjectSet> {
    let content = fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&content)?;
    Ok(ObjectSet::from_persistent(
        snapshot.providers,
        snapshot.sublayers,
        snapshot.filters,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wfp::{FilterEngine, Persistence, Store, Transaction};
    use crate::{filtering_base, persistent_block};
    use std::time::Duration;

    #[test]
    fn test_snapshot_keeps_only_surviving_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = Store::open(&path).unwrap();
        let mut session = store.session(Duration::from_millis(100));
        Transaction::execute(&mut session, |engine| {
            filtering_base::add_baseline(engine)?;
            persistent_block::enable(engine)
        })
        .unwrap();

        let reloaded = read(&path).unwrap();
        assert_eq!(reloaded.providers().count(), 1);
        assert_eq!(reloaded.sublayers().count(), 2);
        assert_eq!(reloaded.filters().count(), 4);
        assert!(reloaded
            .filters()
            .all(|f| f.persistence != Persistence::Volatile));
        assert!(!session.in_transaction());
    }

    #[test]
    fn test_read_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();
        assert!(read(&path).is_err());
    }
}
