// VPN Kill Switch - In-Process Filter Engine
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! A host-wide object store with the same transactional and session
//! semantics as the operating system's filtering engine.
//!
//! A [`Store`] is the shared object set. Every process instance talks to it
//! through its own [`Session`]. Transactions take an exclusive lock on the
//! whole store, so concurrent transactions from different sessions are
//! serialized, and a session that cannot get the lock within its timeout
//! fails with [`Error::Timeout`].
//!
//! Volatile objects belong to the session that created them and disappear
//! when that session closes. Persistent and boot-time objects outlive it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::classify::{self, Packet};
use super::snapshot;
use super::{
    Action, FilterDescriptor, FilterEngine, ProviderDescriptor, SessionFactory, SublayerDescriptor,
};
use crate::error::{Error, Result};

type SessionId = u64;

/// Failures that can be injected into a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Reject any add of the object with this identity.
    RejectAdd(Uuid),
    /// Reject any delete of the object with this identity.
    RejectDelete(Uuid),
    /// Fail every commit.
    FailCommit,
}

#[derive(Debug, Clone)]
struct Entry<T> {
    object: T,
    /// Creating session, for volatile objects only.
    owner: Option<SessionId>,
}

/// The set of objects visible in one version of the store.
#[derive(Debug, Clone, Default)]
pub(super) struct ObjectSet {
    providers: BTreeMap<Uuid, Entry<ProviderDescriptor>>,
    sublayers: BTreeMap<Uuid, Entry<SublayerDescriptor>>,
    filters: BTreeMap<Uuid, Entry<FilterDescriptor>>,
}

impl ObjectSet {
    pub(super) fn from_persistent(
        providers: Vec<ProviderDescriptor>,
        sublayers: Vec<SublayerDescriptor>,
        filters: Vec<FilterDescriptor>,
    ) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|p| (p.id, Entry { object: p, owner: None }))
                .collect(),
            sublayers: sublayers
                .into_iter()
                .map(|s| (s.id, Entry { object: s, owner: None }))
                .collect(),
            filters: filters
                .into_iter()
                .map(|f| (f.id, Entry { object: f, owner: None }))
                .collect(),
        }
    }

    pub(super) fn providers(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.values().map(|e| &e.object)
    }

    pub(super) fn sublayers(&self) -> impl Iterator<Item = &SublayerDescriptor> {
        self.sublayers.values().map(|e| &e.object)
    }

    pub(super) fn filters(&self) -> impl Iterator<Item = &FilterDescriptor> {
        self.filters.values().map(|e| &e.object)
    }

    fn ids(&self) -> BTreeSet<Uuid> {
        self.providers
            .keys()
            .chain(self.sublayers.keys())
            .chain(self.filters.keys())
            .copied()
            .collect()
    }

    fn contains(&self, id: &Uuid) -> bool {
        self.providers.contains_key(id)
            || self.sublayers.contains_key(id)
            || self.filters.contains_key(id)
    }

    fn add_provider(&mut self, provider: &ProviderDescriptor, session: SessionId) -> Result<()> {
        if self.contains(&provider.id) {
            return Err(Error::rejected("add", provider.id, "object already exists"));
        }
        self.providers.insert(
            provider.id,
            Entry {
                object: provider.clone(),
                owner: (!provider.persistent).then_some(session),
            },
        );
        Ok(())
    }

    fn add_sublayer(&mut self, sublayer: &SublayerDescriptor, session: SessionId) -> Result<()> {
        if self.contains(&sublayer.id) {
            return Err(Error::rejected("add", sublayer.id, "object already exists"));
        }
        if !self.providers.contains_key(&sublayer.provider) {
            return Err(Error::rejected(
                "add",
                sublayer.id,
                format!("unknown provider {}", sublayer.provider),
            ));
        }
        self.sublayers.insert(
            sublayer.id,
            Entry {
                object: sublayer.clone(),
                owner: (!sublayer.persistent).then_some(session),
            },
        );
        Ok(())
    }

    fn add_filter(&mut self, filter: &FilterDescriptor, session: SessionId) -> Result<()> {
        if self.contains(&filter.id) {
            return Err(Error::rejected("add", filter.id, "object already exists"));
        }
        filter.validate()?;
        if !self.providers.contains_key(&filter.provider) {
            return Err(Error::rejected(
                "add",
                filter.id,
                format!("unknown provider {}", filter.provider),
            ));
        }
        match self.sublayers.get(&filter.sublayer) {
            Some(entry) if entry.object.provider == filter.provider => {}
            Some(_) => {
                return Err(Error::rejected(
                    "add",
                    filter.id,
                    "sublayer belongs to another provider",
                ))
            }
            None => {
                return Err(Error::rejected(
                    "add",
                    filter.id,
                    format!("unknown sublayer {}", filter.sublayer),
                ))
            }
        }
        self.filters.insert(
            filter.id,
            Entry {
                object: filter.clone(),
                owner: (!filter.persistence.outlives_session()).then_some(session),
            },
        );
        Ok(())
    }

    fn delete_provider(&mut self, id: &Uuid) -> Result<bool> {
        let has_dependents = self.sublayers().any(|s| s.provider == *id)
            || self.filters().any(|f| f.provider == *id);
        if has_dependents && self.providers.contains_key(id) {
            return Err(Error::rejected("delete", *id, "object has dependents"));
        }
        Ok(self.providers.remove(id).is_some())
    }

    fn delete_sublayer(&mut self, id: &Uuid) -> Result<bool> {
        if self.sublayers.contains_key(id) && self.filters().any(|f| f.sublayer == *id) {
            return Err(Error::rejected("delete", *id, "object has dependents"));
        }
        Ok(self.sublayers.remove(id).is_some())
    }

    fn delete_filter(&mut self, id: &Uuid) -> bool {
        self.filters.remove(id).is_some()
    }

    /// Drop volatile objects whose owner fails `keep`, then anything left
    /// without a parent. Returns the number of objects removed.
    fn release(&mut self, keep: impl Fn(SessionId) -> bool) -> usize {
        let before = self.len();

        self.filters.retain(|_, e| e.owner.map_or(true, &keep));
        self.sublayers.retain(|_, e| e.owner.map_or(true, &keep));
        self.providers.retain(|_, e| e.owner.map_or(true, &keep));

        let providers: BTreeSet<Uuid> = self.providers.keys().copied().collect();
        self.sublayers
            .retain(|_, e| providers.contains(&e.object.provider));
        let sublayers: BTreeSet<Uuid> = self.sublayers.keys().copied().collect();
        self.filters.retain(|_, e| {
            sublayers.contains(&e.object.sublayer) && providers.contains(&e.object.provider)
        });

        before - self.len()
    }

    fn len(&self) -> usize {
        self.providers.len() + self.sublayers.len() + self.filters.len()
    }
}

#[derive(Debug, Default)]
struct Shared {
    objects: ObjectSet,
    lock_owner: Option<SessionId>,
    live_sessions: BTreeSet<SessionId>,
    next_session: SessionId,
    faults: Vec<Fault>,
    backing_file: Option<PathBuf>,
}

impl Shared {
    fn persist(&self) -> Result<()> {
        match &self.backing_file {
            Some(path) => snapshot::write(path, &self.objects),
            None => Ok(()),
        }
    }
}

/// Handle to a shared filtering object store.
#[derive(Debug, Clone, Default)]
pub struct Store {
    inner: Arc<(Mutex<Shared>, Condvar)>,
}

impl Store {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store whose persistent and boot-time objects are kept in
    /// `path` across process runs.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let objects = if path.exists() {
            snapshot::read(&path)?
        } else {
            ObjectSet::default()
        };

        info!(
            path = %path.display(),
            objects = objects.len(),
            "Opened filter store"
        );

        let store = Self::new();
        {
            let mut shared = store.state();
            shared.objects = objects;
            shared.backing_file = Some(path);
        }
        Ok(store)
    }

    /// Path of the backing snapshot, if any.
    pub fn backing_file(&self) -> Option<PathBuf> {
        self.state().backing_file.clone()
    }

    /// Open a new session on the store.
    pub fn session(&self, timeout: Duration) -> Session {
        let id = {
            let mut shared = self.state();
            shared.next_session += 1;
            let id = shared.next_session;
            shared.live_sessions.insert(id);
            id
        };
        debug!(session = id, "Opened engine session");
        Session {
            store: self.clone(),
            id,
            timeout,
            working: None,
        }
    }

    /// An independent in-memory copy of the committed objects.
    pub fn fork(&self) -> Store {
        let objects = self.state().objects.clone();
        let fork = Store::new();
        fork.state().objects = objects;
        fork
    }

    pub fn inject(&self, fault: Fault) {
        self.state().faults.push(fault);
    }

    pub fn clear_faults(&self) {
        self.state().faults.clear();
    }

    /// Simulate a restart of the engine service. Volatile objects are lost.
    pub fn restart(&self) {
        let mut shared = self.state();
        let removed = shared.objects.release(|_| false);
        info!(removed, "Filter engine restarted");
    }

    pub fn providers(&self) -> Vec<ProviderDescriptor> {
        self.state().objects.providers().cloned().collect()
    }

    pub fn sublayers(&self) -> Vec<SublayerDescriptor> {
        self.state().objects.sublayers().cloned().collect()
    }

    pub fn filters(&self) -> Vec<FilterDescriptor> {
        self.state().objects.filters().cloned().collect()
    }

    /// Identities of every committed object.
    pub fn object_ids(&self) -> BTreeSet<Uuid> {
        self.state().objects.ids()
    }

    /// Decide what the committed rule set does with `packet`.
    pub fn classify(&self, packet: &Packet) -> Action {
        classify::classify(&self.state().objects, packet)
    }

    fn has_fault(&self, fault: &Fault) -> bool {
        self.state().faults.contains(fault)
    }

    fn state(&self) -> MutexGuard<'_, Shared> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionFactory for Store {
    type Engine = Session;

    fn open_session(&self, timeout: Duration) -> Result<Session> {
        Ok(self.session(timeout))
    }
}

/// One process's connection to a [`Store`].
#[derive(Debug)]
pub struct Session {
    store: Store,
    id: SessionId,
    timeout: Duration,
    /// Uncommitted copy of the store while a transaction is open.
    working: Option<ObjectSet>,
}

impl Session {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn mutate(
        &mut self,
        fault: Fault,
        operation: &'static str,
        id: Uuid,
        f: impl FnOnce(&mut ObjectSet, SessionId) -> Result<()>,
    ) -> Result<()> {
        if self.working.is_none() {
            return Err(Error::NoTransaction);
        }
        if self.store.has_fault(&fault) {
            return Err(Error::rejected(operation, id, "injected failure"));
        }
        let session = self.id;
        match self.working.as_mut() {
            Some(working) => f(working, session),
            None => Err(Error::NoTransaction),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&ObjectSet) -> T) -> T {
        match &self.working {
            Some(working) => f(working),
            None => f(&self.store.state().objects),
        }
    }

    fn release_lock(&self) {
        let (lock, condvar) = &*self.store.inner;
        {
            let mut shared = lock.lock().unwrap_or_else(PoisonError::into_inner);
            if shared.lock_owner == Some(self.id) {
                shared.lock_owner = None;
            }
        }
        condvar.notify_all();
    }
}

impl FilterEngine for Session {
    fn begin_transaction(&mut self) -> Result<()> {
        if self.working.is_some() {
            return Err(Error::TransactionInProgress);
        }

        let id = self.id;
        let (lock, condvar) = &*self.store.inner;
        let shared = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut shared, _) = condvar
            .wait_timeout_while(shared, self.timeout, |s| {
                s.lock_owner.is_some_and(|owner| owner != id)
            })
            .unwrap_or_else(PoisonError::into_inner);

        if shared.lock_owner.is_some_and(|owner| owner != id) {
            debug!(session = id, "Timed out waiting for the engine lock");
            return Err(Error::Timeout(self.timeout.as_millis()));
        }

        shared.lock_owner = Some(id);
        self.working = Some(shared.objects.clone());
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<()> {
        let mut working = self.working.take().ok_or(Error::NoTransaction)?;

        let (lock, condvar) = &*self.store.inner;
        let mut shared = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let outcome = if shared.faults.contains(&Fault::FailCommit) {
            Err(Error::TransactionAborted(
                "commit rejected by the filter engine".to_string(),
            ))
        } else {
            // Sessions that closed while we held a copy must not leave
            // volatile objects behind.
            let live = shared.live_sessions.clone();
            working.release(|owner| live.contains(&owner));

            let persisted = match shared.backing_file.as_deref() {
                Some(path) => snapshot::write(path, &working),
                None => Ok(()),
            };
            match persisted {
                Ok(()) => {
                    shared.objects = working;
                    Ok(())
                }
                Err(e) => Err(Error::TransactionAborted(format!(
                    "failed to persist filter store: {}",
                    e
                ))),
            }
        };

        shared.lock_owner = None;
        drop(shared);
        condvar.notify_all();
        outcome
    }

    fn abort_transaction(&mut self) -> Result<()> {
        if self.working.take().is_some() {
            self.release_lock();
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.working.is_some()
    }

    fn add_provider(&mut self, provider: &ProviderDescriptor) -> Result<()> {
        self.mutate(Fault::RejectAdd(provider.id), "add", provider.id, |set, session| {
            set.add_provider(provider, session)
        })?;
        debug!(id = %provider.id, name = %provider.name, "Added provider");
        Ok(())
    }

    fn add_sublayer(&mut self, sublayer: &SublayerDescriptor) -> Result<()> {
        self.mutate(Fault::RejectAdd(sublayer.id), "add", sublayer.id, |set, session| {
            set.add_sublayer(sublayer, session)
        })?;
        debug!(id = %sublayer.id, name = %sublayer.name, "Added sublayer");
        Ok(())
    }

    fn add_filter(&mut self, filter: &FilterDescriptor) -> Result<()> {
        self.mutate(Fault::RejectAdd(filter.id), "add", filter.id, |set, session| {
            set.add_filter(filter, session)
        })?;
        debug!(id = %filter.id, name = %filter.name, layer = %filter.layer, "Added filter");
        Ok(())
    }

    fn get_provider(&self, id: &Uuid) -> Result<Option<ProviderDescriptor>> {
        Ok(self.read(|set| set.providers.get(id).map(|e| e.object.clone())))
    }

    fn get_sublayer(&self, id: &Uuid) -> Result<Option<SublayerDescriptor>> {
        Ok(self.read(|set| set.sublayers.get(id).map(|e| e.object.clone())))
    }

    fn get_filter(&self, id: &Uuid) -> Result<Option<FilterDescriptor>> {
        Ok(self.read(|set| set.filters.get(id).map(|e| e.object.clone())))
    }

    fn enumerate_sublayers(&self, provider: &Uuid) -> Result<Vec<SublayerDescriptor>> {
        Ok(self.read(|set| {
            set.sublayers()
                .filter(|s| s.provider == *provider)
                .cloned()
                .collect()
        }))
    }

    fn enumerate_filters(&self, provider: &Uuid) -> Result<Vec<FilterDescriptor>> {
        Ok(self.read(|set| {
            set.filters()
                .filter(|f| f.provider == *provider)
                .cloned()
                .collect()
        }))
    }

    fn delete_provider(&mut self, id: &Uuid) -> Result<()> {
        self.mutate(Fault::RejectDelete(*id), "delete", *id, |set, _| {
            if !set.delete_provider(id)? {
                debug!(%id, "Provider already absent");
            }
            Ok(())
        })
    }

    fn delete_sublayer(&mut self, id: &Uuid) -> Result<()> {
        self.mutate(Fault::RejectDelete(*id), "delete", *id, |set, _| {
            if !set.delete_sublayer(id)? {
                debug!(%id, "Sublayer already absent");
            }
            Ok(())
        })
    }

    fn delete_filter(&mut self, id: &Uuid) -> Result<()> {
        self.mutate(Fault::RejectDelete(*id), "delete", *id, |set, _| {
            if !set.delete_filter(id) {
                debug!(%id, "Filter already absent");
            }
            Ok(())
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let id = self.id;
        let (lock, condvar) = &*self.store.inner;
        {
            let mut shared = lock.lock().unwrap_or_else(PoisonError::into_inner);
            if shared.lock_owner == Some(id) {
                shared.lock_owner = None;
            }
            shared.live_sessions.remove(&id);

            let removed = shared.objects.release(|owner| owner != id);
            if removed > 0 {
                debug!(session = id, removed, "Removed volatile session objects");
                if let Err(e) = shared.persist() {
                    warn!("Failed to persist filter store: {}", e);
                }
            }
        }
        condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wfp::{Layer, Persistence, Transaction, Weight};

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn provider(persistent: bool) -> ProviderDescriptor {
        ProviderDescriptor {
            id: Uuid::from_u128(1),
            name: "provider".to_string(),
            description: String::new(),
            persistent,
        }
    }

    fn sublayer() -> SublayerDescriptor {
        SublayerDescriptor {
            id: Uuid::from_u128(2),
            name: "sublayer".to_string(),
            description: String::new(),
            provider: Uuid::from_u128(1),
            weight: 10,
            persistent: true,
        }
    }

    fn filter(id: u128, persistence: Persistence) -> FilterDescriptor {
        FilterDescriptor {
            id: Uuid::from_u128(id),
            name: "filter".to_string(),
            description: String::new(),
            provider: Uuid::from_u128(1),
            sublayer: Uuid::from_u128(2),
            layer: Layer::OUTBOUND_IPV4,
            weight: Weight::Min,
            action: Action::Block,
            conditions: Vec::new(),
            persistence,
        }
    }

    fn seed(store: &Store) {
        let mut session = store.session(TIMEOUT);
        Transaction::execute(&mut session, |engine| {
            engine.add_provider(&provider(true))?;
            engine.add_sublayer(&sublayer())
        })
        .unwrap();
    }

    #[test]
    fn test_mutation_requires_transaction() {
        let store = Store::new();
        let mut session = store.session(TIMEOUT);
        let err = session.add_provider(&provider(true)).unwrap_err();
        assert!(matches!(err, Error::NoTransaction));
    }

    #[test]
    fn test_commit_publishes_and_abort_discards() {
        let store = Store::new();
        seed(&store);

        let mut session = store.session(TIMEOUT);
        session.begin_transaction().unwrap();
        session.add_filter(&filter(10, Persistence::Persistent)).unwrap();
        assert!(session.get_filter(&Uuid::from_u128(10)).unwrap().is_some());
        assert!(store.filters().is_empty());
        session.abort_transaction().unwrap();
        assert!(store.filters().is_empty());

        session.begin_transaction().unwrap();
        session.add_filter(&filter(10, Persistence::Persistent)).unwrap();
        session.commit_transaction().unwrap();
        assert_eq!(store.filters().len(), 1);
    }

    #[test]
    fn test_duplicate_and_orphan_adds_are_rejected() {
        let store = Store::new();
        let mut session = store.session(TIMEOUT);
        session.begin_transaction().unwrap();
        assert!(session.add_sublayer(&sublayer()).is_err());
        session.add_provider(&provider(true)).unwrap();
        assert!(session.add_provider(&provider(true)).is_err());
        assert!(session.add_filter(&filter(10, Persistence::Volatile)).is_err());
        session.abort_transaction().unwrap();
    }

    #[test]
    fn test_delete_is_idempotent_but_respects_dependents() {
        let store = Store::new();
        seed(&store);

        let mut session = store.session(TIMEOUT);
        Transaction::execute(&mut session, |engine| {
            engine.add_filter(&filter(10, Persistence::Persistent))
        })
        .unwrap();

        session.begin_transaction().unwrap();
        assert!(session.delete_sublayer(&Uuid::from_u128(2)).is_err());
        session.delete_filter(&Uuid::from_u128(10)).unwrap();
        session.delete_filter(&Uuid::from_u128(10)).unwrap();
        session.delete_sublayer(&Uuid::from_u128(2)).unwrap();
        session.delete_provider(&Uuid::from_u128(1)).unwrap();
        session.delete_provider(&Uuid::from_u128(1)).unwrap();
        session.commit_transaction().unwrap();
        assert!(store.object_ids().is_empty());
    }

    #[test]
    fn test_volatile_objects_die_with_session() {
        let store = Store::new();
        seed(&store);
        {
            let mut session = store.session(TIMEOUT);
            Transaction::execute(&mut session, |engine| {
                engine.add_filter(&filter(10, Persistence::Volatile))?;
                engine.add_filter(&filter(11, Persistence::Persistent))?;
                engine.add_filter(&filter(12, Persistence::BootTime))
            })
            .unwrap();
            assert_eq!(store.filters().len(), 3);
        }
        let ids: Vec<Uuid> = store.filters().iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(11), Uuid::from_u128(12)]);
    }

    #[test]
    fn test_restart_drops_volatile_objects() {
        let store = Store::new();
        let mut session = store.session(TIMEOUT);
        Transaction::execute(&mut session, |engine| engine.add_provider(&provider(false))).unwrap();
        assert_eq!(store.providers().len(), 1);
        store.restart();
        assert!(store.providers().is_empty());
    }

    #[test]
    fn test_lock_contention_times_out() {
        let store = Store::new();
        let mut first = store.session(TIMEOUT);
        let mut second = store.session(Duration::from_millis(20));

        first.begin_transaction().unwrap();
        let err = second.begin_transaction().unwrap_err();
        assert!(matches!(err, Error::Timeout(20)));

        first.commit_transaction().unwrap();
        second.begin_transaction().unwrap();
        second.abort_transaction().unwrap();
    }

    #[test]
    fn test_dropped_transaction_releases_lock() {
        let store = Store::new();
        {
            let mut first = store.session(TIMEOUT);
            first.begin_transaction().unwrap();
        }
        let mut second = store.session(TIMEOUT);
        assert!(second.begin_transaction().is_ok());
    }

    #[test]
    fn test_injected_commit_failure_leaves_store_unchanged() {
        let store = Store::new();
        seed(&store);
        let before = store.object_ids();

        store.inject(Fault::FailCommit);
        let mut session = store.session(TIMEOUT);
        let err = Transaction::execute(&mut session, |engine| {
            engine.add_filter(&filter(10, Persistence::Persistent))
        })
        .unwrap_err();
        assert!(matches!(err, Error::TransactionAborted(_)));
        assert_eq!(store.object_ids(), before);

        store.clear_faults();
        Transaction::execute(&mut session, |engine| {
            engine.add_filter(&filter(10, Persistence::Persistent))
        })
        .unwrap();
        assert_eq!(store.filters().len(), 1);
    }
}
