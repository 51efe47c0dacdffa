// VPN Kill Switch - Filter Engine Adapter
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Session-level access to the filtering engine's object store.

use std::time::Duration;

use uuid::Uuid;

use super::{FilterDescriptor, ProviderDescriptor, SublayerDescriptor};
use crate::error::Result;

/// One open session on the filtering engine.
///
/// Mutations are only accepted while a transaction is open on the session.
/// Reads inside a transaction observe its uncommitted changes; reads outside
/// observe the committed store.
///
/// Deleting an object that does not exist succeeds.
pub trait FilterEngine {
    fn begin_transaction(&mut self) -> Result<()>;
    fn commit_transaction(&mut self) -> Result<()>;
    fn abort_transaction(&mut self) -> Result<()>;
    fn in_transaction(&self) -> bool;

    fn add_provider(&mut self, provider: &ProviderDescriptor) -> Result<()>;
    fn add_sublayer(&mut self, sublayer: &SublayerDescriptor) -> Result<()>;
    fn add_filter(&mut self, filter: &FilterDescriptor) -> Result<()>;

    fn get_provider(&self, id: &Uuid) -> Result<Option<ProviderDescriptor>>;
    fn get_sublayer(&self, id: &Uuid) -> Result<Option<SublayerDescriptor>>;
    fn get_filter(&self, id: &Uuid) -> Result<Option<FilterDescriptor>>;

    /// Sublayers owned by `provider`.
    fn enumerate_sublayers(&self, provider: &Uuid) -> Result<Vec<SublayerDescriptor>>;
    /// Filters owned by `provider`.
    fn enumerate_filters(&self, provider: &Uuid) -> Result<Vec<FilterDescriptor>>;

    fn delete_provider(&mut self, id: &Uuid) -> Result<()>;
    fn delete_sublayer(&mut self, id: &Uuid) -> Result<()>;
    fn delete_filter(&mut self, id: &Uuid) -> Result<()>;

    fn find_provider(
        &self,
        id: &Uuid,
        predicate: &dyn Fn(&ProviderDescriptor) -> bool,
    ) -> Result<bool> {
        Ok(self.get_provider(id)?.is_some_and(|p| predicate(&p)))
    }

    fn find_sublayer(
        &self,
        id: &Uuid,
        predicate: &dyn Fn(&SublayerDescriptor) -> bool,
    ) -> Result<bool> {
        Ok(self.get_sublayer(id)?.is_some_and(|s| predicate(&s)))
    }

    fn find_filter(
        &self,
        id: &Uuid,
        predicate: &dyn Fn(&FilterDescriptor) -> bool,
    ) -> Result<bool> {
        Ok(self.get_filter(id)?.is_some_and(|f| predicate(&f)))
    }
}

/// Opens engine sessions bounded by a lock-acquisition timeout.
pub trait SessionFactory {
    type Engine: FilterEngine;

    fn open_session(&self, timeout: Duration) -> Result<Self::Engine>;
}
