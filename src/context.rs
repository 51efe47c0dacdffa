// VPN Kill Switch - Policy Context
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! The policy state machine.
//!
//! A [`FwContext`] owns one engine session and keeps at most one policy
//! state's filters installed. Every transition computes the complete filter
//! set of the target state first, then swaps it in with a single
//! transaction. A failed transition leaves both the store and the logical
//! state untouched.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{FirewallSettings, PingableHosts, Relay};
use crate::wfp::{FilterDescriptor, FilterEngine, Transaction};
use crate::{filtering_base, persistent_block, rules};

/// Externally driven connection phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyState {
    #[default]
    Uninitialized,
    Blocked,
    Connecting,
    Connected,
}

impl fmt::Display for PolicyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolicyState::Uninitialized => "uninitialized",
            PolicyState::Blocked => "blocked",
            PolicyState::Connecting => "connecting",
            PolicyState::Connected => "connected",
        })
    }
}

/// Live policy bound to an engine session.
#[derive(Debug)]
pub struct FwContext<E: FilterEngine> {
    engine: E,
    state: PolicyState,
    installed: Vec<Uuid>,
}

/// Delete every policy filter identity, whoever installed it.
fn remove_policy<E: FilterEngine + ?Sized>(engine: &mut E) -> Result<()> {
    for role in rules::POLICY_ROLES {
        engine.delete_filter(&role.id())?;
    }
    Ok(())
}

fn install<E: FilterEngine + ?Sized>(
    engine: &mut E,
    filters: &[FilterDescriptor],
) -> Result<Vec<Uuid>> {
    filtering_base::add_baseline(engine)?;
    remove_policy(engine)?;
    for filter in filters {
        engine.add_filter(filter)?;
    }
    Ok(filters.iter().map(|f| f.id).collect())
}

impl<E: FilterEngine> FwContext<E> {
    /// Clear a stale persistent block and prepare the baseline, as one step.
    pub fn new(mut engine: E) -> Result<Self> {
        Transaction::execute(&mut engine, |engine| {
            persistent_block::disable(engine)?;
            filtering_base::add_baseline(engine)
        })?;

        info!("Firewall context created");
        Ok(Self {
            engine,
            state: PolicyState::Uninitialized,
            installed: Vec::new(),
        })
    }

    /// Like [`FwContext::new`], with the blocked policy installed in the
    /// same transaction.
    pub fn new_blocked(mut engine: E, settings: &FirewallSettings) -> Result<Self> {
        let filters = rules::blocked(settings)?;
        let installed = Transaction::execute(&mut engine, |engine| {
            persistent_block::disable(engine)?;
            install(engine, &filters)
        })?;

        info!(filters = installed.len(), "Firewall context created in blocked state");
        Ok(Self {
            engine,
            state: PolicyState::Blocked,
            installed,
        })
    }

    pub fn state(&self) -> PolicyState {
        self.state
    }

    /// Identities of the filters the current state installed.
    pub fn installed(&self) -> &[Uuid] {
        &self.installed
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn apply_policy_blocked(&mut self, settings: &FirewallSettings) -> Result<()> {
        let filters = rules::blocked(settings)?;
        self.apply(PolicyState::Blocked, &filters)
    }

    pub fn apply_policy_connecting(
        &mut self,
        settings: &FirewallSettings,
        relay: &Relay,
        pingable_hosts: Option<&PingableHosts>,
    ) -> Result<()> {
        let filters = rules::connecting(settings, relay, pingable_hosts)?;
        self.apply(PolicyState::Connecting, &filters)
    }

    pub fn apply_policy_connected(
        &mut self,
        settings: &FirewallSettings,
        relay: &Relay,
        tunnel_alias: &str,
        v4_dns: Ipv4Addr,
        v6_dns: Option<Ipv6Addr>,
    ) -> Result<()> {
        let filters = rules::connected(settings, relay, tunnel_alias, v4_dns, v6_dns)?;
        self.apply(PolicyState::Connected, &filters)
    }

    /// Remove every policy filter. The baseline stays.
    pub fn reset(&mut self) -> Result<()> {
        Transaction::execute(&mut self.engine, |engine| remove_policy(engine))?;

        info!(previous = %self.state, "Firewall policy reset");
        self.state = PolicyState::Uninitialized;
        self.installed.clear();
        Ok(())
    }

    fn apply(&mut self, next: PolicyState, filters: &[FilterDescriptor]) -> Result<()> {
        debug!(from = %self.state, to = %next, filters = filters.len(), "Applying policy");

        let installed = Transaction::execute(&mut self.engine, |engine| install(engine, filters))?;

        info!(state = %next, filters = installed.len(), "Policy applied");
        self.state = next;
        self.installed = installed;
        Ok(())
    }
}
