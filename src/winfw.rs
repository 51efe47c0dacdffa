// VPN Kill Switch - Firewall Control Surface
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Caller-facing entry points.
//!
//! Every operation reports a plain success flag. Failures are also logged,
//! passed as text to the error sink, and broadcast as a
//! [`FirewallEvent::Error`].

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::context::{FwContext, PolicyState};
use crate::error::{Error, Result};
use crate::models::{FirewallSettings, PingableHosts, Relay};
use crate::object_purger;
use crate::persistent_block;
use crate::wfp::{SessionFactory, Transaction};

/// Timeout used before the first successful initialization.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives a human-readable message for every failed operation.
pub type ErrorSink = Box<dyn Fn(&str) + Send>;

/// Lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirewallEvent {
    Initialized(PolicyState),
    PolicyApplied(PolicyState),
    Reset,
    Purged,
    Deinitialized { armed: bool },
    Error(String),
}

/// Owner of the live policy context.
pub struct WinFw<S: SessionFactory> {
    sessions: S,
    timeout: Duration,
    context: Option<FwContext<S::Engine>>,
    block_on_exit: bool,
    error_sink: Option<ErrorSink>,
    event_sender: broadcast::Sender<FirewallEvent>,
}

impl<S: SessionFactory> WinFw<S> {
    pub fn new(sessions: S) -> Self {
        let (event_sender, _) = broadcast::channel(32);
        Self {
            sessions,
            timeout: DEFAULT_TIMEOUT,
            context: None,
            block_on_exit: false,
            error_sink: None,
            event_sender,
        }
    }

    pub fn with_error_sink(mut self, sink: impl Fn(&str) + Send + 'static) -> Self {
        self.error_sink = Some(Box::new(sink));
        self
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<FirewallEvent> {
        self.event_sender.subscribe()
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    pub fn state(&self) -> PolicyState {
        self.context
            .as_ref()
            .map_or(PolicyState::Uninitialized, FwContext::state)
    }

    /// Whether the last successful transition left the host in a blocking
    /// posture.
    pub fn block_on_exit(&self) -> bool {
        self.block_on_exit
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Clear any stale block, prepare the baseline, and start a context.
    pub fn initialize(&mut self, timeout: Duration) -> bool {
        let result = self.start(timeout, |engine| FwContext::new(engine));
        self.finish("initialize", result)
    }

    /// Like [`WinFw::initialize`], with the blocked policy in place before
    /// returning.
    pub fn initialize_blocked(&mut self, timeout: Duration, settings: &FirewallSettings) -> bool {
        let result = self
            .start(timeout, |engine| FwContext::new_blocked(engine, settings))
            .map(|()| self.block_on_exit = true);
        self.finish("initialize blocked", result)
    }

    fn start(
        &mut self,
        timeout: Duration,
        create: impl FnOnce(S::Engine) -> Result<FwContext<S::Engine>>,
    ) -> Result<()> {
        if self.context.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        self.timeout = timeout;

        let engine = self.sessions.open_session(timeout)?;
        let context = create(engine)?;
        let state = context.state();
        self.context = Some(context);

        info!(%state, timeout_ms = timeout.as_millis() as u64, "Firewall initialized");
        let _ = self.event_sender.send(FirewallEvent::Initialized(state));
        Ok(())
    }

    /// Tear down the context. With `arm_boot_time_block` the persistent
    /// block is installed first, so no traffic passes once the policy goes.
    pub fn deinitialize(&mut self, arm_boot_time_block: bool) -> bool {
        let Some(mut context) = self.context.take() else {
            return true;
        };

        let result = if arm_boot_time_block {
            Transaction::execute(context.engine_mut(), |engine| persistent_block::enable(engine))
        } else {
            Ok(())
        };
        drop(context);

        let armed = arm_boot_time_block && result.is_ok();
        info!(armed, "Firewall deinitialized");
        let _ = self
            .event_sender
            .send(FirewallEvent::Deinitialized { armed });
        self.finish("deinitialize", result)
    }

    pub fn apply_policy_connecting(
        &mut self,
        settings: &FirewallSettings,
        relay: &Relay,
        pingable_hosts: Option<&PingableHosts>,
    ) -> bool {
        let result = self.with_context(|context| {
            context.apply_policy_connecting(settings, relay, pingable_hosts)
        });
        self.applied("apply connecting policy", result)
    }

    pub fn apply_policy_connected(
        &mut self,
        settings: &FirewallSettings,
        relay: &Relay,
        tunnel_alias: &str,
        v4_dns: Ipv4Addr,
        v6_dns: Option<Ipv6Addr>,
    ) -> bool {
        let result = self.with_context(|context| {
            context.apply_policy_connected(settings, relay, tunnel_alias, v4_dns, v6_dns)
        });
        self.applied("apply connected policy", result)
    }

    pub fn apply_policy_blocked(&mut self, settings: &FirewallSettings) -> bool {
        let result = self.with_context(|context| context.apply_policy_blocked(settings));
        if result.is_ok() {
            self.block_on_exit = true;
        }
        self.applied("apply blocked policy", result)
    }

    /// Reset the live context, or purge everything when there is none.
    pub fn reset(&mut self) -> bool {
        let result = match self.context.as_mut() {
            Some(context) => context.reset(),
            None => object_purger::execute(&self.sessions, self.timeout, object_purger::remove_all),
        };
        if result.is_ok() {
            self.block_on_exit = false;
            let _ = self.event_sender.send(FirewallEvent::Reset);
        }
        self.finish("reset", result)
    }

    /// Remove every owned object, independent of any live context.
    pub fn purge(&mut self) -> bool {
        let result =
            object_purger::execute(&self.sessions, self.timeout, object_purger::remove_all);
        if result.is_ok() {
            let _ = self.event_sender.send(FirewallEvent::Purged);
        }
        self.finish("purge", result)
    }

    fn with_context(
        &mut self,
        f: impl FnOnce(&mut FwContext<S::Engine>) -> Result<()>,
    ) -> Result<()> {
        match self.context.as_mut() {
            Some(context) => f(context),
            None => Err(Error::NotInitialized),
        }
    }

    fn applied(&self, operation: &str, result: Result<()>) -> bool {
        if result.is_ok() {
            let _ = self
                .event_sender
                .send(FirewallEvent::PolicyApplied(self.state()));
        }
        self.finish(operation, result)
    }

    fn finish(&self, operation: &str, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                let message = format!("Failed to {}: {}", operation, e);
                error!("{}", message);
                if let Some(sink) = &self.error_sink {
                    sink(&message);
                }
                let _ = self.event_sender.send(FirewallEvent::Error(message));
                false
            }
        }
    }
}

impl<S: SessionFactory> Drop for WinFw<S> {
    fn drop(&mut self) {
        if self.context.is_some() {
            let arm = self.block_on_exit;
            if !self.deinitialize(arm) {
                warn!("Firewall teardown did not complete cleanly");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guids::Role;
    use crate::wfp::{Fault, Protocol, Store};
    use std::sync::{Arc, Mutex};

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn relay() -> Relay {
        Relay::new("1.2.3.4".parse().unwrap(), 51820, Protocol::Udp)
    }

    fn with_sink(store: &Store) -> (WinFw<Store>, Arc<Mutex<Vec<String>>>) {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&messages);
        let fw = WinFw::new(store.clone())
            .with_error_sink(move |msg| sink.lock().unwrap().push(msg.to_string()));
        (fw, messages)
    }

    #[test]
    fn test_initialize_twice_fails() {
        let store = Store::new();
        let (mut fw, messages) = with_sink(&store);

        assert!(fw.initialize(TIMEOUT));
        assert!(!fw.initialize(TIMEOUT));
        assert_eq!(messages.lock().unwrap().len(), 1);
        assert!(messages.lock().unwrap()[0].contains("already initialized"));
    }

    #[test]
    fn test_apply_without_context_fails() {
        let store = Store::new();
        let (mut fw, messages) = with_sink(&store);
        assert!(!fw.apply_policy_blocked(&FirewallSettings::default()));
        assert!(messages.lock().unwrap()[0].contains("not initialized"));
        assert!(!fw.block_on_exit());
    }

    #[test]
    fn test_block_on_exit_tracking() {
        let store = Store::new();
        let mut fw = WinFw::new(store.clone());

        assert!(fw.initialize(TIMEOUT));
        assert!(!fw.block_on_exit());
        assert!(fw.apply_policy_blocked(&FirewallSettings::default()));
        assert!(fw.block_on_exit());
        assert!(fw.apply_policy_connecting(&FirewallSettings::default(), &relay(), None));
        assert!(fw.block_on_exit());
        assert!(fw.reset());
        assert!(!fw.block_on_exit());
        assert_eq!(fw.state(), PolicyState::Uninitialized);
    }

    #[test]
    fn test_drop_arms_block_when_blocking() {
        let store = Store::new();
        {
            let mut fw = WinFw::new(store.clone());
            assert!(fw.initialize_blocked(TIMEOUT, &FirewallSettings::default()));
        }
        let session = store.session(TIMEOUT);
        assert!(persistent_block::is_enabled(&session).unwrap());
        assert_eq!(store.filters().len(), 4);

        {
            let mut fw = WinFw::new(store.clone());
            assert!(fw.initialize(TIMEOUT));
            assert!(store.filters().is_empty());
        }
        assert!(store.filters().is_empty());
    }

    #[test]
    fn test_events_are_broadcast() {
        let store = Store::new();
        let mut fw = WinFw::new(store.clone());
        let mut events = fw.subscribe();

        assert!(fw.initialize(TIMEOUT));
        assert!(fw.apply_policy_blocked(&FirewallSettings::default()));
        assert!(fw.deinitialize(false));

        assert_eq!(
            events.try_recv().unwrap(),
            FirewallEvent::Initialized(PolicyState::Uninitialized)
        );
        assert_eq!(
            events.try_recv().unwrap(),
            FirewallEvent::PolicyApplied(PolicyState::Blocked)
        );
        assert_eq!(
            events.try_recv().unwrap(),
            FirewallEvent::Deinitialized { armed: false }
        );
    }

    #[test]
    fn test_failed_arm_reports_but_tears_down() {
        let store = Store::new();
        let (mut fw, messages) = with_sink(&store);
        assert!(fw.initialize(TIMEOUT));

        store.inject(Fault::RejectAdd(Role::BootTimeBlockAllOutboundIpv4.id()));
        assert!(!fw.deinitialize(true));
        assert!(!fw.is_initialized());
        assert_eq!(messages.lock().unwrap().len(), 1);
        assert!(store.filters().is_empty());
    }

    #[test]
    fn test_reset_without_context_purges() {
        let store = Store::new();
        {
            let mut fw = WinFw::new(store.clone());
            assert!(fw.initialize(TIMEOUT));
            assert!(fw.deinitialize(true));
        }
        assert!(!store.object_ids().is_empty());

        let mut fw = WinFw::new(store.clone());
        assert!(fw.reset());
        assert!(store.object_ids().is_empty());
    }

    #[test]
    fn test_purge_with_live_context() {
        let store = Store::new();
        let mut fw = WinFw::new(store.clone());
        assert!(fw.initialize_blocked(TIMEOUT, &FirewallSettings::new(true, true)));

        assert!(fw.purge());
        assert!(store.object_ids().is_empty());
        assert!(fw.is_initialized());
    }
}
