// VPN Kill Switch - Library Root
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Fail-closed firewall policy engine for a VPN client.
//!
//! The engine maps the connection phases *blocked*, *connecting* and
//! *connected* onto a minimal set of filtering objects, applies each set
//! atomically, and can leave a persistent block behind so the host stays
//! offline across crashes and reboots until a new instance takes over.

pub mod config;
pub mod context;
pub mod error;
pub mod filtering_base;
pub mod guids;
pub mod models;
pub mod object_purger;
pub mod persistent_block;
pub mod rules;
pub mod wfp;
pub mod winfw;

pub use context::{FwContext, PolicyState};
pub use error::{Error, ErrorKind, Result};
pub use winfw::{FirewallEvent, WinFw};
