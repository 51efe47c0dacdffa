// VPN Kill Switch - Models
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Caller-facing inputs to policy operations.

mod relay;
mod settings;

pub use relay::{PingableHosts, Relay};
pub use settings::FirewallSettings;
