// VPN Kill Switch - Settings Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Administrative exceptions applied on top of every policy.

use serde::{Deserialize, Serialize};

/// Exceptions that every policy honors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallSettings {
    /// Permit traffic to and from private networks and loopback.
    #[serde(default)]
    pub allow_lan: bool,
    /// Permit DHCP address negotiation.
    #[serde(default)]
    pub allow_dhcp: bool,
}

impl FirewallSettings {
    pub fn new(allow_lan: bool, allow_dhcp: bool) -> Self {
        Self {
            allow_lan,
            allow_dhcp,
        }
    }
}
