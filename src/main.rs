// VPN Kill Switch - Command Line Driver
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! `killswitchctl`: inspect and drive the firewall state kept on disk.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use vpn_killswitch::config::EngineConfig;
use vpn_killswitch::guids::Role;
use vpn_killswitch::models::{FirewallSettings, PingableHosts, Relay};
use vpn_killswitch::wfp::{Protocol, Store};
use vpn_killswitch::{persistent_block, WinFw};

#[derive(Parser)]
#[command(name = "killswitchctl")]
#[command(about = "Fail-closed VPN firewall control")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Filter store snapshot, overrides the configuration
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,
    /// Engine lock timeout in seconds, overrides the configuration
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the firewall objects currently installed
    Status,
    /// Leave the host blocked until the next start
    Arm,
    /// Clear a block left by a previous run
    Disarm,
    /// Remove policy filters, or everything when no firewall is running
    Reset,
    /// Remove every object this firewall owns
    Purge,
    /// Show the filters a policy would install, without touching the store
    Preview {
        #[arg(value_enum)]
        policy: Policy,
        /// Relay endpoint
        #[arg(long, default_value = "1.2.3.4:51820")]
        relay: SocketAddr,
        /// Relay transport
        #[arg(long, value_enum, default_value = "udp")]
        protocol: Transport,
        /// Tunnel interface alias
        #[arg(long, default_value = "wg0")]
        alias: String,
        /// Tunnel DNS resolver (IPv4)
        #[arg(long, default_value = "10.64.0.1")]
        dns: Ipv4Addr,
        /// Tunnel DNS resolver (IPv6)
        #[arg(long)]
        dns6: Option<Ipv6Addr>,
        /// Hosts that may be pinged while connecting
        #[arg(long)]
        ping: Vec<IpAddr>,
        #[arg(long)]
        allow_lan: bool,
        #[arg(long)]
        allow_dhcp: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    Blocked,
    Connecting,
    Connected,
}

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    Tcp,
    Udp,
}

impl From<Transport> for Protocol {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::Tcp => Protocol::Tcp,
            Transport::Udp => Protocol::Udp,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    };
    if let Some(path) = cli.state_file {
        config.state_file = path;
    }
    if let Some(secs) = cli.timeout {
        config.timeout_secs = secs;
    }

    let store = Store::open(&config.state_file)
        .with_context(|| format!("opening filter store {}", config.state_file.display()))?;
    let timeout = config.timeout();

    match cli.command {
        Commands::Status => status(&store, timeout),
        Commands::Arm => cycle(&store, timeout, true),
        Commands::Disarm => cycle(&store, timeout, false),
        Commands::Reset => {
            let mut fw = firewall(&store);
            if !fw.reset() {
                bail!("reset failed");
            }
            println!("Firewall reset");
            Ok(())
        }
        Commands::Purge => {
            let mut fw = firewall(&store);
            if !fw.purge() {
                bail!("purge failed");
            }
            println!("All firewall objects removed");
            Ok(())
        }
        Commands::Preview {
            policy,
            relay,
            protocol,
            alias,
            dns,
            dns6,
            ping,
            allow_lan,
            allow_dhcp,
        } => {
            let settings = FirewallSettings {
                allow_lan: allow_lan || config.settings.allow_lan,
                allow_dhcp: allow_dhcp || config.settings.allow_dhcp,
            };
            let relay = Relay::new(relay.ip(), relay.port(), protocol.into());
            let hosts = (!ping.is_empty()).then(|| PingableHosts::new(ping));

            let preview = store.fork();
            let mut fw = firewall(&preview);
            if !fw.initialize(timeout) {
                bail!("initialization failed");
            }
            let applied = match policy {
                Policy::Blocked => fw.apply_policy_blocked(&settings),
                Policy::Connecting => fw.apply_policy_connecting(&settings, &relay, hosts.as_ref()),
                Policy::Connected => {
                    fw.apply_policy_connected(&settings, &relay, &alias, dns, dns6)
                }
            };
            if !applied {
                bail!("policy could not be applied");
            }
            print_filters(&preview);
            fw.deinitialize(false);
            Ok(())
        }
    }
}

fn firewall(store: &Store) -> WinFw<Store> {
    WinFw::new(store.clone()).with_error_sink(|msg| eprintln!("error: {}", msg))
}

/// Start and stop a firewall instance, optionally leaving the block armed.
fn cycle(store: &Store, timeout: Duration, arm: bool) -> Result<()> {
    let mut fw = firewall(store);
    if !fw.initialize(timeout) {
        bail!("initialization failed");
    }
    if !fw.deinitialize(arm) {
        bail!("deinitialization failed");
    }
    if arm {
        println!("Persistent block armed");
    } else {
        println!("Persistent block cleared");
    }
    Ok(())
}

fn status(store: &Store, timeout: Duration) -> Result<()> {
    let session = store.session(timeout);
    let armed = persistent_block::is_enabled(&session)?;

    let backing = store
        .backing_file()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "in-memory".to_string());
    println!("Store:     {}", backing);
    println!("Armed:     {}", if armed { "yes" } else { "no" });
    println!("Providers: {}", store.providers().len());
    for sublayer in store.sublayers() {
        println!("Sublayer:  {} (weight {})", sublayer.name, sublayer.weight);
    }
    print_filters(store);
    Ok(())
}

fn print_filters(store: &Store) {
    let mut filters = store.filters();
    filters.sort_by_key(|f| std::cmp::Reverse(f.weight.value()));

    println!("Filters:   {}", filters.len());
    for filter in filters {
        let role = Role::from_id(&filter.id)
            .map(|r| format!("{:?}", r))
            .unwrap_or_else(|| filter.id.to_string());
        let conditions: Vec<String> = filter.conditions.iter().map(ToString::to_string).collect();
        println!(
            "  {:<8} {:<18} {:<32} {:?} {}",
            format!("{:?}", filter.action).to_lowercase(),
            filter.layer.to_string(),
            role,
            filter.persistence,
            conditions.join(" ")
        );
    }
}
