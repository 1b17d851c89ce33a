//! Discovery Engine (C3): drives a subnet sweep, ingests captured ARP
//! traffic into the shared `Registry`, and resolves hostnames as an
//! optional, silently-failing post-processing step.

use std::net::Ipv4Addr;
use std::sync::Arc;

use pnet::util::MacAddr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::binding::InterfaceBinding;
use crate::channel::FrameSink;
use crate::codec::{self, DecodedArp};
use crate::config::Config;
use crate::device::{Device, Registry};
use crate::events::LogHub;

pub struct DiscoveryEngine {
    binding: InterfaceBinding,
    registry: Arc<Registry>,
    channel: Arc<dyn FrameSink>,
    log: Arc<LogHub>,
    config: Config,
}

impl DiscoveryEngine {
    pub fn new(
        binding: InterfaceBinding,
        registry: Arc<Registry>,
        channel: Arc<dyn FrameSink>,
        log: Arc<LogHub>,
        config: Config,
    ) -> Self {
        Self {
            binding,
            registry,
            channel,
            log,
            config,
        }
    }

    /// Called from the capture callback for every decoded frame. Upserts on
    /// both op 1 (request) and op 2 (reply) — `spec.md` §9 preserves the
    /// source's behavior of learning from gratuitous requests too. Frames
    /// that echo our own MAC are ignored.
    pub fn ingest(&self, decoded: &DecodedArp) {
        if decoded.sender_mac == self.binding.own_mac {
            return;
        }
        if decoded.operation != 1 && decoded.operation != 2 {
            return;
        }
        self.registry
            .upsert_device(decoded.sender_ip, decoded.sender_mac);
    }

    /// Enumerates host IPs of the bound subnet (excluding network,
    /// broadcast, and `own_ip`), emitting one ARP request per candidate
    /// with a pacing gap, then waits a grace period for late replies before
    /// resolving. `progress_sink`, if given, receives monotonic
    /// non-decreasing percentages in `[0, 100]`.
    pub async fn scan(&self, progress_sink: Option<mpsc::Sender<u8>>, cancel: CancellationToken) {
        let hosts: Vec<Ipv4Addr> = self
            .binding
            .hosts()
            .filter(|ip| *ip != self.binding.own_ip)
            .collect();
        let total = hosts.len().max(1);

        for (i, ip) in hosts.iter().enumerate() {
            if cancel.is_cancelled() {
                return;
            }

            let frame = codec::arp_request(self.binding.own_mac, self.binding.own_ip, *ip);
            self.channel.inject(&frame);

            if let Some(sink) = &progress_sink {
                let pct = (((i + 1) * 100) / total).min(100) as u8;
                let _ = sink.send(pct).await;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.scan_inter_packet_gap) => {}
                _ = cancel.cancelled() => return,
            }
        }

        if let Some(sink) = &progress_sink {
            let _ = sink.send(100).await;
        }

        tokio::select! {
            _ = tokio::time::sleep(self.config.scan_grace_period) => {}
            _ = cancel.cancelled() => {}
        }

        self.log.publish(format!(
            "sweep of {}/{} complete, {} hosts probed",
            self.binding.network_addr(),
            self.binding.prefix_len(),
            hosts.len()
        ));
    }

    /// Targeted single-host probe, e.g. to resolve the gateway when a sweep
    /// missed it.
    pub fn request(&self, ip: Ipv4Addr) {
        let frame = codec::arp_request(self.binding.own_mac, self.binding.own_ip, ip);
        self.channel.inject(&frame);
    }

    pub fn devices(&self) -> Vec<Device> {
        self.registry.devices_snapshot()
    }

    pub fn find_gateway(&self) -> Option<Device> {
        self.registry.find_gateway()
    }

    /// Probes `gateway_ip` directly and waits briefly for a reply, for the
    /// case where a sweep missed the gateway. Used by the bundled CLI
    /// before constructing a `BlockingEngine`.
    pub async fn resolve_gateway(&self, attempts: u32, retry_gap: std::time::Duration) -> Option<Device> {
        if let Some(device) = self.find_gateway() {
            return Some(device);
        }
        for _ in 0..attempts.max(1) {
            self.request(self.binding.gateway_ip);
            tokio::time::sleep(retry_gap).await;
            if let Some(device) = self.find_gateway() {
                return Some(device);
            }
        }
        None
    }

    /// Optional post-scan step: reverse-resolve hostnames for every
    /// discovered device. Runs on a blocking task since DNS lookups block;
    /// failures are silent per `spec.md` §4.3.
    pub async fn resolve_hostnames(&self) {
        let registry = self.registry.clone();
        let devices = self.devices();
        tokio::task::spawn_blocking(move || {
            for device in devices {
                if let Ok(name) = dns_lookup::lookup_addr(&std::net::IpAddr::V4(device.ip)) {
                    registry.set_hostname(device.mac, name);
                }
            }
        })
        .await
        .ok();
    }

    pub fn own_mac(&self) -> MacAddr {
        self.binding.own_mac
    }

    pub fn binding(&self) -> &InterfaceBinding {
        &self.binding
    }
}
