//! Thin façade matching `spec.md` §6's external interface: the UI
//! constructs `ArpEngine(interface_binding)` (wiring C1+C2+C3), then, once
//! a gateway is resolved, `BlockingEngine(arp_engine, gateway_device)`
//! (C4). Both expose a log-event stream.

use std::sync::Mutex;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::binding::InterfaceBinding;
use crate::blocking::BlockingEngine;
use crate::channel::{CaptureChannel, FrameSink};
use crate::codec;
use crate::config::Config;
use crate::device::{Device, Registry};
use crate::discovery::DiscoveryEngine;
use crate::error::CoreError;
use crate::events::{LogEvent, LogHub};

pub struct ArpEngine {
    binding: InterfaceBinding,
    registry: Arc<Registry>,
    channel: Arc<CaptureChannel>,
    discovery: Arc<DiscoveryEngine>,
    log: Arc<LogHub>,
    config: Config,
    capture_task: Mutex<Option<JoinHandle<()>>>,
}

impl ArpEngine {
    pub fn new(binding: InterfaceBinding, config: Config) -> Result<Self, CoreError> {
        let interface = pnet_datalink::interfaces()
            .into_iter()
            .find(|i| i.name == binding.interface_name)
            .ok_or_else(|| CoreError::NoInterface(binding.interface_name.clone()))?;

        let channel = Arc::new(CaptureChannel::open(&interface, config.capture_read_timeout)?);
        let registry = Arc::new(Registry::new(binding.gateway_ip));
        let log = Arc::new(LogHub::new(config.max_log_lines));
        let sink: Arc<dyn FrameSink> = channel.clone();
        let discovery = Arc::new(DiscoveryEngine::new(
            binding.clone(),
            registry.clone(),
            sink,
            log.clone(),
            config.clone(),
        ));

        Ok(Self {
            binding,
            registry,
            channel,
            discovery,
            log,
            config,
            capture_task: Mutex::new(None),
        })
    }

    /// Begins delivering captured frames into the discovery engine. Mirrors
    /// `CaptureChannel::start`'s idempotence: calling this twice is a no-op
    /// the second time (the channel has already handed out its receiver).
    pub fn start(&self) {
        let discovery = self.discovery.clone();
        let handle = self.channel.start(move |frame| {
            if let Some(decoded) = codec::decode(frame) {
                discovery.ingest(&decoded);
            }
        });
        if handle.is_some() {
            *self.capture_task.lock().unwrap() = handle;
        }
    }

    pub async fn scan(&self, progress_sink: Option<mpsc::Sender<u8>>, cancel: CancellationToken) {
        self.discovery.scan(progress_sink, cancel).await
    }

    pub async fn resolve_gateway(&self) -> Option<Device> {
        self.discovery
            .resolve_gateway(3, self.config.scan_inter_packet_gap.max(std::time::Duration::from_millis(50)))
            .await
    }

    pub async fn resolve_hostnames(&self) {
        self.discovery.resolve_hostnames().await
    }

    pub fn devices(&self) -> Vec<Device> {
        self.discovery.devices()
    }

    pub fn binding(&self) -> &InterfaceBinding {
        &self.binding
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.log.subscribe()
    }

    pub fn log_history(&self) -> Vec<LogEvent> {
        self.log.history()
    }

    /// Constructs the blocking engine for this `ArpEngine`'s interface and
    /// shared state. Fails if `gateway` is not flagged as the gateway.
    pub fn blocking_engine(&self, gateway: Device) -> Result<BlockingEngine, CoreError> {
        let sink: Arc<dyn FrameSink> = self.channel.clone();
        BlockingEngine::new(
            sink,
            self.registry.clone(),
            self.binding.own_mac,
            gateway,
            self.log.clone(),
            self.config.clone(),
        )
    }

    /// Releases the capture handle. Idempotent; any in-flight capture read
    /// unblocks within one read-timeout tick.
    pub async fn close(&self) {
        self.channel.close();
        let handle = self.capture_task.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
