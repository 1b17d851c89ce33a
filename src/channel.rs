//! Capture/Inject Channel (C2): owns one live datalink handle, opened
//! promiscuous with a sub-second read timeout, and exposes `start`/`inject`/
//! `close`. Performs no BPF filtering — C3/C4 decide what matters, so a
//! single capture thread serves both, per `spec.md` §4.2.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pnet_datalink::{Channel, Config, DataLinkReceiver, DataLinkSender, NetworkInterface};
use tokio::task::JoinHandle;

use crate::error::CoreError;

/// Abstraction over "something that can emit a raw Ethernet frame",
/// implemented by `CaptureChannel` and substituted with an in-memory
/// recorder in tests so C3/C4's logic can be exercised without a real
/// capture device.
pub trait FrameSink: Send + Sync {
    fn inject(&self, frame: &[u8]);
}

pub struct CaptureChannel {
    tx: Mutex<Box<dyn DataLinkSender>>,
    rx: Mutex<Option<Box<dyn DataLinkReceiver>>>,
    stopped: Arc<AtomicBool>,
}

impl CaptureChannel {
    pub fn open(interface: &NetworkInterface, read_timeout: Duration) -> Result<Self, CoreError> {
        let config = Config {
            promiscuous: true,
            read_timeout: Some(read_timeout),
            ..Config::default()
        };

        match pnet_datalink::channel(interface, config) {
            Ok(Channel::Ethernet(tx, rx)) => Ok(Self {
                tx: Mutex::new(tx),
                rx: Mutex::new(Some(rx)),
                stopped: Arc::new(AtomicBool::new(false)),
            }),
            Ok(_) => Err(CoreError::UnsupportedChannel),
            Err(e) => Err(CoreError::Io(e)),
        }
    }

    /// Begins asynchronous delivery: each captured frame is handed to
    /// `on_frame` exactly once, on a blocking task (datalink reads are
    /// blocking calls under the hood). Returns `None` if `start` was
    /// already called once on this channel — the handle has a single
    /// receiver to hand out.
    pub fn start(
        &self,
        on_frame: impl Fn(&[u8]) + Send + Sync + 'static,
    ) -> Option<JoinHandle<()>> {
        let mut guard = self.rx.lock().unwrap();
        let mut rx = guard.take()?;
        let stopped = self.stopped.clone();

        Some(tokio::task::spawn_blocking(move || {
            while !stopped.load(Ordering::Relaxed) {
                match rx.next() {
                    Ok(frame) => on_frame(frame),
                    Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                    Err(e) => tracing::warn!(error = %e, "capture read failed"),
                }
            }
        }))
    }

    /// Emits one Ethernet frame. Best-effort: a failure is logged and the
    /// frame discarded, matching `spec.md` §4.2/§7 (the next tick retries).
    pub fn inject(&self, frame: &[u8]) {
        let mut tx = self.tx.lock().unwrap();
        match tx.send_to(frame, None) {
            Some(Ok(())) => {}
            Some(Err(e)) => tracing::warn!(error = %e, len = frame.len(), "frame injection failed"),
            None => tracing::warn!(len = frame.len(), "frame injection failed: no send result"),
        }
    }

    /// Idempotent. Any blocked reader unblocks within one read-timeout tick.
    pub fn close(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

impl FrameSink for CaptureChannel {
    fn inject(&self, frame: &[u8]) {
        CaptureChannel::inject(self, frame)
    }
}
