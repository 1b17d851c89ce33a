//! Core ARP engine: frame codec, capture/inject channel, subnet discovery,
//! and the bidirectional spoof-and-restore blocking engine. See
//! `SPEC_FULL.md` for the full module map; `spec.md` for the original,
//! distilled specification this crate implements.

pub mod binding;
pub mod blocking;
pub mod channel;
pub mod codec;
pub mod config;
pub mod device;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod events;

pub use binding::InterfaceBinding;
pub use blocking::BlockingEngine;
pub use config::Config;
pub use device::Device;
pub use engine::ArpEngine;
pub use error::CoreError;
pub use events::LogEvent;
