//! Data model (`spec.md` §3): `Device`, the concurrent `DeviceTable` and
//! `BlockedSet`, and `Registry`, which bundles both behind the single
//! critical section that keeps their pairing invariant intact.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pnet::util::MacAddr;

use crate::error::CoreError;

/// A host observed on the subnet. Identity is the MAC; two `Device` values
/// are equal iff their MACs are equal.
#[derive(Debug, Clone)]
pub struct Device {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub hostname: Option<String>,
    pub is_gateway: bool,
    pub is_blocked: bool,
    pub discovered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.mac == other.mac
    }
}
impl Eq for Device {}

/// A device currently subject to the poison loop. Owns a copy of the
/// MAC/IP pair rather than a reference to the `Device` in `DeviceTable` —
/// mutating `is_blocked` re-looks the device up by MAC (see Design Notes).
#[derive(Debug)]
pub struct BlockedDeviceInfo {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub blocked_at: DateTime<Utc>,
    pub packets_sent: AtomicU64,
}

impl BlockedDeviceInfo {
    fn new(mac: MacAddr, ip: Ipv4Addr) -> Self {
        Self {
            mac,
            ip,
            blocked_at: Utc::now(),
            packets_sent: AtomicU64::new(0),
        }
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent.load(Ordering::Relaxed)
    }
}

/// Outcome of a `try_block` call, distinguishing a fresh block from the
/// idempotent no-op repeat call `spec.md` §4.4 asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Inserted,
    AlreadyBlocked,
}

/// Owns the `DeviceTable` and `BlockedSet` and is the sole place their
/// pairing invariant (`m ∈ BlockedSet ⇔ DeviceTable[m].is_blocked`) is
/// mutated. `devices` is a `DashMap` for low-latency concurrent upserts from
/// the capture path; `block_guard` coarsens block/unblock/drain into one
/// critical section spanning both maps, which is the "single mutex around a
/// plain map" alternative `spec.md` §9 calls acceptable given how rarely
/// blocking state changes relative to discovery traffic.
pub struct Registry {
    pub devices: DashMap<MacAddr, Device>,
    pub blocked: DashMap<MacAddr, BlockedDeviceInfo>,
    pub gateway_ip: Ipv4Addr,
    block_guard: Mutex<()>,
}

impl Registry {
    pub fn new(gateway_ip: Ipv4Addr) -> Self {
        Self {
            devices: DashMap::new(),
            blocked: DashMap::new(),
            gateway_ip,
            block_guard: Mutex::new(()),
        }
    }

    /// Upsert from a decoded ARP op 1 or op 2 frame. Refreshes `last_seen`,
    /// recomputes `is_gateway`, and resolves the rare IP-address-change case
    /// by overwriting `ip` on an existing MAC entry.
    pub fn upsert_device(&self, ip: Ipv4Addr, mac: MacAddr) {
        let now = Utc::now();
        let is_gateway = ip == self.gateway_ip;
        self.devices
            .entry(mac)
            .and_modify(|d| {
                d.ip = ip;
                d.last_seen = now;
                d.is_gateway = is_gateway;
            })
            .or_insert_with(|| Device {
                ip,
                mac,
                hostname: None,
                is_gateway,
                is_blocked: false,
                discovered_at: now,
                last_seen: now,
            });
    }

    pub fn set_hostname(&self, mac: MacAddr, hostname: String) {
        if let Some(mut device) = self.devices.get_mut(&mac) {
            device.hostname = Some(hostname);
        }
    }

    pub fn get(&self, mac: MacAddr) -> Option<Device> {
        self.devices.get(&mac).map(|e| e.value().clone())
    }

    pub fn find_gateway(&self) -> Option<Device> {
        self.devices
            .iter()
            .find(|e| e.is_gateway)
            .map(|e| e.value().clone())
    }

    /// Snapshot for display, ordered by the last octet of `ip` per §3.
    pub fn devices_snapshot(&self) -> Vec<Device> {
        let mut v: Vec<Device> = self.devices.iter().map(|e| e.value().clone()).collect();
        v.sort_by_key(|d| d.ip.octets()[3]);
        v
    }

    /// Atomic test-and-insert: a MAC enters `BlockedSet` at most once even
    /// under racing callers, and `is_blocked` flips in the same critical
    /// section as the insert.
    pub fn try_block(&self, mac: MacAddr, ip: Ipv4Addr) -> Result<BlockOutcome, CoreError> {
        let _guard = self.block_guard.lock().unwrap();

        if !self.devices.contains_key(&mac) {
            return Err(CoreError::UnknownDevice(mac.to_string()));
        }
        if self.blocked.contains_key(&mac) {
            return Ok(BlockOutcome::AlreadyBlocked);
        }

        self.blocked.insert(mac, BlockedDeviceInfo::new(mac, ip));
        if let Some(mut device) = self.devices.get_mut(&mac) {
            device.is_blocked = true;
        }
        Ok(BlockOutcome::Inserted)
    }

    /// Removes `mac` from `BlockedSet` and clears `is_blocked`, atomically.
    /// Returns the removed entry so the caller can run a restoration burst;
    /// `None` if `mac` was not blocked (a no-op per §4.4).
    pub fn unblock(&self, mac: MacAddr) -> Option<BlockedDeviceInfo> {
        let _guard = self.block_guard.lock().unwrap();
        let removed = self.blocked.remove(&mac).map(|(_, v)| v);
        if removed.is_some() {
            if let Some(mut device) = self.devices.get_mut(&mac) {
                device.is_blocked = false;
            }
        }
        removed
    }

    /// Empties `BlockedSet`, clearing `is_blocked` for every entry, and
    /// returns the removed entries so `stop()` can restore each one.
    pub fn drain_blocked(&self) -> Vec<BlockedDeviceInfo> {
        let _guard = self.block_guard.lock().unwrap();
        let macs: Vec<MacAddr> = self.blocked.iter().map(|e| *e.key()).collect();
        let mut out = Vec::with_capacity(macs.len());
        for mac in macs {
            if let Some((_, info)) = self.blocked.remove(&mac) {
                if let Some(mut device) = self.devices.get_mut(&mac) {
                    device.is_blocked = false;
                }
                out.push(info);
            }
        }
        out
    }

    pub fn is_blocked(&self, mac: MacAddr) -> bool {
        self.blocked.contains_key(&mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(n: u8) -> MacAddr {
        MacAddr::new(n, n, n, n, n, n)
    }

    #[test]
    fn upsert_flags_gateway_by_ip() {
        let reg = Registry::new(Ipv4Addr::new(10, 0, 0, 2));
        reg.upsert_device(Ipv4Addr::new(10, 0, 0, 2), mac(0xAA));
        let gw = reg.find_gateway().unwrap();
        assert!(gw.is_gateway);
        assert_eq!(gw.mac, mac(0xAA));
    }

    #[test]
    fn block_is_rejected_for_unknown_device() {
        let reg = Registry::new(Ipv4Addr::new(10, 0, 0, 2));
        let err = reg.try_block(mac(0xBB), Ipv4Addr::new(10, 0, 0, 5)).unwrap_err();
        assert!(matches!(err, CoreError::UnknownDevice(_)));
    }

    #[test]
    fn block_is_idempotent() {
        let reg = Registry::new(Ipv4Addr::new(10, 0, 0, 2));
        reg.upsert_device(Ipv4Addr::new(10, 0, 0, 5), mac(0xBB));
        assert_eq!(
            reg.try_block(mac(0xBB), Ipv4Addr::new(10, 0, 0, 5)).unwrap(),
            BlockOutcome::Inserted
        );
        assert_eq!(
            reg.try_block(mac(0xBB), Ipv4Addr::new(10, 0, 0, 5)).unwrap(),
            BlockOutcome::AlreadyBlocked
        );
        assert!(reg.get(mac(0xBB)).unwrap().is_blocked);
    }

    #[test]
    fn unblock_clears_pairing_invariant() {
        let reg = Registry::new(Ipv4Addr::new(10, 0, 0, 2));
        reg.upsert_device(Ipv4Addr::new(10, 0, 0, 5), mac(0xBB));
        reg.try_block(mac(0xBB), Ipv4Addr::new(10, 0, 0, 5)).unwrap();
        let info = reg.unblock(mac(0xBB)).unwrap();
        assert_eq!(info.mac, mac(0xBB));
        assert!(!reg.get(mac(0xBB)).unwrap().is_blocked);
        assert!(!reg.is_blocked(mac(0xBB)));
    }

    #[test]
    fn unblock_unknown_device_is_noop() {
        let reg = Registry::new(Ipv4Addr::new(10, 0, 0, 2));
        assert!(reg.unblock(mac(0xFF)).is_none());
    }

    #[test]
    fn drain_blocked_empties_set_and_clears_flags() {
        let reg = Registry::new(Ipv4Addr::new(10, 0, 0, 2));
        reg.upsert_device(Ipv4Addr::new(10, 0, 0, 5), mac(0xBB));
        reg.upsert_device(Ipv4Addr::new(10, 0, 0, 6), mac(0xCC));
        reg.try_block(mac(0xBB), Ipv4Addr::new(10, 0, 0, 5)).unwrap();
        reg.try_block(mac(0xCC), Ipv4Addr::new(10, 0, 0, 6)).unwrap();

        let drained = reg.drain_blocked();
        assert_eq!(drained.len(), 2);
        assert!(reg.blocked.is_empty());
        assert!(!reg.get(mac(0xBB)).unwrap().is_blocked);
        assert!(!reg.get(mac(0xCC)).unwrap().is_blocked);
    }

    #[test]
    fn devices_snapshot_orders_by_last_octet() {
        let reg = Registry::new(Ipv4Addr::new(10, 0, 0, 2));
        reg.upsert_device(Ipv4Addr::new(10, 0, 0, 200), mac(0x01));
        reg.upsert_device(Ipv4Addr::new(10, 0, 0, 5), mac(0x02));
        reg.upsert_device(Ipv4Addr::new(10, 0, 0, 50), mac(0x03));
        let snap = reg.devices_snapshot();
        let octets: Vec<u8> = snap.iter().map(|d| d.ip.octets()[3]).collect();
        assert_eq!(octets, vec![5, 50, 200]);
    }
}
