//! Property: the `BlockedSet` pairing invariant survives concurrent access.
//!
//! For any set of devices and any interleaving of concurrent `try_block`/
//! `unblock` calls from multiple threads, every device's `is_blocked` flag
//! agrees with its membership in `BlockedSet` once all threads join, and no
//! device is ever double-counted as blocked.

use arpcage::device::{BlockOutcome, Registry};
use pnet::util::MacAddr;
use proptest::prelude::*;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn mac(n: u8) -> MacAddr {
    MacAddr::new(n, n, n, n, n, n)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn concurrent_block_unblock_preserves_pairing_invariant(device_count in 1u8..16) {
        let registry = Arc::new(Registry::new(Ipv4Addr::new(10, 0, 0, 2)));
        let macs: Vec<MacAddr> = (1..=device_count).map(mac).collect();
        for (i, m) in macs.iter().enumerate() {
            registry.upsert_device(Ipv4Addr::new(10, 0, 0, 10 + i as u8), *m);
        }

        let handles: Vec<_> = macs
            .iter()
            .copied()
            .map(|m| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..20 {
                        let _ = registry.try_block(m, Ipv4Addr::new(10, 0, 0, 99));
                        let _ = registry.unblock(m);
                        let _ = registry.try_block(m, Ipv4Addr::new(10, 0, 0, 99));
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        for m in &macs {
            let device = registry.get(*m).unwrap();
            prop_assert_eq!(device.is_blocked, registry.is_blocked(*m));
        }

        let drained = registry.drain_blocked();
        let drained_macs: std::collections::HashSet<MacAddr> =
            drained.iter().map(|info| info.mac).collect();
        prop_assert_eq!(drained_macs.len(), drained.len());
        for m in &macs {
            prop_assert!(!registry.is_blocked(*m));
            prop_assert!(!registry.get(*m).unwrap().is_blocked);
        }
    }

    /// spec.md §5/§8: "at-most-once block... the test-and-insert is
    /// atomic". Many threads race `try_block` on the *same* MAC; exactly
    /// one must observe `BlockOutcome::Inserted`, the rest `AlreadyBlocked`.
    #[test]
    fn concurrent_try_block_on_same_mac_inserts_exactly_once(thread_count in 2u8..32) {
        let registry = Arc::new(Registry::new(Ipv4Addr::new(10, 0, 0, 2)));
        let victim = mac(0xEE);
        registry.upsert_device(Ipv4Addr::new(10, 0, 0, 50), victim);

        let inserted_count = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..thread_count)
            .map(|_| {
                let registry = registry.clone();
                let inserted_count = inserted_count.clone();
                thread::spawn(move || {
                    if registry.try_block(victim, Ipv4Addr::new(10, 0, 0, 50)).unwrap()
                        == BlockOutcome::Inserted
                    {
                        inserted_count.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        prop_assert_eq!(inserted_count.load(Ordering::SeqCst), 1);
        prop_assert!(registry.is_blocked(victim));
        prop_assert!(registry.get(victim).unwrap().is_blocked);
    }
}
