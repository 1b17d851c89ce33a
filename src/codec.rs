//! Ethernet+ARP frame codec (C1). Produces and consumes the exact 42-byte
//! wire shape described in `spec.md` §4.1: a 14-byte Ethernet II header
//! followed by a 28-byte IPv4-over-Ethernet ARP body.

use std::net::Ipv4Addr;

use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::{MutablePacket, Packet};
use pnet::util::MacAddr;

const ETHERNET_HEADER_LEN: usize = 14;
const ARP_PACKET_LEN: usize = 28;

/// A decoded ARP packet's logical fields (the five round-tripped by the
/// codec laws in `spec.md` §8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedArp {
    pub operation: u16,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

fn build_frame(eth_dst: MacAddr, eth_src: MacAddr, build_arp: impl FnOnce(&mut MutableArpPacket)) -> Vec<u8> {
    let mut buf = vec![0u8; ETHERNET_HEADER_LEN + ARP_PACKET_LEN];
    let (eth_buf, arp_buf) = buf.split_at_mut(ETHERNET_HEADER_LEN);

    let mut eth = MutableEthernetPacket::new(eth_buf).expect("buffer sized for ethernet header");
    eth.set_destination(eth_dst);
    eth.set_source(eth_src);
    eth.set_ethertype(EtherTypes::Arp);

    let mut arp = MutableArpPacket::new(arp_buf).expect("buffer sized for arp packet");
    arp.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp.set_protocol_type(EtherTypes::Ipv4);
    arp.set_hw_addr_len(6);
    arp.set_proto_addr_len(4);
    build_arp(&mut arp);

    buf
}

/// Constructor 1: an ARP request for `target_ip`, sent from `(own_mac, own_ip)`.
pub fn arp_request(own_mac: MacAddr, own_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Vec<u8> {
    build_frame(MacAddr::broadcast(), own_mac, |arp| {
        arp.set_operation(ArpOperations::Request);
        arp.set_sender_hw_addr(own_mac);
        arp.set_sender_proto_addr(own_ip);
        arp.set_target_hw_addr(MacAddr::zero());
        arp.set_target_proto_addr(target_ip);
    })
}

/// General ARP reply constructor. Constructors 2–4 in `spec.md` §4.1 are all
/// this with different (sender, target) pairs:
///
/// - Poison-victim: `sender = (own_mac, gateway.ip)`, `target = (victim.mac, victim.ip)`, `eth_dst = victim.mac`.
/// - Poison-gateway: `sender = (own_mac, victim.ip)`, `target = (gateway.mac, gateway.ip)`, `eth_dst = gateway.mac`.
/// - Restore: `sender = (B.mac, B.ip)` (the true owner), `target = (A.mac, A.ip)`, `eth_dst = A.mac`, but
///   the Ethernet source is always `own_mac` — only the ARP payload carries the restored identity.
#[allow(clippy::too_many_arguments)]
pub fn arp_reply(
    eth_dst: MacAddr,
    own_mac: MacAddr,
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) -> Vec<u8> {
    build_frame(eth_dst, own_mac, |arp| {
        arp.set_operation(ArpOperations::Reply);
        arp.set_sender_hw_addr(sender_mac);
        arp.set_sender_proto_addr(sender_ip);
        arp.set_target_hw_addr(target_mac);
        arp.set_target_proto_addr(target_ip);
    })
}

/// Decodes a captured frame. Returns `None` for anything that is not an
/// IPv4-over-Ethernet ARP packet — non-ARP traffic is expected and silently
/// dropped per `spec.md` §4.1/§7. Trailing bytes beyond the 42-byte frame
/// (padding added by the driver) are ignored.
pub fn decode(frame: &[u8]) -> Option<DecodedArp> {
    let ethernet = EthernetPacket::new(frame)?;
    if ethernet.get_ethertype() != EtherTypes::Arp {
        return None;
    }

    let arp = ArpPacket::new(ethernet.payload())?;
    if arp.get_hardware_type() != ArpHardwareTypes::Ethernet
        || arp.get_protocol_type() != EtherTypes::Ipv4
        || arp.get_hw_addr_len() != 6
        || arp.get_proto_addr_len() != 4
    {
        return None;
    }

    Some(DecodedArp {
        operation: arp.get_operation().0,
        sender_mac: arp.get_sender_hw_addr(),
        sender_ip: arp.get_sender_proto_addr(),
        target_mac: arp.get_target_hw_addr(),
        target_ip: arp.get_target_proto_addr(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWN: MacAddr = MacAddr(0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC);
    const VICTIM: MacAddr = MacAddr(0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xBB);

    #[test]
    fn request_has_wire_exact_constants() {
        let frame = arp_request(OWN, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(frame.len(), 42);
        let eth = EthernetPacket::new(&frame).unwrap();
        assert_eq!(eth.get_ethertype(), EtherTypes::Arp);
        assert_eq!(eth.get_destination(), MacAddr::broadcast());
        assert_eq!(eth.get_source(), OWN);
        let arp = ArpPacket::new(eth.payload()).unwrap();
        assert_eq!(arp.get_hardware_type(), ArpHardwareTypes::Ethernet);
        assert_eq!(arp.get_protocol_type(), EtherTypes::Ipv4);
        assert_eq!(arp.get_hw_addr_len(), 6);
        assert_eq!(arp.get_proto_addr_len(), 4);
        assert_eq!(arp.get_operation(), ArpOperations::Request);
    }

    #[test]
    fn decode_of_request_round_trips_logical_fields() {
        let own_ip = Ipv4Addr::new(10, 0, 0, 1);
        let target_ip = Ipv4Addr::new(10, 0, 0, 2);
        let frame = arp_request(OWN, own_ip, target_ip);
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.operation, ArpOperations::Request.0);
        assert_eq!(decoded.sender_mac, OWN);
        assert_eq!(decoded.sender_ip, own_ip);
        assert_eq!(decoded.target_mac, MacAddr::zero());
        assert_eq!(decoded.target_ip, target_ip);
    }

    #[test]
    fn decode_of_reply_round_trips_logical_fields() {
        let gateway_ip = Ipv4Addr::new(10, 0, 0, 2);
        let victim_ip = Ipv4Addr::new(10, 0, 0, 5);
        let frame = arp_reply(VICTIM, OWN, OWN, gateway_ip, VICTIM, victim_ip);
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.operation, ArpOperations::Reply.0);
        assert_eq!(decoded.sender_mac, OWN);
        assert_eq!(decoded.sender_ip, gateway_ip);
        assert_eq!(decoded.target_mac, VICTIM);
        assert_eq!(decoded.target_ip, victim_ip);
    }

    #[test]
    fn restoration_reply_keeps_own_mac_as_frame_source() {
        let gateway_mac = MacAddr(0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA);
        let gateway_ip = Ipv4Addr::new(10, 0, 0, 2);
        let victim_ip = Ipv4Addr::new(10, 0, 0, 5);
        // Telling the victim the true MAC of the gateway.
        let frame = arp_reply(VICTIM, OWN, gateway_mac, gateway_ip, VICTIM, victim_ip);
        let eth = EthernetPacket::new(&frame).unwrap();
        assert_eq!(eth.get_source(), OWN);
        assert_eq!(eth.get_destination(), VICTIM);
        let arp = ArpPacket::new(eth.payload()).unwrap();
        assert_eq!(arp.get_sender_hw_addr(), gateway_mac);
        assert_eq!(arp.get_sender_proto_addr(), gateway_ip);
    }

    #[test]
    fn decode_rejects_non_arp_ethertype() {
        let mut buf = vec![0u8; 42];
        let mut eth = MutableEthernetPacket::new(&mut buf).unwrap();
        eth.set_ethertype(EtherTypes::Ipv4);
        assert!(decode(&buf).is_none());
    }

    #[test]
    fn decode_rejects_truncated_frame() {
        assert!(decode(&[0u8; 10]).is_none());
    }

    #[test]
    fn decode_tolerates_trailing_padding() {
        let mut frame = arp_request(OWN, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        frame.extend_from_slice(&[0u8; 18]); // driver-added padding to reach 60 bytes
        assert!(decode(&frame).is_some());
    }
}
