use std::net::Ipv4Addr;

use pnet::util::MacAddr;

/// Everything C3/C4 need about the chosen interface, immutable for the
/// lifetime of a run. Construction (interface selection, privilege checks)
/// is the UI's job; this just holds the resolved values.
#[derive(Debug, Clone)]
pub struct InterfaceBinding {
    pub interface_name: String,
    pub own_ip: Ipv4Addr,
    pub own_mac: MacAddr,
    pub netmask: Ipv4Addr,
    pub gateway_ip: Ipv4Addr,
}

impl InterfaceBinding {
    pub fn new(
        interface_name: impl Into<String>,
        own_ip: Ipv4Addr,
        own_mac: MacAddr,
        netmask: Ipv4Addr,
        gateway_ip: Ipv4Addr,
    ) -> Self {
        Self {
            interface_name: interface_name.into(),
            own_ip,
            own_mac,
            netmask,
            gateway_ip,
        }
    }

    pub fn network_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.own_ip) & u32::from(self.netmask))
    }

    pub fn broadcast_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.own_ip) | !u32::from(self.netmask))
    }

    pub fn prefix_len(&self) -> u32 {
        u32::from(self.netmask).count_ones()
    }

    /// Every address strictly between the network and broadcast address, in
    /// numerical order. Does not exclude `own_ip` — callers that need that
    /// (e.g. a sweep) filter it themselves, since the set of "host
    /// addresses of this subnet" is a property of the subnet alone.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> {
        let network = u32::from(self.network_addr());
        let broadcast = u32::from(self.broadcast_addr());
        ((network.saturating_add(1))..broadcast).map(Ipv4Addr::from)
    }
}
