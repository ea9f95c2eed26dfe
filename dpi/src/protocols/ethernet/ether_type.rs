use num_enum::FromPrimitive;
use serde::Serialize;
use std::fmt::Formatter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, Serialize)]
#[repr(u16)]
pub enum EtherType {
    Ipv4 = 0x0800,
    Arp = 0x0806,
    ArpFrameRelay = 0x0808,
    ArpReverse = 0x8035,
    Vlan = 0x8100,
    Ipv6 = 0x86DD,
    Lldp = 0x88CC,

    #[num_enum(catch_all)]
    Unknown(u16),
}

impl EtherType {
    pub fn value(&self) -> u16 {
        match self {
            Self::Ipv4 => 0x0800,
            Self::Arp => 0x0806,
            Self::ArpFrameRelay => 0x0808,
            Self::ArpReverse => 0x8035,
            Self::Vlan => 0x8100,
            Self::Ipv6 => 0x86DD,
            Self::Lldp => 0x88CC,
            Self::Unknown(value) => *value,
        }
    }
}

impl std::fmt::Display for EtherType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ipv4 => "IPv4",
            Self::Arp => "ARP",
            Self::ArpFrameRelay => "Frame Relay ARP",
            Self::ArpReverse => "RARP",
            Self::Vlan => "802.1Q",
            Self::Ipv6 => "IPv6",
            Self::Lldp => "LLDP",
            Self::Unknown(_) => "Unknown",
        };

        write!(f, "{} (0x{:04X})", name, self.value())
    }
}
