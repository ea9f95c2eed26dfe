use num_enum::FromPrimitive;
use serde::Serialize;
use std::fmt::Formatter;

/// Protocol numbers carried in the IPv4 `protocol` and IPv6 `next header` fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, Serialize)]
#[repr(u8)]
pub enum IpNextLevelProtocol {
    ICMP = 1,
    IGMP = 2,
    TCP = 6,
    UDP = 17,
    IPv6 = 41,
    GRE = 47,
    ESP = 50,
    AH = 51,
    Ipv6Icmp = 58,
    SCTP = 132,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl IpNextLevelProtocol {
    pub fn value(&self) -> u8 {
        match self {
            Self::ICMP => 1,
            Self::IGMP => 2,
            Self::TCP => 6,
            Self::UDP => 17,
            Self::IPv6 => 41,
            Self::GRE => 47,
            Self::ESP => 50,
            Self::AH => 51,
            Self::Ipv6Icmp => 58,
            Self::SCTP => 132,
            Self::Unknown(value) => *value,
        }
    }
}

impl std::fmt::Display for IpNextLevelProtocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ICMP => "ICMP",
            Self::IGMP => "IGMP",
            Self::TCP => "TCP",
            Self::UDP => "UDP",
            Self::IPv6 => "IPv6",
            Self::GRE => "GRE",
            Self::ESP => "ESP",
            Self::AH => "AH",
            Self::Ipv6Icmp => "ICMPv6",
            Self::SCTP => "SCTP",
            Self::Unknown(_) => "Unknown",
        };

        write!(f, "{} ({})", name, self.value())
    }
}
