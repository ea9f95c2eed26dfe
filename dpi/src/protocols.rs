use crate::error::DecodeError;
use crate::frame::LINKTYPE_ETHERNET;
use serde::Serialize;
use std::fmt::Formatter;
use std::ops::Range;
use strum_macros::Display;

/// Guide: How to Add a Protocol
/// 1. Add it to the `ProtocolId` enum and a matching variant to `Layer`.
/// 2. If the protocol is a root protocol, map its linktype in `ProtocolId::root`.
/// 3. Write `decode(bytes, offset)` in your module, returning the header and the payload
///    range, and link it in `ProtocolId::decode`.
/// 4. If the header selects a nested protocol, give it a `next_layer` method and link it
///    in `Layer::next_layer`.
///
/// Keep next-layer selection acyclic: the resolver walks it until a terminal layer.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize)]
pub enum ProtocolId {
    Ethernet,

    #[strum(to_string = "ARP")]
    Arp,

    IPv4,
    IPv6,

    TCP,
    UDP,
}

impl ProtocolId {
    pub fn root(link_type: pcap::Linktype) -> NextLayer {
        if link_type == LINKTYPE_ETHERNET {
            NextLayer::Protocol(Self::Ethernet)
        } else {
            NextLayer::Unknown(UnknownKind::LinkType(link_type.0))
        }
    }

    pub fn decode(
        &self, bytes: &[u8], offset: usize,
    ) -> Result<(Layer, Range<usize>), DecodeError> {
        match self {
            Self::Ethernet => ethernet::decode(bytes, offset)
                .map(|(header, payload)| (Layer::Ethernet(header), payload)),
            Self::Arp => {
                arp::decode(bytes, offset).map(|(header, payload)| (Layer::Arp(header), payload))
            },
            Self::IPv4 => {
                ipv4::decode(bytes, offset).map(|(header, payload)| (Layer::IPv4(header), payload))
            },
            Self::IPv6 => {
                ipv6::decode(bytes, offset).map(|(header, payload)| (Layer::IPv6(header), payload))
            },
            Self::TCP => {
                tcp::decode(bytes, offset).map(|(header, payload)| (Layer::TCP(header), payload))
            },
            Self::UDP => {
                udp::decode(bytes, offset).map(|(header, payload)| (Layer::UDP(header), payload))
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextLayer {
    Protocol(ProtocolId),
    Unknown(UnknownKind),
    End,
}

/// A type tag the decoders have no decoder for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UnknownKind {
    LinkType(i32),
    EtherType(u16),
    IpProtocol(u8),
    Fragment { offset: u16 },
}

impl std::fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LinkType(value) => write!(f, "link type {}", value),
            Self::EtherType(value) => write!(f, "ethertype 0x{:04X}", value),
            Self::IpProtocol(value) => write!(f, "IP protocol {}", value),
            Self::Fragment { offset } => write!(f, "IPv4 fragment at offset {}", offset),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Unknown {
    pub kind: UnknownKind,
    pub span: Range<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Layer {
    Ethernet(ethernet::Ethernet),

    Arp(arp::Arp),

    IPv4(ipv4::IPv4),
    IPv6(ipv6::IPv6),

    TCP(tcp::TCP),
    UDP(udp::UDP),

    Unknown(Unknown),
}

impl Layer {
    pub fn next_layer(&self) -> NextLayer {
        match self {
            Self::Ethernet(header) => header.next_layer(),
            Self::IPv4(header) => header.next_layer(),
            Self::IPv6(header) => header.next_layer(),
            Self::Arp(_) | Self::TCP(_) | Self::UDP(_) | Self::Unknown(_) => NextLayer::End,
        }
    }

    /// Byte range of the frame this layer was decoded from.
    pub fn span(&self) -> &Range<usize> {
        match self {
            Self::Ethernet(header) => &header.span,
            Self::Arp(header) => &header.span,
            Self::IPv4(header) => &header.span,
            Self::IPv6(header) => &header.span,
            Self::TCP(header) => &header.span,
            Self::UDP(header) => &header.span,
            Self::Unknown(unknown) => &unknown.span,
        }
    }

    /// `None` for a type without a decoder.
    pub fn protocol(&self) -> Option<ProtocolId> {
        match self {
            Self::Ethernet(_) => Some(ProtocolId::Ethernet),
            Self::Arp(_) => Some(ProtocolId::Arp),
            Self::IPv4(_) => Some(ProtocolId::IPv4),
            Self::IPv6(_) => Some(ProtocolId::IPv6),
            Self::TCP(_) => Some(ProtocolId::TCP),
            Self::UDP(_) => Some(ProtocolId::UDP),
            Self::Unknown(_) => None,
        }
    }
}

pub mod arp;
pub mod ethernet;
pub mod ip {
    pub mod address;
    pub mod protocol;
}
pub mod ipv4;
pub mod ipv6;
pub mod tcp;
pub mod udp;
