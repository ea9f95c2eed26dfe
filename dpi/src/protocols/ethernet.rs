use crate::error::{self, DecodeError};
use crate::protocols::ethernet::ether_type::EtherType;
use crate::protocols::ethernet::mac::MacAddress;
use crate::protocols::{NextLayer, ProtocolId, UnknownKind};
use nom::number::be_u16;
use nom::{IResult, Parser};
use serde::Serialize;
use std::ops::Range;
use thiserror::Error;

// Ethernet II
// IEEE 802.3, 802.1Q for the optional VLAN tag
pub const HEADER_LENGTH: usize = 14;
pub const VLAN_TAG_LENGTH: usize = 4;

const VLAN_ID_MASK: u16 = 0x0FFF;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ethernet {
    pub destination_mac: MacAddress,
    pub source_mac: MacAddress,

    pub vlan_id: Option<u16>,
    pub ether_type: EtherType,

    pub total_length: usize,
    pub span: Range<usize>,
}

impl Ethernet {
    pub fn next_layer(&self) -> NextLayer {
        match self.ether_type {
            EtherType::Arp | EtherType::ArpReverse => NextLayer::Protocol(ProtocolId::Arp),
            EtherType::Ipv4 => NextLayer::Protocol(ProtocolId::IPv4),
            EtherType::Ipv6 => NextLayer::Protocol(ProtocolId::IPv6),
            other => NextLayer::Unknown(UnknownKind::EtherType(other.value())),
        }
    }
}

fn addresses(input: &[u8]) -> IResult<&[u8], (MacAddress, MacAddress, u16)> {
    let (rest, destination_mac) = mac::parse(input)?;
    let (rest, source_mac) = mac::parse(rest)?;
    let (rest, tag) = be_u16().parse(rest)?;

    Ok((rest, (destination_mac, source_mac, tag)))
}

fn vlan_tag(input: &[u8]) -> IResult<&[u8], (u16, u16)> {
    let (rest, tag_control) = be_u16().parse(input)?;
    let (rest, ether_type) = be_u16().parse(rest)?;

    Ok((rest, (tag_control & VLAN_ID_MASK, ether_type)))
}

pub fn decode(bytes: &[u8], offset: usize) -> Result<(Ethernet, Range<usize>), DecodeError> {
    let input = error::ensure(ProtocolId::Ethernet, bytes, offset, HEADER_LENGTH)?;
    let available = input.len();

    let (rest, (destination_mac, source_mac, tag)) = addresses(input).map_err(
        error::nom_truncated(ProtocolId::Ethernet, HEADER_LENGTH, available),
    )?;

    let (header_length, vlan_id, ether_type) = match EtherType::from(tag) {
        EtherType::Vlan => {
            let needed = HEADER_LENGTH + VLAN_TAG_LENGTH;
            let (_, (vlan_id, ether_type)) = vlan_tag(rest)
                .map_err(error::nom_truncated(ProtocolId::Ethernet, needed, available))?;

            (needed, Some(vlan_id), EtherType::from(ether_type))
        },
        ether_type => (HEADER_LENGTH, None, ether_type),
    };

    let header_end = offset + header_length;
    let ethernet = Ethernet {
        destination_mac,
        source_mac,
        vlan_id,
        ether_type,
        total_length: available,
        span: offset..header_end,
    };

    Ok((ethernet, header_end..bytes.len()))
}

#[derive(Debug, Error)]
pub enum EthernetError {
    #[error("MAC address must be exactly 6 bytes.")]
    MacInvalidBytesLength,

    #[error("Failed to decode MAC address from hex.")]
    MacFailedHexDecode,

    #[error("MAC address string must hold exactly 6 bytes.")]
    MacInvalidStringLength,
}

pub mod ether_type;
pub mod mac;
