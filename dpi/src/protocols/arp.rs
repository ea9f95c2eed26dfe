use crate::error::{self, DecodeError};
use crate::protocols::arp::hardware_type::HardwareType;
use crate::protocols::arp::operation::Operation;
use crate::protocols::ethernet::ether_type::EtherType;
use crate::protocols::ethernet::mac::{self, MacAddress};
use crate::protocols::ip::address;
use crate::protocols::ProtocolId;
use nom::number::{be_u8, be_u16};
use nom::{IResult, Parser};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::ops::Range;

// ARP Protocol
// RFC 826: https://datatracker.ietf.org/doc/html/rfc826
pub const PACKET_LENGTH: usize = 28;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Arp {
    pub hardware_type: HardwareType,
    pub protocol_type: EtherType,

    pub hardware_address_length: u8,
    pub protocol_address_length: u8,

    pub operation: Operation,

    pub sender_mac: MacAddress,
    pub sender_ip: Ipv4Addr,

    pub target_mac: MacAddress,
    pub target_ip: Ipv4Addr,

    pub span: Range<usize>,
}

fn lengths(input: &[u8]) -> IResult<&[u8], (u16, u16, u8, u8)> {
    // HTYPE, PTYPE
    let (rest, hardware_type) = be_u16().parse(input)?;
    let (rest, protocol_type) = be_u16().parse(rest)?;

    // HLEN, PLEN
    let (rest, hardware_address_length) = be_u8().parse(rest)?;
    let (rest, protocol_address_length) = be_u8().parse(rest)?;

    Ok((
        rest,
        (
            hardware_type,
            protocol_type,
            hardware_address_length,
            protocol_address_length,
        ),
    ))
}

fn addresses(input: &[u8]) -> IResult<&[u8], (u16, MacAddress, Ipv4Addr, MacAddress, Ipv4Addr)> {
    // OP
    let (rest, operation) = be_u16().parse(input)?;

    // SHA, SPA
    let (rest, sender_mac) = mac::parse(rest)?;
    let (rest, sender_ip) = address::v4_parse(rest)?;

    // THA, TPA
    let (rest, target_mac) = mac::parse(rest)?;
    let (rest, target_ip) = address::v4_parse(rest)?;

    Ok((rest, (operation, sender_mac, sender_ip, target_mac, target_ip)))
}

pub fn decode(bytes: &[u8], offset: usize) -> Result<(Arp, Range<usize>), DecodeError> {
    let input = error::ensure(ProtocolId::Arp, bytes, offset, PACKET_LENGTH)?;
    let available = input.len();

    let (rest, (hardware_type, protocol_type, hardware_address_length, protocol_address_length)) =
        lengths(input).map_err(error::nom_truncated(ProtocolId::Arp, PACKET_LENGTH, available))?;

    if usize::from(hardware_address_length) != mac::LENGTH_BYTES {
        return Err(DecodeError::InvalidLength {
            protocol: ProtocolId::Arp,
            field: "hardware_address_length",
            value: usize::from(hardware_address_length),
        });
    }
    if usize::from(protocol_address_length) != address::V4_LENGTH_BYTES {
        return Err(DecodeError::InvalidLength {
            protocol: ProtocolId::Arp,
            field: "protocol_address_length",
            value: usize::from(protocol_address_length),
        });
    }

    let (_, (operation, sender_mac, sender_ip, target_mac, target_ip)) = addresses(rest)
        .map_err(error::nom_truncated(ProtocolId::Arp, PACKET_LENGTH, available))?;

    // Ethernet padding & FCS stay outside of the packet
    let end = offset + PACKET_LENGTH;
    let arp = Arp {
        hardware_type: HardwareType::from(hardware_type),
        protocol_type: EtherType::from(protocol_type),
        hardware_address_length,
        protocol_address_length,
        operation: Operation::from(operation),
        sender_mac,
        sender_ip,
        target_mac,
        target_ip,
        span: offset..end,
    };

    Ok((arp, end..end))
}

pub mod hardware_type;
pub mod operation;
