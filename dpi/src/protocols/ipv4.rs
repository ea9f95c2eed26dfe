use crate::error::{self, DecodeError};
use crate::protocols::ip::address;
use crate::protocols::ip::protocol::IpNextLevelProtocol;
use crate::protocols::{NextLayer, ProtocolId, UnknownKind};
use nom::number::{be_u8, be_u16};
use nom::{IResult, Parser};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::ops::Range;

// IPv4 Protocol
// RFC 791: https://datatracker.ietf.org/doc/html/rfc791
pub const MIN_HEADER_LENGTH: usize = 20;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IPv4 {
    pub version: u8,
    pub internet_header_length: u8,
    pub differentiated_services_code_point: u8,
    pub explicit_congestion_notification: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags: u8,
    pub fragment_offset: u16,
    pub time_to_live: u8,
    pub protocol_inner: IpNextLevelProtocol,
    pub checksum: u16,
    pub address_source: Ipv4Addr,
    pub address_destination: Ipv4Addr,

    pub span: Range<usize>,
}

impl IPv4 {
    pub fn next_layer(&self) -> NextLayer {
        // Only the first fragment carries the transport header
        if self.fragment_offset > 0 {
            return NextLayer::Unknown(UnknownKind::Fragment {
                offset: self.fragment_offset,
            });
        }

        match self.protocol_inner {
            IpNextLevelProtocol::TCP => NextLayer::Protocol(ProtocolId::TCP),
            IpNextLevelProtocol::UDP => NextLayer::Protocol(ProtocolId::UDP),
            other => NextLayer::Unknown(UnknownKind::IpProtocol(other.value())),
        }
    }
}

fn fixed_header(input: &[u8]) -> IResult<&[u8], IPv4> {
    // Version (4 bits), IHL (4 bits). IHL is stored in 32-bit words.
    let (rest, version_ihl) = be_u8().parse(input)?;
    // DSCP (6 bits), ECN (2 bits)
    let (rest, dscp_ecn) = be_u8().parse(rest)?;
    let (rest, total_length) = be_u16().parse(rest)?;
    let (rest, identification) = be_u16().parse(rest)?;
    // Flags (3 bits), Fragment offset (13 bits)
    let (rest, flags_fragment) = be_u16().parse(rest)?;
    let (rest, time_to_live) = be_u8().parse(rest)?;
    let (rest, protocol_inner) = be_u8().parse(rest)?;
    let (rest, checksum) = be_u16().parse(rest)?;
    let (rest, address_source) = address::v4_parse(rest)?;
    let (rest, address_destination) = address::v4_parse(rest)?;

    let header = IPv4 {
        version: version_ihl >> 4,
        internet_header_length: (version_ihl & 0x0F) * 4,
        differentiated_services_code_point: dscp_ecn >> 2,
        explicit_congestion_notification: dscp_ecn & 0b11,
        total_length,
        identification,
        flags: (flags_fragment >> 13) as u8,
        fragment_offset: flags_fragment & 0x1FFF,
        time_to_live,
        protocol_inner: IpNextLevelProtocol::from(protocol_inner),
        checksum,
        address_source,
        address_destination,
        span: 0..0,
    };

    Ok((rest, header))
}

pub fn decode(bytes: &[u8], offset: usize) -> Result<(IPv4, Range<usize>), DecodeError> {
    let input = error::ensure(ProtocolId::IPv4, bytes, offset, MIN_HEADER_LENGTH)?;
    let available = input.len();

    let (_, mut header) = fixed_header(input).map_err(error::nom_truncated(
        ProtocolId::IPv4,
        MIN_HEADER_LENGTH,
        available,
    ))?;

    let header_length = usize::from(header.internet_header_length);
    if header_length < MIN_HEADER_LENGTH {
        return Err(DecodeError::InvalidLength {
            protocol: ProtocolId::IPv4,
            field: "internet_header_length",
            value: header_length,
        });
    }
    // Options are skipped, but must be captured
    error::ensure(ProtocolId::IPv4, bytes, offset, header_length)?;

    // Cutting ethernet padding
    let total_length = usize::from(header.total_length);
    let payload_end = if total_length >= header_length && total_length <= available {
        offset + total_length
    } else {
        bytes.len()
    };

    let header_end = offset + header_length;
    header.span = offset..header_end;

    Ok((header, header_end..payload_end))
}
