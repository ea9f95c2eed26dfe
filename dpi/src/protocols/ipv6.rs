use crate::error::{self, DecodeError};
use crate::protocols::ip::address;
use crate::protocols::ip::protocol::IpNextLevelProtocol;
use crate::protocols::{NextLayer, ProtocolId, UnknownKind};
use nom::number::{be_u8, be_u16, be_u32};
use nom::{IResult, Parser};
use serde::Serialize;
use std::net::Ipv6Addr;
use std::ops::Range;

// IPv6 Protocol
// RFC 8200: https://datatracker.ietf.org/doc/html/rfc8200
pub const HEADER_LENGTH: usize = 40;

const TRAFFIC_CLASS_SHIFT: u32 = 20;
const FLOW_LABEL_MASK: u32 = 0x000F_FFFF;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IPv6 {
    pub version: u8,
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_length: u16,
    pub next_header: IpNextLevelProtocol,
    pub hop_limit: u8,
    pub address_source: Ipv6Addr,
    pub address_destination: Ipv6Addr,

    pub span: Range<usize>,
}

impl IPv6 {
    pub fn next_layer(&self) -> NextLayer {
        match self.next_header {
            IpNextLevelProtocol::TCP => NextLayer::Protocol(ProtocolId::TCP),
            IpNextLevelProtocol::UDP => NextLayer::Protocol(ProtocolId::UDP),
            other => NextLayer::Unknown(UnknownKind::IpProtocol(other.value())),
        }
    }
}

fn fixed_header(input: &[u8]) -> IResult<&[u8], IPv6> {
    // Version (4 bits), Traffic Class (8 bits), Flow Label (20 bits)
    let (rest, first_word) = be_u32().parse(input)?;
    let (rest, payload_length) = be_u16().parse(rest)?;
    let (rest, next_header) = be_u8().parse(rest)?;
    let (rest, hop_limit) = be_u8().parse(rest)?;
    let (rest, address_source) = address::v6_parse(rest)?;
    let (rest, address_destination) = address::v6_parse(rest)?;

    let header = IPv6 {
        version: (first_word >> 28) as u8,
        traffic_class: (first_word >> TRAFFIC_CLASS_SHIFT) as u8,
        flow_label: first_word & FLOW_LABEL_MASK,
        payload_length,
        next_header: IpNextLevelProtocol::from(next_header),
        hop_limit,
        address_source,
        address_destination,
        span: 0..0,
    };

    Ok((rest, header))
}

pub fn decode(bytes: &[u8], offset: usize) -> Result<(IPv6, Range<usize>), DecodeError> {
    let input = error::ensure(ProtocolId::IPv6, bytes, offset, HEADER_LENGTH)?;
    let available = input.len();

    let (_, mut header) = fixed_header(input).map_err(error::nom_truncated(
        ProtocolId::IPv6,
        HEADER_LENGTH,
        available,
    ))?;

    let header_end = offset + HEADER_LENGTH;

    // Cutting ethernet padding. Zero means a jumbogram, which has no bound here.
    let payload_length = usize::from(header.payload_length);
    let payload_end = if payload_length > 0 && HEADER_LENGTH + payload_length <= available {
        header_end + payload_length
    } else {
        bytes.len()
    };

    header.span = offset..header_end;

    Ok((header, header_end..payload_end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tests::process_hex;
    use crate::protocols::Layer;
    use crate::protocols::tcp::{self, Flags, TCP};
    use std::str::FromStr;

    #[test]
    fn test_ipv6_tcp_http() {
        let hex_actual = "22 1A 95 D6 7A 23 86 93 23 D3 37 8E 86 DD 60 0D 68 4A 00 7D 06 40 FC 00 00 02 00 00 00 02 00 00 00 00 00 00 00 01 FC 00 00 02 00 00 00 01 00 00 00 00 00 00 00 01 A9 A0 1F 90 02 1B 63 8D BA 31 1E 8E 80 18 00 CF C9 2E 00 00 01 01 08 0A 80 1D A5 22 80 1D A5 22 47 45 54 20 2F 68 65 6C 6C 6F 2E 74 78 74 20 48 54 54 50 2F 31 2E 31 0D 0A 55 73 65 72 2D 41 67 65 6E 74 3A 20 63 75 72 6C 2F 37 2E 33 38 2E 30 0D 0A 48 6F 73 74 3A 20 5B 66 63 30 30 3A 32 3A 30 3A 31 3A 3A 31 5D 3A 38 30 38 30 0D 0A 41 63 63 65 70 74 3A 20 2A 2F 2A 0D 0A 0D 0A";
        let metadata = process_hex(hex_actual);

        assert!(metadata.is_complete());
        assert_eq!(metadata.layers.len(), 3);

        let actual_ipv6 = match metadata.layers[1].clone() {
            Layer::IPv6(value) => value,
            _ => panic!(),
        };

        let expected_ipv6 = IPv6 {
            version: 6,
            traffic_class: 0x00,
            flow_label: 0xd684a,
            payload_length: 125,
            next_header: IpNextLevelProtocol::TCP,
            hop_limit: 64,
            address_source: Ipv6Addr::from_str("fc00:2:0:2::1").unwrap(),
            address_destination: Ipv6Addr::from_str("fc00:2:0:1::1").unwrap(),
            span: 14..54,
        };

        assert_eq!(actual_ipv6, expected_ipv6);

        let actual_tcp = match metadata.layers[2].clone() {
            Layer::TCP(value) => value,
            _ => panic!(),
        };

        let expected_tcp = TCP {
            port_source: 43424,
            port_destination: 8080,
            sequence_number: 0x021b638d,
            acknowledgement_number: 0xba311e8e,
            data_offset: 32,
            reserved: 0,
            flags: Flags {
                congestion_window_reduced: false,
                ecn_echo: false,
                urgent: false,
                acknowledgment: true,
                push: true,
                reset: false,
                syn: false,
                fin: false,
            },
            window: 207,
            checksum: 0xc92e,
            urgent_pointer: 0,
            options: vec![
                tcp::OptionData::NoOperation,
                tcp::OptionData::NoOperation,
                tcp::OptionData::Timestamps(2149426466, 2149426466),
            ],
            span: 54..86,
            payload: 86..179,
        };

        assert_eq!(actual_tcp, expected_tcp);
    }

    #[test]
    fn test_ipv6_tcp() {
        let hex_actual = "22 1A 95 D6 7A 23 86 93 23 D3 37 8E 86 DD 60 0D 68 4A 00 20 06 40 FC 00 00 02 00 00 00 02 00 00 00 00 00 00 00 01 FC 00 00 02 00 00 00 01 00 00 00 00 00 00 00 01 A9 A0 1F 90 02 1B 63 EB BA 31 1F 86 80 10 00 D8 2A 66 00 00 01 01 08 0A 80 1D A5 25 80 1D A5 25";
        let metadata = process_hex(hex_actual);

        assert!(metadata.is_complete());

        let actual_ipv6 = match metadata.layers[1].clone() {
            Layer::IPv6(value) => value,
            _ => panic!(),
        };

        assert_eq!(actual_ipv6.payload_length, 32);
        assert_eq!(actual_ipv6.hop_limit, 64);

        let actual_tcp = match metadata.layers[2].clone() {
            Layer::TCP(value) => value,
            _ => panic!(),
        };

        assert_eq!(actual_tcp.sequence_number, 0x021b63eb);
        assert_eq!(actual_tcp.acknowledgement_number, 0xba311f86);
        assert_eq!(actual_tcp.window, 216);
        assert_eq!(
            actual_tcp.options,
            vec![
                tcp::OptionData::NoOperation,
                tcp::OptionData::NoOperation,
                tcp::OptionData::Timestamps(2149426469, 2149426469),
            ]
        );
        assert!(actual_tcp.payload.is_empty());
    }

    #[test]
    fn test_ipv6_over_ipv4_is_unknown() {
        let hex_actual = "01 00 01 00 00 00 1A 43 20 00 01 00 08 00 45 00 00 81 2A 50 00 00 10 29 46 CB 8B 12 19 21 51 83 43 83 60 04 40 E8 00 45 06 3F 20 01 06 38 09 02 00 01 02 01 02 FF FE E2 75 96 20 02 51 83 43 83 00 00 00 00 00 00 51 83 43 83 00 15 04 02 E5 37 A5 73 62 6B F3 08 50 18 81 60 98 72 00 00 33 33 31 20 47 75 65 73 74 20 6C 6F 67 69 6E 20 6F 6B 2C 20 74 79 70 65 20 79 6F 75 72 20 6E 61 6D 65 20 61 73 20 70 61 73 73 77 6F 72 64 2E 0D 0A";
        let metadata = process_hex(hex_actual);

        assert_eq!(metadata.layers.len(), 3);
        assert_eq!(
            metadata.error,
            Some(DecodeError::UnknownType(UnknownKind::IpProtocol(41)))
        );
        match &metadata.layers[2] {
            Layer::Unknown(unknown) => assert_eq!(unknown.span, 34..143),
            _ => panic!(),
        }
    }

    #[test]
    fn test_ipv6_truncated() {
        let hex_actual = "60 0D 68 4A 00 20 06 40 FC 00 00 02 00 00 00 02".replace(" ", "");
        let bytes = hex::decode(hex_actual).unwrap();

        let result = decode(&bytes, 0);

        assert_eq!(
            result,
            Err(DecodeError::Truncated {
                protocol: ProtocolId::IPv6,
                needed: HEADER_LENGTH,
                available: 16,
            })
        );
    }
}
