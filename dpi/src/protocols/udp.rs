use crate::error::{self, DecodeError};
use crate::protocols::ProtocolId;
use nom::number::be_u16;
use nom::{IResult, Parser};
use serde::Serialize;
use std::ops::Range;

// UDP Protocol
// RFC 768: https://datatracker.ietf.org/doc/html/rfc768
pub const HEADER_LENGTH: usize = 8;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UDP {
    pub port_source: u16,
    pub port_destination: u16,
    pub length: u16,
    pub checksum: u16,

    pub span: Range<usize>,
}

fn fixed_header(input: &[u8]) -> IResult<&[u8], UDP> {
    // Source port. 2 bytes
    let (rest, port_source) = be_u16().parse(input)?;
    // Destination port. 2 bytes
    let (rest, port_destination) = be_u16().parse(rest)?;
    // Length. 2 bytes
    let (rest, length) = be_u16().parse(rest)?;
    // Checksum. 2 bytes
    let (rest, checksum) = be_u16().parse(rest)?;

    let header = UDP {
        port_source,
        port_destination,
        length,
        checksum,
        span: 0..0,
    };

    Ok((rest, header))
}

pub fn decode(bytes: &[u8], offset: usize) -> Result<(UDP, Range<usize>), DecodeError> {
    let input = error::ensure(ProtocolId::UDP, bytes, offset, HEADER_LENGTH)?;
    let available = input.len();

    let (_, mut header) = fixed_header(input).map_err(error::nom_truncated(
        ProtocolId::UDP,
        HEADER_LENGTH,
        available,
    ))?;

    let header_end = offset + HEADER_LENGTH;

    // Length covers the header too
    let length = usize::from(header.length);
    let payload_end = if length >= HEADER_LENGTH && length <= available {
        offset + length
    } else {
        bytes.len()
    };

    header.span = offset..header_end;

    Ok((header, header_end..payload_end))
}
