use crate::error::{self, DecodeError};
use crate::protocols::ProtocolId;
use nom::number::{be_u8, be_u16, be_u32};
use nom::{IResult, Parser};
use num_enum::TryFromPrimitive;
use serde::Serialize;
use std::ops::Range;

// TCP Protocol
// RFC 9293: https://datatracker.ietf.org/doc/html/rfc9293
pub const MIN_HEADER_LENGTH: usize = 20;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TCP {
    pub port_source: u16,
    pub port_destination: u16,
    pub sequence_number: u32,
    pub acknowledgement_number: u32,
    pub data_offset: u8,
    pub reserved: u8,
    pub flags: Flags,
    pub window: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
    pub options: Vec<OptionData>,

    pub span: Range<usize>,
    pub payload: Range<usize>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Flags {
    pub congestion_window_reduced: bool,
    pub ecn_echo: bool,
    pub urgent: bool,
    pub acknowledgment: bool,
    pub push: bool,
    pub reset: bool,
    pub syn: bool,
    pub fin: bool,
}

impl From<u8> for Flags {
    fn from(value: u8) -> Self {
        let bit = |position: u8| value & (1 << position) != 0;

        Self {
            congestion_window_reduced: bit(7),
            ecn_echo: bit(6),
            urgent: bit(5),
            acknowledgment: bit(4),
            push: bit(3),
            reset: bit(2),
            syn: bit(1),
            fin: bit(0),
        }
    }
}

fn fixed_header(input: &[u8]) -> IResult<&[u8], TCP> {
    let (rest, port_source) = be_u16().parse(input)?;
    let (rest, port_destination) = be_u16().parse(rest)?;

    let (rest, sequence_number) = be_u32().parse(rest)?;
    let (rest, acknowledgement_number) = be_u32().parse(rest)?;

    // Data Offset, Reserved. Both - 4 bits.
    // Data Offset is stored in 32-bit words.
    let (rest, offset_reserved) = be_u8().parse(rest)?;
    // Flags: 8 flags by 1 bit.
    let (rest, flags) = be_u8().parse(rest)?;

    let (rest, window) = be_u16().parse(rest)?;
    let (rest, checksum) = be_u16().parse(rest)?;
    let (rest, urgent_pointer) = be_u16().parse(rest)?;

    let header = TCP {
        port_source,
        port_destination,
        sequence_number,
        acknowledgement_number,
        data_offset: (offset_reserved >> 4) * 4,
        reserved: offset_reserved & 0x0F,
        flags: Flags::from(flags),
        window,
        checksum,
        urgent_pointer,
        options: vec![],
        span: 0..0,
        payload: 0..0,
    };

    Ok((rest, header))
}

pub fn decode(bytes: &[u8], offset: usize) -> Result<(TCP, Range<usize>), DecodeError> {
    let input = error::ensure(ProtocolId::TCP, bytes, offset, MIN_HEADER_LENGTH)?;
    let available = input.len();

    let (_, mut header) = fixed_header(input).map_err(error::nom_truncated(
        ProtocolId::TCP,
        MIN_HEADER_LENGTH,
        available,
    ))?;

    let header_length = usize::from(header.data_offset);
    if header_length < MIN_HEADER_LENGTH {
        return Err(DecodeError::InvalidLength {
            protocol: ProtocolId::TCP,
            field: "data_offset",
            value: header_length,
        });
    }
    let input = error::ensure(ProtocolId::TCP, bytes, offset, header_length)?;

    // Options - up to 320 bits.
    if let Some(option_bytes) = input.get(MIN_HEADER_LENGTH..header_length) {
        header.options = parse_options(option_bytes);
    }

    let header_end = offset + header_length;
    header.span = offset..header_end;
    header.payload = header_end..bytes.len();

    let payload = header.payload.clone();
    Ok((header, payload))
}

/// Decodes the option list. A malformed option ends decoding, keeping the
/// options read before it.
pub fn parse_options(bytes: &[u8]) -> Vec<OptionData> {
    let mut options: Vec<OptionData> = Vec::new();
    let mut buffer = bytes;

    while !buffer.is_empty() {
        match parse_option(buffer) {
            Ok((_, OptionData::EndOfOptionList)) => {
                options.push(OptionData::EndOfOptionList);
                break;
            },
            Ok((rest, option)) => {
                options.push(option);
                buffer = rest;
            },
            Err(_) => break,
        }
    }

    options
}

fn parse_option(bytes: &[u8]) -> IResult<&[u8], OptionData> {
    let (rest, kind) = be_u8().parse(bytes)?;

    match OptionId::try_from(kind) {
        Ok(OptionId::EndOfOptionList) => Ok((rest, OptionData::EndOfOptionList)),
        Ok(OptionId::NoOperation) => Ok((rest, OptionData::NoOperation)),
        Ok(id) => {
            let (rest, value) = option_value(rest)?;
            let option = id.parse(value)?;
            Ok((rest, option))
        },
        Err(_) => {
            let (rest, value) = option_value(rest)?;
            let option = OptionData::Unknown {
                kind,
                length: value.len() as u8 + 2,
            };
            Ok((rest, option))
        },
    }
}

/// Splits the option value off, using the length byte that counts kind and length too.
fn option_value(bytes: &[u8]) -> IResult<&[u8], &[u8]> {
    let (rest, length) = be_u8().parse(bytes)?;
    let value_length = usize::from(length)
        .checked_sub(2)
        .ok_or(error::nom_failure_verify(bytes))?;

    match (rest.get(..value_length), rest.get(value_length..)) {
        (Some(value), Some(rest)) => Ok((rest, value)),
        _ => Err(error::nom_failure_verify(bytes)),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum OptionId {
    EndOfOptionList = 0,
    NoOperation = 1,
    MaximumSegmentSize = 2,
    WindowScaling = 3,
    SAckPermitted = 4,
    SAck = 5,

    Timestamps = 8,
}

impl OptionId {
    /// Parses the option value, without kind and length bytes.
    pub fn parse<'a>(&self, value: &'a [u8]) -> Result<OptionData, error::NomError<'a>> {
        let malformed = || error::nom_failure_verify(value);

        match self {
            Self::EndOfOptionList => Ok(OptionData::EndOfOptionList),

            Self::NoOperation => Ok(OptionData::NoOperation),

            Self::MaximumSegmentSize => {
                if value.len() != 2 {
                    return Err(malformed());
                }
                let (_, maximum_segment_size) = be_u16().parse(value)?;
                Ok(OptionData::MaximumSegmentSize(maximum_segment_size))
            },

            Self::WindowScaling => {
                if value.len() != 1 {
                    return Err(malformed());
                }
                let (_, shift) = be_u8().parse(value)?;
                Ok(OptionData::WindowScaling(shift))
            },

            Self::SAckPermitted => {
                if !value.is_empty() {
                    return Err(malformed());
                }
                Ok(OptionData::SAckPermitted)
            },

            Self::SAck => {
                if value.is_empty() || value.len() % 8 != 0 {
                    return Err(malformed());
                }
                let mut blocks = Vec::with_capacity(value.len() / 8);
                let mut buffer = value;
                while !buffer.is_empty() {
                    let (rest, left_edge) = be_u32().parse(buffer)?;
                    let (rest, right_edge) = be_u32().parse(rest)?;
                    blocks.push((left_edge, right_edge));
                    buffer = rest;
                }

                Ok(OptionData::SAck(blocks))
            },

            Self::Timestamps => {
                if value.len() != 8 {
                    return Err(malformed());
                }
                let (rest, initial_time) = be_u32().parse(value)?;
                let (_, reply_time) = be_u32().parse(rest)?;

                Ok(OptionData::Timestamps(initial_time, reply_time))
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum OptionData {
    EndOfOptionList,
    NoOperation,
    MaximumSegmentSize(u16),
    WindowScaling(u8),
    SAckPermitted,
    SAck(Vec<(u32, u32)>),
    Timestamps(u32, u32),
    Unknown { kind: u8, length: u8 },
}
