use crate::protocols::{ProtocolId, UnknownKind};
use serde::Serialize;
use thiserror::Error;

pub type NomError<'a> = nom::Err<nom::error::Error<&'a [u8]>>;

/// Why the layer chain of a frame stopped before a terminal layer.
///
/// Errors are local to one frame: the layers decoded before the error are kept.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
pub enum DecodeError {
    #[error("{protocol} header truncated: {needed} bytes needed, {available} available.")]
    Truncated {
        protocol: ProtocolId,
        needed: usize,
        available: usize,
    },

    #[error("{protocol} field `{field}` declares an invalid length: {value}.")]
    InvalidLength {
        protocol: ProtocolId,
        field: &'static str,
        value: usize,
    },

    #[error("No decoder for {0}.")]
    UnknownType(UnknownKind),
}

/// Returns the bytes starting at `offset` if at least `needed` of them are available.
pub fn ensure(
    protocol: ProtocolId, bytes: &[u8], offset: usize, needed: usize,
) -> Result<&[u8], DecodeError> {
    let truncated = DecodeError::Truncated {
        protocol,
        needed,
        available: bytes.len().saturating_sub(offset),
    };

    match bytes.get(offset..) {
        Some(input) if input.len() >= needed => Ok(input),
        _ => Err(truncated),
    }
}

/// Maps a nom failure on fixed-size fields to `Truncated`.
pub fn nom_truncated<'a>(
    protocol: ProtocolId, needed: usize, available: usize,
) -> impl FnOnce(NomError<'a>) -> DecodeError {
    move |_| DecodeError::Truncated {
        protocol,
        needed,
        available,
    }
}

pub fn nom_failure_verify(input: &[u8]) -> NomError<'_> {
    nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
}
