use num_enum::FromPrimitive;
use serde::Serialize;
use std::fmt::Formatter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, Serialize)]
#[repr(u16)]
pub enum HardwareType {
    Ethernet = 1,
    Ieee802 = 6,

    #[num_enum(catch_all)]
    Unknown(u16),
}

impl std::fmt::Display for HardwareType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ethernet => write!(f, "Ethernet"),
            Self::Ieee802 => write!(f, "IEEE 802"),
            Self::Unknown(value) => write!(f, "Unknown ({})", value),
        }
    }
}
