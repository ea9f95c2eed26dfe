use num_enum::FromPrimitive;
use serde::Serialize;
use std::fmt::Formatter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, Serialize)]
#[repr(u16)]
pub enum Operation {
    Request = 1,
    Reply = 2,
    RarpRequest = 3,
    RarpReply = 4,

    #[num_enum(catch_all)]
    Unknown(u16),
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request => write!(f, "Request"),
            Self::Reply => write!(f, "Reply"),
            Self::RarpRequest => write!(f, "RARP Request"),
            Self::RarpReply => write!(f, "RARP Reply"),
            Self::Unknown(value) => write!(f, "Unknown ({})", value),
        }
    }
}
