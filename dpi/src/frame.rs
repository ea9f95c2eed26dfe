use crate::error::DecodeError;
use crate::protocols::Layer;
use serde::Serialize;

pub const LINKTYPE_ETHERNET: pcap::Linktype = pcap::Linktype(1);

/// A raw frame as delivered by a capture provider.
#[derive(Clone, Debug)]
pub struct Frame {
    pub header: FrameHeader,
    pub link_type: pcap::Linktype,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(header: FrameHeader, link_type: pcap::Linktype, data: Vec<u8>) -> Self {
        Self {
            header,
            link_type,
            data,
        }
    }

    pub fn from_packet(packet: &pcap::Packet, link_type: pcap::Linktype) -> Self {
        Self {
            header: FrameHeader::from(packet.header),
            link_type,
            data: packet.data.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrameHeader {
    pub tv_sec: i64,
    pub tv_usec: i64,
    pub caplen: u32,
    pub len: u32,
}

impl From<&pcap::PacketHeader> for FrameHeader {
    fn from(header: &pcap::PacketHeader) -> Self {
        Self {
            tv_sec: i64::from(header.ts.tv_sec),
            tv_usec: i64::from(header.ts.tv_usec),
            caplen: header.caplen,
            len: header.len,
        }
    }
}

/// Decoded view of one frame: layers outermost first, and the reason decoding
/// stopped early, if it did.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameMetadata {
    pub header: FrameHeader,
    pub layers: Vec<Layer>,
    pub error: Option<DecodeError>,
}

impl FrameMetadata {
    pub fn from_header(header: &FrameHeader) -> Self {
        Self {
            header: header.clone(),
            layers: vec![],
            error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}
