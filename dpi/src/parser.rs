use crate::error::DecodeError;
use crate::frame::{Frame, FrameMetadata};
use crate::protocols::{Layer, NextLayer, ProtocolId, Unknown};

/// Decodes the frame layer by layer, outermost first.
///
/// Decoding never fails as a whole: the layers decoded before a problem are kept,
/// and the problem is recorded in `FrameMetadata::error`.
pub fn process(frame: &Frame) -> FrameMetadata {
    let mut metadata = FrameMetadata::from_header(&frame.header);
    traversal(frame, &mut metadata);

    metadata
}

fn traversal(frame: &Frame, metadata: &mut FrameMetadata) {
    let bytes = frame.data.as_slice();

    let mut next = ProtocolId::root(frame.link_type);
    let mut range = 0..bytes.len();

    loop {
        match next {
            NextLayer::End => return,

            NextLayer::Unknown(kind) => {
                metadata.layers.push(Layer::Unknown(Unknown { kind, span: range }));
                metadata.error = Some(DecodeError::UnknownType(kind));
                return;
            },

            NextLayer::Protocol(id) => {
                // Outer layers bound the inner ones, so padding never reaches them
                let bounded = bytes.get(..range.end).unwrap_or(bytes);

                match id.decode(bounded, range.start) {
                    Ok((layer, payload)) => {
                        next = layer.next_layer();
                        metadata.layers.push(layer);
                        range = payload;
                    },
                    Err(error) => {
                        metadata.error = Some(error);
                        return;
                    },
                }
            },
        }
    }
}

/// How far decoding of a frame got.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessResult {
    // Fully parsed, up to a terminal layer
    Complete,

    // Some protocols parsed, but a type in the deepness has no decoder
    Incomplete,

    // A header was malformed or truncated
    Failed,
}

impl From<&FrameMetadata> for ProcessResult {
    fn from(metadata: &FrameMetadata) -> Self {
        match metadata.error {
            None => Self::Complete,
            Some(DecodeError::UnknownType(_)) => Self::Incomplete,
            Some(_) => Self::Failed,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::frame::{FrameHeader, LINKTYPE_ETHERNET};
    use crate::protocols::UnknownKind;
    use crate::protocols::ethernet::ether_type::EtherType;

    pub fn frame_from_hex(hex_actual: &str) -> Frame {
        let data = hex::decode(hex_actual.replace(" ", "")).unwrap();
        let header = FrameHeader {
            tv_sec: 0,
            tv_usec: 0,
            caplen: data.len() as u32,
            len: data.len() as u32,
        };

        Frame::new(header, LINKTYPE_ETHERNET, data)
    }

    pub fn process_hex(hex_actual: &str) -> FrameMetadata {
        process(&frame_from_hex(hex_actual))
    }

    const TCP_SYN_ACK: &str = "40 61 86 9A F1 F5 00 1A 8C 15 F9 80 08 00 45 00 00 34 94 15 00 00 34 06 11 0F 48 0E D5 66 C0 A8 03 83 00 50 DA 8E B2 61 2D 93 5D 1A BE A5 80 12 16 58 A0 94 00 00 02 04 05 96 01 01 04 02 01 03 03 06";

    #[test]
    fn test_ethernet_ipv4_tcp_chain() {
        let metadata = process_hex(TCP_SYN_ACK);

        assert_eq!(ProcessResult::from(&metadata), ProcessResult::Complete);
        let protocols: Vec<Option<ProtocolId>> =
            metadata.layers.iter().map(Layer::protocol).collect();
        assert_eq!(
            protocols,
            vec![
                Some(ProtocolId::Ethernet),
                Some(ProtocolId::IPv4),
                Some(ProtocolId::TCP)
            ]
        );

        let spans: Vec<_> = metadata.layers.iter().map(|layer| layer.span().clone()).collect();
        assert_eq!(spans, vec![0..14, 14..34, 34..66]);
    }

    #[test]
    fn test_ethernet_arp_chain() {
        let metadata = process_hex(
            "00 1A 8C 10 AD 30 00 1E 68 51 4F A9 08 06 00 01 08 00 06 04 00 02 00 1E 68 51 4F A9 AC 10 FF 01 00 1A 8C 10 AD 30 AC 10 00 01",
        );

        assert!(metadata.is_complete());
        assert!(matches!(
            metadata.layers.as_slice(),
            [Layer::Ethernet(_), Layer::Arp(_)]
        ));
    }

    #[test]
    fn test_decoding_is_idempotent() {
        let frame = frame_from_hex(TCP_SYN_ACK);

        assert_eq!(process(&frame), process(&frame));
    }

    #[test]
    fn test_short_frame_has_no_layers() {
        let metadata = process_hex("40 61 86 9A F1 F5 00 1A 8C 15");

        assert!(metadata.layers.is_empty());
        assert_eq!(ProcessResult::from(&metadata), ProcessResult::Failed);
        assert_eq!(
            metadata.error,
            Some(DecodeError::Truncated {
                protocol: ProtocolId::Ethernet,
                needed: 14,
                available: 10,
            })
        );
    }

    #[test]
    fn test_truncated_transport_keeps_outer_layers() {
        // IPv4 announces TCP, but the capture stops inside the TCP header
        let metadata = process_hex(
            "40 61 86 9A F1 F5 00 1A 8C 15 F9 80 08 00 45 00 00 34 94 15 00 00 34 06 11 0F 48 0E D5 66 C0 A8 03 83 00 50 DA 8E B2 61",
        );

        assert_eq!(metadata.layers.len(), 2);
        assert_eq!(
            metadata.error,
            Some(DecodeError::Truncated {
                protocol: ProtocolId::TCP,
                needed: 20,
                available: 6,
            })
        );
    }

    #[test]
    fn test_unknown_ether_type() {
        let metadata = process_hex("01 80 C2 00 00 0E 00 1E 68 51 4F A9 88 CC 02 07 04 00");

        assert_eq!(ProcessResult::from(&metadata), ProcessResult::Incomplete);
        assert_eq!(metadata.layers.len(), 2);
        match &metadata.layers[0] {
            Layer::Ethernet(ethernet) => assert_eq!(ethernet.ether_type, EtherType::Lldp),
            _ => panic!(),
        }
        assert_eq!(
            metadata.layers[1],
            Layer::Unknown(Unknown {
                kind: UnknownKind::EtherType(0x88CC),
                span: 14..18,
            })
        );
    }

    #[test]
    fn test_unknown_link_type() {
        let mut frame = frame_from_hex(TCP_SYN_ACK);
        // Raw IP
        frame.link_type = pcap::Linktype(101);

        let metadata = process(&frame);

        assert_eq!(
            metadata.error,
            Some(DecodeError::UnknownType(UnknownKind::LinkType(101)))
        );
        assert_eq!(
            metadata.layers,
            vec![Layer::Unknown(Unknown {
                kind: UnknownKind::LinkType(101),
                span: 0..66,
            })]
        );
    }

    #[test]
    fn test_ipv4_fragment_is_unknown() {
        let metadata = process_hex(
            "40 61 86 9A F1 F5 00 1A 8C 15 F9 80 08 00 45 00 00 1C 00 01 00 B9 40 11 00 00 0A 00 00 01 0A 00 00 02 DE AD BE EF 00 00 00 00",
        );

        assert_eq!(metadata.layers.len(), 3);
        assert_eq!(
            metadata.error,
            Some(DecodeError::UnknownType(UnknownKind::Fragment { offset: 185 }))
        );
    }

    #[test]
    fn test_ipv4_invalid_header_length_keeps_ethernet() {
        let metadata = process_hex(
            "40 61 86 9A F1 F5 00 1A 8C 15 F9 80 08 00 44 00 00 14 00 01 00 00 40 06 00 00 0A 00 00 01 0A 00 00 02",
        );

        assert_eq!(metadata.layers.len(), 1);
        assert!(matches!(
            metadata.error,
            Some(DecodeError::InvalidLength {
                protocol: ProtocolId::IPv4,
                ..
            })
        ));
    }
}
