use clap::ValueEnum;
use dpi::frame::FrameMetadata;
use dpi::protocols::Layer;
use dpi::protocols::arp::Arp;
use dpi::protocols::ethernet::Ethernet;
use dpi::protocols::ipv4::IPv4;
use dpi::protocols::ipv6::IPv6;
use dpi::protocols::tcp::TCP;
use dpi::protocols::udp::UDP;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Formatter};
use std::io::Write;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Field blocks per layer
    #[default]
    Text,

    /// One JSON document per line
    Json,
}

/// Writes every processed frame to the output, in the chosen format.
pub struct Reporter<W: Write> {
    out: W,
    format: OutputFormat,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    pub fn report(&mut self, metadata: &FrameMetadata) -> Result<(), ReportError> {
        match self.format {
            OutputFormat::Text => write!(self.out, "{}", TextView(metadata))?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, metadata)?;
                writeln!(self.out)?;
            },
        }

        self.out.flush()?;
        Ok(())
    }
}

/// Text view of a frame: one block per decoded layer.
pub struct TextView<'a>(pub &'a FrameMetadata);

impl fmt::Display for TextView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for layer in &self.0.layers {
            match layer {
                Layer::Ethernet(ethernet) => write_ethernet(f, ethernet)?,
                Layer::Arp(arp) => write_arp(f, arp)?,
                Layer::IPv4(ipv4) => write_ipv4(f, ipv4)?,
                Layer::IPv6(ipv6) => write_ipv6(f, ipv6)?,
                Layer::TCP(tcp) => write_tcp(f, tcp)?,
                Layer::UDP(udp) => write_udp(f, udp)?,
                Layer::Unknown(unknown) => {
                    writeln!(f, "-- UNKNOWN --")?;
                    writeln!(f, "Type: {}", unknown.kind)?;
                    writeln!(f, "Bytes: {}", unknown.span.len())?;
                },
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

fn write_ethernet(f: &mut Formatter<'_>, ethernet: &Ethernet) -> fmt::Result {
    writeln!(f, "-- ETHERNET --")?;
    writeln!(f, "Source: {}", ethernet.source_mac)?;
    write!(f, "Destination: {}", ethernet.destination_mac)?;
    if ethernet.destination_mac.is_broadcast() {
        write!(f, " (broadcast)")?;
    } else if ethernet.destination_mac.is_multicast() {
        write!(f, " (multicast)")?;
    }
    writeln!(f)?;
    if let Some(vlan_id) = ethernet.vlan_id {
        writeln!(f, "VLAN: {}", vlan_id)?;
    }
    writeln!(f, "Type: {}", ethernet.ether_type)?;
    writeln!(f, "Total Bytes: {}", ethernet.total_length)
}

fn write_arp(f: &mut Formatter<'_>, arp: &Arp) -> fmt::Result {
    writeln!(f, "-- ARP --")?;
    writeln!(f, "Protocol type: {}", arp.protocol_type)?;
    writeln!(f, "Operation: {}", arp.operation)?;
    writeln!(f, "Sender hardware address: {}", arp.sender_mac)?;
    writeln!(f, "Sender protocol address: {}", arp.sender_ip)?;
    writeln!(f, "Target hardware address: {}", arp.target_mac)?;
    writeln!(f, "Target protocol address: {}", arp.target_ip)
}

fn write_ipv4(f: &mut Formatter<'_>, ipv4: &IPv4) -> fmt::Result {
    writeln!(f, "-- IP --")?;
    writeln!(f, "Source: {}", ipv4.address_source)?;
    writeln!(f, "Destination: {}", ipv4.address_destination)?;
    writeln!(f, "TTL: {}", ipv4.time_to_live)?;
    writeln!(f, "Version: IPv{}", ipv4.version)?;
    writeln!(f, "Fragment Offset: {}", ipv4.fragment_offset)?;
    writeln!(f, "ID: {}", ipv4.identification)?;
    writeln!(f, "Checksum: {}", ipv4.checksum)
}

fn write_ipv6(f: &mut Formatter<'_>, ipv6: &IPv6) -> fmt::Result {
    writeln!(f, "-- IP --")?;
    writeln!(f, "Source: {}", ipv6.address_source)?;
    writeln!(f, "Destination: {}", ipv6.address_destination)?;
    writeln!(f, "TTL: {}", ipv6.hop_limit)?;
    writeln!(f, "Version: IPv{}", ipv6.version)
}

fn write_tcp(f: &mut Formatter<'_>, tcp: &TCP) -> fmt::Result {
    writeln!(f, "-- TCP --")?;
    writeln!(f, "Source port: {}", tcp.port_source)?;
    writeln!(f, "Destination port: {}", tcp.port_destination)?;
    writeln!(f, "Sequence number: {}", tcp.sequence_number)?;
    writeln!(f, "Acknowledgment number: {}", tcp.acknowledgement_number)?;
    writeln!(f, "Window size: {}", tcp.window)?;
    writeln!(f, "URG: {}", tcp.flags.urgent)?;
    writeln!(f, "ACK: {}", tcp.flags.acknowledgment)?;
    writeln!(f, "PSH: {}", tcp.flags.push)?;
    writeln!(f, "RST: {}", tcp.flags.reset)?;
    writeln!(f, "SYN: {}", tcp.flags.syn)?;
    writeln!(f, "FIN: {}", tcp.flags.fin)
}

fn write_udp(f: &mut Formatter<'_>, udp: &UDP) -> fmt::Result {
    writeln!(f, "-- UDP --")?;
    writeln!(f, "Source port: {}", udp.port_source)?;
    writeln!(f, "Destination port: {}", udp.port_destination)?;
    writeln!(f, "Length: {}", udp.length)?;
    writeln!(f, "Checksum: {}", udp.checksum)
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write output.")]
    IOError(#[from] std::io::Error),

    #[error("Failed to serialize frame.")]
    JsonError(#[from] serde_json::Error),
}

impl ReportError {
    pub fn additional_info(&self) -> Option<String> {
        match self {
            ReportError::IOError(err) => Some(err.to_string()),
            ReportError::JsonError(err) => Some(err.to_string()),
        }
    }
}
