use crate::report::OutputFormat;
use crate::session::CaptureLimits;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "pktscope")]
#[command(version, about = "Live frame capture and layer-by-layer dissection")]
pub struct Cli {
    /// List capture devices and exit
    #[arg(long, conflicts_with = "device")]
    pub list: bool,

    /// Device index from --list (1-based) or interface name
    #[arg(required_unless_present = "list")]
    pub device: Option<String>,

    /// Capture filter expression, e.g. "tcp port 80"
    #[arg(short, long, short_alias = 't', default_value = "")]
    pub filter: String,

    /// Stop after this many frames
    #[arg(short, long)]
    pub num_packets: Option<u64>,

    /// Stop after this many seconds
    #[arg(short, long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Send one probe frame instead of capturing
    #[arg(short, long, conflicts_with_all = ["num_packets", "duration"])]
    pub send: bool,

    /// Output format, overrides the config file
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn limits(&self) -> CaptureLimits {
        CaptureLimits {
            max_packets: self.num_packets,
            max_duration: self.duration,
        }
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("\"{value}\" is not a number of seconds"))?;

    Duration::try_from_secs_f64(seconds).map_err(|err| format!("\"{value}\": {err}"))
}
