use crate::config::Config;
use crate::net::provider::{
    CaptureProvider, DeviceInfo, FrameSink, ProviderError, ProviderEvent, ProviderSession,
    SendError,
};
use dpi::frame::{Frame, LINKTYPE_ETHERNET};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use thiserror::Error;

type ActiveCapture = pcap::Capture<pcap::Active>;

/// Capture provider on top of libpcap.
pub struct PcapProvider {
    read_timeout_ms: i32,
    promiscuous: bool,
    snaplen: i32,
}

impl PcapProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            read_timeout_ms: config.read_timeout_ms,
            promiscuous: config.promiscuous,
            snaplen: config.snaplen,
        }
    }
}

impl CaptureProvider for PcapProvider {
    type Session = PcapSession;

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, ProviderError> {
        let devices = pcap::Device::list()
            .map_err(|err| ProviderError::DeviceList(err.to_string()))?
            .into_iter()
            .map(|device| DeviceInfo {
                name: device.name,
                description: device.desc,
            })
            .collect();

        Ok(devices)
    }

    fn open(&self, device: &DeviceInfo, filter: &str) -> Result<PcapSession, ProviderError> {
        let open_error = |err: pcap::Error| ProviderError::Open(err.to_string());

        let mut capture = pcap::Capture::from_device(device.name.as_str())
            .map_err(open_error)?
            .timeout(self.read_timeout_ms)
            .immediate_mode(true)
            .promisc(self.promiscuous)
            .snaplen(self.snaplen)
            .open()
            .map_err(open_error)?;

        if !filter.is_empty() {
            capture
                .filter(filter, true)
                .map_err(|err| ProviderError::Filter(format!("\"{filter}\": {err}")))?;
        }

        let link_type = capture.get_datalink();
        log::debug!(
            "Opened {} with link type {}.",
            device.display_name(),
            link_type.0
        );

        Ok(PcapSession {
            capture: Some(Arc::new(Mutex::new(capture))),
            link_type,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }
}

pub struct PcapSession {
    capture: Option<Arc<Mutex<ActiveCapture>>>,
    link_type: pcap::Linktype,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

fn lock(capture: &Mutex<ActiveCapture>) -> MutexGuard<'_, ActiveCapture> {
    capture.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ProviderSession for PcapSession {
    fn start(&mut self, sink: FrameSink) -> Result<(), ProviderError> {
        let capture = match &self.capture {
            Some(capture) => Arc::clone(capture),
            None => return Err(ProviderError::Closed),
        };
        if self.worker.is_some() {
            return Err(ProviderError::AlreadyStarted);
        }

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let link_type = self.link_type;

        let worker = std::thread::Builder::new()
            .name("pcap-capture".to_string())
            .spawn(move || capture_loop(&capture, link_type, &running, sink))
            .map_err(|err| ProviderError::Capture(err.to_string()))?;
        self.worker = Some(worker);

        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Capture thread panicked.");
            }
            log::debug!("Capture thread stopped.");
        }
    }

    fn close(&mut self) {
        self.stop();
        if self.capture.take().is_some() {
            log::debug!("Capture device closed.");
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        let capture = match &self.capture {
            Some(capture) => capture,
            None => return Err(SendError::Unsupported("capture device is closed".to_string())),
        };
        if self.link_type != LINKTYPE_ETHERNET {
            return Err(SendError::Unsupported(format!(
                "link type {} cannot carry Ethernet frames",
                self.link_type.0
            )));
        }

        lock(capture)
            .sendpacket(bytes)
            .map_err(|err| SendError::ProviderFailure(err.to_string()))
    }
}

impl Drop for PcapSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn capture_loop(
    capture: &Mutex<ActiveCapture>, link_type: pcap::Linktype, running: &AtomicBool,
    mut sink: FrameSink,
) {
    while running.load(Ordering::Acquire) {
        // The frame is copied out, so the sink runs without the capture lock
        let next = match lock(capture).next_packet() {
            Ok(packet) => Ok(Frame::from_packet(&packet, link_type)),
            Err(err) => Err(err),
        };

        match capture_step(next) {
            CaptureStep::Deliver(event) => sink(event),
            CaptureStep::Idle => continue,
            CaptureStep::Finish(event) => {
                sink(event);
                break;
            },
        }
    }
}

#[derive(Debug)]
enum CaptureStep {
    Deliver(ProviderEvent),
    Idle,
    Finish(ProviderEvent),
}

/// Every way the capture ends is reported to the sink, so the session can stop.
fn capture_step(next: Result<Frame, pcap::Error>) -> CaptureStep {
    match next {
        Ok(frame) => CaptureStep::Deliver(ProviderEvent::Frame(frame)),
        Err(pcap::Error::TimeoutExpired) => CaptureStep::Idle,
        Err(pcap::Error::NoMorePackets) => {
            log::error!("Capture source ran out of packets.");
            CaptureStep::Finish(ProviderEvent::Failed(ProviderError::Capture(
                "no more packets".to_string(),
            )))
        },
        Err(err) => {
            log::error!("Capture failed: {}", err);
            CaptureStep::Finish(ProviderEvent::Failed(ProviderError::Capture(err.to_string())))
        },
    }
}

/// Finds a device by its 1-based position in the list, or by name or description.
pub fn resolve_device(
    devices: &[DeviceInfo], selector: &str,
) -> Result<DeviceInfo, InterfaceError> {
    if devices.is_empty() {
        return Err(InterfaceError::NoDevices);
    }

    let selector = selector.trim();
    if let Ok(index) = selector.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|position| devices.get(position))
            .cloned()
            .ok_or(InterfaceError::IndexOutOfRange {
                index,
                count: devices.len(),
            });
    }

    let needed_interface = |device: &&DeviceInfo| {
        device.name == selector || device.description.as_deref() == Some(selector)
    };

    devices
        .iter()
        .find(needed_interface)
        .cloned()
        .ok_or_else(|| InterfaceError::UnknownInterface(selector.to_string()))
}

#[derive(Debug, Error)]
pub enum InterfaceError {
    #[error("Capture provider error.")]
    Provider(#[from] ProviderError),

    #[error("No devices were found on this machine.")]
    NoDevices,

    #[error("Device index is out of range.")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("There are no interfaces with this name.")]
    UnknownInterface(String),
}

impl InterfaceError {
    pub fn additional_info(&self) -> Option<String> {
        match self {
            Self::Provider(err) => err.additional_info(),
            Self::NoDevices => None,
            Self::IndexOutOfRange { index, count } => {
                Some(format!("Index {index}, expected 1..={count}. Use --list."))
            },
            Self::UnknownInterface(name) => Some(format!("\"{name}\". Use --list.")),
        }
    }
}
