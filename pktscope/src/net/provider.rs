use dpi::frame::Frame;
use thiserror::Error;

/// A capture device as listed by the provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub description: Option<String>,
}

impl DeviceInfo {
    /// Description if the platform gives one, device name otherwise.
    pub fn display_name(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.name)
    }
}

/// What the provider pushes to the session from its capture thread.
#[derive(Debug)]
pub enum ProviderEvent {
    Frame(Frame),
    Failed(ProviderError),
}

pub type FrameSink = Box<dyn FnMut(ProviderEvent) + Send>;

pub trait CaptureProvider {
    type Session: ProviderSession;

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, ProviderError>;

    /// Opens the device. An empty filter captures everything.
    fn open(&self, device: &DeviceInfo, filter: &str) -> Result<Self::Session, ProviderError>;
}

/// An opened device.
///
/// `stop` and `close` are idempotent. After `stop` returns, the sink is not called
/// anymore.
pub trait ProviderSession: Send {
    fn start(&mut self, sink: FrameSink) -> Result<(), ProviderError>;
    fn stop(&mut self);
    fn close(&mut self);
    fn send(&mut self, bytes: &[u8]) -> Result<(), SendError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Failed to list capture devices.")]
    DeviceList(String),

    #[error("Failed to open capture device.")]
    Open(String),

    #[error("Failed to apply capture filter.")]
    Filter(String),

    #[error("Capture failed.")]
    Capture(String),

    #[error("Capture is already started.")]
    AlreadyStarted,

    #[error("Capture device is closed.")]
    Closed,
}

impl ProviderError {
    pub fn additional_info(&self) -> Option<String> {
        match self {
            Self::DeviceList(err) | Self::Open(err) | Self::Filter(err) | Self::Capture(err) => {
                Some(err.clone())
            },
            Self::AlreadyStarted | Self::Closed => None,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("Sending is not supported: {0}.")]
    Unsupported(String),

    #[error("Provider failed to send: {0}.")]
    ProviderFailure(String),
}
