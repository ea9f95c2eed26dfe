use crate::net::provider::{FrameSink, ProviderError, ProviderEvent, ProviderSession};
use crossbeam::channel::{self, Receiver, Sender, select};
use dpi::frame::{Frame, FrameMetadata};
use dpi::parser::ProcessResult;
use std::fmt::Formatter;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Bounds of one capture. `None` means unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureLimits {
    pub max_packets: Option<u64>,
    pub max_duration: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Capturing,
    Stopped,
}

/// Why a capture session stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    PacketLimit,
    DurationElapsed,
    Requested,
    ProviderFailure(ProviderError),
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PacketLimit => write!(f, "packet limit reached"),
            Self::DurationElapsed => write!(f, "duration elapsed"),
            Self::Requested => write!(f, "stop requested"),
            Self::ProviderFailure(err) => match err.additional_info() {
                Some(info) => write!(f, "{} {}", err, info),
                None => write!(f, "{}", err),
            },
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    Accept,
    Drop,
    Stop(Termination),
}

/// Count and duration bookkeeping of a session.
///
/// Every transition to `Stopped` is returned exactly once, as `Some(Termination)`
/// or `Admission::Stop`; afterwards the gate drops everything.
#[derive(Debug)]
pub struct SessionGate {
    state: SessionState,
    limits: CaptureLimits,
    packets: u64,
    deadline: Option<Instant>,
}

impl SessionGate {
    pub fn new(limits: CaptureLimits) -> Self {
        Self {
            state: SessionState::Idle,
            limits,
            packets: 0,
            deadline: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Idle -> Capturing. A zero packet limit stops the gate right away.
    pub fn begin(&mut self, now: Instant) -> Result<Option<Termination>, SessionError> {
        match self.state {
            SessionState::Idle => {},
            SessionState::Capturing => return Err(SessionError::AlreadyStarted),
            SessionState::Stopped => return Err(SessionError::AlreadyStopped),
        }

        self.state = SessionState::Capturing;
        self.deadline = self
            .limits
            .max_duration
            .and_then(|duration| now.checked_add(duration));

        if self.limit_reached() {
            return Ok(self.stop(Termination::PacketLimit));
        }

        Ok(None)
    }

    /// Decides the fate of a frame arriving at `now`. Accepted frames are counted.
    pub fn admit(&mut self, now: Instant) -> Admission {
        if self.state != SessionState::Capturing {
            return Admission::Drop;
        }

        if self.deadline.is_some_and(|deadline| now > deadline) {
            return self
                .stop(Termination::DurationElapsed)
                .map_or(Admission::Drop, Admission::Stop);
        }
        if self.limit_reached() {
            return self
                .stop(Termination::PacketLimit)
                .map_or(Admission::Drop, Admission::Stop);
        }

        self.packets = self.packets.saturating_add(1);
        Admission::Accept
    }

    /// Stops once the last allowed frame is dispatched, so a quiet link does not
    /// keep the session open.
    pub fn finish_dispatch(&mut self) -> Option<Termination> {
        if self.state == SessionState::Capturing && self.limit_reached() {
            return self.stop(Termination::PacketLimit);
        }

        None
    }

    pub fn stop(&mut self, reason: Termination) -> Option<Termination> {
        if self.state == SessionState::Stopped {
            return None;
        }

        self.state = SessionState::Stopped;
        Some(reason)
    }

    fn limit_reached(&self) -> bool {
        self.limits
            .max_packets
            .is_some_and(|max_packets| self.packets >= max_packets)
    }
}

type LayersHandler = Box<dyn FnMut(&FrameMetadata) + Send>;

struct Dispatcher {
    gate: SessionGate,
    handler: Option<LayersHandler>,
}

/// State touched by the provider thread, the control thread and stop handles.
struct Shared {
    dispatcher: Mutex<Dispatcher>,
    termination_tx: Sender<Termination>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Dispatcher> {
        self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Called with the dispatcher lock held, so only one termination is ever sent.
    fn signal(&self, termination: Termination) {
        log::info!("Capture stopped: {}.", termination);
        if self.termination_tx.try_send(termination).is_err() {
            log::warn!("Termination was already signalled.");
        }
    }

    fn stop(&self, reason: Termination) -> bool {
        let mut dispatcher = self.lock();
        match dispatcher.gate.stop(reason) {
            Some(termination) => {
                self.signal(termination);
                true
            },
            None => false,
        }
    }

    fn on_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::Frame(frame) => self.dispatch(&frame),
            ProviderEvent::Failed(err) => {
                self.stop(Termination::ProviderFailure(err));
            },
        }
    }

    fn dispatch(&self, frame: &Frame) {
        let mut dispatcher = self.lock();

        match dispatcher.gate.admit(Instant::now()) {
            Admission::Accept => {},
            Admission::Drop => return,
            Admission::Stop(termination) => {
                self.signal(termination);
                return;
            },
        }

        let metadata = dpi::process(frame);
        match (ProcessResult::from(&metadata), &metadata.error) {
            (ProcessResult::Incomplete, Some(err)) => {
                log::trace!("Frame #{}: {}", dispatcher.gate.packets(), err)
            },
            (ProcessResult::Failed, Some(err)) => {
                log::debug!("Frame #{}: {}", dispatcher.gate.packets(), err)
            },
            _ => {},
        }

        if let Some(handler) = dispatcher.handler.as_mut() {
            handler(&metadata);
        }

        if let Some(termination) = dispatcher.gate.finish_dispatch() {
            self.signal(termination);
        }
    }
}

/// Requests a stop from another thread or a signal handler.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    /// Returns false if the session was already stopped.
    pub fn stop(&self) -> bool {
        self.shared.stop(Termination::Requested)
    }
}

/// A capture on one opened device, bounded by `CaptureLimits`.
///
/// The provider is stopped and closed when `wait` returns, or when the session
/// is dropped.
pub struct CaptureSession<S: ProviderSession> {
    provider: S,
    shared: Arc<Shared>,
    termination_rx: Receiver<Termination>,
    termination: Option<Termination>,
    released: bool,
}

impl<S: ProviderSession> CaptureSession<S> {
    pub fn new(provider: S, limits: CaptureLimits) -> Self {
        let (termination_tx, termination_rx) = channel::bounded(1);
        let dispatcher = Dispatcher {
            gate: SessionGate::new(limits),
            handler: None,
        };

        Self {
            provider,
            shared: Arc::new(Shared {
                dispatcher: Mutex::new(dispatcher),
                termination_tx,
            }),
            termination_rx,
            termination: None,
            released: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().gate.state()
    }

    pub fn packets(&self) -> u64 {
        self.shared.lock().gate.packets()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn stop(&self) -> bool {
        self.shared.stop(Termination::Requested)
    }

    /// Starts delivering frames. `on_layers` runs on the provider thread, once per
    /// accepted frame.
    pub fn start<F>(&mut self, on_layers: F) -> Result<(), SessionError>
    where
        F: FnMut(&FrameMetadata) + Send + 'static,
    {
        {
            let mut dispatcher = self.shared.lock();
            let immediate = dispatcher.gate.begin(Instant::now())?;
            dispatcher.handler = Some(Box::new(on_layers));

            if let Some(termination) = immediate {
                self.shared.signal(termination);
                return Ok(());
            }
        }

        let shared = Arc::clone(&self.shared);
        let sink: FrameSink = Box::new(move |event| shared.on_event(event));
        if let Err(err) = self.provider.start(sink) {
            self.shared.stop(Termination::ProviderFailure(err.clone()));
            self.release();
            return Err(SessionError::Provider(err));
        }

        log::info!("Capture started.");
        Ok(())
    }

    /// Blocks until the session stops, then releases the provider.
    pub fn wait(&mut self) -> Result<Termination, SessionError> {
        if let Some(termination) = &self.termination {
            return Ok(termination.clone());
        }

        let deadline = {
            let dispatcher = self.shared.lock();
            if dispatcher.gate.state() == SessionState::Idle {
                return Err(SessionError::NotStarted);
            }
            dispatcher.gate.deadline()
        };
        let timeout = match deadline {
            Some(deadline) => channel::at(deadline),
            None => channel::never(),
        };

        let received = select! {
            recv(self.termination_rx) -> termination => termination,
            recv(timeout) -> _ => {
                // Either this stop wins, or the termination that beat it is queued
                self.shared.stop(Termination::DurationElapsed);
                self.termination_rx.recv()
            },
        };
        self.release();

        let termination = received.map_err(|_| SessionError::Disconnected)?;
        self.termination = Some(termination.clone());

        Ok(termination)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }

        self.provider.stop();
        self.provider.close();
        self.released = true;
        log::debug!("Capture device released.");
    }
}

impl<S: ProviderSession> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.shared.stop(Termination::Requested);
        self.release();
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Capture is already started.")]
    AlreadyStarted,

    #[error("Capture is stopped and cannot be restarted.")]
    AlreadyStopped,

    #[error("Capture is not started.")]
    NotStarted,

    #[error("Termination channel is disconnected.")]
    Disconnected,

    #[error("Capture provider error.")]
    Provider(ProviderError),
}

impl SessionError {
    pub fn additional_info(&self) -> Option<String> {
        match self {
            Self::Provider(err) => err.additional_info(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::provider::mock::{MockFeed, MockSession};
    use dpi::error::DecodeError;
    use dpi::frame::{FrameHeader, LINKTYPE_ETHERNET};
    use dpi::protocols::Layer;

    const ARP_REPLY: &str = "001A8C10AD30001E68514FA908060001080006040002001E68514FA9AC10FF01001A8C10AD30AC100001";

    fn frame(hex_actual: &str) -> Frame {
        Frame::new(
            FrameHeader::default(),
            LINKTYPE_ETHERNET,
            hex::decode(hex_actual).unwrap(),
        )
    }

    fn collector() -> (Arc<Mutex<Vec<FrameMetadata>>>, impl FnMut(&FrameMetadata) + Send + 'static) {
        let processed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&processed);
        let handler = move |metadata: &FrameMetadata| sink.lock().unwrap().push(metadata.clone());

        (processed, handler)
    }

    fn session(limits: CaptureLimits) -> (CaptureSession<MockSession>, MockFeed) {
        let provider = MockSession::default();
        let feed = provider.feed.clone();

        (CaptureSession::new(provider, limits), feed)
    }

    #[test]
    fn test_gate_stops_after_last_allowed_frame() {
        let mut gate = SessionGate::new(CaptureLimits {
            max_packets: Some(2),
            max_duration: None,
        });
        let now = Instant::now();

        assert_eq!(gate.begin(now).unwrap(), None);
        assert_eq!(gate.admit(now), Admission::Accept);
        assert_eq!(gate.finish_dispatch(), None);
        assert_eq!(gate.admit(now), Admission::Accept);
        assert_eq!(gate.finish_dispatch(), Some(Termination::PacketLimit));

        assert_eq!(gate.state(), SessionState::Stopped);
        assert_eq!(gate.admit(now), Admission::Drop);
        assert_eq!(gate.packets(), 2);
    }

    #[test]
    fn test_gate_count_check_on_arrival() {
        let mut gate = SessionGate::new(CaptureLimits {
            max_packets: Some(1),
            max_duration: None,
        });
        let now = Instant::now();

        gate.begin(now).unwrap();
        assert_eq!(gate.admit(now), Admission::Accept);
        assert_eq!(gate.admit(now), Admission::Stop(Termination::PacketLimit));
        assert_eq!(gate.admit(now), Admission::Drop);
        assert_eq!(gate.packets(), 1);
    }

    #[test]
    fn test_gate_duration() {
        let mut gate = SessionGate::new(CaptureLimits {
            max_packets: None,
            max_duration: Some(Duration::from_secs(1)),
        });
        let start = Instant::now();

        gate.begin(start).unwrap();
        assert_eq!(gate.admit(start + Duration::from_millis(500)), Admission::Accept);
        assert_eq!(gate.admit(start + Duration::from_secs(1)), Admission::Accept);
        assert_eq!(
            gate.admit(start + Duration::from_millis(1500)),
            Admission::Stop(Termination::DurationElapsed)
        );
        assert_eq!(gate.admit(start + Duration::from_secs(2)), Admission::Drop);
        assert_eq!(gate.packets(), 2);
    }

    #[test]
    fn test_gate_zero_packets_stops_at_begin() {
        let mut gate = SessionGate::new(CaptureLimits {
            max_packets: Some(0),
            max_duration: None,
        });

        let result = gate.begin(Instant::now()).unwrap();

        assert_eq!(result, Some(Termination::PacketLimit));
        assert_eq!(gate.state(), SessionState::Stopped);
    }

    #[test]
    fn test_gate_stop_is_idempotent() {
        let mut gate = SessionGate::new(CaptureLimits::default());

        assert_eq!(
            gate.stop(Termination::Requested),
            Some(Termination::Requested)
        );
        assert_eq!(gate.stop(Termination::Requested), None);
        assert!(matches!(
            gate.begin(Instant::now()),
            Err(SessionError::AlreadyStopped)
        ));
    }

    #[test]
    fn test_count_limit_processes_exactly_n() {
        let (mut session, feed) = session(CaptureLimits {
            max_packets: Some(3),
            max_duration: None,
        });
        let (processed, handler) = collector();
        session.start(handler).unwrap();

        let pusher = std::thread::spawn(move || {
            for _ in 0..5 {
                feed.push(ProviderEvent::Frame(frame(ARP_REPLY)));
            }
            feed
        });
        let feed = pusher.join().unwrap();

        assert_eq!(session.wait().unwrap(), Termination::PacketLimit);
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.packets(), 3);
        assert_eq!(processed.lock().unwrap().len(), 3);
        assert_eq!(feed.stops(), 1);
        assert_eq!(feed.closes(), 1);
    }

    #[test]
    fn test_stopped_after_nth_frame_without_more_traffic() {
        let (mut session, feed) = session(CaptureLimits {
            max_packets: Some(1),
            max_duration: None,
        });
        let (processed, handler) = collector();
        session.start(handler).unwrap();

        feed.push(ProviderEvent::Frame(frame(ARP_REPLY)));

        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.wait().unwrap(), Termination::PacketLimit);

        let processed = processed.lock().unwrap();
        assert!(matches!(
            processed[0].layers.as_slice(),
            [Layer::Ethernet(_), Layer::Arp(_)]
        ));
    }

    #[test]
    fn test_duration_limit_without_frames() {
        let (mut session, _feed) = session(CaptureLimits {
            max_packets: None,
            max_duration: Some(Duration::from_millis(50)),
        });
        let (_, handler) = collector();
        let started = Instant::now();
        session.start(handler).unwrap();

        let termination = session.wait().unwrap();

        assert_eq!(termination, Termination::DurationElapsed);
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_zero_packets_never_starts_provider() {
        let (mut session, feed) = session(CaptureLimits {
            max_packets: Some(0),
            max_duration: None,
        });
        let (processed, handler) = collector();

        session.start(handler).unwrap();

        assert_eq!(session.wait().unwrap(), Termination::PacketLimit);
        assert_eq!(feed.starts(), 0);
        assert!(!feed.push(ProviderEvent::Frame(frame(ARP_REPLY))));
        assert!(processed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stop_handle_from_other_thread() {
        let (mut session, feed) = session(CaptureLimits::default());
        let (_, handler) = collector();
        session.start(handler).unwrap();
        let handle = session.stop_handle();

        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            handle.stop()
        });

        assert_eq!(session.wait().unwrap(), Termination::Requested);
        assert!(stopper.join().unwrap());
        assert!(!session.stop());
        assert_eq!(feed.closes(), 1);
    }

    #[test]
    fn test_stop_after_start_ends_with_requested() {
        let (mut session, feed) = session(CaptureLimits {
            max_packets: Some(5),
            max_duration: None,
        });
        let (_, handler) = collector();
        session.start(handler).unwrap();
        let handle = session.stop_handle();

        assert!(handle.stop());

        assert_eq!(session.wait().unwrap(), Termination::Requested);
        assert_eq!(feed.starts(), 1);
        assert_eq!(feed.closes(), 1);
    }

    #[test]
    fn test_count_limit_wins_over_duration() {
        let (mut session, feed) = session(CaptureLimits {
            max_packets: Some(2),
            max_duration: Some(Duration::from_secs(5)),
        });
        let (processed, handler) = collector();
        session.start(handler).unwrap();

        let pusher = std::thread::spawn(move || {
            for _ in 0..4 {
                feed.push(ProviderEvent::Frame(frame(ARP_REPLY)));
            }
        });
        pusher.join().unwrap();

        assert_eq!(session.wait().unwrap(), Termination::PacketLimit);
        assert_eq!(session.packets(), 2);
        assert_eq!(processed.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_duration_wins_over_count_limit() {
        let (mut session, feed) = session(CaptureLimits {
            max_packets: Some(100),
            max_duration: Some(Duration::from_millis(30)),
        });
        let (processed, handler) = collector();
        session.start(handler).unwrap();

        feed.push(ProviderEvent::Frame(frame(ARP_REPLY)));
        std::thread::sleep(Duration::from_millis(60));
        // Arrives after the deadline, before anything else stopped the session
        feed.push(ProviderEvent::Frame(frame(ARP_REPLY)));

        assert_eq!(session.wait().unwrap(), Termination::DurationElapsed);
        assert_eq!(session.packets(), 1);
        assert_eq!(processed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_provider_failure_stops_session() {
        let (mut session, feed) = session(CaptureLimits::default());
        let (_, handler) = collector();
        session.start(handler).unwrap();

        feed.push(ProviderEvent::Failed(ProviderError::Capture(
            "The device went down".to_string(),
        )));

        assert_eq!(
            session.wait().unwrap(),
            Termination::ProviderFailure(ProviderError::Capture(
                "The device went down".to_string()
            ))
        );
        assert_eq!(feed.closes(), 1);
    }

    #[test]
    fn test_short_frame_keeps_capturing() {
        let (mut session, feed) = session(CaptureLimits::default());
        let (processed, handler) = collector();
        session.start(handler).unwrap();

        feed.push(ProviderEvent::Frame(frame("001A8C10AD30001E6851")));

        assert_eq!(session.state(), SessionState::Capturing);
        assert_eq!(session.packets(), 1);
        {
            let processed = processed.lock().unwrap();
            assert!(processed[0].layers.is_empty());
            assert!(matches!(
                processed[0].error,
                Some(DecodeError::Truncated { .. })
            ));
        }

        feed.push(ProviderEvent::Frame(frame(ARP_REPLY)));
        assert_eq!(processed.lock().unwrap().len(), 2);

        session.stop();
        assert_eq!(session.wait().unwrap(), Termination::Requested);
    }

    #[test]
    fn test_frames_after_stop_are_dropped() {
        let (mut session, feed) = session(CaptureLimits::default());
        let (processed, handler) = collector();
        session.start(handler).unwrap();

        session.stop();
        // The provider may still deliver frames it already queued
        feed.push(ProviderEvent::Frame(frame(ARP_REPLY)));

        assert!(processed.lock().unwrap().is_empty());
        assert_eq!(session.packets(), 0);
        assert_eq!(session.wait().unwrap(), Termination::Requested);
    }

    #[test]
    fn test_start_misuse() {
        let (mut session, _feed) = session(CaptureLimits::default());
        let (_, handler) = collector();
        session.start(handler).unwrap();

        let (_, handler) = collector();
        assert!(matches!(
            session.start(handler),
            Err(SessionError::AlreadyStarted)
        ));

        session.stop();
        let (_, handler) = collector();
        assert!(matches!(
            session.start(handler),
            Err(SessionError::AlreadyStopped)
        ));
    }

    #[test]
    fn test_wait_before_start() {
        let (mut session, _feed) = session(CaptureLimits::default());

        assert!(matches!(session.wait(), Err(SessionError::NotStarted)));
    }

    #[test]
    fn test_wait_twice_returns_same_termination() {
        let (mut session, feed) = session(CaptureLimits::default());
        let (_, handler) = collector();
        session.start(handler).unwrap();

        session.stop();

        assert_eq!(session.wait().unwrap(), Termination::Requested);
        assert_eq!(session.wait().unwrap(), Termination::Requested);
        assert_eq!(feed.stops(), 1);
    }

    #[test]
    fn test_provider_start_failure() {
        let provider = MockSession {
            fail_start: Some(ProviderError::Capture("permission denied".to_string())),
            ..Default::default()
        };
        let feed = provider.feed.clone();
        let mut session = CaptureSession::new(provider, CaptureLimits::default());
        let (_, handler) = collector();

        let result = session.start(handler);

        assert!(matches!(result, Err(SessionError::Provider(_))));
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(feed.closes(), 1);
    }

    #[test]
    fn test_drop_releases_provider() {
        let (mut session, feed) = session(CaptureLimits::default());
        let (_, handler) = collector();
        session.start(handler).unwrap();

        drop(session);

        assert_eq!(feed.stops(), 1);
        assert_eq!(feed.closes(), 1);
        assert!(!feed.push(ProviderEvent::Frame(frame(ARP_REPLY))));
    }
}
