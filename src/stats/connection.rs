use async_std::channel::Sender;
use serde::Serialize;

use std::fmt;

use crate::stats::TelemetrySample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// What the transport reports about a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Message(String),
    Closed,
    Failed(String),
}

/// Inputs of the status machine, after payload decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Opened,
    SampleDecoded,
    DecodeFailed,
    Closed,
    TransportFailed,
}

impl ConnectionStatus {
    pub fn next(self, signal: Signal) -> ConnectionStatus {
        match (self, signal) {
            (_, Signal::Opened) => ConnectionStatus::Connecting,
            (_, Signal::SampleDecoded) => ConnectionStatus::Connected,
            (status, Signal::DecodeFailed) => status,
            (_, Signal::Closed) => ConnectionStatus::Connecting,
            (_, Signal::TransportFailed) => ConnectionStatus::Error,
        }
    }
}

pub trait SessionHandle {
    fn close(&mut self);
}

/// A long lived stream session. Closing is idempotent and also happens on drop.
pub struct Session {
    endpoint: String,
    handle: Option<Box<dyn SessionHandle>>,
}

impl Session {
    pub fn new(endpoint: &str, handle: Box<dyn SessionHandle>) -> Session {
        Session { endpoint: endpoint.to_string(), handle: Some(handle) }
    }

    /// A session whose transport never got far enough to hand out a handle.
    pub fn detached(endpoint: &str) -> Session {
        Session { endpoint: endpoint.to_string(), handle: None }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            info!["Closing stats session to {}", self.endpoint];
            handle.close();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens sessions. Failures to connect are reported later through `events`,
/// never from `open` itself.
pub trait Transport {
    fn open(&mut self, endpoint: &str, events: Sender<SessionEvent>) -> Session;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Change {
    pub status: Option<ConnectionStatus>,
    pub sample_replaced: bool,
}

pub struct ConnectionManager {
    status: ConnectionStatus,
    sample: Option<TelemetrySample>,
    session: Option<Session>,
}

impl ConnectionManager {
    pub fn new() -> ConnectionManager {
        ConnectionManager {
            status: ConnectionStatus::Connecting,
            sample: None,
            session: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn sample(&self) -> Option<&TelemetrySample> {
        self.sample.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn open<T: Transport + ?Sized>(&mut self, transport: &mut T, endpoint: &str, events: Sender<SessionEvent>) -> Change {
        self.close();

        info!["Opening stats session to {}", endpoint];
        self.session = Some(transport.open(endpoint, events));
        self.apply(Signal::Opened)
    }

    /// Feeds one transport event through the status machine. Events arriving
    /// while no session is open belong to a closed session and are dropped.
    pub fn handle(&mut self, event: SessionEvent) -> Change {
        if self.session.is_none() {
            debug!["Dropping event for a closed session: {:?}", event];
            return Change::default();
        }

        match event {
            SessionEvent::Message(payload) => match TelemetrySample::try_from(payload.as_str()) {
                Ok(sample) => {
                    self.sample = Some(sample);
                    let mut change = self.apply(Signal::SampleDecoded);
                    change.sample_replaced = true;
                    change
                },
                Err(err) => {
                    error!["Failed to parse stats: {}", err];
                    self.apply(Signal::DecodeFailed)
                },
            },
            SessionEvent::Closed => self.apply(Signal::Closed),
            SessionEvent::Failed(reason) => {
                warn!["Stats session failed: {}", reason];
                self.apply(Signal::TransportFailed)
            },
        }
    }

    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }

    fn apply(&mut self, signal: Signal) -> Change {
        let next = self.status.next(signal);
        if next == self.status {
            return Change::default();
        }

        info!["Connection status {} -> {}", self.status, next];
        self.status = next;
        Change { status: Some(next), sample_replaced: false }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        ConnectionManager::new()
    }
}
