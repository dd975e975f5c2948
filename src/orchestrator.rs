use async_std::channel::Sender;

use std::time::{ Duration, Instant };

use crate::clock::Clock;
use crate::interpolator::{ ChannelBank, FrameClock, FrameId, FrameQueue };
use crate::mapper;
use crate::mapper::VisualParameters;
use crate::overlay::{ Frame, ParameterSink };
use crate::stats::connection::{ ConnectionManager, ConnectionStatus, SessionEvent, Transport };

/// Seconds handed downstream while no connection has been seen yet.
pub const NEVER_FADE_IN_SECS: f64 = 9999.0;

/// Time from start until the first connection. Written at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectFirstMarker(Option<Duration>);

impl ConnectFirstMarker {
    pub fn unset() -> ConnectFirstMarker {
        ConnectFirstMarker(None)
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.0
    }

    /// Returns false, leaving the marker alone, if it was already set.
    pub fn set_once(&mut self, elapsed: Duration) -> bool {
        if self.0.is_some() {
            return false;
        }
        self.0 = Some(elapsed);
        true
    }

    pub fn fade_delay_secs(&self) -> f64 {
        self.0.map(|elapsed| elapsed.as_secs_f64()).unwrap_or(NEVER_FADE_IN_SECS)
    }
}

/// Wires the stats session through the mapper into the parameter channels
/// and publishes the smoothed result to a sink.
///
/// Stopping (explicitly or by drop) closes the session, cancels every
/// pending frame and silences the sink for good.
pub struct Orchestrator<F: FrameClock, C: Clock, S: ParameterSink> {
    connection: ConnectionManager,
    channels: ChannelBank,
    frames: F,
    clock: C,
    sink: S,
    started_at: Instant,
    connect_first: ConnectFirstMarker,
    stopped: bool,
}

impl<F: FrameClock, C: Clock, S: ParameterSink> Orchestrator<F, C, S> {
    pub fn new(convergence_rate: f64, frames: F, clock: C, sink: S) -> Orchestrator<F, C, S> {
        let started_at = clock.now();
        Orchestrator {
            connection: ConnectionManager::new(),
            channels: ChannelBank::new(VisualParameters::NEUTRAL, convergence_rate),
            frames,
            clock,
            sink,
            started_at,
            connect_first: ConnectFirstMarker::unset(),
            stopped: false,
        }
    }

    pub fn open<T: Transport + ?Sized>(&mut self, transport: &mut T, endpoint: &str, events: Sender<SessionEvent>) {
        if self.stopped {
            warn!["Ignoring open of {} on a stopped orchestrator", endpoint];
            return;
        }

        let change = self.connection.open(transport, endpoint, events);
        if change.status.is_some() {
            self.publish();
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        if self.stopped {
            return;
        }

        let change = self.connection.handle(event);
        if change.sample_replaced {
            let targets = mapper::map(self.connection.sample());
            self.channels.retarget(&targets, &mut self.frames);
        }

        if let Some(status) = change.status {
            if status == ConnectionStatus::Connected {
                let elapsed = self.clock.now().saturating_duration_since(self.started_at);
                if self.connect_first.set_once(elapsed) {
                    info!["First connected after {:.2}s", elapsed.as_secs_f64()];
                }
            }
            self.publish();
        }
    }

    /// Runs one frame's worth of due callbacks and publishes if anything moved.
    pub fn on_frames(&mut self, due: &[FrameId]) {
        if self.stopped {
            return;
        }

        let mut advanced = false;
        for id in due {
            if self.channels.on_frame(*id, &mut self.frames).is_some() {
                advanced = true;
            }
        }

        if advanced {
            self.publish();
        }
    }

    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        self.connection.close();
        self.channels.cancel_all(&mut self.frames);
        info!["Stopped stats orchestrator"];
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn parameters(&self) -> VisualParameters {
        self.channels.values()
    }

    pub fn targets(&self) -> VisualParameters {
        mapper::map(self.connection.sample())
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn connect_first(&self) -> ConnectFirstMarker {
        self.connect_first
    }

    pub fn is_settled(&self) -> bool {
        self.channels.is_idle()
    }

    pub fn frames(&mut self) -> &mut F {
        &mut self.frames
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn publish(&mut self) {
        let frame = Frame {
            parameters: self.channels.values(),
            status: self.connection.status(),
            connect_first: self.connect_first,
            sample: self.connection.sample().cloned(),
        };
        trace!["Publishing {:?}", frame.parameters];
        self.sink.publish(&frame);
    }
}

impl<C: Clock, S: ParameterSink> Orchestrator<FrameQueue, C, S> {
    pub fn advance_frame(&mut self) {
        let due = self.frames.take_due();
        self.on_frames(&due);
    }
}

impl<F: FrameClock, C: Clock, S: ParameterSink> Drop for Orchestrator<F, C, S> {
    fn drop(&mut self) {
        self.stop();
    }
}
