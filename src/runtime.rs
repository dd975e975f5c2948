use async_std::channel;
use async_std::channel::Receiver;
use async_std::stream;
use async_std::stream::StreamExt;

use crate::clock::SystemClock;
use crate::config::Settings;
use crate::interpolator::FrameQueue;
use crate::orchestrator::Orchestrator;
use crate::overlay::ParameterSink;
use crate::stats::connection::{ SessionEvent, Transport };

enum Input {
    Session(SessionEvent),
    Frame,
    Shutdown,
}

/// Drives one orchestrator on the current task until `shutdown` fires.
///
/// Session events, frame ticks and the shutdown signal are merged into a
/// single stream, so every callback runs to completion before the next.
/// There is no reconnect: once the session closes the status stays at
/// `Connecting` until the process is restarted.
pub async fn run<T: Transport, S: ParameterSink>(settings: &Settings, transport: &mut T, sink: S, shutdown: Receiver<()>) {
    let (events_sender, events_receiver) = channel::unbounded();

    let mut orchestrator = Orchestrator::new(settings.convergence_rate, FrameQueue::new(), SystemClock, sink);
    orchestrator.open(transport, &settings.endpoint, events_sender);

    let session = events_receiver.map(Input::Session);
    let frames = stream::interval(settings.frame_period()).map(|()| Input::Frame);
    let stop = shutdown.map(|()| Input::Shutdown);
    let mut inputs = Box::pin(session.merge(frames).merge(stop));

    let mut ticks = 0u64;
    while let Some(input) = inputs.next().await {
        match input {
            Input::Session(event) => orchestrator.handle_event(event),
            Input::Frame => {
                ticks += 1;
                if ticks % (60 * u64::from(settings.frame_rate)) == 0 {
                    debug!["Frames driven: {}", ticks];
                }
                orchestrator.advance_frame();
            },
            Input::Shutdown => {
                info!["Shutdown requested"];
                break;
            },
        }
    }

    orchestrator.stop();
}
