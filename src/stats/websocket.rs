use async_std::channel;
use async_std::channel::{ Sender, Receiver };
use async_std::prelude::FutureExt;
use async_std::stream::StreamExt;
use async_std::task;

use async_tungstenite::async_std::connect_async;
use async_tungstenite::tungstenite::Message;

use crate::stats::connection::{ Session, SessionEvent, SessionHandle, Transport };

/// Receives the stats stream as WebSocket text frames. Nothing is ever sent.
pub struct WebSocketTransport;

struct WebSocketSession {
    shutdown: Sender<()>,
}

impl SessionHandle for WebSocketSession {
    fn close(&mut self) {
        // The reader task treats a closed shutdown channel as its stop signal.
        self.shutdown.close();
    }
}

impl Transport for WebSocketTransport {
    fn open(&mut self, endpoint: &str, events: Sender<SessionEvent>) -> Session {
        let (shutdown_sender, shutdown_receiver) = channel::bounded(1);

        let url = endpoint.to_string();
        task::spawn(async move {
            stream_frames(url, events, shutdown_receiver).await
        });

        Session::new(endpoint, Box::new(WebSocketSession { shutdown: shutdown_sender }))
    }
}

async fn stream_frames(url: String, events: Sender<SessionEvent>, shutdown: Receiver<()>) {
    let connecting = async { Some(connect_async(url.as_str()).await) }
        .race(async { let _ = shutdown.recv().await; None });

    let mut stream = match connecting.await {
        None => return,
        Some(Ok((stream, _response))) => {
            info!["Established connection to {}", url];
            stream
        },
        Some(Err(err)) => {
            fail(&events, err.to_string()).await;
            return;
        },
    };

    let mut frames = 0u64;
    loop {
        let next = async { Some(stream.next().await) }
            .race(async { let _ = shutdown.recv().await; None })
            .await;

        let event = match next {
            None => {
                if let Err(err) = stream.close(None).await {
                    debug!["Error while closing {}: {}", url, err];
                }
                return;
            },
            Some(None) | Some(Some(Ok(Message::Close(_)))) => SessionEvent::Closed,
            Some(Some(Ok(Message::Text(text)))) => {
                frames += 1;
                if frames % 60 == 0 {
                    debug!["Stats frames received: {}", frames];
                }
                SessionEvent::Message(text)
            },
            Some(Some(Ok(other))) => {
                debug!["Skipping non-text frame from {}: {:?}", url, other];
                continue;
            },
            Some(Some(Err(err))) => {
                fail(&events, err.to_string()).await;
                return;
            },
        };

        let terminal = !matches!(event, SessionEvent::Message(_));
        if events.send(event).await.is_err() || terminal {
            return;
        }
    }
}

/// A failed session is also a closed one, so `Error` is followed by `Connecting`.
async fn fail(events: &Sender<SessionEvent>, reason: String) {
    if events.send(SessionEvent::Failed(reason)).await.is_ok() {
        let _ = events.send(SessionEvent::Closed).await;
    }
}
