//! Transport seam between the connection manager and the network.
//!
//! A `Connector` opens one connection and hands back a text-frame sink and
//! stream. Production code uses `WsConnector` (tokio-tungstenite); tests
//! plug in an in-memory connector.

use std::pin::Pin;

use futures::future::{self, BoxFuture};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::error::TransportError;

pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// An open connection split into its two halves
pub struct Transport {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Transport, TransportError>>;
}

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Transport, TransportError>> {
        let url = url.to_string();
        Box::pin(async move {
            let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
            let (ws_tx, ws_rx) = socket.split();

            let sink = ws_tx.with(|text: String| {
                future::ready(Ok::<Message, TransportError>(Message::Text(text.into())))
            });

            // Pings are answered by tungstenite itself; only text frames reach the dispatcher.
            let stream = ws_rx.filter_map(|item| {
                future::ready(match item {
                    Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                    Ok(Message::Close(frame)) => {
                        debug!(
                            component = "transport",
                            event = "ws.close_frame",
                            reason = ?frame.map(|f| f.reason.to_string()),
                            "Server sent close frame"
                        );
                        None
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(TransportError::from(e))),
                })
            });

            Ok(Transport {
                sink: Box::pin(sink),
                stream: Box::pin(stream),
            })
        })
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory connector: every `connect` hands a `FakePeer` to the test.

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
    use futures::future::{self, BoxFuture};
    use futures::{SinkExt, StreamExt};

    use super::{Connector, Transport};
    use crate::error::TransportError;

    pub(crate) struct FakeConnector {
        accepted: UnboundedSender<FakePeer>,
        refuse: Arc<AtomicBool>,
        broken_sinks: Arc<AtomicBool>,
        attempts: Arc<AtomicUsize>,
    }

    pub(crate) struct FakeServer {
        accepted: UnboundedReceiver<FakePeer>,
        refuse: Arc<AtomicBool>,
        broken_sinks: Arc<AtomicBool>,
        attempts: Arc<AtomicUsize>,
    }

    /// The server side of one fake connection
    pub(crate) struct FakePeer {
        pub url: String,
        outbound: UnboundedReceiver<String>,
        inbound: UnboundedSender<Result<String, TransportError>>,
    }

    pub(crate) fn pair() -> (FakeConnector, FakeServer) {
        let (tx, rx) = unbounded();
        let refuse = Arc::new(AtomicBool::new(false));
        let broken_sinks = Arc::new(AtomicBool::new(false));
        let attempts = Arc::new(AtomicUsize::new(0));
        (
            FakeConnector {
                accepted: tx,
                refuse: refuse.clone(),
                broken_sinks: broken_sinks.clone(),
                attempts: attempts.clone(),
            },
            FakeServer {
                accepted: rx,
                refuse,
                broken_sinks,
                attempts,
            },
        )
    }

    impl Connector for FakeConnector {
        fn connect(&self, url: &str) -> BoxFuture<'static, Result<Transport, TransportError>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return Box::pin(future::ready(Err(TransportError::Other(
                    "connection refused".into(),
                ))));
            }

            let (out_tx, out_rx) = unbounded::<String>();
            let (in_tx, in_rx) = unbounded::<Result<String, TransportError>>();
            // With the receiver gone every write fails.
            let outbound = if self.broken_sinks.load(Ordering::SeqCst) {
                drop(out_rx);
                unbounded::<String>().1
            } else {
                out_rx
            };
            let _ = self.accepted.unbounded_send(FakePeer {
                url: url.to_string(),
                outbound,
                inbound: in_tx,
            });

            let sink = out_tx.sink_map_err(|_| TransportError::Closed);
            Box::pin(future::ready(Ok(Transport {
                sink: Box::pin(sink),
                stream: Box::pin(in_rx),
            })))
        }
    }

    impl FakeServer {
        pub(crate) async fn accept(&mut self) -> FakePeer {
            self.accepted.next().await.expect("connector dropped")
        }

        pub(crate) fn refuse_connections(&self, refuse: bool) {
            self.refuse.store(refuse, Ordering::SeqCst);
        }

        /// Connections opened from now on accept no writes.
        pub(crate) fn break_sinks(&self, broken: bool) {
            self.broken_sinks.store(broken, Ordering::SeqCst);
        }

        pub(crate) fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl FakePeer {
        /// Next frame written by the client; `None` once the client closed its sink.
        pub(crate) async fn next_frame(&mut self) -> Option<serde_json::Value> {
            let text = self.outbound.next().await?;
            Some(serde_json::from_str(&text).expect("client frames are JSON"))
        }

        pub(crate) fn push(&self, frame: serde_json::Value) {
            let _ = self.inbound.unbounded_send(Ok(frame.to_string()));
        }

        pub(crate) fn push_raw(&self, text: &str) {
            let _ = self.inbound.unbounded_send(Ok(text.to_string()));
        }
    }
}
