//! Connection manager — owns the single real-time connection.
//!
//! Runs as a tokio task processing `ConnectionCommand`s, transport signals,
//! and its reconnect deadline one at a time. Callers hold a cheap
//! `ConnectionHandle`; everything the connection observes (status changes,
//! inbound text frames, transport errors) is reported on one event channel.
//! Nothing here returns an error to the caller: failures turn into events
//! and the reconnect path.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use agentlink_protocol::ClientMessage;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backoff::ReconnectPolicy;
use crate::config::ClientConfig;
use crate::timers::Deadline;
use crate::transport::{Connector, FrameSink, Transport};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        })
    }
}

/// Everything the connection reports to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Status(ConnectionStatus),
    /// Raw inbound text frame, not yet parsed
    Frame(String),
    Error(String),
    /// Reconnection stopped after this many consecutive retries
    GaveUp { attempts: u32 },
}

enum ConnectionCommand {
    Connect,
    Send(ClientMessage),
    Disconnect,
    Shutdown,
}

enum Signal {
    Opened(FrameSink),
    Frame(String),
    Closed,
    Failed(String),
}

/// A transport signal tagged with the connection instance that produced it
struct TransportSignal {
    generation: u64,
    signal: Signal,
}

/// Handle to a running connection actor (cheap to Clone).
#[derive(Clone)]
pub struct ConnectionHandle {
    command_tx: mpsc::Sender<ConnectionCommand>,
    status: watch::Receiver<ConnectionStatus>,
}

impl ConnectionHandle {
    /// Spawn the connection actor. Nothing is opened until `connect()`.
    pub fn spawn<C: Connector>(
        url: String,
        config: &ClientConfig,
        connector: C,
    ) -> (ConnectionHandle, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (signal_tx, signal_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

        let actor = ConnectionActor {
            url,
            connector,
            policy: config.reconnect.clone(),
            queue: VecDeque::new(),
            queue_capacity: config.send_queue_capacity,
            status_tx,
            events: event_tx,
            signal_tx,
            generation: 0,
            sink: None,
            io_task: None,
            attempts: 0,
            reconnect: Deadline::default(),
        };
        tokio::spawn(actor.run(command_rx, signal_rx));

        (
            ConnectionHandle {
                command_tx,
                status: status_rx,
            },
            event_rx,
        )
    }

    /// Open the connection unless one is already open or opening.
    pub async fn connect(&self) {
        self.command(ConnectionCommand::Connect).await;
    }

    /// Send now if connected, otherwise queue until the next open.
    pub async fn send(&self, msg: ClientMessage) {
        self.command(ConnectionCommand::Send(msg)).await;
    }

    /// Close the connection, cancel any retry and drop queued frames.
    pub async fn disconnect(&self) {
        self.command(ConnectionCommand::Disconnect).await;
    }

    /// Close the connection and stop the actor.
    pub async fn shutdown(&self) {
        self.command(ConnectionCommand::Shutdown).await;
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Wait until the connection reaches `status`. False if the actor stopped.
    pub async fn wait_for(&self, status: ConnectionStatus) -> bool {
        let mut rx = self.status.clone();
        let reached = rx.wait_for(|current| *current == status).await.is_ok();
        reached
    }

    async fn command(&self, cmd: ConnectionCommand) {
        if self.command_tx.send(cmd).await.is_err() {
            warn!(
                component = "connection",
                event = "connection.command_dropped",
                "Connection actor stopped, command dropped"
            );
        }
    }
}

struct ConnectionActor<C> {
    url: String,
    connector: C,
    policy: ReconnectPolicy,
    queue: VecDeque<ClientMessage>,
    queue_capacity: usize,
    status_tx: watch::Sender<ConnectionStatus>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    signal_tx: mpsc::Sender<TransportSignal>,
    /// Bumped whenever a transport is opened or abandoned
    generation: u64,
    sink: Option<FrameSink>,
    io_task: Option<JoinHandle<()>>,
    attempts: u32,
    reconnect: Deadline,
}

impl<C: Connector> ConnectionActor<C> {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<ConnectionCommand>,
        mut signal_rx: mpsc::Receiver<TransportSignal>,
    ) {
        loop {
            tokio::select! {
                cmd = command_rx.recv() => match cmd {
                    Some(ConnectionCommand::Connect) => self.open(),
                    Some(ConnectionCommand::Send(msg)) => self.send(msg).await,
                    Some(ConnectionCommand::Disconnect) => self.close().await,
                    Some(ConnectionCommand::Shutdown) | None => break,
                },
                Some(signal) = signal_rx.recv() => self.on_signal(signal).await,
                _ = self.reconnect.wait() => {
                    self.reconnect.cancel();
                    info!(
                        component = "connection",
                        event = "ws.reconnect.attempt",
                        attempt = self.attempts,
                        max_attempts = self.policy.max_attempts,
                        "Reconnecting"
                    );
                    self.open();
                }
            }
        }

        self.close().await;
        debug!(
            component = "connection",
            event = "connection.stopped",
            "Connection actor stopped"
        );
    }

    fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status() == status {
            return;
        }
        self.status_tx.send_replace(status);
        self.emit(ConnectionEvent::Status(status));
    }

    fn emit(&self, event: ConnectionEvent) {
        if self.events.send(event).is_err() {
            debug!(
                component = "connection",
                event = "connection.event_dropped",
                "No listener for connection events"
            );
        }
    }

    fn open(&mut self) {
        if self.status() != ConnectionStatus::Disconnected {
            debug!(
                component = "connection",
                event = "ws.connect.skipped",
                status = %self.status(),
                "Connection already open or opening"
            );
            return;
        }

        self.reconnect.cancel();
        self.generation += 1;
        let generation = self.generation;
        self.set_status(ConnectionStatus::Connecting);
        info!(
            component = "connection",
            event = "ws.connect.started",
            url = %self.url,
            generation,
            "Connecting to WebSocket"
        );

        let connecting = self.connector.connect(&self.url);
        let signals = self.signal_tx.clone();
        self.io_task = Some(tokio::spawn(async move {
            let Transport { sink, mut stream } = match connecting.await {
                Ok(transport) => transport,
                Err(e) => {
                    let _ = signals
                        .send(TransportSignal {
                            generation,
                            signal: Signal::Failed(e.to_string()),
                        })
                        .await;
                    return;
                }
            };

            if signals
                .send(TransportSignal {
                    generation,
                    signal: Signal::Opened(sink),
                })
                .await
                .is_err()
            {
                return;
            }

            while let Some(item) = stream.next().await {
                let (signal, last) = match item {
                    Ok(text) => (Signal::Frame(text), false),
                    Err(e) => (Signal::Failed(e.to_string()), true),
                };
                if signals
                    .send(TransportSignal { generation, signal })
                    .await
                    .is_err()
                    || last
                {
                    return;
                }
            }

            let _ = signals
                .send(TransportSignal {
                    generation,
                    signal: Signal::Closed,
                })
                .await;
        }));
    }

    async fn on_signal(&mut self, TransportSignal { generation, signal }: TransportSignal) {
        if generation != self.generation {
            debug!(
                component = "connection",
                event = "ws.signal.stale",
                generation,
                current = self.generation,
                "Ignoring signal from a superseded connection"
            );
            if let Signal::Opened(sink) = signal {
                close_sink(sink).await;
            }
            return;
        }

        match signal {
            Signal::Opened(sink) => {
                self.sink = Some(sink);
                self.attempts = 0;
                info!(
                    component = "connection",
                    event = "ws.connected",
                    url = %self.url,
                    queued = self.queue.len(),
                    "WebSocket connected"
                );
                self.set_status(ConnectionStatus::Connected);
                self.flush_queue().await;
            }
            Signal::Frame(text) => self.emit(ConnectionEvent::Frame(text)),
            Signal::Closed => {
                info!(
                    component = "connection",
                    event = "ws.closed",
                    url = %self.url,
                    "WebSocket closed by peer"
                );
                self.connection_lost().await;
            }
            Signal::Failed(err) => {
                warn!(
                    component = "connection",
                    event = "ws.error",
                    url = %self.url,
                    error = %err,
                    "WebSocket error"
                );
                self.emit(ConnectionEvent::Error(err));
                self.connection_lost().await;
            }
        }
    }

    async fn send(&mut self, msg: ClientMessage) {
        if self.status() == ConnectionStatus::Connected && self.sink.is_some() {
            self.transmit(msg).await;
            return;
        }

        if self.queue.len() >= self.queue_capacity {
            warn!(
                component = "connection",
                event = "ws.queue.overflow",
                kind = msg.kind(),
                capacity = self.queue_capacity,
                "Send queue full, frame dropped"
            );
            return;
        }
        debug!(
            component = "connection",
            event = "ws.queue.push",
            kind = msg.kind(),
            queued = self.queue.len() + 1,
            "Not connected, frame queued"
        );
        self.queue.push_back(msg);
    }

    /// Write one frame. On failure the frame goes back to the head of the
    /// queue and the connection is treated as lost. Returns false then.
    async fn transmit(&mut self, msg: ClientMessage) -> bool {
        let text = match serde_json::to_string(&msg) {
            Ok(text) => text,
            Err(e) => {
                error!(
                    component = "connection",
                    event = "ws.send.serialize_failed",
                    kind = msg.kind(),
                    error = %e,
                    "Failed to serialize client message"
                );
                return true;
            }
        };

        let Some(sink) = self.sink.as_mut() else {
            self.queue.push_front(msg);
            return false;
        };

        match sink.send(text).await {
            Ok(()) => {
                debug!(
                    component = "connection",
                    event = "ws.send",
                    kind = msg.kind(),
                    "Frame sent"
                );
                true
            }
            Err(e) => {
                warn!(
                    component = "connection",
                    event = "ws.send.failed",
                    kind = msg.kind(),
                    error = %e,
                    "Send failed, frame re-queued"
                );
                self.queue.push_front(msg);
                self.emit(ConnectionEvent::Error(e.to_string()));
                self.connection_lost().await;
                false
            }
        }
    }

    async fn flush_queue(&mut self) {
        while let Some(msg) = self.queue.pop_front() {
            if !self.transmit(msg).await {
                break;
            }
        }
    }

    /// Abandon the current transport, if any, and invalidate its signals.
    async fn drop_transport(&mut self) {
        self.generation += 1;
        if let Some(task) = self.io_task.take() {
            task.abort();
        }
        if let Some(sink) = self.sink.take() {
            close_sink(sink).await;
        }
    }

    /// Unexpected loss: go to `disconnected` and schedule a retry.
    async fn connection_lost(&mut self) {
        self.drop_transport().await;
        self.set_status(ConnectionStatus::Disconnected);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.policy.exhausted(self.attempts) {
            error!(
                component = "connection",
                event = "ws.reconnect.exhausted",
                attempts = self.attempts,
                "Max reconnection attempts reached"
            );
            self.emit(ConnectionEvent::GaveUp {
                attempts: self.attempts,
            });
            return;
        }

        let delay = self.policy.delay_for(self.attempts);
        self.attempts += 1;
        info!(
            component = "connection",
            event = "ws.reconnect.scheduled",
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );
        self.reconnect.arm(delay);
    }

    /// Explicit disconnect. Safe to call in any state.
    async fn close(&mut self) {
        self.reconnect.cancel();
        self.attempts = 0;
        if !self.queue.is_empty() {
            debug!(
                component = "connection",
                event = "ws.queue.cleared",
                dropped = self.queue.len(),
                "Dropping queued frames"
            );
            self.queue.clear();
        }
        self.drop_transport().await;
        if self.status() != ConnectionStatus::Disconnected {
            info!(
                component = "connection",
                event = "ws.disconnected",
                url = %self.url,
                "WebSocket disconnected on request"
            );
            self.set_status(ConnectionStatus::Disconnected);
        }
    }
}

async fn close_sink(mut sink: FrameSink) {
    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(
            component = "connection",
            event = "ws.close.failed",
            error = %e,
            "Close failed"
        ),
        Err(_) => debug!(
            component = "connection",
            event = "ws.close.timeout",
            "Close timed out"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake;
    use serde_json::json;
    use tokio::time::Instant;

    fn config(max_attempts: u32) -> ClientConfig {
        ClientConfig {
            reconnect: ReconnectPolicy {
                max_attempts,
                ..ReconnectPolicy::default()
            },
            ..ClientConfig::default()
        }
    }

    async fn next_status(events: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionStatus {
        loop {
            match events.recv().await.expect("event channel open") {
                ConnectionEvent::Status(status) => return status,
                _ => continue,
            }
        }
    }

    fn msg(content: &str) -> ClientMessage {
        ClientMessage::Message {
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn queued_frames_flush_in_order_after_connect() {
        let (connector, mut server) = fake::pair();
        let (handle, mut events) =
            ConnectionHandle::spawn("ws://localhost:8000/ws".into(), &config(10), connector);

        handle.send(msg("A")).await;
        handle.send(msg("B")).await;
        handle.send(msg("C")).await;
        handle.connect().await;

        let mut peer = server.accept().await;
        assert_eq!(peer.url, "ws://localhost:8000/ws");
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connecting);
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connected);

        for expected in ["A", "B", "C"] {
            let frame = peer.next_frame().await.expect("frame");
            assert_eq!(frame, json!({"type": "message", "content": expected}));
        }
    }

    #[tokio::test]
    async fn connect_is_idempotent_while_open() {
        let (connector, mut server) = fake::pair();
        let (handle, mut events) =
            ConnectionHandle::spawn("ws://h/ws".into(), &config(10), connector);

        handle.connect().await;
        handle.connect().await;
        let mut peer = server.accept().await;
        assert!(handle.wait_for(ConnectionStatus::Connected).await);
        handle.connect().await;

        handle.send(ClientMessage::GetSessions).await;
        assert_eq!(
            peer.next_frame().await,
            Some(json!({"type": "get_sessions"}))
        );
        assert_eq!(server.attempts(), 1);
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connecting);
        assert_eq!(next_status(&mut events).await, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn inbound_frames_are_forwarded_raw() {
        let (connector, mut server) = fake::pair();
        let (handle, mut events) =
            ConnectionHandle::spawn("ws://h/ws".into(), &config(10), connector);

        handle.connect().await;
        let peer = server.accept().await;
        peer.push_raw("{not json");

        loop {
            match events.recv().await.expect("event") {
                ConnectionEvent::Frame(text) => {
                    assert_eq!(text, "{not json");
                    break;
                }
                ConnectionEvent::Status(_) => continue,
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_with_backoff_after_peer_closes() {
        let (connector, mut server) = fake::pair();
        let (handle, mut events) =
            ConnectionHandle::spawn("ws://h/ws".into(), &config(10), connector);

        handle.connect().await;
        let first = server.accept().await;
        assert!(handle.wait_for(ConnectionStatus::Connected).await);

        let dropped_at = Instant::now();
        drop(first);

        let mut second = server.accept().await;
        assert!(dropped_at.elapsed() >= Duration::from_millis(3_000));
        assert!(handle.wait_for(ConnectionStatus::Connected).await);

        handle.send(msg("after")).await;
        assert_eq!(
            second.next_frame().await,
            Some(json!({"type": "message", "content": "after"}))
        );

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let ConnectionEvent::Status(status) = event {
                seen.push(status);
            }
        }
        assert_eq!(
            seen,
            vec![
                ConnectionStatus::Connecting,
                ConnectionStatus::Connected,
                ConnectionStatus::Disconnected,
                ConnectionStatus::Connecting,
                ConnectionStatus::Connected,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn frames_sent_while_reconnecting_keep_their_order() {
        let (connector, mut server) = fake::pair();
        let (handle, _events) =
            ConnectionHandle::spawn("ws://h/ws".into(), &config(10), connector);

        handle.connect().await;
        let first = server.accept().await;
        assert!(handle.wait_for(ConnectionStatus::Connected).await);
        drop(first);
        assert!(handle.wait_for(ConnectionStatus::Disconnected).await);

        handle.send(msg("A")).await;
        handle.send(msg("B")).await;
        handle.send(msg("C")).await;

        let mut second = server.accept().await;
        for expected in ["A", "B", "C"] {
            let frame = second.next_frame().await.expect("frame");
            assert_eq!(frame, json!({"type": "message", "content": expected}));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_requeues_the_frame_at_the_head() {
        let (connector, mut server) = fake::pair();
        server.break_sinks(true);
        let (handle, mut events) =
            ConnectionHandle::spawn("ws://h/ws".into(), &config(10), connector);

        handle.send(msg("A")).await;
        handle.send(msg("B")).await;
        handle.send(msg("C")).await;
        handle.connect().await;

        let mut first = server.accept().await;
        loop {
            match events.recv().await.expect("event") {
                ConnectionEvent::Error(_) => break,
                ConnectionEvent::Status(_) => continue,
                other => panic!("unexpected event: {:?}", other),
            }
        }
        server.break_sinks(false);
        assert_eq!(first.next_frame().await, None);

        let mut second = server.accept().await;
        assert!(handle.wait_for(ConnectionStatus::Connected).await);
        for expected in ["A", "B", "C"] {
            let frame = second.next_frame().await.expect("frame");
            assert_eq!(frame, json!({"type": "message", "content": expected}));
        }
        assert_eq!(server.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let (connector, server) = fake::pair();
        server.refuse_connections(true);
        let (handle, mut events) =
            ConnectionHandle::spawn("ws://h/ws".into(), &config(2), connector);

        let started = Instant::now();
        handle.connect().await;

        let mut errors = 0;
        let attempts = loop {
            match events.recv().await.expect("event") {
                ConnectionEvent::GaveUp { attempts } => break attempts,
                ConnectionEvent::Error(_) => errors += 1,
                _ => {}
            }
        };

        assert_eq!(attempts, 2);
        assert_eq!(errors, 3);
        assert_eq!(server.attempts(), 3);
        // 3000 ms + 4500 ms of backoff between the three attempts
        assert!(started.elapsed() >= Duration::from_millis(7_500));
        assert_eq!(handle.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_ignores_the_old_connection_and_does_not_retry() {
        let (connector, mut server) = fake::pair();
        let (handle, mut events) =
            ConnectionHandle::spawn("ws://h/ws".into(), &config(10), connector);

        handle.connect().await;
        let mut peer = server.accept().await;
        assert!(handle.wait_for(ConnectionStatus::Connected).await);

        handle.disconnect().await;
        assert!(handle.wait_for(ConnectionStatus::Disconnected).await);
        handle.disconnect().await;

        peer.push(json!({"type": "assistant", "content": "late"}));
        assert_eq!(peer.next_frame().await, None);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(server.attempts(), 1);
        while let Ok(event) = events.try_recv() {
            assert!(
                !matches!(event, ConnectionEvent::Frame(_)),
                "stale frame delivered: {:?}",
                event
            );
        }
    }

    #[tokio::test]
    async fn disconnect_drops_queued_frames() {
        let (connector, mut server) = fake::pair();
        let (handle, _events) =
            ConnectionHandle::spawn("ws://h/ws".into(), &config(10), connector);

        handle.send(msg("stale")).await;
        handle.disconnect().await;
        handle.connect().await;
        let mut peer = server.accept().await;
        assert!(handle.wait_for(ConnectionStatus::Connected).await);

        handle.send(msg("fresh")).await;
        assert_eq!(
            peer.next_frame().await,
            Some(json!({"type": "message", "content": "fresh"}))
        );
    }

    #[tokio::test]
    async fn queue_overflow_drops_newest() {
        let (connector, mut server) = fake::pair();
        let config = ClientConfig {
            send_queue_capacity: 2,
            ..ClientConfig::default()
        };
        let (handle, _events) = ConnectionHandle::spawn("ws://h/ws".into(), &config, connector);

        handle.send(msg("1")).await;
        handle.send(msg("2")).await;
        handle.send(msg("3")).await;
        handle.connect().await;
        let mut peer = server.accept().await;

        assert_eq!(peer.next_frame().await.expect("frame")["content"], "1");
        assert_eq!(peer.next_frame().await.expect("frame")["content"], "2");
        handle.send(msg("4")).await;
        assert_eq!(peer.next_frame().await.expect("frame")["content"], "4");
    }
}
