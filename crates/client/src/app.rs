//! Chat client actor — owns the connection, dispatcher, store and timers.
//!
//! One tokio task processes user commands, connection events and the three
//! store timers sequentially. External callers communicate via
//! `ChatClient`, which sends `ChatCommand` messages over an mpsc channel.
//! Lock-free reads go through `ArcSwap`; change notifications go out on a
//! broadcast channel (dropping the receiver unsubscribes).

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Local;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use agentlink_protocol::ClientMessage;

use crate::commands::CommandEncoder;
use crate::config::ClientConfig;
use crate::connection::{ConnectionEvent, ConnectionHandle, ConnectionStatus};
use crate::dispatcher::{Dispatch, Dispatcher};
use crate::endpoint;
use crate::error::ClientError;
use crate::store::{ConversationState, ConversationStore, Effect, ProjectIdStatus};
use crate::timers::Deadline;
use crate::transport::Connector;

const UPDATE_CAPACITY: usize = 256;

/// Change notifications published after the snapshot is swapped in
#[derive(Debug, Clone, PartialEq)]
pub enum ClientUpdate {
    StateChanged,
    /// The server reported a workspace change; file views should refresh.
    FilesChanged,
    Connection(ConnectionStatus),
    GaveUp { attempts: u32 },
    ConnectionError(String),
}

type Reply = oneshot::Sender<Result<(), ClientError>>;

enum ChatCommand {
    Connect,
    Disconnect,
    SendMessage { content: String, reply: Reply },
    CreateSession { reply: Reply },
    SwitchSession { session_id: String, reply: Reply },
    DeleteSession { session_id: String, reply: Reply },
    RefreshSessions { reply: Reply },
    SetPendingProjectId { value: String },
    ConfirmProjectId { reply: Reply },
    Shutdown,
}

/// Handle to a running chat client (cheap to Clone).
#[derive(Clone)]
pub struct ChatClient {
    command_tx: mpsc::Sender<ChatCommand>,
    snapshot: Arc<ArcSwap<ConversationState>>,
    updates: broadcast::Sender<ClientUpdate>,
}

impl ChatClient {
    /// Spawn a client for the server at `base_url` (e.g. `https://host:8443`).
    /// The WebSocket endpoint is derived from it. Nothing connects until
    /// `connect()`.
    pub fn spawn<C: Connector>(
        base_url: &str,
        config: ClientConfig,
        connector: C,
    ) -> Result<ChatClient, ClientError> {
        let base = endpoint::parse_base(base_url)?;
        Ok(Self::spawn_with_url(
            endpoint::websocket_url(&base),
            config,
            connector,
        ))
    }

    /// Spawn a client against an already-derived WebSocket URL.
    pub fn spawn_with_url<C: Connector>(
        ws_url: String,
        config: ClientConfig,
        connector: C,
    ) -> ChatClient {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let snapshot = Arc::new(ArcSwap::from_pointee(ConversationState::default()));

        let (connection, events) = ConnectionHandle::spawn(ws_url, &config, connector);
        let actor = ChatActor {
            encoder: CommandEncoder::new(connection),
            dispatcher: Dispatcher::new(),
            store: ConversationStore::new(),
            config,
            snapshot: snapshot.clone(),
            updates: updates.clone(),
            thinking: Deadline::default(),
            create_watchdog: Deadline::default(),
            project_status: Deadline::default(),
        };
        tokio::spawn(actor.run(command_rx, events));

        ChatClient {
            command_tx,
            snapshot,
            updates,
        }
    }

    pub async fn connect(&self) {
        self.send(ChatCommand::Connect).await;
    }

    pub async fn disconnect(&self) {
        self.send(ChatCommand::Disconnect).await;
    }

    /// Append the message locally and send it. The snapshot already holds
    /// the message when this returns `Ok`.
    pub async fn send_message(&self, content: &str) -> Result<(), ClientError> {
        let content = content.to_string();
        self.request(|reply| ChatCommand::SendMessage { content, reply })
            .await
    }

    pub async fn create_session(&self) -> Result<(), ClientError> {
        self.request(|reply| ChatCommand::CreateSession { reply })
            .await
    }

    pub async fn switch_session(&self, session_id: &str) -> Result<(), ClientError> {
        let session_id = session_id.to_string();
        self.request(|reply| ChatCommand::SwitchSession { session_id, reply })
            .await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), ClientError> {
        let session_id = session_id.to_string();
        self.request(|reply| ChatCommand::DeleteSession { session_id, reply })
            .await
    }

    pub async fn refresh_sessions(&self) -> Result<(), ClientError> {
        self.request(|reply| ChatCommand::RefreshSessions { reply })
            .await
    }

    pub async fn set_pending_project_id(&self, value: &str) {
        self.send(ChatCommand::SetPendingProjectId {
            value: value.to_string(),
        })
        .await;
    }

    pub async fn confirm_project_id(&self) -> Result<(), ClientError> {
        self.request(|reply| ChatCommand::ConfirmProjectId { reply })
            .await
    }

    /// Cancel all timers, close the connection and stop the actor.
    pub async fn shutdown(&self) {
        self.send(ChatCommand::Shutdown).await;
    }

    /// Lock-free snapshot read.
    pub fn snapshot(&self) -> Arc<ConversationState> {
        self.snapshot.load_full()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientUpdate> {
        self.updates.subscribe()
    }

    /// Wait until a snapshot satisfies `pred`. `None` if the actor stopped.
    pub async fn wait_until<F>(&self, mut pred: F) -> Option<Arc<ConversationState>>
    where
        F: FnMut(&ConversationState) -> bool,
    {
        let mut rx = self.updates.subscribe();
        loop {
            let snapshot = self.snapshot();
            if pred(&snapshot) {
                return Some(snapshot);
            }
            if self.command_tx.is_closed() {
                return None;
            }
            match rx.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    async fn send(&self, cmd: ChatCommand) {
        if self.command_tx.send(cmd).await.is_err() {
            warn!(
                component = "chat_client",
                event = "chat.command_dropped",
                "Chat actor stopped, command dropped"
            );
        }
    }

    async fn request<F>(&self, build: F) -> Result<(), ClientError>
    where
        F: FnOnce(Reply) -> ChatCommand,
    {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(build(tx))
            .await
            .map_err(|_| ClientError::ChannelClosed)?;
        rx.await.map_err(|_| ClientError::ChannelClosed)?
    }
}

struct ChatActor {
    encoder: CommandEncoder,
    dispatcher: Dispatcher,
    store: ConversationStore,
    config: ClientConfig,
    snapshot: Arc<ArcSwap<ConversationState>>,
    updates: broadcast::Sender<ClientUpdate>,
    thinking: Deadline,
    create_watchdog: Deadline,
    project_status: Deadline,
}

impl ChatActor {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<ChatCommand>,
        mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
    ) {
        loop {
            tokio::select! {
                cmd = command_rx.recv() => match cmd {
                    Some(ChatCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
                Some(event) = events.recv() => self.on_connection_event(event).await,
                _ = self.thinking.wait() => {
                    self.thinking.cancel();
                    self.store.show_thinking();
                    self.publish();
                }
                _ = self.create_watchdog.wait() => {
                    self.create_watchdog.cancel();
                    warn!(
                        component = "chat_client",
                        event = "session.create.timeout",
                        "No session update after create_session, clearing flag"
                    );
                    self.store.creating_timed_out();
                    self.publish();
                }
                _ = self.project_status.wait() => {
                    self.project_status.cancel();
                    if self.store.advance_project_status() == Some(ProjectIdStatus::Success) {
                        self.project_status.arm(self.config.project_status_success());
                    }
                    self.publish();
                }
            }
        }

        drop(command_rx);
        self.thinking.cancel();
        self.create_watchdog.cancel();
        self.project_status.cancel();
        self.encoder.connection().shutdown().await;
        self.store.set_connection(ConnectionStatus::Disconnected);
        self.publish();
        debug!(
            component = "chat_client",
            event = "chat.stopped",
            "Chat actor stopped"
        );
    }

    async fn handle_command(&mut self, cmd: ChatCommand) {
        match cmd {
            ChatCommand::Connect => self.encoder.connection().connect().await,
            ChatCommand::Disconnect => self.encoder.connection().disconnect().await,
            ChatCommand::SendMessage { content, reply } => {
                let result = self.store.submit_message(&content, Local::now());
                if result.is_ok() {
                    info!(
                        component = "chat_client",
                        event = "chat.message.sent",
                        chars = content.chars().count(),
                        "User message sent"
                    );
                }
                self.complete(result, reply).await;
            }
            ChatCommand::CreateSession { reply } => {
                let result = self.store.create_session();
                if result.is_ok() {
                    info!(
                        component = "chat_client",
                        event = "session.create.requested",
                        "Creating session"
                    );
                }
                self.complete(result, reply).await;
            }
            ChatCommand::SwitchSession { session_id, reply } => {
                let result = self.store.switch_session(&session_id);
                self.complete(result, reply).await;
            }
            ChatCommand::DeleteSession { session_id, reply } => {
                let result = self.store.delete_session(&session_id);
                self.complete(result, reply).await;
            }
            ChatCommand::RefreshSessions { reply } => {
                let result = self.store.refresh_sessions();
                self.complete(result, reply).await;
            }
            ChatCommand::SetPendingProjectId { value } => {
                self.store.set_pending_project_id(&value);
                self.publish();
            }
            ChatCommand::ConfirmProjectId { reply } => {
                let result = self.store.confirm_project_id();
                if result.is_ok() {
                    info!(
                        component = "chat_client",
                        event = "project.confirmed",
                        project_id = ?self.store.state().project.committed,
                        "Project id committed"
                    );
                }
                self.complete(result, reply).await;
            }
            ChatCommand::Shutdown => {}
        }
    }

    /// Publish the new state and answer the caller before anything goes
    /// out on the wire.
    async fn complete(&mut self, result: Result<Vec<Effect>, ClientError>, reply: Reply) {
        match result {
            Ok(effects) => {
                let outbound = self.run_effects(effects);
                self.publish();
                let _ = reply.send(Ok(()));
                self.transmit(outbound).await;
            }
            Err(e) => {
                debug!(
                    component = "chat_client",
                    event = "chat.action.rejected",
                    reason = %e,
                    "User action rejected"
                );
                let _ = reply.send(Err(e));
            }
        }
    }

    async fn on_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Status(status) => {
                let effects = self.store.set_connection(status);
                let outbound = self.run_effects(effects);
                self.publish();
                self.notify(ClientUpdate::Connection(status));
                self.transmit(outbound).await;
            }
            ConnectionEvent::Frame(text) => {
                match self
                    .dispatcher
                    .dispatch(&text, &mut self.store, Local::now())
                {
                    Dispatch::Applied(effects) => {
                        let outbound = self.run_effects(effects);
                        self.publish();
                        self.transmit(outbound).await;
                    }
                    Dispatch::Duplicate | Dispatch::Malformed | Dispatch::Ignored => {}
                }
            }
            ConnectionEvent::Error(err) => self.notify(ClientUpdate::ConnectionError(err)),
            ConnectionEvent::GaveUp { attempts } => {
                self.notify(ClientUpdate::GaveUp { attempts })
            }
        }
    }

    /// Arm or cancel timers; returns the frames to send.
    fn run_effects(&mut self, effects: Vec<Effect>) -> Vec<ClientMessage> {
        let mut outbound = Vec::new();
        for effect in effects {
            match effect {
                Effect::Send(msg) => outbound.push(msg),
                Effect::LoadingStarted => self.thinking.arm(self.config.loading_indicator_delay()),
                Effect::LoadingFinished => self.thinking.cancel(),
                Effect::CreatingStarted => {
                    self.create_watchdog.arm(self.config.session_create_timeout())
                }
                Effect::CreatingSettled => self.create_watchdog.cancel(),
                Effect::ProjectStatusUpdating => {
                    self.project_status.arm(self.config.project_status_updating())
                }
                Effect::FilesChanged => self.notify(ClientUpdate::FilesChanged),
            }
        }
        outbound
    }

    async fn transmit(&self, outbound: Vec<ClientMessage>) {
        for msg in outbound {
            self.encoder.send(msg).await;
        }
    }

    fn publish(&self) {
        self.snapshot.store(Arc::new(self.store.state().clone()));
        self.notify(ClientUpdate::StateChanged);
    }

    fn notify(&self, update: ClientUpdate) {
        // No subscribers is fine.
        let _ = self.updates.send(update);
    }
}
