//! The session hub: client registry, controller arbitration and fan-out.
//!
//! One hub task drains the register/unregister/broadcast/control channels
//! and is the only writer of the client index and the controller slot.
//! Everything else reads through a lock snapshot. Delivery to a client is
//! always a non-blocking push onto its bounded outbound queue; a full
//! queue schedules that client for eviction instead of stalling producers.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use bytes::Bytes;
use log::{debug, info, warn};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use super::protocol::{self, WireMessage};

/// Capacity of each client's outbound queue. Overflow evicts the client.
pub const OUTBOUND_QUEUE_SIZE: usize = 256;

/// Capacity of the shared broadcast channel.
const BROADCAST_BUFFER_SIZE: usize = 256;

/// A connected client as the hub sees it: identity plus the sending half
/// of its outbound queue. The receiving half is owned by the socket
/// writer task.
#[derive(Clone)]
pub struct Client {
    pub id: String,
    pub username: String,
    outbound: mpsc::Sender<Bytes>,
}

impl Client {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> (Self, mpsc::Receiver<Bytes>) {
        let (outbound, rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);
        (
            Self {
                id: id.into(),
                username: username.into(),
                outbound,
            },
            rx,
        )
    }

    /// Push a payload onto this client's queue without blocking.
    /// Returns false if the queue is full or closed.
    pub fn try_queue(&self, data: Bytes) -> bool {
        self.outbound.try_send(data).is_ok()
    }
}

enum ControlCommand {
    Request {
        client_id: String,
        reply: oneshot::Sender<bool>,
    },
    Release {
        client_id: String,
    },
}

struct Shared {
    clients: HashMap<String, Client>,
    controller: Option<String>,
}

struct HubChannels {
    register_rx: mpsc::UnboundedReceiver<(Client, oneshot::Sender<()>)>,
    unregister_rx: mpsc::UnboundedReceiver<String>,
    broadcast_rx: mpsc::Receiver<Bytes>,
    control_rx: mpsc::UnboundedReceiver<ControlCommand>,
}

pub struct Hub {
    shared: RwLock<Shared>,
    register_tx: mpsc::UnboundedSender<(Client, oneshot::Sender<()>)>,
    unregister_tx: mpsc::UnboundedSender<String>,
    broadcast_tx: mpsc::Sender<Bytes>,
    control_tx: mpsc::UnboundedSender<ControlCommand>,
    channels: Mutex<Option<HubChannels>>,
}

impl Hub {
    pub fn new() -> Self {
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::channel(BROADCAST_BUFFER_SIZE);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        Self {
            shared: RwLock::new(Shared {
                clients: HashMap::new(),
                controller: None,
            }),
            register_tx,
            unregister_tx,
            broadcast_tx,
            control_tx,
            channels: Mutex::new(Some(HubChannels {
                register_rx,
                unregister_rx,
                broadcast_rx,
                control_rx,
            })),
        }
    }

    /// The hub event loop. Spawn exactly once; runs until the task is
    /// dropped at shutdown.
    pub async fn run(self: std::sync::Arc<Self>) {
        let Some(mut channels) = self.channels.lock().unwrap().take() else {
            warn!("hub loop started twice, ignoring");
            return;
        };

        loop {
            tokio::select! {
                reg = channels.register_rx.recv() => match reg {
                    Some((client, ack)) => {
                        self.handle_register(client);
                        let _ = ack.send(());
                    }
                    None => break,
                },
                unreg = channels.unregister_rx.recv() => match unreg {
                    Some(client_id) => self.handle_unregister(&client_id),
                    None => break,
                },
                data = channels.broadcast_rx.recv() => match data {
                    Some(data) => self.handle_broadcast(data),
                    None => break,
                },
                cmd = channels.control_rx.recv() => match cmd {
                    Some(cmd) => self.handle_control(cmd),
                    None => break,
                },
            }
        }
    }

    /// Add a client to the index. Resolves once the hub loop has processed
    /// the registration, so the client is observable afterwards.
    pub async fn register(&self, client: Client) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.register_tx.send((client, ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Schedule a client for removal. A no-op for unknown IDs; safe to
    /// call repeatedly.
    pub fn unregister(&self, client_id: &str) {
        let _ = self.unregister_tx.send(client_id.to_string());
    }

    /// Fan a payload out to every client's queue.
    pub async fn broadcast(&self, data: Bytes) {
        let _ = self.broadcast_tx.send(data).await;
    }

    /// Non-blocking broadcast for synchronous callers (clipboard and chat
    /// callbacks). Drops the payload if the hub is backlogged.
    pub fn try_broadcast(&self, data: Bytes) {
        if self.broadcast_tx.try_send(data).is_err() {
            warn!("hub broadcast backlog, dropping payload");
        }
    }

    /// Push a payload to a single client, non-blocking.
    pub fn send_to(&self, client_id: &str, data: Bytes) {
        let shared = self.shared.read().unwrap();
        if let Some(client) = shared.clients.get(client_id) {
            if !client.try_queue(data) {
                debug!("send_to {client_id}: queue unavailable, dropping");
            }
        }
    }

    /// Reassign control to `client_id`. Returns false only if the client
    /// is not registered.
    pub async fn request_control(&self, client_id: &str) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .control_tx
            .send(ControlCommand::Request {
                client_id: client_id.to_string(),
                reply: reply_tx,
            })
            .is_err()
        {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// Relinquish control if `client_id` currently holds it.
    pub fn release_control(&self, client_id: &str) {
        let _ = self.control_tx.send(ControlCommand::Release {
            client_id: client_id.to_string(),
        });
    }

    pub fn is_controller(&self, client_id: &str) -> bool {
        let shared = self.shared.read().unwrap();
        shared.controller.as_deref() == Some(client_id)
    }

    /// Current controller ID, if any.
    pub fn controller(&self) -> Option<String> {
        self.shared.read().unwrap().controller.clone()
    }

    pub fn client_count(&self) -> usize {
        self.shared.read().unwrap().clients.len()
    }

    fn handle_register(&self, client: Client) {
        let mut shared = self.shared.write().unwrap();
        info!("client connected: {} ({})", client.id, client.username);
        let adopt = shared.controller.is_none();
        if adopt {
            shared.controller = Some(client.id.clone());
        }
        let username = client.username.clone();
        shared.clients.insert(client.id.clone(), client);
        if adopt {
            Self::notify_grant(&shared, true, &username);
        }
    }

    fn handle_unregister(&self, client_id: &str) {
        let mut shared = self.shared.write().unwrap();
        if shared.clients.remove(client_id).is_none() {
            return;
        }
        info!("client disconnected: {client_id}");
        if shared.controller.as_deref() == Some(client_id) {
            shared.controller = None;
            // Promote an arbitrary survivor; iteration order is
            // unspecified but any registered client satisfies the
            // controller invariant.
            if let Some((next_id, next_name)) = shared
                .clients
                .iter()
                .next()
                .map(|(id, c)| (id.clone(), c.username.clone()))
            {
                shared.controller = Some(next_id);
                Self::notify_grant(&shared, true, &next_name);
            }
        }
    }

    fn handle_broadcast(&self, data: Bytes) {
        let shared = self.shared.read().unwrap();
        for client in shared.clients.values() {
            match client.outbound.try_send(data.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                    warn!("client {} cannot keep up, evicting", client.id);
                    let _ = self.unregister_tx.send(client.id.clone());
                }
            }
        }
    }

    fn handle_control(&self, cmd: ControlCommand) {
        match cmd {
            ControlCommand::Request { client_id, reply } => {
                let mut shared = self.shared.write().unwrap();
                let granted = match shared.clients.get(&client_id) {
                    Some(client) => {
                        let username = client.username.clone();
                        if let Some(prev_id) = shared.controller.clone() {
                            if prev_id != client_id {
                                if let Some(prev_name) = shared
                                    .clients
                                    .get(&prev_id)
                                    .map(|c| c.username.clone())
                                {
                                    Self::notify_grant(&shared, false, &prev_name);
                                }
                            }
                        }
                        shared.controller = Some(client_id.clone());
                        Self::notify_grant(&shared, true, &username);
                        true
                    }
                    None => false,
                };
                let _ = reply.send(granted);
            }
            ControlCommand::Release { client_id } => {
                let mut shared = self.shared.write().unwrap();
                if shared.controller.as_deref() == Some(client_id.as_str()) {
                    if let Some(name) = shared
                        .clients
                        .get(&client_id)
                        .map(|c| c.username.clone())
                    {
                        Self::notify_grant(&shared, false, &name);
                    }
                    shared.controller = None;
                }
            }
        }
    }

    /// Push a control grant to every client directly. Delivery failures
    /// here are handled by the next broadcast's eviction pass.
    fn notify_grant(shared: &Shared, granted: bool, controller: &str) {
        let data = Bytes::from(protocol::encode(&WireMessage::ControlGrant {
            granted,
            controller: Some(controller.to_string()),
        }));
        for client in shared.clients.values() {
            let _ = client.outbound.try_send(data.clone());
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
