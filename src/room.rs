//! ChatRoom actor
//!
//! Owns the membership map (display name -> User). Joins, departures and
//! broadcasts are all work items on the room's own mailbox, so membership
//! only ever changes inside the room loop and every operation sees the
//! effects of all earlier ones.

use std::collections::HashMap;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::actor::{self, Actor, ActorHandle, Context};
use crate::config::ChatConfig;
use crate::connection::Connection;
use crate::error::{ActorError, ChatError, Rejected};
use crate::message::Message;
use crate::types::UserId;
use crate::user::User;

/// Commands accepted by the ChatRoom actor
pub enum RoomCommand {
    /// Register a validated name
    AddUser {
        connection: Connection,
        name: String,
        reply: oneshot::Sender<Result<(), Rejected>>,
    },
    /// Deregister a user, if the entry still belongs to `id`
    RemoveUser {
        name: String,
        id: UserId,
        reply: oneshot::Sender<bool>,
    },
    /// Fan a message out to everyone except its author
    Broadcast(Message),
    /// Snapshot of the registered names
    Members {
        reply: oneshot::Sender<Vec<String>>,
    },
}

/// The chat room actor state
pub struct ChatRoom {
    /// Registered users: name -> User
    users: HashMap<String, User>,
    config: ChatConfig,
}

impl ChatRoom {
    /// Create an empty room
    pub fn new(config: ChatConfig) -> Self {
        Self {
            users: HashMap::new(),
            config,
        }
    }

    /// Start the room loop
    pub fn spawn(config: ChatConfig) -> (RoomHandle, JoinHandle<()>) {
        let capacity = config.mailbox_capacity;
        let (actor, join) = actor::spawn(Self::new(config), capacity);
        (RoomHandle { actor }, join)
    }

    /// Handle a join request
    ///
    /// The join notice goes out before the newcomer is registered and the
    /// roster is composed before it too, so neither ever mentions the
    /// newcomer to itself.
    async fn add_user(
        &mut self,
        connection: Connection,
        name: String,
        ctx: &Context<RoomCommand>,
    ) -> Result<(), Rejected> {
        info!("Guest {} joined, checking name [{}]", connection.peer(), name);

        if self.users.contains_key(&name) {
            info!("Rejecting {}: name {} already taken", connection.peer(), name);
            return Err(Rejected::new(ChatError::NameTaken(name), connection));
        }
        let Some(room) = ctx.myself() else {
            return Err(Rejected::new(ChatError::Unavailable, connection));
        };

        self.broadcast(&Message::joined(&name)).await;

        let roster = Message::roster(self.users.keys().map(String::as_str));
        let user = User::spawn(
            connection,
            name.clone(),
            RoomHandle { actor: room },
            self.config.mailbox_capacity,
        );
        let user = self.users.entry(name).or_insert(user);
        if let Err(e) = user.send(roster.to_string()).await {
            debug!("Could not send roster to {}: {}", user.name(), e);
        }

        debug!("Total users: {}", self.users.len());
        Ok(())
    }

    /// Handle a departure
    ///
    /// The entry is deleted before the notice goes out, so the departed user
    /// is never a broadcast target.
    async fn remove_user(&mut self, name: String, id: UserId) -> bool {
        match self.users.get(&name) {
            Some(user) if user.id() == id => {}
            Some(_) => {
                debug!("Ignoring stale removal for {} ({})", name, id);
                return false;
            }
            None => return false,
        }
        self.users.remove(&name);
        info!("User {} left", name);

        self.broadcast(&Message::left(&name)).await;
        debug!("Total users: {}", self.users.len());
        true
    }

    /// Deliver `message` to every member except its author
    ///
    /// Waits on each target's mailbox in turn, so one member with a full
    /// mailbox holds up the whole room until it drains or disconnects.
    async fn broadcast(&self, message: &Message) {
        debug!("Message: {}", message);
        let line = message.to_string();
        for (name, user) in &self.users {
            if *name == message.from {
                continue;
            }
            if let Err(e) = user.send(line.clone()).await {
                debug!("Skipping {}: {}", name, e);
            }
        }
    }
}

impl Actor for ChatRoom {
    type Message = RoomCommand;

    fn name(&self) -> String {
        "ChatRoom".to_string()
    }

    async fn handle(&mut self, cmd: RoomCommand, ctx: &Context<RoomCommand>) {
        match cmd {
            RoomCommand::AddUser {
                connection,
                name,
                reply,
            } => {
                let result = self.add_user(connection, name, ctx).await;
                if let Err(Err(rejected)) = reply.send(result) {
                    // Caller gave up waiting; close what it left behind
                    if let Some(connection) = rejected.connection {
                        connection.close().await;
                    }
                }
            }
            RoomCommand::RemoveUser { name, id, reply } => {
                let removed = self.remove_user(name, id).await;
                let _ = reply.send(removed);
            }
            RoomCommand::Broadcast(message) => {
                self.broadcast(&message).await;
            }
            RoomCommand::Members { reply } => {
                let _ = reply.send(self.users.keys().cloned().collect());
            }
        }
    }

    async fn stopped(&mut self) {
        for user in self.users.values() {
            user.stop();
        }
        self.users.clear();
        info!("ChatRoom stopped");
    }
}

/// Cloneable address of the ChatRoom actor
#[derive(Debug, Clone)]
pub struct RoomHandle {
    actor: ActorHandle<RoomCommand>,
}

impl RoomHandle {
    /// Ask the room to admit `connection` under `name`
    ///
    /// Resolves once the room has decided. On refusal the connection is
    /// handed back untouched.
    pub async fn add_user(&self, connection: Connection, name: impl Into<String>) -> Result<(), Rejected> {
        let name = name.into();
        self.actor
            .call(|reply| RoomCommand::AddUser {
                connection,
                name,
                reply,
            })
            .await
            .unwrap_or_else(|_| Err(Rejected::lost(ChatError::Unavailable)))
    }

    /// Deregister `name` if it still belongs to `id`
    ///
    /// Returns whether an entry was removed.
    pub async fn remove_user(&self, name: &str, id: UserId) -> Result<bool, ActorError> {
        self.actor
            .call(|reply| RoomCommand::RemoveUser {
                name: name.to_string(),
                id,
                reply,
            })
            .await
    }

    /// Queue a message for fan-out
    pub async fn broadcast(&self, message: Message) -> Result<(), ActorError> {
        self.actor.submit(RoomCommand::Broadcast(message)).await
    }

    /// Currently registered names, in no particular order
    pub async fn members(&self) -> Result<Vec<String>, ActorError> {
        self.actor.call(|reply| RoomCommand::Members { reply }).await
    }

    /// Stop the room and every registered user
    pub fn stop(&self) -> bool {
        self.actor.stop()
    }
}
