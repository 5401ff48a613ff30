//! User actor
//!
//! One per admitted client. The send path is an actor that owns the write
//! half of the connection and performs exactly one line write per work item,
//! so concurrent broadcasts never interleave mid-line. A companion read task
//! owns the read half and forwards each line to the room.
//!
//! Whichever side notices a dead connection first removes the user from the
//! room and stops the actor; stopping closes the connection once.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::actor::{self, Actor, ActorHandle, Context};
use crate::connection::{Connection, LineReader, LineWriter};
use crate::error::{ActorError, ConnError};
use crate::message::Message;
use crate::room::RoomHandle;
use crate::types::UserId;

/// Upper bound on shutting down the write side during teardown
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Work items for the send path
#[derive(Debug)]
pub enum UserCommand {
    /// Write one line to the client
    Send(String),
}

/// Handle to a connected user, owned by the room while registered
#[derive(Debug)]
pub struct User {
    id: UserId,
    name: String,
    actor: ActorHandle<UserCommand>,
}

impl User {
    /// Start the send path and the read task for an admitted connection
    pub fn spawn(connection: Connection, name: String, room: RoomHandle, capacity: usize) -> Self {
        let id = UserId::new();
        let (reader, writer) = connection.into_split();
        let sender = UserSender {
            id,
            name: name.clone(),
            writer,
            room: room.clone(),
            failed: false,
        };
        let (actor, _join) = actor::spawn(sender, capacity);

        tokio::spawn(read_loop(reader, id, name.clone(), room, actor.clone()));

        Self { id, name, actor }
    }

    /// Identity of this connection
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a line for the client, waiting while its mailbox is full
    pub async fn send(&self, text: String) -> Result<(), ActorError> {
        self.actor.submit(UserCommand::Send(text)).await
    }

    /// Close the connection and end both tasks
    ///
    /// Returns true for the call that actually performed the teardown.
    pub fn stop(&self) -> bool {
        self.actor.stop()
    }
}

/// Send-path actor state
struct UserSender {
    id: UserId,
    name: String,
    writer: LineWriter,
    room: RoomHandle,
    failed: bool,
}

impl Actor for UserSender {
    type Message = UserCommand;

    fn name(&self) -> String {
        format!("user-{}", self.name)
    }

    async fn handle(&mut self, msg: UserCommand, ctx: &Context<UserCommand>) {
        match msg {
            UserCommand::Send(text) => {
                // Lines queued behind a failed write are dropped
                if self.failed {
                    return;
                }
                // A client that stopped reading must not hold off Stop
                let written = tokio::select! {
                    biased;
                    _ = ctx.stop_signal().triggered() => return,
                    written = self.writer.write_line(&text) => written,
                };
                if let Err(cause) = written {
                    self.failed = true;
                    let err = ConnError::new(self.writer.peer(), Some(&self.name), cause);
                    warn!("Stopping {}", err);
                    // Off-loop so this mailbox keeps draining while the room
                    // may still be delivering to it.
                    tokio::spawn(leave(
                        self.room.clone(),
                        self.name.clone(),
                        self.id,
                        ctx.myself(),
                    ));
                }
            }
        }
    }

    async fn stopped(&mut self) {
        // Bounded: the stream may still be wedged on an abandoned write
        let closed = tokio::time::timeout(CLOSE_TIMEOUT, self.writer.close()).await;
        if let Ok(Err(e)) = closed {
            debug!("Closing connection for {} failed: {}", self.name, e);
        }
        info!("User {} ({}) disconnected", self.name, self.writer.peer());
    }
}

/// Forward every complete line from the client to the room
async fn read_loop(
    mut reader: LineReader,
    id: UserId,
    name: String,
    room: RoomHandle,
    actor: ActorHandle<UserCommand>,
) {
    loop {
        let line = tokio::select! {
            biased;
            _ = actor.stopped() => None,
            line = reader.read_line() => Some(line),
        };
        let Some(line) = line else {
            debug!("External stop for [{}] ({})", name, reader.peer());
            return;
        };

        let err = match line {
            Ok(Some(text)) => {
                if room.broadcast(Message::chat(&name, text)).await.is_err() {
                    debug!("Room closed, ending read task for {}", name);
                    break;
                }
                continue;
            }
            Ok(None) => ConnError::closed(reader.peer(), Some(&name)),
            Err(cause) => ConnError::new(reader.peer(), Some(&name), cause),
        };
        info!("Stopping {}", err);
        break;
    }

    leave(room, name, id, Some(actor)).await;
}

/// Deregister from the room, then tear the user down
async fn leave(
    room: RoomHandle,
    name: String,
    id: UserId,
    actor: Option<ActorHandle<UserCommand>>,
) {
    if let Err(e) = room.remove_user(&name, id).await {
        debug!("Could not remove {} from room: {}", name, e);
    }
    if let Some(actor) = actor {
        actor.stop();
    }
}
