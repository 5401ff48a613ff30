//! Receiver actor
//!
//! Greets every new connection, reads the candidate name and hands valid
//! names to the room. Each greeting runs as its own task so one silent
//! client never delays another; admissions come back through the
//! Receiver's mailbox and are decided one at a time.

use std::io;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use unicode_general_category::{get_general_category, GeneralCategory};

use crate::actor::{self, Actor, ActorHandle, Context};
use crate::config::ChatConfig;
use crate::connection::Connection;
use crate::error::{ActorError, ChatError, ConnError, Rejected};
use crate::room::RoomHandle;

/// Prompt written to every new connection
pub const WELCOME: &str = "Welcome to chat! What is your name?";

/// Longest accepted name, in bytes
pub const MAX_NAME_LEN: usize = 20;

/// Letters of any script, plus decimal digits
fn is_name_char(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::UppercaseLetter
            | GeneralCategory::LowercaseLetter
            | GeneralCategory::TitlecaseLetter
            | GeneralCategory::ModifierLetter
            | GeneralCategory::OtherLetter
            | GeneralCategory::DecimalNumber
    )
}

/// Check a candidate display name
///
/// Names must be non-empty, at most [`MAX_NAME_LEN`] bytes and made of
/// letters and decimal digits only. Superscripts, fractions and letter-like
/// numerals such as `Ⅻ` are refused.
pub fn validate_name(name: &str) -> Result<(), ChatError> {
    if name.is_empty() {
        return Err(ChatError::EmptyName);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ChatError::NameTooLong);
    }
    if !name.chars().all(is_name_char) {
        return Err(ChatError::InvalidCharacter);
    }
    Ok(())
}

/// Commands accepted by the Receiver actor
pub enum ReceiverCommand {
    /// A freshly accepted connection
    Intake(Connection),
    /// A greeted connection offering a name
    Admit {
        connection: Connection,
        name: String,
        reply: oneshot::Sender<Result<(), Rejected>>,
    },
    /// A greeted connection went away before naming itself
    Abandon,
}

/// The receiver actor state
pub struct Receiver {
    room: RoomHandle,
    handshake_timeout: Option<Duration>,
    /// Greeted connections still waiting to be admitted
    pending: usize,
}

impl Receiver {
    /// Create a receiver feeding `room`
    pub fn new(room: RoomHandle, config: &ChatConfig) -> Self {
        Self {
            room,
            handshake_timeout: config.handshake_timeout,
            pending: 0,
        }
    }

    /// Start the receiver loop
    pub fn spawn(room: RoomHandle, config: &ChatConfig) -> (ReceiverHandle, JoinHandle<()>) {
        let (actor, join) = actor::spawn(Self::new(room, config), config.mailbox_capacity);
        (ReceiverHandle { actor }, join)
    }

    async fn greet(&mut self, mut connection: Connection, ctx: &Context<ReceiverCommand>) {
        debug!("Checking connection for {}", connection.peer());

        if let Err(cause) = connection.write_line(WELCOME).await {
            warn!("{}", ConnError::new(connection.peer(), None, cause));
            connection.close().await;
            return;
        }
        let Some(actor) = ctx.myself() else {
            connection.close().await;
            return;
        };

        self.pending += 1;
        tokio::spawn(handshake(
            connection,
            ReceiverHandle { actor },
            self.handshake_timeout,
        ));
    }

    async fn admit(&mut self, connection: Connection, name: String) -> Result<(), Rejected> {
        self.pending = self.pending.saturating_sub(1);
        if let Err(error) = validate_name(&name) {
            return Err(Rejected::new(error, connection));
        }
        self.room.add_user(connection, name).await
    }
}

impl Actor for Receiver {
    type Message = ReceiverCommand;

    fn name(&self) -> String {
        "Receiver".to_string()
    }

    async fn handle(&mut self, cmd: ReceiverCommand, ctx: &Context<ReceiverCommand>) {
        match cmd {
            ReceiverCommand::Intake(connection) => {
                self.greet(connection, ctx).await;
            }
            ReceiverCommand::Admit {
                connection,
                name,
                reply,
            } => {
                let result = self.admit(connection, name).await;
                if let Err(Err(rejected)) = reply.send(result) {
                    if let Some(connection) = rejected.connection {
                        connection.close().await;
                    }
                }
            }
            ReceiverCommand::Abandon => {
                self.pending = self.pending.saturating_sub(1);
            }
        }
    }

    async fn stopped(&mut self) {
        info!("Receiver stopped with {} pending handshakes", self.pending);
    }
}

/// Cloneable address of the Receiver actor
#[derive(Debug, Clone)]
pub struct ReceiverHandle {
    actor: ActorHandle<ReceiverCommand>,
}

impl ReceiverHandle {
    /// Queue a new connection for greeting
    pub async fn intake(&self, connection: Connection) -> Result<(), ActorError> {
        self.actor.submit(ReceiverCommand::Intake(connection)).await
    }

    /// Stop the receiver; pending handshakes close their connections
    pub fn stop(&self) -> bool {
        self.actor.stop()
    }

    async fn admit(&self, connection: Connection, name: String) -> Result<(), Rejected> {
        self.actor
            .call(|reply| ReceiverCommand::Admit {
                connection,
                name,
                reply,
            })
            .await
            .unwrap_or_else(|_| Err(Rejected::lost(ChatError::Unavailable)))
    }
}

/// Wait for a name on a greeted connection and ask for admission
async fn handshake(mut connection: Connection, receiver: ReceiverHandle, limit: Option<Duration>) {
    let line = tokio::select! {
        biased;
        _ = receiver.actor.stopped() => None,
        line = read_name(&mut connection, limit) => Some(line),
    };

    let name = match line {
        Some(Ok(Some(name))) => name,
        None => {
            info!("External stop for {}", connection.peer());
            connection.close().await;
            return;
        }
        Some(Ok(None)) => {
            info!("{} closed connection", connection.peer());
            abandon(connection, &receiver).await;
            return;
        }
        Some(Err(cause)) => {
            info!("{}", ConnError::new(connection.peer(), None, cause));
            abandon(connection, &receiver).await;
            return;
        }
    };

    let peer = connection.peer().to_string();
    match receiver.admit(connection, name.clone()).await {
        Ok(()) => info!("Accepted {} as {}", peer, name),
        Err(rejected) => reject(rejected).await,
    }
}

async fn read_name(connection: &mut Connection, limit: Option<Duration>) -> io::Result<Option<String>> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, connection.read_line())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no name received in time"))?,
        None => connection.read_line().await,
    }
}

async fn abandon(connection: Connection, receiver: &ReceiverHandle) {
    connection.close().await;
    let _ = receiver.actor.submit(ReceiverCommand::Abandon).await;
}

/// Tell the client why it was refused, then hang up
async fn reject(rejected: Rejected) {
    let Some(mut connection) = rejected.connection else {
        return;
    };
    info!("Rejecting {}: {}", connection.peer(), rejected.error);
    if let Err(e) = connection.write_line(&rejected.error.to_string()).await {
        debug!("Could not deliver rejection to {}: {}", connection.peer(), e);
    }
    connection.close().await;
}
