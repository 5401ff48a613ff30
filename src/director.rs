//! Director
//!
//! Starts the ChatRoom and the Receiver together and stops them together.
//! It is also the whole surface the outer process sees: hand in accepted
//! streams with [`Director::intake`], end everything with [`Director::stop`].

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ChatConfig;
use crate::connection::{Connection, Stream};
use crate::error::ActorError;
use crate::receiver::{Receiver, ReceiverHandle};
use crate::room::{ChatRoom, RoomHandle};

/// Supervisor owning the room and the receiver
#[derive(Debug)]
pub struct Director {
    room: RoomHandle,
    receiver: ReceiverHandle,
    loops: Vec<JoinHandle<()>>,
}

impl Director {
    /// Start the chat core
    pub fn start(config: ChatConfig) -> Self {
        let (room, room_loop) = ChatRoom::spawn(config.clone());
        let (receiver, receiver_loop) = Receiver::spawn(room.clone(), &config);
        info!("Chat core started");

        Self {
            room,
            receiver,
            loops: vec![room_loop, receiver_loop],
        }
    }

    /// Hand a freshly accepted stream to the receiver
    ///
    /// Waits while the receiver's mailbox is full. Fails after shutdown, in
    /// which case the stream is dropped.
    pub async fn intake<S: Stream>(&self, stream: S, peer: impl Into<String>) -> Result<(), ActorError> {
        let connection = Connection::new(stream, peer);
        info!("Accepted connection from {}", connection.peer());
        self.receiver.intake(connection).await
    }

    /// The room, for diagnostics
    pub fn room(&self) -> &RoomHandle {
        &self.room
    }

    /// Stop the room (and with it every user) and the receiver
    ///
    /// Idempotent. Does not wait for in-flight work.
    pub fn stop(&self) {
        let room = self.room.stop();
        let receiver = self.receiver.stop();
        if room || receiver {
            info!("Chat core stopping");
        }
    }

    /// Wait for the room and receiver loops to exit
    pub async fn wait(self) {
        for handle in self.loops {
            if let Err(e) = handle.await {
                warn!("Actor loop ended abnormally: {}", e);
            }
        }
    }
}
