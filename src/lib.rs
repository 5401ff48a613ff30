//! Line Chat Server Library
//!
//! A line-oriented chat room over any byte stream, built on a small actor
//! runtime over tokio.
//!
//! # Features
//! - Name handshake with validation
//! - Unique, case-sensitive display names
//! - Join / leave notices and a roster for newcomers
//! - Fan-out of chat lines to everyone but the author
//! - Supervised shutdown
//!
//! # Architecture
//! Every component is an actor with a bounded mailbox:
//! - `ChatRoom` owns the membership map and serializes joins, departures and broadcasts
//! - `Receiver` greets new connections and asks the room to admit them
//! - each `User` has a send-path actor plus a read task forwarding lines to the room
//! - `Director` starts and stops the room and the receiver together
//!
//! No locks guard shared state - all access goes through message passing.
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use line_chat::{ChatConfig, Director};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:9999").await.unwrap();
//!     let director = Director::start(ChatConfig::default());
//!
//!     while let Ok((stream, addr)) = listener.accept().await {
//!         let _ = director.intake(stream, addr.to_string()).await;
//!     }
//! }
//! ```

pub mod actor;
pub mod config;
pub mod connection;
pub mod director;
pub mod error;
pub mod message;
pub mod receiver;
pub mod room;
pub mod types;
pub mod user;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use actor::{Actor, ActorHandle, StopSignal, MAILBOX_CAPACITY};
pub use config::ChatConfig;
pub use connection::{Connection, Stream};
pub use director::Director;
pub use error::{ActorError, ChatError, ConnError, Rejected};
pub use message::Message;
pub use receiver::{validate_name, Receiver, ReceiverHandle, MAX_NAME_LEN, WELCOME};
pub use room::{ChatRoom, RoomHandle};
pub use types::UserId;
pub use user::User;
