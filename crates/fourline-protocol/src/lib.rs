//! Wire protocol for Fourline.
//!
//! This crate defines the language clients and the server speak:
//!
//! - **Identity** ([`PlayerName`], [`SessionId`], [`Participant`]) — who
//!   is playing and where.
//! - **Payloads** ([`ClientPayload`], [`ServerPayload`]) — every message
//!   that travels over the socket, internally tagged on `"type"`.
//! - **Views** ([`SessionView`], [`Outcome`], [`SessionStatus`]) — the
//!   session snapshot embedded in `game_start` and `reconnected`.
//! - **Codec** ([`Codec`], [`JsonCodec`]) — how payloads become bytes.
//!
//! The protocol layer sits between the socket and the session actor. It
//! knows nothing about connections, queues, or turn order — only shapes.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientPayload, Outcome, Participant, PlayerName, ServerPayload, SessionId,
    SessionStatus, SessionView,
};
