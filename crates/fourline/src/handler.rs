//! Per-connection handler: socket upgrade, payload dispatch, teardown.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler, plus a writer task that pumps the connection's outbound
//! payload channel into the socket. The reader half decodes client
//! payloads and dispatches them.
//!
//! Locks are scoped tightly: the registry or session-table lock is
//! taken for the lookup, dropped, and only then is the session actor
//! awaited. Holding either lock across an actor reply would deadlock
//! against an actor trying to broadcast.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use fourline_lobby::JoinOutcome;
use fourline_protocol::{
    ClientPayload, Codec, JsonCodec, PlayerName, ServerPayload, SessionId,
};
use fourline_registry::PayloadSender;

use crate::server::ServerState;
use crate::ServerError;

const WAITING_NOTE: &str = "Waiting for an opponent...";
const ERR_INVALID_PAYLOAD: &str = "Invalid message format";
const ERR_NO_IDENTITY: &str = "Join with a username first";
const ERR_NOT_IN_GAME: &str = "Not in a game";
const ERR_GAME_NOT_FOUND: &str = "Game not found";
const ERR_RESERVED_NAME: &str = "That username is not allowed";

/// Usernames that collide with wire sentinels and can never be claimed.
fn is_reserved(name: &PlayerName) -> bool {
    matches!(name.as_str(), "" | "BOT" | "draw")
}

/// Handles a single connection from upgrade to close.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    state: Arc<ServerState>,
) -> Result<(), ServerError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut reader) = ws.split();
    let codec = JsonCodec;

    // Writer task: everything the server says to this client flows
    // through one channel, whether it comes from this handler, a
    // session actor, or a broadcast.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerPayload>();
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            let text = match codec.encode(&payload).map(String::from_utf8) {
                Ok(Ok(text)) => text,
                _ => {
                    warn!("dropping unencodable payload");
                    continue;
                }
            };
            if sink.send(Message::text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // The username this socket authenticated as, once it joins.
    let mut identity: Option<PlayerName> = None;

    while let Some(message) = reader.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "socket error, closing");
                break;
            }
        };
        let data = match &message {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(data) => data.as_ref(),
            Message::Close(_) => break,
            _ => continue,
        };

        let payload: ClientPayload = match codec.decode(data) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "undecodable client payload");
                send(&tx, error_payload(ERR_INVALID_PAYLOAD));
                continue;
            }
        };

        match payload {
            ClientPayload::Join { username } => {
                handle_join(&state, &tx, &mut identity, username).await;
            }
            ClientPayload::Move { column } => {
                handle_move(&state, &tx, identity.as_ref(), column).await;
            }
            ClientPayload::Reconnect {
                username,
                session_id,
            } => {
                handle_reconnect(&state, &tx, &mut identity, username, session_id)
                    .await;
            }
        }
    }

    teardown(&state, identity).await;
    drop(tx);
    let _ = writer.await;
    Ok(())
}

/// Registers the connection under a username and enters matchmaking.
async fn handle_join(
    state: &Arc<ServerState>,
    tx: &PayloadSender,
    identity: &mut Option<PlayerName>,
    username: PlayerName,
) {
    if is_reserved(&username) {
        send(tx, error_payload(ERR_RESERVED_NAME));
        return;
    }

    info!(player = %username, "join");
    *identity = Some(username.clone());
    state
        .registry
        .lock()
        .await
        .connect(username.clone(), tx.clone());
    broadcast_online(state).await;

    match state.lobby.join(username).await {
        JoinOutcome::Paired { .. } => {
            // The launch task delivers game_start to both sides.
        }
        JoinOutcome::Queued => {
            send(
                tx,
                ServerPayload::Waiting {
                    message: WAITING_NOTE.to_string(),
                },
            );
        }
    }
}

/// Routes a move to the player's session actor.
async fn handle_move(
    state: &Arc<ServerState>,
    tx: &PayloadSender,
    identity: Option<&PlayerName>,
    column: usize,
) {
    let Some(player) = identity else {
        send(tx, error_payload(ERR_NO_IDENTITY));
        return;
    };

    let session_id = { state.registry.lock().await.session_of(player) };
    let Some(session_id) = session_id else {
        send(tx, error_payload(ERR_NOT_IN_GAME));
        return;
    };

    let handle = { state.sessions.lock().await.get(&session_id).cloned() };
    let Some(handle) = handle else {
        send(tx, error_payload(ERR_GAME_NOT_FOUND));
        return;
    };

    if let Err(e) = handle.make_move(player.clone(), column).await {
        send(tx, error_payload(&e.to_string()));
    }
}

/// Re-attaches a returning player to their session.
async fn handle_reconnect(
    state: &Arc<ServerState>,
    tx: &PayloadSender,
    identity: &mut Option<PlayerName>,
    username: PlayerName,
    session_id: SessionId,
) {
    if is_reserved(&username) {
        send(tx, error_payload(ERR_RESERVED_NAME));
        return;
    }

    info!(player = %username, %session_id, "reconnect");
    *identity = Some(username.clone());
    state
        .registry
        .lock()
        .await
        .connect(username.clone(), tx.clone());
    broadcast_online(state).await;

    let handle = { state.sessions.lock().await.get(&session_id).cloned() };
    let Some(handle) = handle else {
        send(tx, error_payload(ERR_GAME_NOT_FOUND));
        return;
    };

    match handle.reconnect(username.clone()).await {
        Ok(game) => {
            state
                .registry
                .lock()
                .await
                .assign_session(username, session_id);
            send(tx, ServerPayload::Reconnected { game });
        }
        Err(e) => send(tx, error_payload(&e.to_string())),
    }
}

/// Close path: mark offline, leave the queue, start the session's
/// grace window, and refresh presence.
async fn teardown(state: &Arc<ServerState>, identity: Option<PlayerName>) {
    let Some(player) = identity else {
        return;
    };
    info!(%player, "connection closed");

    let session_id = {
        let mut registry = state.registry.lock().await;
        let session_id = registry.session_of(&player);
        registry.disconnect(&player);
        session_id
    };
    state.lobby.leave(&player).await;

    if let Some(session_id) = session_id {
        let handle = { state.sessions.lock().await.get(&session_id).cloned() };
        if let Some(handle) = handle {
            handle.disconnect(player.clone()).await;
        }
    }

    broadcast_online(state).await;
}

/// Sends the current sorted roster to every connected player.
async fn broadcast_online(state: &Arc<ServerState>) {
    let registry = state.registry.lock().await;
    let players = registry.online_players();
    registry.broadcast(ServerPayload::OnlinePlayers { players });
}

fn error_payload(message: &str) -> ServerPayload {
    ServerPayload::Error {
        message: message.to_string(),
    }
}

fn send(tx: &PayloadSender, payload: ServerPayload) {
    let _ = tx.send(payload);
}
