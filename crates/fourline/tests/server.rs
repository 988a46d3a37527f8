//! End-to-end tests over real WebSocket connections.
//!
//! Each test starts its own server on an ephemeral port with timing
//! shortened through the builder, then drives it with plain
//! `tokio-tungstenite` clients. Presence broadcasts (`online_players`)
//! arrive interleaved with everything else, so the receive helper
//! skips them.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use fourline::GameServer;
use fourline_lobby::LobbyConfig;
use fourline_protocol::{
    ClientPayload, Outcome, Participant, PlayerName, ServerPayload,
    SessionStatus,
};
use fourline_session::SessionConfig;

// =========================================================================
// Helpers
// =========================================================================

fn quick_session() -> SessionConfig {
    SessionConfig {
        grace: Duration::from_millis(300),
        think_delay: Duration::from_millis(50),
        cleanup_delay: Duration::from_millis(100),
    }
}

/// Long enough that no human-vs-human test races the bot fallback.
fn patient_lobby() -> LobbyConfig {
    LobbyConfig {
        fallback_delay: Duration::from_secs(30),
    }
}

async fn start_server(session: SessionConfig, lobby: LobbyConfig) -> SocketAddr {
    let server = GameServer::builder()
        .bind("127.0.0.1:0")
        .session_config(session)
        .lobby_config(lobby)
        .build()
        .await
        .expect("bind server");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.run());
    addr
}

struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = connect_async(format!("ws://{addr}"))
            .await
            .expect("connect");
        Self { ws }
    }

    async fn send(&mut self, payload: ClientPayload) {
        let text = serde_json::to_string(&payload).expect("encode");
        self.ws.send(Message::text(text)).await.expect("send");
    }

    async fn join(&mut self, name: &str) {
        self.send(ClientPayload::Join {
            username: PlayerName::from(name),
        })
        .await;
    }

    async fn place(&mut self, column: usize) {
        self.send(ClientPayload::Move { column }).await;
    }

    /// Next payload that isn't a presence broadcast.
    async fn recv(&mut self) -> ServerPayload {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(5), self.ws.next())
                .await
                .expect("timed out waiting for payload")
                .expect("socket closed")
                .expect("socket error");
            let text = match message {
                Message::Text(text) => text.to_string(),
                Message::Binary(data) => {
                    String::from_utf8(data.to_vec()).expect("utf8")
                }
                _ => continue,
            };
            let payload: ServerPayload =
                serde_json::from_str(&text).expect("decode payload");
            if matches!(payload, ServerPayload::OnlinePlayers { .. }) {
                continue;
            }
            return payload;
        }
    }

    async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

fn expect_move(payload: ServerPayload) -> (Participant, usize, bool, Option<Outcome>) {
    match payload {
        ServerPayload::Move {
            player,
            column,
            game_over,
            winner,
            ..
        } => (player, column, game_over, winner),
        other => panic!("expected move, got {other:?}"),
    }
}

fn human(name: &str) -> Participant {
    Participant::Player(PlayerName::from(name))
}

// =========================================================================
// Matchmaking
// =========================================================================

#[tokio::test]
async fn test_pairing_delivers_game_start_to_both() {
    let addr = start_server(quick_session(), patient_lobby()).await;

    let mut alice = Client::connect(addr).await;
    alice.join("alice").await;
    assert!(matches!(alice.recv().await, ServerPayload::Waiting { .. }));

    let mut bob = Client::connect(addr).await;
    bob.join("bob").await;

    let ServerPayload::GameStart { game, message } = alice.recv().await else {
        panic!("expected game_start");
    };
    assert_eq!(game.player1, PlayerName::from("alice"));
    assert_eq!(game.player2, human("bob"));
    assert_eq!(game.status, SessionStatus::Active);
    assert_eq!(game.current_player, human("alice"));
    assert!(!game.vs_bot);
    assert_eq!(message, None);

    let ServerPayload::GameStart { game, .. } = bob.recv().await else {
        panic!("expected game_start");
    };
    assert_eq!(game.player2, human("bob"));
}

#[tokio::test]
async fn test_lone_player_falls_back_to_bot_game() {
    let addr = start_server(
        quick_session(),
        LobbyConfig {
            fallback_delay: Duration::from_millis(200),
        },
    )
    .await;

    let mut carol = Client::connect(addr).await;
    carol.join("carol").await;
    assert!(matches!(carol.recv().await, ServerPayload::Waiting { .. }));

    let ServerPayload::GameStart { game, message } = carol.recv().await else {
        panic!("expected game_start");
    };
    assert!(game.vs_bot);
    assert_eq!(game.player2, Participant::Bot);
    assert_eq!(message.as_deref(), Some("Playing against BOT"));

    // First exchange: the human opens, the bot takes the center.
    carol.place(0).await;
    let (player, column, _, _) = expect_move(carol.recv().await);
    assert_eq!(player, human("carol"));
    assert_eq!(column, 0);

    let (player, column, game_over, _) = expect_move(carol.recv().await);
    assert_eq!(player, Participant::Bot);
    assert_eq!(column, 3);
    assert!(!game_over);
}

// =========================================================================
// Gameplay
// =========================================================================

#[tokio::test]
async fn test_vertical_win_over_websocket() {
    let addr = start_server(quick_session(), patient_lobby()).await;

    let mut alice = Client::connect(addr).await;
    alice.join("alice").await;
    alice.recv().await; // waiting
    let mut bob = Client::connect(addr).await;
    bob.join("bob").await;
    alice.recv().await; // game_start
    bob.recv().await; // game_start

    // alice stacks column 3, bob column 2.
    for _ in 0..3 {
        alice.place(3).await;
        expect_move(alice.recv().await);
        expect_move(bob.recv().await);

        bob.place(2).await;
        expect_move(alice.recv().await);
        expect_move(bob.recv().await);
    }

    alice.place(3).await;
    for client in [&mut alice, &mut bob] {
        let (player, column, game_over, winner) = expect_move(client.recv().await);
        assert_eq!(player, human("alice"));
        assert_eq!(column, 3);
        assert!(game_over);
        assert_eq!(winner, Some(Outcome::Winner(human("alice"))));
    }
}

#[tokio::test]
async fn test_out_of_turn_move_is_rejected() {
    let addr = start_server(quick_session(), patient_lobby()).await;

    let mut alice = Client::connect(addr).await;
    alice.join("alice").await;
    alice.recv().await; // waiting
    let mut bob = Client::connect(addr).await;
    bob.join("bob").await;
    alice.recv().await;
    bob.recv().await;

    // alice moves first; bob is early.
    bob.place(0).await;
    let ServerPayload::Error { message } = bob.recv().await else {
        panic!("expected error");
    };
    assert_eq!(message, "not your turn");
}

#[tokio::test]
async fn test_move_before_joining_is_rejected() {
    let addr = start_server(quick_session(), patient_lobby()).await;

    let mut stray = Client::connect(addr).await;
    stray.place(3).await;
    let ServerPayload::Error { message } = stray.recv().await else {
        panic!("expected error");
    };
    assert_eq!(message, "Join with a username first");
}

#[tokio::test]
async fn test_malformed_payload_reports_error() {
    let addr = start_server(quick_session(), patient_lobby()).await;

    let mut client = Client::connect(addr).await;
    client
        .ws
        .send(Message::text("this is not json"))
        .await
        .expect("send");
    let ServerPayload::Error { message } = client.recv().await else {
        panic!("expected error");
    };
    assert_eq!(message, "Invalid message format");
}

// =========================================================================
// Disconnects
// =========================================================================

#[tokio::test]
async fn test_disconnect_forfeits_after_grace() {
    let addr = start_server(quick_session(), patient_lobby()).await;

    let mut alice = Client::connect(addr).await;
    alice.join("alice").await;
    alice.recv().await; // waiting
    let mut bob = Client::connect(addr).await;
    bob.join("bob").await;
    alice.recv().await;
    bob.recv().await;

    bob.close().await;

    assert_eq!(
        alice.recv().await,
        ServerPayload::OpponentDisconnected {
            player: PlayerName::from("bob")
        }
    );
    assert_eq!(
        alice.recv().await,
        ServerPayload::GameOver {
            winner: Outcome::Winner(human("alice")),
            reason: "forfeit".into(),
        }
    );
}

#[tokio::test]
async fn test_reconnect_within_grace_resumes_game() {
    let addr = start_server(
        SessionConfig {
            grace: Duration::from_secs(5),
            ..quick_session()
        },
        patient_lobby(),
    )
    .await;

    let mut alice = Client::connect(addr).await;
    alice.join("alice").await;
    alice.recv().await; // waiting
    let mut bob = Client::connect(addr).await;
    bob.join("bob").await;
    alice.recv().await;
    let ServerPayload::GameStart { game, .. } = bob.recv().await else {
        panic!("expected game_start");
    };
    let session_id = game.session_id;

    // One move so the snapshot after reconnecting is non-trivial.
    alice.place(6).await;
    expect_move(alice.recv().await);
    expect_move(bob.recv().await);

    bob.close().await;
    assert_eq!(
        alice.recv().await,
        ServerPayload::OpponentDisconnected {
            player: PlayerName::from("bob")
        }
    );

    let mut bob = Client::connect(addr).await;
    bob.send(ClientPayload::Reconnect {
        username: PlayerName::from("bob"),
        session_id,
    })
    .await;

    let ServerPayload::Reconnected { game } = bob.recv().await else {
        panic!("expected reconnected");
    };
    assert_eq!(game.status, SessionStatus::Active);
    assert_eq!(game.current_player, human("bob"));
    assert_eq!(game.board[5][6], fourline_game::Cell::X);

    assert_eq!(
        alice.recv().await,
        ServerPayload::OpponentReconnected {
            player: PlayerName::from("bob")
        }
    );

    // Play continues where it left off.
    bob.place(0).await;
    let (player, column, _, _) = expect_move(alice.recv().await);
    assert_eq!(player, human("bob"));
    assert_eq!(column, 0);
}

#[tokio::test]
async fn test_reconnect_to_unknown_game_reports_error() {
    let addr = start_server(quick_session(), patient_lobby()).await;

    let mut client = Client::connect(addr).await;
    client
        .send(ClientPayload::Reconnect {
            username: PlayerName::from("zed"),
            session_id: fourline_protocol::SessionId(999),
        })
        .await;
    let ServerPayload::Error { message } = client.recv().await else {
        panic!("expected error");
    };
    assert_eq!(message, "Game not found");
}
