//! `GameServer` builder and accept loop.
//!
//! Ties the layers together: socket → protocol → lobby → session. The
//! shared [`ServerState`] owns the registry, the live session handles,
//! and the matchmaking lobby; each accepted connection gets its own
//! handler task holding an `Arc` of it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

use fourline_lobby::{Lobby, LobbyConfig, MatchStarter};
use fourline_protocol::{Participant, PlayerName, ServerPayload, SessionId};
use fourline_registry::{ConnectionRegistry, SharedRegistry};
use fourline_session::{
    spawn_session, Collaborators, RetiredSender, Session, SessionConfig,
    SessionHandle,
};

use crate::collaborators::{AnalyticsSink, MemoryArchive, MemoryStandings};
use crate::handler::handle_connection;
use crate::ServerError;

/// Note shown to a player whose opponent is the automated one.
const BOT_GAME_NOTE: &str = "Playing against BOT";

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) registry: SharedRegistry,
    /// Live session actors by id. Entries leave through the retirement
    /// channel when an actor cleans up.
    pub(crate) sessions: Mutex<HashMap<SessionId, SessionHandle>>,
    pub(crate) lobby: Lobby,
    collaborators: Collaborators,
    session_config: SessionConfig,
    next_session_id: AtomicU64,
    retired_tx: RetiredSender,
}

impl ServerState {
    /// Creates a session between two seats, spawns its actor, records
    /// the assignments, and delivers `game_start` to the human seats.
    pub(crate) async fn launch_session(
        self: Arc<Self>,
        player1: PlayerName,
        player2: Participant,
    ) {
        let id = SessionId(self.next_session_id.fetch_add(1, Ordering::Relaxed));
        let session = Session::new(id, player1.clone(), player2.clone());
        let handle = spawn_session(
            session,
            self.session_config.clone(),
            Arc::clone(&self.registry),
            self.collaborators.clone(),
            self.retired_tx.clone(),
        );

        let view = match handle.view().await {
            Ok(view) => view,
            Err(e) => {
                error!(session_id = %id, error = %e, "session died before launch");
                return;
            }
        };
        self.sessions.lock().await.insert(id, handle);

        let message = view.vs_bot.then(|| BOT_GAME_NOTE.to_string());
        {
            let mut registry = self.registry.lock().await;
            registry.assign_session(player1.clone(), id);
            if let Some(name) = player2.name() {
                registry.assign_session(name.clone(), id);
            }

            registry.send_to(
                &player1,
                ServerPayload::GameStart {
                    game: view.clone(),
                    message: message.clone(),
                },
            );
            if let Some(name) = player2.name() {
                registry.send_to(
                    name,
                    ServerPayload::GameStart {
                        game: view,
                        message,
                    },
                );
            }
        }

        info!(session_id = %id, %player1, %player2, "game launched");
    }
}

/// Connects the lobby back to the server: a claimed pairing (or a
/// fallback firing) turns into a spawned session launch.
struct MatchLauncher {
    state: Weak<ServerState>,
}

impl MatchStarter for MatchLauncher {
    fn start_match(&self, first: PlayerName, second: Participant) {
        // Weak because the state owns the lobby which owns this.
        let Some(state) = self.state.upgrade() else {
            return;
        };
        tokio::spawn(state.launch_session(first, second));
    }
}

/// Builder for configuring and starting a [`GameServer`].
pub struct GameServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    lobby_config: LobbyConfig,
    collaborators: Option<Collaborators>,
}

impl GameServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            session_config: SessionConfig::default(),
            lobby_config: LobbyConfig::default(),
            collaborators: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session timing configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the matchmaking configuration.
    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.lobby_config = config;
        self
    }

    /// Replaces the default in-memory collaborators.
    pub fn collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = Some(collaborators);
        self
    }

    /// Binds the listener and assembles the server.
    pub async fn build(self) -> Result<GameServer, ServerError> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        info!(addr = %self.bind_addr, "listening");

        let collaborators = self.collaborators.unwrap_or_else(|| Collaborators {
            events: Arc::new(AnalyticsSink::new()),
            archive: Arc::new(MemoryArchive::new()),
            standings: Arc::new(MemoryStandings::new()),
        });

        let (retired_tx, mut retired_rx) = mpsc::unbounded_channel();

        // The lobby needs to launch sessions on the state that owns it,
        // so the launcher carries a weak back-reference.
        let state = Arc::new_cyclic(|weak: &Weak<ServerState>| {
            let launcher = Arc::new(MatchLauncher {
                state: weak.clone(),
            });
            ServerState {
                registry: Arc::new(Mutex::new(ConnectionRegistry::new())),
                sessions: Mutex::new(HashMap::new()),
                lobby: Lobby::new(self.lobby_config, launcher),
                collaborators,
                session_config: self.session_config,
                next_session_id: AtomicU64::new(1),
                retired_tx,
            }
        });

        // Retirement task: drop handles for actors that cleaned up.
        let retire_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(id) = retired_rx.recv().await {
                retire_state.sessions.lock().await.remove(&id);
                debug!(session_id = %id, "session retired");
            }
        });

        Ok(GameServer { listener, state })
    }
}

impl Default for GameServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Fourline server.
pub struct GameServer {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl GameServer {
    pub fn builder() -> GameServerBuilder {
        GameServerBuilder::new()
    }

    /// The local address the listener is bound to. Lets tests bind to
    /// port 0 and discover the assigned port.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop, spawning a handler task per connection.
    /// Runs until the process is terminated.
    pub async fn run(self) -> Result<(), ServerError> {
        info!("fourline server running");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(%addr, "accepted connection");
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state).await {
                            debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                }
            }
        }
    }
}
