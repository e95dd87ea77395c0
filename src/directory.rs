//! Server-wide registry: client ids, the lobby and the table of sessions.
//!
//! Locks are always taken in the order lobby, session table, single session.
//! The map of connected clients is a leaf lock and is never held while
//! waiting on another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::sync::Mutex;

use crate::config::{DisconnectPolicy, ServerConfig};
use crate::connection::ConnectionHandle;
use crate::lobby::LobbyRegistry;
use crate::protocol::{ClientId, ClientMessage, ServerMessage, SessionId, ShipSpec};
use crate::session::{FireOutcome, GameSession, RematchStep, SessionError};

pub type SharedSession = Arc<Mutex<GameSession>>;

/// Live and finished sessions, indexed by the players seated in them.
///
/// A finished session stays here until neither player points at it any
/// more, so a rematch can still be negotiated.
#[derive(Default)]
struct SessionTable {
    games: HashMap<SessionId, SharedSession>,
    by_player: HashMap<ClientId, SessionId>,
}

impl SessionTable {
    fn insert(&mut self, session: GameSession) {
        let id = session.id();
        let players = session.player_ids();
        self.games.insert(id, Arc::new(Mutex::new(session)));
        for player in players {
            if let Some(old) = self.by_player.insert(player, id) {
                self.prune(old);
            }
        }
    }

    fn lookup(&self, client: ClientId) -> Option<(SessionId, SharedSession)> {
        let id = *self.by_player.get(&client)?;
        let session = self.games.get(&id)?.clone();
        Some((id, session))
    }

    fn is_seated(&self, client: ClientId, session: SessionId) -> bool {
        self.by_player.get(&client) == Some(&session)
    }

    /// Unseat a client, dropping its session once nobody is left in it.
    fn detach(&mut self, client: ClientId) {
        if let Some(old) = self.by_player.remove(&client) {
            self.prune(old);
        }
    }

    fn prune(&mut self, id: SessionId) {
        if !self.by_player.values().any(|s| *s == id) && self.games.remove(&id).is_some() {
            debug!("{} removed", id);
        }
    }
}

pub struct ServerDirectory {
    config: ServerConfig,
    next_client_id: AtomicU64,
    next_session_id: AtomicU64,
    clients: Mutex<HashMap<ClientId, ConnectionHandle>>,
    lobby: Mutex<LobbyRegistry>,
    sessions: Mutex<SessionTable>,
}

impl ServerDirectory {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            next_client_id: AtomicU64::new(1),
            next_session_id: AtomicU64::new(1),
            clients: Mutex::new(HashMap::new()),
            lobby: Mutex::new(LobbyRegistry::new()),
            sessions: Mutex::new(SessionTable::default()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Next unused client id, starting at 1.
    pub fn allocate_client_id(&self) -> ClientId {
        ClientId(self.next_client_id.fetch_add(1, Ordering::Relaxed))
    }

    fn allocate_session_id(&self) -> SessionId {
        SessionId(self.next_session_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a fresh connection: `CLIENT_ID` to it, then the roster to
    /// everyone in the lobby.
    pub async fn connect(&self, handle: ConnectionHandle) {
        let id = handle.id();
        handle.send(ServerMessage::ClientId(id));
        self.clients.lock().await.insert(id, handle.clone());

        let mut lobby = self.lobby.lock().await;
        lobby.admit(handle);
        lobby.broadcast_roster();
        info!("client {} connected ({} in lobby)", id, lobby.len());
    }

    /// Decode one line from `id` and act on it.
    pub async fn dispatch(&self, id: ClientId, line: &str) {
        match ClientMessage::parse_line(line) {
            Ok(msg) => self.handle_message(id, msg).await,
            Err(e) => {
                warn!("client {}: {}", id, e);
                self.reply(id, ServerMessage::Error(e.to_string())).await;
            }
        }
    }

    pub async fn handle_message(&self, id: ClientId, msg: ClientMessage) {
        debug!("client {}: {}", id, msg.kind());
        match msg {
            ClientMessage::Invite { to } => self.invite(id, to).await,
            ClientMessage::InviteResponse { from, accepted } => {
                self.answer_invite(id, from, accepted).await
            }
            ClientMessage::CancelInvite => self.cancel_invite(id).await,
            ClientMessage::ShipsReady(specs) => self.submit_fleet(id, &specs).await,
            ClientMessage::Fire { row, col } => self.fire(id, row, col).await,
            ClientMessage::RematchRequest => self.request_rematch(id).await,
            ClientMessage::RematchResponse { from, accepted } => {
                self.answer_rematch(id, from, accepted).await
            }
        }
    }

    /// Clean up after a client that went away. Safe to call more than once.
    pub async fn disconnect(&self, id: ClientId) {
        if self.clients.lock().await.remove(&id).is_none() {
            return;
        }
        let mut lobby = self.lobby.lock().await;
        lobby.remove(id);

        let mut sessions = self.sessions.lock().await;
        if let Some((session_id, shared)) = sessions.lookup(id) {
            let mut game = shared.lock().await;
            let was_live = !game.is_over();
            let survivor = game
                .opponent(id)
                .filter(|h| sessions.is_seated(h.id(), session_id))
                .cloned();
            match survivor {
                Some(survivor) => {
                    game.player_left(id);
                    drop(game);
                    sessions.detach(survivor.id());
                    sessions.detach(id);
                    match self.config.on_opponent_disconnect {
                        DisconnectPolicy::Close if was_live => survivor.close(),
                        _ if survivor.is_closed() => {}
                        _ => {
                            lobby.readmit(survivor);
                        }
                    }
                }
                None => {
                    drop(game);
                    sessions.detach(id);
                }
            }
        }
        drop(sessions);

        lobby.broadcast_roster();
        info!("client {} disconnected ({} in lobby)", id, lobby.len());
    }

    /// Ids currently in the lobby.
    pub async fn lobby_roster(&self) -> Vec<ClientId> {
        self.lobby.lock().await.roster()
    }

    /// The session a client is seated in, live or finished.
    pub async fn session_of(&self, id: ClientId) -> Option<SessionId> {
        self.sessions.lock().await.by_player.get(&id).copied()
    }

    pub async fn session(&self, id: SessionId) -> Option<SharedSession> {
        self.sessions.lock().await.games.get(&id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.games.len()
    }

    async fn reply(&self, id: ClientId, msg: ServerMessage) {
        match self.clients.lock().await.get(&id) {
            Some(handle) => {
                handle.send(msg);
            }
            None => debug!("no connection for client {}, dropping {}", id, msg.kind()),
        }
    }

    async fn invite(&self, from: ClientId, to: ClientId) {
        let mut lobby = self.lobby.lock().await;
        if let Err(e) = lobby.invite(from, to) {
            debug!("client {} invite to {} refused: {}", from, to, e);
            self.reply(from, ServerMessage::InviteError(e.to_string())).await;
        }
    }

    async fn answer_invite(&self, responder: ClientId, inviter: ClientId, accepted: bool) {
        let mut lobby = self.lobby.lock().await;
        match lobby.respond_to_invite(responder, inviter, accepted) {
            Ok(Some((first, second))) => {
                let mut sessions = self.sessions.lock().await;
                let id = self.allocate_session_id();
                self.open_session(&mut sessions, id, first, second);
                drop(sessions);
                lobby.broadcast_roster();
            }
            Ok(None) => {}
            Err(e) => {
                self.reply(responder, ServerMessage::InviteError(e.to_string()))
                    .await
            }
        }
    }

    async fn cancel_invite(&self, id: ClientId) {
        let mut lobby = self.lobby.lock().await;
        if lobby.cancel_invite(id).is_none() {
            self.reply(id, ServerMessage::InviteError("no pending invitation".into()))
                .await;
        }
    }

    fn open_session(
        &self,
        sessions: &mut SessionTable,
        id: SessionId,
        first: ConnectionHandle,
        second: ConnectionHandle,
    ) {
        let rng = match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(id.0)),
            None => SmallRng::from_rng(&mut rand::rng()),
        };
        let session = GameSession::new(id, first, second, rng);
        session.start();
        sessions.insert(session);
    }

    async fn lookup(&self, id: ClientId) -> Option<(SessionId, SharedSession)> {
        let found = self.sessions.lock().await.lookup(id);
        if found.is_none() {
            self.reply(id, ServerMessage::Error("not in a game".into())).await;
        }
        found
    }

    async fn submit_fleet(&self, id: ClientId, specs: &[ShipSpec]) {
        let Some((_, shared)) = self.lookup(id).await else {
            return;
        };
        let result = shared.lock().await.submit_fleet(id, specs);
        if let Err(e) = result {
            warn!("client {} fleet rejected: {}", id, e);
            self.reply(id, ServerMessage::Error(e.to_string())).await;
        }
    }

    /// Resolve a shot.
    ///
    /// The lobby lock is held across the shot so that a finishing shot puts
    /// both players back in the lobby before either can act on `GAME_OVER`.
    /// The finished session stays registered for rematch negotiation.
    async fn fire(&self, id: ClientId, row: usize, col: usize) {
        let mut lobby = self.lobby.lock().await;
        let sessions = self.sessions.lock().await;
        let Some((session_id, shared)) = sessions.lookup(id) else {
            drop(sessions);
            self.reply(id, ServerMessage::Error("not in a game".into())).await;
            return;
        };
        let mut game = shared.lock().await;
        match game.fire(id, row, col) {
            Ok(FireOutcome::Continue { .. }) => {}
            Ok(FireOutcome::GameOver { .. }) => {
                for handle in game.handles() {
                    if sessions.is_seated(handle.id(), session_id) && !handle.is_closed() {
                        lobby.readmit(handle);
                    }
                }
                lobby.broadcast_roster();
            }
            Err(e) => {
                drop(game);
                drop(sessions);
                debug!("client {} shot refused: {}", id, e);
                self.reply(id, ServerMessage::Error(e.to_string())).await;
            }
        }
    }

    async fn request_rematch(&self, id: ClientId) {
        let mut lobby = self.lobby.lock().await;
        let mut sessions = self.sessions.lock().await;
        let Some((session_id, shared)) = sessions.lookup(id) else {
            drop(sessions);
            self.reply(id, ServerMessage::RematchRejected("no finished game".into()))
                .await;
            return;
        };
        let mut game = shared.lock().await;
        if !game.is_over() {
            let e = SessionError::WrongPhase(game.phase());
            drop(game);
            drop(sessions);
            self.reply(id, ServerMessage::Error(e.to_string())).await;
            return;
        }
        let Some(opponent) = game.opponent(id).map(ConnectionHandle::id) else {
            return;
        };
        let available = |client: ClientId| {
            lobby.is_available(client) && sessions.is_seated(client, session_id)
        };
        if !available(id) || !available(opponent) {
            game.clear_rematch();
            drop(game);
            drop(sessions);
            self.reply(
                id,
                ServerMessage::RematchRejected("opponent is not available".into()),
            )
            .await;
            return;
        }

        match game.request_rematch(id) {
            Ok(RematchStep::Offered { .. }) => {}
            Ok(RematchStep::Agreed) => {
                let [first, second] = game.handles();
                drop(game);
                self.start_rematch(&mut lobby, &mut sessions, first, second);
            }
            Err(e) => {
                drop(game);
                drop(sessions);
                self.reply(id, ServerMessage::Error(e.to_string())).await;
            }
        }
    }

    async fn answer_rematch(&self, id: ClientId, requester: ClientId, accepted: bool) {
        let mut lobby = self.lobby.lock().await;
        let mut sessions = self.sessions.lock().await;
        let Some((session_id, shared)) = sessions.lookup(id) else {
            drop(sessions);
            self.reply(id, ServerMessage::Error("no rematch request to answer".into()))
                .await;
            return;
        };
        let mut game = shared.lock().await;
        match game.respond_to_rematch(id, requester, accepted) {
            Ok(false) => {}
            Ok(true) => {
                let available = |client: ClientId| {
                    lobby.is_available(client) && sessions.is_seated(client, session_id)
                };
                let handles = game.handles();
                drop(game);
                if available(id) && available(requester) {
                    let [first, second] = handles;
                    self.start_rematch(&mut lobby, &mut sessions, first, second);
                } else {
                    for handle in handles {
                        handle.send(ServerMessage::RematchRejected(
                            "opponent is not available".into(),
                        ));
                    }
                }
            }
            Err(e) => {
                drop(game);
                drop(sessions);
                self.reply(id, ServerMessage::Error(e.to_string())).await;
            }
        }
    }

    fn start_rematch(
        &self,
        lobby: &mut LobbyRegistry,
        sessions: &mut SessionTable,
        first: ConnectionHandle,
        second: ConnectionHandle,
    ) {
        let id = self.allocate_session_id();
        for handle in [&first, &second] {
            lobby.remove(handle.id());
            handle.send(ServerMessage::RematchAccepted { session: id });
        }
        info!("rematch between {} and {} as {}", first.id(), second.id(), id);
        self.open_session(sessions, id, first, second);
        lobby.broadcast_roster();
    }
}
