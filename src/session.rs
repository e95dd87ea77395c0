//! A single match between two clients.
//!
//! All state changes go through `&mut GameSession`, so the directory's
//! per-session mutex is what serializes shots: the turn check, the board
//! update and the turn flip happen in one critical section.

use std::fmt;

use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::Rng;

use crate::board::Board;
use crate::common::BoardError;
use crate::config::kind_for_length;
use crate::connection::ConnectionHandle;
use crate::protocol::{ClientId, ServerMessage, SessionId, ShipSpec, ShotReport, Strike, Verdict};
use crate::ship::Ship;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    AwaitingPlacement,
    InProgress,
    GameOver,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::AwaitingPlacement => "ship placement",
            SessionPhase::InProgress => "battle",
            SessionPhase::GameOver => "game over",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("not allowed during {0}")]
    WrongPhase(SessionPhase),
    #[error("client {0} is not playing in this game")]
    NotAPlayer(ClientId),
    #[error("not your turn")]
    NotYourTurn,
    #[error("ships already submitted")]
    FleetAlreadySubmitted,
    #[error("no valid ships in submission")]
    EmptyFleet,
    #[error("cell {row}{col} was already fired at")]
    AlreadyShot { row: usize, col: usize },
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error("no rematch request to answer")]
    NoRematchPending,
    #[error("rematch already requested")]
    RematchAlreadyRequested,
}

/// What a shot did to the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// The turn passed to `next`.
    Continue { next: ClientId },
    GameOver { winner: ClientId, loser: ClientId },
}

/// Progress of a rematch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RematchStep {
    /// The opponent was sent `REMATCH_OFFER`.
    Offered { to: ClientId },
    /// Both players asked; treat as accepted.
    Agreed,
}

struct Seat {
    handle: ConnectionHandle,
    board: Board,
    ready: bool,
}

impl Seat {
    fn new(handle: ConnectionHandle) -> Self {
        Seat {
            handle,
            board: Board::new(),
            ready: false,
        }
    }

    fn id(&self) -> ClientId {
        self.handle.id()
    }

    fn fleet(&self) -> Vec<ShipSpec> {
        self.board.ships().map(ShipSpec::from).collect()
    }
}

pub struct GameSession {
    id: SessionId,
    seats: [Seat; 2],
    phase: SessionPhase,
    current: Option<ClientId>,
    winner: Option<ClientId>,
    rematch_requested_by: Option<ClientId>,
    rng: SmallRng,
}

impl GameSession {
    /// Seat `first` as player 1 and `second` as player 2. Nothing is sent
    /// until [`GameSession::start`].
    pub fn new(
        id: SessionId,
        first: ConnectionHandle,
        second: ConnectionHandle,
        rng: SmallRng,
    ) -> Self {
        GameSession {
            id,
            seats: [Seat::new(first), Seat::new(second)],
            phase: SessionPhase::AwaitingPlacement,
            current: None,
            winner: None,
            rematch_requested_by: None,
            rng,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_over(&self) -> bool {
        self.phase == SessionPhase::GameOver
    }

    /// Whose turn it is; `None` outside of battle.
    pub fn current_player(&self) -> Option<ClientId> {
        self.current
    }

    pub fn winner(&self) -> Option<ClientId> {
        self.winner
    }

    pub fn rematch_requested_by(&self) -> Option<ClientId> {
        self.rematch_requested_by
    }

    pub fn player_ids(&self) -> [ClientId; 2] {
        [self.seats[0].id(), self.seats[1].id()]
    }

    pub fn handles(&self) -> [ConnectionHandle; 2] {
        [self.seats[0].handle.clone(), self.seats[1].handle.clone()]
    }

    pub fn has_player(&self, id: ClientId) -> bool {
        self.seat_index(id).is_ok()
    }

    /// 1 or 2.
    pub fn player_number(&self, id: ClientId) -> Option<u8> {
        self.seat_index(id).ok().map(|i| i as u8 + 1)
    }

    pub fn opponent(&self, id: ClientId) -> Option<&ConnectionHandle> {
        let idx = self.seat_index(id).ok()?;
        Some(&self.seats[1 - idx].handle)
    }

    pub fn board(&self, id: ClientId) -> Option<&Board> {
        let idx = self.seat_index(id).ok()?;
        Some(&self.seats[idx].board)
    }

    pub fn is_ready(&self, id: ClientId) -> bool {
        self.seat_index(id)
            .map(|i| self.seats[i].ready)
            .unwrap_or(false)
    }

    /// Announce the match with `GAME_STARTED` to both players.
    pub fn start(&self) {
        for (i, seat) in self.seats.iter().enumerate() {
            seat.handle.send(ServerMessage::GameStarted {
                session: self.id,
                player_number: i as u8 + 1,
            });
        }
        info!(
            "{} started: {} vs {}",
            self.id,
            self.seats[0].id(),
            self.seats[1].id()
        );
    }

    /// Place a player's fleet.
    ///
    /// Entries that cannot be placed are skipped. The submission counts only
    /// if at least one ship lands; the number placed is returned. Once both
    /// players are ready the battle begins.
    pub fn submit_fleet(
        &mut self,
        client: ClientId,
        specs: &[ShipSpec],
    ) -> Result<usize, SessionError> {
        self.expect_phase(SessionPhase::AwaitingPlacement)?;
        let idx = self.seat_index(client)?;
        let seat = &mut self.seats[idx];
        if seat.ready {
            return Err(SessionError::FleetAlreadySubmitted);
        }

        seat.board.reset();
        for spec in specs {
            let placed =
                build_ship(&seat.board, spec).and_then(|ship| seat.board.place_ship(ship));
            if let Err(e) = placed {
                warn!("{}: client {} ship {:?} skipped: {}", self.id, client, spec, e);
            }
        }
        let placed = seat.board.ship_count();
        if placed == 0 {
            return Err(SessionError::EmptyFleet);
        }
        seat.ready = true;
        info!("{}: client {} placed {} ships", self.id, client, placed);

        if self.seats.iter().all(|s| s.ready) {
            self.begin_battle();
        } else {
            self.seats[idx].handle.send(ServerMessage::WaitOpponent);
        }
        Ok(placed)
    }

    fn begin_battle(&mut self) {
        self.phase = SessionPhase::InProgress;
        let first = if self.rng.random::<bool>() { 0 } else { 1 };
        self.current = Some(self.seats[first].id());

        for (i, seat) in self.seats.iter().enumerate() {
            let other = &self.seats[1 - i];
            seat.handle.send(ServerMessage::MyShips(seat.fleet()));
            seat.handle.send(ServerMessage::OpponentShips(other.fleet()));
            seat.handle.send(ServerMessage::GameReady);
            seat.handle.send(if i == first {
                ServerMessage::YourTurn
            } else {
                ServerMessage::WaitTurn
            });
        }
        info!("{}: battle begins, client {} fires first", self.id, self.seats[first].id());
    }

    /// Fire at the opponent's board.
    ///
    /// The turn passes to the other player after any shot that lands on a
    /// fresh cell, hit or miss. Rejected shots leave the turn unchanged.
    pub fn fire(
        &mut self,
        shooter: ClientId,
        row: usize,
        col: usize,
    ) -> Result<FireOutcome, SessionError> {
        self.expect_phase(SessionPhase::InProgress)?;
        let shooter_idx = self.seat_index(shooter)?;
        if self.current != Some(shooter) {
            return Err(SessionError::NotYourTurn);
        }
        let target_idx = 1 - shooter_idx;

        let outcome = self.seats[target_idx].board.resolve_shot(row, col)?;
        let strike = Strike::from_outcome(outcome).ok_or(SessionError::AlreadyShot { row, col })?;
        let report = ShotReport { row, col, strike };
        let target = self.seats[target_idx].id();
        debug!("{}: {} fired at {}: {:?}", self.id, shooter, report.position(), strike);

        self.seats[shooter_idx].handle.send(ServerMessage::ShotResult(report));
        self.seats[target_idx].handle.send(ServerMessage::OpponentShot(report));

        if self.seats[target_idx].board.all_ships_sunk() {
            self.phase = SessionPhase::GameOver;
            self.current = None;
            self.winner = Some(shooter);
            self.seats[shooter_idx].handle.send(ServerMessage::GameOver(Verdict::Win));
            self.seats[target_idx].handle.send(ServerMessage::GameOver(Verdict::Lose));
            info!("{}: client {} wins against client {}", self.id, shooter, target);
            return Ok(FireOutcome::GameOver {
                winner: shooter,
                loser: target,
            });
        }

        self.current = Some(target);
        self.seats[target_idx].handle.send(ServerMessage::YourTurn);
        self.seats[shooter_idx].handle.send(ServerMessage::WaitTurn);
        Ok(FireOutcome::Continue { next: target })
    }

    /// Ask for a rematch after the game ended.
    ///
    /// The caller is responsible for checking that both players are back in
    /// the lobby and free.
    pub fn request_rematch(&mut self, client: ClientId) -> Result<RematchStep, SessionError> {
        self.expect_phase(SessionPhase::GameOver)?;
        let idx = self.seat_index(client)?;
        match self.rematch_requested_by {
            Some(by) if by == client => Err(SessionError::RematchAlreadyRequested),
            Some(_) => {
                self.rematch_requested_by = None;
                Ok(RematchStep::Agreed)
            }
            None => {
                self.rematch_requested_by = Some(client);
                let opponent = &self.seats[1 - idx].handle;
                opponent.send(ServerMessage::RematchOffer { from: client });
                info!("{}: client {} wants a rematch", self.id, client);
                Ok(RematchStep::Offered { to: opponent.id() })
            }
        }
    }

    /// Answer the opponent's rematch request. Returns whether it was accepted;
    /// a refusal is reported to the requester here.
    pub fn respond_to_rematch(
        &mut self,
        client: ClientId,
        requester: ClientId,
        accepted: bool,
    ) -> Result<bool, SessionError> {
        self.expect_phase(SessionPhase::GameOver)?;
        let idx = self.seat_index(client)?;
        if requester == client || self.rematch_requested_by != Some(requester) {
            return Err(SessionError::NoRematchPending);
        }
        self.rematch_requested_by = None;
        if !accepted {
            self.seats[1 - idx]
                .handle
                .send(ServerMessage::RematchRejected("opponent declined".into()));
            info!("{}: client {} declined the rematch", self.id, client);
        }
        Ok(accepted)
    }

    /// Clear a pending rematch request, e.g. when the players moved on.
    pub fn clear_rematch(&mut self) {
        self.rematch_requested_by = None;
    }

    /// Tell the remaining player that `leaver` is gone and end the match.
    ///
    /// Returns the survivor's handle.
    pub fn player_left(&mut self, leaver: ClientId) -> Option<ConnectionHandle> {
        let idx = self.seat_index(leaver).ok()?;
        let survivor = self.seats[1 - idx].handle.clone();
        survivor.send(ServerMessage::OpponentDisconnected(format!(
            "client {} left the game",
            leaver
        )));
        self.phase = SessionPhase::GameOver;
        self.current = None;
        self.rematch_requested_by = None;
        info!("{}: client {} left", self.id, leaver);
        Some(survivor)
    }

    fn expect_phase(&self, phase: SessionPhase) -> Result<(), SessionError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(SessionError::WrongPhase(self.phase))
        }
    }

    fn seat_index(&self, id: ClientId) -> Result<usize, SessionError> {
        self.seats
            .iter()
            .position(|seat| seat.id() == id)
            .ok_or(SessionError::NotAPlayer(id))
    }
}

/// Resolve a ship entry into a positioned ship for `board`, inferring the kind from
/// the length when no type tag was given.
fn build_ship(board: &Board, spec: &ShipSpec) -> Result<Ship, BoardError> {
    let kind = match spec.kind {
        Some(kind) if kind.length() != spec.length => {
            return Err(BoardError::KindLengthMismatch {
                kind,
                length: spec.length,
            })
        }
        Some(kind) => kind,
        None => kind_for_length(spec.length, |kind| board.has_kind(kind))
            .ok_or(BoardError::NoShipOfLength(spec.length))?,
    };
    Ship::placed(kind, spec.row, spec.col, spec.orientation)
}
