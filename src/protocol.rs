//! Typed messages exchanged between clients and the server.
//!
//! Lines are split by [`codec::decode`] and interpreted exactly once here,
//! so the rest of the server only ever matches on [`ClientMessage`] and
//! [`ServerMessage`] variants.

pub mod codec;
pub mod domain;

use alloc::string::{String, ToString};
use alloc::vec::Vec;

pub use codec::{decode, encode, Frame, ProtocolError};
pub use domain::*;

const CLIENT_ID: &str = "CLIENT_ID";
const CLIENT_LIST: &str = "CLIENT_LIST";
const INVITE: &str = "INVITE";
const GAME_INVITE: &str = "GAME_INVITE";
const INVITE_RESPONSE: &str = "INVITE_RESPONSE";
const INVITE_STATE_CANCELED: &str = "INVITE_STATE_CANCELED";
const INVITE_DECLINED: &str = "INVITE_DECLINED";
const INVITE_ERROR: &str = "INVITE_ERROR";
const INVITE_CANCELED: &str = "INVITE_CANCELED";
const GAME_STARTED: &str = "GAME_STARTED";
const SHIPS_READY: &str = "SHIPS_READY";
const WAIT_OPPONENT: &str = "WAIT_OPPONENT";
const MY_SHIPS: &str = "MY_SHIPS";
const OPPONENT_SHIPS: &str = "OPPONENT_SHIPS";
const GAME_READY: &str = "GAME_READY";
const YOUR_TURN: &str = "YOUR_TURN";
const WAIT_TURN: &str = "WAIT_TURN";
const FIRE: &str = "FIRE";
const SHOT_RESULT: &str = "SHOT_RESULT";
const OPPONENT_SHOT: &str = "OPPONENT_SHOT";
const GAME_OVER: &str = "GAME_OVER";
const REMATCH_REQUEST: &str = "REMATCH_REQUEST";
const REMATCH_OFFER: &str = "REMATCH_OFFER";
const REMATCH_RESPONSE: &str = "REMATCH_RESPONSE";
const REMATCH_ACCEPTED: &str = "REMATCH_ACCEPTED";
const REMATCH_REJECTED: &str = "REMATCH_REJECTED";
const OPPONENT_DISCONNECTED: &str = "OPPONENT_DISCONNECTED";
const ERROR: &str = "ERROR";

const WAIT_OPPONENT_TEXT: &str = "waiting for opponent to place ships";

/// Messages a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Invite { to: ClientId },
    /// Answer to a `GAME_INVITE` from `from`.
    InviteResponse { from: ClientId, accepted: bool },
    /// Withdraw whatever invitation this client is part of.
    CancelInvite,
    ShipsReady(Vec<ShipSpec>),
    Fire { row: usize, col: usize },
    RematchRequest,
    /// Answer to a `REMATCH_OFFER` from `from`.
    RematchResponse { from: ClientId, accepted: bool },
}

impl ClientMessage {
    /// Interpret a decoded frame.
    pub fn from_frame(frame: Frame<'_>) -> Result<Self, ProtocolError> {
        let msg = match frame.kind {
            INVITE => ClientMessage::Invite {
                to: parse_id(&frame, INVITE, frame.payload)?,
            },
            INVITE_RESPONSE => {
                let (from, accepted) = parse_answer(&frame, INVITE_RESPONSE)?;
                ClientMessage::InviteResponse { from, accepted }
            }
            INVITE_STATE_CANCELED => ClientMessage::CancelInvite,
            SHIPS_READY => ClientMessage::ShipsReady(ShipSpec::parse_list(frame.payload)),
            FIRE => {
                let (row, col): (usize, usize) = frame
                    .payload
                    .split_once(',')
                    .and_then(|(r, c)| Some((r.trim().parse().ok()?, c.trim().parse().ok()?)))
                    .ok_or_else(|| frame.invalid(FIRE, "expected <row>,<col>"))?;
                ClientMessage::Fire { row, col }
            }
            REMATCH_REQUEST => ClientMessage::RematchRequest,
            REMATCH_RESPONSE => {
                let (from, accepted) = parse_answer(&frame, REMATCH_RESPONSE)?;
                ClientMessage::RematchResponse { from, accepted }
            }
            other => return Err(ProtocolError::UnknownType(other.into())),
        };
        Ok(msg)
    }

    /// Decode a whole line.
    pub fn parse_line(line: &str) -> Result<Self, ProtocolError> {
        Self::from_frame(decode(line)?)
    }

    /// Wire type of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Invite { .. } => INVITE,
            ClientMessage::InviteResponse { .. } => INVITE_RESPONSE,
            ClientMessage::CancelInvite => INVITE_STATE_CANCELED,
            ClientMessage::ShipsReady(_) => SHIPS_READY,
            ClientMessage::Fire { .. } => FIRE,
            ClientMessage::RematchRequest => REMATCH_REQUEST,
            ClientMessage::RematchResponse { .. } => REMATCH_RESPONSE,
        }
    }

    /// Encode as a line, without the terminator.
    pub fn to_line(&self) -> String {
        let payload = match self {
            ClientMessage::Invite { to } => to.to_string(),
            ClientMessage::InviteResponse { from, accepted }
            | ClientMessage::RematchResponse { from, accepted } => {
                alloc::format!("{}|{}", from, accepted)
            }
            ClientMessage::CancelInvite | ClientMessage::RematchRequest => String::new(),
            ClientMessage::ShipsReady(specs) => ShipSpec::format_list(specs),
            ClientMessage::Fire { row, col } => alloc::format!("{},{}", row, col),
        };
        encode(self.kind(), &payload)
    }
}

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    ClientId(ClientId),
    /// Sorted ids of every client currently in the lobby.
    ClientList(Vec<ClientId>),
    GameInvite { from: ClientId },
    InviteDeclined { by: ClientId },
    InviteError(String),
    InviteCanceled(String),
    GameStarted { session: SessionId, player_number: u8 },
    WaitOpponent,
    MyShips(Vec<ShipSpec>),
    OpponentShips(Vec<ShipSpec>),
    GameReady,
    YourTurn,
    WaitTurn,
    ShotResult(ShotReport),
    OpponentShot(ShotReport),
    GameOver(Verdict),
    RematchOffer { from: ClientId },
    RematchAccepted { session: SessionId },
    RematchRejected(String),
    OpponentDisconnected(String),
    Error(String),
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::ClientId(_) => CLIENT_ID,
            ServerMessage::ClientList(_) => CLIENT_LIST,
            ServerMessage::GameInvite { .. } => GAME_INVITE,
            ServerMessage::InviteDeclined { .. } => INVITE_DECLINED,
            ServerMessage::InviteError(_) => INVITE_ERROR,
            ServerMessage::InviteCanceled(_) => INVITE_CANCELED,
            ServerMessage::GameStarted { .. } => GAME_STARTED,
            ServerMessage::WaitOpponent => WAIT_OPPONENT,
            ServerMessage::MyShips(_) => MY_SHIPS,
            ServerMessage::OpponentShips(_) => OPPONENT_SHIPS,
            ServerMessage::GameReady => GAME_READY,
            ServerMessage::YourTurn => YOUR_TURN,
            ServerMessage::WaitTurn => WAIT_TURN,
            ServerMessage::ShotResult(_) => SHOT_RESULT,
            ServerMessage::OpponentShot(_) => OPPONENT_SHOT,
            ServerMessage::GameOver(_) => GAME_OVER,
            ServerMessage::RematchOffer { .. } => REMATCH_OFFER,
            ServerMessage::RematchAccepted { .. } => REMATCH_ACCEPTED,
            ServerMessage::RematchRejected(_) => REMATCH_REJECTED,
            ServerMessage::OpponentDisconnected(_) => OPPONENT_DISCONNECTED,
            ServerMessage::Error(_) => ERROR,
        }
    }

    /// Encode as a line, without the terminator.
    pub fn to_line(&self) -> String {
        let payload = match self {
            ServerMessage::ClientId(id) => id.to_string(),
            ServerMessage::ClientList(ids) => ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            ServerMessage::GameInvite { from } => from.to_string(),
            ServerMessage::InviteDeclined { by } => by.to_string(),
            ServerMessage::GameStarted {
                session,
                player_number,
            } => alloc::format!("{}|{}", session, player_number),
            ServerMessage::WaitOpponent => WAIT_OPPONENT_TEXT.into(),
            ServerMessage::MyShips(specs) | ServerMessage::OpponentShips(specs) => {
                ShipSpec::format_list(specs)
            }
            ServerMessage::GameReady | ServerMessage::YourTurn | ServerMessage::WaitTurn => {
                String::new()
            }
            ServerMessage::ShotResult(report) => report.shooter_payload(),
            ServerMessage::OpponentShot(report) => report.target_payload(),
            ServerMessage::GameOver(verdict) => verdict.as_str().into(),
            ServerMessage::RematchOffer { from } => from.to_string(),
            ServerMessage::RematchAccepted { session } => session.to_string(),
            ServerMessage::InviteError(text)
            | ServerMessage::InviteCanceled(text)
            | ServerMessage::RematchRejected(text)
            | ServerMessage::OpponentDisconnected(text)
            | ServerMessage::Error(text) => text.clone(),
        };
        encode(self.kind(), &payload)
    }

    /// Interpret a decoded frame. Used by clients and test harnesses.
    pub fn from_frame(frame: Frame<'_>) -> Result<Self, ProtocolError> {
        let text = || String::from(frame.payload);
        let msg = match frame.kind {
            CLIENT_ID => ServerMessage::ClientId(parse_id(&frame, CLIENT_ID, frame.payload)?),
            CLIENT_LIST => ServerMessage::ClientList(
                frame
                    .payload
                    .split(',')
                    .filter(|id| !id.trim().is_empty())
                    .map(|id| parse_id(&frame, CLIENT_LIST, id))
                    .collect::<Result<_, _>>()?,
            ),
            GAME_INVITE => ServerMessage::GameInvite {
                from: parse_id(&frame, GAME_INVITE, frame.payload)?,
            },
            INVITE_DECLINED => ServerMessage::InviteDeclined {
                by: parse_id(&frame, INVITE_DECLINED, frame.payload)?,
            },
            INVITE_ERROR => ServerMessage::InviteError(text()),
            INVITE_CANCELED => ServerMessage::InviteCanceled(text()),
            GAME_STARTED => {
                let (session, number) = frame
                    .payload
                    .split_once('|')
                    .ok_or_else(|| frame.invalid(GAME_STARTED, "expected <session>|<player>"))?;
                ServerMessage::GameStarted {
                    session: session
                        .parse()
                        .map_err(|_| frame.invalid(GAME_STARTED, "bad session id"))?,
                    player_number: number
                        .trim()
                        .parse()
                        .map_err(|_| frame.invalid(GAME_STARTED, "bad player number"))?,
                }
            }
            WAIT_OPPONENT => ServerMessage::WaitOpponent,
            MY_SHIPS => ServerMessage::MyShips(ShipSpec::parse_list(frame.payload)),
            OPPONENT_SHIPS => ServerMessage::OpponentShips(ShipSpec::parse_list(frame.payload)),
            GAME_READY => ServerMessage::GameReady,
            YOUR_TURN => ServerMessage::YourTurn,
            WAIT_TURN => ServerMessage::WaitTurn,
            SHOT_RESULT => ServerMessage::ShotResult(
                ShotReport::parse_shooter(frame.payload)
                    .ok_or_else(|| frame.invalid(SHOT_RESULT, "bad shot report"))?,
            ),
            OPPONENT_SHOT => ServerMessage::OpponentShot(
                ShotReport::parse_target(frame.payload)
                    .ok_or_else(|| frame.invalid(OPPONENT_SHOT, "bad shot report"))?,
            ),
            GAME_OVER => ServerMessage::GameOver(match frame.payload {
                "WIN" => Verdict::Win,
                "LOSE" => Verdict::Lose,
                _ => return Err(frame.invalid(GAME_OVER, "expected WIN or LOSE")),
            }),
            REMATCH_OFFER => ServerMessage::RematchOffer {
                from: parse_id(&frame, REMATCH_OFFER, frame.payload)?,
            },
            REMATCH_ACCEPTED => ServerMessage::RematchAccepted {
                session: frame
                    .payload
                    .parse()
                    .map_err(|_| frame.invalid(REMATCH_ACCEPTED, "bad session id"))?,
            },
            REMATCH_REJECTED => ServerMessage::RematchRejected(text()),
            OPPONENT_DISCONNECTED => ServerMessage::OpponentDisconnected(text()),
            ERROR => ServerMessage::Error(text()),
            other => return Err(ProtocolError::UnknownType(other.into())),
        };
        Ok(msg)
    }

    /// Decode a whole line.
    pub fn parse_line(line: &str) -> Result<Self, ProtocolError> {
        Self::from_frame(decode(line)?)
    }
}

fn parse_id(frame: &Frame<'_>, kind: &'static str, raw: &str) -> Result<ClientId, ProtocolError> {
    raw.parse().map_err(|_| frame.invalid(kind, "expected a client id"))
}

/// `<id>|<true/false>` as used by invite and rematch answers.
fn parse_answer(frame: &Frame<'_>, kind: &'static str) -> Result<(ClientId, bool), ProtocolError> {
    let (id, answer) = frame
        .payload
        .split_once('|')
        .ok_or_else(|| frame.invalid(kind, "expected <id>|<true/false>"))?;
    let id = parse_id(frame, kind, id)?;
    let accepted = match answer.trim() {
        a if a.eq_ignore_ascii_case("true") => true,
        a if a.eq_ignore_ascii_case("false") => false,
        _ => return Err(frame.invalid(kind, "answer must be true or false")),
    };
    Ok((id, accepted))
}
