#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

mod bitboard;
mod board;
mod common;
mod config;
pub mod protocol;
mod ship;
#[cfg(feature = "std")]
pub mod connection;
#[cfg(feature = "std")]
pub mod directory;
#[cfg(feature = "std")]
pub mod lobby;
#[cfg(feature = "std")]
mod logging;
#[cfg(feature = "std")]
pub mod server;
#[cfg(feature = "std")]
pub mod session;
#[cfg(feature = "std")]
pub mod transport;

pub use bitboard::{BitBoard, BitBoardError};
pub use board::*;
pub use common::*;
pub use config::*;
pub use protocol::*;
pub use ship::*;
#[cfg(feature = "std")]
pub use connection::{serve_connection, ConnectionHandle, Outbox};
#[cfg(feature = "std")]
pub use directory::ServerDirectory;
#[cfg(feature = "std")]
pub use lobby::{InviteError, InviteRole, LobbyRegistry, PendingInvite};
#[cfg(feature = "std")]
pub use logging::init_logging;
#[cfg(feature = "std")]
pub use server::Server;
#[cfg(feature = "std")]
pub use session::{FireOutcome, GameSession, RematchStep, SessionError, SessionPhase};
