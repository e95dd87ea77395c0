//! Common grid types: cell status, shot outcomes and board errors.

use crate::bitboard::BitBoardError;
use crate::ship::ShipKind;

/// State of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellStatus {
    #[default]
    Empty,
    /// Holds an unattacked ship segment. Only the owner ever sees this.
    Occupied,
    Hit,
    Miss,
    /// Segment of a ship that has been fully destroyed.
    Sunk,
}

/// Result of resolving a shot against a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotOutcome {
    /// The cell was attacked before; nothing changed.
    AlreadyShot,
    Miss,
    /// Hit a ship that is still afloat.
    Hit(ShipKind),
    /// Hit the last intact segment of a ship.
    Sunk(ShipKind),
}

/// Errors returned by board and ship operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// Underlying bitboard error (invalid size or index).
    #[error("BitBoard error: {0}")]
    BitBoard(#[from] BitBoardError),
    #[error("cell ({row}, {col}) is outside the board")]
    OutOfBounds { row: usize, col: usize },
    #[error("ship has no position")]
    ShipNotPlaced,
    #[error("ship placement is out of bounds")]
    ShipOutOfBounds,
    #[error("ship placement overlaps with another ship")]
    ShipOverlaps,
    #[error("ship placement touches another ship")]
    ShipAdjacent,
    #[error("{0} is already placed on the board")]
    ShipAlreadyPlaced(ShipKind),
    #[error("no ship of length {0} left to place")]
    NoShipOfLength(usize),
    #[error("{kind} has length {}, not {length}", .kind.length())]
    KindLengthMismatch { kind: ShipKind, length: usize },
    #[error("unknown ship type")]
    UnknownShipKind,
    /// An occupied cell that no fleet ship claims.
    #[error("no ship found at hit cell")]
    UnknownShipHit,
}
