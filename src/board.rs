//! One player's grid and fleet.

use core::fmt;

use crate::common::{BoardError, CellStatus, ShotOutcome};
use crate::config::{BOARD_SIZE, NUM_SHIPS};
use crate::ship::{GridMask, Ship, ShipKind};

/// A 10×10 grid of cell states plus the fleet placed on it.
///
/// The fleet holds one slot per [`ShipKind`](crate::ShipKind). Every
/// `Occupied`, `Hit` or `Sunk` cell belongs to exactly one ship in the fleet,
/// and no two ships touch, not even diagonally.
#[derive(Clone, PartialEq, Eq)]
pub struct Board {
    grid: [[CellStatus; BOARD_SIZE]; BOARD_SIZE],
    fleet: [Option<Ship>; NUM_SHIPS],
    ship_map: GridMask,
}

impl Board {
    /// Create an empty board (no ships placed, nothing attacked).
    pub fn new() -> Self {
        Board {
            grid: [[CellStatus::Empty; BOARD_SIZE]; BOARD_SIZE],
            fleet: [None; NUM_SHIPS],
            ship_map: GridMask::new(),
        }
    }

    /// Add a positioned ship to the fleet.
    ///
    /// Rejected if the ship has no position, if its kind is already on the
    /// board, or if any of its cells overlaps or borders another ship.
    pub fn place_ship(&mut self, ship: Ship) -> Result<(), BoardError> {
        if !ship.is_placed() {
            return Err(BoardError::ShipNotPlaced);
        }
        let slot = ship.kind().slot();
        if self.fleet[slot].is_some() {
            return Err(BoardError::ShipAlreadyPlaced(ship.kind()));
        }
        let mask = ship.mask();
        if !(self.ship_map & mask).is_empty() {
            return Err(BoardError::ShipOverlaps);
        }
        if !(self.ship_map & mask.halo()).is_empty() {
            return Err(BoardError::ShipAdjacent);
        }

        for (row, col) in ship.occupied_cells() {
            self.grid[row][col] = CellStatus::Occupied;
        }
        self.ship_map |= mask;
        self.fleet[slot] = Some(ship);
        Ok(())
    }

    /// Fire at (`row`, `col`).
    ///
    /// A cell is resolved once; later shots at it report
    /// [`ShotOutcome::AlreadyShot`] and leave the board untouched.
    pub fn resolve_shot(&mut self, row: usize, col: usize) -> Result<ShotOutcome, BoardError> {
        Self::check_bounds(row, col)?;
        match self.grid[row][col] {
            CellStatus::Hit | CellStatus::Miss | CellStatus::Sunk => Ok(ShotOutcome::AlreadyShot),
            CellStatus::Empty => {
                self.grid[row][col] = CellStatus::Miss;
                Ok(ShotOutcome::Miss)
            }
            CellStatus::Occupied => {
                let ship = self
                    .fleet
                    .iter_mut()
                    .flatten()
                    .find(|ship| ship.occupies(row, col))
                    .ok_or(BoardError::UnknownShipHit)?;
                ship.register_hit();
                let kind = ship.kind();
                if ship.is_sunk() {
                    let cells = ship.mask();
                    for (r, c) in cells.iter_set_bits() {
                        self.grid[r][c] = CellStatus::Sunk;
                    }
                    Ok(ShotOutcome::Sunk(kind))
                } else {
                    self.grid[row][col] = CellStatus::Hit;
                    Ok(ShotOutcome::Hit(kind))
                }
            }
        }
    }

    /// `true` when every ship in the fleet is sunk. A board with no ships
    /// counts as sunk.
    pub fn all_ships_sunk(&self) -> bool {
        self.ships().all(Ship::is_sunk)
    }

    /// Owner's view of a cell.
    pub fn cell_status(&self, row: usize, col: usize) -> Result<CellStatus, BoardError> {
        Self::check_bounds(row, col)?;
        Ok(self.grid[row][col])
    }

    /// What the opponent may know about a cell: intact ship segments look empty.
    pub fn opponent_view(&self, row: usize, col: usize) -> Result<CellStatus, BoardError> {
        match self.cell_status(row, col)? {
            CellStatus::Occupied => Ok(CellStatus::Empty),
            status => Ok(status),
        }
    }

    /// Placed ships, largest kind first.
    pub fn ships(&self) -> impl Iterator<Item = &Ship> {
        self.fleet.iter().flatten()
    }

    pub fn ship_count(&self) -> usize {
        self.ships().count()
    }

    /// The ship covering (`row`, `col`), if any.
    pub fn ship_at(&self, row: usize, col: usize) -> Option<&Ship> {
        self.ships().find(|ship| ship.occupies(row, col))
    }

    /// Whether a ship of this kind is already on the board.
    pub fn has_kind(&self, kind: ShipKind) -> bool {
        self.fleet[kind.slot()].is_some()
    }

    /// Occupancy mask of all ships.
    pub fn ship_map(&self) -> GridMask {
        self.ship_map
    }

    /// Clear the grid and the fleet.
    pub fn reset(&mut self) {
        *self = Board::new();
    }

    fn check_bounds(row: usize, col: usize) -> Result<(), BoardError> {
        if row >= BOARD_SIZE || col >= BOARD_SIZE {
            Err(BoardError::OutOfBounds { row, col })
        } else {
            Ok(())
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  ")?;
        for c in 0..BOARD_SIZE {
            write!(f, "{} ", c)?;
        }
        for (r, row) in self.grid.iter().enumerate() {
            writeln!(f)?;
            write!(f, "{} ", r)?;
            for cell in row {
                let ch = match cell {
                    CellStatus::Empty => '.',
                    CellStatus::Occupied => 'S',
                    CellStatus::Hit => 'X',
                    CellStatus::Miss => 'O',
                    CellStatus::Sunk => '#',
                };
                write!(f, "{} ", ch)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Board {{")?;
        writeln!(f, "{}", self)?;
        write!(f, "  fleet: {:?}\n}}", self.fleet)
    }
}
