//! Ship kinds and ship placement state.

use core::fmt;
use core::str::FromStr;

use crate::bitboard::BitBoard;
use crate::common::BoardError;
use crate::config::BOARD_SIZE;

/// Occupancy mask sized for the game grid.
pub type GridMask = BitBoard<u128, BOARD_SIZE>;

/// Orientation of a ship on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    /// Single-letter wire form: `H` or `V`.
    pub fn as_char(self) -> char {
        match self {
            Orientation::Horizontal => 'H',
            Orientation::Vertical => 'V',
        }
    }
}

/// The five standard ship kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShipKind {
    Carrier,
    Battleship,
    Cruiser,
    Submarine,
    Destroyer,
}

impl ShipKind {
    pub const ALL: [ShipKind; 5] = [
        ShipKind::Carrier,
        ShipKind::Battleship,
        ShipKind::Cruiser,
        ShipKind::Submarine,
        ShipKind::Destroyer,
    ];

    /// Number of cells this kind occupies.
    pub const fn length(self) -> usize {
        match self {
            ShipKind::Carrier => 5,
            ShipKind::Battleship => 4,
            ShipKind::Cruiser | ShipKind::Submarine => 3,
            ShipKind::Destroyer => 2,
        }
    }

    /// Upper-case tag used in `SHOT_RESULT` and ship lists.
    pub const fn tag(self) -> &'static str {
        match self {
            ShipKind::Carrier => "CARRIER",
            ShipKind::Battleship => "BATTLESHIP",
            ShipKind::Cruiser => "CRUISER",
            ShipKind::Submarine => "SUBMARINE",
            ShipKind::Destroyer => "DESTROYER",
        }
    }

    /// Position of this kind in the fleet.
    pub const fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ShipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ShipKind {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShipKind::ALL
            .into_iter()
            .find(|kind| kind.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or(BoardError::UnknownShipKind)
    }
}

/// A ship of a fixed kind. Position and hits change over its life; the
/// occupied cells are derived from origin, length and orientation.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ship {
    kind: ShipKind,
    origin: Option<(usize, usize)>,
    orientation: Orientation,
    mask: GridMask,
    hits: usize,
}

impl Ship {
    /// An unplaced ship. It occupies no cells until [`place_at`](Self::place_at).
    pub fn new(kind: ShipKind) -> Self {
        Ship {
            kind,
            origin: None,
            orientation: Orientation::Horizontal,
            mask: GridMask::new(),
            hits: 0,
        }
    }

    /// Convenience for building a positioned ship in one step.
    pub fn placed(
        kind: ShipKind,
        row: usize,
        col: usize,
        orientation: Orientation,
    ) -> Result<Self, BoardError> {
        let mut ship = Ship::new(kind);
        ship.place_at(row, col, orientation)?;
        Ok(ship)
    }

    /// Position the ship with its origin at (`row`, `col`). Fails without
    /// changing the ship if any cell would fall off the grid.
    pub fn place_at(
        &mut self,
        row: usize,
        col: usize,
        orientation: Orientation,
    ) -> Result<(), BoardError> {
        let len = self.kind.length();
        let end = match orientation {
            Orientation::Horizontal => col.checked_add(len - 1).map(|end_col| (row, end_col)),
            Orientation::Vertical => row.checked_add(len - 1).map(|end_row| (end_row, col)),
        };
        match end {
            Some((end_row, end_col)) if end_row < BOARD_SIZE && end_col < BOARD_SIZE => {}
            _ => return Err(BoardError::ShipOutOfBounds),
        }
        self.mask = GridMask::from_cells(Self::cells_from(row, col, len, orientation))?;
        self.origin = Some((row, col));
        self.orientation = orientation;
        self.hits = 0;
        Ok(())
    }

    fn cells_from(
        row: usize,
        col: usize,
        len: usize,
        orientation: Orientation,
    ) -> impl Iterator<Item = (usize, usize)> {
        (0..len).map(move |i| match orientation {
            Orientation::Horizontal => (row, col + i),
            Orientation::Vertical => (row + i, col),
        })
    }

    pub fn kind(&self) -> ShipKind {
        self.kind
    }

    pub fn length(&self) -> usize {
        self.kind.length()
    }

    pub fn origin(&self) -> Option<(usize, usize)> {
        self.origin
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn is_placed(&self) -> bool {
        self.origin.is_some()
    }

    /// Occupied cells from the origin outward; empty while unplaced.
    pub fn occupied_cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let (row, col) = self.origin.unwrap_or((0, 0));
        let len = if self.is_placed() { self.length() } else { 0 };
        Self::cells_from(row, col, len, self.orientation)
    }

    /// Occupancy mask of the ship on the board.
    pub fn mask(&self) -> GridMask {
        self.mask
    }

    pub fn occupies(&self, row: usize, col: usize) -> bool {
        self.mask.contains(row, col)
    }

    pub fn hit_count(&self) -> usize {
        self.hits
    }

    /// Count one hit. The caller guarantees each cell is counted once; the
    /// counter saturates at the ship's length.
    pub(crate) fn register_hit(&mut self) {
        if self.hits < self.length() {
            self.hits += 1;
        }
    }

    /// Check if the ship is sunk (every segment hit).
    pub fn is_sunk(&self) -> bool {
        self.is_placed() && self.hits == self.length()
    }
}

impl fmt::Debug for Ship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ship {{ kind: {}, origin: {:?}, orientation: {:?}, hits: {}/{} }}",
            self.kind,
            self.origin,
            self.orientation,
            self.hits,
            self.length(),
        )
    }
}
