//! Value types carried inside message payloads.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Write as _;
use core::str::FromStr;

use crate::common::ShotOutcome;
use crate::ship::{Orientation, Ship, ShipKind};

/// Server-assigned connection id. Never reused while the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClientId {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ClientId)
    }
}

/// Match identifier, shown on the wire as `game-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game-{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        s.strip_prefix("game-").unwrap_or(s).parse().map(SessionId)
    }
}

/// Final result announced to each player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Win,
    Lose,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Win => "WIN",
            Verdict::Lose => "LOSE",
        }
    }
}

/// Outcome of a shot that actually landed on a fresh cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strike {
    Miss,
    Hit(ShipKind),
    Sunk(ShipKind),
}

impl Strike {
    /// `None` for [`ShotOutcome::AlreadyShot`], which is never reported.
    pub fn from_outcome(outcome: ShotOutcome) -> Option<Self> {
        match outcome {
            ShotOutcome::AlreadyShot => None,
            ShotOutcome::Miss => Some(Strike::Miss),
            ShotOutcome::Hit(kind) => Some(Strike::Hit(kind)),
            ShotOutcome::Sunk(kind) => Some(Strike::Sunk(kind)),
        }
    }
}

/// Where a shot landed and what it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotReport {
    pub row: usize,
    pub col: usize,
    pub strike: Strike,
}

impl ShotReport {
    /// Two-digit `<row><col>` position.
    pub fn position(&self) -> String {
        format_position(self.row, self.col)
    }

    /// `HIT|<pos>|<TYPE>[|SUNK]` or `MISS|<pos>`, as sent to the shooter.
    pub(crate) fn shooter_payload(&self) -> String {
        let pos = self.position();
        match self.strike {
            Strike::Miss => alloc::format!("MISS|{}", pos),
            Strike::Hit(kind) => alloc::format!("HIT|{}|{}", pos, kind),
            Strike::Sunk(kind) => alloc::format!("HIT|{}|{}|SUNK", pos, kind),
        }
    }

    /// `<pos>|HIT|<TYPE>[|SUNK]` or `<pos>|MISS`, as sent to the target.
    pub(crate) fn target_payload(&self) -> String {
        let pos = self.position();
        match self.strike {
            Strike::Miss => alloc::format!("{}|MISS", pos),
            Strike::Hit(kind) => alloc::format!("{}|HIT|{}", pos, kind),
            Strike::Sunk(kind) => alloc::format!("{}|HIT|{}|SUNK", pos, kind),
        }
    }

    pub(crate) fn parse_shooter(payload: &str) -> Option<Self> {
        let mut parts = payload.split('|');
        let verdict = parts.next()?;
        let (row, col) = parse_position(parts.next()?)?;
        let strike = Self::parse_strike(verdict, &mut parts)?;
        Some(ShotReport { row, col, strike })
    }

    pub(crate) fn parse_target(payload: &str) -> Option<Self> {
        let mut parts = payload.split('|');
        let (row, col) = parse_position(parts.next()?)?;
        let verdict = parts.next()?;
        let strike = Self::parse_strike(verdict, &mut parts)?;
        Some(ShotReport { row, col, strike })
    }

    fn parse_strike<'a>(verdict: &str, rest: &mut impl Iterator<Item = &'a str>) -> Option<Strike> {
        let strike = match verdict {
            "MISS" => Strike::Miss,
            "HIT" => {
                let kind = rest.next()?.parse().ok()?;
                match rest.next() {
                    Some("SUNK") => Strike::Sunk(kind),
                    None => Strike::Hit(kind),
                    Some(_) => return None,
                }
            }
            _ => return None,
        };
        rest.next().is_none().then_some(strike)
    }
}

/// Render a cell as the two digits `<row><col>`.
pub fn format_position(row: usize, col: usize) -> String {
    alloc::format!("{}{}", row, col)
}

/// Parse a two-digit `<row><col>` position.
pub fn parse_position(raw: &str) -> Option<(usize, usize)> {
    let bytes = raw.as_bytes();
    if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(((bytes[0] - b'0') as usize, (bytes[1] - b'0') as usize))
}

/// One entry of a ship list: `row,col,len,H|V[,TYPE]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipSpec {
    pub row: usize,
    pub col: usize,
    pub length: usize,
    pub orientation: Orientation,
    /// Explicit kind; when absent it is inferred from `length`.
    pub kind: Option<ShipKind>,
}

impl ShipSpec {
    pub fn new(row: usize, col: usize, length: usize, orientation: Orientation) -> Self {
        ShipSpec {
            row,
            col,
            length,
            orientation,
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: ShipKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Parse a `;`-joined ship list. The empty string is an empty list.
    ///
    /// Malformed entries are logged and left out; whether a well-formed entry
    /// fits on the board is for placement to decide.
    pub fn parse_list(raw: &str) -> Vec<ShipSpec> {
        raw.split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| match ShipSpec::parse_entry(entry) {
                Ok(spec) => Some(spec),
                Err(reason) => {
                    log::warn!("skipping ship entry {:?}: {}", entry, reason);
                    None
                }
            })
            .collect()
    }

    fn parse_entry(entry: &str) -> Result<ShipSpec, &'static str> {
        let fields: Vec<&str> = entry.split(',').map(str::trim).collect();
        if fields.len() != 4 && fields.len() != 5 {
            return Err("ship entry needs row,col,len,H/V[,TYPE]");
        }
        let row: usize = fields[0].parse().map_err(|_| "bad ship row")?;
        let col: usize = fields[1].parse().map_err(|_| "bad ship column")?;
        let length: usize = fields[2].parse().map_err(|_| "bad ship length")?;
        let orientation = match fields[3] {
            "H" | "h" => Orientation::Horizontal,
            "V" | "v" => Orientation::Vertical,
            _ => return Err("orientation must be H or V"),
        };
        let kind = match fields.get(4) {
            Some(tag) => Some(tag.parse::<ShipKind>().map_err(|_| "unknown ship type")?),
            None => None,
        };
        Ok(ShipSpec {
            row,
            col,
            length,
            orientation,
            kind,
        })
    }

    /// Join specs with `;`, always including the type tag when known.
    pub fn format_list(specs: &[ShipSpec]) -> String {
        let mut out = String::new();
        for (i, spec) in specs.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            let _ = write!(
                out,
                "{},{},{},{}",
                spec.row,
                spec.col,
                spec.length,
                spec.orientation.as_char()
            );
            if let Some(kind) = spec.kind {
                let _ = write!(out, ",{}", kind);
            }
        }
        out
    }
}

impl From<&Ship> for ShipSpec {
    fn from(ship: &Ship) -> Self {
        let (row, col) = ship.origin().unwrap_or((0, 0));
        ShipSpec {
            row,
            col,
            length: ship.length(),
            orientation: ship.orientation(),
            kind: Some(ship.kind()),
        }
    }
}
