//! Colors, board coordinates and GTP vertices.
//!
//! Coordinates are `(x, y)` with the origin in the top-left corner, which
//! is how the board is stored. GTP vertices name columns with letters
//! `a`..`z` (skipping `i`) and rows with numbers counted from the bottom
//! edge, so converting between the two needs the board height.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Stone color of a player.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    /// The other player.
    #[inline]
    pub fn opposite(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// Single-letter form used in GTP arguments (`b` or `w`).
    pub fn letter(self) -> char {
        match self {
            Color::Black => 'b',
            Color::White => 'w',
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Black => f.write_str("black"),
            Color::White => f.write_str("white"),
        }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "b" | "black" => Ok(Color::Black),
            "w" | "white" => Ok(Color::White),
            _ => Err(format!("unknown color: {s}")),
        }
    }
}

/// A point on the board, column `x` and row `y`, counted from the top-left.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub x: u8,
    pub y: u8,
}

impl Coord {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }
}

/// A decoded GTP vertex: a board point, or one of the pass/resign sentinels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Vertex {
    Play(Coord),
    Pass,
    Resign,
}

/// Reasons a vertex token cannot be turned into a [`Vertex`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VertexError {
    #[error("invalid vertex ({0})")]
    Malformed(String),

    #[error("column 'i' is not used in vertices ({0})")]
    SkippedColumn(String),

    #[error("vertex out of bounds (<{token}>: {x}, {y})")]
    OutOfBounds { token: String, x: i64, y: i64 },
}

/// Map a column index to its vertex letter, skipping `i`.
pub fn column_letter(x: u8) -> char {
    let offset = if x >= 8 { x + 1 } else { x };
    (b'a' + offset) as char
}

/// Map a vertex letter back to its column index.
fn column_index(c: u8) -> Option<u8> {
    match c {
        b'a'..=b'h' => Some(c - b'a'),
        b'j'..=b'z' => Some(c - b'a' - 1),
        _ => None,
    }
}

/// Format a board coordinate as a GTP vertex (e.g. `d4`).
pub fn vertex_name(c: Coord, height: u8) -> String {
    format!("{}{}", column_letter(c.x), u16::from(height) - u16::from(c.y))
}

/// Parse a vertex token as sent by an engine (e.g. `D4`, `pass`, `resign`).
///
/// Leading and trailing whitespace is ignored and so is case. Only the
/// first whitespace-separated word is considered. A point that does not
/// fit on a `width` x `height` board is an error.
pub fn parse_vertex(s: &str, width: u8, height: u8) -> Result<Vertex, VertexError> {
    let token = s
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    match token.as_str() {
        "pass" => return Ok(Vertex::Pass),
        "resign" => return Ok(Vertex::Resign),
        _ => {}
    }

    let bytes = token.as_bytes();
    let Some((&letter, digits)) = bytes.split_first() else {
        return Err(VertexError::Malformed(token));
    };
    if letter == b'i' {
        return Err(VertexError::SkippedColumn(token));
    }
    let Some(x) = column_index(letter) else {
        return Err(VertexError::Malformed(token));
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(VertexError::Malformed(token));
    }
    let Ok(row) = token[1..].parse::<i64>() else {
        return Err(VertexError::Malformed(token));
    };

    let y = i64::from(height) - row;
    if x >= width || y < 0 || y >= i64::from(height) {
        return Err(VertexError::OutOfBounds {
            token,
            x: i64::from(x),
            y,
        });
    }

    Ok(Vertex::Play(Coord::new(x, y as u8)))
}
