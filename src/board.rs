//! Go board and rules.
//!
//! The board is a flat row-major grid of `Option<Color>` plus the running
//! capture counters and the move history. It implements:
//! - Connectivity search over 4-connected regions ([`Board::group_info`])
//! - Legality checking including the simple ko rule
//! - Stone placement with capture resolution, passes and setup stones
//! - Undo of the last non-setup move
//! - Area scoring (territory plus captured stones)

use std::fmt;

use thiserror::Error;

use crate::constants::{MAX_CHANGED, MAX_SIZE, MIN_SIZE};
use crate::coord::{Color, Coord, column_letter, vertex_name};
use crate::history::{History, Move, MoveId};

/// Board construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error(
        "invalid board size {width}x{height} (each side must be in {}..={})",
        MIN_SIZE,
        MAX_SIZE
    )]
    InvalidSize { width: u8, height: u8 },
}

/// Result of attempting to play a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    /// Point is not on the board
    #[error("Illegal move: point outside the board")]
    OutOfBounds,
    /// Point is not empty
    #[error("Illegal move: point not empty")]
    Occupied,
    /// Move would immediately retake a ko
    #[error("Illegal move: retakes ko")]
    Ko,
    /// Move would be suicide (no liberties after capture resolution)
    #[error("Illegal move: suicide")]
    Suicide,
    /// Setup stones must precede the first real move
    #[error("setup stones must be placed before the first move")]
    SetupAfterPlay,
}

/// A Go board with its move history.
#[derive(Clone)]
pub struct Board {
    width: u8,
    height: u8,
    cells: Vec<Option<Color>>,
    /// Black stones lost to captures
    black_captured: u32,
    /// White stones lost to captures
    white_captured: u32,
    changed: bool,
    history: History,
}

impl Board {
    /// Create an empty `width` x `height` board.
    pub fn new(width: u8, height: u8) -> Result<Self, BoardError> {
        let valid = MIN_SIZE..=MAX_SIZE;
        if !valid.contains(&width) || !valid.contains(&height) {
            return Err(BoardError::InvalidSize { width, height });
        }
        Ok(Self {
            width,
            height,
            cells: vec![None; usize::from(width) * usize::from(height)],
            black_captured: 0,
            white_captured: 0,
            changed: false,
            history: History::new(),
        })
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    /// Number of points on the board.
    pub fn area(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn idx(&self, c: Coord) -> usize {
        usize::from(c.y) * usize::from(self.width) + usize::from(c.x)
    }

    #[inline]
    fn coord(&self, i: usize) -> Coord {
        let w = usize::from(self.width);
        Coord::new((i % w) as u8, (i / w) as u8)
    }

    /// Check whether `c` lies on the board.
    #[inline]
    pub fn contains(&self, c: Coord) -> bool {
        c.x < self.width && c.y < self.height
    }

    /// The stone at `c`, or `None` for an empty or off-board point.
    pub fn get(&self, c: Coord) -> Option<Color> {
        if !self.contains(c) {
            return None;
        }
        self.cells[self.idx(c)]
    }

    /// Number of stones of `color` that have been captured.
    pub fn captured(&self, color: Color) -> u32 {
        match color {
            Color::Black => self.black_captured,
            Color::White => self.white_captured,
        }
    }

    /// Whether the grid (or anything shown with it) changed since the last
    /// call to [`Board::clear_changed`].
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub fn clear_changed(&mut self) {
        self.changed = false;
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// The move that produced the current position.
    pub fn last_move(&self) -> Option<&Move> {
        self.history.last()
    }

    /// Orthogonal neighbours of `c` that lie on the board.
    /// Order: West, East, North, South.
    fn neighbors(&self, c: Coord) -> impl Iterator<Item = Coord> + use<> {
        let (w, h) = (self.width, self.height);
        [
            (c.x > 0).then(|| Coord::new(c.x - 1, c.y)),
            (c.x + 1 < w).then(|| Coord::new(c.x + 1, c.y)),
            (c.y > 0).then(|| Coord::new(c.x, c.y - 1)),
            (c.y + 1 < h).then(|| Coord::new(c.x, c.y + 1)),
        ]
        .into_iter()
        .flatten()
    }

    /// Flood-fill the region of same-state points containing `start`.
    ///
    /// For a stone, returns the number of distinct empty points adjacent to
    /// its group (liberties). For an empty point, returns the area of the
    /// empty region. If `group` is given it must have one entry per board
    /// point; it is overwritten so that exactly the region is marked.
    ///
    /// An off-board `start` has no region: the result is 0 and the mask is
    /// left empty.
    pub fn group_info(&self, start: Coord, mut group: Option<&mut [bool]>) -> usize {
        let area = self.area();
        if !self.contains(start) {
            if let Some(g) = group {
                g.fill(false);
            }
            return 0;
        }

        let color = self.cells[self.idx(start)];
        let mut visited = vec![false; area];
        let mut stack = Vec::with_capacity(area.min(64));
        let mut liberties = 0;
        let mut size = 1;

        if let Some(g) = group.as_deref_mut() {
            assert_eq!(g.len(), area, "group mask must cover the whole board");
            g.fill(false);
            g[self.idx(start)] = true;
        }

        visited[self.idx(start)] = true;
        stack.push(start);

        while let Some(c) = stack.pop() {
            for n in self.neighbors(c) {
                let i = self.idx(n);
                if visited[i] {
                    continue;
                }
                visited[i] = true;

                let state = self.cells[i];
                if state.is_none() {
                    liberties += 1;
                }
                if state == color {
                    size += 1;
                    if let Some(g) = group.as_deref_mut() {
                        g[i] = true;
                    }
                    stack.push(n);
                }
            }
        }

        if color.is_some() { liberties } else { size }
    }

    /// Check whether `color` may play at `c`.
    pub fn is_legal(&self, color: Color, c: Coord) -> bool {
        self.check_move(color, c).is_ok()
    }

    fn check_move(&self, color: Color, c: Coord) -> Result<(), MoveError> {
        if !self.contains(c) {
            return Err(MoveError::OutOfBounds);
        }
        if self.get(c).is_some() {
            return Err(MoveError::Occupied);
        }

        let mut group = vec![false; self.area()];
        for n in self.neighbors(c) {
            // An empty neighbour is a liberty for the new stone.
            let Some(stone) = self.get(n) else {
                return Ok(());
            };

            let libs = self.group_info(n, Some(&mut group));
            if stone == color {
                // Joining a group that keeps another liberty.
                if libs > 1 {
                    return Ok(());
                }
            } else if libs == 1 {
                // Capturing the group frees at least this point.
                if let Some(last) = self.last_move() {
                    if !last.pass && last.removed_n() == 1 && group[self.idx(last.placed)] {
                        return Err(MoveError::Ko);
                    }
                }
                return Ok(());
            }
        }

        Err(MoveError::Suicide)
    }

    /// Place a stone of `color` at `c`.
    ///
    /// Returns the number of changed points (the placed stone plus all
    /// captured stones).
    pub fn place(&mut self, color: Color, c: Coord) -> Result<usize, MoveError> {
        self.check_move(color, c)?;

        let i = self.idx(c);
        self.cells[i] = Some(color);
        self.changed = true;

        let removed = self.resolve_captures(c);
        let changed = 1 + removed.len();
        assert!(changed < MAX_CHANGED, "too many changed points in one move");

        match color {
            Color::White => self.black_captured += removed.len() as u32,
            Color::Black => self.white_captured += removed.len() as u32,
        }

        self.history.push(Move::placement(color, c, removed));
        Ok(changed)
    }

    /// Remove every group without liberties, except the one containing
    /// `last`, and return the removed points.
    ///
    /// The group of `last` keeps a liberty because the move passed
    /// [`Board::check_move`].
    fn resolve_captures(&mut self, last: Coord) -> Vec<Coord> {
        let area = self.area();
        let mut visited = vec![false; area];
        let mut group = vec![false; area];
        let mut removed = Vec::new();

        for i in 0..area {
            if self.cells[i].is_none() || visited[i] {
                continue;
            }

            let libs = self.group_info(self.coord(i), Some(&mut group));
            if libs == 0 && !group[self.idx(last)] {
                for (j, _) in group.iter().enumerate().filter(|&(_, &g)| g) {
                    self.cells[j] = None;
                    removed.push(self.coord(j));
                }
            }

            for (v, &g) in visited.iter_mut().zip(&group) {
                *v |= g;
            }
        }

        removed
    }

    /// Record a pass by `color`. The grid does not change.
    pub fn pass(&mut self, color: Color) -> MoveId {
        self.history.push(Move::pass(color))
    }

    /// Put a setup stone (e.g. a handicap stone) on the board.
    ///
    /// Setup stones may only precede the first real move, never capture,
    /// and are never removed by [`Board::undo`].
    pub fn setup(&mut self, color: Color, c: Coord) -> Result<(), MoveError> {
        if self.history.last().is_some_and(|m| !m.setup) {
            return Err(MoveError::SetupAfterPlay);
        }
        if !self.contains(c) {
            return Err(MoveError::OutOfBounds);
        }
        if self.get(c).is_some() {
            return Err(MoveError::Occupied);
        }

        let i = self.idx(c);
        self.cells[i] = Some(color);
        let starved = std::iter::once(c)
            .chain(self.neighbors(c))
            .any(|n| self.get(n).is_some() && self.group_info(n, None) == 0);
        if starved {
            self.cells[i] = None;
            return Err(MoveError::Suicide);
        }

        self.changed = true;
        self.history.push(Move::setup(color, c));
        Ok(())
    }

    /// Take back the most recent move.
    ///
    /// Returns `false` if there is nothing to undo or the current move is a
    /// setup stone.
    pub fn undo(&mut self) -> bool {
        let Some(mv) = self.history.retreat() else {
            return false;
        };
        let (player, placed, pass) = (mv.player, mv.placed, mv.pass);
        let removed = mv.removed.clone();

        if !pass {
            let i = self.idx(placed);
            self.cells[i] = None;
        }
        for &c in &removed {
            let i = self.idx(c);
            self.cells[i] = Some(player.opposite());
        }

        match player {
            Color::White => self.black_captured -= removed.len() as u32,
            Color::Black => self.white_captured -= removed.len() as u32,
        }

        self.changed = true;
        true
    }

    /// Score for `color`: empty regions bordered only by `color` plus the
    /// opponent stones `color` has captured.
    ///
    /// An entirely empty board scores 0.
    pub fn score(&self, color: Color) -> u32 {
        if self.cells.iter().all(Option::is_none) {
            return 0;
        }

        let area = self.area();
        let mut visited = vec![false; area];
        let mut group = vec![false; area];
        let mut territory = 0u32;

        for i in 0..area {
            if visited[i] || self.cells[i].is_some() {
                continue;
            }

            let size = self.group_info(self.coord(i), Some(&mut group));
            let mut owner = None;
            let mut neutral = false;
            for j in (0..area).filter(|&j| group[j]) {
                visited[j] = true;
                for n in self.neighbors(self.coord(j)) {
                    match (self.get(n), owner) {
                        (None, _) => {}
                        (Some(s), None) => owner = Some(s),
                        (Some(s), Some(o)) if s != o => neutral = true,
                        _ => {}
                    }
                }
            }

            if !neutral && owner == Some(color) {
                territory += size as u32;
            }
        }

        territory + self.captured(color.opposite())
    }

    /// One-line description of the last move, e.g. `last move d4, removed 1`.
    pub fn last_move_summary(&self) -> Option<String> {
        let mv = self.last_move()?;
        Some(if mv.pass {
            format!("{} passed", mv.player)
        } else {
            format!(
                "last move {}, removed {}",
                vertex_name(mv.placed, self.height),
                mv.removed_n()
            )
        })
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("black_captured", &self.black_captured)
            .field("white_captured", &self.white_captured)
            .field("moves", &self.history.len())
            .finish()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "   ")?;
        for x in 0..self.width {
            write!(f, "{} ", column_letter(x))?;
        }
        writeln!(f)?;
        for y in 0..self.height {
            write!(f, "{:>2} ", self.height - y)?;
            for x in 0..self.width {
                let ch = match self.get(Coord::new(x, y)) {
                    Some(Color::Black) => 'X',
                    Some(Color::White) => 'O',
                    None => '.',
                };
                write!(f, "{ch} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
