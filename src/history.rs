//! Move history as an arena-backed tree.
//!
//! Every placement, pass or setup stone creates a [`Move`] record. Records
//! live in one flat vector and refer to each other by [`MoveId`], so the
//! whole tree is released at once together with the board. Undo only moves
//! the `current` pointer back to the parent; branches created by playing on
//! after an undo stay in the arena.

use crate::coord::{Color, Coord};

/// Stable index of a move in the history arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MoveId(u32);

impl MoveId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single history node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Move {
    /// Player who made the move
    pub player: Color,
    /// Point the stone was placed on (meaningless for passes)
    pub placed: Coord,
    /// The player passed
    pub pass: bool,
    /// Pre-seeded stone; never undone
    pub setup: bool,
    /// Previous move, `None` for the first move of a line
    pub parent: Option<MoveId>,
    /// Moves played from this position, in creation order
    pub children: Vec<MoveId>,
    /// Opponent stones removed by this move
    pub removed: Vec<Coord>,
}

impl Move {
    pub(crate) fn placement(player: Color, placed: Coord, removed: Vec<Coord>) -> Self {
        Self {
            player,
            placed,
            pass: false,
            setup: false,
            parent: None,
            children: Vec::new(),
            removed,
        }
    }

    pub(crate) fn pass(player: Color) -> Self {
        Self {
            pass: true,
            ..Self::placement(player, Coord::default(), Vec::new())
        }
    }

    pub(crate) fn setup(player: Color, placed: Coord) -> Self {
        Self {
            setup: true,
            ..Self::placement(player, placed, Vec::new())
        }
    }

    /// Number of stones this move captured.
    pub fn removed_n(&self) -> usize {
        self.removed.len()
    }
}

/// The move tree with a movable "current position" pointer.
#[derive(Clone, Debug, Default)]
pub struct History {
    moves: Vec<Move>,
    current: Option<MoveId>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent move of the live line, if any.
    #[inline]
    pub fn current(&self) -> Option<MoveId> {
        self.current
    }

    /// Get a move by ID.
    #[inline]
    pub fn get(&self, id: MoveId) -> &Move {
        &self.moves[id.index()]
    }

    /// The move the board currently sits on.
    pub fn last(&self) -> Option<&Move> {
        self.current.map(|id| self.get(id))
    }

    /// Moves that were played from `id`.
    pub fn children(&self, id: MoveId) -> &[MoveId] {
        &self.get(id).children
    }

    /// Total number of moves ever recorded, across all branches.
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Append `mv` as a child of the current move and make it current.
    pub(crate) fn push(&mut self, mut mv: Move) -> MoveId {
        let id = MoveId(
            u32::try_from(self.moves.len()).expect("move history exceeds u32::MAX entries"),
        );
        mv.parent = self.current;
        if let Some(parent) = self.current {
            self.moves[parent.index()].children.push(id);
        }
        self.moves.push(mv);
        self.current = Some(id);
        id
    }

    /// Step the current pointer back to the parent of the current move.
    ///
    /// Returns the move that was stepped over, or `None` at the start of
    /// the history or on a setup move.
    pub(crate) fn retreat(&mut self) -> Option<&Move> {
        let id = self.current?;
        let mv = &self.moves[id.index()];
        if mv.setup {
            return None;
        }
        self.current = mv.parent;
        Some(mv)
    }

    /// The live line from the first move to the current one.
    pub fn line(&self) -> Vec<&Move> {
        let mut out = Vec::new();
        let mut cursor = self.current;
        while let Some(id) = cursor {
            let mv = self.get(id);
            out.push(mv);
            cursor = mv.parent;
        }
        out.reverse();
        out
    }
}
