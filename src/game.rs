//! Game flow on top of the board and the GTP client.
//!
//! A [`Game`] owns the [`Board`] and tracks whose turn it is as a [`Phase`].
//! In manual mode two humans share the board. Otherwise one color is played
//! by an engine: human moves are applied locally and forwarded with `play`,
//! and once the engine acknowledges them it is asked to `genmove`.
//!
//! Callbacks run while the client is pumping, so they cannot issue commands
//! themselves. Anything they want to send is queued as a [`Followup`] and
//! sent by [`Game::flush`].

use std::collections::VecDeque;

use thiserror::Error;
use tracing::{info, warn};

use crate::board::Board;
use crate::constants::PROTOCOL_VERSION;
use crate::coord::{Color, Coord, Vertex, VertexError, parse_vertex, vertex_name};
use crate::gtp::{BoardContext, Command, GtpClient, GtpError, Reply, Value};

/// The GTP client type used by a game.
pub type Engine = GtpClient<Game>;

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("playing against an engine requires a square board (got {width}x{height})")]
    NonSquareBoard { width: u8, height: u8 },

    #[error("invalid protocol version: {0}")]
    ProtocolVersion(String),

    #[error("engine rejected the board size: {0}")]
    BoardSize(String),

    #[error("unknown input: {0}")]
    UnknownInput(String),

    #[error(transparent)]
    Vertex(#[from] VertexError),

    #[error(transparent)]
    Gtp(#[from] GtpError),
}

/// Something the user asked for at the prompt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Play(Coord),
    Pass,
    Resign,
    Undo,
    Hint,
    Score,
    Board,
    Help,
    Quit,
}

impl Action {
    /// Parse one line of user input. Blank lines yield `None`; anything
    /// that is not a command is read as a vertex on `board`.
    pub fn parse(line: &str, board: &Board) -> Result<Option<Action>, GameError> {
        let line = line.trim();
        let Some(word) = line.split_whitespace().next() else {
            return Ok(None);
        };
        let action = match word.to_ascii_lowercase().as_str() {
            "undo" | "u" => Action::Undo,
            "hint" => Action::Hint,
            "score" => Action::Score,
            "board" => Action::Board,
            "help" | "?" => Action::Help,
            "quit" | "q" | "exit" => Action::Quit,
            w if w.starts_with(|c: char| c.is_ascii_alphabetic()) => {
                match parse_vertex(line, board.width(), board.height())? {
                    Vertex::Play(c) => Action::Play(c),
                    Vertex::Pass => Action::Pass,
                    Vertex::Resign => Action::Resign,
                }
            }
            _ => return Err(GameError::UnknownInput(line.to_string())),
        };
        Ok(Some(action))
    }
}

/// Where the game stands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for this color to move
    ToMove(Color),
    /// This color chose a point; the move is being applied
    Confirm(Color),
    /// This color passed
    Passed(Color),
    /// This color resigned
    Resigned(Color),
    GameOver,
}

impl Phase {
    /// Check whether moving from `self` to `next` is a valid step.
    pub fn can_become(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (ToMove(_), ToMove(_)) => true,
            (ToMove(c), Confirm(d) | Passed(d) | Resigned(d)) => c == d,
            (ToMove(_), GameOver) => true,
            (Confirm(_), ToMove(_)) => true,
            (Passed(c), ToMove(d)) => c.opposite() == d,
            (Resigned(_), GameOver) => true,
            (GameOver, GameOver) => true,
            _ => false,
        }
    }
}

/// A command a callback wants sent once the client is free.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Followup {
    GenMove(Color),
    Undo,
}

/// A game of Go between two humans or a human and an engine.
pub struct Game {
    board: Board,
    phase: Phase,
    human: Color,
    manual: bool,
    resigned: Option<Color>,
    followups: VecDeque<Followup>,
    notices: Vec<String>,
    failure: Option<GameError>,
}

impl BoardContext for Game {
    fn board(&self) -> &Board {
        &self.board
    }

    fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }
}

impl Game {
    /// Start a game on `board`. Black moves first. `human` is the color the
    /// user plays against an engine and is ignored in manual mode.
    pub fn new(mut board: Board, human: Color, manual: bool) -> Self {
        board.mark_changed();
        Self {
            board,
            phase: Phase::ToMove(Color::Black),
            human,
            manual,
            resigned: None,
            followups: VecDeque::new(),
            notices: Vec::new(),
            failure: None,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    /// The color whose move it is, if the game is still running.
    pub fn to_move(&self) -> Option<Color> {
        match self.phase {
            Phase::ToMove(c) => Some(c),
            _ => None,
        }
    }

    /// Whether the next move belongs to the engine.
    pub fn awaiting_engine(&self) -> bool {
        !self.manual && self.to_move().is_some_and(|c| c != self.human)
    }

    /// Messages for the user since the last call.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// A fatal problem reported by an engine callback.
    pub fn take_failure(&mut self) -> Option<GameError> {
        self.failure.take()
    }

    pub fn followups(&self) -> impl Iterator<Item = &Followup> {
        self.followups.iter()
    }

    fn notice(&mut self, msg: impl Into<String>) {
        self.notices.push(msg.into());
    }

    fn transition(&mut self, next: Phase) {
        assert!(
            self.phase.can_become(next),
            "invalid phase transition {:?} -> {next:?}",
            self.phase
        );
        self.phase = next;
        self.board.mark_changed();
    }

    fn finish(&mut self) {
        self.transition(Phase::GameOver);
        let result = self.result();
        info!("game over: {result}");
        self.notice(result);
    }

    /// Handshake with the engine: check the protocol version, set board size
    /// and komi, and ask for its name. If the engine plays black it is asked
    /// for the first move.
    pub fn connect(&mut self, engine: &mut Engine, komi: f32) -> Result<(), GameError> {
        let (width, height) = (self.board.width(), self.board.height());
        if width != height {
            return Err(GameError::NonSquareBoard { width, height });
        }

        engine.run_command_with(self, Command::ProtocolVersion, "", check_version)?;
        engine.run_command_with(self, Command::BoardSize, &width.to_string(), |game, reply| {
            if let Err(msg) = reply {
                game.failure = Some(GameError::BoardSize(msg));
            }
            false
        })?;
        engine.run_command(self, Command::Komi, &komi.to_string())?;
        engine.run_command_with(self, Command::Name, "", |game, reply| {
            if let Ok(Value::Text(name)) = reply {
                let name = name.lines().next().unwrap_or_default().to_string();
                info!("connected to \"{name}\"");
                game.notice(format!("connected to \"{name}\""));
            }
            false
        })?;

        if let Some(e) = self.failure.take() {
            return Err(e);
        }

        if self.awaiting_engine() {
            self.followups.push_back(Followup::GenMove(self.human.opposite()));
        }
        self.flush(engine)?;
        Ok(())
    }

    /// Send everything callbacks have queued.
    pub fn flush(&mut self, engine: &mut Engine) -> Result<(), GtpError> {
        while let Some(f) = self.followups.pop_front() {
            match f {
                Followup::GenMove(color) => {
                    engine.run_command_with(
                        self,
                        Command::GenMove,
                        &color.letter().to_string(),
                        engine_move,
                    )?;
                }
                Followup::Undo => {
                    engine.run_command(self, Command::Undo, "")?;
                }
            }
        }
        Ok(())
    }

    fn human_turn(&mut self) -> Option<Color> {
        let Some(color) = self.to_move() else {
            self.notice("the game is over");
            return None;
        };
        if !self.manual && color != self.human {
            self.notice(format!("waiting for {color}"));
            return None;
        }
        Some(color)
    }

    /// The player to move places a stone at `c`.
    ///
    /// Returns whether the stone was placed.
    pub fn play(&mut self, engine: Option<&mut Engine>, c: Coord) -> Result<bool, GtpError> {
        let Some(color) = self.human_turn() else {
            return Ok(false);
        };

        self.transition(Phase::Confirm(color));
        if let Err(e) = self.board.place(color, c) {
            self.notice(format!("{e}"));
            self.transition(Phase::ToMove(color));
            return Ok(false);
        }
        self.transition(Phase::ToMove(color.opposite()));

        if let Some(engine) = engine {
            engine.play(self, color, Vertex::Play(c), Some(Box::new(human_move_acked)))?;
            self.flush(engine)?;
        }
        Ok(true)
    }

    /// The player to move passes. A pass right after a pass ends the game.
    pub fn pass(&mut self, engine: Option<&mut Engine>) -> Result<(), GtpError> {
        let Some(color) = self.human_turn() else {
            return Ok(());
        };

        if self.board.last_move().is_some_and(|m| m.pass) {
            self.finish();
            return Ok(());
        }

        self.transition(Phase::Passed(color));
        self.board.pass(color);
        self.transition(Phase::ToMove(color.opposite()));

        if let Some(engine) = engine {
            engine.play(self, color, Vertex::Pass, Some(Box::new(human_move_acked)))?;
            self.flush(engine)?;
        }
        Ok(())
    }

    /// The player to move gives up.
    pub fn resign(&mut self) {
        let Some(color) = self.human_turn() else {
            return;
        };
        self.resign_as(color);
    }

    fn resign_as(&mut self, color: Color) {
        self.transition(Phase::Resigned(color));
        self.resigned = Some(color);
        self.notice(format!("{color} resigned."));
        self.finish();
    }

    /// Take back moves. In manual mode the last move is undone. Against an
    /// engine, moves are undone up to and including the human's last move,
    /// and the engine is told to undo the same number of moves.
    pub fn undo(&mut self, engine: Option<&mut Engine>) -> Result<bool, GtpError> {
        if self.human_turn().is_none() {
            return Ok(false);
        }

        let mut last_undone = None;
        while let Some(player) = self.board.last_move().map(|m| m.player) {
            if !self.board.undo() {
                break;
            }
            last_undone = Some(player);
            if !self.manual {
                self.followups.push_back(Followup::Undo);
            }
            if self.manual || player == self.human {
                break;
            }
        }

        let Some(player) = last_undone else {
            self.notice("nothing to undo");
            return Ok(false);
        };
        self.transition(Phase::ToMove(player));
        if self.awaiting_engine() {
            self.followups.push_back(Followup::GenMove(player));
        }

        if let Some(engine) = engine {
            self.flush(engine)?;
        }
        Ok(true)
    }

    /// Ask the engine what it would play for the human, without changing
    /// its state.
    pub fn hint(&mut self, engine: &mut Engine) -> Result<(), GtpError> {
        let Some(color) = self.human_turn() else {
            return Ok(());
        };
        engine.run_command_with(
            self,
            Command::RegGenMove,
            &color.letter().to_string(),
            move |game, reply| {
                let hint = match reply {
                    Ok(Value::Vertex(Vertex::Play(c))) => vertex_name(c, game.board.height()),
                    Ok(Value::Vertex(Vertex::Pass)) => "pass".to_string(),
                    Ok(Value::Vertex(Vertex::Resign)) => "resign".to_string(),
                    Ok(_) => return false,
                    Err(msg) => {
                        game.notice(format!("no hint: {msg}"));
                        return false;
                    }
                };
                game.notice(format!("engine suggests {hint} for {color}"));
                false
            },
        )?;
        Ok(())
    }

    /// Scores of both players.
    pub fn scores(&self) -> (u32, u32) {
        (self.board.score(Color::Black), self.board.score(Color::White))
    }

    /// The final result, e.g. `black wins! (B+3)`.
    pub fn result(&self) -> String {
        if let Some(loser) = self.resigned {
            return format!("{} wins by resignation", loser.opposite());
        }
        let (black, white) = self.scores();
        if black > white {
            format!("black wins! (B+{})", black - white)
        } else if white > black {
            format!("white wins! (W+{})", white - black)
        } else {
            "it's a tie.".to_string()
        }
    }

    /// One-line status for the user.
    pub fn status(&self) -> String {
        match self.phase {
            Phase::ToMove(color) => {
                let mut status = if self.awaiting_engine() {
                    format!("waiting for {color}")
                } else {
                    format!("{color} to play")
                };
                if let Some(summary) = self.board.last_move_summary() {
                    status.push_str(&format!(" ({summary})"));
                }
                status
            }
            Phase::Confirm(color) => format!("{color} has played."),
            Phase::Passed(color) => format!("{color} passed."),
            Phase::Resigned(color) => format!("{color} resigned."),
            Phase::GameOver => self.result(),
        }
    }
}

/// Check the reply to `protocol_version`.
fn check_version(game: &mut Game, reply: Reply) -> bool {
    match reply {
        Ok(Value::Int(PROTOCOL_VERSION)) => {}
        Ok(other) => game.failure = Some(GameError::ProtocolVersion(format!("{other:?}"))),
        Err(msg) => game.failure = Some(GameError::ProtocolVersion(msg)),
    }
    false
}

/// The engine answered a human `play`. On success it is its turn; on
/// failure the move is taken back and the human moves again.
fn human_move_acked(game: &mut Game, reply: Reply) -> bool {
    let engine_color = game.human.opposite();
    match reply {
        Ok(_) => {
            if game.to_move() == Some(engine_color) {
                game.followups.push_back(Followup::GenMove(engine_color));
            }
            false
        }
        Err(msg) => {
            warn!("engine rejected move: {msg}");
            game.notice(format!("engine rejected move: {msg}"));
            if game.to_move() == Some(engine_color) && game.board.undo() {
                game.transition(Phase::ToMove(game.human));
                true
            } else {
                false
            }
        }
    }
}

/// The engine answered `genmove`.
fn engine_move(game: &mut Game, reply: Reply) -> bool {
    let Some(color) = game.to_move() else {
        return false;
    };

    let vertex = match reply {
        Ok(Value::Vertex(v)) => v,
        Ok(_) => return false,
        Err(msg) => {
            warn!("genmove failed: {msg}");
            game.notice(format!("engine failed to move: {msg}"));
            return false;
        }
    };

    match vertex {
        Vertex::Resign => game.resign_as(color),
        Vertex::Pass if game.board.last_move().is_some_and(|m| m.pass) => {
            game.notice(format!("{color} passed."));
            game.finish();
        }
        Vertex::Pass => {
            game.transition(Phase::Passed(color));
            game.board.pass(color);
            game.transition(Phase::ToMove(color.opposite()));
        }
        Vertex::Play(c) => {
            info!("{color} engine placing stone at ({}, {})", c.x, c.y);
            game.transition(Phase::Confirm(color));
            if let Err(e) = game.board.place(color, c) {
                warn!("engine move {} is illegal here: {e}", vertex_name(c, game.board.height()));
                game.notice(format!("engine played an illegal move: {e}"));
            }
            game.transition(Phase::ToMove(color.opposite()));
        }
    }
    true
}
