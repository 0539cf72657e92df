//! Go Text Protocol (GTP) client.
//!
//! GTP is a text-based protocol for communicating with Go-playing programs.
//! This module drives an external engine: commands are written as
//! `<id> <command>[ <args>]\n`, and responses are read back incrementally by
//! [`ResponseParser`] and matched to the command that caused them by id, so
//! replies may arrive in any order and long after the command was sent.
//!
//! Each command declares the [`Shape`] of its result. When a response is
//! matched, its payload is decoded into a [`Value`] and handed to the
//! command's callback together with the caller's context (typically the
//! game that owns the board).
//!
//! ## Supported Commands
//!
//! - `protocol_version`, `name`, `known_command`, `list_commands`, `quit`
//! - `boardsize`, `clear_board`, `komi`
//! - `play`, `genmove`, `undo`, `reg_genmove`
//!
//! ## Example
//!
//! ```ignore
//! use sgo::gtp::{Command, GtpClient};
//! let mut client = GtpClient::new(reader, writer);
//! client.run_command_with(&mut board, Command::GenMove, "b", |board, reply| {
//!     println!("engine says {reply:?}");
//!     false
//! })?;
//! client.pump(&mut board)?;
//! ```

use std::io::{self, Read, Write};

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::board::Board;
use crate::constants::READ_BUF_SIZE;
use crate::coord::{Color, Vertex, parse_vertex, vertex_name};
use crate::parser::{Response, ResponseParser};

/// Commands this client knows how to issue.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    ProtocolVersion,
    Name,
    KnownCommand,
    ListCommands,
    Quit,
    BoardSize,
    ClearBoard,
    Komi,
    Play,
    GenMove,
    Undo,
    RegGenMove,
}

impl Command {
    /// Wire name of the command.
    pub fn name(self) -> &'static str {
        match self {
            Command::ProtocolVersion => "protocol_version",
            Command::Name => "name",
            Command::KnownCommand => "known_command",
            Command::ListCommands => "list_commands",
            Command::Quit => "quit",
            Command::BoardSize => "boardsize",
            Command::ClearBoard => "clear_board",
            Command::Komi => "komi",
            Command::Play => "play",
            Command::GenMove => "genmove",
            Command::Undo => "undo",
            Command::RegGenMove => "reg_genmove",
        }
    }

    /// Shape of a successful response.
    pub fn shape(self) -> Shape {
        match self {
            Command::ProtocolVersion => Shape::Int,
            Command::Name | Command::KnownCommand | Command::ListCommands => Shape::Text,
            Command::GenMove | Command::RegGenMove => Shape::Vertex,
            Command::Quit
            | Command::BoardSize
            | Command::ClearBoard
            | Command::Komi
            | Command::Play
            | Command::Undo => Shape::Empty,
        }
    }
}

/// Expected form of a response payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Shape {
    Empty,
    Int,
    Float,
    Text,
    Vertex,
}

/// A decoded response payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Empty,
    Int(u32),
    Float(f32),
    Text(String),
    Vertex(Vertex),
}

/// What a callback receives: the decoded value, or the engine's failure
/// message.
pub type Reply = Result<Value, String>;

/// Called once with the reply to a command. Returns `true` if it changed
/// the board.
pub type Callback<C> = Box<dyn FnOnce(&mut C, Reply) -> bool>;

/// Access to the board a client issues moves for and decodes vertices
/// against.
pub trait BoardContext {
    fn board(&self) -> &Board;
    fn board_mut(&mut self) -> &mut Board;
}

impl BoardContext for Board {
    fn board(&self) -> &Board {
        self
    }

    fn board_mut(&mut self) -> &mut Board {
        self
    }
}

/// Fatal protocol errors. The engine is required, so losing it ends the
/// session.
#[derive(Debug, Error)]
pub enum GtpError {
    #[error("unexpected end of file from engine")]
    EndOfStream,

    #[error("engine i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// A command waiting for its response.
struct Query<C> {
    command: &'static str,
    shape: Shape,
    callback: Option<Callback<C>>,
}

/// GTP client state: transport, parser context and pending commands.
pub struct GtpClient<C> {
    reader: Box<dyn Read>,
    writer: Box<dyn Write>,
    parser: ResponseParser,
    counter: u32,
    queries: FxHashMap<u32, Query<C>>,
    responses: FxHashMap<u32, Response>,
    scratch: Vec<Response>,
}

impl<C: BoardContext> GtpClient<C> {
    /// Create a client. `reader` must report "no data yet" as
    /// [`io::ErrorKind::WouldBlock`] and end of stream as `Ok(0)`.
    pub fn new(reader: impl Read + 'static, writer: impl Write + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            parser: ResponseParser::new(),
            counter: 0,
            queries: FxHashMap::default(),
            responses: FxHashMap::default(),
            scratch: Vec::new(),
        }
    }

    /// Number of commands still waiting for a response.
    pub fn pending(&self) -> usize {
        self.queries.len()
    }

    /// Number of parsed responses that no command has claimed yet.
    pub fn unmatched(&self) -> usize {
        self.responses.len()
    }

    /// Issue `command` without a callback. Returns the id it was sent with.
    pub fn run_command(
        &mut self,
        ctx: &mut C,
        command: Command,
        args: &str,
    ) -> Result<u32, GtpError> {
        self.issue(ctx, command.name(), args, command.shape(), None)
    }

    /// Issue `command` and call `callback` with its decoded reply.
    pub fn run_command_with(
        &mut self,
        ctx: &mut C,
        command: Command,
        args: &str,
        callback: impl FnOnce(&mut C, Reply) -> bool + 'static,
    ) -> Result<u32, GtpError> {
        self.issue(ctx, command.name(), args, command.shape(), Some(Box::new(callback)))
    }

    /// Issue an arbitrary command whose reply is decoded as `shape`.
    pub fn run_raw(
        &mut self,
        ctx: &mut C,
        command: &'static str,
        args: &str,
        shape: Shape,
        callback: Option<Callback<C>>,
    ) -> Result<u32, GtpError> {
        self.issue(ctx, command, args, shape, callback)
    }

    /// Tell the engine that `color` played `vertex`.
    pub fn play(
        &mut self,
        ctx: &mut C,
        color: Color,
        vertex: Vertex,
        callback: Option<Callback<C>>,
    ) -> Result<u32, GtpError> {
        let target = match vertex {
            Vertex::Play(c) => vertex_name(c, ctx.board().height()),
            Vertex::Pass => "pass".to_string(),
            Vertex::Resign => "resign".to_string(),
        };
        let args = format!("{} {target}", color.letter());
        self.issue(ctx, Command::Play.name(), &args, Shape::Empty, callback)
    }

    fn issue(
        &mut self,
        ctx: &mut C,
        command: &'static str,
        args: &str,
        shape: Shape,
        callback: Option<Callback<C>>,
    ) -> Result<u32, GtpError> {
        self.counter = self.counter.wrapping_add(1);
        let id = self.counter;
        self.queries.insert(id, Query { command, shape, callback });

        let line = if args.is_empty() {
            format!("{id} {command}\n")
        } else {
            format!("{id} {command} {args}\n")
        };
        debug!("run: {}", line.trim_end());
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;

        self.pump(ctx)?;
        Ok(id)
    }

    /// Read everything the engine has sent so far, then deliver every
    /// response that matches a pending command.
    ///
    /// Returns the number of command/response pairs consumed.
    pub fn pump(&mut self, ctx: &mut C) -> Result<usize, GtpError> {
        self.read_available()?;
        Ok(self.dispatch(ctx))
    }

    fn read_available(&mut self) -> Result<(), GtpError> {
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Err(GtpError::EndOfStream),
                Ok(n) => self.parser.feed(&buf[..n], &mut self.scratch),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        for r in self.scratch.drain(..) {
            if let Some(old) = self.responses.insert(r.id, r) {
                warn!("duplicate response for id {}, dropping the older one", old.id);
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, ctx: &mut C) -> usize {
        let mut ready: Vec<u32> = self
            .responses
            .keys()
            .copied()
            .filter(|id| self.queries.contains_key(id))
            .collect();
        ready.sort_unstable();

        for id in &ready {
            let (Some(query), Some(response)) = (self.queries.remove(id), self.responses.remove(id))
            else {
                continue;
            };
            if handle_response(ctx, query, response) {
                ctx.board_mut().mark_changed();
            }
        }
        ready.len()
    }
}

/// Decode `response` for `query` and run its callback.
fn handle_response<C: BoardContext>(ctx: &mut C, query: Query<C>, response: Response) -> bool {
    let Query { command, shape, callback } = query;

    let reply = if response.error {
        debug!("{command} failed: {}", response.payload.trim_end());
        Err(response.payload.trim_end().to_string())
    } else {
        match decode(ctx.board(), shape, &response.payload) {
            Some(value) => Ok(value),
            None => return false,
        }
    };

    match callback {
        Some(cb) => cb(ctx, reply),
        None => false,
    }
}

/// Decode a payload into `shape`. Failures are logged and yield `None`.
fn decode(board: &Board, shape: Shape, payload: &str) -> Option<Value> {
    let token = payload.split_whitespace().next().unwrap_or_default();
    match shape {
        Shape::Empty => Some(Value::Empty),
        Shape::Int => match token.parse::<u32>() {
            Ok(v) => Some(Value::Int(v)),
            Err(_) => {
                warn!("invalid int ({})", payload.trim_end());
                None
            }
        },
        Shape::Float => match token.parse::<f32>() {
            Ok(v) => Some(Value::Float(v)),
            Err(_) => {
                warn!("invalid float ({})", payload.trim_end());
                None
            }
        },
        Shape::Text => Some(Value::Text(payload.trim_end().to_string())),
        Shape::Vertex => match parse_vertex(payload, board.width(), board.height()) {
            Ok(v) => Some(Value::Vertex(v)),
            Err(e) => {
                warn!("{e}");
                None
            }
        },
    }
}
