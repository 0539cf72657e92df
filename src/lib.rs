//! sgo: a small Go board with a GTP engine client.
//!
//! This crate keeps the state of a game of Go (stones, captures, history)
//! and talks to an external Go engine over the Go Text Protocol, so a human
//! can play against the engine or against another human on the same board.
//!
//! ## Modules
//!
//! - [`constants`] - Board limits and protocol constants
//! - [`coord`] - Colors, coordinates and GTP vertex conversion
//! - [`history`] - Move records in an arena-backed tree
//! - [`board`] - Rules: legality, ko, captures, undo and scoring
//! - [`parser`] - Incremental GTP response parser
//! - [`gtp`] - Id-correlated GTP client with typed callbacks
//! - [`transport`] - Non-blocking pipes to an engine process
//! - [`game`] - Turn order and the human/engine game flow
//!
//! ## Example
//!
//! ```
//! use sgo::board::Board;
//! use sgo::coord::{Color, Coord};
//!
//! let mut board = Board::new(9, 9).unwrap();
//! board.place(Color::Black, Coord::new(2, 6)).unwrap();
//! assert_eq!(board.last_move_summary().unwrap(), "last move c3, removed 0");
//! assert!(board.undo());
//! ```

pub mod board;
pub mod constants;
pub mod coord;
pub mod game;
pub mod gtp;
pub mod history;
pub mod parser;
pub mod transport;
