//! Integration tests for sgo
//!
//! Board rules are exercised through the public API only, and the protocol
//! client and game flow are driven by a scripted engine: responses are
//! queued on a channel ahead of time and everything the client writes is
//! captured for inspection.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crossbeam_channel::{Sender, unbounded};

use sgo::board::{Board, MoveError};
use sgo::coord::{Color, Coord, Vertex, parse_vertex, vertex_name};
use sgo::game::{Engine, Game, GameError, Phase};
use sgo::gtp::{Command, GtpClient, GtpError, Reply, Value};
use sgo::transport::ChannelReader;

// =============================================================================
// Helper functions
// =============================================================================

/// Board with setup stones given as vertices.
fn setpos(size: u8, black: &[&str], white: &[&str]) -> Board {
    let mut b = Board::new(size, size).unwrap();
    for (color, stones) in [(Color::Black, black), (Color::White, white)] {
        for v in stones {
            b.setup(color, at(&b, v)).unwrap();
        }
    }
    b
}

/// Coordinate of vertex `v` on `b`.
fn at(b: &Board, v: &str) -> Coord {
    match parse_vertex(v, b.width(), b.height()).unwrap() {
        Vertex::Play(c) => c,
        other => panic!("not a point: {other:?}"),
    }
}

/// Grid and capture counters, for comparing positions.
fn snapshot(b: &Board) -> (String, u32, u32) {
    (
        b.to_string(),
        b.captured(Color::Black),
        b.captured(Color::White),
    )
}

#[derive(Clone, Default)]
struct Sent(Rc<RefCell<Vec<u8>>>);

impl Write for Sent {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sent {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.borrow().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// A client whose engine is scripted through the returned sender.
fn scripted<C: sgo::gtp::BoardContext>() -> (GtpClient<C>, Sender<Vec<u8>>, Sent) {
    let (tx, rx) = unbounded();
    let sent = Sent::default();
    (GtpClient::new(ChannelReader::new(rx), sent.clone()), tx, sent)
}

/// Record every reply into a shared vector.
fn recorder(log: &Rc<RefCell<Vec<Reply>>>) -> impl FnOnce(&mut Board, Reply) -> bool + 'static {
    let log = log.clone();
    move |_: &mut Board, reply: Reply| {
        log.borrow_mut().push(reply);
        false
    }
}

const HANDSHAKE: &[u8] = b"=1 2\n\n=2\n\n=3\n\n=4 GNU Go\n\n";

/// A 9x9 game against a scripted engine that has completed the handshake.
fn connected(human: Color) -> (Game, Engine, Sender<Vec<u8>>, Sent) {
    let mut game = Game::new(Board::new(9, 9).unwrap(), human, false);
    let (mut engine, tx, sent) = scripted::<Game>();
    tx.send(HANDSHAKE.to_vec()).unwrap();
    game.connect(&mut engine, 6.5).unwrap();
    (game, engine, tx, sent)
}

// =============================================================================
// Board rules
// =============================================================================

#[test]
fn test_smallest_board_corner_is_legal() {
    let mut b = Board::new(2, 2).unwrap();
    let c = at(&b, "a2");
    assert_eq!(c, Coord::new(0, 0));
    assert!(b.is_legal(Color::Black, c));
    assert_eq!(b.place(Color::Black, c), Ok(1));
    assert_eq!(b.group_info(c, None), 2);
}

#[test]
fn test_capture_single_stone() {
    let mut b = setpos(5, &["b3", "d3", "c4"], &["c3"]);
    let expected = b.clone();

    let changed = b.place(Color::Black, at(&b, "c2")).unwrap();
    assert_eq!(changed, 2);
    assert_eq!(b.get(at(&b, "c3")), None);
    assert_eq!(b.captured(Color::White), 1);
    assert_eq!(b.captured(Color::Black), 0);
    assert_eq!(b.last_move().unwrap().removed, vec![at(&b, "c3")]);
    assert_eq!(b.last_move_summary().unwrap(), "last move c2, removed 1");

    assert!(b.undo());
    assert_eq!(snapshot(&b), snapshot(&expected));
}

#[test]
fn test_surround_lone_stone_by_placement() {
    let mut b = Board::new(5, 5).unwrap();
    b.place(Color::White, Coord::new(2, 2)).unwrap();
    for c in [Coord::new(1, 2), Coord::new(3, 2), Coord::new(2, 1)] {
        assert_eq!(b.place(Color::Black, c), Ok(1));
    }
    let lost_before = b.captured(Color::White);

    assert_eq!(b.place(Color::Black, Coord::new(2, 3)), Ok(2));
    assert_eq!(b.captured(Color::White), lost_before + 1);
    assert_eq!(b.get(Coord::new(2, 2)), None);
}

#[test]
fn test_capture_multiple_groups() {
    // Two separate white stones in the corners both lose their last
    // liberty to the same black stone on a 3x3 board.
    let mut b = setpos(3, &["a2", "c2"], &["a1", "c1"]);
    assert_eq!(b.place(Color::Black, at(&b, "b1")), Ok(3));
    assert_eq!(b.captured(Color::White), 2);
    assert_eq!(b.get(at(&b, "a1")), None);
    assert_eq!(b.get(at(&b, "c1")), None);

    assert!(b.undo());
    assert_eq!(b.get(at(&b, "a1")), Some(Color::White));
    assert_eq!(b.get(at(&b, "c1")), Some(Color::White));
    assert_eq!(b.get(at(&b, "b1")), None);
    assert_eq!(b.captured(Color::White), 0);
}

#[test]
fn test_ko_recapture_is_illegal() {
    let mut b = setpos(5, &["b5", "a4", "b3"], &["c5", "d4", "c3"]);
    b.place(Color::White, at(&b, "b4")).unwrap();
    assert_eq!(b.place(Color::Black, at(&b, "c4")), Ok(2));

    // White may not retake immediately.
    assert!(!b.is_legal(Color::White, at(&b, "b4")));
    assert_eq!(b.place(Color::White, at(&b, "b4")), Err(MoveError::Ko));

    // After an exchange elsewhere the retake is fine.
    b.place(Color::White, at(&b, "e1")).unwrap();
    b.place(Color::Black, at(&b, "a1")).unwrap();
    assert!(b.is_legal(Color::White, at(&b, "b4")));
    assert_eq!(b.place(Color::White, at(&b, "b4")), Ok(2));
}

#[test]
fn test_pass_clears_ko() {
    let mut b = setpos(5, &["b5", "a4", "b3"], &["c5", "d4", "c3"]);
    b.place(Color::White, at(&b, "b4")).unwrap();
    b.place(Color::Black, at(&b, "c4")).unwrap();
    assert!(!b.is_legal(Color::White, at(&b, "b4")));

    b.pass(Color::White);
    b.pass(Color::Black);
    assert!(b.is_legal(Color::White, at(&b, "b4")));
}

#[test]
fn test_suicide_and_occupied() {
    let mut b = setpos(5, &["a4", "b5"], &[]);
    assert_eq!(b.place(Color::White, at(&b, "a5")), Err(MoveError::Suicide));
    assert_eq!(b.place(Color::White, at(&b, "a4")), Err(MoveError::Occupied));
    assert_eq!(
        b.place(Color::White, Coord::new(5, 0)),
        Err(MoveError::OutOfBounds)
    );
    // Nothing was recorded for the rejected moves.
    assert!(b.history().last().unwrap().setup);
}

#[test]
fn test_undo_on_fresh_board() {
    let mut b = Board::new(9, 9).unwrap();
    assert!(!b.undo());
    assert!(b.last_move().is_none());
}

#[test]
fn test_random_play_then_undo_restores_every_position() {
    for seed in [1u64, 7, 42, 1234] {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut b = Board::new(7, 7).unwrap();
        let mut positions = vec![snapshot(&b)];
        let mut color = Color::Black;

        for _ in 0..300 {
            if rng.u8(0..20) == 0 {
                b.pass(color);
            } else {
                let c = Coord::new(rng.u8(0..7), rng.u8(0..7));
                if b.place(color, c).is_err() {
                    continue;
                }
            }
            positions.push(snapshot(&b));
            color = color.opposite();
        }

        positions.pop();
        while let Some(expected) = positions.pop() {
            assert!(b.undo(), "seed {seed}: undo failed early");
            assert_eq!(snapshot(&b), expected, "seed {seed}");
        }
        assert!(!b.undo());
    }
}

#[test]
fn test_history_branches_after_undo() {
    let mut b = Board::new(9, 9).unwrap();
    b.place(Color::Black, at(&b, "e5")).unwrap();
    let first = b.history().current().unwrap();
    b.place(Color::White, at(&b, "c3")).unwrap();
    assert!(b.undo());
    b.place(Color::White, at(&b, "g7")).unwrap();

    assert_eq!(b.history().children(first).len(), 2);
    let line: Vec<String> = b
        .history()
        .line()
        .iter()
        .map(|m| vertex_name(m.placed, 9))
        .collect();
    assert_eq!(line, vec!["e5", "g7"]);
}

#[test]
fn test_scores() {
    let b = Board::new(9, 9).unwrap();
    assert_eq!((b.score(Color::Black), b.score(Color::White)), (0, 0));

    // Black wall on column c, white wall on column e of a 5x5 board.
    let b = setpos(
        5,
        &["c1", "c2", "c3", "c4", "c5"],
        &["e1", "e2", "e3", "e4", "e5"],
    );
    assert_eq!(b.score(Color::Black), 10);
    assert_eq!(b.score(Color::White), 0);
}

#[test]
fn test_score_counts_captures() {
    let mut b = setpos(5, &["b3", "d3", "c4"], &["c3", "a1"]);
    b.place(Color::Black, at(&b, "c2")).unwrap();
    // The emptied point is black territory; the outer region touches both
    // colors.
    assert_eq!(b.score(Color::Black), 2);
    assert_eq!(b.score(Color::White), 0);
}

// =============================================================================
// Protocol client
// =============================================================================

#[test]
fn test_genmove_reply_invokes_callback_once() {
    let (mut c, tx, sent) = scripted::<Board>();
    let mut board = Board::new(9, 9).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    let id = c
        .run_command_with(&mut board, Command::GenMove, "b", recorder(&log))
        .unwrap();
    assert_eq!(id, 1);
    assert_eq!(sent.lines(), vec!["1 genmove b"]);

    tx.send(b"=1 D4\n\n".to_vec()).unwrap();
    assert_eq!(c.pump(&mut board).unwrap(), 1);
    assert_eq!(c.pump(&mut board).unwrap(), 0);
    assert_eq!(
        *log.borrow(),
        vec![Ok(Value::Vertex(Vertex::Play(Coord::new(3, 5))))]
    );
}

#[test]
fn test_garbage_then_valid_response() {
    let (mut c, tx, _sent) = scripted::<Board>();
    let mut board = Board::new(9, 9).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    c.run_command_with(&mut board, Command::GenMove, "w", recorder(&log))
        .unwrap();

    tx.send(b"this is not gtp\n\n=1 pass\n\n".to_vec()).unwrap();
    c.pump(&mut board).unwrap();
    assert_eq!(*log.borrow(), vec![Ok(Value::Vertex(Vertex::Pass))]);
}

#[test]
fn test_out_of_order_responses() {
    let (mut c, tx, _sent) = scripted::<Board>();
    let mut board = Board::new(9, 9).unwrap();
    let first = Rc::new(RefCell::new(Vec::new()));
    let second = Rc::new(RefCell::new(Vec::new()));
    c.run_command_with(&mut board, Command::GenMove, "b", recorder(&first))
        .unwrap();
    c.run_command_with(&mut board, Command::RegGenMove, "w", recorder(&second))
        .unwrap();

    tx.send(b"=2 C3\n\n".to_vec()).unwrap();
    assert_eq!(c.pump(&mut board).unwrap(), 1);
    assert!(first.borrow().is_empty());
    tx.send(b"=1 D4\n\n".to_vec()).unwrap();
    assert_eq!(c.pump(&mut board).unwrap(), 1);

    assert_eq!(
        *first.borrow(),
        vec![Ok(Value::Vertex(Vertex::Play(Coord::new(3, 5))))]
    );
    assert_eq!(
        *second.borrow(),
        vec![Ok(Value::Vertex(Vertex::Play(Coord::new(2, 6))))]
    );
    assert_eq!(c.pending(), 0);
}

#[test]
fn test_response_split_into_single_bytes() {
    let (mut c, tx, _sent) = scripted::<Board>();
    let mut board = Board::new(9, 9).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    c.run_command_with(&mut board, Command::Name, "", recorder(&log))
        .unwrap();

    for &byte in b"=1 GNU Go\n" {
        tx.send(vec![byte]).unwrap();
        assert_eq!(c.pump(&mut board).unwrap(), 0);
    }
    tx.send(b"\n".to_vec()).unwrap();
    assert_eq!(c.pump(&mut board).unwrap(), 1);
    assert_eq!(*log.borrow(), vec![Ok(Value::Text("GNU Go".to_string()))]);
}

#[test]
fn test_callback_change_marks_board() {
    let (mut c, tx, _sent) = scripted::<Board>();
    let mut board = Board::new(9, 9).unwrap();
    c.run_command_with(&mut board, Command::GenMove, "b", |board, reply| {
        match reply {
            Ok(Value::Vertex(Vertex::Play(c))) => board.place(Color::Black, c).is_ok(),
            _ => false,
        }
    })
    .unwrap();
    board.clear_changed();

    tx.send(b"=1 e5\n\n".to_vec()).unwrap();
    c.pump(&mut board).unwrap();
    assert!(board.changed());
    assert_eq!(board.get(Coord::new(4, 4)), Some(Color::Black));
}

#[test]
fn test_engine_hangup_is_fatal() {
    let (mut c, tx, _sent) = scripted::<Board>();
    let mut board = Board::new(9, 9).unwrap();
    tx.send(b"=1\n\n".to_vec()).unwrap();
    drop(tx);
    assert!(matches!(
        c.run_command(&mut board, Command::Quit, ""),
        Err(GtpError::EndOfStream)
    ));
}

// =============================================================================
// Game flow against a scripted engine
// =============================================================================

#[test]
fn test_handshake() {
    let (mut game, _engine, _tx, sent) = connected(Color::Black);
    assert_eq!(
        sent.lines(),
        vec!["1 protocol_version", "2 boardsize 9", "3 komi 6.5", "4 name"]
    );
    assert_eq!(game.take_notices(), vec!["connected to \"GNU Go\""]);
    assert_eq!(game.phase(), Phase::ToMove(Color::Black));
}

#[test]
fn test_handshake_rejects_protocol_version() {
    let mut game = Game::new(Board::new(9, 9).unwrap(), Color::Black, false);
    let (mut engine, tx, _sent) = scripted::<Game>();
    tx.send(b"=1 1\n\n".to_vec()).unwrap();
    assert!(matches!(
        game.connect(&mut engine, 6.5),
        Err(GameError::ProtocolVersion(_))
    ));
}

#[test]
fn test_engine_needs_square_board() {
    let mut game = Game::new(Board::new(9, 13).unwrap(), Color::Black, false);
    let (mut engine, _tx, sent) = scripted::<Game>();
    assert!(matches!(
        game.connect(&mut engine, 6.5),
        Err(GameError::NonSquareBoard { width: 9, height: 13 })
    ));
    assert!(sent.lines().is_empty());
}

#[test]
fn test_engine_opens_when_human_is_white() {
    let (game, _engine, _tx, sent) = connected(Color::White);
    assert_eq!(sent.lines().last().unwrap(), "5 genmove b");
    assert!(game.awaiting_engine());
    assert_eq!(game.status(), "waiting for black");
}

#[test]
fn test_human_move_then_engine_reply() {
    let (mut game, mut engine, tx, sent) = connected(Color::Black);
    tx.send(b"=5\n\n=6 E5\n\n".to_vec()).unwrap();

    assert!(game.play(Some(&mut engine), Coord::new(3, 5)).unwrap());
    assert_eq!(&sent.lines()[4..], ["5 play b d4", "6 genmove w"]);
    assert_eq!(game.board().get(Coord::new(3, 5)), Some(Color::Black));
    assert_eq!(game.board().get(Coord::new(4, 4)), Some(Color::White));
    assert_eq!(game.phase(), Phase::ToMove(Color::Black));
    assert_eq!(game.status(), "black to play (last move e5, removed 0)");
}

#[test]
fn test_engine_reply_arrives_later() {
    let (mut game, mut engine, tx, sent) = connected(Color::Black);
    game.play(Some(&mut engine), Coord::new(3, 5)).unwrap();
    assert!(game.awaiting_engine());
    assert_eq!(sent.lines().len(), 5);

    tx.send(b"=5\n\n".to_vec()).unwrap();
    engine.pump(&mut game).unwrap();
    game.flush(&mut engine).unwrap();
    assert_eq!(sent.lines().last().unwrap(), "6 genmove w");

    // Human input while the engine thinks is refused.
    assert!(!game.play(Some(&mut engine), Coord::new(0, 0)).unwrap());
    assert_eq!(game.board().get(Coord::new(0, 0)), None);

    tx.send(b"=6 c7\n\n".to_vec()).unwrap();
    engine.pump(&mut game).unwrap();
    assert_eq!(game.board().get(Coord::new(2, 2)), Some(Color::White));
    assert_eq!(game.to_move(), Some(Color::Black));
}

#[test]
fn test_engine_rejection_undoes_move() {
    let (mut game, mut engine, tx, _sent) = connected(Color::Black);
    game.take_notices();
    tx.send(b"?5 illegal move\n\n".to_vec()).unwrap();

    game.play(Some(&mut engine), Coord::new(3, 5)).unwrap();
    assert_eq!(game.board().get(Coord::new(3, 5)), None);
    assert!(game.board().last_move().is_none());
    assert_eq!(game.phase(), Phase::ToMove(Color::Black));
    assert_eq!(game.take_notices(), vec!["engine rejected move: illegal move"]);
}

#[test]
fn test_undo_against_engine_undoes_both_moves() {
    let (mut game, mut engine, tx, sent) = connected(Color::Black);
    tx.send(b"=5\n\n=6 E5\n\n".to_vec()).unwrap();
    game.play(Some(&mut engine), Coord::new(3, 5)).unwrap();

    assert!(game.undo(Some(&mut engine)).unwrap());
    assert_eq!(&sent.lines()[6..], ["7 undo", "8 undo"]);
    assert!(game.board().last_move().is_none());
    assert_eq!(game.board().get(Coord::new(3, 5)), None);
    assert_eq!(game.board().get(Coord::new(4, 4)), None);
    assert_eq!(game.to_move(), Some(Color::Black));
}

#[test]
fn test_pass_then_engine_pass_ends_game() {
    let (mut game, mut engine, tx, sent) = connected(Color::Black);
    tx.send(b"=5\n\n=6 PASS\n\n".to_vec()).unwrap();

    game.pass(Some(&mut engine)).unwrap();
    assert_eq!(&sent.lines()[4..], ["5 play b pass", "6 genmove w"]);
    assert!(game.is_over());
    assert_eq!(game.result(), "it's a tie.");
}

#[test]
fn test_engine_resigns() {
    let (mut game, mut engine, tx, _sent) = connected(Color::Black);
    tx.send(b"=5\n\n=6 resign\n\n".to_vec()).unwrap();
    game.play(Some(&mut engine), Coord::new(4, 4)).unwrap();

    assert!(game.is_over());
    assert_eq!(game.result(), "black wins by resignation");
    assert!(
        game.take_notices()
            .contains(&"white resigned.".to_string())
    );
}

#[test]
fn test_hint_reports_suggestion() {
    let (mut game, mut engine, tx, sent) = connected(Color::Black);
    game.take_notices();
    tx.send(b"=5 C3\n\n".to_vec()).unwrap();

    game.hint(&mut engine).unwrap();
    assert_eq!(sent.lines().last().unwrap(), "5 reg_genmove b");
    assert_eq!(game.take_notices(), vec!["engine suggests c3 for black"]);
    assert!(game.board().last_move().is_none());
}

#[test]
fn test_manual_game_result_margin() {
    let mut game = Game::new(Board::new(5, 5).unwrap(), Color::Black, true);
    for v in ["c1", "a1", "c2", "a2", "c3", "a3", "c4", "a4", "c5", "a5"] {
        let c = at(game.board(), v);
        assert!(game.play(None, c).unwrap(), "{v}");
    }
    game.pass(None).unwrap();
    game.pass(None).unwrap();
    assert!(game.is_over());
    // Black: columns d and e (10). White: column b is shared, so nothing.
    assert_eq!(game.scores(), (10, 0));
    assert_eq!(game.result(), "black wins! (B+10)");
}
