//! sgo: play Go in the terminal, against another human or a GTP engine.
//!
//! ## Usage
//!
//! - `sgo --manual` - Two players at one terminal
//! - `sgo gnugo --mode gtp` - Play black against GNU Go
//! - `sgo -c w -s 13x13 -- gnugo --mode gtp` - Play white on 13x13
//!
//! Moves are typed as vertices (`d4`), or one of `pass`, `resign`, `undo`,
//! `hint`, `score`, `board`, `help`, `quit`.

use std::io;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossbeam_channel::{Receiver, Select, TryRecvError};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use sgo::board::Board;
use sgo::constants::{DEFAULT_KOMI, DEFAULT_SIZE, POLL_TIMEOUT};
use sgo::coord::Color;
use sgo::game::{Action, Engine, Game, GameError};
use sgo::gtp::Command;
use sgo::transport::{EngineProcess, spawn_line_reader};

/// Board dimensions given as `HxW` (or a single number for a square board).
#[derive(Copy, Clone, Debug)]
struct BoardSize {
    height: u8,
    width: u8,
}

impl FromStr for BoardSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u8>()
                .map_err(|_| format!("invalid board size: {s}"))
        };
        match s.split_once(['x', 'X']) {
            Some((h, w)) => Ok(BoardSize {
                height: parse(h)?,
                width: parse(w)?,
            }),
            None => {
                let n = parse(s)?;
                Ok(BoardSize { height: n, width: n })
            }
        }
    }
}

/// sgo: a simple Go board with GTP engine support
#[derive(Parser)]
#[command(name = "sgo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Board size as HxW
    #[arg(short, long, default_value_t = format!("{DEFAULT_SIZE}x{DEFAULT_SIZE}"))]
    size: String,

    /// Two humans play; no engine is started
    #[arg(short, long)]
    manual: bool,

    /// Color the human plays against the engine (b or w)
    #[arg(short, long, default_value = "b")]
    color: Color,

    /// Komi sent to the engine
    #[arg(short, long, default_value_t = DEFAULT_KOMI)]
    komi: f32,

    /// Log engine identification and game events
    #[arg(short, long)]
    verbose: bool,

    /// Log every command sent to the engine
    #[arg(short = 'D', long)]
    debug: bool,

    /// Engine command line, e.g. `gnugo --mode gtp`
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required_unless_present = "manual"
    )]
    engine: Vec<String>,
}

/// The engine side of a session.
struct Session {
    client: Engine,
    output: Receiver<Vec<u8>>,
    process: std::process::Child,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let size: BoardSize = cli.size.parse().map_err(anyhow::Error::msg)?;
    let board = Board::new(size.width, size.height)?;
    let mut game = Game::new(board, cli.color, cli.manual);

    let mut session = if cli.manual {
        None
    } else {
        Some(start_engine(&cli, &mut game)?)
    };

    let input = spawn_line_reader(io::stdin());
    println!("type `help` for a list of commands");
    let result = run(&mut game, session.as_mut(), &input);

    if let Some(session) = session {
        shutdown(&mut game, session);
    }
    result
}

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn start_engine(cli: &Cli, game: &mut Game) -> Result<Session> {
    let Some((program, args)) = cli.engine.split_first() else {
        bail!("no engine given (use --manual to play without one)");
    };

    let process = EngineProcess::spawn(program, args)
        .with_context(|| format!("failed to start engine `{program}`"))?;
    info!("started engine {program} (pid {})", process.child.id());

    let reader = process.reader();
    let EngineProcess { child, stdin, output } = process;
    let mut client = Engine::new(reader, stdin);
    game.connect(&mut client, cli.komi).context("engine handshake failed")?;

    Ok(Session {
        client,
        output,
        process: child,
    })
}

/// Event loop: redraw when needed, then wait for engine output or a line
/// of user input and handle one of them.
fn run(
    game: &mut Game,
    mut session: Option<&mut Session>,
    input: &Receiver<String>,
) -> Result<()> {
    loop {
        for notice in game.take_notices() {
            println!("{notice}");
        }
        if game.board().changed() {
            redraw(game);
            continue;
        }
        if game.is_over() {
            return Ok(());
        }

        let (ready, input_op, engine_op) = {
            let mut sel = Select::new();
            let input_op = sel.recv(input);
            let engine_op = session.as_ref().map(|s| sel.recv(&s.output));
            match sel.ready_timeout(POLL_TIMEOUT) {
                Ok(ready) => (ready, input_op, engine_op),
                Err(_) => continue,
            }
        };

        if Some(ready) == engine_op {
            if let Some(s) = session.as_deref_mut() {
                s.client.pump(game).context("lost connection to engine")?;
                game.flush(&mut s.client)?;
                if let Some(e) = game.take_failure() {
                    return Err(e.into());
                }
            }
        } else if ready == input_op {
            let line = match input.try_recv() {
                Ok(line) => line,
                Err(TryRecvError::Empty) => continue,
                Err(TryRecvError::Disconnected) => return Ok(()),
            };
            if !handle_line(game, session.as_deref_mut(), &line)? {
                return Ok(());
            }
        }
    }
}

/// Handle one line of user input. Returns `false` when the user quits.
fn handle_line(game: &mut Game, session: Option<&mut Session>, line: &str) -> Result<bool> {
    let action = match Action::parse(line, game.board()) {
        Ok(Some(action)) => action,
        Ok(None) => return Ok(true),
        Err(e @ (GameError::UnknownInput(_) | GameError::Vertex(_))) => {
            println!("{e}");
            return Ok(true);
        }
        Err(e) => return Err(e.into()),
    };
    debug!("user action {action:?}");

    let mut client = session.map(|s| &mut s.client);
    match action {
        Action::Play(c) => {
            game.play(client.as_deref_mut(), c)?;
        }
        Action::Pass => game.pass(client.as_deref_mut())?,
        Action::Resign => game.resign(),
        Action::Undo => {
            game.undo(client.as_deref_mut())?;
        }
        Action::Hint => match client {
            Some(client) => game.hint(client)?,
            None => println!("hints need an engine"),
        },
        Action::Score => {
            let (black, white) = game.scores();
            println!("black: {black}, white: {white}");
        }
        Action::Board => game.board_mut().mark_changed(),
        Action::Help => print_help(),
        Action::Quit => return Ok(false),
    }
    Ok(true)
}

fn redraw(game: &mut Game) {
    let board = game.board();
    println!();
    print!("{board}");
    println!(
        "captured: black {}, white {}",
        board.captured(Color::Black),
        board.captured(Color::White)
    );
    println!("{}", game.status());
    game.board_mut().clear_changed();
}

fn print_help() {
    println!("commands:");
    println!("  <vertex>  place a stone, e.g. d4");
    println!("  pass      pass the turn");
    println!("  resign    give up the game");
    println!("  undo      take back your last move");
    println!("  hint      ask the engine for a suggestion");
    println!("  score     show the current scores");
    println!("  board     show the board again");
    println!("  quit      leave the game");
}

/// Say goodbye to the engine and wait for it to exit.
fn shutdown(game: &mut Game, session: Session) {
    let Session {
        mut client,
        output: _,
        mut process,
    } = session;

    if let Err(e) = client.run_command(game, Command::Quit, "") {
        debug!("quit not delivered: {e}");
    }
    drop(client);

    match process.wait() {
        Ok(status) => info!("engine exited with {status}"),
        Err(e) => warn!("failed to wait for engine: {e}"),
    }
}
