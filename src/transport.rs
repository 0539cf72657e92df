//! Non-blocking byte streams for talking to an engine process.
//!
//! Pipes from a child process block on read, so a reader thread copies
//! the engine's stdout into a channel. [`ChannelReader`] turns that channel
//! back into a [`Read`] that never blocks: an empty channel reads as
//! [`io::ErrorKind::WouldBlock`], a closed one as end of stream.

use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;

use crossbeam_channel::{Receiver, TryRecvError, unbounded};
use tracing::{debug, warn};

use crate::constants::READ_BUF_SIZE;

/// Non-blocking [`Read`] over chunks received from a channel.
pub struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl ChannelReader {
    pub fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.chunk.len() {
            match self.rx.try_recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Err(TryRecvError::Empty) => return Err(io::ErrorKind::WouldBlock.into()),
                Err(TryRecvError::Disconnected) => return Ok(0),
            }
        }

        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Copy everything `source` produces into a channel from a background
/// thread. The channel closes when `source` reaches end of file or fails.
pub fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let mut buf = vec![0u8; READ_BUF_SIZE];
        loop {
            match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("engine read failed: {e}");
                    break;
                }
            }
        }
        debug!("engine output closed");
    });
    rx
}

/// Forward each line of `source` over a channel from a background thread.
pub fn spawn_line_reader<R: Read + Send + 'static>(source: R) -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in BufReader::new(source).lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// A running engine process and the two ends of its GTP connection.
pub struct EngineProcess {
    pub child: Child,
    pub stdin: ChildStdin,
    /// Raw engine output, also usable for readiness checks
    pub output: Receiver<Vec<u8>>,
}

impl EngineProcess {
    /// Start `program` with `args`, piping its stdin and stdout.
    pub fn spawn(program: &str, args: &[String]) -> io::Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(io::Error::other("engine pipes unavailable"));
        };
        let output = spawn_reader(stdout);
        Ok(Self { child, stdin, output })
    }

    /// A non-blocking reader over the engine's output.
    pub fn reader(&self) -> ChannelReader {
        ChannelReader::new(self.output.clone())
    }
}
