//! Incremental parser for GTP responses.
//!
//! A response looks like `=<id> <payload>\n\n` (success) or
//! `?<id> <payload>\n\n` (failure). Input arrives in arbitrary chunks, so
//! the parser keeps its whole state between calls to [`ResponseParser::feed`]:
//! a chunk may end anywhere, even between the two newlines that terminate
//! a response.
//!
//! Before interpretation each byte is preprocessed: tabs become spaces,
//! other control characters except newline are dropped, and `#` starts a
//! comment that runs to the end of the line. Input that does not look like
//! a response puts the parser into an error state, which it only leaves at
//! the next blank line.

/// Parser state between two bytes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ParserState {
    /// Between responses, expecting `=` or `?`
    #[default]
    Normal,
    /// Unparseable input; skipping to the next blank line
    Error,
    /// After the status character
    PreId,
    /// Reading the decimal id
    InId,
    /// Between id and payload
    PreResponse,
    /// Reading payload bytes
    InResponse,
    /// After a newline; a second one ends the response
    Newline,
    /// Inside a `#` comment
    InComment,
}

/// A complete response read from the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub id: u32,
    /// The status character was `?`
    pub error: bool,
    /// Payload text, including the line break that ends each payload line
    pub payload: String,
}

/// Byte-driven response parser. See the module documentation.
#[derive(Clone, Debug, Default)]
pub struct ResponseParser {
    state: ParserState,
    id: Option<u32>,
    error: bool,
    payload: Vec<u8>,
    prev: u8,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Process `bytes`, appending every response completed by them to `out`.
    pub fn feed(&mut self, bytes: &[u8], out: &mut Vec<Response>) {
        for &raw in bytes {
            let byte = match raw {
                b'\t' => b' ',
                b'#' if self.state == ParserState::Error => continue,
                b'#' => {
                    self.state = ParserState::InComment;
                    raw
                }
                b'\n' => raw,
                0..=31 => continue,
                _ => raw,
            };

            while !self.step(byte, out) {}
            self.prev = byte;
        }
    }

    /// Advance the state machine by one byte. Returns `false` if the byte
    /// has to be processed again in the new state.
    fn step(&mut self, byte: u8, out: &mut Vec<Response>) -> bool {
        use ParserState::*;

        match self.state {
            Normal => match byte {
                b'=' | b'?' => {
                    self.error = byte == b'?';
                    self.state = PreId;
                }
                b' ' => {}
                b'\n' => self.state = Newline,
                _ => self.fail(),
            },
            PreId => match byte {
                // Response without an id; nothing can be correlated.
                b'\n' => self.state = Normal,
                b' ' => {}
                b'0'..=b'9' => {
                    self.state = InId;
                    return false;
                }
                _ => self.fail(),
            },
            InId => match byte {
                b'0'..=b'9' => {
                    let digit = u32::from(byte - b'0');
                    match self.id.unwrap_or(0).checked_mul(10).and_then(|v| v.checked_add(digit)) {
                        Some(id) => self.id = Some(id),
                        None => self.fail(),
                    }
                }
                b'\n' => self.state = Newline,
                b' ' => self.state = PreResponse,
                _ => self.fail(),
            },
            PreResponse => match byte {
                b'\n' if self.prev == b'\n' => self.state = Normal,
                b'\n' => self.state = Newline,
                b' ' => {}
                _ => {
                    self.state = InResponse;
                    return false;
                }
            },
            InResponse => {
                if byte == b'\n' {
                    self.state = Newline;
                }
                self.payload.push(byte);
            }
            Newline => {
                if byte != b'\n' {
                    // A single line break inside a multi-line payload.
                    self.state = InResponse;
                    return false;
                }
                self.finish(out);
                self.state = Normal;
            }
            InComment => {
                if byte == b'\n' {
                    self.state = Newline;
                }
            }
            Error => {
                if byte == b'\n' && self.prev == b'\n' {
                    self.id = None;
                    self.payload.clear();
                    self.state = Normal;
                }
            }
        }
        true
    }

    /// Enter the error state, forgetting the id of the broken response.
    fn fail(&mut self) {
        self.id = None;
        self.state = ParserState::Error;
    }

    fn finish(&mut self, out: &mut Vec<Response>) {
        let payload = std::mem::take(&mut self.payload);
        if let Some(id) = self.id.take() {
            out.push(Response {
                id,
                error: self.error,
                payload: String::from_utf8_lossy(&payload).into_owned(),
            });
        }
    }
}
