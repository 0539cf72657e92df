//! Constants for board dimensions, protocol details, and I/O timing.
//!
//! Board sizes are chosen at runtime, so unlike a fixed-size engine the
//! grid geometry lives in [`crate::board::Board`] and only the limits are
//! kept here.

use std::time::Duration;

// =============================================================================
// Board Geometry
// =============================================================================

/// Smallest accepted board width or height.
pub const MIN_SIZE: u8 = 2;

/// Largest accepted board width or height. Column letters run out after 25
/// because the letter `i` is skipped.
pub const MAX_SIZE: u8 = 25;

/// Default board size (NxN) used by the binary.
pub const DEFAULT_SIZE: u8 = 9;

/// Upper bound for the number of cells a single move may change.
pub const MAX_CHANGED: usize = 1 << 15;

// =============================================================================
// Protocol
// =============================================================================

/// The only GTP protocol version this client speaks.
pub const PROTOCOL_VERSION: u32 = 2;

/// Default komi sent to the engine during the handshake.
pub const DEFAULT_KOMI: f32 = 6.5;

/// Size of the scratch buffer a single read into the parser may fill.
pub const READ_BUF_SIZE: usize = 8192;

// =============================================================================
// Driver Timing
// =============================================================================

/// Longest the event loop waits for engine output or user input before
/// looping again.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);
