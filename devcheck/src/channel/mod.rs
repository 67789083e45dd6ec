//! Channel layer for pattern matching and PTY operations.
//!
//! Handles the interactive shell: writing lines, stripping terminal escape
//! sequences and waiting for the device prompt.

mod buffer;
mod pty;

pub use buffer::PatternBuffer;
pub use pty::{PtyChannel, ReadResult};
