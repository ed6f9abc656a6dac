//! Channel layer: the byte-stream seam and the pattern-waiting engine.
//!
//! A [`Channel`] is whatever carries characters to and from the device
//! (an SSH shell, a console server, a scripted test double). Everything
//! above it only ever reads what happens to be buffered, writes bytes,
//! and asks whether the stream is still alive.

mod ansi;
mod buffer;
mod patterns;
pub mod scripted;
mod waiter;

pub use ansi::strip_ansi;
pub use buffer::Accumulator;
pub use patterns::{MatchFlags, PatternSpec, contains_ignore_case};
pub use scripted::ScriptedChannel;
pub use waiter::{DialogOutcome, PatternWaiter};

use crate::error::Result;

/// Byte-level transport primitive used by every dialog.
///
/// `read` must never block: it returns whatever is buffered right now,
/// possibly nothing. `write` surfaces transport failures as
/// [`ChannelError::SessionDown`](crate::error::ChannelError::SessionDown).
pub trait Channel: Send {
    /// Drain the bytes currently available.
    fn read(&mut self) -> Vec<u8>;

    /// Send bytes to the device.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Whether the underlying stream has ended.
    fn is_closed(&self) -> bool;

    /// Discard buffered-but-unread bytes.
    fn clear_buffer(&mut self);

    /// Tear down the stream. Reads afterwards return nothing.
    fn close(&mut self);
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn read(&mut self) -> Vec<u8> {
        (**self).read()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }

    fn clear_buffer(&mut self) {
        (**self).clear_buffer()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
