//! Centralized error surface (C6).
//!
//! Every fallible writer operation returns [`JsonWriteError`]. No variant is
//! recoverable mid-token: an error is always reported before any byte of the
//! offending token has been committed to the sink, so the writer remains
//! usable for the next call (see `spec.md` §7 "Propagation policy").

use thiserror::Error;

/// Everything that can go wrong while writing a JSON token.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum JsonWriteError {
    /// The requested token is not valid in the writer's current structural
    /// state (e.g. `end_object()` while the innermost container is an
    /// array, or a property name where a value is expected).
    #[error("invalid operation: {reason} (previous token: {previous_token})")]
    InvalidOperation {
        reason: &'static str,
        previous_token: &'static str,
    },

    /// Writing this container-start would push the nesting stack past
    /// `max_depth`.
    #[error("depth limit exceeded: max_depth is {max_depth}")]
    DepthLimitExceeded { max_depth: u16 },

    /// The worst-case byte-size computation for this token overflowed, or
    /// exceeded what the writer is willing to reserve in one call. No bytes
    /// were written.
    #[error("argument too large to size a reservation for: {len} input units")]
    ArgumentTooLarge { len: usize },

    /// Byte input claimed to be UTF-8 was not well-formed.
    #[error("invalid UTF-8 at byte offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// 16-bit code-unit input was not well-formed UTF-16 (lone or
    /// misordered surrogate).
    #[error("invalid UTF-16 at code-unit offset {offset}")]
    InvalidUtf16 { offset: usize },

    /// `f32`/`f64` value was `NaN` or infinite; JSON has no representation
    /// for either.
    #[error("value is NaN or infinite, which JSON cannot represent")]
    InvalidFloatValue,

    /// A `BufferSink` implementation's `advance(n)` was called with `n`
    /// larger than the span it last returned from `get_span`.
    #[error("sink overcommit: advanced {requested} bytes but only {available} were reserved")]
    Overcommit { requested: usize, available: usize },

    /// A fixed-size `BufferSink` could not satisfy a `get_span(min_size)`
    /// request.
    #[error("sink out of space: requested {requested} bytes, {available} available")]
    OutOfSpace { requested: usize, available: usize },

    /// An IO-backed sink's downstream `write_all`/`flush` failed. Not one
    /// of `spec.md` §7's core kinds (the core is IO-agnostic by design),
    /// but needed to make `IoWriteSink` (`spec.md` §6's "IO-backed flush
    /// target") report failures through the same error type as everything
    /// else instead of a second parallel `Result`.
    #[error("io error: {message}")]
    Io { message: String },
}

impl From<std::io::Error> for JsonWriteError {
    fn from(e: std::io::Error) -> Self {
        JsonWriteError::Io {
            message: e.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, JsonWriteError>;
