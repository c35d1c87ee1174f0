//! A forward-only, streaming UTF-8 JSON token writer.
//!
//! This crate does not parse or hold a JSON tree in memory; it appends
//! tokens (`{`, `"key"`, `1`, `]`, ...) directly into a caller-supplied
//! [`BufferSink`], validating structure and escaping string payloads as
//! it goes. See [`Writer`] for the public token-writing API.
//!
//! ```
//! use streamjson::{Writer, sink::GrowableBuffer};
//!
//! let mut writer = Writer::new(GrowableBuffer::new());
//! writer.start_object().unwrap();
//! writer.property_name(b"answer", false).unwrap();
//! writer.number_value_i64(42).unwrap();
//! writer.end_object().unwrap();
//!
//! assert_eq!(writer.into_inner().as_slice(), br#"{"answer":42}"#);
//! ```

pub mod error;
pub mod escape;
pub mod format;
pub mod sink;
pub mod state;
pub mod writer;

pub use error::{JsonWriteError, Result};
pub use format::{Guid, Iso8601};
pub use sink::BufferSink;
pub use writer::{Writer, WriterOptions};
