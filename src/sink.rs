//! `BufferSink` contract (§6) and its built-in implementations.
//!
//! `get_span`/`advance` are the only two operations the writer's internal
//! reservation coordinator (C5, see the `reserve`/`commit` helpers on
//! [`crate::Writer`]) actually calls; `flush` is for sinks that buffer in
//! front of some further downstream (disk, socket) and is a no-op for
//! purely in-memory ones.
//!
//! [`GrowableBuffer`] is grounded on the teacher's
//! `optimizations/raw_serialize.rs::RawBuffer` (the double-on-demand
//! growth policy) and `optimizations/buffer_pool.rs` (the "pooled array
//! store" `spec.md` §6 asks for) but is implemented with a safe `Vec<u8>`
//! instead of `RawBuffer`'s `Vec::from_raw_parts`/`mem::forget` dance — that
//! dance exists in the teacher purely to avoid repeated header reads
//! across a CPython FFI boundary that doesn't exist here, so a safe `Vec`
//! gives the same amortized-doubling growth with no unsafe surface to
//! audit (documented as a dropped-but-not-lost technique in `DESIGN.md`).

use crate::error::{JsonWriteError, Result};
use crate::escape::pool::ScratchPool;

/// The only non-trivial collaborator the core writer consumes (`spec.md`
/// §6). `get_span` returns a contiguous writable window of at least
/// `min_size` bytes; `advance` declares how much of that window is now
/// real output.
pub trait BufferSink {
    /// Returns a writable span of at least `min_size` bytes, growing the
    /// sink if necessary.
    fn get_span(&mut self, min_size: usize) -> Result<&mut [u8]>;

    /// Declares that the first `n` bytes of the span last returned by
    /// `get_span` are now valid output. `n` must not exceed that span's
    /// length.
    fn advance(&mut self, n: usize) -> Result<()>;

    /// Surrenders any buffered-but-not-yet-downstream bytes. A no-op for
    /// purely in-memory sinks.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A growable in-memory buffer sink. Doubles its backing allocation on
/// demand, same growth policy as `RawBuffer::grow` in the teacher.
pub struct GrowableBuffer {
    buf: Vec<u8>,
    /// Bytes in `buf[..committed]` are real, advanced output. Anything in
    /// `buf[committed..]` is either zero-filled reservation scratch (set
    /// by the last `get_span`) or doesn't exist yet.
    committed: usize,
    /// Length of the span currently checked out by `get_span`, or 0 if
    /// none is outstanding.
    active_len: usize,
}

impl GrowableBuffer {
    /// An empty buffer that grows from scratch as tokens are written.
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            committed: 0,
            active_len: 0,
        }
    }

    /// Same as [`GrowableBuffer::new`] but with an initial capacity hint,
    /// avoiding the first few doublings for callers who know roughly how
    /// large the output will be.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            committed: 0,
            active_len: 0,
        }
    }

    /// Takes its initial backing allocation from a [`ScratchPool`] instead
    /// of allocating fresh — the "pooled array store" `spec.md` §6 asks
    /// the growable sink to use.
    pub fn from_pool(pool: &mut ScratchPool, capacity: usize) -> Self {
        let mut buf = pool.acquire(capacity);
        buf.clear();
        Self {
            buf,
            committed: 0,
            active_len: 0,
        }
    }

    /// The committed bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.committed]
    }

    /// Consumes the sink, returning the committed bytes.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.buf.truncate(self.committed);
        self.buf
    }

    pub fn len(&self) -> usize {
        self.committed
    }

    pub fn is_empty(&self) -> bool {
        self.committed == 0
    }
}

impl Default for GrowableBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferSink for GrowableBuffer {
    fn get_span(&mut self, min_size: usize) -> Result<&mut [u8]> {
        let needed = self.committed + min_size;
        if self.buf.len() < needed {
            let target_cap = needed.max(self.buf.capacity() * 2);
            #[cfg(feature = "trace")]
            log::trace!(
                "GrowableBuffer growing: committed={}, requesting {} more bytes, new capacity {}",
                self.committed,
                min_size,
                target_cap
            );
            if self.buf.capacity() < target_cap {
                self.buf.reserve(target_cap - self.buf.len());
            }
            self.buf.resize(needed, 0);
        }
        self.active_len = min_size;
        Ok(&mut self.buf[self.committed..self.committed + min_size])
    }

    fn advance(&mut self, n: usize) -> Result<()> {
        if n > self.active_len {
            return Err(JsonWriteError::Overcommit {
                requested: n,
                available: self.active_len,
            });
        }
        self.buf.truncate(self.committed + n);
        self.committed += n;
        self.active_len = 0;
        Ok(())
    }
}

/// A sink over a caller-supplied fixed-size span, e.g. a stack buffer or a
/// slice of a larger pre-allocated arena. Fails with
/// [`JsonWriteError::OutOfSpace`] rather than growing.
pub struct FixedSpanSink<'a> {
    span: &'a mut [u8],
    committed: usize,
    active_len: usize,
}

impl<'a> FixedSpanSink<'a> {
    pub fn new(span: &'a mut [u8]) -> Self {
        Self {
            span,
            committed: 0,
            active_len: 0,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.span[..self.committed]
    }

    pub fn len(&self) -> usize {
        self.committed
    }

    pub fn is_empty(&self) -> bool {
        self.committed == 0
    }
}

impl BufferSink for FixedSpanSink<'_> {
    fn get_span(&mut self, min_size: usize) -> Result<&mut [u8]> {
        let available = self.span.len() - self.committed;
        if available < min_size {
            return Err(JsonWriteError::OutOfSpace {
                requested: min_size,
                available,
            });
        }
        self.active_len = min_size;
        Ok(&mut self.span[self.committed..self.committed + min_size])
    }

    fn advance(&mut self, n: usize) -> Result<()> {
        if n > self.active_len {
            return Err(JsonWriteError::Overcommit {
                requested: n,
                available: self.active_len,
            });
        }
        self.committed += n;
        self.active_len = 0;
        Ok(())
    }
}

/// A sink that buffers in memory and surrenders committed bytes to an
/// underlying [`std::io::Write`] on `flush()`. Grounded on
/// `arnohaase-json-streaming`'s `JsonWriter<W: BlockingWrite, _>`, which
/// wraps a `Write` the same way, except this sink keeps its own
/// intermediate buffer rather than writing byte-by-byte to the
/// destination, so large tokens still cost one `write_all` instead of
/// many small ones.
pub struct IoWriteSink<W: std::io::Write> {
    inner: GrowableBuffer,
    dest: W,
}

impl<W: std::io::Write> IoWriteSink<W> {
    pub fn new(dest: W) -> Self {
        Self {
            inner: GrowableBuffer::new(),
            dest,
        }
    }

    pub fn into_inner(self) -> W {
        self.dest
    }
}

impl<W: std::io::Write> BufferSink for IoWriteSink<W> {
    fn get_span(&mut self, min_size: usize) -> Result<&mut [u8]> {
        self.inner.get_span(min_size)
    }

    fn advance(&mut self, n: usize) -> Result<()> {
        self.inner.advance(n)
    }

    fn flush(&mut self) -> Result<()> {
        let bytes = self.inner.as_slice();
        if !bytes.is_empty() {
            self.dest.write_all(bytes)?;
        }
        self.dest.flush()?;
        self.inner = GrowableBuffer::new();
        Ok(())
    }
}
