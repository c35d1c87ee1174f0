//! Scratch-buffer lifecycle for the escaping pipeline.
//!
//! `spec.md` §4.4/§9 calls for a scratch buffer that is stack-allocated
//! when the worst-case escaped size fits a fixed threshold and otherwise
//! borrowed from a pool, released (and scrubbed, since it may have held
//! caller string data) on every exit path including error unwinding.
//!
//! Grounded on the teacher's `optimizations/buffer_pool.rs`
//! (`BufferPool`/`acquire`/`release`/`with_buffer` shape), but generalized
//! per `spec.md` §9's "Global mutable state: none required" design note:
//! the teacher's pool is a `thread_local!` global (`BUFFER_POOL`); this one
//! is owned by the [`crate::Writer`] that uses it, so concurrency
//! semantics fall out of ordinary ownership rather than a shared global.

use smallvec::SmallVec;

/// Below this size, scratch space lives inline in a [`SmallVec`] (i.e. on
/// the stack, in the same sense `alloca` would be, modulo the inline array
/// actually being part of the `SmallVec`'s own storage) and the pool is
/// never touched. `spec.md` §9 names 256 as the typical value.
pub const STACKALLOC_THRESHOLD: usize = 256;

const MAX_POOL_ENTRIES: usize = 8;
/// Buffers larger than this are not worth pooling; a single oversized
/// string shouldn't pin multiple megabytes of scratch space for the rest
/// of the writer's lifetime.
const MAX_POOLED_CAPACITY: usize = 1 << 20;

/// A per-writer free list of oversized scratch buffers.
#[derive(Default)]
pub struct ScratchPool {
    free: Vec<Vec<u8>>,
}

impl ScratchPool {
    pub fn new() -> Self {
        Self { free: Vec::new() }
    }

    pub(crate) fn acquire(&mut self, min_len: usize) -> Vec<u8> {
        if let Some(pos) = self.free.iter().position(|b| b.capacity() >= min_len) {
            let mut buf = self.free.swap_remove(pos);
            buf.clear();
            buf.resize(min_len, 0);
            buf
        } else {
            #[cfg(feature = "trace")]
            log::trace!("scratch pool miss, allocating {min_len} bytes");
            vec![0u8; min_len]
        }
    }

    pub(crate) fn release(&mut self, mut buf: Vec<u8>) {
        // Scrub before returning to the pool: a future caller must never
        // observe a previous caller's string bytes through pooled reuse.
        buf.iter_mut().for_each(|b| *b = 0);
        if buf.capacity() <= MAX_POOLED_CAPACITY && self.free.len() < MAX_POOL_ENTRIES {
            self.free.push(buf);
        }
    }
}

/// A scoped scratch buffer: inline on the stack below
/// [`STACKALLOC_THRESHOLD`], otherwise rented from a [`ScratchPool`] and
/// returned (scrubbed) when dropped — including on unwind, since this is
/// ordinary `Drop`, not a manual release call a `?` could skip.
pub enum Scratch<'a> {
    Inline(SmallVec<[u8; STACKALLOC_THRESHOLD]>),
    Pooled {
        pool: &'a mut ScratchPool,
        buf: Vec<u8>,
    },
}

impl<'a> Scratch<'a> {
    pub fn new(pool: &'a mut ScratchPool, len: usize) -> Self {
        if len <= STACKALLOC_THRESHOLD {
            let mut inline = SmallVec::<[u8; STACKALLOC_THRESHOLD]>::new();
            inline.resize(len, 0);
            Scratch::Inline(inline)
        } else {
            let buf = pool.acquire(len);
            Scratch::Pooled { pool, buf }
        }
    }
}

impl core::ops::Deref for Scratch<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        match self {
            Scratch::Inline(v) => v,
            Scratch::Pooled { buf, .. } => buf,
        }
    }
}

impl core::ops::DerefMut for Scratch<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        match self {
            Scratch::Inline(v) => v,
            Scratch::Pooled { buf, .. } => buf,
        }
    }
}

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        if let Scratch::Pooled { pool, buf } = self {
            let buf = core::mem::take(buf);
            pool.release(buf);
        }
    }
}
