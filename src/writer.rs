//! Token writers (C4): the public `Writer<S>` API composing the
//! structural state machine, the escaping pipeline, and the formatting
//! primitives over a [`BufferSink`].
//!
//! Each public method follows the eight-step procedure the component
//! design lays out: validate the transition, size a worst-case
//! reservation, reserve it from the sink, write the separator/indent
//! prefix, write the token's own bytes, update the structural state, and
//! commit the reservation. Unlike a design that holds a span "pending"
//! across calls, every call here reserves and commits its own bytes
//! before returning, so there is never an outstanding uncommitted window
//! between public calls — `flush()` only has downstream-sink work left
//! to do (relevant to [`crate::sink::IoWriteSink`]; a no-op for the
//! purely in-memory sinks).
//!
//! Escaping follows the same two-path shape in every quoted-string
//! writer: a clean string (no classified code units) is copied straight
//! into the sink's reservation with no scratch buffer touched at all
//! (the no-allocation guarantee the teacher's fast paths also chase);
//! a string that needs escaping is first escaped into a
//! [`crate::escape::pool::Scratch`] sized to the worst case, and only
//! the *actual* escaped length — now known — is reserved from the sink,
//! so the sink never over-commits by the full 6x factor the way a naive
//! one-shot reservation would.

use crate::error::{JsonWriteError, Result};
use crate::escape::pool::{Scratch, ScratchPool};
use crate::escape::{lut, utf16, utf8};
use crate::format::{self, Guid, Iso8601};
use crate::sink::BufferSink;
use crate::state::{PreviousToken, StructuralState, TokenKind, DEFAULT_MAX_DEPTH};

/// Configuration for a [`Writer`] (`spec.md` §6 Options table).
#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    pub indented: bool,
    pub skip_validation: bool,
    pub indent_width: u8,
    pub max_depth: u16,
    /// Not named in `spec.md`'s Options table but required by §3's
    /// invariant wording ("unless options explicitly allow multiple");
    /// default matches the spec's stated default of disallowing it.
    pub allow_multiple_top_level_values: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            indented: false,
            skip_validation: false,
            indent_width: 2,
            max_depth: DEFAULT_MAX_DEPTH,
            allow_multiple_top_level_values: false,
        }
    }
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indented(mut self, indented: bool) -> Self {
        self.indented = indented;
        self
    }

    pub fn skip_validation(mut self, skip_validation: bool) -> Self {
        self.skip_validation = skip_validation;
        self
    }

    pub fn indent_width(mut self, indent_width: u8) -> Self {
        self.indent_width = indent_width;
        self
    }

    pub fn max_depth(mut self, max_depth: u16) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn allow_multiple_top_level_values(mut self, allow: bool) -> Self {
        self.allow_multiple_top_level_values = allow;
        self
    }
}

/// Worst-case byte length of the separator+indent prefix for an "item"
/// token (container start, property name, or value) with the given
/// comma/indent requirements.
fn prefix_len(comma: bool, indent_level: Option<u16>, indent_width: u8) -> usize {
    let mut n = usize::from(comma);
    if let Some(level) = indent_level {
        n += 1 + level as usize * indent_width as usize;
    }
    n
}

/// Writes the separator/indent prefix into `dest[0..]`, returning the
/// number of bytes written. `dest` must be at least
/// `prefix_len(comma, indent_level, indent_width)` long.
fn write_prefix(dest: &mut [u8], comma: bool, indent_level: Option<u16>, indent_width: u8) -> usize {
    let mut n = 0;
    if comma {
        dest[0] = b',';
        n = 1;
    }
    if let Some(level) = indent_level {
        dest[n] = b'\n';
        n += 1;
        let spaces = level as usize * indent_width as usize;
        dest[n..n + spaces].fill(b' ');
        n += spaces;
    }
    n
}

/// A forward-only, streaming UTF-8 JSON token writer over a
/// caller-supplied [`BufferSink`].
///
/// Non-reentrant and single-threaded: every public method runs to
/// completion before returning, and sharing one `Writer` across threads
/// without external synchronization is a programming error this type
/// does not attempt to prevent (`spec.md` §5).
pub struct Writer<S: BufferSink> {
    sink: S,
    state: StructuralState,
    scratch_pool: ScratchPool,
    options: WriterOptions,
    bytes_committed: u64,
}

impl<S: BufferSink> Writer<S> {
    pub fn new(sink: S) -> Self {
        Self::with_options(sink, WriterOptions::default())
    }

    pub fn with_options(sink: S, options: WriterOptions) -> Self {
        Self {
            sink,
            state: StructuralState::new(options.max_depth, options.allow_multiple_top_level_values),
            scratch_pool: ScratchPool::new(),
            options,
            bytes_committed: 0,
        }
    }

    pub fn current_depth(&self) -> u16 {
        self.state.depth()
    }

    pub fn bytes_committed(&self) -> u64 {
        self.bytes_committed
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Surrenders any sink-internal buffering downstream. A no-op for
    /// purely in-memory sinks.
    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()
    }

    /// Returns the underlying sink, discarding writer state. Useful once
    /// the caller knows no further tokens will be written.
    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Indentation level for the next "item" token (container start,
    /// property name, or value), or `None` if it should not start its own
    /// line. A token immediately following a property name's `:` continues
    /// on the same line as the key rather than getting its own indent —
    /// only the property name itself, and array elements/object members in
    /// general, start a new line.
    fn item_indent_level(&self) -> Option<u16> {
        if self.options.indented
            && self.state.depth() > 0
            && self.state.previous_token() != PreviousToken::PropertyName
        {
            Some(self.state.depth())
        } else {
            None
        }
    }

    fn start_container(&mut self, kind: TokenKind, open: u8) -> Result<()> {
        if !self.options.skip_validation {
            self.state.validate(kind)?;
        }
        let comma = self.state.needs_separator();
        let indent_level = self.item_indent_level();
        let pre_len = prefix_len(comma, indent_level, self.options.indent_width);
        let max_required = pre_len + 1;

        let span = self.sink.get_span(max_required)?;
        let mut n = write_prefix(span, comma, indent_level, self.options.indent_width);
        span[n] = open;
        n += 1;

        self.sink.advance(n)?;
        self.bytes_committed += n as u64;
        self.state.advance(kind)?;
        Ok(())
    }

    fn end_container(&mut self, kind: TokenKind, close: u8) -> Result<()> {
        if !self.options.skip_validation {
            self.state.validate(kind)?;
        }
        // The closing bracket sits at the parent's indentation, one level
        // shallower than the container it closes.
        let indent_level = if self.options.indented {
            Some(self.state.depth().saturating_sub(1))
        } else {
            None
        };
        let pre_len = prefix_len(false, indent_level, self.options.indent_width);
        let max_required = pre_len + 1;

        let span = self.sink.get_span(max_required)?;
        let mut n = write_prefix(span, false, indent_level, self.options.indent_width);
        span[n] = close;
        n += 1;

        self.sink.advance(n)?;
        self.bytes_committed += n as u64;
        self.state.advance(kind)?;
        Ok(())
    }

    pub fn start_object(&mut self) -> Result<()> {
        self.start_container(TokenKind::StartObject, b'{')
    }

    pub fn start_array(&mut self) -> Result<()> {
        self.start_container(TokenKind::StartArray, b'[')
    }

    pub fn end_object(&mut self) -> Result<()> {
        self.end_container(TokenKind::EndObject, b'}')
    }

    pub fn end_array(&mut self) -> Result<()> {
        self.end_container(TokenKind::EndArray, b']')
    }

    /// Shared body for `property_name`/`string_value`'s byte-sequence
    /// arity. `suffix` is appended after the closing quote (`:` plus,
    /// in indented mode, one space, for property names; empty for
    /// string values). `value_token` is `None` for a property name
    /// (which does not complete a value) or `Some(PreviousToken::String)`
    /// for a string value.
    fn write_quoted_utf8(
        &mut self,
        kind: TokenKind,
        bytes: &[u8],
        suppress_escape: bool,
        suffix: &[u8],
        value_token: Option<PreviousToken>,
    ) -> Result<()> {
        if !self.options.skip_validation {
            self.state.validate(kind)?;
        }
        let s = utf8::validate(bytes)?;

        let comma = self.state.needs_separator();
        let indent_level = self.item_indent_level();
        let pre_len = prefix_len(comma, indent_level, self.options.indent_width);

        let escape_idx = if suppress_escape {
            -1
        } else {
            lut::first_escape_index(s.as_bytes())
        };

        if escape_idx < 0 {
            let max_required = pre_len + 1 + s.len() + 1 + suffix.len();
            let span = self.sink.get_span(max_required)?;
            let mut n = write_prefix(span, comma, indent_level, self.options.indent_width);
            span[n] = b'"';
            n += 1;
            span[n..n + s.len()].copy_from_slice(s.as_bytes());
            n += s.len();
            span[n] = b'"';
            n += 1;
            span[n..n + suffix.len()].copy_from_slice(suffix);
            n += suffix.len();
            self.sink.advance(n)?;
            self.bytes_committed += n as u64;
        } else {
            let idx = escape_idx as usize;
            let max_escaped = utf8::max_escaped_len(s.len())?;
            let mut scratch = Scratch::new(&mut self.scratch_pool, max_escaped);
            let escaped_len = utf8::escape_into(s, idx, &mut scratch);

            let max_required = pre_len + 1 + escaped_len + 1 + suffix.len();
            let span = self.sink.get_span(max_required)?;
            let mut n = write_prefix(span, comma, indent_level, self.options.indent_width);
            span[n] = b'"';
            n += 1;
            span[n..n + escaped_len].copy_from_slice(&scratch[..escaped_len]);
            n += escaped_len;
            span[n] = b'"';
            n += 1;
            span[n..n + suffix.len()].copy_from_slice(suffix);
            n += suffix.len();
            drop(scratch);
            self.sink.advance(n)?;
            self.bytes_committed += n as u64;
        }

        if let Some(vt) = value_token {
            self.state.advance_value(vt);
        } else {
            self.state.advance(kind)?;
        }
        Ok(())
    }

    /// 16-bit code-unit arity counterpart of [`Writer::write_quoted_utf8`].
    fn write_quoted_utf16(
        &mut self,
        kind: TokenKind,
        units: &[u16],
        suppress_escape: bool,
        suffix: &[u8],
        value_token: Option<PreviousToken>,
    ) -> Result<()> {
        if !self.options.skip_validation {
            self.state.validate(kind)?;
        }
        utf16::validate(units)?;

        let comma = self.state.needs_separator();
        let indent_level = self.item_indent_level();
        let pre_len = prefix_len(comma, indent_level, self.options.indent_width);

        let escape_idx = if suppress_escape {
            -1
        } else {
            lut::first_escape_index_u16(units)
        };

        if escape_idx < 0 {
            let max_required = pre_len + 1 + units.len() + 1 + suffix.len();
            let span = self.sink.get_span(max_required)?;
            let mut n = write_prefix(span, comma, indent_level, self.options.indent_width);
            span[n] = b'"';
            n += 1;
            for &u in units {
                span[n] = u as u8;
                n += 1;
            }
            span[n] = b'"';
            n += 1;
            span[n..n + suffix.len()].copy_from_slice(suffix);
            n += suffix.len();
            self.sink.advance(n)?;
            self.bytes_committed += n as u64;
        } else {
            let idx = escape_idx as usize;
            let max_escaped = utf16::max_escaped_len(units.len())?;
            let mut scratch = Scratch::new(&mut self.scratch_pool, max_escaped);
            let escaped_len = utf16::escape_into(units, idx, &mut scratch);

            let max_required = pre_len + 1 + escaped_len + 1 + suffix.len();
            let span = self.sink.get_span(max_required)?;
            let mut n = write_prefix(span, comma, indent_level, self.options.indent_width);
            span[n] = b'"';
            n += 1;
            span[n..n + escaped_len].copy_from_slice(&scratch[..escaped_len]);
            n += escaped_len;
            span[n] = b'"';
            n += 1;
            span[n..n + suffix.len()].copy_from_slice(suffix);
            n += suffix.len();
            drop(scratch);
            self.sink.advance(n)?;
            self.bytes_committed += n as u64;
        }

        if let Some(vt) = value_token {
            self.state.advance_value(vt);
        } else {
            self.state.advance(kind)?;
        }
        Ok(())
    }

    /// Property name suffix: `:` plus, in indented mode, one space
    /// (`spec.md` §4.3: "after a property name's `:`, emit one space").
    fn property_suffix(&self) -> &'static [u8] {
        if self.options.indented {
            b": "
        } else {
            b":"
        }
    }

    pub fn property_name(&mut self, text: &[u8], suppress_escape: bool) -> Result<()> {
        let suffix = self.property_suffix();
        self.write_quoted_utf8(TokenKind::PropertyName, text, suppress_escape, suffix, None)
    }

    pub fn property_name_u16(&mut self, units: &[u16], suppress_escape: bool) -> Result<()> {
        let suffix = self.property_suffix();
        self.write_quoted_utf16(TokenKind::PropertyName, units, suppress_escape, suffix, None)
    }

    pub fn string_value(&mut self, text: &[u8], suppress_escape: bool) -> Result<()> {
        self.write_quoted_utf8(
            TokenKind::Value,
            text,
            suppress_escape,
            b"",
            Some(PreviousToken::String),
        )
    }

    pub fn string_value_u16(&mut self, units: &[u16], suppress_escape: bool) -> Result<()> {
        self.write_quoted_utf16(
            TokenKind::Value,
            units,
            suppress_escape,
            b"",
            Some(PreviousToken::String),
        )
    }

    /// Shared body for raw (unquoted) primitive writers: numbers,
    /// booleans, `null`. `write_fn` renders the ASCII payload into the
    /// tail of the reservation and returns its length.
    fn write_raw_value(
        &mut self,
        max_payload_len: usize,
        write_fn: impl FnOnce(&mut [u8]) -> usize,
        value_token: PreviousToken,
    ) -> Result<()> {
        if !self.options.skip_validation {
            self.state.validate(TokenKind::Value)?;
        }
        let comma = self.state.needs_separator();
        let indent_level = self.item_indent_level();
        let pre_len = prefix_len(comma, indent_level, self.options.indent_width);
        let max_required = pre_len + max_payload_len;

        let span = self.sink.get_span(max_required)?;
        let mut n = write_prefix(span, comma, indent_level, self.options.indent_width);
        n += write_fn(&mut span[n..]);

        self.sink.advance(n)?;
        self.bytes_committed += n as u64;
        self.state.advance_value(value_token);
        Ok(())
    }

    /// Shared body for quoted-but-unescaped string-shaped primitives
    /// (date-time, GUID): no escape scan is needed since their alphabets
    /// are fixed ASCII subsets, but they still need surrounding quotes.
    fn write_quoted_raw_value(
        &mut self,
        max_payload_len: usize,
        write_fn: impl FnOnce(&mut [u8]) -> usize,
    ) -> Result<()> {
        if !self.options.skip_validation {
            self.state.validate(TokenKind::Value)?;
        }
        let comma = self.state.needs_separator();
        let indent_level = self.item_indent_level();
        let pre_len = prefix_len(comma, indent_level, self.options.indent_width);
        let max_required = pre_len + 1 + max_payload_len + 1;

        let span = self.sink.get_span(max_required)?;
        let mut n = write_prefix(span, comma, indent_level, self.options.indent_width);
        span[n] = b'"';
        n += 1;
        n += write_fn(&mut span[n..]);
        span[n] = b'"';
        n += 1;

        self.sink.advance(n)?;
        self.bytes_committed += n as u64;
        self.state.advance_value(PreviousToken::String);
        Ok(())
    }

    pub fn number_value_i64(&mut self, value: i64) -> Result<()> {
        self.write_raw_value(
            format::MAX_LEN_I64,
            |dest| format::write_i64(dest, value),
            PreviousToken::Number,
        )
    }

    pub fn number_value_u64(&mut self, value: u64) -> Result<()> {
        self.write_raw_value(
            format::MAX_LEN_U64,
            |dest| format::write_u64(dest, value),
            PreviousToken::Number,
        )
    }

    pub fn number_value_f64(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(JsonWriteError::InvalidFloatValue);
        }
        if !self.options.skip_validation {
            self.state.validate(TokenKind::Value)?;
        }
        let comma = self.state.needs_separator();
        let indent_level = self.item_indent_level();
        let pre_len = prefix_len(comma, indent_level, self.options.indent_width);
        let max_required = pre_len + format::MAX_LEN_F64;

        let span = self.sink.get_span(max_required)?;
        let mut n = write_prefix(span, comma, indent_level, self.options.indent_width);
        n += format::write_f64(&mut span[n..], value)?;

        self.sink.advance(n)?;
        self.bytes_committed += n as u64;
        self.state.advance_value(PreviousToken::Number);
        Ok(())
    }

    pub fn number_value_f32(&mut self, value: f32) -> Result<()> {
        if !value.is_finite() {
            return Err(JsonWriteError::InvalidFloatValue);
        }
        if !self.options.skip_validation {
            self.state.validate(TokenKind::Value)?;
        }
        let comma = self.state.needs_separator();
        let indent_level = self.item_indent_level();
        let pre_len = prefix_len(comma, indent_level, self.options.indent_width);
        let max_required = pre_len + format::MAX_LEN_F32;

        let span = self.sink.get_span(max_required)?;
        let mut n = write_prefix(span, comma, indent_level, self.options.indent_width);
        n += format::write_f32(&mut span[n..], value)?;

        self.sink.advance(n)?;
        self.bytes_committed += n as u64;
        self.state.advance_value(PreviousToken::Number);
        Ok(())
    }

    /// Writes a pre-formatted decimal ASCII lexeme (see
    /// [`crate::format::write_decimal`]) as a JSON number, unquoted.
    pub fn number_value_decimal(&mut self, digits: &str) -> Result<()> {
        self.write_raw_value(
            digits.len(),
            |dest| format::write_decimal(dest, digits),
            PreviousToken::Number,
        )
    }

    pub fn bool_value(&mut self, value: bool) -> Result<()> {
        let value_token = if value { PreviousToken::True } else { PreviousToken::False };
        self.write_raw_value(
            5,
            |dest| {
                let lit: &[u8] = if value { b"true" } else { b"false" };
                dest[..lit.len()].copy_from_slice(lit);
                lit.len()
            },
            value_token,
        )
    }

    pub fn null_value(&mut self) -> Result<()> {
        self.write_raw_value(
            4,
            |dest| {
                dest[..4].copy_from_slice(b"null");
                4
            },
            PreviousToken::Null,
        )
    }

    pub fn date_time_value(&mut self, value: Iso8601<'_>) -> Result<()> {
        self.write_quoted_raw_value(Iso8601::MAX_LEN, |dest| value.write_ascii(dest))
    }

    pub fn guid_value(&mut self, value: Guid) -> Result<()> {
        self.write_quoted_raw_value(Guid::MAX_LEN, |dest| value.write_ascii(dest))
    }

    /// Writes `bytes` as a base64-encoded JSON string. For large inputs,
    /// the body is written across as many sink reservations as the sink
    /// grants, always cutting on a 3-input-byte/4-output-byte group
    /// boundary so the emitted bytes are identical to a single-shot
    /// encoding regardless of how the sink happens to size its spans
    /// (`spec.md` §4.4).
    pub fn base64_value(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.options.skip_validation {
            self.state.validate(TokenKind::Value)?;
        }
        let encoded_len = format::base64_max_len(bytes.len())
            .ok_or(JsonWriteError::ArgumentTooLarge { len: bytes.len() })?;

        let comma = self.state.needs_separator();
        let indent_level = self.item_indent_level();
        let pre_len = prefix_len(comma, indent_level, self.options.indent_width);

        let open_max = pre_len + 1;
        let span = self.sink.get_span(open_max)?;
        let mut n = write_prefix(span, comma, indent_level, self.options.indent_width);
        span[n] = b'"';
        n += 1;
        self.sink.advance(n)?;
        self.bytes_committed += n as u64;

        let mut remaining = bytes;
        while !remaining.is_empty() {
            let want_groups = remaining.len().div_ceil(3);
            let want_out = (want_groups * 4).min(encoded_len);
            let span = self.sink.get_span(want_out)?;
            let max_in_bytes = (span.len() / 4) * 3;
            let take = max_in_bytes.min(remaining.len());
            let (chunk, rest) = remaining.split_at(take);
            let written = format::base64_encode(span, chunk);
            self.sink.advance(written)?;
            self.bytes_committed += written as u64;
            remaining = rest;
        }

        let span = self.sink.get_span(1)?;
        span[0] = b'"';
        self.sink.advance(1)?;
        self.bytes_committed += 1;

        self.state.advance_value(PreviousToken::String);
        Ok(())
    }

    // --- Property-paired fused variants --------------------------------
    //
    // Each fuses a `property_name` call and a value call. Output is
    // identical to the two-call sequence since each step still reserves
    // and commits its own bytes; fusing only saves the caller a line.

    pub fn property_and_string(&mut self, name: &[u8], value: &[u8]) -> Result<()> {
        self.property_name(name, false)?;
        self.string_value(value, false)
    }

    pub fn property_and_number_i64(&mut self, name: &[u8], value: i64) -> Result<()> {
        self.property_name(name, false)?;
        self.number_value_i64(value)
    }

    pub fn property_and_number_u64(&mut self, name: &[u8], value: u64) -> Result<()> {
        self.property_name(name, false)?;
        self.number_value_u64(value)
    }

    pub fn property_and_number_f64(&mut self, name: &[u8], value: f64) -> Result<()> {
        self.property_name(name, false)?;
        self.number_value_f64(value)
    }

    pub fn property_and_number_f32(&mut self, name: &[u8], value: f32) -> Result<()> {
        self.property_name(name, false)?;
        self.number_value_f32(value)
    }

    pub fn property_and_bool(&mut self, name: &[u8], value: bool) -> Result<()> {
        self.property_name(name, false)?;
        self.bool_value(value)
    }

    pub fn property_and_null(&mut self, name: &[u8]) -> Result<()> {
        self.property_name(name, false)?;
        self.null_value()
    }

    pub fn property_and_date_time(&mut self, name: &[u8], value: Iso8601<'_>) -> Result<()> {
        self.property_name(name, false)?;
        self.date_time_value(value)
    }

    pub fn property_and_guid(&mut self, name: &[u8], value: Guid) -> Result<()> {
        self.property_name(name, false)?;
        self.guid_value(value)
    }

    pub fn property_and_base64(&mut self, name: &[u8], value: &[u8]) -> Result<()> {
        self.property_name(name, false)?;
        self.base64_value(value)
    }
}
