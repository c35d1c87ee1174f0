//! Structural state machine (C3): nesting stack, container-kind tracking,
//! and the token-transition table from `spec.md` §3/§4.3.
//!
//! `spec.md` §3 describes a bit-packed `depth: i32` (separator flag in bit
//! 31, innermost container kind in bit 30) plus a `bit_stack` bitmap for
//! the levels above that. `spec.md` §9 explicitly calls that packing "a
//! micro-optimization, not a contract" and sanctions separate fields, so
//! this module keeps `needs_separator`/`innermost_kind` as plain fields
//! and only keeps the bitmap shape (rather than, say, a `Vec<ContainerKind>`)
//! for the container-kind stack above the innermost level, since a bitmap
//! is the natural representation for a flag-per-level stack and matches
//! the teacher's general comfort with bit tricks (`STATE_ASCII_MASK` in
//! `lib.rs`).

use crate::error::{JsonWriteError, Result};
use smallvec::SmallVec;

/// Default maximum nesting depth (`spec.md` §6 Options table).
pub const DEFAULT_MAX_DEPTH: u16 = 1000;

/// Inline capacity for the bit-stack: `DEFAULT_MAX_DEPTH` bits is ~16
/// `u64` words, so the common case never spills to the heap.
const BITSTACK_INLINE_WORDS: usize = (DEFAULT_MAX_DEPTH as usize).div_ceil(64);

/// The kind of container at a given nesting level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Array,
    Object,
}

/// The last token written, used to decide which tokens are valid next
/// (`spec.md` §3 `previous_token`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviousToken {
    None,
    StartObject,
    StartArray,
    EndObject,
    EndArray,
    PropertyName,
    String,
    Number,
    True,
    False,
    Null,
}

impl PreviousToken {
    fn label(self) -> &'static str {
        match self {
            PreviousToken::None => "<start>",
            PreviousToken::StartObject => "StartObject",
            PreviousToken::StartArray => "StartArray",
            PreviousToken::EndObject => "EndObject",
            PreviousToken::EndArray => "EndArray",
            PreviousToken::PropertyName => "PropertyName",
            PreviousToken::String => "String",
            PreviousToken::Number => "Number",
            PreviousToken::True => "True",
            PreviousToken::False => "False",
            PreviousToken::Null => "Null",
        }
    }

    fn is_value(self) -> bool {
        matches!(
            self,
            PreviousToken::String
                | PreviousToken::Number
                | PreviousToken::True
                | PreviousToken::False
                | PreviousToken::Null
                | PreviousToken::EndObject
                | PreviousToken::EndArray
        )
    }
}

/// A class of token a public `Writer` call can be writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    StartObject,
    StartArray,
    EndObject,
    EndArray,
    PropertyName,
    /// Any primitive or string value (`number_value`, `bool_value`,
    /// `string_value`, `null_value`, etc.) — they all share one transition
    /// rule in `spec.md` §4.3's table.
    Value,
}

/// The structural state machine (C3): current depth, container kind per
/// level, and the previously-written token, with the allowed-transition
/// table from `spec.md` §4.3.
pub struct StructuralState {
    depth: u16,
    max_depth: u16,
    needs_separator: bool,
    /// Valid only when `depth > 0`: the kind of the innermost container.
    innermost_kind: Option<ContainerKind>,
    /// Bit `i` records whether level `i` is an object (`1`) or array
    /// (`0`). Only bits `0..depth.saturating_sub(1)` are meaningful — the
    /// innermost level's kind lives in `innermost_kind`, not here, per
    /// `spec.md` §3 ("Higher levels' kinds live in bit_stack").
    bit_stack: SmallVec<[u64; BITSTACK_INLINE_WORDS]>,
    previous_token: PreviousToken,
    /// Whether more than one top-level value may be written
    /// (`spec.md` §3: "default disallows").
    allow_multiple_top_level_values: bool,
}

impl StructuralState {
    pub fn new(max_depth: u16, allow_multiple_top_level_values: bool) -> Self {
        Self {
            depth: 0,
            max_depth,
            needs_separator: false,
            innermost_kind: None,
            bit_stack: SmallVec::new(),
            previous_token: PreviousToken::None,
            allow_multiple_top_level_values,
        }
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }

    pub fn previous_token(&self) -> PreviousToken {
        self.previous_token
    }

    pub fn needs_separator(&self) -> bool {
        self.needs_separator
    }

    pub fn innermost_kind(&self) -> Option<ContainerKind> {
        self.innermost_kind
    }

    /// `depth == 0` and the last thing written was a complete top-level
    /// value (`spec.md` §3 "Lifecycle").
    pub fn is_terminal(&self) -> bool {
        self.depth == 0
            && matches!(
                self.previous_token,
                PreviousToken::EndObject
                    | PreviousToken::EndArray
                    | PreviousToken::String
                    | PreviousToken::Number
                    | PreviousToken::True
                    | PreviousToken::False
                    | PreviousToken::Null
            )
    }

    fn bit_get(&self, level: u16) -> bool {
        let (word, bit) = (level as usize / 64, level as usize % 64);
        self.bit_stack
            .get(word)
            .is_some_and(|w| w & (1 << bit) != 0)
    }

    fn bit_set(&mut self, level: u16, is_object: bool) {
        let (word, bit) = (level as usize / 64, level as usize % 64);
        if word >= self.bit_stack.len() {
            self.bit_stack.resize(word + 1, 0);
        }
        if is_object {
            self.bit_stack[word] |= 1 << bit;
        } else {
            self.bit_stack[word] &= !(1 << bit);
        }
    }

    /// Validates that `kind` may legally be written next, per the
    /// transition table in `spec.md` §4.3. Does not mutate state — callers
    /// commit via [`StructuralState::advance`] only once the token's bytes
    /// have actually been reserved, so a rejected transition never leaves
    /// `bytes_committed`/`pending` changed (`spec.md` §8 invariant 6).
    pub fn validate(&self, kind: TokenKind) -> Result<()> {
        use TokenKind::*;

        if self.depth == 0 && self.previous_token != PreviousToken::None {
            // A complete top-level value has already been written.
            if !self.allow_multiple_top_level_values {
                return Err(JsonWriteError::InvalidOperation {
                    reason: "a complete top-level value has already been written",
                    previous_token: self.previous_token.label(),
                });
            }
        }

        let in_object = self.innermost_kind == Some(ContainerKind::Object);
        let after_value_in_object = in_object && self.previous_token.is_value();

        if matches!(kind, StartObject | StartArray) && self.depth >= self.max_depth {
            return Err(JsonWriteError::DepthLimitExceeded {
                max_depth: self.max_depth,
            });
        }

        let ok = match kind {
            StartObject | StartArray => {
                self.depth == 0
                    || self.previous_token == PreviousToken::PropertyName
                    || (self.innermost_kind == Some(ContainerKind::Array)
                        && (self.previous_token == PreviousToken::StartArray
                            || !in_object))
            }
            EndObject => in_object && !self.previous_token_is_key_without_value(),
            EndArray => {
                self.innermost_kind == Some(ContainerKind::Array)
                    && !self.previous_token_is_key_without_value()
            }
            PropertyName => {
                in_object
                    && (self.previous_token == PreviousToken::StartObject
                        || after_value_in_object)
            }
            Value => {
                self.previous_token == PreviousToken::PropertyName
                    || self.previous_token == PreviousToken::StartArray
                    || (self.innermost_kind == Some(ContainerKind::Array)
                        && self.previous_token.is_value())
                    || (self.depth == 0
                        && (self.previous_token == PreviousToken::None
                            || self.allow_multiple_top_level_values))
            }
        };

        if ok {
            Ok(())
        } else {
            Err(JsonWriteError::InvalidOperation {
                reason: token_kind_reason(kind, in_object, self.depth),
                previous_token: self.previous_token.label(),
            })
        }
    }

    /// A `PropertyName` was written as the most recent token; no value has
    /// followed it yet, so `end_object`/`end_array` would be malformed.
    fn previous_token_is_key_without_value(&self) -> bool {
        self.previous_token == PreviousToken::PropertyName
    }

    /// Commits a validated transition: updates depth, the container-kind
    /// stack, the separator flag, and `previous_token`. Must only be
    /// called after [`StructuralState::validate`] succeeded for the same
    /// `kind` *and* the token's bytes have been reserved/written — commit
    /// ordering is what keeps a rejected call side-effect-free. The depth
    /// limit itself is checked in `validate`, before any byte of the
    /// offending token is reserved or committed (`spec.md` §7).
    pub fn advance(&mut self, kind: TokenKind) -> Result<()> {
        use TokenKind::*;
        match kind {
            StartObject | StartArray => {
                if let Some(prev_kind) = self.innermost_kind {
                    self.bit_set(self.depth - 1, prev_kind == ContainerKind::Object);
                }
                self.innermost_kind = Some(if kind == StartObject {
                    ContainerKind::Object
                } else {
                    ContainerKind::Array
                });
                self.depth += 1;
                self.needs_separator = false;
                self.previous_token = if kind == StartObject {
                    PreviousToken::StartObject
                } else {
                    PreviousToken::StartArray
                };
            }
            EndObject | EndArray => {
                debug_assert!(self.depth > 0);
                self.depth -= 1;
                self.innermost_kind = if self.depth == 0 {
                    None
                } else {
                    Some(if self.bit_get(self.depth - 1) {
                        ContainerKind::Object
                    } else {
                        ContainerKind::Array
                    })
                };
                // No comma between top-level values even when multiple are
                // permitted — only siblings inside a still-open container
                // are separated.
                self.needs_separator = self.depth > 0;
                self.previous_token = if kind == EndObject {
                    PreviousToken::EndObject
                } else {
                    PreviousToken::EndArray
                };
            }
            PropertyName => {
                self.previous_token = PreviousToken::PropertyName;
                // A property name is never itself followed by a
                // separator; the value that follows it is.
                self.needs_separator = false;
            }
            Value => {
                self.needs_separator = self.depth > 0;
                // The caller passes the concrete value kind via
                // `advance_value`; plain `Value` is only reachable from
                // callers that don't care which literal it was (tests).
                self.previous_token = PreviousToken::Number;
            }
        }
        Ok(())
    }

    /// Like [`StructuralState::advance`] for [`TokenKind::Value`], but
    /// records which concrete value kind was written (needed so a
    /// subsequent `PropertyName`/`EndObject` decision and
    /// [`StructuralState::is_terminal`] are accurate).
    pub fn advance_value(&mut self, token: PreviousToken) {
        debug_assert!(token.is_value() || token == PreviousToken::String);
        self.needs_separator = self.depth > 0;
        self.previous_token = token;
    }
}

fn token_kind_reason(kind: TokenKind, in_object: bool, depth: u16) -> &'static str {
    match kind {
        TokenKind::StartObject | TokenKind::StartArray => {
            "a container start is not valid here"
        }
        TokenKind::EndObject => {
            if depth == 0 {
                "end_object at depth 0"
            } else if !in_object {
                "end_object while the innermost container is an array"
            } else {
                "end_object immediately after a property name"
            }
        }
        TokenKind::EndArray => {
            if depth == 0 {
                "end_array at depth 0"
            } else if in_object {
                "end_array while the innermost container is an object"
            } else {
                "end_array immediately after a property name"
            }
        }
        TokenKind::PropertyName => "a property name is not valid here",
        TokenKind::Value => "a value is not valid here",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object() {
        let mut s = StructuralState::new(DEFAULT_MAX_DEPTH, false);
        s.validate(TokenKind::StartObject).unwrap();
        s.advance(TokenKind::StartObject).unwrap();
        s.validate(TokenKind::EndObject).unwrap();
        s.advance(TokenKind::EndObject).unwrap();
        assert!(s.is_terminal());
    }

    #[test]
    fn property_then_value() {
        let mut s = StructuralState::new(DEFAULT_MAX_DEPTH, false);
        s.advance(TokenKind::StartObject).unwrap();
        s.validate(TokenKind::PropertyName).unwrap();
        s.advance(TokenKind::PropertyName).unwrap();
        s.validate(TokenKind::Value).unwrap();
        s.advance_value(PreviousToken::Number);
        s.validate(TokenKind::EndObject).unwrap();
        s.advance(TokenKind::EndObject).unwrap();
        assert!(s.is_terminal());
    }

    #[test]
    fn property_name_rejected_in_array() {
        let mut s = StructuralState::new(DEFAULT_MAX_DEPTH, false);
        s.advance(TokenKind::StartArray).unwrap();
        assert!(s.validate(TokenKind::PropertyName).is_err());
    }

    #[test]
    fn end_object_rejected_after_property_name_without_value() {
        let mut s = StructuralState::new(DEFAULT_MAX_DEPTH, false);
        s.advance(TokenKind::StartObject).unwrap();
        s.advance(TokenKind::PropertyName).unwrap();
        assert!(s.validate(TokenKind::EndObject).is_err());
    }

    #[test]
    fn end_array_rejected_on_object() {
        let mut s = StructuralState::new(DEFAULT_MAX_DEPTH, false);
        s.advance(TokenKind::StartObject).unwrap();
        assert!(s.validate(TokenKind::EndArray).is_err());
    }

    #[test]
    fn single_top_level_value_then_rejected() {
        let mut s = StructuralState::new(DEFAULT_MAX_DEPTH, false);
        s.validate(TokenKind::Value).unwrap();
        s.advance_value(PreviousToken::Number);
        assert!(s.validate(TokenKind::Value).is_err());
    }

    #[test]
    fn multiple_top_level_values_when_opted_in() {
        let mut s = StructuralState::new(DEFAULT_MAX_DEPTH, true);
        s.validate(TokenKind::Value).unwrap();
        s.advance_value(PreviousToken::Number);
        s.validate(TokenKind::Value).unwrap();
        s.advance_value(PreviousToken::Number);
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut s = StructuralState::new(2, false);
        s.validate(TokenKind::StartArray).unwrap();
        s.advance(TokenKind::StartArray).unwrap();
        s.validate(TokenKind::StartArray).unwrap();
        s.advance(TokenKind::StartArray).unwrap();
        assert_eq!(
            s.validate(TokenKind::StartArray).unwrap_err(),
            JsonWriteError::DepthLimitExceeded { max_depth: 2 }
        );
    }

    #[test]
    fn exactly_max_depth_succeeds() {
        let mut s = StructuralState::new(3, false);
        for _ in 0..3 {
            s.validate(TokenKind::StartArray).unwrap();
            s.advance(TokenKind::StartArray).unwrap();
        }
        assert_eq!(s.depth(), 3);
    }

    #[test]
    fn nested_array_of_objects_tracks_kind_across_levels() {
        let mut s = StructuralState::new(DEFAULT_MAX_DEPTH, false);
        s.advance(TokenKind::StartArray).unwrap();
        s.advance(TokenKind::StartObject).unwrap();
        assert_eq!(s.innermost_kind(), Some(ContainerKind::Object));
        s.advance(TokenKind::EndObject).unwrap();
        assert_eq!(s.innermost_kind(), Some(ContainerKind::Array));
        s.advance(TokenKind::EndArray).unwrap();
        assert!(s.is_terminal());
    }

    #[test]
    fn separator_flag_set_after_value_and_cleared_after_start() {
        let mut s = StructuralState::new(DEFAULT_MAX_DEPTH, false);
        s.advance(TokenKind::StartArray).unwrap();
        assert!(!s.needs_separator());
        s.advance_value(PreviousToken::Number);
        assert!(s.needs_separator());
    }
}
