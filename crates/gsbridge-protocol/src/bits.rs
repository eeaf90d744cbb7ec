//! Bit-field access within a 64-bit message word.

use crate::error::{CodecError, Result};

/// One named field of a message layout: `width` bits starting at `offset`.
///
/// `max` is the largest value the field accepts when packing. It defaults to
/// the largest value the width can hold and may be tightened per layout
/// (e.g. a 7-bit speed that only goes to 100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub name: &'static str,
    pub offset: u32,
    pub width: u32,
    pub max: u64,
}

impl BitField {
    pub const fn new(name: &'static str, offset: u32, width: u32) -> Self {
        Self {
            name,
            offset,
            width,
            max: mask(width),
        }
    }

    /// Same field with a tighter accepted range.
    pub const fn with_max(self, max: u64) -> Self {
        Self { max, ..self }
    }

    /// Extract the field from `word`.
    pub const fn get(&self, word: u64) -> u64 {
        (word >> self.offset) & mask(self.width)
    }

    /// Write `value` into the field of `word`.
    ///
    /// Values above `max` are rejected rather than masked.
    pub fn put(&self, word: u64, value: u64) -> Result<u64> {
        if value > self.max {
            return Err(CodecError::FieldOutOfRange {
                field: self.name,
                value,
                max: self.max,
            });
        }
        let cleared = word & !(mask(self.width) << self.offset);
        Ok(cleared | (value << self.offset))
    }
}

const fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// The type discriminant shared by every layout.
pub const TYPE: BitField = BitField::new("type", 0, 5);
