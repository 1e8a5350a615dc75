//! Per-field and per-tag encoding parameters.
//!
//! Everything the renderer needs to print an accessor is computed here as
//! plain data: word index, shift amount and directions, masks and the
//! sign-extension constants. Note the direction flip for high-aligned fields
//! whose physical position lies above the logical width boundary: a negative
//! shift is negated and the read/write directions swap.

use crate::layout::{Base, Field};
use crate::union::TaggedUnion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Left,
    Right,
}

/// Parameters for one field's reader/writer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAccess {
    /// Index of the word holding the field.
    pub index: usize,
    pub shift: u64,
    /// Direction applied to the masked word on read; the writer uses the
    /// opposite on the incoming value.
    pub read: Shift,
    pub write: Shift,
    /// Mask positioned absolutely within the word.
    pub mask: u64,
    /// All-ones bits above the logical width, OR-ed in when sign-extending.
    pub high_bits: u64,
    /// Bit tested to decide whether a value is negative: `logical - 1`.
    pub extend_bit: u64,
    /// Whether the reader sign-extends (high-aligned field under a
    /// sign-extending base).
    pub sign_extend: bool,
}

/// Parameters for one field's constructor initialization. Constructors OR
/// into zeroed words, so no clear step is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInit {
    pub index: usize,
    pub shift: u64,
    pub dir: Shift,
    /// Mask relative to the incoming value; `None` when the field spans the
    /// whole word (no masking, no contract assert).
    pub mask: Option<u64>,
    pub high_bits: u64,
    pub extend_bit: u64,
}

/// One step of a union's tag decode cascade. Steps are ordered narrowest
/// first; the final step decodes unconditionally and its `classmask` is
/// unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagStep {
    pub width: u64,
    pub index: usize,
    pub shift: u64,
    /// `(1 << width) - 1`.
    pub mask: u64,
    /// Escape pattern positioned absolutely within the word.
    pub classmask: u64,
}

fn word_bits(size: u64) -> u128 {
    (1u128 << size) - 1
}

fn high_bits(base: &Base) -> u64 {
    if base.sign_extend {
        (((1u128 << (base.width - base.logical)) - 1) << base.logical) as u64
    } else {
        0
    }
}

/// Shift amount and directions for a field, shared by accessors and
/// constructor inits.
fn shift_of(base: &Base, field: &Field) -> (u64, Shift, Shift) {
    let word = field.offset % base.width;
    if field.high {
        let shift = base.logical as i64 - field.size as i64 - word as i64;
        if shift < 0 {
            // The field's physical position already lies above the logical
            // width boundary; the read/write directions swap.
            ((-shift) as u64, Shift::Right, Shift::Left)
        } else {
            (shift as u64, Shift::Left, Shift::Right)
        }
    } else {
        (word, Shift::Right, Shift::Left)
    }
}

pub fn field_access(base: &Base, field: &Field) -> FieldAccess {
    let word = field.offset % base.width;
    let (shift, read, write) = shift_of(base, field);
    FieldAccess {
        index: (field.offset / base.width) as usize,
        shift,
        read,
        write,
        mask: (word_bits(field.size) << word) as u64,
        high_bits: if field.high { high_bits(base) } else { 0 },
        extend_bit: base.logical - 1,
        sign_extend: field.high && base.sign_extend,
    }
}

pub fn field_init(base: &Base, field: &Field) -> FieldInit {
    let (shift, _, write) = shift_of(base, field);
    let mask = if field.size < base.width {
        Some(if field.high {
            (word_bits(field.size) << (base.logical - field.size)) as u64
        } else {
            word_bits(field.size) as u64
        })
    } else {
        None
    };
    FieldInit {
        index: (field.offset / base.width) as usize,
        shift,
        dir: write,
        mask,
        high_bits: if field.high { high_bits(base) } else { 0 },
        extend_bit: base.logical - 1,
    }
}

/// The decode cascade for a union's tag, narrowest width first.
pub fn tag_cascade(union: &TaggedUnion) -> Vec<TagStep> {
    union
        .widths
        .iter()
        .map(|&w| {
            let offset = union.tag_offset[&w];
            TagStep {
                width: w,
                index: (offset / union.base.width) as usize,
                shift: offset % union.base.width,
                mask: word_bits(w) as u64,
                classmask: union.word_classmask(w),
            }
        })
        .collect()
}
