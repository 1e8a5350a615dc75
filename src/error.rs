//! Error types for the bitfield compiler.
//!
//! Every error is fatal for the current run: there is no recovery and no
//! partial output. Variants carry the block/field/union names (and, for the
//! class-mask checks, a bit-pattern rendering of the conflict) needed for a
//! useful diagnostic.

use thiserror::Error;

/// Main error type for spec compilation.
#[derive(Error, Debug)]
pub enum Error {
    // Lexical and syntax errors.
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("malformed integer literal '{0}'")]
    MalformedLiteral(String),

    #[error("syntax error at token '{found}' (expected {expected})")]
    UnexpectedToken { found: String, expected: String },

    #[error("unexpected end of input (expected {expected})")]
    UnexpectedEof { expected: String },

    // Configuration errors.
    #[error("invalid base size: {0}")]
    InvalidBase(u64),

    #[error("invalid logical width {logical} for base {base}")]
    InvalidLogicalWidth { logical: u64, base: u64 },

    // Layout errors.
    #[error("size of block {block} is not a multiple of its base")]
    SizeNotWordMultiple { block: String },

    #[error("field {field} of block {block} crosses a word boundary")]
    FieldCrossesBoundary { block: String, field: String },

    #[error("field {field} of block {block} has zero width")]
    ZeroWidthField { block: String, field: String },

    #[error(
        "high field {field} of block {block} is wider ({size} bits) than the \
         logical width ({logical} bits)"
    )]
    HighFieldTooWide {
        block: String,
        field: String,
        size: u64,
        logical: u64,
    },

    // Declaration errors.
    #[error("block {block} declared before any base directive")]
    NoBase { block: String },

    #[error("duplicate declaration of {name}")]
    DuplicateDeclaration { name: String },

    #[error("nonexistent field '{field}' in visible order of block {block}")]
    UnknownVisibleField { block: String, field: String },

    #[error("duplicate field '{field}' in visible order of block {block}")]
    DuplicateVisibleField { block: String, field: String },

    #[error("fields {fields:?} missing from visible order of block {block}")]
    MissingVisibleFields { block: String, fields: Vec<String> },

    // Union consistency errors.
    #[error("tagged union {union} has no variants")]
    EmptyUnion { union: String },

    #[error("duplicate tag name {name} in tagged union {union}")]
    DuplicateTagName { union: String, name: String },

    #[error("duplicate tag value {value} in tagged union {union}")]
    DuplicateTagValue { union: String, value: u64 },

    #[error("unknown block {block} referenced by tagged union {union}")]
    UnknownVariantBlock { union: String, block: String },

    #[error("block {block} of tagged union {union} has no tag field {tag}")]
    MissingTagField {
        union: String,
        block: String,
        tag: String,
    },

    #[error("tag field is high-aligned for element {variant} of tagged union {union}")]
    TagFieldHighAligned { union: String, variant: String },

    #[error("base mismatch for element {variant} of tagged union {union}")]
    VariantBaseMismatch { union: String, variant: String },

    #[error("size mismatch for element {variant} of tagged union {union}")]
    VariantSizeMismatch { union: String, variant: String },

    #[error("tag offset mismatch for element {variant} of tagged union {union}")]
    TagOffsetMismatch { union: String, variant: String },

    #[error(
        "the tag field of tagged union {union} is in a different word \
         ({word:#x}) to the others ({expected:#x})"
    )]
    TagWordMismatch {
        union: String,
        word: u64,
        expected: u64,
    },

    // Class-mask validation errors. The rendered strings picture the masks
    // and fields bit by bit, as in the original diagnostics.
    #[error("masks for {union}.{tag}: none defined for a field of {width} bits")]
    ClassMaskMissing {
        union: String,
        tag: String,
        width: u64,
    },

    #[error(
        "masks for {union}.{tag}: there is a mask with {width} bits but no \
         corresponding fields"
    )]
    ClassMaskUnused {
        union: String,
        tag: String,
        width: u64,
    },

    #[error("duplicate mask for {width} bits in tagged union {union}")]
    DuplicateClassMask { union: String, width: u64 },

    #[error(
        "masks for {union}.{tag}: the mask for {width} bits:\n  {mask}\n\
         exceeds the field bounds:\n  {field}"
    )]
    ClassMaskBounds {
        union: String,
        tag: String,
        width: u64,
        mask: String,
        field: String,
    },

    #[error("masks for {union}.{tag}: the first (width {width}) is zero")]
    ClassMaskZeroNarrowest {
        union: String,
        tag: String,
        width: u64,
    },

    #[error("masks for {union}.{tag}: there is a non-final duplicate")]
    ClassMaskDuplicate { union: String, tag: String },

    #[error(
        "masks for {union}.{tag}: the mask\n  {wider} for width {wider_width} \
         does not include the mask\n  {narrower} for width {narrower_width}"
    )]
    ClassMaskNotNested {
        union: String,
        tag: String,
        wider: String,
        wider_width: u64,
        narrower: String,
        narrower_width: u64,
    },

    #[error(
        "the value for element {variant} of tagged union {union},\n  {value}\n\
         exceeds the field bounds\n  {field}"
    )]
    TagValueBounds {
        union: String,
        variant: String,
        value: String,
        field: String,
    },

    #[error(
        "the value for element {variant} of tagged union {union},\n  {value}\n\
         is invalid: it has {width} bits but fails to match the earlier mask \
         at {narrower} bits,\n  {mask}"
    )]
    TagValueMissesClass {
        union: String,
        variant: String,
        value: String,
        width: u64,
        narrower: u64,
        mask: String,
    },

    #[error(
        "the value for element {variant} of tagged union {union},\n  {value}\n\
         is invalid: it must not match the mask for {width} bits,\n  {mask}"
    )]
    TagValueEscapesClass {
        union: String,
        variant: String,
        value: String,
        width: u64,
        mask: String,
    },
}

/// Result type alias for compilation operations.
pub type Result<T> = std::result::Result<T, Error>;
