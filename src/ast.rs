//! Parsed entities of the bitfield specification language.
//!
//! The parser produces an immutable, declaration-ordered list of entities;
//! name lookup and resolution happen in a separate pass (see [`crate::compile`]).
//! Nothing here carries resolved layout yet.

/// A top-level declaration, in source order.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// `base N` or `base N(logical, sign_extend)`; scopes everything after it.
    Base(BaseSpec),
    Block(BlockDecl),
    Union(UnionDecl),
}

/// A base directive: machine word width plus the logical width used for
/// sign-extension semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseSpec {
    pub width: u64,
    pub logical: u64,
    pub sign_extend: bool,
}

/// One field declaration inside a block. `name` is `None` for padding.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: Option<String>,
    pub width: u64,
    pub high: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockDecl {
    pub name: String,
    /// Explicit constructor-argument order, when given.
    pub visible_order: Option<Vec<String>>,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionDecl {
    pub name: String,
    /// Name of the discriminant field shared by every variant block.
    pub tag_name: String,
    /// Class-mask table entries as written: (tag width, mask pattern).
    pub masks: Vec<(u64, u64)>,
    /// Variants as written: (block name, tag value).
    pub tags: Vec<(String, u64)>,
}
