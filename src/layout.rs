//! Block layout resolution.
//!
//! Fields are packed from a block's most-significant bit downward: the first
//! declared field occupies the highest bit offsets, the last the lowest.
//! A block's total size must be a whole number of base words, and no named
//! field may straddle a word boundary. Padding reserves space but produces
//! no accessor and is dropped after offset assignment.

use crate::ast::{BaseSpec, BlockDecl};
use crate::error::{Error, Result};

/// A validated base: machine word width, logical width (the bits that are
/// "real" for sign-extension purposes) and the sign-extension flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Base {
    pub width: u64,
    pub logical: u64,
    pub sign_extend: bool,
}

impl Base {
    pub fn new(spec: BaseSpec) -> Result<Base> {
        if !matches!(spec.width, 8 | 16 | 32 | 64) {
            return Err(Error::InvalidBase(spec.width));
        }
        if spec.logical == 0 || spec.logical > spec.width {
            return Err(Error::InvalidLogicalWidth {
                logical: spec.logical,
                base: spec.width,
            });
        }
        Ok(Base {
            width: spec.width,
            logical: spec.logical,
            sign_extend: spec.sign_extend,
        })
    }

    /// The Rust word type backing a block with this base.
    pub fn word_type(&self) -> &'static str {
        match self.width {
            8 => "u8",
            16 => "u16",
            32 => "u32",
            _ => "u64",
        }
    }

    /// Literal suffix used on every generated constant.
    pub fn suffix(&self) -> &'static str {
        self.word_type()
    }
}

/// A named field with its resolved position. `offset` counts from the
/// block's least-significant bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub offset: u64,
    pub size: u64,
    pub high: bool,
}

/// A block after layout resolution. `fields` keeps declaration (storage)
/// order and contains only named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub base: Base,
    /// Total width in bits, including padding. Fixed at construction.
    pub size: u64,
    /// Number of base-width words backing the block.
    pub words: u64,
    pub fields: Vec<Field>,
    /// Constructor argument order; defaults to declaration order.
    pub visible_order: Vec<String>,
    /// Set when the block is a variant of a tagged union, which suppresses
    /// its standalone accessors.
    pub tagged: bool,
}

impl Block {
    pub fn resolve(decl: &BlockDecl, base: Base) -> Result<Block> {
        let size: u64 = decl.fields.iter().map(|f| f.width).sum();
        if size % base.width != 0 {
            return Err(Error::SizeNotWordMultiple {
                block: decl.name.clone(),
            });
        }

        let mut offset = size;
        let mut fields = Vec::new();
        for field in &decl.fields {
            offset -= field.width;
            let Some(name) = &field.name else {
                continue;
            };
            if field.width == 0 {
                return Err(Error::ZeroWidthField {
                    block: decl.name.clone(),
                    field: name.clone(),
                });
            }
            if field.high && field.width > base.logical {
                return Err(Error::HighFieldTooWide {
                    block: decl.name.clone(),
                    field: name.clone(),
                    size: field.width,
                    logical: base.logical,
                });
            }
            // A field must start and end in the same word.
            if offset / base.width != (offset + field.width - 1) / base.width {
                return Err(Error::FieldCrossesBoundary {
                    block: decl.name.clone(),
                    field: name.clone(),
                });
            }
            fields.push(Field {
                name: name.clone(),
                offset,
                size: field.width,
                high: field.high,
            });
        }

        let visible_order = match &decl.visible_order {
            None => fields.iter().map(|f| f.name.clone()).collect(),
            Some(order) => {
                let mut missing: Vec<&Field> = fields.iter().collect();
                for name in order {
                    if !fields.iter().any(|f| &f.name == name) {
                        return Err(Error::UnknownVisibleField {
                            block: decl.name.clone(),
                            field: name.clone(),
                        });
                    }
                    let before = missing.len();
                    missing.retain(|f| &f.name != name);
                    if missing.len() == before {
                        return Err(Error::DuplicateVisibleField {
                            block: decl.name.clone(),
                            field: name.clone(),
                        });
                    }
                }
                if !missing.is_empty() {
                    return Err(Error::MissingVisibleFields {
                        block: decl.name.clone(),
                        fields: missing.iter().map(|f| f.name.clone()).collect(),
                    });
                }
                order.clone()
            }
        };

        Ok(Block {
            name: decl.name.clone(),
            base,
            size,
            words: size / base.width,
            fields,
            visible_order,
            tagged: false,
        })
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
