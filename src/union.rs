//! Tagged-union resolution.
//!
//! A tagged union groups same-sized, same-base blocks ("variants") that share
//! a discriminant ("tag") field. Variants may use tag fields of different bit
//! widths; a width-indexed class-mask table encodes, for each width except the
//! widest, a reserved bit pattern meaning "the true tag is wider, keep
//! looking". Resolution validates the mask table and every variant's tag
//! value against it, so that the generated decode cascade is unambiguous.
//!
//! Given widths 4, 8 and 12 one possible class table is:
//!
//! ```text
//!                  * * _ _     (** != 11 means: 4-bit tag)
//!        0 _ _ _   1 1 _ _
//!  _ _ _ _ 1 _ _ _ 1 1 _ _
//! ```
//!
//! Masks are written relative to their own field and normalized internally to
//! `class_offset` (the minimum tag offset) so they can be compared; tag
//! offsets are absolute; tag values are relative to their field.
//!
//! All mask arithmetic is done in `u128` and relative to `class_offset`, so a
//! full-width value shifted within its word cannot overflow.

use hashbrown::{HashMap, HashSet};

use crate::ast::UnionDecl;
use crate::error::{Error, Result};
use crate::layout::{Base, Block};

/// One union variant: a reference into the resolved block list plus the
/// literal tag value injected by its constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub name: String,
    pub value: u64,
    pub block: usize,
}

/// A tagged union after resolution. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedUnion {
    pub name: String,
    pub tag_name: String,
    /// Copied from the (validated equal) variant blocks.
    pub base: Base,
    pub size: u64,
    pub words: u64,
    pub variants: Vec<Variant>,
    /// Distinct tag-field widths in use, ascending.
    pub widths: Vec<u64>,
    /// Absolute tag-field offset per width.
    pub tag_offset: HashMap<u64, u64>,
    /// Class masks normalized relative to `class_offset`.
    pub classes: HashMap<u64, u128>,
    /// Minimum tag offset across widths.
    pub class_offset: u64,
}

impl TaggedUnion {
    /// Class mask positioned absolutely relative to the lsb of the tag word.
    pub fn word_classmask(&self, width: u64) -> u64 {
        (self.classes[&width] << (self.class_offset % self.base.width)) as u64
    }
}

fn bits(width: u64) -> u128 {
    (1u128 << width) - 1
}

/// Resolve one union declaration against the already-resolved blocks.
/// Flags every variant block as `tagged`.
pub fn resolve(
    decl: &UnionDecl,
    blocks: &mut [Block],
    index: &HashMap<String, usize>,
) -> Result<TaggedUnion> {
    Resolver::new(decl, blocks, index)?.resolve()
}

struct Resolver<'a> {
    decl: &'a UnionDecl,
    blocks: &'a mut [Block],
    /// (block index, tag offset, tag size, tag high) per declared tag.
    variants: Vec<(usize, u64, u64, bool)>,
    widths: Vec<u64>,
    tag_offset: HashMap<u64, u64>,
    classes: HashMap<u64, u128>,
    class_offset: u64,
}

impl<'a> Resolver<'a> {
    fn new(
        decl: &'a UnionDecl,
        blocks: &'a mut [Block],
        index: &HashMap<String, usize>,
    ) -> Result<Self> {
        if decl.tags.is_empty() {
            return Err(Error::EmptyUnion {
                union: decl.name.clone(),
            });
        }

        let mut used_names = HashSet::new();
        let mut used_values = HashSet::new();
        for (name, value) in &decl.tags {
            if !used_names.insert(name.as_str()) {
                return Err(Error::DuplicateTagName {
                    union: decl.name.clone(),
                    name: name.clone(),
                });
            }
            if !used_values.insert(*value) {
                return Err(Error::DuplicateTagValue {
                    union: decl.name.clone(),
                    value: *value,
                });
            }
        }

        // Grab block references and tag-field positions for every variant.
        let mut variants = Vec::new();
        let mut tag_offset: HashMap<u64, u64> = HashMap::new();
        for (name, _) in &decl.tags {
            let &block_idx = index.get(name.as_str()).ok_or_else(|| {
                Error::UnknownVariantBlock {
                    union: decl.name.clone(),
                    block: name.clone(),
                }
            })?;
            let field = blocks[block_idx].field(&decl.tag_name).ok_or_else(|| {
                Error::MissingTagField {
                    union: decl.name.clone(),
                    block: name.clone(),
                    tag: decl.tag_name.clone(),
                }
            })?;
            let (offset, size, high) = (field.offset, field.size, field.high);

            // All variants of one tag width must place the tag identically.
            match tag_offset.get(&size) {
                Some(&seen) if seen != offset => {
                    return Err(Error::TagOffsetMismatch {
                        union: decl.name.clone(),
                        variant: name.clone(),
                    });
                }
                _ => {
                    tag_offset.insert(size, offset);
                }
            }
            variants.push((block_idx, offset, size, high));
        }

        let mut widths: Vec<u64> = tag_offset.keys().copied().collect();
        widths.sort_unstable();
        let class_offset = *tag_offset.values().min().expect("at least one variant");

        // Every width's tag field must live in the same word, or the decode
        // cascade could not index a single word. Checking here also bounds
        // all offsets relative to class_offset below one word width.
        let word_width = blocks[variants[0].0].base.width;
        let tag_index = class_offset / word_width;
        for w in &widths {
            let index = tag_offset[w] / word_width;
            if index != tag_index {
                return Err(Error::TagWordMismatch {
                    union: decl.name.clone(),
                    word: index,
                    expected: tag_index,
                });
            }
        }

        Ok(Resolver {
            decl,
            blocks,
            variants,
            widths,
            tag_offset,
            classes: HashMap::new(),
            class_offset,
        })
    }

    fn resolve(mut self) -> Result<TaggedUnion> {
        self.make_classes()?;

        // Consistency pass over the variants.
        let first = self.variants[0].0;
        let (union_base, union_size) = (self.blocks[first].base, self.blocks[first].size);
        for (i, &(block_idx, _offset, size, high)) in self.variants.iter().enumerate() {
            let (name, value) = &self.decl.tags[i];
            if self.blocks[block_idx].base != union_base {
                return Err(Error::VariantBaseMismatch {
                    union: self.decl.name.clone(),
                    variant: name.clone(),
                });
            }
            if self.blocks[block_idx].size != union_size {
                return Err(Error::VariantSizeMismatch {
                    union: self.decl.name.clone(),
                    variant: name.clone(),
                });
            }
            self.assert_value_in_class(name, *value, size)?;
            if high {
                return Err(Error::TagFieldHighAligned {
                    union: self.decl.name.clone(),
                    variant: name.clone(),
                });
            }
            self.blocks[block_idx].tagged = true;
        }

        Ok(TaggedUnion {
            name: self.decl.name.clone(),
            tag_name: self.decl.tag_name.clone(),
            base: union_base,
            size: union_size,
            words: union_size / union_base.width,
            variants: self
                .decl
                .tags
                .iter()
                .zip(&self.variants)
                .map(|((name, value), &(block, ..))| Variant {
                    name: name.clone(),
                    value: *value,
                    block,
                })
                .collect(),
            widths: self.widths,
            tag_offset: self.tag_offset,
            classes: self.classes,
            class_offset: self.class_offset,
        })
    }

    /// Validate the class-mask table and normalize it to `class_offset`.
    fn make_classes(&mut self) -> Result<()> {
        for &(width, mask) in &self.decl.masks {
            if !self.tag_offset.contains_key(&width) {
                return Err(Error::ClassMaskUnused {
                    union: self.decl.name.clone(),
                    tag: self.decl.tag_name.clone(),
                    width,
                });
            }
            let normalized = (mask as u128) << (self.tag_offset[&width] - self.class_offset);
            if self.classes.insert(width, normalized).is_some() {
                return Err(Error::DuplicateClassMask {
                    union: self.decl.name.clone(),
                    width,
                });
            }
        }

        if self.classes.is_empty() {
            self.classes.insert(self.widths[0], 0);
        }

        for w in &self.widths {
            if !self.classes.contains_key(w) {
                return Err(Error::ClassMaskMissing {
                    union: self.decl.name.clone(),
                    tag: self.decl.tag_name.clone(),
                    width: *w,
                });
            }
        }

        // All mask comparisons happen relative to class_offset; the same-word
        // check already guarantees these shifts stay below the word width.
        let widths = self.widths.clone();
        for &w in &widths {
            let offset_field = bits(w) << (self.tag_offset[&w] - self.class_offset);
            if self.classes[&w] | offset_field != offset_field {
                return Err(Error::ClassMaskBounds {
                    union: self.decl.name.clone(),
                    tag: self.decl.tag_name.clone(),
                    width: w,
                    mask: self.represent_class(w),
                    field: self.represent_field(w),
                });
            }
        }

        if widths.len() > 1 && self.classes[&widths[0]] == 0 {
            return Err(Error::ClassMaskZeroNarrowest {
                union: self.decl.name.clone(),
                tag: self.decl.tag_name.clone(),
                width: widths[0],
            });
        }

        // Identical masks are only a conflict among the widths before the
        // final one; the widest class is decoded unconditionally.
        for i in 1..widths.len().saturating_sub(1) {
            if self.classes[&widths[i - 1]] == self.classes[&widths[i]] {
                return Err(Error::ClassMaskDuplicate {
                    union: self.decl.name.clone(),
                    tag: self.decl.tag_name.clone(),
                });
            }
        }

        // Narrower masks must be included within every wider mask.
        for pair in widths.windows(2) {
            let (narrow, wide) = (pair[0], pair[1]);
            if self.classes[&wide] & self.classes[&narrow] != self.classes[&narrow] {
                return Err(Error::ClassMaskNotNested {
                    union: self.decl.name.clone(),
                    tag: self.decl.tag_name.clone(),
                    wider: format!("{:#b}", self.classes[&wide]),
                    wider_width: wide,
                    narrower: format!("{:#b}", self.classes[&narrow]),
                    narrower_width: narrow,
                });
            }
        }

        if log::log_enabled!(log::Level::Debug) {
            log::debug!("classes for {}.{}:", self.decl.name, self.decl.tag_name);
            for &w in &widths {
                log::debug!("{:2} = {}", w, self.represent_class(w));
            }
        }

        Ok(())
    }

    /// Check one variant's literal tag value against the class encoding.
    fn assert_value_in_class(&self, name: &str, value: u64, width: u64) -> Result<()> {
        let cvalue = (value as u128) << (self.tag_offset[&width] - self.class_offset);

        let offset_field = bits(width) << (self.tag_offset[&width] - self.class_offset);
        if cvalue | offset_field != offset_field {
            return Err(Error::TagValueBounds {
                union: self.decl.name.clone(),
                variant: name.to_string(),
                value: self.represent_value(value, width),
                field: self.represent_field(width),
            });
        }

        // A wider value must fully match every narrower escape pattern, so
        // the narrower decoders fall through to it.
        for &lw in self.widths.iter().filter(|&&lw| lw < width) {
            let mask = self.classes[&lw];
            if cvalue & mask != mask {
                return Err(Error::TagValueMissesClass {
                    union: self.decl.name.clone(),
                    variant: name.to_string(),
                    value: self.represent_value(value, width),
                    width,
                    narrower: lw,
                    mask: self.represent_class(lw),
                });
            }
        }

        // A non-widest value must not itself match its own escape pattern.
        let pos = self.widths.iter().position(|&w| w == width).unwrap();
        if pos + 1 < self.widths.len() && cvalue & self.classes[&width] == self.classes[&width] {
            return Err(Error::TagValueEscapesClass {
                union: self.decl.name.clone(),
                variant: name.to_string(),
                value: self.represent_value(value, width),
                width,
                mask: self.represent_class(width),
            });
        }

        Ok(())
    }

    fn max_width(&self) -> u64 {
        *self.widths.last().unwrap()
    }

    fn represent_value(&self, value: u64, width: u64) -> String {
        let max = self.max_width();
        let tail = format!(
            "{:01$b}{2}",
            value,
            width as usize,
            "_".repeat((self.tag_offset[&width] - self.class_offset) as usize)
        );
        let total = (max + self.tag_offset[&max] - self.class_offset) as usize;
        format!("{}{}", "_".repeat(total.saturating_sub(tail.len())), tail)
    }

    fn represent_class(&self, width: u64) -> String {
        let cmask = self.classes[&width];
        let max = self.max_width() as usize;
        format!("{:01$b}", cmask, max).replace('0', "-") + &format!(" ({:#x})", cmask)
    }

    fn represent_field(&self, width: u64) -> String {
        let offset = self.tag_offset[&width] - self.class_offset;
        let max = self.max_width() as usize;
        format!("{:01$b}", bits(width) << offset, max)
            .replace('0', "-")
            .replace('1', "#")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BlockDecl, FieldDecl};
    use crate::layout::Base;

    fn base32() -> Base {
        Base::new(crate::ast::BaseSpec {
            width: 32,
            logical: 32,
            sign_extend: false,
        })
        .unwrap()
    }

    /// Block with a low-aligned tag field of `tag_size` bits at the bottom of
    /// one 32-bit word, preceded by an anonymous payload.
    fn variant_block(name: &str, tag_size: u64) -> Block {
        let decl = BlockDecl {
            name: name.to_string(),
            visible_order: None,
            fields: vec![
                FieldDecl {
                    name: Some("payload".to_string()),
                    width: 8,
                    high: false,
                },
                FieldDecl {
                    name: None,
                    width: 24 - tag_size,
                    high: false,
                },
                FieldDecl {
                    name: Some("kind".to_string()),
                    width: tag_size,
                    high: false,
                },
            ],
        };
        Block::resolve(&decl, base32()).unwrap()
    }

    fn union_decl(masks: Vec<(u64, u64)>, tags: Vec<(&str, u64)>) -> UnionDecl {
        UnionDecl {
            name: "msg".to_string(),
            tag_name: "kind".to_string(),
            masks,
            tags: tags.into_iter().map(|(n, v)| (n.to_string(), v)).collect(),
        }
    }

    fn run(
        masks: Vec<(u64, u64)>,
        tags: Vec<(&str, u64)>,
        mut blocks: Vec<Block>,
    ) -> Result<TaggedUnion> {
        let index: HashMap<String, usize> = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect();
        resolve(&union_decl(masks, tags), &mut blocks, &index)
    }

    fn two_width_blocks() -> Vec<Block> {
        vec![
            variant_block("a", 4),
            variant_block("b", 4),
            variant_block("wide", 8),
        ]
    }

    #[test]
    fn derives_widths_and_class_offset() {
        let u = run(
            vec![(4, 0b1100), (8, 0b10001100)],
            vec![("a", 0), ("b", 1), ("wide", 0b10001100)],
            two_width_blocks(),
        )
        .unwrap();

        assert_eq!(u.widths, vec![4, 8]);
        assert_eq!(u.class_offset, 0);
        assert_eq!(u.tag_offset[&4], 0);
        assert_eq!(u.tag_offset[&8], 0);
        assert_eq!(u.word_classmask(4), 0b1100);
        assert_eq!(u.base, base32());
        assert_eq!(u.words, 1);
    }

    #[test]
    fn default_class_table_is_zero_mask_for_narrowest() {
        let u = run(vec![], vec![("a", 0), ("b", 7)], two_width_blocks()[..2].to_vec()).unwrap();
        assert_eq!(u.widths, vec![4]);
        assert_eq!(u.classes[&4], 0);
    }

    #[test]
    fn used_width_without_mask_rejected() {
        let err = run(
            vec![(4, 0b1100)],
            vec![("a", 0), ("wide", 0b1100)],
            two_width_blocks(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ClassMaskMissing { width: 8, .. }));
    }

    #[test]
    fn mask_for_unused_width_rejected() {
        let err = run(
            vec![(4, 0b1100), (8, 0b1100), (16, 1)],
            vec![("a", 0), ("wide", 0b1100)],
            two_width_blocks(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ClassMaskUnused { width: 16, .. }));
    }

    #[test]
    fn zero_narrowest_mask_rejected_when_multiple_widths() {
        let err = run(
            vec![(4, 0), (8, 0b1100)],
            vec![("a", 0), ("wide", 0)],
            two_width_blocks(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ClassMaskZeroNarrowest { width: 4, .. }));
    }

    #[test]
    fn mask_exceeding_field_bounds_rejected() {
        let err = run(
            vec![(4, 0b11000)],
            vec![("a", 0), ("b", 1)],
            vec![variant_block("a", 4), variant_block("b", 4)],
        )
        .unwrap_err();
        assert!(matches!(err, Error::ClassMaskBounds { width: 4, .. }));
    }

    #[test]
    fn identical_mask_with_final_width_is_allowed() {
        // The duplicate rule only applies to widths before the final one:
        // the widest class never tests its mask.
        let u = run(
            vec![(4, 0b1100), (8, 0b1100)],
            vec![("a", 0), ("wide", 0b11001100)],
            two_width_blocks(),
        )
        .unwrap();
        assert_eq!(u.classes[&4], u.classes[&8]);
    }

    #[test]
    fn duplicate_non_final_mask_rejected() {
        let mut blocks = two_width_blocks();
        blocks.push(variant_block("wider", 12));
        let err = run(
            vec![(4, 0b1100), (8, 0b1100), (12, 0b100011001100)],
            vec![("a", 0), ("wide", 0b1100), ("wider", 0b11001100)],
            blocks,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ClassMaskDuplicate { .. }));
    }

    #[test]
    fn non_nested_masks_rejected() {
        let err = run(
            vec![(4, 0b1100), (8, 0b110000)],
            vec![("a", 0), ("wide", 0b1100)],
            two_width_blocks(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ClassMaskNotNested { .. }));
    }

    #[test]
    fn tag_value_exceeding_field_rejected() {
        let err = run(vec![], vec![("a", 0x1f), ("b", 0)], two_width_blocks()[..2].to_vec())
            .unwrap_err();
        assert!(matches!(err, Error::TagValueBounds { .. }));
    }

    #[test]
    fn narrow_value_matching_own_escape_pattern_rejected() {
        // 0b1101 fully matches the 4-bit escape mask 0b1100, so a 4-bit
        // variant may not use it.
        let err = run(
            vec![(4, 0b1100), (8, 0b1100)],
            vec![("a", 0b1101), ("wide", 0b1100)],
            two_width_blocks(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::TagValueEscapesClass { width: 4, .. }));
    }

    #[test]
    fn wide_value_missing_narrow_escape_pattern_rejected() {
        // A wide value must carry the narrow escape bits or a narrow decoder
        // would claim it.
        let err = run(
            vec![(4, 0b1100), (8, 0b1100)],
            vec![("a", 0), ("wide", 0b10000000)],
            two_width_blocks(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::TagValueMissesClass { width: 8, narrower: 4, .. }
        ));
    }

    #[test]
    fn high_aligned_tag_rejected() {
        let decl = BlockDecl {
            name: "h".to_string(),
            visible_order: None,
            fields: vec![
                FieldDecl {
                    name: None,
                    width: 28,
                    high: false,
                },
                FieldDecl {
                    name: Some("kind".to_string()),
                    width: 4,
                    high: true,
                },
            ],
        };
        let block = Block::resolve(&decl, base32()).unwrap();
        let err = run(vec![], vec![("h", 0)], vec![block]).unwrap_err();
        assert!(matches!(err, Error::TagFieldHighAligned { .. }));
    }

    #[test]
    fn size_mismatch_rejected() {
        let decl = BlockDecl {
            name: "big".to_string(),
            visible_order: None,
            fields: vec![
                FieldDecl {
                    name: None,
                    width: 60,
                    high: false,
                },
                FieldDecl {
                    name: Some("kind".to_string()),
                    width: 4,
                    high: false,
                },
            ],
        };
        let big = Block::resolve(&decl, base32()).unwrap();
        let err = run(vec![], vec![("a", 0), ("big", 1)], vec![variant_block("a", 4), big])
            .unwrap_err();
        assert!(matches!(err, Error::VariantSizeMismatch { .. }));
    }

    #[test]
    fn tag_offset_mismatch_rejected() {
        let decl = BlockDecl {
            name: "shifted".to_string(),
            visible_order: None,
            fields: vec![
                FieldDecl {
                    name: None,
                    width: 24,
                    high: false,
                },
                FieldDecl {
                    name: Some("kind".to_string()),
                    width: 4,
                    high: false,
                },
                FieldDecl {
                    name: None,
                    width: 4,
                    high: false,
                },
            ],
        };
        let shifted = Block::resolve(&decl, base32()).unwrap();
        let err = run(
            vec![],
            vec![("a", 0), ("shifted", 1)],
            vec![variant_block("a", 4), shifted],
        )
        .unwrap_err();
        assert!(matches!(err, Error::TagOffsetMismatch { .. }));
    }

    #[test]
    fn duplicate_tag_names_and_values_rejected() {
        let blocks = || two_width_blocks()[..2].to_vec();
        assert!(matches!(
            run(vec![], vec![("a", 0), ("a", 1)], blocks()),
            Err(Error::DuplicateTagName { .. })
        ));
        assert!(matches!(
            run(vec![], vec![("a", 0), ("b", 0)], blocks()),
            Err(Error::DuplicateTagValue { .. })
        ));
    }

    #[test]
    fn variant_blocks_are_flagged_tagged() {
        let mut blocks = two_width_blocks()[..2].to_vec();
        let index: HashMap<String, usize> = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect();
        resolve(
            &union_decl(vec![], vec![("a", 0), ("b", 1)]),
            &mut blocks,
            &index,
        )
        .unwrap();
        assert!(blocks.iter().all(|b| b.tagged));
    }
}
