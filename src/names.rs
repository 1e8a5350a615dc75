//! Candidate name derivation and corpus-based pruning.
//!
//! The generator can emit one definition per derivable name (constructors,
//! raw-pointer constructors, per-field accessors, union tag readers). When a
//! corpus of consumer sources is supplied, only the names actually used are
//! selected. Matching is greedy longest-name-first over whole tokens, so a
//! name that is a prefix of another (`Block_get_field` vs
//! `Block_get_fieldLong`) is never selected by an occurrence of the longer
//! one.

use hashbrown::{HashMap, HashSet};

use crate::layout::Block;
use crate::union::TaggedUnion;

/// Names selected for emission.
pub type Selection = HashSet<String>;

/// Candidate names for a standalone block, or for a block as a variant of
/// `union`. Blocks flagged as union variants produce no standalone names.
pub fn block_names(block: &Block, union: Option<&TaggedUnion>) -> Vec<String> {
    let prefix = match union {
        None if block.tagged => return Vec::new(),
        None => block.name.clone(),
        Some(u) => format!("{}_{}", u.name, block.name),
    };

    let mut names = vec![format!("{prefix}_new"), format!("{prefix}_ptr_new")];
    for field in &block.fields {
        if let Some(u) = union {
            if field.name == u.tag_name {
                continue;
            }
        }
        names.push(format!("{}_get_{}", prefix, field.name));
        names.push(format!("{}_set_{}", prefix, field.name));
        names.push(format!("{}_ptr_set_{}", prefix, field.name));
    }
    names
}

/// Candidate names for a union: the tag reader pair plus every variant's
/// namespaced block names.
pub fn union_names(union: &TaggedUnion, blocks: &[Block]) -> Vec<String> {
    let mut names = vec![
        format!("{}_get_{}", union.name, union.tag_name),
        format!("{}_{}_equals", union.name, union.tag_name),
    ];
    for variant in &union.variants {
        names.extend(block_names(&blocks[variant.block], Some(union)));
    }
    names
}

/// The full candidate set, blocks then unions, declaration order.
pub fn candidates(blocks: &[Block], unions: &[TaggedUnion]) -> Vec<String> {
    let mut names = Vec::new();
    for block in blocks {
        names.extend(block_names(block, None));
    }
    for union in unions {
        names.extend(union_names(union, blocks));
    }
    names
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Select the candidate names occurring in the corpus texts.
///
/// Candidates are bucketed by first byte and tried longest first at every
/// position; a match must be delimited by non-word bytes on both sides.
pub fn prune(candidates: &[String], corpus: &[String]) -> Selection {
    let mut sorted: Vec<&str> = candidates.iter().map(String::as_str).collect();
    sorted.sort_unstable_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    let mut buckets: HashMap<u8, Vec<&str>> = HashMap::new();
    for name in sorted {
        if let Some(&first) = name.as_bytes().first() {
            buckets.entry(first).or_default().push(name);
        }
    }

    let mut selected = Selection::new();
    for text in corpus {
        let bytes = text.as_bytes();
        let mut pos = 0;
        while pos < bytes.len() {
            if pos > 0 && is_word_byte(bytes[pos - 1]) {
                pos += 1;
                continue;
            }
            let Some(names) = buckets.get(&bytes[pos]) else {
                pos += 1;
                continue;
            };
            let matched = names.iter().find(|name| {
                let end = pos + name.len();
                bytes.len() >= end
                    && &bytes[pos..end] == name.as_bytes()
                    && bytes.get(end).is_none_or(|&b| !is_word_byte(b))
            });
            match matched {
                Some(name) => {
                    selected.insert(name.to_string());
                    pos += name.len();
                }
                None => pos += 1,
            }
        }
    }
    selected
}

/// Select every candidate (no corpus supplied).
pub fn select_all(candidates: &[String]) -> Selection {
    candidates.iter().cloned().collect()
}
