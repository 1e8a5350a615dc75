//! Generator for bit-level record accessors.
//!
//! Takes a declarative description of fixed-layout records ("blocks" of
//! fields packed into machine words, optionally grouped into tagged unions
//! with variable-width discriminants) and emits Rust source implementing
//! constructors, readers and writers for them, with `debug_assert!` contracts
//! guarding every value against its field bounds.
//!
//! The pipeline is [`lexer`] and [`parser`] into [`ast`], layout and
//! consistency resolution in [`layout`] and [`union`], shift/mask derivation
//! in [`codegen`], and source emission in [`render`], gated by the name
//! selection in [`names`].

pub mod ast;
pub mod codegen;
pub mod error;
pub mod layout;
pub mod lexer;
pub mod names;
pub mod parser;
pub mod render;
pub mod union;

use hashbrown::HashMap;

use crate::ast::Entity;

pub use crate::error::{Error, Result};
pub use crate::layout::{Base, Block, Field};
pub use crate::union::TaggedUnion;

/// Parse and resolve a description into blocks and tagged unions, both in
/// declaration order.
///
/// Unions are resolved after all blocks, so a union may name blocks declared
/// later in the file. Blocks and unions share one namespace.
pub fn compile(text: &str) -> Result<(Vec<Block>, Vec<TaggedUnion>)> {
    let entities = parser::parse(text)?;

    let mut current: Option<Base> = None;
    let mut blocks: Vec<Block> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut union_decls = Vec::new();

    for entity in &entities {
        match entity {
            Entity::Base(spec) => current = Some(Base::new(*spec)?),
            Entity::Block(decl) => {
                let base = current.ok_or_else(|| Error::NoBase {
                    block: decl.name.clone(),
                })?;
                if index.contains_key(&decl.name)
                    || union_decls.iter().any(|d: &&ast::UnionDecl| d.name == decl.name)
                {
                    return Err(Error::DuplicateDeclaration {
                        name: decl.name.clone(),
                    });
                }
                index.insert(decl.name.clone(), blocks.len());
                blocks.push(Block::resolve(decl, base)?);
            }
            Entity::Union(decl) => {
                if index.contains_key(&decl.name)
                    || union_decls.iter().any(|d: &&ast::UnionDecl| d.name == decl.name)
                {
                    return Err(Error::DuplicateDeclaration {
                        name: decl.name.clone(),
                    });
                }
                union_decls.push(decl);
            }
        }
    }

    let mut unions = Vec::new();
    for decl in union_decls {
        unions.push(union::resolve(decl, &mut blocks, &index)?);
    }

    log::debug!(
        "compiled {} block(s) and {} union(s)",
        blocks.len(),
        unions.len()
    );
    Ok((blocks, unions))
}

/// Compile a description and render its accessor source.
///
/// With an empty `corpus` every derivable definition is emitted; otherwise
/// only the definitions whose names occur in the corpus texts.
pub fn generate(text: &str, corpus: &[String]) -> Result<String> {
    let (blocks, unions) = compile(text)?;
    let candidates = names::candidates(&blocks, &unions);
    let selected = if corpus.is_empty() {
        names::select_all(&candidates)
    } else {
        let selected = names::prune(&candidates, corpus);
        log::debug!(
            "pruned {} candidate name(s) down to {}",
            candidates.len(),
            selected.len()
        );
        selected
    };
    Ok(render::render(&blocks, &unions, &selected))
}
