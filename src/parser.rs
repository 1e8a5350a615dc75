//! Recursive-descent parser for the bitfield specification language.
//!
//! Grammar, in source order:
//!
//! ```text
//! spec   := (base | block | union)*
//! base   := 'base' INT [ '(' INT ',' INT ')' ]
//! block  := 'block' IDENT [ '(' [IDENT (',' IDENT)*] ')' ] '{' field* '}'
//! field  := 'field' IDENT INT | 'field_high' IDENT INT | 'padding' INT
//! union  := 'tagged_union' IDENT IDENT '{' mask* tagdecl* '}'
//! mask   := 'mask' INT INT
//! tagdecl := 'tag' IDENT INT
//! ```
//!
//! The parser only builds the entity list; all name resolution and layout
//! happens afterwards.

use crate::ast::{BaseSpec, BlockDecl, Entity, FieldDecl, UnionDecl};
use crate::error::{Error, Result};
use crate::lexer::{tokenize, Token};

/// Parse specification text into a declaration-ordered entity list.
pub fn parse(text: &str) -> Result<Vec<Entity>> {
    let tokens = tokenize(text)?;
    Parser { tokens, pos: 0 }.parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn parse(mut self) -> Result<Vec<Entity>> {
        let mut entities = Vec::new();
        while self.pos < self.tokens.len() {
            let entity = match self.next("'base', 'block' or 'tagged_union'")? {
                Token::Base => Entity::Base(self.parse_base()?),
                Token::Block => Entity::Block(self.parse_block()?),
                Token::TaggedUnion => Entity::Union(self.parse_union()?),
                other => return Err(self.unexpected(other, "'base', 'block' or 'tagged_union'")),
            };
            entities.push(entity);
        }
        Ok(entities)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self, expected: &str) -> Result<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| Error::UnexpectedEof {
                expected: expected.to_string(),
            })?;
        self.pos += 1;
        Ok(token)
    }

    fn unexpected(&self, found: Token, expected: &str) -> Error {
        Error::UnexpectedToken {
            found: found.describe(),
            expected: expected.to_string(),
        }
    }

    fn expect(&mut self, want: Token) -> Result<()> {
        let desc = format!("'{}'", want.describe());
        let token = self.next(&desc)?;
        if token != want {
            return Err(self.unexpected(token, &desc));
        }
        Ok(())
    }

    fn try_read(&mut self, want: &Token) -> bool {
        if self.peek() == Some(want) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.next("identifier")? {
            Token::Ident(name) => Ok(name),
            other => Err(self.unexpected(other, "identifier")),
        }
    }

    fn int(&mut self) -> Result<u64> {
        match self.next("integer literal")? {
            Token::Int(value) => Ok(value),
            other => Err(self.unexpected(other, "integer literal")),
        }
    }

    fn parse_base(&mut self) -> Result<BaseSpec> {
        let width = self.int()?;
        if self.try_read(&Token::LParen) {
            let logical = self.int()?;
            self.expect(Token::Comma)?;
            let sign_extend = self.int()? != 0;
            self.expect(Token::RParen)?;
            Ok(BaseSpec {
                width,
                logical,
                sign_extend,
            })
        } else {
            Ok(BaseSpec {
                width,
                logical: width,
                sign_extend: false,
            })
        }
    }

    fn parse_block(&mut self) -> Result<BlockDecl> {
        let name = self.ident()?;

        let visible_order = if self.try_read(&Token::LParen) {
            let mut order = Vec::new();
            if !self.try_read(&Token::RParen) {
                loop {
                    order.push(self.ident()?);
                    if !self.try_read(&Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RParen)?;
            }
            Some(order)
        } else {
            None
        };

        self.expect(Token::LBrace)?;
        let mut fields = Vec::new();
        loop {
            match self.next("'field', 'field_high', 'padding' or '}'")? {
                Token::Field => fields.push(FieldDecl {
                    name: Some(self.ident()?),
                    width: self.int()?,
                    high: false,
                }),
                Token::FieldHigh => fields.push(FieldDecl {
                    name: Some(self.ident()?),
                    width: self.int()?,
                    high: true,
                }),
                Token::Padding => fields.push(FieldDecl {
                    name: None,
                    width: self.int()?,
                    high: false,
                }),
                Token::RBrace => break,
                other => {
                    return Err(self.unexpected(other, "'field', 'field_high', 'padding' or '}'"))
                }
            }
        }

        Ok(BlockDecl {
            name,
            visible_order,
            fields,
        })
    }

    fn parse_union(&mut self) -> Result<UnionDecl> {
        let name = self.ident()?;
        let tag_name = self.ident()?;
        self.expect(Token::LBrace)?;

        let mut masks = Vec::new();
        while self.try_read(&Token::Mask) {
            let width = self.int()?;
            let mask = self.int()?;
            masks.push((width, mask));
        }

        let mut tags = Vec::new();
        loop {
            match self.next("'tag' or '}'")? {
                Token::Tag => {
                    let block = self.ident()?;
                    let value = self.int()?;
                    tags.push((block, value));
                }
                Token::RBrace => break,
                other => return Err(self.unexpected(other, "'tag' or '}'")),
            }
        }

        Ok(UnionDecl {
            name,
            tag_name,
            masks,
            tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_block_with_fields_and_padding() {
        let entities = parse(
            "base 32\n\
             block frame {\n\
                 field addr 20\n\
                 field_high extra 4\n\
                 padding 8\n\
             }",
        )
        .unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(
            entities[0],
            Entity::Base(BaseSpec {
                width: 32,
                logical: 32,
                sign_extend: false
            })
        );
        let Entity::Block(block) = &entities[1] else {
            panic!("expected block");
        };
        assert_eq!(block.name, "frame");
        assert_eq!(block.visible_order, None);
        assert_eq!(block.fields.len(), 3);
        assert_eq!(block.fields[0].name.as_deref(), Some("addr"));
        assert!(block.fields[1].high);
        assert_eq!(block.fields[2].name, None);
        assert_eq!(block.fields[2].width, 8);
    }

    #[test]
    fn parse_base_with_logical_width() {
        let entities = parse("base 64(39, 1)").unwrap();
        assert_eq!(
            entities[0],
            Entity::Base(BaseSpec {
                width: 64,
                logical: 39,
                sign_extend: true
            })
        );
    }

    #[test]
    fn parse_explicit_visible_order() {
        let entities = parse("base 8 block b (y, x) { field x 4 field y 4 }").unwrap();
        let Entity::Block(block) = &entities[1] else {
            panic!("expected block");
        };
        assert_eq!(
            block.visible_order,
            Some(vec!["y".to_string(), "x".to_string()])
        );
    }

    #[test]
    fn parse_tagged_union() {
        let entities = parse(
            "base 32\n\
             tagged_union msg kind {\n\
                 mask 4 0b1100\n\
                 mask 8 0b1100\n\
                 tag ping 0\n\
                 tag pong 1\n\
             }",
        )
        .unwrap();
        let Entity::Union(u) = &entities[1] else {
            panic!("expected union");
        };
        assert_eq!(u.name, "msg");
        assert_eq!(u.tag_name, "kind");
        assert_eq!(u.masks, vec![(4, 0b1100), (8, 0b1100)]);
        assert_eq!(u.tags, vec![("ping".to_string(), 0), ("pong".to_string(), 1)]);
    }

    #[test]
    fn syntax_error_reports_offending_token() {
        let err = parse("base 32 block { }").unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedToken { ref found, .. } if found == "{"
        ));
    }

    #[test]
    fn unexpected_eof_is_fatal() {
        assert!(matches!(
            parse("block b {"),
            Err(Error::UnexpectedEof { .. })
        ));
    }
}
