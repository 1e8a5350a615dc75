//! Tokenizer for the bitfield specification language.
//!
//! The language is whitespace-insensitive beyond token boundaries; `--` and
//! `#` start comments that run to end of line. Integer literals accept
//! decimal, octal (`0` or `0o` prefix), hex (`0x`) and binary (`0b`) forms
//! with an optional `l`/`L` suffix. Any unrecognized character is fatal.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Base,
    Block,
    Field,
    FieldHigh,
    Mask,
    Padding,
    Tag,
    TaggedUnion,
    Ident(String),
    Int(u64),
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
}

impl Token {
    /// Source-like rendering used in syntax error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Base => "base".into(),
            Token::Block => "block".into(),
            Token::Field => "field".into(),
            Token::FieldHigh => "field_high".into(),
            Token::Mask => "mask".into(),
            Token::Padding => "padding".into(),
            Token::Tag => "tag".into(),
            Token::TaggedUnion => "tagged_union".into(),
            Token::Ident(s) => s.clone(),
            Token::Int(v) => v.to_string(),
            Token::LBrace => "{".into(),
            Token::RBrace => "}".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Comma => ",".into(),
        }
    }
}

fn keyword(word: &str) -> Option<Token> {
    match word {
        "base" => Some(Token::Base),
        "block" => Some(Token::Block),
        "field" => Some(Token::Field),
        "field_high" => Some(Token::FieldHigh),
        "mask" => Some(Token::Mask),
        "padding" => Some(Token::Padding),
        "tag" => Some(Token::Tag),
        "tagged_union" => Some(Token::TaggedUnion),
        _ => None,
    }
}

/// Tokenize the entire input up front. The parser runs over the returned
/// list; there is no error recovery.
pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                skip_line(&mut chars);
            }
            '-' => {
                chars.next();
                if chars.peek().map(|&(_, c)| c) == Some('-') {
                    skip_line(&mut chars);
                } else {
                    return Err(Error::UnexpectedChar('-'));
                }
            }
            '{' => {
                chars.next();
                tokens.push(Token::LBrace);
            }
            '}' => {
                chars.next();
                tokens.push(Token::RBrace);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            c if c.is_ascii_digit() => {
                let end = scan_while(text, pos, |c| c.is_ascii_alphanumeric());
                for _ in 0..text[pos..end].chars().count() {
                    chars.next();
                }
                tokens.push(Token::Int(parse_int(&text[pos..end])?));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let end = scan_while(text, pos, |c| c.is_ascii_alphanumeric() || c == '_');
                for _ in 0..text[pos..end].chars().count() {
                    chars.next();
                }
                let word = &text[pos..end];
                // A lone underscore is not an identifier.
                if word == "_" {
                    return Err(Error::UnexpectedChar('_'));
                }
                tokens.push(keyword(word).unwrap_or_else(|| Token::Ident(word.to_string())));
            }
            c => return Err(Error::UnexpectedChar(c)),
        }
    }

    Ok(tokens)
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::CharIndices>) {
    for (_, c) in chars.by_ref() {
        if c == '\n' {
            break;
        }
    }
}

fn scan_while(text: &str, start: usize, pred: impl Fn(char) -> bool) -> usize {
    text[start..]
        .char_indices()
        .find(|&(_, c)| !pred(c))
        .map(|(i, _)| start + i)
        .unwrap_or(text.len())
}

/// Parse an integer literal with C-style radix prefixes and an optional
/// `l`/`L` suffix.
fn parse_int(lit: &str) -> Result<u64> {
    let bad = || Error::MalformedLiteral(lit.to_string());

    let digits = lit.strip_suffix(['l', 'L']).unwrap_or(lit);
    if digits.is_empty() {
        return Err(bad());
    }

    let (radix, body) = if let Some(rest) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, rest)
    } else if let Some(rest) = digits
        .strip_prefix("0b")
        .or_else(|| digits.strip_prefix("0B"))
    {
        (2, rest)
    } else if let Some(rest) = digits
        .strip_prefix("0o")
        .or_else(|| digits.strip_prefix("0O"))
    {
        (8, rest)
    } else if digits != "0" && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };

    if body.is_empty() {
        return Err(bad());
    }
    u64::from_str_radix(body, radix).map_err(|_| bad())
}
