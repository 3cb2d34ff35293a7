//! Tokenizer for the Sieve script grammar subset documented in
//! `SPEC_FULL.md` §4.1.
//!
//! Token-level rules are small `nom` parsers, mirroring the teacher
//! codec's style of one parser function per grammar production; the
//! surrounding scan loop (which tracks line numbers for error messages
//! and glues the token rules together) is hand-written, since Sieve's
//! source is block-structured rather than line-oriented like IMAP.

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{opt, recognize},
    multi::many0,
    sequence::{pair, preceded},
    IResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Identifier(String),
    Tag(String),
    String(String),
    Number(u64),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Semicolon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(is_identifier_start),
        take_while(is_identifier_char),
    ))(input)
}

fn tagged_argument(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), identifier)(input)
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = char('"')(input)?;
    let mut out = String::new();
    loop {
        let mut chars = rest.char_indices();
        match chars.next() {
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    rest,
                    nom::error::ErrorKind::Eof,
                )))
            }
            Some((_, '"')) => {
                rest = &rest[1..];
                break;
            }
            Some((_, '\\')) => {
                let mut rest_after_backslash = &rest[1..];
                let mut inner = rest_after_backslash.chars();
                match inner.next() {
                    Some(escaped) => {
                        out.push(escaped);
                        rest_after_backslash = &rest_after_backslash[escaped.len_utf8()..];
                        rest = rest_after_backslash;
                    }
                    None => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            rest,
                            nom::error::ErrorKind::Eof,
                        )))
                    }
                }
            }
            Some((_, c)) => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    Ok((rest, out))
}

/// An IMAP-style literal: `{N}` or `{N+}` followed by `\r\n` and exactly
/// `N` raw octets. Borrowed directly from the literal syntax the teacher
/// codec parses for IMAP (`Literal::try_from`); Sieve (RFC 5228 §2.4.2)
/// reuses the same `{N+}` wire form for multi-line strings.
fn bracket_string(input: &str) -> IResult<&str, String> {
    let (rest, _) = char('{')(input)?;
    let (rest, digits) = digit1(rest)?;
    let (rest, _) = opt(char('+'))(rest)?;
    let (rest, _) = char('}')(rest)?;
    let (rest, _) = opt(char('\r'))(rest)?;
    let (rest, _) = char('\n')(rest)?;
    let n: usize = digits.parse().map_err(|_| {
        nom::Err::Failure(nom::error::Error::new(rest, nom::error::ErrorKind::Digit))
    })?;
    if rest.len() < n {
        return Err(nom::Err::Failure(nom::error::Error::new(
            rest,
            nom::error::ErrorKind::Eof,
        )));
    }
    let (literal, rest) = rest.split_at(n);
    Ok((rest, literal.to_string()))
}

fn number(input: &str) -> IResult<&str, u64> {
    let (rest, digits) = digit1(input)?;
    let (rest, quantifier) = opt(one_of("KMGkmg"))(rest)?;
    let base: u64 = digits.parse().map_err(|_| {
        nom::Err::Failure(nom::error::Error::new(rest, nom::error::ErrorKind::Digit))
    })?;
    let multiplier = match quantifier {
        Some('K') | Some('k') => 1024,
        Some('M') | Some('m') => 1024 * 1024,
        Some('G') | Some('g') => 1024 * 1024 * 1024,
        _ => 1,
    };
    Ok((rest, base * multiplier))
}

fn skip_trivia<'a>(mut input: &'a str, line: &mut usize) -> &'a str {
    loop {
        let before = input;
        while let Some(rest) = input.strip_prefix(' ') {
            input = rest;
        }
        while let Some(rest) = input.strip_prefix('\t') {
            input = rest;
        }
        while let Some(rest) = input.strip_prefix('\r') {
            input = rest;
        }
        if let Some(rest) = input.strip_prefix('\n') {
            *line += 1;
            input = rest;
        }
        if let Some(rest) = input.strip_prefix("/*") {
            input = rest;
            loop {
                if input.is_empty() {
                    break;
                }
                if let Some(rest) = input.strip_prefix("*/") {
                    input = rest;
                    break;
                }
                if input.starts_with('\n') {
                    *line += 1;
                }
                input = &input[1..];
            }
        }
        if input.starts_with('#') {
            if let Some(idx) = input.find('\n') {
                input = &input[idx..];
            } else {
                input = "";
            }
        }
        if input == before {
            break;
        }
    }
    input
}

/// Splits a full script source into tokens with line numbers.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, LexError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut line = 1usize;

    loop {
        rest = skip_trivia(rest, &mut line);
        if rest.is_empty() {
            break;
        }

        let first = rest.chars().next().unwrap();
        let (next_rest, token) = match first {
            '{' => {
                if let Ok((r, s)) = bracket_string(rest) {
                    (r, Token::String(s))
                } else {
                    (&rest[1..], Token::LBrace)
                }
            }
            '}' => (&rest[1..], Token::RBrace),
            '[' => (&rest[1..], Token::LBracket),
            ']' => (&rest[1..], Token::RBracket),
            '(' => (&rest[1..], Token::LParen),
            ')' => (&rest[1..], Token::RParen),
            ',' => (&rest[1..], Token::Comma),
            ';' => (&rest[1..], Token::Semicolon),
            '"' => match quoted_string(rest) {
                Ok((r, s)) => (r, Token::String(s)),
                Err(_) => {
                    return Err(LexError {
                        line,
                        message: "unterminated string".to_string(),
                    })
                }
            },
            ':' => match tagged_argument(rest) {
                Ok((r, name)) => (r, Token::Tag(name.to_string())),
                Err(_) => {
                    return Err(LexError {
                        line,
                        message: "expected tag name after ':'".to_string(),
                    })
                }
            },
            c if c.is_ascii_digit() => match number(rest) {
                Ok((r, n)) => (r, Token::Number(n)),
                Err(_) => {
                    return Err(LexError {
                        line,
                        message: "invalid number".to_string(),
                    })
                }
            },
            c if is_identifier_start(c) => match identifier(rest) {
                Ok((r, name)) => (r, Token::Identifier(name.to_string())),
                Err(_) => unreachable!("identifier start already validated"),
            },
            other => {
                return Err(LexError {
                    line,
                    message: format!("unexpected character '{other}'"),
                })
            }
        };

        tokens.push(Spanned { token, line });
        rest = next_rest;
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn simple_keep() {
        assert_eq!(toks("keep;"), vec![
            Token::Identifier("keep".into()),
            Token::Semicolon,
        ]);
    }

    #[test]
    fn tagged_string_and_number() {
        assert_eq!(
            toks(r#"fileinto :copy "INBOX/x";"#),
            vec![
                Token::Identifier("fileinto".into()),
                Token::Tag("copy".into()),
                Token::String("INBOX/x".into()),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn size_quantifier() {
        assert_eq!(
            toks(":over 100K"),
            vec![Token::Tag("over".into()), Token::Number(102400)]
        );
    }

    #[test]
    fn literal_string() {
        assert_eq!(
            toks("fileinto {5+}\r\nhello;"),
            vec![
                Token::Identifier("fileinto".into()),
                Token::String("hello".into()),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            toks("# a comment\nkeep; /* block\ncomment */ stop;"),
            vec![
                Token::Identifier("keep".into()),
                Token::Semicolon,
                Token::Identifier("stop".into()),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn line_numbers_track_newlines() {
        let tokens = tokenize("keep;\nstop;\nkeep;").unwrap();
        let lines: Vec<usize> = tokens.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn escaped_quote_in_string() {
        assert_eq!(
            toks(r#""say \"hi\"""#),
            vec![Token::String("say \"hi\"".into())]
        );
    }
}
