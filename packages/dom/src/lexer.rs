//! Lexer for HTML fragments using logos
//!
//! Markup is lexed in two modes: [`Markup`] between tags, and [`TagToken`]
//! inside an open tag. The parser switches modes by starting a tag lexer on
//! the remainder of the markup lexer and bumping past what it consumed.

use logos::{Lexer, Logos};

/// Tokens between tags
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Markup<'src> {
    /// Comment body without the `<!--` / `-->` delimiters
    #[token("<!--", comment_body)]
    Comment(&'src str),

    /// `<!DOCTYPE ...>` and other declarations, ignored
    #[regex(r"<![^-][^>]*>")]
    Declaration,

    #[regex(r"</[A-Za-z][^>]*>", close_tag_name)]
    CloseTag(&'src str),

    #[regex(r"<[A-Za-z][A-Za-z0-9:_-]*", |lex| &lex.slice()[1..])]
    OpenTag(&'src str),

    #[regex(r"[^<]+")]
    Text(&'src str),

    /// A `<` that does not start a tag is literal text
    #[token("<")]
    LessThan,
}

fn comment_body<'src>(lex: &mut Lexer<'src, Markup<'src>>) -> Option<&'src str> {
    let rest = lex.remainder();
    let end = rest.find("-->")?;
    lex.bump(end + 3);
    Some(&rest[..end])
}

fn close_tag_name<'src>(lex: &mut Lexer<'src, Markup<'src>>) -> &'src str {
    let slice = lex.slice();
    slice[2..slice.len() - 1].trim()
}

/// Tokens inside an open tag
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TagToken<'src> {
    #[token(">")]
    End,

    #[token("/>")]
    SelfClosingEnd,

    #[token("=")]
    Equals,

    #[regex(r#""[^"]*""#, |lex| { let s = lex.slice(); &s[1..s.len() - 1] })]
    #[regex(r"'[^']*'", |lex| { let s = lex.slice(); &s[1..s.len() - 1] })]
    Quoted(&'src str),

    #[regex(r#"[^\s"'<>/=]+"#, |lex| lex.slice())]
    Word(&'src str),

    #[token("/")]
    Slash,
}
