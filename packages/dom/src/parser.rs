//! Lenient HTML fragment parser
//!
//! Builds detached nodes under a fresh fragment. Handles void elements, raw
//! text elements (`<textarea>`, `<script>`, ...), comments, quoted and
//! unquoted attribute values and the common character references. Unclosed
//! elements are closed at the end of input and stray close tags are
//! ignored, as browsers do.

use crate::document::Document;
use crate::error::{ParseError, ParseResult};
use crate::lexer::{Markup, TagToken};
use crate::node::{is_raw_text_element, is_void_element, Attribute, NodeId};
use logos::Logos;
use std::borrow::Cow;
use tracing::{trace, warn};

/// Parses `source` into a new detached fragment of `document`
pub fn parse_fragment(document: &mut Document, source: &str) -> ParseResult<NodeId> {
    let fragment = document.create_fragment();
    let mut parser = FragmentParser {
        document,
        fragment,
        open: Vec::new(),
        pending_text: String::new(),
    };
    if let Err(error) = parser.run(source) {
        document.discard(fragment)?;
        return Err(error);
    }
    trace!(len = source.len(), "parsed fragment");
    Ok(fragment)
}

struct FragmentParser<'d> {
    document: &'d mut Document,
    fragment: NodeId,
    /// Open elements, innermost last
    open: Vec<(NodeId, String)>,
    /// Adjacent text chunks are merged into one text node
    pending_text: String,
}

impl FragmentParser<'_> {
    fn run(&mut self, source: &str) -> ParseResult<()> {
        let mut lexer = Markup::lexer(source);

        while let Some(token) = lexer.next() {
            let start = lexer.span().start;
            match token {
                Ok(Markup::Text(text)) => self.pending_text.push_str(&decode_entities(text)),
                Ok(Markup::LessThan) => self.pending_text.push('<'),
                Ok(Markup::Declaration) => {}
                Ok(Markup::Comment(body)) => {
                    let comment = self.document.create_comment(body);
                    self.append(comment)?;
                }
                Ok(Markup::CloseTag(name)) => {
                    self.flush_text()?;
                    self.close(&name.to_ascii_lowercase());
                }
                Ok(Markup::OpenTag(name)) => {
                    let tag = name.to_ascii_lowercase();
                    let (attributes, self_closing, consumed) =
                        parse_attributes(lexer.remainder(), lexer.span().end, start, &tag)?;
                    lexer.bump(consumed);

                    let element = self.document.create_element_with(tag.clone(), attributes);
                    self.append(element)?;

                    if self_closing || is_void_element(&tag) {
                        continue;
                    }
                    if is_raw_text_element(&tag) {
                        let (content, consumed) = raw_text(lexer.remainder(), &tag);
                        lexer.bump(consumed);
                        if !content.is_empty() {
                            let content = if tag == "script" || tag == "style" {
                                Cow::Borrowed(content)
                            } else {
                                decode_entities(content)
                            };
                            let text = self.document.create_text(content.into_owned());
                            self.document.append_child(element, text)?;
                        }
                        continue;
                    }
                    self.open.push((element, tag));
                }
                Err(()) => {
                    if source[start..].starts_with("<!--") {
                        return Err(ParseError::UnterminatedComment { pos: start });
                    }
                    return Err(ParseError::LexError {
                        pos: start,
                        message: format!("Unexpected input {:?}", lexer.slice()),
                    });
                }
            }
        }

        self.flush_text()?;
        if let Some((_, tag)) = self.open.last() {
            trace!(tag = %tag, "closing unclosed elements at end of input");
        }
        Ok(())
    }

    fn current(&self) -> NodeId {
        self.open
            .last()
            .map(|(element, _)| *element)
            .unwrap_or(self.fragment)
    }

    fn append(&mut self, node: NodeId) -> ParseResult<()> {
        self.flush_text()?;
        let parent = self.current();
        self.document.append_child(parent, node)?;
        Ok(())
    }

    fn flush_text(&mut self) -> ParseResult<()> {
        if self.pending_text.is_empty() {
            return Ok(());
        }
        let text = self
            .document
            .create_text(std::mem::take(&mut self.pending_text));
        let parent = self.current();
        self.document.append_child(parent, text)?;
        Ok(())
    }

    fn close(&mut self, tag: &str) {
        match self.open.iter().rposition(|(_, open)| open == tag) {
            Some(position) => self.open.truncate(position),
            None => warn!(tag = %tag, "ignoring stray close tag"),
        }
    }
}

/// Parses the attribute list following `<tag`. Returns the attributes,
/// whether the tag was self-closing and the number of bytes consumed.
fn parse_attributes(
    rest: &str,
    offset: usize,
    tag_start: usize,
    tag: &str,
) -> ParseResult<(Vec<Attribute>, bool, usize)> {
    let mut lexer = TagToken::lexer(rest);
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut pending: Option<String> = None;

    let push = |attributes: &mut Vec<Attribute>, name: String, value: String| {
        // The first occurrence of a duplicated attribute wins
        if !attributes.iter().any(|attr| attr.name == name) {
            attributes.push(Attribute { name, value });
        }
    };
    let unterminated = || ParseError::UnterminatedTag {
        pos: tag_start,
        tag: tag.to_string(),
    };

    loop {
        let Some(token) = lexer.next() else {
            return Err(unterminated());
        };
        let pos = offset + lexer.span().start;
        match token {
            Ok(TagToken::End) | Ok(TagToken::SelfClosingEnd) => {
                if let Some(name) = pending.take() {
                    push(&mut attributes, name, String::new());
                }
                let self_closing = matches!(token, Ok(TagToken::SelfClosingEnd));
                return Ok((attributes, self_closing, lexer.span().end));
            }
            Ok(TagToken::Word(word)) => {
                if let Some(name) = pending.take() {
                    push(&mut attributes, name, String::new());
                }
                pending = Some(word.to_ascii_lowercase());
            }
            Ok(TagToken::Equals) => {
                let Some(name) = pending.take() else {
                    return Err(ParseError::UnexpectedInTag {
                        pos,
                        tag: tag.to_string(),
                        found: "=".to_string(),
                    });
                };
                let remainder = lexer.remainder();
                let value_source = remainder.trim_start();
                let skipped = remainder.len() - value_source.len();

                if value_source.starts_with('"') || value_source.starts_with('\'') {
                    match lexer.next() {
                        Some(Ok(TagToken::Quoted(value))) => {
                            push(&mut attributes, name, decode_entities(value).into_owned())
                        }
                        _ => return Err(unterminated()),
                    }
                } else {
                    let end = value_source
                        .find(|c: char| c.is_ascii_whitespace() || c == '>')
                        .unwrap_or(value_source.len());
                    lexer.bump(skipped + end);
                    push(
                        &mut attributes,
                        name,
                        decode_entities(&value_source[..end]).into_owned(),
                    );
                }
            }
            Ok(TagToken::Slash) => {}
            Ok(TagToken::Quoted(found)) => {
                return Err(ParseError::UnexpectedInTag {
                    pos,
                    tag: tag.to_string(),
                    found: found.to_string(),
                });
            }
            Err(()) => {
                return Err(ParseError::UnexpectedInTag {
                    pos,
                    tag: tag.to_string(),
                    found: lexer.slice().to_string(),
                });
            }
        }
    }
}

/// Splits raw text content off at the matching close tag. Returns the
/// content and the number of bytes consumed including the close tag.
fn raw_text<'src>(rest: &'src str, tag: &str) -> (&'src str, usize) {
    let lower = rest.to_ascii_lowercase();
    let needle = format!("</{}", tag);
    match lower.find(&needle) {
        Some(start) => {
            let end = rest[start..]
                .find('>')
                .map(|close| start + close + 1)
                .unwrap_or(rest.len());
            (&rest[..start], end)
        }
        None => (rest, rest.len()),
    }
}

/// Decodes the named references HTML templates commonly use plus numeric
/// references. Unknown references are kept verbatim.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        output.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|ch| (ch, end)));
        match decoded {
            Some((ch, end)) => {
                output.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                output.push('&');
                rest = &tail[1..];
            }
        }
    }
    output.push_str(rest);
    Cow::Owned(output)
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

impl Document {
    /// Parses `source` into a new detached fragment
    pub fn parse_fragment(&mut self, source: &str) -> ParseResult<NodeId> {
        parse_fragment(self, source)
    }
}
