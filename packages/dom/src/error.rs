//! Error types for the DOM arena and the fragment parser

use crate::node::NodeId;
use std::ops::Range;
use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;
pub type DomResult<T> = Result<T, DomError>;

/// Fragment parse error with byte offsets into the source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unterminated comment starting at {pos}")]
    UnterminatedComment { pos: usize },

    #[error("Unterminated <{tag}> tag starting at {pos}")]
    UnterminatedTag { pos: usize, tag: String },

    #[error("Unexpected {found:?} in <{tag}> at {pos}")]
    UnexpectedInTag {
        pos: usize,
        tag: String,
        found: String,
    },

    #[error("Lexer error at {pos}: {message}")]
    LexError { pos: usize, message: String },

    #[error(transparent)]
    Dom(#[from] DomError),
}

impl ParseError {
    pub fn span(&self) -> Range<usize> {
        match self {
            ParseError::UnterminatedComment { pos } => *pos..*pos + 4,
            ParseError::UnterminatedTag { pos, tag } => *pos..*pos + tag.len() + 1,
            ParseError::UnexpectedInTag { pos, found, .. } => *pos..*pos + found.len().max(1),
            ParseError::LexError { pos, .. } => *pos..*pos + 1,
            ParseError::Dom(_) => 0..0,
        }
    }
}

/// Violation of the arena's structural rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("Node {0} no longer exists")]
    StaleNode(NodeId),

    #[error("Node {0} cannot have children")]
    NotAContainer(NodeId),

    #[error("Node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("Inserting {node} into {parent} would create a cycle")]
    HierarchyRequest { parent: NodeId, node: NodeId },

    #[error("Node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("Node {0} is not a text or comment node")]
    NotCharacterData(NodeId),

    #[error("The document body cannot be removed")]
    BodyRemoval,
}

/// Pretty-print a parse error with source context using ariadne
#[cfg(feature = "pretty-errors")]
pub fn format_error(source: &str, filename: &str, error: &ParseError) -> String {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let mut span = error.span();
    span.end = span.end.min(source.len());
    span.start = span.start.min(span.end);

    let mut output = Vec::new();
    let report = Report::build(ReportKind::Error, filename, span.start)
        .with_message(error.to_string())
        .with_label(
            Label::new((filename, span))
                .with_color(Color::Red)
                .with_message(match error {
                    ParseError::UnterminatedComment { .. } => "comment never closed".to_string(),
                    ParseError::UnterminatedTag { tag, .. } => format!("<{}> never closed", tag),
                    ParseError::UnexpectedInTag { found, .. } => format!("unexpected {}", found),
                    ParseError::LexError { message, .. } => message.clone(),
                    ParseError::Dom(error) => error.to_string(),
                }),
        )
        .finish();

    if report
        .write((filename, Source::from(source)), &mut output)
        .is_err()
    {
        return error.to_string();
    }

    String::from_utf8(output).unwrap_or_else(|_| error.to_string())
}
