//! Placeholder expressions
//!
//! Expressions are dot paths into the context (`user.name`, `rows.0`,
//! `rows.length`). Text and attribute values interleave them with literal
//! text as `${path}` placeholders.

use crate::error::{CompileError, CompileResult};
use crate::value::Value;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

const OPEN: &str = "${";
const CLOSE: char = '}';

/// A dot path evaluated against a [`Value`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    segments: Vec<String>,
}

impl PathExpr {
    pub fn parse(source: &str) -> CompileResult<Self> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(invalid(source, "empty expression"));
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('.') {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(invalid(source, "empty path segment"));
            }
            if !is_segment(segment) {
                return Err(invalid(
                    source,
                    &format!("{:?} is not a field name or index", segment),
                ));
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Looks the path up; `None` when any segment is missing
    pub fn evaluate<'a>(&self, context: &'a Value) -> Option<Cow<'a, Value>> {
        let last = self.segments.len() - 1;
        let mut current = context;
        for (position, segment) in self.segments.iter().enumerate() {
            current = match current {
                Value::Map(fields) => fields.get(segment)?,
                Value::List(items) => {
                    if segment == "length" && position == last {
                        return Some(Cow::Owned(Value::Number(items.len() as f64)));
                    }
                    items.get(segment.parse::<usize>().ok()?)?
                }
                Value::String(text) if segment == "length" && position == last => {
                    return Some(Cow::Owned(Value::Number(text.chars().count() as f64)));
                }
                _ => return None,
            };
        }
        Some(Cow::Borrowed(current))
    }
}

impl FromStr for PathExpr {
    type Err = CompileError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        PathExpr::parse(source)
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

fn is_segment(segment: &str) -> bool {
    if segment.bytes().all(|byte| byte.is_ascii_digit()) {
        return true;
    }
    let mut chars = segment.chars();
    let head_ok = chars
        .next()
        .is_some_and(|ch| ch.is_alphabetic() || ch == '_' || ch == '$');
    head_ok && chars.all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '$' || ch == '-')
}

fn invalid(expression: &str, reason: &str) -> CompileError {
    CompileError::InvalidExpression {
        expression: expression.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Literal(String),
    Expr(PathExpr),
}

/// Literal text interleaved with placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolation {
    parts: Vec<Part>,
}

impl Interpolation {
    /// Splits `text` into parts; `None` when it holds no placeholder
    pub fn parse(text: &str) -> CompileResult<Option<Self>> {
        if !text.contains(OPEN) {
            return Ok(None);
        }

        let mut parts = Vec::new();
        let mut rest = text;
        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                parts.push(Part::Literal(rest[..start].to_string()));
            }
            let body = &rest[start + OPEN.len()..];
            let end = body
                .find(CLOSE)
                .ok_or_else(|| CompileError::UnterminatedPlaceholder {
                    text: text.to_string(),
                })?;
            parts.push(Part::Expr(PathExpr::parse(&body[..end])?));
            rest = &body[end + 1..];
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_string()));
        }
        Ok(Some(Self { parts }))
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// The expression when the text is exactly one placeholder
    pub fn whole(&self) -> Option<&PathExpr> {
        match self.parts.as_slice() {
            [Part::Expr(expr)] => Some(expr),
            _ => None,
        }
    }

    pub fn render(&self, context: &Value) -> String {
        let mut output = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => output.push_str(text),
                Part::Expr(expr) => {
                    if let Some(value) = expr.evaluate(context) {
                        output.push_str(&value.to_text());
                    }
                }
            }
        }
        output
    }
}
