//! Compiled templates.
//!
//! A template is a `Value` shaped like the wanted target. While compiling:
//!
//! - a string that is exactly `{{ expr }}` becomes an expression leaf;
//! - a string mixing text and `{{ expr }}` becomes an interpolation;
//! - a map whose only key is `*` becomes a repeating node, expanded once
//!   per child of the wildcard groups found beneath it;
//! - everything else is copied as a literal.

mod expression;

pub use expression::Expression;

use alloc::boxed::Box;
use alloc::vec::Vec;

use dm_access::{Map, Value, WILDCARD};

use crate::error::MapError;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

// -----------------------------------------------------------------------------
// Node

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Literal(Value),
    Expr(Expression),
    Interpolated(Vec<Part>),
    Map(Vec<(Box<str>, Node)>),
    List(Vec<Node>),
    Repeat(Box<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Part {
    Text(Box<str>),
    Expr(Expression),
}

impl Node {
    fn compile(value: &Value) -> Result<Self, MapError> {
        Ok(match value {
            Value::String(text) => compile_string(text)?,
            Value::Object(map) => match map.get(WILDCARD) {
                Some(inner) if map.len() == 1 => Node::Repeat(Box::new(Node::compile(inner)?)),
                _ => {
                    let mut entries = Vec::with_capacity(map.len());
                    for (key, value) in map {
                        entries.push((Box::from(key.as_str()), Node::compile(value)?));
                    }
                    Node::Map(entries)
                }
            },
            Value::Array(items) => {
                Node::List(items.iter().map(Node::compile).collect::<Result<_, _>>()?)
            }
            other => Node::Literal(other.clone()),
        })
    }

    /// Every expression in this subtree, nested repeats included.
    pub(crate) fn expressions<'t>(&'t self, out: &mut Vec<&'t Expression>) {
        match self {
            Node::Literal(_) => {}
            Node::Expr(expr) => out.push(expr),
            Node::Interpolated(parts) => out.extend(parts.iter().filter_map(|part| match part {
                Part::Expr(expr) => Some(expr),
                Part::Text(_) => None,
            })),
            Node::Map(entries) => entries.iter().for_each(|(_, node)| node.expressions(out)),
            Node::List(items) => items.iter().for_each(|node| node.expressions(out)),
            Node::Repeat(inner) => inner.expressions(out),
        }
    }
}

fn compile_string(text: &str) -> Result<Node, MapError> {
    if !text.contains(OPEN) {
        return Ok(Node::Literal(Value::String(text.into())));
    }

    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(OPEN) {
        if open > 0 {
            parts.push(Part::Text(rest[..open].into()));
        }
        let body = &rest[open + OPEN.len()..];
        let Some(close) = body.find(CLOSE) else {
            return Err(MapError::expression(text, "unclosed `{{`"));
        };
        parts.push(Part::Expr(Expression::parse(&body[..close])?));
        rest = &body[close + CLOSE.len()..];
    }
    if !rest.is_empty() {
        parts.push(Part::Text(rest.into()));
    }

    if parts.len() == 1
        && matches!(parts[0], Part::Expr(_))
        && let Some(Part::Expr(expr)) = parts.pop()
    {
        return Ok(Node::Expr(expr));
    }
    Ok(Node::Interpolated(parts))
}

// -----------------------------------------------------------------------------
// Template

/// A template compiled once and reusable across sources.
///
/// # Examples
///
/// ```
/// use dm_mapper::Template;
/// use serde_json::json;
///
/// let template = Template::compile(&json!({
///     "title": "{{ company.name | upper }}",
///     "staff": { "*": { "name": "{{ company.staff.*.name }}" } },
///     "note": "Managed by {{ company.owner ?? 'nobody' }}",
/// }))
/// .unwrap();
///
/// let paths: Vec<String> = template.expressions().map(|e| e.path().to_string()).collect();
/// assert_eq!(paths, ["company.name", "company.staff.*.name", "company.owner"]);
///
/// assert!(Template::compile(&json!("{{ broken ")).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    root: Node,
}

impl Template {
    pub fn compile(template: &Value) -> Result<Self, MapError> {
        Ok(Self {
            root: Node::compile(template)?,
        })
    }

    /// Every expression, in template order.
    pub fn expressions(&self) -> impl Iterator<Item = &Expression> {
        let mut out = Vec::new();
        self.root.expressions(&mut out);
        out.into_iter()
    }

    #[inline]
    pub(crate) fn root(&self) -> &Node {
        &self.root
    }

    /// The target produced when nothing at all is written.
    pub(crate) fn empty_target(&self) -> Value {
        match self.root {
            Node::Map(_) => Value::Object(Map::new()),
            Node::List(_) | Node::Repeat(_) => Value::Array(Vec::new()),
            _ => Value::Null,
        }
    }
}

impl TryFrom<&Value> for Template {
    type Error = MapError;

    #[inline]
    fn try_from(template: &Value) -> Result<Self, Self::Error> {
        Self::compile(template)
    }
}
