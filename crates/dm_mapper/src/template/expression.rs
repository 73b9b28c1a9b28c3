use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use dm_access::{DataAccessor, Path, Resolved, Value};

use crate::error::MapError;
use crate::filter::{self, Filter};

/// The body of a `{{ ... }}` placeholder: `path [?? default] [| filter]*`.
///
/// The default applies when the path is missing or `null`; it is a quoted
/// string (single or double quotes), a number, `true`, `false` or `null`.
///
/// # Examples
///
/// ```
/// use dm_mapper::Expression;
/// use serde_json::json;
///
/// let expr: Expression = "user.name ?? 'anonymous' | upper".parse().unwrap();
/// assert_eq!(expr.path().to_string(), "user.name");
///
/// assert_eq!(expr.evaluate(&json!({ "user": { "name": "ada" } })), json!("ADA"));
/// assert_eq!(expr.evaluate(&json!({})), json!("ANONYMOUS"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    text: Box<str>,
    path: Path,
    default: Option<Value>,
    filters: Vec<Filter>,
}

impl Expression {
    pub fn parse(text: &str) -> Result<Self, MapError> {
        let text = text.trim();
        let pieces = split_unquoted(text, '|').map_err(|reason| MapError::expression(text, reason))?;
        let (head, filter_names) = match pieces.split_first() {
            Some(split) => split,
            None => return Err(MapError::expression(text, "empty expression")),
        };

        let (path_text, default_text) = match head.find("??") {
            Some(at) => (&head[..at], Some(&head[at + 2..])),
            None => (*head, None),
        };

        let path_text = path_text.trim();
        if path_text.is_empty() {
            return Err(MapError::expression(text, "missing path"));
        }
        let path = Path::parse(path_text)?;

        let default = default_text
            .map(|raw| parse_default(raw.trim()))
            .transpose()
            .map_err(|reason| MapError::expression(text, reason))?;

        let filters = filter_names
            .iter()
            .map(|name| match name.trim() {
                "" => Err(MapError::expression(text, "empty filter")),
                name => name
                    .parse::<Filter>()
                    .map_err(|err| MapError::expression(text, alloc::format!("{err}"))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            text: text.into(),
            path,
            default,
            filters,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    #[inline]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Evaluates against `source`. A path with wildcards yields the
    /// sequence of matched values.
    #[inline]
    pub fn evaluate(&self, source: &Value) -> Value {
        self.evaluate_at(source, &self.path)
    }

    /// Evaluates with `path` standing in for [`Self::path`], usually the
    /// same path with some wildcards bound.
    pub(crate) fn evaluate_at(&self, source: &Value, path: &Path) -> Value {
        let mut value = match DataAccessor::new(source).resolve(path) {
            Resolved::Missing => Value::Null,
            Resolved::Single(value) => value.clone(),
            Resolved::Wildcard(matches) => Value::Array(matches.values().cloned().collect()),
        };
        if value.is_null()
            && let Some(default) = &self.default
        {
            value = default.clone();
        }
        filter::apply_all(&self.filters, value)
    }
}

impl FromStr for Expression {
    type Err = MapError;

    #[inline]
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl fmt::Display for Expression {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// -----------------------------------------------------------------------------
// Lexing

/// Splits on `delimiter` outside of quoted strings.
fn split_unquoted(text: &str, delimiter: char) -> Result<Vec<&str>, &'static str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut quote = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match quote {
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == delimiter => {
                pieces.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            None => {}
        }
    }

    if quote.is_some() {
        return Err("unterminated string");
    }
    pieces.push(&text[start..]);
    Ok(pieces)
}

fn parse_default(raw: &str) -> Result<Value, &'static str> {
    if raw.is_empty() {
        return Err("missing default after `??`");
    }
    if let Some(inner) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        return Ok(Value::String(unescape_single(inner)));
    }
    serde_json::from_str(raw)
        .map_err(|_| "default must be a quoted string, a number, `true`, `false` or `null`")
}

fn unescape_single(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(next) = chars.next()
        {
            out.push(next);
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Expression, split_unquoted};
    use crate::{Filter, MapError};

    #[test]
    fn parses_all_parts() {
        let expr = Expression::parse(r#" a.*.b ?? "x | y" | trim | upper "#).unwrap();
        assert_eq!(expr.path().to_string(), "a.*.b");
        assert_eq!(expr.default_value(), Some(&json!("x | y")));
        assert_eq!(expr.filters(), &[Filter::Trim, Filter::Upper]);
        assert_eq!(expr.to_string(), r#"a.*.b ?? "x | y" | trim | upper"#);
    }

    #[test]
    fn json_defaults() {
        for (text, default) in [
            ("a ?? 3", json!(3)),
            ("a ?? -1.5", json!(-1.5)),
            ("a ?? true", json!(true)),
            ("a ?? null", json!(null)),
            (r"a ?? 'it\'s'", json!("it's")),
        ] {
            let expr = Expression::parse(text).unwrap();
            assert_eq!(expr.default_value(), Some(&default), "{text}");
        }
    }

    #[test]
    fn rejects_malformed_expressions() {
        for text in ["", "?? 1", "a ??", "a ?? nope", "a | shout", "a |", "a ?? 'open"] {
            let err = Expression::parse(text).unwrap_err();
            assert!(matches!(err, MapError::Expression { .. }), "{text}: {err:?}");
        }
        assert!(matches!(Expression::parse("a..b"), Err(MapError::Path(_))));
    }

    #[test]
    fn default_only_replaces_null() {
        let expr = Expression::parse("n ?? 5").unwrap();
        assert_eq!(expr.evaluate(&json!({ "n": 0 })), json!(0));
        assert_eq!(expr.evaluate(&json!({ "n": null })), json!(5));
        assert_eq!(expr.evaluate(&json!({})), json!(5));
    }

    #[test]
    fn wildcard_yields_sequence() {
        let expr = Expression::parse("items.*.id | count").unwrap();
        assert_eq!(expr.evaluate(&json!({ "items": [{ "id": 1 }, {}, { "id": 3 }] })), json!(2));
        assert_eq!(split_unquoted("a|'b|c'|d", '|').unwrap(), ["a", "'b|c'", "d"]);
    }
}
