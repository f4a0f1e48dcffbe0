//! Compiled path patterns
//!
//! A [`PathPattern`] is compiled once from a path expression and then tested
//! against the slash-joined path of every node visited during a traversal.
//! Each predicate is an anchored regular expression; literal names are
//! escaped and wildcards never match across a `/`.

use regex::Regex;
use std::fmt::{self, Debug};

use crate::parser::{PathExpr, Step, parse_path};
use crate::schema::SchemaError;

/// One path segment: any run of characters without a slash
const SEGMENT: &str = "[^/]+";

#[derive(Clone)]
pub struct PathPattern {
    source: String,
    expr: PathExpr,
    exact: Regex,
    prefix: Regex,
    suffix: Regex,
}

// Manual Debug implementation (compiled regexes are noise)
impl Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.source).finish()
    }
}

// Compare sources, not compiled regexes
impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.expr == other.expr
    }
}

impl PathPattern {
    /// Parse and compile a path expression
    pub fn new(source: &str) -> Result<Self, SchemaError> {
        let expr = parse_path(source).map_err(|e| SchemaError::Path {
            expr: source.to_string(),
            source: e,
        })?;
        Self::from_expr(source.to_string(), expr)
    }

    /// Compile `base` followed by the relative expression `tail`
    ///
    /// The result selects whatever `tail` selects (attribute or text).
    pub fn join(base: &PathPattern, tail: &str) -> Result<Self, SchemaError> {
        let tail_expr = parse_path(tail).map_err(|e| SchemaError::Path {
            expr: tail.to_string(),
            source: e,
        })?;
        Self::from_expr(
            format!("{}/{}", base.source, tail),
            base.expr.join(&tail_expr),
        )
    }

    fn from_expr(source: String, expr: PathExpr) -> Result<Self, SchemaError> {
        let body = regex_body(&expr.steps);
        let compile = |re: String| {
            Regex::new(&re).map_err(|e| SchemaError::Regex {
                expr: source.clone(),
                source: e,
            })
        };

        let exact = compile(format!("^(?:{body})$"))?;
        let prefix = compile(format!("^(?:{body})(?:/{SEGMENT})+$"))?;
        let suffix = compile(format!("^(?:{SEGMENT}/)+(?:{body})$"))?;

        Ok(Self {
            source,
            expr,
            exact,
            prefix,
            suffix,
        })
    }

    /// True iff `path` matches the whole pattern
    #[inline]
    pub fn matches(&self, path: &str) -> bool {
        self.exact.is_match(path)
    }

    /// True iff `path` is the pattern followed by at least one more segment
    #[inline]
    pub fn starts_with(&self, path: &str) -> bool {
        self.prefix.is_match(path)
    }

    /// True iff `path` is at least one segment followed by the pattern
    #[inline]
    pub fn ends_with(&self, path: &str) -> bool {
        self.suffix.is_match(path)
    }

    pub fn attribute_name(&self) -> Option<&str> {
        self.expr.attribute.as_deref()
    }

    /// The expression this pattern was compiled from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &PathExpr {
        &self.expr
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn regex_body(steps: &[Step]) -> String {
    steps
        .iter()
        .map(|step| match step {
            Step::Name(name) => regex::escape(name),
            Step::AnyOne => SEGMENT.to_string(),
            Step::AnyMany => format!("{SEGMENT}(?:/{SEGMENT})*"),
        })
        .collect::<Vec<_>>()
        .join("/")
}
