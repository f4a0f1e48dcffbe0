//! Path expression parser
//!
//! Parses path-expression strings into a [`PathExpr`] AST using a pest grammar.

use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "path.pest"]
struct PathParser;

/// Error type for path expression parsing failures
#[derive(Debug, Error)]
pub enum PathError {
    #[error("Path error: {0}")]
    Syntax(#[from] pest::error::Error<Rule>),

    #[error("Path error: Empty path expression")]
    Empty,
}

/// One `/`-separated step of a path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A literal node name
    Name(String),
    /// `*`: exactly one segment with any name
    AnyOne,
    /// `#`: one or more segments with any names
    AnyMany,
}

/// Parsed path expression
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathExpr {
    pub steps: Vec<Step>,
    /// Attribute selected by a `.name` suffix
    pub attribute: Option<String>,
    /// Text after a `.` that is not a bare attribute name; ignored by matching
    pub annotation: Option<String>,
}

impl PathExpr {
    /// Steps of `self` followed by the steps of `tail`, keeping `tail`'s suffix
    pub fn join(&self, tail: &PathExpr) -> PathExpr {
        PathExpr {
            steps: self.steps.iter().chain(&tail.steps).cloned().collect(),
            attribute: tail.attribute.clone(),
            annotation: tail.annotation.clone(),
        }
    }
}

/// Parse a path expression such as `report/#/row.status`
pub fn parse_path(input: &str) -> Result<PathExpr, PathError> {
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    let mut pairs = PathParser::parse(Rule::path, input)?;
    let mut expr = PathExpr::default();

    let Some(path_pair) = pairs.next() else {
        return Err(PathError::Empty);
    };

    for pair in path_pair.into_inner() {
        match pair.as_rule() {
            Rule::steps => {
                expr.steps = pair
                    .into_inner()
                    .filter_map(|step| match step.as_rule() {
                        Rule::any_one => Some(Step::AnyOne),
                        Rule::any_many => Some(Step::AnyMany),
                        Rule::name => Some(Step::Name(step.as_str().to_string())),
                        _ => None,
                    })
                    .collect();
            }
            Rule::attribute => expr.attribute = Some(pair.as_str().to_string()),
            Rule::annotation => expr.annotation = Some(pair.as_str().to_string()),
            Rule::EOI => {} // End of input
            _ => {}
        }
    }

    Ok(expr)
}
