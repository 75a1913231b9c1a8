//! Boolean query tree and its text rendering.
//!
//! [`Expr`] is the backend-side counterpart of a condition: predicates
//! combined with `AND`/`OR`/`NOT`, plus regex stages that can only run as
//! separate `| regex` or `| where` pipeline steps. Rendering makes
//! precedence explicit: a composite nested in a composite of the other kind
//! is parenthesized, and so is a composite under `NOT`.

use std::borrow::Cow;
use std::fmt;

use crate::modifiers::{Fragment, escape_backslashes};

/// A backend boolean expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// No constraint; vanishes from composites.
    Empty,
    /// A search predicate, already rendered.
    Term(String),
    /// A regex that must become a pipeline stage.
    Stage { field: String, pattern: String },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl From<Fragment> for Expr {
    fn from(fragment: Fragment) -> Self {
        match fragment {
            Fragment::Empty => Expr::Empty,
            Fragment::Predicate(text) => Expr::Term(text),
            Fragment::Regex { field, pattern } => Expr::Stage { field, pattern },
        }
    }
}

impl Expr {
    /// Conjunction of `parts`, flattening nested conjunctions and dropping
    /// empty parts. Collapses to the single remaining part, if any.
    pub fn and(parts: impl IntoIterator<Item = Expr>) -> Expr {
        Self::combine(parts, true)
    }

    /// Disjunction of `parts`; see [`Expr::and`].
    pub fn or(parts: impl IntoIterator<Item = Expr>) -> Expr {
        Self::combine(parts, false)
    }

    pub fn negate(inner: Expr) -> Expr {
        match inner {
            Expr::Empty => Expr::Empty,
            Expr::Not(inner) => *inner,
            other => Expr::Not(Box::new(other)),
        }
    }

    fn combine(parts: impl IntoIterator<Item = Expr>, is_and: bool) -> Expr {
        let mut args = Vec::new();
        for part in parts {
            match part {
                Expr::Empty => {}
                Expr::And(children) if is_and => args.extend(children),
                Expr::Or(children) if !is_and => args.extend(children),
                other => args.push(other),
            }
        }

        match args.len() {
            0 => Expr::Empty,
            1 => args.remove(0),
            _ if is_and => Expr::And(args),
            _ => Expr::Or(args),
        }
    }

    fn is_composite(&self) -> bool {
        matches!(self, Expr::And(_) | Expr::Or(_))
    }

    fn contains_stage(&self) -> bool {
        match self {
            Expr::Stage { .. } => true,
            Expr::And(children) | Expr::Or(children) => children.iter().any(Expr::contains_stage),
            Expr::Not(inner) => inner.contains_stage(),
            Expr::Empty | Expr::Term(_) => false,
        }
    }

    /// Split regex stages out of the search expression.
    ///
    /// Returns the remaining search expression and the pipeline stages in
    /// the order they appear. A regex in a conjunctive position becomes a
    /// `| regex` stage (`!=` directly under `NOT`), and alternatives over one
    /// field merge into a single pattern. Any other group holding a regex
    /// moves whole into a `| where` stage.
    pub fn hoist_stages(self) -> (Expr, Vec<String>) {
        let mut stages = Vec::new();
        let search = self.hoist(&mut stages);
        (search, stages)
    }

    fn hoist(self, stages: &mut Vec<String>) -> Expr {
        match self.merge_regex() {
            Expr::Stage { field, pattern } => {
                stages.push(format!("| regex {field}=\"{pattern}\""));
                Expr::Empty
            }
            Expr::Not(inner) => match *inner {
                Expr::Stage { field, pattern } => {
                    stages.push(format!("| regex {field}!=\"{pattern}\""));
                    Expr::Empty
                }
                other if other.contains_stage() => {
                    let negated = Expr::Not(Box::new(other));
                    stages.push(format!("| where {}", WhereClause(&negated)));
                    Expr::Empty
                }
                other => Expr::Not(Box::new(other)),
            },
            Expr::And(children) => {
                let kept: Vec<Expr> = children.into_iter().map(|c| c.hoist(stages)).collect();
                Expr::and(kept)
            }
            or @ Expr::Or(_) if or.contains_stage() => {
                stages.push(format!("| where {}", WhereClause(&or)));
                Expr::Empty
            }
            other => other,
        }
    }

    /// Merge a disjunction of regexes on one field into a single regex.
    fn merge_regex(self) -> Expr {
        match self {
            Expr::Or(children) if same_field_stages(&children) => {
                let mut field = String::new();
                let mut alternatives = Vec::with_capacity(children.len());
                for child in children {
                    if let Expr::Stage { field: f, pattern } = child {
                        field = f;
                        alternatives.push(format!("(?:{pattern})"));
                    }
                }
                Expr::Stage {
                    field,
                    pattern: alternatives.join("|"),
                }
            }
            Expr::Not(inner) => Expr::negate((*inner).merge_regex()),
            other => other,
        }
    }

    /// Render a child of a composite, parenthesizing a composite of the
    /// other kind.
    fn render_child(&self, parent_is_and: bool, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let needs_parens = match self {
            Expr::And(_) => !parent_is_and,
            Expr::Or(_) => parent_is_and,
            _ => false,
        };
        if needs_parens {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }

    fn render_composite(
        children: &[Expr],
        is_and: bool,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let keyword = if is_and { " AND " } else { " OR " };
        let mut first = true;
        for child in children.iter().filter(|c| **c != Expr::Empty) {
            if !first {
                f.write_str(keyword)?;
            }
            first = false;
            child.render_child(is_and, f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Empty => Ok(()),
            Expr::Term(text) => f.write_str(text),
            Expr::Stage { field, pattern } => write!(f, "| regex {field}=\"{pattern}\""),
            Expr::And(children) => Self::render_composite(children, true, f),
            Expr::Or(children) => Self::render_composite(children, false, f),
            Expr::Not(inner) if inner.is_composite() => write!(f, "NOT ({inner})"),
            Expr::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}

fn same_field_stages(children: &[Expr]) -> bool {
    let mut fields = children.iter().map(|child| match child {
        Expr::Stage { field, .. } => Some(field.as_str()),
        _ => None,
    });
    match fields.next() {
        Some(Some(first)) => fields.all(|field| field == Some(first)),
        _ => false,
    }
}

/// An [`Expr`] as an eval expression for a `| where` stage: search
/// predicates go through `searchmatch`, regexes through `match`.
struct WhereClause<'a>(&'a Expr);

impl WhereClause<'_> {
    fn write_composite(
        children: &[Expr],
        keyword: &str,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(keyword)?;
            }
            if child.is_composite() {
                write!(f, "({})", WhereClause(child))?;
            } else {
                write!(f, "{}", WhereClause(child))?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for WhereClause<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Expr::Empty => f.write_str("true()"),
            Expr::Term(text) => write!(f, "searchmatch(\"{}\")", eval_string(text)),
            Expr::Stage { field, pattern } => {
                write!(f, "match({}, \"{pattern}\")", eval_field(field))
            }
            Expr::And(children) => Self::write_composite(children, " AND ", f),
            Expr::Or(children) => Self::write_composite(children, " OR ", f),
            Expr::Not(inner) if inner.is_composite() => write!(f, "NOT ({})", WhereClause(inner)),
            Expr::Not(inner) => write!(f, "NOT {}", WhereClause(inner)),
        }
    }
}

/// Escape search text for an eval string literal.
fn eval_string(text: &str) -> String {
    escape_backslashes(text).replace('"', "\\\"")
}

/// Field reference in an eval expression; names outside `[A-Za-z0-9_]`
/// need single quotes.
fn eval_field(field: &str) -> Cow<'_, str> {
    if field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Cow::Borrowed(field)
    } else {
        Cow::Owned(format!("'{field}'"))
    }
}

/// Join the non-empty pieces of a query with single spaces.
pub fn join_query<'a>(pieces: impl IntoIterator<Item = &'a str>) -> String {
    pieces
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
