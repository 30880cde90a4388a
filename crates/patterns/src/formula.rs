//! Boolean rule formulas over named sub-patterns.

use regex::Regex;
use std::fmt;
use thiserror::Error;

/// Name of a sub-pattern within one rule (`p0`, `p1`, ...).
pub type PatternId = String;

#[derive(Debug, Clone)]
pub enum Predicate {
    /// Unanchored search over the rendered text of the bound value.
    Regex(Regex),
    /// The bound value must itself contain a match of the sub-pattern.
    Pattern(PatternId),
}

#[derive(Debug, Clone)]
pub enum Formula {
    Pattern(PatternId),
    /// Constraint join of the conjuncts; the range is the first positive's.
    And(Vec<Formula>),
    /// Union, deduplicated by range and environment.
    Or(Vec<Formula>),
    /// Drops positives overlapped by a compatible match. And-conjunct only.
    Not(Box<Formula>),
    /// Matches of `inner` lying within some match of `outer`.
    Inside {
        inner: Box<Formula>,
        outer: Box<Formula>,
    },
    /// Drops positives lying within a compatible match. And-conjunct only.
    NotInside(Box<Formula>),
    /// Filters on a bound metavariable. And-conjunct only.
    Constraint {
        metavariable: String,
        predicate: Predicate,
    },
    /// Narrows the range to the value bound to the metavariable.
    /// And-conjunct only.
    Focus(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("`{0}` may only appear as a conjunct of an `and`")]
    ConjunctOnly(&'static str),
    #[error("an `and` needs at least one positive conjunct")]
    NoPositive,
    #[error("`{0}` needs at least one operand")]
    Empty(&'static str),
}

impl Formula {
    pub fn pattern(id: impl Into<PatternId>) -> Self {
        Formula::Pattern(id.into())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Formula::Pattern(_) => "pattern",
            Formula::And(_) => "and",
            Formula::Or(_) => "or",
            Formula::Not(_) => "not",
            Formula::Inside { .. } => "inside",
            Formula::NotInside(_) => "not-inside",
            Formula::Constraint { .. } => "constraint",
            Formula::Focus(_) => "focus",
        }
    }

    /// Whether the formula produces matches on its own.
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            Formula::Pattern(_) | Formula::And(_) | Formula::Or(_) | Formula::Inside { .. }
        )
    }

    /// Checks that filter-only operators appear only inside an `and`
    /// alongside a positive conjunct.
    pub fn validate(&self) -> Result<(), FormulaError> {
        if !self.is_positive() {
            return Err(FormulaError::ConjunctOnly(self.name()));
        }
        self.validate_positive()
    }

    fn validate_positive(&self) -> Result<(), FormulaError> {
        match self {
            Formula::Pattern(_) => Ok(()),
            Formula::Or(items) => {
                if items.is_empty() {
                    return Err(FormulaError::Empty("or"));
                }
                items.iter().try_for_each(Formula::validate)
            }
            Formula::Inside { inner, outer } => {
                inner.validate()?;
                outer.validate()
            }
            Formula::And(items) => {
                if items.is_empty() {
                    return Err(FormulaError::Empty("and"));
                }
                if !items.iter().any(Formula::is_positive) {
                    return Err(FormulaError::NoPositive);
                }
                for item in items {
                    match item {
                        Formula::Not(f) | Formula::NotInside(f) => f.validate()?,
                        Formula::Constraint { .. } | Formula::Focus(_) => {}
                        positive => positive.validate_positive()?,
                    }
                }
                Ok(())
            }
            other => Err(FormulaError::ConjunctOnly(other.name())),
        }
    }

    /// Every sub-pattern the formula references, in first-use order.
    pub fn pattern_ids(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out
    }

    fn collect_ids<'a>(&'a self, out: &mut Vec<&'a str>) {
        let push = |id: &'a str, out: &mut Vec<&'a str>| {
            if !out.contains(&id) {
                out.push(id);
            }
        };
        match self {
            Formula::Pattern(id) => push(id, out),
            Formula::And(items) | Formula::Or(items) => {
                for item in items {
                    item.collect_ids(out);
                }
            }
            Formula::Not(f) | Formula::NotInside(f) => f.collect_ids(out),
            Formula::Inside { inner, outer } => {
                inner.collect_ids(out);
                outer.collect_ids(out);
            }
            Formula::Constraint {
                predicate: Predicate::Pattern(id),
                ..
            } => push(id, out),
            Formula::Constraint { .. } | Formula::Focus(_) => {}
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, name: &str, items: &[Formula]) -> fmt::Result {
            write!(f, "{name}(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str(")")
        }
        match self {
            Formula::Pattern(id) => f.write_str(id),
            Formula::And(items) => list(f, "and", items),
            Formula::Or(items) => list(f, "or", items),
            Formula::Not(inner) => write!(f, "not({inner})"),
            Formula::Inside { inner, outer } => write!(f, "inside({inner}, {outer})"),
            Formula::NotInside(inner) => write!(f, "not-inside({inner})"),
            Formula::Constraint {
                metavariable,
                predicate: Predicate::Regex(re),
            } => write!(f, "regex({metavariable}, /{}/)", re.as_str()),
            Formula::Constraint {
                metavariable,
                predicate: Predicate::Pattern(id),
            } => write!(f, "where({metavariable}, {id})"),
            Formula::Focus(name) => write!(f, "focus({name})"),
        }
    }
}
