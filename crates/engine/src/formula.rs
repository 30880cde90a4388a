//! Evaluation of rule formulas over the matches of their sub-patterns.

use std::collections::{HashMap, HashSet};

use ir::{AncestorIndex, EqualityPolicy, Tree};
use loader::PatternSet;
use patterns::{Formula, PatternId, PatternTree, Predicate};
use tracing::trace;

use crate::budget::Budget;
use crate::env::Binding;
use crate::error::{InvariantViolation, MatchError};
use crate::matcher::{Match, Matcher};

/// Everything a formula needs from the file under analysis.
pub struct EvalContext<'a> {
    pub tree: &'a Tree,
    pub index: &'a AncestorIndex,
    pub patterns: &'a PatternSet,
    pub policy: EqualityPolicy,
    pub budget: &'a Budget,
}

impl<'a> EvalContext<'a> {
    pub fn pattern(&self, id: &str) -> Result<&'a PatternTree, MatchError> {
        self.patterns
            .get(id)
            .map(|p| p.as_ref())
            .ok_or_else(|| InvariantViolation::MissingPattern { id: id.to_string() }.into())
    }

    fn matcher(&self, pattern: &'a PatternTree) -> Matcher<'a> {
        Matcher::new(pattern, self.tree, self.policy, self.budget)
    }

    /// Searches the whole file for every sub-pattern the formula uses as an
    /// operand. Patterns only used inside `metavariable-pattern` are run
    /// later, under the bound value.
    pub fn collect(&self, formula: &Formula) -> Result<HashMap<PatternId, Vec<Match>>, MatchError> {
        let mut ids = Vec::new();
        operand_ids(formula, &mut ids);
        let mut out = HashMap::new();
        for id in ids {
            if out.contains_key(id) {
                continue;
            }
            let found = self
                .matcher(self.pattern(id)?)
                .search()
                .collect::<Result<Vec<_>, _>>()?;
            trace!(pattern = id, matches = found.len(), "Sub-pattern searched");
            out.insert(id.to_string(), found);
        }
        Ok(out)
    }

    /// Whether `outer` encloses `inner`: by ancestry when both are nodes,
    /// by range otherwise.
    fn encloses(&self, outer: &Match, inner: &Match) -> bool {
        match (outer.anchor, inner.anchor) {
            (Some(o), Some(i)) => self.index.is_ancestor_or_self(o, i),
            _ => outer.span.contains(&inner.span),
        }
    }

    fn compatible(&self, a: &Match, b: &Match) -> bool {
        a.env.compatible(&b.env, self.tree, &self.policy)
    }
}

fn operand_ids<'f>(formula: &'f Formula, out: &mut Vec<&'f str>) {
    match formula {
        Formula::Pattern(id) => out.push(id),
        Formula::And(items) | Formula::Or(items) => {
            for item in items {
                operand_ids(item, out);
            }
        }
        Formula::Not(f) | Formula::NotInside(f) => operand_ids(f, out),
        Formula::Inside { inner, outer } => {
            operand_ids(inner, out);
            operand_ids(outer, out);
        }
        Formula::Constraint { .. } | Formula::Focus(_) => {}
    }
}

/// Evaluates `formula` given the match sets of its operands, returning the
/// surviving matches sorted by range and then by rendered bindings.
pub fn evaluate(
    formula: &Formula,
    matches: &HashMap<PatternId, Vec<Match>>,
    ctx: &EvalContext<'_>,
) -> Result<Vec<Match>, MatchError> {
    let out = eval(formula, matches, ctx)?;
    Ok(sorted(out, ctx.tree))
}

/// Deterministic order: range, then rendered bindings.
pub fn sorted(mut matches: Vec<Match>, tree: &Tree) -> Vec<Match> {
    matches.sort_by_cached_key(|m| (m.span, m.env.render(tree)));
    matches
}

fn dedup(matches: Vec<Match>) -> Vec<Match> {
    let mut seen = HashSet::new();
    matches
        .into_iter()
        .filter(|m| seen.insert((m.span, m.env.clone())))
        .collect()
}

fn eval(
    formula: &Formula,
    matches: &HashMap<PatternId, Vec<Match>>,
    ctx: &EvalContext<'_>,
) -> Result<Vec<Match>, MatchError> {
    match formula {
        Formula::Pattern(id) => matches
            .get(id)
            .cloned()
            .ok_or_else(|| InvariantViolation::MissingPattern { id: id.clone() }.into()),
        Formula::Or(items) => {
            let mut out = Vec::new();
            for item in items {
                out.extend(eval(item, matches, ctx)?);
            }
            Ok(dedup(out))
        }
        Formula::Inside { inner, outer } => {
            let inner = eval(inner, matches, ctx)?;
            let outer = eval(outer, matches, ctx)?;
            let mut out = Vec::with_capacity(inner.len());
            for m in inner {
                if let Some(joined) = within(&m, &outer, ctx)? {
                    out.push(joined);
                }
            }
            Ok(dedup(out))
        }
        Formula::And(items) => eval_and(items, matches, ctx),
        other => Err(InvariantViolation::MisplacedOperator {
            operator: other.name(),
        }
        .into()),
    }
}

/// `m` joined with the innermost compatible context enclosing it.
fn within(m: &Match, contexts: &[Match], ctx: &EvalContext<'_>) -> Result<Option<Match>, MatchError> {
    let mut best: Option<&Match> = None;
    for c in contexts {
        ctx.budget.tick()?;
        if ctx.encloses(c, m) && ctx.compatible(m, c) && best.map_or(true, |b| c.span.len() < b.span.len()) {
            best = Some(c);
        }
    }
    Ok(best.and_then(|c| {
        m.env.join(&c.env, ctx.tree, &ctx.policy).map(|env| Match {
            span: m.span,
            anchor: m.anchor,
            env,
        })
    }))
}

fn eval_and(
    items: &[Formula],
    matches: &HashMap<PatternId, Vec<Match>>,
    ctx: &EvalContext<'_>,
) -> Result<Vec<Match>, MatchError> {
    let mut current: Option<Vec<Match>> = None;
    let mut constraints = Vec::new();
    let mut negatives = Vec::new();
    let mut focus = Vec::new();
    for item in items {
        match item {
            Formula::Not(_) | Formula::NotInside(_) => negatives.push(item),
            Formula::Constraint {
                metavariable,
                predicate,
            } => constraints.push((metavariable.as_str(), predicate)),
            Formula::Focus(name) => focus.push(name.as_str()),
            positive => {
                let set = eval(positive, matches, ctx)?;
                current = Some(match current {
                    None => set,
                    Some(acc) => join(acc, &set, ctx)?,
                });
            }
        }
    }
    let Some(mut current) = current else {
        return Err(InvariantViolation::MisplacedOperator { operator: "and" }.into());
    };

    for (name, predicate) in constraints {
        let mut kept = Vec::with_capacity(current.len());
        for m in current {
            if let Some(m) = constrain(m, name, predicate, ctx)? {
                kept.push(m);
            }
        }
        current = kept;
    }

    for negative in negatives {
        let (inner, inside) = match negative {
            Formula::Not(f) => (f, false),
            Formula::NotInside(f) => (f, true),
            _ => continue,
        };
        let excluded = eval(inner, matches, ctx)?;
        let mut kept = Vec::with_capacity(current.len());
        for m in current {
            let mut hit = false;
            for n in &excluded {
                ctx.budget.tick()?;
                let related = if inside {
                    ctx.encloses(n, &m)
                } else {
                    n.span.overlaps(&m.span)
                };
                if related && ctx.compatible(&m, n) {
                    hit = true;
                    break;
                }
            }
            if !hit {
                kept.push(m);
            }
        }
        current = kept;
    }

    for name in focus {
        current = current
            .into_iter()
            .filter_map(|m| {
                let binding = m.env.get(name)?;
                let span = binding.span(ctx.tree);
                let anchor = match binding {
                    Binding::Node(id) => Some(*id),
                    Binding::Seq { nodes, .. } if nodes.len() == 1 => Some(nodes[0]),
                    Binding::Seq { .. } => None,
                };
                Some(Match {
                    span,
                    anchor,
                    env: m.env,
                })
            })
            .collect();
    }
    Ok(dedup(current))
}

/// Constraint join: every pair with compatible environments survives under
/// the left range with the union of both environments.
fn join(left: Vec<Match>, right: &[Match], ctx: &EvalContext<'_>) -> Result<Vec<Match>, MatchError> {
    let mut out = Vec::new();
    for a in &left {
        for b in right {
            ctx.budget.tick()?;
            if let Some(env) = a.env.join(&b.env, ctx.tree, &ctx.policy) {
                out.push(Match {
                    span: a.span,
                    anchor: a.anchor,
                    env,
                });
            }
        }
    }
    Ok(dedup(out))
}

/// Applies one metavariable predicate. Unbound metavariables fail it.
fn constrain(
    m: Match,
    name: &str,
    predicate: &Predicate,
    ctx: &EvalContext<'_>,
) -> Result<Option<Match>, MatchError> {
    ctx.budget.tick()?;
    let Some(binding) = m.env.get(name) else {
        return Ok(None);
    };
    match predicate {
        Predicate::Regex(re) => Ok(re.is_match(binding.text(ctx.tree)).then_some(m)),
        Predicate::Pattern(id) => {
            let roots = binding.nodes().to_vec();
            if roots.is_empty() {
                return Ok(None);
            }
            let pattern = ctx.pattern(id)?;
            let first = ctx.matcher(pattern).search_from(roots, m.env.clone()).next();
            match first {
                Some(Ok(found)) => Ok(Some(Match {
                    span: m.span,
                    anchor: m.anchor,
                    env: found.env,
                })),
                Some(Err(err)) => Err(err),
                None => Ok(None),
            }
        }
    }
}
