//! Backtracking structural matcher.
//!
//! Matching is lazy: every operation returns an iterator of environments
//! and nothing past the first result is computed until the caller asks for
//! it. Ellipses try the shortest absorption first, so the first
//! environment produced is the one consuming the fewest target siblings.

use std::collections::HashSet;
use std::rc::Rc;

use ir::{
    kinds_equal, schema, sequences_equal, EqualityPolicy, ListKind, Marker, NodeId, NodeKind,
    Position, Span, Tree,
};
use patterns::{PatternRoot, PatternTree};

use crate::budget::Budget;
use crate::env::{Binding, Env};
use crate::error::{InvariantViolation, MatchError};

/// Lazily produced environments of one match attempt.
pub type Matches<'a> = Box<dyn Iterator<Item = Result<Env, MatchError>> + 'a>;

/// Lazily produced, deduplicated matches of a whole search.
pub type Found<'a> = Box<dyn Iterator<Item = Result<Match, MatchError>> + 'a>;

/// Environments of a sequence prefix, each with the siblings it consumed.
type Prefixes<'a> = Box<dyn Iterator<Item = Result<(Env, usize), MatchError>> + 'a>;

/// One occurrence of a pattern in a target tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Match {
    pub span: Span,
    /// The matched node, or `None` when the range is a run of siblings.
    pub anchor: Option<NodeId>,
    pub env: Env,
}

fn none<'a>() -> Matches<'a> {
    Box::new(std::iter::empty())
}

fn single<'a>(env: Env) -> Matches<'a> {
    Box::new(std::iter::once(Ok(env)))
}

fn fail<'a>(err: MatchError) -> Matches<'a> {
    Box::new(std::iter::once(Err(err)))
}

/// Feeds every environment of `first` into `then`; errors pass through
/// untouched so the consumer sees them in order.
fn chain<'a, F>(first: Matches<'a>, then: F) -> Matches<'a>
where
    F: Fn(Env) -> Matches<'a> + 'a,
{
    Box::new(first.flat_map(move |item| match item {
        Ok(env) => then(env),
        Err(err) => fail(err),
    }))
}

#[derive(Clone, Copy)]
pub struct Matcher<'a> {
    pattern: &'a Tree,
    root: &'a PatternRoot,
    target: &'a Tree,
    policy: EqualityPolicy,
    budget: &'a Budget,
}

impl<'a> Matcher<'a> {
    pub fn new(
        pattern: &'a PatternTree,
        target: &'a Tree,
        policy: EqualityPolicy,
        budget: &'a Budget,
    ) -> Self {
        Self {
            pattern: &pattern.tree,
            root: &pattern.root,
            target,
            policy,
            budget,
        }
    }

    /// Every match anywhere in the target, in pre-order of the anchor node.
    pub fn search(self) -> Found<'a> {
        self.search_from(vec![self.target.root()], Env::new())
    }

    /// Matches anchored at `roots` or below, extending `env`. Matches with
    /// the same range and environment are reported once.
    pub fn search_from(self, roots: Vec<NodeId>, env: Env) -> Found<'a> {
        let target = self.target;
        let anchors = roots.into_iter().flat_map(move |r| target.descendants(r));
        let raw: Found<'a> = match self.root {
            PatternRoot::Node(p) => {
                let p = *p;
                Box::new(anchors.flat_map(move |t| {
                    let span = target.span(t);
                    self.match_node(p, t, env.clone()).map(move |item| {
                        item.map(|env| Match {
                            span,
                            anchor: Some(t),
                            env,
                        })
                    })
                }))
            }
            PatternRoot::Sequence(ps) => {
                let ps = ps.as_slice();
                Box::new(
                    anchors
                        .filter(move |t| {
                            matches!(
                                target.kind(*t),
                                NodeKind::List(ListKind::Program | ListKind::Block)
                            )
                        })
                        .flat_map(move |list| self.match_runs(ps, list, env.clone())),
                )
            }
        };
        let mut seen = HashSet::new();
        Box::new(raw.filter(move |item| match item {
            Ok(m) => seen.insert((m.span, m.env.clone())),
            Err(_) => true,
        }))
    }

    /// Matches of a statement sequence against contiguous runs of the
    /// children of `list`. Each start is tried once; the run ends wherever
    /// the pattern stops consuming siblings.
    fn match_runs(self, ps: &'a [NodeId], list: NodeId, env: Env) -> Found<'a> {
        let ts = self.target.children(list);
        Box::new((0..ts.len()).flat_map(move |i| {
            let run = &ts[i..];
            let start = self.target.span(run[0]).start;
            self.match_prefix(ps, run, 0, start, env.clone())
                .filter_map(move |item| match item {
                    Ok((_, 0)) => None,
                    Ok((env, len)) => {
                        let span = self.target.span(run[0]).cover(self.target.span(run[len - 1]));
                        Some(Ok(Match { span, anchor: None, env }))
                    }
                    Err(err) => Some(Err(err)),
                })
        }))
    }

    /// Like `match_seq`, but the pattern may stop before the end of `ts`.
    /// Yields each environment with the number of siblings consumed; `pos`
    /// siblings are already consumed and `prev` is where the last one ended.
    fn match_prefix(
        self,
        ps: &'a [NodeId],
        ts: &'a [NodeId],
        pos: usize,
        prev: Position,
        env: Env,
    ) -> Prefixes<'a> {
        if let Err(err) = self.budget.tick() {
            return Box::new(std::iter::once(Err(err)));
        }
        let left = ts.len() - pos;
        let required = self.required(ps);
        if left < required {
            return Box::new(std::iter::empty());
        }
        let Some((&first, rest)) = ps.split_first() else {
            return Box::new(std::iter::once(Ok((env, pos))));
        };
        let end_of = move |k: usize| {
            if k == 0 {
                prev
            } else {
                self.target.span(ts[pos + k - 1]).end
            }
        };
        match self.pattern.kind(first) {
            NodeKind::Marker(Marker::Ellipsis) => {
                let max = left - required;
                Box::new((0..=max).flat_map(move |k| {
                    self.match_prefix(rest, ts, pos + k, end_of(k), env.clone())
                }))
            }
            NodeKind::Marker(Marker::Variadic { name }) => {
                let max = left - required;
                let avail = &ts[pos..];
                let bound = env.get(name).map(|existing| match existing {
                    Binding::Seq { nodes, .. }
                        if nodes.len() <= max
                            && sequences_equal(
                                self.target,
                                nodes,
                                self.target,
                                &avail[..nodes.len()],
                                &self.policy,
                            ) =>
                    {
                        Some(nodes.len())
                    }
                    _ => None,
                });
                match bound {
                    Some(Some(k)) => self.match_prefix(rest, ts, pos + k, end_of(k), env),
                    Some(None) => Box::new(std::iter::empty()),
                    None => {
                        let at = match avail.first() {
                            Some(t) if self.required(rest) > 0 => self.target.span(*t).start,
                            _ => prev,
                        };
                        Box::new((0..=max).flat_map(move |k| {
                            let at = if k > 0 { self.target.span(avail[0]).start } else { at };
                            let value = Binding::Seq {
                                nodes: avail[..k].to_vec(),
                                at,
                            };
                            self.match_prefix(rest, ts, pos + k, end_of(k), env.bind(name, value))
                        }))
                    }
                }
            }
            _ => {
                let t = ts[pos];
                let end = self.target.span(t).end;
                Box::new(self.match_node(first, t, env).flat_map(move |item| -> Prefixes<'a> {
                    match item {
                        Ok(e) => self.match_prefix(rest, ts, pos + 1, end, e),
                        Err(err) => Box::new(std::iter::once(Err(err))),
                    }
                }))
            }
        }
    }

    /// Environments under which pattern node `p` matches target node `t`.
    pub fn match_node(self, p: NodeId, t: NodeId, env: Env) -> Matches<'a> {
        if let Err(err) = self.budget.tick() {
            return fail(err);
        }
        let tkind = self.target.kind(t);
        if tkind.is_marker() {
            return fail(self.marker_in_target(t));
        }
        match self.pattern.kind(p) {
            NodeKind::Marker(Marker::Metavar { name, category }) => {
                match tkind.category() {
                    Some(found) if category.accepts(found) => {
                        self.bind(name, Binding::Node(t), env)
                    }
                    _ => none(),
                }
            }
            NodeKind::Marker(Marker::Ellipsis) => single(env),
            // rejected at compile time outside lists
            NodeKind::Marker(Marker::Variadic { .. }) => none(),
            NodeKind::Marker(Marker::DeepEllipsis) => {
                let Some(&inner) = self.pattern.children(p).first() else {
                    return none();
                };
                Box::new(
                    self.target
                        .descendants(t)
                        .flat_map(move |d| self.match_node(inner, d, env.clone())),
                )
            }
            pkind => {
                if !kinds_equal(pkind, tkind, &self.policy) {
                    return none();
                }
                if let Err(err) = self.check_children(t) {
                    return fail(err);
                }
                let ps = self.pattern.children(p);
                let ts = self.target.children(t);
                let end = self.target.span(t).end;
                match pkind {
                    NodeKind::List(list) if list.is_unordered() => {
                        self.match_unordered(*list, ps, ts, end, env)
                    }
                    NodeKind::List(_) => self.match_seq(ps, ts, end, env),
                    other if schema::layout(other).is_none() => self.match_seq(ps, ts, end, env),
                    _ => self.match_pairs(ps, ts, env),
                }
            }
        }
    }

    /// Binds `name`, or checks the existing binding is structurally equal.
    fn bind(self, name: &str, value: Binding, env: Env) -> Matches<'a> {
        let consistent = env
            .get(name)
            .map(|existing| existing.equals(&value, self.target, &self.policy));
        match consistent {
            Some(true) => single(env),
            Some(false) => none(),
            None => single(env.bind(name, value)),
        }
    }

    /// Fixed-layout children, matched slot by slot.
    fn match_pairs(self, ps: &'a [NodeId], ts: &'a [NodeId], env: Env) -> Matches<'a> {
        match (ps.split_first(), ts.split_first()) {
            (None, None) => single(env),
            (Some((&p, ps_rest)), Some((&t, ts_rest))) => chain(self.match_node(p, t, env), move |e| {
                self.match_pairs(ps_rest, ts_rest, e)
            }),
            _ => none(),
        }
    }

    fn is_spread(self, p: NodeId) -> bool {
        matches!(
            self.pattern.kind(p),
            NodeKind::Marker(Marker::Ellipsis | Marker::Variadic { .. })
        )
    }

    /// Pattern elements that consume exactly one target element.
    fn required(self, ps: &[NodeId]) -> usize {
        ps.iter().filter(|p| !self.is_spread(**p)).count()
    }

    /// Ordered list matching. `end` locates empty runs absorbed at the end
    /// of the list.
    fn match_seq(self, ps: &'a [NodeId], ts: &'a [NodeId], end: Position, env: Env) -> Matches<'a> {
        if let Err(err) = self.budget.tick() {
            return fail(err);
        }
        let required = self.required(ps);
        if ts.len() < required || (required == ps.len() && ts.len() != required) {
            return none();
        }
        let Some((&first, rest)) = ps.split_first() else {
            return single(env);
        };
        match self.pattern.kind(first) {
            NodeKind::Marker(Marker::Ellipsis) => {
                let max = ts.len() - required;
                Box::new((0..=max).flat_map(move |k| self.match_seq(rest, &ts[k..], end, env.clone())))
            }
            NodeKind::Marker(Marker::Variadic { name }) => {
                let max = ts.len() - required;
                let bound = env.get(name).map(|existing| match existing {
                    Binding::Seq { nodes, .. }
                        if nodes.len() <= max
                            && sequences_equal(
                                self.target,
                                nodes,
                                self.target,
                                &ts[..nodes.len()],
                                &self.policy,
                            ) =>
                    {
                        Some(nodes.len())
                    }
                    _ => None,
                });
                match bound {
                    Some(Some(k)) => self.match_seq(rest, &ts[k..], end, env),
                    Some(None) => none(),
                    None => {
                        let at = ts.first().map_or(end, |t| self.target.span(*t).start);
                        Box::new((0..=max).flat_map(move |k| {
                            let value = Binding::Seq {
                                nodes: ts[..k].to_vec(),
                                at,
                            };
                            self.match_seq(rest, &ts[k..], end, env.bind(name, value))
                        }))
                    }
                }
            }
            _ => match ts.split_first() {
                Some((&t, ts_rest)) => chain(self.match_node(first, t, env), move |e| {
                    self.match_seq(rest, ts_rest, end, e)
                }),
                None => none(),
            },
        }
    }

    /// Attribute and entry lists: pattern elements pair with distinct
    /// target elements in any order. Attribute lists always admit extra
    /// target elements; entry lists only with an ellipsis or variadic, and
    /// the first variadic binds whatever is left over.
    fn match_unordered(
        self,
        kind: ListKind,
        ps: &'a [NodeId],
        ts: &'a [NodeId],
        end: Position,
        env: Env,
    ) -> Matches<'a> {
        let mut open = kind == ListKind::Attrs;
        let mut rest = None;
        let mut required = Vec::new();
        for &p in ps {
            match self.pattern.kind(p) {
                NodeKind::Marker(Marker::Ellipsis) => open = true,
                NodeKind::Marker(Marker::Variadic { name }) => {
                    open = true;
                    rest.get_or_insert(name.as_str());
                }
                _ => required.push(p),
            }
        }
        if ts.len() < required.len() || (!open && ts.len() != required.len()) {
            return none();
        }
        let used = vec![false; ts.len()];
        self.assign(required.into(), 0, ts, used, rest, end, env)
    }

    #[allow(clippy::too_many_arguments)]
    fn assign(
        self,
        required: Rc<[NodeId]>,
        idx: usize,
        ts: &'a [NodeId],
        used: Vec<bool>,
        rest: Option<&'a str>,
        end: Position,
        env: Env,
    ) -> Matches<'a> {
        if let Err(err) = self.budget.tick() {
            return fail(err);
        }
        let Some(&p) = required.get(idx) else {
            return match rest {
                Some(name) => {
                    let nodes: Vec<NodeId> = ts
                        .iter()
                        .zip(&used)
                        .filter(|(_, u)| !**u)
                        .map(|(t, _)| *t)
                        .collect();
                    let at = nodes.first().map_or(end, |t| self.target.span(*t).start);
                    self.bind(name, Binding::Seq { nodes, at }, env)
                }
                None => single(env),
            };
        };
        let free: Vec<usize> = (0..ts.len()).filter(|i| !used[*i]).collect();
        Box::new(free.into_iter().flat_map(move |i| {
            let mut next = used.clone();
            next[i] = true;
            let required = Rc::clone(&required);
            chain(self.match_node(p, ts[i], env.clone()), move |e| {
                self.assign(Rc::clone(&required), idx + 1, ts, next.clone(), rest, end, e)
            })
        }))
    }

    /// Rejects target nodes whose children break the tree schema.
    fn check_children(self, t: NodeId) -> Result<(), MatchError> {
        let kind = self.target.kind(t);
        let children = self.target.children(t);
        if let Some(slots) = schema::layout(kind) {
            if slots.len() != children.len() {
                return Err(InvariantViolation::Arity {
                    path: self.target.path().to_string(),
                    node: t,
                    label: kind.label(),
                    expected: slots.len(),
                    found: children.len(),
                }
                .into());
            }
        }
        for (idx, &child) in children.iter().enumerate() {
            let ckind = self.target.kind(child);
            let found = match ckind.category() {
                Some(found) if !ckind.is_marker() => found,
                _ => return Err(self.marker_in_target(child)),
            };
            let allowed = schema::slot(kind, idx);
            if !allowed.contains(found) {
                return Err(InvariantViolation::MisplacedNode {
                    path: self.target.path().to_string(),
                    parent: t,
                    parent_label: kind.label(),
                    node: child,
                    found: found.to_string(),
                    allowed: allowed.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn marker_in_target(self, t: NodeId) -> MatchError {
        InvariantViolation::MarkerInTarget {
            path: self.target.path().to_string(),
            node: t,
            label: self.target.kind(t).label(),
        }
        .into()
    }
}
