//! Compiles content expressions into the finite automata that [`ContentMatch`] walks.
//!
//! An expression is parsed into a small tree, turned into a nondeterministic automaton and
//! then into a deterministic one whose states are appended to the schema-wide state table.
//!
//! [`ContentMatch`]: crate::ContentMatch
use displaydoc::Display;
use std::collections::HashMap;
use thiserror::Error;
use tracing::trace;

/// The shared state of every empty content expression.
pub(crate) const EMPTY: usize = 0;

/// Errors when compiling a content expression
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ContentExprError {
    /// Unexpected token '{token}' in content expression '{expr}'
    UnexpectedToken {
        /// The offending token
        token: String,
        /// The expression
        expr: String,
    },
    /// Unexpected trailing text in content expression '{0}'
    TrailingText(String),
    /// Missing closing paren in content expression '{0}'
    MissingParen(String),
    /// Expected number, got '{token}' in content expression '{expr}'
    ExpectedNumber {
        /// The token found instead
        token: String,
        /// The expression
        expr: String,
    },
    /// Unclosed braced range in content expression '{0}'
    UnclosedBrace(String),
    /// No node type or group '{name}' found in content expression '{expr}'
    UnknownName {
        /// The name that could not be resolved
        name: String,
        /// The expression
        expr: String,
    },
    /// Mixing inline and block content in content expression '{0}'
    MixedContent(String),
    /// Only non-generatable nodes ({nodes}) in a required position in content expression '{expr}'
    DeadEnd {
        /// The node types that are allowed at the dead end
        nodes: String,
        /// The expression
        expr: String,
    },
}

/// What the compiler needs to know about each node type.
pub(crate) struct TypeInfo<'a> {
    pub name: &'a str,
    pub groups: Vec<&'a str>,
    pub inline: bool,
    /// Whether a node of this type can be created without extra information, i.e. it is not
    /// a text node and has no required attributes.
    pub generatable: bool,
}

/// A state of the deterministic automaton
#[derive(Debug, Clone, Default)]
pub(crate) struct MatchState {
    pub valid_end: bool,
    /// Pairs of node type id and the id of the next state
    pub next: Vec<(usize, usize)>,
}

impl MatchState {
    pub fn empty() -> Self {
        Self {
            valid_end: true,
            next: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Choice(Vec<Expr>),
    Seq(Vec<Expr>),
    Plus(Box<Expr>),
    Star(Box<Expr>),
    Opt(Box<Expr>),
    Range {
        min: usize,
        max: Option<usize>,
        expr: Box<Expr>,
    },
    Name(usize),
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(expr: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        let mut end = start + c.len_utf8();
        if is_word(c) {
            while let Some(&(i, c)) = chars.peek() {
                if !is_word(c) {
                    break;
                }
                end = i + c.len_utf8();
                chars.next();
            }
        }
        tokens.push(&expr[start..end]);
    }
    tokens
}

struct TokenStream<'a> {
    expr: &'a str,
    tokens: Vec<&'a str>,
    pos: usize,
    types: &'a [TypeInfo<'a>],
    inline: Option<bool>,
}

impl<'a> TokenStream<'a> {
    fn new(expr: &'a str, types: &'a [TypeInfo<'a>]) -> Self {
        Self {
            expr,
            tokens: tokenize(expr),
            pos: 0,
            types,
            inline: None,
        }
    }

    fn next(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    fn eat(&mut self, tok: &str) -> bool {
        if self.next() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> ContentExprError {
        ContentExprError::UnexpectedToken {
            token: self.next().unwrap_or("end of input").to_owned(),
            expr: self.expr.to_owned(),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ContentExprError> {
        let mut exprs = vec![self.parse_expr_seq()?];
        while self.eat("|") {
            exprs.push(self.parse_expr_seq()?);
        }
        Ok(if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::Choice(exprs)
        })
    }

    fn parse_expr_seq(&mut self) -> Result<Expr, ContentExprError> {
        let mut exprs = Vec::new();
        loop {
            exprs.push(self.parse_expr_subscript()?);
            match self.next() {
                None | Some(")") | Some("|") => break,
                Some(_) => {}
            }
        }
        Ok(if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::Seq(exprs)
        })
    }

    fn parse_expr_subscript(&mut self) -> Result<Expr, ContentExprError> {
        let mut expr = self.parse_expr_atom()?;
        loop {
            if self.eat("+") {
                expr = Expr::Plus(Box::new(expr));
            } else if self.eat("*") {
                expr = Expr::Star(Box::new(expr));
            } else if self.eat("?") {
                expr = Expr::Opt(Box::new(expr));
            } else if self.eat("{") {
                expr = self.parse_expr_range(expr)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_num(&mut self) -> Result<usize, ContentExprError> {
        let tok = self.next().unwrap_or("end of input");
        let num = tok
            .parse::<usize>()
            .map_err(|_| ContentExprError::ExpectedNumber {
                token: tok.to_owned(),
                expr: self.expr.to_owned(),
            })?;
        self.pos += 1;
        Ok(num)
    }

    fn parse_expr_range(&mut self, expr: Expr) -> Result<Expr, ContentExprError> {
        let min = self.parse_num()?;
        let mut max = Some(min);
        if self.eat(",") {
            max = if self.next() != Some("}") {
                Some(self.parse_num()?)
            } else {
                None
            };
        }
        if !self.eat("}") {
            return Err(ContentExprError::UnclosedBrace(self.expr.to_owned()));
        }
        Ok(Expr::Range {
            min,
            max,
            expr: Box::new(expr),
        })
    }

    fn resolve_name(&self, name: &str) -> Result<Vec<usize>, ContentExprError> {
        if let Some(id) = self.types.iter().position(|t| t.name == name) {
            return Ok(vec![id]);
        }
        let group: Vec<usize> = self
            .types
            .iter()
            .enumerate()
            .filter(|(_, t)| t.groups.contains(&name))
            .map(|(id, _)| id)
            .collect();
        if group.is_empty() {
            Err(ContentExprError::UnknownName {
                name: name.to_owned(),
                expr: self.expr.to_owned(),
            })
        } else {
            Ok(group)
        }
    }

    fn parse_expr_atom(&mut self) -> Result<Expr, ContentExprError> {
        if self.eat("(") {
            let expr = self.parse_expr()?;
            if !self.eat(")") {
                return Err(ContentExprError::MissingParen(self.expr.to_owned()));
            }
            return Ok(expr);
        }
        match self.next() {
            Some(tok) if tok.chars().all(is_word) => {
                let ids = self.resolve_name(tok)?;
                for &id in &ids {
                    let inline = self.types[id].inline;
                    match self.inline {
                        None => self.inline = Some(inline),
                        Some(current) if current != inline => {
                            return Err(ContentExprError::MixedContent(self.expr.to_owned()));
                        }
                        Some(_) => {}
                    }
                }
                self.pos += 1;
                let mut exprs: Vec<Expr> = ids.into_iter().map(Expr::Name).collect();
                Ok(if exprs.len() == 1 {
                    exprs.remove(0)
                } else {
                    Expr::Choice(exprs)
                })
            }
            _ => Err(self.unexpected()),
        }
    }
}

const DANGLING: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct NfaEdge {
    term: Option<usize>,
    to: usize,
}

/// The loose ends of a compiled sub-expression, as (node, edge index) pairs
type Outs = Vec<(usize, usize)>;

#[derive(Debug, Default)]
struct Nfa {
    nodes: Vec<Vec<NfaEdge>>,
}

impl Nfa {
    fn build(expr: &Expr) -> Self {
        let mut nfa = Nfa {
            nodes: vec![Vec::new()],
        };
        let outs = nfa.compile(expr, 0);
        let end = nfa.node();
        nfa.connect(&outs, end);
        nfa
    }

    fn node(&mut self) -> usize {
        self.nodes.push(Vec::new());
        self.nodes.len() - 1
    }

    fn edge(&mut self, from: usize, to: Option<usize>, term: Option<usize>) -> (usize, usize) {
        let edges = &mut self.nodes[from];
        edges.push(NfaEdge {
            term,
            to: to.unwrap_or(DANGLING),
        });
        (from, edges.len() - 1)
    }

    fn connect(&mut self, outs: &[(usize, usize)], to: usize) {
        for &(node, edge) in outs {
            self.nodes[node][edge].to = to;
        }
    }

    fn compile(&mut self, expr: &Expr, from: usize) -> Outs {
        match expr {
            Expr::Choice(exprs) => {
                let mut outs = Vec::new();
                for expr in exprs {
                    outs.extend(self.compile(expr, from));
                }
                outs
            }
            Expr::Seq(exprs) => {
                let mut from = from;
                let mut outs = Vec::new();
                for (i, expr) in exprs.iter().enumerate() {
                    outs = self.compile(expr, from);
                    if i + 1 < exprs.len() {
                        from = self.node();
                        self.connect(&outs, from);
                    }
                }
                outs
            }
            Expr::Star(expr) => {
                let lp = self.node();
                self.edge(from, Some(lp), None);
                let outs = self.compile(expr, lp);
                self.connect(&outs, lp);
                vec![self.edge(lp, None, None)]
            }
            Expr::Plus(expr) => {
                let lp = self.node();
                let outs = self.compile(expr, from);
                self.connect(&outs, lp);
                let outs = self.compile(expr, lp);
                self.connect(&outs, lp);
                vec![self.edge(lp, None, None)]
            }
            Expr::Opt(expr) => {
                let mut outs = vec![self.edge(from, None, None)];
                outs.extend(self.compile(expr, from));
                outs
            }
            Expr::Range { min, max, expr } => {
                let mut cur = from;
                for _ in 0..*min {
                    let next = self.node();
                    let outs = self.compile(expr, cur);
                    self.connect(&outs, next);
                    cur = next;
                }
                match max {
                    None => {
                        let outs = self.compile(expr, cur);
                        self.connect(&outs, cur);
                    }
                    Some(max) => {
                        for _ in *min..*max {
                            let next = self.node();
                            self.edge(cur, Some(next), None);
                            let outs = self.compile(expr, cur);
                            self.connect(&outs, next);
                            cur = next;
                        }
                    }
                }
                vec![self.edge(cur, None, None)]
            }
            Expr::Name(id) => vec![self.edge(from, None, Some(*id))],
        }
    }

    /// The set of nodes reachable from `node` through unlabeled edges, sorted descending.
    fn null_from(&self, node: usize) -> Vec<usize> {
        let mut result = Vec::new();
        self.scan(node, &mut result);
        result.sort_unstable_by(|a, b| b.cmp(a));
        result
    }

    fn scan(&self, node: usize, result: &mut Vec<usize>) {
        let edges = &self.nodes[node];
        if let [NfaEdge { term: None, to }] = &edges[..] {
            return self.scan(*to, result);
        }
        result.push(node);
        for edge in edges {
            if edge.term.is_none() && !result.contains(&edge.to) {
                self.scan(edge.to, result);
            }
        }
    }
}

struct Dfa<'a> {
    nfa: &'a Nfa,
    states: &'a mut Vec<MatchState>,
    labeled: HashMap<Vec<usize>, usize>,
}

impl<'a> Dfa<'a> {
    fn explore(&mut self, set: Vec<usize>) -> usize {
        let mut out: Vec<(usize, Vec<usize>)> = Vec::new();
        for &node in &set {
            for edge in &self.nfa.nodes[node] {
                let term = match edge.term {
                    Some(term) => term,
                    None => continue,
                };
                let idx = match out.iter().position(|(t, _)| *t == term) {
                    Some(idx) => idx,
                    None => {
                        out.push((term, Vec::new()));
                        out.len() - 1
                    }
                };
                for n in self.nfa.null_from(edge.to) {
                    if !out[idx].1.contains(&n) {
                        out[idx].1.push(n);
                    }
                }
            }
        }

        let id = self.states.len();
        let end = self.nfa.nodes.len() - 1;
        self.states.push(MatchState {
            valid_end: set.contains(&end),
            next: Vec::new(),
        });
        self.labeled.insert(set, id);

        let mut next = Vec::with_capacity(out.len());
        for (term, mut targets) in out {
            targets.sort_unstable_by(|a, b| b.cmp(a));
            let target = match self.labeled.get(&targets) {
                Some(&state) => state,
                None => self.explore(targets),
            };
            next.push((term, target));
        }
        self.states[id].next = next;
        id
    }
}

fn check_for_dead_ends(
    states: &[MatchState],
    start: usize,
    types: &[TypeInfo],
    expr: &str,
) -> Result<(), ContentExprError> {
    let mut work = vec![start];
    let mut i = 0;
    while i < work.len() {
        let state = &states[work[i]];
        let mut dead = !state.valid_end;
        let mut nodes = Vec::new();
        for &(id, next) in &state.next {
            nodes.push(types[id].name);
            if dead && types[id].generatable {
                dead = false;
            }
            if !work.contains(&next) {
                work.push(next);
            }
        }
        if dead {
            return Err(ContentExprError::DeadEnd {
                nodes: nodes.join(", "),
                expr: expr.to_owned(),
            });
        }
        i += 1;
    }
    Ok(())
}

/// Compile `expr` against the given node types, appending the new automaton states to
/// `states`. Returns the id of the start state.
pub(crate) fn compile(
    expr: &str,
    types: &[TypeInfo],
    states: &mut Vec<MatchState>,
) -> Result<usize, ContentExprError> {
    let mut stream = TokenStream::new(expr, types);
    if stream.next().is_none() {
        return Ok(EMPTY);
    }
    let parsed = stream.parse_expr()?;
    if stream.next().is_some() {
        return Err(ContentExprError::TrailingText(expr.to_owned()));
    }
    let nfa = Nfa::build(&parsed);
    let first = states.len();
    let start = Dfa {
        nfa: &nfa,
        states: &mut *states,
        labeled: HashMap::new(),
    }
    .explore(nfa.null_from(0));
    trace!(expr, states = states.len() - first, "compiled content expression");
    check_for_dead_ends(states, start, types, expr)?;
    Ok(start)
}
