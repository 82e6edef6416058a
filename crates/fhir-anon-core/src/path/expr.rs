//! The expression sub-language (part of C4): dotted field navigation,
//! indexing into repeated children, the `nodesByType('typeName')`
//! descendant predicate, and the identity expression.
//!
//! The originating specification leaves the outer bound of this
//! sub-language as an open question; this module implements exactly the
//! forms it names explicitly and nothing more speculative (see
//! DESIGN.md).

use crate::model::{ElementNode, NodePath};

#[derive(Debug, Clone, PartialEq)]
pub enum ExprToken {
    /// A field name, optionally narrowed to one occurrence with `[n]`.
    Field { name: String, index: Option<usize> },
    /// `nodesByType('typeName')`: every descendant of the current node
    /// (not just direct children) whose `instance_type` matches.
    NodesByType(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub tokens: Vec<ExprToken>,
}

impl Expr {
    pub fn identity() -> Self {
        Expr { tokens: Vec::new() }
    }

    pub fn is_identity(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Parses a dotted navigation chain like `name.family`, `name[0].family`,
/// or `nodesByType('Patient').name`.
pub fn parse_expr(text: &str) -> Expr {
    let text = text.trim();
    if text.is_empty() {
        return Expr::identity();
    }

    let mut tokens = Vec::new();
    for raw in split_top_level_dots(text) {
        tokens.push(parse_token(raw.trim()));
    }
    Expr { tokens }
}

fn split_top_level_dots(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut start = 0usize;
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' => in_quotes = !in_quotes,
            b'(' if !in_quotes => depth += 1,
            b')' if !in_quotes => depth -= 1,
            b'.' if !in_quotes && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_token(tok: &str) -> ExprToken {
    if let Some(inner) = tok
        .strip_prefix("nodesByType(")
        .and_then(|s| s.strip_suffix(')'))
    {
        let type_name = inner.trim().trim_matches('\'').trim_matches('"');
        return ExprToken::NodesByType(type_name.to_string());
    }

    if let Some(bracket) = tok.find('[') {
        let name = &tok[..bracket];
        let idx_str = tok[bracket + 1..].trim_end_matches(']');
        let index = idx_str.parse::<usize>().ok();
        return ExprToken::Field {
            name: name.to_string(),
            index,
        };
    }

    ExprToken::Field {
        name: tok.to_string(),
        index: None,
    }
}

/// Evaluates `expr` starting from `(start, start_path)`, returning every
/// matched node's path in document order.
pub fn eval_expr<'a>(
    start: &'a ElementNode,
    start_path: &NodePath,
    expr: &Expr,
) -> Vec<NodePath> {
    let mut current: Vec<(NodePath, &'a ElementNode)> = vec![(start_path.clone(), start)];
    for token in &expr.tokens {
        let mut next: Vec<(NodePath, &'a ElementNode)> = Vec::new();
        for (path, node) in &current {
            match token {
                ExprToken::Field { name, index } => {
                    let matches: Vec<&ElementNode> =
                        node.children.iter().filter(|c| &c.name == name).collect();
                    let occurrences: Vec<usize> = match index {
                        Some(i) => vec![*i],
                        None => (0..matches.len()).collect(),
                    };
                    for occ in occurrences {
                        if let Some(child) = matches.get(occ) {
                            next.push((path.child(name, occ), child));
                        }
                    }
                }
                ExprToken::NodesByType(type_name) => {
                    for (rel_path, descendant) in node.walk() {
                        if descendant.instance_type == *type_name {
                            let mut combined = path.0.clone();
                            combined.extend(rel_path.0);
                            next.push((NodePath(combined), descendant));
                        }
                    }
                }
            }
        }
        current = next;
    }
    current.into_iter().map(|(p, _)| p).collect()
}
