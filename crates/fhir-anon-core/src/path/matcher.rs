//! Rule-path compilation and matching (C4): the three scoped rule-path
//! dialects plus the bare-expression form, backed by per-resource
//! descendant indexes rebuilt once per resource.

use crate::config::RawRule;
use crate::error::AnonymizeError;
use crate::model::{ElementNode, NodePath, Resource};
use crate::path::expr::{eval_expr, parse_expr, Expr};
use std::collections::HashMap;

/// Which of the three scoped dialects a rule's path string uses, plus the
/// bare fallback. `ResourceType.expr` and `TypeName::expr` /
/// `name::expr` are syntactically distinguished the same way FHIR itself
/// distinguishes them: resource and structure-definition type names are
/// PascalCase, element names are camelCase. A token before a `::` or a
/// root-level `.` is treated as a type name when it starts with an
/// uppercase letter, and as an element name otherwise. This resolves an
/// otherwise-ambiguous grammar; see DESIGN.md.
#[derive(Debug, Clone, PartialEq)]
pub enum PathScope {
    /// `ResourceType.expression` — only applies to a resource whose own
    /// `instance_type` equals `resource_type`; the expression is evaluated
    /// once, against the resource root.
    Resource(String),
    /// `TypeName::expression` — the expression is re-evaluated once per
    /// descendant node whose `instance_type` equals `type_name`.
    Type(String),
    /// `name::expression` — the expression is re-evaluated once per
    /// descendant node whose own field `name` equals `name`.
    Name(String),
    /// A bare expression, evaluated once against the resource root.
    Bare,
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub method: String,
    pub resource_type_filter: Option<String>,
    pub scope: PathScope,
    pub expr: Expr,
    pub settings: serde_json::Map<String, serde_json::Value>,
}

pub fn parse_rule_path(path: &str) -> (PathScope, Expr) {
    if let Some(idx) = path.find("::") {
        let head = &path[..idx];
        let rest = &path[idx + 2..];
        let expr = parse_expr(rest);
        if starts_uppercase(head) {
            return (PathScope::Type(head.to_string()), expr);
        }
        return (PathScope::Name(head.to_string()), expr);
    }

    if let Some(idx) = path.find('.') {
        let head = &path[..idx];
        if starts_uppercase(head) {
            let rest = &path[idx + 1..];
            return (PathScope::Resource(head.to_string()), parse_expr(rest));
        }
    }

    (PathScope::Bare, parse_expr(path))
}

fn starts_uppercase(token: &str) -> bool {
    token.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

pub fn compile_rule(raw: &RawRule) -> Result<CompiledRule, AnonymizeError> {
    if raw.path.trim().is_empty() {
        return Err(AnonymizeError::Configuration(
            "rule path must not be empty".into(),
        ));
    }
    if raw.method.trim().is_empty() {
        return Err(AnonymizeError::Configuration(
            "rule method must not be empty".into(),
        ));
    }
    let (scope, expr) = parse_rule_path(&raw.path);
    Ok(CompiledRule {
        method: raw.method.to_lowercase(),
        resource_type_filter: raw.resource_type.clone(),
        scope,
        expr,
        settings: raw.settings.clone(),
    })
}

/// Descendant indexes rebuilt once per resource: every node keyed by its
/// `instance_type` and, separately, by its own field `name`.
pub struct DescendantIndexes {
    pub by_type: HashMap<String, Vec<NodePath>>,
    pub by_name: HashMap<String, Vec<NodePath>>,
}

impl DescendantIndexes {
    pub fn build(root: &ElementNode) -> Self {
        let mut by_type: HashMap<String, Vec<NodePath>> = HashMap::new();
        let mut by_name: HashMap<String, Vec<NodePath>> = HashMap::new();
        for (path, node) in root.walk() {
            by_type
                .entry(node.instance_type.clone())
                .or_default()
                .push(path.clone());
            by_name.entry(node.name.clone()).or_default().push(path);
        }
        DescendantIndexes { by_type, by_name }
    }
}

/// Matches a compiled rule against a resource, returning matched node
/// paths in deterministic document order.
pub fn match_rule(
    rule: &CompiledRule,
    resource: &Resource,
    indexes: &DescendantIndexes,
) -> Vec<NodePath> {
    if let Some(rt) = &rule.resource_type_filter {
        if resource.instance_type() != rt {
            return Vec::new();
        }
    }

    match &rule.scope {
        PathScope::Resource(rt) => {
            if resource.instance_type() != rt {
                return Vec::new();
            }
            eval_expr(&resource.root, &NodePath::root(), &rule.expr)
        }
        PathScope::Type(type_name) => {
            let starts = indexes.by_type.get(type_name).cloned().unwrap_or_default();
            starts
                .into_iter()
                .flat_map(|path| {
                    let node = resource.root.get(&path).expect("index path must resolve");
                    eval_expr(node, &path, &rule.expr)
                })
                .collect()
        }
        PathScope::Name(name) => {
            let starts = indexes.by_name.get(name).cloned().unwrap_or_default();
            starts
                .into_iter()
                .flat_map(|path| {
                    let node = resource.root.get(&path).expect("index path must resolve");
                    eval_expr(node, &path, &rule.expr)
                })
                .collect()
        }
        PathScope::Bare => eval_expr(&resource.root, &NodePath::root(), &rule.expr),
    }
}
