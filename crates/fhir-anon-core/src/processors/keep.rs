//! `keep`: exempts a node and everything beneath it from every other rule.
//! Marks the node's path in the visited set so later rules (and the
//! engine's `meta`-stripping pass) skip it.

use super::{OutcomeKind, ProcessorContext, ProcessorOutput};
use crate::error::AnonymizeError;
use crate::model::{ElementNode, NodePath};

pub struct Keep;

impl super::Processor for Keep {
    fn method_name(&self) -> &'static str {
        "keep"
    }

    fn process(
        &self,
        _node: &mut ElementNode,
        path: &NodePath,
        ctx: &mut ProcessorContext<'_>,
        _settings: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ProcessorOutput, AnonymizeError> {
        ctx.visited.insert(path.clone());
        Ok(ProcessorOutput {
            outcome: Some(OutcomeKind::NoOp),
            ..Default::default()
        })
    }
}
