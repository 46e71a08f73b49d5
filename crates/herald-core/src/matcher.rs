//! Depth-first descent of tokens through the command tree.
//!
//! Literal children are tried before parameter children; non-greedy
//! parameters consume one token each and a greedy parameter consumes the
//! rest. Every command the tokens reach is collected. Only commands ending
//! under the same final literal as the first one found are kept, so a literal
//! always shadows a parameter capture. When no branch reaches a command, the
//! failure that advanced furthest through the input is reported, keeping the
//! earliest branch on ties.

use std::sync::Arc;

use crate::error::CommandError;
use crate::execution::Execution;
use crate::path::CommandPath;
use crate::token::Token;
use crate::tree::{CommandNode, CommandTree, NodeId, NodeKind};

/// A command the tokens reach and where its value tokens begin.
#[derive(Debug)]
pub(crate) struct Match<'t> {
    pub(crate) execution: &'t Arc<Execution>,
    pub(crate) position: usize,
    greedy: bool,
}

struct Failure {
    depth: usize,
    error: CommandError,
}

fn furthest(best: Option<Failure>, candidate: Failure) -> Failure {
    match best {
        Some(current) if current.depth >= candidate.depth => current,
        _ => candidate,
    }
}

pub(crate) struct Matcher<'t, 'i> {
    tree: &'t CommandTree,
    tokens: &'i [Token],
    input: &'i str,
}

impl<'t, 'i> Matcher<'t, 'i> {
    pub(crate) const fn new(tree: &'t CommandTree, tokens: &'i [Token], input: &'i str) -> Self {
        Self {
            tree,
            tokens,
            input,
        }
    }

    /// Finds the commands matching the token list, in the order they should
    /// be tried.
    ///
    /// Commands ending in a fixed parameter come before those ending in a
    /// greedy one; within each group lower priorities come first and ties
    /// keep descent order.
    pub(crate) fn find(&self) -> Result<Vec<Match<'t>>, CommandError> {
        let mut found = Vec::new();
        self.descend(NodeId::ROOT, 0, &mut Vec::new(), &mut found)
            .map_err(|failure| failure.error)?;

        let literal = found
            .first()
            .and_then(|first| self.tree.lookup(first.execution.path()));
        let mut candidates: Vec<Match<'t>> = found
            .into_iter()
            .filter(|candidate| self.tree.lookup(candidate.execution.path()) == literal)
            .collect();
        candidates.sort_by_key(|candidate| (candidate.greedy, candidate.execution.priority()));
        Ok(candidates)
    }

    fn descend(
        &self,
        id: NodeId,
        index: usize,
        prefix: &mut Vec<String>,
        found: &mut Vec<Match<'t>>,
    ) -> Result<(), Failure> {
        let Some(node) = self.tree.node(id) else {
            return Err(self.no_such_command(index, prefix));
        };

        let Some(token) = self.tokens.get(index) else {
            let execution = self.exhausted(node, index, prefix)?;
            if !found
                .iter()
                .any(|known| Arc::ptr_eq(known.execution, execution))
            {
                found.push(Match {
                    execution,
                    position: execution.path().len(),
                    greedy: node.is_greedy_parameter(),
                });
            }
            return Ok(());
        };

        let mut best: Option<Failure> = None;
        let mut reached = false;

        if let Some(literal) = node.literal(token.text()) {
            let segment = self
                .tree
                .node(literal)
                .and_then(literal_name)
                .unwrap_or_else(|| token.text().to_owned());
            prefix.push(segment);
            let outcome = self.descend(literal, index + 1, prefix, found);
            prefix.pop();
            match outcome {
                Ok(()) => reached = true,
                Err(failure) => best = Some(furthest(best, failure)),
            }
        }

        for &child in node.parameters() {
            let greedy = self
                .tree
                .node(child)
                .is_some_and(CommandNode::is_greedy_parameter);
            let next = if greedy { self.tokens.len() } else { index + 1 };
            match self.descend(child, next, prefix, found) {
                Ok(()) => reached = true,
                Err(failure) => best = Some(furthest(best, failure)),
            }
        }

        if reached {
            return Ok(());
        }
        let own = node.execution().map_or_else(
            || self.no_such_command(index, prefix),
            |execution| self.too_many_arguments(execution, index),
        );
        Err(furthest(best, own))
    }

    fn exhausted(
        &self,
        node: &'t CommandNode,
        index: usize,
        prefix: &[String],
    ) -> Result<&'t Arc<Execution>, Failure> {
        if let Some(execution) = node.execution() {
            return Ok(execution);
        }
        let first_parameter = node
            .parameters()
            .iter()
            .filter_map(|&child| self.tree.node(child))
            .find_map(CommandNode::parameter);
        Err(first_parameter.map_or_else(
            || self.no_such_command(index, prefix),
            |parameter| Failure {
                depth: index,
                error: CommandError::not_enough_arguments(parameter.name()),
            },
        ))
    }

    fn too_many_arguments(&self, execution: &Execution, index: usize) -> Failure {
        let surplus = self
            .tokens
            .get(index..)
            .unwrap_or_default()
            .iter()
            .map(|token| token.text().to_owned())
            .collect();
        Failure {
            depth: index,
            error: CommandError::too_many_arguments(execution.usage(), surplus),
        }
    }

    fn no_such_command(&self, index: usize, prefix: &[String]) -> Failure {
        Failure {
            depth: index,
            error: CommandError::no_such_command(
                self.input.trim(),
                CommandPath::new(prefix.iter().cloned()),
            ),
        }
    }
}

fn literal_name(node: &CommandNode) -> Option<String> {
    match node.kind() {
        NodeKind::Literal { name, .. } => Some(name.clone()),
        NodeKind::Root | NodeKind::Parameter(_) => None,
    }
}
