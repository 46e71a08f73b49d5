//! Arena-backed command trie.
//!
//! Literal path segments become literal nodes keyed by their case-folded
//! name; aliases map to the same node. Value parameters become parameter
//! nodes in declaration order below the final literal. An [`Execution`] is
//! attached to every node at which the command may end, so a command with an
//! optional tail is terminal at each admissible arity.
//!
//! Commands sharing a final literal must not accept the same arguments at
//! the same priority; see [`CommandTree::insert`].

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::descriptor::ParameterDescriptor;
use crate::error::RegistrationError;
use crate::execution::{BoundParameter, Execution};
use crate::path::{CommandPath, fold_case};
use crate::permission::Permission;

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node.
    pub const ROOT: Self = Self(0);
}

/// What a node matches.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The tree root; matches nothing.
    Root,
    /// A literal path segment.
    Literal {
        /// Canonical segment name.
        name: String,
        /// Alternative names sharing this node.
        aliases: Vec<String>,
    },
    /// A value parameter.
    Parameter(ParameterDescriptor),
}

/// A node of the command tree.
#[derive(Debug, Clone)]
pub struct CommandNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    literals: BTreeMap<String, NodeId>,
    parameters: Vec<NodeId>,
    execution: Option<Arc<Execution>>,
    permission: Permission,
}

impl CommandNode {
    const fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            literals: BTreeMap::new(),
            parameters: Vec::new(),
            execution: None,
            permission: Permission::Always,
        }
    }

    /// Returns what the node matches.
    #[must_use]
    pub const fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Returns the parent node; `None` for the root.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Finds the literal child matching `text`, ignoring case.
    #[must_use]
    pub fn literal(&self, text: &str) -> Option<NodeId> {
        self.literals.get(&fold_case(text)).copied()
    }

    /// Iterates over literal discriminators and the nodes they lead to.
    ///
    /// Aliases appear as separate discriminators of the same node.
    pub fn literals(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.literals.iter().map(|(key, id)| (key.as_str(), *id))
    }

    /// Returns the parameter children in matching order; a greedy child is
    /// always last.
    #[must_use]
    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    /// Returns the execution ending at this node.
    #[must_use]
    pub const fn execution(&self) -> Option<&Arc<Execution>> {
        self.execution.as_ref()
    }

    /// Returns `true` when a command may end at this node.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.execution.is_some()
    }

    /// Returns the group permission attached to this node.
    #[must_use]
    pub const fn permission(&self) -> &Permission {
        &self.permission
    }

    /// Returns the parameter descriptor of a parameter node.
    #[must_use]
    pub const fn parameter(&self) -> Option<&ParameterDescriptor> {
        match &self.kind {
            NodeKind::Parameter(descriptor) => Some(descriptor),
            NodeKind::Root | NodeKind::Literal { .. } => None,
        }
    }

    pub(crate) fn is_greedy_parameter(&self) -> bool {
        self.parameter().is_some_and(ParameterDescriptor::is_greedy)
    }
}

/// Where a command may end relative to its final literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    /// After exactly this many value tokens.
    Fixed(usize),
    /// Inside a greedy parameter at this depth.
    Greedy(usize),
}

fn endings(execution: &Execution) -> Vec<Ending> {
    let values: Vec<&ParameterDescriptor> = execution
        .value_parameters()
        .map(BoundParameter::descriptor)
        .collect();
    let required = values
        .iter()
        .take_while(|parameter| !parameter.is_optional())
        .count();
    (required..=values.len())
        .map(|depth| {
            let last = depth.checked_sub(1).and_then(|index| values.get(index));
            match last {
                Some(parameter) if parameter.is_greedy() => Ending::Greedy(depth),
                _ => Ending::Fixed(depth),
            }
        })
        .collect()
}

/// The command trie.
#[derive(Debug, Clone)]
pub struct CommandTree {
    nodes: Vec<CommandNode>,
    executions: Vec<Arc<Execution>>,
}

impl Default for CommandTree {
    fn default() -> Self {
        Self {
            nodes: vec![CommandNode::new(NodeKind::Root, None)],
            executions: Vec::new(),
        }
    }
}

impl CommandTree {
    /// Returns the node with `id`.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&CommandNode> {
        self.nodes.get(id.0)
    }

    /// Returns the number of nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when only the root exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Finds the literal node at `path`, following aliases.
    #[must_use]
    pub fn lookup(&self, path: &CommandPath) -> Option<NodeId> {
        path.segments()
            .iter()
            .try_fold(NodeId::ROOT, |current, segment| {
                self.node(current)?.literal(segment)
            })
    }

    /// Iterates over registered executions in registration order.
    pub fn executions(&self) -> impl Iterator<Item = &Arc<Execution>> {
        self.executions.iter()
    }

    /// Collects the group permissions along `path`, outermost first.
    #[must_use]
    pub fn path_permissions(&self, path: &CommandPath) -> Vec<&Permission> {
        let mut permissions = Vec::new();
        let mut current = NodeId::ROOT;
        for segment in path.segments() {
            let Some(next) = self.node(current).and_then(|node| node.literal(segment)) else {
                break;
            };
            if let Some(node) = self.node(next)
                && !node.permission.is_always()
            {
                permissions.push(&node.permission);
            }
            current = next;
        }
        permissions
    }

    /// Inserts `execution`, leaving the tree untouched when it conflicts.
    ///
    /// Besides occupying a node another command already ends at, a command
    /// conflicts with any command of equal priority under the same final
    /// literal that can end at the same depth with the same kind of last
    /// parameter. Differing priorities let both register; the lower value is
    /// tried first.
    pub(crate) fn insert(
        &mut self,
        execution: Execution,
    ) -> Result<Arc<Execution>, RegistrationError> {
        let snapshot = self.clone();
        let shared = Arc::new(execution);
        match self.attach(&shared) {
            Ok(()) => {
                self.executions.push(Arc::clone(&shared));
                Ok(shared)
            }
            Err(error) => {
                *self = snapshot;
                Err(error)
            }
        }
    }

    /// Stacks `permission` onto the literal node at `path`, creating the
    /// literal chain when it does not exist yet.
    pub(crate) fn restrict(
        &mut self,
        path: &CommandPath,
        permission: Permission,
    ) -> Result<(), RegistrationError> {
        if path.is_empty() {
            return Err(RegistrationError::invalid_descriptor(
                path,
                "group permissions need a non-empty path",
            ));
        }
        let (_, literal) = self.insert_literals(path)?;
        let node = self.node_mut(literal, path)?;
        node.permission = std::mem::take(&mut node.permission).and(permission);
        Ok(())
    }

    fn attach(&mut self, execution: &Arc<Execution>) -> Result<(), RegistrationError> {
        let path = execution.path();
        let (parent, literal) = self.insert_literals(path)?;
        self.insert_aliases(parent, literal, path, execution.aliases())?;

        let mut chain = vec![literal];
        let mut current = literal;
        for parameter in execution.value_parameters() {
            current = self.insert_parameter(current, parameter.descriptor(), path)?;
            chain.push(current);
        }

        let required = execution
            .value_parameters()
            .take_while(|parameter| !parameter.descriptor().is_optional())
            .count();
        for node in chain.into_iter().skip(required) {
            self.attach_execution(node, execution)?;
        }
        self.check_ambiguity(literal, execution)
    }

    fn check_ambiguity(
        &self,
        literal: NodeId,
        execution: &Execution,
    ) -> Result<(), RegistrationError> {
        let own = endings(execution);
        let rival = self
            .executions
            .iter()
            .filter(|existing| existing.priority() == execution.priority())
            .filter(|existing| self.lookup(existing.path()) == Some(literal))
            .find(|existing| endings(existing).iter().any(|ending| own.contains(ending)));
        match rival {
            Some(rival) => Err(RegistrationError::conflicting_command(
                execution.path(),
                format!(
                    "'{}' accepts the same arguments at priority {}",
                    rival.usage(),
                    execution.priority()
                ),
            )),
            None => Ok(()),
        }
    }

    fn node_mut(
        &mut self,
        id: NodeId,
        path: &CommandPath,
    ) -> Result<&mut CommandNode, RegistrationError> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| RegistrationError::conflicting_command(path, "tree node is missing"))
    }

    fn push_node(&mut self, kind: NodeKind, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(CommandNode::new(kind, Some(parent)));
        id
    }

    /// Walks or creates the literal chain for `path`, returning the parent of
    /// the final literal and the final literal itself.
    fn insert_literals(
        &mut self,
        path: &CommandPath,
    ) -> Result<(NodeId, NodeId), RegistrationError> {
        let mut parent = NodeId::ROOT;
        let mut current = NodeId::ROOT;
        for segment in path.segments() {
            parent = current;
            current = match self.node(current).and_then(|node| node.literal(segment)) {
                Some(existing) => existing,
                None => {
                    let created = self.push_node(
                        NodeKind::Literal {
                            name: segment.clone(),
                            aliases: Vec::new(),
                        },
                        parent,
                    );
                    self.node_mut(parent, path)?
                        .literals
                        .insert(fold_case(segment), created);
                    created
                }
            };
        }
        Ok((parent, current))
    }

    fn insert_aliases(
        &mut self,
        parent: NodeId,
        literal: NodeId,
        path: &CommandPath,
        aliases: &[String],
    ) -> Result<(), RegistrationError> {
        for alias in aliases {
            let key = fold_case(alias);
            let parent_node = self.node_mut(parent, path)?;
            match parent_node.literals.get(&key) {
                Some(&existing) if existing == literal => continue,
                Some(_) => {
                    return Err(RegistrationError::conflicting_command(
                        path,
                        format!("alias '{alias}' is already a command name"),
                    ));
                }
                None => {
                    parent_node.literals.insert(key, literal);
                }
            }
            if let NodeKind::Literal { aliases: known, .. } =
                &mut self.node_mut(literal, path)?.kind
            {
                known.push(alias.clone());
            }
        }
        Ok(())
    }

    fn insert_parameter(
        &mut self,
        current: NodeId,
        descriptor: &ParameterDescriptor,
        path: &CommandPath,
    ) -> Result<NodeId, RegistrationError> {
        let siblings = self
            .node(current)
            .map(|node| node.parameters.clone())
            .unwrap_or_default();

        for &sibling in &siblings {
            if self
                .node(sibling)
                .and_then(CommandNode::parameter)
                .is_some_and(|existing| existing.has_same_shape(descriptor))
            {
                return Ok(sibling);
            }
        }

        let greedy_sibling = siblings
            .iter()
            .position(|&sibling| self.node(sibling).is_some_and(CommandNode::is_greedy_parameter));
        if descriptor.is_greedy() && greedy_sibling.is_some() {
            return Err(RegistrationError::conflicting_command(
                path,
                format!(
                    "greedy parameter '{}' would share a position with another greedy parameter",
                    descriptor.name()
                ),
            ));
        }

        let created = self.push_node(NodeKind::Parameter(descriptor.clone()), current);
        let parameters = &mut self.node_mut(current, path)?.parameters;
        match greedy_sibling {
            Some(position) if !descriptor.is_greedy() => parameters.insert(position, created),
            _ => parameters.push(created),
        }
        Ok(created)
    }

    fn attach_execution(
        &mut self,
        id: NodeId,
        execution: &Arc<Execution>,
    ) -> Result<(), RegistrationError> {
        let path = execution.path();
        let Some(node) = self.node(id) else {
            return Err(RegistrationError::conflicting_command(path, "tree node is missing"));
        };
        if let Some(existing) = &node.execution {
            return Err(RegistrationError::conflicting_command(
                path,
                format!("'{}' already ends at the same position", existing.usage()),
            ));
        }
        self.node_mut(id, path)?.execution = Some(Arc::clone(execution));
        Ok(())
    }
}
