use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::arch::Value;

/// Handle to a node owned by a [DependencyGraph].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// How a node was computed: an operator label over ordered source nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    label: String,
    sources: Vec<NodeId>,
}

impl Derivation {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    id: NodeId,
    name: String,
    value: Value,
    constant: bool,
    special: bool,
    derivation: Option<Derivation>,
}

impl DependencyNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Name of the operand the node was recorded for. Constants are named `%value`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the operand value once the node was recorded.
    pub fn value(&self) -> Value {
        self.value
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn is_special(&self) -> bool {
        self.special
    }

    /// `None` for leaves.
    pub fn derivation(&self) -> Option<&Derivation> {
        self.derivation.as_ref()
    }

    pub fn sources(&self) -> &[NodeId] {
        self.derivation
            .as_ref()
            .map(Derivation::sources)
            .unwrap_or_default()
    }

    /// Shallow structural description: the value of a constant, the label of a derived node or
    /// otherwise the name of the leaf.
    pub fn shape(&self) -> String {
        match &self.derivation {
            _ if self.constant => format!("%{}", self.value),
            Some(derivation) => derivation.label.clone(),
            None => self.name.clone(),
        }
    }
}

impl std::fmt::Display for DependencyNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.constant {
            write!(f, "%{}", self.value)
        } else {
            write!(f, "{}={}", self.name, self.value)
        }
    }
}

impl depgraph::DependencyEntry for DependencyNode {
    fn key(&self) -> usize {
        self.id.0
    }

    fn name(&self) -> String {
        self.to_string()
    }

    fn is_constant(&self) -> bool {
        self.constant
    }

    fn is_special(&self) -> bool {
        self.special
    }
}

/// A source of a link as captured before the instruction took effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSource {
    /// Name of the operand the source was read from.
    pub operand: String,
    pub node: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum SourceIdentity {
    /// The exact node. Nodes are hash-consed so this covers the whole derivation history.
    Node(NodeId),
    /// A source read from the operand being derived. Only its value and shape take part so that
    /// loop-carried chains converge.
    Carried { value: Value, shape: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct SourceSignature {
    operand: String,
    identity: SourceIdentity,
}

/// Identity of a derived node. Two derivations recorded in the same branch context, with the same
/// label, the same sources and the same resulting value are the same node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LinkSignature {
    context: String,
    label: String,
    sources: Vec<SourceSignature>,
    value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LeafSignature {
    name: String,
    value: Value,
    special: bool,
}

/// Arena of dependency nodes. Nodes are never removed; structurally identical nodes are shared.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
    constants: HashMap<Value, NodeId>,
    leaves: HashMap<LeafSignature, NodeId>,
    links: HashMap<LinkSignature, NodeId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn node(&self, id: NodeId) -> &DependencyNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&DependencyNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes carrying a derivation.
    pub fn link_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.derivation.is_some())
            .count()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.constants.clear();
        self.leaves.clear();
        self.links.clear();
    }

    fn push(
        &mut self,
        name: String,
        value: Value,
        constant: bool,
        special: bool,
        derivation: Option<Derivation>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(DependencyNode {
            id,
            name,
            value,
            constant,
            special,
            derivation,
        });
        id
    }

    /// The shared node for a constant value.
    pub fn constant(&mut self, value: Value) -> NodeId {
        if let Some(&id) = self.constants.get(&value) {
            return id;
        }

        let id = self.push(format!("%{value}"), value, true, false, None);
        self.constants.insert(value, id);
        id
    }

    /// A non-constant leaf for an operand with no recorded derivation.
    pub fn leaf(&mut self, name: &str, value: Value, special: bool) -> NodeId {
        let signature = LeafSignature {
            name: name.to_owned(),
            value,
            special,
        };

        if let Some(&id) = self.leaves.get(&signature) {
            return id;
        }

        let id = self.push(name.to_owned(), value, false, special, None);
        self.leaves.insert(signature, id);
        id
    }

    /// The node derived by `label` from `sources` within a branch context. An existing node is
    /// returned when an equivalent derivation was already recorded.
    ///
    /// Sources are compared by node, except those read from the operand being derived which are
    /// compared by value and shape. A derivation without sources always yields a fresh node.
    pub fn link(
        &mut self,
        context: &str,
        name: &str,
        label: &str,
        sources: &[LinkSource],
        value: Value,
    ) -> NodeId {
        let derivation = Derivation {
            label: label.to_owned(),
            sources: sources.iter().map(|source| source.node).collect(),
        };

        if sources.is_empty() {
            let id = self.push(name.to_owned(), value, false, false, Some(derivation));
            trace!(operand = name, label, node = id.0, "fresh node");
            return id;
        }

        let mut signatures = sources
            .iter()
            .map(|source| {
                let node = self.node(source.node);
                let identity = if source.operand == name && !node.constant {
                    SourceIdentity::Carried {
                        value: node.value,
                        shape: node.shape(),
                    }
                } else {
                    SourceIdentity::Node(source.node)
                };

                SourceSignature {
                    operand: source.operand.clone(),
                    identity,
                }
            })
            .collect::<Vec<_>>();
        signatures.sort();

        let signature = LinkSignature {
            context: context.to_owned(),
            label: label.to_owned(),
            sources: signatures,
            value,
        };

        if let Some(&id) = self.links.get(&signature) {
            trace!(operand = name, label, node = id.0, "reused node");
            return id;
        }

        let id = self.push(name.to_owned(), value, false, false, Some(derivation));
        trace!(operand = name, label, node = id.0, "new node");
        self.links.insert(signature, id);
        id
    }

    /// Every node reachable from `roots` in post-order: sources appear before the nodes derived
    /// from them and each node appears once.
    pub fn walk(&self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = roots
            .iter()
            .rev()
            .map(|&root| (root, false))
            .collect::<Vec<_>>();

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }

            if !visited.insert(id) {
                continue;
            }

            stack.push((id, true));
            stack.extend(
                self.node(id)
                    .sources()
                    .iter()
                    .rev()
                    .filter(|source| !visited.contains(*source))
                    .map(|&source| (source, false)),
            );
        }

        order
    }
}
