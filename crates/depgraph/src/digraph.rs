//! Graphviz rendering of a dependency graph.
//!
//! Every entry becomes a node statement and every dependency an edge from the dependent entry to
//! the dependency. A derivation record over a single dependency is drawn as a labelled edge. A
//! record over several dependencies is drawn through a filled join node carrying the operator
//! label, and an entry with several records first fans out through a filled `phi` node. Repeated
//! statements are emitted once.

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;

use crate::{DependencyEntry, DependencySerializer};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Shape {
    Circle,
    Box,
    Ellipse,
}

impl Shape {
    fn of(entry: &dyn DependencyEntry) -> Self {
        if entry.is_constant() || entry.is_special() {
            Shape::Box
        } else {
            Shape::Ellipse
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Shape::Circle => "circle",
            Shape::Box => "box",
            Shape::Ellipse => "ellipse",
        }
    }
}

#[derive(Debug)]
struct Node {
    id: usize,
    name: String,
    shape: Shape,
}

#[derive(Debug)]
struct Set {
    label: String,
    dependencies: Vec<usize>,
}

type LabelFilter = Box<dyn Fn(&str) -> String>;

pub struct DigraphSerializer {
    label_filter: LabelFilter,
    nodes: IndexMap<usize, Node>,
    sets: IndexMap<usize, Vec<Set>>,
    roots: HashSet<usize>,
    current: Option<usize>,
}

impl Default for DigraphSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl DigraphSerializer {
    pub fn new() -> Self {
        Self::with_label_filter(str::to_owned)
    }

    /// Rewrite every node label before it is written, for example to give input values symbolic
    /// names.
    pub fn with_label_filter(filter: impl Fn(&str) -> String + 'static) -> Self {
        Self {
            label_filter: Box::new(filter),
            nodes: Default::default(),
            sets: Default::default(),
            roots: Default::default(),
            current: None,
        }
    }

    fn insert_node(&mut self, entry: &dyn DependencyEntry) -> usize {
        let next_id = self.nodes.len();
        self.nodes
            .entry(entry.key())
            .or_insert_with(|| Node {
                id: next_id,
                name: entry.name(),
                shape: Shape::of(entry),
            })
            .id
    }

    fn node_statement(&self, id: usize, name: &str, shape: Shape, style: &str) -> String {
        let label = (self.label_filter)(name).replace('"', "\\\"");
        format!(
            "ID_{id} [label=\"{label}\" shape={shape} style={style}];",
            shape = shape.as_str()
        )
    }

    fn edge_statement(source: usize, target: usize, label: Option<&str>) -> String {
        match label {
            Some(label) => format!(
                "ID_{source} -> ID_{target} [label=\"{label}\"];",
                label = label.replace('"', "\\\"")
            ),
            None => format!("ID_{source} -> ID_{target};"),
        }
    }

    fn render_lines(&self) -> Vec<String> {
        let mut lines = vec!["digraph {".to_owned()];
        for (key, node) in &self.nodes {
            let style = if self.roots.contains(key) {
                "\"bold,filled\""
            } else {
                "solid"
            };
            lines.push(self.node_statement(node.id, &node.name, node.shape, style));
        }

        // Join nodes are numbered after all entries
        let mut next_id = self.nodes.len();
        let mut join = |lines: &mut Vec<String>, label: &str| {
            let id = next_id;
            next_id += 1;
            lines.push(self.node_statement(id, label, Shape::Circle, "filled"));
            id
        };

        for (key, sets) in &self.sets {
            let mut source = self.nodes[key].id;
            if sets.len() > 1 {
                let phi = join(&mut lines, "phi");
                lines.push(Self::edge_statement(source, phi, None));
                source = phi;
            }

            for set in sets {
                let dependencies = set
                    .dependencies
                    .iter()
                    .map(|dependency| self.nodes[dependency].id);
                if let [dependency] = set.dependencies.as_slice() {
                    let target = self.nodes[dependency].id;
                    lines.push(Self::edge_statement(source, target, Some(&set.label)));
                } else {
                    let symbol = join(&mut lines, &set.label);
                    lines.push(Self::edge_statement(source, symbol, None));
                    for target in dependencies {
                        lines.push(Self::edge_statement(symbol, target, None));
                    }
                }
            }
        }
        lines.push("}".to_owned());

        let mut emitted = HashSet::new();
        lines.retain(|line| emitted.insert(line.clone()));
        lines
    }

    /// Write the rendered graph to a file.
    pub fn write(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, self.to_string())
    }
}

impl DependencySerializer for DigraphSerializer {
    fn add_root(&mut self, entry: &dyn DependencyEntry) {
        self.roots.insert(entry.key());
    }

    fn new_entry(&mut self, entry: &dyn DependencyEntry) {
        self.insert_node(entry);
        self.sets.insert(entry.key(), Vec::new());
        self.current = Some(entry.key());
    }

    fn end_entry(&mut self) {
        self.current = None;
    }

    fn new_set(&mut self, label: &str) {
        if let Some(sets) = self.current.and_then(|key| self.sets.get_mut(&key)) {
            sets.push(Set {
                label: label.to_owned(),
                dependencies: Vec::new(),
            });
        }
    }

    fn end_set(&mut self) {}

    fn add_dep(&mut self, entry: &dyn DependencyEntry) {
        self.insert_node(entry);
        if let Some(set) = self
            .current
            .and_then(|key| self.sets.get_mut(&key))
            .and_then(|sets| sets.last_mut())
        {
            set.dependencies.push(entry.key());
        }
    }
}

impl std::fmt::Display for DigraphSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render_lines().join("\n"))
    }
}
