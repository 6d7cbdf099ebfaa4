//! Rendering of dependency graphs. A dependency graph is walked by its owner in dependency order,
//! so that an entry is only visited after every entry it depends on, and each visited entry is
//! reported to a [DependencySerializer]. Any node representation can be rendered by implementing
//! [DependencyEntry]. See [SimpleEntry] for a minimal implementation.
//!
//! Two renderers are provided:
//!
//! * [text::TextSerializer] writes one line per derived entry: `name <= label(dep, dep)`.
//! * [digraph::DigraphSerializer] writes a Graphviz `digraph`.

pub mod digraph;
pub mod text;

/// A node of a dependency graph as seen by a serializer.
pub trait DependencyEntry {
    /// Identity of the entry. Entries reporting the same key are the same node.
    fn key(&self) -> usize;

    /// Display form of the entry, for example `A=3` or `%3`.
    fn name(&self) -> String;

    /// The entry holds a known constant.
    fn is_constant(&self) -> bool;

    /// The entry originates from outside the architecture, for example an input read.
    fn is_special(&self) -> bool;
}

/// Visitor receiving a dependency graph walk. For every visited entry the walk calls
/// [DependencySerializer::new_entry], then for each derivation record of the entry brackets its
/// dependencies with [DependencySerializer::new_set] and [DependencySerializer::end_set], and
/// finally calls [DependencySerializer::end_entry].
pub trait DependencySerializer {
    /// Mark an entry as a root of the walk. This only affects how the entry is rendered.
    fn add_root(&mut self, entry: &dyn DependencyEntry);

    fn new_entry(&mut self, entry: &dyn DependencyEntry);

    fn end_entry(&mut self);

    /// Start a derivation record with the given operator label.
    fn new_set(&mut self, label: &str);

    fn end_set(&mut self);

    /// Add a dependency to the current derivation record.
    fn add_dep(&mut self, entry: &dyn DependencyEntry);
}

/// The bare minimum entry representation. Useful for driving a serializer directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleEntry {
    pub key: usize,
    pub name: String,
    pub constant: bool,
    pub special: bool,
}

impl SimpleEntry {
    pub fn new(key: usize, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            constant: false,
            special: false,
        }
    }

    pub fn constant(key: usize, value: i64) -> Self {
        Self {
            key,
            name: format!("%{value}"),
            constant: true,
            special: false,
        }
    }
}

impl DependencyEntry for SimpleEntry {
    fn key(&self) -> usize {
        self.key
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_constant(&self) -> bool {
        self.constant
    }

    fn is_special(&self) -> bool {
        self.special
    }
}
