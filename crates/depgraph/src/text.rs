//! Flat text rendering, one line per derived entry:
//!
//! ```text
//! A=-4 <= + 1(IN1=-5)
//! PC=2 <= jcc (Y)(%4, A=-4)
//! ```
//!
//! Entries without a derivation record, such as constants and inputs, only appear as dependencies.
//! [parse_line] reads a line back.

use crate::{DependencyEntry, DependencySerializer};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("missing ` <= ` separator in {0:?}")]
    MissingSeparator(String),

    #[error("malformed derivation record {0:?}")]
    MalformedSet(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Default)]
pub struct TextSerializer {
    lines: Vec<String>,
    entry: String,
    sets: Vec<String>,
    label: String,
    deps: Vec<String>,
}

impl TextSerializer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl DependencySerializer for TextSerializer {
    fn add_root(&mut self, _entry: &dyn DependencyEntry) {}

    fn new_entry(&mut self, entry: &dyn DependencyEntry) {
        self.entry = entry.name();
        self.sets.clear();
    }

    fn end_entry(&mut self) {
        if !self.sets.is_empty() {
            self.lines
                .push(format!("{} <= {}", self.entry, self.sets.join(", ")));
        }
    }

    fn new_set(&mut self, label: &str) {
        self.label = label.to_owned();
        self.deps.clear();
    }

    fn end_set(&mut self) {
        self.sets
            .push(format!("{}({})", self.label, self.deps.join(", ")));
    }

    fn add_dep(&mut self, entry: &dyn DependencyEntry) {
        self.deps.push(entry.name());
    }
}

impl std::fmt::Display for TextSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}

/// A derivation record read back from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSet {
    pub label: String,
    pub dependencies: Vec<String>,
}

/// A line read back from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntry {
    pub name: String,
    pub sets: Vec<TextSet>,
}

fn parse_set(text: &str) -> Result<TextSet> {
    let malformed = || Error::MalformedSet(text.to_owned());

    // Labels may themselves contain parentheses, e.g. `jcc (Y)`, but dependency names never do.
    let body = text.strip_suffix(')').ok_or_else(malformed)?;
    let open = body.rfind('(').ok_or_else(malformed)?;
    let (label, dependencies) = (&body[..open], &body[open + 1..]);
    if label.is_empty() {
        return Err(malformed());
    }

    let dependencies = if dependencies.is_empty() {
        Vec::new()
    } else {
        dependencies.split(", ").map(str::to_owned).collect()
    };

    Ok(TextSet {
        label: label.to_owned(),
        dependencies,
    })
}

/// Parse a line produced by [TextSerializer].
pub fn parse_line(line: &str) -> Result<TextEntry> {
    let (name, sets) = line
        .split_once(" <= ")
        .ok_or_else(|| Error::MissingSeparator(line.to_owned()))?;

    let mut parsed = Vec::new();
    let mut remaining = sets;
    while let Some(index) = remaining.find("), ") {
        parsed.push(parse_set(&remaining[..=index])?);
        remaining = &remaining[index + 3..];
    }
    parsed.push(parse_set(remaining)?);

    Ok(TextEntry {
        name: name.to_owned(),
        sets: parsed,
    })
}
