//! DOM snapshots
//!
//! A snapshot is the element tree of a page at the moment of an interaction.
//! Elements are identified by their child-index path from the document root,
//! which is enough to walk to any element and to its parent.
//!
//! On the wire a snapshot is a flat list of elements in document order, each
//! naming its parent's index, so page depth never turns into JSON nesting.

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One element of a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomNode {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<DomNode>,
}

impl DomNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            ..Default::default()
        }
    }

    /// Lowercase tag name
    pub fn tag_name(&self) -> String {
        self.tag.to_lowercase()
    }

    /// Attribute value, treating an empty value as absent
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Class names in document order
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .get("class")
            .map(String::as_str)
            .unwrap_or_default()
            .split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }
}

/// Child-index path from the document root element to an element.
/// The empty path is the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn parent(&self) -> Option<NodePath> {
        match self.0.split_last() {
            Some((_, rest)) => Some(NodePath(rest.to_vec())),
            None => None,
        }
    }

    /// 0-based position among the parent's children
    pub fn position(&self) -> Option<usize> {
        self.0.last().copied()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for NodePath {
    type Err = anyhow::Error;

    /// Parse a comma-separated path such as `1,0,2`. An empty string is the root.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::root());
        }
        let indices = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid path segment '{}'", part))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(indices))
    }
}

/// One element of the flat wire form of a [`Document`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Index of the parent entry; only the first entry has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
}

/// A whole-document snapshot rooted at the `<html>` element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SnapshotEntry>", into = "Vec<SnapshotEntry>")]
pub struct Document {
    root: DomNode,
}

impl TryFrom<Vec<SnapshotEntry>> for Document {
    type Error = anyhow::Error;

    /// Rebuild the tree. Entries must come after their parent; siblings keep
    /// their relative order.
    fn try_from(entries: Vec<SnapshotEntry>) -> Result<Self> {
        if entries.is_empty() {
            anyhow::bail!("Snapshot does not contain any element");
        }

        let mut parents = Vec::with_capacity(entries.len());
        let mut slots = Vec::with_capacity(entries.len());
        for (i, entry) in entries.into_iter().enumerate() {
            match entry.parent {
                None if i == 0 => {}
                Some(p) if p < i => {}
                None => anyhow::bail!("Snapshot element {} has no parent", i),
                Some(p) => anyhow::bail!("Snapshot element {} comes before its parent {}", i, p),
            }
            parents.push(entry.parent);
            slots.push(Some(DomNode {
                tag: entry.tag.to_lowercase(),
                attributes: entry.attributes,
                children: Vec::new(),
            }));
        }

        // Walking backwards, every child is complete before its parent is
        // moved; children are collected in reverse and flipped once
        for i in (1..slots.len()).rev() {
            let Some(mut node) = slots[i].take() else {
                continue;
            };
            node.children.reverse();
            if let Some(parent) = parents[i].and_then(|p| slots[p].as_mut()) {
                parent.children.push(node);
            }
        }

        let mut root = slots
            .into_iter()
            .next()
            .flatten()
            .context("Snapshot root is missing")?;
        root.children.reverse();
        Ok(Self::new(root))
    }
}

impl From<Document> for Vec<SnapshotEntry> {
    fn from(document: Document) -> Self {
        let mut entries = Vec::new();
        let mut stack = vec![(document.root, None)];
        while let Some((node, parent)) = stack.pop() {
            let index = entries.len();
            entries.push(SnapshotEntry {
                tag: node.tag,
                attributes: node.attributes,
                parent,
            });
            stack.extend(node.children.into_iter().rev().map(|child| (child, Some(index))));
        }
        entries
    }
}

impl Document {
    pub fn new(root: DomNode) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &DomNode {
        &self.root
    }

    /// Resolve a path to an element
    pub fn node(&self, path: &NodePath) -> Option<&DomNode> {
        path.indices()
            .iter()
            .try_fold(&self.root, |node, &i| node.children.get(i))
    }

    /// Number of elements in the document matching `predicate`
    pub fn count(&self, predicate: impl Fn(&DomNode) -> bool) -> usize {
        let mut count = 0;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if predicate(node) {
                count += 1;
            }
            stack.extend(node.children.iter());
        }
        count
    }

    /// Build a snapshot from well-formed (X)HTML markup.
    /// Text content, comments and processing instructions are ignored.
    pub fn from_markup(markup: &str) -> Result<Self> {
        let mut reader = Reader::from_str(markup);
        reader.trim_text(true);

        let mut stack: Vec<DomNode> = Vec::new();
        let mut root: Option<DomNode> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    stack.push(element_from(e)?);
                }
                Ok(Event::Empty(ref e)) => {
                    let node = element_from(e)?;
                    attach(&mut stack, &mut root, node);
                }
                Ok(Event::End(_)) => {
                    if let Some(node) = stack.pop() {
                        attach(&mut stack, &mut root, node);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Malformed markup at byte {}", reader.buffer_position())
                    })
                }
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            anyhow::bail!("Markup ended with {} unclosed element(s)", stack.len());
        }

        root.map(Self::new)
            .context("Markup does not contain any element")
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<DomNode> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).to_lowercase();
    let mut node = DomNode::new(&tag);

    for attr in start.attributes() {
        let attr = attr.context("Malformed attribute")?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_lowercase();
        let value = attr
            .unescape_value()
            .with_context(|| format!("Malformed value for attribute '{}'", key))?;
        node.attributes.insert(key, value.into_owned());
    }

    Ok(node)
}

/// Attach a finished element to its parent, or make it the root.
/// Only the first top-level element becomes the root.
fn attach(stack: &mut [DomNode], root: &mut Option<DomNode>, node: DomNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}
