//! Tree-shaped UI event channel
//!
//! Events carry the scope path of the element subtree they happened in.
//! Isolation here is total: a source narrowed to `/a` observes events
//! at exactly `/a`, never those of `/a/b` (an isolated child) or `/c`
//! (a sibling). Rendered trees carry their namespace on each node, and
//! the sink isolator prepends the component's scope to the root node.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sluice_core::{NarrowableSource, Scoped, ScopedChannel, Stream};
use sluice_types::ScopePath;
use std::fmt::Write;

/// A user interaction inside the rendered tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomEvent {
    pub kind: String,
    pub scope: ScopePath,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub payload: Value,
}

impl DomEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            scope: ScopePath::root(),
            classes: Vec::new(),
            payload: Value::Null,
        }
    }

    /// Place the event at `segments` in the isolation tree
    pub fn at<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = ScopePath::from_segments(segments);
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Queryable view of the UI event space
#[derive(Debug, Clone)]
pub struct DomSource {
    events: Stream<DomEvent>,
    scope: ScopePath,
    selectors: Vec<String>,
}

impl DomSource {
    pub fn new(events: Stream<DomEvent>) -> Self {
        Self {
            events,
            scope: ScopePath::root(),
            selectors: Vec::new(),
        }
    }

    /// Restrict to elements carrying `class`; selections accumulate
    pub fn select(&self, class: impl Into<String>) -> Self {
        let mut selected = self.clone();
        selected.selectors.push(class.into());
        selected
    }

    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }

    /// Events of `kind` visible from this source
    pub fn events(&self, kind: impl Into<String>) -> Stream<DomEvent> {
        let kind = kind.into();
        let scope = self.scope.clone();
        let selectors = self.selectors.clone();
        self.events.filter(move |event| {
            event.kind == kind
                && event.scope == scope
                && selectors.iter().all(|class| event.has_class(class))
        })
    }
}

impl NarrowableSource for DomSource {
    fn narrow(&self, path: &ScopePath) -> Self {
        Self {
            events: self.events.clone(),
            scope: self.scope.join(path),
            selectors: self.selectors.clone(),
        }
    }

    fn scope(&self) -> &ScopePath {
        &self.scope
    }
}

const TEXT_SEL: &str = "#text";

/// A declarative UI tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VNode {
    pub sel: String,
    #[serde(default)]
    pub namespace: ScopePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<VNode>,
}

impl VNode {
    pub fn element(sel: impl Into<String>) -> Self {
        Self {
            sel: sel.into(),
            namespace: ScopePath::root(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            sel: TEXT_SEL.to_string(),
            namespace: ScopePath::root(),
            text: Some(text.into()),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: VNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn is_text(&self) -> bool {
        self.sel == TEXT_SEL
    }

    /// Every node paired with its full scope path, in document order
    ///
    /// A node's full path is its ancestors' namespaces followed by its
    /// own, which is the scope a renderer attributes it to.
    pub fn scoped_nodes(&self) -> Vec<(ScopePath, &VNode)> {
        let mut nodes = Vec::new();
        self.collect_scoped(&ScopePath::root(), &mut nodes);
        nodes
    }

    fn collect_scoped<'a>(&'a self, parent: &ScopePath, out: &mut Vec<(ScopePath, &'a VNode)>) {
        let path = parent.join(&self.namespace);
        out.push((path.clone(), self));
        for child in &self.children {
            child.collect_scoped(&path, out);
        }
    }

    /// Indented dump of the tree, one node per line
    ///
    /// Nodes that open a namespace show their full scope path.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(&ScopePath::root(), 0, &mut out);
        out
    }

    fn write_outline(&self, parent: &ScopePath, depth: usize, out: &mut String) {
        let path = parent.join(&self.namespace);
        let indent = "  ".repeat(depth);
        match &self.text {
            Some(text) if self.is_text() => {
                let _ = writeln!(out, "{}{:?}", indent, text);
            }
            _ if self.namespace.is_root() => {
                let _ = writeln!(out, "{}{}", indent, self.sel);
            }
            _ => {
                let _ = writeln!(out, "{}{} @{}", indent, self.sel, path);
            }
        }
        for child in &self.children {
            child.write_outline(&path, depth + 1, out);
        }
    }
}

impl Scoped for VNode {
    fn tag(mut self, path: &ScopePath) -> Self {
        self.namespace = path.join(&self.namespace);
        self
    }

    fn untag(mut self) -> Self {
        self.namespace = ScopePath::root();
        self
    }

    fn scope(&self) -> &ScopePath {
        &self.namespace
    }
}

/// Isolation pair for the `DOM` channel
pub type DomChannel = ScopedChannel<DomSource, VNode>;
