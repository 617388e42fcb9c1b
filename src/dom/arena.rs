//! Arena-based DOM for tolerant page parsing.
//!
//! html5ever parses into this tree; nodes live in one vector and link to
//! each other by index.

use html5ever::{LocalName, QualName};

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaNodeId(pub u32);

impl ArenaNodeId {
    /// Sentinel value for no node.
    pub const NONE: ArenaNodeId = ArenaNodeId(u32::MAX);

    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Node type in the arena DOM.
#[derive(Debug, Clone)]
pub enum ArenaNodeData {
    Document,
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
    },
    Text(String),
    /// Comments, processing instructions and doctypes; kept only so the
    /// tree builder has something to attach.
    Other,
}

/// HTML attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

/// A node in the arena DOM.
#[derive(Debug)]
pub struct ArenaNode {
    pub data: ArenaNodeData,
    pub parent: ArenaNodeId,
    pub first_child: ArenaNodeId,
    pub last_child: ArenaNodeId,
    pub prev_sibling: ArenaNodeId,
    pub next_sibling: ArenaNodeId,
}

impl ArenaNode {
    fn new(data: ArenaNodeData) -> Self {
        Self {
            data,
            parent: ArenaNodeId::NONE,
            first_child: ArenaNodeId::NONE,
            last_child: ArenaNodeId::NONE,
            prev_sibling: ArenaNodeId::NONE,
            next_sibling: ArenaNodeId::NONE,
        }
    }
}

/// Arena-based DOM tree.
pub struct ArenaDom {
    nodes: Vec<ArenaNode>,
    document: ArenaNodeId,
}

impl ArenaDom {
    /// Create a new empty DOM with a document root.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: ArenaNodeId::NONE,
        };
        dom.document = dom.alloc(ArenaNode::new(ArenaNodeData::Document));
        dom
    }

    fn alloc(&mut self, node: ArenaNode) -> ArenaNodeId {
        let id = ArenaNodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn document(&self) -> ArenaNodeId {
        self.document
    }

    pub fn get(&self, id: ArenaNodeId) -> Option<&ArenaNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: ArenaNodeId) -> Option<&mut ArenaNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Element { name, attrs }))
    }

    pub fn create_text(&mut self, text: String) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Text(text)))
    }

    pub fn create_other(&mut self) -> ArenaNodeId {
        self.alloc(ArenaNode::new(ArenaNodeData::Other))
    }

    /// Append a child to a parent node.
    pub fn append(&mut self, parent: ArenaNodeId, child: ArenaNodeId) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(ArenaNodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
            child_node.next_sibling = ArenaNodeId::NONE;
        }

        if let Some(last_node) = self.get_mut(last_child) {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Insert a node before a sibling.
    pub fn insert_before(&mut self, sibling: ArenaNodeId, new_node: ArenaNodeId) {
        let (parent, prev) = match self.get(sibling) {
            Some(n) => (n.parent, n.prev_sibling),
            None => return,
        };

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Append text to an existing text node, or create new if last child isn't text.
    pub fn append_text(&mut self, parent: ArenaNodeId, text: &str) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(ArenaNodeId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let ArenaNodeData::Text(ref mut existing) = last.data
        {
            existing.push_str(text);
            return;
        }

        let text_node = self.create_text(text.to_string());
        self.append(parent, text_node);
    }

    /// Unlink a node from its parent and siblings.
    pub fn detach(&mut self, target: ArenaNodeId) {
        let (parent, prev, next) = match self.get(target) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.first_child = next;
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.last_child = prev;
        }

        if let Some(node) = self.get_mut(target) {
            node.parent = ArenaNodeId::NONE;
            node.prev_sibling = ArenaNodeId::NONE;
            node.next_sibling = ArenaNodeId::NONE;
        }
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: ArenaNodeId) -> Children<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(ArenaNodeId::NONE);
        Children {
            dom: self,
            current: first,
        }
    }

    /// Pre-order, document-order walk of the whole tree.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            dom: self,
            stack: vec![self.document],
        }
    }

    /// First element with the given local name, in document order.
    #[cfg(test)]
    pub fn find_by_tag(&self, tag: &str) -> Option<ArenaNodeId> {
        self.descendants()
            .find(|&id| self.element_name(id).is_some_and(|name| name.as_ref() == tag))
    }

    /// Get element's local name (tag).
    pub fn element_name(&self, id: ArenaNodeId) -> Option<&LocalName> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { name, .. } => Some(&name.local),
            _ => None,
        })
    }

    /// Get an attribute value by local name, ignoring its namespace.
    pub fn get_attr(&self, id: ArenaNodeId, attr_name: &str) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name.local.as_ref() == attr_name)
                .map(|a| a.value.as_str()),
            _ => None,
        })
    }

    /// Get text content of a text node.
    #[cfg(test)]
    pub fn text_content(&self, id: ArenaNodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            ArenaNodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }
}

impl Default for ArenaDom {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the direct children of a node.
pub struct Children<'a> {
    dom: &'a ArenaDom,
    current: ArenaNodeId,
}

impl Iterator for Children<'_> {
    type Item = ArenaNodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .dom
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(ArenaNodeId::NONE);
        Some(id)
    }
}

/// Pre-order iterator over every node reachable from the document root.
pub struct Descendants<'a> {
    dom: &'a ArenaDom,
    stack: Vec<ArenaNodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = ArenaNodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let mut child = self
            .dom
            .get(id)
            .map(|n| n.last_child)
            .unwrap_or(ArenaNodeId::NONE);
        // Push last child first so the first child is visited next
        while let Some(node) = self.dom.get(child) {
            self.stack.push(child);
            child = node.prev_sibling;
        }
        Some(id)
    }
}
