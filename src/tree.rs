//! Arena-backed concrete syntax tree.
//!
//! Every leaf keeps the exact text that precedes it (`prefix`: whitespace,
//! comments, line continuations) so the tree regenerates its source byte for
//! byte. Mutation only ever swaps a leaf value or a node's child list and
//! then writes the original back, so nodes are addressed by index and never
//! shared between subtrees.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Zero-based line and column of a node's first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone)]
pub struct Node {
    kind: String,
    value: Option<String>,
    prefix: String,
    children: Vec<NodeId>,
    start: Position,
}

impl Node {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn is_leaf(&self) -> bool {
        self.value.is_some()
    }
}

/// One entry of a rewritten child list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Reuse an existing child as is.
    Keep(NodeId),
    /// A fresh leaf that exists only while the mutant is rendered.
    Leaf {
        kind: String,
        prefix: String,
        value: String,
    },
}

impl Replacement {
    pub fn leaf(kind: &str, prefix: &str, value: &str) -> Self {
        Replacement::Leaf {
            kind: kind.to_string(),
            prefix: prefix.to_string(),
            value: value.to_string(),
        }
    }

    /// A leaf standing in for `node`, keeping the whitespace in front of it.
    pub fn substitute(tree: &SyntaxTree, node: NodeId, kind: &str, value: &str) -> Self {
        Replacement::leaf(kind, tree.leading_prefix(node), value)
    }
}

#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
    root: NodeId,
    suffix: String,
}

impl SyntaxTree {
    pub fn new(root_kind: &str) -> Self {
        let root = Node {
            kind: root_kind.to_string(),
            value: None,
            prefix: String::new(),
            children: Vec::new(),
            start: Position::default(),
        };
        SyntaxTree {
            nodes: vec![root],
            root: NodeId(0),
            suffix: String::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root_node().children.is_empty()
    }

    fn root_node(&self) -> &Node {
        &self.nodes[self.root.0]
    }

    /// Adds a composite node under `parent`.
    pub fn add_node(&mut self, parent: NodeId, kind: &str, start: Position) -> NodeId {
        let id = self.push(Node {
            kind: kind.to_string(),
            value: None,
            prefix: String::new(),
            children: Vec::new(),
            start,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Adds a leaf under `parent`.
    pub fn add_leaf(
        &mut self,
        parent: NodeId,
        kind: &str,
        prefix: &str,
        value: &str,
        start: Position,
    ) -> NodeId {
        let id = self.push(Node {
            kind: kind.to_string(),
            value: Some(value.to_string()),
            prefix: prefix.to_string(),
            children: Vec::new(),
            start,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Text after the last leaf (usually trailing whitespace).
    pub fn set_suffix(&mut self, suffix: &str) {
        self.suffix = suffix.to_string();
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &str {
        &self.nodes[id.0].kind
    }

    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].value.as_deref()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn start(&self, id: NodeId) -> Position {
        self.nodes[id.0].start
    }

    pub fn first_leaf(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let node = &self.nodes[current.0];
            if node.is_leaf() {
                return Some(current);
            }
            current = *node.children.first()?;
        }
    }

    /// Whitespace and comments in front of the subtree's first token.
    pub fn leading_prefix(&self, id: NodeId) -> &str {
        self.first_leaf(id)
            .map(|leaf| self.nodes[leaf.0].prefix.as_str())
            .unwrap_or("")
    }

    /// Source text of a subtree without its leading prefix.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_subtree(id, &mut out);
        match self.first_leaf(id) {
            Some(leaf) => out.split_off(self.nodes[leaf.0].prefix.len()),
            None => out,
        }
    }

    /// Regenerates the whole source from the root.
    pub fn code(&self) -> String {
        let mut out = String::new();
        self.write_subtree(self.root, &mut out);
        out.push_str(&self.suffix);
        out
    }

    fn write_subtree(&self, id: NodeId, out: &mut String) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let node = &self.nodes[current.0];
            match &node.value {
                Some(value) => {
                    out.push_str(&node.prefix);
                    out.push_str(value);
                }
                None => pending.extend(node.children.iter().rev()),
            }
        }
    }

    /// Swaps a leaf's value, returning the previous one.
    pub(crate) fn replace_value(&mut self, id: NodeId, value: String) -> Option<String> {
        self.nodes[id.0].value.replace(value)
    }

    /// Swaps a node's child list, returning the previous one.
    pub(crate) fn replace_children(&mut self, id: NodeId, children: Vec<NodeId>) -> Vec<NodeId> {
        std::mem::replace(&mut self.nodes[id.0].children, children)
    }

    /// Turns replacements into node ids, allocating fresh leaves at the end
    /// of the arena. Callers drop them again with [`SyntaxTree::truncate`].
    pub(crate) fn materialize(&mut self, replacements: Vec<Replacement>, start: Position) -> Vec<NodeId> {
        replacements
            .into_iter()
            .map(|replacement| match replacement {
                Replacement::Keep(id) => id,
                Replacement::Leaf {
                    kind,
                    prefix,
                    value,
                } => self.push(Node {
                    kind,
                    value: Some(value),
                    prefix,
                    children: Vec::new(),
                    start,
                }),
            })
            .collect()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }
}
