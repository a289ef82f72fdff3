use camino::Utf8Path;
use tree_sitter::{Node, Parser};

use crate::error::{Error, Result};
use crate::tree::{NodeId, Position, SyntaxTree};

/// Type of the synthetic node grouping `->` with a function's return type.
pub const RETURN_ANNOTATION: &str = "return_annotation";

/// A language grammar as seen by the mutation walker.
///
/// Implementations turn source into a [`SyntaxTree`] whose leaves carry the
/// coarse categories the rule table is keyed on (`number`, `string`, `name`,
/// `keyword`, `operator`) and whose composites keep grammar-specific types.
pub trait Frontend {
    /// File extensions this frontend handles, without the dot.
    fn extensions(&self) -> &[&str];

    fn parse(&self, filename: &Utf8Path, source: &str) -> Result<SyntaxTree>;

    /// Subtrees the walker skips entirely.
    fn is_pass_through(&self, tree: &SyntaxTree, node: NodeId) -> bool;

    /// The `->` token. The walker visits none of the siblings after it, so
    /// frontends group it with the annotation it introduces.
    fn is_return_arrow(&self, tree: &SyntaxTree, node: NodeId) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PythonFrontend;

// Token-like nodes that tree-sitter represents with children but that
// mutate as a single value.
const LEAF_KINDS: &[&str] = &["string", "integer", "float"];

// Type annotations and imports are never mutated.
const PASS_THROUGH_KINDS: &[&str] = &[
    "type",
    "import_statement",
    "import_from_statement",
    "future_import_statement",
];

impl Frontend for PythonFrontend {
    fn extensions(&self) -> &[&str] {
        &["py"]
    }

    fn parse(&self, filename: &Utf8Path, source: &str) -> Result<SyntaxTree> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;

        let syntax_error = |line: usize| Error::Syntax {
            filename: filename.to_path_buf(),
            line: line + 1,
            text: source.split('\n').nth(line).unwrap_or_default().to_string(),
        };

        let parsed = parser.parse(source, None).ok_or_else(|| syntax_error(0))?;
        let root = parsed.root_node();
        if root.has_error() {
            let line = first_error(root).map(|n| n.start_position().row).unwrap_or(0);
            return Err(syntax_error(line));
        }

        let mut builder = Builder {
            source,
            tree: SyntaxTree::new("module"),
            cursor: 0,
        };
        let module = builder.tree.root();
        builder.children(root, module);
        let trailing = source.get(builder.cursor..).unwrap_or_default();
        builder.tree.set_suffix(trailing);
        Ok(builder.tree)
    }

    fn is_pass_through(&self, tree: &SyntaxTree, node: NodeId) -> bool {
        PASS_THROUGH_KINDS.contains(&tree.kind(node))
    }

    fn is_return_arrow(&self, tree: &SyntaxTree, node: NodeId) -> bool {
        tree.kind(node) == "operator" && tree.value(node) == Some("->")
    }
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error() || child.is_missing())
        .find_map(first_error)
}

struct Builder<'s> {
    source: &'s str,
    tree: SyntaxTree,
    cursor: usize,
}

impl Builder<'_> {
    fn children(&mut self, node: Node, parent: NodeId) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        let mut i = 0;
        while i < children.len() {
            let child = children[i];
            if child.kind() == "->" {
                let group = self.tree.add_node(parent, RETURN_ANNOTATION, position(child));
                self.visit(child, group);
                if let Some(annotation) = children.get(i + 1) {
                    self.visit(*annotation, group);
                }
                i += 2;
                continue;
            }
            self.visit(child, parent);
            i += 1;
        }
    }

    fn visit(&mut self, node: Node, parent: NodeId) {
        if node.child_count() == 0 || LEAF_KINDS.contains(&node.kind()) {
            self.leaf(node, parent);
        } else {
            let id = self.tree.add_node(parent, node.kind(), position(node));
            self.children(node, id);
        }
    }

    fn leaf(&mut self, node: Node, parent: NodeId) {
        let start = node.start_byte().max(self.cursor);
        let end = node.end_byte().max(start);
        let prefix = self.source.get(self.cursor..start).unwrap_or_default();
        let value = self.source.get(start..end).unwrap_or_default();
        let kind = leaf_category(node, value);
        self.tree.add_leaf(parent, kind, prefix, value, position(node));
        self.cursor = end;
    }
}

fn position(node: Node) -> Position {
    let point = node.start_position();
    Position {
        line: point.row,
        column: point.column,
    }
}

/// Maps a tree-sitter token to the category the rule table understands.
fn leaf_category<'a>(node: Node<'a>, text: &str) -> &'a str {
    match node.kind() {
        "integer" | "float" => "number",
        "string" => "string",
        "identifier" => "name",
        "true" | "false" | "none" => "keyword",
        "break_statement" | "continue_statement" | "pass_statement" => "keyword",
        kind if node.is_named() => kind,
        _ if text.starts_with(|c: char| c.is_alphabetic() || c == '_') => "keyword",
        _ => "operator",
    }
}
