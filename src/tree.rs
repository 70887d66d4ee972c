//! Length-only syntax tree nodes with child lists, fragment merging, and a
//! small typed property bag.

use smallvec::SmallVec;

use crate::attributes::AttributeDescriptor;
use crate::piece_table::PieceTable;

/// Identifies the syntactic kind of a [`Node`]. Grammars mint their own
/// values; `0` is reserved for the fragment sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeType(pub u32);

impl NodeType {
    /// A transient node whose identity dissolves on append: its children
    /// graft directly onto the receiving parent instead of nesting.
    pub const DOCUMENT_FRAGMENT: NodeType = NodeType(0);

    pub const fn is_fragment(self) -> bool {
        self.0 == 0
    }
}

/// A small key for grammar-attached metadata (`SetProp`). Opaque to the
/// core; grammars assign their own numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(pub u32);

/// The closed set of value shapes a grammar may attach under a [`Key`].
/// Not a fully dynamic `Any` map: `spec.md` §9 asks for a typed side-table
/// rather than dynamic keying, and in practice grammar metadata only ever
/// needs these shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Text(String),
}

type PropMap = SmallVec<[(Key, Value); 4]>;

/// Internal cache used only by the formatter driver (component H); kept
/// out of the generic `props` bag per `spec.md` §9's design note singling
/// out exactly these three cached values.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FormatCache {
    pub descriptor: Option<AttributeDescriptor>,
    pub replacement_units: Option<Option<Vec<u16>>>,
    pub visible_delta: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub node_type: NodeType,
    pub length: u32,
    pub children: Vec<Node>,
    props: PropMap,
    pub(crate) format_cache: FormatCache,
}

impl Node {
    pub fn leaf(node_type: NodeType, length: u32) -> Self {
        Node {
            node_type,
            length,
            children: Vec::new(),
            props: SmallVec::new(),
            format_cache: FormatCache::default(),
        }
    }

    pub fn with_children(node_type: NodeType, children: Vec<Node>) -> Self {
        let length = children.iter().map(|c| c.length).sum();
        Node {
            node_type,
            length,
            children,
            props: SmallVec::new(),
            format_cache: FormatCache::default(),
        }
    }

    pub fn fragment(children: Vec<Node>) -> Self {
        Self::with_children(NodeType::DOCUMENT_FRAGMENT, children)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn set_prop(&mut self, key: Key, value: Value) {
        if let Some(slot) = self.props.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.props.push((key, value));
        }
    }

    pub fn prop(&self, key: Key) -> Option<&Value> {
        self.props.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Appends `child` following the §4.D policy: fragments dissolve (their
    /// children transfer one by one, recursively, since a fragment's own
    /// children may themselves be fragments produced by nested `InOrder`s),
    /// and two adjacent childless siblings of the same type coalesce by
    /// length addition rather than growing the child list.
    pub fn append_child(&mut self, child: Node) {
        if child.node_type.is_fragment() {
            for grandchild in child.children {
                self.append_child(grandchild);
            }
            return;
        }
        if child.is_leaf() {
            if let Some(last) = self.children.last_mut() {
                if last.is_leaf() && last.node_type == child.node_type {
                    last.length += child.length;
                    self.length += child.length;
                    return;
                }
            }
        }
        self.length += child.length;
        self.children.push(child);
    }

    pub fn append_children(&mut self, children: Vec<Node>) {
        for child in children {
            self.append_child(child);
        }
    }

    /// Compact S-expression projection, e.g. `(document (header (delimiter text)))`.
    pub fn to_sexp(&self, names: &dyn Fn(NodeType) -> &'static str) -> String {
        let mut out = String::new();
        self.write_sexp(names, &mut out);
        out
    }

    fn write_sexp(&self, names: &dyn Fn(NodeType) -> &'static str, out: &mut String) {
        if self.children.is_empty() {
            out.push_str(names(self.node_type));
            return;
        }
        out.push('(');
        out.push_str(names(self.node_type));
        for child in &self.children {
            out.push(' ');
            child.write_sexp(names, out);
        }
        out.push(')');
    }

    /// One line per node, indented by depth, showing type, length and (for
    /// leaves) the underlying raw text.
    pub fn dump(&self, buf: &PieceTable, names: &dyn Fn(NodeType) -> &'static str) -> String {
        let mut out = String::new();
        self.write_dump(buf, names, 0, 0, &mut out);
        out
    }

    fn write_dump(
        &self,
        buf: &PieceTable,
        names: &dyn Fn(NodeType) -> &'static str,
        depth: usize,
        start: u32,
        out: &mut String,
    ) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(names(self.node_type));
        out.push_str(&format!(" @{}..{}", start, start + self.length));
        if self.is_leaf() {
            let text = String::from_utf16_lossy(&buf.slice(start..start + self.length));
            out.push_str(&format!(" {text:?}"));
        }
        out.push('\n');
        let mut offset = start;
        for child in &self.children {
            child.write_dump(buf, names, depth + 1, offset, out);
            offset += child.length;
        }
    }
}
