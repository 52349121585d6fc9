use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_128;

/// Opaque, content-addressed fingerprint of a [`SchemaDescriptor`]. The
/// server uses this as the sole identity for a schema: two descriptors
/// hash equal iff they are byte-identical after canonical encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaHash(String);

impl SchemaHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SchemaHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a reserved placeholder type stands in for during migration
/// (spec §4.4): a block-level node, an inline node, an inline leaf, or
/// a mark, depending on where in the tree the foreign type was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaKind {
    BlockBranch,
    InlineBranch,
    InlineLeaf,
    Mark,
}

impl SchemaKind {
    /// The reserved type name the local schema must declare for this
    /// kind of placeholder to be legal.
    pub fn placeholder_type_name(self) -> &'static str {
        match self {
            SchemaKind::BlockBranch => "blockBranch",
            SchemaKind::InlineBranch => "inlineBranch",
            SchemaKind::InlineLeaf => "inlineLeaf",
            SchemaKind::Mark => "markBranch",
        }
    }
}

/// A node type's allowed shape: whether it holds text, its child content
/// expression (in the editor's own grammar -- opaque to this crate, kept
/// as a string so we never need to parse it), and the attribute names it
/// declares (order-independent; sorted before hashing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub content_expr: String,
    pub is_text: bool,
    pub is_leaf: bool,
    /// Whether this node type lives at block level (a direct child of
    /// the document or another block) rather than inline. Used by
    /// schema migration to pick the right placeholder kind (spec
    /// §4.4); content-expression parsing itself stays out of scope,
    /// so this is recorded directly rather than derived.
    pub is_block: bool,
    pub attrs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSpec {
    pub name: String,
    pub attrs: Vec<String>,
}

/// The server-facing description of a schema: node/mark specs plus the
/// top node type. `hash` is derived, never hand-constructed, which is
/// why [`SchemaDescriptor::new`] is the only constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub top_node: String,
    pub nodes: Vec<NodeSpec>,
    pub marks: Vec<MarkSpec>,
    hash: SchemaHash,
}

impl SchemaDescriptor {
    pub fn new(kind: impl Into<String>, top_node: impl Into<String>, mut nodes: Vec<NodeSpec>, mut marks: Vec<MarkSpec>) -> Self {
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        marks.sort_by(|a, b| a.name.cmp(&b.name));
        let kind = kind.into();
        let top_node = top_node.into();
        let hash = compute_hash(&kind, &top_node, &nodes, &marks);
        Self {
            kind,
            top_node,
            nodes,
            marks,
            hash,
        }
    }

    pub fn hash(&self) -> &SchemaHash {
        &self.hash
    }

    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn mark(&self, name: &str) -> Option<&MarkSpec> {
        self.marks.iter().find(|m| m.name == name)
    }

    pub fn declares_placeholder(&self, kind: SchemaKind) -> bool {
        self.node(kind.placeholder_type_name()).is_some()
    }

    pub fn node_index(&self) -> FxHashMap<&str, &NodeSpec> {
        self.nodes.iter().map(|n| (n.name.as_str(), n)).collect()
    }
}

/// Canonical `(type, sorted node specs, sorted mark specs, top-node
/// name)` serialized to JSON and fed to a fast, content-addressed hash.
/// `nodes`/`marks` are pre-sorted by [`SchemaDescriptor::new`], so equal
/// descriptors always produce byte-identical input here.
fn compute_hash(kind: &str, top_node: &str, nodes: &[NodeSpec], marks: &[MarkSpec]) -> SchemaHash {
    #[derive(Serialize)]
    struct Canonical<'a> {
        kind: &'a str,
        top_node: &'a str,
        nodes: &'a [NodeSpec],
        marks: &'a [MarkSpec],
    }

    let canonical = Canonical {
        kind,
        top_node,
        nodes,
        marks,
    };
    let bytes = serde_json::to_vec(&canonical).expect("schema descriptor is always serializable");
    let digest = xxh3_128(&bytes);
    SchemaHash(format!("{digest:032x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            content_expr: "text*".to_string(),
            is_text: false,
            is_leaf: false,
            is_block: true,
            attrs: vec![],
        }
    }

    #[test]
    fn equal_descriptors_hash_equal() {
        let a = SchemaDescriptor::new("doc", "doc", vec![node("p"), node("h")], vec![]);
        let b = SchemaDescriptor::new("doc", "doc", vec![node("h"), node("p")], vec![]);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn different_descriptors_hash_different() {
        let a = SchemaDescriptor::new("doc", "doc", vec![node("p")], vec![]);
        let b = SchemaDescriptor::new("doc", "doc", vec![node("p"), node("h")], vec![]);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn placeholder_type_names_are_distinct() {
        let names = [
            SchemaKind::BlockBranch,
            SchemaKind::InlineBranch,
            SchemaKind::InlineLeaf,
            SchemaKind::Mark,
        ]
        .map(SchemaKind::placeholder_type_name);
        for i in 0..names.len() {
            for j in (i + 1)..names.len() {
                assert_ne!(names[i], names[j]);
            }
        }
    }
}
