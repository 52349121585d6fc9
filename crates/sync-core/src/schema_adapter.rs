//! Schema negotiation and migration (spec §4.4).

use rustc_hash::FxHashMap;
use serde_json::Value;

use collab_sync_common::{MarkSpec, NodeSpec, SchemaConflict, SchemaDescriptor, SchemaKind};

/// The editor's own schema description, able to produce the
/// server-facing [`SchemaDescriptor`]. A host integration implements
/// this over whatever native schema type its editor runtime uses.
pub trait EditorSchema {
    fn to_descriptor(&self) -> SchemaDescriptor;
}

/// A mark (inline formatting) instance attached to a node, as reported
/// by [`MigratableNode::marks`].
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMark {
    pub name: String,
    pub attrs: FxHashMap<String, Value>,
}

/// A document tree node a host's editor runtime can hand to the
/// migration algorithm and get a migrated one back. `build` is the
/// node's own constructor, so migration never needs to know the
/// concrete node type beyond this trait.
pub trait MigratableNode: Sized + Clone {
    fn type_name(&self) -> &str;
    fn attrs(&self) -> FxHashMap<String, Value>;
    fn children(&self) -> &[Self];
    /// `Some(text)` for a text leaf; text nodes are assumed
    /// schema-compatible across versions and pass through unchanged.
    fn text(&self) -> Option<&str>;
    /// Marks attached to this node (spec §1 "tree-structured document
    /// with marks", §4.4). Nodes without mark support can return `&[]`.
    fn marks(&self) -> &[NodeMark];
    fn build(type_name: &str, attrs: FxHashMap<String, Value>, children: Vec<Self>, text: Option<String>, marks: Vec<NodeMark>) -> Self;
}

/// Migrates `node` (expressed under `old_schema`) to `local_schema`,
/// wrapping anything without a direct counterpart in a reserved
/// placeholder type. Fails with [`SchemaConflict::MigrationFailed`] if
/// a foreign type can't be placed (unknown to `old_schema`, or the
/// local schema doesn't declare the placeholder kind it would need).
pub fn migrate<N: MigratableNode>(node: &N, old_schema: &SchemaDescriptor, local_schema: &SchemaDescriptor) -> Result<N, SchemaConflict> {
    let (kept_marks, unknown_marks) = partition_marks(node.marks(), old_schema, local_schema);

    if let Some(text) = node.text() {
        let built = N::build(node.type_name(), node.attrs(), Vec::new(), Some(text.to_string()), kept_marks);
        return wrap_unknown_marks(built, &unknown_marks, local_schema);
    }

    let old_spec = old_schema.node(node.type_name());

    if let Some(local_spec) = local_schema.node(node.type_name()) {
        let directly_compatible = match old_spec {
            Some(old_spec) => compatible(old_spec, local_spec),
            // Not found in the recorded old schema (shouldn't happen
            // for a well-formed snapshot) but present locally under the
            // same name: accept it rather than failing outright.
            None => true,
        };
        if directly_compatible {
            let children = migrate_children(node, old_schema, local_schema)?;
            let built = N::build(node.type_name(), node.attrs(), children, None, kept_marks);
            return wrap_unknown_marks(built, &unknown_marks, local_schema);
        }
    }

    let old_spec = old_spec.ok_or(SchemaConflict::MigrationFailed)?;
    let kind = placeholder_kind_for(old_spec);
    if !local_schema.declares_placeholder(kind) {
        return Err(SchemaConflict::MigrationFailed);
    }

    let children = migrate_children(node, old_schema, local_schema)?;
    let mut placeholder_attrs = FxHashMap::default();
    placeholder_attrs.insert("name".to_string(), Value::String(node.type_name().to_string()));
    placeholder_attrs.insert(
        "attrs".to_string(),
        serde_json::to_value(node.attrs()).unwrap_or(Value::Null),
    );
    let built = N::build(kind.placeholder_type_name(), placeholder_attrs, children, None, kept_marks);
    wrap_unknown_marks(built, &unknown_marks, local_schema)
}

fn migrate_children<N: MigratableNode>(node: &N, old_schema: &SchemaDescriptor, local_schema: &SchemaDescriptor) -> Result<Vec<N>, SchemaConflict> {
    node.children().iter().map(|child| migrate(child, old_schema, local_schema)).collect()
}

fn compatible(old: &NodeSpec, local: &NodeSpec) -> bool {
    old.content_expr == local.content_expr
        && old.is_text == local.is_text
        && old.is_leaf == local.is_leaf
        && old.is_block == local.is_block
        && old.attrs == local.attrs
}

fn mark_compatible(old: &MarkSpec, local: &MarkSpec) -> bool {
    old.attrs == local.attrs
}

/// Splits a node's marks into ones whose name+attrs still match between
/// `old_schema` and `local_schema` (kept as-is) and ones that don't
/// (wrapped in a [`SchemaKind::Mark`] placeholder by `wrap_unknown_marks`).
fn partition_marks(marks: &[NodeMark], old_schema: &SchemaDescriptor, local_schema: &SchemaDescriptor) -> (Vec<NodeMark>, Vec<NodeMark>) {
    let mut kept = Vec::new();
    let mut unknown = Vec::new();
    for mark in marks {
        let compatible = match old_schema.mark(&mark.name) {
            Some(old_spec) => local_schema.mark(&mark.name).is_some_and(|local_spec| mark_compatible(old_spec, local_spec)),
            // Not recorded under the old schema but present locally
            // under the same name: accept it, mirroring `compatible`'s
            // node-level fallback above.
            None => local_schema.mark(&mark.name).is_some(),
        };
        if compatible {
            kept.push(mark.clone());
        } else {
            unknown.push(mark.clone());
        }
    }
    (kept, unknown)
}

/// Wraps `built` in one [`SchemaKind::Mark`] placeholder node per
/// unknown mark, innermost first, carrying the mark's original name and
/// attrs the same way an unknown node type's are carried (spec §4.4).
fn wrap_unknown_marks<N: MigratableNode>(built: N, unknown: &[NodeMark], local_schema: &SchemaDescriptor) -> Result<N, SchemaConflict> {
    if unknown.is_empty() {
        return Ok(built);
    }
    if !local_schema.declares_placeholder(SchemaKind::Mark) {
        return Err(SchemaConflict::MigrationFailed);
    }
    let mut wrapped = built;
    for mark in unknown {
        let mut placeholder_attrs = FxHashMap::default();
        placeholder_attrs.insert("name".to_string(), Value::String(mark.name.clone()));
        placeholder_attrs.insert("attrs".to_string(), serde_json::to_value(&mark.attrs).unwrap_or(Value::Null));
        wrapped = N::build(SchemaKind::Mark.placeholder_type_name(), placeholder_attrs, vec![wrapped], None, Vec::new());
    }
    Ok(wrapped)
}

fn placeholder_kind_for(old_spec: &NodeSpec) -> SchemaKind {
    if old_spec.is_leaf && !old_spec.is_text {
        SchemaKind::InlineLeaf
    } else if old_spec.is_block {
        SchemaKind::BlockBranch
    } else {
        SchemaKind::InlineBranch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct FakeNode {
        type_name: String,
        attrs: FxHashMap<String, Value>,
        children: Vec<FakeNode>,
        text: Option<String>,
        marks: Vec<NodeMark>,
    }

    impl MigratableNode for FakeNode {
        fn type_name(&self) -> &str {
            &self.type_name
        }
        fn attrs(&self) -> FxHashMap<String, Value> {
            self.attrs.clone()
        }
        fn children(&self) -> &[Self] {
            &self.children
        }
        fn text(&self) -> Option<&str> {
            self.text.as_deref()
        }
        fn marks(&self) -> &[NodeMark] {
            &self.marks
        }
        fn build(type_name: &str, attrs: FxHashMap<String, Value>, children: Vec<Self>, text: Option<String>, marks: Vec<NodeMark>) -> Self {
            FakeNode {
                type_name: type_name.to_string(),
                attrs,
                children,
                text,
                marks,
            }
        }
    }

    fn block(name: &str) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            content_expr: "inline*".to_string(),
            is_text: false,
            is_leaf: false,
            is_block: true,
            attrs: vec![],
        }
    }

    fn mark_spec(name: &str) -> MarkSpec {
        MarkSpec {
            name: name.to_string(),
            attrs: vec![],
        }
    }

    fn leaf_node(name: &str) -> FakeNode {
        FakeNode {
            type_name: name.to_string(),
            attrs: FxHashMap::default(),
            children: vec![],
            text: None,
            marks: vec![],
        }
    }

    /// Scenario 4: server snapshot has `h, p`; local schema only has
    /// `h` plus placeholder types. `p` gets wrapped in `blockBranch`.
    #[test]
    fn incompatible_block_node_gets_wrapped_in_placeholder() {
        let old_schema = SchemaDescriptor::new("doc", "doc", vec![block("h"), block("p")], vec![]);
        let mut placeholder = block("blockBranch");
        placeholder.content_expr = "block*".to_string();
        let local_schema = SchemaDescriptor::new("doc", "doc", vec![block("h"), placeholder], vec![]);

        let foreign_doc = leaf_node("p");
        let migrated = migrate(&foreign_doc, &old_schema, &local_schema).unwrap();
        assert_eq!(migrated.type_name(), "blockBranch");
        assert_eq!(migrated.attrs().get("name"), Some(&Value::String("p".to_string())));
    }

    #[test]
    fn compatible_node_passes_through_unchanged() {
        let old_schema = SchemaDescriptor::new("doc", "doc", vec![block("h")], vec![]);
        let local_schema = SchemaDescriptor::new("doc", "doc", vec![block("h")], vec![]);
        let foreign_doc = leaf_node("h");
        let migrated = migrate(&foreign_doc, &old_schema, &local_schema).unwrap();
        assert_eq!(migrated.type_name(), "h");
    }

    #[test]
    fn missing_placeholder_type_fails_migration() {
        let old_schema = SchemaDescriptor::new("doc", "doc", vec![block("p")], vec![]);
        let local_schema = SchemaDescriptor::new("doc", "doc", vec![block("h")], vec![]);
        let foreign_doc = leaf_node("p");
        let err = migrate(&foreign_doc, &old_schema, &local_schema).unwrap_err();
        assert_eq!(err, SchemaConflict::MigrationFailed);
    }

    #[test]
    fn unknown_mark_gets_wrapped_in_mark_placeholder() {
        let old_schema = SchemaDescriptor::new("doc", "doc", vec![block("h")], vec![mark_spec("highlight")]);
        let mut mark_placeholder = block("markBranch");
        mark_placeholder.is_block = false;
        let local_schema = SchemaDescriptor::new("doc", "doc", vec![block("h"), mark_placeholder], vec![]);

        let mut foreign_doc = leaf_node("h");
        foreign_doc.marks = vec![NodeMark {
            name: "highlight".to_string(),
            attrs: FxHashMap::default(),
        }];

        let migrated = migrate(&foreign_doc, &old_schema, &local_schema).unwrap();
        assert_eq!(migrated.type_name(), "markBranch");
        assert_eq!(migrated.attrs().get("name"), Some(&Value::String("highlight".to_string())));
        assert_eq!(migrated.children().len(), 1);
        assert_eq!(migrated.children()[0].type_name(), "h");
        assert!(migrated.children()[0].marks().is_empty());
    }

    #[test]
    fn known_mark_passes_through_unchanged() {
        let old_schema = SchemaDescriptor::new("doc", "doc", vec![block("h")], vec![mark_spec("bold")]);
        let local_schema = SchemaDescriptor::new("doc", "doc", vec![block("h")], vec![mark_spec("bold")]);

        let mut foreign_doc = leaf_node("h");
        foreign_doc.marks = vec![NodeMark {
            name: "bold".to_string(),
            attrs: FxHashMap::default(),
        }];

        let migrated = migrate(&foreign_doc, &old_schema, &local_schema).unwrap();
        assert_eq!(migrated.type_name(), "h");
        assert_eq!(migrated.marks().len(), 1);
        assert_eq!(migrated.marks()[0].name, "bold");
    }

    #[test]
    fn unknown_mark_without_placeholder_fails_migration() {
        let old_schema = SchemaDescriptor::new("doc", "doc", vec![block("h")], vec![mark_spec("highlight")]);
        let local_schema = SchemaDescriptor::new("doc", "doc", vec![block("h")], vec![]);

        let mut foreign_doc = leaf_node("h");
        foreign_doc.marks = vec![NodeMark {
            name: "highlight".to_string(),
            attrs: FxHashMap::default(),
        }];

        let err = migrate(&foreign_doc, &old_schema, &local_schema).unwrap_err();
        assert_eq!(err, SchemaConflict::MigrationFailed);
    }
}
