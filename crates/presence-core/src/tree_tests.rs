use crate::tree::{ident, MemoryTree, NodeId, NodeKind, NodeRepository, Scalar, TreeError, Upsert};

#[test]
fn ident_is_derived_from_key() {
    assert_eq!(ident("70:ee:50:1a:2b:3c"), "70-3aee-3a50-3a1a-3a2b-3a3c");
    assert_eq!(ident("snapshot_local"), "snapshot_local");
    assert_eq!(ident("camera-id"), "camera-2did");
    assert_eq!(ident("Event"), "-45vent");
}

#[test]
fn upsert_leaf_never_duplicates() {
    let mut tree = MemoryTree::default();
    let cat = tree
        .ensure_category(NodeId::ROOT, "cam1", "Front", Some("Camera"))
        .expect("category")
        .id();

    let first = tree
        .upsert_leaf(cat, "status", "status", "on".into(), Some(2))
        .expect("create");
    let second = tree
        .upsert_leaf(cat, "status", "status", "off".into(), Some(2))
        .expect("update");
    let third = tree
        .upsert_leaf(cat, "status", "status", "off".into(), Some(2))
        .expect("noop");

    assert!(matches!(first, Upsert::Created(_)));
    assert_eq!(second, Upsert::Updated(first.id()));
    assert_eq!(third, Upsert::Unchanged(first.id()));
    assert_eq!(tree.children(cat).len(), 1);
    assert_eq!(tree.len(), 3);
}

#[test]
fn leaf_without_position_keeps_existing_position() {
    let mut tree = MemoryTree::default();
    let id = tree
        .upsert_leaf(NodeId::ROOT, "push_type", "push_type", "movement".into(), Some(4))
        .expect("create")
        .id();

    tree.upsert_leaf(NodeId::ROOT, "push_type", "push_type", "human".into(), None)
        .expect("update");

    let node = tree.get(id).expect("node");
    assert_eq!(
        node.kind,
        NodeKind::Leaf {
            value: "human".into(),
            position: 4
        }
    );
}

#[test]
fn kind_mismatch_is_rejected() {
    let mut tree = MemoryTree::default();
    tree.ensure_category(NodeId::ROOT, "event", "event", None)
        .expect("category");

    let err = tree
        .upsert_leaf(NodeId::ROOT, "event", "event", Scalar::Int(1), None)
        .expect_err("mismatch");

    assert!(matches!(err, TreeError::KindMismatch { .. }));
}

#[test]
fn leaf_cannot_be_a_parent() {
    let mut tree = MemoryTree::default();
    let leaf = tree
        .upsert_leaf(NodeId::ROOT, "x", "x", Scalar::Int(1), None)
        .expect("leaf")
        .id();

    let err = tree
        .ensure_category(leaf, "y", "y", None)
        .expect_err("leaf parent");

    assert!(matches!(err, TreeError::NotACategory(_)));
}

#[test]
fn children_are_ordered_by_position() {
    let mut tree = MemoryTree::default();
    tree.upsert_leaf(NodeId::ROOT, "b", "b", Scalar::Int(1), Some(0))
        .expect("b");
    tree.upsert_leaf(NodeId::ROOT, "a", "a", Scalar::Int(2), Some(1))
        .expect("a");

    let idents: Vec<String> = tree
        .children(NodeId::ROOT)
        .into_iter()
        .filter_map(|id| tree.get(id).map(|n| n.ident.clone()))
        .collect();

    assert_eq!(idents, ["b", "a"]);
}

#[test]
fn persisted_tree_keeps_identity_index() {
    // Arrange
    let path = std::env::temp_dir().join(format!(
        "presence-tests-tree-{}.json",
        std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .expect("unix epoch")
            .as_nanos()
    ));
    let mut tree = MemoryTree::default();
    let cat = tree
        .ensure_category(NodeId::ROOT, "webhook", "Webhook", None)
        .expect("category")
        .id();
    tree.upsert_leaf(cat, "camera_id", "camera_id", "cam1".into(), None)
        .expect("leaf");

    // Act
    tree.save(&path).expect("save");
    let mut loaded = MemoryTree::load(&path).expect("load");
    let again = loaded
        .ensure_category(NodeId::ROOT, "webhook", "Webhook", None)
        .expect("category again");

    // Assert
    assert_eq!(again, Upsert::Unchanged(cat));
    assert_eq!(loaded.len(), tree.len());
    assert_eq!(
        loaded
            .lookup(&["webhook", "camera_id"])
            .map(|n| n.kind.clone()),
        Some(NodeKind::Leaf {
            value: "cam1".into(),
            position: 0
        })
    );

    let _ = std::fs::remove_file(path);
}
