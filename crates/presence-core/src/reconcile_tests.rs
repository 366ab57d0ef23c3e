use crate::camera::CameraRecord;
use crate::cloud::CloudCamera;
use crate::payload::Payload;
use crate::reconcile::{reconcile_poll, reconcile_webhook, IMAGE_IDENT};
use crate::tree::{ident, ImageResource, MemoryTree, NodeKind, NodeRepository, Scalar};

const TOKEN: &str = "abcdefabcdefabcdefabcdefabcdef12";

fn front_camera() -> CameraRecord {
    CameraRecord::from_cloud(
        CloudCamera {
            id: "cam1".to_string(),
            name: "Front".to_string(),
            kind: "NOC".to_string(),
            status: "on".to_string(),
            sd_status: "on".to_string(),
            alim_status: "on".to_string(),
            light_mode_status: "auto".to_string(),
            is_local: true,
            snapshot: format!("https://prodvpn-eu-6.netatmo.net/restricted/10.255.1.1/{TOKEN}/snapshot"),
        },
        "192.168.1.10",
    )
}

fn leaf(tree: &MemoryTree, path: &[&str]) -> (Scalar, u32) {
    match tree.lookup(path).map(|n| n.kind.clone()) {
        Some(NodeKind::Leaf { value, position }) => (value, position),
        other => panic!("expected leaf at {path:?}, got {other:?}"),
    }
}

fn positions(tree: &MemoryTree) -> Vec<(String, NodeKind)> {
    tree.nodes()
        .map(|n| (n.ident.clone(), n.kind.clone()))
        .collect()
}

#[test]
fn poll_creates_camera_category_with_local_snapshot() {
    // Arrange
    let mut tree = MemoryTree::default();
    let local = format!("http://192.168.1.10/{TOKEN}/live/snapshot_720.jpg");

    // Act
    let report = reconcile_poll(&mut tree, &[front_camera()], 15).expect("reconcile");

    // Assert
    let category = tree.lookup(&["cam1"]).expect("camera category");
    assert_eq!(category.name, "Front");
    assert_eq!(
        category.kind,
        NodeKind::Category {
            kind: Some("Camera".to_string())
        }
    );
    assert_eq!(leaf(&tree, &["cam1", "snapshot_local"]), (Scalar::Text(local.clone()), 7));
    assert_eq!(leaf(&tree, &["cam1", "name"]), (Scalar::from("Front"), 0));
    assert_eq!(leaf(&tree, &["cam1", "is_local"]), (Scalar::Bool(true), 6));

    let image = tree.lookup(&["cam1", IMAGE_IDENT]).expect("image resource");
    assert_eq!(
        image.kind,
        NodeKind::Image(ImageResource {
            url: local,
            position: 7,
            fallback_url: front_camera().snapshot_vpn,
            refresh_interval: 15,
        })
    );
    // category + 9 leaves + image
    assert_eq!(report.created, 11);
}

#[test]
fn poll_twice_is_idempotent() {
    let mut tree = MemoryTree::default();
    let cameras = [front_camera()];

    reconcile_poll(&mut tree, &cameras, 15).expect("first");
    let before = positions(&tree);
    let report = reconcile_poll(&mut tree, &cameras, 15).expect("second");

    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 0);
    assert_eq!(positions(&tree), before);
}

#[test]
fn changing_one_attribute_updates_only_that_leaf() {
    // Arrange
    let mut tree = MemoryTree::default();
    reconcile_poll(&mut tree, &[front_camera()], 15).expect("first");
    let before = positions(&tree);
    let mut camera = front_camera();
    camera.status = "off".to_string();

    // Act
    let report = reconcile_poll(&mut tree, &[camera], 15).expect("second");

    // Assert
    assert_eq!(report.updated, 1);
    assert_eq!(report.created, 0);
    let after = positions(&tree);
    let diff: Vec<_> = before
        .iter()
        .zip(after.iter())
        .filter(|(a, b)| a != b)
        .map(|(_, b)| b.0.clone())
        .collect();
    assert_eq!(diff, ["status"]);
    assert_eq!(leaf(&tree, &["cam1", "status"]), (Scalar::from("off"), 2));
}

#[test]
fn missing_token_stores_absent_local_url() {
    let mut tree = MemoryTree::default();
    let mut camera = front_camera();
    camera.snapshot_vpn = "https://vpn/no/token/here".to_string();
    camera.snapshot_local = None;

    reconcile_poll(&mut tree, &[camera], 30).expect("reconcile");

    assert_eq!(leaf(&tree, &["cam1", "snapshot_local"]), (Scalar::Null, 7));
    match tree.lookup(&["cam1", IMAGE_IDENT]).map(|n| n.kind.clone()) {
        Some(NodeKind::Image(image)) => {
            assert!(image.url.is_empty());
            assert_eq!(image.fallback_url, "https://vpn/no/token/here");
            assert_eq!(image.refresh_interval, 30);
        }
        other => panic!("expected image, got {other:?}"),
    }
}

#[test]
fn cameras_keep_their_own_categories() {
    let mut tree = MemoryTree::default();
    let mut back = front_camera();
    back.id = "70:ee:50:00:00:02".to_string();
    back.name = "Back".to_string();

    reconcile_poll(&mut tree, &[front_camera(), back], 15).expect("reconcile");

    let root_children = tree.children(tree.root());
    assert_eq!(root_children.len(), 2);
    assert_eq!(
        tree.lookup(&["70_ee_50_00_00_02"]).map(|n| n.name.as_str()),
        Some("Back")
    );
}

#[test]
fn webhook_depth_is_limited_to_one_level() {
    // Arrange
    let mut tree = MemoryTree::default();
    let payload = Payload::parse(r#"{"a": {"b": {"c": 1}}}"#).expect("payload");

    // Act
    let report = reconcile_webhook(&mut tree, &payload).expect("reconcile");

    // Assert
    let a = tree.lookup(&["webhook", "a"]).expect("category a");
    assert!(matches!(a.kind, NodeKind::Category { .. }));
    assert!(tree.lookup(&["webhook", "a", "b"]).is_none());
    assert!(tree.children(a.id).is_empty());
    assert_eq!(report.skipped, 1);
}

#[test]
fn webhook_scalars_and_mappings_are_mirrored() {
    let mut tree = MemoryTree::default();
    let payload = Payload::parse(
        r#"{"event_type":"human","camera_id":"cam1","snapshot":{"id":"s1","key":"k1"}}"#,
    )
    .expect("payload");

    reconcile_webhook(&mut tree, &payload).expect("first");
    let second = Payload::parse(r#"{"event_type":"vehicle"}"#).expect("payload");
    let report = reconcile_webhook(&mut tree, &second).expect("second");

    assert_eq!(leaf(&tree, &["webhook", "event_type"]), (Scalar::from("vehicle"), 0));
    assert_eq!(leaf(&tree, &["webhook", "snapshot", "key"]), (Scalar::from("k1"), 0));
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);
}

#[test]
fn key_that_changes_shape_is_skipped_and_rest_of_push_lands() {
    // Arrange
    let mut tree = MemoryTree::default();
    let first = Payload::parse(r#"{"event":{"type":"human"}}"#).expect("first");
    let second = Payload::parse(r#"{"camera_id":"c1","event":"movement","later":"y"}"#).expect("second");
    reconcile_webhook(&mut tree, &first).expect("first push");

    // Act
    let report = reconcile_webhook(&mut tree, &second).expect("second push");

    // Assert
    assert_eq!(report.skipped, 1);
    assert_eq!(report.created, 2);
    assert_eq!(leaf(&tree, &["webhook", "camera_id"]), (Scalar::from("c1"), 0));
    assert_eq!(leaf(&tree, &["webhook", "later"]), (Scalar::from("y"), 0));
    assert_eq!(leaf(&tree, &["webhook", "event", "type"]), (Scalar::from("human"), 0));
}

#[test]
fn keys_differing_in_case_or_punctuation_stay_apart() {
    let mut tree = MemoryTree::default();
    let payload = Payload::parse(r#"{"camera-id":"A","camera_id":"B","Camera_id":"C"}"#).expect("parse");

    let report = reconcile_webhook(&mut tree, &payload).expect("push");

    assert_eq!(report.created, 4);
    assert_eq!(report.updated, 0);
    assert_eq!(leaf(&tree, &["webhook", ident("camera-id").as_str()]), (Scalar::from("A"), 0));
    assert_eq!(leaf(&tree, &["webhook", "camera_id"]), (Scalar::from("B"), 0));
    assert_eq!(leaf(&tree, &["webhook", ident("Camera_id").as_str()]), (Scalar::from("C"), 0));
}
