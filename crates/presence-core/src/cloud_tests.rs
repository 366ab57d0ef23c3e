use std::time::Duration;

use crate::cloud::{CloudCamera, CloudClient, CloudError, HomeCamera, NetatmoClient, WebhookAck};

#[test]
fn home_camera_snapshot_is_derived_from_vpn_url() {
    let camera: HomeCamera = serde_json::from_value(serde_json::json!({
        "id": "70:ee:50:00:00:01",
        "type": "NOC",
        "status": "on",
        "vpn_url": "https://prodvpn-eu-2.netatmo.net/restricted/10.255.0.1/0123456789abcdef0123456789abcdef/MTU,,/",
        "is_local": true,
        "sd_status": "on",
        "alim_status": "on",
        "name": "Driveway",
        "light_mode_status": "auto"
    }))
    .expect("decode");

    let cloud = CloudCamera::from(camera);

    assert_eq!(
        cloud.snapshot,
        "https://prodvpn-eu-2.netatmo.net/restricted/10.255.0.1/0123456789abcdef0123456789abcdef/MTU,,/live/snapshot_720.jpg"
    );
    assert_eq!(cloud.kind, "NOC");
    assert!(cloud.is_local);
}

#[test]
fn webhook_ack_requires_ok_status() {
    let ok: WebhookAck = serde_json::from_str(r#"{"status":"ok","time_exec":0.01}"#).expect("ok");
    let missing: WebhookAck = serde_json::from_str(r#"{"time_exec":0.01}"#).expect("missing");
    let failed: WebhookAck = serde_json::from_str(r#"{"status":"failed"}"#).expect("failed");

    assert!(ok.is_ok());
    assert!(!missing.is_ok());
    assert!(!failed.is_ok());
}

#[tokio::test]
async fn calls_before_connect_fail_fast() {
    let mut client = NetatmoClient::new(Duration::from_secs(1)).expect("client");

    let err = client.list_cameras().await.expect_err("not connected");

    assert!(matches!(err, CloudError::NotConnected));
    assert!(!client.is_connected());
}
