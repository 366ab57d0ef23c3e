use std::time::Duration;

use tokio::net::TcpListener;

use crate::probe::{probe_target, ReachabilityProbe, TcpProbe};

#[tokio::test]
async fn open_port_is_reachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let probe = TcpProbe {
        port,
        timeout: Duration::from_secs(1),
    };

    assert!(probe.reachable("127.0.0.1").await);
}

#[tokio::test]
async fn empty_or_malformed_address_is_unreachable() {
    let probe = TcpProbe {
        port: 80,
        timeout: Duration::from_millis(200),
    };

    assert!(!probe.reachable("").await);
    assert!(!probe.reachable("192.168.1.10/").await);
}

#[test]
fn ipv6_targets_are_bracketed() {
    assert_eq!(probe_target("fe80::1", 80), "[fe80::1]:80");
    assert_eq!(probe_target("192.168.1.10", 80), "192.168.1.10:80");
    assert_eq!(probe_target("presence.lan", 8080), "presence.lan:8080");
}
