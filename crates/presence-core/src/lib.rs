pub mod bridge;
pub mod camera;
pub mod cloud;
pub mod config;
pub mod connection;
pub mod hooks;
pub mod payload;
pub mod probe;
pub mod reconcile;
pub mod snapshot;
pub mod tree;
pub mod webhook;

#[cfg(test)]
mod cloud_tests;
#[cfg(test)]
mod probe_tests;
#[cfg(test)]
mod reconcile_tests;
#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tree_tests;

pub use bridge::{
    check_connection, ingest_webhook, shared_instance, Bridge, BridgeError, CycleOutcome, InstanceStatus,
    SharedInstance, StatusBoard,
};
pub use camera::CameraRecord;
pub use cloud::{CloudCamera, CloudClient, CloudError, Credentials, NetatmoClient};
pub use config::{BridgeConfig, ConfigError, ConfigStore, FileConfigStore, MemoryConfigStore};
pub use connection::{CheckOutcome, Connection, ConnectionError, ConnectionState, StatusCode};
pub use hooks::{hook_path, HookRegistry, HookTable};
pub use payload::Payload;
pub use probe::{ReachabilityProbe, TcpProbe};
pub use reconcile::ReconcileReport;
pub use snapshot::local_snapshot_url;
pub use tree::{MemoryTree, Node, NodeId, NodeKind, NodeRepository, Scalar, TreeError};
pub use webhook::{HookOutcome, HookRequest, HookResponse, WebhookHandler};
