use serde::{Deserialize, Serialize};

use crate::cloud::CloudCamera;
use crate::snapshot::local_snapshot_url;
use crate::tree::Scalar;

pub const SNAPSHOT_LOCAL: &str = "snapshot_local";
pub const SNAPSHOT_VPN: &str = "snapshot_vpn";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub sd_status: String,
    pub alim_status: String,
    pub light_mode_status: String,
    pub is_local: bool,
    pub snapshot_local: Option<String>,
    pub snapshot_vpn: String,
}

impl CameraRecord {
    pub fn from_cloud(camera: CloudCamera, lan_address: &str) -> Self {
        let snapshot_local = local_snapshot_url(&camera.snapshot, lan_address);
        Self {
            id: camera.id,
            name: camera.name,
            kind: camera.kind,
            status: camera.status,
            sd_status: camera.sd_status,
            alim_status: camera.alim_status,
            light_mode_status: camera.light_mode_status,
            is_local: camera.is_local,
            snapshot_local,
            snapshot_vpn: camera.snapshot,
        }
    }

    pub fn attributes(&self) -> [(&'static str, Scalar); 9] {
        [
            ("name", self.name.as_str().into()),
            ("type", self.kind.as_str().into()),
            ("status", self.status.as_str().into()),
            ("sd_status", self.sd_status.as_str().into()),
            ("alim_status", self.alim_status.as_str().into()),
            ("light_mode_status", self.light_mode_status.as_str().into()),
            ("is_local", self.is_local.into()),
            (SNAPSHOT_LOCAL, self.snapshot_local.clone().into()),
            (SNAPSHOT_VPN, self.snapshot_vpn.as_str().into()),
        ]
    }
}
