use tracing::{debug, warn};

use crate::camera::{CameraRecord, SNAPSHOT_LOCAL};
use crate::payload::{Payload, PayloadValue};
use crate::tree::{ident, ImageResource, NodeId, NodeRepository, TreeError, Upsert};

pub const CAMERA_KIND: &str = "Camera";
pub const WEBHOOK_IDENT: &str = "webhook";
pub const WEBHOOK_NAME: &str = "Webhook";
pub const IMAGE_IDENT: &str = "snapshot_image";
pub const IMAGE_NAME: &str = "Snapshot";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Payload entries nested deeper than one level or whose shape clashes
    /// with the node already stored under their identifier.
    pub skipped: usize,
}

impl ReconcileReport {
    fn record(&mut self, upsert: Upsert) -> NodeId {
        match upsert {
            Upsert::Created(_) => self.created += 1,
            Upsert::Updated(_) => self.updated += 1,
            Upsert::Unchanged(_) => self.unchanged += 1,
        }
        upsert.id()
    }

    fn record_or_skip(&mut self, result: Result<Upsert, TreeError>) -> Result<Option<NodeId>, TreeError> {
        match result {
            Ok(upsert) => Ok(Some(self.record(upsert))),
            Err(TreeError::KindMismatch {
                parent,
                ident,
                found,
                expected,
            }) => {
                warn!(%parent, %ident, found, expected, "payload key changed shape, skipped");
                self.skipped += 1;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn changed(&self) -> bool {
        self.created > 0 || self.updated > 0
    }
}

pub fn ensure_webhook_category<R: NodeRepository + ?Sized>(tree: &mut R) -> Result<Upsert, TreeError> {
    let root = tree.root();
    tree.ensure_category(root, WEBHOOK_IDENT, WEBHOOK_NAME, None)
}

pub fn reconcile_poll<R: NodeRepository + ?Sized>(
    tree: &mut R,
    cameras: &[CameraRecord],
    refresh_interval: u64,
) -> Result<ReconcileReport, TreeError> {
    let mut report = ReconcileReport::default();
    let root = tree.root();

    for camera in cameras {
        let category = report.record(tree.ensure_category(
            root,
            &ident(&camera.id),
            &camera.name,
            Some(CAMERA_KIND),
        )?);

        for (position, (key, value)) in (0_u32..).zip(camera.attributes()) {
            if key == SNAPSHOT_LOCAL {
                let image = ImageResource {
                    url: camera.snapshot_local.clone().unwrap_or_default(),
                    position,
                    fallback_url: camera.snapshot_vpn.clone(),
                    refresh_interval,
                };
                report.record(tree.upsert_image(category, IMAGE_IDENT, IMAGE_NAME, image)?);
            }

            report.record(tree.upsert_leaf(category, &ident(key), key, value, Some(position))?);
        }

        debug!(camera = %camera.id, name = %camera.name, "camera reconciled");
    }

    Ok(report)
}

pub fn reconcile_webhook<R: NodeRepository + ?Sized>(
    tree: &mut R,
    payload: &Payload,
) -> Result<ReconcileReport, TreeError> {
    let mut report = ReconcileReport::default();
    let webhook = report.record(ensure_webhook_category(tree)?);

    for (key, value) in &payload.entries {
        match value {
            PayloadValue::Mapping(inner) => {
                let Some(sub) = report.record_or_skip(tree.ensure_category(webhook, &ident(key), key, None))? else {
                    continue;
                };
                for (inner_key, inner_value) in inner {
                    match inner_value {
                        PayloadValue::Scalar(scalar) => {
                            report.record_or_skip(tree.upsert_leaf(
                                sub,
                                &ident(inner_key),
                                inner_key,
                                scalar.clone(),
                                None,
                            ))?;
                        }
                        // only one level of nesting is mirrored
                        PayloadValue::Mapping(_) => report.skipped += 1,
                    }
                }
            }
            PayloadValue::Scalar(scalar) => {
                report.record_or_skip(tree.upsert_leaf(webhook, &ident(key), key, scalar.clone(), None))?;
            }
        }
    }

    Ok(report)
}
