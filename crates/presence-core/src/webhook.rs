use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::payload::Payload;
use crate::reconcile::{reconcile_webhook, ReconcileReport};
use crate::tree::NodeRepository;

/// User agent marker of the provider's webhook relay. The host proxy does not
/// forward the provider's secret header, so the agent is checked instead.
pub const USER_AGENT_MARKER: &str = "NetatmoWebhookServer";
pub const FORBIDDEN_BODY: &str = "Netatmo: Direct Access Forbidden!";

#[derive(Debug, Clone, Default)]
pub struct HookRequest {
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HookRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookResponse {
    pub status: u16,
    pub body: String,
}

impl HookResponse {
    fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Empty body.
    Forbidden,
    /// Wrong method or user agent.
    Rejected,
    Malformed(String),
    Accepted(ReconcileReport),
    Failed(String),
}

impl HookOutcome {
    pub fn response(&self) -> HookResponse {
        match self {
            HookOutcome::Forbidden => HookResponse::new(401, FORBIDDEN_BODY),
            HookOutcome::Rejected => HookResponse::new(403, ""),
            HookOutcome::Malformed(reason) => HookResponse::new(400, reason.as_str()),
            HookOutcome::Accepted(_) => HookResponse::new(200, ""),
            HookOutcome::Failed(reason) => HookResponse::new(500, reason.as_str()),
        }
    }
}

#[derive(Debug, Default)]
pub struct WebhookHandler {
    payload: Payload,
}

impl WebhookHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn handle<R: NodeRepository + ?Sized>(&mut self, request: &HookRequest, tree: &mut R) -> HookOutcome {
        info!(method = %request.method, body = %request.body, "webhook request");

        if request.body.is_empty() {
            warn!("webhook request without body");
            return HookOutcome::Forbidden;
        }

        if !is_provider_push(request) {
            warn!(
                method = %request.method,
                user_agent = request.header("user-agent").unwrap_or_default(),
                "webhook request rejected"
            );
            return HookOutcome::Rejected;
        }

        let payload = match Payload::parse(&request.body) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "webhook payload malformed");
                return HookOutcome::Malformed(err.to_string());
            }
        };
        self.payload = payload;

        match reconcile_webhook(tree, &self.payload) {
            Ok(report) => {
                info!(
                    created = report.created,
                    updated = report.updated,
                    skipped = report.skipped,
                    "webhook reconciled"
                );
                HookOutcome::Accepted(report)
            }
            Err(err) => {
                warn!(error = %err, "webhook reconciliation failed");
                HookOutcome::Failed(err.to_string())
            }
        }
    }
}

fn is_provider_push(request: &HookRequest) -> bool {
    let user_agent = request.header("user-agent").unwrap_or_default();
    request.method == "POST"
        && user_agent
            .to_ascii_lowercase()
            .contains(&USER_AGENT_MARKER.to_ascii_lowercase())
}
