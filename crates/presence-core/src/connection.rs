use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::cloud::CloudClient;
use crate::config::{BridgeConfig, ConfigError, ConfigStore};
use crate::hooks::{hook_path, HookRegistry};
use crate::probe::ReachabilityProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Inactive,
    Ready,
    MissingCredentials,
    InvalidCallbackUrl,
    ConnectFailed,
    WebhookRegistrationFailed,
    DeviceUnreachable,
}

impl StatusCode {
    pub fn code(self) -> u16 {
        match self {
            StatusCode::Ready => 102,
            StatusCode::Inactive => 104,
            StatusCode::MissingCredentials => 201,
            StatusCode::InvalidCallbackUrl => 202,
            StatusCode::ConnectFailed => 203,
            StatusCode::WebhookRegistrationFailed => 204,
            StatusCode::DeviceUnreachable => 205,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusCode::Ready => "ready",
            StatusCode::Inactive => "inactive",
            StatusCode::MissingCredentials => "missing credentials",
            StatusCode::InvalidCallbackUrl => "invalid callback url",
            StatusCode::ConnectFailed => "cloud connect failed",
            StatusCode::WebhookRegistrationFailed => "webhook registration failed",
            StatusCode::DeviceUnreachable => "lan device unreachable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Unconfigured,
    Validating,
    Connecting,
    RegisteringWebhook,
    Ready,
    Failed(StatusCode),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("email, password, client id and client secret are required")]
    MissingCredentials,
    #[error("lan device {0:?} did not answer the reachability probe")]
    DeviceUnreachable(String),
    #[error("callback url {0:?} needs a scheme and a host")]
    InvalidCallbackUrl(String),
    #[error("cloud connect failed: {0}")]
    ConnectFailed(String),
    #[error("webhook registration failed: {0}")]
    WebhookRegistrationFailed(String),
    #[error("config store: {0}")]
    Config(#[from] ConfigError),
}

impl ConnectionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ConnectionError::MissingCredentials => StatusCode::MissingCredentials,
            ConnectionError::DeviceUnreachable(_) => StatusCode::DeviceUnreachable,
            ConnectionError::InvalidCallbackUrl(_) => StatusCode::InvalidCallbackUrl,
            ConnectionError::ConnectFailed(_) => StatusCode::ConnectFailed,
            ConnectionError::WebhookRegistrationFailed(_) => StatusCode::WebhookRegistrationFailed,
            ConnectionError::Config(_) => StatusCode::Inactive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The callback URL was normalized and persisted; the next trigger
    /// validates again.
    Deferred { callback_url: String },
    Ready(ReadySession),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadySession {
    pub config: BridgeConfig,
    pub webhook_url: String,
}

pub struct Connection<C: CloudClient, P: ReachabilityProbe> {
    client: C,
    probe: P,
    instance_id: String,
    state: ConnectionState,
}

impl<C: CloudClient, P: ReachabilityProbe> Connection<C, P> {
    pub fn new(client: C, probe: P, instance_id: impl Into<String>) -> Self {
        Self {
            client,
            probe,
            instance_id: instance_id.into(),
            state: ConnectionState::Unconfigured,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn hook_path(&self) -> String {
        hook_path(&self.instance_id)
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub async fn establish(
        &mut self,
        store: &dyn ConfigStore,
        hooks: &dyn HookRegistry,
    ) -> Result<CheckOutcome, ConnectionError> {
        self.state = ConnectionState::Validating;
        let result = self.run_checks(store, hooks).await;

        match &result {
            Ok(CheckOutcome::Ready(_)) => self.state = ConnectionState::Ready,
            Ok(CheckOutcome::Deferred { .. }) => self.state = ConnectionState::Unconfigured,
            Err(err) => {
                let code = err.status_code();
                warn!(code = code.code(), error = %err, "connection check failed");
                self.state = ConnectionState::Failed(code);
            }
        }

        result
    }

    async fn run_checks(
        &mut self,
        store: &dyn ConfigStore,
        hooks: &dyn HookRegistry,
    ) -> Result<CheckOutcome, ConnectionError> {
        let mut config = store.load()?;

        if config.callback_url.ends_with('/') {
            config.callback_url = config.callback_url.trim_end_matches('/').to_string();
            store.save(&config)?;
            info!(callback_url = %config.callback_url, "stripped trailing slash from callback url, retrying on next trigger");
            return Ok(CheckOutcome::Deferred {
                callback_url: config.callback_url,
            });
        }

        if !config.has_credentials() {
            return Err(ConnectionError::MissingCredentials);
        }

        if !self.probe.reachable(&config.lan_address).await {
            return Err(ConnectionError::DeviceUnreachable(config.lan_address));
        }

        if !is_valid_callback(&config.callback_url) {
            return Err(ConnectionError::InvalidCallbackUrl(config.callback_url));
        }

        config.lan_address = config.lan_address.replace('/', "");

        self.state = ConnectionState::Connecting;
        self.client
            .connect(&config.credentials())
            .await
            .map_err(|err| ConnectionError::ConnectFailed(err.to_string()))?;

        self.state = ConnectionState::RegisteringWebhook;
        let path = self.hook_path();
        hooks.register(&path);

        if let Err(err) = self.client.drop_webhook().await {
            debug!(error = %err, "dropping previous webhook failed");
        }

        let webhook_url = format!("{}{path}", config.callback_url);
        let ack = self
            .client
            .set_webhook(&webhook_url)
            .await
            .map_err(|err| ConnectionError::WebhookRegistrationFailed(err.to_string()))?;
        if !ack.is_ok() {
            return Err(ConnectionError::WebhookRegistrationFailed(format!(
                "cloud answered status {:?}",
                ack.status
            )));
        }

        info!(%webhook_url, "webhook registered");
        Ok(CheckOutcome::Ready(ReadySession {
            config,
            webhook_url,
        }))
    }

    pub async fn teardown(&mut self, hooks: &dyn HookRegistry) {
        hooks.unregister(&self.hook_path());
        if self.client.is_connected() {
            if let Err(err) = self.client.drop_webhook().await {
                warn!(error = %err, "failed to drop cloud webhook");
            }
        }
        self.state = ConnectionState::Unconfigured;
    }
}

fn is_valid_callback(callback_url: &str) -> bool {
    match Url::parse(callback_url) {
        Ok(url) => !url.scheme().is_empty() && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}
