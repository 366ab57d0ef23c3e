use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const API_BASE: &str = "https://api.netatmo.com";
const SCOPE: &str = "read_presence access_presence read_camera access_camera";
const APP_TYPE: &str = "app_security";

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudCamera {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub sd_status: String,
    pub alim_status: String,
    pub light_mode_status: String,
    pub is_local: bool,
    pub snapshot: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    #[serde(default)]
    pub status: Option<String>,
}

impl WebhookAck {
    pub fn is_ok(&self) -> bool {
        self.status.as_deref() == Some("ok")
    }
}

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("not connected")]
    NotConnected,
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("api error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for CloudError {
    fn from(err: reqwest::Error) -> Self {
        CloudError::Http(err.to_string())
    }
}

#[async_trait]
pub trait CloudClient: Send {
    async fn connect(&mut self, credentials: &Credentials) -> Result<(), CloudError>;
    async fn list_cameras(&mut self) -> Result<Vec<CloudCamera>, CloudError>;
    async fn set_webhook(&mut self, url: &str) -> Result<WebhookAck, CloudError>;
    async fn drop_webhook(&mut self) -> Result<WebhookAck, CloudError>;
    fn is_connected(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiErrorDetail {
    Message { message: String },
    Plain(String),
}

#[derive(Debug, Deserialize)]
struct HomeDataResponse {
    body: HomeDataBody,
}

#[derive(Debug, Deserialize)]
struct HomeDataBody {
    #[serde(default)]
    homes: Vec<Home>,
}

#[derive(Debug, Deserialize)]
struct Home {
    #[serde(default)]
    cameras: Vec<HomeCamera>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HomeCamera {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    sd_status: String,
    #[serde(default)]
    alim_status: String,
    #[serde(default)]
    light_mode_status: String,
    #[serde(default)]
    is_local: bool,
    #[serde(default)]
    vpn_url: String,
}

impl From<HomeCamera> for CloudCamera {
    fn from(camera: HomeCamera) -> Self {
        let snapshot = if camera.vpn_url.is_empty() {
            String::new()
        } else {
            format!("{}/live/snapshot_720.jpg", camera.vpn_url.trim_end_matches('/'))
        };
        Self {
            id: camera.id,
            name: camera.name,
            kind: camera.kind,
            status: camera.status,
            sd_status: camera.sd_status,
            alim_status: camera.alim_status,
            light_mode_status: camera.light_mode_status,
            is_local: camera.is_local,
            snapshot,
        }
    }
}

pub struct NetatmoClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl NetatmoClient {
    pub fn new(timeout: Duration) -> Result<Self, CloudError> {
        Self::with_base_url(API_BASE, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CloudError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("presenced/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: None,
        })
    }

    fn token(&self) -> Result<&str, CloudError> {
        self.access_token.as_deref().ok_or(CloudError::NotConnected)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CloudError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(ApiErrorBody {
                error: ApiErrorDetail::Message { message },
            }) => message,
            Ok(ApiErrorBody {
                error: ApiErrorDetail::Plain(message),
            }) => message,
            Err(_) => body,
        };
        Err(CloudError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn webhook_call(&self, path: &str, query: &[(&str, &str)]) -> Result<WebhookAck, CloudError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(self.token()?)
            .query(query)
            .send()
            .await?;
        let response = Self::check(response).await?;
        response
            .json::<WebhookAck>()
            .await
            .map_err(|err| CloudError::Decode(err.to_string()))
    }
}

#[async_trait]
impl CloudClient for NetatmoClient {
    async fn connect(&mut self, credentials: &Credentials) -> Result<(), CloudError> {
        self.access_token = None;
        let form = [
            ("grant_type", "password"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("username", credentials.email.as_str()),
            ("password", credentials.password.as_str()),
            ("scope", SCOPE),
        ];

        let response = self
            .http
            .post(format!("{}/oauth2/token", self.base_url))
            .form(&form)
            .send()
            .await?;
        let response = Self::check(response).await.map_err(|err| match err {
            CloudError::Api { message, .. } => CloudError::Auth(message),
            other => other,
        })?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| CloudError::Decode(err.to_string()))?;

        debug!("netatmo session established");
        self.access_token = Some(token.access_token);
        Ok(())
    }

    async fn list_cameras(&mut self) -> Result<Vec<CloudCamera>, CloudError> {
        let response = self
            .http
            .get(format!("{}/api/gethomedata", self.base_url))
            .bearer_auth(self.token()?)
            .send()
            .await?;
        let data: HomeDataResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|err| CloudError::Decode(err.to_string()))?;

        Ok(data
            .body
            .homes
            .into_iter()
            .flat_map(|home| home.cameras)
            .map(CloudCamera::from)
            .collect())
    }

    async fn set_webhook(&mut self, url: &str) -> Result<WebhookAck, CloudError> {
        self.webhook_call("/api/addwebhook", &[("url", url), ("app_types", APP_TYPE)])
            .await
    }

    async fn drop_webhook(&mut self) -> Result<WebhookAck, CloudError> {
        self.webhook_call("/api/dropwebhook", &[("app_types", APP_TYPE)])
            .await
    }

    fn is_connected(&self) -> bool {
        self.access_token.is_some()
    }
}
