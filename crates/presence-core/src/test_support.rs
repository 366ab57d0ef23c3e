use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::cloud::{CloudCamera, CloudClient, CloudError, Credentials, WebhookAck};
use crate::config::BridgeConfig;
use crate::probe::ReachabilityProbe;

pub const TOKEN: &str = "0123456789abcdef0123456789abcdef";

/// Calls observed by [`FakeCloud`], shared with the test body.
#[derive(Debug, Default)]
pub struct CloudLog {
    pub connects: u32,
    pub dropped: u32,
    pub webhooks: Vec<String>,
    pub listed: u32,
}

pub struct FakeCloud {
    pub connect_error: Option<String>,
    pub webhook_status: Option<String>,
    pub cameras: Vec<CloudCamera>,
    pub list_error: Option<String>,
    pub log: Arc<Mutex<CloudLog>>,
    connected: bool,
}

impl FakeCloud {
    pub fn healthy() -> Self {
        Self {
            connect_error: None,
            webhook_status: Some("ok".to_string()),
            cameras: vec![camera("cam1", "Front")],
            list_error: None,
            log: Arc::new(Mutex::new(CloudLog::default())),
            connected: false,
        }
    }

    pub fn log(&self) -> Arc<Mutex<CloudLog>> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl CloudClient for FakeCloud {
    async fn connect(&mut self, _credentials: &Credentials) -> Result<(), CloudError> {
        self.log.lock().expect("log").connects += 1;
        if let Some(message) = &self.connect_error {
            return Err(CloudError::Auth(message.clone()));
        }
        self.connected = true;
        Ok(())
    }

    async fn list_cameras(&mut self) -> Result<Vec<CloudCamera>, CloudError> {
        self.log.lock().expect("log").listed += 1;
        if let Some(message) = &self.list_error {
            return Err(CloudError::Http(message.clone()));
        }
        Ok(self.cameras.clone())
    }

    async fn set_webhook(&mut self, url: &str) -> Result<WebhookAck, CloudError> {
        self.log.lock().expect("log").webhooks.push(url.to_string());
        Ok(WebhookAck {
            status: self.webhook_status.clone(),
        })
    }

    async fn drop_webhook(&mut self) -> Result<WebhookAck, CloudError> {
        self.log.lock().expect("log").dropped += 1;
        Ok(WebhookAck {
            status: Some("ok".to_string()),
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

pub struct FakeProbe {
    pub reachable: bool,
    pub probed: Arc<Mutex<Vec<String>>>,
}

impl FakeProbe {
    pub fn up() -> Self {
        Self {
            reachable: true,
            probed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn down() -> Self {
        Self {
            reachable: false,
            ..Self::up()
        }
    }
}

#[async_trait]
impl ReachabilityProbe for FakeProbe {
    async fn reachable(&self, address: &str) -> bool {
        self.probed.lock().expect("probed").push(address.to_string());
        self.reachable
    }
}

pub fn camera(id: &str, name: &str) -> CloudCamera {
    CloudCamera {
        id: id.to_string(),
        name: name.to_string(),
        kind: "NOC".to_string(),
        status: "on".to_string(),
        sd_status: "on".to_string(),
        alim_status: "on".to_string(),
        light_mode_status: "auto".to_string(),
        is_local: true,
        snapshot: format!("https://prodvpn-eu-2.netatmo.net/restricted/10.255.1.1/{TOKEN}/snapshot"),
    }
}

pub fn valid_config() -> BridgeConfig {
    BridgeConfig {
        email: "user@example.com".to_string(),
        password: "secret".to_string(),
        client_id: "client".to_string(),
        client_secret: "client-secret".to_string(),
        callback_url: "https://hub.example.com".to_string(),
        lan_address: "192.168.1.10".to_string(),
        refresh_interval: 15,
    }
}
