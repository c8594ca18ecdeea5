use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use reqwest::{blocking::Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::{thread, time::Duration};

use crate::dispatch::{CommandSink, OutboundCommand};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Log in before the first point write.
    pub login: bool,
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: "http://172.172.23.5:2429".to_string(),
            username: "openplc".to_string(),
            password: "openplc".to_string(),
            login: true,
            timeout_ms: 3000,
        }
    }
}

/// Client for the control endpoint. Cloning is cheap and clones share the
/// session cookies.
#[derive(Clone)]
pub struct ControlClient {
    base_url: String,
    client: Client,
}

impl ControlClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(ControlClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Builds the client and, if configured, logs in. A failed login is only
    /// logged; point writes are then attempted without a session.
    pub fn connect(config: &ApiConfig) -> Result<Self> {
        let client = Self::new(&config.base_url, Duration::from_millis(config.timeout_ms))?;

        if config.login {
            match client.login(&config.username, &config.password) {
                Ok(()) => info!("Logged in to {}", client.base_url),
                Err(err) => warn!("Continuing without a session: {:#}", err),
            }
        }

        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn login(&self, username: &str, password: &str) -> Result<()> {
        let url = format!("{}/login", self.base_url);

        let response = self
            .client
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .with_context(|| format!("Failed to reach {}", url))?;

        if response.status() != StatusCode::OK {
            bail!("Login rejected with {}", response.status());
        }

        Ok(())
    }

    /// Writes `value` to `address`. Anything but a 200 is an error.
    pub fn point_write(&self, address: &str, value: i32) -> Result<()> {
        let url = format!("{}/point-write", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("value", value.to_string().as_str()), ("address", address)])
            .send()
            .with_context(|| format!("Failed to send {} to {}", value, address))?;

        if response.status() != StatusCode::OK {
            bail!("Writing {} to {} returned {}", value, address, response.status());
        }

        Ok(())
    }

    fn deliver(&self, command: &OutboundCommand) {
        match self.point_write(&command.address, command.value) {
            Ok(()) => debug!("{} <- {} delivered", command.address, command.value),
            Err(err) => warn!("{:#}", err),
        }
    }
}

/// Sends every command from its own detached thread.
pub struct HttpSink {
    client: ControlClient,
}

impl HttpSink {
    pub fn new(client: ControlClient) -> Self {
        HttpSink { client }
    }

    fn spawn<F>(&self, task: F)
    where
        F: FnOnce(ControlClient) + Send + 'static,
    {
        let client = self.client.clone();

        if let Err(err) = thread::Builder::new()
            .name("point-write".to_string())
            .spawn(move || task(client))
        {
            warn!("Failed to spawn sender thread: {}", err);
        }
    }
}

impl CommandSink for HttpSink {
    fn send(&self, command: OutboundCommand) {
        debug!("Sending {} <- {}", command.address, command.value);
        self.spawn(move |client| client.deliver(&command));
    }

    fn send_after(&self, command: OutboundCommand, delay: Duration) {
        self.spawn(move |client| {
            thread::sleep(delay);
            client.deliver(&command);
        });
    }

    fn send_blocking(&self, command: OutboundCommand) {
        self.client.deliver(&command);
    }
}

/// Logs commands instead of sending them.
pub struct LogSink;

impl CommandSink for LogSink {
    fn send(&self, command: OutboundCommand) {
        info!("[dry run] {} <- {}", command.address, command.value);
    }

    fn send_after(&self, command: OutboundCommand, delay: Duration) {
        info!(
            "[dry run] {} <- {} in {:?}",
            command.address, command.value, delay
        );
    }
}
