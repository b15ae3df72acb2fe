//! NATS connection settings shared by the JetStream-backed stores

use async_nats::{Client, ConnectOptions};
use std::time::Duration;
use tracing::info;

use crate::errors::{LandingZoneError, LandingZoneResult};

/// Configuration for NATS connection
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Client name
    pub name: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "lz-phase".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl NatsConfig {
    /// Config for a comma-separated server list
    pub fn for_servers(servers: &str) -> Self {
        Self {
            servers: servers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            ..Self::default()
        }
    }

    /// Open a client connection
    pub async fn connect(&self) -> LandingZoneResult<Client> {
        let connect_options = ConnectOptions::new()
            .name(&self.name)
            .connection_timeout(self.connect_timeout)
            .request_timeout(Some(self.request_timeout));

        let client = async_nats::connect_with_options(self.servers.join(","), connect_options)
            .await
            .map_err(|e| LandingZoneError::NatsConnection(e.to_string()))?;

        info!("Connected to NATS at {:?}", self.servers);
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_servers_splits_list() {
        let config = NatsConfig::for_servers("nats://a:4222, nats://b:4222,");
        assert_eq!(config.servers, vec!["nats://a:4222", "nats://b:4222"]);
        assert_eq!(config.name, "lz-phase");
    }
}
