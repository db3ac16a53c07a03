//! Per-invocation context
//!
//! Built once in `main` and passed by reference to every command.

use sdcli_common::config::ResolvedConfig;

use crate::error::CliResult;
use crate::models::GeometryAccessData;
use crate::services::{build_http_client, GeometryClient, GeometryConnector, PlatformClient, PollConfig};

pub struct CliContext {
    pub config: ResolvedConfig,
    pub platform: PlatformClient,
    pub http: reqwest::Client,
}

impl CliContext {
    /// Build the HTTP client and authenticate with the Platform Backend
    pub async fn init(config: ResolvedConfig) -> CliResult<Self> {
        let http = build_http_client()?;
        let platform = PlatformClient::authenticate(http.clone(), &config.credentials).await?;
        Ok(Self { config, platform, http })
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig::from(&self.config.polling)
    }
}

impl GeometryConnector for CliContext {
    type Backend = GeometryClient;

    fn connect(&self, access: &GeometryAccessData) -> CliResult<GeometryClient> {
        Ok(GeometryClient::new(self.http.clone(), access))
    }
}
