//! Node Configuration - environment first, builder methods for tests and embedders

use crate::chain::ChainConfig;
use crate::error::{Error, Result};
use crate::observer::ObserverConfig;
use crate::risk::RiskConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Node configuration. `from_env` for the binary, `new` + `with_*` everywhere else.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub app: String,
    pub bot_token: Option<String>,
    pub db_path: Option<PathBuf>,
    pub chain: ChainConfig,
    pub risk: RiskConfig,
    pub observer: ObserverConfig,
    pub http: HttpConfig,
    pub webapp_url: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            app: "custodia".into(),
            bot_token: None,
            db_path: None,
            chain: ChainConfig::default(),
            risk: RiskConfig::default(),
            observer: ObserverConfig::default(),
            http: HttpConfig::default(),
            webapp_url: None,
        }
    }
}

impl NodeConfig {
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into(), ..Default::default() }
    }
    pub fn with_bot_token(mut self, token: impl Into<String>) -> Self { self.bot_token = Some(token.into()); self }
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self { self.db_path = Some(path.into()); self }
    pub fn with_chain(mut self, c: ChainConfig) -> Self { self.chain = c; self }
    pub fn with_risk(mut self, c: RiskConfig) -> Self { self.risk = c; self }
    pub fn with_observer(mut self, c: ObserverConfig) -> Self { self.observer = c; self }
    pub fn with_http(mut self, c: HttpConfig) -> Self { self.http = c; self }
    pub fn with_webapp_url(mut self, url: impl Into<String>) -> Self { self.webapp_url = Some(url.into()); self }

    /// Read configuration from the process environment. Unset values keep their defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        config.bot_token = env_string("BOT_TOKEN");
        config.db_path = env_string("CUSTODIA_DB").map(PathBuf::from);
        config.webapp_url = env_string("CUSTODIA_WEBAPP_URL");

        if let Some(url) = env_string("TRONGRID_URL") { config.chain.api_url = url; }
        config.chain.api_key = env_string("TRON_PRO_API_KEY");
        if let Some(contract) = env_string("USDT_CONTRACT_ADDRESS") { config.chain.token_contract = contract; }
        if let Some(url) = env_string("CUSTODIA_EXPLORER_URL") { config.chain.explorer_url = url; }
        if let Some(limit) = env_parse::<u64>("CUSTODIA_FEE_LIMIT")? { config.chain.fee_limit = limit; }

        if let Some(endpoint) = env_string("AML_ENDPOINT") { config.risk.endpoint = endpoint; }
        config.risk.access_id = env_string("AML_ACCESS_ID").unwrap_or_default();
        config.risk.access_key = env_string("AML_ACCESS_KEY").unwrap_or_default();

        if let Some(secs) = env_parse::<u64>("CUSTODIA_POLL_SECS")? { config.observer.poll_interval = Duration::from_secs(secs); }
        if let Some(secs) = env_parse::<u64>("CUSTODIA_RETRY_SECS")? { config.observer.retry_interval = Duration::from_secs(secs); }
        if let Some(size) = env_parse::<u32>("CUSTODIA_PAGE_SIZE")? { config.observer.page_size = size; }

        if let Some(port) = env_parse::<u16>("PORT")? { config.http.port = port; }
        if let Some(origins) = env_string("CUSTODIA_CORS_ORIGINS") {
            config.http.cors_origins = origins.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }

        Ok(config)
    }

    /// Database file: explicit path, else `$CUSTODIA_ROOT/<app>/wallets.db`, else the platform data dir.
    pub fn resolved_db_path(&self) -> PathBuf {
        if let Some(path) = &self.db_path {
            return path.clone();
        }
        let root = std::env::var("CUSTODIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")));
        root.join(&self.app).join("wallets.db")
    }

    pub fn require_bot_token(&self) -> Result<&str> {
        self.bot_token.as_deref().ok_or_else(|| Error::Config("BOT_TOKEN not set".into()))
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub port: u16,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self { Self { port: 8000, cors_origins: Vec::new() } }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key}: cannot parse '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = NodeConfig::new("test")
            .with_db_path("/tmp/x.db")
            .with_bot_token("123:abc");
        assert_eq!(config.resolved_db_path(), PathBuf::from("/tmp/x.db"));
        assert_eq!(config.require_bot_token().unwrap(), "123:abc");
        assert_eq!(config.observer.poll_interval, Duration::from_secs(15));
        assert_eq!(config.observer.retry_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let config = NodeConfig::new("test");
        assert!(matches!(config.require_bot_token(), Err(Error::Config(_))));
    }
}
