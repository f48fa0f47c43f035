//! Risk check - AML score for an address. Advisory only; never fails the caller.

use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub endpoint: String,
    pub access_id: String,
    pub access_key: String,
    /// Asset code sent with the request.
    pub asset: String,
    pub timeout: Duration,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://extrnlapiendpoint.silencatech.com/".into(),
            access_id: String::new(),
            access_key: String::new(),
            asset: "TRX".into(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Upper-cased label from the scoring service, or `UNKNOWN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskLabel(String);

impl RiskLabel {
    pub const UNKNOWN: &'static str = "UNKNOWN";

    pub fn new(label: &str) -> Self { Self(label.trim().to_uppercase()) }
    pub fn unknown() -> Self { Self(Self::UNKNOWN.into()) }
    pub fn is_unknown(&self) -> bool { self.0 == Self::UNKNOWN }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[async_trait]
pub trait RiskCheck: Send + Sync {
    async fn score(&self, address: &str) -> RiskLabel;
}

/// HTTP client for the AML scoring endpoint.
pub struct AmlClient {
    http: reqwest::Client,
    config: RiskConfig,
}

#[derive(Deserialize)]
struct ScoreResponse {
    risk_score_level: Option<String>,
}

impl AmlClient {
    pub fn new(config: RiskConfig) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent("custodia/0.1")
            .build()?;
        Ok(Self { http, config })
    }

    /// md5("{address}:{access_key}:{access_id}") as lowercase hex.
    pub fn request_token(&self, address: &str) -> String {
        let input = format!("{}:{}:{}", address, self.config.access_key, self.config.access_id);
        hex::encode(Md5::digest(input.as_bytes()))
    }

    async fn fetch(&self, address: &str) -> anyhow::Result<RiskLabel> {
        let token = self.request_token(address);
        let form = [
            ("hash", address),
            ("asset", self.config.asset.as_str()),
            ("accessId", self.config.access_id.as_str()),
            ("token", token.as_str()),
            ("locale", "en_US"),
            ("flow", "lite"),
        ];
        let resp: ScoreResponse = self
            .http
            .post(&self.config.endpoint)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.risk_score_level.as_deref().map(RiskLabel::new).unwrap_or_else(RiskLabel::unknown))
    }
}

#[async_trait]
impl RiskCheck for AmlClient {
    async fn score(&self, address: &str) -> RiskLabel {
        match self.fetch(address).await {
            Ok(label) => label,
            Err(e) => {
                warn!(address, error = %e, "risk check failed");
                RiskLabel::unknown()
            }
        }
    }
}
