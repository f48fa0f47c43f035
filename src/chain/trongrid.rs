//! TronGrid HTTP client: account reads, TRC-20 history, contract calls, broadcast.

use super::{AccountInfo, ChainConfig, ChainReader, ChainSubmitter, TokenTransfer};
use crate::error::{Error, Result};
use crate::keys::{abi_address_word, PrivateKey};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

const BALANCE_OF: &str = "balanceOf(address)";
const TRANSFER: &str = "transfer(address,uint256)";

pub struct TronGrid {
    http: reqwest::Client,
    config: ChainConfig,
}

#[derive(Deserialize)]
struct DataResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct AccountData {
    #[serde(default)]
    balance: u64,
    #[serde(default)]
    trc20: Vec<HashMap<String, String>>,
}

#[derive(Deserialize, Default)]
struct AccountResource {
    #[serde(rename = "freeNetLimit", default)]
    free_net_limit: u64,
    #[serde(rename = "freeNetUsed", default)]
    free_net_used: u64,
    #[serde(rename = "NetLimit", default)]
    net_limit: u64,
    #[serde(rename = "NetUsed", default)]
    net_used: u64,
    #[serde(rename = "EnergyLimit", default)]
    energy_limit: u64,
    #[serde(rename = "EnergyUsed", default)]
    energy_used: u64,
}

#[derive(Deserialize)]
struct Trc20Transfer {
    transaction_id: String,
    token_info: TokenInfo,
    from: String,
    to: String,
    value: String,
    #[serde(default)]
    block_timestamp: i64,
}

#[derive(Deserialize)]
struct TokenInfo {
    address: String,
}

#[derive(Deserialize, Default)]
struct CallResult {
    #[serde(default)]
    result: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ConstantResponse {
    #[serde(default)]
    result: CallResult,
    #[serde(default)]
    constant_result: Vec<String>,
}

#[derive(Deserialize)]
struct TriggerResponse {
    #[serde(default)]
    result: CallResult,
    transaction: Option<Value>,
}

#[derive(Deserialize)]
struct BroadcastResponse {
    #[serde(default)]
    result: bool,
    code: Option<String>,
    message: Option<String>,
}

impl TronGrid {
    pub fn new(config: ChainConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key).map_err(|e| Error::Config(format!("TRON_PRO_API_KEY: {e}")))?;
            headers.insert("TRON-PRO-API-KEY", value);
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .user_agent("custodia/0.1")
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ChainConfig { &self.config }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.http.get(self.url(path)).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let resp = self.http.post(self.url(path)).json(body).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn account_resource(&self, address: &str) -> Result<AccountResource> {
        self.post_json("/wallet/getaccountresource", &json!({"address": address, "visible": true})).await
    }

    /// Poll for the receipt until it shows up or `confirm_timeout` passes.
    async fn wait_for_confirmation(&self, txid: &str) -> Result<()> {
        let deadline = Instant::now() + self.config.confirm_timeout;
        loop {
            // The broadcast was accepted; a failed lookup is only "no receipt yet".
            match self.post_json::<Value>("/wallet/gettransactioninfobyid", &json!({"value": txid})).await {
                Ok(info) if info.get("id").is_some() => {
                    return match info.pointer("/receipt/result").and_then(|v| v.as_str()) {
                        None | Some("SUCCESS") => Ok(()),
                        Some(status) => Err(Error::External(format!("transaction {txid} failed: {status}"))),
                    };
                }
                Ok(_) => {}
                Err(e) => warn!(txid, error = %e, "receipt lookup failed"),
            }
            if Instant::now() >= deadline {
                warn!(txid, "no receipt before timeout, assuming pending");
                return Ok(());
            }
            tokio::time::sleep(self.config.confirm_poll).await;
        }
    }
}

#[async_trait]
impl ChainReader for TronGrid {
    async fn get_account(&self, address: &str) -> Result<AccountInfo> {
        let resp: DataResponse<AccountData> = self.get_json(&format!("/v1/accounts/{address}")).await?;
        let Some(account) = resp.data.into_iter().next() else {
            return Ok(AccountInfo::default());
        };

        let token_balance = account
            .trc20
            .iter()
            .find_map(|entry| entry.get(&self.config.token_contract))
            .map(|raw| raw.parse::<u128>().map_err(|e| Error::External(format!("trc20 balance '{raw}': {e}"))))
            .transpose()?
            .unwrap_or(0);

        let res = self.account_resource(address).await?;
        Ok(AccountInfo {
            activated: true,
            native_balance: account.balance,
            token_balance,
            energy: res.energy_limit.saturating_sub(res.energy_used),
            bandwidth: res.free_net_limit.saturating_sub(res.free_net_used) + res.net_limit.saturating_sub(res.net_used),
        })
    }

    async fn recent_transfers(&self, address: &str, limit: u32) -> Result<Vec<TokenTransfer>> {
        let path = format!(
            "/v1/accounts/{address}/transactions/trc20?limit={limit}&contract_address={}",
            self.config.token_contract
        );
        let resp: DataResponse<Trc20Transfer> = self.get_json(&path).await?;
        resp.data
            .into_iter()
            .map(|t| {
                let value = t
                    .value
                    .parse::<u128>()
                    .map_err(|e| Error::External(format!("transfer {} value '{}': {e}", t.transaction_id, t.value)))?;
                Ok(TokenTransfer {
                    tx_hash: t.transaction_id,
                    from: t.from,
                    to: t.to,
                    token_contract: t.token_info.address,
                    value,
                    block_timestamp: t.block_timestamp,
                })
            })
            .collect()
    }

    async fn token_balance(&self, address: &str) -> Result<u128> {
        let body = json!({
            "owner_address": address,
            "contract_address": self.config.token_contract,
            "function_selector": BALANCE_OF,
            "parameter": hex::encode(abi_address_word(address)?),
            "visible": true,
        });
        let resp: ConstantResponse = self.post_json("/wallet/triggerconstantcontract", &body).await?;
        if !resp.result.result {
            return Err(Error::External(format!("balanceOf failed: {}", decode_message(resp.result.message.as_deref()))));
        }
        let word = resp
            .constant_result
            .first()
            .ok_or_else(|| Error::External("balanceOf returned nothing".into()))?;
        parse_uint_word(word)
    }
}

#[async_trait]
impl ChainSubmitter for TronGrid {
    async fn transfer(&self, from: &str, to: &str, amount: u128, key: &PrivateKey) -> Result<String> {
        if key.address()? != from {
            return Err(Error::Key("signing key does not match funding address".into()));
        }

        let parameter = format!("{}{:064x}", hex::encode(abi_address_word(to)?), amount);
        let body = json!({
            "owner_address": from,
            "contract_address": self.config.token_contract,
            "function_selector": TRANSFER,
            "parameter": parameter,
            "fee_limit": self.config.fee_limit,
            "call_value": 0,
            "visible": true,
        });
        let resp: TriggerResponse = self.post_json("/wallet/triggersmartcontract", &body).await?;
        if !resp.result.result {
            return Err(Error::External(format!("trigger failed: {}", decode_message(resp.result.message.as_deref()))));
        }
        let mut tx = resp.transaction.ok_or_else(|| Error::External("trigger returned no transaction".into()))?;

        let txid = checked_txid(&tx)?;
        let digest: [u8; 32] = hex::decode(&txid)
            .map_err(|e| Error::External(format!("txID: {e}")))?
            .try_into()
            .map_err(|_| Error::External("txID is not 32 bytes".into()))?;
        let signature = key.sign_digest(&digest)?;
        tx["signature"] = json!([hex::encode(signature)]);

        let broadcast: BroadcastResponse = self.post_json("/wallet/broadcasttransaction", &tx).await?;
        if !broadcast.result {
            return Err(Error::External(format!(
                "broadcast rejected ({}): {}",
                broadcast.code.as_deref().unwrap_or("unknown"),
                decode_message(broadcast.message.as_deref())
            )));
        }
        debug!(txid = %txid, "broadcast accepted");

        self.wait_for_confirmation(&txid).await?;
        Ok(txid)
    }
}

/// The node's txID must be sha256(raw_data_hex); never sign a hash we cannot tie to the payload.
fn checked_txid(tx: &Value) -> Result<String> {
    let txid = tx
        .get("txID")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::External("transaction without txID".into()))?
        .to_ascii_lowercase();
    let raw_hex = tx
        .get("raw_data_hex")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::External("transaction without raw_data_hex".into()))?;
    let raw = hex::decode(raw_hex).map_err(|e| Error::External(format!("raw_data_hex: {e}")))?;
    if hex::encode(Sha256::digest(&raw)) != txid {
        return Err(Error::External("txID does not match raw_data_hex".into()));
    }
    Ok(txid)
}

/// 32-byte big-endian word (hex) into u128; larger values are an error.
fn parse_uint_word(word: &str) -> Result<u128> {
    let trimmed = word.trim_start_matches('0');
    if trimmed.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(trimmed, 16).map_err(|e| Error::External(format!("uint word '{word}': {e}")))
}

/// Node error messages arrive hex-encoded.
fn decode_message(message: Option<&str>) -> String {
    match message {
        None => "no message".into(),
        Some(m) => hex::decode(m)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_else(|| m.to_string()),
    }
}
