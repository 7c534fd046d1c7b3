use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{
    domain::{ObjectId, TransactionDigest},
    protocol::{ObjectData, TransactionEffects},
};
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use crate::LedgerReader;

const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// [`LedgerReader`] over the fullnode JSON-RPC interface. Finality is
/// observed by polling `iota_getTransactionBlock` until the node reports
/// effects or the wait deadline passes.
pub struct JsonRpcLedgerReader {
    http: reqwest::Client,
    endpoint: Url,
    wait_timeout: Duration,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct JsonRpcEnvelope {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcLedgerReader {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("invalid fullnode url '{endpoint}'"))?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_timing(mut self, wait_timeout: Duration, poll_interval: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self.poll_interval = poll_interval;
        self
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let envelope: JsonRpcEnvelope = response.json().await?;

        if let Some(err) = envelope.error {
            return Err(anyhow!("rpc error {}: {}", err.code, err.message));
        }
        envelope
            .result
            .ok_or_else(|| anyhow!("rpc response for {method} carries no result"))
    }
}

#[async_trait]
impl LedgerReader for JsonRpcLedgerReader {
    async fn wait_for_transaction(
        &self,
        digest: &TransactionDigest,
    ) -> Result<TransactionEffects> {
        let started = Instant::now();
        loop {
            match self
                .call(
                    "iota_getTransactionBlock",
                    json!([digest.as_str(), { "showEffects": true }]),
                )
                .await
            {
                Ok(result) => {
                    if let Some(effects) = parse_effects(&result)? {
                        return Ok(effects);
                    }
                    debug!(%digest, "transaction known but effects not yet reported");
                }
                Err(err) => debug!(%digest, "transaction not yet available: {err}"),
            }

            if started.elapsed() >= self.wait_timeout {
                return Err(anyhow!(
                    "timed out after {:?} waiting for transaction {digest} to finalize",
                    self.wait_timeout
                ));
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn get_object(&self, object_id: &ObjectId) -> Result<Option<ObjectData>> {
        let result = self
            .call(
                "iota_getObject",
                json!([object_id.as_str(), { "showContent": true, "showOwner": true }]),
            )
            .await?;
        parse_object_response(&result)
    }
}

pub(crate) fn parse_effects(result: &Value) -> Result<Option<TransactionEffects>> {
    let Some(effects) = result.get("effects") else {
        return Ok(None);
    };
    let effects =
        serde_json::from_value(effects.clone()).context("malformed transaction effects")?;
    Ok(Some(effects))
}

pub(crate) fn parse_object_response(result: &Value) -> Result<Option<ObjectData>> {
    if let Some(data) = result.get("data") {
        let data = serde_json::from_value(data.clone()).context("malformed object record")?;
        return Ok(Some(data));
    }
    if let Some(error) = result.get("error") {
        let code = error.get("code").and_then(Value::as_str).unwrap_or_default();
        if matches!(code, "notExists" | "notExist" | "deleted") {
            return Ok(None);
        }
        return Err(anyhow!("object read failed: {error}"));
    }
    Err(anyhow!("object response carries neither data nor error"))
}
