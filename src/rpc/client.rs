//! Balance Keeper over HTTP
//!
//! The orchestrator only ever reaches the account service through this
//! client. Transport failures and timeouts surface as
//! `BalanceError::DownstreamUnavailable`; domain errors are decoded back into
//! the exact `BalanceError` variant the server produced.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use super::error::RpcError;
use super::types::ApiResponse;
use crate::account::{
    Account, AdjustBalanceRequest, AdjustBalanceResponse, BalanceError, BalanceKeeper,
};
use crate::core_types::AccountId;

pub struct RpcBalanceKeeper {
    base_url: String,
    client: reqwest::Client,
}

impl RpcBalanceKeeper {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Decode an envelope into the payload or the server's `BalanceError`
    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, BalanceError> {
        let envelope: ApiResponse<Value> = resp
            .json()
            .await
            .map_err(|e| BalanceError::from(RpcError::Decode(e.to_string())))?;

        if envelope.is_success() {
            let data = envelope.data.unwrap_or(Value::Null);
            return serde_json::from_value(data)
                .map_err(|e| BalanceError::from(RpcError::Decode(e.to_string())));
        }

        if let Some(err) = envelope
            .data
            .and_then(|d| serde_json::from_value::<BalanceError>(d).ok())
        {
            return Err(err);
        }

        let remote = RpcError::Remote {
            status: envelope.code,
            code: envelope.error_code.unwrap_or_default(),
            msg: envelope.msg,
        };
        warn!(error = %remote, "Untyped error from account service");
        Err(remote.into())
    }
}

#[async_trait]
impl BalanceKeeper for RpcBalanceKeeper {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn adjust_balance(
        &self,
        req: AdjustBalanceRequest,
    ) -> Result<AdjustBalanceResponse, BalanceError> {
        let resp = self
            .client
            .post(format!("{}/rpc/account/adjust-balance", self.base_url))
            .json(&req)
            .send()
            .await
            .map_err(RpcError::from)?;
        Self::decode(resp).await
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, BalanceError> {
        let resp = self
            .client
            .get(format!("{}/rpc/account/{}", self.base_url, id))
            .send()
            .await
            .map_err(RpcError::from)?;
        Self::decode(resp).await
    }
}
