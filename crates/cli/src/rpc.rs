//! Solana JSON-RPC and websocket access to raw accounts.

use std::{str::FromStr, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD};
use futures::{SinkExt, StreamExt, stream::BoxStream};
use perp_funding_sdk::{
    error::FetchError,
    sync::{AccountFetcher, RawAccount},
    types::Pubkey,
};
use serde::Deserialize;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Upper bound on addresses per `getMultipleAccounts` call.
const MAX_MULTIPLE_ACCOUNTS: usize = 100;

const COMMITMENT: &str = "confirmed";

/// How long to wait for a subscription to be confirmed.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl From<RpcErrorObject> for FetchError {
    fn from(err: RpcErrorObject) -> Self { FetchError::Rpc { code: err.code, message: err.message } }
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
struct UiAccount {
    /// Base64 payload and its encoding.
    data: (String, String),
    owner: String,
}

impl UiAccount {
    fn into_raw(self, address: Pubkey) -> Result<RawAccount, FetchError> {
        let (payload, encoding) = self.data;
        if encoding != "base64" {
            return Err(FetchError::InvalidResponse(format!("unexpected account encoding {}", encoding)));
        }
        let data = STANDARD
            .decode(payload)
            .map_err(|err| FetchError::InvalidResponse(format!("account {}: {}", address, err)))?;
        let owner = Pubkey::from_str(&self.owner)
            .map_err(|err| FetchError::InvalidResponse(format!("owner of {}: {}", address, err)))?;
        Ok(RawAccount::new(address, owner, data))
    }
}

#[derive(Deserialize)]
struct Notification {
    params: NotificationParams,
}

#[derive(Deserialize)]
struct NotificationParams {
    result: WithContext<UiAccount>,
}

/// [`AccountFetcher`] over a Solana RPC node.
#[derive(Clone, Debug)]
pub(crate) struct RpcFetcher {
    client: reqwest::Client,
    rpc_url: String,
    ws_url: String,
}

impl RpcFetcher {
    pub(crate) fn new(rpc_url: String, ws_url: String) -> Self {
        Self { client: reqwest::Client::new(), rpc_url, ws_url }
    }

    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<RawAccount>>, FetchError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getMultipleAccounts",
            "params": [
                addresses.iter().map(|a| a.to_string()).collect::<Vec<_>>(),
                { "encoding": "base64", "commitment": COMMITMENT },
            ],
        });
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| FetchError::Transport(err.to_string()))?
            .json::<RpcResponse<WithContext<Vec<Option<UiAccount>>>>>()
            .await
            .map_err(|err| FetchError::InvalidResponse(err.to_string()))?;

        if let Some(err) = response.error {
            return Err(err.into());
        }
        let accounts = response
            .result
            .ok_or_else(|| FetchError::InvalidResponse("missing result".to_string()))?
            .value;

        addresses
            .iter()
            .zip(accounts)
            .map(|(address, account)| account.map(|a| a.into_raw(*address)).transpose())
            .collect()
    }
}

impl AccountFetcher for RpcFetcher {
    async fn fetch_raw(&self, addresses: &[Pubkey]) -> Result<Vec<Option<RawAccount>>, FetchError> {
        let mut accounts = Vec::with_capacity(addresses.len());
        for chunk in addresses.chunks(MAX_MULTIPLE_ACCOUNTS) {
            let fetched = self.get_multiple_accounts(chunk).await?;
            if fetched.len() != chunk.len() {
                return Err(FetchError::InvalidResponse(format!(
                    "expected {} accounts, got {}",
                    chunk.len(),
                    fetched.len()
                )));
            }
            accounts.extend(fetched);
        }
        debug!(accounts = accounts.len(), "fetched accounts");
        Ok(accounts)
    }

    async fn subscribe(&self, address: Pubkey) -> Result<BoxStream<'static, RawAccount>, FetchError> {
        let (mut ws, _) = tokio_tungstenite::connect_async(self.ws_url.as_str())
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "accountSubscribe",
            "params": [address.to_string(), { "encoding": "base64", "commitment": COMMITMENT }],
        });
        ws.send(Message::Text(request.to_string().into()))
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        // First text frame confirms the subscription
        let confirmation = tokio::time::timeout(SUBSCRIBE_TIMEOUT, async {
            while let Some(message) = ws.next().await {
                match message {
                    Ok(Message::Text(text)) => return Ok(text),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(err) => return Err(FetchError::Transport(err.to_string())),
                }
            }
            Err(FetchError::Transport("websocket closed before subscribing".to_string()))
        })
        .await
        .map_err(|_| FetchError::Transport("subscription timed out".to_string()))??;

        let confirmation = serde_json::from_str::<RpcResponse<u64>>(confirmation.as_str())
            .map_err(|err| FetchError::InvalidResponse(err.to_string()))?;
        if let Some(err) = confirmation.error {
            return Err(err.into());
        }
        let subscription = confirmation
            .result
            .ok_or_else(|| FetchError::InvalidResponse("missing subscription id".to_string()))?;
        debug!(%address, subscription, "account subscription confirmed");

        let updates = futures::stream::unfold(ws, move |mut ws| async move {
            loop {
                match ws.next().await? {
                    Ok(Message::Text(text)) => match parse_notification(text.as_str(), address) {
                        Ok(account) => return Some((account, ws)),
                        Err(err) => warn!(%address, error = %err, "skipping account notification"),
                    },
                    Ok(Message::Close(_)) => return None,
                    Ok(_) => continue,
                    Err(err) => {
                        warn!(%address, error = %err, "websocket error");
                        return None;
                    },
                }
            }
        });
        Ok(updates.boxed())
    }
}

fn parse_notification(text: &str, address: Pubkey) -> Result<RawAccount, FetchError> {
    let notification =
        serde_json::from_str::<Notification>(text).map_err(|err| FetchError::InvalidResponse(err.to_string()))?;
    notification.params.result.value.into_raw(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multiple_accounts() {
        let body = r#"{
            "jsonrpc": "2.0",
            "result": {
                "context": { "slot": 1 },
                "value": [
                    { "data": ["AQID", "base64"], "owner": "11111111111111111111111111111111",
                      "lamports": 1, "executable": false, "rentEpoch": 0 },
                    null
                ]
            },
            "id": 1
        }"#;
        let response = serde_json::from_str::<RpcResponse<WithContext<Vec<Option<UiAccount>>>>>(body).unwrap();
        let mut accounts = response.result.unwrap().value;
        assert!(accounts[1].is_none());
        let account = accounts.remove(0).unwrap().into_raw(Pubkey::new_from_array([1; 32])).unwrap();
        assert_eq!(account.data, vec![1, 2, 3]);
        assert_eq!(account.owner, Pubkey::default());
    }

    #[test]
    fn test_parse_rpc_error() {
        let body = r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid params"},"id":1}"#;
        let response = serde_json::from_str::<RpcResponse<u64>>(body).unwrap();
        let err = FetchError::from(response.error.unwrap());
        assert!(matches!(err, FetchError::Rpc { code: -32602, .. }));
    }

    #[test]
    fn test_parse_notification() {
        let text = r#"{
            "jsonrpc": "2.0",
            "method": "accountNotification",
            "params": {
                "result": {
                    "context": { "slot": 5 },
                    "value": { "data": ["BAU=", "base64"], "owner": "11111111111111111111111111111111",
                               "lamports": 1, "executable": false, "rentEpoch": 0 }
                },
                "subscription": 23784
            }
        }"#;
        let account = parse_notification(text, Pubkey::new_from_array([2; 32])).unwrap();
        assert_eq!(account.data, vec![4, 5]);
        assert_eq!(account.address, Pubkey::new_from_array([2; 32]));
    }
}
