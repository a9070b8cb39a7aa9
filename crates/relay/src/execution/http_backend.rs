use async_trait::async_trait;
use common::models::AccountCredentials;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info};

use super::{ExecutionBackend, ExecutionError, OrderReceipt, OrderRequest};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    login: &'a str,
    password: &'a str,
    server: &'a str,
    broker: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    account_id: String,
}

/// REST execution gateway. Every request carries the API key, a millisecond
/// timestamp, and an HMAC-SHA256 over `timestamp + path + body`.
#[derive(Clone)]
pub struct HttpExecutionBackend {
    client: Client,
    base_url: String,
    api_key: String,
    secret_key: String,
}

impl HttpExecutionBackend {
    pub fn new(base_url: &str, api_key: &str, secret_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    fn sign(&self, payload: &str) -> Result<String, ExecutionError> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ExecutionError::Transport(format!("bad signing key: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    async fn signed_send(
        &self,
        method: Method,
        path: &str,
        body: String,
    ) -> Result<Response, ExecutionError> {
        let timestamp = Self::timestamp();
        let signature = self.sign(&format!("{}{}{}", timestamp, path, body))?;
        let url = format!("{}{}", self.base_url, path);

        let resp = self
            .client
            .request(method, &url)
            .header("X-API-KEY", &self.api_key)
            .header("X-TIMESTAMP", timestamp.to_string())
            .header("X-SIGNATURE", signature)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            error!("Execution backend {} failed ({}): {}", path, status, error_text);
            return Err(ExecutionError::Rejected(format!("{} {}", status, error_text)));
        }
        Ok(resp)
    }

    async fn signed_post<B, R>(&self, path: &str, body: &B) -> Result<R, ExecutionError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_string(body)
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;
        self.signed_send(Method::POST, path, body)
            .await?
            .json::<R>()
            .await
            .map_err(|e| ExecutionError::Transport(e.to_string()))
    }
}

#[async_trait]
impl ExecutionBackend for HttpExecutionBackend {
    async fn open_session(&self, credentials: &AccountCredentials) -> Result<String, ExecutionError> {
        let request = SessionRequest {
            login: &credentials.login,
            password: &credentials.password,
            server: &credentials.server,
            broker: credentials.broker.as_deref(),
        };
        let session: SessionResponse = self.signed_post("/accounts", &request).await?;
        info!(
            "Opened execution session {} for login {}",
            session.account_id, credentials.login
        );
        Ok(session.account_id)
    }

    async fn place_order(
        &self,
        account_ref: &str,
        order: &OrderRequest,
    ) -> Result<OrderReceipt, ExecutionError> {
        info!(
            "Placing order: {} {} {} on {}",
            order.direction, order.size, order.symbol, account_ref
        );
        self.signed_post(&format!("/accounts/{}/orders", account_ref), order)
            .await
    }

    async fn close_session(&self, account_ref: &str) -> Result<(), ExecutionError> {
        self.signed_send(Method::DELETE, &format!("/accounts/{}", account_ref), String::new())
            .await?;
        info!("Closed execution session {}", account_ref);
        Ok(())
    }
}
