use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::SsoError;

/// Terminal artifact of a successful flow. Ownership passes to the caller;
/// the flow keeps no copy once it has been delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub bearer_token: String,
    pub csrf_token: String,
}

/// Server-side exchange of a one-time challenge token for a session.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(
        &self,
        challenge_token: &str,
        verifier: &str,
    ) -> Result<SessionCredential, SsoError>;

    /// Rebuild any underlying connection state before a fresh attempt.
    fn reset(&self);
}

const EXCHANGE_PATH: &str = "/login/sso/exchange";
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    csrf: Option<String>,
}

/// reqwest-backed exchanger bound to one server base URL.
pub struct HttpTokenExchanger {
    server_url: String,
    client: RwLock<reqwest::Client>,
}

impl HttpTokenExchanger {
    pub fn new(server_url: impl Into<String>) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self {
            server_url,
            client: RwLock::new(Self::build_client()),
        }
    }

    fn build_client() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(EXCHANGE_TIMEOUT)
            .build()
            .unwrap_or_default()
    }

    fn current_client(&self) -> reqwest::Client {
        self.client
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange(
        &self,
        challenge_token: &str,
        verifier: &str,
    ) -> Result<SessionCredential, SsoError> {
        let resp = self
            .current_client()
            .post(format!("{}{}", self.server_url, EXCHANGE_PATH))
            .header("Accept", "application/json")
            .form(&[
                ("challenge_token", challenge_token),
                ("code_verifier", verifier),
            ])
            .send()
            .await
            .map_err(|e| SsoError::Exchange(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SsoError::Exchange(format!("{} {}", status, body)));
        }

        let body: ExchangeResponse = resp
            .json()
            .await
            .map_err(|e| SsoError::Exchange(e.to_string()))?;

        match (body.token, body.csrf) {
            (Some(token), Some(csrf)) if !token.is_empty() && !csrf.is_empty() => {
                debug!("challenge token exchange succeeded");
                Ok(SessionCredential {
                    bearer_token: token,
                    csrf_token: csrf,
                })
            }
            _ => Err(SsoError::Exchange(
                "no session token in exchange response".into(),
            )),
        }
    }

    fn reset(&self) {
        debug!("resetting exchange client");
        *self.client.write().unwrap_or_else(|e| e.into_inner()) = Self::build_client();
    }
}
