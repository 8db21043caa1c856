use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::models::{PageResponse, PageTree, PageUpdateRequest, RelayError};
use crate::ws::pagekey::PageKey;

/// Credential attached to every outbound content API call.
///
/// Either a statically configured bearer token, or a short-lived service JWT
/// minted per request.
#[derive(Clone)]
pub enum Credential {
    Static(String),
    ServiceJwt { secret: String, service_name: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(rename = "type")]
    type_: String,
    exp: usize,
}

impl Credential {
    fn bearer(&self) -> String {
        match self {
            Credential::Static(token) => token.clone(),
            Credential::ServiceJwt { secret, service_name } => {
                let expiration = Utc::now()
                    .checked_add_signed(Duration::seconds(60)) // 1 minute expiration
                    .expect("valid timestamp")
                    .timestamp();

                let claims = Claims {
                    sub: service_name.clone(),
                    type_: "service".to_string(),
                    exp: expiration as usize,
                };

                encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
                    .expect("Failed to generate JWT")
            }
        }
    }
}

/// Client for the content API that durably owns page content.
///
/// Holds no state between calls and never retries; the session layer decides
/// what a failed fetch or store means.
pub struct ContentApiClient {
    client: Client,
    base_url: String,
    credential: Credential,
}

impl ContentApiClient {
    pub fn new(base_url: String, credential: Credential, timeout: std::time::Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
        }
    }

    fn page_url(&self, key: &PageKey) -> String {
        format!(
            "{}/api/workspaces/{}/projects/{}/pages/{}/",
            self.base_url, key.workspace_slug, key.project_id, key.page_id
        )
    }

    /// Fetch the persisted representation of a page.
    pub async fn fetch_page(&self, key: &PageKey) -> Result<PageResponse, RelayError> {
        let url = self.page_url(key);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.credential.bearer()))
            .send()
            .await
            .map_err(|e| RelayError::Network(format!("GET {} failed: {}", url, e)))?;

        let response = check_status(response, key).await?;
        response
            .json::<PageResponse>()
            .await
            .map_err(|e| RelayError::Conversion(format!("invalid page payload for '{}': {}", key, e)))
    }

    /// Persist a snapshot (and its JSON projection) back to a page.
    ///
    /// The PATCH body is JSON with a base64 snapshot field, symmetric with
    /// what `fetch_page` reads back.
    pub async fn store_page(
        &self,
        key: &PageKey,
        snapshot: &[u8],
        tree: &PageTree,
    ) -> Result<(), RelayError> {
        let url = self.page_url(key);
        let body = PageUpdateRequest {
            description_binary: general_purpose::STANDARD.encode(snapshot),
            description: tree.clone(),
        };

        let response = self
            .client
            .patch(&url)
            .header("Authorization", format!("Bearer {}", self.credential.bearer()))
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Network(format!("PATCH {} failed: {}", url, e)))?;

        check_status(response, key).await?;
        Ok(())
    }
}

async fn check_status(response: Response, key: &PageKey) -> Result<Response, RelayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    error!("Content API error for '{}': status {}, body: {}", key, code, body);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RelayError::Auth { status: code, body }),
        StatusCode::NOT_FOUND => Err(RelayError::NotFound { status: code, body }),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            Err(RelayError::Validation { status: code, body })
        }
        _ => Err(RelayError::Network(format!("status {}: {}", code, body))),
    }
}
