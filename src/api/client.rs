use super::types::{
    CaseStudy, StartSessionRequest, StartSessionResponse, StopSessionResponse, TokenRequest,
    TokenResponse, Transcript,
};
use super::{ApiError, SessionApi};
use crate::config::ApiConfig;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Token role requested for the local user
const FACILITATOR_ROLE: &str = "facilitator";

/// [`SessionApi`] over HTTP/JSON
pub struct HttpSessionApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSessionApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|source| ApiError::Request {
                operation: "client setup",
                source,
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Request { operation, source })?;

        let status = response.status();
        debug!(operation, status = status.as_u16(), "Session API response");
        if !status.is_success() {
            return Err(ApiError::Status {
                operation,
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| ApiError::Request { operation, source })
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn start_session(
        &self,
        case_study_id: &str,
        created_by: &str,
    ) -> Result<StartSessionResponse, ApiError> {
        let body = StartSessionRequest {
            case_study_id: case_study_id.to_string(),
            created_by: created_by.to_string(),
            config: serde_json::json!({}),
        };
        let request = self.client.post(self.url("/sessions/start")).json(&body);
        Self::send("start session", request).await
    }

    async fn stop_session(&self, session_id: &str) -> Result<StopSessionResponse, ApiError> {
        let request = self
            .client
            .post(self.url(&format!("/sessions/{}/stop", session_id)));
        Self::send("stop session", request).await
    }

    async fn mint_token(&self, session_id: &str, identity: &str) -> Result<TokenResponse, ApiError> {
        let body = TokenRequest {
            identity: identity.to_string(),
            role: FACILITATOR_ROLE.to_string(),
        };
        let request = self
            .client
            .post(self.url(&format!("/sessions/{}/token", session_id)))
            .json(&body);
        Self::send("mint token", request).await
    }

    async fn list_case_studies(&self) -> Result<Vec<CaseStudy>, ApiError> {
        let request = self.client.get(self.url("/case-studies"));
        Self::send("list case studies", request).await
    }

    async fn fetch_transcript(
        &self,
        session_id: &str,
        branch_id: &str,
    ) -> Result<Transcript, ApiError> {
        let request = self.client.get(self.url(&format!(
            "/sessions/{}/branches/{}/transcript",
            session_id, branch_id
        )));
        Self::send("fetch transcript", request).await
    }
}
