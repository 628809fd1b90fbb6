//! Session management API client
//!
//! The HTTP service that starts/stops simulations, mints room tokens and
//! serves case studies and branch transcripts:
//! - POST /sessions/start
//! - POST /sessions/:id/stop
//! - POST /sessions/:id/token
//! - GET /case-studies
//! - GET /sessions/:id/branches/:branch_id/transcript

mod client;
mod types;

pub use client::HttpSessionApi;
pub use types::{
    CaseStudy, StartSessionRequest, StartSessionResponse, StopSessionResponse, TokenRequest,
    TokenResponse, Transcript, Utterance, UtteranceKind,
};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{operation} request failed: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned HTTP {status}")]
    Status { operation: &'static str, status: u16 },

    /// Used by non-HTTP implementations
    #[error("{operation} failed: {message}")]
    Other {
        operation: &'static str,
        message: String,
    },
}

/// Request/response operations of the session service
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn start_session(
        &self,
        case_study_id: &str,
        created_by: &str,
    ) -> Result<StartSessionResponse, ApiError>;

    /// Idempotent; safe to call during shutdown.
    async fn stop_session(&self, session_id: &str) -> Result<StopSessionResponse, ApiError>;

    async fn mint_token(&self, session_id: &str, identity: &str) -> Result<TokenResponse, ApiError>;

    async fn list_case_studies(&self) -> Result<Vec<CaseStudy>, ApiError>;

    async fn fetch_transcript(
        &self,
        session_id: &str,
        branch_id: &str,
    ) -> Result<Transcript, ApiError>;
}
