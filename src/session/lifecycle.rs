use super::controller::Intent;
use super::runtime::SessionHandle;
use crate::api::{ApiError, CaseStudy, SessionApi};
use crate::mode::{rewind_targets, IntentError, RewindTarget, SessionMode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no active session")]
    NoSession,

    #[error("session {0} is already active")]
    AlreadyActive(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Intent(#[from] IntentError),
}

/// What the session service handed out for the active session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub root_branch_id: String,
    pub active_branch_id: String,
    pub room_name: String,
    #[serde(skip)]
    pub token: String,
}

struct ActiveSession {
    info: SessionInfo,
    runtime: Option<(SessionHandle, JoinHandle<()>)>,
}

/// Detached view of the active session used to fill the rewind panel
pub struct RewindSource {
    api: Arc<dyn SessionApi>,
    identity: String,
    session_id: String,
    handle: SessionHandle,
}

impl RewindSource {
    pub async fn fetch(self) -> Result<Vec<RewindTarget>, LifecycleError> {
        let view = self.handle.view();
        if view.mode != SessionMode::Paused {
            return Err(IntentError::InvalidMode {
                intent: "rewind selection",
                mode: view.mode,
            }
            .into());
        }

        let transcript = self
            .api
            .fetch_transcript(&self.session_id, &view.branch_id)
            .await?;
        let targets = rewind_targets(transcript.utterances, &self.identity);
        debug!(
            "Fetched {} utterances for branch {}",
            targets.len(),
            view.branch_id
        );

        self.handle
            .send(Intent::LoadRewindTargets(targets.clone()))
            .await?;
        Ok(targets)
    }
}

/// Start/end orchestration against the session service.
///
/// At most one session is active. The runtime for the room is attached once
/// the caller has joined it with the minted token.
pub struct Lifecycle {
    api: Arc<dyn SessionApi>,
    identity: String,
    unload_grace: Duration,
    active: Option<ActiveSession>,
}

impl Lifecycle {
    pub fn new(api: Arc<dyn SessionApi>, identity: impl Into<String>, unload_grace: Duration) -> Self {
        Self {
            api,
            identity: identity.into(),
            unload_grace,
            active: None,
        }
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        self.active.as_ref().map(|a| &a.info)
    }

    /// Handle to the attached runtime, if any
    pub fn handle(&self) -> Option<SessionHandle> {
        self.active
            .as_ref()
            .and_then(|a| a.runtime.as_ref())
            .map(|(handle, _)| handle.clone())
    }

    pub async fn list_case_studies(&self) -> Result<Vec<CaseStudy>, LifecycleError> {
        Ok(self.api.list_case_studies().await?)
    }

    /// Start a session on `case_study_id` and mint the room token.
    ///
    /// Nothing is recorded unless both calls succeed.
    pub async fn start(&mut self, case_study_id: &str) -> Result<SessionInfo, LifecycleError> {
        if let Some(active) = &self.active {
            return Err(LifecycleError::AlreadyActive(active.info.session_id.clone()));
        }

        info!("Starting session for case study {}", case_study_id);
        let started = self.api.start_session(case_study_id, &self.identity).await?;

        let token = match self.api.mint_token(&started.session_id, &self.identity).await {
            Ok(token) => token,
            Err(e) => {
                error!("Failed to mint room token: {}", e);
                // The server already holds a session; don't leave it running
                if let Err(stop) = self.api.stop_session(&started.session_id).await {
                    warn!("Failed to stop orphaned session {}: {}", started.session_id, stop);
                }
                return Err(e.into());
            }
        };

        let info = SessionInfo {
            session_id: started.session_id,
            root_branch_id: started.root_branch_id,
            active_branch_id: started.active_branch_id,
            room_name: token.room_name,
            token: token.token,
        };
        info!(
            "Session {} started in room {}",
            info.session_id, info.room_name
        );

        self.active = Some(ActiveSession {
            info: info.clone(),
            runtime: None,
        });
        Ok(info)
    }

    /// Attach the runtime driving the active session's room.
    pub fn attach(&mut self, handle: SessionHandle, task: JoinHandle<()>) -> Result<(), LifecycleError> {
        match self.active.as_mut() {
            Some(active) => {
                active.runtime = Some((handle, task));
                Ok(())
            }
            None => {
                task.abort();
                Err(LifecycleError::NoSession)
            }
        }
    }

    /// Everything needed to load rewind targets without borrowing `self`.
    ///
    /// Callers sharing the lifecycle behind a lock should take this, release
    /// the lock and then [`RewindSource::fetch`].
    pub fn rewind_source(&self) -> Result<RewindSource, LifecycleError> {
        let session_id = self
            .session()
            .map(|info| info.session_id.clone())
            .ok_or(LifecycleError::NoSession)?;
        let handle = self.handle().ok_or(LifecycleError::NoSession)?;

        Ok(RewindSource {
            api: Arc::clone(&self.api),
            identity: self.identity.clone(),
            session_id,
            handle,
        })
    }

    /// Fetch the active branch transcript and open it in the rewind panel.
    pub async fn fetch_rewind_targets(&self) -> Result<Vec<RewindTarget>, LifecycleError> {
        self.rewind_source()?.fetch().await
    }

    /// End the active session.
    ///
    /// `finish` and the stop call are best-effort; local state is always
    /// cleared.
    pub async fn end(&mut self) -> Result<(), LifecycleError> {
        let active = self.active.take().ok_or(LifecycleError::NoSession)?;
        let session_id = active.info.session_id;
        info!("Ending session {}", session_id);

        if let Some((handle, _)) = &active.runtime {
            if let Err(e) = handle.send(Intent::Finish).await {
                debug!("finish not sent: {}", e);
            }
        }

        if let Err(e) = self.api.stop_session(&session_id).await {
            warn!("Failed to stop session {}: {}", session_id, e);
        }

        if let Some((handle, task)) = active.runtime {
            handle.shutdown().await;
            if let Err(e) = task.await {
                error!("Session runtime task failed: {}", e);
            }
        }

        info!("Session {} ended", session_id);
        Ok(())
    }

    /// Process is going away: fire the stop call within the grace period and
    /// ignore whatever happens.
    pub async fn on_unload(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let session_id = active.info.session_id;

        match tokio::time::timeout(self.unload_grace, self.api.stop_session(&session_id)).await {
            Ok(Ok(_)) => info!("Session {} stopped on unload", session_id),
            Ok(Err(e)) => debug!("Stop on unload failed: {}", e),
            Err(_) => debug!("Stop on unload timed out"),
        }

        if let Some((handle, task)) = active.runtime {
            handle.shutdown().await;
            task.abort();
        }
    }
}
