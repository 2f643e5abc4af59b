use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::db::models::{Session, SessionDetail, SessionStatus};
use crate::gateway::{GatewayResult, NewSession, PersistenceGateway, SessionPatch};

type PendingCreate = Shared<BoxFuture<'static, GatewayResult<Session>>>;

/// Where [`SessionLedger::restore`] found its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreOrigin {
    /// The locally cached id still pointed at an active session.
    Cached,
    /// The user's most recent active session for the same agent config.
    UserActive,
    Created,
}

#[derive(Debug, Clone, Default)]
pub struct RestoreRequest {
    pub cached_id: Option<String>,
    pub user_id: Option<String>,
    pub agent_config: String,
    pub active_agent: Option<String>,
}

/// Session identity and lifecycle on top of a [`PersistenceGateway`].
///
/// Concurrent `create` calls share one in-flight request: the first caller
/// installs it, later callers await the same result, and the slot is cleared
/// once it settles so a genuinely new create can proceed.
pub struct SessionLedger {
    gateway: Arc<dyn PersistenceGateway>,
    in_flight: Mutex<Option<(u64, PendingCreate)>>,
    tickets: AtomicU64,
}

impl SessionLedger {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            gateway,
            in_flight: Mutex::new(None),
            tickets: AtomicU64::new(0),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }

    fn slot(&self) -> MutexGuard<'_, Option<(u64, PendingCreate)>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn create(&self, request: NewSession) -> GatewayResult<Session> {
        let (ticket, pending) = {
            let mut slot = self.slot();
            match slot.as_ref() {
                Some((ticket, pending)) => {
                    debug!(ticket, "Joining in-flight session create");
                    (*ticket, pending.clone())
                }
                None => {
                    let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
                    let gateway = self.gateway.clone();
                    let pending = async move { gateway.create_session(request).await }
                        .boxed()
                        .shared();
                    *slot = Some((ticket, pending.clone()));
                    (ticket, pending)
                }
            }
        };

        let result = pending.await;

        let mut slot = self.slot();
        if matches!(slot.as_ref(), Some((current, _)) if *current == ticket) {
            *slot = None;
        }
        result
    }

    pub async fn get(&self, id: &str) -> GatewayResult<SessionDetail> {
        self.gateway.get_session(id).await
    }

    pub async fn update(&self, id: &str, patch: SessionPatch) -> GatewayResult<Session> {
        self.gateway.update_session(id, patch).await
    }

    /// Attaches an anonymous session to `user_id`. Re-linking to the same user
    /// is a no-op; a different user is rejected.
    pub async fn link_user(&self, id: &str, user_id: &str) -> GatewayResult<Session> {
        self.update(
            id,
            SessionPatch {
                user_id: Some(user_id.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn switch_persona(&self, id: &str, persona: &str) -> GatewayResult<Session> {
        self.update(
            id,
            SessionPatch {
                active_agent: Some(persona.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn complete(&self, id: &str) -> GatewayResult<Session> {
        self.update(
            id,
            SessionPatch {
                status: Some(SessionStatus::Completed),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn list_by_user(&self, user_id: &str) -> GatewayResult<Vec<Session>> {
        self.gateway.list_sessions(Some(user_id)).await
    }

    pub async fn list_all(&self) -> GatewayResult<Vec<Session>> {
        self.gateway.list_sessions(None).await
    }

    /// Picks the session a reconnecting client should continue, in order:
    /// the cached id if still active, then the user's newest active session
    /// for the same agent config, then a fresh session.
    pub async fn restore(&self, request: RestoreRequest) -> GatewayResult<(Session, RestoreOrigin)> {
        if let Some(cached_id) = request.cached_id.as_deref().filter(|id| !id.trim().is_empty()) {
            match self.get(cached_id).await {
                Ok(detail) if detail.session.status == SessionStatus::Active => {
                    info!(session_id = %cached_id, "Restored cached session");
                    return Ok((detail.session, RestoreOrigin::Cached));
                }
                Ok(_) => debug!(session_id = %cached_id, "Cached session is no longer active"),
                Err(e) => warn!(session_id = %cached_id, "Could not restore cached session: {}", e),
            }
        }

        if let Some(user_id) = request.user_id.as_deref() {
            let sessions = self.list_by_user(user_id).await?;
            if let Some(session) = sessions.into_iter().find(|s| {
                s.status == SessionStatus::Active && s.agent_config == request.agent_config
            }) {
                info!(session_id = %session.id, user_id, "Resumed user's active session");
                return Ok((session, RestoreOrigin::UserActive));
            }
        }

        let session = self
            .create(NewSession {
                agent_config: request.agent_config,
                active_agent: request.active_agent,
                user_id: request.user_id,
            })
            .await?;
        Ok((session, RestoreOrigin::Created))
    }
}
