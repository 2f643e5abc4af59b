use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

use crate::db::models::{
    BusinessPlan, Event, EventDirection, Message, MessageRole, Session, SessionDetail, Task,
};
use crate::gateway::{BusinessPlanInput, NewEvent, NewMessage, NewSession, TaskBatch};
use crate::session::ledger::{RestoreOrigin, RestoreRequest, SessionLedger};
use crate::session::slot::SessionSlot;

/// The conversation-facing wrapper around the ledger.
///
/// Every call is best effort: a failed save is logged and dropped, never
/// retried, and never surfaces as an error to the caller. Calls made before a
/// session exists are skipped.
pub struct SessionRecorder {
    ledger: Arc<SessionLedger>,
    slot: SessionSlot,
    current: Mutex<Option<String>>,
}

impl SessionRecorder {
    pub fn new(ledger: Arc<SessionLedger>, slot: SessionSlot) -> Self {
        Self {
            ledger,
            slot,
            current: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn adopt(&self, id: &str) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(id.to_string());
        if let Err(e) = self.slot.store(id) {
            warn!(session_id = %id, "Failed to cache session id: {}", e);
        }
    }

    /// Restores or creates the session this recorder writes to.
    pub async fn initialize(
        &self,
        agent_config: &str,
        active_agent: Option<&str>,
        user_id: Option<&str>,
    ) -> Option<(Session, RestoreOrigin)> {
        let request = RestoreRequest {
            cached_id: self.slot.load(),
            user_id: user_id.map(str::to_string),
            agent_config: agent_config.to_string(),
            active_agent: active_agent.map(str::to_string),
        };

        match self.ledger.restore(request).await {
            Ok((session, origin)) => {
                info!(session_id = %session.id, ?origin, "Session initialized");
                self.adopt(&session.id);
                Some((session, origin))
            }
            Err(e) => {
                error!("Failed to initialize session: {}", e);
                None
            }
        }
    }

    /// Starts a fresh conversation regardless of what is cached.
    pub async fn start_new(
        &self,
        agent_config: &str,
        active_agent: Option<&str>,
        user_id: Option<&str>,
    ) -> Option<Session> {
        let request = NewSession {
            agent_config: agent_config.to_string(),
            active_agent: active_agent.map(str::to_string),
            user_id: user_id.map(str::to_string),
        };
        match self.ledger.create(request).await {
            Ok(session) => {
                self.adopt(&session.id);
                Some(session)
            }
            Err(e) => {
                error!("Failed to start new session: {}", e);
                None
            }
        }
    }

    pub async fn save_message(
        &self,
        role: MessageRole,
        content: &str,
        is_simulated: bool,
        metadata: Option<serde_json::Value>,
    ) -> Option<Message> {
        let session_id = self.session_id()?;
        let message = NewMessage {
            session_id,
            role,
            content: content.to_string(),
            is_simulated,
            metadata,
        };
        match self.ledger.gateway().append_message(message).await {
            Ok(saved) => Some(saved),
            Err(e) => {
                error!("Failed to save message: {}", e);
                None
            }
        }
    }

    pub async fn save_event(
        &self,
        direction: EventDirection,
        event_name: &str,
        event_data: serde_json::Value,
    ) -> Option<Event> {
        let session_id = self.session_id()?;
        let event = NewEvent {
            session_id,
            direction,
            event_name: event_name.to_string(),
            event_data,
        };
        match self.ledger.gateway().append_event(event).await {
            Ok(saved) => Some(saved),
            Err(e) => {
                error!("Failed to save event: {}", e);
                None
            }
        }
    }

    pub async fn save_tasks(&self, business_id: Option<&str>, tasks: Vec<Task>) -> Option<Vec<Task>> {
        let session_id = self.session_id()?;
        let batch = TaskBatch {
            session_id: Some(session_id),
            business_id: business_id.map(str::to_string),
            tasks,
        };
        match self.ledger.gateway().upsert_tasks(batch).await {
            Ok(saved) => Some(saved),
            Err(e) => {
                error!("Failed to save tasks: {}", e);
                None
            }
        }
    }

    /// Saves the plan under the current session, whatever session id it carried.
    pub async fn save_business_plan(&self, mut plan: BusinessPlanInput) -> Option<BusinessPlan> {
        plan.session_id = self.session_id()?;
        match self.ledger.gateway().upsert_business_plan(plan).await {
            Ok(saved) => Some(saved),
            Err(e) => {
                error!("Failed to save business plan: {}", e);
                None
            }
        }
    }

    pub async fn switch_persona(&self, persona: &str) -> Option<Session> {
        let session_id = self.session_id()?;
        match self.ledger.switch_persona(&session_id, persona).await {
            Ok(session) => Some(session),
            Err(e) => {
                error!("Failed to update active agent: {}", e);
                None
            }
        }
    }

    /// Marks the current session completed and forgets it locally, so the
    /// next `initialize` starts over.
    pub async fn end_session(&self) -> Option<Session> {
        let session_id = self.session_id()?;
        let ended = match self.ledger.complete(&session_id).await {
            Ok(session) => Some(session),
            Err(e) => {
                error!("Failed to end session: {}", e);
                None
            }
        };

        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
        if let Err(e) = self.slot.clear() {
            warn!("Failed to clear cached session id: {}", e);
        }
        ended
    }

    /// Switches to an existing session and returns its full record.
    pub async fn load(&self, id: &str) -> Option<SessionDetail> {
        match self.ledger.get(id).await {
            Ok(detail) => {
                self.adopt(&detail.session.id);
                Some(detail)
            }
            Err(e) => {
                error!(session_id = %id, "Failed to load session: {}", e);
                None
            }
        }
    }
}
