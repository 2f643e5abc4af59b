//! Request/response boundary between the session stores and durable storage.
//!
//! Every write either succeeds and returns the durable record or fails with a
//! [`GatewayError`] and leaves caller-visible state untouched.

pub mod error;
pub mod http;
pub mod local;

pub use error::{GatewayError, GatewayResult};
pub use http::HttpGateway;
pub use local::LocalGateway;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{
    BusinessPhase, BusinessPlan, Department, Event, EventDirection, Message, MessageRole,
    Session, SessionDetail, SessionStatus, Task, TaskStatus,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    #[serde(default)]
    pub agent_config: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Partial session update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl SessionPatch {
    /// Applies the patch to a copy of `session`.
    ///
    /// Ownership only moves from anonymous to owned: a session that already
    /// belongs to a user cannot be handed to a different one.
    pub fn apply(&self, session: &Session, now: DateTime<Utc>) -> GatewayResult<Session> {
        let mut updated = session.clone();

        if let Some(user_id) = &self.user_id {
            if user_id.trim().is_empty() {
                return Err(GatewayError::Validation("userId must not be empty".into()));
            }
            match &session.user_id {
                Some(owner) if owner != user_id => {
                    return Err(GatewayError::Validation(format!(
                        "session {} already belongs to another user",
                        session.id
                    )));
                }
                _ => updated.user_id = Some(user_id.clone()),
            }
        }
        if let Some(active_agent) = &self.active_agent {
            updated.active_agent = Some(active_agent.clone());
        }
        if let Some(status) = self.status {
            updated.status = status;
        }

        updated.updated_at = now;
        Ok(updated)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub is_simulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub session_id: String,
    pub direction: EventDirection,
    pub event_name: String,
    #[serde(default)]
    pub event_data: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    pub tasks: Vec<Task>,
}

impl TaskBatch {
    /// Collapses repeated ids within one scope so the last write wins,
    /// keeping the position of its first appearance.
    pub fn deduplicated(&self) -> Vec<Task> {
        let mut out: Vec<Task> = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            let same = |t: &Task| t.id == task.id && self.scope_of(t) == self.scope_of(task);
            match out.iter_mut().find(|t| same(&**t)) {
                Some(slot) => *slot = task.clone(),
                None => out.push(task.clone()),
            }
        }
        out
    }

    /// Merges an incoming task over the stored one, if any.
    ///
    /// A new task takes the batch's session; an existing one keeps its own.
    /// The batch business id overrides the task's.
    pub fn merge(&self, existing: Option<&Task>, incoming: &Task, now: DateTime<Utc>) -> Task {
        let mut task = incoming.clone();

        let team = task.department.team();
        if task.assigned_to.trim().is_empty() {
            task.assigned_to = team.producer.to_string();
        }
        if task.reviewed_by.trim().is_empty() {
            task.reviewed_by = team.reviewer.to_string();
        }
        if self.business_id.is_some() {
            task.business_id = self.business_id.clone();
        }

        match existing {
            Some(stored) => {
                task.session_id = stored.session_id.clone();
                task.business_id = task.business_id.or_else(|| stored.business_id.clone());
                task.delegated_at = task.delegated_at.or(stored.delegated_at);
                task.started_at = task.started_at.or(stored.started_at);
                task.completed_at = task.completed_at.or(stored.completed_at);
                task.actual_hours = task.actual_hours.or(stored.actual_hours);
                task.notes = task.notes.or_else(|| stored.notes.clone());
                task.updated_at = Some(now);
            }
            None => {
                task.session_id = self.session_id.clone().or(task.session_id);
            }
        }

        stamp_completion(&mut task, now);
        task
    }

    /// The business and session an incoming task is looked up under.
    pub fn scope_of<'a>(&'a self, task: &'a Task) -> (Option<&'a str>, Option<&'a str>) {
        (
            self.business_id.as_deref().or(task.business_id.as_deref()),
            self.session_id.as_deref().or(task.session_id.as_deref()),
        )
    }
}

/// `completed_at` is set while a task is completed and only then.
fn stamp_completion(task: &mut Task, now: DateTime<Utc>) {
    if task.status == TaskStatus::Completed {
        task.completed_at.get_or_insert(now);
    } else {
        task.completed_at = None;
    }
}

/// Task listing filters; combined with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    /// Selects the business whose task is patched; needed once the id is
    /// used by more than one business.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    /// Selects by owning session instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,
}

impl TaskPatch {
    pub fn apply(&self, task: &Task, now: DateTime<Utc>) -> GatewayResult<Task> {
        if let Some(progress) = self.progress {
            if !(0..=100).contains(&progress) {
                return Err(GatewayError::Validation(format!(
                    "progress must be between 0 and 100, got {}",
                    progress
                )));
            }
        }

        let mut updated = task.clone();
        if let Some(status) = self.status {
            updated.status = status;
        }
        if let Some(progress) = self.progress {
            updated.progress = Some(progress);
        }
        if let Some(notes) = &self.notes {
            updated.notes = Some(notes.clone());
        }
        if let Some(blockers) = &self.blockers {
            updated.blockers = Some(blockers.clone());
        }
        if let Some(started_at) = self.started_at {
            updated.started_at = Some(started_at);
        }
        if let Some(completed_at) = self.completed_at {
            updated.completed_at = Some(completed_at);
        }
        if let Some(actual_hours) = self.actual_hours {
            updated.actual_hours = Some(actual_hours);
        }

        stamp_completion(&mut updated, now);
        updated.updated_at = Some(now);
        Ok(updated)
    }
}

/// Upsert payload for a business plan, keyed by `business_id`.
///
/// On update, absent fields keep their stored values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessPlanInput {
    pub session_id: String,
    pub business_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_idea: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_market: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finance_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hr_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<BusinessPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_summary: Option<String>,
}

impl From<&BusinessPlan> for BusinessPlanInput {
    fn from(plan: &BusinessPlan) -> Self {
        Self {
            session_id: plan.session_id.clone(),
            business_id: plan.business_id.clone(),
            business_name: Some(plan.business_name.clone()),
            business_idea: Some(plan.business_idea.clone()),
            target_market: Some(plan.target_market.clone()),
            revenue_model: Some(plan.revenue_model.clone()),
            timeline: plan.timeline.clone(),
            budget: plan.budget.clone(),
            technical_plan: plan.technical_plan.clone(),
            marketing_plan: plan.marketing_plan.clone(),
            sales_plan: plan.sales_plan.clone(),
            legal_plan: plan.legal_plan.clone(),
            finance_plan: plan.finance_plan.clone(),
            operations_plan: plan.operations_plan.clone(),
            hr_plan: plan.hr_plan.clone(),
            current_phase: Some(plan.current_phase),
            conversation_summary: plan.conversation_summary.clone(),
        }
    }
}

impl BusinessPlanInput {
    pub fn merge(
        &self,
        existing: Option<BusinessPlan>,
        now: DateTime<Utc>,
    ) -> GatewayResult<BusinessPlan> {
        match existing {
            Some(mut plan) => {
                fn keep(slot: &mut String, value: &Option<String>) {
                    if let Some(v) = value {
                        *slot = v.clone();
                    }
                }
                fn keep_opt(slot: &mut Option<String>, value: &Option<String>) {
                    if value.is_some() {
                        *slot = value.clone();
                    }
                }

                keep(&mut plan.business_name, &self.business_name);
                keep(&mut plan.business_idea, &self.business_idea);
                keep(&mut plan.target_market, &self.target_market);
                keep(&mut plan.revenue_model, &self.revenue_model);
                keep_opt(&mut plan.timeline, &self.timeline);
                keep_opt(&mut plan.budget, &self.budget);
                keep_opt(&mut plan.technical_plan, &self.technical_plan);
                keep_opt(&mut plan.marketing_plan, &self.marketing_plan);
                keep_opt(&mut plan.sales_plan, &self.sales_plan);
                keep_opt(&mut plan.legal_plan, &self.legal_plan);
                keep_opt(&mut plan.finance_plan, &self.finance_plan);
                keep_opt(&mut plan.operations_plan, &self.operations_plan);
                keep_opt(&mut plan.hr_plan, &self.hr_plan);
                keep_opt(&mut plan.conversation_summary, &self.conversation_summary);
                if let Some(phase) = self.current_phase {
                    plan.current_phase = phase;
                }
                plan.updated_at = now;
                Ok(plan)
            }
            None => {
                let required = |value: &Option<String>, field: &str| -> GatewayResult<String> {
                    match value {
                        Some(v) if !v.trim().is_empty() => Ok(v.clone()),
                        _ => Err(GatewayError::Validation(format!(
                            "{} is required for a new business plan",
                            field
                        ))),
                    }
                };

                Ok(BusinessPlan {
                    business_id: self.business_id.clone(),
                    session_id: self.session_id.clone(),
                    business_name: required(&self.business_name, "businessName")?,
                    business_idea: required(&self.business_idea, "businessIdea")?,
                    target_market: required(&self.target_market, "targetMarket")?,
                    revenue_model: required(&self.revenue_model, "revenueModel")?,
                    timeline: self.timeline.clone(),
                    budget: self.budget.clone(),
                    technical_plan: self.technical_plan.clone(),
                    marketing_plan: self.marketing_plan.clone(),
                    sales_plan: self.sales_plan.clone(),
                    legal_plan: self.legal_plan.clone(),
                    finance_plan: self.finance_plan.clone(),
                    operations_plan: self.operations_plan.clone(),
                    hr_plan: self.hr_plan.clone(),
                    current_phase: self.current_phase.unwrap_or_default(),
                    conversation_summary: self.conversation_summary.clone(),
                    created_at: now,
                    updated_at: now,
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanLookup {
    Session(String),
    Business(String),
}

/// Durable storage for sessions and everything keyed off them.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn create_session(&self, request: NewSession) -> GatewayResult<Session>;

    async fn get_session(&self, id: &str) -> GatewayResult<SessionDetail>;

    /// Newest first; `user_id` narrows to one owner.
    async fn list_sessions(&self, user_id: Option<&str>) -> GatewayResult<Vec<Session>>;

    async fn update_session(&self, id: &str, patch: SessionPatch) -> GatewayResult<Session>;

    async fn append_message(&self, message: NewMessage) -> GatewayResult<Message>;

    async fn list_messages(&self, session_id: &str) -> GatewayResult<Vec<Message>>;

    async fn append_event(&self, event: NewEvent) -> GatewayResult<Event>;

    async fn list_events(&self, session_id: &str) -> GatewayResult<Vec<Event>>;

    async fn upsert_tasks(&self, batch: TaskBatch) -> GatewayResult<Vec<Task>>;

    async fn list_tasks(&self, query: TaskQuery) -> GatewayResult<Vec<Task>>;

    async fn update_task(&self, id: &str, patch: TaskPatch) -> GatewayResult<Task>;

    async fn upsert_business_plan(&self, plan: BusinessPlanInput) -> GatewayResult<BusinessPlan>;

    async fn get_business_plan(&self, lookup: PlanLookup) -> GatewayResult<BusinessPlan>;
}

pub(crate) fn require(value: &str, field: &str) -> GatewayResult<()> {
    if value.trim().is_empty() {
        Err(GatewayError::Validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}
