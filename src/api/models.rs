use serde::Deserialize;

use crate::gateway::{SessionPatch, TaskPatch};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

/// `?sessionId=` on message and event listings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionScope {
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanQuery {
    pub session_id: Option<String>,
    pub business_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdateRequest {
    pub session_id: String,
    #[serde(flatten)]
    pub patch: SessionPatch,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdateRequest {
    pub task_id: String,
    #[serde(flatten)]
    pub patch: TaskPatch,
}
