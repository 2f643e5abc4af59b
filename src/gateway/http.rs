use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::db::models::{BusinessPlan, Event, Message, Session, SessionDetail, Task};
use crate::gateway::{
    require, BusinessPlanInput, GatewayError, GatewayResult, NewEvent, NewMessage, NewSession,
    PersistenceGateway, PlanLookup, SessionPatch, TaskBatch, TaskPatch, TaskQuery,
};

/// Gateway that talks to a running `boardroom serve` over its `/api/db` routes.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    kind: Option<String>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/db/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> GatewayResult<T> {
        let request = match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await.unwrap_or_default();
        debug!(%status, body = %text, "Remote storage call failed");
        Err(error_from_response(status, &text))
    }
}

/// Rebuilds the error the server reported, falling back to the status code
/// when the body is not one of ours.
fn error_from_response(status: StatusCode, text: &str) -> GatewayError {
    let (message, kind) = match serde_json::from_str::<ErrorBody>(text) {
        Ok(body) => (body.error, body.kind),
        Err(_) => (format!("HTTP {}: {}", status, text), None),
    };

    match kind.as_deref() {
        Some("not_found") => GatewayError::NotFound(message),
        Some("validation") => GatewayError::Validation(message),
        Some("network") => GatewayError::Network(message),
        Some("internal") => GatewayError::Internal(message),
        _ => match status {
            StatusCode::NOT_FOUND => GatewayError::NotFound(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                GatewayError::Validation(message)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                GatewayError::Validation(format!("rejected credentials: {}", message))
            }
            _ => GatewayError::Internal(message),
        },
    }
}

#[async_trait]
impl PersistenceGateway for HttpGateway {
    async fn create_session(&self, request: NewSession) -> GatewayResult<Session> {
        require(&request.agent_config, "agentConfig")?;
        self.send(self.client.post(self.url("session")).json(&request))
            .await
    }

    async fn get_session(&self, id: &str) -> GatewayResult<SessionDetail> {
        require(id, "sessionId")?;
        self.send(self.client.get(self.url("session")).query(&[("sessionId", id)]))
            .await
    }

    async fn list_sessions(&self, user_id: Option<&str>) -> GatewayResult<Vec<Session>> {
        let mut request = self.client.get(self.url("session"));
        if let Some(user_id) = user_id {
            request = request.query(&[("userId", user_id)]);
        }
        self.send(request).await
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> GatewayResult<Session> {
        require(id, "sessionId")?;
        let mut body = serde_json::to_value(&patch)
            .map_err(|e| GatewayError::Internal(format!("encode session patch: {}", e)))?;
        body["sessionId"] = json!(id);
        self.send(self.client.patch(self.url("session")).json(&body))
            .await
    }

    async fn append_message(&self, message: NewMessage) -> GatewayResult<Message> {
        require(&message.session_id, "sessionId")?;
        self.send(self.client.post(self.url("message")).json(&message))
            .await
    }

    async fn list_messages(&self, session_id: &str) -> GatewayResult<Vec<Message>> {
        require(session_id, "sessionId")?;
        self.send(
            self.client
                .get(self.url("message"))
                .query(&[("sessionId", session_id)]),
        )
        .await
    }

    async fn append_event(&self, event: NewEvent) -> GatewayResult<Event> {
        require(&event.session_id, "sessionId")?;
        self.send(self.client.post(self.url("event")).json(&event))
            .await
    }

    async fn list_events(&self, session_id: &str) -> GatewayResult<Vec<Event>> {
        require(session_id, "sessionId")?;
        self.send(
            self.client
                .get(self.url("event"))
                .query(&[("sessionId", session_id)]),
        )
        .await
    }

    async fn upsert_tasks(&self, batch: TaskBatch) -> GatewayResult<Vec<Task>> {
        self.send(self.client.post(self.url("task")).json(&batch))
            .await
    }

    async fn list_tasks(&self, query: TaskQuery) -> GatewayResult<Vec<Task>> {
        self.send(self.client.get(self.url("task")).query(&query))
            .await
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> GatewayResult<Task> {
        require(id, "taskId")?;
        let mut body = serde_json::to_value(&patch)
            .map_err(|e| GatewayError::Internal(format!("encode task patch: {}", e)))?;
        body["taskId"] = json!(id);
        self.send(self.client.patch(self.url("task")).json(&body))
            .await
    }

    async fn upsert_business_plan(&self, plan: BusinessPlanInput) -> GatewayResult<BusinessPlan> {
        require(&plan.business_id, "businessId")?;
        require(&plan.session_id, "sessionId")?;
        self.send(self.client.post(self.url("business-plan")).json(&plan))
            .await
    }

    async fn get_business_plan(&self, lookup: PlanLookup) -> GatewayResult<BusinessPlan> {
        let param = match &lookup {
            PlanLookup::Session(id) => ("sessionId", id.as_str()),
            PlanLookup::Business(id) => ("businessId", id.as_str()),
        };
        self.send(self.client.get(self.url("business-plan")).query(&[param]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_kind_wins_over_status() {
        let err = error_from_response(
            StatusCode::BAD_REQUEST,
            r#"{"error":"session s1 not found","kind":"not_found"}"#,
        );
        assert_eq!(err, GatewayError::NotFound("session s1 not found".into()));
    }

    #[test]
    fn foreign_bodies_fall_back_to_status() {
        assert_eq!(
            error_from_response(StatusCode::NOT_FOUND, "nope").kind(),
            "not_found"
        );
        assert_eq!(
            error_from_response(StatusCode::BAD_GATEWAY, "<html>").kind(),
            "internal"
        );
        assert_eq!(
            error_from_response(StatusCode::UNAUTHORIZED, r#"{"error":"Unauthorized"}"#).kind(),
            "validation"
        );
    }
}
