use async_trait::async_trait;
use duckdb::Connection;
use std::sync::MutexGuard;
use tracing::{debug, info};

use crate::db::models::{BusinessPlan, Event, Message, Session, SessionDetail, Task};
use crate::db::service::{self, DbService, StoredTask, TaskFilter};
use crate::db::DbPool;
use crate::gateway::{
    require, BusinessPlanInput, GatewayError, GatewayResult, NewEvent, NewMessage, NewSession,
    PersistenceGateway, PlanLookup, SessionPatch, TaskBatch, TaskPatch, TaskQuery,
};

/// Gateway backed directly by the DuckDB pool.
///
/// DuckDB calls are blocking, so each operation runs on the blocking pool
/// while holding the connection lock for its whole duration.
#[derive(Clone)]
pub struct LocalGateway {
    pool: DbPool,
}

impl LocalGateway {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn run<T, F>(&self, op: F) -> GatewayResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> GatewayResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&pool)?;
            op(&*conn)
        })
        .await
        .map_err(|e| GatewayError::Internal(format!("storage task failed: {}", e)))?
    }
}

fn lock(pool: &DbPool) -> GatewayResult<MutexGuard<'_, Connection>> {
    pool.lock()
        .map_err(|_| GatewayError::Internal("database connection lock poisoned".into()))
}

fn existing_session(conn: &Connection, id: &str) -> GatewayResult<Session> {
    DbService::get_session(conn, id)?
        .ok_or_else(|| GatewayError::NotFound(format!("session {} not found", id)))
}

/// Finds the one stored task `id` refers to within the given business,
/// else the given session. A task the session holds without a business
/// is picked up when its business arrives. More than one match is an error.
fn resolve_task(
    conn: &Connection,
    id: &str,
    business_id: Option<&str>,
    session_id: Option<&str>,
) -> GatewayResult<Option<StoredTask>> {
    let mut rows = match business_id {
        Some(_) => DbService::find_tasks(conn, id, business_id, None)?,
        None => DbService::find_tasks(conn, id, None, session_id)?,
    };
    if rows.is_empty() && business_id.is_some() && session_id.is_some() {
        rows = DbService::find_tasks(conn, id, None, session_id)?;
        rows.retain(|row| row.task.business_id.is_none());
    }

    match rows.len() {
        0 | 1 => Ok(rows.pop()),
        n => Err(GatewayError::Validation(format!(
            "task {} matches {} stored tasks; pass businessId to choose one",
            id, n
        ))),
    }
}

#[async_trait]
impl PersistenceGateway for LocalGateway {
    async fn create_session(&self, request: NewSession) -> GatewayResult<Session> {
        require(&request.agent_config, "agentConfig")?;

        let session = self
            .run(move |conn| {
                Ok(DbService::insert_session(
                    conn,
                    &request.agent_config,
                    request.active_agent.as_deref(),
                    request.user_id.as_deref(),
                )?)
            })
            .await?;
        info!(session_id = %session.id, agent_config = %session.agent_config, "Created session");
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> GatewayResult<SessionDetail> {
        let id = id.to_string();
        self.run(move |conn| {
            let session = existing_session(conn, &id)?;
            let messages = DbService::get_messages(conn, &id)?;
            let events = DbService::get_events(conn, &id)?;
            let tasks = DbService::list_tasks(
                conn,
                &TaskFilter {
                    session_id: Some(&id),
                    ..Default::default()
                },
            )?;
            let business_plan = DbService::get_business_plan_for_session(conn, &id)?;

            Ok(SessionDetail {
                session,
                messages,
                events,
                tasks,
                business_plan,
            })
        })
        .await
    }

    async fn list_sessions(&self, user_id: Option<&str>) -> GatewayResult<Vec<Session>> {
        let user_id = user_id.map(str::to_string);
        self.run(move |conn| Ok(DbService::list_sessions(conn, user_id.as_deref())?))
            .await
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> GatewayResult<Session> {
        let id = id.to_string();
        self.run(move |conn| {
            let current = existing_session(conn, &id)?;
            let updated = patch.apply(&current, service::now())?;
            DbService::update_session(conn, &updated)?;
            debug!(session_id = %id, status = %updated.status, "Updated session");
            Ok(updated)
        })
        .await
    }

    async fn append_message(&self, message: NewMessage) -> GatewayResult<Message> {
        require(&message.session_id, "sessionId")?;

        self.run(move |conn| {
            existing_session(conn, &message.session_id)?;
            Ok(DbService::insert_message(
                conn,
                &message.session_id,
                message.role,
                &message.content,
                message.is_simulated,
                message.metadata.as_ref(),
            )?)
        })
        .await
    }

    async fn list_messages(&self, session_id: &str) -> GatewayResult<Vec<Message>> {
        require(session_id, "sessionId")?;
        let session_id = session_id.to_string();
        self.run(move |conn| Ok(DbService::get_messages(conn, &session_id)?))
            .await
    }

    async fn append_event(&self, event: NewEvent) -> GatewayResult<Event> {
        require(&event.session_id, "sessionId")?;
        require(&event.event_name, "eventName")?;

        self.run(move |conn| {
            existing_session(conn, &event.session_id)?;
            Ok(DbService::insert_event(
                conn,
                &event.session_id,
                event.direction,
                &event.event_name,
                &event.event_data,
            )?)
        })
        .await
    }

    async fn list_events(&self, session_id: &str) -> GatewayResult<Vec<Event>> {
        require(session_id, "sessionId")?;
        let session_id = session_id.to_string();
        self.run(move |conn| Ok(DbService::get_events(conn, &session_id)?))
            .await
    }

    async fn upsert_tasks(&self, batch: TaskBatch) -> GatewayResult<Vec<Task>> {
        for task in &batch.tasks {
            require(&task.id, "task id")?;
            require(&task.title, "task title")?;
        }

        let stored = self
            .run(move |conn| {
                if let Some(session_id) = &batch.session_id {
                    existing_session(conn, session_id)?;
                }

                let tasks = batch.deduplicated();
                DbService::in_transaction(conn, |conn| {
                    let now = service::now();
                    let mut stored = Vec::with_capacity(tasks.len());
                    for incoming in &tasks {
                        let (business_id, session_id) = batch.scope_of(incoming);
                        let existing = resolve_task(conn, &incoming.id, business_id, session_id)?;
                        let task = batch.merge(existing.as_ref().map(|s| &s.task), incoming, now);
                        match existing {
                            Some(row) => DbService::update_task(conn, row.key, &task)?,
                            None => DbService::insert_task(conn, &task)?,
                        }
                        stored.push(task);
                    }
                    Ok::<_, GatewayError>(stored)
                })
            })
            .await?;
        info!(count = stored.len(), "Upserted tasks");
        Ok(stored)
    }

    async fn list_tasks(&self, query: TaskQuery) -> GatewayResult<Vec<Task>> {
        self.run(move |conn| {
            let filter = TaskFilter {
                session_id: query.session_id.as_deref(),
                business_id: query.business_id.as_deref(),
                department: query.department,
                status: query.status,
            };
            Ok(DbService::list_tasks(conn, &filter)?)
        })
        .await
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> GatewayResult<Task> {
        require(id, "taskId")?;
        let id = id.to_string();
        self.run(move |conn| {
            let current = resolve_task(
                conn,
                &id,
                patch.business_id.as_deref(),
                patch.session_id.as_deref(),
            )?
            .ok_or_else(|| GatewayError::NotFound(format!("task {} not found", id)))?;
            let updated = patch.apply(&current.task, service::now())?;
            DbService::update_task(conn, current.key, &updated)?;
            debug!(task_id = %id, status = %updated.status, "Updated task");
            Ok(updated)
        })
        .await
    }

    async fn upsert_business_plan(&self, plan: BusinessPlanInput) -> GatewayResult<BusinessPlan> {
        require(&plan.business_id, "businessId")?;
        require(&plan.session_id, "sessionId")?;

        self.run(move |conn| {
            existing_session(conn, &plan.session_id)?;
            let existing = DbService::get_business_plan(conn, &plan.business_id)?;
            let is_new = existing.is_none();
            let merged = plan.merge(existing, service::now())?;
            if is_new {
                DbService::insert_business_plan(conn, &merged)?;
            } else {
                DbService::update_business_plan(conn, &merged)?;
            }
            info!(business_id = %merged.business_id, "Saved business plan");
            Ok(merged)
        })
        .await
    }

    async fn get_business_plan(&self, lookup: PlanLookup) -> GatewayResult<BusinessPlan> {
        self.run(move |conn| {
            let found = match &lookup {
                PlanLookup::Session(id) => DbService::get_business_plan_for_session(conn, id)?,
                PlanLookup::Business(id) => DbService::get_business_plan(conn, id)?,
            };
            found.ok_or_else(|| GatewayError::NotFound("business plan not found".into()))
        })
        .await
    }
}
