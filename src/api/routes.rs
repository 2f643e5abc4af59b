use actix_web::{get, patch, post, web, HttpResponse};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::api::models::{
    PlanQuery, SessionQuery, SessionScope, SessionUpdateRequest, TaskUpdateRequest,
};
use crate::db::models::Department;
use crate::gateway::{
    require, BusinessPlanInput, GatewayError, NewEvent, NewMessage, NewSession,
    PersistenceGateway, PlanLookup, TaskBatch, TaskQuery,
};
use crate::personas::{self, PersonaRole};
use crate::session::transcript;
use crate::tasks::AgentPair;
use crate::tools::{self, BusinessDesk, Command, CommandError, CommandOutput};

type Gateway = web::Data<Arc<dyn PersistenceGateway>>;
type ApiResult = Result<HttpResponse, GatewayError>;

fn required_param(value: Option<String>, field: &str) -> Result<String, GatewayError> {
    let value = value.unwrap_or_default();
    require(&value, field)?;
    Ok(value)
}

// --- Sessions ---

#[get("/session")]
pub async fn get_sessions(gateway: Gateway, query: web::Query<SessionQuery>) -> ApiResult {
    let query = query.into_inner();
    if let Some(id) = query.session_id {
        let detail = gateway.get_session(&id).await?;
        return Ok(HttpResponse::Ok().json(detail));
    }
    let sessions = gateway.list_sessions(query.user_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(sessions))
}

#[post("/session")]
pub async fn create_session(gateway: Gateway, req: web::Json<NewSession>) -> ApiResult {
    let session = gateway.create_session(req.into_inner()).await?;
    Ok(HttpResponse::Created().json(session))
}

#[patch("/session")]
pub async fn update_session(gateway: Gateway, req: web::Json<SessionUpdateRequest>) -> ApiResult {
    let req = req.into_inner();
    require(&req.session_id, "sessionId")?;
    let session = gateway.update_session(&req.session_id, req.patch).await?;
    Ok(HttpResponse::Ok().json(session))
}

#[get("/session/{id}/export")]
pub async fn export_session(gateway: Gateway, id: web::Path<String>) -> ApiResult {
    let id = id.into_inner();
    let detail = gateway.get_session(&id).await?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", transcript::file_name(&id)),
        ))
        .body(transcript::render(&detail)))
}

// --- Messages & events ---

#[get("/message")]
pub async fn list_messages(gateway: Gateway, query: web::Query<SessionScope>) -> ApiResult {
    let session_id = required_param(query.into_inner().session_id, "sessionId")?;
    let messages = gateway.list_messages(&session_id).await?;
    Ok(HttpResponse::Ok().json(messages))
}

#[post("/message")]
pub async fn append_message(gateway: Gateway, req: web::Json<NewMessage>) -> ApiResult {
    let message = gateway.append_message(req.into_inner()).await?;
    Ok(HttpResponse::Created().json(message))
}

#[get("/event")]
pub async fn list_events(gateway: Gateway, query: web::Query<SessionScope>) -> ApiResult {
    let session_id = required_param(query.into_inner().session_id, "sessionId")?;
    let events = gateway.list_events(&session_id).await?;
    Ok(HttpResponse::Ok().json(events))
}

#[post("/event")]
pub async fn append_event(gateway: Gateway, req: web::Json<NewEvent>) -> ApiResult {
    let event = gateway.append_event(req.into_inner()).await?;
    Ok(HttpResponse::Created().json(event))
}

// --- Tasks ---

#[get("/task")]
pub async fn list_tasks(gateway: Gateway, query: web::Query<TaskQuery>) -> ApiResult {
    let tasks = gateway.list_tasks(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

#[post("/task")]
pub async fn upsert_tasks(gateway: Gateway, req: web::Json<TaskBatch>) -> ApiResult {
    let tasks = gateway.upsert_tasks(req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

#[patch("/task")]
pub async fn update_task(gateway: Gateway, req: web::Json<TaskUpdateRequest>) -> ApiResult {
    let req = req.into_inner();
    let task = gateway.update_task(&req.task_id, req.patch).await?;
    Ok(HttpResponse::Ok().json(task))
}

// --- Business plans ---

#[get("/business-plan")]
pub async fn get_business_plan(gateway: Gateway, query: web::Query<PlanQuery>) -> ApiResult {
    let query = query.into_inner();
    let lookup = match (query.session_id, query.business_id) {
        (_, Some(business_id)) => PlanLookup::Business(business_id),
        (Some(session_id), None) => PlanLookup::Session(session_id),
        (None, None) => {
            return Err(GatewayError::Validation(
                "sessionId or businessId is required".into(),
            ))
        }
    };
    let plan = gateway.get_business_plan(lookup).await?;
    Ok(HttpResponse::Ok().json(plan))
}

#[post("/business-plan")]
pub async fn upsert_business_plan(gateway: Gateway, req: web::Json<BusinessPlanInput>) -> ApiResult {
    let plan = gateway.upsert_business_plan(req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(plan))
}

// --- Personas & commands ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersonaView {
    name: &'static str,
    role: PersonaRole,
    department: Option<Department>,
    voice: &'static str,
    team: Option<AgentPair>,
    handoffs: Vec<&'static str>,
}

#[get("/personas")]
pub async fn list_personas() -> HttpResponse {
    let roster: Vec<PersonaView> = personas::ROSTER
        .iter()
        .map(|p| PersonaView {
            name: p.name,
            role: p.role,
            department: p.department,
            voice: p.voice,
            team: p.department.map(Department::team),
            handoffs: personas::handoffs(p.name),
        })
        .collect();
    HttpResponse::Ok().json(roster)
}

#[get("/commands")]
pub async fn list_commands() -> HttpResponse {
    HttpResponse::Ok().json(tools::definitions())
}

#[post("/commands")]
pub async fn execute_command(
    desk: web::Data<BusinessDesk>,
    gateway: Gateway,
    scope: web::Query<SessionScope>,
    command: web::Json<Command>,
) -> Result<HttpResponse, CommandError> {
    let scope = scope.into_inner().session_id;
    let command = command.into_inner();
    let mirrors_tasks = matches!(
        command,
        Command::GenerateTasks(_) | Command::DelegateToTeam(_) | Command::UpdateTaskProgress(_)
    );

    let output = desk.execute(scope.as_deref(), command)?;

    if let Some(session_id) = scope {
        mirror(gateway.get_ref().as_ref(), &session_id, mirrors_tasks, &output).await;
    }
    Ok(HttpResponse::Ok().json(output))
}

/// Copies plans and task changes a command produced into storage. Failures
/// are logged and dropped; the command result stands either way.
async fn mirror(
    gateway: &dyn PersistenceGateway,
    session_id: &str,
    mirrors_tasks: bool,
    output: &CommandOutput,
) {
    let result = match output {
        CommandOutput::BusinessPlan { plan, .. } => {
            let mut input = BusinessPlanInput::from(plan);
            input.session_id = session_id.to_string();
            gateway.upsert_business_plan(input).await.map(|_| ())
        }
        CommandOutput::Tasks {
            business_id, tasks, ..
        } if mirrors_tasks => upsert(gateway, session_id, business_id.clone(), tasks).await,
        CommandOutput::Delegated {
            business_id, tasks, ..
        } => upsert(gateway, session_id, Some(business_id.clone()), tasks).await,
        CommandOutput::TaskUpdated {
            business_id, task, ..
        } => upsert(gateway, session_id, Some(business_id.clone()), std::slice::from_ref(task)).await,
        _ => Ok(()),
    };

    if let Err(e) = result {
        warn!(session_id, "Failed to persist command result: {}", e);
    }
}

async fn upsert(
    gateway: &dyn PersistenceGateway,
    session_id: &str,
    business_id: Option<String>,
    tasks: &[crate::db::models::Task],
) -> Result<(), GatewayError> {
    if tasks.is_empty() {
        return Ok(());
    }
    let batch = TaskBatch {
        session_id: Some(session_id.to_string()),
        business_id,
        tasks: tasks.to_vec(),
    };
    gateway.upsert_tasks(batch).await.map(|_| ())
}

fn json_error(err: impl std::fmt::Display) -> actix_web::Error {
    GatewayError::Validation(err.to_string()).into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| json_error(err)))
        .app_data(web::QueryConfig::default().error_handler(|err, _| json_error(err)))
        .service(
            web::scope("/api/db")
                .service(get_sessions)
                .service(create_session)
                .service(update_session)
                .service(export_session)
                .service(list_messages)
                .service(append_message)
                .service(list_events)
                .service(append_event)
                .service(list_tasks)
                .service(upsert_tasks)
                .service(update_task)
                .service(get_business_plan)
                .service(upsert_business_plan),
        )
        .service(
            web::scope("/api")
                .service(list_personas)
                .service(list_commands)
                .service(execute_command),
        );
}
