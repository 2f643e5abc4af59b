#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, web, App, HttpResponse, ResponseError};
    use boardroom::api::middleware::ApiKeyAuth;
    use boardroom::api::routes;
    use boardroom::config::AppConfig;
    use boardroom::db::get_connection;
    use boardroom::db::models::{BusinessPlan, Session, SessionDetail, Task, TaskStatus};
    use boardroom::gateway::{LocalGateway, PersistenceGateway};
    use boardroom::tools::BusinessDesk;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn gateway(config: &AppConfig) -> Arc<dyn PersistenceGateway> {
        Arc::new(LocalGateway::new(get_connection(&config.database).unwrap()))
    }

    macro_rules! test_app {
        ($config:expr) => {{
            let config: AppConfig = $config;
            let gateway = gateway(&config);
            test::init_service(
                App::new()
                    .app_data(web::Data::new(config))
                    .app_data(web::Data::new(gateway))
                    .app_data(web::Data::new(BusinessDesk::new()))
                    .route("/health", web::get().to(|| async { HttpResponse::Ok().finish() }))
                    .wrap(ApiKeyAuth)
                    .configure(routes::configure),
            )
            .await
        }};
    }

    macro_rules! create_session {
        ($app:expr) => {{
            let req = test::TestRequest::post()
                .uri("/api/db/session")
                .set_json(json!({"agentConfig": "demo", "activeAgent": "CEO"}))
                .to_request();
            let session: Session = test::call_and_read_body_json(&$app, req).await;
            session
        }};
    }

    #[actix_web::test]
    async fn test_create_and_fetch_session() {
        let app = test_app!(AppConfig::in_memory());

        let req = test::TestRequest::post()
            .uri("/api/db/session")
            .set_json(json!({"agentConfig": "demo"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let session: Session = test::read_body_json(resp).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/db/session?sessionId={}", session.id))
            .to_request();
        let detail: SessionDetail = test::call_and_read_body_json(&app, req).await;
        assert_eq!(detail.session.id, session.id);
        assert!(detail.messages.is_empty());

        let req = test::TestRequest::get().uri("/api/db/session").to_request();
        let all: Vec<Session> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(all.len(), 1);
    }

    #[actix_web::test]
    async fn test_errors_carry_their_kind() {
        let app = test_app!(AppConfig::in_memory());

        let req = test::TestRequest::post()
            .uri("/api/db/session")
            .set_json(json!({"activeAgent": "CEO"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["kind"], "validation");

        let req = test::TestRequest::get()
            .uri("/api/db/session?sessionId=missing")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["kind"], "not_found");

        let req = test::TestRequest::post()
            .uri("/api/db/message")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["kind"], "validation");

        let req = test::TestRequest::get().uri("/api/db/message").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_end_to_end_over_http() {
        let app = test_app!(AppConfig::in_memory());
        let session = create_session!(app);

        let req = test::TestRequest::post()
            .uri("/api/db/message")
            .set_json(json!({"sessionId": session.id, "role": "user", "content": "hi"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri("/api/db/task")
            .set_json(json!({
                "sessionId": session.id,
                "tasks": [{"id": "t1", "department": "Technical", "title": "CI", "status": "pending"}]
            }))
            .to_request();
        let stored: Vec<Task> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stored.len(), 1);

        let req = test::TestRequest::patch()
            .uri("/api/db/task")
            .set_json(json!({"taskId": "t1", "status": "completed"}))
            .to_request();
        let task: Task = test::call_and_read_body_json(&app, req).await;
        assert!(task.completed_at.is_some());

        let req = test::TestRequest::get()
            .uri(&format!("/api/db/session?sessionId={}", session.id))
            .to_request();
        let detail: SessionDetail = test::call_and_read_body_json(&app, req).await;
        assert_eq!(detail.messages.len(), 1);
        assert_eq!(detail.tasks.len(), 1);
        assert_eq!(detail.tasks[0].status, TaskStatus::Completed);

        let req = test::TestRequest::get()
            .uri(&format!("/api/db/session/{}/export", session.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(&format!("Session: {}", session.id)));
        assert!(text.contains("[USER]: hi\n---\n"));
    }

    #[actix_web::test]
    async fn test_session_patch_and_listing_by_user() {
        let app = test_app!(AppConfig::in_memory());
        let session = create_session!(app);

        let req = test::TestRequest::patch()
            .uri("/api/db/session")
            .set_json(json!({"sessionId": session.id, "userId": "alice", "status": "completed"}))
            .to_request();
        let updated: Session = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated.user_id.as_deref(), Some("alice"));
        assert_eq!(updated.active_agent.as_deref(), Some("CEO"));

        let req = test::TestRequest::get()
            .uri("/api/db/session?userId=alice")
            .to_request();
        let owned: Vec<Session> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(owned.len(), 1);

        let req = test::TestRequest::patch()
            .uri("/api/db/session")
            .set_json(json!({"sessionId": session.id, "userId": "mallory"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_commands_are_mirrored_into_storage() {
        let app = test_app!(AppConfig::in_memory());
        let session = create_session!(app);

        let req = test::TestRequest::post()
            .uri(&format!("/api/commands?sessionId={}", session.id))
            .set_json(json!({
                "command": "generateBusinessPlan",
                "input": {
                    "businessName": "Acme",
                    "businessIdea": "Anvils as a service",
                    "targetMarket": "Coyotes",
                    "revenueModel": "Subscription"
                }
            }))
            .to_request();
        let output: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(output["result"], "businessPlan");
        let business_id = output["businessId"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/api/db/business-plan?sessionId={}", session.id))
            .to_request();
        let plan: BusinessPlan = test::call_and_read_body_json(&app, req).await;
        assert_eq!(plan.business_id, business_id);
        assert_eq!(plan.business_name, "Acme");

        let req = test::TestRequest::post()
            .uri(&format!("/api/commands?sessionId={}", session.id))
            .set_json(json!({"command": "generateTasks", "input": {"focusAreas": ["finance"]}}))
            .to_request();
        let output: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(output["summary"]["total"], 4);

        let req = test::TestRequest::post()
            .uri(&format!("/api/commands?sessionId={}", session.id))
            .set_json(json!({
                "command": "updateTaskProgress",
                "input": {"taskId": "fin_001", "status": "completed"}
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri(&format!("/api/db/task?sessionId={}&status=completed", session.id))
            .to_request();
        let done: Vec<Task> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, "fin_001");
        assert_eq!(done[0].business_id.as_deref(), Some(business_id.as_str()));

        let req = test::TestRequest::post()
            .uri(&format!("/api/commands?sessionId={}", session.id))
            .set_json(json!({
                "command": "updateTaskProgress",
                "input": {"taskId": "ghost", "status": "completed"}
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_personas_and_command_definitions() {
        let app = test_app!(AppConfig::in_memory());

        let req = test::TestRequest::get().uri("/api/personas").to_request();
        let roster: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(roster.len(), 15);
        assert_eq!(roster[0]["name"], "CEO");
        assert_eq!(roster[1]["team"]["reviewer"], "CodeReviewer");

        let req = test::TestRequest::get().uri("/api/commands").to_request();
        let defs: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(defs.len(), 8);
    }

    #[actix_web::test]
    async fn test_api_keys_are_enforced_when_configured() {
        let mut config = AppConfig::in_memory();
        config.auth.api_keys = vec!["secret".to_string()];
        let app = test_app!(config);

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/db/session").to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/db/session")
            .insert_header(("Authorization", "Bearer secret"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/personas?api_key=secret")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_generated_tasks_stay_with_their_session() {
        let app = test_app!(AppConfig::in_memory());
        let first = create_session!(app);
        let second = create_session!(app);

        let mut businesses = Vec::new();
        for session in [&first, &second] {
            let req = test::TestRequest::post()
                .uri(&format!("/api/commands?sessionId={}", session.id))
                .set_json(json!({
                    "command": "generateBusinessPlan",
                    "input": {
                        "businessName": format!("Shop {}", session.id),
                        "businessIdea": "Handmade goods",
                        "targetMarket": "Locals",
                        "revenueModel": "Retail"
                    }
                }))
                .to_request();
            let output: Value = test::call_and_read_body_json(&app, req).await;
            businesses.push(output["businessId"].as_str().unwrap().to_string());

            let req = test::TestRequest::post()
                .uri(&format!("/api/commands?sessionId={}", session.id))
                .set_json(json!({"command": "generateTasks", "input": {}}))
                .to_request();
            let output: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(output["summary"]["total"], 29);
        }

        for (session, business_id) in [&first, &second].into_iter().zip(&businesses) {
            let req = test::TestRequest::get()
                .uri(&format!("/api/db/session?sessionId={}", session.id))
                .to_request();
            let detail: SessionDetail = test::call_and_read_body_json(&app, req).await;
            assert_eq!(detail.tasks.len(), 29);
            assert!(detail
                .tasks
                .iter()
                .all(|t| t.business_id.as_ref() == Some(business_id)));
        }

        // A shared task id is patched within the named business only
        let req = test::TestRequest::patch()
            .uri("/api/db/task")
            .set_json(json!({"taskId": "hr_001", "status": "completed"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::patch()
            .uri("/api/db/task")
            .set_json(json!({"taskId": "hr_001", "businessId": businesses[1], "status": "completed"}))
            .to_request();
        let task: Task = test::call_and_read_body_json(&app, req).await;
        assert_eq!(task.session_id.as_deref(), Some(second.id.as_str()));

        let req = test::TestRequest::get()
            .uri(&format!("/api/db/task?sessionId={}&status=completed", first.id))
            .to_request();
        let done: Vec<Task> = test::call_and_read_body_json(&app, req).await;
        assert!(done.is_empty());
    }
}
