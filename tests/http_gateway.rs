#[cfg(test)]
mod tests {
    use actix_web::{dev::ServerHandle, web, App, HttpServer};
    use boardroom::api::middleware::ApiKeyAuth;
    use boardroom::api::routes;
    use boardroom::config::AppConfig;
    use boardroom::db::get_connection;
    use boardroom::db::models::{Department, MessageRole, SessionStatus, Task, TaskStatus};
    use boardroom::gateway::{
        GatewayError, HttpGateway, LocalGateway, NewMessage, NewSession, PersistenceGateway,
        PlanLookup, SessionPatch, TaskBatch, TaskPatch, TaskQuery,
    };
    use boardroom::tools::BusinessDesk;
    use serde_json::json;
    use std::sync::Arc;

    /// Serves the storage API for one test on an ephemeral port.
    fn serve(config: AppConfig) -> (String, ServerHandle) {
        let gateway: Arc<dyn PersistenceGateway> =
            Arc::new(LocalGateway::new(get_connection(&config.database).unwrap()));
        let desk = web::Data::new(BusinessDesk::new());

        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(config.clone()))
                .app_data(web::Data::new(gateway.clone()))
                .app_data(desk.clone())
                .wrap(ApiKeyAuth)
                .configure(routes::configure)
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        (format!("http://{}", addr), handle)
    }

    fn task(id: &str) -> Task {
        serde_json::from_value(json!({
            "id": id,
            "department": Department::Sales,
            "title": "Pipeline",
        }))
        .unwrap()
    }

    #[actix_web::test]
    async fn test_remote_round_trip() {
        let (base_url, handle) = serve(AppConfig::in_memory());
        let gw = HttpGateway::new(base_url, None);

        let session = gw
            .create_session(NewSession {
                agent_config: "demo".into(),
                active_agent: Some("CEO".into()),
                user_id: None,
            })
            .await
            .unwrap();

        gw.append_message(NewMessage {
            session_id: session.id.clone(),
            role: MessageRole::User,
            content: "hello".into(),
            is_simulated: false,
            metadata: None,
        })
        .await
        .unwrap();

        gw.upsert_tasks(TaskBatch {
            session_id: Some(session.id.clone()),
            business_id: Some("biz".into()),
            tasks: vec![task("s1")],
        })
        .await
        .unwrap();

        let done = gw
            .update_task(
                "s1",
                TaskPatch {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(done.completed_at.is_some());

        let ended = gw
            .update_session(
                &session.id,
                SessionPatch {
                    status: Some(SessionStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(ended.status, SessionStatus::Completed);

        let detail = gw.get_session(&session.id).await.unwrap();
        assert_eq!(detail.session, ended);
        assert_eq!(detail.messages.len(), 1);
        assert_eq!(detail.tasks, vec![done]);

        let filtered = gw
            .list_tasks(TaskQuery {
                business_id: Some("biz".into()),
                status: Some(TaskStatus::Pending),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(filtered.is_empty());

        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_remote_errors_keep_their_kind() {
        let (base_url, handle) = serve(AppConfig::in_memory());
        let gw = HttpGateway::new(base_url, None);

        let err = gw.get_session("missing").await.unwrap_err();
        assert!(err.is_not_found());

        let err = gw.create_session(NewSession::default()).await.unwrap_err();
        assert_eq!(err.kind(), "validation");

        let err = gw
            .get_business_plan(PlanLookup::Business("nope".into()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_remote_api_key() {
        let mut config = AppConfig::in_memory();
        config.auth.api_keys = vec!["secret".to_string()];
        let (base_url, handle) = serve(config);

        let anonymous = HttpGateway::new(base_url.clone(), None);
        let err = anonymous.list_sessions(None).await.unwrap_err();
        assert_eq!(err.kind(), "validation");

        let trusted = HttpGateway::new(base_url, Some("secret".into()));
        assert!(trusted.list_sessions(None).await.unwrap().is_empty());

        handle.stop(true).await;
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_network_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let gw = HttpGateway::new(format!("http://127.0.0.1:{}", port), None);

        let err = gw.list_sessions(None).await.unwrap_err();
        assert!(matches!(err, GatewayError::Network(_)));
    }
}
