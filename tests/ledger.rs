#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use boardroom::config::DatabaseConfig;
    use boardroom::db::get_connection;
    use boardroom::db::models::{
        BusinessPlan, Department, Event, EventDirection, Message, MessageRole, Session,
        SessionDetail, SessionStatus, Task,
    };
    use boardroom::gateway::{
        BusinessPlanInput, GatewayError, GatewayResult, LocalGateway, NewEvent, NewMessage,
        NewSession, PersistenceGateway, PlanLookup, SessionPatch, TaskBatch, TaskPatch, TaskQuery,
    };
    use boardroom::session::{RestoreOrigin, RestoreRequest, SessionLedger, SessionRecorder, SessionSlot};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Local storage with a slow, counted create and switchable write failures.
    struct TestGateway {
        inner: LocalGateway,
        creates: AtomicUsize,
        fail_writes: AtomicBool,
    }

    impl TestGateway {
        fn new() -> Arc<Self> {
            let pool = get_connection(&DatabaseConfig {
                path: ":memory:".to_string(),
            })
            .unwrap();
            Arc::new(Self {
                inner: LocalGateway::new(pool),
                creates: AtomicUsize::new(0),
                fail_writes: AtomicBool::new(false),
            })
        }

        fn check_writes(&self) -> GatewayResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(GatewayError::Network("connection reset".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl PersistenceGateway for TestGateway {
        async fn create_session(&self, request: NewSession) -> GatewayResult<Session> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.check_writes()?;
            self.inner.create_session(request).await
        }
        async fn get_session(&self, id: &str) -> GatewayResult<SessionDetail> {
            self.inner.get_session(id).await
        }
        async fn list_sessions(&self, user_id: Option<&str>) -> GatewayResult<Vec<Session>> {
            self.inner.list_sessions(user_id).await
        }
        async fn update_session(&self, id: &str, patch: SessionPatch) -> GatewayResult<Session> {
            self.check_writes()?;
            self.inner.update_session(id, patch).await
        }
        async fn append_message(&self, message: NewMessage) -> GatewayResult<Message> {
            self.check_writes()?;
            self.inner.append_message(message).await
        }
        async fn list_messages(&self, session_id: &str) -> GatewayResult<Vec<Message>> {
            self.inner.list_messages(session_id).await
        }
        async fn append_event(&self, event: NewEvent) -> GatewayResult<Event> {
            self.check_writes()?;
            self.inner.append_event(event).await
        }
        async fn list_events(&self, session_id: &str) -> GatewayResult<Vec<Event>> {
            self.inner.list_events(session_id).await
        }
        async fn upsert_tasks(&self, batch: TaskBatch) -> GatewayResult<Vec<Task>> {
            self.check_writes()?;
            self.inner.upsert_tasks(batch).await
        }
        async fn list_tasks(&self, query: TaskQuery) -> GatewayResult<Vec<Task>> {
            self.inner.list_tasks(query).await
        }
        async fn update_task(&self, id: &str, patch: TaskPatch) -> GatewayResult<Task> {
            self.check_writes()?;
            self.inner.update_task(id, patch).await
        }
        async fn upsert_business_plan(&self, plan: BusinessPlanInput) -> GatewayResult<BusinessPlan> {
            self.check_writes()?;
            self.inner.upsert_business_plan(plan).await
        }
        async fn get_business_plan(&self, lookup: PlanLookup) -> GatewayResult<BusinessPlan> {
            self.inner.get_business_plan(lookup).await
        }
    }

    fn demo() -> NewSession {
        NewSession {
            agent_config: "demo".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn concurrent_creates_share_one_session() {
        let gw = TestGateway::new();
        let ledger = SessionLedger::new(gw.clone());

        let (a, b) = tokio::join!(ledger.create(demo()), ledger.create(demo()));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.id, b.id);
        assert_eq!(gw.creates.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_creates_across_tasks_share_one_session() {
        let gw = TestGateway::new();
        let ledger = Arc::new(SessionLedger::new(gw.clone()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.create(demo()).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(gw.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn settled_create_allows_a_new_one() {
        let gw = TestGateway::new();
        let ledger = SessionLedger::new(gw.clone());

        let first = ledger.create(demo()).await.unwrap();
        let second = ledger.create(demo()).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(gw.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_create_is_shared_then_cleared() {
        let gw = TestGateway::new();
        let ledger = SessionLedger::new(gw.clone());
        gw.fail_writes.store(true, Ordering::SeqCst);

        let (a, b) = tokio::join!(ledger.create(demo()), ledger.create(demo()));
        assert_eq!(a.unwrap_err().kind(), "network");
        assert_eq!(b.unwrap_err().kind(), "network");
        assert_eq!(gw.creates.load(Ordering::SeqCst), 1);

        gw.fail_writes.store(false, Ordering::SeqCst);
        assert!(ledger.create(demo()).await.is_ok());
    }

    #[tokio::test]
    async fn restore_prefers_active_cached_session() {
        let gw = TestGateway::new();
        let ledger = SessionLedger::new(gw.clone());
        let cached = ledger.create(demo()).await.unwrap();

        let (session, origin) = ledger
            .restore(RestoreRequest {
                cached_id: Some(cached.id.clone()),
                agent_config: "demo".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(origin, RestoreOrigin::Cached);
        assert_eq!(session.id, cached.id);
    }

    #[tokio::test]
    async fn restore_skips_completed_cache_for_users_active_session() {
        let gw = TestGateway::new();
        let ledger = SessionLedger::new(gw.clone());

        let cached = ledger.create(demo()).await.unwrap();
        ledger.complete(&cached.id).await.unwrap();
        let active = ledger
            .create(NewSession {
                agent_config: "demo".into(),
                user_id: Some("alice".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        // Same user, other agent config: never chosen
        ledger
            .create(NewSession {
                agent_config: "other".into(),
                user_id: Some("alice".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let creates_before = gw.creates.load(Ordering::SeqCst);

        let (session, origin) = ledger
            .restore(RestoreRequest {
                cached_id: Some(cached.id.clone()),
                user_id: Some("alice".into()),
                agent_config: "demo".into(),
                active_agent: None,
            })
            .await
            .unwrap();

        assert_eq!(origin, RestoreOrigin::UserActive);
        assert_eq!(session.id, active.id);
        assert_eq!(gw.creates.load(Ordering::SeqCst), creates_before);
    }

    #[tokio::test]
    async fn restore_creates_when_nothing_fits() {
        let gw = TestGateway::new();
        let ledger = SessionLedger::new(gw.clone());

        let (session, origin) = ledger
            .restore(RestoreRequest {
                cached_id: Some("gone".into()),
                user_id: Some("bob".into()),
                agent_config: "demo".into(),
                active_agent: Some("CEO".into()),
            })
            .await
            .unwrap();

        assert_eq!(origin, RestoreOrigin::Created);
        assert_eq!(session.user_id.as_deref(), Some("bob"));
        assert_eq!(session.active_agent.as_deref(), Some("CEO"));
        assert_eq!(session.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn recorder_drops_failed_saves_and_keeps_going() {
        let gw = TestGateway::new();
        let ledger = Arc::new(SessionLedger::new(gw.clone()));
        let recorder = SessionRecorder::new(ledger.clone(), SessionSlot::in_memory());

        // Nothing to record into yet
        assert!(recorder
            .save_message(MessageRole::User, "too early", false, None)
            .await
            .is_none());

        let (session, origin) = recorder.initialize("demo", Some("CEO"), None).await.unwrap();
        assert_eq!(origin, RestoreOrigin::Created);

        gw.fail_writes.store(true, Ordering::SeqCst);
        assert!(recorder
            .save_message(MessageRole::User, "lost", false, None)
            .await
            .is_none());
        assert!(recorder
            .save_event(EventDirection::Client, "input_audio_buffer.commit", json!({}))
            .await
            .is_none());

        gw.fail_writes.store(false, Ordering::SeqCst);
        recorder
            .save_message(MessageRole::Assistant, "still here", false, None)
            .await
            .unwrap();
        let tasks: Vec<Task> = vec![serde_json::from_value(json!({
            "id": "t1", "department": Department::Marketing, "title": "Brand"
        }))
        .unwrap()];
        recorder.save_tasks(Some("biz"), tasks).await.unwrap();
        recorder.switch_persona("Marketing").await.unwrap();

        let detail = ledger.get(&session.id).await.unwrap();
        assert_eq!(detail.messages.len(), 1);
        assert_eq!(detail.messages[0].content, "still here");
        assert!(detail.events.is_empty());
        assert_eq!(detail.tasks.len(), 1);
        assert_eq!(detail.session.active_agent.as_deref(), Some("Marketing"));
    }

    #[tokio::test]
    async fn recorder_reuses_slot_until_session_ends() {
        let gw = TestGateway::new();
        let ledger = Arc::new(SessionLedger::new(gw.clone()));
        let recorder = SessionRecorder::new(ledger.clone(), SessionSlot::in_memory());

        let (first, _) = recorder.initialize("demo", None, None).await.unwrap();
        let (again, origin) = recorder.initialize("demo", None, None).await.unwrap();
        assert_eq!(origin, RestoreOrigin::Cached);
        assert_eq!(again.id, first.id);

        let ended = recorder.end_session().await.unwrap();
        assert_eq!(ended.status, SessionStatus::Completed);
        assert!(recorder.session_id().is_none());

        let (fresh, origin) = recorder.initialize("demo", None, None).await.unwrap();
        assert_eq!(origin, RestoreOrigin::Created);
        assert_ne!(fresh.id, first.id);

        let loaded = recorder.load(&first.id).await.unwrap();
        assert_eq!(loaded.session.id, first.id);
        assert_eq!(recorder.session_id().as_deref(), Some(first.id.as_str()));
    }
}
