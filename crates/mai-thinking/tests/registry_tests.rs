#[cfg(test)]
mod tests {
    use mai_config::ThinkingConfig;
    use mai_core::{
        ConversationItem, FlowSnapshot, FlowState, MaiError, StreamId, StreamRecord, StreamStore,
    };
    use mai_store::SqliteStore;
    use mai_thinking::{FlowRegistry, FlowStateCounts, IdleHook, TaskExecutor};
    use std::sync::Arc;

    fn config() -> ThinkingConfig {
        ThinkingConfig {
            observation_window_size: 3,
            engaged_interval_secs: 20,
            focused_interval_secs: 5,
            shutdown_grace_secs: 2,
        }
    }

    fn registry(store: Arc<dyn StreamStore>, executor: TaskExecutor) -> FlowRegistry {
        FlowRegistry::new(store, executor, Arc::new(IdleHook), &config()).unwrap()
    }

    fn store() -> Arc<SqliteStore> {
        Arc::new(SqliteStore::open_in_memory().unwrap())
    }

    fn stream_rows(store: &SqliteStore) -> i64 {
        store
            .db()
            .query_row("SELECT COUNT(*) FROM interaction_stream", [], |r| r.get(0))
            .unwrap()
    }

    fn message_rows(store: &SqliteStore) -> i64 {
        store
            .db()
            .query_row("SELECT COUNT(*) FROM message", [], |r| r.get(0))
            .unwrap()
    }

    /// Store whose stream creation always fails.
    struct FailingStore;

    impl StreamStore for FailingStore {
        fn load_streams(&self) -> mai_core::Result<Vec<StreamRecord>> {
            Ok(Vec::new())
        }

        fn recent_items(
            &self,
            _stream: &StreamId,
            _limit: usize,
        ) -> mai_core::Result<Vec<ConversationItem>> {
            Ok(Vec::new())
        }

        fn create_stream(&self, _stream: &StreamId) -> mai_core::Result<()> {
            Err(MaiError::Persistence("disk full".into()))
        }

        fn save_snapshot(&self, _snapshot: &FlowSnapshot) -> mai_core::Result<Vec<i64>> {
            Err(MaiError::Persistence("disk full".into()))
        }
    }

    // ── get_or_create ──────────────────────────────────────────

    #[tokio::test]
    async fn test_get_or_create_returns_same_flow() {
        let store = store();
        let alice = store.register_entity("telegram", "alice").unwrap();
        let registry = registry(store.clone(), TaskExecutor::current());

        let id = StreamId::private(alice);
        let first = registry.get_or_create(&id).unwrap();
        let second = registry.get_or_create(&id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert_eq!(stream_rows(&store), 1);
        assert_eq!(first.state(), FlowState::Dormant);
    }

    #[test]
    fn test_concurrent_get_or_create_creates_once() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let store = store();
        let group = store.register_group("discord", "guild").unwrap();
        let registry = registry(store.clone(), TaskExecutor::new(runtime.handle().clone()));
        let id = StreamId::group(group);

        let flows: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| registry.get_or_create(&id).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(flows.iter().all(|f| Arc::ptr_eq(f, &flows[0])));
        assert_eq!(registry.len(), 1);
        assert_eq!(stream_rows(&store), 1);
    }

    #[tokio::test]
    async fn test_unknown_target_is_invalid_reference() {
        let store = store();
        let registry = registry(store.clone(), TaskExecutor::current());

        let err = registry.get_or_create(&StreamId::private(42)).unwrap_err();
        assert!(matches!(err, MaiError::InvalidReference { .. }));
        assert!(registry.is_empty());
        assert_eq!(stream_rows(&store), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_leaves_no_flow() {
        let registry = registry(Arc::new(FailingStore), TaskExecutor::current());
        let id = StreamId::private(1);

        let err = registry.get_or_create(&id).unwrap_err();
        assert!(matches!(err, MaiError::Persistence(_)));
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_deliver_records_and_starts_observer() {
        let store = store();
        let alice = store.register_entity("telegram", "alice").unwrap();
        let registry = registry(store.clone(), TaskExecutor::current());

        let item = store
            .insert_message(&StreamId::private(alice), alice, "hello")
            .unwrap();
        let flow = registry.deliver(item).await.unwrap();
        assert_eq!(flow.state(), FlowState::Engaged);
        assert_eq!(flow.window_len(), 1);
        assert!(flow.is_observing());

        registry.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_deliver_to_new_stream_creates_once() {
        let store = store();
        let alice = store.register_entity("telegram", "alice").unwrap();
        let registry = registry(store.clone(), TaskExecutor::current());
        let id = StreamId::private(alice);

        let (first, second) = tokio::join!(
            registry.deliver(ConversationItem::new(id, alice, "one")),
            registry.deliver(ConversationItem::new(id, alice, "two")),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.window_len(), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(stream_rows(&store), 1);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_deliver_to_unknown_target_fails_without_flow() {
        let store = store();
        let registry = registry(store.clone(), TaskExecutor::current());
        let id = StreamId::group(99);

        let err = registry
            .deliver(ConversationItem::new(id, 1, "anyone there?"))
            .await
            .unwrap_err();
        assert!(matches!(err, MaiError::InvalidReference { .. }));
        assert!(registry.is_empty());
    }

    // ── Construction ───────────────────────────────────────────

    #[tokio::test]
    async fn test_new_rejects_zero_window() {
        let config = ThinkingConfig {
            observation_window_size: 0,
            ..config()
        };
        let err = FlowRegistry::new(store(), TaskExecutor::current(), Arc::new(IdleHook), &config)
            .err()
            .unwrap();
        assert!(matches!(err, MaiError::ConfigValidation { ref field, .. } if field == "window_size"));
    }

    #[tokio::test]
    async fn test_new_rejects_zero_interval() {
        let config = ThinkingConfig {
            focused_interval_secs: 0,
            ..config()
        };
        let err = FlowRegistry::new(store(), TaskExecutor::current(), Arc::new(IdleHook), &config)
            .err()
            .unwrap();
        assert!(matches!(err, MaiError::ConfigValidation { .. }));
    }

    // ── Restore ────────────────────────────────────────────────

    #[tokio::test]
    async fn test_restore_skips_corrupt_record() {
        let store = store();
        for n in 0..10 {
            let entity = store.register_entity("telegram", &format!("user-{n}")).unwrap();
            store.create_stream(&StreamId::private(entity)).unwrap();
        }
        store
            .db()
            .execute(
                "UPDATE interaction_stream SET state = 'sleepwalking' WHERE id = 'P-4'",
                [],
            )
            .unwrap();

        let registry = registry(store.clone(), TaskExecutor::current());
        let report = registry.restore_all().unwrap();
        assert_eq!(report.restored, 9);
        assert_eq!(report.skipped, 1);
        assert_eq!(registry.len(), 9);
        assert!(registry.get(&StreamId::private(4)).is_none());
    }

    #[tokio::test]
    async fn test_restore_skips_malformed_id() {
        let store = store();
        let alice = store.register_entity("telegram", "alice").unwrap();
        store.create_stream(&StreamId::private(alice)).unwrap();
        store
            .db()
            .execute(
                "INSERT INTO interaction_stream (id, state, created_at, updated_at) VALUES ('X-??', NULL, 'now', 'now')",
                [],
            )
            .unwrap();

        let registry = registry(store.clone(), TaskExecutor::current());
        let report = registry.restore_all().unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_restore_refills_window_and_keeps_state() {
        let store = store();
        let alice = store.register_entity("telegram", "alice").unwrap();
        let id = StreamId::private(alice);
        store.create_stream(&id).unwrap();
        for n in 1..=5 {
            store.insert_message(&id, alice, &format!("m{n}")).unwrap();
        }
        let last_active = chrono::Utc::now();
        store
            .save_snapshot(&FlowSnapshot {
                stream: id,
                state: FlowState::Focused,
                last_active,
                unsaved: Vec::new(),
            })
            .unwrap();

        let registry = registry(store.clone(), TaskExecutor::current());
        registry.restore_all().unwrap();

        let flow = registry.get(&id).unwrap();
        assert_eq!(flow.state(), FlowState::Focused);
        assert_eq!(
            flow.last_active().timestamp_millis(),
            last_active.timestamp_millis()
        );
        let contents: Vec<String> = flow
            .window_snapshot()
            .iter()
            .map(|i| i.content.clone())
            .collect();
        assert_eq!(contents, vec!["m3", "m4", "m5"]);
        assert!(!flow.is_observing());
    }

    #[tokio::test]
    async fn test_run_observers_skips_dormant_flows() {
        let store = store();
        let mut ids = Vec::new();
        for (n, state) in [FlowState::Dormant, FlowState::Engaged, FlowState::Focused]
            .into_iter()
            .enumerate()
        {
            let entity = store.register_entity("telegram", &format!("user-{n}")).unwrap();
            let id = StreamId::private(entity);
            store.create_stream(&id).unwrap();
            store
                .save_snapshot(&FlowSnapshot {
                    stream: id,
                    state,
                    last_active: chrono::Utc::now(),
                    unsaved: Vec::new(),
                })
                .unwrap();
            ids.push(id);
        }

        let registry = registry(store.clone(), TaskExecutor::current());
        let report = registry.initialize().unwrap();
        assert_eq!(report.restored, 3);

        assert!(!registry.get(&ids[0]).unwrap().is_observing());
        assert!(registry.get(&ids[1]).unwrap().is_observing());
        assert!(registry.get(&ids[2]).unwrap().is_observing());
        assert_eq!(registry.run_observers(), 0);

        let shutdown = registry.shutdown().await;
        assert_eq!(shutdown.failures, 0);
    }

    // ── Introspection ──────────────────────────────────────────

    #[tokio::test]
    async fn test_state_counts() {
        let store = store();
        let registry = registry(store.clone(), TaskExecutor::current());
        assert_eq!(registry.state_counts(), FlowStateCounts::default());

        let mut flows = Vec::new();
        for n in 0..4 {
            let entity = store.register_entity("telegram", &format!("user-{n}")).unwrap();
            flows.push(registry.get_or_create(&StreamId::private(entity)).unwrap());
        }
        flows[1].set_state(FlowState::Engaged);
        flows[2].set_state(FlowState::Focused);
        flows[3].set_state(FlowState::Focused);

        assert_eq!(
            registry.state_counts(),
            FlowStateCounts {
                total: 4,
                dormant: 1,
                engaged: 1,
                focused: 2,
            }
        );
    }

    // ── Shutdown ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_shutdown_stops_observers_and_flushes_state() {
        let store = store();
        let alice = store.register_entity("telegram", "alice").unwrap();
        let bob = store.register_entity("telegram", "bob").unwrap();
        let executor = TaskExecutor::current();
        let registry = registry(store.clone(), executor.clone());

        let active = registry.get_or_create(&StreamId::private(alice)).unwrap();
        active.record_item(ConversationItem::new(StreamId::private(alice), alice, "hi"));
        active.set_state(FlowState::Focused);
        let idle = registry.get_or_create(&StreamId::private(bob)).unwrap();

        let report = registry.shutdown().await;
        assert_eq!(report.stopped, 2);
        assert_eq!(report.flushed, 2);
        assert_eq!(report.failures, 0);
        assert!(!active.is_observing());
        assert!(!idle.is_observing());
        assert_eq!(executor.active_observers(), 0);

        let records = store.load_streams().unwrap();
        let saved = records
            .iter()
            .find(|r| r.id == StreamId::private(alice).to_string())
            .unwrap();
        assert_eq!(saved.flow_state().unwrap(), FlowState::Focused);
        assert!(saved.last_active().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_shutdown_continues_past_flush_failures() {
        let store = store();
        let alice = store.register_entity("telegram", "alice").unwrap();
        let registry = registry(store.clone(), TaskExecutor::current());
        registry.get_or_create(&StreamId::private(alice)).unwrap();
        store
            .db()
            .execute("DELETE FROM interaction_stream", [])
            .unwrap();

        let report = registry.shutdown().await;
        assert_eq!(report.stopped, 1);
        assert_eq!(report.flushed, 0);
        assert_eq!(report.failures, 1);
    }

    #[tokio::test]
    async fn test_shutdown_persists_unsaved_items_for_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mai.db");
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let alice = store.register_entity("telegram", "alice").unwrap();
        let id = StreamId::private(alice);

        let running = registry(store.clone(), TaskExecutor::current());
        for text in ["a", "b", "c"] {
            running
                .deliver(ConversationItem::new(id, alice, text))
                .await
                .unwrap();
        }
        let report = running.shutdown().await;
        assert_eq!(report.failures, 0);
        assert_eq!(message_rows(&store), 3);

        // Saved items took their ids, so a second flush appends nothing.
        let flow = running.get(&id).unwrap();
        assert!(flow.window_snapshot().iter().all(|i| i.id > 0));
        running.shutdown().await;
        assert_eq!(message_rows(&store), 3);
        drop(running);
        drop(store);

        let reopened = Arc::new(SqliteStore::open(&path).unwrap());
        let restarted = registry(reopened, TaskExecutor::current());
        let restored = restarted.restore_all().unwrap();
        assert_eq!(restored.restored, 1);

        let flow = restarted.get(&id).unwrap();
        assert_eq!(flow.state(), FlowState::Engaged);
        let contents: Vec<String> = flow
            .window_snapshot()
            .iter()
            .map(|i| i.content.clone())
            .collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }
}
