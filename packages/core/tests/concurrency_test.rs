//! Concurrent Editing Tests
//!
//! Read-then-write sequences race against other writers. These tests check
//! that revision-guarded batches plus retries keep both orders dense instead
//! of producing duplicate or skipped values.
//!
//! ## Test Coverage
//! - A writer landing between read and write forces a retry from fresh state
//! - Exhausted retries surface as `VersionConflict` and write nothing
//! - Many concurrent moves/adds on one group stay dense

#[cfg(test)]
mod concurrency_tests {
    use anyhow::Result;
    use async_trait::async_trait;
    use pagetree_core::config::EditorConfig;
    use pagetree_core::db::{
        BlockStore, DenseOrderCalculator, Direction, MemoryStore, Snapshot, StoreError,
        Subscription, WriteBatch,
    };
    use pagetree_core::models::{AccessPolicy, BlockKind, RecordRef, TemplateRegistry};
    use pagetree_core::operations::BlockOperationError;
    use pagetree_core::services::BlockService;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::EnvFilter;

    const ROOT: &str = "pages/homepage/components";

    /// Show retry logs with `RUST_LOG=pagetree_core=debug`
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }

    fn block(page_order: u32, nested_order: u32) -> Value {
        json!({
            "pageOrder": page_order,
            "nestedOrder": nested_order,
            "data": { "type": "event" }
        })
    }

    /// Store that lets another editor write right before some of our writes
    struct InterferingStore {
        inner: MemoryStore,
        /// How many of our writes get a competing write injected first
        interfere: AtomicUsize,
        writes: AtomicUsize,
    }

    impl InterferingStore {
        fn new(inner: MemoryStore, interfere: usize) -> Self {
            Self {
                inner,
                interfere: AtomicUsize::new(interfere),
                writes: AtomicUsize::new(0),
            }
        }

        /// The other editor appends a child to group 0
        async fn competing_add(&self) -> Result<(), StoreError> {
            let snapshot = self.inner.read(ROOT).await?;
            let next = DenseOrderCalculator::next_nested_order(&snapshot.order_entries(), 0);
            let key = self.inner.allocate_key(ROOT);
            let mut batch = WriteBatch::new();
            batch.set(format!("{}/{}", ROOT, key), block(0, next));
            self.inner.write(batch).await?;
            Ok(())
        }
    }

    #[async_trait]
    impl BlockStore for InterferingStore {
        async fn read(&self, path: &str) -> Result<Snapshot, StoreError> {
            self.inner.read(path).await
        }

        async fn write(&self, batch: WriteBatch) -> Result<u64, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let remaining = self.interfere.load(Ordering::SeqCst);
            if remaining > 0 {
                self.interfere.store(remaining - 1, Ordering::SeqCst);
                self.competing_add().await?;
            }
            self.inner.write(batch).await
        }

        async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
            self.inner.subscribe(path).await
        }

        fn allocate_key(&self, parent_path: &str) -> String {
            self.inner.allocate_key(parent_path)
        }
    }

    fn seeded_store() -> Result<MemoryStore> {
        Ok(MemoryStore::from_value(json!({
            "pages": { "homepage": { "components": {
                "a": block(0, 0),
                "b": block(0, 1)
            } } }
        }))?)
    }

    fn editor<S: BlockStore + ?Sized>(store: Arc<S>, config: EditorConfig) -> BlockService<S> {
        BlockService::new(store, Arc::new(TemplateRegistry::with_defaults()), config)
            .with_policy(AccessPolicy::editor("editor-1"))
    }

    async fn assert_dense(store: &MemoryStore) -> Result<()> {
        let snapshot = store.read(ROOT).await?;
        let violations = DenseOrderCalculator::density_violations(&snapshot.order_entries());
        assert!(violations.is_empty(), "density violated: {:?}", violations);
        Ok(())
    }

    #[tokio::test]
    async fn test_interleaved_write_is_retried_from_fresh_state() -> Result<()> {
        init_tracing();
        let memory = seeded_store()?;
        let store = Arc::new(InterferingStore::new(memory.clone(), 1));
        let service = editor(store.clone(), EditorConfig::default());

        let key = service.add_child(ROOT, 0, BlockKind::Event).await?;

        // First write lost against the competing add, second one succeeded
        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
        let snapshot = memory.read(ROOT).await?;
        assert_eq!(snapshot.children().count(), 4);
        assert_eq!(snapshot.value()[key.as_str()]["nestedOrder"], 3);
        assert_dense(&memory).await
    }

    #[tokio::test]
    async fn test_interleaved_delete_does_not_leave_gap() -> Result<()> {
        init_tracing();
        let memory = seeded_store()?;
        let store = Arc::new(InterferingStore::new(memory.clone(), 1));
        let service = editor(store.clone(), EditorConfig::default());

        service
            .delete_child(&RecordRef::new(ROOT, "a", 0, 0))
            .await?;

        let snapshot = memory.read(ROOT).await?;
        assert_eq!(snapshot.children().count(), 2);
        assert_eq!(snapshot.value()["b"]["nestedOrder"], 0);
        assert_dense(&memory).await
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_version_conflict() -> Result<()> {
        init_tracing();
        let memory = seeded_store()?;
        let store = Arc::new(InterferingStore::new(memory.clone(), usize::MAX));
        let config = EditorConfig {
            max_retries: 2,
            retry_base_backoff_ms: 1,
            ..EditorConfig::default()
        };
        let service = editor(store.clone(), config);

        let err = service
            .move_child(&RecordRef::new(ROOT, "a", 0, 0), Direction::Down)
            .await
            .unwrap_err();

        assert_eq!(err, BlockOperationError::version_conflict(ROOT, 3));
        // Only the competing adds landed; "a" and "b" never swapped
        let snapshot = memory.read(ROOT).await?;
        assert_eq!(snapshot.value()["a"]["nestedOrder"], 0);
        assert_eq!(snapshot.value()["b"]["nestedOrder"], 1);
        assert_dense(&memory).await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_editors_keep_group_dense() -> Result<()> {
        init_tracing();
        let memory = seeded_store()?;
        let config = EditorConfig {
            max_retries: 12,
            retry_base_backoff_ms: 1,
            ..EditorConfig::default()
        };
        let service = editor(Arc::new(memory.clone()), config);

        let mut handles = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    let added = service.add_child(ROOT, 0, BlockKind::Event).await;
                    (true, added.map(|_| ()))
                } else {
                    let direction = if i % 4 == 1 {
                        Direction::Down
                    } else {
                        Direction::Up
                    };
                    let moved = service
                        .move_child(&RecordRef::new(ROOT, "a", 0, 0), direction)
                        .await;
                    (false, moved.map(|_| ()))
                }
            }));
        }

        let mut added = 0;
        for handle in handles {
            match handle.await? {
                (is_add, Ok(())) => added += usize::from(is_add),
                (_, Err(BlockOperationError::VersionConflict { .. })) => {}
                (_, Err(e)) => return Err(e.into()),
            }
        }

        let snapshot = memory.read(ROOT).await?;
        assert_eq!(snapshot.children().count(), 2 + added);
        assert_dense(&memory).await
    }
}
