//! Block Service - Mutation Façade
//!
//! Composes the dense order engine into the editing operations the UI layer
//! calls. Every mutation follows the same shape:
//!
//! 1. Check the session's `AccessPolicy`
//! 2. Read a fresh snapshot of the parent path
//! 3. Compute order writes with `DenseOrderCalculator`
//! 4. Write one batch guarded by the snapshot's revision
//!
//! When another writer lands between 2 and 4 the store rejects the batch and
//! the whole sequence is re-run from a fresh snapshot (see `RetryPolicy`).
//! Each successful mutation is therefore exactly one atomic batch, observed by
//! subscribers as a single consistent snapshot.
//!
//! Boundary moves (first group up, last child down) are no-ops that write
//! nothing and return `false`.

use crate::config::EditorConfig;
use crate::db::{
    path, BlockStore, DenseOrderCalculator, Direction, OrderField, OrderWrites, Snapshot,
    StoreError, Subscription, WriteBatch,
};
use crate::models::{
    AccessPolicy, BlockKind, BlockPayload, OrderEntry, Record, RecordRef, TemplateRegistry,
    UserProfile,
};
use crate::operations::{BlockOperationError, DeleteOutcome, RetryPolicy};
use crate::services::materializer::{GroupOutcome, RenderGroup, TreeMaterializer};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Editing operations over one store
///
/// Cheap to clone. The access policy is fixed per instance; derive a
/// session-scoped service with [`BlockService::with_policy`].
///
/// # Examples
///
/// ```rust,no_run
/// use pagetree_core::config::EditorConfig;
/// use pagetree_core::db::MemoryStore;
/// use pagetree_core::models::{AccessPolicy, BlockKind, TemplateRegistry};
/// use pagetree_core::services::BlockService;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = BlockService::new(
///     Arc::new(MemoryStore::new()),
///     Arc::new(TemplateRegistry::with_defaults()),
///     EditorConfig::default(),
/// );
/// let policy = service.load_access_policy("uid-1").await?;
/// let session = service.with_policy(policy);
///
/// let root = session.config().draft_root("uid-1");
/// let key = session.add_group(&root, BlockKind::Event).await?;
/// # Ok(())
/// # }
/// ```
pub struct BlockService<S: BlockStore + ?Sized> {
    store: Arc<S>,
    templates: Arc<TemplateRegistry>,
    config: EditorConfig,
    policy: AccessPolicy,
    retry: RetryPolicy,
    materializer: TreeMaterializer,
}

impl<S: BlockStore + ?Sized> Clone for BlockService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            templates: Arc::clone(&self.templates),
            config: self.config.clone(),
            policy: self.policy.clone(),
            retry: self.retry,
            materializer: self.materializer.clone(),
        }
    }
}

impl<S: BlockStore + ?Sized> BlockService<S> {
    /// Service with an anonymous (read-only) policy
    pub fn new(store: Arc<S>, templates: Arc<TemplateRegistry>, config: EditorConfig) -> Self {
        let retry = config.retry_policy();
        Self {
            store,
            templates,
            config,
            policy: AccessPolicy::anonymous(),
            retry,
            materializer: TreeMaterializer::new(),
        }
    }

    /// Same service acting under `policy`
    pub fn with_policy(&self, policy: AccessPolicy) -> Self {
        let mut service = self.clone();
        service.policy = policy;
        service
    }

    /// Same service reporting materialization skips through `materializer`
    pub fn with_materializer(&self, materializer: TreeMaterializer) -> Self {
        let mut service = self.clone();
        service.materializer = materializer;
        service
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Highest page order under `parent_path` (`0` when empty)
    ///
    /// Lets the UI disable "move down" on the last group.
    pub async fn max_page_order(&self, parent_path: &str) -> Result<u32, BlockOperationError> {
        let snapshot = self.read(parent_path).await?;
        Ok(DenseOrderCalculator::max_page_order(
            &snapshot.order_entries(),
        ))
    }

    /// Highest nested order in group `page_order` (`0` when empty)
    pub async fn max_nested_order(
        &self,
        parent_path: &str,
        page_order: u32,
    ) -> Result<u32, BlockOperationError> {
        let snapshot = self.read(parent_path).await?;
        Ok(DenseOrderCalculator::max_nested_order(
            &snapshot.order_entries(),
            page_order,
        ))
    }

    /// Append a new `kind` block to group `page_order` and return its key
    ///
    /// The block gets the next nested order of the group (0 for an empty one)
    /// and a copy of the kind's template as payload. `page_order` must name an
    /// existing group or the next free one; anything past it would leave a gap.
    pub async fn add_child(
        &self,
        parent_path: &str,
        page_order: u32,
        kind: BlockKind,
    ) -> Result<String, BlockOperationError> {
        self.ensure_can_edit("add a block")?;
        let template = self.template(kind)?;
        path::validate(parent_path, false)?;
        let key = self.store.allocate_key(parent_path);

        let key_ref = key.as_str();
        self.retry
            .run(parent_path, move |_| {
                self.try_add(parent_path, key_ref, Some(page_order), template)
            })
            .await?;
        Ok(key)
    }

    /// Append a new page group holding one `kind` block and return its key
    pub async fn add_group(
        &self,
        parent_path: &str,
        kind: BlockKind,
    ) -> Result<String, BlockOperationError> {
        self.ensure_can_edit("add a group")?;
        let template = self.template(kind)?;
        path::validate(parent_path, false)?;
        let key = self.store.allocate_key(parent_path);

        let key_ref = key.as_str();
        self.retry
            .run(parent_path, move |_| {
                self.try_add(parent_path, key_ref, None, template)
            })
            .await?;
        Ok(key)
    }

    /// Remove one block and close the gap it leaves
    ///
    /// When it was the last block of its group the whole group goes away and
    /// every group above it moves down by one, in the same batch. Deleting a
    /// record that is already gone is a no-op.
    pub async fn delete_child(
        &self,
        record: &RecordRef,
    ) -> Result<DeleteOutcome, BlockOperationError> {
        self.ensure_can_edit("delete a block")?;
        path::validate(&path::join(&record.path, &record.key), false)?;

        self.retry
            .run(&record.path, move |_| self.try_delete_child(record))
            .await
    }

    /// Remove a page group
    ///
    /// With `member_keys` those blocks are removed, otherwise only
    /// `component`. If members of the group survive they are compacted to
    /// `0..M`; if none do, every group above moves down by one.
    pub async fn delete_group(
        &self,
        component: &RecordRef,
        member_keys: Option<&[String]>,
    ) -> Result<DeleteOutcome, BlockOperationError> {
        self.ensure_can_edit("delete a group")?;
        path::validate(&component.path, false)?;

        self.retry
            .run(&component.path, move |_| {
                self.try_delete_group(component, member_keys)
            })
            .await
    }

    /// Swap `component`'s whole group with the neighbouring group
    ///
    /// Returns `false` (and writes nothing) at the first/last group.
    pub async fn move_group(
        &self,
        component: &RecordRef,
        direction: Direction,
    ) -> Result<bool, BlockOperationError> {
        self.ensure_can_edit("move a group")?;
        path::validate(&component.path, false)?;

        self.retry
            .run(&component.path, move |_| {
                self.try_move(component, direction, OrderField::Page)
            })
            .await
    }

    /// Swap `component` with its adjacent sibling
    ///
    /// Returns `false` (and writes nothing) at the first/last position.
    pub async fn move_child(
        &self,
        component: &RecordRef,
        direction: Direction,
    ) -> Result<bool, BlockOperationError> {
        self.ensure_can_edit("move a block")?;
        path::validate(&component.path, false)?;

        self.retry
            .run(&component.path, move |_| {
                self.try_move(component, direction, OrderField::Nested)
            })
            .await
    }

    /// Overwrite one payload field of a block in place
    ///
    /// Order fields are rejected; they only change through the operations
    /// above.
    pub async fn update_field(
        &self,
        record: &RecordRef,
        field: &str,
        value: &str,
    ) -> Result<(), BlockOperationError> {
        self.ensure_can_edit("edit a block")?;
        let record_path = path::join(&record.path, &record.key);
        path::validate(&record_path, false)?;

        let record_path = record_path.as_str();
        self.retry
            .run(record_path, move |_| {
                self.try_update_field(record, record_path, field, value)
            })
            .await
    }

    /// Copy the published tree over `user_id`'s draft and return the draft root
    ///
    /// Any previous draft of that user is replaced wholesale.
    pub async fn create_draft(&self, user_id: &str) -> Result<String, BlockOperationError> {
        self.ensure_can_edit("create a draft")?;
        if self.policy.user_id() != Some(user_id) && !self.policy.is_admin() {
            return Err(BlockOperationError::access_denied(format!(
                "only '{}' or an administrator can create that draft",
                user_id
            )));
        }

        let draft_root = self.config.draft_root(user_id);
        path::validate(&draft_root, false)?;

        let published = self.read(&self.config.published_root).await?;
        let copied = published.children().count();

        let mut batch = WriteBatch::new();
        batch.set(&draft_root, published.into_value());
        self.commit(&draft_root, batch).await?;

        tracing::info!(
            "Created draft '{}' with {} record(s) from '{}'",
            draft_root,
            copied,
            self.config.published_root
        );
        Ok(draft_root)
    }

    /// Build the policy for `user_id` from its profile under `users/`
    pub async fn load_access_policy(
        &self,
        user_id: &str,
    ) -> Result<AccessPolicy, BlockOperationError> {
        let user_path = self.config.user_path(user_id);
        path::validate(&user_path, false)?;

        let snapshot = self.read(&user_path).await?;
        let profile: Option<UserProfile> = snapshot.decode()?;
        let policy = AccessPolicy::from_profile(user_id, profile.as_ref());
        tracing::debug!(
            "Access policy for '{}': can_edit={}, admin={}",
            user_id,
            policy.can_edit(),
            policy.is_admin()
        );
        Ok(policy)
    }

    /// Materialize the tree under `parent_path` once
    pub async fn load_tree(
        &self,
        parent_path: &str,
    ) -> Result<Vec<GroupOutcome>, BlockOperationError> {
        let snapshot = self.read(parent_path).await?;
        Ok(self.materializer.materialize(&snapshot).collect())
    }

    /// Re-materialize the tree under `parent_path` on every change
    pub async fn subscribe_tree(
        &self,
        parent_path: &str,
    ) -> Result<TreeSubscription, BlockOperationError> {
        let subscription = self.store.subscribe(parent_path).await.map_err(|e| {
            tracing::error!("Failed to subscribe to '{}': {}", parent_path, e);
            BlockOperationError::from(e)
        })?;
        Ok(TreeSubscription {
            subscription,
            materializer: self.materializer.clone(),
        })
    }

    async fn try_add(
        &self,
        parent_path: &str,
        key: &str,
        page_order: Option<u32>,
        template: &BlockPayload,
    ) -> Result<(), BlockOperationError> {
        let snapshot = self.read(parent_path).await?;
        let entries = snapshot.order_entries();

        let (page_order, nested_order) = match page_order {
            Some(page_order) => {
                let next = DenseOrderCalculator::next_page_order(&entries);
                if page_order > next {
                    return Err(BlockOperationError::invalid_page_order(page_order, next));
                }
                (
                    page_order,
                    DenseOrderCalculator::next_nested_order(&entries, page_order),
                )
            }
            None => (DenseOrderCalculator::next_page_order(&entries), 0),
        };

        let record = Record::new(parent_path, key, page_order, nested_order, template.clone());
        let value = record.to_value().map_err(StoreError::from)?;

        let mut batch = WriteBatch::new();
        batch
            .set(record.full_path(), value)
            .expect_revision(parent_path, snapshot.revision());
        self.commit(parent_path, batch).await?;

        tracing::debug!(
            "Added {} block '{}' at ({}, {}) under '{}'",
            record.kind(),
            key,
            page_order,
            nested_order,
            parent_path
        );
        Ok(())
    }

    async fn try_delete_child(
        &self,
        record: &RecordRef,
    ) -> Result<DeleteOutcome, BlockOperationError> {
        let snapshot = self.read(&record.path).await?;
        let entries = snapshot.order_entries();

        let Some(current) = find_entry(&entries, &record.key) else {
            tracing::debug!(
                "Block '{}' already gone from '{}', nothing to delete",
                record.key,
                record.path
            );
            return Ok(DeleteOutcome::default());
        };

        let has_siblings = entries
            .iter()
            .any(|e| e.page_order == current.page_order && e.key != current.key);

        let (writes, field) = if has_siblings {
            let writes = DenseOrderCalculator::shift_nested_orders(
                &entries,
                current.page_order,
                current.nested_order,
                -1,
            );
            (writes, OrderField::Nested)
        } else {
            let writes = DenseOrderCalculator::close_page_gap(&entries, current.page_order);
            (writes, OrderField::Page)
        };

        let mut batch = WriteBatch::new();
        batch.delete(path::join(&record.path, current.key));
        add_order_writes(&mut batch, &record.path, &writes, field);
        batch.expect_revision(&record.path, snapshot.revision());
        self.commit(&record.path, batch).await?;

        if !has_siblings {
            tracing::debug!(
                "Removed last block of group {} under '{}', {} record(s) moved down",
                current.page_order,
                record.path,
                writes.len()
            );
        }

        Ok(DeleteOutcome {
            removed: vec![current.key.to_string()],
            group_removed: !has_siblings,
            reordered: writes.len(),
        })
    }

    async fn try_delete_group(
        &self,
        component: &RecordRef,
        member_keys: Option<&[String]>,
    ) -> Result<DeleteOutcome, BlockOperationError> {
        let snapshot = self.read(&component.path).await?;
        let entries = snapshot.order_entries();

        let component_entry = find_entry(&entries, &component.key);
        let candidates: Vec<&OrderEntry<'_>> = match member_keys {
            Some(keys) => keys
                .iter()
                .filter_map(|key| find_entry(&entries, key))
                .collect(),
            None => component_entry.into_iter().collect(),
        };

        let Some(page_order) = component_entry
            .or_else(|| candidates.first().copied())
            .map(|entry| entry.page_order)
        else {
            tracing::debug!(
                "Group of '{}' already gone from '{}', nothing to delete",
                component.key,
                component.path
            );
            return Ok(DeleteOutcome::default());
        };

        // Only members of that group are removed
        let targets: Vec<&OrderEntry<'_>> = candidates
            .into_iter()
            .filter(|entry| entry.page_order == page_order)
            .collect();

        let removed: BTreeSet<&str> = targets.iter().map(|entry| entry.key).collect();
        let survivors = entries
            .iter()
            .filter(|e| e.page_order == page_order && !removed.contains(e.key))
            .count();

        let (writes, field) = if survivors > 0 {
            let writes =
                DenseOrderCalculator::compact_nested_orders(&entries, page_order, &removed);
            (writes, OrderField::Nested)
        } else {
            let writes = DenseOrderCalculator::close_page_gap(&entries, page_order);
            (writes, OrderField::Page)
        };

        let mut batch = WriteBatch::new();
        for key in &removed {
            batch.delete(path::join(&component.path, key));
        }
        add_order_writes(&mut batch, &component.path, &writes, field);
        if batch.is_empty() {
            return Ok(DeleteOutcome::default());
        }
        batch.expect_revision(&component.path, snapshot.revision());
        self.commit(&component.path, batch).await?;

        Ok(DeleteOutcome {
            removed: removed.iter().map(|key| key.to_string()).collect(),
            group_removed: survivors == 0,
            reordered: writes.len(),
        })
    }

    async fn try_move(
        &self,
        component: &RecordRef,
        direction: Direction,
        field: OrderField,
    ) -> Result<bool, BlockOperationError> {
        let snapshot = self.read(&component.path).await?;
        let entries = snapshot.order_entries();

        let current = find_entry(&entries, &component.key).ok_or_else(|| {
            BlockOperationError::record_not_found(&component.path, &component.key)
        })?;

        let writes = match field {
            OrderField::Page => {
                DenseOrderCalculator::shift_page_orders(&entries, current.page_order, direction)
            }
            OrderField::Nested => {
                DenseOrderCalculator::swap_nested_order(&entries, current, direction)
            }
        };

        if writes.is_empty() {
            tracing::debug!(
                "Move {:?} of '{}' is a boundary no-op ({} = {})",
                direction,
                component.key,
                field.as_str(),
                match field {
                    OrderField::Page => current.page_order,
                    OrderField::Nested => current.nested_order,
                }
            );
            return Ok(false);
        }

        let mut batch = WriteBatch::new();
        add_order_writes(&mut batch, &component.path, &writes, field);
        batch.expect_revision(&component.path, snapshot.revision());
        self.commit(&component.path, batch).await?;
        Ok(true)
    }

    async fn try_update_field(
        &self,
        record: &RecordRef,
        record_path: &str,
        field: &str,
        value: &str,
    ) -> Result<(), BlockOperationError> {
        let snapshot = self.read(record_path).await?;
        if snapshot.is_empty() {
            return Err(BlockOperationError::record_not_found(
                &record.path,
                &record.key,
            ));
        }

        let stored = Record::from_value(&record.path, &record.key, snapshot.value())
            .map_err(|e| BlockOperationError::corrupt_record(&record.key, e))?;
        BlockPayload::validate_field(stored.kind(), field)?;

        let mut batch = WriteBatch::new();
        batch
            .set(
                path::join(&path::join(record_path, "data"), field),
                Value::String(value.to_string()),
            )
            .expect_revision(record_path, snapshot.revision());
        self.commit(record_path, batch).await?;
        Ok(())
    }

    fn ensure_can_edit(&self, action: &str) -> Result<(), BlockOperationError> {
        if self.policy.can_edit() {
            return Ok(());
        }
        let reason = match self.policy.user_id() {
            Some(user_id) => format!("user '{}' is not whitelisted to {}", user_id, action),
            None => format!("anonymous session cannot {}", action),
        };
        tracing::debug!("Access denied: {}", reason);
        Err(BlockOperationError::access_denied(reason))
    }

    fn template(&self, kind: BlockKind) -> Result<&BlockPayload, BlockOperationError> {
        self.templates
            .get(kind)
            .ok_or_else(|| BlockOperationError::template_not_found(kind))
    }

    async fn read(&self, target: &str) -> Result<Snapshot, BlockOperationError> {
        self.store.read(target).await.map_err(|e| {
            tracing::error!("Store read of '{}' failed: {}", target, e);
            BlockOperationError::from(e)
        })
    }

    async fn commit(&self, target: &str, batch: WriteBatch) -> Result<u64, BlockOperationError> {
        self.store.write(batch).await.map_err(|e| {
            if !e.is_conflict() {
                tracing::error!("Store write under '{}' failed: {}", target, e);
            }
            BlockOperationError::from(e)
        })
    }
}

fn find_entry<'e, 'a>(entries: &'e [OrderEntry<'a>], key: &str) -> Option<&'e OrderEntry<'a>> {
    entries.iter().find(|entry| entry.key == key)
}

fn add_order_writes(batch: &mut WriteBatch, parent: &str, writes: &OrderWrites, field: OrderField) {
    for (key, value) in writes {
        let target = path::join(&path::join(parent, key), field.as_str());
        batch.set(target, Value::from(*value));
    }
}

/// Materialized view of a subscribed path
///
/// Each `next()` yields the page groups after one atomic store batch, the
/// first one reflecting the state at subscription time.
pub struct TreeSubscription {
    subscription: Subscription,
    materializer: TreeMaterializer,
}

impl TreeSubscription {
    pub fn path(&self) -> &str {
        self.subscription.path()
    }

    /// Every group outcome of the next snapshot; `None` once the store is gone
    pub async fn next(&mut self) -> Option<Vec<GroupOutcome>> {
        let snapshot = self.subscription.next().await?;
        Some(self.materializer.materialize(&snapshot).collect())
    }

    /// Only the rendered groups of the next snapshot
    pub async fn next_rendered(&mut self) -> Option<Vec<RenderGroup>> {
        let snapshot = self.subscription.next().await?;
        Some(self.materializer.render(&snapshot))
    }
}
