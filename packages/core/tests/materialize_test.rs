//! Tree Materialization Tests
//!
//! End-to-end checks of what the page renders: the façade mutates, the
//! store pushes a snapshot, the materializer turns it into ordered groups.
//!
//! ## Test Coverage
//! - Subscription yields the current tree first, then one tree per batch
//! - A multi-record reorder arrives as one consistent tree
//! - Unrecognized and malformed records reach the diagnostics collaborator

#[cfg(test)]
mod materialize_tests {
    use anyhow::Result;
    use pagetree_core::config::EditorConfig;
    use pagetree_core::db::{Direction, MemoryStore};
    use pagetree_core::models::{AccessPolicy, BlockKind, RecordRef, TemplateRegistry};
    use pagetree_core::services::{
        BlockService, GroupLayout, GroupOutcome, RecordingDiagnostics, RenderGroup, SkipReason,
        TreeMaterializer,
    };
    use serde_json::json;
    use std::sync::Arc;
    use tokio::time::{timeout, Duration};

    const ROOT: &str = "pages/homepage/components";

    fn service(components: serde_json::Value) -> Result<BlockService<MemoryStore>> {
        let store = MemoryStore::from_value(json!({
            "pages": { "homepage": { "components": components } }
        }))?;
        Ok(BlockService::new(
            Arc::new(store),
            Arc::new(TemplateRegistry::with_defaults()),
            EditorConfig::default(),
        )
        .with_policy(AccessPolicy::editor("editor-1")))
    }

    /// `(layout, [child keys])` per rendered group
    fn shape(groups: &[RenderGroup]) -> Vec<(GroupLayout, Vec<String>)> {
        groups
            .iter()
            .map(|g| (g.layout, g.children.iter().map(|c| c.key.clone()).collect()))
            .collect()
    }

    #[tokio::test]
    async fn test_subscription_follows_edits() -> Result<()> {
        let service = service(json!({
            "intro": { "pageOrder": 0, "nestedOrder": 0, "data": { "type": "text", "text": "Welcome" } },
            "e1": { "pageOrder": 1, "nestedOrder": 0, "data": { "type": "event", "title": "Open House" } },
            "e2": { "pageOrder": 1, "nestedOrder": 1, "data": { "type": "event", "title": "Seminar" } }
        }))?;
        let mut tree = service.subscribe_tree(ROOT).await?;
        assert_eq!(tree.path(), ROOT);

        let initial = timeout(Duration::from_secs(1), tree.next_rendered())
            .await?
            .expect("initial tree");
        assert_eq!(
            shape(&initial),
            vec![
                (GroupLayout::TextSection, vec!["intro".to_string()]),
                (
                    GroupLayout::EventCarousel,
                    vec!["e1".to_string(), "e2".to_string()]
                ),
            ]
        );

        service
            .move_group(&RecordRef::new(ROOT, "e1", 1, 0), Direction::Up)
            .await?;

        // All three records moved in one batch; no intermediate tree is observed
        let moved = timeout(Duration::from_secs(1), tree.next_rendered())
            .await?
            .expect("tree after move");
        assert_eq!(
            shape(&moved),
            vec![
                (
                    GroupLayout::EventCarousel,
                    vec!["e1".to_string(), "e2".to_string()]
                ),
                (GroupLayout::TextSection, vec!["intro".to_string()]),
            ]
        );
        assert_eq!(moved[0].page_order, 0);
        assert_eq!(moved[1].page_order, 1);

        let key = service.add_group(ROOT, BlockKind::Accordion).await?;
        let added = timeout(Duration::from_secs(1), tree.next_rendered())
            .await?
            .expect("tree after add");
        assert_eq!(added.len(), 3);
        assert_eq!(added[2].layout, GroupLayout::Accordion);
        assert_eq!(added[2].children[0].key, key);
        Ok(())
    }

    #[tokio::test]
    async fn test_skips_reach_diagnostics() -> Result<()> {
        let diagnostics = Arc::new(RecordingDiagnostics::new());
        let service = service(json!({
            "slider": { "pageOrder": 0, "nestedOrder": 0, "data": { "type": "slider" } },
            "p1": { "pageOrder": 1, "nestedOrder": 0, "data": { "type": "project", "title": "Robotics" } },
            "p2": { "pageOrder": 1, "nestedOrder": 1, "data": { "type": "project", "link": ["bad"] } },
            "loose": { "data": { "type": "text" } }
        }))?
        .with_materializer(TreeMaterializer::with_diagnostics(diagnostics.clone()));

        let outcomes = service.load_tree(ROOT).await?;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            outcomes[0],
            GroupOutcome::Skipped(SkipReason::UnrecognizedKind {
                key: "slider".to_string(),
                page_order: 0,
                kind: "slider".to_string(),
            })
        );
        let projects = outcomes[1].rendered().expect("project group renders");
        assert_eq!(projects.layout, GroupLayout::ProjectList);
        assert_eq!(projects.children.len(), 1);
        assert_eq!(projects.children[0].key, "p1");

        let mut skipped: Vec<String> = diagnostics
            .skipped_reasons()
            .iter()
            .map(|reason| reason.key().to_string())
            .collect();
        skipped.sort();
        assert_eq!(skipped, vec!["loose", "p2", "slider"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_tree_renders_nothing() -> Result<()> {
        let service = service(json!({}))?;
        assert!(service.load_tree(ROOT).await?.is_empty());
        assert!(service.load_tree("pages/missing").await?.is_empty());
        Ok(())
    }
}
