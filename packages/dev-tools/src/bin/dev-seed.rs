//! Development Seed Session
//!
//! Seeds an in-process store with a department homepage, runs a scripted
//! editing session against a user's draft and prints the resulting tree as
//! JSON. Handy for eyeballing order maintenance and the log output of the
//! editing core without a UI.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin dev-seed
//!
//! # With debug logs from the editing core
//! RUST_LOG=pagetree_core=debug cargo run --bin dev-seed
//! ```
//!
//! # Configuration
//!
//! - `PAGETREE_CONFIG`: path to an `EditorConfig` JSON file (defaults otherwise)
//! - `PAGETREE_TEMPLATES`: path to a block template JSON file (built-in templates otherwise)
//! - `PAGETREE_USER`: user id the session runs as (default `faculty-1`)

use anyhow::Context;
use pagetree_core::{
    config::EditorConfig,
    db::{BlockStore, DenseOrderCalculator, Direction, MemoryStore, WriteBatch},
    models::{BlockKind, RecordRef, TemplateRegistry},
    services::{BlockService, GroupLayout, GroupOutcome},
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrintedGroup {
    page_order: u32,
    layout: GroupLayout,
    children: Vec<Value>,
}

fn load_config() -> anyhow::Result<EditorConfig> {
    match std::env::var("PAGETREE_CONFIG") {
        Ok(path) => {
            println!("⚙️  Loading config from {}", path);
            EditorConfig::from_file(&path)
        }
        Err(_) => Ok(EditorConfig::default()),
    }
}

fn load_templates() -> anyhow::Result<TemplateRegistry> {
    match std::env::var("PAGETREE_TEMPLATES") {
        Ok(path) => {
            println!("🧩 Loading templates from {}", path);
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read templates file {}", path))?;
            TemplateRegistry::from_json(&json).map_err(|e| anyhow::anyhow!("{}", e))
        }
        Err(_) => Ok(TemplateRegistry::with_defaults()),
    }
}

fn seed_homepage() -> Value {
    json!({
        "intro": {
            "pageOrder": 0, "nestedOrder": 0,
            "data": { "type": "text", "text": "Welcome to the Department of Computer Science" }
        },
        "openHouse": {
            "pageOrder": 1, "nestedOrder": 0,
            "data": {
                "type": "event", "title": "Open House", "date": "March 3",
                "location": "Main Hall", "imgSource": "imgs/open-house.webp"
            }
        },
        "seminar": {
            "pageOrder": 1, "nestedOrder": 1,
            "data": { "type": "event", "title": "Research Seminar", "date": "March 10" }
        },
        "robotics": {
            "pageOrder": 2, "nestedOrder": 0,
            "data": { "type": "project", "title": "Robotics Lab", "link": "https://example.edu/robotics" }
        },
        "faq": {
            "pageOrder": 3, "nestedOrder": 0,
            "data": { "type": "accordion", "title": "Admissions FAQ", "body": "Applications open in fall." }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let templates = load_templates()?;
    let user_id = std::env::var("PAGETREE_USER").unwrap_or_else(|_| "faculty-1".to_string());

    println!("🔧 Seeding in-memory store...");
    let store = MemoryStore::with_capacity(config.change_channel_capacity);

    let mut changes = store.subscribe_to_changes();
    tokio::spawn(async move {
        while let Ok(event) = changes.recv().await {
            tracing::info!(
                "Batch r{} applied: {} path(s), {} deletion(s)",
                event.revision,
                event.paths.len(),
                event.deletions
            );
        }
    });

    let mut seed = WriteBatch::new();
    seed.set(&config.published_root, seed_homepage()).set(
        config.user_path(&user_id),
        json!({ "name": "Dana Faculty", "userLevel": "Faculty" }),
    );
    store.write(seed).await.context("Failed to seed store")?;
    println!("✅ Published homepage seeded at '{}'", config.published_root);

    let service = BlockService::new(Arc::new(store.clone()), Arc::new(templates), config);
    let policy = service.load_access_policy(&user_id).await?;
    if !policy.can_edit() {
        anyhow::bail!("User '{}' is not whitelisted", user_id);
    }
    let session = service.with_policy(policy);

    let draft = session.create_draft(&user_id).await?;
    println!("📝 Draft created at '{}'", draft);

    println!("✏️  Running scripted edits...");
    let workshop = session.add_child(&draft, 1, BlockKind::Event).await?;
    session
        .update_field(&RecordRef::new(&draft, &workshop, 1, 2), "title", "Capstone Showcase")
        .await?;
    session
        .move_child(&RecordRef::new(&draft, &workshop, 1, 2), Direction::Up)
        .await?;
    session
        .move_group(&RecordRef::new(&draft, "faq", 3, 0), Direction::Up)
        .await?;
    session
        .delete_child(&RecordRef::new(&draft, "seminar", 1, 0))
        .await?;
    session.add_group(&draft, BlockKind::Text).await?;

    let snapshot = session.store().read(&draft).await?;
    let violations = DenseOrderCalculator::density_violations(&snapshot.order_entries());
    if violations.is_empty() {
        println!("✅ Orders are dense");
    } else {
        eprintln!("❌ Density violations: {:?}", violations);
    }

    let mut printed = Vec::new();
    for outcome in session.load_tree(&draft).await? {
        match outcome {
            GroupOutcome::Rendered(group) => printed.push(PrintedGroup {
                page_order: group.page_order,
                layout: group.layout,
                children: group
                    .children
                    .iter()
                    .map(|record| json!({ "key": record.key, "data": record.data }))
                    .collect(),
            }),
            GroupOutcome::Skipped(reason) => eprintln!("⚠️  Skipped group: {:?}", reason),
        }
    }

    println!("{}", serde_json::to_string_pretty(&printed)?);
    Ok(())
}
