//! End-to-end runs of `run_sync` with in-memory sheets and mirror.

mod support;

use std::path::Path;

use games_sync_core::config::SettingsInput;
use games_sync_core::sheet::SheetId;
use games_sync_core::{
    ArchivePipeline, HttpClient, RunContext, SyncError, SyncSettings, read_export, run_sync,
};
use support::{FakeTransport, MemorySheets, row};
use tempfile::TempDir;

const BASE: &str = "/srv/games";

fn sheets() -> MemorySheets {
    MemorySheets::default()
        .with_tab(SheetId::Compatibility, vec![row(&[("id", "sky")])])
        .with_tab(SheetId::Platforms, vec![row(&[("id", "pc"), ("name", "DOS")])])
        .with_tab(
            SheetId::Games,
            vec![row(&[("id", "sky"), ("name", "Beneath a Steel Sky")])],
        )
        .with_tab(
            SheetId::GameDemos,
            vec![
                row(&[
                    ("id", "sky"),
                    ("platform", "pc"),
                    ("category", ""),
                    ("url", "/frs/demos/sky/sky-demo.zip"),
                    ("lang", "en"),
                ]),
                row(&[
                    ("id", "sky"),
                    ("platform", "pc"),
                    ("category", "CD"),
                    ("url", "/frs/demos/sky/sky-cd-demo.zip"),
                ]),
                row(&[
                    ("id", "unsupported"),
                    ("platform", "pc"),
                    ("url", "/frs/demos/other/other.zip"),
                ]),
            ],
        )
}

fn settings(root: &Path, items: &[&str]) -> SyncSettings {
    let input = SettingsInput {
        items: items.iter().map(|s| (*s).to_string()).collect(),
        download_dir: Some(root.join("games")),
        scp_server: Some("sync@mirror".to_string()),
        scp_path: Some(BASE.to_string()),
        overrides: Some(root.join("metadata.json")),
        output: Some(root.join("games.json")),
        ..SettingsInput::default()
    };
    SyncSettings::resolve(input, |_| None).expect("settings should resolve")
}

fn mirror() -> FakeTransport {
    let transport = FakeTransport::with_base(BASE, &["sky-cd-demo"]);
    transport.set(|s| {
        s.files
            .insert(format!("{BASE}/sky-cd-demo/sky.dsk"), b"disk".to_vec());
        s.files
            .insert(format!("{BASE}/sky-cd-demo/index.json"), b"keep".to_vec());
    });
    transport
}

#[tokio::test]
async fn test_full_run_uploads_exports_and_indexes() {
    let root = TempDir::new().expect("failed to create temp dir");
    std::fs::write(
        root.path().join("metadata.json"),
        r#"{"sky-demo": {"id": "sky", "notes": "beta"}}"#,
    )
    .expect("write overrides");
    let demo = root.path().join("games/sky-demo");
    std::fs::create_dir_all(&demo).expect("create demo folder");
    std::fs::write(demo.join("sky.dnr"), b"dnr").expect("write demo file");

    let transport = mirror();
    let mut ctx = RunContext::new(settings(root.path(), &[]));
    let pipeline = ArchivePipeline::new(
        HttpClient::new().expect("client"),
        ctx.settings.download_dir.clone(),
    );

    let summary = run_sync(&mut ctx, &sheets(), &transport, &pipeline)
        .await
        .expect("run should succeed");

    assert_eq!(summary.catalog_size, 2, "incompatible demo is not cataloged");
    assert_eq!(summary.report.uploaded, 1);
    assert_eq!(summary.exported, Some(2));
    assert_eq!(ctx.processed, vec!["sky-cd-demo", "sky-demo"]);
    assert!(transport.has_file("/srv/games/sky-demo/sky.dnr"));

    let entries = read_export(&root.path().join("games.json"))
        .await
        .expect("export should be readable");
    let paths: Vec<&str> = entries.iter().map(|e| e.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["sky-cd-demo", "sky-demo"]);
    assert_eq!(
        entries[1].description.as_deref(),
        Some("DOS Beneath a Steel Sky Demo"),
        "blank category falls back to the game name"
    );
    assert!(entries[1].languages.is_empty(), "bare en is dropped");
    assert_eq!(entries[1].extensions.get("notes"), Some(&serde_json::json!("beta")));
    assert_eq!(entries[0].description.as_deref(), Some("DOS CD Demo"));

    let root_index: serde_json::Value = serde_json::from_slice(
        &transport
            .file("/srv/games/index.json")
            .expect("root index must be written"),
    )
    .expect("root index is JSON");
    assert_eq!(
        root_index,
        serde_json::json!({"sky-cd-demo": {}, "sky-demo": {}})
    );
    let demo_index: serde_json::Value = serde_json::from_slice(
        &transport
            .file("/srv/games/sky-demo/index.json")
            .expect("new directory gets an index"),
    )
    .expect("index is JSON");
    assert_eq!(demo_index, serde_json::json!({"sky.dnr": 3}));
    assert_eq!(
        transport.file("/srv/games/sky-cd-demo/index.json").as_deref(),
        Some(&b"keep"[..]),
        "existing subdirectory index is left alone"
    );
    assert_eq!(summary.index.map(|i| i.kept), Some(1));
}

#[tokio::test]
async fn test_requested_item_limits_work_list() {
    let root = TempDir::new().expect("failed to create temp dir");
    let transport = mirror();
    let mut ctx = RunContext::new(settings(root.path(), &["sky/sky-cd-demo.zip"]));
    let pipeline = ArchivePipeline::new(
        HttpClient::new().expect("client"),
        ctx.settings.download_dir.clone(),
    );

    let summary = run_sync(&mut ctx, &sheets(), &transport, &pipeline)
        .await
        .expect("run should succeed");

    assert_eq!(summary.work_items, 1);
    assert_eq!(ctx.processed, vec!["sky-cd-demo"]);
    assert!(transport.copies().iter().all(|c| c.ends_with("index.json")));
}

#[tokio::test]
async fn test_unknown_requested_item_aborts_before_listing() {
    let root = TempDir::new().expect("failed to create temp dir");
    let transport = mirror();
    let mut ctx = RunContext::new(settings(root.path(), &["no-such-game"]));
    let pipeline = ArchivePipeline::new(HttpClient::new().expect("client"), root.path());

    let result = run_sync(&mut ctx, &sheets(), &transport, &pipeline).await;

    assert!(matches!(result, Err(SyncError::UnknownItem(_))), "got {result:?}");
    assert!(!root.path().join("games.json").exists());
}

#[tokio::test]
async fn test_missing_remote_base_is_a_configuration_error() {
    let root = TempDir::new().expect("failed to create temp dir");
    let transport = FakeTransport::default();
    let mut ctx = RunContext::new(settings(root.path(), &[]));
    let pipeline = ArchivePipeline::new(HttpClient::new().expect("client"), root.path());

    let result = run_sync(&mut ctx, &sheets(), &transport, &pipeline).await;

    assert!(matches!(result, Err(SyncError::Config(_))), "got {result:?}");
}

#[tokio::test]
async fn test_failing_sheet_aborts_run() {
    let root = TempDir::new().expect("failed to create temp dir");
    let transport = mirror();
    let mut sheets = sheets();
    sheets.failing = Some(SheetId::Platforms);
    let mut ctx = RunContext::new(settings(root.path(), &[]));
    let pipeline = ArchivePipeline::new(HttpClient::new().expect("client"), root.path());

    let result = run_sync(&mut ctx, &sheets, &transport, &pipeline).await;

    assert!(matches!(result, Err(SyncError::Fetch(_))), "got {result:?}");
    assert!(transport.copies().is_empty());
}
