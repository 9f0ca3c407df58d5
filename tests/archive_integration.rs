//! Integration tests for the archive pipeline: download, then extract.

mod support;

use games_sync_core::ArchivePipeline;
use games_sync_core::HttpClient;
use support::write_zip;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_download_then_extract_unwraps_enclosing_folder() {
    let fixture_dir = TempDir::new().expect("failed to create temp dir");
    let fixture = fixture_dir.path().join("fixture.zip");
    write_zip(
        &fixture,
        &[("Queen/queen.1", b"data"), ("Queen/docs/readme.txt", b"hello")],
    );
    let body = std::fs::read(&fixture).expect("read fixture");

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/frs/extras/queen.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&mock_server)
        .await;

    let work_dir = TempDir::new().expect("failed to create temp dir");
    let pipeline = ArchivePipeline::new(HttpClient::new().expect("client"), work_dir.path());
    let url = format!("{}/frs/extras/queen.zip", mock_server.uri());

    let archive = pipeline
        .download(&url, "queen.zip")
        .await
        .expect("download should succeed");
    assert_eq!(archive, work_dir.path().join("queen.zip"));
    assert!(!work_dir.path().join("queen.zip.downloading").exists());

    let folder = pipeline.extract(&archive).await.expect("extract should succeed");

    assert_eq!(folder, work_dir.path().join("queen"));
    assert_eq!(std::fs::read(folder.join("queen.1")).expect("read"), b"data");
    assert_eq!(
        std::fs::read(folder.join("docs/readme.txt")).expect("read"),
        b"hello"
    );
    assert!(!archive.exists(), "archive is deleted after extraction");
}

#[tokio::test]
async fn test_failed_download_leaves_no_local_artifacts() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/frs/extras/gone.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let work_dir = TempDir::new().expect("failed to create temp dir");
    let pipeline = ArchivePipeline::new(HttpClient::new().expect("client"), work_dir.path());
    let url = format!("{}/frs/extras/gone.zip", mock_server.uri());

    assert!(pipeline.download(&url, "gone.zip").await.is_none());
    let left = std::fs::read_dir(work_dir.path()).expect("read dir").count();
    assert_eq!(left, 0, "no partial or final file may remain");
}

#[tokio::test]
async fn test_stale_download_is_removed_before_processing() {
    let work_dir = TempDir::new().expect("failed to create temp dir");
    let stale = work_dir.path().join("sky.zip.downloading");
    std::fs::write(&stale, b"partial").expect("write stale file");
    let pipeline = ArchivePipeline::new(HttpClient::new().expect("client"), work_dir.path());

    pipeline.remove_stale_download("sky.zip").await;

    assert!(!stale.exists());
}
