//! Integration tests for published sheet fetching.
//!
//! These tests verify redirect handling and TSV parsing with mock HTTP servers.

use games_sync_core::sheet::{FetchError, SheetClient, SheetId, SheetSource};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PLATFORMS_TSV: &str = "id\tname\r\npc\tDOS\r\namiga\tAmiga\r\n";

#[tokio::test]
async fn test_fetch_follows_single_redirect() {
    let mock_server = MockServer::start().await;
    let content_url = format!("{}/content/platforms.tsv", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/pub"))
        .and(query_param("gid", SheetId::Platforms.gid()))
        .respond_with(ResponseTemplate::new(307).insert_header("Location", content_url.as_str()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/content/platforms.tsv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PLATFORMS_TSV))
        .mount(&mock_server)
        .await;

    let client = SheetClient::new(format!("{}/pub?output=tsv", mock_server.uri())).unwrap();
    let rows = client.fetch(SheetId::Platforms).await;

    assert!(rows.is_ok(), "fetch should succeed: {:?}", rows.err());
    let rows = rows.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].field("id"), "pc");
    assert_eq!(rows[1].field("name"), "Amiga");
}

#[tokio::test]
async fn test_fetch_without_redirect_parses_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pub"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PLATFORMS_TSV))
        .mount(&mock_server)
        .await;

    let client = SheetClient::new(format!("{}/pub", mock_server.uri())).unwrap();
    let rows = client.fetch(SheetId::Platforms).await.unwrap();

    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_fetch_rejects_second_redirect() {
    let mock_server = MockServer::start().await;
    let hop = format!("{}/hop", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/pub"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", hop.as_str()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/elsewhere"))
        .mount(&mock_server)
        .await;

    let client = SheetClient::new(format!("{}/pub", mock_server.uri())).unwrap();
    let result = client.fetch(SheetId::Games).await;

    assert!(
        matches!(result, Err(FetchError::Redirect { .. })),
        "expected redirect error, got {result:?}"
    );
}

#[tokio::test]
async fn test_fetch_server_error_is_fatal() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pub"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = SheetClient::new(format!("{}/pub", mock_server.uri())).unwrap();
    let result = client.fetch(SheetId::Compatibility).await;

    match result {
        Err(FetchError::HttpStatus { status, .. }) => assert_eq!(status, 500),
        other => panic!("expected HTTP status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_empty_body_yields_no_rows() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pub"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&mock_server)
        .await;

    let client = SheetClient::new(format!("{}/pub", mock_server.uri())).unwrap();
    let rows = client.fetch(SheetId::DirectorDemos).await.unwrap();

    assert!(rows.is_empty());
}
