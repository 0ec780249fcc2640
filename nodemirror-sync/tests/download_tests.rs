//! Tests for the HTTP and file downloaders.

use nodemirror_sync::{DownloadRequest, Downloader, FileDownloader, HttpDownloader, SyncError};
use pretty_assertions::assert_eq;
use reqwest::Url;
use std::fs;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── HTTP ────────────────────────────────────────────────────────

#[tokio::test]
async fn http_download_writes_destination() {
    let server = MockServer::start().await;
    let body = vec![7u8; 256 * 1024];
    Mock::given(method("GET"))
        .and(path("/content/big.img"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("nested/dir/big.img");
    let downloader = HttpDownloader::new(2).unwrap();
    let bytes = downloader
        .download_one(DownloadRequest::new(format!("{}/content/big.img", server.uri()), &dest))
        .await
        .unwrap();

    assert_eq!(bytes, body.len() as u64);
    assert_eq!(fs::read(&dest).unwrap(), body);
    assert!(!dir.path().join("nested/dir/big.img.part").exists());
}

#[tokio::test]
async fn http_failures_are_per_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ok = DownloadRequest::new(format!("{}/ok", server.uri()), dir.path().join("ok"));
    let gone = DownloadRequest::new(format!("{}/gone", server.uri()), dir.path().join("gone"));

    let downloader = HttpDownloader::new(4).unwrap();
    let reports = downloader.download(vec![ok.clone(), gone.clone()]).await;
    assert_eq!(reports.len(), 2);

    let ok_report = reports.iter().find(|r| r.request == ok).unwrap();
    assert!(ok_report.succeeded());
    assert_eq!(fs::read_to_string(dir.path().join("ok")).unwrap(), "fine");

    let gone_report = reports.iter().find(|r| r.request == gone).unwrap();
    assert!(matches!(
        &gone_report.result,
        Err(SyncError::Download { reason, .. }) if reason.contains("404")
    ));
    assert!(!dir.path().join("gone").exists());
    assert!(!dir.path().join("gone.part").exists());
}

#[tokio::test]
async fn http_runs_requests_concurrently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let requests: Vec<_> = (0..8)
        .map(|i| {
            DownloadRequest::new(
                format!("{}/unit/{i}", server.uri()),
                dir.path().join(format!("unit-{i}")),
            )
        })
        .collect();

    let downloader = HttpDownloader::new(8).unwrap();
    let started = std::time::Instant::now();
    let reports = downloader.download(requests).await;
    assert!(reports.iter().all(|r| r.succeeded()));
    // Sequential transfers would take at least 2.4s.
    assert!(started.elapsed() < Duration::from_millis(2000));
}

#[tokio::test]
async fn unreachable_host_is_network_error() {
    let dir = tempfile::tempdir().unwrap();
    let downloader = HttpDownloader::new(1).unwrap();
    let result = downloader
        .download_one(DownloadRequest::new("http://127.0.0.1:9/nothing", dir.path().join("x")))
        .await;
    assert!(matches!(result, Err(SyncError::Network(_))));
}

// ── Local files ─────────────────────────────────────────────────

#[tokio::test]
async fn file_downloader_copies() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.rpm");
    fs::write(&source, b"payload").unwrap();
    let url = Url::from_file_path(&source).unwrap();

    let dest = dir.path().join("out/copy.rpm");
    let bytes = FileDownloader
        .download_one(DownloadRequest::new(url.as_str(), &dest))
        .await
        .unwrap();
    assert_eq!(bytes, 7);
    assert_eq!(fs::read(&dest).unwrap(), b"payload");
}

#[tokio::test]
async fn file_downloader_rejects_other_schemes() {
    let dir = tempfile::tempdir().unwrap();
    let reports = FileDownloader
        .download(vec![
            DownloadRequest::new("https://example.com/a.rpm", dir.path().join("a")),
            DownloadRequest::new(
                Url::from_file_path(dir.path().join("missing")).unwrap().as_str(),
                dir.path().join("b"),
            ),
        ])
        .await;
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| matches!(r.result, Err(SyncError::Download { .. }))));
}
