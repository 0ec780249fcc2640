//! Downloader collaborator and its HTTP and local-file implementations.
//!
//! A downloader takes a batch of (url, destination) requests and reports
//! one outcome per request. Failures are returned as data so one broken unit
//! never aborts its siblings.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// One transfer: deliver the bytes at `url` to `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
        }
    }
}

/// Outcome of one request. `Ok` carries the number of bytes written.
#[derive(Debug)]
pub struct DownloadReport {
    pub request: DownloadRequest,
    pub result: SyncResult<u64>,
}

impl DownloadReport {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Transfers content. Reports arrive in any order.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Performs every request, reporting each outcome.
    async fn download(&self, requests: Vec<DownloadRequest>) -> Vec<DownloadReport>;

    /// Performs a single request.
    async fn download_one(&self, request: DownloadRequest) -> SyncResult<u64> {
        let url = request.url.clone();
        match self.download(vec![request]).await.pop() {
            Some(report) => report.result,
            None => Err(SyncError::Download {
                url,
                reason: "downloader returned no report".into(),
            }),
        }
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

async fn create_parent(destination: &Path) -> SyncResult<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Downloads over HTTP(S) with bounded concurrency.
pub struct HttpDownloader {
    client: Client,
    max_concurrent: usize,
}

impl HttpDownloader {
    /// Creates a downloader running at most `max_concurrent` transfers at once.
    pub fn new(max_concurrent: usize) -> SyncResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SyncError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client, max_concurrent))
    }

    /// Uses a preconfigured client (e.g. with client certificates).
    pub fn with_client(client: Client, max_concurrent: usize) -> Self {
        Self {
            client,
            max_concurrent: max_concurrent.max(1),
        }
    }

    async fn fetch(&self, request: &DownloadRequest) -> SyncResult<u64> {
        let url = &request.url;
        debug!("Downloading {} to {}", url, request.destination.display());

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("GET {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(SyncError::Download {
                url: url.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        create_parent(&request.destination).await?;
        let part = partial_path(&request.destination);
        let mut file = fs::File::create(&part).await?;
        let mut written = 0u64;
        let streamed: SyncResult<()> = async {
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| SyncError::Network(format!("reading {url} failed: {e}")))?
            {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        }
        .await;
        drop(file);

        if let Err(e) = streamed {
            let _ = fs::remove_file(&part).await;
            return Err(e);
        }
        fs::rename(&part, &request.destination).await?;
        Ok(written)
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, requests: Vec<DownloadRequest>) -> Vec<DownloadReport> {
        futures::stream::iter(requests)
            .map(|request| async move {
                let result = self.fetch(&request).await;
                if let Err(e) = &result {
                    warn!("Download failed: {}", e);
                }
                DownloadReport { request, result }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await
    }
}

/// Resolves `file://` URLs by copying, for parents on a shared filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileDownloader;

impl FileDownloader {
    async fn copy(request: &DownloadRequest) -> SyncResult<u64> {
        let source = Url::parse(&request.url)
            .ok()
            .filter(|u| u.scheme() == "file")
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| SyncError::Download {
                url: request.url.clone(),
                reason: "not a file URL".into(),
            })?;

        create_parent(&request.destination).await?;
        let part = partial_path(&request.destination);
        let copied = fs::copy(&source, &part).await.map_err(|e| SyncError::Download {
            url: request.url.clone(),
            reason: e.to_string(),
        });
        match copied {
            Ok(bytes) => {
                fs::rename(&part, &request.destination).await?;
                Ok(bytes)
            }
            Err(e) => {
                let _ = fs::remove_file(&part).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Downloader for FileDownloader {
    async fn download(&self, requests: Vec<DownloadRequest>) -> Vec<DownloadReport> {
        let mut reports = Vec::with_capacity(requests.len());
        for request in requests {
            let result = Self::copy(&request).await;
            if let Err(e) = &result {
                warn!("Copy failed: {}", e);
            }
            reports.push(DownloadReport { request, result });
        }
        reports
    }
}
