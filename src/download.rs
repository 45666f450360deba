//! Bottle download task with progress reporting.
//!
//! A download runs as a single background task. It owns the HTTP response
//! stream and the destination file, and reports back to the event loop only
//! through [`FlowEvent`] messages: one `Progress` per received chunk, then
//! exactly one `Completed` or `Failed`.

use crate::error::{BottleError, Result};
use crate::flow::FlowEvent;
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Bytes received so far, and the expected total when the server sent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    pub downloaded: u64,
    pub total: Option<u64>,
}

impl ProgressSample {
    /// Completed fraction in `[0, 1]`, or `None` while the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(total) if self.downloaded >= total => Some(1.0),
            Some(total) => Some(self.downloaded as f64 / total as f64),
            None => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.fraction() == Some(1.0)
    }
}

/// Turns chunk sizes into a non-decreasing sequence of samples.
#[derive(Debug)]
pub struct ProgressTracker {
    downloaded: u64,
    total: Option<u64>,
    last: Option<ProgressSample>,
}

impl ProgressTracker {
    /// A zero content length is treated the same as a missing one.
    pub fn new(total: Option<u64>) -> Self {
        Self {
            downloaded: 0,
            total: total.filter(|t| *t > 0),
            last: None,
        }
    }

    pub fn advance(&mut self, len: usize) -> ProgressSample {
        self.downloaded += len as u64;
        let sample = ProgressSample {
            downloaded: self.downloaded,
            total: self.total,
        };
        self.last = Some(sample);
        sample
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// Closing sample pinned to 100%, unless the last one already was.
    pub fn finish(&mut self) -> Option<ProgressSample> {
        if self.last.is_some_and(|s| s.is_complete()) {
            return None;
        }
        let sample = ProgressSample {
            downloaded: self.downloaded,
            total: Some(self.downloaded),
        };
        self.last = Some(sample);
        Some(sample)
    }
}

/// Everything the download task needs, captured at spawn time.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub formula: String,
    pub url: String,
    pub sha256: String,
    pub destination: PathBuf,
    pub token: String,
    pub verify_checksum: bool,
}

/// Write every chunk of `stream` to `writer`, reporting progress per chunk.
///
/// Returns the number of bytes written. A stream error or a write error stops
/// the copy and is returned as-is.
pub async fn copy_stream<S, B, E, W>(
    stream: S,
    writer: &mut W,
    tracker: &mut ProgressTracker,
    mut hasher: Option<&mut Sha256>,
    tx: &UnboundedSender<FlowEvent>,
) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<BottleError>,
    W: AsyncWrite + Unpin,
{
    let mut stream = std::pin::pin!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::into)?;
        let bytes = chunk.as_ref();

        writer.write_all(bytes).await?;
        if let Some(hasher) = hasher.as_deref_mut() {
            hasher.update(bytes);
        }

        let sample = tracker.advance(bytes.len());
        let _ = tx.send(FlowEvent::Progress(sample));
    }

    writer.flush().await?;
    Ok(tracker.downloaded())
}

/// Start the one background download. The task always ends by sending either
/// `Completed` or `Failed` on `tx`.
pub fn spawn_download(
    client: reqwest::Client,
    request: DownloadRequest,
    tx: UnboundedSender<FlowEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let event = match download_bottle(&client, &request, &tx).await {
            Ok(bytes) => FlowEvent::Completed {
                path: request.destination.clone(),
                bytes,
            },
            Err(e) => {
                tracing::debug!(error = %e, url = %request.url, "download failed");
                FlowEvent::Failed(e)
            }
        };
        let _ = tx.send(event);
    })
}

async fn download_bottle(
    client: &reqwest::Client,
    request: &DownloadRequest,
    tx: &UnboundedSender<FlowEvent>,
) -> Result<u64> {
    tracing::debug!(url = %request.url, "requesting bottle");

    let response = client
        .get(&request.url)
        .bearer_auth(&request.token)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(BottleError::from_status(&request.formula, status));
    }

    let total = response.content_length();
    tracing::info!(file = %request.destination.display(), ?total, "creating");

    let partial = partial_path(&request.destination);
    let mut file = fs::File::create(&partial).await?;
    let mut tracker = ProgressTracker::new(total);
    let mut hasher = request.verify_checksum.then(Sha256::new);

    let bytes = copy_stream(
        response.bytes_stream(),
        &mut file,
        &mut tracker,
        hasher.as_mut(),
        tx,
    )
    .await?;

    if let Some(sample) = tracker.finish() {
        let _ = tx.send(FlowEvent::Progress(sample));
    }

    if let Some(hasher) = hasher {
        verify_checksum(&request.formula, &request.sha256, hasher)?;
    }

    drop(file);
    fs::rename(&partial, &request.destination).await?;

    Ok(bytes)
}

fn verify_checksum(formula: &str, expected: &str, hasher: Sha256) -> Result<()> {
    if expected.is_empty() {
        tracing::warn!(formula, "no checksum published, skipping verification");
        return Ok(());
    }

    let actual = format!("{:x}", hasher.finalize());
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(BottleError::ChecksumMismatch {
            name: formula.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }

    Ok(())
}

/// Where a bottle is streamed before being moved to `destination`.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Delete the partially written bottle for `destination`. A missing file is
/// not an error.
pub async fn remove_partial(destination: &Path) -> Result<()> {
    let path = partial_path(destination);
    match fs::remove_file(&path).await {
        Ok(()) => {
            tracing::debug!(file = %path.display(), "removed partial download");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
