use std::path::Path;

use futures_util::StreamExt;
use md5::{Digest, Md5};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use launcher_core::proto::{Event, SessionId};

use super::error::ManagerError;

pub struct DownloadRequest<'a> {
    pub url: &'a str,
    pub target: &'a Path,
    /// Size from release metadata; preferred over the Content-Length header
    /// when both are present.
    pub bytes_expected: Option<u64>,
}

/// Admits only strictly increasing fractions so consumers see progress as
/// non-decreasing even when the transport re-reports a chunk boundary.
struct ProgressGate {
    last: f64,
}

impl ProgressGate {
    fn new() -> Self {
        Self { last: -1.0 }
    }

    fn admit(&mut self, fraction: f64) -> Option<f64> {
        if fraction > self.last {
            self.last = fraction;
            Some(fraction)
        } else {
            None
        }
    }
}

/// Stream `url` into `target`, emitting progress correlated by `session`.
/// Exactly one 1.0 fraction is emitted on success. Cancellation removes the
/// partial file and reports [`ManagerError::DownloadCancelled`]; there is no
/// retry at this layer.
pub async fn download(
    client: &Client,
    request: DownloadRequest<'_>,
    session: SessionId,
    cancel: CancellationToken,
    events: &mpsc::Sender<Event>,
) -> Result<(), ManagerError> {
    if cancel.is_cancelled() {
        return Err(ManagerError::DownloadCancelled);
    }

    if let Some(parent) = request.target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ManagerError::io("creating download directory", e))?;
    }

    let response = client
        .get(request.url)
        .send()
        .await
        .map_err(|e| ManagerError::DownloadFailed(format!("request failed: {e}")))?;
    if !response.status().is_success() {
        return Err(ManagerError::DownloadFailed(format!(
            "server returned {}",
            response.status()
        )));
    }

    let total = request.bytes_expected.or_else(|| response.content_length());
    let mut file = tokio::fs::File::create(request.target)
        .await
        .map_err(|e| ManagerError::io("creating download file", e))?;
    let mut stream = response.bytes_stream();

    let mut received: u64 = 0;
    let mut gate = ProgressGate::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                drop(file);
                let _ = tokio::fs::remove_file(request.target).await;
                return Err(ManagerError::DownloadCancelled);
            }
            chunk = stream.next() => {
                let Some(chunk) = chunk else { break };
                let bytes = chunk
                    .map_err(|e| ManagerError::DownloadFailed(format!("read failed: {e}")))?;
                file.write_all(&bytes)
                    .await
                    .map_err(|e| ManagerError::io("writing download file", e))?;
                received += bytes.len() as u64;
                if let Some(total) = total.filter(|total| *total > 0) {
                    let fraction = (received as f64 / total as f64).min(1.0);
                    if let Some(fraction) = gate.admit(fraction) {
                        let _ = events.send(Event::DownloadProgress { session, fraction }).await;
                    }
                }
            }
        }
    }

    file.flush()
        .await
        .map_err(|e| ManagerError::io("flushing download file", e))?;

    if let Some(total) = total {
        if received != total {
            let _ = tokio::fs::remove_file(request.target).await;
            return Err(ManagerError::DownloadFailed(format!(
                "incomplete download: got {received} of {total} bytes"
            )));
        }
    }

    if gate.admit(1.0).is_some() {
        let _ = events
            .send(Event::DownloadProgress {
                session,
                fraction: 1.0,
            })
            .await;
    }
    Ok(())
}

/// Uppercase hex MD5 of a file, the digest form the release CDN publishes.
pub fn md5_file(path: &Path) -> Result<String, ManagerError> {
    use std::io::Read;

    let mut file = std::fs::File::open(path)
        .map_err(|e| ManagerError::io("opening installer for hashing", e))?;
    let mut hasher = Md5::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| ManagerError::io("reading installer for hashing", e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode_upper(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_file_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, b"hello world").unwrap();
        assert_eq!(
            md5_file(&path).unwrap(),
            "5EB63BBBE01EEED093CB22BB8F5ACDC3"
        );
    }

    #[test]
    fn progress_gate_is_strictly_increasing() {
        let mut gate = ProgressGate::new();
        let admitted: Vec<f64> = [0.1, 0.05, 0.1, 0.5, 0.4, 0.5, 1.0, 1.0]
            .into_iter()
            .filter_map(|fraction| gate.admit(fraction))
            .collect();
        assert_eq!(admitted, vec![0.1, 0.5, 1.0]);
        assert!(admitted.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn cancelled_before_start_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("installer.exe");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, mut rx) = mpsc::channel(8);

        let err = download(
            cdn_client::shared_client(),
            DownloadRequest {
                url: "http://127.0.0.1:9/unreachable",
                target: &target,
                bytes_expected: None,
            },
            1,
            cancel,
            &tx,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ManagerError::DownloadCancelled));
        assert!(!target.exists());
        drop(tx);
        assert!(rx.recv().await.is_none());
    }
}
