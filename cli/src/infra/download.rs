//! Release artifact download: implements `ArtifactFetcher` with `ureq`.

use std::io::{Read, Write};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::application::ports::{Artifact, ArtifactFetcher};
use crate::domain::{Deadline, DispatchError};

/// Upper bound on a release artifact.
const MAX_ARTIFACT_BYTES: u64 = 200 * 1024 * 1024;

/// Timeout used when the deadline is unbounded.
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Downloads artifacts over HTTPS.
#[derive(Debug, Default, Clone, Copy)]
pub struct UreqFetcher;

impl ArtifactFetcher for UreqFetcher {
    fn fetch(&self, url: &str, deadline: Deadline) -> Result<Artifact, DispatchError> {
        deadline.check("download")?;
        let timeout = deadline.remaining().unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT);
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        let response = agent
            .get(url)
            .call()
            .map_err(|e| DispatchError::Connection(format!("failed to download {url}: {e}")))?;

        let mut file = tempfile::NamedTempFile::new()
            .map_err(|e| DispatchError::Filesystem(format!("cannot create temp file: {e}")))?;
        let mut reader = response.into_reader().take(MAX_ARTIFACT_BYTES);
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; 65536];
        let mut total = 0usize;
        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| DispatchError::Connection(format!("failed to read {url}: {e}")))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).map_err(|e| {
                DispatchError::Filesystem(format!("cannot write temp file: {e}"))
            })?;
            total += n;
        }
        file.flush()
            .map_err(|e| DispatchError::Filesystem(format!("cannot write temp file: {e}")))?;
        if total == 0 {
            return Err(DispatchError::Connection(format!("{url} returned no data")));
        }

        let sha256 = hex_encode(&hasher.finalize());
        debug!(%url, bytes = total, %sha256, "artifact downloaded");
        Ok(Artifact { file, sha256 })
    }
}

/// Lowercase hex encoding.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
