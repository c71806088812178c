use crate::error::{IngestError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

pub const DEFAULT_SOURCE_URL: &str =
    "https://www.kilometerafstanden.nl/dtm-reistijdenkaart/dtm_pc4.csv";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The raw file was already cached locally.
    Cached(PathBuf),
    Downloaded { path: PathBuf, bytes: u64 },
}

/// Downloads the raw matrix file once.
///
/// The body is streamed into a `.part` file and renamed on completion. No retries: a failed
/// download is reported to the caller and nothing is left at `dest`.
pub async fn fetch_raw_file(url: &str, dest: &Path, timeout: Duration) -> Result<FetchOutcome> {
    if tokio::fs::try_exists(dest).await? {
        log::debug!("Raw file {} already present", dest.display());
        return Ok(FetchOutcome::Cached(dest.to_path_buf()));
    }
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    log::info!("Downloading raw matrix file from {url}");
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| IngestError::FetchError(format!("build HTTP client: {err}")))?;

    let mut response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|err| IngestError::FetchError(format!("GET {url}: {err}")))?;

    let part = part_path(dest);
    let written = match stream_to_file(&mut response, &part).await {
        Ok(written) => written,
        Err(err) => {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(err);
        }
    };
    tokio::fs::rename(&part, dest).await?;

    log::info!("Downloaded {written} bytes to {}", dest.display());
    Ok(FetchOutcome::Downloaded {
        path: dest.to_path_buf(),
        bytes: written,
    })
}

async fn stream_to_file(response: &mut reqwest::Response, part: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(part).await?;
    let mut written = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| IngestError::FetchError(format!("read body: {err}")))?
    {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut raw = dest.as_os_str().to_os_string();
    raw.push(".part");
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn cached_file_is_not_downloaded_again() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("dtm_pc4.csv");
        tokio::fs::write(&dest, "pc4_from;pc4_to;duration_s;distance_m\n")
            .await
            .unwrap();

        // Unroutable URL: reaching the network would fail the test.
        let outcome = fetch_raw_file("http://127.0.0.1:9/none.csv", &dest, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Cached(dest));
    }

    #[tokio::test]
    async fn failed_download_leaves_nothing_behind() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("dtm_pc4.csv");

        let err = fetch_raw_file("http://127.0.0.1:9/none.csv", &dest, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::FetchError(_)), "{err}");
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }
}
