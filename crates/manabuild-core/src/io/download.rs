//! Archive downloads with ordered mirror fallback.
//!
//! Bodies are streamed into a `<dest>.part` file which is renamed into place
//! only once the transfer completed, so an interrupted download never leaves
//! a truncated archive at `dest`.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// A single download failed.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Writing the archive failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The mirror answered with a non-success status
    #[error("failed to download {url} with status: {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },
}

/// One unsuccessful mirror.
#[derive(Debug)]
pub struct MirrorAttempt {
    /// URL that was tried
    pub url: String,
    /// Why it failed
    pub error: DownloadError,
}

/// Every mirror failed.
#[derive(Error, Debug)]
#[error("all {} mirrors failed:{}", .attempts.len(), render_attempts(.attempts))]
pub struct MirrorsExhausted {
    /// Attempts in the order they were made
    pub attempts: Vec<MirrorAttempt>,
}

fn render_attempts(attempts: &[MirrorAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("\n  {a}"))
        .collect()
}

impl fmt::Display for MirrorAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url, self.error)
    }
}

/// Expand mirror templates for `version`; `{version}` is the placeholder.
pub fn expand_mirrors<S: AsRef<str>>(templates: &[S], version: &str) -> Vec<String> {
    templates
        .iter()
        .map(|t| t.as_ref().replace("{version}", version))
        .collect()
}

/// Try `urls` in order and keep the first one that answers with a 2xx/3xx
/// status. Mirrors after the successful one are never contacted.
///
/// Returns the URL that served the file.
///
/// # Errors
///
/// Returns [`MirrorsExhausted`] listing every attempt if no mirror succeeds.
pub async fn download_from_mirrors(
    client: &Client,
    urls: &[String],
    dest: &Path,
) -> Result<String, MirrorsExhausted> {
    let mut attempts = Vec::new();

    for url in urls {
        tracing::debug!(%url, "trying mirror");
        match download_file(client, url, dest).await {
            Ok(bytes) => {
                tracing::info!(%url, bytes, "downloaded archive");
                return Ok(url.clone());
            }
            Err(error) => {
                tracing::warn!(%url, %error, "mirror failed");
                attempts.push(MirrorAttempt {
                    url: url.clone(),
                    error,
                });
            }
        }
    }

    Err(MirrorsExhausted { attempts })
}

/// Stream `url` into `dest`, returning the number of bytes written.
///
/// # Errors
///
/// Returns [`DownloadError`] on transport failures, a status outside
/// `200..400`, or filesystem errors. The partial file is removed first.
pub async fn download_file(client: &Client, url: &str, dest: &Path) -> Result<u64, DownloadError> {
    let part = part_path(dest);
    match stream_to(client, url, &part).await {
        Ok(written) => {
            tokio::fs::rename(&part, dest).await?;
            Ok(written)
        }
        Err(e) => {
            tokio::fs::remove_file(&part).await.ok();
            Err(e)
        }
    }
}

async fn stream_to(client: &Client, url: &str, part: &Path) -> Result<u64, DownloadError> {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await?;

    let status = response.status();
    if !(status.is_success() || status.is_redirection()) {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let mut file = File::create(part).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}
