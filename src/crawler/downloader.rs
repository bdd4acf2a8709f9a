//! Attachment downloads
//!
//! This module streams resolved attachments to disk:
//! - File name derivation from the link, Content-Disposition or the URL
//! - The `reply` sentinel, which marks links that are not real files
//! - Chunked writes into a hidden part file, renamed into place when complete
//! - Collision-safe final names (`name - 1.ext`, `name - 2.ext`, ...)

use crate::crawler::fetcher::{classify_error, PageFetcher};
use crate::crawler::ResolvedAttachment;
use crate::url::{file_name_from_url, sanitize_file_name};
use crate::ArchiverError;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION};
use reqwest::Response;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Derived name marking a link that is not a real attachment
pub const SENTINEL_NAME: &str = "reply";

/// Name used when neither the link, the headers nor the URL provide one
pub const FALLBACK_FILE_NAME: &str = "download";

/// Result of a download attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The file was written to `path`
    Saved { path: PathBuf, file_name: String },

    /// The derived name was the sentinel; nothing was written
    Sentinel,
}

/// Streams resolved attachments into a directory
pub struct Downloader {
    fetcher: PageFetcher,
    chunk_size: usize,
}

impl Downloader {
    pub fn new(fetcher: PageFetcher, chunk_size: usize) -> Self {
        Self {
            fetcher,
            chunk_size,
        }
    }

    /// Downloads `attachment` into `destination`
    ///
    /// The body is written to a hidden part file first (see [`part_file_name`]).
    /// Only a complete transfer is renamed to its final, collision-free name;
    /// on any error or cancellation the part file is removed.
    pub async fn download(
        &self,
        attachment: &ResolvedAttachment,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome, ArchiverError> {
        let response = self.fetcher.get(&attachment.url).await?;
        let name = derive_file_name(&attachment.name, response.headers(), &attachment.url);

        if name == SENTINEL_NAME {
            tracing::debug!("Skipping sentinel attachment {}", attachment.url);
            return Ok(DownloadOutcome::Sentinel);
        }

        let file_name = sanitize_file_name(&name);
        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|e| ArchiverError::filesystem(destination, e))?;

        let part_path = destination.join(part_file_name(&file_name));
        match self.write_body(response, &part_path, cancel).await {
            Ok(bytes) => {
                tracing::debug!("Received {} bytes from {}", bytes, attachment.url);
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&part_path).await {
                    tracing::debug!(
                        "Could not remove {}: {}",
                        part_path.display(),
                        remove_err
                    );
                }
                return Err(e);
            }
        }

        let path = unique_path(destination, &file_name);
        tokio::fs::rename(&part_path, &path)
            .await
            .map_err(|e| ArchiverError::filesystem(&path, e))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(file_name);

        Ok(DownloadOutcome::Saved { path, file_name })
    }

    async fn write_body(
        &self,
        response: Response,
        part_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, ArchiverError> {
        let file = File::create(part_path)
            .await
            .map_err(|e| ArchiverError::filesystem(part_path, e))?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);

        let url = response.url().to_string();
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ArchiverError::Cancelled),
                next = stream.next() => next,
            };

            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| classify_error(&url, e))?;

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| ArchiverError::filesystem(part_path, e))?;
            bytes_written += chunk.len() as u64;
        }

        writer
            .flush()
            .await
            .map_err(|e| ArchiverError::filesystem(part_path, e))?;

        Ok(bytes_written)
    }
}

fn derive_file_name(given: &str, headers: &HeaderMap, url: &Url) -> String {
    let given = given.trim();
    if !given.is_empty() {
        return given.to_string();
    }

    headers
        .get(CONTENT_DISPOSITION)
        .and_then(|value| {
            content_disposition_file_name(&String::from_utf8_lossy(value.as_bytes()))
        })
        .or_else(|| file_name_from_url(url))
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

/// Extracts the file name from a Content-Disposition header value
///
/// `filename*=` (RFC 5987, percent-encoded with a charset) wins over a plain
/// `filename=`. UTF-8 and ISO-8859-1 are decoded; other charsets are read
/// as UTF-8 with replacement characters.
///
/// # Examples
///
/// ```
/// use forum_archiver::crawler::content_disposition_file_name;
///
/// assert_eq!(
///     content_disposition_file_name("attachment; filename=\"a.bin\"; filename*=UTF-8''%D0%B0.bin"),
///     Some("а.bin".to_string())
/// );
/// assert_eq!(
///     content_disposition_file_name("attachment; filename=plain.bin"),
///     Some("plain.bin".to_string())
/// );
/// assert_eq!(content_disposition_file_name("inline"), None);
/// ```
pub fn content_disposition_file_name(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for parameter in split_parameters(header) {
        let Some((key, value)) = parameter.split_once('=') else {
            continue;
        };
        let value = value.trim();

        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => extended = decode_extended_value(value),
            "filename" => plain = Some(unquote(value).to_string()),
            _ => {}
        }
    }

    extended
        .filter(|name| !name.is_empty())
        .or_else(|| plain.filter(|name| !name.is_empty()))
}

fn split_parameters(header: &str) -> Vec<&str> {
    let mut parameters = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (i, c) in header.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parameters.push(&header[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parameters.push(&header[start..]);

    parameters
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn decode_extended_value(value: &str) -> Option<String> {
    // charset'language'percent-encoded
    let value = unquote(value);
    let (charset, rest) = value.split_once('\'')?;
    let (_language, encoded) = rest.split_once('\'')?;

    let bytes = urlencoding::decode_binary(encoded.as_bytes());
    let decoded = match charset.to_ascii_lowercase().as_str() {
        "iso-8859-1" | "latin1" | "latin-1" => bytes.iter().map(|&b| b as char).collect::<String>(),
        _ => match bytes {
            Cow::Borrowed(b) => String::from_utf8_lossy(b).into_owned(),
            Cow::Owned(b) => String::from_utf8(b)
                .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()),
        },
    };

    Some(decoded)
}

/// Returns the first free path for `file_name` inside `dir`
///
/// An existing `name.ext` yields `name - 1.ext`, then `name - 2.ext`, and
/// so on. A leading dot does not start an extension.
///
/// # Examples
///
/// ```
/// use forum_archiver::crawler::unique_path;
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("report.bin"), b"first").unwrap();
/// assert_eq!(unique_path(dir.path(), "report.bin"), dir.path().join("report - 1.bin"));
/// ```
pub fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, extension) = match file_name.rfind('.') {
        Some(pos) if pos > 0 => file_name.split_at(pos),
        _ => (file_name, ""),
    };

    let mut n: u64 = 1;
    loop {
        let candidate = dir.join(format!("{} - {}{}", stem, n, extension));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Hidden temporary name a download is streamed into before the rename
///
/// Derived from a hash of the final name, so it stays short even when the
/// final name is close to the filesystem's length limit.
pub fn part_file_name(file_name: &str) -> String {
    let digest = Sha256::digest(file_name.as_bytes());
    format!(".{}.part", &hex::encode(digest)[..16])
}
