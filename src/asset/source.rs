//! Works out where the configured cape comes from.
//!
//! A local file wins over a URL. URLs can be `data:` URIs, which are decoded straight away, or
//! `http(s)` addresses, which are only fetched when the bytes are actually needed so that a cache
//! hit costs no network traffic.

use std::{
    fmt,
    path::{Path, PathBuf},
    time::{Duration, UNIX_EPOCH},
};

use base64::{engine::general_purpose::STANDARD, Engine};
use eyre::Result;
use sha2::{Digest, Sha256};

use crate::meta::catalog::form_decode;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);
pub const USER_AGENT: &str = "FishbatteryCapeBridge/1.0";

/// Where a cape's bytes live.
#[derive(Clone, PartialEq, Eq)]
pub enum Origin {
    File(PathBuf),

    /// Bytes decoded from a `data:` URI.
    Data(Vec<u8>),

    /// An `http(s)` URL, fetched on read.
    Http(String),
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::File(path) => write!(f, "file {}", path.display()),
            Origin::Data(bytes) => write!(f, "{} byte data URI", bytes.len()),
            Origin::Http(url) => write!(f, "{url}"),
        }
    }
}

/// A cape's bytes, plus a key that is equal for two sources only if their bytes are.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapeSource {
    cache_key: String,
    origin: Origin,
}

impl CapeSource {
    pub fn new(cache_key: impl Into<String>, origin: Origin) -> CapeSource {
        CapeSource {
            cache_key: cache_key.into(),
            origin,
        }
    }

    /// Wraps in-memory bytes. The key covers the length and a digest of the content, so two
    /// different images never share a key even when they are the same size.
    pub fn from_bytes(bytes: Vec<u8>) -> CapeSource {
        let digest = Sha256::digest(&bytes);
        let prefix: String = digest[..8].iter().map(|byte| format!("{byte:02x}")).collect();

        CapeSource::new(format!("data:{}:{}", bytes.len(), prefix), Origin::Data(bytes))
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Reads the whole payload. For URLs this is where the request happens.
    pub fn read(&self) -> Result<Vec<u8>> {
        match &self.origin {
            Origin::File(path) => Ok(std::fs::read(path)?),
            Origin::Data(bytes) => Ok(bytes.clone()),
            Origin::Http(url) => fetch(url),
        }
    }

    /// The `.sig` file that sits next to a local cape, if this source is a file.
    pub fn signature_path(&self) -> Option<PathBuf> {
        match &self.origin {
            Origin::File(path) => {
                let mut sig = path.as_os_str().to_owned();
                sig.push(".sig");
                Some(PathBuf::from(sig))
            }

            _ => None,
        }
    }
}

/// Performs a single GET. Anything but a 2xx status is an error.
fn fetch(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(READ_TIMEOUT)
        .build()?;

    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()?;

    let status = response.status();

    if !status.is_success() {
        return Err(eyre::format_err!("{} answered with {}", url, status));
    }

    Ok(response.bytes()?.to_vec())
}

/// Returns the source for a regular file at `raw_path`. The key includes the modification time,
/// so edits are picked up without a restart.
fn file_source(raw_path: &str) -> Result<Option<CapeSource>> {
    let path = Path::new(raw_path);
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Ok(None),
    };

    let mtime = metadata.modified()?.duration_since(UNIX_EPOCH)?.as_millis();

    Ok(Some(CapeSource::new(
        format!("path:{raw_path}:{mtime}"),
        Origin::File(path.to_path_buf()),
    )))
}

/// Decodes a `data:` URI. The body is base64 if the header says so, and percent-encoded text
/// otherwise.
fn data_source(uri: &str) -> Option<CapeSource> {
    let (head, body) = uri.split_once(',')?;

    if head.is_empty() || body.is_empty() {
        return None;
    }

    let bytes = if head.contains(";base64") {
        match STANDARD.decode(body) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("Bad base64 in cape data URI: {}", err);
                return None;
            }
        }
    } else {
        form_decode(body).into_bytes()
    };

    Some(CapeSource::from_bytes(bytes))
}

/// Resolves the configured path and URL into a source. Returns `None` when neither gives a
/// usable cape right now.
pub fn resolve(raw_path: &str, raw_url: &str) -> Option<CapeSource> {
    let raw_path = raw_path.trim();
    let raw_url = raw_url.trim();

    if !raw_path.is_empty() {
        match file_source(raw_path) {
            Ok(Some(source)) => return Some(source),
            Ok(None) => log::debug!("Cape path {} is not a file", raw_path),
            Err(err) => log::warn!("Unable to inspect cape file {}: {:?}", raw_path, err),
        }
    }

    if raw_url.is_empty() {
        return None;
    }

    if raw_url.starts_with("data:") {
        return data_source(raw_url);
    }

    if raw_url.starts_with("http://") || raw_url.starts_with("https://") {
        return Some(CapeSource::new(
            format!("url:{raw_url}"),
            Origin::Http(raw_url.to_string()),
        ));
    }

    log::warn!("Unsupported cape URL: {}", raw_url);
    None
}
