//! Retrieval of `s3://bucket/key` documents through the object-store gateway.
//!
//! The gateway is another semantic-action service: it is sent a
//! `DownloadAction` naming the bucket, key and a local destination path, and
//! answers with the action document and its `actionStatus`.

use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::action::{ActionStatus, Node};
use crate::config::ObjectStoreConfig;
use crate::error::{GatewayError, Result};

pub const REMOTE_SCHEME: &str = "s3://";

// ---------------------------------------------------------------------------
// ObjectLocation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn is_remote(location: &str) -> bool {
        location.starts_with(REMOTE_SCHEME)
    }

    pub fn parse(location: &str) -> Result<Self> {
        let rest = location.strip_prefix(REMOTE_SCHEME).ok_or_else(|| {
            GatewayError::ObjectStore(format!("'{location}' is not an {REMOTE_SCHEME} reference"))
        })?;
        match rest.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && is_plain_name(last_segment(key)) => {
                Ok(Self {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            _ => Err(GatewayError::ObjectStore(format!(
                "invalid reference '{location}', expected s3://bucket/key"
            ))),
        }
    }

    /// Last path segment of the key.
    pub fn file_name(&self) -> &str {
        last_segment(&self.key)
    }
}

fn last_segment(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// A name that stays inside the directory it is joined onto.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('\\')
}

// ---------------------------------------------------------------------------
// BucketOverrides
// ---------------------------------------------------------------------------

/// Bucket settings supplied by the action itself. Each one that is set wins
/// over the configured default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketOverrides {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl BucketOverrides {
    /// Read overrides from a document's `additionalProperty`.
    pub fn from_node(node: Node<'_>) -> Self {
        let read = |key: &str| node.additional(key).map(str::to_string);
        Self {
            endpoint: read("endpoint"),
            region: read("region"),
            access_key: read("accessKey"),
            secret_key: read("secretKey"),
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

pub struct FetchRequest<'a> {
    pub location: &'a ObjectLocation,
    pub encoding_format: Option<&'a str>,
    pub overrides: &'a BucketOverrides,
    /// Local path the object must be written to.
    pub destination: &'a Path,
}

/// Something that can materialise a remote object as a local file.
pub trait ObjectStore: Send + Sync {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<()>;
}

/// [`ObjectStore`] backed by the object-store gateway service.
#[derive(Debug, Clone)]
pub struct GatewayObjectStore {
    config: ObjectStoreConfig,
}

impl GatewayObjectStore {
    pub fn new(config: ObjectStoreConfig) -> Self {
        Self { config }
    }

    /// The `DownloadAction` sent to the gateway for `request`.
    pub fn download_action(&self, request: &FetchRequest<'_>) -> Value {
        let o = request.overrides;
        let pick = |own: &Option<String>, default: &str| -> String {
            own.clone().unwrap_or_else(|| default.to_string())
        };
        let access_key = o
            .access_key
            .clone()
            .or_else(|| self.config.access_key.clone())
            .unwrap_or_default();
        let secret_key = o
            .secret_key
            .clone()
            .or_else(|| self.config.secret_key.clone())
            .unwrap_or_default();

        json!({
            "@context": "https://schema.org",
            "@type": "DownloadAction",
            "object": {
                "@type": "MediaObject",
                "identifier": request.location.key,
                "encodingFormat": request.encoding_format.unwrap_or_default(),
                "contentUrl": request.destination.to_string_lossy(),
            },
            "target": {
                "@type": "DataCatalog",
                "identifier": request.location.bucket,
                "url": pick(&o.endpoint, &self.config.endpoint),
                "additionalProperty": {
                    "region": pick(&o.region, &self.config.region),
                    "accessKey": access_key,
                    "secretKey": secret_key,
                },
            },
        })
    }
}

impl ObjectStore for GatewayObjectStore {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<()> {
        let url = format!(
            "{}/v1/api/semantic/action",
            self.config.gateway_url.trim_end_matches('/')
        );
        let body = serde_json::to_vec(&self.download_action(request))?;
        tracing::debug!(
            %url,
            bucket = %request.location.bucket,
            key = %request.location.key,
            "requesting object download"
        );

        let unreachable = |e: reqwest::Error| {
            GatewayError::ObjectStore(format!("gateway request failed: {e}"))
        };
        let http = Client::builder().build().map_err(unreachable)?;
        let response = http
            .post(&url)
            .header(CONTENT_TYPE, "application/ld+json")
            .body(body)
            .send()
            .map_err(unreachable)?;

        let status = response.status();
        let text = response.text().map_err(unreachable)?;
        if status.as_u16() >= 400 {
            return Err(GatewayError::ObjectStore(format!(
                "gateway returned status {}: {text}",
                status.as_u16()
            )));
        }

        let reply: Value = serde_json::from_str(&text).map_err(|e| {
            GatewayError::ObjectStore(format!("gateway response is not JSON: {e}"))
        })?;
        match reply.get("actionStatus").and_then(Value::as_str) {
            Some(s) if s == ActionStatus::Completed.as_str() => Ok(()),
            Some(s) => Err(GatewayError::ObjectStore(format!(
                "download failed with status {s}"
            ))),
            None => Err(GatewayError::ObjectStore(
                "gateway response has no actionStatus".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// StagedObject
// ---------------------------------------------------------------------------

/// A remote object copied into a private temporary directory. The directory
/// and the file are removed when this value is dropped.
#[derive(Debug)]
pub struct StagedObject {
    path: PathBuf,
    dir: TempDir,
}

impl StagedObject {
    /// Fetch `location` into a fresh directory under `staging_dir` (or the
    /// system temp dir). On error nothing is left behind.
    pub fn fetch(
        store: &dyn ObjectStore,
        location: &ObjectLocation,
        encoding_format: Option<&str>,
        overrides: &BucketOverrides,
        staging_dir: Option<&Path>,
    ) -> Result<Self> {
        let name = location.file_name();
        if !is_plain_name(name) {
            return Err(GatewayError::ObjectStore(format!(
                "key '{}' does not end in a file name",
                location.key
            )));
        }
        let mut builder = tempfile::Builder::new();
        builder.prefix("basex-stage-");
        let dir = match staging_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        let path = dir.path().join(name);

        store.fetch(&FetchRequest {
            location,
            encoding_format,
            overrides,
            destination: &path,
        })?;
        tracing::debug!(path = %path.display(), "staged remote object");
        Ok(Self { path, dir })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedObject {
    fn drop(&mut self) {
        tracing::debug!(dir = %self.dir.path().display(), "removing staged object");
    }
}
