use std::path::PathBuf;

// ---------------------------------------------------------------------------
// ObjectStoreConfig
// ---------------------------------------------------------------------------

pub const DEFAULT_OBJECT_STORE_GATEWAY: &str = "http://localhost:8092";
pub const DEFAULT_S3_ENDPOINT: &str = "https://fsn1.your-objectstorage.com";
pub const DEFAULT_S3_REGION: &str = "fsn1";

/// Where remote `s3://` documents are fetched from, and the bucket
/// credentials used when an action does not carry its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreConfig {
    /// Base URL of the object-store gateway service.
    pub gateway_url: String,
    /// S3-compatible endpoint passed through to the gateway.
    pub endpoint: String,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_OBJECT_STORE_GATEWAY.to_string(),
            endpoint: DEFAULT_S3_ENDPOINT.to_string(),
            region: DEFAULT_S3_REGION.to_string(),
            access_key: None,
            secret_key: None,
        }
    }
}

// ---------------------------------------------------------------------------
// GatewayConfig
// ---------------------------------------------------------------------------

/// Process-wide configuration. Built once at start-up and shared read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Shared secret expected in `x-api-key`. `None` accepts every request.
    pub api_key: Option<String>,
    pub object_store: ObjectStoreConfig,
    /// Parent directory for staged remote documents. Defaults to the
    /// system temp dir.
    pub staging_dir: Option<PathBuf>,
}

impl GatewayConfig {
    /// Builder: require `key` on protected endpoints. A blank key disables
    /// the check.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = if key.trim().is_empty() {
            None
        } else {
            Some(key)
        };
        self
    }

    pub fn with_object_store(mut self, object_store: ObjectStoreConfig) -> Self {
        self.object_store = object_store;
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }
}
