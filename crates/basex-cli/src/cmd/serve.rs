use anyhow::Result;
use basex_core::{GatewayConfig, ObjectStoreConfig};
use clap::Parser;
use std::path::PathBuf;

/// Listener and downstream settings. Every flag can also come from the
/// environment.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8090)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind: String,

    /// Shared secret expected in `x-api-key` (empty disables the check)
    #[arg(long, env = "BASEX_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Object-store gateway used to fetch s3:// documents
    #[arg(long, env = "S3_SERVICE_URL", default_value = basex_core::config::DEFAULT_OBJECT_STORE_GATEWAY)]
    pub object_store_url: String,

    /// S3-compatible endpoint passed to the gateway
    #[arg(long, env = "S3_ENDPOINT_URL", default_value = basex_core::config::DEFAULT_S3_ENDPOINT)]
    pub s3_endpoint: String,

    #[arg(long, env = "S3_REGION", default_value = basex_core::config::DEFAULT_S3_REGION)]
    pub s3_region: String,

    #[arg(long, env = "S3_ACCESS_KEY", hide_env_values = true)]
    pub s3_access_key: Option<String>,

    #[arg(long, env = "S3_SECRET_KEY", hide_env_values = true)]
    pub s3_secret_key: Option<String>,

    /// Parent directory for staged remote documents (default: system temp dir)
    #[arg(long, env = "STAGING_DIR")]
    pub staging_dir: Option<PathBuf>,
}

impl ServeArgs {
    pub fn gateway_config(&self) -> GatewayConfig {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        let mut config = GatewayConfig::default().with_object_store(ObjectStoreConfig {
            gateway_url: self.object_store_url.trim_end_matches('/').to_string(),
            endpoint: self.s3_endpoint.clone(),
            region: self.s3_region.clone(),
            access_key: non_empty(&self.s3_access_key),
            secret_key: non_empty(&self.s3_secret_key),
        });
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key.clone());
        }
        if let Some(dir) = &self.staging_dir {
            config = config.with_staging_dir(dir.clone());
        }
        config
    }
}

pub fn run(args: ServeArgs) -> Result<()> {
    let config = args.gateway_config();
    let addr = format!("{}:{}", args.bind, args.port);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(basex_server::serve(config, &addr))
}
