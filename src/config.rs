use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

use crate::services::{metadata_store::MAX_PAGE_SIZE, object_service::ObjectServiceConfig};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Largest `page_size` a list request may ask for.
    pub max_page_size: i64,
    /// Retries after a latest-version conflict during upload.
    pub upload_retries: u32,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Versioned object store API")]
pub struct Args {
    /// Host to bind to (overrides OBJECT_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides OBJECT_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where object payloads are stored (overrides OBJECT_STORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides OBJECT_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Maximum list page size (overrides OBJECT_STORE_MAX_PAGE_SIZE)
    #[arg(long)]
    pub max_page_size: Option<i64>,

    /// Upload conflict retries (overrides OBJECT_STORE_UPLOAD_RETRIES)
    #[arg(long)]
    pub upload_retries: Option<u32>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::from_args(args)?, migrate))
    }

    /// Merge parsed CLI args over environment values and defaults.
    pub fn from_args(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("OBJECT_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parse("OBJECT_STORE_PORT", 3000)?;
        let env_storage =
            env::var("OBJECT_STORE_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("OBJECT_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/object_store.db".into());
        let env_max_page = env_parse("OBJECT_STORE_MAX_PAGE_SIZE", MAX_PAGE_SIZE)?;
        let env_retries = env_parse(
            "OBJECT_STORE_UPLOAD_RETRIES",
            ObjectServiceConfig::default().conflict_retries,
        )?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            max_page_size: args.max_page_size.unwrap_or(env_max_page),
            upload_retries: args.upload_retries.unwrap_or(env_retries),
        };

        if !(1..=MAX_PAGE_SIZE).contains(&cfg.max_page_size) {
            anyhow::bail!(
                "max page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE,
                cfg.max_page_size
            );
        }

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn object_service_config(&self) -> ObjectServiceConfig {
        ObjectServiceConfig {
            conflict_retries: self.upload_retries,
            retry_backoff: Duration::from_millis(10),
        }
    }
}

/// Read and parse `name`, falling back to `default` when unset.
fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
