//! Environment-driven configuration (§6 "Configuration (environment variables)").

use std::path::PathBuf;

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_var(key).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn bool_env(key: &str, default: bool) -> bool {
    match env_var(key).as_deref() {
        Some("1") | Some("true") | Some("TRUE") | Some("yes") => true,
        Some("0") | Some("false") | Some("FALSE") | Some("no") => false,
        _ => default,
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub scratch_dir: PathBuf,
    pub max_active_jobs_per_owner: u32,
    pub job_snapshot_ttl_seconds: u64,
    pub allow_insecure_http_sources: bool,
    pub cors_origins: Vec<String>,
    pub max_body_size_bytes: usize,
    pub metrics_enabled: bool,
    pub redis_url: Option<String>,
    pub blob_endpoint: Option<String>,
    pub blob_bucket: Option<String>,
    pub blob_access_key_id: Option<String>,
    pub blob_secret_access_key: Option<String>,
    pub blob_region: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = env_var("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let is_production = environment == "production";

        let cors_origins = env_var("CORS_ORIGINS")
            .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
            .unwrap_or_else(|| vec!["*".to_string()]);

        Self {
            host: env_var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed_env("PORT", 8080),
            environment,
            scratch_dir: env_var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            max_active_jobs_per_owner: parsed_env("MAX_ACTIVE_JOBS_PER_OWNER", 2),
            job_snapshot_ttl_seconds: parsed_env("JOB_SNAPSHOT_TTL_SECONDS", 86_400),
            allow_insecure_http_sources: bool_env("ALLOW_INSECURE_HTTP_SOURCES", !is_production),
            cors_origins,
            max_body_size_bytes: parsed_env("MAX_BODY_SIZE_BYTES", 2 * 1024 * 1024 * 1024),
            metrics_enabled: bool_env("METRICS_ENABLED", true),
            redis_url: env_var("REDIS_URL"),
            blob_endpoint: env_var("BLOB_ENDPOINT"),
            blob_bucket: env_var("BLOB_BUCKET"),
            blob_access_key_id: env_var("BLOB_ACCESS_KEY_ID"),
            blob_secret_access_key: env_var("BLOB_SECRET_ACCESS_KEY"),
            blob_region: env_var("BLOB_REGION").unwrap_or_else(|| "auto".to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn kv_enabled(&self) -> bool {
        self.redis_url.is_some()
    }

    pub fn blob_enabled(&self) -> bool {
        self.blob_endpoint.is_some()
            && self.blob_bucket.is_some()
            && self.blob_access_key_id.is_some()
            && self.blob_secret_access_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_env_falls_back_to_default_on_unset_or_unparseable() {
        std::env::remove_var("TEST_FLAG_UNSET_XYZ");
        assert!(bool_env("TEST_FLAG_UNSET_XYZ", true));
        assert!(!bool_env("TEST_FLAG_UNSET_XYZ", false));
    }

    #[test]
    fn blob_enabled_requires_all_four_fields() {
        let mut cfg = AppConfig::from_env();
        cfg.blob_endpoint = Some("https://s3.example.com".into());
        cfg.blob_bucket = None;
        assert!(!cfg.blob_enabled());

        cfg.blob_bucket = Some("bucket".into());
        cfg.blob_access_key_id = Some("key".into());
        cfg.blob_secret_access_key = Some("secret".into());
        assert!(cfg.blob_enabled());
    }
}
