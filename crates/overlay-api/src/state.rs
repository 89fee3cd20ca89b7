//! Application state.

use std::sync::Arc;

use overlay_media::FfmpegRunner;
use overlay_queue::Queue;
use overlay_storage::{BlobConfig, BlobSnapshotStore, JobStore, RedisSnapshotCache};
use tracing::info;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<JobStore>,
    pub queue: Arc<Queue>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self, anyhow::Error> {
        tokio::fs::create_dir_all(&config.scratch_dir).await?;

        let kv = if config.kv_enabled() {
            let redis_url = config.redis_url.clone().expect("kv_enabled guarantees redis_url");
            info!("kv snapshot cache enabled");
            Some(Arc::new(RedisSnapshotCache::connect(&redis_url)?))
        } else {
            None
        };

        let blob = if config.blob_enabled() {
            info!("blob snapshot store enabled");
            let blob_config = BlobConfig {
                endpoint: config.blob_endpoint.clone().expect("blob_enabled guarantees endpoint"),
                bucket: config.blob_bucket.clone().expect("blob_enabled guarantees bucket"),
                access_key_id: config
                    .blob_access_key_id
                    .clone()
                    .expect("blob_enabled guarantees access key"),
                secret_access_key: config
                    .blob_secret_access_key
                    .clone()
                    .expect("blob_enabled guarantees secret key"),
                region: config.blob_region.clone(),
            };
            Some(Arc::new(BlobSnapshotStore::connect(blob_config).await))
        } else {
            None
        };

        let store = Arc::new(JobStore::new(kv, blob, config.job_snapshot_ttl_seconds));
        let runner = Arc::new(FfmpegRunner::new()?);
        let queue = Arc::new(Queue::new(
            store.clone(),
            runner,
            config.scratch_dir.clone(),
            config.max_active_jobs_per_owner,
        ));

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("overlay-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            store,
            queue,
            http_client,
        })
    }
}
