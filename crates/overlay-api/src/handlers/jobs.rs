//! Enqueue and status handlers (§4.6, §6).

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use overlay_media::ingest::RemoteRef;
use overlay_media::{ingest, probe_template};
use overlay_models::{Job, JobId, JobPayload, JobSnapshot, SourceVideoRef, TemplateRef, TemplateSet, Variant};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_job_enqueued;
use crate::security::owner_fingerprint;
use crate::state::AppState;

/// Wire shape of a remote asset reference in the enqueue request body (§6).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRefBody {
    pub url: String,
    pub original_name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl From<RemoteRefBody> for RemoteRef {
    fn from(body: RemoteRefBody) -> Self {
        RemoteRef {
            url: body.url,
            original_name: body.original_name,
            size: body.size,
            mime_type: body.mime_type,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TemplatesBody {
    #[serde(default)]
    pub vertical: Option<RemoteRefBody>,
    #[serde(default)]
    pub square: Option<RemoteRefBody>,
    #[serde(default)]
    pub landscape: Option<RemoteRefBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    pub videos: Vec<RemoteRefBody>,
    #[serde(default)]
    pub templates: TemplatesBody,
}

/// `POST /process`: validates the payload shape, ingests remote assets, probes template
/// metadata, enqueues the job, and returns its initial snapshot.
pub async fn enqueue(
    State(state): State<AppState>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<EnqueueRequest>,
) -> ApiResult<Json<JobSnapshot>> {
    if body.videos.is_empty() {
        return Err(ApiError::bad_request("at least one video is required"));
    }
    if body.templates.vertical.is_none() && body.templates.square.is_none() && body.templates.landscape.is_none() {
        return Err(ApiError::bad_request("at least one template is required"));
    }

    let owner = owner_fingerprint(&headers, Some(addr));

    let active = state.queue.owner_active_jobs(&owner).await;
    if active >= state.queue.owner_job_limit() {
        return Err(ApiError::TooManyActiveJobs {
            owner_active_jobs: active,
            owner_job_limit: state.queue.owner_job_limit(),
        });
    }

    let mut sources = Vec::with_capacity(body.videos.len());
    for (index, video) in body.videos.into_iter().enumerate() {
        let label = format!("source_{index}");
        let remote: RemoteRef = video.into();
        let asset = ingest(
            &state.http_client,
            &state.config.scratch_dir,
            &remote,
            &label,
            state.config.allow_insecure_http_sources,
        )
        .await?;
        sources.push(SourceVideoRef {
            scratch_path: asset.scratch_path.to_string_lossy().into_owned(),
            original_name: asset.original_name,
        });
    }

    let templates = ingest_templates(&state, body.templates).await?;

    let payload = JobPayload { sources, templates };
    let job = Job::new(owner.clone(), payload);
    let snapshot = state.queue.enqueue(job).await?;
    record_job_enqueued();

    info!(job_id = %snapshot.job_id, owner = %owner, "job enqueued");
    Ok(Json(snapshot))
}

async fn ingest_templates(state: &AppState, body: TemplatesBody) -> ApiResult<TemplateSet> {
    let mut templates = TemplateSet::default();

    for (variant, slot) in [
        (Variant::Vertical, body.vertical),
        (Variant::Square, body.square),
        (Variant::Landscape, body.landscape),
    ] {
        let Some(remote_body) = slot else { continue };
        let label = format!("template_{}", variant.as_str());
        let remote: RemoteRef = remote_body.into();
        let asset = ingest(
            &state.http_client,
            &state.config.scratch_dir,
            &remote,
            &label,
            state.config.allow_insecure_http_sources,
        )
        .await?;

        let metadata = probe_template(&asset.scratch_path, &label).await;
        let mut template_ref = TemplateRef::new(
            asset.scratch_path.to_string_lossy().into_owned(),
            asset.original_name,
            variant,
        );
        template_ref.metadata = metadata;

        match variant {
            Variant::Vertical => templates.vertical = Some(template_ref),
            Variant::Square => templates.square = Some(template_ref),
            Variant::Landscape => templates.landscape = Some(template_ref),
        }
    }

    Ok(templates)
}

/// `GET /process/{jobId}`: full snapshot, 404 if unknown.
pub async fn status(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Json<JobSnapshot>> {
    let id = JobId(job_id);
    let owner = match state.queue.get_job(&id).await {
        Some(job) => job.owner,
        None => {
            warn!(job_id = %id, "status requested for unknown job");
            return Err(ApiError::not_found("job not found"));
        }
    };

    let active = state.queue.owner_active_jobs(&owner).await;
    let snapshot = state
        .queue
        .snapshot(&id, active)
        .await
        .ok_or_else(|| ApiError::not_found("job not found"))?;

    Ok(Json(snapshot))
}
