use std::collections::BTreeMap;
use std::sync::Arc;

use allocation::{Labels, TargetItem};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{encode_component, html, AppState};

#[derive(Debug, Serialize)]
pub struct LinkJson {
    #[serde(rename = "_link")]
    pub link: String,
}

#[derive(Debug, Serialize)]
pub struct CollectorJson {
    #[serde(rename = "_link")]
    pub link: String,
    pub targets: Vec<TargetJson>,
}

/// One target in Prometheus HTTP service discovery format.
#[derive(Debug, Serialize)]
pub struct TargetJson {
    pub targets: Vec<String>,
    pub labels: Labels,
}

impl From<&TargetItem> for TargetJson {
    fn from(item: &TargetItem) -> Self {
        Self {
            targets: vec![item.target_url().to_string()],
            labels: item.labels().clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TargetsQuery {
    collector_id: Option<String>,
}

fn to_target_json(items: &[Arc<TargetItem>]) -> Vec<TargetJson> {
    items.iter().map(|item| TargetJson::from(item.as_ref())).collect()
}

pub async fn jobs(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let wants_html = headers
        .get(header::ACCEPT)
        .and_then(|accept| accept.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"));
    if wants_html {
        return html::jobs(&state).into_response();
    }

    let mut jobs = BTreeMap::new();
    for item in state.allocator.target_items().values() {
        jobs.entry(item.job_name().to_string())
            .or_insert_with(|| LinkJson {
                link: format!("/jobs/{}/targets", encode_component(item.job_name())),
            });
    }
    Json(jobs).into_response()
}

/// Without `collector_id`, every collector and its targets for the job.
/// With it, that collector's targets in service discovery format.
pub async fn job_targets(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<TargetsQuery>,
) -> Response {
    if let Some(collector_id) = query.collector_id {
        let items = state
            .allocator
            .targets_for_collector_and_job(&collector_id, &job_id);
        return Json(to_target_json(&items)).into_response();
    }

    let mut collectors = BTreeMap::new();
    for name in state.allocator.collectors().into_keys() {
        let items = state.allocator.targets_for_collector_and_job(&name, &job_id);
        let link = format!(
            "/jobs/{}/targets?collector_id={}",
            encode_component(&job_id),
            encode_component(&name)
        );
        collectors.insert(
            name,
            CollectorJson {
                link,
                targets: to_target_json(&items),
            },
        );
    }
    Json(collectors).into_response()
}

/// Serves the stored encoding as is. Before the first discovery tick the
/// body is an empty object.
pub async fn scrape_configs(State(state): State<AppState>) -> Response {
    let body = state
        .scrape_configs
        .get()
        .unwrap_or_else(|| axum::body::Bytes::from_static(b"{}"));
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.scrape_configs.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
