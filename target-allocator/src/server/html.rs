//! Human-readable pages for browsing the current allocation.
//!
//! Every page renders from one [`Snapshot`], so counts and tables on a page
//! always agree with each other. Markup lives in `templates/`; askama escapes
//! everything that came from discovery or the query string.

use std::collections::{BTreeMap, BTreeSet};

use allocation::{Snapshot, TargetItem};
use askama::Template;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use super::{encode_component, AppState};

/// Label-derived rows on the target page, in display order.
const TARGET_DETAIL_LABELS: [(&str, &str); 6] = [
    ("Namespace", "__meta_kubernetes_namespace"),
    ("Service Name", "__meta_kubernetes_service_name"),
    ("Service Port", "__meta_kubernetes_service_port"),
    ("Pod Name", "__meta_kubernetes_pod_name"),
    ("Container Name", "__meta_kubernetes_pod_container_name"),
    ("Container Port Name", "__meta_kubernetes_pod_container_port_name"),
];

#[derive(Debug, Deserialize)]
pub struct TargetParams {
    target_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobParams {
    job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CollectorParams {
    collector_id: Option<String>,
}

/// An anchor. `href` is already percent-encoded; both parts are escaped on
/// render.
#[derive(Debug, PartialEq)]
struct Link {
    href: String,
    text: String,
}

struct Field {
    name: String,
    value: String,
}

struct CollectorSummary {
    collector: Link,
    job_count: usize,
    target_count: usize,
}

struct TargetRow {
    job: Link,
    target: Link,
    collector: Link,
    endpoint_slice: String,
}

struct CountRow {
    link: Link,
    count: usize,
}

struct AssignedRow {
    collector: Link,
    target: Link,
}

#[derive(Template)]
#[template(path = "index.html", escape = "html")]
struct IndexPage {
    title: String,
    job_count: usize,
    target_count: usize,
    collectors: Vec<CollectorSummary>,
}

#[derive(Template)]
#[template(path = "targets.html", escape = "html")]
struct TargetsPage {
    title: String,
    rows: Vec<TargetRow>,
}

#[derive(Template)]
#[template(path = "target.html", escape = "html")]
struct TargetPage {
    title: String,
    details: Vec<Field>,
    labels: Vec<Field>,
}

#[derive(Template)]
#[template(path = "jobs.html", escape = "html")]
struct JobsPage {
    title: String,
    rows: Vec<CountRow>,
}

#[derive(Template)]
#[template(path = "job.html", escape = "html")]
struct JobPage {
    title: String,
    counts: Vec<CountRow>,
    assigned: Vec<AssignedRow>,
}

#[derive(Template)]
#[template(path = "collector.html", escape = "html")]
struct CollectorPage {
    title: String,
    rows: Vec<TargetRow>,
}

/// Bad request and not found pages.
#[derive(Template)]
#[template(path = "message.html", escape = "html")]
struct MessagePage {
    title: String,
    lines: Vec<String>,
}

pub async fn index(State(state): State<AppState>) -> Response {
    let snapshot = state.allocator.snapshot();
    let jobs: BTreeSet<&str> = snapshot.targets.values().map(|t| t.job_name()).collect();

    let collectors = snapshot
        .collectors
        .values()
        .map(|collector| {
            let collector_jobs: BTreeSet<&str> = snapshot
                .targets
                .iter()
                .filter(|(key, _)| snapshot.collector_for(key) == Some(collector.name.as_str()))
                .map(|(_, item)| item.job_name())
                .collect();
            CollectorSummary {
                collector: collector_link(&collector.name),
                job_count: collector_jobs.len(),
                target_count: collector.num_targets,
            }
        })
        .collect();

    render(
        StatusCode::OK,
        &IndexPage {
            title: "OpenTelemetry Target Allocator".to_string(),
            job_count: jobs.len(),
            target_count: snapshot.targets.len(),
            collectors,
        },
    )
}

pub async fn targets(State(state): State<AppState>) -> Response {
    let snapshot = state.allocator.snapshot();
    let rows = snapshot
        .sorted_targets()
        .into_iter()
        .map(|(key, item)| TargetRow {
            job: job_link(item.job_name()),
            target: target_link(item),
            collector: collector_link(snapshot.collector_for(key).unwrap_or_default()),
            endpoint_slice: item.endpoint_slice_name().unwrap_or_default().to_string(),
        })
        .collect();

    render(
        StatusCode::OK,
        &TargetsPage {
            title: "Targets".to_string(),
            rows,
        },
    )
}

pub async fn target(State(state): State<AppState>, Query(params): Query<TargetParams>) -> Response {
    let Some(target_hash) = params.target_hash.filter(|h| !h.is_empty()) else {
        return bad_request("target_hash", "/target?target_hash=my-target-42");
    };

    let snapshot = state.allocator.snapshot();
    let Some(item) = snapshot.targets.get(&target_hash) else {
        return not_found("Target", &target_hash);
    };
    let collector = snapshot.collector_for(&target_hash).unwrap_or_default();

    let mut details = vec![field("Collector", collector), field("Job", item.job_name())];
    for (title, label) in TARGET_DETAIL_LABELS {
        if let Some(value) = item.labels().get(label).filter(|v| !v.is_empty()) {
            details.push(field(title, value));
        }
    }
    if let Some(node) = item.node_name() {
        details.push(field("Node Name", node));
    }
    if let Some(slice) = item.endpoint_slice_name() {
        details.push(field("Endpoint Slice Name", slice));
    }

    render(
        StatusCode::OK,
        &TargetPage {
            title: format!("Target: {}", item.target_url()),
            details,
            labels: item
                .labels()
                .iter()
                .map(|(name, value)| field(name, value))
                .collect(),
        },
    )
}

/// The jobs page, served from `/jobs` when the client asks for HTML.
pub fn jobs(state: &AppState) -> Response {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for item in state.allocator.target_items().values() {
        *counts.entry(item.job_name().to_string()).or_default() += 1;
    }

    render(
        StatusCode::OK,
        &JobsPage {
            title: "Jobs".to_string(),
            rows: counts
                .iter()
                .map(|(job, &count)| CountRow {
                    link: job_link(job),
                    count,
                })
                .collect(),
        },
    )
}

pub async fn job(State(state): State<AppState>, Query(params): Query<JobParams>) -> Response {
    let Some(job_id) = params.job_id.filter(|j| !j.is_empty()) else {
        return bad_request("job_id", "/job?job_id=my-job");
    };

    let snapshot = state.allocator.snapshot();
    let by_collector = targets_by_collector(&snapshot, |item| item.job_name() == job_id);

    let counts = snapshot
        .collectors
        .keys()
        .map(|name| CountRow {
            link: collector_link(name),
            count: by_collector.get(name.as_str()).map_or(0, Vec::len),
        })
        .collect();
    let assigned = by_collector
        .iter()
        .flat_map(|(name, items)| {
            items.iter().map(move |item| AssignedRow {
                collector: collector_link(name),
                target: target_link(item),
            })
        })
        .collect();

    render(
        StatusCode::OK,
        &JobPage {
            title: format!("Job: {job_id}"),
            counts,
            assigned,
        },
    )
}

pub async fn collector(
    State(state): State<AppState>,
    Query(params): Query<CollectorParams>,
) -> Response {
    let Some(collector_id) = params.collector_id.filter(|c| !c.is_empty()) else {
        return bad_request("collector_id", "/collector?collector_id=my-collector-42");
    };

    let snapshot = state.allocator.snapshot();
    if !snapshot.collectors.contains_key(&collector_id) {
        return not_found("Collector", &collector_id);
    }

    let rows = snapshot
        .sorted_targets()
        .into_iter()
        .filter(|(key, _)| snapshot.collector_for(key) == Some(collector_id.as_str()))
        .map(|(_, item)| TargetRow {
            job: job_link(item.job_name()),
            target: target_link(item),
            collector: collector_link(&collector_id),
            endpoint_slice: item.endpoint_slice_name().unwrap_or_default().to_string(),
        })
        .collect();

    render(
        StatusCode::OK,
        &CollectorPage {
            title: format!("Collector: {collector_id}"),
            rows,
        },
    )
}

/// Assigned targets matching `filter`, grouped by collector and ordered by key.
fn targets_by_collector<'a>(
    snapshot: &'a Snapshot,
    filter: impl Fn(&TargetItem) -> bool,
) -> BTreeMap<&'a str, Vec<&'a TargetItem>> {
    let mut grouped: BTreeMap<&str, Vec<&TargetItem>> = BTreeMap::new();
    for (key, item) in snapshot.sorted_targets() {
        let item: &TargetItem = item;
        if !filter(item) {
            continue;
        }
        if let Some(collector) = snapshot.collector_for(key) {
            grouped.entry(collector).or_default().push(item);
        }
    }
    grouped
}

fn render(status: StatusCode, page: &impl Template) -> Response {
    match page.render() {
        Ok(body) => (
            status,
            [(header::X_CONTENT_TYPE_OPTIONS, "nosniff")],
            Html(body),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render page");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {e}"),
            )
                .into_response()
        }
    }
}

fn bad_request(param: &str, example: &str) -> Response {
    render(
        StatusCode::BAD_REQUEST,
        &MessagePage {
            title: "Bad Request".to_string(),
            lines: vec![
                format!("Expected {param} in the query string"),
                format!("Example: {example}"),
            ],
        },
    )
}

fn not_found(kind: &str, id: &str) -> Response {
    render(
        StatusCode::NOT_FOUND,
        &MessagePage {
            title: format!("Unknown {kind}: {id}"),
            lines: Vec::new(),
        },
    )
}

fn field(name: &str, value: &str) -> Field {
    Field {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn job_link(job: &str) -> Link {
    Link {
        href: format!("/job?job_id={}", encode_component(job)),
        text: job.to_string(),
    }
}

fn collector_link(collector: &str) -> Link {
    Link {
        href: format!("/collector?collector_id={}", encode_component(collector)),
        text: collector.to_string(),
    }
}

fn target_link(item: &TargetItem) -> Link {
    Link {
        href: format!("/target?target_hash={}", item.hash()),
        text: item.target_url().to_string(),
    }
}
