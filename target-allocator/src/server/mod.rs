use std::sync::Arc;

use allocation::Allocator;
use axum::{routing::get, Router};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

mod api;
mod html;
pub mod scrape_configs;

pub use scrape_configs::ScrapeConfigStore;

/// Shared handles behind every request.
#[derive(Clone)]
pub struct AppState {
    pub allocator: Arc<Allocator>,
    pub scrape_configs: Arc<ScrapeConfigStore>,
}

impl AppState {
    pub fn new(allocator: Arc<Allocator>, scrape_configs: Arc<ScrapeConfigStore>) -> Self {
        Self {
            allocator,
            scrape_configs,
        }
    }
}

/// All allocator routes. The metrics endpoint and middleware are layered on
/// by the caller.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(html::index))
        .route("/targets", get(html::targets))
        .route("/target", get(html::target))
        .route("/job", get(html::job))
        .route("/collector", get(html::collector))
        .route("/jobs", get(api::jobs))
        .route("/jobs/:job_id/targets", get(api::job_targets))
        .route("/scrape_configs", get(api::scrape_configs))
        .route("/livez", get(api::liveness))
        .route("/readyz", get(api::readiness))
        .with_state(state)
}

/// Everything except the RFC 3986 unreserved characters.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes a value for use as a path segment or query value. A space
/// becomes `%20`, which both `Path` and `Query` decode back.
fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}
