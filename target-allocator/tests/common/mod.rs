#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use allocation::{items_by_hash, Allocator, Labels, TargetItem};
use axum::{body::Body, http::Request, Router};
use http::{header, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use target_allocator::server::{router, AppState, ScrapeConfigStore};

pub struct TestApp {
    pub allocator: Arc<Allocator>,
    pub scrape_configs: Arc<ScrapeConfigStore>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let allocator = Arc::new(Allocator::new("least-weighted").unwrap());
        let scrape_configs = Arc::new(ScrapeConfigStore::new());
        let router = router(AppState::new(
            Arc::clone(&allocator),
            Arc::clone(&scrape_configs),
        ));
        Self {
            allocator,
            scrape_configs,
            router,
        }
    }

    /// One collector, three targets: two for `node`, one for `app`.
    pub fn seeded() -> Self {
        let app = Self::new();
        app.allocator.set_collectors(["collector-0"]);
        app.allocator.set_targets(items_by_hash(sample_targets()));
        app
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        self.request(Request::builder().uri(uri)).await
    }

    pub async fn get_html(&self, uri: &str) -> (StatusCode, String) {
        self.request(
            Request::builder()
                .uri(uri)
                .header(header::ACCEPT, "text/html,application/xhtml+xml"),
        )
        .await
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, body) = self.get(uri).await;
        let json = serde_json::from_str(&body)
            .unwrap_or_else(|e| panic!("{uri} returned invalid json ({e}): {body}"));
        (status, json)
    }

    async fn request(&self, builder: http::request::Builder) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }
}

pub fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
}

pub fn sample_targets() -> Vec<TargetItem> {
    vec![
        TargetItem::new(
            "node",
            "10.0.0.1:9100",
            labels(&[("__meta_kubernetes_namespace", "monitoring")]),
            "",
        ),
        TargetItem::new("node", "10.0.0.2:9100", labels(&[("env", "prod")]), ""),
        TargetItem::new("app", "10.0.0.3:8080", Labels::new(), ""),
    ]
}

pub fn scrape_configs(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(job, config)| (job.to_string(), config.clone()))
        .collect()
}
