mod common;

use allocation::{items_by_hash, Labels, TargetItem};
use assert_json_diff::assert_json_eq;
use http::StatusCode;
use serde_json::json;

use common::{labels, sample_targets, scrape_configs, TestApp};

// ── JSON API ────────────────────────────────────────────────────

#[tokio::test]
async fn jobs_link_to_their_targets() {
    let app = TestApp::seeded();

    let (status, body) = app.get_json("/jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert_json_eq!(
        body,
        json!({
            "app": {"_link": "/jobs/app/targets"},
            "node": {"_link": "/jobs/node/targets"},
        })
    );
}

#[tokio::test]
async fn jobs_are_empty_without_targets() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert_json_eq!(body, json!({}));
}

#[tokio::test]
async fn job_links_resolve_for_names_needing_encoding() {
    let app = TestApp::new();
    app.allocator.set_collectors(["collector-0"]);
    app.allocator.set_targets(items_by_hash(
        ["my job", "my job/x", "a+b"]
            .map(|job| TargetItem::new(job, "10.0.0.9:80", Labels::new(), "")),
    ));

    let (_, jobs) = app.get_json("/jobs").await;
    assert_eq!(jobs["my job"]["_link"], "/jobs/my%20job/targets");
    assert_eq!(jobs["my job/x"]["_link"], "/jobs/my%20job%2Fx/targets");
    assert_eq!(jobs["a+b"]["_link"], "/jobs/a%2Bb/targets");

    for job in ["my job", "my job/x", "a+b"] {
        let link = jobs[job]["_link"].as_str().unwrap();

        let (status, body) = app
            .get_json(&format!("{link}?collector_id=collector-0"))
            .await;
        assert_eq!(status, StatusCode::OK, "{link}");
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 1, "{link}");
        assert_eq!(entries[0]["targets"][0], "10.0.0.9:80");

        // The per-collector link emitted by the job page resolves as well.
        let (_, collectors) = app.get_json(link).await;
        let collector_link = collectors["collector-0"]["_link"].as_str().unwrap();
        let (_, body) = app.get_json(collector_link).await;
        assert_eq!(body.as_array().unwrap().len(), 1, "{collector_link}");
    }
}

#[tokio::test]
async fn job_targets_grouped_by_collector() {
    let app = TestApp::new();
    app.allocator.set_collectors(["collector-0", "collector-1"]);
    app.allocator.set_targets(items_by_hash(sample_targets()));

    let (status, body) = app.get_json("/jobs/node/targets").await;
    assert_eq!(status, StatusCode::OK);

    let collectors = body.as_object().unwrap();
    assert_eq!(collectors.len(), 2);
    let mut total = 0;
    for (name, entry) in collectors {
        assert_eq!(
            entry["_link"],
            format!("/jobs/node/targets?collector_id={name}")
        );
        total += entry["targets"].as_array().unwrap().len();
    }
    assert_eq!(total, 2);
}

#[tokio::test]
async fn job_targets_for_collector_use_service_discovery_format() {
    let app = TestApp::seeded();

    let (status, body) = app
        .get_json("/jobs/app/targets?collector_id=collector-0")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_json_eq!(
        body,
        json!([{"targets": ["10.0.0.3:8080"], "labels": {}}])
    );

    let (_, body) = app
        .get_json("/jobs/node/targets?collector_id=collector-0")
        .await;
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    let with_env = entries
        .iter()
        .find(|entry| entry["targets"][0] == "10.0.0.2:9100")
        .unwrap();
    assert_json_eq!(with_env["labels"], json!({"env": "prod"}));
}

#[tokio::test]
async fn unmatched_collector_or_job_yields_empty_list() {
    let app = TestApp::seeded();

    let (status, body) = app
        .get_json("/jobs/node/targets?collector_id=collector-9")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_json_eq!(body, json!([]));

    let (_, body) = app
        .get_json("/jobs/missing/targets?collector_id=collector-0")
        .await;
    assert_json_eq!(body, json!([]));

    let (_, body) = app.get_json("/jobs/missing/targets").await;
    assert_json_eq!(
        body,
        json!({
            "collector-0": {
                "_link": "/jobs/missing/targets?collector_id=collector-0",
                "targets": [],
            }
        })
    );
}

#[tokio::test]
async fn scrape_configs_strip_equality_regex() {
    let app = TestApp::new();
    app.scrape_configs
        .update(&scrape_configs(&[(
            "node",
            json!({
                "job_name": "node",
                "relabel_configs": [
                    {"action": "keepequal", "regex": "(.*)", "target_label": "a"},
                    {"action": "labelmap", "regex": "__meta_(.+)"},
                ],
            }),
        )]))
        .unwrap();

    let (status, body) = app.get_json("/scrape_configs").await;
    assert_eq!(status, StatusCode::OK);
    assert_json_eq!(
        body,
        json!({
            "node": {
                "job_name": "node",
                "relabel_configs": [
                    {"action": "keepequal", "target_label": "a"},
                    {"action": "labelmap", "regex": "__meta_(.+)"},
                ],
            }
        })
    );
}

#[tokio::test]
async fn scrape_configs_before_discovery_are_empty() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/scrape_configs").await;
    assert_eq!(status, StatusCode::OK);
    assert_json_eq!(body, json!({}));
}

// ── Probes ──────────────────────────────────────────────────────

#[tokio::test]
async fn liveness_is_always_ok() {
    let app = TestApp::new();
    let (status, _) = app.get("/livez").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn readiness_waits_for_scrape_configs() {
    let app = TestApp::new();
    let (status, _) = app.get("/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    app.scrape_configs.update(&scrape_configs(&[])).unwrap();
    let (status, _) = app.get("/readyz").await;
    assert_eq!(status, StatusCode::OK);
}

// ── HTML pages ──────────────────────────────────────────────────

#[tokio::test]
async fn index_summarizes_collectors() {
    let app = TestApp::seeded();

    let (status, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<h1>OpenTelemetry Target Allocator</h1>"));
    assert!(body.contains(r#"<tr><td><a href="/jobs">Jobs</a></td><td>2</td></tr>"#));
    assert!(body.contains(r#"<tr><td><a href="/targets">Targets</a></td><td>3</td></tr>"#));
    assert!(body.contains(
        r#"<tr><td><a href="/collector?collector_id=collector-0">collector-0</a></td><td>2</td><td>3</td></tr>"#
    ));
}

#[tokio::test]
async fn jobs_page_served_for_html_clients() {
    let app = TestApp::seeded();

    let (status, body) = app.get_html("/jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<h1>Jobs</h1>"));
    assert!(body.contains(r#"<tr><td><a href="/job?job_id=node">node</a></td><td>2</td></tr>"#));
    assert!(body.contains(r#"<tr><td><a href="/job?job_id=app">app</a></td><td>1</td></tr>"#));
}

#[tokio::test]
async fn targets_page_lists_every_target() {
    let app = TestApp::seeded();

    let (status, body) = app.get("/targets").await;
    assert_eq!(status, StatusCode::OK);
    for item in sample_targets() {
        assert!(body.contains(&format!(
            r#"<a href="/target?target_hash={}">{}</a>"#,
            item.hash(),
            item.target_url()
        )));
    }
}

#[tokio::test]
async fn target_page_shows_details_and_labels() {
    let app = TestApp::seeded();
    let item = sample_targets().remove(0);

    let (status, body) = app
        .get(&format!("/target?target_hash={}", item.hash()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<h1>Target: 10.0.0.1:9100</h1>"));
    assert!(body.contains("<tr><td>Collector</td><td>collector-0</td></tr>"));
    assert!(body.contains("<tr><td>Job</td><td>node</td></tr>"));
    assert!(body.contains("<tr><td>Namespace</td><td>monitoring</td></tr>"));
    assert!(body.contains("<tr><td>__meta_kubernetes_namespace</td><td>monitoring</td></tr>"));
}

#[tokio::test]
async fn target_page_rejects_missing_and_unknown_hashes() {
    let app = TestApp::seeded();

    let (status, body) = app.get("/target").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Expected target_hash in the query string"));

    let (status, body) = app.get("/target?target_hash=%3Cb%3Enope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Unknown Target: &lt;b&gt;nope"));
    assert!(!body.contains("<b>"));
}

#[tokio::test]
async fn job_page_counts_targets_per_collector() {
    let app = TestApp::seeded();

    let (status, body) = app.get("/job?job_id=node").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<h1>Job: node</h1>"));
    assert!(body.contains(
        r#"<tr><td><a href="/collector?collector_id=collector-0">collector-0</a></td><td>2</td></tr>"#
    ));

    let (status, _) = app.get("/job").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn collector_page_lists_its_targets() {
    let app = TestApp::new();
    app.allocator.set_collectors(["collector-0", "collector-1"]);
    app.allocator.set_targets(items_by_hash(sample_targets()));

    let snapshot = app.allocator.snapshot();
    let (status, body) = app.get("/collector?collector_id=collector-1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<h1>Collector: collector-1</h1>"));
    for (key, item) in snapshot.sorted_targets() {
        let link = format!(r#"<a href="/target?target_hash={key}">"#);
        let owned = snapshot.collector_for(key) == Some("collector-1");
        assert_eq!(body.contains(&link), owned, "{}", item.target_url());
    }
}

#[tokio::test]
async fn collector_page_rejects_missing_and_unknown_ids() {
    let app = TestApp::seeded();

    let (status, body) = app.get("/collector?collector_id=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Expected collector_id in the query string"));

    let (status, body) = app.get("/collector?collector_id=ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Unknown Collector: ghost"));
}

#[tokio::test]
async fn discovered_text_is_escaped_in_pages() {
    let app = TestApp::new();
    app.allocator.set_collectors(["collector-0"]);
    app.allocator.set_targets(items_by_hash([TargetItem::new(
        "<i>job</i>",
        "<script>alert(1)</script>",
        labels(&[("note", "\"quoted\" & <b>")]),
        "",
    )]));

    for uri in ["/", "/targets", "/collector?collector_id=collector-0"] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(!body.contains("<script>"), "{uri}");
        assert!(!body.contains("<i>"), "{uri}");
    }

    let key = app.allocator.target_items().into_keys().next().unwrap();
    let (_, body) = app.get(&format!("/target?target_hash={key}")).await;
    assert!(body.contains("&lt;script&gt;alert(1)&lt;"));
    assert!(body.contains("quoted&"));
    assert!(!body.contains("\"quoted\""));
    assert!(body.contains(" &amp; &lt;b&gt;"));
    assert!(!body.contains("<b>"));
}
