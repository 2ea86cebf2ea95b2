//! Full measurement over HTTP: logs on disk, mock model, agent and GitHub.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use canary_agents::config::{AnalysisConfig, EngineConfig};
use canary_agents::fetch::DirLogFetcher;
use canary_agents::CanaryAnalyzer;
use coordination::verdict::{MeasurementPhase, META_ANALYSIS, META_ANALYSIS_JSON};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

fn logs_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("prod")).unwrap();
    std::fs::write(dir.path().join("prod/role=stable.log"), "GET /health 200\n").unwrap();
    std::fs::write(dir.path().join("prod/role=canary.log"), "GET /health 500\n").unwrap();
    dir
}

fn model_router(answer: &'static str) -> Router {
    Router::new().fallback(move || async move {
        Json(json!({ "candidates": [{ "content": { "parts": [{ "text": answer }] } }] }))
    })
}

fn counting_github(count: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/repos/{owner}/{repo}/issues",
        post(move || {
            let count = count.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                (StatusCode::CREATED, Json(json!({ "html_url": "https://github.com/acme/web/issues/9" })))
            }
        }),
    )
}

fn engine(model_url: &str, agent_url: &str, github_url: &str) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.model = common::model_endpoint(model_url);
    config.agent = common::agent_endpoint(agent_url);
    config.remediation = common::remediation_endpoint(github_url);
    config.max_attempts = 3;
    config
}

#[tokio::test]
async fn direct_failure_opens_issue() {
    let issues = Arc::new(AtomicUsize::new(0));
    let model = common::serve(model_router(
        r#"{"text":"canary returns 500 on /health","promote":false,"confidence":95}"#,
    ))
    .await;
    let github = common::serve(counting_github(issues.clone())).await;
    let agent = common::closed_url().await;

    let dir = logs_dir();
    let analyzer = CanaryAnalyzer::from_config(
        &engine(&model, &agent, &github),
        Arc::new(DirLogFetcher::new(dir.path())),
    )
    .unwrap();
    let config = AnalysisConfig {
        github_url: "https://github.com/acme/web".into(),
        base_branch: "main".into(),
        ..Default::default()
    };

    let m = analyzer.run(&config, "prod", &CancellationToken::new()).await;
    assert_eq!(m.phase, MeasurementPhase::Failed);
    assert_eq!(m.value, "0");
    assert_eq!(m.metadata[META_ANALYSIS], "canary returns 500 on /health");
    assert_eq!(issues.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn delegated_promotion_skips_model_and_github() {
    let issues = Arc::new(AtomicUsize::new(0));
    let github = common::serve(counting_github(issues.clone())).await;
    let model = common::closed_url().await;
    let agent = common::serve(
        Router::new()
            .route("/", get(|| async { "ok" }))
            .route(
                "/a2a/analyze",
                post(|Json(body): Json<Value>| async move {
                    // Segments are the exact text between and after the markers.
                    assert_eq!(body["context"]["stableLogs"], "\nGET /health 200\n\n\n");
                    assert_eq!(body["context"]["canaryLogs"], "\nGET /health 500\n");
                    Json(json!({
                        "analysis": "transient 500 during warmup",
                        "rootCause": "",
                        "remediation": "",
                        "promote": true,
                        "confidence": 72
                    }))
                }),
            ),
    )
    .await;

    let dir = logs_dir();
    let analyzer = CanaryAnalyzer::from_config(
        &engine(&model, &agent, &github),
        Arc::new(DirLogFetcher::new(dir.path())),
    )
    .unwrap();
    let config = AnalysisConfig {
        analysis_mode: "agent".into(),
        namespace: "prod".into(),
        pod_name: "web-canary-1".into(),
        ..Default::default()
    };

    let m = analyzer.run(&config, "prod", &CancellationToken::new()).await;
    assert_eq!(m.phase, MeasurementPhase::Successful);
    assert_eq!(m.value, "0.72");
    let raw: Value = serde_json::from_str(&m.metadata[META_ANALYSIS_JSON]).unwrap();
    assert_eq!(raw["text"], "transient 500 during warmup");
    assert!(raw.get("prLink").is_none());
    assert_eq!(issues.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_agent_is_error_measurement() {
    let closed = common::closed_url().await;
    let dir = logs_dir();
    let analyzer = CanaryAnalyzer::from_config(
        &engine(&closed, &closed, &closed),
        Arc::new(DirLogFetcher::new(dir.path())),
    )
    .unwrap();
    let config = AnalysisConfig {
        analysis_mode: "agent".into(),
        namespace: "prod".into(),
        pod_name: "web-canary-1".into(),
        ..Default::default()
    };

    let m = analyzer.run(&config, "prod", &CancellationToken::new()).await;
    assert_eq!(m.phase, MeasurementPhase::Error);
    assert!(m.message.contains("health check failed"));
}

#[tokio::test]
async fn template_hash_pod_name_reaches_agent_resolved() {
    let issues = Arc::new(AtomicUsize::new(0));
    let github = common::serve(counting_github(issues.clone())).await;
    let model = common::closed_url().await;
    let agent = common::serve(
        Router::new()
            .route("/", get(|| async { "ok" }))
            .route(
                "/a2a/analyze",
                post(|Json(body): Json<Value>| async move {
                    let pod = body["context"]["podName"].as_str().unwrap_or_default().to_string();
                    Json(json!({
                        "analysis": format!("inspected {pod}"),
                        "promote": true,
                        "confidence": 100
                    }))
                }),
            ),
    )
    .await;

    let dir = logs_dir();
    std::fs::write(
        dir.path().join("prod/rollouts-pod-template-hash=7f9c5d.pods"),
        "web-7f9c5d-abcde\n",
    )
    .unwrap();
    let analyzer = CanaryAnalyzer::from_config(
        &engine(&model, &agent, &github),
        Arc::new(DirLogFetcher::new(dir.path())),
    )
    .unwrap();
    let config = AnalysisConfig {
        analysis_mode: "agent".into(),
        namespace: "prod".into(),
        pod_name: "7f9c5d".into(),
        ..Default::default()
    };

    let m = analyzer.run(&config, "prod", &CancellationToken::new()).await;
    assert_eq!(m.phase, MeasurementPhase::Successful);
    assert_eq!(m.metadata[META_ANALYSIS], "inspected web-7f9c5d-abcde");
}
