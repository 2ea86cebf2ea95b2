//! GitHub failure reporter against an in-process mock API.

mod common;

use std::sync::{Arc, Mutex};

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use canary_agents::remediation::{FailureReport, GitHubIssueReporter, Remediator};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
struct Issue {
    owner: String,
    repo: String,
    authorization: String,
    body: Value,
}

fn report(repository_url: &str) -> FailureReport {
    FailureReport {
        log_context: "--- STABLE LOGS ---\nok\n\n--- CANARY LOGS ---\npanic: nil map".into(),
        narrative: "canary panics on startup".into(),
        base_branch: "main".into(),
        repository_url: repository_url.into(),
        model: "gemini-2.0-flash".into(),
    }
}

fn issue_router(issues: Arc<Mutex<Vec<Issue>>>, status: StatusCode) -> Router {
    Router::new().route(
        "/repos/{owner}/{repo}/issues",
        post(
            move |Path((owner, repo)): Path<(String, String)>,
                  headers: HeaderMap,
                  Json(body): Json<Value>| {
                let issues = issues.clone();
                async move {
                    issues.lock().unwrap().push(Issue {
                        owner,
                        repo,
                        authorization: headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string(),
                        body,
                    });
                    (
                        status,
                        Json(json!({ "html_url": "https://github.com/acme/web/issues/1" })),
                    )
                }
            },
        ),
    )
}

#[tokio::test]
async fn opens_issue_with_narrative_and_logs() {
    let issues: Arc<Mutex<Vec<Issue>>> = Arc::default();
    let base = common::serve(issue_router(issues.clone(), StatusCode::CREATED)).await;
    let reporter = GitHubIssueReporter::new(&common::remediation_endpoint(&base)).unwrap();

    reporter
        .open_failure_report(&report("https://github.com/acme/web.git"))
        .await
        .unwrap();

    let issues = issues.lock().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].owner, "acme");
    assert_eq!(issues[0].repo, "web");
    assert_eq!(issues[0].authorization, "Bearer gh-token");
    let body = issues[0].body["body"].as_str().unwrap();
    assert!(body.contains("canary panics on startup"));
    assert!(body.contains("panic: nil map"));
    assert!(body.contains("main"));
    assert!(issues[0].body["title"].as_str().unwrap().contains("gemini-2.0-flash"));
}

#[tokio::test]
async fn rejected_issue_is_error() {
    let issues: Arc<Mutex<Vec<Issue>>> = Arc::default();
    let base = common::serve(issue_router(issues.clone(), StatusCode::UNPROCESSABLE_ENTITY)).await;
    let reporter = GitHubIssueReporter::new(&common::remediation_endpoint(&base)).unwrap();

    let err = reporter
        .open_failure_report(&report("https://github.com/acme/web"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("422"));
}

#[tokio::test]
async fn unrecognised_repository_url_sends_nothing() {
    let issues: Arc<Mutex<Vec<Issue>>> = Arc::default();
    let base = common::serve(issue_router(issues.clone(), StatusCode::CREATED)).await;
    let reporter = GitHubIssueReporter::new(&common::remediation_endpoint(&base)).unwrap();

    assert!(reporter.open_failure_report(&report("")).await.is_err());
    assert!(issues.lock().unwrap().is_empty());
}
