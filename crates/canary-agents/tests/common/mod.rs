//! Shared helpers for HTTP integration tests.

#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use canary_agents::config::{AgentEndpoint, ModelEndpoint, RemediationEndpoint};

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("mock server address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server");
    });
    format!("http://{addr}")
}

/// A base URL nothing is listening on.
pub async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("ephemeral address");
    drop(listener);
    format!("http://{addr}")
}

pub fn model_endpoint(base_url: &str) -> ModelEndpoint {
    ModelEndpoint {
        base_url: base_url.to_string(),
        api_key: "test-key".to_string(),
        project: None,
        timeout: Duration::from_secs(10),
    }
}

pub fn agent_endpoint(base_url: &str) -> AgentEndpoint {
    AgentEndpoint {
        base_url: base_url.to_string(),
        health_timeout: Duration::from_secs(5),
        analyze_timeout: Duration::from_secs(10),
    }
}

pub fn remediation_endpoint(api_url: &str) -> RemediationEndpoint {
    RemediationEndpoint {
        api_url: api_url.to_string(),
        token: "gh-token".to_string(),
    }
}
