//! Failure remediation: file a report when a canary is judged unhealthy.
//!
//! The resolver treats this as fire-and-forget. Errors are returned so the
//! caller can log them, but they never change the verdict.

use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use tracing::info;

use crate::config::RemediationEndpoint;

/// Maximum log context characters embedded in an issue body.
const MAX_LOG_CHARS: usize = 60_000;
const USER_AGENT: &str = concat!("canary-agents/", env!("CARGO_PKG_VERSION"));

/// Everything needed to describe a failed canary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// Combined stable/canary log context.
    pub log_context: String,
    /// The analysis narrative.
    pub narrative: String,
    pub base_branch: String,
    pub repository_url: String,
    pub model: String,
}

/// Opens a source-control artifact describing a failed canary.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Remediator: Send + Sync {
    async fn open_failure_report(&self, report: &FailureReport) -> Result<()>;
}

/// Truncate to at most `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Matches `https://github.com/{owner}/{repo}[.git]` and the `git@` form.
static GITHUB_REPO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://|git@)github\.com[/:]([^/\s]+)/([^/\s]+?)(?:\.git)?/?$")
        .expect("GITHUB_REPO_RE regex should compile")
});

/// `(owner, repo)` from an `https://github.com/{owner}/{repo}[.git]` URL.
pub fn parse_repository(url: &str) -> Option<(String, String)> {
    let caps = GITHUB_REPO_RE.captures(url.trim())?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Files a GitHub issue through the REST API.
#[derive(Debug, Clone)]
pub struct GitHubIssueReporter {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubIssueReporter {
    pub fn new(endpoint: &RemediationEndpoint) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build GitHub HTTP client")?;
        Ok(Self {
            http,
            api_url: endpoint.api_url.trim_end_matches('/').to_string(),
            token: endpoint.token.clone(),
        })
    }

    fn issue_body(report: &FailureReport) -> String {
        let base_branch = if report.base_branch.is_empty() {
            "(not configured)"
        } else {
            report.base_branch.as_str()
        };
        format!(
            "## Canary analysis failed\n\n\
             **Model:** {}\n**Base branch:** {}\n\n\
             ### Analysis\n\n{}\n\n\
             ### Logs\n\n```\n{}\n```\n",
            report.model,
            base_branch,
            report.narrative,
            truncate(&report.log_context, MAX_LOG_CHARS)
        )
    }
}

#[async_trait]
impl Remediator for GitHubIssueReporter {
    async fn open_failure_report(&self, report: &FailureReport) -> Result<()> {
        let Some((owner, repo)) = parse_repository(&report.repository_url) else {
            bail!(
                "cannot determine GitHub repository from URL {:?}",
                report.repository_url
            );
        };

        let body = json!({
            "title": format!("Canary analysis failed ({})", report.model),
            "body": Self::issue_body(report),
            "labels": ["canary-failure"],
        });

        let resp = self
            .http
            .post(format!("{}/repos/{owner}/{repo}/issues", self.api_url))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .context("Failed to send GitHub issue request")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("GitHub returned status {}: {}", status.as_u16(), truncate(&text, 200));
        }

        let created: serde_json::Value = resp.json().await.context("Failed to decode GitHub response")?;
        info!(
            owner = %owner,
            repo = %repo,
            issue_url = created["html_url"].as_str().unwrap_or_default(),
            "Opened canary failure issue"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_text_unchanged() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcde", 5), "abcde");
    }

    #[test]
    fn truncate_long_text_marks_cut() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("héllo wörld", 4), "héll...");
    }

    #[test]
    fn parse_repository_variants() {
        let expected = Some(("acme".to_string(), "web".to_string()));
        assert_eq!(parse_repository("https://github.com/acme/web"), expected);
        assert_eq!(parse_repository("https://github.com/acme/web.git"), expected);
        assert_eq!(parse_repository("https://github.com/acme/web/"), expected);
        assert_eq!(parse_repository("git@github.com:acme/web.git"), expected);
        assert_eq!(parse_repository("https://gitlab.com/acme/web"), None);
        assert_eq!(parse_repository(""), None);
    }

    #[test]
    fn repository_pattern_compiles() {
        assert!(GITHUB_REPO_RE.is_match("https://github.com/acme/web"));
        assert_eq!(
            parse_repository("  https://github.com/acme/web.git  "),
            Some(("acme".to_string(), "web".to_string()))
        );
    }

    #[test]
    fn issue_body_contains_narrative_and_logs() {
        let body = GitHubIssueReporter::issue_body(&FailureReport {
            log_context: "--- STABLE LOGS ---\nok".into(),
            narrative: "canary returns 500s".into(),
            base_branch: String::new(),
            repository_url: "https://github.com/acme/web".into(),
            model: "gemini-2.0-flash".into(),
        });
        assert!(body.contains("canary returns 500s"));
        assert!(body.contains("--- STABLE LOGS ---\nok"));
        assert!(body.contains("(not configured)"));
        assert!(body.contains("gemini-2.0-flash"));
    }
}
