//! Metadata enrichment — turns a verified workflow into a display title and
//! description.
//!
//! `Enricher::enrich` never fails: any LLM or parsing problem degrades to
//! `fallback_metadata`, built only from local data. Output is best-effort and
//! must not be relied on for anything but display.
//!
//! The importer holds an `Arc<dyn Enricher>`, chosen at startup by whether an
//! LLM key is configured.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::classifier::{derive_title, VerifiedCandidate};
use crate::enrichment::prompts::{ENRICH_PROMPT_TEMPLATE, ENRICH_SYSTEM, JSON_EXCERPT_CHARS};
use crate::github::RepositoryInfo;
use crate::llm_client::prompts::{fill_template, JSON_ONLY_INSTRUCTION};
use crate::llm_client::LlmClient;
use crate::models::workflow::WorkflowMetadata;

pub mod prompts;

pub const MAX_TITLE_CHARS: usize = 60;
pub const MAX_DESCRIPTION_CHARS: usize = 200;

/// Everything an enricher may look at.
#[derive(Debug, Clone)]
pub struct WorkflowSeed {
    pub verified: VerifiedCandidate,
    pub repository: RepositoryInfo,
}

#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, seed: &WorkflowSeed) -> WorkflowMetadata;

    /// "llm" | "template", for logs and run reports.
    fn backend(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// LlmEnricher
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmEnricher(pub LlmClient);

#[async_trait]
impl Enricher for LlmEnricher {
    async fn enrich(&self, seed: &WorkflowSeed) -> WorkflowMetadata {
        let system = format!("{ENRICH_SYSTEM} {JSON_ONLY_INSTRUCTION}");
        let prompt = build_prompt(seed);

        match self.0.complete(&system, &prompt).await {
            Ok(text) => parse_metadata(&text).unwrap_or_else(|| {
                warn!(
                    url = %seed.verified.candidate.html_url,
                    "LLM reply had no usable title/description, using fallback"
                );
                fallback_metadata(seed)
            }),
            Err(e) => {
                warn!(
                    url = %seed.verified.candidate.html_url,
                    error = %e,
                    "LLM enrichment failed, using fallback"
                );
                fallback_metadata(seed)
            }
        }
    }

    fn backend(&self) -> &'static str {
        "llm"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TemplateEnricher — no LLM configured
// ────────────────────────────────────────────────────────────────────────────

/// Title from the workflow name or filename, description from the repository.
pub struct TemplateEnricher;

#[async_trait]
impl Enricher for TemplateEnricher {
    async fn enrich(&self, seed: &WorkflowSeed) -> WorkflowMetadata {
        let title = derive_title(&seed.verified.candidate.file_path, &seed.verified.shape);
        let description = seed
            .repository
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from)
            .unwrap_or_else(|| fallback_description(seed));

        WorkflowMetadata {
            title: truncate_chars(&title, MAX_TITLE_CHARS),
            description: truncate_chars(&description, MAX_DESCRIPTION_CHARS),
        }
    }

    fn backend(&self) -> &'static str {
        "template"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

pub fn build_prompt(seed: &WorkflowSeed) -> String {
    let shape = &seed.verified.shape;
    let excerpt: String = seed
        .verified
        .json_content
        .chars()
        .take(JSON_EXCERPT_CHARS)
        .collect();

    let node_count = shape.node_count.to_string();
    let node_types = shape.node_types.join(", ");
    let topics = seed.repository.topics.join(", ");

    fill_template(
        ENRICH_PROMPT_TEMPLATE,
        &[
            ("repository", seed.repository.full_name.as_str()),
            (
                "repository_description",
                seed.repository.description.as_deref().unwrap_or("none"),
            ),
            ("topics", topics.as_str()),
            ("file_path", seed.verified.candidate.file_path.as_str()),
            ("node_count", node_count.as_str()),
            ("node_types", node_types.as_str()),
            ("json_excerpt", excerpt.as_str()),
        ],
    )
}

#[derive(Deserialize)]
struct RawMetadata {
    title: String,
    description: String,
}

/// Pulls `{title, description}` out of free-form model output: the text
/// between the first `{` and the last `}` must parse as that object.
pub fn parse_metadata(text: &str) -> Option<WorkflowMetadata> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }

    let raw: RawMetadata = serde_json::from_str(&text[start..=end]).ok()?;
    if raw.title.trim().is_empty() {
        return None;
    }

    Some(WorkflowMetadata {
        title: truncate_chars(&raw.title, MAX_TITLE_CHARS),
        description: truncate_chars(&raw.description, MAX_DESCRIPTION_CHARS),
    })
}

/// Deterministic metadata built from the node list alone.
pub fn fallback_metadata(seed: &WorkflowSeed) -> WorkflowMetadata {
    let title = format!("N8N Workflow with {} nodes", seed.verified.shape.node_count);
    WorkflowMetadata {
        title: truncate_chars(&title, MAX_TITLE_CHARS),
        description: truncate_chars(&fallback_description(seed), MAX_DESCRIPTION_CHARS),
    }
}

fn fallback_description(seed: &WorkflowSeed) -> String {
    format!("Workflow using: {}", seed.verified.shape.node_types.join(", "))
}

/// Trims and cuts to at most `max` characters without splitting a character.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.trim().chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{verify_workflow_json, WorkflowCandidate};
    use crate::github::mock::MockServer;

    fn seed(content: &str, repo_description: Option<&str>) -> WorkflowSeed {
        let mut repository = RepositoryInfo::bare("acme/flows");
        repository.description = repo_description.map(String::from);
        WorkflowSeed {
            verified: VerifiedCandidate {
                candidate: WorkflowCandidate {
                    repository_full_name: "acme/flows".to_string(),
                    file_path: "flows/slack_alert.json".to_string(),
                    file_name: "slack_alert.json".to_string(),
                    raw_api_url: "http://unused".to_string(),
                    html_url: "https://github.com/acme/flows/blob/main/flows/slack_alert.json"
                        .to_string(),
                },
                json_content: content.to_string(),
                download_url: None,
                shape: verify_workflow_json(content).unwrap(),
            },
            repository,
        }
    }

    const THREE_NODES: &str = r#"{"nodes":[
        {"type":"n8n-nodes-base.cron","position":[0,0]},
        {"type":"n8n-nodes-base.slack","position":[1,0]},
        {"type":"n8n-nodes-base.slack","position":[2,0]}],"connections":{}}"#;

    fn llm_enricher(server: &MockServer) -> LlmEnricher {
        let mut config = server.config();
        config.llm_api_key = Some("sk-test".to_string());
        LlmEnricher(LlmClient::new(&config).unwrap())
    }

    #[test]
    fn test_parse_metadata_from_chatty_reply() {
        let reply = "Sure! Here you go:\n```json\n{\"title\": \"Slack alerts\", \"description\": \"Posts cron alerts to Slack\"}\n```";
        let meta = parse_metadata(reply).unwrap();
        assert_eq!(meta.title, "Slack alerts");
        assert_eq!(meta.description, "Posts cron alerts to Slack");
    }

    #[test]
    fn test_parse_metadata_rejects_missing_keys_and_garbage() {
        assert!(parse_metadata("{\"title\": \"only a title\"}").is_none());
        assert!(parse_metadata("no braces here").is_none());
        assert!(parse_metadata("} backwards {").is_none());
        assert!(parse_metadata("{not json}").is_none());
    }

    #[test]
    fn test_parse_metadata_truncates() {
        let long_title = "T".repeat(90);
        let long_desc = "é".repeat(250);
        let reply = format!("{{\"title\":\"{long_title}\",\"description\":\"{long_desc}\"}}");
        let meta = parse_metadata(&reply).unwrap();
        assert_eq!(meta.title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(meta.description.chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn test_fallback_uses_real_node_count_and_unique_types() {
        let meta = fallback_metadata(&seed(THREE_NODES, None));
        assert_eq!(meta.title, "N8N Workflow with 3 nodes");
        assert_eq!(
            meta.description,
            "Workflow using: n8n-nodes-base.cron, n8n-nodes-base.slack"
        );
    }

    #[test]
    fn test_prompt_embeds_counts_types_and_excerpt() {
        let big = format!(
            r#"{{"nodes":[{{"type":"a","position":[0,0]}}],"connections":{{}},"pad":"{}"}}"#,
            "x".repeat(3000)
        );
        let prompt = build_prompt(&seed(&big, Some("Team automations")));
        assert!(prompt.contains("Number of nodes: 1"));
        assert!(prompt.contains("Node types: a"));
        assert!(prompt.contains("Repository description: Team automations"));
        assert!(!prompt.contains(&"x".repeat(1000)));
        assert!(prompt.contains(&"x".repeat(900)));
    }

    #[test]
    fn test_prompt_leaves_placeholders_in_repository_text_alone() {
        let prompt = build_prompt(&seed(THREE_NODES, Some("see {json_excerpt} and {node_count}")));
        assert!(prompt.contains("Repository description: see {json_excerpt} and {node_count}\n"));
        assert!(prompt.contains("Number of nodes: 3"));
    }

    #[tokio::test]
    async fn test_template_enricher_uses_filename_and_repo_description() {
        let meta = TemplateEnricher
            .enrich(&seed(THREE_NODES, Some("  Team automations ")))
            .await;
        assert_eq!(meta.title, "Slack Alert");
        assert_eq!(meta.description, "Team automations");

        let meta = TemplateEnricher.enrich(&seed(THREE_NODES, None)).await;
        assert!(meta.description.starts_with("Workflow using: "));
    }

    #[tokio::test]
    async fn test_llm_enricher_uses_model_reply() {
        let server = MockServer::start().await;
        server.set_llm_reply(r#"{"title":"Cron to Slack","description":"Sends scheduled Slack messages"}"#);
        let meta = llm_enricher(&server).enrich(&seed(THREE_NODES, None)).await;
        assert_eq!(meta.title, "Cron to Slack");
        assert_eq!(meta.description, "Sends scheduled Slack messages");
    }

    #[tokio::test]
    async fn test_llm_enricher_falls_back_on_unparsable_reply() {
        let server = MockServer::start().await;
        server.set_llm_reply("I cannot help with that.");
        let meta = llm_enricher(&server).enrich(&seed(THREE_NODES, None)).await;
        assert_eq!(meta.title, "N8N Workflow with 3 nodes");
    }

    #[tokio::test]
    async fn test_llm_enricher_falls_back_on_api_error() {
        let server = MockServer::start().await;
        let meta = llm_enricher(&server).enrich(&seed(THREE_NODES, None)).await;
        assert_eq!(meta.title, "N8N Workflow with 3 nodes");
    }
}
