// Prompt constants for workflow metadata enrichment.

pub const ENRICH_SYSTEM: &str = "You are an expert in n8n workflows. \
    Generate clear, concise titles and descriptions for n8n automation workflows \
    based on their structure and the repository they come from.";

/// Replace `{repository}`, `{repository_description}`, `{topics}`, `{file_path}`,
/// `{node_count}`, `{node_types}` and `{json_excerpt}` before sending.
pub const ENRICH_PROMPT_TEMPLATE: &str = r#"Analyze this n8n workflow found on GitHub.

Repository: {repository}
Repository description: {repository_description}
Repository topics: {topics}
File: {file_path}
Number of nodes: {node_count}
Node types: {node_types}

Workflow JSON (first 1000 characters):
{json_excerpt}

Please generate:
1. A clear, descriptive title (max 60 characters)
2. A concise description (max 200 characters) explaining what this workflow does

Format your response as JSON with "title" and "description" keys."#;

/// Characters of raw workflow JSON embedded in the prompt.
pub const JSON_EXCERPT_CHARS: usize = 1000;
