//! Prompt templates for the planner, summarizer and synthesizer.

use super::records::{Chunk, Subtopic, Summary};
use std::fmt::Write;

pub const PLANNER_SYSTEM: &str = "You are a research librarian who plans literature reviews. \
You break a topic into complementary subtopics and write a focused web search query for each. \
Always answer with JSON only.";

pub const SUMMARIZER_SYSTEM: &str = "You are an academic writer. \
You summarize evidence faithfully, cite only the sources you are given, and never invent findings. \
Always answer with JSON only.";

pub const SYNTHESIZER_SYSTEM: &str = "You are an academic writer producing a literature review in markdown. \
Integrate the subtopic summaries into a coherent narrative, compare and contrast findings, \
point out research gaps, and cite sources by URL.";

/// Characters of each chunk shown to the summarizer.
const CHUNK_PREVIEW_CHARS: usize = 1500;
/// Sources listed per summary in the synthesis prompt.
const SOURCES_PER_SUMMARY: usize = 3;

pub fn planner_prompt(topic: &str) -> String {
    format!(
        r#"Plan a literature review on the topic: "{topic}"

Propose between 3 and 6 subtopics that cover the topic from complementary angles.
At minimum include a definition/overview angle, recent developments, and open challenges.

Return a JSON object of the form:
{{"subtopics": [{{"name": "...", "search_query": "...", "rationale": "..."}}]}}

Rules:
- "name" is a short title, unique within the list
- "search_query" is a web search query of 3 to 10 words
- "rationale" is one sentence on why the subtopic matters"#
    )
}

pub fn summarizer_prompt(topic: &str, subtopic: &Subtopic, chunks: &[Chunk]) -> String {
    let mut context = String::new();
    if chunks.is_empty() {
        context.push_str("(no sources were retrieved)\n");
    }
    for (i, chunk) in chunks.iter().enumerate() {
        let text = super::chunking::truncate_chars(&chunk.text, CHUNK_PREVIEW_CHARS);
        let _ = writeln!(
            context,
            "[{}] Source: {}\n{}\n",
            i + 1,
            chunk.metadata.url,
            text.trim()
        );
    }

    format!(
        r#"Topic: {topic}
Subtopic: {name}
Focus: {rationale}

Sources:
{context}
Write an academic summary of what these sources say about the subtopic.

Return a JSON object of the form:
{{"subtopic": "{name}", "summary": "...", "key_findings": ["..."], "sources": ["https://..."]}}

Rules:
- "summary" is 1 to 3 paragraphs
- "key_findings" lists 2 to 5 concrete findings
- "sources" lists only URLs that appear above"#,
        name = subtopic.name,
        rationale = subtopic.rationale,
    )
}

pub fn synthesizer_prompt(topic: &str, summaries: &[Summary]) -> String {
    let mut body = String::new();
    if summaries.is_empty() {
        body.push_str("(no subtopic summaries are available)\n");
    }
    for summary in summaries {
        let _ = writeln!(body, "## {}\n{}", summary.subtopic, summary.summary.trim());
        let sources: Vec<&str> = summary
            .sources
            .iter()
            .take(SOURCES_PER_SUMMARY)
            .map(String::as_str)
            .collect();
        if !sources.is_empty() {
            let _ = writeln!(body, "Sources: {}", sources.join(", "));
        }
        body.push('\n');
    }

    format!(
        r#"Write a literature review on "{topic}" from the subtopic summaries below.

{body}
Structure the review with an introduction, one section per theme, a research gaps section,
and a conclusion. Use markdown headings. Do not invent sources."#
    )
}
