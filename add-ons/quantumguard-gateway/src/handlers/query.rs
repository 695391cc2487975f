//! Knowledge query prompt assembly.
//!
//! The system/user message pair is built here and sent by the gateway; the
//! frontend only ever submits the raw query string. Context is the indexed
//! knowledge entries (up to 10), each truncated to a 200-char excerpt; no
//! chunking, embedding, or similarity ranking happens anywhere.

use crate::store::KnowledgeEntryRow;

pub const SYSTEM_PROMPT: &str =
    "You are a quantum-secure knowledge assistant for enterprise data analysis.";

/// Builds the user message: knowledge-base context followed by the query.
pub fn build_user_prompt(entries: &[KnowledgeEntryRow], query: &str) -> String {
    let context = entries
        .iter()
        .map(|e| {
            let excerpt: String = e
                .content
                .as_deref()
                .unwrap_or("N/A")
                .chars()
                .take(200)
                .collect();
            format!(
                "Document: {}\nType: {}\nContent: {}...",
                e.title, e.entry_type, excerpt
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a quantum-secure knowledge assistant. Based on the following knowledge base context, answer the user's query:\n\n\
         Knowledge Base Context:\n{}\n\n\
         User Query: {}\n\n\
         Provide a comprehensive response with:\n\
         1. Direct answer to the query\n\
         2. Relevant insights from the knowledge base\n\
         3. Confidence score (0-100)\n\
         4. Any related recommendations\n\n\
         Format your response clearly and professionally.",
        context, query
    )
}

/// Canned answer used when `llm_mode = "mock"` (offline/dev/test runs).
pub fn mock_response(query: &str, result_count: usize) -> String {
    format!(
        "[mock] Answer for \"{}\" drawn from {} indexed knowledge entries.",
        query, result_count
    )
}
