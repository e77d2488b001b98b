//! Prompt assembly. Pure functions: same input, same string.

use crate::retrieval::RetrievedDocument;

const CONTEXT_HEADER: &str = "Relevant documents:";
const INSTRUCTION: &str = "Answer the user's question based on the context information. \
If the context does not contain the relevant information, say so.";

/// Render retrieved documents as numbered context. Empty input gives an
/// empty string.
pub fn build_context(docs: &[RetrievedDocument]) -> String {
    if docs.is_empty() {
        return String::new();
    }

    let mut parts = vec![CONTEXT_HEADER.to_string()];
    for (i, doc) in docs.iter().enumerate() {
        parts.push(format!("\n[{}] {}", i + 1, doc.content));
        if let Some(source) = &doc.source {
            parts.push(format!("Source: {source}"));
        }
    }
    parts.join("\n")
}

/// Combine optional context and the user's message into the model prompt.
pub fn build_prompt(message: &str, context: &str) -> String {
    let mut parts = Vec::with_capacity(3);
    if !context.is_empty() {
        parts.push(format!("Context information:\n{context}\n"));
    }
    parts.push(format!("User question: {message}\n"));
    parts.push(INSTRUCTION.to_string());
    parts.join("\n")
}
