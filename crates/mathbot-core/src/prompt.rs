//! Prompt assembly: retrieved chunks become a labelled context block wrapped in the tutor
//! instructions and the student's question.

use crate::retriever::RetrievedChunk;

/// Seed instruction of every conversation.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful math tutor. Explain concepts step by step in a simple way.";

const INSTRUCTIONS: &str = "You are a patient expert math tutor. Use ONLY the CONTEXT below \
(extracted from the student's course books) to answer the QUESTION.\n\
Show clear step-by-step calculations and a final boxed answer. Use LaTeX for equations where helpful.";

/// Renders the context block: one `Source: …, chunk: …` header plus text per result, in order.
pub fn build_context(results: &[RetrievedChunk]) -> String {
    let mut context = String::new();
    for r in results {
        context.push_str(&format!(
            "Source: {}, chunk: {}\n{}\n\n",
            r.metadata.source, r.metadata.chunk_index, r.document
        ));
    }
    context
}

/// Builds the grounded prompt sent to the chat model. Pure: same inputs, same string.
pub fn build_prompt(question: &str, results: &[RetrievedChunk]) -> String {
    let context = build_context(results);
    let prompt = format!(
        "\n{INSTRUCTIONS}\n\nCONTEXT:\n{context}\n\nQUESTION:\n{question}\n\nAnswer:\n"
    );
    prompt.trim().to_string()
}
