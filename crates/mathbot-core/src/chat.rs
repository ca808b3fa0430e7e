//! Conversation state and the question → retrieve → prompt → answer loop.

use crate::llm::{ChatModel, LlmError, Message};
use crate::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::retriever::{RetrievedChunk, Retriever};

/// Ordered, append-only message history seeded with the system instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: vec![Message::system(SYSTEM_PROMPT)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Back to the single seed message.
    pub fn reset(&mut self) {
        self.messages.truncate(1);
    }

}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// How a question was handled. LLM failures are not an outcome: they surface as [ChatError].
#[derive(Debug, Clone, PartialEq)]
pub enum AskOutcome {
    /// Blank question; nothing was recorded or called.
    EmptyQuestion,
    /// The store had no chunks to offer; the model was not called.
    NoContext,
    /// Retrieval broke (embedder or store); the model was not called.
    RetrievalFailed { reason: String },
    Answered { answer: String },
}

/// One user's chat: history plus the services it needs.
pub struct ChatSession<'a> {
    retriever: Retriever<'a>,
    model: &'a dyn ChatModel,
    top_k: usize,
    conversation: Conversation,
    last_retrieved: Vec<RetrievedChunk>,
}

impl<'a> ChatSession<'a> {
    pub fn new(retriever: Retriever<'a>, model: &'a dyn ChatModel, top_k: usize) -> Self {
        Self {
            retriever,
            model,
            top_k,
            conversation: Conversation::new(),
            last_retrieved: Vec::new(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Chunks fetched for the most recent question.
    pub fn last_retrieved(&self) -> &[RetrievedChunk] {
        &self.last_retrieved
    }

    /// Clears history to the seed message.
    pub fn reset(&mut self) {
        self.conversation.reset();
    }

    /// Answers `question` from the indexed books.
    ///
    /// History receives the raw question and, when context was found, a second user turn
    /// holding the full grounded prompt, then the model's answer.
    pub async fn ask(&mut self, question: &str) -> Result<AskOutcome, ChatError> {
        if question.trim().is_empty() {
            return Ok(AskOutcome::EmptyQuestion);
        }
        self.conversation.push(Message::user(question));

        let docs = match self.retriever.retrieve(question, self.top_k).await {
            Ok(docs) => docs,
            Err(e) => {
                self.last_retrieved.clear();
                return Ok(AskOutcome::RetrievalFailed {
                    reason: e.to_string(),
                });
            }
        };
        self.last_retrieved = docs;
        if self.last_retrieved.is_empty() {
            return Ok(AskOutcome::NoContext);
        }

        let prompt = build_prompt(question, &self.last_retrieved);
        self.conversation.push(Message::user(prompt));

        tracing::debug!(
            model = self.model.model_id(),
            turns = self.conversation.messages().len(),
            "calling chat model"
        );
        let answer = self.model.complete(self.conversation.messages()).await?;
        self.conversation.push(Message::assistant(answer.clone()));
        Ok(AskOutcome::Answered { answer })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat model failed: {0}")]
    Llm(#[from] LlmError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn conversation_starts_with_seed_and_resets_to_it() {
        let mut c = Conversation::new();
        assert_eq!(c.messages(), &[Message::system(SYSTEM_PROMPT)]);
        c.push(Message::user("hi"));
        c.push(Message::assistant("hello"));
        assert_eq!(c.messages().len(), 3);
        c.reset();
        assert_eq!(c.messages().len(), 1);
        assert_eq!(c.messages()[0].role, Role::System);
    }
}
